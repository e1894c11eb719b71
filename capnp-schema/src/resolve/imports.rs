//! Loading of imported modules.
//!
//! Each distinct import path is requested from the [`ImportSource`] at most
//! once per resolution run. A module is registered before its own imports are
//! followed, so cyclic imports end at the registered module rather than
//! recursing forever.

use std::borrow::Cow;

use fxhash::FxHashMap;
use index_vec::IndexVec;

use crate::linked::{ModuleId, ROOT_IMPORT_PATH};
use crate::reporting::{Error, ImportError, ImportErrorKind};
use crate::resolve::scope_tree::{ScopeId, ScopeTree};
use crate::syntax::{self, ImportPath};

/// Supplies the source text of imported schemas.
///
/// Import paths are passed exactly as written in the importing schema. An
/// implementation returns `None` when it has no schema for a path.
pub trait ImportSource {
    fn load(&mut self, path: &str) -> Option<String>;
}

impl<F> ImportSource for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn load(&mut self, path: &str) -> Option<String> {
        self(path)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// The module's imports are still being loaded.
    InProgress,
    Loaded,
}

#[derive(Debug)]
pub struct LoadedModule<'a> {
    pub path: String,
    pub syntax: Cow<'a, syntax::Module>,
    /// The file scope of the module.
    pub scope: ScopeId,
    pub state: LoadState,
}

pub struct Loader<'a, 's> {
    source: Option<&'s mut dyn ImportSource>,
    pub tree: ScopeTree,
    pub modules: IndexVec<ModuleId, LoadedModule<'a>>,
    pub by_path: FxHashMap<String, ModuleId>,
}

impl<'a, 's> Loader<'a, 's> {
    pub fn new(source: Option<&'s mut dyn ImportSource>) -> Loader<'a, 's> {
        Loader {
            source,
            tree: ScopeTree::new(),
            modules: IndexVec::new(),
            by_path: FxHashMap::default(),
        }
    }

    /// Register the module being resolved, then load everything it imports.
    pub fn load_root(&mut self, syntax: &'a syntax::Module) -> Result<ModuleId, Error> {
        self.register(ROOT_IMPORT_PATH, Cow::Borrowed(syntax))
    }

    fn register(&mut self, path: &str, syntax: Cow<'a, syntax::Module>) -> Result<ModuleId, Error> {
        let id = self.modules.next_idx();
        self.by_path.insert(path.to_owned(), id);

        let scopes = self.tree.build_module(id, path, &syntax)?;
        self.modules.push(LoadedModule {
            path: path.to_owned(),
            syntax,
            scope: scopes.root,
            state: LoadState::InProgress,
        });

        for import in &scopes.imports {
            self.load_import(id, import)?;
        }

        self.modules[id].state = LoadState::Loaded;
        Ok(id)
    }

    fn load_import(&mut self, importer: ModuleId, import: &ImportPath) -> Result<ModuleId, Error> {
        tracing::debug!(path = import.path.as_str(), "import requested");

        if let Some(id) = self.by_path.get(&import.path).copied() {
            match self.modules.get(id).map(|module| module.state) {
                Some(LoadState::Loaded) => {
                    tracing::debug!(path = import.path.as_str(), "reusing cached import")
                }
                Some(LoadState::InProgress) | None => {
                    tracing::debug!(path = import.path.as_str(), "import already in progress")
                }
            }
            return Ok(id);
        }

        let error = |kind| {
            Error::Import(ImportError {
                importer: self.modules[importer].path.clone(),
                range: import.range,
                path: import.path.clone(),
                kind,
            })
        };

        let text = match self.source.as_mut() {
            None => return Err(error(ImportErrorKind::NoImportSource)),
            Some(source) => match source.load(&import.path) {
                Some(text) => text,
                None => return Err(error(ImportErrorKind::NotFound)),
            },
        };

        let syntax = match syntax::Module::parse(&text) {
            Ok(syntax) => syntax,
            Err(parse_error) => {
                let parse_error = parse_error.in_module(&import.path);
                return Err(error(ImportErrorKind::Parse(Box::new(parse_error))));
            }
        };

        tracing::debug!(path = import.path.as_str(), "import loaded");
        self.register(&import.path, Cow::Owned(syntax))
    }
}
