//! Resolution of a parsed module into a linked [`Schema`].
//!
//! Resolution runs in two steps. First every module reachable through imports
//! is loaded, and the names it declares are entered into a [`ScopeTree`].
//! Only then are references, `extends` clauses and default values resolved,
//! so that the order of declarations within and across files never matters.
//!
//! Everything built here belongs to a single call to [`resolve`]: nothing is
//! cached between runs.

use fxhash::FxHashMap;
use index_vec::IndexVec;

use crate::linked::{self, Builtin, DeclId, MethodRef, ModuleId, Schema};
use crate::reporting::{Error, ResolutionError, ResolutionErrorKind, SyntaxError, SyntaxErrorKind};
use crate::source::ByteRange;
use crate::syntax::{self, AnnotationTarget, InterfaceMember};

mod defaults;
mod imports;
mod references;
mod scope_tree;

#[cfg(test)]
mod tests;

pub use self::imports::ImportSource;

use self::imports::{LoadedModule, Loader};
use self::scope_tree::{ScopeId, ScopeTree};

/// Resolve a parsed module, along with everything it imports.
///
/// Imports are requested from `source`, at most once per import path. The
/// path `::global` always refers back to `module` and is never requested, so
/// it resolves even when no source is supplied. Any other import is an error
/// without a source.
pub fn resolve(
    module: &syntax::Module,
    source: Option<&mut dyn ImportSource>,
) -> Result<Schema, Error> {
    let mut loader = Loader::new(source);
    let root = loader.load_root(module)?;

    let mut context = Context::new(&loader.modules, &loader.by_path, &loader.tree);
    let modules = loader
        .modules
        .indices()
        .map(|id| context.module(id))
        .collect::<Result<IndexVec<ModuleId, _>, _>>()?;

    Ok(Schema::new(root, modules, loader.tree.decl_infos()))
}

/// What a name was bound to during resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Binding {
    Decl(DeclId),
    Module(ModuleId),
    Builtin(Builtin),
    Unresolved,
}

struct Context<'l, 'a> {
    modules: &'l IndexVec<ModuleId, LoadedModule<'a>>,
    by_path: &'l FxHashMap<String, ModuleId>,
    tree: &'l ScopeTree,
    /// Aliases whose targets are currently being resolved. These are hidden
    /// from lookups, so that `using Foo;` refers to an outer `Foo`.
    resolving_aliases: Vec<(ScopeId, String)>,
    effective_methods: FxHashMap<DeclId, Vec<MethodRef>>,
    /// Interfaces whose effective methods are currently being computed.
    inheriting: Vec<DeclId>,
}

impl<'l, 'a> Context<'l, 'a> {
    fn new(
        modules: &'l IndexVec<ModuleId, LoadedModule<'a>>,
        by_path: &'l FxHashMap<String, ModuleId>,
        tree: &'l ScopeTree,
    ) -> Context<'l, 'a> {
        Context {
            modules,
            by_path,
            tree,
            resolving_aliases: Vec::new(),
            effective_methods: FxHashMap::default(),
            inheriting: Vec::new(),
        }
    }

    fn module_path(&self, scope: ScopeId) -> &'l str {
        let modules = self.modules;
        &modules[self.tree.scope(scope).module].path
    }

    fn error(&self, scope: ScopeId, range: ByteRange, kind: ResolutionErrorKind) -> Error {
        Error::Resolution(ResolutionError {
            module: self.module_path(scope).to_owned(),
            range,
            kind,
        })
    }

    fn syntax_error(&self, scope: ScopeId, range: ByteRange, kind: SyntaxErrorKind) -> Error {
        Error::Syntax(SyntaxError {
            module: Some(self.module_path(scope).to_owned()),
            range,
            kind,
        })
    }

    /// The dotted name of a declaration within its module.
    fn qualified_name(&self, id: DeclId) -> String {
        let mut segments = vec![self.tree.decl(id).name.as_str()];
        let mut parent = self.tree.decl(id).parent;
        while let Some(id) = parent {
            segments.push(self.tree.decl(id).name.as_str());
            parent = self.tree.decl(id).parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// The scope opened by a declaration's body.
    fn body_scope(&self, id: DeclId, fallback: ScopeId) -> ScopeId {
        self.tree.decl(id).scope.unwrap_or(fallback)
    }

    fn module(&mut self, id: ModuleId) -> Result<linked::Module, Error> {
        let modules = self.modules;
        let loaded = &modules[id];
        let syntax: &'l syntax::Module = &loaded.syntax;

        Ok(linked::Module {
            id,
            path: loaded.path.clone(),
            file_id: syntax.id.value,
            annotations: self.annotations(
                loaded.scope,
                &syntax.annotations,
                AnnotationTarget::File,
            )?,
            decls: self.decls(loaded.scope, &syntax.decls)?,
        })
    }

    fn decls(
        &mut self,
        scope: ScopeId,
        decls: &[syntax::Decl],
    ) -> Result<Vec<linked::Decl>, Error> {
        decls
            .iter()
            .enumerate()
            .map(|(index, decl)| self.decl(scope, index, decl))
            .collect()
    }

    fn decl(
        &mut self,
        scope: ScopeId,
        index: usize,
        decl: &syntax::Decl,
    ) -> Result<linked::Decl, Error> {
        match decl {
            syntax::Decl::Const(decl) => {
                let id = self.tree.member_decl(scope, index);
                let r#type = self.resolve_type(scope, &decl.r#type)?;
                let value = self.eval(scope, &r#type, &decl.value)?;
                Ok(linked::Decl::Const(linked::Const {
                    id,
                    name: decl.name.name.clone(),
                    r#type,
                    value,
                    annotations: self.annotations(
                        scope,
                        &decl.annotations,
                        AnnotationTarget::Const,
                    )?,
                }))
            }
            syntax::Decl::Struct(decl) => {
                let id = self.tree.member_decl(scope, index);
                let body = self.body_scope(id, scope);
                Ok(linked::Decl::Struct(linked::Struct {
                    id,
                    name: decl.name.name.clone(),
                    annotations: self.annotations(
                        scope,
                        &decl.annotations,
                        AnnotationTarget::Struct,
                    )?,
                    members: self.members(body, &decl.members)?,
                }))
            }
            syntax::Decl::Enum(decl) => {
                let id = self.tree.member_decl(scope, index);
                let enumerants = decl
                    .enumerants
                    .iter()
                    .map(|enumerant| -> Result<_, Error> {
                        Ok(linked::Enumerant {
                            name: enumerant.name.name.clone(),
                            ordinal: enumerant.ordinal.value,
                            annotations: self.annotations(
                                scope,
                                &enumerant.annotations,
                                AnnotationTarget::Enumerant,
                            )?,
                        })
                    })
                    .collect::<Result<_, _>>()?;
                Ok(linked::Decl::Enum(linked::Enum {
                    id,
                    name: decl.name.name.clone(),
                    annotations: self.annotations(
                        scope,
                        &decl.annotations,
                        AnnotationTarget::Enum,
                    )?,
                    enumerants,
                }))
            }
            syntax::Decl::Interface(decl) => {
                let id = self.tree.member_decl(scope, index);
                let body = self.body_scope(id, scope);
                let extends = self.bases(id)?;
                let annotations =
                    self.annotations(scope, &decl.annotations, AnnotationTarget::Interface)?;

                let mut methods = Vec::new();
                let mut nested = Vec::new();
                for (index, member) in decl.members.iter().enumerate() {
                    match member {
                        InterfaceMember::Method(method) => methods.push(self.method(body, method)?),
                        InterfaceMember::Decl(decl) => nested.push(self.decl(body, index, decl)?),
                    }
                }

                Ok(linked::Decl::Interface(linked::Interface {
                    id,
                    name: decl.name.name.clone(),
                    extends,
                    annotations,
                    methods,
                    nested,
                    effective_methods: self.effective_methods(id)?,
                }))
            }
            syntax::Decl::Annotation(decl) => {
                let id = self.tree.member_decl(scope, index);
                Ok(linked::Decl::Annotation(linked::Annotation {
                    id,
                    name: decl.name.name.clone(),
                    targets: decl.targets.iter().map(|(_, target)| *target).collect(),
                    r#type: self.resolve_type(scope, &decl.r#type)?,
                    annotations: self.annotations(
                        scope,
                        &decl.annotations,
                        AnnotationTarget::Annotation,
                    )?,
                }))
            }
            syntax::Decl::UsingAlias(decl) => {
                let name = match decl.binding() {
                    Some(name) => name.name.clone(),
                    None => decl.target.to_string(),
                };
                let binding = self.alias_path(scope, &name, &decl.target)?;
                Ok(linked::Decl::UsingAlias(linked::UsingAlias {
                    name,
                    target: self.reference(binding, &decl.target),
                }))
            }
            syntax::Decl::UsingImport(decl) => {
                let module = self.imported_module(scope, &decl.import)?;
                let binding = match decl.binding() {
                    Some(name) => {
                        self.alias_import(scope, &name.name, &decl.import, &decl.path)?
                    }
                    None => self.imported(scope, &decl.import, &decl.path)?,
                };
                let path = syntax::Path {
                    range: decl.range,
                    segments: decl.path.clone(),
                };
                Ok(linked::Decl::UsingImport(linked::UsingImport {
                    name: decl.binding().map(|name| name.name.clone()),
                    module,
                    target: self.reference(binding, &path),
                }))
            }
        }
    }

    fn members(
        &mut self,
        scope: ScopeId,
        members: &[syntax::Member],
    ) -> Result<Vec<linked::Member>, Error> {
        let mut linked_members = Vec::with_capacity(members.len());

        for (index, member) in members.iter().enumerate() {
            let member = match member {
                syntax::Member::Field(field) => {
                    let r#type = self.resolve_type(scope, &field.r#type)?;
                    let default = match &field.default {
                        Some(default) => Some(self.eval(scope, &r#type, default)?),
                        None => None,
                    };
                    linked::Member::Field(linked::Field {
                        name: field.name.name.clone(),
                        ordinal: field.ordinal.value,
                        r#type,
                        default,
                        annotations: self.annotations(
                            scope,
                            &field.annotations,
                            AnnotationTarget::Field,
                        )?,
                    })
                }
                syntax::Member::Union(union) => {
                    let body = self.tree.member_scope(scope, index);
                    let id = union.name.as_ref().map(|_| self.tree.member_decl(scope, index));
                    linked::Member::Union(linked::Union {
                        id,
                        name: union.name.as_ref().map(|name| name.name.clone()),
                        ordinal: union.ordinal.map(|ordinal| ordinal.value),
                        annotations: self.annotations(
                            scope,
                            &union.annotations,
                            AnnotationTarget::Union,
                        )?,
                        members: self.members(body, &union.members)?,
                    })
                }
                syntax::Member::Group(group) => {
                    let body = self.tree.member_scope(scope, index);
                    linked::Member::Group(linked::Group {
                        id: self.tree.member_decl(scope, index),
                        name: group.name.name.clone(),
                        annotations: self.annotations(
                            scope,
                            &group.annotations,
                            AnnotationTarget::Group,
                        )?,
                        members: self.members(body, &group.members)?,
                    })
                }
                syntax::Member::Decl(decl) => linked::Member::Decl(self.decl(scope, index, decl)?),
            };
            linked_members.push(member);
        }

        Ok(linked_members)
    }

    fn method(&mut self, scope: ScopeId, method: &syntax::Method) -> Result<linked::Method, Error> {
        let results = match &method.results {
            Some(results) => Some(self.params(scope, results)?),
            None => None,
        };
        Ok(linked::Method {
            name: method.name.name.clone(),
            ordinal: method.ordinal.value,
            params: self.params(scope, &method.params)?,
            results,
            annotations: self.annotations(scope, &method.annotations, AnnotationTarget::Method)?,
        })
    }

    fn params(
        &mut self,
        scope: ScopeId,
        params: &[syntax::Param],
    ) -> Result<Vec<linked::Param>, Error> {
        params
            .iter()
            .map(|param| -> Result<_, Error> {
                let r#type = self.resolve_type(scope, &param.r#type)?;
                let default = match &param.default {
                    Some(default) => Some(self.eval(scope, &r#type, default)?),
                    None => None,
                };
                Ok(linked::Param {
                    name: param.name.name.clone(),
                    r#type,
                    default,
                    annotations: self.annotations(
                        scope,
                        &param.annotations,
                        AnnotationTarget::Param,
                    )?,
                })
            })
            .collect()
    }
}
