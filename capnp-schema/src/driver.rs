use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::{BufferedStandardStream, ColorChoice, WriteColor};
use fxhash::FxHashMap;
use itertools::Itertools;
use std::cell::RefCell;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::linked::{Schema, ROOT_IMPORT_PATH};
use crate::reporting::{Error, ImportError, ImportErrorKind};
use crate::resolve::ImportSource;
use crate::syntax;

/// Identifies a source text loaded by the driver.
pub type FileId = usize;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Error => 1,
        }
    }
}

pub struct Driver {
    files: SimpleFiles<String, String>,
    include_dirs: Vec<PathBuf>,

    deny_unresolved: bool,
    seen_errors: RefCell<bool>,
    codespan_config: codespan_reporting::term::Config,
    diagnostic_writer: RefCell<Box<dyn WriteColor>>,

    emit_width: usize,
    emit_writer: RefCell<Box<dyn WriteColor>>,
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            files: SimpleFiles::new(),
            include_dirs: Vec::new(),

            deny_unresolved: false,
            seen_errors: RefCell::new(false),
            codespan_config: codespan_reporting::term::Config::default(),
            diagnostic_writer: RefCell::new(Box::new(BufferedStandardStream::stderr(
                color_choice(atty::Stream::Stderr),
            ))),

            emit_width: syntax::pretty::DEFAULT_WIDTH,
            emit_writer: RefCell::new(Box::new(BufferedStandardStream::stdout(color_choice(
                atty::Stream::Stdout,
            )))),
        }
    }

    /// Setup a global panic hook
    pub fn install_panic_hook(&self) {
        // Use the currently set codespan configuration
        let term_config = self.codespan_config.clone();
        // Fetch the default hook (which prints the panic message and an optional backtrace)
        let default_hook = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let location = info.location();
            let message = if let Some(message) = info.payload().downcast_ref::<String>() {
                message.as_str()
            } else if let Some(message) = info.payload().downcast_ref::<&str>() {
                message
            } else {
                "unknown panic type"
            };

            let diagnostic = Diagnostic::bug()
                .with_message(format!("schema compiler panicked at '{message}'"))
                .with_notes(vec![
                    match location {
                        Some(location) => format!("panicked at: {location}"),
                        None => "panicked at: unknown location".to_owned(),
                    },
                    "this is a bug in capnp-schema, please report it".to_owned(),
                ]);

            let mut writer = BufferedStandardStream::stderr(color_choice(atty::Stream::Stderr));
            let dummy_files = SimpleFiles::<String, String>::new();

            default_hook(info);
            eprintln!();
            // Nothing more can be done if the panic report cannot be written.
            let _ = codespan_reporting::term::emit(
                &mut writer,
                &term_config,
                &dummy_files,
                &diagnostic,
            );
        }));
    }

    /// Report unresolved names as errors rather than warnings
    pub fn set_deny_unresolved(&mut self, deny_unresolved: bool) {
        self.deny_unresolved = deny_unresolved;
    }

    /// Add a directory to search for imports, after the directory of the
    /// importing file. Directories are searched in the order they are added.
    pub fn add_include_dir(&mut self, dir: PathBuf) {
        self.include_dirs.push(dir);
    }

    /// Set the writer to use when rendering diagnostics
    pub fn set_diagnostic_writer(&mut self, stream: impl 'static + WriteColor) {
        self.diagnostic_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Set the width to use when printing schemas
    pub fn set_emit_width(&mut self, emit_width: usize) {
        self.emit_width = emit_width;
    }

    /// Set the writer to use when printing schemas
    pub fn set_emit_writer(&mut self, stream: impl 'static + WriteColor) {
        self.emit_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Load a source string into the file database.
    pub fn load_source_string(&mut self, name: String, source: String) -> FileId {
        self.files.add(name, source)
    }

    /// Load a source file into the file database using a reader.
    pub fn load_source(&mut self, name: String, mut reader: impl Read) -> Option<FileId> {
        let mut source = String::new();
        match reader.read_to_string(&mut source) {
            Ok(_) => Some(self.load_source_string(name, source)),
            Err(error) => {
                self.emit_read_diagnostic(name, error);
                None
            }
        }
    }

    /// Load a source file into the file database from the given path.
    pub fn load_source_path(&mut self, path: &Path) -> Option<FileId> {
        match std::fs::File::open(path) {
            Ok(file) => self.load_source(path.display().to_string(), file),
            Err(error) => {
                self.emit_read_diagnostic(path.display(), error);
                None
            }
        }
    }

    /// Parse and resolve a schema, reporting any errors along with the names
    /// that were left unresolved.
    ///
    /// Relative imports are looked up in `base_dir` and then in each include
    /// directory. Imports starting with `/` are only looked up in the include
    /// directories.
    pub fn check_module(&mut self, file_id: FileId, base_dir: Option<&Path>) -> Status {
        let module = match self.parse_module(file_id) {
            Some(module) => module,
            None => return Status::Error,
        };

        let mut file_ids = FxHashMap::default();
        file_ids.insert(ROOT_IMPORT_PATH.to_owned(), file_id);

        let result = {
            let mut imports = FileImports {
                base_dir,
                include_dirs: &self.include_dirs,
                files: &mut self.files,
                file_ids: &mut file_ids,
            };
            crate::resolve(&module, Some(&mut imports))
        };

        match result {
            Ok(schema) => self.emit_unresolved(&schema, &file_ids),
            Err(error) => self.emit_error(&error, &file_ids),
        }

        match *self.seen_errors.borrow() {
            true => Status::Error,
            false => Status::Ok,
        }
    }

    /// Parse a schema and print it back out.
    pub fn print_module(&mut self, file_id: FileId) -> Status {
        match self.parse_module(file_id) {
            Some(module) => {
                self.emit_module(&module);
                Status::Ok
            }
            None => Status::Error,
        }
    }

    fn parse_module(&self, file_id: FileId) -> Option<syntax::Module> {
        let source = match self.files.get(file_id) {
            Ok(file) => file.source(),
            Err(error) => {
                self.emit_diagnostic(Diagnostic::bug().with_message(error.to_string()));
                return None;
            }
        };

        match syntax::Module::parse(source) {
            Ok(module) => Some(module),
            Err(error) => {
                self.emit_diagnostic(error.to_diagnostic(file_id));
                None
            }
        }
    }

    fn emit_module(&self, module: &syntax::Module) {
        let mut emit_writer = self.emit_writer.borrow_mut();
        let result = write!(emit_writer, "{module:width$}", width = self.emit_width)
            .and_then(|()| emit_writer.flush());
        if let Err(error) = result {
            tracing::error!(%error, "failed to write schema");
            *self.seen_errors.borrow_mut() = true;
        }
    }

    fn emit_error(&self, error: &Error, file_ids: &FxHashMap<String, FileId>) {
        let file_id = error.module().and_then(|module| file_ids.get(module));
        match file_id {
            Some(file_id) => self.emit_diagnostic(error.to_diagnostic(*file_id)),
            None => self.emit_diagnostic(Diagnostic::error().with_message(error.to_string())),
        }

        // Also point into the imported file itself, if it could be read.
        if let Error::Import(ImportError {
            path,
            kind: ImportErrorKind::Parse(inner),
            ..
        }) = error
        {
            if let Some(file_id) = file_ids.get(path) {
                self.emit_diagnostic(inner.to_diagnostic(*file_id));
            }
        }
    }

    fn emit_unresolved(&self, schema: &Schema, file_ids: &FxHashMap<String, FileId>) {
        let severity = match self.deny_unresolved {
            true => Severity::Error,
            false => Severity::Warning,
        };

        let unresolved = schema
            .unresolved()
            .into_iter()
            .sorted_by_key(|(module, path)| (*module, path.range.start()));

        for (module, path) in unresolved {
            let module = schema.module(module);
            let diagnostic =
                Diagnostic::new(severity).with_message(format!("cannot find `{path}`"));
            let diagnostic = match file_ids.get(&module.path) {
                Some(file_id) => diagnostic.with_labels(vec![
                    Label::primary(*file_id, path.range).with_message("not found in this scope")
                ]),
                None => diagnostic.with_notes(vec![format!("in module `{}`", module.path)]),
            };
            self.emit_diagnostic(diagnostic);
        }
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic<FileId>) {
        let mut writer = self.diagnostic_writer.borrow_mut();
        let config = &self.codespan_config;

        let result = codespan_reporting::term::emit(&mut *writer, config, &self.files, &diagnostic)
            .map_err(|error| error.to_string())
            .and_then(|()| writer.flush().map_err(|error| error.to_string()));
        if let Err(error) = result {
            tracing::error!(%error, "failed to write diagnostic");
        }

        if diagnostic.severity >= Severity::Error {
            *self.seen_errors.borrow_mut() = true;
        }
    }

    fn emit_read_diagnostic(&self, name: impl std::fmt::Display, error: std::io::Error) {
        let diagnostic =
            Diagnostic::error().with_message(format!("couldn't read `{name}`: {error}"));
        self.emit_diagnostic(diagnostic);
    }
}

fn color_choice(stream: atty::Stream) -> ColorChoice {
    match atty::is(stream) {
        true => ColorChoice::Auto,
        false => ColorChoice::Never,
    }
}

/// Reads imported schemas from the file system, recording them in the file
/// database so that diagnostics can point into them.
struct FileImports<'a> {
    base_dir: Option<&'a Path>,
    include_dirs: &'a [PathBuf],
    files: &'a mut SimpleFiles<String, String>,
    file_ids: &'a mut FxHashMap<String, FileId>,
}

impl FileImports<'_> {
    fn candidates(&self, path: &str) -> Vec<PathBuf> {
        match path.strip_prefix('/') {
            Some(path) => self.include_dirs.iter().map(|dir| dir.join(path)).collect(),
            None => self
                .base_dir
                .into_iter()
                .chain(self.include_dirs.iter().map(PathBuf::as_path))
                .map(|dir| dir.join(path))
                .collect(),
        }
    }
}

impl ImportSource for FileImports<'_> {
    fn load(&mut self, path: &str) -> Option<String> {
        for candidate in self.candidates(path) {
            match std::fs::read_to_string(&candidate) {
                Ok(source) => {
                    tracing::debug!(import = path, file = %candidate.display(), "read import");
                    let file_id = self.files.add(candidate.display().to_string(), source.clone());
                    self.file_ids.insert(path.to_owned(), file_id);
                    return Some(source);
                }
                Err(error) => {
                    tracing::trace!(import = path, file = %candidate.display(), %error, "skipped");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imports<'a>(
        base_dir: Option<&'a Path>,
        include_dirs: &'a [PathBuf],
        files: &'a mut SimpleFiles<String, String>,
        file_ids: &'a mut FxHashMap<String, FileId>,
    ) -> FileImports<'a> {
        FileImports {
            base_dir,
            include_dirs,
            files,
            file_ids,
        }
    }

    #[test]
    fn import_search_order() {
        let include_dirs = [PathBuf::from("/usr/include"), PathBuf::from("vendor")];
        let mut files = SimpleFiles::new();
        let mut file_ids = FxHashMap::default();
        let imports = imports(
            Some(Path::new("schemas")),
            &include_dirs,
            &mut files,
            &mut file_ids,
        );

        assert_eq!(
            imports.candidates("foo.capnp"),
            [
                PathBuf::from("schemas/foo.capnp"),
                PathBuf::from("/usr/include/foo.capnp"),
                PathBuf::from("vendor/foo.capnp"),
            ],
        );
        assert_eq!(
            imports.candidates("/capnp/c++.capnp"),
            [
                PathBuf::from("/usr/include/capnp/c++.capnp"),
                PathBuf::from("vendor/capnp/c++.capnp"),
            ],
        );
    }

    #[test]
    fn missing_imports_are_not_recorded() {
        let mut files = SimpleFiles::new();
        let mut file_ids = FxHashMap::default();
        let mut imports = imports(
            Some(Path::new("/nonexistent/capnp-schema")),
            &[],
            &mut files,
            &mut file_ids,
        );

        assert_eq!(imports.load("missing.capnp"), None);
        assert!(file_ids.is_empty());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Status::Ok.exit_code(), 0);
        assert_eq!(Status::Error.exit_code(), 1);
    }
}
