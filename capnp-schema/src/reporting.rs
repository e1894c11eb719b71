//! Errors produced while parsing and resolving schemas.

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::literal::LiteralError;
use crate::source::ByteRange;

/// Any error produced by this crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// A malformed token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct LexError {
    pub range: ByteRange,
    pub kind: LexErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    #[error("unexpected character `{0}`")]
    UnexpectedCharacter(char),
    #[error("unterminated text literal")]
    UnterminatedTextLiteral(char),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
}

/// A grammar violation, or a literal that does not fit the type it is
/// written for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct SyntaxError {
    /// The module the error points into. Errors raised while parsing a lone
    /// source text have no module path.
    pub module: Option<String>,
    pub range: ByteRange,
    pub kind: SyntaxErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("missing file id")]
    MissingFileId,
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: &'static str,
        expected: &'static str,
    },
    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEndOfInput { expected: &'static str },
    #[error("expected keyword, found `{0}`")]
    ExpectedKeyword(String),
    #[error("text literals must be written with double quotes")]
    SingleQuotedText,
    #[error("invalid numeric literal: {0}")]
    InvalidNumericLiteral(LiteralError),
    #[error("invalid escape sequence `{0}`")]
    InvalidEscape(String),
    #[error("unexpected type parameters for `{0}`")]
    UnexpectedTypeParameters(String),
    #[error("a struct can only have one anonymous union")]
    DuplicateAnonymousUnion,
    #[error("unknown annotation target `{0}`")]
    UnknownAnnotationTarget(String),
    #[error("literal is nested too deeply")]
    LiteralTooDeep,
    #[error("mismatched literal, expected {expected}, found {found}")]
    MismatchedLiteral {
        expected: String,
        found: &'static str,
    },
}

/// A failure to supply or parse an imported schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot import `{path}`: {kind}")]
pub struct ImportError {
    /// The module containing the import.
    pub importer: String,
    /// The range of the import path in the importing module.
    pub range: ByteRange,
    /// The requested import path.
    pub path: String,
    pub kind: ImportErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportErrorKind {
    #[error("no import source was supplied")]
    NoImportSource,
    #[error("no schema found")]
    NotFound,
    #[error("{0}")]
    Parse(Box<Error>),
}

/// A reference that must be bound but could not be, or a declaration that
/// conflicts with another.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct ResolutionError {
    pub module: String,
    pub range: ByteRange,
    pub kind: ResolutionErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionErrorKind {
    #[error("cannot find `{name}` in imported module `{import}`")]
    ImportedNameNotFound { name: String, import: String },
    #[error("cannot find base interface `{0}`")]
    UnresolvedBaseInterface(String),
    #[error("`{0}` is not an interface")]
    NotAnInterface(String),
    #[error("interface `{0}` extends itself")]
    CyclicInheritance(String),
    #[error("`{0}` is not a type")]
    ExpectedType(String),
    #[error("`{0}` is not an annotation")]
    NotAnAnnotation(String),
    #[error("annotation `{name}` cannot be applied to a {target}")]
    AnnotationTargetMismatch { name: String, target: &'static str },
    #[error("`{0}` is not a constant")]
    NotAConstant(String),
    #[error("`{name}` is defined more than once")]
    DuplicateName { name: String, first: ByteRange },
    #[error("ordinal @{ordinal} is used more than once")]
    DuplicateOrdinal { ordinal: u16, first: ByteRange },
    #[error("no field `{name}` in `{parent}`")]
    UnknownField {
        name: String,
        parent: String,
        suggestion: Option<String>,
    },
    #[error("no enumerant `{name}` in `{parent}`")]
    UnknownEnumerant {
        name: String,
        parent: String,
        suggestion: Option<String>,
    },
}

impl Error {
    /// The canonical path of the module that the error's range points into.
    /// This is `None` for errors raised while parsing a lone source text.
    pub fn module(&self) -> Option<&str> {
        match self {
            Error::Lex(_) => None,
            Error::Syntax(error) => error.module.as_deref(),
            Error::Import(error) => Some(&error.importer),
            Error::Resolution(error) => Some(&error.module),
        }
    }

    pub fn range(&self) -> ByteRange {
        match self {
            Error::Lex(error) => error.range,
            Error::Syntax(error) => error.range,
            Error::Import(error) => error.range,
            Error::Resolution(error) => error.range,
        }
    }

    /// Attribute an error raised by the parser to a module.
    pub(crate) fn in_module(self, module: &str) -> Error {
        match self {
            Error::Syntax(SyntaxError {
                module: None,
                range,
                kind,
            }) => Error::Syntax(SyntaxError {
                module: Some(module.to_owned()),
                range,
                kind,
            }),
            error => error,
        }
    }

    pub fn to_diagnostic<FileId: Copy>(&self, file_id: FileId) -> Diagnostic<FileId> {
        let primary_label = |range: &ByteRange| Label::primary(file_id, *range);
        let secondary_label = |range: &ByteRange| Label::secondary(file_id, *range);

        match self {
            Error::Lex(LexError { range, kind }) => Diagnostic::error()
                .with_message(kind.to_string())
                .with_labels(vec![primary_label(range)]),
            Error::Syntax(SyntaxError { range, kind, .. }) => {
                let diagnostic = Diagnostic::error()
                    .with_message(kind.to_string())
                    .with_labels(vec![primary_label(range)]);
                match kind {
                    SyntaxErrorKind::SingleQuotedText => diagnostic
                        .with_notes(vec!["help: replace the single quotes with `\"`".to_owned()]),
                    SyntaxErrorKind::ExpectedKeyword(found) => match split_keyword(found) {
                        Some((keyword, rest)) => diagnostic.with_notes(vec![format!(
                            "help: add a space between `{keyword}` and `{rest}`"
                        )]),
                        None => diagnostic,
                    },
                    _ => diagnostic,
                }
            }
            Error::Import(ImportError {
                range, path, kind, ..
            }) => {
                let diagnostic = Diagnostic::error()
                    .with_message(format!("cannot import `{path}`"))
                    .with_labels(vec![primary_label(range).with_message("imported here")]);
                match kind {
                    ImportErrorKind::NoImportSource => diagnostic
                        .with_notes(vec!["imports cannot be loaded in this context".to_owned()]),
                    ImportErrorKind::NotFound => {
                        diagnostic.with_notes(vec![format!("no schema found for `{path}`")])
                    }
                    ImportErrorKind::Parse(error) => diagnostic
                        .with_notes(vec![format!("while parsing `{path}`: {error}")]),
                }
            }
            Error::Resolution(ResolutionError { range, kind, .. }) => {
                let diagnostic = Diagnostic::error().with_message(kind.to_string());
                match kind {
                    ResolutionErrorKind::DuplicateName { first, .. } => {
                        diagnostic.with_labels(vec![
                            primary_label(range).with_message("redefined here"),
                            secondary_label(first).with_message("first defined here"),
                        ])
                    }
                    ResolutionErrorKind::DuplicateOrdinal { first, .. } => {
                        diagnostic.with_labels(vec![
                            primary_label(range).with_message("ordinal reused here"),
                            secondary_label(first).with_message("first used here"),
                        ])
                    }
                    ResolutionErrorKind::UnknownField { suggestion, .. }
                    | ResolutionErrorKind::UnknownEnumerant { suggestion, .. } => diagnostic
                        .with_labels(vec![primary_label(range)])
                        .with_notes(match suggestion {
                            Some(suggestion) => vec![format!("help: did you mean `{suggestion}`?")],
                            None => Vec::new(),
                        }),
                    _ => diagnostic.with_labels(vec![primary_label(range)]),
                }
            }
        }
    }
}

/// Split a name like `structFoo` into a keyword and the rest of the name.
fn split_keyword(name: &str) -> Option<(&str, &str)> {
    crate::syntax::lexer::KEYWORDS
        .iter()
        .filter_map(|keyword| Some((*keyword, name.strip_prefix(keyword)?)))
        .find(|(_, rest)| !rest.is_empty())
}

/// The candidate closest to `name`, if any is close enough to be a plausible
/// misspelling.
pub(crate) fn suggest_name<'a>(
    name: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> Option<String> {
    candidates
        .map(|candidate| (levenshtein::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= usize::max(2, name.len() / 3))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_owned())
}
