use logos::Logos;

use crate::reporting::{LexError, LexErrorKind};
use crate::source::{BytePos, ByteRange, MAX_SOURCE_LEN};

pub const KEYWORDS: &[&str] = &[
    "annotation",
    "const",
    "enum",
    "extends",
    "false",
    "group",
    "import",
    "interface",
    "struct",
    "true",
    "union",
    "using",
    "void",
];

#[derive(Copy, Clone, Debug, PartialEq, Logos)]
pub enum Token<'source> {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name(&'source str),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| &lex.slice()[1..(lex.slice().len() - 1)])]
    TextLiteral(&'source str),
    /// Not a valid literal, but lexed so that the parser can point at it.
    #[regex(r"'([^'\\]|\\.)*'")]
    SingleQuotedText(&'source str),
    #[regex(r"[0-9][a-zA-Z0-9_]*")]
    #[regex(r"[0-9][0-9_]*\.[0-9][a-zA-Z0-9_]*")]
    #[regex(r"[0-9][a-zA-Z0-9_]*[eE][+-][0-9]+")]
    #[regex(r"[0-9][0-9_]*\.[0-9][a-zA-Z0-9_]*[eE][+-][0-9]+")]
    NumberLiteral(&'source str),

    #[token("annotation")]
    KeywordAnnotation,
    #[token("const")]
    KeywordConst,
    #[token("enum")]
    KeywordEnum,
    #[token("extends")]
    KeywordExtends,
    #[token("false")]
    KeywordFalse,
    #[token("group")]
    KeywordGroup,
    #[token("import")]
    KeywordImport,
    #[token("interface")]
    KeywordInterface,
    #[token("struct")]
    KeywordStruct,
    #[token("true")]
    KeywordTrue,
    #[token("union")]
    KeywordUnion,
    #[token("using")]
    KeywordUsing,
    #[token("void")]
    KeywordVoid,

    #[token("@")]
    At,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("$")]
    Dollar,
    #[token("=")]
    Equals,
    #[token(".")]
    FullStop,
    #[token("->")]
    HyphenGreater,
    #[token("-")]
    Minus,
    #[token(";")]
    Semicolon,
    #[token("*")]
    Star,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,

    #[error]
    #[regex(r"\p{Whitespace}", logos::skip)]
    #[regex(r"#[^\n]*", logos::skip)]
    Error,
}

pub type Spanned<Tok, Loc> = (Loc, Tok, Loc);

/// Lex a source string, stopping at the first error.
pub fn tokens(
    source: &str,
) -> impl Iterator<Item = Result<Spanned<Token<'_>, BytePos>, LexError>> {
    assert!(
        source.len() <= MAX_SOURCE_LEN,
        "`source` must be less than 4GiB in length"
    );

    Token::lexer(source).spanned().map(move |(token, range)| {
        let start = range.start as BytePos;
        let end = range.end as BytePos;
        match token {
            Token::Error => {
                let range = ByteRange::new(start, end);
                let kind = match source[range.start() as usize..].chars().next() {
                    Some(quote @ ('"' | '\'')) => LexErrorKind::UnterminatedTextLiteral(quote),
                    Some(found) => LexErrorKind::UnexpectedCharacter(found),
                    None => LexErrorKind::UnexpectedEndOfInput,
                };
                Err(LexError { range, kind })
            }
            token => Ok((start, token, end)),
        }
    })
}

impl<'source> Token<'source> {
    pub fn description(&self) -> &'static str {
        match self {
            Token::Name(_) => "name",
            Token::TextLiteral(_) => "text literal",
            Token::SingleQuotedText(_) => "single quoted text",
            Token::NumberLiteral(_) => "number literal",
            Token::KeywordAnnotation => "`annotation`",
            Token::KeywordConst => "`const`",
            Token::KeywordEnum => "`enum`",
            Token::KeywordExtends => "`extends`",
            Token::KeywordFalse => "`false`",
            Token::KeywordGroup => "`group`",
            Token::KeywordImport => "`import`",
            Token::KeywordInterface => "`interface`",
            Token::KeywordStruct => "`struct`",
            Token::KeywordTrue => "`true`",
            Token::KeywordUnion => "`union`",
            Token::KeywordUsing => "`using`",
            Token::KeywordVoid => "`void`",
            Token::At => "`@`",
            Token::Colon => "`:`",
            Token::Comma => "`,`",
            Token::Dollar => "`$`",
            Token::Equals => "`=`",
            Token::FullStop => "`.`",
            Token::HyphenGreater => "`->`",
            Token::Minus => "`-`",
            Token::Semicolon => "`;`",
            Token::Star => "`*`",
            Token::OpenBrace => "`{`",
            Token::CloseBrace => "`}`",
            Token::OpenBracket => "`[`",
            Token::CloseBracket => "`]`",
            Token::OpenParen => "`(`",
            Token::CloseParen => "`)`",
            Token::Error => "error",
        }
    }
}
