//! A recursive descent parser for schema files.
//!
//! The parser stops at the first error. It performs no name binding at all:
//! names are recorded exactly as written.

use crate::literal::{self, NumericLimits, Number, Shape};
use crate::reporting::{Error, SyntaxError, SyntaxErrorKind};
use crate::source::{BytePos, ByteRange};
use crate::syntax::lexer::{self, Spanned, Token};
use crate::syntax::{
    Annotation, AnnotationApp, AnnotationTarget, Const, Decl, Enum, Enumerant, Field, FileId,
    Group, Ident, ImportPath, Interface, InterfaceMember, Literal, Member, Method, Module,
    Ordinal, Param, Path, Struct, TypeRef, Union, UsingAlias, UsingImport,
};

pub fn parse_module(source: &str) -> Result<Module, Error> {
    let tokens = lexer::tokens(source).collect::<Result<Vec<_>, _>>()?;
    let mut parser = Parser::new(tokens, source.len() as BytePos);
    parser.module()
}

/// The deepest nesting of list and struct literals that will be parsed.
const MAX_LITERAL_DEPTH: usize = 64;

struct Parser<'source> {
    tokens: Vec<Spanned<Token<'source>, BytePos>>,
    cursor: usize,
    eof: BytePos,
    literal_depth: usize,
}

impl<'source> Parser<'source> {
    fn new(tokens: Vec<Spanned<Token<'source>, BytePos>>, eof: BytePos) -> Parser<'source> {
        Parser {
            tokens,
            cursor: 0,
            eof,
            literal_depth: 0,
        }
    }

    fn peek(&self) -> Option<Token<'source>> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<Token<'source>> {
        self.tokens.get(self.cursor + n).map(|(_, token, _)| *token)
    }

    fn peek_range(&self) -> ByteRange {
        match self.tokens.get(self.cursor) {
            Some((start, _, end)) => ByteRange::new(*start, *end),
            None => ByteRange::empty(self.eof),
        }
    }

    fn bump(&mut self) -> ByteRange {
        let range = self.peek_range();
        self.cursor = usize::min(self.cursor + 1, self.tokens.len());
        range
    }

    /// Consume the next token if it is `token`.
    fn eat(&mut self, token: Token<'source>) -> Option<ByteRange> {
        match self.peek() {
            Some(next) if next == token => Some(self.bump()),
            _ => None,
        }
    }

    fn expect(&mut self, token: Token<'source>) -> Result<ByteRange, Error> {
        match self.eat(token) {
            Some(range) => Ok(range),
            None => self.unexpected(token.description()),
        }
    }

    fn error<T>(&self, range: ByteRange, kind: SyntaxErrorKind) -> Result<T, Error> {
        Err(Error::Syntax(SyntaxError {
            module: None,
            range,
            kind,
        }))
    }

    /// Report the next token as unexpected.
    fn unexpected<T>(&self, expected: &'static str) -> Result<T, Error> {
        let range = self.peek_range();
        match self.peek() {
            Some(Token::SingleQuotedText(_)) => self.error(range, SyntaxErrorKind::SingleQuotedText),
            Some(token) => self.error(
                range,
                SyntaxErrorKind::UnexpectedToken {
                    found: token.description(),
                    expected,
                },
            ),
            None => self.error(range, SyntaxErrorKind::UnexpectedEndOfInput { expected }),
        }
    }

    fn expect_name(&mut self) -> Result<Ident, Error> {
        match self.peek() {
            Some(Token::Name(name)) => Ok(Ident {
                range: self.bump(),
                name: name.to_owned(),
            }),
            _ => self.unexpected("name"),
        }
    }

    fn expect_number(&mut self) -> Result<(ByteRange, &'source str), Error> {
        match self.peek() {
            Some(Token::NumberLiteral(text)) => Ok((self.bump(), text)),
            _ => self.unexpected("number literal"),
        }
    }

    fn expect_text(&mut self) -> Result<(ByteRange, String), Error> {
        match self.peek() {
            Some(Token::TextLiteral(text)) => {
                let range = self.bump();
                match unescape(text) {
                    Ok(text) => Ok((range, text)),
                    Err(escape) => self.error(range, SyntaxErrorKind::InvalidEscape(escape)),
                }
            }
            _ => self.unexpected("text literal"),
        }
    }

    /// Decode an integer that must fit in `limits`, such as an ordinal or a
    /// file id.
    fn integer<T: TryFrom<i128>>(
        &self,
        range: ByteRange,
        text: &str,
        limits: &NumericLimits,
    ) -> Result<T, Error> {
        let out_of_range = || {
            self.error(
                range,
                SyntaxErrorKind::InvalidNumericLiteral(literal::LiteralError::OutOfRange(
                    limits.name(),
                )),
            )
        };

        match literal::parse_number(text, limits) {
            Ok(Number::Integer(value)) => T::try_from(value).or_else(|_| out_of_range()),
            Ok(Number::Float(_)) => out_of_range(),
            Err(error) => self.error(range, SyntaxErrorKind::InvalidNumericLiteral(error)),
        }
    }

    fn module(&mut self) -> Result<Module, Error> {
        let id = self.file_id()?;
        let mut annotations = Vec::new();
        let mut decls = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::Dollar => {
                    annotations.push(self.annotation_app()?);
                    self.expect(Token::Semicolon)?;
                }
                Token::Name(name) => {
                    let kind = SyntaxErrorKind::ExpectedKeyword(name.to_owned());
                    return self.error(self.peek_range(), kind);
                }
                _ => match self.decl()? {
                    Some(decl) => decls.push(decl),
                    None => return self.unexpected("declaration"),
                },
            }
        }

        Ok(Module {
            id,
            annotations,
            decls,
        })
    }

    /// The mandatory `@0x...;` statement at the start of every file.
    fn file_id(&mut self) -> Result<FileId, Error> {
        let start = match self.eat(Token::At) {
            Some(range) => range,
            None => return self.error(self.peek_range(), SyntaxErrorKind::MissingFileId),
        };
        let (range, text) = self.expect_number()?;
        let value = self.integer(range, text, &NumericLimits::UINT64)?;
        let end = self.expect(Token::Semicolon)?;

        Ok(FileId {
            range: start.merge(end),
            value,
        })
    }

    fn ordinal(&mut self) -> Result<Ordinal, Error> {
        let start = self.expect(Token::At)?;
        let (range, text) = self.expect_number()?;
        let value = self.integer(range, text, &NumericLimits::UINT16)?;

        Ok(Ordinal {
            range: start.merge(range),
            value,
        })
    }

    /// Parse a declaration, if the next token starts one.
    fn decl(&mut self) -> Result<Option<Decl>, Error> {
        let decl = match self.peek() {
            Some(Token::KeywordUsing) => self.using()?,
            Some(Token::KeywordConst) => Decl::Const(self.const_decl()?),
            Some(Token::KeywordStruct) => Decl::Struct(self.struct_decl()?),
            Some(Token::KeywordEnum) => Decl::Enum(self.enum_decl()?),
            Some(Token::KeywordInterface) => Decl::Interface(self.interface_decl()?),
            Some(Token::KeywordAnnotation) => Decl::Annotation(self.annotation_decl()?),
            _ => return Ok(None),
        };
        Ok(Some(decl))
    }

    fn using(&mut self) -> Result<Decl, Error> {
        let start = self.expect(Token::KeywordUsing)?;

        if self.peek() == Some(Token::KeywordImport) {
            let (import, path) = self.import_target()?;
            let end = self.expect(Token::Semicolon)?;
            return Ok(Decl::UsingImport(UsingImport {
                range: start.merge(end),
                name: None,
                import,
                path,
            }));
        }

        let first = self.expect_name()?;

        if self.eat(Token::Equals).is_none() {
            let target = self.path_from(first)?;
            let end = self.expect(Token::Semicolon)?;
            return Ok(Decl::UsingAlias(UsingAlias {
                range: start.merge(end),
                name: None,
                target,
            }));
        }

        if self.peek() == Some(Token::KeywordImport) {
            let (import, path) = self.import_target()?;
            let end = self.expect(Token::Semicolon)?;
            return Ok(Decl::UsingImport(UsingImport {
                range: start.merge(end),
                name: Some(first),
                import,
                path,
            }));
        }

        let target = self.path()?;
        let end = self.expect(Token::Semicolon)?;
        Ok(Decl::UsingAlias(UsingAlias {
            range: start.merge(end),
            name: Some(first),
            target,
        }))
    }

    /// `import "path"`, optionally followed by `.Name.Name...`.
    fn import_target(&mut self) -> Result<(ImportPath, Vec<Ident>), Error> {
        self.expect(Token::KeywordImport)?;
        let (range, path) = self.expect_text()?;
        let mut segments = Vec::new();
        while self.eat(Token::FullStop).is_some() {
            segments.push(self.expect_name()?);
        }
        Ok((ImportPath { range, path }, segments))
    }

    fn path(&mut self) -> Result<Path, Error> {
        let first = self.expect_name()?;
        self.path_from(first)
    }

    fn path_from(&mut self, first: Ident) -> Result<Path, Error> {
        let mut range = first.range;
        let mut segments = vec![first];
        while self.eat(Token::FullStop).is_some() {
            let segment = self.expect_name()?;
            range = range.merge(segment.range);
            segments.push(segment);
        }
        Ok(Path { range, segments })
    }

    fn const_decl(&mut self) -> Result<Const, Error> {
        let start = self.expect(Token::KeywordConst)?;
        let name = self.expect_name()?;
        self.expect(Token::Colon)?;
        let r#type = self.type_ref()?;
        self.expect(Token::Equals)?;
        let value = self.literal()?;
        let annotations = self.annotations()?;
        let end = self.expect(Token::Semicolon)?;

        Ok(Const {
            range: start.merge(end),
            name,
            r#type,
            value,
            annotations,
        })
    }

    fn struct_decl(&mut self) -> Result<Struct, Error> {
        let start = self.expect(Token::KeywordStruct)?;
        let name = self.expect_name()?;
        let annotations = self.annotations()?;
        let (members, end) = self.members()?;

        Ok(Struct {
            range: start.merge(end),
            name,
            annotations,
            members,
        })
    }

    /// The braced body of a struct, union or group.
    fn members(&mut self) -> Result<(Vec<Member>, ByteRange), Error> {
        self.expect(Token::OpenBrace)?;
        let mut members = Vec::new();
        let mut seen_anonymous_union = false;

        loop {
            match self.peek() {
                Some(Token::CloseBrace) => return Ok((members, self.bump())),
                Some(Token::KeywordUnion) => {
                    let start = self.peek_range();
                    let union = self.union_body(start, None, None)?;
                    if seen_anonymous_union {
                        return self.error(union.range, SyntaxErrorKind::DuplicateAnonymousUnion);
                    }
                    seen_anonymous_union = true;
                    members.push(Member::Union(union));
                }
                Some(Token::Name(_)) => members.push(self.named_member()?),
                Some(_) => match self.decl()? {
                    Some(decl) => members.push(Member::Decl(decl)),
                    None => return self.unexpected("field or declaration"),
                },
                None => return self.unexpected(Token::CloseBrace.description()),
            }
        }
    }

    /// A field, a named union or a group.
    fn named_member(&mut self) -> Result<Member, Error> {
        let name = self.expect_name()?;

        match self.peek() {
            Some(Token::At) => {
                let ordinal = self.ordinal()?;
                self.expect(Token::Colon)?;
                if self.peek() == Some(Token::KeywordUnion) {
                    let union = self.union_body(name.range, Some(name), Some(ordinal))?;
                    return Ok(Member::Union(union));
                }
                self.field(name, ordinal).map(Member::Field)
            }
            Some(Token::Colon) => {
                self.bump();
                match self.peek() {
                    Some(Token::KeywordUnion) => {
                        let union = self.union_body(name.range, Some(name), None)?;
                        Ok(Member::Union(union))
                    }
                    Some(Token::KeywordGroup) => {
                        self.bump();
                        let annotations = self.annotations()?;
                        let (members, end) = self.members()?;
                        Ok(Member::Group(Group {
                            range: name.range.merge(end),
                            name,
                            annotations,
                            members,
                        }))
                    }
                    _ => self.unexpected("`union` or `group`"),
                }
            }
            _ => self.unexpected("`@` or `:`"),
        }
    }

    fn field(&mut self, name: Ident, ordinal: Ordinal) -> Result<Field, Error> {
        let r#type = self.type_ref()?;
        let default = match self.eat(Token::Equals) {
            Some(_) => Some(self.literal()?),
            None => None,
        };
        let annotations = self.annotations()?;
        let end = self.expect(Token::Semicolon)?;

        Ok(Field {
            range: name.range.merge(end),
            name,
            ordinal,
            r#type,
            default,
            annotations,
        })
    }

    fn union_body(
        &mut self,
        start: ByteRange,
        name: Option<Ident>,
        ordinal: Option<Ordinal>,
    ) -> Result<Union, Error> {
        self.expect(Token::KeywordUnion)?;
        let annotations = self.annotations()?;
        let (members, end) = self.members()?;

        Ok(Union {
            range: start.merge(end),
            name,
            ordinal,
            annotations,
            members,
        })
    }

    fn enum_decl(&mut self) -> Result<Enum, Error> {
        let start = self.expect(Token::KeywordEnum)?;
        let name = self.expect_name()?;
        let annotations = self.annotations()?;
        self.expect(Token::OpenBrace)?;

        let mut enumerants = Vec::new();
        let end = loop {
            if let Some(end) = self.eat(Token::CloseBrace) {
                break end;
            }
            let name = self.expect_name()?;
            let ordinal = self.ordinal()?;
            let annotations = self.annotations()?;
            let end = self.expect(Token::Semicolon)?;
            enumerants.push(Enumerant {
                range: name.range.merge(end),
                name,
                ordinal,
                annotations,
            });
        };

        Ok(Enum {
            range: start.merge(end),
            name,
            annotations,
            enumerants,
        })
    }

    fn interface_decl(&mut self) -> Result<Interface, Error> {
        let start = self.expect(Token::KeywordInterface)?;
        let name = self.expect_name()?;

        let mut extends = Vec::new();
        if self.eat(Token::KeywordExtends).is_some() {
            self.expect(Token::OpenParen)?;
            extends.push(self.type_ref()?);
            while self.eat(Token::Comma).is_some() {
                extends.push(self.type_ref()?);
            }
            self.expect(Token::CloseParen)?;
        }

        let annotations = self.annotations()?;
        self.expect(Token::OpenBrace)?;

        let mut members = Vec::new();
        let end = loop {
            match self.peek() {
                Some(Token::CloseBrace) => break self.bump(),
                Some(Token::Name(_)) => members.push(InterfaceMember::Method(self.method()?)),
                Some(_) => match self.decl()? {
                    Some(decl) => members.push(InterfaceMember::Decl(decl)),
                    None => return self.unexpected("method or declaration"),
                },
                None => return self.unexpected(Token::CloseBrace.description()),
            }
        };

        Ok(Interface {
            range: start.merge(end),
            name,
            extends,
            annotations,
            members,
        })
    }

    fn method(&mut self) -> Result<Method, Error> {
        let name = self.expect_name()?;
        let ordinal = self.ordinal()?;
        let params = self.params()?;
        let results = match self.eat(Token::HyphenGreater) {
            Some(_) => Some(self.params()?),
            None => None,
        };
        let annotations = self.annotations()?;
        let end = self.expect(Token::Semicolon)?;

        Ok(Method {
            range: name.range.merge(end),
            name,
            ordinal,
            params,
            results,
            annotations,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, Error> {
        self.expect(Token::OpenParen)?;
        let mut params = Vec::new();
        if self.eat(Token::CloseParen).is_some() {
            return Ok(params);
        }

        loop {
            let name = self.expect_name()?;
            self.expect(Token::Colon)?;
            let r#type = self.type_ref()?;
            let default = match self.eat(Token::Equals) {
                Some(_) => Some(self.literal()?),
                None => None,
            };
            let annotations = self.annotations()?;
            params.push(Param {
                range: name.range.merge(r#type.range()),
                name,
                r#type,
                default,
                annotations,
            });

            if self.eat(Token::Comma).is_none() {
                self.expect(Token::CloseParen)?;
                return Ok(params);
            }
        }
    }

    fn annotation_decl(&mut self) -> Result<Annotation, Error> {
        let start = self.expect(Token::KeywordAnnotation)?;
        let name = self.expect_name()?;

        self.expect(Token::OpenParen)?;
        let mut targets = vec![self.annotation_target()?];
        while self.eat(Token::Comma).is_some() {
            targets.push(self.annotation_target()?);
        }
        self.expect(Token::CloseParen)?;

        self.expect(Token::Colon)?;
        let r#type = self.type_ref()?;
        let annotations = self.annotations()?;
        let end = self.expect(Token::Semicolon)?;

        Ok(Annotation {
            range: start.merge(end),
            name,
            targets,
            r#type,
            annotations,
        })
    }

    fn annotation_target(&mut self) -> Result<(ByteRange, AnnotationTarget), Error> {
        let target = match self.peek() {
            Some(Token::Star) => AnnotationTarget::All,
            Some(Token::KeywordConst) => AnnotationTarget::Const,
            Some(Token::KeywordEnum) => AnnotationTarget::Enum,
            Some(Token::KeywordStruct) => AnnotationTarget::Struct,
            Some(Token::KeywordUnion) => AnnotationTarget::Union,
            Some(Token::KeywordGroup) => AnnotationTarget::Group,
            Some(Token::KeywordInterface) => AnnotationTarget::Interface,
            Some(Token::KeywordAnnotation) => AnnotationTarget::Annotation,
            Some(Token::Name(name)) => match AnnotationTarget::from_name(name) {
                Some(target) => target,
                None => {
                    let kind = SyntaxErrorKind::UnknownAnnotationTarget(name.to_owned());
                    return self.error(self.peek_range(), kind);
                }
            },
            _ => return self.unexpected("annotation target"),
        };
        Ok((self.bump(), target))
    }

    fn annotations(&mut self) -> Result<Vec<AnnotationApp>, Error> {
        let mut annotations = Vec::new();
        while self.peek() == Some(Token::Dollar) {
            annotations.push(self.annotation_app()?);
        }
        Ok(annotations)
    }

    /// `$name`, `$name(value)`, `$name()` or `$name(field = value, ...)`.
    fn annotation_app(&mut self) -> Result<AnnotationApp, Error> {
        let start = self.expect(Token::Dollar)?;
        let name = self.path()?;

        let open = match self.eat(Token::OpenParen) {
            Some(open) => open,
            None => {
                return Ok(AnnotationApp {
                    range: start.merge(name.range),
                    name,
                    value: None,
                })
            }
        };

        let value = match (self.peek(), self.peek_nth(1)) {
            (Some(Token::CloseParen), _) => {
                let close = self.bump();
                return Ok(AnnotationApp {
                    range: start.merge(close),
                    name,
                    value: Some(Literal::Void(open.merge(close))),
                });
            }
            (Some(Token::Name(_)), Some(Token::Equals)) => {
                let fields = self.struct_literal_fields()?;
                let close = self.expect(Token::CloseParen)?;
                return Ok(AnnotationApp {
                    range: start.merge(close),
                    name,
                    value: Some(Literal::Struct(open.merge(close), fields)),
                });
            }
            (_, _) => self.literal()?,
        };
        let close = self.expect(Token::CloseParen)?;

        Ok(AnnotationApp {
            range: start.merge(close),
            name,
            value: Some(value),
        })
    }

    fn type_ref(&mut self) -> Result<TypeRef, Error> {
        if self.peek() == Some(Token::KeywordImport) {
            let start = self.peek_range();
            let (import, segments) = self.import_target()?;
            let end = segments.last().map_or(import.range, |segment| segment.range);
            return Ok(TypeRef::ImportedName(start.merge(end), import, segments));
        }

        let path = self.path()?;
        if self.eat(Token::OpenParen).is_none() {
            return Ok(TypeRef::Named(path));
        }

        let mut params = vec![self.type_ref()?];
        while self.eat(Token::Comma).is_some() {
            params.push(self.type_ref()?);
        }
        let end = self.expect(Token::CloseParen)?;

        let is_list = matches!(path.segments.as_slice(), [segment] if segment.name == "List");
        match (is_list, params.pop(), params.is_empty()) {
            (true, Some(element), true) => Ok(TypeRef::List(
                path.range.merge(end),
                Box::new(element),
            )),
            (_, _, _) => self.error(
                path.range.merge(end),
                SyntaxErrorKind::UnexpectedTypeParameters(path.to_string()),
            ),
        }
    }

    fn literal(&mut self) -> Result<Literal, Error> {
        let start = self.peek_range();

        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                let (range, text) = self.expect_number()?;
                self.number_literal(start.merge(range), format!("-{text}"))
            }
            Some(Token::NumberLiteral(text)) => {
                self.bump();
                self.number_literal(start, text.to_owned())
            }
            Some(Token::TextLiteral(_)) => {
                let (range, text) = self.expect_text()?;
                Ok(Literal::Text(range, text))
            }
            Some(Token::KeywordTrue) => Ok(Literal::Bool(self.bump(), true)),
            Some(Token::KeywordFalse) => Ok(Literal::Bool(self.bump(), false)),
            Some(Token::KeywordVoid) => Ok(Literal::Void(self.bump())),
            Some(Token::Name(_)) => Ok(Literal::Name(self.path()?)),
            Some(Token::OpenBracket) | Some(Token::OpenParen) => {
                if self.literal_depth >= MAX_LITERAL_DEPTH {
                    return self.error(start, SyntaxErrorKind::LiteralTooDeep);
                }
                self.literal_depth += 1;
                let literal = self.compound_literal(start);
                self.literal_depth -= 1;
                literal
            }
            _ => self.unexpected("literal"),
        }
    }

    /// A list or struct literal, starting at the opening delimiter.
    fn compound_literal(&mut self, start: ByteRange) -> Result<Literal, Error> {
        let open = self.peek();
        self.bump();
        match open {
            Some(Token::OpenBracket) => {
                let mut elements = Vec::new();
                while self.peek() != Some(Token::CloseBracket) {
                    elements.push(self.literal()?);
                    if self.eat(Token::Comma).is_none() {
                        break;
                    }
                }
                let end = self.expect(Token::CloseBracket)?;
                Ok(Literal::List(start.merge(end), elements))
            }
            _ => {
                let fields = self.struct_literal_fields()?;
                let end = self.expect(Token::CloseParen)?;
                Ok(Literal::Struct(start.merge(end), fields))
            }
        }
    }

    /// The `name = value, ...` pairs of a struct literal, up to but not
    /// including the closing parenthesis.
    fn struct_literal_fields(&mut self) -> Result<Vec<(Ident, Literal)>, Error> {
        let mut fields = Vec::new();
        while self.peek() != Some(Token::CloseParen) {
            let name = self.expect_name()?;
            self.expect(Token::Equals)?;
            fields.push((name, self.literal()?));
            if self.eat(Token::Comma).is_none() {
                break;
            }
        }
        Ok(fields)
    }

    /// Check that a numeric literal can be decoded by at least the widest
    /// type of its shape. The exact type is only checked once it is resolved.
    fn number_literal(&self, range: ByteRange, text: String) -> Result<Literal, Error> {
        let checked = match literal::classify(&text) {
            Ok(Shape::Float) => {
                literal::try_parse_decimal_or_float(&text, &NumericLimits::FLOAT64).map(|_| true)
            }
            Ok(Shape::Integer(_)) => {
                let limits = match text.starts_with('-') {
                    true => NumericLimits::INT64,
                    false => NumericLimits::UINT64,
                };
                literal::parse_number(&text, &limits).map(|_| false)
            }
            Err(error) => Err(error),
        };

        match checked {
            Ok(true) => Ok(Literal::Float(range, text)),
            Ok(false) => Ok(Literal::Int(range, text)),
            Err(error) => self.error(range, SyntaxErrorKind::InvalidNumericLiteral(error)),
        }
    }
}

/// Replace the escape sequences of a text literal. On failure, returns the
/// offending escape sequence.
fn unescape(text: &str) -> Result<String, String> {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some('t') => output.push('\t'),
            Some('0') => output.push('\0'),
            Some(c @ ('\\' | '"' | '\'')) => output.push(c),
            Some('x') => {
                let digits = chars.by_ref().take(2).collect::<String>();
                match u8::from_str_radix(&digits, 16) {
                    Ok(byte) if digits.len() == 2 && byte.is_ascii() => output.push(char::from(byte)),
                    _ => return Err(format!("\\x{digits}")),
                }
            }
            Some(c) => return Err(format!("\\{c}")),
            None => return Err("\\".to_owned()),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::LexErrorKind;

    fn syntax_error(source: &str) -> SyntaxErrorKind {
        match parse_module(source) {
            Err(Error::Syntax(error)) => error.kind,
            result => panic!("expected a syntax error, found {result:?}"),
        }
    }

    fn single_decl(source: &str) -> Decl {
        let mut module = parse_module(source).unwrap();
        assert_eq!(module.decls.len(), 1);
        module.decls.remove(0)
    }

    #[test]
    fn full_grammar() {
        let module = parse_module(include_str!("../../schemas/grammar.capnp")).unwrap();
        assert_eq!(module.id.value, 0xdbb9ad1f14bf0b36);
        assert_eq!(module.annotations.len(), 3);
        assert_eq!(module.usings().count(), 2);
        assert_eq!(module.decls.len(), 17);
    }

    #[test]
    fn decimal_file_id() {
        let module = parse_module("@123;").unwrap();
        assert_eq!(module.id.value, 123);
        assert!(module.decls.is_empty());
    }

    #[test]
    fn missing_file_id() {
        assert_eq!(
            syntax_error("struct Foo {}"),
            SyntaxErrorKind::MissingFileId
        );
        assert_eq!(syntax_error(""), SyntaxErrorKind::MissingFileId);
    }

    #[test]
    fn keyword_run_into_name() {
        assert_eq!(
            syntax_error("@0x1;\nstructFoobar{}"),
            SyntaxErrorKind::ExpectedKeyword("structFoobar".to_owned()),
        );
    }

    #[test]
    fn single_quoted_text() {
        assert_eq!(
            syntax_error("@0x1;\nconst foo :Text = 'foobar';"),
            SyntaxErrorKind::SingleQuotedText,
        );
        let decl = single_decl("@0x1;\nconst foo :Text = \"foobar\";");
        assert!(matches!(
            decl,
            Decl::Const(Const { value: Literal::Text(_, text), .. }) if text == "foobar"
        ));
    }

    #[test]
    fn hex_prefix_case() {
        assert!(matches!(
            syntax_error("@0x1;\nconst foo :Int32 = 0X123;"),
            SyntaxErrorKind::InvalidNumericLiteral(literal::LiteralError::UppercaseHexPrefix),
        ));
        assert!(matches!(
            syntax_error("@0X1;"),
            SyntaxErrorKind::InvalidNumericLiteral(literal::LiteralError::UppercaseHexPrefix),
        ));
        let decl = single_decl("@0x1;\nconst foo :Int32 = 0x123;");
        assert!(matches!(
            decl,
            Decl::Const(Const { value: Literal::Int(_, text), .. }) if text == "0x123"
        ));
    }

    #[test]
    fn ordinals_are_16_bit() {
        assert!(matches!(
            syntax_error("@0x1;\nstruct Foo { a @65536 :Int32; }"),
            SyntaxErrorKind::InvalidNumericLiteral(literal::LiteralError::OutOfRange("UInt16")),
        ));
        let decl = single_decl("@0x1;\nstruct Foo { a @0x1 :Int32; }");
        match decl {
            Decl::Struct(Struct { members, .. }) => match members.as_slice() {
                [Member::Field(field)] => assert_eq!(field.ordinal.value, 1),
                members => panic!("unexpected members: {members:?}"),
            },
            decl => panic!("unexpected declaration: {decl:?}"),
        }
    }

    #[test]
    fn using_forms() {
        let module = parse_module(
            r#"@0x1;
            using Foo;
            using Foo.Bar;
            using Baz = Foo.Bar;
            using import "foo.capnp".Qux;
            using import "foo.capnp";
            using Lib = import "lib.capnp";
            "#,
        )
        .unwrap();

        let bindings = module
            .decls
            .iter()
            .map(|decl| decl.binding().map(|name| name.name.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            bindings,
            [Some("Foo"), Some("Bar"), Some("Baz"), Some("Qux"), None, Some("Lib")],
        );
        assert!(matches!(
            &module.decls[5],
            Decl::UsingImport(UsingImport { import, path, .. })
                if import.path == "lib.capnp" && path.is_empty()
        ));
    }

    #[test]
    fn nested_list_type_and_default() {
        let decl = single_decl(
            r#"@0x1;
            struct Foo { names @0 :List(List(Text)) = [["foo", "bar"], ["baz"]]; }"#,
        );
        let field = match decl {
            Decl::Struct(Struct { mut members, .. }) => match members.remove(0) {
                Member::Field(field) => field,
                member => panic!("unexpected member: {member:?}"),
            },
            decl => panic!("unexpected declaration: {decl:?}"),
        };

        assert!(matches!(
            &field.r#type,
            TypeRef::List(_, element) if matches!(**element, TypeRef::List(_, _))
        ));
        match field.default {
            Some(Literal::List(_, rows)) => {
                assert_eq!(rows.len(), 2);
                assert!(matches!(&rows[0], Literal::List(_, items) if items.len() == 2));
            }
            default => panic!("unexpected default: {default:?}"),
        }
    }

    #[test]
    fn deeply_nested_literals() {
        let nested = |depth: usize| {
            format!("@0x1; const c :Int32 = {}1{};", "[".repeat(depth), "]".repeat(depth))
        };
        assert!(parse_module(&nested(MAX_LITERAL_DEPTH)).is_ok());
        assert_eq!(syntax_error(&nested(1000)), SyntaxErrorKind::LiteralTooDeep);

        let structs = format!("@0x1; const c :Foo = {}(){};", "(a = ".repeat(600), ")".repeat(600));
        assert_eq!(syntax_error(&structs), SyntaxErrorKind::LiteralTooDeep);
    }

    #[test]
    fn unsupported_type_parameters() {
        assert_eq!(
            syntax_error("@0x1;\nstruct Foo { a @0 :Map(Text, Text); }"),
            SyntaxErrorKind::UnexpectedTypeParameters("Map".to_owned()),
        );
    }

    #[test]
    fn struct_members() {
        let decl = single_decl(
            r#"@0x1;
            struct Foo $a("b") {
              union { x @0 :Void; y @1 :Text; }
              named :union { z @2 :Int32; }
              withOrdinal @3 :union { w @4 :Int32; }
              g :group { h @5 :Int32; }
              idx @6 :Bar = ( idx = 123 );
              using T = Bar;
              enum E { a @0; b @1 $c; }
            }"#,
        );
        let Decl::Struct(decl) = decl else {
            panic!("expected a struct");
        };
        assert_eq!(decl.annotations.len(), 1);
        assert!(matches!(&decl.members[0], Member::Union(Union { name: None, .. })));
        assert!(matches!(
            &decl.members[2],
            Member::Union(Union { ordinal: Some(Ordinal { value: 3, .. }), .. })
        ));
        assert!(matches!(&decl.members[3], Member::Group(_)));
        assert!(matches!(
            &decl.members[4],
            Member::Field(Field { default: Some(Literal::Struct(_, fields)), .. }) if fields.len() == 1
        ));
        assert!(matches!(&decl.members[5], Member::Decl(Decl::UsingAlias(_))));
        assert!(matches!(&decl.members[6], Member::Decl(Decl::Enum(_))));
    }

    #[test]
    fn duplicate_anonymous_union() {
        assert_eq!(
            syntax_error("@0x1;\nstruct Foo { union { a @0 :Void; } union { b @1 :Void; } }"),
            SyntaxErrorKind::DuplicateAnonymousUnion,
        );
    }

    #[test]
    fn interfaces() {
        let decl = single_decl(
            r#"@0x1;
            interface Directory extends(Node, Other.Base) $x(1) {
              list @0 () -> (list :List(Entry));
              struct Entry { name @0 :Text; }
              create @1 (name :Text $boo, mode :UInt8 = 0) -> (file :File);
              delete @4 (name :Text);
            }"#,
        );
        let Decl::Interface(interface) = decl else {
            panic!("expected an interface");
        };
        assert_eq!(interface.extends.len(), 2);
        let methods = interface
            .members
            .iter()
            .filter_map(|member| match member {
                InterfaceMember::Method(method) => Some(method),
                InterfaceMember::Decl(_) => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(methods.len(), 3);
        assert_eq!(methods[1].params.len(), 2);
        assert!(methods[2].results.is_none());
    }

    #[test]
    fn annotation_declarations_and_applications() {
        let module = parse_module(
            r#"@0x1;
            annotation baz(*) :Int32;
            annotation qux(file, field, struct, enumerant) :Text;
            $file;
            $file2(12);
            $x ();
            $y(a = 1, b = "c");
            const foo :Int32 = 123 $zz();
            "#,
        )
        .unwrap();

        assert_eq!(module.annotations.len(), 4);
        assert_eq!(module.annotations[0].value, None);
        assert!(matches!(module.annotations[1].value, Some(Literal::Int(_, _))));
        assert!(matches!(module.annotations[2].value, Some(Literal::Void(_))));
        assert!(matches!(module.annotations[3].value, Some(Literal::Struct(_, _))));
        assert!(matches!(
            &module.decls[1],
            Decl::Annotation(Annotation { targets, .. }) if targets.len() == 4
        ));
    }

    #[test]
    fn unknown_annotation_target() {
        assert_eq!(
            syntax_error("@0x1;\nannotation foo(everything) :Text;"),
            SyntaxErrorKind::UnknownAnnotationTarget("everything".to_owned()),
        );
    }

    #[test]
    fn inline_import_type() {
        let decl = single_decl("@0x1;\nstruct Foo { bar @0 :import \"bar.capnp\".Baz; }");
        let Decl::Struct(Struct { members, .. }) = decl else {
            panic!("expected a struct");
        };
        assert!(matches!(
            &members[0],
            Member::Field(Field { r#type: TypeRef::ImportedName(_, import, path), .. })
                if import.path == "bar.capnp" && path.len() == 1
        ));
    }

    #[test]
    fn escapes() {
        assert_eq!(unescape(r#"a\tb\"c\x41"#), Ok("a\tb\"cA".to_owned()));
        assert_eq!(unescape(r"\q"), Err(r"\q".to_owned()));
        assert_eq!(
            syntax_error("@0x1;\nconst foo :Text = \"\\q\";"),
            SyntaxErrorKind::InvalidEscape(r"\q".to_owned()),
        );
    }

    #[test]
    fn unexpected_end_of_input() {
        assert_eq!(
            syntax_error("@0x1;\nstruct Foo {"),
            SyntaxErrorKind::UnexpectedEndOfInput { expected: "`}`" },
        );
    }

    #[test]
    fn lex_errors_abort_parsing() {
        match parse_module("@0x1;\nconst foo :Text = \"abc;") {
            Err(Error::Lex(error)) => {
                assert_eq!(error.kind, LexErrorKind::UnterminatedTextLiteral('"'))
            }
            result => panic!("expected a lex error, found {result:?}"),
        }
    }
}
