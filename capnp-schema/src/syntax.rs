//! The raw declaration tree produced by the parser.
//!
//! Nothing in this tree is bound to anything else: every type, const and
//! annotation name is kept exactly as it was written, to be resolved later by
//! [`crate::resolve`]. Trees own their data so that they can be resolved any
//! number of times, from any thread.

use std::fmt;

use crate::reporting::Error;
use crate::source::ByteRange;

pub mod lexer;
mod parser;
pub mod pretty;

/// A name as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub range: ByteRange,
    pub name: String,
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A dotted name, like `Foo.Bar.Baz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub range: ByteRange,
    pub segments: Vec<Ident>,
}

impl Path {
    /// The last segment, which names the thing being referred to.
    pub fn last(&self) -> Option<&Ident> {
        self.segments.last()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
        }
        Ok(())
    }
}

/// The quoted path of an `import` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPath {
    pub range: ByteRange,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordinal {
    pub range: ByteRange,
    pub value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileId {
    pub range: ByteRange,
    pub value: u64,
}

/// One parsed schema file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: FileId,
    /// Annotations applied to the whole file.
    pub annotations: Vec<AnnotationApp>,
    pub decls: Vec<Decl>,
}

impl Module {
    /// Parse a module from its source text.
    pub fn parse(source: &str) -> Result<Module, Error> {
        parser::parse_module(source)
    }

    /// The `using` declarations at file scope.
    pub fn usings(&self) -> impl Iterator<Item = &Decl> {
        self.decls
            .iter()
            .filter(|decl| matches!(decl, Decl::UsingAlias(_) | Decl::UsingImport(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Const(Const),
    Struct(Struct),
    Enum(Enum),
    Interface(Interface),
    Annotation(Annotation),
    UsingAlias(UsingAlias),
    UsingImport(UsingImport),
}

impl Decl {
    pub fn range(&self) -> ByteRange {
        match self {
            Decl::Const(decl) => decl.range,
            Decl::Struct(decl) => decl.range,
            Decl::Enum(decl) => decl.range,
            Decl::Interface(decl) => decl.range,
            Decl::Annotation(decl) => decl.range,
            Decl::UsingAlias(decl) => decl.range,
            Decl::UsingImport(decl) => decl.range,
        }
    }

    /// The name this declaration binds in its enclosing scope, if any.
    pub fn binding(&self) -> Option<&Ident> {
        match self {
            Decl::Const(decl) => Some(&decl.name),
            Decl::Struct(decl) => Some(&decl.name),
            Decl::Enum(decl) => Some(&decl.name),
            Decl::Interface(decl) => Some(&decl.name),
            Decl::Annotation(decl) => Some(&decl.name),
            Decl::UsingAlias(decl) => decl.binding(),
            Decl::UsingImport(decl) => decl.binding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Const {
    pub range: ByteRange,
    pub name: Ident,
    pub r#type: TypeRef,
    pub value: Literal,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub range: ByteRange,
    pub name: Ident,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<Member>,
}

/// An item in the body of a struct, union or group.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(Field),
    Union(Union),
    Group(Group),
    Decl(Decl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub range: ByteRange,
    pub name: Ident,
    pub ordinal: Ordinal,
    pub r#type: TypeRef,
    pub default: Option<Literal>,
    pub annotations: Vec<AnnotationApp>,
}

/// A union block. Anonymous unions have no name; named unions may carry an
/// ordinal of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub range: ByteRange,
    pub name: Option<Ident>,
    pub ordinal: Option<Ordinal>,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub range: ByteRange,
    pub name: Ident,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub range: ByteRange,
    pub name: Ident,
    pub annotations: Vec<AnnotationApp>,
    pub enumerants: Vec<Enumerant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerant {
    pub range: ByteRange,
    pub name: Ident,
    pub ordinal: Ordinal,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub range: ByteRange,
    pub name: Ident,
    pub extends: Vec<TypeRef>,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<InterfaceMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceMember {
    Method(Method),
    Decl(Decl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub range: ByteRange,
    pub name: Ident,
    pub ordinal: Ordinal,
    pub params: Vec<Param>,
    /// `None` when the method has no `->` clause.
    pub results: Option<Vec<Param>>,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub range: ByteRange,
    pub name: Ident,
    pub r#type: TypeRef,
    pub default: Option<Literal>,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub range: ByteRange,
    pub name: Ident,
    pub targets: Vec<(ByteRange, AnnotationTarget)>,
    pub r#type: TypeRef,
    pub annotations: Vec<AnnotationApp>,
}

/// The kinds of declaration an annotation may be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationTarget {
    File,
    Const,
    Enum,
    Enumerant,
    Struct,
    Field,
    Union,
    Group,
    Interface,
    Method,
    Param,
    Annotation,
    /// `*`, meaning any of the above.
    All,
}

impl AnnotationTarget {
    pub fn from_name(name: &str) -> Option<AnnotationTarget> {
        match name {
            "file" => Some(AnnotationTarget::File),
            "const" => Some(AnnotationTarget::Const),
            "enum" => Some(AnnotationTarget::Enum),
            "enumerant" => Some(AnnotationTarget::Enumerant),
            "struct" => Some(AnnotationTarget::Struct),
            "field" => Some(AnnotationTarget::Field),
            "union" => Some(AnnotationTarget::Union),
            "group" => Some(AnnotationTarget::Group),
            "interface" => Some(AnnotationTarget::Interface),
            "method" => Some(AnnotationTarget::Method),
            "param" => Some(AnnotationTarget::Param),
            "annotation" => Some(AnnotationTarget::Annotation),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AnnotationTarget::File => "file",
            AnnotationTarget::Const => "const",
            AnnotationTarget::Enum => "enum",
            AnnotationTarget::Enumerant => "enumerant",
            AnnotationTarget::Struct => "struct",
            AnnotationTarget::Field => "field",
            AnnotationTarget::Union => "union",
            AnnotationTarget::Group => "group",
            AnnotationTarget::Interface => "interface",
            AnnotationTarget::Method => "method",
            AnnotationTarget::Param => "param",
            AnnotationTarget::Annotation => "annotation",
            AnnotationTarget::All => "*",
        }
    }
}

/// `using Foo;`, `using Foo.Bar;` or `using T = Foo.Bar;`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsingAlias {
    pub range: ByteRange,
    /// The explicit name of a renaming alias.
    pub name: Option<Ident>,
    pub target: Path,
}

impl UsingAlias {
    pub fn binding(&self) -> Option<&Ident> {
        self.name.as_ref().or_else(|| self.target.last())
    }
}

/// `using import "x.capnp";`, `using import "x.capnp".Foo;` or
/// `using T = import "x.capnp".Foo;`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsingImport {
    pub range: ByteRange,
    pub name: Option<Ident>,
    pub import: ImportPath,
    pub path: Vec<Ident>,
}

impl UsingImport {
    pub fn binding(&self) -> Option<&Ident> {
        self.name.as_ref().or_else(|| self.path.last())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(Path),
    List(ByteRange, Box<TypeRef>),
    ImportedName(ByteRange, ImportPath, Vec<Ident>),
}

impl TypeRef {
    pub fn range(&self) -> ByteRange {
        match self {
            TypeRef::Named(path) => path.range,
            TypeRef::List(range, _) | TypeRef::ImportedName(range, _, _) => *range,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(path) => path.fmt(f),
            TypeRef::List(_, element) => write!(f, "List({element})"),
            TypeRef::ImportedName(_, import, segments) => {
                write!(f, "import {:?}", import.path)?;
                segments
                    .iter()
                    .try_for_each(|segment| write!(f, ".{segment}"))
            }
        }
    }
}

/// A literal value, as written.
///
/// Numbers are kept as source text: they can only be decoded once the type
/// they are written for is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Void(ByteRange),
    Bool(ByteRange, bool),
    Int(ByteRange, String),
    Float(ByteRange, String),
    Text(ByteRange, String),
    /// A reference to an enumerant or a constant.
    Name(Path),
    List(ByteRange, Vec<Literal>),
    Struct(ByteRange, Vec<(Ident, Literal)>),
}

impl Literal {
    pub fn range(&self) -> ByteRange {
        match self {
            Literal::Name(path) => path.range,
            Literal::Void(range)
            | Literal::Bool(range, _)
            | Literal::Int(range, _)
            | Literal::Float(range, _)
            | Literal::Text(range, _)
            | Literal::List(range, _)
            | Literal::Struct(range, _) => *range,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Literal::Void(_) => "void literal",
            Literal::Bool(_, _) => "boolean literal",
            Literal::Int(_, _) => "integer literal",
            Literal::Float(_, _) => "float literal",
            Literal::Text(_, _) => "text literal",
            Literal::Name(_) => "name",
            Literal::List(_, _) => "list literal",
            Literal::Struct(_, _) => "struct literal",
        }
    }
}

/// `$name` or `$name(value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationApp {
    pub range: ByteRange,
    pub name: Path,
    pub value: Option<Literal>,
}
