//! A pretty printer for parsed schema files.
//!
//! The output is itself a valid schema, and parses back to the same tree
//! (apart from source ranges). Comments are not preserved.

use std::fmt;

use pretty::RcDoc;

use crate::syntax::{
    Annotation, AnnotationApp, Const, Decl, Enum, Field, Group, Interface, InterfaceMember,
    Literal, Member, Method, Module, Param, Path, Struct, TypeRef, Union, UsingAlias, UsingImport,
};

const INDENT: isize = 2;

/// The line width used when a module is printed through [`fmt::Display`].
pub const DEFAULT_WIDTH: usize = 80;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = f.width().unwrap_or(DEFAULT_WIDTH);
        module(self).render_fmt(width, f)
    }
}

pub fn module(module: &Module) -> RcDoc<'_> {
    let header = RcDoc::text(format!("@{:#x};", module.id.value));
    let annotations = module
        .annotations
        .iter()
        .map(|app| annotation_app(app).append(";"));

    RcDoc::concat([
        header,
        RcDoc::hardline(),
        RcDoc::concat(annotations.map(|doc| RcDoc::hardline().append(doc))),
        RcDoc::concat(module.decls.iter().map(|d| RcDoc::hardline().append(decl(d)))),
        RcDoc::hardline(),
    ])
}

fn decl(decl: &Decl) -> RcDoc<'_> {
    match decl {
        Decl::Const(decl) => const_decl(decl),
        Decl::Struct(decl) => struct_decl(decl),
        Decl::Enum(decl) => enum_decl(decl),
        Decl::Interface(decl) => interface_decl(decl),
        Decl::Annotation(decl) => annotation_decl(decl),
        Decl::UsingAlias(decl) => using_alias(decl),
        Decl::UsingImport(decl) => using_import(decl),
    }
}

fn using_alias(using: &UsingAlias) -> RcDoc<'_> {
    let name = match &using.name {
        Some(name) => RcDoc::text(name.name.as_str()).append(" = "),
        None => RcDoc::nil(),
    };
    RcDoc::concat([RcDoc::text("using "), name, path(&using.target), RcDoc::text(";")])
}

fn using_import(using: &UsingImport) -> RcDoc<'_> {
    let name = match &using.name {
        Some(name) => RcDoc::text(name.name.as_str()).append(" = "),
        None => RcDoc::nil(),
    };
    RcDoc::concat([
        RcDoc::text("using "),
        name,
        import(&using.import.path, &using.path),
        RcDoc::text(";"),
    ])
}

fn import<'a>(import: &'a str, segments: &'a [crate::syntax::Ident]) -> RcDoc<'a> {
    RcDoc::text("import ")
        .append(text_literal(import))
        .append(RcDoc::concat(
            segments
                .iter()
                .map(|segment| RcDoc::text(".").append(segment.name.as_str())),
        ))
}

fn const_decl(decl: &Const) -> RcDoc<'_> {
    RcDoc::concat([
        RcDoc::text("const "),
        RcDoc::text(decl.name.name.as_str()),
        RcDoc::text(" :"),
        type_ref(&decl.r#type),
        RcDoc::text(" = "),
        literal(&decl.value),
        annotations(&decl.annotations),
        RcDoc::text(";"),
    ])
}

fn struct_decl(decl: &Struct) -> RcDoc<'_> {
    let header = RcDoc::concat([
        RcDoc::text("struct "),
        RcDoc::text(decl.name.name.as_str()),
        annotations(&decl.annotations),
    ]);
    block(header, decl.members.iter().map(member))
}

fn member(member: &Member) -> RcDoc<'_> {
    match member {
        Member::Field(field) => field_decl(field),
        Member::Union(union) => union_decl(union),
        Member::Group(group) => group_decl(group),
        Member::Decl(d) => decl(d),
    }
}

fn field_decl(field: &Field) -> RcDoc<'_> {
    RcDoc::concat([
        RcDoc::text(field.name.name.as_str()),
        RcDoc::text(format!(" @{} :", field.ordinal.value)),
        type_ref(&field.r#type),
        default(&field.default),
        annotations(&field.annotations),
        RcDoc::text(";"),
    ])
}

fn union_decl(union: &Union) -> RcDoc<'_> {
    let name = match (&union.name, &union.ordinal) {
        (Some(name), Some(ordinal)) => RcDoc::text(format!("{} @{} :", name, ordinal.value)),
        (Some(name), None) => RcDoc::text(format!("{name} :")),
        (None, _) => RcDoc::nil(),
    };
    let header = RcDoc::concat([name, RcDoc::text("union"), annotations(&union.annotations)]);
    block(header, union.members.iter().map(member))
}

fn group_decl(group: &Group) -> RcDoc<'_> {
    let header = RcDoc::concat([
        RcDoc::text(format!("{} :group", group.name)),
        annotations(&group.annotations),
    ]);
    block(header, group.members.iter().map(member))
}

fn enum_decl(decl: &Enum) -> RcDoc<'_> {
    let header = RcDoc::concat([
        RcDoc::text("enum "),
        RcDoc::text(decl.name.name.as_str()),
        annotations(&decl.annotations),
    ]);
    block(
        header,
        decl.enumerants.iter().map(|enumerant| {
            RcDoc::concat([
                RcDoc::text(format!("{} @{}", enumerant.name, enumerant.ordinal.value)),
                annotations(&enumerant.annotations),
                RcDoc::text(";"),
            ])
        }),
    )
}

fn interface_decl(decl: &Interface) -> RcDoc<'_> {
    let extends = match decl.extends.as_slice() {
        [] => RcDoc::nil(),
        extends => RcDoc::text(" extends(")
            .append(RcDoc::intersperse(extends.iter().map(type_ref), RcDoc::text(", ")))
            .append(")"),
    };
    let header = RcDoc::concat([
        RcDoc::text("interface "),
        RcDoc::text(decl.name.name.as_str()),
        extends,
        annotations(&decl.annotations),
    ]);
    block(
        header,
        decl.members.iter().map(|member| match member {
            InterfaceMember::Method(method) => method_decl(method),
            InterfaceMember::Decl(d) => self::decl(d),
        }),
    )
}

fn method_decl(method: &Method) -> RcDoc<'_> {
    let results = match &method.results {
        Some(results) => RcDoc::text(" -> ").append(params(results)),
        None => RcDoc::nil(),
    };
    RcDoc::concat([
        RcDoc::text(format!("{} @{} ", method.name, method.ordinal.value)),
        params(&method.params),
        results,
        annotations(&method.annotations),
        RcDoc::text(";"),
    ])
}

fn params(params: &[Param]) -> RcDoc<'_> {
    let params = params.iter().map(|param| {
        RcDoc::concat([
            RcDoc::text(param.name.name.as_str()),
            RcDoc::text(" :"),
            type_ref(&param.r#type),
            default(&param.default),
            annotations(&param.annotations),
        ])
    });
    RcDoc::text("(")
        .append(RcDoc::intersperse(params, RcDoc::text(", ")))
        .append(")")
}

fn annotation_decl(decl: &Annotation) -> RcDoc<'_> {
    let targets = decl
        .targets
        .iter()
        .map(|(_, target)| RcDoc::text(target.name()));
    RcDoc::concat([
        RcDoc::text("annotation "),
        RcDoc::text(decl.name.name.as_str()),
        RcDoc::text("("),
        RcDoc::intersperse(targets, RcDoc::text(", ")),
        RcDoc::text(") :"),
        type_ref(&decl.r#type),
        annotations(&decl.annotations),
        RcDoc::text(";"),
    ])
}

/// A header followed by a braced, indented list of items.
fn block<'a>(header: RcDoc<'a>, items: impl Iterator<Item = RcDoc<'a>>) -> RcDoc<'a> {
    let mut items = items.peekable();
    if items.peek().is_none() {
        return header.append(" {}");
    }
    RcDoc::concat([
        header,
        RcDoc::text(" {"),
        RcDoc::concat(items.map(|item| RcDoc::hardline().append(item))).nest(INDENT),
        RcDoc::hardline(),
        RcDoc::text("}"),
    ])
}

fn default(default: &Option<Literal>) -> RcDoc<'_> {
    match default {
        Some(value) => RcDoc::text(" = ").append(literal(value)),
        None => RcDoc::nil(),
    }
}

fn annotations(annotations: &[AnnotationApp]) -> RcDoc<'_> {
    RcDoc::concat(
        annotations
            .iter()
            .map(|app| RcDoc::space().append(annotation_app(app))),
    )
}

fn annotation_app(app: &AnnotationApp) -> RcDoc<'_> {
    let value = match &app.value {
        None => RcDoc::nil(),
        Some(Literal::Void(_)) => RcDoc::text("()"),
        Some(Literal::Struct(_, fields)) if fields.is_empty() => RcDoc::text("(())"),
        // Struct values are written without a second pair of parentheses.
        Some(Literal::Struct(_, fields)) => RcDoc::text("(")
            .append(struct_fields(fields))
            .append(")"),
        Some(value) => RcDoc::text("(").append(literal(value)).append(")"),
    };
    RcDoc::text("$").append(path(&app.name)).append(value)
}

fn path(path: &Path) -> RcDoc<'_> {
    RcDoc::text(path.to_string())
}

fn type_ref(r#type: &TypeRef) -> RcDoc<'_> {
    match r#type {
        TypeRef::Named(name) => path(name),
        TypeRef::List(_, element) => RcDoc::text("List(").append(type_ref(element)).append(")"),
        TypeRef::ImportedName(_, import_path, segments) => import(&import_path.path, segments),
    }
}

fn literal(literal: &Literal) -> RcDoc<'_> {
    match literal {
        Literal::Void(_) => RcDoc::text("void"),
        Literal::Bool(_, true) => RcDoc::text("true"),
        Literal::Bool(_, false) => RcDoc::text("false"),
        Literal::Int(_, text) | Literal::Float(_, text) => RcDoc::text(text.as_str()),
        Literal::Text(_, text) => text_literal(text),
        Literal::Name(name) => path(name),
        Literal::List(_, elements) => RcDoc::text("[")
            .append(RcDoc::intersperse(
                elements.iter().map(self::literal),
                RcDoc::text(", "),
            ))
            .append("]"),
        Literal::Struct(_, fields) => RcDoc::text("(").append(struct_fields(fields)).append(")"),
    }
}

fn struct_fields(fields: &[(crate::syntax::Ident, Literal)]) -> RcDoc<'_> {
    RcDoc::intersperse(
        fields.iter().map(|(name, value)| {
            RcDoc::text(name.name.as_str())
                .append(" = ")
                .append(literal(value))
        }),
        RcDoc::text(", "),
    )
}

fn text_literal(text: &str) -> RcDoc<'_> {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('"');
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            c if c.is_ascii_control() => escaped.push_str(&format!("\\x{:02x}", c as u8)),
            c => escaped.push(c),
        }
    }
    escaped.push('"');
    RcDoc::text(escaped)
}
