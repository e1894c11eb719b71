use std::cell::RefCell;
use std::collections::BTreeMap;

use super::*;
use crate::linked::{Decl, DeclKind, Field, Interface, Member, Reference, Struct, Type, Value};
use crate::reporting::{ImportError, ImportErrorKind, LexError, LexErrorKind};

fn parse(source: &str) -> syntax::Module {
    syntax::Module::parse(source).unwrap()
}

fn resolve_with(source: &str, files: &[(&str, &str)]) -> Result<Schema, Error> {
    let module = parse(source);
    let mut load = |path: &str| {
        files
            .iter()
            .find(|(file, _)| *file == path)
            .map(|(_, text)| text.to_string())
    };
    resolve(&module, Some(&mut load))
}

fn resolution_error(result: Result<Schema, Error>) -> ResolutionError {
    match result {
        Err(Error::Resolution(error)) => error,
        Err(error) => panic!("expected a resolution error, found {error:?}"),
        Ok(_) => panic!("expected a resolution error"),
    }
}

fn find_struct(decls: &[Decl], id: DeclId) -> Option<&Struct> {
    decls.iter().find_map(|decl| match decl {
        Decl::Struct(decl) if decl.id == id => Some(decl),
        Decl::Struct(decl) => decl.members.iter().find_map(|member| match member {
            Member::Decl(decl) => find_struct(std::slice::from_ref(decl), id),
            _ => None,
        }),
        Decl::Interface(decl) => find_struct(&decl.nested, id),
        _ => None,
    })
}

fn find_interface(decls: &[Decl], id: DeclId) -> Option<&Interface> {
    decls.iter().find_map(|decl| match decl {
        Decl::Interface(decl) if decl.id == id => Some(decl),
        _ => None,
    })
}

/// Look up a field of a struct in the root module by dotted name.
fn field<'s>(schema: &'s Schema, r#struct: &str, name: &str) -> &'s Field {
    let id = schema.lookup(r#struct).unwrap();
    let decl = schema
        .modules()
        .find_map(|module| find_struct(&module.decls, id))
        .unwrap();
    decl.fields().into_iter().find(|field| field.name == name).unwrap()
}

fn root_const<'s>(schema: &'s Schema, name: &str) -> &'s linked::Const {
    schema
        .root()
        .decls
        .iter()
        .find_map(|decl| match decl {
            Decl::Const(decl) if decl.name == name => Some(decl),
            _ => None,
        })
        .unwrap()
}

#[test]
fn full_grammar() {
    let schema = resolve_with(include_str!("../../schemas/grammar.capnp"), &[]).unwrap();
    assert!(schema.unresolved().is_empty());

    let phone_number = schema.lookup("Person.PhoneNumber").unwrap();
    let phone_type = schema.lookup("Person.PhoneNumber.Type").unwrap();
    assert_eq!(schema.qualified_name(phone_type), "Person.PhoneNumber.Type");
    assert_eq!(schema.decl(phone_type).kind, DeclKind::Enum);

    assert_eq!(
        field(&schema, "Person", "phones").r#type,
        Type::List(Box::new(Type::Decl(phone_number))),
    );
    assert_eq!(
        field(&schema, "Person", "favourite").default,
        Some(Value::Enumerant {
            r#enum: phone_type,
            ordinal: 0,
        }),
    );
    assert_eq!(
        field(&schema, "Person", "best").default,
        Some(Value::Struct(vec![
            ("number".to_owned(), Value::Text("555-0100".to_owned())),
            (
                "type".to_owned(),
                Value::Enumerant {
                    r#enum: phone_type,
                    ordinal: 2,
                },
            ),
        ])),
    );
    assert_eq!(
        field(&schema, "Person", "ratio").default,
        Some(Value::Float(2.5e-3))
    );
    assert_eq!(field(&schema, "Person", "married").default, Some(Value::Bool(true)));
    assert_eq!(
        field(&schema, "Line", "labels").default,
        Some(Value::List(vec![
            Value::List(vec![
                Value::Text("foo".to_owned()),
                Value::Text("bar".to_owned()),
            ]),
            Value::List(vec![Value::Text("baz".to_owned())]),
        ])),
    );

    assert_eq!(root_const(&schema, "maxPeople").value, Value::Int(0xffff));
    assert_eq!(root_const(&schema, "octal").value, Value::Int(83));
    assert_eq!(
        root_const(&schema, "greeting").value,
        Value::Text("hello\tworld".to_owned())
    );
    assert_eq!(
        root_const(&schema, "origin").value,
        Value::Struct(vec![
            ("x".to_owned(), Value::Float(1.5)),
            ("y".to_owned(), Value::Float(-2.0)),
        ]),
    );

    let annotations = &schema.root().annotations;
    assert_eq!(annotations.len(), 3);
    assert_eq!(annotations[0].target, Reference::Decl(schema.lookup("doc").unwrap()));
    assert_eq!(
        annotations[0].value,
        Some(Value::Text("An address book.".to_owned()))
    );
    assert_eq!(annotations[1].value, None);

    let directory = schema.lookup("Directory").unwrap();
    let directory = find_interface(&schema.root().decls, directory).unwrap();
    let methods = directory
        .effective_methods
        .iter()
        .map(|method| method.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(methods, ["list", "create", "delete", "link", "isDirectory"]);
    assert_eq!(directory.extends, [schema.lookup("Node").unwrap()]);
}

#[test]
fn forward_references() {
    let schema = resolve_with("@0x1; struct Foobar { ref1 @0 :Bar; struct Bar {} }", &[]).unwrap();
    let bar = schema.lookup("Foobar.Bar").unwrap();
    assert_eq!(field(&schema, "Foobar", "ref1").r#type, Type::Decl(bar));

    let schema = resolve_with("@0x1; struct Foo { bar @0 :Bar; } struct Bar {}", &[]).unwrap();
    let bar = schema.lookup("Bar").unwrap();
    assert_eq!(field(&schema, "Foo", "bar").r#type, Type::Decl(bar));
}

#[test]
fn struct_literal_default_for_later_type() {
    let schema = resolve_with(
        "@0x1; struct Foo { bar @0 :Bar = (baz = 1, qux = [true]); } struct Bar { baz @0 :Int32; qux @1 :List(Bool); }",
        &[],
    )
    .unwrap();
    assert_eq!(
        field(&schema, "Foo", "bar").default,
        Some(Value::Struct(vec![
            ("baz".to_owned(), Value::Int(1)),
            ("qux".to_owned(), Value::List(vec![Value::Bool(true)])),
        ])),
    );
}

#[test]
fn struct_literals_for_unions_and_groups() {
    let schema = resolve_with(
        r#"@0x1;
        struct Person {
          address :group { city @0 :Text; }
          employment :union { employer @1 :Text; unemployed @2 :Void; }
        }
        const p :Person = (address = (city = "Oslo"), employment = (unemployed = void));
        "#,
        &[],
    )
    .unwrap();
    assert_eq!(
        root_const(&schema, "p").value,
        Value::Struct(vec![
            (
                "address".to_owned(),
                Value::Struct(vec![("city".to_owned(), Value::Text("Oslo".to_owned()))]),
            ),
            (
                "employment".to_owned(),
                Value::Struct(vec![("unemployed".to_owned(), Value::Void)]),
            ),
        ]),
    );
}

#[test]
fn unresolved_names_are_kept() {
    let schema = resolve_with(
        "@0x1; struct Foo { bar @0 :Nowhere = (x = 1); baz @1 :Int32 = nothing; }",
        &[],
    )
    .unwrap();

    let bar = field(&schema, "Foo", "bar");
    assert!(matches!(&bar.r#type, Type::Unresolved(path) if path.to_string() == "Nowhere"));
    assert!(matches!(bar.default, Some(Value::Deferred(syntax::Literal::Struct(_, _)))));
    assert!(matches!(
        &field(&schema, "Foo", "baz").default,
        Some(Value::UnresolvedConst(path)) if path.to_string() == "nothing"
    ));

    let unresolved = schema
        .unresolved()
        .into_iter()
        .map(|(module, path)| (module, path.to_string()))
        .collect::<Vec<_>>();
    let root = schema.root().id;
    assert_eq!(
        unresolved,
        [(root, "Nowhere".to_owned()), (root, "nothing".to_owned())]
    );
}

#[test]
fn unresolved_member_of_local_declaration() {
    let schema = resolve_with("@0x1; struct Foo { bar @0 :Foo.Missing; }", &[]).unwrap();
    assert!(matches!(field(&schema, "Foo", "bar").r#type, Type::Unresolved(_)));
}

#[test]
fn mutual_imports_through_global() {
    let schema = resolve_with(
        r#"@0x1;
        using B = import "b.capnp".B;
        struct A { b @0 :B; }"#,
        &[(
            "b.capnp",
            r#"@0x2;
            using A = import "::global".A;
            struct B { a @0 :A; }"#,
        )],
    )
    .unwrap();

    let a = schema.lookup("A").unwrap();
    let b_module = schema.module_by_path("b.capnp").unwrap();
    let b = schema.lookup_in(b_module.id, "B").unwrap();
    assert_eq!(field(&schema, "A", "b").r#type, Type::Decl(b));

    let b_decl = find_struct(&b_module.decls, b).unwrap();
    assert_eq!(b_decl.fields()[0].r#type, Type::Decl(a));
    assert_eq!(schema.root().path, linked::ROOT_IMPORT_PATH);
}

#[test]
fn import_source_is_called_once_per_path() {
    let calls = RefCell::new(BTreeMap::<String, usize>::new());
    let files = [
        ("b.capnp", "@0x2; using import \"c.capnp\"; struct B {}"),
        ("c.capnp", "@0x3; using import \"::global\"; using import \"b.capnp\"; struct C {}"),
    ];
    let mut load = |path: &str| {
        *calls.borrow_mut().entry(path.to_owned()).or_default() += 1;
        files
            .iter()
            .find(|(file, _)| *file == path)
            .map(|(_, text)| text.to_string())
    };

    let module = parse(
        r#"@0x1;
        using import "b.capnp";
        struct A {
          b @0 :import "b.capnp".B;
          c @1 :import "c.capnp".C;
        }"#,
    );
    let schema = resolve(&module, Some(&mut load)).unwrap();

    assert_eq!(schema.modules().count(), 3);
    let calls = calls.into_inner();
    assert_eq!(calls.get("b.capnp"), Some(&1));
    assert_eq!(calls.get("c.capnp"), Some(&1));
    assert_eq!(calls.get("::global"), None);
}

#[test]
fn missing_import() {
    match resolve_with("@0x1; using import \"missing.capnp\";", &[]) {
        Err(Error::Import(error)) => {
            assert_eq!(error.path, "missing.capnp");
            assert_eq!(error.importer, linked::ROOT_IMPORT_PATH);
            assert_eq!(error.kind, ImportErrorKind::NotFound);
        }
        result => panic!("expected an import error, found {result:?}"),
    }
}

#[test]
fn imports_without_a_source() {
    let module = parse("@0x1; struct Foo { bar @0 :import \"bar.capnp\".Bar; }");
    match resolve(&module, None) {
        Err(Error::Import(error)) => {
            assert_eq!(error.path, "bar.capnp");
            assert_eq!(error.kind, ImportErrorKind::NoImportSource);
        }
        result => panic!("expected an import error, found {result:?}"),
    }

    // The root module never needs a source.
    let module = parse("@0x1; using Self = import \"::global\"; struct Foo { foo @0 :Self.Foo; }");
    let schema = resolve(&module, None).unwrap();
    let foo = schema.lookup("Foo").unwrap();
    assert_eq!(field(&schema, "Foo", "foo").r#type, Type::Decl(foo));
}

#[test]
fn imported_name_not_found() {
    let files = [("b.capnp", "@0x2; struct B { struct Inner {} }")];

    let error = resolution_error(resolve_with("@0x1; using import \"b.capnp\".Nope;", &files));
    assert_eq!(
        error.kind,
        ResolutionErrorKind::ImportedNameNotFound {
            name: "Nope".to_owned(),
            import: "b.capnp".to_owned(),
        },
    );

    let error = resolution_error(resolve_with(
        "@0x1; using Lib = import \"b.capnp\"; struct A { a @0 :Lib.B.Outer; }",
        &files,
    ));
    assert!(matches!(
        error.kind,
        ResolutionErrorKind::ImportedNameNotFound { name, .. } if name == "Outer"
    ));

    assert!(resolve_with("@0x1; struct A { a @0 :import \"b.capnp\".B.Inner; }", &files).is_ok());
}

#[test]
fn imported_parse_errors() {
    let files = [("b.capnp", "struct B {}")];
    match resolve_with("@0x1; using import \"b.capnp\";", &files) {
        Err(Error::Import(error)) => match error.kind {
            ImportErrorKind::Parse(inner) => {
                assert_eq!(inner.module(), Some("b.capnp"));
                assert!(matches!(
                    *inner,
                    Error::Syntax(SyntaxError {
                        kind: SyntaxErrorKind::MissingFileId,
                        ..
                    })
                ));
            }
            kind => panic!("expected a parse error, found {kind:?}"),
        },
        result => panic!("expected an import error, found {result:?}"),
    }

    let files = [("b.capnp", "@0x2; const b :Text = \"unterminated;")];
    match resolve_with("@0x1; using import \"b.capnp\";", &files) {
        Err(Error::Import(ImportError {
            kind: ImportErrorKind::Parse(inner),
            ..
        })) => assert!(matches!(
            *inner,
            Error::Lex(LexError {
                kind: LexErrorKind::UnterminatedTextLiteral('"'),
                ..
            })
        )),
        result => panic!("expected an import error, found {result:?}"),
    }
}

#[test]
fn errors_point_into_imported_modules() {
    let files = [("b.capnp", "@0x2; struct B { a @0 :Text; b @0 :Text; }")];
    let error = resolution_error(resolve_with("@0x1; using import \"b.capnp\";", &files));
    assert_eq!(error.module, "b.capnp");
    assert!(matches!(error.kind, ResolutionErrorKind::DuplicateOrdinal { ordinal: 0, .. }));
}

#[test]
fn resolving_twice_with_different_sources() {
    let module = parse("@0x1; struct A { b @0 :import \"b.capnp\".B; }");

    let mut struct_source = |_: &str| Some("@0x2; struct B {}".to_owned());
    let mut enum_source = |_: &str| Some("@0x2; enum B { x @0; }".to_owned());
    let first = resolve(&module, Some(&mut struct_source)).unwrap();
    let second = resolve(&module, Some(&mut enum_source)).unwrap();

    let kind = |schema: &Schema| {
        let module = schema.module_by_path("b.capnp").unwrap();
        schema.decl(schema.lookup_in(module.id, "B").unwrap()).kind
    };
    assert_eq!(kind(&first), DeclKind::Struct);
    assert_eq!(kind(&second), DeclKind::Enum);
}

#[test]
fn concurrent_resolution() {
    let module = &parse(include_str!("../../schemas/grammar.capnp"));
    std::thread::scope(|scope| {
        let handles = (0..4)
            .map(|_| scope.spawn(move || resolve(module, None).map(|schema| schema.modules().count())))
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(1));
        }
    });
}

#[test]
fn interface_inheritance() {
    let schema = resolve_with(
        r#"@0x1;
        interface C extends(B, A) { c @0 (); }
        interface B extends(A) { b @0 (); }
        interface A { a @0 (); a2 @1 (); }"#,
        &[],
    )
    .unwrap();

    let a = schema.lookup("A").unwrap();
    let b = schema.lookup("B").unwrap();
    let c = schema.lookup("C").unwrap();
    let c_decl = find_interface(&schema.root().decls, c).unwrap();
    let methods = c_decl
        .effective_methods
        .iter()
        .map(|method| (method.interface, method.name.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(methods, [(c, "c"), (b, "b"), (a, "a"), (a, "a2")]);
}

#[test]
fn invalid_base_interfaces() {
    let error = resolution_error(resolve_with("@0x1; interface A extends(Nowhere) {}", &[]));
    assert_eq!(
        error.kind,
        ResolutionErrorKind::UnresolvedBaseInterface("Nowhere".to_owned())
    );

    let error = resolution_error(resolve_with("@0x1; struct S {} interface A extends(S) {}", &[]));
    assert_eq!(error.kind, ResolutionErrorKind::NotAnInterface("S".to_owned()));

    let error = resolution_error(resolve_with(
        "@0x1; interface X extends(Y) {} interface Y extends(X) {}",
        &[],
    ));
    assert!(matches!(error.kind, ResolutionErrorKind::CyclicInheritance(_)));
}

#[test]
fn aliases() {
    let schema = resolve_with(
        r#"@0x1;
        struct Foo {}
        struct Outer {
          using Foo;
          struct Inner {}
          using Renamed = Inner;
          f @0 :Foo;
          g @1 :Renamed;
        }
        using A = B;
        using B = A;
        struct Cycle { x @0 :A; }"#,
        &[],
    )
    .unwrap();

    let foo = schema.lookup("Foo").unwrap();
    let inner = schema.lookup("Outer.Inner").unwrap();
    assert_eq!(field(&schema, "Outer", "f").r#type, Type::Decl(foo));
    assert_eq!(field(&schema, "Outer", "g").r#type, Type::Decl(inner));
    assert!(matches!(field(&schema, "Cycle", "x").r#type, Type::Unresolved(_)));
}

#[test]
fn inner_aliases_shadow_outer_declarations() {
    let schema = resolve_with(
        r#"@0x1;
        struct Target {}
        struct Other {}
        struct Outer {
          using Target = Other;
          t @0 :Target;
        }"#,
        &[],
    )
    .unwrap();
    let other = schema.lookup("Other").unwrap();
    assert_eq!(field(&schema, "Outer", "t").r#type, Type::Decl(other));
}

#[test]
fn builtins_are_shadowed_by_declarations() {
    let schema = resolve_with("@0x1; struct Text {} struct Foo { t @0 :Text; }", &[]).unwrap();
    let text = schema.lookup("Text").unwrap();
    assert_eq!(field(&schema, "Foo", "t").r#type, Type::Decl(text));
}

#[test]
fn expected_type() {
    let error = resolution_error(resolve_with(
        "@0x1; const c :Int32 = 1; struct Foo { bar @0 :c; }",
        &[],
    ));
    assert_eq!(error.kind, ResolutionErrorKind::ExpectedType("c".to_owned()));
}

#[test]
fn annotation_applications() {
    let schema = resolve_with("@0x1; struct Foo $unknown(1) {}", &[]).unwrap();
    let foo = schema.lookup("Foo").unwrap();
    let annotation = &find_struct(&schema.root().decls, foo).unwrap().annotations[0];
    assert!(matches!(annotation.target, Reference::Unresolved(_)));
    assert!(matches!(annotation.value, Some(Value::Deferred(syntax::Literal::Int(_, _)))));

    let error = resolution_error(resolve_with(
        "@0x1; annotation onStruct(struct) :Void; enum E $onStruct { a @0; }",
        &[],
    ));
    assert_eq!(
        error.kind,
        ResolutionErrorKind::AnnotationTargetMismatch {
            name: "onStruct".to_owned(),
            target: "enum",
        },
    );

    let error = resolution_error(resolve_with("@0x1; struct S {} $S;", &[]));
    assert_eq!(error.kind, ResolutionErrorKind::NotAnAnnotation("S".to_owned()));

    match resolve_with("@0x1; annotation count(*) :UInt8; $count(\"many\");", &[]) {
        Err(Error::Syntax(error)) => assert_eq!(
            error.kind,
            SyntaxErrorKind::MismatchedLiteral {
                expected: "UInt8".to_owned(),
                found: "text literal",
            },
        ),
        result => panic!("expected a syntax error, found {result:?}"),
    }
}

#[test]
fn default_value_errors() {
    match resolve_with("@0x1; const x :UInt8 = 256;", &[]) {
        Err(Error::Syntax(error)) => {
            assert_eq!(error.module.as_deref(), Some(linked::ROOT_IMPORT_PATH));
            assert_eq!(
                error.kind,
                SyntaxErrorKind::InvalidNumericLiteral(crate::literal::LiteralError::OutOfRange(
                    "UInt8"
                )),
            );
        }
        result => panic!("expected a syntax error, found {result:?}"),
    }

    match resolve_with("@0x1; const x :List(Int32) = (a = 1);", &[]) {
        Err(Error::Syntax(error)) => assert_eq!(
            error.kind,
            SyntaxErrorKind::MismatchedLiteral {
                expected: "List(Int32)".to_owned(),
                found: "struct literal",
            },
        ),
        result => panic!("expected a syntax error, found {result:?}"),
    }

    let error = resolution_error(resolve_with(
        "@0x1; struct P { email @0 :Text; } const p :P = (emial = \"x\");",
        &[],
    ));
    assert_eq!(
        error.kind,
        ResolutionErrorKind::UnknownField {
            name: "emial".to_owned(),
            parent: "P".to_owned(),
            suggestion: Some("email".to_owned()),
        },
    );

    let error = resolution_error(resolve_with(
        "@0x1; enum Colour { red @0; green @1; } const c :Colour = gren;",
        &[],
    ));
    assert_eq!(
        error.kind,
        ResolutionErrorKind::UnknownEnumerant {
            name: "gren".to_owned(),
            parent: "Colour".to_owned(),
            suggestion: Some("green".to_owned()),
        },
    );

    let error = resolution_error(resolve_with("@0x1; struct S {} const c :Int32 = S;", &[]));
    assert_eq!(error.kind, ResolutionErrorKind::NotAConstant("S".to_owned()));
}

#[test]
fn constant_references() {
    let schema = resolve_with(
        r#"@0x1;
        const a :Int32 = 1;
        const b :Int32 = a;
        enum Colour { red @0; }
        const favourite :Colour = red;
        const copy :Colour = favourite;
        const f :Float32 = 2;"#,
        &[],
    )
    .unwrap();
    let a = schema.lookup("a").unwrap();
    let favourite = schema.lookup("favourite").unwrap();
    assert_eq!(root_const(&schema, "b").value, Value::Const(a));
    assert_eq!(root_const(&schema, "copy").value, Value::Const(favourite));
    assert_eq!(root_const(&schema, "f").value, Value::Float(2.0));
}

#[test]
fn duplicate_names_across_using_and_declarations() {
    let error = resolution_error(resolve_with("@0x1; struct Foo {} using Foo = Bar;", &[]));
    assert!(matches!(
        error.kind,
        ResolutionErrorKind::DuplicateName { name, .. } if name == "Foo"
    ));
}

#[test]
fn import_aliases_that_refer_to_themselves() {
    let module = parse("@0x1; using X = import \"::global\".X; struct Foo { f @0 :X; }");
    let error = resolution_error(resolve(&module, None));
    assert!(matches!(
        error.kind,
        ResolutionErrorKind::ImportedNameNotFound { name, import }
            if name == "X" && import == linked::ROOT_IMPORT_PATH
    ));

    let error = resolution_error(resolve_with(
        "@0x1; using B = import \"b.capnp\".B;",
        &[("b.capnp", "@0x2; using B = import \"::global\".B;")],
    ));
    assert!(matches!(
        error.kind,
        ResolutionErrorKind::ImportedNameNotFound { name, .. } if name == "B"
    ));
}

#[test]
fn import_aliases_reexport_declarations() {
    let schema = resolve_with(
        "@0x1; struct B {} struct Foo { f @0 :import \"b.capnp\".B; }",
        &[("b.capnp", "@0x2; using B = import \"::global\".B;")],
    )
    .unwrap();
    let b = schema.lookup("B").unwrap();
    assert_eq!(field(&schema, "Foo", "f").r#type, Type::Decl(b));
}
