//! The linked schema produced by [`crate::resolve`].
//!
//! Every module reachable from the root through imports is included. Types and
//! references point at declarations by [`DeclId`], so the graph of
//! declarations may freely contain cycles, including across modules.

use index_vec::IndexVec;

use crate::literal::NumericLimits;
use crate::syntax::{self, AnnotationTarget, Path};

index_vec::define_index_type! {
    pub struct ModuleId = u32;
}

index_vec::define_index_type! {
    pub struct DeclId = u32;
}

/// The import path under which the module being resolved is registered.
pub const ROOT_IMPORT_PATH: &str = "::global";

/// The result of resolving a module and everything it imports.
#[derive(Debug, Clone)]
pub struct Schema {
    root: ModuleId,
    modules: IndexVec<ModuleId, Module>,
    decls: IndexVec<DeclId, DeclInfo>,
}

impl Schema {
    pub(crate) fn new(
        root: ModuleId,
        modules: IndexVec<ModuleId, Module>,
        decls: IndexVec<DeclId, DeclInfo>,
    ) -> Schema {
        Schema {
            root,
            modules,
            decls,
        }
    }

    /// The module that resolution was started from.
    pub fn root(&self) -> &Module {
        &self.modules[self.root]
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Find a module by the import path it was loaded from.
    pub fn module_by_path(&self, path: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.path == path)
    }

    pub fn decl(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id]
    }

    /// Find a declaration of the root module by its dotted name, for example
    /// `Person.PhoneNumber.Type`.
    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.lookup_in(self.root, name)
    }

    /// Find a declaration of any module by its dotted name.
    pub fn lookup_in(&self, module: ModuleId, name: &str) -> Option<DeclId> {
        let mut parent = None;
        for segment in name.split('.') {
            let (id, _) = self.decls.iter_enumerated().find(|(_, info)| {
                info.module == module && info.parent == parent && info.name == segment
            })?;
            parent = Some(id);
        }
        parent
    }

    /// The dotted name of a declaration, starting from its module's top level.
    pub fn qualified_name(&self, id: DeclId) -> String {
        let mut segments = vec![self.decls[id].name.as_str()];
        let mut parent = self.decls[id].parent;
        while let Some(id) = parent {
            segments.push(self.decls[id].name.as_str());
            parent = self.decls[id].parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Every reference that was left unresolved, with the module it occurs in.
    pub fn unresolved(&self) -> Vec<(ModuleId, &Path)> {
        let mut unresolved = Vec::new();
        for module in &self.modules {
            let mut paths = Vec::new();
            module.collect_unresolved(&mut paths);
            unresolved.extend(paths.into_iter().map(|path| (module.id, path)));
        }
        unresolved
    }
}

/// Summary information about a declaration, available from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclInfo {
    pub module: ModuleId,
    pub name: String,
    /// The named declaration this one is nested in.
    pub parent: Option<DeclId>,
    pub kind: DeclKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Struct,
    Enum,
    Interface,
    Annotation,
    Union,
    Group,
}

impl DeclKind {
    pub fn description(self) -> &'static str {
        match self {
            DeclKind::Const => "constant",
            DeclKind::Struct => "struct",
            DeclKind::Enum => "enum",
            DeclKind::Interface => "interface",
            DeclKind::Annotation => "annotation",
            DeclKind::Union => "union",
            DeclKind::Group => "group",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: ModuleId,
    /// The import path the module was loaded from.
    pub path: String,
    pub file_id: u64,
    pub annotations: Vec<AnnotationApp>,
    pub decls: Vec<Decl>,
}

impl Module {
    fn collect_unresolved<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        for annotation in &self.annotations {
            annotation.collect_unresolved(paths);
        }
        for decl in &self.decls {
            decl.collect_unresolved(paths);
        }
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
    fn collect_unresolved<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        match self {
            Decl::Const(decl) => {
                decl.r#type.collect_unresolved(paths);
                decl.value.collect_unresolved(paths);
                collect_annotations(&decl.annotations, paths);
            }
            Decl::Struct(decl) => {
                collect_annotations(&decl.annotations, paths);
                collect_members(&decl.members, paths);
            }
            Decl::Enum(decl) => {
                collect_annotations(&decl.annotations, paths);
                for enumerant in &decl.enumerants {
                    collect_annotations(&enumerant.annotations, paths);
                }
            }
            Decl::Interface(decl) => {
                collect_annotations(&decl.annotations, paths);
                for method in &decl.methods {
                    collect_annotations(&method.annotations, paths);
                    let results = method.results.iter().flatten();
                    for param in method.params.iter().chain(results) {
                        param.r#type.collect_unresolved(paths);
                        if let Some(default) = &param.default {
                            default.collect_unresolved(paths);
                        }
                        collect_annotations(&param.annotations, paths);
                    }
                }
                for decl in &decl.nested {
                    decl.collect_unresolved(paths);
                }
            }
            Decl::Annotation(decl) => {
                decl.r#type.collect_unresolved(paths);
                collect_annotations(&decl.annotations, paths);
            }
            Decl::UsingAlias(decl) => decl.target.collect_unresolved(paths),
            Decl::UsingImport(decl) => decl.target.collect_unresolved(paths),
        }
    }
}

fn collect_annotations<'a>(annotations: &'a [AnnotationApp], paths: &mut Vec<&'a Path>) {
    for annotation in annotations {
        annotation.collect_unresolved(paths);
    }
}

fn collect_members<'a>(members: &'a [Member], paths: &mut Vec<&'a Path>) {
    for member in members {
        match member {
            Member::Field(field) => {
                field.r#type.collect_unresolved(paths);
                if let Some(default) = &field.default {
                    default.collect_unresolved(paths);
                }
                collect_annotations(&field.annotations, paths);
            }
            Member::Union(union) => {
                collect_annotations(&union.annotations, paths);
                collect_members(&union.members, paths);
            }
            Member::Group(group) => {
                collect_annotations(&group.annotations, paths);
                collect_members(&group.members, paths);
            }
            Member::Decl(decl) => decl.collect_unresolved(paths),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Const {
    pub id: DeclId,
    pub name: String,
    pub r#type: Type,
    pub value: Value,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub id: DeclId,
    pub name: String,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<Member>,
}

impl Struct {
    /// Every field of the struct, including those inside its unions and
    /// groups, in declaration order.
    pub fn fields(&self) -> Vec<&Field> {
        fn collect<'a>(members: &'a [Member], fields: &mut Vec<&'a Field>) {
            for member in members {
                match member {
                    Member::Field(field) => fields.push(field),
                    Member::Union(Union { members, .. }) | Member::Group(Group { members, .. }) => {
                        collect(members, fields)
                    }
                    Member::Decl(_) => {}
                }
            }
        }

        let mut fields = Vec::new();
        collect(&self.members, &mut fields);
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(Field),
    Union(Union),
    Group(Group),
    Decl(Decl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ordinal: u16,
    pub r#type: Type,
    pub default: Option<Value>,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    /// `None` for the anonymous union of a struct.
    pub id: Option<DeclId>,
    pub name: Option<String>,
    pub ordinal: Option<u16>,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: DeclId,
    pub name: String,
    pub annotations: Vec<AnnotationApp>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub id: DeclId,
    pub name: String,
    pub annotations: Vec<AnnotationApp>,
    pub enumerants: Vec<Enumerant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerant {
    pub name: String,
    pub ordinal: u16,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub id: DeclId,
    pub name: String,
    /// The interfaces listed in the `extends` clause.
    pub extends: Vec<DeclId>,
    pub annotations: Vec<AnnotationApp>,
    pub methods: Vec<Method>,
    pub nested: Vec<Decl>,
    /// The interface's own methods followed by every inherited method.
    pub effective_methods: Vec<MethodRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub ordinal: u16,
    pub params: Vec<Param>,
    pub results: Option<Vec<Param>>,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub r#type: Type,
    pub default: Option<Value>,
    pub annotations: Vec<AnnotationApp>,
}

/// A method of an interface, possibly inherited from a base interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// The interface that declares the method.
    pub interface: DeclId,
    pub name: String,
    pub ordinal: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: DeclId,
    pub name: String,
    pub targets: Vec<AnnotationTarget>,
    pub r#type: Type,
    pub annotations: Vec<AnnotationApp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsingAlias {
    pub name: String,
    pub target: Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsingImport {
    /// `None` for imports that only load the module.
    pub name: Option<String>,
    pub module: ModuleId,
    pub target: Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationApp {
    pub name: Path,
    pub target: Reference,
    /// The evaluated argument. Arguments of unresolved annotations are
    /// [`Value::Deferred`].
    pub value: Option<Value>,
}

impl AnnotationApp {
    fn collect_unresolved<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        self.target.collect_unresolved(paths);
        if let Some(value) = &self.value {
            value.collect_unresolved(paths);
        }
    }
}

/// What a name was bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Decl(DeclId),
    Module(ModuleId),
    Builtin(Builtin),
    Unresolved(Path),
}

impl Reference {
    fn collect_unresolved<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        if let Reference::Unresolved(path) = self {
            paths.push(path);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Builtin(Builtin),
    /// A struct, enum or interface.
    Decl(DeclId),
    List(Box<Type>),
    /// A name that was not bound anywhere in scope.
    Unresolved(Path),
}

impl Type {
    fn collect_unresolved<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        match self {
            Type::Unresolved(path) => paths.push(path),
            Type::List(element) => element.collect_unresolved(paths),
            Type::Builtin(_) | Type::Decl(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i128),
    Float(f64),
    Text(String),
    Data(Vec<u8>),
    Enumerant { r#enum: DeclId, ordinal: u16 },
    List(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Const(DeclId),
    UnresolvedConst(Path),
    /// A literal written for an unresolved type, kept as written.
    Deferred(syntax::Literal),
}

impl Value {
    fn collect_unresolved<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        match self {
            Value::UnresolvedConst(path) => paths.push(path),
            Value::List(elements) => {
                for element in elements {
                    element.collect_unresolved(paths);
                }
            }
            Value::Struct(fields) => {
                for (_, value) in fields {
                    value.collect_unresolved(paths);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Builtin {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    Data,
    AnyPointer,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "Void" => Some(Builtin::Void),
            "Bool" => Some(Builtin::Bool),
            "Int8" => Some(Builtin::Int8),
            "Int16" => Some(Builtin::Int16),
            "Int32" => Some(Builtin::Int32),
            "Int64" => Some(Builtin::Int64),
            "UInt8" => Some(Builtin::UInt8),
            "UInt16" => Some(Builtin::UInt16),
            "UInt32" => Some(Builtin::UInt32),
            "UInt64" => Some(Builtin::UInt64),
            "Float32" => Some(Builtin::Float32),
            "Float64" => Some(Builtin::Float64),
            "Text" => Some(Builtin::Text),
            "Data" => Some(Builtin::Data),
            "AnyPointer" => Some(Builtin::AnyPointer),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Void => "Void",
            Builtin::Bool => "Bool",
            Builtin::Int8 => "Int8",
            Builtin::Int16 => "Int16",
            Builtin::Int32 => "Int32",
            Builtin::Int64 => "Int64",
            Builtin::UInt8 => "UInt8",
            Builtin::UInt16 => "UInt16",
            Builtin::UInt32 => "UInt32",
            Builtin::UInt64 => "UInt64",
            Builtin::Float32 => "Float32",
            Builtin::Float64 => "Float64",
            Builtin::Text => "Text",
            Builtin::Data => "Data",
            Builtin::AnyPointer => "AnyPointer",
        }
    }

    /// The numeric limits of the numeric types.
    pub fn limits(self) -> Option<NumericLimits> {
        match self {
            Builtin::Int8 => Some(NumericLimits::INT8),
            Builtin::Int16 => Some(NumericLimits::INT16),
            Builtin::Int32 => Some(NumericLimits::INT32),
            Builtin::Int64 => Some(NumericLimits::INT64),
            Builtin::UInt8 => Some(NumericLimits::UINT8),
            Builtin::UInt16 => Some(NumericLimits::UINT16),
            Builtin::UInt32 => Some(NumericLimits::UINT32),
            Builtin::UInt64 => Some(NumericLimits::UINT64),
            Builtin::Float32 => Some(NumericLimits::FLOAT32),
            Builtin::Float64 => Some(NumericLimits::FLOAT64),
            Builtin::Void
            | Builtin::Bool
            | Builtin::Text
            | Builtin::Data
            | Builtin::AnyPointer => None,
        }
    }
}
