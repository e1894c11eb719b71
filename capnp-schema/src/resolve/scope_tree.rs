//! Lexical scopes of every module in a resolution run.
//!
//! A scope is opened for each file, struct, union, group and interface. Each
//! scope stores its parent rather than its children, so that a name can be
//! looked up by walking outwards from the scope of the reference site.
//!
//! Nested declarations are declared into the scope they textually appear in,
//! before any reference is resolved. This makes forward references resolve
//! regardless of declaration order.

use fxhash::FxHashMap;
use index_vec::IndexVec;

use crate::linked::{DeclId, DeclInfo, DeclKind, ModuleId};
use crate::reporting::{Error, ResolutionError, ResolutionErrorKind};
use crate::source::ByteRange;
use crate::syntax::{
    self, AnnotationTarget, Decl, Ident, ImportPath, InterfaceMember, Member, Path, TypeRef,
};

index_vec::define_index_type! {
    pub struct ScopeId = u32;
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub module: ModuleId,
    names: FxHashMap<String, DeclId>,
    aliases: FxHashMap<String, Alias>,
}

impl Scope {
    pub fn name(&self, name: &str) -> Option<DeclId> {
        self.names.get(name).copied()
    }

    pub fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }
}

/// A `using` binding.
#[derive(Debug, Clone)]
pub struct Alias {
    pub range: ByteRange,
    pub target: AliasTarget,
}

#[derive(Debug, Clone)]
pub enum AliasTarget {
    Path(Path),
    Import { import: ImportPath, path: Vec<Ident> },
}

#[derive(Debug, Clone)]
pub struct DeclEntry {
    pub module: ModuleId,
    pub parent: Option<DeclId>,
    /// The scope the declaration's name is declared in.
    pub parent_scope: ScopeId,
    pub name: String,
    pub range: ByteRange,
    /// The scope opened by the declaration's body, if it has one.
    pub scope: Option<ScopeId>,
    pub kind: EntryKind,
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    Const,
    Struct { fields: Vec<FieldEntry> },
    Enum { enumerants: Vec<(String, u16)> },
    Interface {
        extends: Vec<TypeRef>,
        methods: Vec<(String, u16)>,
    },
    Annotation {
        targets: Vec<AnnotationTarget>,
        r#type: TypeRef,
    },
    Union { fields: Vec<FieldEntry> },
    Group { fields: Vec<FieldEntry> },
}

impl EntryKind {
    pub fn decl_kind(&self) -> DeclKind {
        match self {
            EntryKind::Const => DeclKind::Const,
            EntryKind::Struct { .. } => DeclKind::Struct,
            EntryKind::Enum { .. } => DeclKind::Enum,
            EntryKind::Interface { .. } => DeclKind::Interface,
            EntryKind::Annotation { .. } => DeclKind::Annotation,
            EntryKind::Union { .. } => DeclKind::Union,
            EntryKind::Group { .. } => DeclKind::Group,
        }
    }

    /// The fields that a struct literal for this declaration may set.
    pub fn fields(&self) -> Option<&[FieldEntry]> {
        match self {
            EntryKind::Struct { fields }
            | EntryKind::Union { fields }
            | EntryKind::Group { fields } => Some(fields),
            _ => None,
        }
    }
}

/// A field as seen from a struct literal.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: String,
    pub r#type: FieldType,
}

#[derive(Debug, Clone)]
pub enum FieldType {
    /// A plain field, with the scope its type is written in.
    Type(TypeRef, ScopeId),
    /// A named union or group, set with a nested struct literal.
    Group(DeclId),
}

/// The scope tree of one module, as returned by [`ScopeTree::build_module`].
#[derive(Debug, Clone)]
pub struct ModuleScopes {
    pub root: ScopeId,
    /// Every import path the module refers to, in source order.
    pub imports: Vec<ImportPath>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    decls: IndexVec<DeclId, DeclEntry>,
    /// The declaration made by the member at an index of a scope's body.
    member_decls: FxHashMap<(ScopeId, usize), DeclId>,
    /// The scope opened by the union or group at an index of a scope's body.
    member_scopes: FxHashMap<(ScopeId, usize), ScopeId>,
}

impl ScopeTree {
    pub fn new() -> ScopeTree {
        ScopeTree::default()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn decl(&self, id: DeclId) -> &DeclEntry {
        &self.decls[id]
    }

    pub fn member_decl(&self, scope: ScopeId, index: usize) -> DeclId {
        self.member_decls[&(scope, index)]
    }

    pub fn member_scope(&self, scope: ScopeId, index: usize) -> ScopeId {
        self.member_scopes[&(scope, index)]
    }

    pub fn decl_infos(&self) -> IndexVec<DeclId, DeclInfo> {
        self.decls
            .iter()
            .map(|entry| DeclInfo {
                module: entry.module,
                name: entry.name.clone(),
                parent: entry.parent,
                kind: entry.kind.decl_kind(),
            })
            .collect()
    }

    /// Declare every name of a module into a new tree of scopes.
    pub fn build_module(
        &mut self,
        module: ModuleId,
        path: &str,
        syntax: &syntax::Module,
    ) -> Result<ModuleScopes, Error> {
        tracing::trace!(path, "building scopes");

        let root = self.scopes.push(Scope {
            parent: None,
            module,
            names: FxHashMap::default(),
            aliases: FxHashMap::default(),
        });
        let mut builder = ScopeTreeBuilder {
            tree: self,
            module,
            path,
            current_scope: root,
            current_decl: None,
            imports: Vec::new(),
        };

        for (index, decl) in syntax.decls.iter().enumerate() {
            builder.decl(index, decl)?;
        }

        Ok(ModuleScopes {
            root,
            imports: builder.imports,
        })
    }
}

/// The ordinals used so far in one numbering space.
type Ordinals = FxHashMap<u16, ByteRange>;

struct ScopeTreeBuilder<'tree, 'path> {
    tree: &'tree mut ScopeTree,
    module: ModuleId,
    path: &'path str,
    current_scope: ScopeId,
    current_decl: Option<DeclId>,
    imports: Vec<ImportPath>,
}

impl<'tree, 'path> ScopeTreeBuilder<'tree, 'path> {
    fn error(&self, range: ByteRange, kind: ResolutionErrorKind) -> Error {
        Error::Resolution(ResolutionError {
            module: self.path.to_owned(),
            range,
            kind,
        })
    }

    fn push_scope(&mut self) -> ScopeId {
        let parent_scope = self.current_scope;
        self.current_scope = self.tree.scopes.push(Scope {
            parent: Some(parent_scope),
            module: self.module,
            names: FxHashMap::default(),
            aliases: FxHashMap::default(),
        });
        self.current_scope
    }

    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let old_scope = self.current_scope;
        let old_decl = self.current_decl;
        let ret = f(self);
        self.current_scope = old_scope;
        self.current_decl = old_decl;
        ret
    }

    fn check_unbound(&self, name: &Ident) -> Result<(), Error> {
        let scope = &self.tree.scopes[self.current_scope];
        let first = match (scope.names.get(&name.name), scope.aliases.get(&name.name)) {
            (Some(id), _) => self.tree.decls[*id].range,
            (None, Some(alias)) => alias.range,
            (None, None) => return Ok(()),
        };
        Err(self.error(
            name.range,
            ResolutionErrorKind::DuplicateName {
                name: name.name.clone(),
                first,
            },
        ))
    }

    /// Declare a name in the current scope.
    fn push_decl(&mut self, name: &Ident, kind: EntryKind) -> Result<DeclId, Error> {
        self.check_unbound(name)?;
        let id = self.tree.decls.push(DeclEntry {
            module: self.module,
            parent: self.current_decl,
            parent_scope: self.current_scope,
            name: name.name.clone(),
            range: name.range,
            scope: None,
            kind,
        });
        let scope = &mut self.tree.scopes[self.current_scope];
        scope.names.insert(name.name.clone(), id);
        Ok(id)
    }

    fn push_alias(&mut self, name: &Ident, target: AliasTarget) -> Result<(), Error> {
        self.check_unbound(name)?;
        let alias = Alias {
            range: name.range,
            target,
        };
        let scope = &mut self.tree.scopes[self.current_scope];
        scope.aliases.insert(name.name.clone(), alias);
        Ok(())
    }

    /// Open the body scope of a declaration that was just pushed.
    fn enter_decl(&mut self, id: DeclId) -> ScopeId {
        let scope = self.push_scope();
        self.tree.decls[id].scope = Some(scope);
        self.current_decl = Some(id);
        scope
    }

    fn check_ordinal(
        &self,
        ordinals: &mut Ordinals,
        ordinal: &syntax::Ordinal,
    ) -> Result<(), Error> {
        match ordinals.insert(ordinal.value, ordinal.range) {
            None => Ok(()),
            Some(first) => Err(self.error(
                ordinal.range,
                ResolutionErrorKind::DuplicateOrdinal {
                    ordinal: ordinal.value,
                    first,
                },
            )),
        }
    }

    fn type_ref(&mut self, r#type: &TypeRef) {
        match r#type {
            TypeRef::Named(_) => {}
            TypeRef::List(_, element) => self.type_ref(element),
            TypeRef::ImportedName(_, import, _) => self.imports.push(import.clone()),
        }
    }

    fn decl(&mut self, index: usize, decl: &Decl) -> Result<(), Error> {
        let parent_scope = self.current_scope;
        let id = match decl {
            Decl::Const(decl) => {
                self.type_ref(&decl.r#type);
                self.push_decl(&decl.name, EntryKind::Const)?
            }
            Decl::Struct(decl) => {
                let id = self.push_decl(&decl.name, EntryKind::Struct { fields: Vec::new() })?;
                let fields = self.with_scope(|this| {
                    this.enter_decl(id);
                    this.members(&decl.members, &mut Ordinals::default())
                })?;
                self.tree.decls[id].kind = EntryKind::Struct { fields };
                id
            }
            Decl::Enum(decl) => {
                let mut ordinals = Ordinals::default();
                let mut enumerants = Vec::with_capacity(decl.enumerants.len());
                for enumerant in &decl.enumerants {
                    self.check_ordinal(&mut ordinals, &enumerant.ordinal)?;
                    enumerants.push((enumerant.name.name.clone(), enumerant.ordinal.value));
                }
                self.push_decl(&decl.name, EntryKind::Enum { enumerants })?
            }
            Decl::Interface(decl) => {
                for base in &decl.extends {
                    self.type_ref(base);
                }
                let kind = EntryKind::Interface {
                    extends: decl.extends.clone(),
                    methods: Vec::new(),
                };
                let id = self.push_decl(&decl.name, kind)?;
                let methods = self.with_scope(|this| {
                    this.enter_decl(id);
                    this.interface_members(&decl.members)
                })?;
                if let EntryKind::Interface { methods: entry, .. } = &mut self.tree.decls[id].kind {
                    *entry = methods;
                }
                id
            }
            Decl::Annotation(decl) => {
                self.type_ref(&decl.r#type);
                let kind = EntryKind::Annotation {
                    targets: decl.targets.iter().map(|(_, target)| *target).collect(),
                    r#type: decl.r#type.clone(),
                };
                self.push_decl(&decl.name, kind)?
            }
            Decl::UsingAlias(decl) => {
                if let Some(name) = decl.binding() {
                    self.push_alias(name, AliasTarget::Path(decl.target.clone()))?;
                }
                return Ok(());
            }
            Decl::UsingImport(decl) => {
                self.imports.push(decl.import.clone());
                if let Some(name) = decl.binding() {
                    let target = AliasTarget::Import {
                        import: decl.import.clone(),
                        path: decl.path.clone(),
                    };
                    self.push_alias(name, target)?;
                }
                return Ok(());
            }
        };

        self.tree.member_decls.insert((parent_scope, index), id);
        Ok(())
    }

    /// Declare the members of a struct, union or group body, returning the
    /// fields a struct literal for the body may set.
    fn members(
        &mut self,
        members: &[Member],
        ordinals: &mut Ordinals,
    ) -> Result<Vec<FieldEntry>, Error> {
        let scope = self.current_scope;
        let mut fields = Vec::new();

        for (index, member) in members.iter().enumerate() {
            match member {
                Member::Field(field) => {
                    self.check_ordinal(ordinals, &field.ordinal)?;
                    self.type_ref(&field.r#type);
                    fields.push(FieldEntry {
                        name: field.name.name.clone(),
                        r#type: FieldType::Type(field.r#type.clone(), scope),
                    });
                }
                Member::Union(union) => {
                    if let Some(ordinal) = &union.ordinal {
                        self.check_ordinal(ordinals, ordinal)?;
                    }
                    match &union.name {
                        Some(name) => {
                            let kind = EntryKind::Union { fields: Vec::new() };
                            let id = self.push_decl(name, kind)?;
                            let (body, union_fields) = self.with_scope(|this| {
                                let body = this.enter_decl(id);
                                Ok::<_, Error>((body, this.members(&union.members, ordinals)?))
                            })?;
                            self.tree.decls[id].kind = EntryKind::Union {
                                fields: union_fields,
                            };
                            self.tree.member_decls.insert((scope, index), id);
                            self.tree.member_scopes.insert((scope, index), body);
                            fields.push(FieldEntry {
                                name: name.name.clone(),
                                r#type: FieldType::Group(id),
                            });
                        }
                        None => {
                            let (body, union_fields) = self.with_scope(|this| {
                                let body = this.push_scope();
                                Ok::<_, Error>((body, this.members(&union.members, ordinals)?))
                            })?;
                            self.tree.member_scopes.insert((scope, index), body);
                            fields.extend(union_fields);
                        }
                    }
                }
                Member::Group(group) => {
                    let id = self.push_decl(&group.name, EntryKind::Group { fields: Vec::new() })?;
                    let (body, group_fields) = self.with_scope(|this| {
                        let body = this.enter_decl(id);
                        Ok::<_, Error>((body, this.members(&group.members, ordinals)?))
                    })?;
                    self.tree.decls[id].kind = EntryKind::Group {
                        fields: group_fields,
                    };
                    self.tree.member_decls.insert((scope, index), id);
                    self.tree.member_scopes.insert((scope, index), body);
                    fields.push(FieldEntry {
                        name: group.name.name.clone(),
                        r#type: FieldType::Group(id),
                    });
                }
                Member::Decl(decl) => self.decl(index, decl)?,
            }
        }

        Ok(fields)
    }

    fn interface_members(
        &mut self,
        members: &[InterfaceMember],
    ) -> Result<Vec<(String, u16)>, Error> {
        let mut ordinals = Ordinals::default();
        let mut methods = Vec::new();

        for (index, member) in members.iter().enumerate() {
            match member {
                InterfaceMember::Method(method) => {
                    self.check_ordinal(&mut ordinals, &method.ordinal)?;
                    let results = method.results.iter().flatten();
                    for param in method.params.iter().chain(results) {
                        self.type_ref(&param.r#type);
                    }
                    methods.push((method.name.name.clone(), method.ordinal.value));
                }
                InterfaceMember::Decl(decl) => self.decl(index, decl)?,
            }
        }

        Ok(methods)
    }
}
