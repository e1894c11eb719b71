//! Binding of names, types, annotations and base interfaces.
//!
//! A dotted name is resolved one segment at a time. The first segment is
//! looked up lexically, walking outwards from the scope of the reference:
//! aliases are checked before declarations in each scope, and builtin types
//! are only considered once every scope has been searched. Later segments
//! are looked up among the members of what the previous segment bound.
//!
//! Names that cannot be found locally are left unresolved. Names looked up
//! inside an imported module must exist.

use crate::linked::{self, Builtin, DeclId, MethodRef, ModuleId, Reference, Type, Value};
use crate::reporting::{Error, ImportError, ImportErrorKind, ResolutionErrorKind};
use crate::resolve::scope_tree::{AliasTarget, EntryKind, ScopeId};
use crate::resolve::{Binding, Context};
use crate::syntax::{self, AnnotationTarget, Ident, ImportPath, Path, TypeRef};

impl<'l, 'a> Context<'l, 'a> {
    fn is_resolving(&self, scope: ScopeId, name: &str) -> bool {
        self.resolving_aliases
            .iter()
            .any(|(alias_scope, alias)| *alias_scope == scope && alias == name)
    }

    /// Look up a name in a single scope.
    fn lookup_local(&mut self, scope: ScopeId, name: &str) -> Result<Option<Binding>, Error> {
        let tree = self.tree;
        let frame = tree.scope(scope);

        if !self.is_resolving(scope, name) {
            if let Some(alias) = frame.alias(name) {
                let binding = match &alias.target {
                    AliasTarget::Path(path) => self.alias_path(scope, name, path)?,
                    AliasTarget::Import { import, path } => {
                        self.alias_import(scope, name, import, path)?
                    }
                };
                return Ok(Some(binding));
            }
        }

        Ok(frame.name(name).map(Binding::Decl))
    }

    /// Look up a name in a scope and each of its ancestors.
    fn lookup_lexical(&mut self, scope: ScopeId, name: &str) -> Result<Option<Binding>, Error> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            if let Some(binding) = self.lookup_local(scope, name)? {
                return Ok(Some(binding));
            }
            current = self.tree.scope(scope).parent;
        }
        Ok(None)
    }

    /// Resolve the target of the alias `name` declared in `scope`. The alias
    /// is hidden while its target is resolved.
    pub(super) fn alias_path(
        &mut self,
        scope: ScopeId,
        name: &str,
        target: &Path,
    ) -> Result<Binding, Error> {
        self.resolving_aliases.push((scope, name.to_owned()));
        let binding = self.resolve_path(scope, target);
        self.resolving_aliases.pop();
        binding
    }

    /// Resolve the target of the import alias `name` declared in `scope`.
    /// As with [`Context::alias_path`], the alias is hidden meanwhile, so an
    /// alias that imports itself ends in a lookup failure.
    pub(super) fn alias_import(
        &mut self,
        scope: ScopeId,
        name: &str,
        import: &ImportPath,
        segments: &[Ident],
    ) -> Result<Binding, Error> {
        self.resolving_aliases.push((scope, name.to_owned()));
        let binding = self.imported(scope, import, segments);
        self.resolving_aliases.pop();
        binding
    }

    pub(super) fn resolve_path(&mut self, scope: ScopeId, path: &Path) -> Result<Binding, Error> {
        let (first, rest) = match path.segments.split_first() {
            Some(segments) => segments,
            None => return Ok(Binding::Unresolved),
        };

        match self.lookup_lexical(scope, &first.name)? {
            Some(binding) => self.path_members(scope, binding, rest, false),
            None => match Builtin::from_name(&first.name) {
                Some(builtin) if rest.is_empty() => Ok(Binding::Builtin(builtin)),
                _ => Ok(Binding::Unresolved),
            },
        }
    }

    /// Follow the remaining segments of a path into the members of a binding.
    ///
    /// Members of a local declaration that cannot be found leave the path
    /// unresolved, unless `strict` is set. Lookups inside an imported module
    /// are always strict.
    fn path_members(
        &mut self,
        site: ScopeId,
        mut binding: Binding,
        segments: &[Ident],
        mut strict: bool,
    ) -> Result<Binding, Error> {
        let tree = self.tree;
        let modules = self.modules;

        for segment in segments {
            let (found, module) = match binding {
                Binding::Decl(id) => {
                    let entry = tree.decl(id);
                    let found = match entry.scope {
                        Some(body) => self.lookup_local(body, &segment.name)?,
                        None => None,
                    };
                    (found, entry.module)
                }
                Binding::Module(id) => {
                    strict = true;
                    (self.lookup_local(modules[id].scope, &segment.name)?, id)
                }
                Binding::Builtin(_) | Binding::Unresolved => return Ok(Binding::Unresolved),
            };

            binding = match found {
                Some(binding) => binding,
                None if strict => {
                    let kind = ResolutionErrorKind::ImportedNameNotFound {
                        name: segment.name.clone(),
                        import: modules[module].path.clone(),
                    };
                    return Err(self.error(site, segment.range, kind));
                }
                None => return Ok(Binding::Unresolved),
            };
        }

        Ok(binding)
    }

    pub(super) fn imported_module(
        &self,
        site: ScopeId,
        import: &ImportPath,
    ) -> Result<ModuleId, Error> {
        match self.by_path.get(&import.path) {
            Some(id) => Ok(*id),
            None => Err(Error::Import(ImportError {
                importer: self.module_path(site).to_owned(),
                range: import.range,
                path: import.path.clone(),
                kind: ImportErrorKind::NotFound,
            })),
        }
    }

    /// Resolve a path inside an imported module.
    pub(super) fn imported(
        &mut self,
        site: ScopeId,
        import: &ImportPath,
        segments: &[Ident],
    ) -> Result<Binding, Error> {
        let module = self.imported_module(site, import)?;
        self.path_members(site, Binding::Module(module), segments, true)
    }

    pub(super) fn reference(&self, binding: Binding, path: &Path) -> Reference {
        match binding {
            Binding::Decl(id) => Reference::Decl(id),
            Binding::Module(id) => Reference::Module(id),
            Binding::Builtin(builtin) => Reference::Builtin(builtin),
            Binding::Unresolved => Reference::Unresolved(path.clone()),
        }
    }

    pub(super) fn resolve_type(&mut self, scope: ScopeId, r#type: &TypeRef) -> Result<Type, Error> {
        let binding = match r#type {
            TypeRef::Named(path) => self.resolve_path(scope, path)?,
            TypeRef::List(_, element) => {
                return Ok(Type::List(Box::new(self.resolve_type(scope, element)?)))
            }
            TypeRef::ImportedName(_, import, segments) => self.imported(scope, import, segments)?,
        };

        match binding {
            Binding::Decl(id) if self.is_type(id) => Ok(Type::Decl(id)),
            Binding::Builtin(builtin) => Ok(Type::Builtin(builtin)),
            Binding::Unresolved => match r#type {
                TypeRef::Named(path) => Ok(Type::Unresolved(path.clone())),
                _ => Ok(Type::Unresolved(Path {
                    range: r#type.range(),
                    segments: Vec::new(),
                })),
            },
            Binding::Decl(_) | Binding::Module(_) => Err(self.error(
                scope,
                r#type.range(),
                ResolutionErrorKind::ExpectedType(r#type.to_string()),
            )),
        }
    }

    fn is_type(&self, id: DeclId) -> bool {
        matches!(
            self.tree.decl(id).kind,
            EntryKind::Struct { .. } | EntryKind::Enum { .. } | EntryKind::Interface { .. }
        )
    }

    pub(super) fn annotations(
        &mut self,
        scope: ScopeId,
        annotations: &[syntax::AnnotationApp],
        target: AnnotationTarget,
    ) -> Result<Vec<linked::AnnotationApp>, Error> {
        annotations
            .iter()
            .map(|annotation| self.annotation(scope, annotation, target))
            .collect()
    }

    fn annotation(
        &mut self,
        scope: ScopeId,
        annotation: &syntax::AnnotationApp,
        target: AnnotationTarget,
    ) -> Result<linked::AnnotationApp, Error> {
        let tree = self.tree;
        let not_an_annotation = |this: &Self| {
            let kind = ResolutionErrorKind::NotAnAnnotation(annotation.name.to_string());
            this.error(scope, annotation.name.range, kind)
        };

        let (reference, value) = match self.resolve_path(scope, &annotation.name)? {
            Binding::Decl(id) => {
                let entry = tree.decl(id);
                let (targets, r#type) = match &entry.kind {
                    EntryKind::Annotation { targets, r#type } => (targets, r#type),
                    _ => return Err(not_an_annotation(self)),
                };

                let applies = targets
                    .iter()
                    .any(|allowed| *allowed == target || *allowed == AnnotationTarget::All);
                if !applies {
                    let kind = ResolutionErrorKind::AnnotationTargetMismatch {
                        name: annotation.name.to_string(),
                        target: target.name(),
                    };
                    return Err(self.error(scope, annotation.range, kind));
                }

                let value = match &annotation.value {
                    Some(value) => {
                        let r#type = self.resolve_type(entry.parent_scope, r#type)?;
                        Some(self.eval(scope, &r#type, value)?)
                    }
                    None => None,
                };
                (Reference::Decl(id), value)
            }
            Binding::Unresolved => (
                Reference::Unresolved(annotation.name.clone()),
                annotation.value.clone().map(Value::Deferred),
            ),
            Binding::Module(_) | Binding::Builtin(_) => return Err(not_an_annotation(self)),
        };

        Ok(linked::AnnotationApp {
            name: annotation.name.clone(),
            target: reference,
            value,
        })
    }

    /// The interfaces listed in an interface's `extends` clause.
    pub(super) fn bases(&mut self, id: DeclId) -> Result<Vec<DeclId>, Error> {
        let tree = self.tree;
        let entry = tree.decl(id);
        match &entry.kind {
            EntryKind::Interface { extends, .. } => extends
                .iter()
                .map(|base| self.base(entry.parent_scope, base))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    fn base(&mut self, scope: ScopeId, base: &TypeRef) -> Result<DeclId, Error> {
        let binding = match base {
            TypeRef::Named(path) => self.resolve_path(scope, path)?,
            TypeRef::ImportedName(_, import, segments) => self.imported(scope, import, segments)?,
            TypeRef::List(_, _) => Binding::Unresolved,
        };

        match binding {
            Binding::Decl(id) if matches!(self.tree.decl(id).kind, EntryKind::Interface { .. }) => {
                Ok(id)
            }
            Binding::Unresolved if !matches!(base, TypeRef::List(_, _)) => Err(self.error(
                scope,
                base.range(),
                ResolutionErrorKind::UnresolvedBaseInterface(base.to_string()),
            )),
            _ => Err(self.error(
                scope,
                base.range(),
                ResolutionErrorKind::NotAnInterface(base.to_string()),
            )),
        }
    }

    /// The methods of an interface, followed by the methods it inherits from
    /// each of its bases in the order they are listed. Methods inherited
    /// through more than one base are only included once.
    pub(super) fn effective_methods(&mut self, id: DeclId) -> Result<Vec<MethodRef>, Error> {
        if let Some(methods) = self.effective_methods.get(&id) {
            return Ok(methods.clone());
        }
        if self.inheriting.contains(&id) {
            let entry = self.tree.decl(id);
            let kind = ResolutionErrorKind::CyclicInheritance(self.qualified_name(id));
            return Err(self.error(entry.parent_scope, entry.range, kind));
        }

        self.inheriting.push(id);
        let methods = self.collect_methods(id);
        self.inheriting.pop();

        let methods = methods?;
        self.effective_methods.insert(id, methods.clone());
        Ok(methods)
    }

    fn collect_methods(&mut self, id: DeclId) -> Result<Vec<MethodRef>, Error> {
        let mut methods = match &self.tree.decl(id).kind {
            EntryKind::Interface { methods, .. } => methods
                .iter()
                .map(|(name, ordinal)| MethodRef {
                    interface: id,
                    name: name.clone(),
                    ordinal: *ordinal,
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };

        for base in self.bases(id)? {
            for method in self.effective_methods(base)? {
                let seen = methods.iter().any(|seen| {
                    seen.interface == method.interface && seen.ordinal == method.ordinal
                });
                if !seen {
                    methods.push(method);
                }
            }
        }

        Ok(methods)
    }
}
