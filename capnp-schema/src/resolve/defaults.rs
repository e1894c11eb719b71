//! Evaluation of default values and annotation arguments.

use crate::linked::{Builtin, DeclId, Type, Value};
use crate::literal::{self, Number};
use crate::reporting::{suggest_name, Error, ResolutionErrorKind, SyntaxErrorKind};
use crate::resolve::scope_tree::{EntryKind, FieldType, ScopeId};
use crate::resolve::{Binding, Context};
use crate::syntax::{Ident, Literal, Path};

impl<'l, 'a> Context<'l, 'a> {
    /// Evaluate a literal written in `scope` against the type it is written
    /// for. Literals for unresolved types are deferred rather than checked.
    pub(super) fn eval(
        &mut self,
        scope: ScopeId,
        r#type: &Type,
        literal: &Literal,
    ) -> Result<Value, Error> {
        match (r#type, literal) {
            (Type::Unresolved(_), _) => Ok(Value::Deferred(literal.clone())),
            (Type::Decl(id), Literal::Name(path)) if self.is_enum(*id) => {
                self.enumerant(scope, *id, path)
            }
            (_, Literal::Name(path)) => self.const_ref(scope, path),
            (Type::Builtin(builtin), _) => self.builtin_value(scope, *builtin, literal),
            (Type::List(element), Literal::List(_, elements)) => elements
                .iter()
                .map(|element_literal| self.eval(scope, element, element_literal))
                .collect::<Result<_, _>>()
                .map(Value::List),
            (Type::Decl(id), Literal::Struct(_, fields))
                if self.tree.decl(*id).kind.fields().is_some() =>
            {
                self.struct_value(scope, *id, fields)
            }
            (_, _) => Err(self.mismatch(scope, r#type, literal)),
        }
    }

    fn is_enum(&self, id: DeclId) -> bool {
        matches!(self.tree.decl(id).kind, EntryKind::Enum { .. })
    }

    fn mismatch(&self, scope: ScopeId, r#type: &Type, literal: &Literal) -> Error {
        let kind = SyntaxErrorKind::MismatchedLiteral {
            expected: self.type_name(r#type),
            found: literal.description(),
        };
        self.syntax_error(scope, literal.range(), kind)
    }

    fn type_name(&self, r#type: &Type) -> String {
        match r#type {
            Type::Builtin(builtin) => builtin.name().to_owned(),
            Type::Decl(id) => self.qualified_name(*id),
            Type::List(element) => format!("List({})", self.type_name(element)),
            Type::Unresolved(path) => path.to_string(),
        }
    }

    fn builtin_value(
        &self,
        scope: ScopeId,
        builtin: Builtin,
        literal: &Literal,
    ) -> Result<Value, Error> {
        match (builtin, literal) {
            (Builtin::Void, Literal::Void(_)) => Ok(Value::Void),
            (Builtin::Bool, Literal::Bool(_, value)) => Ok(Value::Bool(*value)),
            (Builtin::Text, Literal::Text(_, text)) => Ok(Value::Text(text.clone())),
            (Builtin::Data, Literal::Text(_, text)) => Ok(Value::Data(text.as_bytes().to_vec())),
            (_, Literal::Int(range, text) | Literal::Float(range, text)) => {
                let limits = match builtin.limits() {
                    Some(limits) => limits,
                    None => return Err(self.mismatch(scope, &Type::Builtin(builtin), literal)),
                };
                match literal::parse_number(text, &limits) {
                    Ok(Number::Integer(value)) => Ok(Value::Int(value)),
                    Ok(Number::Float(value)) => Ok(Value::Float(value)),
                    Err(error) => Err(self.syntax_error(
                        scope,
                        *range,
                        SyntaxErrorKind::InvalidNumericLiteral(error),
                    )),
                }
            }
            (_, _) => Err(self.mismatch(scope, &Type::Builtin(builtin), literal)),
        }
    }

    /// A name written for an enum type. Single names are looked up among
    /// the enumerants first.
    fn enumerant(&mut self, scope: ScopeId, id: DeclId, path: &Path) -> Result<Value, Error> {
        let tree = self.tree;
        let (name, enumerants) = match (path.segments.as_slice(), &tree.decl(id).kind) {
            ([name], EntryKind::Enum { enumerants }) => (name, enumerants),
            _ => return self.const_ref(scope, path),
        };

        let found = enumerants.iter().find(|(enumerant, _)| *enumerant == name.name);
        if let Some((_, ordinal)) = found {
            return Ok(Value::Enumerant {
                r#enum: id,
                ordinal: *ordinal,
            });
        }

        match self.resolve_path(scope, path)? {
            Binding::Decl(id) if matches!(tree.decl(id).kind, EntryKind::Const) => {
                Ok(Value::Const(id))
            }
            _ => {
                let candidates = enumerants.iter().map(|(enumerant, _)| enumerant.as_str());
                let kind = ResolutionErrorKind::UnknownEnumerant {
                    name: name.name.clone(),
                    parent: self.qualified_name(id),
                    suggestion: suggest_name(&name.name, candidates),
                };
                Err(self.error(scope, name.range, kind))
            }
        }
    }

    fn const_ref(&mut self, scope: ScopeId, path: &Path) -> Result<Value, Error> {
        match self.resolve_path(scope, path)? {
            Binding::Decl(id) if matches!(self.tree.decl(id).kind, EntryKind::Const) => {
                Ok(Value::Const(id))
            }
            Binding::Unresolved => Ok(Value::UnresolvedConst(path.clone())),
            Binding::Decl(_) | Binding::Module(_) | Binding::Builtin(_) => Err(self.error(
                scope,
                path.range,
                ResolutionErrorKind::NotAConstant(path.to_string()),
            )),
        }
    }

    /// A struct literal for a struct, or for a named union or group.
    fn struct_value(
        &mut self,
        scope: ScopeId,
        id: DeclId,
        fields: &[(Ident, Literal)],
    ) -> Result<Value, Error> {
        let tree = self.tree;
        let entries = tree.decl(id).kind.fields().unwrap_or_default();
        let mut values = Vec::with_capacity(fields.len());

        for (name, literal) in fields {
            let field = match entries.iter().find(|field| field.name == name.name) {
                Some(field) => field,
                None => {
                    let candidates = entries.iter().map(|field| field.name.as_str());
                    let kind = ResolutionErrorKind::UnknownField {
                        name: name.name.clone(),
                        parent: self.qualified_name(id),
                        suggestion: suggest_name(&name.name, candidates),
                    };
                    return Err(self.error(scope, name.range, kind));
                }
            };

            let r#type = match &field.r#type {
                FieldType::Type(r#type, field_scope) => self.resolve_type(*field_scope, r#type)?,
                FieldType::Group(group) => Type::Decl(*group),
            };
            values.push((name.name.clone(), self.eval(scope, &r#type, literal)?));
        }

        Ok(Value::Struct(values))
    }
}
