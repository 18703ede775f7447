//! Type system for the Home language.
//!
//! A small, structurally-equal-for-primitives / nominal-for-structs type
//! lattice, plus the lexically scoped type environment the checker walks
//! alongside the AST.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A type assigned to an expression or declared on a binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Void,
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// Nominal: two `Struct`s are equal iff their names match, regardless
    /// of field contents (fields are carried for field-access lookups).
    Struct {
        name: String,
        fields: Vec<(String, Type)>,
    },
    /// An unresolved generic type parameter, e.g. `T` in `fn id<T>(x: T) -> T`.
    Generic { name: String, bounds: Vec<String> },
    Result {
        ok: Box<Type>,
        err: Box<Type>,
    },
    Reference(Box<Type>),
    MutableReference(Box<Type>),
}

impl Type {
    /// Primitive value types are `Copy`; reading them never moves the
    /// binding. Everything else (strings, structs, references) is move-only.
    pub fn is_copy(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Strip any number of `&`/`&mut` layers to reach the underlying type,
    /// used for auto-deref on field access.
    pub fn deref_fully(&self) -> &Type {
        match self {
            Type::Reference(inner) | Type::MutableReference(inner) => inner.deref_fully(),
            other => other,
        }
    }

    pub fn struct_fields(&self) -> Option<&[(String, Type)]> {
        match self.deref_fully() {
            Type::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Void => write!(f, "void"),
            Type::Function { params, ret } => {
                let params: Vec<_> = params.iter().map(|t| t.to_string()).collect();
                write!(f, "fn({}) -> {}", params.join(", "), ret)
            }
            Type::Struct { name, .. } => write!(f, "{}", name),
            Type::Generic { name, .. } => write!(f, "{}", name),
            Type::Result { ok, err } => write!(f, "Result<{}, {}>", ok, err),
            Type::Reference(inner) => write!(f, "&{}", inner),
            Type::MutableReference(inner) => write!(f, "&mut {}", inner),
        }
    }
}

/// A binding's declared/inferred type plus its declared mutability; the
/// ownership tracker keeps its own, separate state machine for the same
/// name (see `ownership.rs`) rather than folding it in here, so the type
/// environment stays a pure "what type is this" lookup.
#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub mutable: bool,
}

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
}

/// A chained mapping from identifier to type. A child scope's lookup falls
/// through to its parent; the environment itself is the stack of scopes,
/// and popping a scope drops its bindings in one step.
pub struct TypeEnv {
    scopes: Vec<Scope>,
    /// Return type of the innermost enclosing function, used to validate
    /// `return` statements and `?` propagation. `None` outside any function.
    fn_return_stack: Vec<Option<Rc<Type>>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv {
            scopes: vec![Scope::default()],
            fn_return_stack: vec![None],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the root scope");
    }

    pub fn enter_function(&mut self, return_type: Type) {
        self.push_scope();
        self.fn_return_stack.push(Some(Rc::new(return_type)));
    }

    pub fn exit_function(&mut self) {
        self.pop_scope();
        self.fn_return_stack.pop();
    }

    pub fn current_return_type(&self) -> Option<&Type> {
        self.fn_return_stack
            .last()
            .and_then(|t| t.as_deref())
    }

    pub fn define(&mut self, name: impl Into<String>, ty: Type, mutable: bool) {
        self.scopes
            .last_mut()
            .expect("at least one scope")
            .bindings
            .insert(name.into(), Binding { ty, mutable });
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// True if `name` is declared in the innermost scope only (used to
    /// detect shadowing-within-the-same-block, a `DuplicateDeclaration`).
    pub fn declared_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .map(|s| s.bindings.contains_key(name))
            .unwrap_or(false)
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_falls_through_to_parent() {
        let mut env = TypeEnv::new();
        env.define("a", Type::Int, false);
        env.push_scope();
        assert_eq!(env.lookup("a").map(|b| &b.ty), Some(&Type::Int));
        env.pop_scope();
        assert_eq!(env.lookup("a").map(|b| &b.ty), Some(&Type::Int));
    }

    #[test]
    fn child_scope_shadows_parent() {
        let mut env = TypeEnv::new();
        env.define("a", Type::Int, false);
        env.push_scope();
        env.define("a", Type::String, false);
        assert_eq!(env.lookup("a").map(|b| &b.ty), Some(&Type::String));
        env.pop_scope();
        assert_eq!(env.lookup("a").map(|b| &b.ty), Some(&Type::Int));
    }

    #[test]
    fn dropping_child_scope_drops_its_bindings() {
        let mut env = TypeEnv::new();
        env.push_scope();
        env.define("local", Type::Bool, false);
        env.pop_scope();
        assert!(env.lookup("local").is_none());
    }

    #[test]
    fn function_return_type_is_scoped() {
        let mut env = TypeEnv::new();
        assert_eq!(env.current_return_type(), None);
        env.enter_function(Type::Int);
        assert_eq!(env.current_return_type(), Some(&Type::Int));
        env.exit_function();
        assert_eq!(env.current_return_type(), None);
    }

    #[test]
    fn copy_types() {
        assert!(Type::Int.is_copy());
        assert!(Type::Float.is_copy());
        assert!(Type::Bool.is_copy());
        assert!(!Type::String.is_copy());
        assert!(
            !Type::Struct {
                name: "Point".into(),
                fields: vec![]
            }
            .is_copy()
        );
    }

    #[test]
    fn deref_fully_strips_references() {
        let s = Type::Struct {
            name: "Point".into(),
            fields: vec![("x".into(), Type::Int)],
        };
        let r = Type::MutableReference(Box::new(Type::Reference(Box::new(s.clone()))));
        assert_eq!(r.deref_fully(), &s);
    }
}
