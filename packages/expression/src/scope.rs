use crate::error::{EvalError, EvalResult};
use crate::expression::Expression;
use crate::value::{Value, ValueType};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A named, typed slot. `value` is `None` for a declared but unbound name
/// (an argument at bind time, or one whose literal failed to parse).
/// `failure` records why a value could not be produced; it is raised when
/// the name is used.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: ValueType,
    pub value: Option<Expression<Value>>,
    pub failure: Option<EvalError>,
}

impl Binding {
    pub fn new(ty: ValueType, value: Expression<Value>) -> Self {
        Self {
            ty,
            value: Some(value),
            failure: None,
        }
    }

    pub fn declared(ty: ValueType) -> Self {
        Self {
            ty,
            value: None,
            failure: None,
        }
    }

    pub fn failed(ty: ValueType, failure: EvalError) -> Self {
        Self {
            ty,
            value: None,
            failure: Some(failure),
        }
    }

    /// The error for using `name` while it has no value.
    pub fn missing(&self, name: &str) -> EvalError {
        self.failure.clone().unwrap_or_else(|| EvalError::Unbound {
            name: name.to_string(),
        })
    }
}

pub type NativeFn = Rc<dyn Fn(&[Value]) -> EvalResult<Value>>;

/// Function supplied by the host (for example font metrics). Never folded.
#[derive(Clone)]
pub struct HostFunction {
    pub name: String,
    pub params: Vec<ValueType>,
    pub returns: ValueType,
    call: NativeFn,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ValueType>,
        returns: ValueType,
        call: impl Fn(&[Value]) -> EvalResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            call: Rc::new(call),
        }
    }

    pub fn call(&self, args: &[Value]) -> EvalResult<Value> {
        (self.call)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Immutable once shared: scopes are built, then wrapped in `Rc` and used
/// as the parent of the next level (pattern, div, loop iteration, child).
#[derive(Debug, Clone, Default)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    bindings: HashMap<String, Binding>,
    functions: HashMap<String, Rc<HostFunction>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Rc<Scope>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Binds a constant; the type is taken from the value.
    pub fn bind_value(&mut self, name: impl Into<String>, value: Value) {
        let ty = value.value_type();
        self.bind(name, Binding::new(ty, Expression::Constant(value)));
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: ValueType) {
        self.bind(name, Binding::declared(ty));
    }

    pub fn define_function(&mut self, function: HostFunction) {
        self.functions
            .insert(function.name.clone(), Rc::new(function));
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.resolve(name).map(|(binding, _)| binding)
    }

    /// Looks `name` up and also returns the scope that defines it, which is
    /// where a formula binding must be evaluated.
    pub fn resolve(&self, name: &str) -> Option<(&Binding, &Scope)> {
        match self.bindings.get(name) {
            Some(binding) => Some((binding, self)),
            None => self.parent.as_ref().and_then(|p| p.resolve(name)),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Rc<HostFunction>> {
        self.functions
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.function(name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Whether a builtin called `name` is hidden by something in scope.
    pub fn shadows(&self, name: &str) -> bool {
        self.contains(name) || self.function(name).is_some()
    }

    pub fn type_of(&self, name: &str) -> Option<&ValueType> {
        self.lookup(name).map(|b| &b.ty)
    }

    /// Names visible from here, nearest definition wins.
    pub fn collect_all(&self) -> HashMap<String, ValueType> {
        let mut all = self
            .parent
            .as_ref()
            .map(|p| p.collect_all())
            .unwrap_or_default();
        all.extend(
            self.bindings
                .iter()
                .map(|(name, binding)| (name.clone(), binding.ty.clone())),
        );
        all
    }

    /// Identity used by the evaluator's recursion guard.
    pub(crate) fn id(&self) -> usize {
        self as *const Scope as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_lookup_and_shadowing() {
        let mut root = Scope::new();
        root.bind_value("x", Value::Int(1));
        root.bind_value("y", Value::Int(2));
        let root = Rc::new(root);

        let mut child = Scope::with_parent(root.clone());
        child.bind_value("x", Value::Int(10));

        assert_eq!(child.lookup("x").and_then(|b| b.value.clone()), Some(Expression::Constant(Value::Int(10))));
        let (_, owner) = child.resolve("y").unwrap();
        assert!(std::ptr::eq(owner, root.as_ref()));
        assert!(root.lookup("z").is_none());
    }

    #[test]
    fn test_declared_is_unbound() {
        let mut scope = Scope::new();
        scope.declare("count", ValueType::Int);
        assert!(scope.contains("count"));
        assert_eq!(scope.lookup("count").unwrap().value, None);
        assert_eq!(scope.type_of("count"), Some(&ValueType::Int));
    }

    #[test]
    fn test_failed_binding_reports_its_cause() {
        let mut scope = Scope::new();
        scope.bind("size", Binding::failed(ValueType::Scalar, EvalError::DivisionByZero));
        scope.declare("count", ValueType::Int);
        assert_eq!(scope.lookup("size").unwrap().missing("size"), EvalError::DivisionByZero);
        assert_eq!(
            scope.lookup("count").unwrap().missing("count"),
            EvalError::Unbound { name: "count".into() }
        );
    }

    #[test]
    fn test_functions_shadow_builtins() {
        let mut root = Scope::new();
        root.define_function(HostFunction::new(
            "text_width",
            vec![ValueType::String, ValueType::Scalar],
            ValueType::Scalar,
            |args| Ok(Value::Scalar(args.len() as f64)),
        ));
        let child = Scope::with_parent(Rc::new(root));
        assert!(child.shadows("text_width"));
        assert!(!child.shadows("red"));
        let f = child.function("text_width").unwrap();
        assert_eq!(f.call(&[]), Ok(Value::Scalar(0.0)));
    }

    #[test]
    fn test_collect_all() {
        let mut root = Scope::new();
        root.declare("width", ValueType::Scalar);
        let mut child = Scope::with_parent(Rc::new(root));
        child.declare("width", ValueType::Int);
        child.declare("i", ValueType::Int);
        let all = child.collect_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("width"), Some(&ValueType::Int));
    }
}
