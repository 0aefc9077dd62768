//! Argument declarations and their binding against a pattern instance.

use crate::canvas;
use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::rc::Rc;
use stencil_expression::{
    check_as, parse_typed, Ast, AstKind, Binding, EvalError, EvalResult, Expression, Formula,
    LiteralContext, Scope, Value, ValueType,
};
use stencil_parser::{Arena, Diagnostic, DiagnosticKind, Diagnostics, NodeId, Span};
use tracing::{debug, instrument, warn};

/// Attribute text as written, with its parsed value.
#[derive(Debug, Clone, Serialize)]
pub struct Literal {
    pub text: String,
    pub span: Span,
    pub value: Expression<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ArgumentSource {
    /// Attribute `name`.
    Singular,
    /// Attributes `name1`, `name2`, ... collected into a list.
    Numbered,
    /// Taken from the instance's entries instead of its attributes.
    Entry,
    /// Attributes `name-member`, collected into a record.
    Grouped { members: Vec<Argument> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Argument {
    pub name: String,
    /// Variable the value is bound to inside the pattern.
    pub var: String,
    /// Declared type; the item type for numbered arguments and a record of
    /// the members for groups.
    pub ty: ValueType,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Literal>,
    pub source: ArgumentSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<Expression<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub span: Span,
}

impl Argument {
    /// Type of the variable this argument binds.
    pub fn binding_type(&self) -> ValueType {
        match &self.source {
            ArgumentSource::Numbered => ValueType::list_of(self.ty.clone()),
            _ => self.ty.clone(),
        }
    }

    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("argument '{}' failed its test", self.name))
    }
}

/// Pattern-level `<validate>`.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub test: Expression<bool>,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceAttribute {
    pub name: String,
    pub value: String,
    pub name_span: Span,
    pub value_span: Span,
}

/// The values one use of a pattern supplies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub attributes: Vec<InstanceAttribute>,
    pub entries: BTreeMap<String, Value>,
    pub span: Span,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute. Spans are laid out as if the attributes were
    /// written `name="value"` one after another, so each stays distinct.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        let offset = self
            .attributes
            .last()
            .map(|a| a.value_span.end() + 2)
            .unwrap_or(0);
        let name_span = Span::new(offset, 1, offset + 1, name.len());
        let value_offset = offset + name.len() + 2;
        let value_span = Span::new(value_offset, 1, value_offset + 1, value.len());
        self.attributes.push(InstanceAttribute {
            name,
            value,
            name_span,
            value_span,
        });
        self
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), value);
        self
    }

    /// Reads an instance written as markup, e.g. `<button label="Go"/>`.
    pub fn from_element(arena: &Arena, id: NodeId) -> Option<Self> {
        let element = arena.element(id)?;
        Some(Self {
            attributes: element
                .attributes
                .iter()
                .map(|a| InstanceAttribute {
                    name: a.name.clone(),
                    value: a.value.clone(),
                    name_span: a.name_span,
                    value_span: a.value_span,
                })
                .collect(),
            entries: BTreeMap::new(),
            span: arena.get(id).span,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&InstanceAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A resolved argument before it is placed in a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Expression(Expression<Value>),
    Group(BTreeMap<String, ArgumentValue>),
}

impl ArgumentValue {
    /// A single expression; groups with formula members are evaluated in
    /// `scope` into a record. The first failing member fails the group.
    pub fn resolve(&self, scope: &Scope) -> EvalResult<Expression<Value>> {
        match self {
            ArgumentValue::Expression(expr) => Ok(expr.clone()),
            ArgumentValue::Group(members) => {
                let mut fields = BTreeMap::new();
                for (name, member) in members {
                    let value = match member.resolve(scope)? {
                        Expression::Constant(value) => value,
                        formula => formula.eval(scope)?,
                    };
                    fields.insert(name.clone(), value);
                }
                Ok(Expression::Constant(Value::Record(fields)))
            }
        }
    }

    pub fn is_constant(&self) -> bool {
        match self {
            ArgumentValue::Expression(expr) => expr.is_constant(),
            ArgumentValue::Group(members) => members.values().all(ArgumentValue::is_constant),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundArgument {
    pub ty: ValueType,
    /// `None` when the argument is unbound.
    pub value: Option<ArgumentValue>,
}

/// Bound arguments keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArgumentValues {
    values: BTreeMap<String, BoundArgument>,
}

impl ArgumentValues {
    pub fn get(&self, var: &str) -> Option<&BoundArgument> {
        self.values.get(var)
    }

    pub fn is_bound(&self, var: &str) -> bool {
        self.get(var).is_some_and(|b| b.value.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BoundArgument)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The constant value of `var`, if it has one.
    pub fn constant(&self, var: &str) -> Option<Value> {
        match self.get(var)?.value.as_ref()? {
            ArgumentValue::Expression(Expression::Constant(value)) => Some(value.clone()),
            group @ ArgumentValue::Group(_) if group.is_constant() => {
                group.resolve(&Scope::new()).ok()?.as_constant().cloned()
            }
            _ => None,
        }
    }

    /// Scope holding every argument, evaluated lazily in `parent`. A group
    /// whose members fail to evaluate is bound to that failure, so using it
    /// reports the real cause.
    pub fn scope(&self, parent: Rc<Scope>) -> Scope {
        let mut scope = Scope::with_parent(parent.clone());
        for (var, bound) in &self.values {
            let binding = match bound.value.as_ref().map(|v| v.resolve(&parent)) {
                Some(Ok(expr)) => Binding::new(bound.ty.clone(), expr),
                Some(Err(err)) => {
                    debug!(argument = %var, error = %err, "argument group failed to evaluate");
                    Binding::failed(bound.ty.clone(), err)
                }
                None => Binding::declared(bound.ty.clone()),
            };
            scope.bind(var.clone(), binding);
        }
        scope
    }

    fn insert(&mut self, arg: &Argument, value: Option<ArgumentValue>) {
        self.values.insert(
            arg.var.clone(),
            BoundArgument {
                ty: arg.binding_type(),
                value,
            },
        );
    }
}

impl Pattern {
    /// Binds the arguments of one instance. Never fails: every problem is a
    /// diagnostic and the affected argument falls back to its default or
    /// stays unbound.
    #[instrument(skip(self, instance), fields(pattern = %self.qualified_name))]
    pub fn bind_arguments(&self, instance: &Instance) -> (ArgumentValues, Diagnostics) {
        let canvas = Rc::new(canvas::declarations());
        let mut binder = ArgumentBinder {
            instance,
            canvas: &canvas,
            diagnostics: Diagnostics::new(),
            consumed: HashSet::new(),
        };

        let mut values = ArgumentValues::default();
        for arg in &self.arguments {
            let value = binder.bind(arg, &arg.name);
            values.insert(arg, value);
        }

        for (index, attr) in instance.attributes.iter().enumerate() {
            if !binder.consumed.contains(&index) {
                warn!(attribute = %attr.name, "instance attribute matches no argument");
                binder.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Semantic,
                    attr.name_span,
                    format!(
                        "'{}' is not an argument of pattern '{}'",
                        attr.name, self.qualified_name
                    ),
                ));
            }
        }

        let scope = values.scope(canvas.clone());
        binder.run_tests(self, &scope, instance);
        debug!(
            bound = values.iter().filter(|(_, b)| b.value.is_some()).count(),
            diagnostics = binder.diagnostics.len(),
            "bound instance arguments"
        );
        (values, binder.diagnostics)
    }

    /// An instance made of every argument's `example` value.
    pub fn example_instance(&self) -> Instance {
        let mut instance = Instance {
            span: self.span,
            ..Instance::default()
        };
        for arg in &self.arguments {
            add_example(&mut instance, arg, &arg.name);
        }
        instance
    }
}

fn add_example(instance: &mut Instance, arg: &Argument, attribute: &str) {
    match &arg.source {
        ArgumentSource::Grouped { members } => {
            for member in members {
                add_example(instance, member, &format!("{}-{}", attribute, member.name));
            }
        }
        ArgumentSource::Singular => {
            if let Some(example) = &arg.example {
                instance.attributes.push(InstanceAttribute {
                    name: attribute.to_string(),
                    value: example.text.clone(),
                    name_span: example.span,
                    value_span: example.span,
                });
            }
        }
        ArgumentSource::Numbered => {
            if let Some(example) = &arg.example {
                for (i, (text, range)) in split_items(&example.text).into_iter().enumerate() {
                    let span = example.span.narrow(&example.text, range);
                    instance.attributes.push(InstanceAttribute {
                        name: format!("{}{}", attribute, i + 1),
                        value: text.to_string(),
                        name_span: span,
                        value_span: span,
                    });
                }
            }
        }
        ArgumentSource::Entry => {
            if let Some(value) = arg
                .example
                .as_ref()
                .and_then(|e| e.value.as_constant().cloned())
            {
                instance.entries.insert(arg.name.clone(), value);
            }
        }
    }
}

/// Splits a list literal into items: commas and whitespace separate,
/// brackets and quotes group. Empty items are dropped.
pub(crate) fn split_items(text: &str) -> Vec<(&str, Range<usize>)> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                start.get_or_insert(i);
            }
            '{' | '(' | '[' => {
                depth += 1;
                start.get_or_insert(i);
            }
            '}' | ')' | ']' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c == ',' || c.is_whitespace()) => {
                if let Some(s) = start.take() {
                    items.push((&text[s..i], s..i));
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        items.push((&text[s..], s..text.len()));
    }
    items
}

struct ArgumentBinder<'a> {
    instance: &'a Instance,
    canvas: &'a Scope,
    diagnostics: Diagnostics,
    consumed: HashSet<usize>,
}

impl<'a> ArgumentBinder<'a> {
    fn bind(&mut self, arg: &Argument, attribute: &str) -> Option<ArgumentValue> {
        match &arg.source {
            ArgumentSource::Singular => self.bind_singular(arg, attribute),
            ArgumentSource::Numbered => self.bind_numbered(arg, attribute),
            ArgumentSource::Entry => self.bind_entry(arg),
            ArgumentSource::Grouped { members } => {
                let mut fields = BTreeMap::new();
                let mut complete = true;
                for member in members {
                    let name = format!("{}-{}", attribute, member.name);
                    match self.bind(member, &name) {
                        Some(value) => {
                            fields.insert(member.var.clone(), value);
                        }
                        None => complete = false,
                    }
                }
                complete.then_some(ArgumentValue::Group(fields))
            }
        }
    }

    fn find(&mut self, name: &str) -> Option<&'a InstanceAttribute> {
        let instance = self.instance;
        let index = instance.attributes.iter().position(|a| a.name == name)?;
        self.consumed.insert(index);
        instance.attributes.get(index)
    }

    fn bind_singular(&mut self, arg: &Argument, attribute: &str) -> Option<ArgumentValue> {
        let Some(attr) = self.find(attribute) else {
            return self.missing(arg, attribute);
        };
        match self.parse(attr, &arg.ty) {
            Some(expr) => Some(ArgumentValue::Expression(expr)),
            None => self.fall_back(arg),
        }
    }

    fn bind_numbered(&mut self, arg: &Argument, attribute: &str) -> Option<ArgumentValue> {
        let mut numbered: Vec<(u32, usize)> = self
            .instance
            .attributes
            .iter()
            .enumerate()
            .filter_map(|(index, a)| {
                let suffix = a.name.strip_prefix(attribute)?;
                if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let n = suffix.parse::<u32>().ok().filter(|n| *n > 0)?;
                Some((n, index))
            })
            .collect();
        numbered.sort();

        if numbered.is_empty() {
            return if arg.is_required() {
                self.missing(arg, &format!("{}1", attribute))
            } else {
                Some(ArgumentValue::Expression(Expression::Constant(Value::List(
                    Vec::new(),
                ))))
            };
        }

        let instance = self.instance;
        let mut items = Vec::new();
        let mut failed = false;
        let mut expected = 1;
        for (n, index) in numbered {
            self.consumed.insert(index);
            let attr = &instance.attributes[index];
            if n != expected {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Semantic,
                    attr.name_span,
                    format!(
                        "'{}' skips '{}{}'; the gap is ignored",
                        attr.name, attribute, expected
                    ),
                ));
            }
            expected = n + 1;

            match self.parse(attr, &arg.ty) {
                Some(expr) => items.push(expr),
                None => match &arg.default {
                    Some(default) => items.push(default.value.clone()),
                    None => failed = true,
                },
            }
        }

        if failed {
            self.unbound(arg);
            return None;
        }
        Some(ArgumentValue::Expression(list_expression(items, &arg.ty)))
    }

    fn bind_entry(&mut self, arg: &Argument) -> Option<ArgumentValue> {
        let Some(value) = self.instance.entries.get(&arg.name) else {
            return self.missing(arg, &arg.name);
        };
        match value.clone().coerce(&arg.ty) {
            Ok(value) => Some(ArgumentValue::Expression(Expression::Constant(value))),
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Semantic,
                        self.instance.span,
                        format!("entry '{}' does not fit its argument", arg.name),
                    )
                    .with_cause(err.to_string()),
                );
                self.fall_back(arg)
            }
        }
    }

    /// Parses one instance literal, reporting format and type problems.
    fn parse(&mut self, attr: &InstanceAttribute, ty: &ValueType) -> Option<Expression<Value>> {
        let ctx = LiteralContext::new(self.canvas);
        let value_span = |range: Range<usize>| {
            if attr.value_span.length == attr.value.len() {
                attr.value_span.narrow(&attr.value, range)
            } else {
                attr.value_span
            }
        };
        match parse_typed(&attr.value, ty, &ctx) {
            Ok(expr) => {
                if let Some(formula) = expr.formula() {
                    let errors = check_as(formula.ast(), ty, self.canvas);
                    if let Some(first) = errors.first() {
                        self.diagnostics.push(Diagnostic::error(
                            DiagnosticKind::Semantic,
                            value_span(first.range()),
                            first.to_string(),
                        ));
                        return None;
                    }
                }
                Some(expr)
            }
            Err(err) => {
                warn!(attribute = %attr.name, error = %err, "invalid argument literal");
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Semantic,
                        value_span(err.range()),
                        format!("invalid value for '{}'", attr.name),
                    )
                    .with_cause(err.to_string()),
                );
                None
            }
        }
    }

    /// After an invalid value: the default if there is one, else unbound.
    fn fall_back(&mut self, arg: &Argument) -> Option<ArgumentValue> {
        match &arg.default {
            Some(default) => Some(ArgumentValue::Expression(default.value.clone())),
            None => {
                self.unbound(arg);
                None
            }
        }
    }

    fn missing(&mut self, arg: &Argument, attribute: &str) -> Option<ArgumentValue> {
        if let Some(default) = &arg.default {
            return Some(ArgumentValue::Expression(default.value.clone()));
        }
        if !arg.optional {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::Semantic,
                arg.span,
                format!("missing required argument '{}'", attribute),
            ));
        }
        None
    }

    fn unbound(&mut self, arg: &Argument) {
        self.diagnostics.push(Diagnostic::error(
            DiagnosticKind::Semantic,
            arg.span,
            format!("argument '{}' has no usable value and no default", arg.name),
        ));
    }

    fn run_tests(&mut self, pattern: &Pattern, scope: &Scope, instance: &Instance) {
        for arg in &pattern.arguments {
            let Some(test) = &arg.test else { continue };
            if let Some(false) = self.evaluate(test, scope, arg.span) {
                let span = instance
                    .attribute(&arg.name)
                    .map(|a| a.value_span)
                    .unwrap_or(arg.span);
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Semantic,
                    span,
                    arg.failure_message(),
                ));
            }
        }
        for validation in &pattern.validations {
            if let Some(false) = self.evaluate(&validation.test, scope, validation.span) {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Semantic,
                    validation.span,
                    validation.message.clone(),
                ));
            }
        }
    }

    /// `None` when the test cannot run here (it reads an unbound value).
    fn evaluate(&mut self, test: &Expression<bool>, scope: &Scope, span: Span) -> Option<bool> {
        match test.eval(scope) {
            Ok(passed) => Some(passed),
            Err(EvalError::Unbound { .. }) => None,
            Err(err) => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Evaluation,
                    span,
                    err.to_string(),
                ));
                None
            }
        }
    }
}

fn list_expression(items: Vec<Expression<Value>>, item: &ValueType) -> Expression<Value> {
    if items.iter().all(Expression::is_constant) {
        let values = items
            .into_iter()
            .filter_map(|e| e.as_constant().cloned())
            .collect();
        return Expression::Constant(Value::List(values));
    }
    let asts: Vec<Ast> = items.iter().map(Expression::to_ast).collect();
    Expression::Formula(Formula::new(
        Ast::new(AstKind::List(asts), 0..0),
        ValueType::list_of(item.clone()),
    ))
}

/// Runs `arg`'s test with `value` bound to the argument's variable.
/// `None` when the test does not apply or cannot be decided yet.
pub(crate) fn value_passes(arg: &Argument, value: &Expression<Value>, parent: Rc<Scope>) -> Option<bool> {
    let test = arg.test.as_ref()?;
    let mut scope = Scope::with_parent(parent);
    scope.bind(arg.var.clone(), Binding::new(arg.binding_type(), value.clone()));
    test.eval(&scope).ok()
}
