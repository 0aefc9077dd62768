//! # Pattern Binder
//!
//! Walks a parsed document and turns it into bound [`Pattern`]s.
//!
//! ## Order of work per element
//!
//! 1. `for-each`: the loop variables enter scope before anything else.
//! 2. `<var>` children: declared together, checked for cycles, then bound.
//! 3. The element's own attributes, parsed as typed expressions.
//! 4. Children, with the enlarged scope and the cascaded style.
//!
//! ## Invariants
//!
//! - Binding never fails. Every problem is a diagnostic and the binder skips
//!   or defaults whatever was wrong.
//! - A pattern without a usable `name` or `type` becomes an error
//!   placeholder that still carries its diagnostics.
//! - Every attribute and node that is read is marked in [`Usage`]; the
//!   exhaustiveness pass reports the rest.
//! - `use` expansion clones the target subtree; a target that is already
//!   being expanded is rejected, so expansion always terminates.

use crate::arguments::{value_passes, Argument, ArgumentSource, Literal, Validation};
use crate::canvas;
use crate::construct::{Construct, PaintKind, ShapeKind};
use crate::element::{
    BoundElement, ElementId, ElementKind, Field, ForEach, Frame, GradientStop, Image, Paint,
    Shape, Slicing, StyleSheet, TextAnchor, TextRun, Variable,
};
use crate::error::{BindError, BindResult};
use crate::identity::IdentityMap;
use crate::pattern::{qualify, Pattern, PatternType};
use crate::usage::Usage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use stencil_common::{FileSystem, RealFileSystem};
use stencil_expression::{
    check, check_as, parse_template, parse_typed, Ast, Binding, EvalError, Expression, Formula,
    LiteralContext, Scope, Typed, Value, ValueType,
};
use stencil_geometry::{Axis, Color, Margins, NSliceValues, PathData, PathError, Size, Transform};
use stencil_parser::{
    parse_document, Arena, Attribute, Diagnostic, DiagnosticKind, Diagnostics, Element, NodeId,
    NodeKind, ParseOptions, ParsedDocument, Span,
};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindOptions {
    /// Library name for a document whose root is a lone `<pattern>`.
    pub library: Option<String>,
    /// Originating file; its stem is the fallback library name.
    pub path: Option<PathBuf>,
    /// Base for relative image references.
    pub source_dir: Option<PathBuf>,
    pub report_unused: bool,
    pub keep_comments: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            library: None,
            path: None,
            source_dir: None,
            report_unused: true,
            keep_comments: false,
        }
    }
}

/// Everything binding one document produced.
#[derive(Debug, Clone, Serialize)]
pub struct BoundDocument {
    pub patterns: Vec<Pattern>,
    pub diagnostics: Diagnostics,
    pub identity: IdentityMap,
    #[serde(skip)]
    pub document: ParsedDocument,
}

impl BoundDocument {
    /// Finds a pattern by qualified (`library.name`) or plain name.
    pub fn pattern(&self, name: &str) -> BindResult<&Pattern> {
        self.patterns
            .iter()
            .find(|p| p.qualified_name == name)
            .or_else(|| self.patterns.iter().find(|p| p.name == name))
            .ok_or_else(|| BindError::PatternNotFound {
                name: name.to_string(),
            })
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Parses and binds markup text.
pub fn bind_source(source: &str, options: &BindOptions) -> BoundDocument {
    let parse_options = ParseOptions {
        keep_comments: options.keep_comments,
    };
    bind_document(parse_document(source, &parse_options), options)
}

/// Reads, parses and binds a file. Only reading can fail.
pub fn bind_file(fs: &dyn FileSystem, path: &Path, options: &BindOptions) -> BindResult<BoundDocument> {
    let source = fs.read_to_string(path)?;
    let mut options = options.clone();
    options.path.get_or_insert_with(|| path.to_path_buf());
    if options.source_dir.is_none() {
        options.source_dir = path.parent().map(Path::to_path_buf);
    }
    Ok(bind_source(&source, &options))
}

#[instrument(skip(document, options), fields(nodes = document.arena.len()))]
pub fn bind_document(mut document: ParsedDocument, options: &BindOptions) -> BoundDocument {
    info!("binding document");
    let arena = std::mem::take(&mut document.arena);
    let diagnostics = std::mem::take(&mut document.diagnostics);
    let mut binder = Binder::new(arena, options, diagnostics);

    binder.collect_ids();
    let patterns = match document.root {
        Some(root) => binder.bind_root(root),
        None => {
            binder.error(Span::origin(), "document has no root element");
            Vec::new()
        }
    };

    document.arena = binder.arena;
    let mut diagnostics = binder.diagnostics;
    if options.report_unused {
        let unused = binder.usage.unused(&document);
        debug!(unused = unused.len(), "exhaustiveness pass");
        diagnostics.extend(unused);
    }
    document.diagnostics = diagnostics.clone();

    info!(
        patterns = patterns.len(),
        diagnostics = diagnostics.len(),
        "document bound"
    );
    BoundDocument {
        patterns,
        diagnostics,
        identity: binder.identity,
        document,
    }
}

/// Per-element binding state handed to children.
#[derive(Clone)]
struct Context {
    scope: Rc<Scope>,
    style: StyleSheet,
}

struct Binder<'o> {
    arena: Arena,
    options: &'o BindOptions,
    diagnostics: Diagnostics,
    usage: Usage,
    identity: IdentityMap,
    ids: HashMap<String, NodeId>,
    /// Targets of the `use` expansions in progress.
    expanding: Vec<NodeId>,
    /// `<area>` roles seen in the current pattern.
    areas: Vec<(String, Span)>,
    next_element: u32,
}

impl<'o> Binder<'o> {
    fn new(arena: Arena, options: &'o BindOptions, diagnostics: Diagnostics) -> Self {
        Self {
            arena,
            options,
            diagnostics,
            usage: Usage::new(),
            identity: IdentityMap::new(),
            ids: HashMap::new(),
            expanding: Vec::new(),
            areas: Vec::new(),
            next_element: 0,
        }
    }

    // ---- diagnostics -------------------------------------------------

    fn push(&mut self, diagnostic: Diagnostic) {
        warn!(line = diagnostic.span.line, column = diagnostic.span.column, message = %diagnostic.message, "bind diagnostic");
        self.diagnostics.push(diagnostic);
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::error(DiagnosticKind::Semantic, span, message));
    }

    fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::warning(DiagnosticKind::Semantic, span, message));
    }

    // ---- tree access ---------------------------------------------------

    fn element(&self, id: NodeId) -> Option<Element> {
        self.arena.element(id).cloned()
    }

    fn span(&self, id: NodeId) -> Span {
        self.arena.get(id).span
    }

    fn construct(&self, id: NodeId) -> Option<Construct> {
        self.arena.element(id).map(|e| Construct::from_tag(&e.name))
    }

    fn child_elements(&self, id: NodeId) -> Vec<(NodeId, Construct)> {
        self.arena
            .children(id)
            .iter()
            .filter_map(|c| self.construct(*c).map(|k| (*c, k)))
            .collect()
    }

    fn mark(&mut self, id: NodeId) {
        self.usage.mark_node(&self.arena, id);
    }

    fn mark_subtree(&mut self, id: NodeId) {
        self.usage.mark_subtree(&self.arena, id);
    }

    /// Reads an attribute and records it as consumed.
    fn attr<'e>(&mut self, element: &'e Element, name: &str) -> Option<&'e Attribute> {
        let attribute = element.attribute(name)?;
        self.usage.mark_attribute(attribute);
        Some(attribute)
    }

    fn required_attr<'e>(&mut self, element: &'e Element, name: &str) -> Option<&'e Attribute> {
        let found = self.attr(element, name);
        if found.is_none() {
            self.error(
                element.name_span,
                format!("<{}> needs a '{}' attribute", element.name, name),
            );
        }
        found
    }

    fn next_id(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        id
    }

    // ---- typed attribute values -----------------------------------------

    fn typed(
        &mut self,
        attribute: &Attribute,
        ty: &ValueType,
        scope: &Scope,
        axis: Option<Axis>,
    ) -> Option<Expression<Value>> {
        let ctx = LiteralContext::new(scope).with_axis(axis);
        match parse_typed(&attribute.value, ty, &ctx) {
            Ok(expr) => {
                if let Some(formula) = expr.formula() {
                    for err in check_as(formula.ast(), ty, scope) {
                        self.error(attribute.sub_span(err.range()), err.to_string());
                    }
                }
                Some(expr)
            }
            Err(err) => {
                self.push(
                    Diagnostic::error(
                        DiagnosticKind::Semantic,
                        attribute.sub_span(err.range()),
                        format!("invalid {} for '{}'", ty, attribute.name),
                    )
                    .with_cause(err.to_string()),
                );
                None
            }
        }
    }

    fn value<T: Typed>(
        &mut self,
        attribute: &Attribute,
        scope: &Scope,
        axis: Option<Axis>,
    ) -> Option<Expression<T>> {
        let ty = T::value_type();
        let expr = self.typed(attribute, &ty, scope, axis)?;
        match expr.cast::<T>() {
            Ok(expr) => Some(expr),
            Err(err) => {
                self.error(attribute.value_span, err.to_string());
                None
            }
        }
    }

    /// Optional typed attribute.
    fn optional<T: Typed>(
        &mut self,
        element: &Element,
        name: &str,
        scope: &Scope,
        axis: Option<Axis>,
    ) -> Option<Expression<T>> {
        let attribute = self.attr(element, name)?;
        self.value(attribute, scope, axis)
    }

    /// Typed attribute with a fallback when absent or invalid.
    fn or_default<T: Typed>(
        &mut self,
        element: &Element,
        name: &str,
        scope: &Scope,
        axis: Option<Axis>,
        default: Expression<T>,
    ) -> Expression<T> {
        self.optional(element, name, scope, axis).unwrap_or(default)
    }

    /// Required typed attribute; reports when absent and falls back.
    fn required<T: Typed>(
        &mut self,
        element: &Element,
        name: &str,
        scope: &Scope,
        axis: Option<Axis>,
        fallback: Expression<T>,
    ) -> Expression<T> {
        match self.required_attr(element, name) {
            Some(attribute) => self.value(attribute, scope, axis).unwrap_or(fallback),
            None => fallback,
        }
    }

    fn flag(&mut self, element: &Element, name: &str) -> bool {
        let Some(attribute) = self.attr(element, name) else {
            return false;
        };
        match attribute.value.trim() {
            "" | "true" | "yes" => true,
            "false" | "no" => false,
            other => {
                self.error(
                    attribute.value_span,
                    format!("'{}' must be true or false, found '{}'", name, other),
                );
                false
            }
        }
    }

    // ---- document level ------------------------------------------------

    /// Indexes every `id` in the source tree for `#id` references.
    fn collect_ids(&mut self) {
        let mut found: Vec<Attribute> = Vec::new();
        for (_, node) in self.arena.iter() {
            if let Some(attribute) = node.as_element().and_then(|e| e.attribute("id")) {
                found.push(attribute.clone());
            }
        }
        for attribute in found {
            self.usage.mark_attribute(&attribute);
            let name = attribute.value.trim().to_string();
            if self.ids.contains_key(&name) {
                self.error(attribute.value_span, format!("duplicate id '{}'", name));
            } else {
                self.ids.insert(name, attribute.owner);
            }
        }
    }

    fn bind_root(&mut self, root: NodeId) -> Vec<Pattern> {
        match self.construct(root) {
            Some(Construct::Library) => self.bind_library(root),
            Some(Construct::Pattern) => {
                let library = self.fallback_library();
                vec![self.bind_pattern(root, &library)]
            }
            _ => {
                let name = self.element(root).map(|e| e.name).unwrap_or_default();
                self.error(
                    self.span(root),
                    format!("expected <library> or <pattern> as the root, found <{}>", name),
                );
                self.mark_subtree(root);
                Vec::new()
            }
        }
    }

    fn fallback_library(&self) -> String {
        self.options
            .library
            .clone()
            .or_else(|| {
                self.options
                    .path
                    .as_deref()
                    .and_then(Path::file_stem)
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "default".to_string())
    }

    fn bind_library(&mut self, id: NodeId) -> Vec<Pattern> {
        let Some(element) = self.element(id) else {
            return Vec::new();
        };
        self.mark(id);
        let library = match self.attr(&element, "name") {
            Some(attribute) if !attribute.value.trim().is_empty() => attribute.value.trim().to_string(),
            _ => {
                self.error(element.name_span, "<library> needs a 'name' attribute");
                self.fallback_library()
            }
        };
        debug!(library = %library, "binding library");

        let mut patterns: Vec<Pattern> = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        for (child, construct) in self.child_elements(id) {
            match construct {
                Construct::Pattern => {
                    let pattern = self.bind_pattern(child, &library);
                    if !pattern.is_error && !names.insert(pattern.name.clone()) {
                        let span = self
                            .arena
                            .attribute(child, "name")
                            .map(|a| a.value_span)
                            .unwrap_or(pattern.span);
                        self.error(span, format!("pattern '{}' is already defined", pattern.name));
                    }
                    patterns.push(pattern);
                }
                Construct::Defs => self.mark(child),
                Construct::Desc | Construct::Title => self.mark_subtree(child),
                Construct::Paint(_) => {}
                Construct::Unknown(name) => self.unknown(child, &name),
                other => {
                    self.error(
                        self.span(child),
                        format!("<{}> is not allowed directly in a library", tag_of(&other, &self.arena, child)),
                    );
                    self.mark_subtree(child);
                }
            }
        }
        patterns
    }

    fn unknown(&mut self, id: NodeId, name: &str) {
        self.error(self.span(id), format!("unknown element <{}>", name));
        self.mark_subtree(id);
    }

    // ---- patterns --------------------------------------------------------

    fn bind_pattern(&mut self, id: NodeId, library: &str) -> Pattern {
        let start = self.diagnostics.len();
        let span = self.span(id);
        let Some(element) = self.element(id) else {
            return Pattern::placeholder(None, library, id, span);
        };
        self.mark(id);

        let name = self
            .attr(&element, "name")
            .map(|a| a.value.trim().to_string())
            .filter(|n| !n.is_empty());
        let type_attr = self.attr(&element, "type");
        let kind = type_attr.and_then(|a| PatternType::from_name(a.value.trim()));

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push("'name'");
        }
        if type_attr.is_none() {
            missing.push("'type'");
        }
        if !missing.is_empty() {
            self.error(
                element.name_span,
                format!("<pattern> is missing {}", missing.join(" and ")),
            );
        } else if let (Some(attribute), None) = (type_attr, kind) {
            let known: Vec<&str> = PatternType::ALL.iter().map(|t| t.name()).collect();
            self.error(
                attribute.value_span,
                format!(
                    "unknown pattern type '{}'; expected one of: {}",
                    attribute.value.trim(),
                    known.join(", ")
                ),
            );
        }

        let (Some(name), Some(kind)) = (name.clone(), kind) else {
            self.mark_subtree(id);
            let mut placeholder = Pattern::placeholder(name, library, id, span);
            placeholder.diagnostics = self.diagnostics.as_slice()[start..].to_vec();
            return placeholder;
        };
        debug!(pattern = %name, kind = %kind, "binding pattern");

        let canvas = Rc::new(canvas::declarations());
        let arguments = self.bind_argument_declarations(id, &canvas);
        let mut args_scope = Scope::with_parent(canvas.clone());
        for arg in &arguments {
            args_scope.declare(arg.var.clone(), arg.binding_type());
        }
        let args_scope = Rc::new(args_scope);
        let validations = self.bind_validations(id, &args_scope);

        let example_size = self.constant_attr::<Size>(&element, "example-size");
        let example_canvas = self.constant_attr::<Size>(&element, "example-canvas");
        let mut description = self
            .attr(&element, "description")
            .map(|a| a.value.clone());
        let mut title = None;
        for (child, construct) in self.child_elements(id) {
            match construct {
                Construct::Desc if description.is_none() => description = Some(self.text_of(child)),
                Construct::Title if title.is_none() => title = Some(self.text_of(child)),
                _ => {}
            }
        }

        self.areas.clear();
        let ctx = Context {
            scope: args_scope,
            style: StyleSheet::default(),
        };
        let body = self.bind_drawable(id, element.clone(), Construct::Div, &ctx);
        self.check_roles(kind, &element);

        Pattern {
            qualified_name: qualify(library, &name),
            name,
            library: library.to_string(),
            kind: Some(kind),
            description,
            title,
            arguments,
            validations,
            example_size,
            example_canvas,
            body,
            is_error: false,
            node: id,
            span,
            diagnostics: self.diagnostics.as_slice()[start..].to_vec(),
        }
    }

    fn text_of(&mut self, id: NodeId) -> String {
        self.mark_subtree(id);
        let mut out = String::new();
        for child in self.arena.children(id) {
            if let Some(text) = self.arena.get(*child).as_text() {
                out.push_str(&text.content);
            }
        }
        out.trim().to_string()
    }

    /// Metadata that must be known without an instance.
    fn constant_attr<T: Typed>(&mut self, element: &Element, name: &str) -> Option<T> {
        let scope = Scope::new();
        let attribute = self.attr(element, name)?;
        let expr = self.value::<T>(attribute, &scope, None)?;
        match expr {
            Expression::Constant(value) => Some(value),
            Expression::Formula(_) => {
                self.error(attribute.value_span, format!("'{}' must be a constant", name));
                None
            }
        }
    }

    fn check_roles(&mut self, kind: PatternType, element: &Element) {
        let areas = std::mem::take(&mut self.areas);
        let mut seen: HashSet<&str> = HashSet::new();
        for (role, span) in &areas {
            if !kind.allows_role(role) {
                self.error(*span, format!("a {} pattern has no '{}' area", kind, role));
            } else if !seen.insert(role.as_str()) {
                self.error(*span, format!("area '{}' is already defined", role));
            }
        }
        let missing: Vec<&str> = kind
            .required_roles()
            .iter()
            .copied()
            .filter(|r| !seen.contains(r))
            .collect();
        if !missing.is_empty() {
            self.error(
                element.name_span,
                format!("{} pattern is missing areas: {}", kind, missing.join(", ")),
            );
        }
    }

    // ---- argument declarations -------------------------------------------

    fn bind_argument_declarations(&mut self, pattern: NodeId, canvas: &Rc<Scope>) -> Vec<Argument> {
        let mut arguments: Vec<Argument> = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut vars: HashSet<String> = HashSet::new();

        for (child, construct) in self.child_elements(pattern) {
            let arg = match construct {
                Construct::Arg => self.bind_argument(child, canvas, false),
                Construct::Args => self.bind_group(child, canvas),
                _ => continue,
            };
            let Some(arg) = arg else { continue };

            if !names.insert(arg.name.clone()) {
                self.error(arg.span, format!("argument '{}' is declared twice", arg.name));
                continue;
            }
            if !vars.insert(arg.var.clone()) {
                self.error(
                    arg.span,
                    format!("variable '{}' is already used by another argument", arg.var),
                );
                continue;
            }
            arguments.push(arg);
        }
        arguments
    }

    fn bind_argument(&mut self, id: NodeId, canvas: &Rc<Scope>, member: bool) -> Option<Argument> {
        let element = self.element(id)?;
        self.mark(id);
        let span = element.name_span;
        let name = self.required_attr(&element, "name")?.value.trim().to_string();
        let var = self.argument_var(&element, &name, member)?;

        let values = self.attr(&element, "values").map(|a| a.value.clone());
        let ty = match self.attr(&element, "type") {
            Some(attribute) => match ValueType::from_name(&attribute.value, values.as_deref()) {
                Some(ty) => ty,
                None => {
                    self.error(
                        attribute.value_span,
                        format!("unknown argument type '{}'", attribute.value.trim()),
                    );
                    ValueType::Any
                }
            },
            None => {
                self.error(span, format!("argument '{}' needs a 'type'", name));
                ValueType::Any
            }
        };

        let optional = self.flag(&element, "optional");
        let numbered = self.flag(&element, "numbered");
        let entry = self.flag(&element, "entry");
        let source = match (numbered, entry) {
            (true, true) => {
                self.error(span, "an argument cannot be both numbered and an entry");
                ArgumentSource::Singular
            }
            (true, false) | (false, true) if member => {
                self.error(span, "group members must be plain arguments");
                ArgumentSource::Singular
            }
            (true, false) => ArgumentSource::Numbered,
            (false, true) => ArgumentSource::Entry,
            (false, false) => ArgumentSource::Singular,
        };

        let mut arg = Argument {
            name,
            var,
            ty,
            optional,
            default: None,
            example: None,
            source,
            test: None,
            message: None,
            span,
        };

        let mut test_scope = Scope::with_parent(canvas.clone());
        test_scope.declare(arg.var.clone(), arg.binding_type());
        arg.test = self.optional::<bool>(&element, "test", &test_scope, None);
        arg.message = self.attr(&element, "message").map(|a| a.value.clone());

        // The default replaces a single value (one item for numbered
        // arguments); the example is a whole value.
        let item_ty = arg.ty.clone();
        arg.default = self.literal(&element, "default", &item_ty, canvas);
        arg.example = self.literal(&element, "example", &arg.binding_type(), canvas);

        let default_checkable = !matches!(arg.source, ArgumentSource::Numbered);
        if default_checkable {
            arg.default = self.checked_literal(&arg, arg.default.clone(), "default", canvas);
        }
        arg.example = self.checked_literal(&arg, arg.example.clone(), "example", canvas);
        Some(arg)
    }

    fn argument_var(&mut self, element: &Element, name: &str, member: bool) -> Option<String> {
        let (var, span) = match self.attr(element, "var") {
            Some(attribute) => (attribute.value.trim().to_string(), attribute.value_span),
            None => (name.replace('-', "_"), element.name_span),
        };
        if !is_identifier(&var) {
            self.error(span, format!("'{}' is not a valid variable name", var));
            return None;
        }
        if !member && canvas::is_reserved(&var) {
            self.error(span, format!("'{}' is reserved by the canvas", var));
            return None;
        }
        Some(var)
    }

    fn literal(
        &mut self,
        element: &Element,
        name: &str,
        ty: &ValueType,
        scope: &Scope,
    ) -> Option<Literal> {
        let attribute = self.attr(element, name)?;
        let value = self.typed(attribute, ty, scope, None)?;
        Some(Literal {
            text: attribute.value.clone(),
            span: attribute.value_span,
            value,
        })
    }

    /// Drops a default or example that fails the argument's own test.
    fn checked_literal(
        &mut self,
        arg: &Argument,
        literal: Option<Literal>,
        what: &str,
        canvas: &Rc<Scope>,
    ) -> Option<Literal> {
        let literal = literal?;
        if value_passes(arg, &literal.value, canvas.clone()) == Some(false) {
            let reason = arg
                .message
                .clone()
                .unwrap_or_else(|| "its test fails".to_string());
            self.push(
                Diagnostic::warning(
                    DiagnosticKind::Semantic,
                    literal.span,
                    format!("{} of '{}' is discarded", what, arg.name),
                )
                .with_cause(reason),
            );
            return None;
        }
        Some(literal)
    }

    fn bind_group(&mut self, id: NodeId, canvas: &Rc<Scope>) -> Option<Argument> {
        let element = self.element(id)?;
        self.mark(id);
        let span = element.name_span;
        let name = self.required_attr(&element, "name")?.value.trim().to_string();
        let var = self.argument_var(&element, &name, false)?;
        let optional = self.flag(&element, "optional");

        let mut members: Vec<Argument> = Vec::new();
        let mut fields = BTreeMap::new();
        for (child, construct) in self.child_elements(id) {
            match construct {
                Construct::Arg => {
                    let Some(member) = self.bind_argument(child, canvas, true) else {
                        continue;
                    };
                    if fields.contains_key(&member.var) {
                        self.error(
                            member.span,
                            format!("member '{}' is declared twice in '{}'", member.var, name),
                        );
                        continue;
                    }
                    fields.insert(member.var.clone(), member.binding_type());
                    members.push(member);
                }
                Construct::Desc | Construct::Title => self.mark_subtree(child),
                other => {
                    self.error(
                        self.span(child),
                        format!("<{}> cannot appear inside <args>", tag_of(&other, &self.arena, child)),
                    );
                    self.mark_subtree(child);
                }
            }
        }
        if members.is_empty() {
            self.warning(span, format!("argument group '{}' has no members", name));
        }

        let mut group = Argument {
            name,
            var,
            ty: ValueType::Record(fields),
            optional,
            default: None,
            example: None,
            source: ArgumentSource::Grouped { members },
            test: None,
            message: None,
            span,
        };
        let mut test_scope = Scope::with_parent(canvas.clone());
        test_scope.declare(group.var.clone(), group.binding_type());
        group.test = self.optional::<bool>(&element, "test", &test_scope, None);
        group.message = self.attr(&element, "message").map(|a| a.value.clone());
        Some(group)
    }

    fn bind_validations(&mut self, pattern: NodeId, scope: &Rc<Scope>) -> Vec<Validation> {
        let mut validations = Vec::new();
        for (child, construct) in self.child_elements(pattern) {
            if construct != Construct::Validate {
                continue;
            }
            let Some(element) = self.element(child) else { continue };
            self.mark(child);
            let message = self
                .attr(&element, "message")
                .map(|a| a.value.clone())
                .unwrap_or_else(|| "validation failed".to_string());
            let Some(attribute) = self.required_attr(&element, "test") else {
                continue;
            };
            if let Some(test) = self.value::<bool>(attribute, scope, None) {
                validations.push(Validation {
                    test,
                    message,
                    span: element.name_span,
                });
            }
        }
        validations
    }

    // ---- elements ----------------------------------------------------------

    fn bind_children(&mut self, parent: NodeId, ctx: &Context) -> Vec<BoundElement> {
        let mut children = Vec::new();
        for (child, construct) in self.child_elements(parent) {
            if let Some(bound) = self.bind_child(child, construct, ctx) {
                children.push(bound);
            }
        }
        children
    }

    fn bind_child(&mut self, id: NodeId, construct: Construct, ctx: &Context) -> Option<BoundElement> {
        match construct {
            c if c.is_drawable() && c != Construct::Use => {
                let element = self.element(id)?;
                self.bind_drawable(id, element, c, ctx)
            }
            Construct::Use => self.bind_use(id, ctx),
            // Read by the parent before its attributes.
            Construct::Var => None,
            Construct::Arg | Construct::Args | Construct::Validate => {
                if !self.usage.is_node_used(&self.arena, id) {
                    let tag = tag_of(&construct, &self.arena, id);
                    self.error(
                        self.span(id),
                        format!("<{}> must be a direct child of <pattern>", tag),
                    );
                    self.mark_subtree(id);
                }
                None
            }
            Construct::Desc | Construct::Title => {
                self.mark_subtree(id);
                None
            }
            Construct::Paint(_) => None,
            Construct::Defs => {
                self.mark(id);
                None
            }
            Construct::Unknown(name) => {
                self.unknown(id, &name);
                None
            }
            other => {
                let tag = tag_of(&other, &self.arena, id);
                self.error(self.span(id), format!("<{}> is not allowed here", tag));
                self.mark_subtree(id);
                None
            }
        }
    }

    fn bind_drawable(
        &mut self,
        id: NodeId,
        element: Element,
        construct: Construct,
        ctx: &Context,
    ) -> Option<BoundElement> {
        self.mark(id);
        let element_id = self.next_id();
        let span = self.span(id);

        let mut scope = ctx.scope.clone();
        let for_each = match self.attr(&element, "for-each") {
            Some(attribute) => match self.bind_for_each(attribute, &scope) {
                Some((for_each, loop_scope)) => {
                    scope = loop_scope;
                    Some(for_each)
                }
                None => None,
            },
            None => None,
        };
        let (vars, scope) = self.bind_vars(id, scope);

        let (kind, inner) = match construct {
            Construct::Div | Construct::Area => {
                let frame = self.bind_frame(&element, &scope);
                let mut inner = Scope::with_parent(scope.clone());
                inner.declare("width", ValueType::Scalar);
                inner.declare("height", ValueType::Scalar);
                let kind = if construct == Construct::Area {
                    let role = self
                        .required_attr(&element, "role")
                        .map(|a| (a.value.trim().to_string(), a.value_span));
                    match role {
                        Some((role, role_span)) => {
                            self.areas.push((role.clone(), role_span));
                            ElementKind::Area { role, frame }
                        }
                        None => ElementKind::Div(frame),
                    }
                } else {
                    ElementKind::Div(frame)
                };
                (kind, Rc::new(inner))
            }
            Construct::Group => (ElementKind::Group, scope.clone()),
            Construct::Shape(shape) => (ElementKind::Shape(self.bind_shape(shape, &element, &scope)), scope.clone()),
            Construct::Text => (ElementKind::Text(self.bind_text(id, &element, &scope)), scope.clone()),
            Construct::Image => (ElementKind::Image(self.bind_image(&element, &scope)), scope.clone()),
            Construct::Field => (ElementKind::Field(self.bind_field(&element, &scope)), scope.clone()),
            _ => return None,
        };

        let style = self.bind_style(&element, &inner, &ctx.style);
        let children = match &kind {
            // Content of <text> is its text, read by bind_text.
            ElementKind::Text(_) => Vec::new(),
            _ => {
                let child_ctx = Context {
                    scope: inner,
                    style: style.inherited(),
                };
                self.bind_children(id, &child_ctx)
            }
        };

        let original = self.arena.original(id);
        self.identity.record(id, original, element_id);
        Some(BoundElement {
            id: element_id,
            node: id,
            span,
            kind,
            style,
            for_each,
            vars,
            children,
        })
    }

    fn bind_use(&mut self, id: NodeId, ctx: &Context) -> Option<BoundElement> {
        let element = self.element(id)?;
        self.mark(id);
        let href = self.required_attr(&element, "href")?;
        let target = self.reference(href)?;

        if self.expanding.contains(&target) {
            self.error(
                href.value_span,
                format!("'{}' refers to an element that is already being expanded", href.value.trim()),
            );
            return None;
        }
        match self.construct(target) {
            Some(c) if c.is_drawable() => {}
            other => {
                let tag = other
                    .map(|c| tag_of(&c, &self.arena, target))
                    .unwrap_or_else(|| "text".to_string());
                self.error(href.value_span, format!("<use> cannot expand a <{}>", tag));
                return None;
            }
        }

        let overrides: Vec<Attribute> = element
            .attributes
            .iter()
            .filter(|a| a.name != "href" && a.name != "id")
            .cloned()
            .collect();
        for attribute in &overrides {
            self.usage.mark_attribute(attribute);
        }
        // Clone a clone's source so origins stay pointed at the source tree.
        let source = self.arena.original(target);
        let clone = self.arena.clone_subtree(source, &overrides);
        debug!(source = %source, clone = %clone, "expanding use");

        let construct = self.construct(clone)?;
        self.expanding.push(source);
        let bound = self.bind_child(clone, construct, ctx);
        self.expanding.pop();
        bound
    }

    /// Resolves `#id`, `url(#id)` or `url('#id')`.
    fn reference(&mut self, attribute: &Attribute) -> Option<NodeId> {
        let Some(name) = reference_target(&attribute.value) else {
            self.error(
                attribute.value_span,
                format!("'{}' is not a reference; expected '#id' or 'url(#id)'", attribute.value.trim()),
            );
            return None;
        };
        match self.ids.get(name) {
            Some(node) => Some(*node),
            None => {
                self.error(attribute.value_span, format!("no element has id '{}'", name));
                None
            }
        }
    }

    fn bind_for_each(&mut self, attribute: &Attribute, scope: &Rc<Scope>) -> Option<(ForEach, Rc<Scope>)> {
        let text = attribute.value.as_str();
        let Some(split) = text.find(" in ") else {
            self.error(
                attribute.value_span,
                "expected 'name in {list}' or 'name, index in {list}'",
            );
            return None;
        };
        let names: Vec<&str> = text[..split].split(',').map(str::trim).collect();
        let (item, index) = match names.as_slice() {
            [item] => (*item, None),
            [item, index] => (*item, Some(*index)),
            _ => {
                self.error(attribute.value_span, "for-each takes one or two loop variables");
                return None;
            }
        };
        for name in std::iter::once(item).chain(index) {
            if !is_identifier(name) {
                self.error(attribute.value_span, format!("'{}' is not a valid variable name", name));
                return None;
            }
            if canvas::is_reserved(name) {
                self.error(attribute.value_span, format!("'{}' is reserved by the canvas", name));
                return None;
            }
        }

        let list_start = split + 4;
        let ctx = LiteralContext::new(scope);
        let items = match parse_typed(&text[list_start..], &ValueType::Any, &ctx) {
            Ok(items) => items,
            Err(err) => {
                let range = err.range();
                self.error(
                    attribute.sub_span(range.start + list_start..range.end + list_start),
                    err.to_string(),
                );
                return None;
            }
        };

        // A formula that reads no names but still did not fold fails the
        // same way for every instance.
        if items.formula().is_some() && items.free_names().is_empty() {
            match items.eval(&Scope::new()) {
                Ok(_) | Err(EvalError::UndefinedName { .. }) => {}
                Err(err) => {
                    self.error(attribute.sub_span(list_start..text.len()), err.to_string());
                    return None;
                }
            }
        }

        let ast = items.to_ast();
        let (found, errors) = check(&ast, scope);
        for err in errors {
            let range = err.range();
            self.error(
                attribute.sub_span(range.start + list_start..range.end + list_start),
                err.to_string(),
            );
        }
        let item_type = match found {
            ValueType::List(item) => *item,
            ValueType::Any => ValueType::Any,
            other => {
                self.error(
                    attribute.value_span,
                    format!("for-each needs a list, found {}", other),
                );
                return None;
            }
        };

        let mut loop_scope = Scope::with_parent(scope.clone());
        loop_scope.declare(item, item_type.clone());
        if let Some(index) = index {
            loop_scope.declare(index, ValueType::Int);
        }
        Some((
            ForEach {
                item: item.to_string(),
                index: index.map(str::to_string),
                items,
                item_type,
            },
            Rc::new(loop_scope),
        ))
    }

    /// Declares, checks and binds the `<var>` children of `parent`.
    fn bind_vars(&mut self, parent: NodeId, scope: Rc<Scope>) -> (Vec<Variable>, Rc<Scope>) {
        struct Declared {
            name: String,
            ty: Option<ValueType>,
            value: Attribute,
            span: Span,
        }

        let mut declared: Vec<Declared> = Vec::new();
        for (child, construct) in self.child_elements(parent) {
            if construct != Construct::Var {
                continue;
            }
            let Some(element) = self.element(child) else { continue };
            self.mark(child);
            let Some(name_attr) = self.required_attr(&element, "name") else {
                continue;
            };
            let name = name_attr.value.trim().to_string();
            let name_span = name_attr.value_span;
            if !is_identifier(&name) {
                self.error(name_span, format!("'{}' is not a valid variable name", name));
                continue;
            }
            if canvas::is_reserved(&name) {
                self.error(name_span, format!("'{}' is reserved by the canvas", name));
                continue;
            }
            if declared.iter().any(|d| d.name == name) {
                self.error(name_span, format!("variable '{}' is declared twice", name));
                continue;
            }
            let values = self.attr(&element, "values").map(|a| a.value.clone());
            let ty = match self.attr(&element, "type") {
                Some(attribute) => match ValueType::from_name(&attribute.value, values.as_deref()) {
                    Some(ty) => Some(ty),
                    None => {
                        self.error(
                            attribute.value_span,
                            format!("unknown variable type '{}'", attribute.value.trim()),
                        );
                        None
                    }
                },
                None => None,
            };
            let Some(value) = self.required_attr(&element, "value").cloned() else {
                continue;
            };
            declared.push(Declared {
                name,
                ty,
                value,
                span: name_span,
            });
        }
        if declared.is_empty() {
            return (Vec::new(), scope);
        }

        // Every name is visible to every value, whatever the order.
        let mut decl_scope = Scope::with_parent(scope.clone());
        for d in &declared {
            decl_scope.declare(d.name.clone(), d.ty.clone().unwrap_or(ValueType::Any));
        }
        let mut parsed: Vec<Option<Expression<Value>>> = Vec::new();
        for d in &declared {
            let ty = d.ty.clone().unwrap_or(ValueType::Any);
            parsed.push(self.typed(&d.value, &ty, &decl_scope, None));
        }

        let names: Vec<&str> = declared.iter().map(|d| d.name.as_str()).collect();
        let edges: Vec<Vec<usize>> = parsed
            .iter()
            .map(|expr| {
                expr.as_ref()
                    .map(|e| {
                        e.free_names()
                            .iter()
                            .filter_map(|n| names.iter().position(|m| m == n))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();
        for cycle in find_cycles(&edges) {
            let chain: Vec<String> = cycle
                .iter()
                .chain(cycle.first())
                .map(|i| declared[*i].name.clone())
                .collect();
            let first = cycle[0];
            self.push(Diagnostic::error(
                DiagnosticKind::Semantic,
                declared[first].value.value_span,
                EvalError::Recursion { chain }.to_string(),
            ));
            for i in cycle {
                parsed[i] = None;
            }
        }

        let mut bound = Scope::with_parent(scope);
        let mut vars = Vec::new();
        for (d, value) in declared.into_iter().zip(parsed) {
            let ty = match (&d.ty, &value) {
                (Some(ty), _) => ty.clone(),
                (None, Some(Expression::Formula(formula))) => check(formula.ast(), &decl_scope).0,
                (None, Some(Expression::Constant(value))) => value.value_type(),
                (None, None) => ValueType::Any,
            };
            match &value {
                Some(expr) => bound.bind(d.name.clone(), Binding::new(ty.clone(), expr.clone())),
                None => bound.declare(d.name.clone(), ty.clone()),
            }
            vars.push(Variable {
                name: d.name,
                ty,
                value,
                span: d.span,
            });
        }
        (vars, Rc::new(bound))
    }

    fn bind_frame(&mut self, element: &Element, scope: &Scope) -> Frame {
        let mut frame = Frame {
            x: self.optional(element, "x", scope, Some(Axis::X)),
            y: self.optional(element, "y", scope, Some(Axis::Y)),
            width: self.optional(element, "width", scope, Some(Axis::X)),
            height: self.optional(element, "height", scope, Some(Axis::Y)),
            margin: self.optional::<Margins>(element, "margin", scope, None),
            slicing: None,
        };

        let xs = self.optional::<Vec<f64>>(element, "xs", scope, None);
        let ys = self.optional::<Vec<f64>>(element, "ys", scope, None);
        let Some(reference_attr) = self.attr(element, "reference") else {
            if xs.is_some() || ys.is_some() {
                self.error(element.name_span, "'xs' and 'ys' need a 'reference' size");
            }
            return frame;
        };
        let Some(reference) = self.value::<Size>(reference_attr, scope, None) else {
            return frame;
        };
        let xs = xs.unwrap_or(Expression::Constant(Vec::new()));
        let ys = ys.unwrap_or(Expression::Constant(Vec::new()));
        if let (Some(r), Some(x), Some(y)) = (reference.as_constant(), xs.as_constant(), ys.as_constant()) {
            if let Err(err) = NSliceValues::new(*r, x.clone(), y.clone()) {
                self.push(
                    Diagnostic::error(
                        DiagnosticKind::Semantic,
                        reference_attr.value_span,
                        "invalid n-slice cuts",
                    )
                    .with_cause(err.to_string()),
                );
                return frame;
            }
        }
        frame.slicing = Some(Slicing { reference, xs, ys });
        frame
    }

    fn bind_shape(&mut self, kind: ShapeKind, element: &Element, scope: &Scope) -> Shape {
        let zero = || Expression::Constant(0.0);
        match kind {
            ShapeKind::Rect => Shape::Rect {
                x: self.or_default(element, "x", scope, Some(Axis::X), zero()),
                y: self.or_default(element, "y", scope, Some(Axis::Y), zero()),
                width: self.or_default(element, "width", scope, Some(Axis::X), extent(Axis::X)),
                height: self.or_default(element, "height", scope, Some(Axis::Y), extent(Axis::Y)),
                rx: self.optional(element, "rx", scope, Some(Axis::X)),
                ry: self.optional(element, "ry", scope, Some(Axis::Y)),
            },
            ShapeKind::Ellipse => Shape::Ellipse {
                cx: self.or_default(element, "cx", scope, Some(Axis::X), zero()),
                cy: self.or_default(element, "cy", scope, Some(Axis::Y), zero()),
                rx: self.required(element, "rx", scope, Some(Axis::X), zero()),
                ry: self.required(element, "ry", scope, Some(Axis::Y), zero()),
            },
            ShapeKind::Circle => Shape::Circle {
                cx: self.or_default(element, "cx", scope, Some(Axis::X), zero()),
                cy: self.or_default(element, "cy", scope, Some(Axis::Y), zero()),
                r: self.required(element, "r", scope, Some(Axis::X), zero()),
            },
            ShapeKind::Line => Shape::Line {
                x1: self.or_default(element, "x1", scope, Some(Axis::X), zero()),
                y1: self.or_default(element, "y1", scope, Some(Axis::Y), zero()),
                x2: self.or_default(element, "x2", scope, Some(Axis::X), zero()),
                y2: self.or_default(element, "y2", scope, Some(Axis::Y), zero()),
            },
            ShapeKind::Polyline | ShapeKind::Polygon => {
                let points = self.required(element, "points", scope, None, Expression::Constant(Vec::new()));
                if let Some(coords) = points.as_constant() {
                    if coords.len() % 2 != 0 {
                        if let Some(attribute) = element.attribute("points") {
                            self.error(
                                attribute.value_span,
                                format!("points need x and y pairs, found {} numbers", coords.len()),
                            );
                        }
                    }
                }
                Shape::Poly {
                    points,
                    closed: kind == ShapeKind::Polygon,
                }
            }
            ShapeKind::Path => {
                let data = match self.required_attr(element, "d") {
                    Some(attribute) => match PathData::parse(&attribute.value) {
                        Ok(data) => data,
                        Err(err) => {
                            let offset = path_error_offset(&err);
                            self.push(
                                Diagnostic::error(
                                    DiagnosticKind::Semantic,
                                    attribute.sub_span(offset..offset + 1),
                                    "invalid path data",
                                )
                                .with_cause(err.to_string()),
                            );
                            PathData::new()
                        }
                    },
                    None => PathData::new(),
                };
                Shape::Path { data }
            }
        }
    }

    fn bind_text(&mut self, id: NodeId, element: &Element, scope: &Scope) -> TextRun {
        let anchor = match self.attr(element, "anchor") {
            Some(attribute) => TextAnchor::from_name(attribute.value.trim()).unwrap_or_else(|| {
                self.error(
                    attribute.value_span,
                    format!("unknown anchor '{}'; expected start, middle or end", attribute.value.trim()),
                );
                TextAnchor::Start
            }),
            None => TextAnchor::Start,
        };

        let mut content = String::new();
        let mut content_span: Option<Span> = None;
        for child in self.arena.children(id).to_vec() {
            let node = self.arena.get(child);
            let span = node.span;
            match node.kind.clone() {
                NodeKind::Text(text) => {
                    content.push_str(&text.content);
                    content_span = Some(content_span.map(|s| s.join(&span)).unwrap_or(span));
                    self.mark(child);
                }
                NodeKind::Comment(_) | NodeKind::EndTag(_) => {}
                NodeKind::Element(inner) => {
                    self.error(span, format!("<{}> cannot appear inside <text>", inner.name));
                    self.mark_subtree(child);
                }
            }
        }
        let content_span = content_span.unwrap_or(element.name_span);
        let content = match parse_template(content.trim(), 0, scope) {
            Ok(ast) => {
                for err in check(&ast, scope).1 {
                    self.error(content_span, err.to_string());
                }
                Expression::<String>::from_ast(ast).unwrap_or_else(|_| Expression::Constant(String::new()))
            }
            Err(err) => {
                self.push(
                    Diagnostic::error(DiagnosticKind::Semantic, content_span, "invalid text")
                        .with_cause(err.to_string()),
                );
                Expression::Constant(String::new())
            }
        };

        TextRun {
            x: self.or_default(element, "x", scope, Some(Axis::X), Expression::Constant(0.0)),
            y: self.or_default(element, "y", scope, Some(Axis::Y), Expression::Constant(0.0)),
            font_size: self.or_default(element, "font-size", scope, None, Expression::Constant(12.0)),
            font_family: self.optional(element, "font-family", scope, None),
            anchor,
            content,
        }
    }

    fn bind_image(&mut self, element: &Element, scope: &Scope) -> Image {
        let href = self.required(element, "href", scope, None, Expression::Constant(PathBuf::new()));
        let href = match href {
            Expression::Constant(path) if !path.as_os_str().is_empty() => {
                Expression::Constant(RealFileSystem.resolve(self.options.source_dir.as_deref(), &path))
            }
            other => other,
        };
        Image {
            x: self.or_default(element, "x", scope, Some(Axis::X), Expression::Constant(0.0)),
            y: self.or_default(element, "y", scope, Some(Axis::Y), Expression::Constant(0.0)),
            width: self.optional(element, "width", scope, Some(Axis::X)),
            height: self.optional(element, "height", scope, Some(Axis::Y)),
            href,
        }
    }

    fn bind_field(&mut self, element: &Element, scope: &Scope) -> Field {
        let name = self
            .required_attr(element, "name")
            .map(|a| a.value.trim().to_string())
            .unwrap_or_default();
        Field {
            name,
            x: self.or_default(element, "x", scope, Some(Axis::X), Expression::Constant(0.0)),
            y: self.or_default(element, "y", scope, Some(Axis::Y), Expression::Constant(0.0)),
            width: self.optional(element, "width", scope, Some(Axis::X)),
            height: self.optional(element, "height", scope, Some(Axis::Y)),
        }
    }

    // ---- style -------------------------------------------------------------

    fn bind_style(&mut self, element: &Element, scope: &Scope, parent: &StyleSheet) -> StyleSheet {
        let mut style = parent.inherited();
        if let Some(attribute) = self.attr(element, "fill") {
            if let Some(paint) = self.paint(attribute, scope) {
                style.fill = Some(paint);
            }
        }
        if let Some(attribute) = self.attr(element, "stroke") {
            if let Some(paint) = self.paint(attribute, scope) {
                style.stroke = Some(paint);
            }
        }
        if let Some(width) = self.optional::<f64>(element, "stroke-width", scope, None) {
            style.stroke_width = width;
        }
        if let Some(color) = self.optional::<Color>(element, "text-color", scope, None) {
            style.text_color = Some(color);
        }
        if let Some(visible) = self.optional::<bool>(element, "visible", scope, None) {
            style.visible = visible;
        }
        if let Some(own) = self.optional::<Transform>(element, "transform", scope, None) {
            match Expression::<Transform>::compose(&parent.transform, own.clone()) {
                Ok(composed) => style.transform = composed,
                Err(err) => {
                    if let Some(attribute) = element.attribute("transform") {
                        self.error(attribute.value_span, err.to_string());
                    }
                }
            }
            style.local_transform = Some(own);
        }
        if let Some(attribute) = self.attr(element, "clip") {
            match attribute.value.trim() {
                "true" | "yes" => style.clip = true,
                "false" | "no" => style.clip = false,
                other => self.error(
                    attribute.value_span,
                    format!("'clip' must be true or false, found '{}'", other),
                ),
            }
        }
        style
    }

    fn paint(&mut self, attribute: &Attribute, scope: &Scope) -> Option<Paint> {
        if reference_target(&attribute.value).is_none() {
            let color = self.value::<Color>(attribute, scope, None)?;
            return Some(Paint::Color { color });
        }
        let target = self.reference(attribute)?;
        match self.construct(target) {
            Some(Construct::Paint(kind)) => self.bind_paint(target, kind, scope),
            other => {
                let tag = other
                    .map(|c| tag_of(&c, &self.arena, target))
                    .unwrap_or_else(|| "text".to_string());
                self.error(
                    attribute.value_span,
                    format!("'{}' refers to a <{}>, not a paint", attribute.value.trim(), tag),
                );
                None
            }
        }
    }

    /// Binds a paint element in the scope of the element that uses it.
    fn bind_paint(&mut self, id: NodeId, kind: PaintKind, scope: &Scope) -> Option<Paint> {
        let element = self.element(id)?;
        self.mark(id);
        let paint = match kind {
            PaintKind::Solid => Paint::Color {
                color: self.required(&element, "color", scope, None, Expression::Constant(Color::TRANSPARENT)),
            },
            PaintKind::LinearGradient => Paint::Linear {
                x1: self.or_default(&element, "x1", scope, None, Expression::Constant(0.0)),
                y1: self.or_default(&element, "y1", scope, None, Expression::Constant(0.0)),
                x2: self.or_default(&element, "x2", scope, None, Expression::Constant(1.0)),
                y2: self.or_default(&element, "y2", scope, None, Expression::Constant(0.0)),
                stops: self.bind_stops(id, scope),
            },
            PaintKind::RadialGradient => Paint::Radial {
                cx: self.or_default(&element, "cx", scope, None, Expression::Constant(0.5)),
                cy: self.or_default(&element, "cy", scope, None, Expression::Constant(0.5)),
                r: self.or_default(&element, "r", scope, None, Expression::Constant(0.5)),
                stops: self.bind_stops(id, scope),
            },
        };
        Some(paint)
    }

    fn bind_stops(&mut self, gradient: NodeId, scope: &Scope) -> Vec<GradientStop> {
        let mut stops = Vec::new();
        for (child, construct) in self.child_elements(gradient) {
            if construct != Construct::Stop {
                let tag = tag_of(&construct, &self.arena, child);
                self.error(self.span(child), format!("<{}> cannot appear inside a gradient", tag));
                self.mark_subtree(child);
                continue;
            }
            let Some(element) = self.element(child) else { continue };
            self.mark(child);
            stops.push(GradientStop {
                offset: self.required(&element, "offset", scope, None, Expression::Constant(0.0)),
                color: self.required(&element, "color", scope, None, Expression::Constant(Color::TRANSPARENT)),
            });
        }
        if stops.is_empty() {
            self.warning(self.span(gradient), "gradient has no stops");
        }
        stops
    }
}

fn tag_of(construct: &Construct, arena: &Arena, id: NodeId) -> String {
    match construct {
        Construct::Unknown(name) => name.clone(),
        _ => arena.element(id).map(|e| e.name.clone()).unwrap_or_default(),
    }
}

/// `width` or `height` of the enclosing div, as a formula.
fn extent(axis: Axis) -> Expression<f64> {
    Expression::Formula(Formula::new(Ast::name(axis.extent(), 0..0), ValueType::Scalar))
}

fn path_error_offset(err: &PathError) -> usize {
    match err {
        PathError::MissingMoveTo { offset }
        | PathError::UnknownCommand { offset, .. }
        | PathError::ExpectedNumber { offset } => *offset,
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The id in `#id`, `url(#id)`, `url('#id')` or `url("#id")`.
pub fn reference_target(text: &str) -> Option<&str> {
    let text = text.trim();
    let inner = match text.strip_prefix("url(").and_then(|t| t.strip_suffix(')')) {
        Some(inner) => {
            let inner = inner.trim();
            ['"', '\'']
                .iter()
                .find_map(|q| inner.strip_prefix(*q).and_then(|i| i.strip_suffix(*q)))
                .unwrap_or(inner)
        }
        None => text,
    };
    let id = inner.strip_prefix('#')?;
    (!id.is_empty()).then_some(id)
}

/// Cycles in a small dependency graph, each listed once in discovery order.
fn find_cycles(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        New,
        Active,
        Done,
    }

    fn visit(
        node: usize,
        edges: &[Vec<usize>],
        state: &mut [State],
        path: &mut Vec<usize>,
        cycles: &mut Vec<Vec<usize>>,
    ) {
        state[node] = State::Active;
        path.push(node);
        for &next in &edges[node] {
            match state[next] {
                State::New => visit(next, edges, state, path, cycles),
                State::Active => {
                    if let Some(start) = path.iter().position(|n| *n == next) {
                        cycles.push(path[start..].to_vec());
                    }
                }
                State::Done => {}
            }
        }
        path.pop();
        state[node] = State::Done;
    }

    let mut state = vec![State::New; edges.len()];
    let mut cycles = Vec::new();
    for node in 0..edges.len() {
        if state[node] == State::New {
            visit(node, edges, &mut state, &mut Vec::new(), &mut cycles);
        }
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_target() {
        assert_eq!(reference_target("#grad"), Some("grad"));
        assert_eq!(reference_target(" url(#grad) "), Some("grad"));
        assert_eq!(reference_target("url('#grad')"), Some("grad"));
        assert_eq!(reference_target("url(\"#grad\")"), Some("grad"));
        assert_eq!(reference_target("red"), None);
        assert_eq!(reference_target("#"), None);
    }

    #[test]
    fn test_find_cycles() {
        // 0 -> 1 -> 2 -> 0, 3 -> 3, 4 -> 0
        let edges = vec![vec![1], vec![2], vec![0], vec![3], vec![0]];
        assert_eq!(find_cycles(&edges), vec![vec![0, 1, 2], vec![3]]);
        assert!(find_cycles(&[vec![1], vec![]]).is_empty());
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("corner_radius"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("corner-radius"));
        assert!(!is_identifier(""));
    }
}
