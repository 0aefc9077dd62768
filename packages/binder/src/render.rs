//! Draw-time evaluation of a bound pattern for one instance.
//!
//! All geometry reaches the [`Surface`] in surface coordinates: the renderer
//! maps every point through the chain of element transforms, div offsets
//! and n-slice scalings itself, since an n-slice mapping is not affine.

use crate::arguments::Instance;
use crate::canvas::{self, TEXT_WIDTH};
use crate::element::{
    BoundElement, ElementKind, Field, Frame, Image, Paint, Shape, StyleSheet, TextAnchor, TextRun,
    Variable,
};
use crate::error::{RenderError, RenderResult};
use crate::pattern::Pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use stencil_expression::{
    Binding, EvalError, EvalResult, Expression, HostFunction, Scope, Typed, Value, ValueType,
};
use stencil_geometry::{
    Color, Margins, NSliceScaling, NSliceValues, PathCommand, PathData, Point, Rect, Size,
    Transform,
};
use stencil_parser::{Diagnostic, DiagnosticKind, Diagnostics};
use tracing::{debug, instrument, warn};

/// Where a rendered pattern ends up.
pub trait Surface {
    fn save(&mut self);
    fn restore(&mut self);
    /// Intersects the clip region with `path` until the matching `restore`.
    fn clip(&mut self, path: &PathData);
    fn fill_path(&mut self, path: &PathData, paint: &ResolvedPaint);
    fn stroke_path(&mut self, path: &PathData, paint: &ResolvedPaint, width: f64);
    /// `origin` is the left end of the baseline.
    fn draw_text(&mut self, text: &str, origin: Point, style: &TextStyle);
    fn draw_image(&mut self, href: &Path, rect: Rect);
    /// A slot where the host places its own text.
    fn field(&mut self, name: &str, rect: Rect);
}

pub trait FontMetrics {
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

pub trait ImageSource {
    fn intrinsic_size(&self, href: &Path) -> Option<Size>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "paint", rename_all = "kebab-case")]
pub enum ResolvedPaint {
    Solid {
        color: Color,
    },
    Linear {
        start: Point,
        end: Point,
        stops: Vec<(f64, Color)>,
    },
    Radial {
        center: Point,
        radius: f64,
        stops: Vec<(f64, Color)>,
    },
}

impl ResolvedPaint {
    pub fn is_invisible(&self) -> bool {
        match self {
            ResolvedPaint::Solid { color } => color.is_transparent(),
            ResolvedPaint::Linear { stops, .. } | ResolvedPaint::Radial { stops, .. } => {
                stops.iter().all(|(_, c)| c.is_transparent())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub font_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    pub color: Color,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderReport {
    /// Argument problems and per-element evaluation failures.
    pub diagnostics: Diagnostics,
    /// Surface calls that put something on the surface.
    pub drawn: usize,
    /// Elements dropped because something in them failed to evaluate.
    pub skipped: usize,
}

pub struct Renderer {
    metrics: Rc<dyn FontMetrics>,
    images: Option<Rc<dyn ImageSource>>,
}

impl Renderer {
    pub fn new(metrics: Rc<dyn FontMetrics>) -> Self {
        Self {
            metrics,
            images: None,
        }
    }

    pub fn with_images(mut self, images: Rc<dyn ImageSource>) -> Self {
        self.images = Some(images);
        self
    }

    /// Draws `pattern` into `target`. Problems inside single elements skip
    /// that element and are reported; only an unusable pattern, target or
    /// pattern body is an error.
    #[instrument(skip_all, fields(pattern = %pattern.qualified_name))]
    pub fn render(
        &self,
        pattern: &Pattern,
        instance: &Instance,
        target: Rect,
        surface: &mut dyn Surface,
    ) -> RenderResult<RenderReport> {
        let body = match (&pattern.body, pattern.is_error) {
            (Some(body), false) => body,
            _ => {
                return Err(RenderError::ErrorPattern {
                    name: pattern.qualified_name.clone(),
                })
            }
        };
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !(valid(target.width) && valid(target.height)) || !target.x.is_finite() || !target.y.is_finite() {
            return Err(RenderError::InvalidTarget {
                width: target.width,
                height: target.height,
            });
        }

        let (values, diagnostics) = pattern.bind_arguments(instance);
        let root = Rc::new(self.root_scope(target.size()));
        let args = Rc::new(values.scope(root));

        let mut drawing = Drawing {
            renderer: self,
            surface,
            report: RenderReport {
                diagnostics,
                ..RenderReport::default()
            },
        };
        let ctx = DrawContext {
            scope: args,
            mapping: Mapping::root(Transform::translate(target.x, target.y)),
        };
        if let Err(source) = drawing.element(body, &ctx) {
            return Err(RenderError::Evaluation {
                name: pattern.qualified_name.clone(),
                source,
            });
        }
        debug!(
            drawn = drawing.report.drawn,
            skipped = drawing.report.skipped,
            "pattern rendered"
        );
        Ok(drawing.report)
    }

    /// Canvas state for a target of `size`, plus the font metrics function.
    fn root_scope(&self, size: Size) -> Scope {
        let mut scope = Scope::new();
        canvas::initial_state(&mut scope, size.width, size.height);
        let metrics = self.metrics.clone();
        scope.define_function(HostFunction::new(
            TEXT_WIDTH,
            vec![ValueType::String, ValueType::Scalar],
            ValueType::Scalar,
            move |args| match args {
                [text, size] => {
                    let text = text.to_string();
                    let size = size.as_f64().ok_or_else(|| {
                        EvalError::invalid_argument(TEXT_WIDTH, "font size must be a number")
                    })?;
                    Ok(Value::Scalar(metrics.text_width(&text, size)))
                }
                _ => Err(EvalError::invalid_argument(TEXT_WIDTH, "expected a text and a font size")),
            },
        ));
        scope
    }
}

/// Local coordinates to surface coordinates, innermost step last.
#[derive(Debug, Clone)]
struct Mapping {
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
enum Step {
    Affine(Transform),
    Slice(NSliceScaling),
}

impl Mapping {
    fn root(transform: Transform) -> Self {
        Self {
            steps: vec![Step::Affine(transform)],
        }
    }

    fn then(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        match (steps.last().cloned(), step) {
            (Some(Step::Affine(outer)), Step::Affine(inner)) => {
                steps.pop();
                steps.push(Step::Affine(outer * inner));
            }
            (_, step) => steps.push(step),
        }
        Self { steps }
    }

    fn apply(&self, p: Point) -> Point {
        self.steps.iter().rev().fold(p, |p, step| match step {
            Step::Affine(t) => t.apply(p),
            Step::Slice(s) => s.transform_point(p),
        })
    }

    /// Overall length scale, for stroke widths, radii and font sizes.
    fn scale(&self) -> f64 {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Affine(t) => t.mean_scale(),
                Step::Slice(s) => s.uniform_scale(),
            })
            .product()
    }

    fn path(&self, path: &PathData) -> PathData {
        path.map_points(|p| self.apply(p))
    }

    fn rect(&self, rect: Rect) -> Rect {
        Rect::from_points(self.apply(rect.origin()), self.apply(rect.max()))
    }
}

struct DrawContext {
    scope: Rc<Scope>,
    mapping: Mapping,
}

struct Drawing<'r, 's> {
    renderer: &'r Renderer,
    surface: &'s mut dyn Surface,
    report: RenderReport,
}

impl Drawing<'_, '_> {
    /// Draws `element` once per loop iteration. Errors in the element itself
    /// are returned; errors in descendants are reported and skipped.
    fn element(&mut self, element: &BoundElement, ctx: &DrawContext) -> EvalResult<()> {
        let Some(for_each) = &element.for_each else {
            return self.instance(element, ctx.scope.clone(), &ctx.mapping);
        };
        let items = match for_each.items.eval(&ctx.scope)? {
            Value::List(items) => items,
            other => return Err(EvalError::bad_cast(other.value_type(), "list")),
        };
        debug!(element = %element.id, iterations = items.len(), "for-each");
        for (index, item) in items.into_iter().enumerate() {
            let mut scope = Scope::with_parent(ctx.scope.clone());
            scope.bind_value(for_each.item.clone(), item.coerce(&for_each.item_type)?);
            if let Some(name) = &for_each.index {
                scope.bind_value(name.clone(), Value::Int(index as i64));
            }
            self.instance(element, Rc::new(scope), &ctx.mapping)?;
        }
        Ok(())
    }

    fn instance(&mut self, element: &BoundElement, scope: Rc<Scope>, mapping: &Mapping) -> EvalResult<()> {
        let scope = with_vars(scope, &element.vars);
        match &element.kind {
            ElementKind::Div(frame) | ElementKind::Area { frame, .. } => {
                self.div(element, frame, scope, mapping)
            }
            ElementKind::Group => {
                let style = Style::evaluate(&element.style, &scope)?;
                if !style.visible {
                    return Ok(());
                }
                let mapping = style.local_mapping(mapping);
                let child = Rc::new(style.state_scope(scope));
                self.children(element, &child, &mapping);
                Ok(())
            }
            ElementKind::Shape(shape) => self.shape(element, shape, &scope, mapping),
            ElementKind::Text(text) => self.text(element, text, &scope, mapping),
            ElementKind::Image(image) => self.image(element, image, &scope, mapping),
            ElementKind::Field(field) => self.field(element, field, &scope, mapping),
        }
    }

    fn children(&mut self, element: &BoundElement, scope: &Rc<Scope>, mapping: &Mapping) {
        let ctx = DrawContext {
            scope: scope.clone(),
            mapping: mapping.clone(),
        };
        for child in &element.children {
            if let Err(err) = self.element(child, &ctx) {
                warn!(element = %child.id, error = %err, "element skipped");
                self.report.skipped += 1;
                self.report.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Evaluation,
                        child.span,
                        "element could not be drawn",
                    )
                    .with_cause(err.to_string()),
                );
            }
        }
    }

    fn div(&mut self, element: &BoundElement, frame: &Frame, scope: Rc<Scope>, mapping: &Mapping) -> EvalResult<()> {
        let parent = Size::new(lookup_f64(&scope, "width")?, lookup_f64(&scope, "height")?);
        let rect = frame_rect(frame, parent, &scope)?;

        let slicing = match &frame.slicing {
            Some(slicing) => {
                let reference = slicing.reference.eval(&scope)?;
                let values = NSliceValues::new(reference, slicing.xs.eval(&scope)?, slicing.ys.eval(&scope)?)
                    .map_err(|err| EvalError::invalid_argument("n-slice", err.to_string()))?;
                Some(values)
            }
            None => None,
        };
        // Children see the reference size when laid out through a slicing.
        let inner_size = slicing.as_ref().map(|v| v.reference).unwrap_or(rect.size());
        let mut inner = Scope::with_parent(scope);
        inner.bind_value("width", Value::Scalar(inner_size.width));
        inner.bind_value("height", Value::Scalar(inner_size.height));
        let inner = Rc::new(inner);

        let style = Style::evaluate(&element.style, &inner)?;
        if !style.visible {
            return Ok(());
        }
        let outer = style.local_mapping(mapping);
        let mut child_mapping = outer.then(Step::Affine(Transform::translate(rect.x, rect.y)));
        if let Some(values) = &slicing {
            let scaling = NSliceScaling::compute(values, Rect::new(0.0, 0.0, rect.width, rect.height));
            child_mapping = child_mapping.then(Step::Slice(scaling));
        }

        let local = Rect::new(0.0, 0.0, rect.width, rect.height);
        let outline = outer.path(&rect_path(rect));
        let mut paints = Vec::new();
        if let Some(fill) = &style.fill {
            paints.push((resolve_paint(fill, local.translate(rect.x, rect.y), &outer, &inner)?, None));
        }
        if let Some(stroke) = &style.stroke {
            paints.push((
                resolve_paint(stroke, local.translate(rect.x, rect.y), &outer, &inner)?,
                Some(style.stroke_width * outer.scale()),
            ));
        }
        for (paint, width) in paints {
            self.paint(&outline, &paint, width);
        }

        let child_scope = Rc::new(style.state_scope(inner));
        if style.clip {
            self.surface.save();
            self.surface.clip(&outline);
            self.children(element, &child_scope, &child_mapping);
            self.surface.restore();
        } else {
            self.children(element, &child_scope, &child_mapping);
        }
        Ok(())
    }

    fn paint(&mut self, path: &PathData, paint: &ResolvedPaint, stroke: Option<f64>) {
        if paint.is_invisible() || path.is_empty() {
            return;
        }
        match stroke {
            Some(width) if width > 0.0 => self.surface.stroke_path(path, paint, width),
            Some(_) => return,
            None => self.surface.fill_path(path, paint),
        }
        self.report.drawn += 1;
    }

    fn shape(&mut self, element: &BoundElement, shape: &Shape, scope: &Scope, mapping: &Mapping) -> EvalResult<()> {
        let style = Style::evaluate(&element.style, scope)?;
        if !style.visible {
            return Ok(());
        }
        let local = shape_path(shape, scope)?;
        let mapping = style.local_mapping(mapping);
        let bounds = path_bounds(&local);
        let path = mapping.path(&local);

        let fill = match (&style.fill, shape) {
            // Open shapes are only stroked.
            (_, Shape::Line { .. }) => None,
            (Some(fill), _) => Some(resolve_paint(fill, bounds, &mapping, scope)?),
            (None, _) => None,
        };
        let stroke = match &style.stroke {
            Some(stroke) => Some(resolve_paint(stroke, bounds, &mapping, scope)?),
            None => None,
        };
        if let Some(fill) = fill {
            self.paint(&path, &fill, None);
        }
        if let Some(stroke) = stroke {
            self.paint(&path, &stroke, Some(style.stroke_width * mapping.scale()));
        }
        Ok(())
    }

    fn text(&mut self, element: &BoundElement, text: &TextRun, scope: &Scope, mapping: &Mapping) -> EvalResult<()> {
        let style = Style::evaluate(&element.style, scope)?;
        if !style.visible {
            return Ok(());
        }
        let content = text.content.eval(scope)?;
        if content.is_empty() {
            return Ok(());
        }
        let font_size = text.font_size.eval(scope)?;
        let advance = self.renderer.metrics.text_width(&content, font_size);
        let x = text.x.eval(scope)?
            - match text.anchor {
                TextAnchor::Start => 0.0,
                TextAnchor::Middle => advance / 2.0,
                TextAnchor::End => advance,
            };
        let mapping = style.local_mapping(mapping);
        let origin = mapping.apply(Point::new(x, text.y.eval(scope)?));
        let text_style = TextStyle {
            font_size: font_size * mapping.scale(),
            font_family: text.font_family.as_ref().map(|f| f.eval(scope)).transpose()?,
            color: style.text_color,
        };
        self.surface.draw_text(&content, origin, &text_style);
        self.report.drawn += 1;
        Ok(())
    }

    fn image(&mut self, element: &BoundElement, image: &Image, scope: &Scope, mapping: &Mapping) -> EvalResult<()> {
        let style = Style::evaluate(&element.style, scope)?;
        if !style.visible {
            return Ok(());
        }
        let href: PathBuf = image.href.eval(scope)?;
        let width = optional(&image.width, scope)?;
        let height = optional(&image.height, scope)?;
        let size = match (width, height) {
            (Some(width), Some(height)) => Size::new(width, height),
            (width, height) => {
                let intrinsic = self
                    .renderer
                    .images
                    .as_ref()
                    .and_then(|images| images.intrinsic_size(&href))
                    .ok_or_else(|| {
                        EvalError::invalid_argument(
                            "image",
                            format!("no size given and '{}' has no known size", href.display()),
                        )
                    })?;
                Size::new(width.unwrap_or(intrinsic.width), height.unwrap_or(intrinsic.height))
            }
        };
        let rect = Rect::new(image.x.eval(scope)?, image.y.eval(scope)?, size.width, size.height);
        let mapping = style.local_mapping(mapping);
        self.surface.draw_image(&href, mapping.rect(rect));
        self.report.drawn += 1;
        Ok(())
    }

    fn field(&mut self, element: &BoundElement, field: &Field, scope: &Scope, mapping: &Mapping) -> EvalResult<()> {
        let style = Style::evaluate(&element.style, scope)?;
        if !style.visible {
            return Ok(());
        }
        let x = field.x.eval(scope)?;
        let y = field.y.eval(scope)?;
        let width = match optional(&field.width, scope)? {
            Some(width) => width,
            None => lookup_f64(scope, "width")? - x,
        };
        let height = match optional(&field.height, scope)? {
            Some(height) => height,
            None => lookup_f64(scope, "height")? - y,
        };
        let mapping = style.local_mapping(mapping);
        self.surface.field(&field.name, mapping.rect(Rect::new(x, y, width, height)));
        self.report.drawn += 1;
        Ok(())
    }
}

/// A style sheet evaluated in one element's scope.
struct Style<'a> {
    fill: Option<&'a Paint>,
    stroke: Option<&'a Paint>,
    stroke_width: f64,
    text_color: Color,
    visible: bool,
    transform: Transform,
    local: Option<Transform>,
    clip: bool,
}

impl<'a> Style<'a> {
    fn evaluate(sheet: &'a StyleSheet, scope: &Scope) -> EvalResult<Self> {
        Ok(Self {
            fill: sheet.fill.as_ref(),
            stroke: sheet.stroke.as_ref(),
            stroke_width: sheet.stroke_width.eval(scope)?,
            text_color: match &sheet.text_color {
                Some(color) => color.eval(scope)?,
                None => lookup(scope, "text_color")?,
            },
            visible: sheet.visible.eval(scope)?,
            transform: sheet.transform.eval(scope)?,
            local: sheet.local_transform.as_ref().map(|t| t.eval(scope)).transpose()?,
            clip: sheet.clip,
        })
    }

    fn local_mapping(&self, mapping: &Mapping) -> Mapping {
        match self.local {
            Some(local) => mapping.then(Step::Affine(local)),
            None => mapping.clone(),
        }
    }

    /// Canvas state names as seen by children.
    fn state_scope(&self, parent: Rc<Scope>) -> Scope {
        let mut scope = Scope::with_parent(parent.clone());
        let solid = |paint: Option<&Paint>| match paint {
            Some(Paint::Color { color }) => color.eval(&parent).ok(),
            _ => None,
        };
        if let Some(fill) = solid(self.fill) {
            scope.bind_value("fill", Value::Color(fill));
        }
        if let Some(stroke) = solid(self.stroke) {
            scope.bind_value("stroke", Value::Color(stroke));
        }
        scope.bind_value("stroke_width", Value::Scalar(self.stroke_width));
        scope.bind_value("text_color", Value::Color(self.text_color));
        scope.bind_value("transform", Value::Transform(self.transform));
        scope
    }
}

fn with_vars(scope: Rc<Scope>, vars: &[Variable]) -> Rc<Scope> {
    if vars.is_empty() {
        return scope;
    }
    let mut bound = Scope::with_parent(scope);
    for var in vars {
        match &var.value {
            Some(value) => bound.bind(var.name.clone(), Binding::new(var.ty.clone(), value.clone())),
            None => bound.declare(var.name.clone(), var.ty.clone()),
        }
    }
    Rc::new(bound)
}

fn lookup<T: Typed>(scope: &Scope, name: &str) -> EvalResult<T> {
    let (binding, defined_in) = scope.resolve(name).ok_or_else(|| EvalError::UndefinedName {
        name: name.to_string(),
    })?;
    match &binding.value {
        Some(value) => T::from_value(value.eval(defined_in)?),
        None => Err(binding.missing(name)),
    }
}

fn lookup_f64(scope: &Scope, name: &str) -> EvalResult<f64> {
    lookup::<f64>(scope, name)
}

fn optional<T: Typed>(expr: &Option<Expression<T>>, scope: &Scope) -> EvalResult<Option<T>> {
    expr.as_ref().map(|e| e.eval(scope)).transpose()
}

/// The div's rectangle in its parent's coordinates, margins applied.
fn frame_rect(frame: &Frame, parent: Size, scope: &Scope) -> EvalResult<Rect> {
    let x = optional(&frame.x, scope)?.unwrap_or(0.0);
    let y = optional(&frame.y, scope)?.unwrap_or(0.0);
    let width = optional(&frame.width, scope)?.unwrap_or(parent.width - x);
    let height = optional(&frame.height, scope)?.unwrap_or(parent.height - y);
    let margin = optional::<Margins>(&frame.margin, scope)?.unwrap_or_default();
    Ok(Rect::new(x, y, width, height).inset(margin))
}

fn resolve_paint(paint: &Paint, bounds: Rect, mapping: &Mapping, scope: &Scope) -> EvalResult<ResolvedPaint> {
    let at = |fx: f64, fy: f64| {
        mapping.apply(Point::new(
            bounds.x + fx * bounds.width,
            bounds.y + fy * bounds.height,
        ))
    };
    let stops = |stops: &[crate::element::GradientStop]| -> EvalResult<Vec<(f64, Color)>> {
        stops
            .iter()
            .map(|s| -> EvalResult<(f64, Color)> {
                Ok((s.offset.eval(scope)?.clamp(0.0, 1.0), s.color.eval(scope)?))
            })
            .collect()
    };
    Ok(match paint {
        Paint::Color { color } => ResolvedPaint::Solid {
            color: color.eval(scope)?,
        },
        Paint::Linear { x1, y1, x2, y2, stops: s } => ResolvedPaint::Linear {
            start: at(x1.eval(scope)?, y1.eval(scope)?),
            end: at(x2.eval(scope)?, y2.eval(scope)?),
            stops: stops(s)?,
        },
        Paint::Radial { cx, cy, r, stops: s } => ResolvedPaint::Radial {
            center: at(cx.eval(scope)?, cy.eval(scope)?),
            radius: r.eval(scope)? * (bounds.width + bounds.height) / 2.0 * mapping.scale(),
            stops: stops(s)?,
        },
    })
}

/// Control point distance for a quarter circle drawn with one cubic.
const KAPPA: f64 = 0.552_284_749_831;

fn shape_path(shape: &Shape, scope: &Scope) -> EvalResult<PathData> {
    Ok(match shape {
        Shape::Rect { x, y, width, height, rx, ry } => {
            let rect = Rect::new(x.eval(scope)?, y.eval(scope)?, width.eval(scope)?, height.eval(scope)?);
            let rx_value = optional(rx, scope)?;
            let ry_value = optional(ry, scope)?;
            match (rx_value, ry_value) {
                (None, None) => rect_path(rect),
                (rx, ry) => {
                    let rx = rx.or(ry).unwrap_or(0.0);
                    let ry = ry.unwrap_or(rx);
                    rounded_rect_path(rect, rx, ry)
                }
            }
        }
        Shape::Ellipse { cx, cy, rx, ry } => ellipse_path(
            Point::new(cx.eval(scope)?, cy.eval(scope)?),
            rx.eval(scope)?,
            ry.eval(scope)?,
        ),
        Shape::Circle { cx, cy, r } => {
            let r = r.eval(scope)?;
            ellipse_path(Point::new(cx.eval(scope)?, cy.eval(scope)?), r, r)
        }
        Shape::Line { x1, y1, x2, y2 } => PathData::polyline(
            &[
                Point::new(x1.eval(scope)?, y1.eval(scope)?),
                Point::new(x2.eval(scope)?, y2.eval(scope)?),
            ],
            false,
        ),
        Shape::Poly { points, closed } => {
            let coords = points.eval(scope)?;
            if coords.len() % 2 != 0 {
                return Err(EvalError::invalid_argument(
                    "points",
                    format!("expected x and y pairs, found {} numbers", coords.len()),
                ));
            }
            let points: Vec<Point> = coords.chunks(2).map(|c| Point::new(c[0], c[1])).collect();
            PathData::polyline(&points, *closed)
        }
        Shape::Path { data } => data.clone(),
    })
}

fn rect_path(rect: Rect) -> PathData {
    let rect = rect.normalized();
    PathData::polyline(
        &[
            rect.origin(),
            Point::new(rect.x + rect.width, rect.y),
            rect.max(),
            Point::new(rect.x, rect.y + rect.height),
        ],
        true,
    )
}

fn rounded_rect_path(rect: Rect, rx: f64, ry: f64) -> PathData {
    let rect = rect.normalized();
    let rx = rx.clamp(0.0, rect.width / 2.0);
    let ry = ry.clamp(0.0, rect.height / 2.0);
    if rx == 0.0 || ry == 0.0 {
        return rect_path(rect);
    }
    let (l, t) = (rect.x, rect.y);
    let (r, b) = (rect.x + rect.width, rect.y + rect.height);
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    let mut path = PathData::new();
    path.move_to(Point::new(l + rx, t)).line_to(Point::new(r - rx, t));
    path.commands.push(PathCommand::CubicTo(
        Point::new(r - rx + kx, t),
        Point::new(r, t + ry - ky),
        Point::new(r, t + ry),
    ));
    path.line_to(Point::new(r, b - ry));
    path.commands.push(PathCommand::CubicTo(
        Point::new(r, b - ry + ky),
        Point::new(r - rx + kx, b),
        Point::new(r - rx, b),
    ));
    path.line_to(Point::new(l + rx, b));
    path.commands.push(PathCommand::CubicTo(
        Point::new(l + rx - kx, b),
        Point::new(l, b - ry + ky),
        Point::new(l, b - ry),
    ));
    path.line_to(Point::new(l, t + ry));
    path.commands.push(PathCommand::CubicTo(
        Point::new(l, t + ry - ky),
        Point::new(l + rx - kx, t),
        Point::new(l + rx, t),
    ));
    path.close();
    path
}

fn ellipse_path(center: Point, rx: f64, ry: f64) -> PathData {
    let (cx, cy) = (center.x, center.y);
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    let mut path = PathData::new();
    path.move_to(Point::new(cx + rx, cy));
    path.commands.extend([
        PathCommand::CubicTo(
            Point::new(cx + rx, cy + ky),
            Point::new(cx + kx, cy + ry),
            Point::new(cx, cy + ry),
        ),
        PathCommand::CubicTo(
            Point::new(cx - kx, cy + ry),
            Point::new(cx - rx, cy + ky),
            Point::new(cx - rx, cy),
        ),
        PathCommand::CubicTo(
            Point::new(cx - rx, cy - ky),
            Point::new(cx - kx, cy - ry),
            Point::new(cx, cy - ry),
        ),
        PathCommand::CubicTo(
            Point::new(cx + kx, cy - ry),
            Point::new(cx + rx, cy - ky),
            Point::new(cx + rx, cy),
        ),
    ]);
    path.close();
    path
}

/// Bounding box of every anchor and control point.
fn path_bounds(path: &PathData) -> Rect {
    let mut points = Vec::new();
    path.map_points(|p| {
        points.push(p);
        p
    });
    let Some(first) = points.first() else {
        return Rect::default();
    };
    let (min, max) = points.iter().fold((*first, *first), |(min, max), p| {
        (
            Point::new(min.x.min(p.x), min.y.min(p.y)),
            Point::new(max.x.max(p.x), max.y.max(p.y)),
        )
    });
    Rect::from_points(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_merges_affine_steps() {
        let mapping = Mapping::root(Transform::translate(10.0, 0.0)).then(Step::Affine(Transform::scale(2.0, 2.0)));
        assert_eq!(mapping.steps.len(), 1);
        assert_eq!(mapping.apply(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));
        assert!((mapping.scale() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_slice_step_maps_through_cuts() {
        let values = NSliceValues::new(Size::new(30.0, 30.0), vec![10.0, 20.0], vec![]).unwrap();
        let scaling = NSliceScaling::compute(&values, Rect::new(0.0, 0.0, 60.0, 30.0));
        let mapping = Mapping::root(Transform::translate(100.0, 0.0)).then(Step::Slice(scaling));
        // Fixed corners keep their size, the middle stretches.
        assert_eq!(mapping.apply(Point::new(5.0, 0.0)).x, 105.0);
        assert_eq!(mapping.apply(Point::new(25.0, 0.0)).x, 155.0);
    }

    #[test]
    fn test_rounded_rect_radii_are_clamped() {
        let path = rounded_rect_path(Rect::new(0.0, 0.0, 10.0, 4.0), 8.0, 8.0);
        let bounds = path_bounds(&path);
        assert_eq!(bounds, Rect::new(0.0, 0.0, 10.0, 4.0));
        assert_eq!(path.commands.first(), Some(&PathCommand::MoveTo(Point::new(5.0, 0.0))));
    }

    #[test]
    fn test_ellipse_bounds() {
        let bounds = path_bounds(&ellipse_path(Point::new(5.0, 5.0), 5.0, 2.0));
        assert_eq!(bounds, Rect::new(0.0, 3.0, 10.0, 4.0));
    }
}
