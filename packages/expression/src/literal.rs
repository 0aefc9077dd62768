//! Type-directed parsing of attribute text. The caller names the type it
//! wants; the text may use that type's literal shorthand or a `{formula}`.

use crate::ast::{Ast, BinaryOp};
use crate::builtins;
use crate::error::{FormatError, FormatResult};
use crate::expression::{Expression, Formula, Typed};
use crate::parser::{braced, find_close, fold, parse_formula, parse_template};
use crate::scope::Scope;
use crate::value::{Value, ValueType};
use std::ops::Range;
use stencil_geometry::{Axis, Color, Transform};

/// What a literal may refer to while being parsed.
#[derive(Debug, Clone, Copy)]
pub struct LiteralContext<'a> {
    pub scope: &'a Scope,
    /// Axis that `N%` is relative to; `None` makes `N%` a plain fraction.
    pub axis: Option<Axis>,
}

impl<'a> LiteralContext<'a> {
    pub fn new(scope: &'a Scope) -> Self {
        Self { scope, axis: None }
    }

    pub fn with_axis(self, axis: Option<Axis>) -> Self {
        Self { axis, ..self }
    }
}

/// Parses `text` as a value of type `ty`. Ranges in errors and formulas
/// are byte offsets into `text`.
pub fn parse_typed(
    text: &str,
    ty: &ValueType,
    ctx: &LiteralContext<'_>,
) -> FormatResult<Expression<Value>> {
    typed(text, 0, ty, ctx)
}

/// [`parse_typed`] for a statically known Rust type.
pub fn parse_as<T: Typed>(text: &str, ctx: &LiteralContext<'_>) -> FormatResult<Expression<T>> {
    let ty = T::value_type();
    parse_typed(text, &ty, ctx)?
        .cast::<T>()
        .map_err(|_| FormatError::invalid_literal(&ty, text.trim(), 0..text.len()))
}

fn typed(
    text: &str,
    base: usize,
    ty: &ValueType,
    ctx: &LiteralContext<'_>,
) -> FormatResult<Expression<Value>> {
    let whole = base..base + text.len();
    if matches!(ty, ValueType::String | ValueType::Path) {
        return finish(parse_template(text, base, ctx.scope)?, ty, text, whole);
    }
    if let Some((inner, offset)) = braced(text) {
        let ast = parse_formula(inner, base + offset, ctx.scope)?;
        return finish(ast, ty, text, whole);
    }

    let trimmed = text.trim();
    let start = base + (text.len() - text.trim_start().len());
    let range = start..start + trimmed.len();
    let ast = match ty {
        ValueType::Scalar => scalar_item(trimmed, range, ctx.axis, ctx)?,
        ValueType::Int => match trimmed.parse::<i64>() {
            Ok(v) => Ast::literal(Value::Int(v), range),
            Err(_) => return Err(FormatError::invalid_literal(ty, trimmed, range)),
        },
        ValueType::Bool => match trimmed {
            "true" | "yes" => Ast::literal(Value::Bool(true), range),
            "false" | "no" => Ast::literal(Value::Bool(false), range),
            _ => return Err(FormatError::invalid_literal(ty, trimmed, range)),
        },
        ValueType::Color => match trimmed {
            "none" => Ast::literal(Value::Color(Color::TRANSPARENT), range),
            name => match Color::named(name) {
                Some(color) => Ast::literal(Value::Color(color), range),
                None => return Err(FormatError::invalid_literal(ty, trimmed, range)),
            },
        },
        ValueType::Transform => transform(text, base, ctx)?,
        ValueType::Rect => tuple(text, base, "rect", XYXY, ctx)?,
        ValueType::Size => tuple(text, base, "size", XY, ctx)?,
        ValueType::Point => tuple(text, base, "point", XY, ctx)?,
        ValueType::Margins => margins(text, base, ctx)?,
        ValueType::Enum(members) => {
            if members.iter().any(|m| m == trimmed) {
                Ast::literal(Value::String(trimmed.to_string()), range)
            } else {
                return Err(FormatError::UnknownEnumValue {
                    value: trimmed.to_string(),
                    allowed: members.clone(),
                    range,
                });
            }
        }
        ValueType::List(item) => {
            let mut asts = Vec::new();
            for (item_text, item_range) in split_items(text, base) {
                let ast = match item.as_ref() {
                    ValueType::Scalar => scalar_item(item_text, item_range, ctx.axis, ctx)?,
                    other => typed(item_text, item_range.start, other, ctx)?.to_ast(),
                };
                asts.push(ast);
            }
            fold(Ast::new(crate::ast::AstKind::List(asts), range), ctx.scope)
        }
        ValueType::Any => {
            if let Ok(v) = trimmed.parse::<i64>() {
                Ast::literal(Value::Int(v), range)
            } else if let Some(v) = number(trimmed) {
                Ast::literal(Value::Scalar(v), range)
            } else if let Ok(b) = trimmed.parse::<bool>() {
                Ast::literal(Value::Bool(b), range)
            } else {
                parse_template(text, base, ctx.scope)?
            }
        }
        ValueType::Record(_) | ValueType::String | ValueType::Path => {
            return Err(FormatError::invalid_literal(ty, trimmed, range))
        }
    };
    finish(ast, ty, text, whole)
}

/// Wraps a folded tree: constants are coerced to `ty` now, anything else
/// becomes a formula tagged with `ty`.
fn finish(
    ast: Ast,
    ty: &ValueType,
    text: &str,
    whole: Range<usize>,
) -> FormatResult<Expression<Value>> {
    match ast.as_literal() {
        Some(value) => value
            .clone()
            .coerce(ty)
            .map(Expression::Constant)
            .map_err(|_| FormatError::invalid_literal(ty, text.trim(), whole)),
        None => Ok(Expression::Formula(Formula::new(ast, ty.clone()))),
    }
}

fn number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '.' | '-' | '+')) {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One numeric element: a number, `N%` or `{formula}`.
fn scalar_item(
    text: &str,
    range: Range<usize>,
    axis: Option<Axis>,
    ctx: &LiteralContext<'_>,
) -> FormatResult<Ast> {
    if let Some((inner, offset)) = braced(text) {
        return parse_formula(inner, range.start + offset, ctx.scope);
    }
    if let Some(percent) = text.strip_suffix('%') {
        let fraction = number(percent)
            .ok_or_else(|| FormatError::invalid_literal("percentage", text, range.clone()))?
            / 100.0;
        let Some(axis) = axis else {
            return Ok(Ast::literal(Value::Scalar(fraction), range));
        };
        if !ctx.scope.contains(axis.extent()) {
            return Err(FormatError::PercentWithoutAxis {
                axis: axis.extent(),
                range,
            });
        }
        return Ok(Ast::binary(
            BinaryOp::Multiply,
            Ast::name(axis.extent(), range.clone()),
            Ast::literal(Value::Scalar(fraction), range),
        ));
    }
    number(text)
        .map(|v| Ast::literal(Value::Scalar(v), range.clone()))
        .ok_or_else(|| FormatError::invalid_literal("number", text, range))
}

/// Splits `a, b c,{f(x, y)}` into items; commas and whitespace both
/// separate, braces group.
fn split_items(text: &str, base: usize) -> Vec<(&str, Range<usize>)> {
    let mut items = Vec::new();
    let mut start: Option<usize> = None;
    let mut pending_comma = false;
    let mut i = 0;
    let bytes = text.as_bytes();

    while i < bytes.len() {
        match bytes[i] {
            b',' => {
                if start.is_none() && pending_comma {
                    // `1,,2`: an empty element
                    items.push(("", base + i..base + i));
                }
                flush(text, base, &mut start, i, &mut items);
                pending_comma = true;
                i += 1;
            }
            b' ' | b'\t' | b'\n' | b'\r' => {
                flush(text, base, &mut start, i, &mut items);
                i += 1;
            }
            b'{' => {
                start.get_or_insert(i);
                pending_comma = false;
                i = find_close(text, i).map(|c| c + 1).unwrap_or(bytes.len());
            }
            _ => {
                start.get_or_insert(i);
                pending_comma = false;
                i += 1;
            }
        }
    }
    flush(text, base, &mut start, bytes.len(), &mut items);
    items
}

fn flush<'t>(
    text: &'t str,
    base: usize,
    start: &mut Option<usize>,
    end: usize,
    items: &mut Vec<(&'t str, Range<usize>)>,
) {
    if let Some(s) = start.take() {
        items.push((&text[s..end], base + s..base + end));
    }
}

const XY: &[Option<Axis>] = &[Some(Axis::X), Some(Axis::Y)];
const XYXY: &[Option<Axis>] = &[Some(Axis::X), Some(Axis::Y), Some(Axis::X), Some(Axis::Y)];

fn tuple(
    text: &str,
    base: usize,
    what: &str,
    axes: &[Option<Axis>],
    ctx: &LiteralContext<'_>,
) -> FormatResult<Ast> {
    let items = split_items(text, base);
    if items.len() != axes.len() {
        return Err(FormatError::WrongCount {
            what: what.to_string(),
            expected: axes.len().to_string(),
            found: items.len(),
            range: base..base + text.len(),
        });
    }
    let args = items
        .into_iter()
        .zip(axes)
        .map(|((item, range), axis)| scalar_item(item, range, *axis, ctx))
        .collect::<FormatResult<Vec<_>>>()?;
    Ok(fold(Ast::call(what, args, base..base + text.len()), ctx.scope))
}

/// CSS order: 1 value for all sides, 2 for vertical/horizontal, or 4
/// for top/right/bottom/left.
fn margins(text: &str, base: usize, ctx: &LiteralContext<'_>) -> FormatResult<Ast> {
    let items = split_items(text, base);
    let sides: Vec<(&str, Range<usize>)> = match items.len() {
        1 => vec![items[0].clone(); 4],
        2 => vec![items[0].clone(), items[1].clone(), items[0].clone(), items[1].clone()],
        4 => items,
        found => {
            return Err(FormatError::WrongCount {
                what: "margins".to_string(),
                expected: "1, 2 or 4".to_string(),
                found,
                range: base..base + text.len(),
            })
        }
    };
    let axes = [Some(Axis::Y), Some(Axis::X), Some(Axis::Y), Some(Axis::X)];
    let args = sides
        .into_iter()
        .zip(axes)
        .map(|((item, range), axis)| scalar_item(item, range, axis, ctx))
        .collect::<FormatResult<Vec<_>>>()?;
    Ok(fold(Ast::call("margins", args, base..base + text.len()), ctx.scope))
}

/// `translate(10, 5) rotate(45)`: functions compose left to right, so the
/// rightmost applies to a point first.
fn transform(text: &str, base: usize, ctx: &LiteralContext<'_>) -> FormatResult<Ast> {
    let trimmed = text.trim();
    let whole = base..base + text.len();
    if trimmed.is_empty() || trimmed == "none" {
        return Ok(Ast::literal(Value::Transform(Transform::IDENTITY), whole));
    }

    let bytes = text.as_bytes();
    let mut i = 0;
    let mut result: Option<Ast> = None;
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let name_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let name = &text[name_start..i];
        let name_range = base + name_start..base + i;
        if name.is_empty() || bytes.get(i) != Some(&b'(') {
            let rest = text[name_start..].trim();
            return Err(FormatError::invalid_literal(
                ValueType::Transform,
                rest,
                base + name_start..base + text.len(),
            ));
        }
        const NONE: &[Option<Axis>] = &[None; 6];
        const ROTATE: &[Option<Axis>] = &[None, Some(Axis::X), Some(Axis::Y)];
        let (function, axes) = match name {
            "translate" => ("translate", XY),
            "scale" => ("scale", NONE),
            "rotate" => ("rotate", ROTATE),
            "skewX" => ("skew_x", NONE),
            "skewY" => ("skew_y", NONE),
            "matrix" => ("matrix", NONE),
            _ => {
                return Err(FormatError::UnknownTransform {
                    name: name.to_string(),
                    range: name_range,
                })
            }
        };

        let open = i;
        let close = close_paren(text, open).ok_or(FormatError::UnexpectedEnd {
            expected: "')'".to_string(),
            range: base + text.len()..base + text.len(),
        })?;
        let items = split_items(&text[open + 1..close], base + open + 1);
        let call_range = base + name_start..base + close + 1;
        let accepted = builtins::arity(function).map(|a| a.accepts(items.len())).unwrap_or(false)
            // rotate takes an angle or an angle with a centre, never two values
            && !(function == "rotate" && items.len() == 2);
        if !accepted {
            return Err(FormatError::WrongCount {
                what: name.to_string(),
                expected: builtins::arity(function)
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
                found: items.len(),
                range: call_range,
            });
        }
        let args = items
            .into_iter()
            .zip(axes)
            .map(|((item, range), axis)| scalar_item(item, range, *axis, ctx))
            .collect::<FormatResult<Vec<_>>>()?;
        let call = Ast::call(function, args, call_range);
        result = Some(match result {
            Some(acc) => Ast::binary(BinaryOp::Multiply, acc, call),
            None => call,
        });
        i = close + 1;
    }

    let ast = result.unwrap_or_else(|| Ast::literal(Value::Transform(Transform::IDENTITY), whole));
    Ok(fold(ast, ctx.scope))
}

fn close_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b')' => return Some(i),
            b'{' => i = find_close(text, i)? + 1,
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_geometry::{Margins, Rect};

    fn scope_with_axes() -> Scope {
        let mut scope = Scope::new();
        scope.declare("width", ValueType::Scalar);
        scope.declare("height", ValueType::Scalar);
        scope
    }

    #[test]
    fn test_scalar_shorthands() {
        let scope = scope_with_axes();
        let ctx = LiteralContext::new(&scope).with_axis(Some(Axis::X));
        assert_eq!(parse_as::<f64>(" 12.5 ", &ctx), Ok(Expression::Constant(12.5)));

        let half = parse_as::<f64>("50%", &ctx).unwrap();
        assert_eq!(half.formula().unwrap().ast().to_string(), "(width * 0.5)");

        let plain = LiteralContext::new(&scope);
        assert_eq!(parse_as::<f64>("25%", &plain), Ok(Expression::Constant(0.25)));

        assert!(matches!(
            parse_as::<f64>("abc", &ctx),
            Err(FormatError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn test_percent_requires_axis_in_scope() {
        let empty = Scope::new();
        let ctx = LiteralContext::new(&empty).with_axis(Some(Axis::Y));
        assert_eq!(
            parse_as::<f64>("10%", &ctx),
            Err(FormatError::PercentWithoutAxis {
                axis: "height",
                range: 0..3
            })
        );
    }

    #[test]
    fn test_formula_offsets() {
        let scope = Scope::new();
        let ctx = LiteralContext::new(&scope);
        let err = parse_as::<f64>("{1 + }", &ctx).unwrap_err();
        assert_eq!(err.range(), 5..5);
    }

    #[test]
    fn test_int_and_bool() {
        let scope = Scope::new();
        let ctx = LiteralContext::new(&scope);
        assert_eq!(parse_as::<i64>("5", &ctx), Ok(Expression::Constant(5)));
        assert!(matches!(
            parse_as::<i64>("abc", &ctx),
            Err(FormatError::InvalidLiteral { ref text, .. }) if text == "abc"
        ));
        assert_eq!(parse_as::<i64>("{2 * 3}", &ctx), Ok(Expression::Constant(6)));
        assert_eq!(parse_as::<bool>("yes", &ctx), Ok(Expression::Constant(true)));
    }

    #[test]
    fn test_colors() {
        let scope = Scope::new();
        let ctx = LiteralContext::new(&scope);
        assert_eq!(
            parse_as::<Color>("none", &ctx),
            Ok(Expression::Constant(Color::TRANSPARENT))
        );
        assert_eq!(
            parse_as::<Color>("{rgb(0, 0, 255)}", &ctx),
            Ok(Expression::Constant(Color::rgba(0.0, 0.0, 1.0, 1.0)))
        );
        assert!(parse_as::<Color>("#ff0000", &ctx).is_err());
        assert!(parse_as::<Color>("{1}", &ctx).is_err());
    }

    #[test]
    fn test_transform_lists() {
        let scope = scope_with_axes();
        let ctx = LiteralContext::new(&scope);
        let t = parse_as::<Transform>("translate(10, 5) scale(2)", &ctx).unwrap();
        assert_eq!(
            t,
            Expression::Constant(Transform::translate(10.0, 5.0) * Transform::scale(2.0, 2.0))
        );

        let t = parse_as::<Transform>("rotate(90, 50%, 50%)", &ctx).unwrap();
        assert!(!t.is_constant());

        assert_eq!(
            parse_as::<Transform>("", &ctx),
            Ok(Expression::Constant(Transform::IDENTITY))
        );
        assert!(matches!(
            parse_as::<Transform>("spin(3)", &ctx),
            Err(FormatError::UnknownTransform { ref name, .. }) if name == "spin"
        ));
        assert!(matches!(
            parse_as::<Transform>("rotate(1, 2)", &ctx),
            Err(FormatError::WrongCount { .. })
        ));
        assert!(matches!(
            parse_as::<Transform>("skewX(10) junk", &ctx),
            Err(FormatError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn test_tuples() {
        let scope = scope_with_axes();
        let ctx = LiteralContext::new(&scope);
        assert_eq!(
            parse_as::<Rect>("0, 0 10,20", &ctx),
            Ok(Expression::Constant(Rect::new(0.0, 0.0, 10.0, 20.0)))
        );
        let r = parse_as::<Rect>("0 0 100% {height - 2}", &ctx).unwrap();
        assert_eq!(
            r.formula().unwrap().ast().to_string(),
            "rect(0, 0, (width * 1), (height - 2))"
        );
        assert!(matches!(
            parse_as::<Rect>("1 2 3", &ctx),
            Err(FormatError::WrongCount { found: 3, .. })
        ));
        assert_eq!(
            parse_as::<Margins>("4 8", &ctx),
            Ok(Expression::Constant(Margins::new(4.0, 8.0, 4.0, 8.0)))
        );
        assert!(matches!(
            parse_as::<Margins>("1 2 3", &ctx),
            Err(FormatError::WrongCount { .. })
        ));
    }

    #[test]
    fn test_lists_and_enums() {
        let scope = Scope::new();
        let ctx = LiteralContext::new(&scope);
        assert_eq!(
            parse_as::<Vec<f64>>("10, 20 30", &ctx),
            Ok(Expression::Constant(vec![10.0, 20.0, 30.0]))
        );
        assert!(parse_as::<Vec<f64>>("10,,20", &ctx).is_err());

        let ty = ValueType::Enum(vec!["left".into(), "right".into()]);
        assert_eq!(
            parse_typed(" left", &ty, &ctx),
            Ok(Expression::Constant(Value::String("left".into())))
        );
        assert!(matches!(
            parse_typed("up", &ty, &ctx),
            Err(FormatError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn test_strings_interpolate() {
        let mut scope = Scope::new();
        scope.declare("name", ValueType::String);
        let ctx = LiteralContext::new(&scope);
        let s = parse_as::<String>("Hi {name}", &ctx).unwrap();
        assert_eq!(s.free_names(), vec!["name".to_string()]);
        assert_eq!(
            parse_as::<String>("{{x}}", &ctx),
            Ok(Expression::Constant("{x}".to_string()))
        );
        assert_eq!(
            parse_typed("42", &ValueType::Any, &ctx),
            Ok(Expression::Constant(Value::Int(42)))
        );
    }
}
