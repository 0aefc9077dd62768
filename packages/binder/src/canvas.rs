//! Names the drawing canvas provides to every formula. Arguments and
//! variables may not reuse them.

use stencil_expression::{EvalError, HostFunction, Scope, Value, ValueType};
use stencil_geometry::{Color, Transform};

pub const RESERVED_NAMES: [&str; 7] = [
    "width",
    "height",
    "fill",
    "stroke",
    "stroke_width",
    "text_color",
    "transform",
];

pub const TEXT_WIDTH: &str = "text_width";

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

pub fn reserved_type(name: &str) -> Option<ValueType> {
    let ty = match name {
        "width" | "height" | "stroke_width" => ValueType::Scalar,
        "fill" | "stroke" | "text_color" => ValueType::Color,
        "transform" => ValueType::Transform,
        _ => return None,
    };
    Some(ty)
}

/// Bind-time root scope: canvas names are declared but have no value, and
/// host functions exist only as signatures.
pub fn declarations() -> Scope {
    let mut scope = Scope::new();
    for name in RESERVED_NAMES {
        if let Some(ty) = reserved_type(name) {
            scope.declare(name, ty);
        }
    }
    scope.define_function(HostFunction::new(
        TEXT_WIDTH,
        vec![ValueType::String, ValueType::Scalar],
        ValueType::Scalar,
        |_| {
            Err(EvalError::invalid_argument(
                TEXT_WIDTH,
                "font metrics are only available while drawing",
            ))
        },
    ));
    scope
}

/// Draw-time defaults for the canvas state.
pub fn initial_state(scope: &mut Scope, width: f64, height: f64) {
    scope.bind_value("width", Value::Scalar(width));
    scope.bind_value("height", Value::Scalar(height));
    scope.bind_value("fill", Value::Color(Color::TRANSPARENT));
    scope.bind_value("stroke", Value::Color(Color::TRANSPARENT));
    scope.bind_value("stroke_width", Value::Scalar(1.0));
    scope.bind_value("text_color", Value::Color(Color::BLACK));
    scope.bind_value("transform", Value::Transform(Transform::IDENTITY));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_cover_reserved_names() {
        let scope = declarations();
        for name in RESERVED_NAMES {
            assert!(scope.lookup(name).is_some_and(|b| b.value.is_none()), "{}", name);
        }
        assert!(scope.function(TEXT_WIDTH).is_some());
        assert!(is_reserved("stroke_width"));
        assert!(!is_reserved("label"));
    }
}
