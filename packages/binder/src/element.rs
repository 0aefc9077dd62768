//! The bound element graph: what a pattern draws, with every attribute
//! already parsed into a typed expression.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use stencil_expression::{Expression, Value, ValueType};
use stencil_geometry::{Color, Margins, PathData, Size, Transform};
use stencil_parser::{NodeId, Span};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundElement {
    pub id: ElementId,
    /// Node the element was bound from; a clone for `use` expansions.
    pub node: NodeId,
    pub span: Span,
    pub kind: ElementKind,
    pub style: StyleSheet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_each: Option<ForEach>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Variable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BoundElement>,
}

impl BoundElement {
    /// Pre-order walk of this element and its descendants.
    pub fn walk(&self, f: &mut impl FnMut(&BoundElement)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    pub fn role(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Area { role, .. } => Some(role),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ElementKind {
    Div(Frame),
    Area { role: String, frame: Frame },
    Group,
    Shape(Shape),
    Text(TextRun),
    Image(Image),
    Field(Field),
}

/// Layout of a div inside its parent. Missing position is 0, missing size
/// fills the parent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Frame {
    pub x: Option<Expression<f64>>,
    pub y: Option<Expression<f64>>,
    pub width: Option<Expression<f64>>,
    pub height: Option<Expression<f64>>,
    pub margin: Option<Expression<Margins>>,
    /// Children are laid out in reference space and mapped through an
    /// n-slice scaling into the div.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slicing: Option<Slicing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Slicing {
    pub reference: Expression<Size>,
    pub xs: Expression<Vec<f64>>,
    pub ys: Expression<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum Shape {
    Rect {
        x: Expression<f64>,
        y: Expression<f64>,
        width: Expression<f64>,
        height: Expression<f64>,
        rx: Option<Expression<f64>>,
        ry: Option<Expression<f64>>,
    },
    Ellipse {
        cx: Expression<f64>,
        cy: Expression<f64>,
        rx: Expression<f64>,
        ry: Expression<f64>,
    },
    Circle {
        cx: Expression<f64>,
        cy: Expression<f64>,
        r: Expression<f64>,
    },
    Line {
        x1: Expression<f64>,
        y1: Expression<f64>,
        x2: Expression<f64>,
        y2: Expression<f64>,
    },
    /// `polyline` and `polygon`; coordinates alternate x and y.
    Poly {
        points: Expression<Vec<f64>>,
        closed: bool,
    },
    Path { data: PathData },
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(TextAnchor::Start),
            "middle" => Some(TextAnchor::Middle),
            "end" => Some(TextAnchor::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextRun {
    pub x: Expression<f64>,
    pub y: Expression<f64>,
    pub font_size: Expression<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<Expression<String>>,
    pub anchor: TextAnchor,
    pub content: Expression<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub x: Expression<f64>,
    pub y: Expression<f64>,
    pub width: Option<Expression<f64>>,
    pub height: Option<Expression<f64>>,
    /// Already resolved against the source directory when constant.
    pub href: Expression<PathBuf>,
}

/// A slot the host fills with its own text.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    pub x: Expression<f64>,
    pub y: Expression<f64>,
    pub width: Option<Expression<f64>>,
    pub height: Option<Expression<f64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "paint", rename_all = "kebab-case")]
pub enum Paint {
    Color { color: Expression<Color> },
    /// End points are fractions of the painted shape's bounds.
    Linear {
        x1: Expression<f64>,
        y1: Expression<f64>,
        x2: Expression<f64>,
        y2: Expression<f64>,
        stops: Vec<GradientStop>,
    },
    Radial {
        cx: Expression<f64>,
        cy: Expression<f64>,
        r: Expression<f64>,
        stops: Vec<GradientStop>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct GradientStop {
    pub offset: Expression<f64>,
    pub color: Expression<Color>,
}

/// Presentation state after the cascade.
#[derive(Debug, Clone, Serialize)]
pub struct StyleSheet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Paint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Paint>,
    pub stroke_width: Expression<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Expression<Color>>,
    pub visible: Expression<bool>,
    /// Ancestors' transforms composed with this element's own.
    pub transform: Expression<Transform>,
    /// This element's own `transform` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_transform: Option<Expression<Transform>>,
    /// Clip children to this element's frame. Not inherited.
    pub clip: bool,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: Expression::Constant(1.0),
            text_color: None,
            visible: Expression::Constant(true),
            transform: Expression::Constant(Transform::IDENTITY),
            local_transform: None,
            clip: false,
        }
    }
}

impl StyleSheet {
    /// The part of this sheet a child starts from.
    pub fn inherited(&self) -> StyleSheet {
        StyleSheet {
            fill: self.fill.clone(),
            stroke: self.stroke.clone(),
            stroke_width: self.stroke_width.clone(),
            text_color: self.text_color.clone(),
            visible: self.visible.clone(),
            transform: self.transform.clone(),
            local_transform: None,
            clip: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForEach {
    pub item: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    pub items: Expression<Value>,
    pub item_type: ValueType,
}

/// A `<var>` declared on an element.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    pub ty: ValueType,
    /// `None` when the value failed to parse or is part of a cycle.
    pub value: Option<Expression<Value>>,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherited_drops_local_state() {
        let sheet = StyleSheet {
            clip: true,
            local_transform: Some(Expression::Constant(Transform::scale(2.0, 2.0))),
            transform: Expression::Constant(Transform::scale(2.0, 2.0)),
            ..StyleSheet::default()
        };
        let child = sheet.inherited();
        assert!(!child.clip);
        assert!(child.local_transform.is_none());
        assert_eq!(child.transform, sheet.transform);
    }
}
