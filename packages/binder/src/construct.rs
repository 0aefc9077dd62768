use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Rect,
    Ellipse,
    Circle,
    Line,
    Polyline,
    Polygon,
    Path,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaintKind {
    Solid,
    LinearGradient,
    RadialGradient,
}

/// Every element name the binder understands, plus `Unknown` for the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Construct {
    Library,
    Pattern,
    Arg,
    Args,
    Validate,
    Var,
    Div,
    Area,
    Group,
    Defs,
    Shape(ShapeKind),
    Text,
    Image,
    Field,
    Paint(PaintKind),
    Stop,
    Use,
    Desc,
    Title,
    Unknown(String),
}

impl Construct {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "library" => Construct::Library,
            "pattern" => Construct::Pattern,
            "arg" => Construct::Arg,
            "args" => Construct::Args,
            "validate" => Construct::Validate,
            "var" => Construct::Var,
            "div" => Construct::Div,
            "area" => Construct::Area,
            "group" => Construct::Group,
            "defs" => Construct::Defs,
            "rect" => Construct::Shape(ShapeKind::Rect),
            "ellipse" => Construct::Shape(ShapeKind::Ellipse),
            "circle" => Construct::Shape(ShapeKind::Circle),
            "line" => Construct::Shape(ShapeKind::Line),
            "polyline" => Construct::Shape(ShapeKind::Polyline),
            "polygon" => Construct::Shape(ShapeKind::Polygon),
            "path" => Construct::Shape(ShapeKind::Path),
            "text" => Construct::Text,
            "image" => Construct::Image,
            "field" => Construct::Field,
            "solid" => Construct::Paint(PaintKind::Solid),
            "linear-gradient" => Construct::Paint(PaintKind::LinearGradient),
            "radial-gradient" => Construct::Paint(PaintKind::RadialGradient),
            "stop" => Construct::Stop,
            "use" => Construct::Use,
            "desc" => Construct::Desc,
            "title" => Construct::Title,
            other => Construct::Unknown(other.to_string()),
        }
    }

    /// Declarations are read before the element they belong to.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Construct::Arg | Construct::Args | Construct::Validate | Construct::Var
        )
    }

    /// Elements that only take effect when referenced by `#id`.
    pub fn is_referenced_only(&self) -> bool {
        matches!(self, Construct::Paint(_) | Construct::Defs)
    }

    /// Whether the element may appear in a pattern's drawing tree.
    pub fn is_drawable(&self) -> bool {
        matches!(
            self,
            Construct::Div
                | Construct::Area
                | Construct::Group
                | Construct::Shape(_)
                | Construct::Text
                | Construct::Image
                | Construct::Field
                | Construct::Use
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_is_closed() {
        assert_eq!(Construct::from_tag("polygon"), Construct::Shape(ShapeKind::Polygon));
        assert_eq!(
            Construct::from_tag("radial-gradient"),
            Construct::Paint(PaintKind::RadialGradient)
        );
        assert_eq!(Construct::from_tag("Div"), Construct::Unknown("Div".into()));
        assert!(Construct::Var.is_declaration());
        assert!(!Construct::Stop.is_drawable());
        assert!(Construct::Defs.is_referenced_only());
    }
}
