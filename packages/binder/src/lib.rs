pub mod arguments;
pub mod binder;
pub mod canvas;
pub mod construct;
pub mod element;
pub mod error;
pub mod identity;
pub mod pattern;
pub mod recorder;
pub mod render;
pub mod usage;

pub use arguments::{
    Argument, ArgumentSource, ArgumentValue, ArgumentValues, BoundArgument, Instance,
    InstanceAttribute, Literal, Validation,
};
pub use binder::{bind_document, bind_file, bind_source, reference_target, BindOptions, BoundDocument};
pub use construct::{Construct, PaintKind, ShapeKind};
pub use element::{
    BoundElement, ElementId, ElementKind, Field, ForEach, Frame, GradientStop, Image, Paint,
    Shape, Slicing, StyleSheet, TextAnchor, TextRun, Variable,
};
pub use error::{BindError, BindResult, RenderError, RenderResult};
pub use identity::IdentityMap;
pub use pattern::{qualify, Pattern, PatternType};
pub use recorder::{CommandRecorder, DrawCommand, ImageTable, MonospaceMetrics};
pub use render::{FontMetrics, ImageSource, RenderReport, Renderer, ResolvedPaint, Surface, TextStyle};
pub use usage::Usage;

#[cfg(test)]
mod tests_arguments;
