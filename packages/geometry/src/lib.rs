//! Geometry primitives shared by the stencil crates: points, rectangles,
//! affine transforms, colours, path data and the n-slice resolver.

pub mod color;
pub mod error;
pub mod nslice;
pub mod path;
pub mod primitives;

pub use color::Color;
pub use error::{PathError, PathResult, SliceError, SliceResult};
pub use nslice::{Axis, AxisScaling, NSliceScaling, NSliceValues, SegmentKind};
pub use path::{PathCommand, PathData};
pub use primitives::{Margins, Point, Rect, Size, Transform};
