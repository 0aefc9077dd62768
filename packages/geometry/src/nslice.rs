//! # N-slice scaling
//!
//! A generalization of 9-slice scaling. Each axis of a reference rectangle is
//! cut at monotonically increasing positions into segments that alternate
//! FIXED / PROPORTIONAL, starting with FIXED at position 0:
//!
//! ```text
//!   0        c1          c2        c3         ref
//!   |  FIXED  |   PROP    |  FIXED  |   PROP   |
//! ```
//!
//! When the target is at least as long as the fixed budget, fixed segments
//! keep their length (scale 1) and proportional segments share the remainder
//! by weight (their reference length). When the target is shorter, every
//! segment is scaled by `target / fixed_budget` and proportional segments get
//! the non-negative remainder, which is zero. Realized lengths never go
//! negative and never sum past the target.
//!
//! Boundary membership: fixed segments are closed `[lo, hi]`, proportional
//! segments are open `(lo, hi)`. A coordinate exactly on a cut belongs to the
//! fixed neighbour, which makes the inverse mapping deterministic when a
//! proportional segment collapses to zero length.
//!
//! An axis without cuts is a plain proportional stretch.

use crate::error::{SliceError, SliceResult};
use crate::primitives::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    Fixed,
    Proportional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    /// Scope variable holding the extent along this axis.
    pub fn extent(self) -> &'static str {
        match self {
            Axis::X => "width",
            Axis::Y => "height",
        }
    }
}

/// Reference size plus the cut positions of both axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NSliceValues {
    pub reference: Size,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl NSliceValues {
    pub fn new(reference: Size, xs: Vec<f64>, ys: Vec<f64>) -> SliceResult<Self> {
        validate_axis(Axis::X, reference.width, &xs)?;
        validate_axis(Axis::Y, reference.height, &ys)?;
        Ok(Self { reference, xs, ys })
    }

    /// No cuts: both axes stretch proportionally.
    pub fn stretch(reference: Size) -> SliceResult<Self> {
        Self::new(reference, Vec::new(), Vec::new())
    }

    pub fn axis(&self, axis: Axis) -> (f64, &[f64]) {
        match axis {
            Axis::X => (self.reference.width, &self.xs),
            Axis::Y => (self.reference.height, &self.ys),
        }
    }
}

fn validate_axis(axis: Axis, reference: f64, cuts: &[f64]) -> SliceResult<()> {
    if !(reference.is_finite() && reference > 0.0) {
        return Err(SliceError::InvalidReference {
            axis: axis.name(),
            length: reference,
        });
    }
    let mut previous: Option<f64> = None;
    for (index, &value) in cuts.iter().enumerate() {
        if !(value.is_finite() && value > 0.0 && value < reference) {
            return Err(SliceError::CutOutOfRange {
                axis: axis.name(),
                index,
                value,
                reference,
            });
        }
        if let Some(previous) = previous {
            if value <= previous {
                return Err(SliceError::NotIncreasing {
                    axis: axis.name(),
                    index,
                    value,
                    previous,
                });
            }
        }
        previous = Some(value);
    }
    Ok(())
}

/// The realized layout of one axis for a single target length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisScaling {
    scale: f64,
    reference_boundaries: Vec<f64>,
    realized_boundaries: Vec<f64>,
    kinds: Vec<SegmentKind>,
}

impl AxisScaling {
    /// Lays out `cuts` of a `reference` long axis into `[start, start + length]`.
    pub fn compute(reference: f64, cuts: &[f64], start: f64, length: f64) -> Self {
        let length = length.max(0.0);
        let mut reference_boundaries = Vec::with_capacity(cuts.len() + 2);
        reference_boundaries.push(0.0);
        reference_boundaries.extend_from_slice(cuts);
        reference_boundaries.push(reference);

        if cuts.is_empty() {
            let scale = if reference > 0.0 { length / reference } else { 1.0 };
            return Self {
                scale,
                reference_boundaries,
                realized_boundaries: vec![start, start + length],
                kinds: vec![SegmentKind::Proportional],
            };
        }

        let kinds = segment_kinds(cuts.len() + 1);
        let lengths: Vec<f64> = reference_boundaries.windows(2).map(|w| w[1] - w[0]).collect();
        let (fixed_total, weight_total) = budget(&kinds, &lengths);

        let scale = if length >= fixed_total || fixed_total <= 0.0 {
            1.0
        } else {
            length / fixed_total
        };
        let remainder = (length - fixed_total * scale).max(0.0);

        let mut realized_boundaries = Vec::with_capacity(reference_boundaries.len());
        let mut cursor = start;
        realized_boundaries.push(cursor);
        for (kind, len) in kinds.iter().zip(&lengths) {
            let realized = match kind {
                SegmentKind::Fixed => len * scale,
                SegmentKind::Proportional if weight_total > 0.0 => remainder * len / weight_total,
                SegmentKind::Proportional => 0.0,
            };
            cursor += realized;
            realized_boundaries.push(cursor);
        }

        Self {
            scale,
            reference_boundaries,
            realized_boundaries,
            kinds,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn reference_boundaries(&self) -> &[f64] {
        &self.reference_boundaries
    }

    pub fn realized_boundaries(&self) -> &[f64] {
        &self.realized_boundaries
    }

    pub fn segment_kinds(&self) -> &[SegmentKind] {
        &self.kinds
    }

    pub fn realized_lengths(&self) -> Vec<f64> {
        self.realized_boundaries.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn realized_length(&self) -> f64 {
        self.realized_boundaries.last().copied().unwrap_or(0.0)
            - self.realized_boundaries.first().copied().unwrap_or(0.0)
    }

    /// Maps a reference-space coordinate into drawn space.
    pub fn transform(&self, p: f64) -> f64 {
        let i = locate(&self.reference_boundaries, &self.kinds, p);
        map_linear(
            p,
            self.reference_boundaries[i],
            self.reference_boundaries[i + 1],
            self.realized_boundaries[i],
            self.realized_boundaries[i + 1],
        )
    }

    /// Maps a drawn-space coordinate back into reference space.
    pub fn inverse(&self, q: f64) -> f64 {
        let i = locate(&self.realized_boundaries, &self.kinds, q);
        map_linear(
            q,
            self.realized_boundaries[i],
            self.realized_boundaries[i + 1],
            self.reference_boundaries[i],
            self.reference_boundaries[i + 1],
        )
    }
}

fn segment_kinds(count: usize) -> Vec<SegmentKind> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                SegmentKind::Fixed
            } else {
                SegmentKind::Proportional
            }
        })
        .collect()
}

fn budget(kinds: &[SegmentKind], lengths: &[f64]) -> (f64, f64) {
    kinds
        .iter()
        .zip(lengths)
        .fold((0.0, 0.0), |(fixed, weight), (kind, len)| match kind {
            SegmentKind::Fixed => (fixed + len, weight),
            SegmentKind::Proportional => (fixed, weight + len),
        })
}

/// Index of the segment owning `p`. Scanning in order, fixed segments claim
/// both of their bounds and proportional segments neither; coordinates
/// outside the range fall into the first or last segment.
fn locate(boundaries: &[f64], kinds: &[SegmentKind], p: f64) -> usize {
    for (i, kind) in kinds.iter().enumerate() {
        let hi = boundaries[i + 1];
        let inside = match kind {
            SegmentKind::Fixed => p <= hi,
            SegmentKind::Proportional => p < hi,
        };
        if inside {
            return i;
        }
    }
    kinds.len() - 1
}

fn map_linear(v: f64, from_lo: f64, from_hi: f64, to_lo: f64, to_hi: f64) -> f64 {
    let span = from_hi - from_lo;
    if span.abs() <= f64::EPSILON {
        return to_lo;
    }
    to_lo + (v - from_lo) * (to_hi - to_lo) / span
}

/// Per-draw-call scaling of both axes into a target rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NSliceScaling {
    pub target: Rect,
    pub x: AxisScaling,
    pub y: AxisScaling,
}

impl NSliceScaling {
    #[instrument(skip(values), fields(xs = values.xs.len(), ys = values.ys.len()))]
    pub fn compute(values: &NSliceValues, target: Rect) -> Self {
        let target = target.normalized();
        let x = AxisScaling::compute(values.reference.width, &values.xs, target.x, target.width);
        let y = AxisScaling::compute(values.reference.height, &values.ys, target.y, target.height);
        debug!(scale_x = x.scale, scale_y = y.scale, "computed n-slice scaling");
        Self { target, x, y }
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.x.scale, self.y.scale)
    }

    /// Smaller of the two axis scales, used for stroke widths and text.
    pub fn uniform_scale(&self) -> f64 {
        self.x.scale.min(self.y.scale)
    }

    pub fn transform_point(&self, p: Point) -> Point {
        Point::new(self.x.transform(p.x), self.y.transform(p.y))
    }

    pub fn inverse_point(&self, q: Point) -> Point {
        Point::new(self.x.inverse(q.x), self.y.inverse(q.y))
    }

    pub fn transform_rect(&self, r: Rect) -> Rect {
        let r = r.normalized();
        Rect::from_points(self.transform_point(r.origin()), self.transform_point(r.max()))
    }

    pub fn inverse_rect(&self, r: Rect) -> Rect {
        let r = r.normalized();
        Rect::from_points(self.inverse_point(r.origin()), self.inverse_point(r.max()))
    }

    /// Runs the layout backwards: given an inner rectangle in reference space
    /// and where it was drawn, reconstructs the target rectangle (and so the
    /// scale) that produces exactly that placement.
    #[instrument(skip(values))]
    pub fn infer(values: &NSliceValues, inner_reference: Rect, inner_drawn: Rect) -> SliceResult<Self> {
        let r = inner_reference.normalized();
        let d = inner_drawn.normalized();
        let (sx, lx) = infer_axis(values, Axis::X, (r.x, r.x + r.width), (d.x, d.x + d.width))?;
        let (sy, ly) = infer_axis(values, Axis::Y, (r.y, r.y + r.height), (d.y, d.y + d.height))?;
        Ok(Self::compute(values, Rect::new(sx, sy, lx, ly)))
    }
}

/// Splits the offset of `p` from the axis origin into the reference length
/// contributed by fixed segments and by proportional segments.
fn decompose(boundaries: &[f64], kinds: &[SegmentKind], p: f64) -> (f64, f64) {
    let i = locate(boundaries, kinds, p);
    let mut fixed = 0.0;
    let mut weight = 0.0;
    for (j, kind) in kinds.iter().enumerate().take(i + 1) {
        let len = if j < i {
            boundaries[j + 1] - boundaries[j]
        } else {
            p - boundaries[j]
        };
        match kind {
            SegmentKind::Fixed => fixed += len,
            SegmentKind::Proportional => weight += len,
        }
    }
    (fixed, weight)
}

fn infer_axis(
    values: &NSliceValues,
    axis: Axis,
    reference: (f64, f64),
    drawn: (f64, f64),
) -> SliceResult<(f64, f64)> {
    let (ref_len, cuts) = values.axis(axis);
    let degenerate = |reason: &str| SliceError::Degenerate {
        axis: axis.name(),
        reason: reason.to_string(),
    };
    let (p1, p2) = reference;
    let (q1, q2) = drawn;
    let dq = q2 - q1;

    if cuts.is_empty() {
        let dp = p2 - p1;
        if dp.abs() <= f64::EPSILON {
            return Err(degenerate("inner reference extent is zero"));
        }
        let length = dq * ref_len / dp;
        if length < 0.0 {
            return Err(degenerate("drawn extent is inverted"));
        }
        return Ok((q1 - p1 * length / ref_len, length));
    }

    let mut boundaries = Vec::with_capacity(cuts.len() + 2);
    boundaries.push(0.0);
    boundaries.extend_from_slice(cuts);
    boundaries.push(ref_len);
    let kinds = segment_kinds(cuts.len() + 1);
    let lengths: Vec<f64> = boundaries.windows(2).map(|w| w[1] - w[0]).collect();
    let (fixed_total, weight_total) = budget(&kinds, &lengths);

    let (f1, w1) = decompose(&boundaries, &kinds, p1);
    let (f2, w2) = decompose(&boundaries, &kinds, p2);
    let d_fixed = f2 - f1;
    let d_weight = (w2 - w1) / weight_total;

    if dq < 0.0 {
        return Err(degenerate("drawn extent is inverted"));
    }

    let length = if dq + 1e-9 >= d_fixed {
        if d_weight > f64::EPSILON {
            fixed_total + (dq - d_fixed) / d_weight
        } else if (dq - d_fixed).abs() <= 1e-9 {
            // Only fixed content between the two edges: any length at or
            // above the fixed budget reproduces it, take the natural one.
            ref_len.max(fixed_total)
        } else {
            return Err(degenerate("drawn extent exceeds the fixed content it spans"));
        }
    } else if d_fixed > f64::EPSILON {
        fixed_total * dq / d_fixed
    } else {
        return Err(degenerate("inner reference extent is zero"));
    };

    let layout = AxisScaling::compute(ref_len, cuts, 0.0, length);
    let start = q1 - layout.transform(p1);
    Ok((start, length))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn values(xs: Vec<f64>) -> NSliceValues {
        NSliceValues::new(Size::new(100.0, 100.0), xs, vec![]).unwrap()
    }

    #[test]
    fn target_above_fixed_budget_keeps_fixed_segments() {
        let axis = AxisScaling::compute(100.0, &[50.0], 0.0, 80.0);
        assert_eq!(axis.scale(), 1.0);
        assert_eq!(axis.realized_lengths(), vec![50.0, 30.0]);
        assert_eq!(axis.segment_kinds(), &[SegmentKind::Fixed, SegmentKind::Proportional]);
    }

    #[test]
    fn target_below_fixed_budget_scales_everything() {
        let axis = AxisScaling::compute(100.0, &[50.0], 0.0, 40.0);
        assert!((axis.scale() - 0.8).abs() < EPS);
        let lengths = axis.realized_lengths();
        assert!((lengths[0] - 40.0).abs() < EPS);
        assert!(lengths[1].abs() < EPS);
    }

    #[test]
    fn proportional_segments_share_by_weight() {
        // F(10) P(20) F(10) P(60)
        let axis = AxisScaling::compute(100.0, &[10.0, 30.0, 40.0], 5.0, 180.0);
        let lengths = axis.realized_lengths();
        assert_eq!(lengths[0], 10.0);
        assert!((lengths[1] - 40.0).abs() < EPS);
        assert_eq!(lengths[2], 10.0);
        assert!((lengths[3] - 120.0).abs() < EPS);
        assert_eq!(axis.realized_boundaries()[0], 5.0);
        assert!((axis.realized_length() - 180.0).abs() < EPS);
    }

    #[test]
    fn zero_cuts_stretch() {
        let axis = AxisScaling::compute(50.0, &[], 10.0, 100.0);
        assert_eq!(axis.scale(), 2.0);
        assert_eq!(axis.transform(25.0), 60.0);
        assert_eq!(axis.inverse(60.0), 25.0);
    }

    #[test]
    fn boundary_belongs_to_fixed_segment() {
        let axis = AxisScaling::compute(100.0, &[20.0, 80.0], 0.0, 40.0);
        // Everything proportional collapsed: the drawn point 20 maps back to
        // the end of the first fixed segment rather than into the gap.
        let q = axis.transform(20.0);
        assert_eq!(axis.inverse(q), 20.0);
        assert_eq!(locate(axis.reference_boundaries(), axis.segment_kinds(), 20.0), 0);
        assert_eq!(locate(axis.reference_boundaries(), axis.segment_kinds(), 80.0), 2);
    }

    #[test]
    fn outside_points_extrapolate() {
        let axis = AxisScaling::compute(100.0, &[50.0], 0.0, 80.0);
        assert_eq!(axis.transform(-10.0), -10.0);
        // Past the end: the proportional segment ratio 30/50 continues.
        assert!((axis.transform(110.0) - 86.0).abs() < EPS);
    }

    #[test]
    fn validation_rejects_bad_cuts() {
        let size = Size::new(100.0, 10.0);
        assert!(matches!(
            NSliceValues::new(size, vec![50.0, 40.0], vec![]),
            Err(SliceError::NotIncreasing { index: 1, .. })
        ));
        assert!(matches!(
            NSliceValues::new(size, vec![], vec![10.0]),
            Err(SliceError::CutOutOfRange { axis: "y", .. })
        ));
        assert!(matches!(
            NSliceValues::new(Size::new(0.0, 10.0), vec![], vec![]),
            Err(SliceError::InvalidReference { axis: "x", .. })
        ));
    }

    #[test]
    fn infer_recovers_target_above_budget() {
        let v = values(vec![20.0, 80.0]);
        let target = Rect::new(10.0, 0.0, 300.0, 100.0);
        let forward = NSliceScaling::compute(&v, target);
        let inner = Rect::new(10.0, 10.0, 60.0, 50.0);
        let drawn = forward.transform_rect(inner);
        let inferred = NSliceScaling::infer(&v, inner, drawn).unwrap();
        assert!((inferred.target.x - 10.0).abs() < 1e-6);
        assert!((inferred.target.width - 300.0).abs() < 1e-6);
    }

    #[test]
    fn infer_recovers_target_below_budget() {
        let v = values(vec![20.0, 80.0]);
        let target = Rect::new(0.0, 0.0, 20.0, 100.0);
        let forward = NSliceScaling::compute(&v, target);
        let inner = Rect::new(5.0, 0.0, 10.0, 100.0);
        let drawn = forward.transform_rect(inner);
        let inferred = NSliceScaling::infer(&v, inner, drawn).unwrap();
        assert!((inferred.target.width - 20.0).abs() < 1e-6);
        assert!((inferred.x.scale() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn infer_rejects_degenerate_input() {
        let v = values(vec![]);
        let err = NSliceScaling::infer(&v, Rect::new(5.0, 5.0, 0.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(matches!(err, Err(SliceError::Degenerate { axis: "x", .. })));
    }
}
