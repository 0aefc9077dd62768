//! Test n-slice scaling against drawn layouts

use stencil_geometry::{NSliceScaling, NSliceValues, Point, Rect, SegmentKind, Size};

fn button() -> NSliceValues {
    // 8px caps on both sides, stretchable middle.
    NSliceValues::new(Size::new(40.0, 20.0), vec![8.0, 32.0], vec![]).unwrap()
}

#[test]
fn test_wide_button_keeps_caps() {
    let scaling = NSliceScaling::compute(&button(), Rect::new(0.0, 0.0, 200.0, 20.0));

    assert_eq!(scaling.x.scale(), 1.0);
    let lengths = scaling.x.realized_lengths();
    assert_eq!(lengths[0], 8.0);
    assert_eq!(lengths[2], 8.0);
    assert!((lengths[1] - 184.0).abs() < 1e-9);
    assert_eq!(
        scaling.x.segment_kinds(),
        &[SegmentKind::Fixed, SegmentKind::Proportional, SegmentKind::Fixed]
    );
}

#[test]
fn test_narrow_button_scales_caps() {
    let scaling = NSliceScaling::compute(&button(), Rect::new(0.0, 0.0, 8.0, 20.0));

    assert!((scaling.x.scale() - 0.5).abs() < 1e-9);
    let lengths = scaling.x.realized_lengths();
    assert!(lengths.iter().all(|l| *l >= 0.0));
    assert!((lengths.iter().sum::<f64>() - 8.0).abs() < 1e-9);
    assert!(lengths[1].abs() < 1e-9);
    assert_eq!(scaling.uniform_scale(), scaling.x.scale().min(scaling.y.scale()));
}

#[test]
fn test_inverse_undoes_transform() {
    let values = NSliceValues::new(Size::new(100.0, 60.0), vec![10.0, 90.0], vec![5.0, 25.0, 35.0]).unwrap();

    for target in [
        Rect::new(3.0, 7.0, 400.0, 90.0),
        Rect::new(-20.0, 0.0, 50.0, 30.0),
    ] {
        let scaling = NSliceScaling::compute(&values, target);
        for p in [
            Point::new(0.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(47.5, 30.0),
            Point::new(95.0, 59.0),
        ] {
            let back = scaling.inverse_point(scaling.transform_point(p));
            // Collapsed proportional segments lose information, fixed ones never do.
            if scaling.x.scale() == 1.0 {
                assert!((back.x - p.x).abs() < 1e-9, "x {p:?} -> {back:?}");
            }
            if scaling.y.scale() == 1.0 {
                assert!((back.y - p.y).abs() < 1e-9, "y {p:?} -> {back:?}");
            }
        }
    }
}

#[test]
fn test_target_corners_map_to_reference_corners() {
    let values = button();
    let target = Rect::new(12.0, 4.0, 150.0, 40.0);
    let scaling = NSliceScaling::compute(&values, target);

    let drawn = scaling.transform_rect(Rect::from_size(values.reference));
    assert!((drawn.x - 12.0).abs() < 1e-9);
    assert!((drawn.width - 150.0).abs() < 1e-9);
    assert!((drawn.height - 40.0).abs() < 1e-9);
}

#[test]
fn test_infer_round_trip() {
    let values = NSliceValues::new(Size::new(100.0, 100.0), vec![20.0, 50.0, 60.0], vec![30.0]).unwrap();
    let target = Rect::new(-5.0, 12.0, 260.0, 75.0);
    let forward = NSliceScaling::compute(&values, target);

    let inner = Rect::new(15.0, 10.0, 50.0, 80.0);
    let drawn = forward.transform_rect(inner);
    let inferred = NSliceScaling::infer(&values, inner, drawn).unwrap();

    let again = inferred.transform_rect(inner);
    assert!((again.x - drawn.x).abs() < 1e-6);
    assert!((again.y - drawn.y).abs() < 1e-6);
    assert!((again.width - drawn.width).abs() < 1e-6);
    assert!((again.height - drawn.height).abs() < 1e-6);
}

#[test]
fn test_infer_fixed_only_span_picks_reference_length() {
    let values = button();
    let inner = Rect::new(0.0, 0.0, 6.0, 20.0);
    let drawn = Rect::new(50.0, 0.0, 6.0, 20.0);

    let inferred = NSliceScaling::infer(&values, inner, drawn).unwrap();
    assert_eq!(inferred.target.x, 50.0);
    assert_eq!(inferred.target.width, 40.0);
}
