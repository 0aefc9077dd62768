//! Drawing bound patterns onto a recording surface

use std::path::PathBuf;
use std::rc::Rc;
use stencil_binder::{
    bind_source, BindOptions, CommandRecorder, DrawCommand, ImageTable, Instance, MonospaceMetrics,
    Pattern, RenderError, RenderReport, RenderResult, Renderer, ResolvedPaint,
};
use stencil_geometry::{Color, PathData, Point, Rect, Size};

fn pattern(source: &str) -> Pattern {
    let doc = bind_source(source, &BindOptions::default());
    assert!(
        doc.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        doc.diagnostics.iter().map(|d| &d.message).collect::<Vec<_>>()
    );
    doc.patterns.into_iter().next().unwrap()
}

fn renderer() -> Renderer {
    Renderer::new(Rc::new(MonospaceMetrics::default()))
}

fn draw(p: &Pattern, instance: &Instance, target: Rect) -> (RenderReport, CommandRecorder) {
    let mut surface = CommandRecorder::new();
    let report = renderer().render(p, instance, target, &mut surface).unwrap();
    (report, surface)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn close_rect(a: Rect, b: Rect) -> bool {
    close(a.x, b.x) && close(a.y, b.y) && close(a.width, b.width) && close(a.height, b.height)
}

const BUTTON: &str = r#"<pattern name="button" type="widget">
  <arg name="label" type="string"/>
  <rect fill="blue"/>
  <text x="50%" y="30" anchor="middle">{label}</text>
</pattern>"#;

#[test]
fn test_button_draws_background_and_centered_label() {
    let p = pattern(BUTTON);
    let instance = Instance::new().with_attribute("label", "Go");
    let (report, surface) = draw(&p, &instance, Rect::new(10.0, 5.0, 100.0, 40.0));

    assert_eq!(report.drawn, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.diagnostics.is_empty());

    let DrawCommand::Fill { path, paint } = &surface.commands[0] else {
        panic!("expected a fill, got {:?}", surface.commands[0]);
    };
    let outline = [
        Point::new(10.0, 5.0),
        Point::new(110.0, 5.0),
        Point::new(110.0, 45.0),
        Point::new(10.0, 45.0),
    ];
    assert_eq!(path, &PathData::polyline(&outline, true));
    assert_eq!(
        paint,
        &ResolvedPaint::Solid {
            color: Color::named("blue").unwrap()
        }
    );

    let DrawCommand::Text { text, origin, style } = &surface.commands[1] else {
        panic!("expected text, got {:?}", surface.commands[1]);
    };
    assert_eq!(text, "Go");
    // 2 characters * 12 * 0.6 = 14.4 wide, centred on x = 50.
    assert!(close(origin.x, 52.8), "{}", origin.x);
    assert!(close(origin.y, 35.0));
    assert_eq!(style.font_size, 12.0);
    assert_eq!(style.color, Color::BLACK);
}

#[test]
fn test_missing_argument_is_reported_and_element_skipped() {
    let p = pattern(BUTTON);
    let (report, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 100.0, 40.0));
    let messages: Vec<_> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["missing required argument 'label'", "element could not be drawn"]
    );
    assert_eq!(report.skipped, 1);
    assert_eq!(report.drawn, 1);
    assert!(surface.texts().is_empty());
}

#[test]
fn test_nslice_keeps_corners_and_stretches_middle() {
    let p = pattern(
        r#"<pattern name="frame" type="widget">
  <div reference="30 30" xs="10 20" ys="10, 20">
    <rect fill="gray"/>
    <field name="corner" x="20" y="20" width="10" height="10"/>
  </div>
</pattern>"#,
    );
    let (report, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 100.0, 60.0));
    assert_eq!(report.drawn, 2);

    // The rect covers the reference size and so the whole target.
    let DrawCommand::Fill { path, .. } = &surface.commands[0] else {
        panic!("expected a fill, got {:?}", surface.commands[0]);
    };
    let expected = [
        Point::new(0.0, 0.0),
        Point::new(100.0, 0.0),
        Point::new(100.0, 60.0),
        Point::new(0.0, 60.0),
    ];
    assert_eq!(path, &PathData::polyline(&expected, true));

    let fields = surface.fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].0, "corner");
    assert!(close_rect(fields[0].1, Rect::new(90.0, 50.0, 10.0, 10.0)), "{:?}", fields[0].1);
}

#[test]
fn test_for_each_repeats_over_numbered_argument() {
    let p = pattern(
        r#"<pattern name="bars" type="widget">
  <arg name="value" type="scalar" numbered="true"/>
  <field name="bar" for-each="v in {value}" height="{v}"/>
</pattern>"#,
    );
    let instance = Instance::new()
        .with_attribute("value1", "5")
        .with_attribute("value2", "7")
        .with_attribute("value3", "9");
    let (report, surface) = draw(&p, &instance, Rect::new(0.0, 0.0, 100.0, 40.0));
    assert_eq!(report.drawn, 3);
    let heights: Vec<f64> = surface.fields().iter().map(|(_, r)| r.height).collect();
    assert_eq!(heights, vec![5.0, 7.0, 9.0]);
    assert!(surface.fields().iter().all(|(_, r)| r.width == 100.0));
}

#[test]
fn test_unbound_optional_argument_skips_only_its_element() {
    let p = pattern(
        r#"<pattern name="note" type="widget">
  <arg name="note" type="string" optional="true"/>
  <text y="10">{note}</text>
  <rect fill="red"/>
</pattern>"#,
    );
    let (report, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 50.0, 20.0));
    assert_eq!(report.skipped, 1);
    assert_eq!(report.drawn, 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics.as_slice()[0].cause.is_some());
    assert!(matches!(surface.commands.as_slice(), [DrawCommand::Fill { .. }]));
}

#[test]
fn test_clip_wraps_children() {
    let p = pattern(
        r#"<pattern name="clipped" type="widget">
  <div width="50" fill="red" clip="true">
    <rect fill="blue"/>
  </div>
</pattern>"#,
    );
    let (_, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 100.0, 40.0));
    let ops: Vec<&str> = surface
        .commands
        .iter()
        .map(|c| match c {
            DrawCommand::Save => "save",
            DrawCommand::Restore => "restore",
            DrawCommand::Clip { .. } => "clip",
            DrawCommand::Fill { .. } => "fill",
            _ => "other",
        })
        .collect();
    assert_eq!(ops, vec!["fill", "save", "clip", "fill", "restore"]);
}

#[test]
fn test_children_see_parent_canvas_state() {
    let p = pattern(
        r#"<pattern name="state" type="widget">
  <div stroke-width="3">
    <field name="probe" x="{stroke_width}" width="1" height="1"/>
  </div>
</pattern>"#,
    );
    let (_, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 20.0, 20.0));
    assert_eq!(surface.fields()[0].1, Rect::new(3.0, 0.0, 1.0, 1.0));
}

#[test]
fn test_linear_gradient_spans_shape_bounds() {
    let p = pattern(
        r##"<library name="ui">
  <linear-gradient id="fade">
    <stop offset="0" color="white"/>
    <stop offset="1" color="blue"/>
  </linear-gradient>
  <pattern name="bar" type="widget">
    <rect x="10" width="80" height="20" fill="#fade"/>
  </pattern>
</library>"##,
    );
    let (_, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 100.0, 20.0));
    let DrawCommand::Fill { paint, .. } = &surface.commands[0] else {
        panic!("expected a fill, got {:?}", surface.commands[0]);
    };
    let ResolvedPaint::Linear { start, end, stops } = paint else {
        panic!("expected a linear gradient, got {:?}", paint);
    };
    assert_eq!(*start, Point::new(10.0, 0.0));
    assert_eq!(*end, Point::new(90.0, 0.0));
    assert_eq!(
        stops,
        &vec![(0.0, Color::WHITE), (1.0, Color::named("blue").unwrap())]
    );
}

#[test]
fn test_image_falls_back_to_intrinsic_size() {
    let p = pattern(
        r#"<pattern name="icon" type="widget">
  <image href="icons/save.png" x="2" y="3"/>
  <image href="icons/other.png" width="8" height="8"/>
  <image href="icons/unknown.png"/>
</pattern>"#,
    );
    let mut images = ImageTable::new();
    images.insert("icons/save.png", Size::new(16.0, 16.0));
    let renderer = renderer().with_images(Rc::new(images));

    let mut surface = CommandRecorder::new();
    let report = renderer
        .render(&p, &Instance::new(), Rect::new(0.0, 0.0, 40.0, 40.0), &mut surface)
        .unwrap();
    assert_eq!(report.drawn, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        surface.commands[0],
        DrawCommand::Image {
            href: PathBuf::from("icons/save.png"),
            rect: Rect::new(2.0, 3.0, 16.0, 16.0),
        }
    );
}

#[test]
fn test_unusable_pattern_or_target_is_an_error() {
    let doc = bind_source(r#"<pattern name="broken"/>"#, &BindOptions::default());
    let mut surface = CommandRecorder::new();
    let result: RenderResult<_> = renderer().render(
        &doc.patterns[0],
        &Instance::new(),
        Rect::new(0.0, 0.0, 10.0, 10.0),
        &mut surface,
    );
    assert!(matches!(result, Err(RenderError::ErrorPattern { name }) if name == "default.broken"));

    let p = pattern(BUTTON);
    let result = renderer().render(
        &p,
        &Instance::new(),
        Rect::new(0.0, 0.0, -1.0, 10.0),
        &mut surface,
    );
    assert!(matches!(result, Err(RenderError::InvalidTarget { .. })));
    assert!(surface.commands.is_empty());
}

#[test]
fn test_failing_pattern_body_is_an_error() {
    let p = pattern(
        r#"<pattern name="sized" type="widget" width="{size}">
  <arg name="size" type="scalar" optional="true"/>
</pattern>"#,
    );
    let mut surface = CommandRecorder::new();
    let result = renderer().render(&p, &Instance::new(), Rect::new(0.0, 0.0, 10.0, 10.0), &mut surface);
    assert!(matches!(result, Err(RenderError::Evaluation { name, .. }) if name == "default.sized"));
}

#[test]
fn test_transforms_compose_along_the_ancestor_chain() {
    let p = pattern(
        r#"<pattern name="shifted" type="widget">
  <group transform="translate(10,0)">
    <rect transform="translate(5,0)" width="20" height="10" fill="red"/>
  </group>
</pattern>"#,
    );
    let (report, surface) = draw(&p, &Instance::new(), Rect::new(0.0, 0.0, 100.0, 40.0));
    assert_eq!(report.skipped, 0);

    let DrawCommand::Fill { path, .. } = &surface.commands[0] else {
        panic!("expected a fill, got {:?}", surface.commands[0]);
    };
    let outline = [
        Point::new(15.0, 0.0),
        Point::new(35.0, 0.0),
        Point::new(35.0, 10.0),
        Point::new(15.0, 10.0),
    ];
    assert_eq!(path, &PathData::polyline(&outline, true));
}

#[test]
fn test_failing_group_member_reports_its_cause() {
    let p = pattern(
        r#"<pattern name="sized" type="widget">
  <args name="size">
    <arg name="w" type="scalar"/>
  </args>
  <rect width="{size.w}" height="10" fill="red"/>
</pattern>"#,
    );
    let instance = Instance::new().with_attribute("size-w", "{width / 0}");
    let (report, surface) = draw(&p, &instance, Rect::new(0.0, 0.0, 100.0, 40.0));

    assert_eq!(report.skipped, 1);
    assert!(surface.commands.is_empty());
    let causes: Vec<_> = report
        .diagnostics
        .iter()
        .map(|d| (d.message.as_str(), d.cause.as_deref()))
        .collect();
    assert_eq!(causes, vec![("element could not be drawn", Some("division by zero"))]);
}

#[test]
fn test_recorded_commands_serialize_as_tagged_json() {
    let p = pattern(BUTTON);
    let instance = Instance::new().with_attribute("label", "Go");
    let (_, surface) = draw(&p, &instance, Rect::new(0.0, 0.0, 100.0, 40.0));
    let json = serde_json::to_value(&surface.commands).unwrap();
    assert_eq!(json[0]["op"], "fill");
    assert_eq!(json[0]["paint"]["paint"], "solid");
    assert_eq!(json[1]["op"], "text");
    assert_eq!(json[1]["text"], "Go");
}
