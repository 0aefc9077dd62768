use stencil_parser::{parse, parse_document, reassemble, NodeKind, ParseOptions};

const WIDGETS: &str = r##"<library name="widgets">
  <!-- a stretchable button -->
  <pattern name="button" type="box" example-size="120, 32">
    <arg name="label" type="string" example="Press"/>
    <arg name="radius" type="scalar" default="4"/>
    <div reference="40,20" xs="8 32">
      <rect width="100%" height="100%" rx="{radius}" fill="#btn-fill" stroke="black"/>
    </div>
    <area role="remaining" x="4" y="4" width="{width - 8}" height="{height - 8}">
      <text x="50%" y="50%" anchor="middle">{label}</text>
    </area>
  </pattern>
  <defs>
    <linear-gradient id="btn-fill" x1="0" y1="0" x2="0" y2="1">
      <stop offset="0" color="{gray(0.9)}"/>
      <stop offset="100%" color="{gray(0.7)}"/>
    </linear-gradient>
  </defs>
</library>
"##;

#[test]
fn test_reassemble_reproduces_source() {
    let doc = parse(WIDGETS);
    assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
    assert_eq!(reassemble(WIDGETS, &doc), WIDGETS);
}

#[test]
fn test_parsing_is_idempotent() {
    let first = parse(WIDGETS);
    let second = parse(WIDGETS);
    assert_eq!(first.arena, second.arena);
    assert_eq!(first.diagnostics.as_slice(), second.diagnostics.as_slice());

    let broken = "<a><b x=1></c>";
    let first = parse(broken);
    let second = parse(broken);
    assert_eq!(first.arena, second.arena);
    assert_eq!(first.diagnostics.as_slice(), second.diagnostics.as_slice());
}

#[test]
fn test_comment_nodes_are_optional() {
    let kept = parse_document(WIDGETS, &ParseOptions { keep_comments: true });
    let comments = kept
        .arena
        .iter()
        .filter(|(_, node)| matches!(node.kind, NodeKind::Comment(_)))
        .count();
    assert_eq!(comments, 1);
    assert_eq!(reassemble(WIDGETS, &kept), WIDGETS);
}

#[test]
fn test_tree_serializes_to_json() {
    let doc = parse("<pattern name=\"p\" type=\"widget\"/>");
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["root"], serde_json::json!(0));
    assert!(json["diagnostics"]["items"].as_array().unwrap().is_empty());
}
