//! Every node and attribute the binder never reads is reported once

use stencil_binder::{bind_source, BindOptions, BoundDocument};
use stencil_parser::Severity;

fn bind(source: &str) -> BoundDocument {
    bind_source(source, &BindOptions::default())
}

fn messages(doc: &BoundDocument) -> Vec<String> {
    doc.diagnostics.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn test_fully_consumed_document_is_silent() {
    let doc = bind(
        r##"<library name="ui">
  <defs>
    <radial-gradient id="glow" r="0.8">
      <stop offset="0" color="white"/>
      <stop offset="1" color="none"/>
    </radial-gradient>
  </defs>
  <pattern name="lamp" type="box" example-size="40 40">
    <desc>A round lamp.</desc>
    <arg name="on" type="bool" default="true"/>
    <circle cx="50%" cy="50%" r="{width / 2}" fill="#glow" visible="{on}"/>
    <area role="remaining" margin="4"/>
  </pattern>
</library>"##,
    );
    assert!(doc.diagnostics.is_empty(), "{:?}", messages(&doc));
}

#[test]
fn test_unknown_attribute_reported_exactly_once() {
    let doc = bind(
        r#"<pattern name="p" type="widget">
  <rect width="10" colour="red"/>
</pattern>"#,
    );
    assert_eq!(messages(&doc), vec!["attribute 'colour' on <rect> is never used"]);
    let diagnostic = &doc.diagnostics.as_slice()[0];
    assert_eq!(diagnostic.severity, Severity::Warning);
    assert_eq!((diagnostic.span.line, diagnostic.span.column), (2, 20));
}

#[test]
fn test_attribute_of_expanded_source_reported_once() {
    let doc = bind(
        r##"<library name="ui">
  <defs><rect id="dot" width="4" shade="dark"/></defs>
  <pattern name="p" type="widget">
    <use href="#dot"/>
    <use href="#dot" x="8"/>
  </pattern>
</library>"##,
    );
    assert_eq!(messages(&doc), vec!["attribute 'shade' on <rect> is never used"]);
}

#[test]
fn test_unreferenced_definitions_are_reported() {
    let doc = bind(
        r#"<library name="ui">
  <defs>
    <rect id="spare" width="4"/>
  </defs>
  <solid id="ink" color="black"/>
  <pattern name="p" type="widget"/>
</library>"#,
    );
    assert_eq!(
        messages(&doc),
        vec!["<rect> is never used", "<solid> is never used"]
    );
}

#[test]
fn test_stray_text_is_reported() {
    let doc = bind(
        r#"<pattern name="p" type="widget">
  <div>hello</div>
</pattern>"#,
    );
    assert_eq!(messages(&doc), vec!["text is never used"]);
}

#[test]
fn test_reporting_can_be_switched_off() {
    let options = BindOptions {
        report_unused: false,
        ..BindOptions::default()
    };
    let doc = bind_source(
        r#"<pattern name="p" type="widget" colour="red"><div>hello</div></pattern>"#,
        &options,
    );
    assert!(doc.diagnostics.is_empty(), "{:?}", messages(&doc));
}

#[test]
fn test_broken_parts_are_not_reported_twice() {
    let doc = bind(
        r#"<pattern name="p" type="widget">
  <blink speed="fast"><b/></blink>
</pattern>"#,
    );
    assert_eq!(messages(&doc), vec!["unknown element <blink>"]);
}
