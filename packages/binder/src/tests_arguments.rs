//! Instance argument binding: singular, numbered, entry and grouped
//! arguments, fallbacks and tests.

use crate::{bind_source, BindOptions, Instance, Pattern};
use stencil_expression::Value;
use stencil_parser::Severity;

fn pattern(source: &str) -> Pattern {
    let doc = bind_source(source, &BindOptions::default());
    let errors: Vec<_> = doc.diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(errors.is_empty(), "unexpected diagnostics: {:?}", errors);
    doc.patterns.into_iter().next().unwrap()
}

fn messages(diagnostics: &stencil_parser::Diagnostics) -> Vec<String> {
    diagnostics.iter().map(|d| d.message.clone()).collect()
}

const COUNTER: &str = r#"<pattern name="counter" type="widget">
  <arg name="count" type="int" default="3"/>
  <text>{count}</text>
</pattern>"#;

#[test]
fn test_default_used_when_attribute_absent() {
    let (values, diagnostics) = pattern(COUNTER).bind_arguments(&Instance::new());
    assert!(diagnostics.is_empty());
    assert_eq!(values.constant("count"), Some(Value::Int(3)));
}

#[test]
fn test_attribute_overrides_default() {
    let instance = Instance::new().with_attribute("count", "5");
    let (values, diagnostics) = pattern(COUNTER).bind_arguments(&instance);
    assert!(diagnostics.is_empty());
    assert_eq!(values.constant("count"), Some(Value::Int(5)));
}

#[test]
fn test_invalid_literal_reports_and_falls_back_to_default() {
    let instance = Instance::new().with_attribute("count", "abc");
    let (values, diagnostics) = pattern(COUNTER).bind_arguments(&instance);
    assert_eq!(messages(&diagnostics), vec!["invalid value for 'count'"]);
    let diagnostic = &diagnostics.as_slice()[0];
    assert_eq!(diagnostic.span, instance.attributes[0].value_span);
    assert!(diagnostic.cause.is_some());
    assert_eq!(values.constant("count"), Some(Value::Int(3)));
}

#[test]
fn test_invalid_literal_without_default_leaves_argument_unbound() {
    let p = pattern(
        r#"<pattern name="p" type="widget">
  <arg name="count" type="int"/>
</pattern>"#,
    );
    let instance = Instance::new().with_attribute("count", "abc");
    let (values, diagnostics) = p.bind_arguments(&instance);
    assert_eq!(
        messages(&diagnostics),
        vec![
            "invalid value for 'count'",
            "argument 'count' has no usable value and no default"
        ]
    );
    assert!(!values.is_bound("count"));
}

#[test]
fn test_missing_required_argument() {
    let p = pattern(
        r#"<pattern name="p" type="widget">
  <arg name="label" type="string"/>
  <arg name="note" type="string" optional="true"/>
</pattern>"#,
    );
    let (values, diagnostics) = p.bind_arguments(&Instance::new());
    assert_eq!(messages(&diagnostics), vec!["missing required argument 'label'"]);
    assert_eq!(diagnostics.as_slice()[0].span, p.arguments[0].span);
    assert!(!values.is_bound("label"));
    assert!(!values.is_bound("note"));
    assert_eq!(values.len(), 2);
}

const BARS: &str = r#"<pattern name="bars" type="widget">
  <arg name="x" type="scalar" numbered="true" default="0"/>
</pattern>"#;

#[test]
fn test_numbered_arguments_collect_in_suffix_order() {
    let instance = Instance::new()
        .with_attribute("x2", "20")
        .with_attribute("x1", "10")
        .with_attribute("x3", "30");
    let (values, diagnostics) = pattern(BARS).bind_arguments(&instance);
    assert!(diagnostics.is_empty());
    assert_eq!(
        values.constant("x"),
        Some(Value::List(vec![
            Value::Scalar(10.0),
            Value::Scalar(20.0),
            Value::Scalar(30.0)
        ]))
    );
}

#[test]
fn test_numbered_gap_is_skipped_with_warning() {
    let instance = Instance::new().with_attribute("x1", "1").with_attribute("x3", "3");
    let (values, diagnostics) = pattern(BARS).bind_arguments(&instance);
    assert_eq!(messages(&diagnostics), vec!["'x3' skips 'x2'; the gap is ignored"]);
    assert_eq!(diagnostics.as_slice()[0].severity, Severity::Warning);
    assert_eq!(
        values.constant("x"),
        Some(Value::List(vec![Value::Scalar(1.0), Value::Scalar(3.0)]))
    );
}

#[test]
fn test_numbered_invalid_item_uses_default_per_item() {
    let instance = Instance::new().with_attribute("x1", "1").with_attribute("x2", "oops");
    let (values, diagnostics) = pattern(BARS).bind_arguments(&instance);
    assert_eq!(messages(&diagnostics), vec!["invalid value for 'x2'"]);
    assert_eq!(
        values.constant("x"),
        Some(Value::List(vec![Value::Scalar(1.0), Value::Scalar(0.0)]))
    );
}

#[test]
fn test_entry_arguments_read_instance_entries() {
    let p = pattern(
        r#"<pattern name="p" type="widget">
  <arg name="title" type="string" entry="true"/>
</pattern>"#,
    );
    let instance = Instance::new().with_entry("title", Value::String("Quarterly".into()));
    let (values, diagnostics) = p.bind_arguments(&instance);
    assert!(diagnostics.is_empty());
    assert_eq!(values.constant("title"), Some(Value::String("Quarterly".into())));
}

#[test]
fn test_grouped_arguments_build_a_record() {
    let p = pattern(
        r#"<pattern name="p" type="widget">
  <args name="border">
    <arg name="width" var="size" type="scalar" default="1"/>
    <arg name="color" type="color"/>
  </args>
</pattern>"#,
    );
    let instance = Instance::new().with_attribute("border-color", "red");
    let (values, diagnostics) = p.bind_arguments(&instance);
    assert!(diagnostics.is_empty(), "{:?}", messages(&diagnostics));
    let Some(Value::Record(fields)) = values.constant("border") else {
        panic!("border should be a constant record");
    };
    assert_eq!(fields.get("size"), Some(&Value::Scalar(1.0)));
    assert!(matches!(fields.get("color"), Some(Value::Color(_))));
}

#[test]
fn test_unknown_instance_attribute_is_reported() {
    let instance = Instance::new().with_attribute("colour", "red");
    let (_, diagnostics) = pattern(COUNTER).bind_arguments(&instance);
    assert_eq!(
        messages(&diagnostics),
        vec!["'colour' is not an argument of pattern 'default.counter'"]
    );
}

#[test]
fn test_argument_test_and_validation() {
    let p = pattern(
        r#"<pattern name="p" type="widget">
  <arg name="low" type="scalar" test="{low >= 0}" message="low must not be negative"/>
  <arg name="high" type="scalar"/>
  <validate test="{low &lt;= high}" message="low must not exceed high"/>
</pattern>"#,
    );
    let instance = Instance::new().with_attribute("low", "-5").with_attribute("high", "-10");
    let (_, diagnostics) = p.bind_arguments(&instance);
    assert_eq!(
        messages(&diagnostics),
        vec!["low must not be negative", "low must not exceed high"]
    );
    assert_eq!(diagnostics.as_slice()[0].span, instance.attributes[0].value_span);
}

#[test]
fn test_failing_default_is_discarded_at_bind_time() {
    let doc = bind_source(
        r#"<pattern name="p" type="widget">
  <arg name="size" type="scalar" default="-1" test="{size > 0}"/>
</pattern>"#,
        &BindOptions::default(),
    );
    assert_eq!(messages(&doc.diagnostics), vec!["default of 'size' is discarded"]);
    let p = &doc.patterns[0];
    assert!(p.arguments[0].default.is_none());
    assert!(p.arguments[0].is_required());
}

#[test]
fn test_example_instance_round_trips_through_binding() {
    let p = pattern(
        r#"<pattern name="p" type="widget">
  <arg name="label" type="string" example="Save"/>
  <arg name="x" type="scalar" numbered="true" example="1, 2, 3"/>
</pattern>"#,
    );
    let (values, diagnostics) = p.bind_arguments(&p.example_instance());
    assert!(diagnostics.is_empty(), "{:?}", messages(&diagnostics));
    assert_eq!(values.constant("label"), Some(Value::String("Save".into())));
    assert_eq!(
        values.constant("x"),
        Some(Value::List(vec![
            Value::Scalar(1.0),
            Value::Scalar(2.0),
            Value::Scalar(3.0)
        ]))
    );
}
