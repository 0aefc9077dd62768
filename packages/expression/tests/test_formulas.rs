use std::rc::Rc;
use stencil_expression::*;
use stencil_geometry::{Axis, Color, Rect, Transform};

fn div_scope(width: f64, height: f64) -> Rc<Scope> {
    let mut scope = Scope::new();
    scope.bind_value("width", Value::Scalar(width));
    scope.bind_value("height", Value::Scalar(height));
    Rc::new(scope)
}

#[test]
fn test_literal_only_formulas_are_constant_everywhere() {
    let empty = Scope::new();
    let sources = [
        "{max(2, 3) * 4 - 1}",
        "{'n=' + str(len([1, 2, 3]))}",
        "{if(1 < 2, red, blue)}",
        "{translate(5) * scale(2)}",
    ];
    for source in sources {
        let expr = parse_typed(source, &ValueType::Any, &LiteralContext::new(&empty)).unwrap();
        assert!(expr.is_constant(), "{} should fold", source);

        let with_names = div_scope(1.0, 1.0);
        assert_eq!(expr.eval(&empty), expr.eval(&with_names));
    }
}

#[test]
fn test_formula_never_becomes_constant() {
    let mut scope = Scope::new();
    scope.declare("count", ValueType::Int);
    let ctx = LiteralContext::new(&scope);
    let expr = parse_as::<i64>("{count * (2 + 3)}", &ctx).unwrap();
    assert!(!expr.is_constant());
    assert_eq!(expr.formula().unwrap().ast().to_string(), "(count * 5)");

    let mut bound = Scope::with_parent(Rc::new(scope));
    bound.bind_value("count", Value::Int(2));
    assert_eq!(expr.eval(&bound), Ok(10));
}

#[test]
fn test_percentages_follow_the_enclosing_div() {
    let outer = div_scope(200.0, 50.0);
    let ctx = LiteralContext::new(&outer);
    let rect = parse_as::<Rect>("10% 10% 80% 80%", &ctx).unwrap();

    assert_eq!(rect.eval(&outer), Ok(Rect::new(20.0, 5.0, 160.0, 40.0)));

    let mut inner = Scope::with_parent(outer);
    inner.bind_value("width", Value::Scalar(100.0));
    assert_eq!(rect.eval(&inner), Ok(Rect::new(10.0, 5.0, 80.0, 40.0)));
}

#[test]
fn test_percent_without_axis_is_an_error() {
    let scope = Scope::new();
    let ctx = LiteralContext::new(&scope).with_axis(Some(Axis::X));
    let err = parse_as::<f64>("  5%", &ctx).unwrap_err();
    assert_eq!(err.range(), 2..4);
    assert_eq!(err.to_string(), "percentage needs 'width' in scope");
}

#[test]
fn test_recursive_variables_fail_cleanly() {
    let mut scope = Scope::new();
    for (name, text) in [("a", "b + 1"), ("b", "c * 2"), ("c", "a")] {
        let ast = parse_formula(text, 0, &scope).unwrap();
        let expr = Expression::<Value>::from_ast_as(ast, ValueType::Scalar).unwrap();
        scope.bind(name, Binding::new(ValueType::Scalar, expr));
    }
    let err = Evaluator::new()
        .evaluate(&Ast::name("a", 0..1), &scope)
        .unwrap_err();
    assert_eq!(
        err,
        EvalError::Recursion {
            chain: vec!["a".into(), "b".into(), "c".into(), "a".into()]
        }
    );
    assert_eq!(err.to_string(), "'a' refers to itself: a -> b -> c -> a");
}

#[test]
fn test_evaluation_errors() {
    let mut scope = Scope::new();
    scope.bind_value("label", Value::String("x".into()));
    let ctx = LiteralContext::new(&scope);

    let expr = parse_as::<f64>("{label * 2}", &ctx).unwrap();
    assert!(matches!(expr.eval(&scope), Err(EvalError::InvalidOperands { .. })));

    let expr = parse_as::<f64>("{missing + 1}", &ctx).unwrap();
    assert_eq!(
        expr.eval(&scope),
        Err(EvalError::UndefinedName {
            name: "missing".into()
        })
    );

    let expr = parse_as::<Color>("{label}", &ctx).unwrap();
    assert!(matches!(expr.eval(&scope), Err(EvalError::BadCast { .. })));
}

#[test]
fn test_transform_composition_with_formulas() {
    let scope = div_scope(40.0, 20.0);
    let ctx = LiteralContext::new(&scope);
    let own = parse_as::<Transform>("translate(50%, 0) rotate(90)", &ctx).unwrap();
    let parent = parse_as::<Transform>("scale(2)", &ctx).unwrap();
    let composed = Expression::compose(&parent, own).unwrap();

    let t = composed.eval(&scope).unwrap();
    let expected = Transform::scale(2.0, 2.0) * Transform::translate(20.0, 0.0) * Transform::rotate(90.0);
    for (a, b) in [(t.a, expected.a), (t.b, expected.b), (t.e, expected.e), (t.f, expected.f)] {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_type_checker_sees_declared_types() {
    let mut scope = Scope::new();
    scope.declare("title", ValueType::String);
    scope.declare("count", ValueType::Int);
    let ast = parse_formula("title * count", 0, &scope).unwrap();
    let (_, errors) = check(&ast, &scope);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "cannot apply '*' to string and int");
}
