
use jsfilter::{validate_expression, validate_expressions, Evaluator, FilterError, Parameters};

#[test]
fn batch_reports_index_of_first_invalid_expression() {
    let err = validate_expressions(["a+1", "a+*1", "b-1"]).unwrap_err();
    assert_eq!(err.index(), Some(1));
    assert!(err.to_string().starts_with("syntax error in expression 1: "));
}

#[test]
fn batch_stops_at_first_invalid_expression() {
    // Index 2 is also invalid but is never looked at.
    let err = validate_expressions(["ok", "1 +", "also ) bad"]).unwrap_err();
    assert_eq!(err.index(), Some(1));
}

#[test]
fn validation_accepts_typical_filters() {
    let filters = vec![
        "event.check.status !== 0".to_owned(),
        "event.check.occurrences % 10 === 0".to_owned(),
        "['web', 'db'].indexOf(role) >= 0".to_owned(),
        "hour(event.timestamp) >= 9 && hour(event.timestamp) < 17".to_owned(),
    ];
    assert!(validate_expressions(&filters).is_ok());
}

#[test]
fn validation_never_runs_code_or_touches_the_pool() {
    let evaluator = Evaluator::default();
    assert!(validate_expression("(function () { for (;;) {} })()").is_ok());
    assert!(evaluator.pool_stats("").is_none());
}

#[test]
fn syntax_error_converts_into_filter_error() {
    let err: FilterError = validate_expression("}").unwrap_err().into();
    assert!(matches!(err, FilterError::Syntax(ref e) if e.index() == Some(0)));
}

#[test]
fn validation_and_evaluation_agree_on_syntax() {
    let evaluator = Evaluator::default();
    let params = Parameters::new().set("x", 1_i64);
    let cases = [
        "x === 1",
        "010 === 8",
        "delete x",
        "implements === undefined",
        "import x from 'y'",
        "export default x",
        "await x",
        "return x",
        "x +* 1",
    ];
    for expression in cases {
        let valid = validate_expression(expression).is_ok();
        let parsed = !matches!(
            evaluator.evaluate(expression, &params, None),
            Err(FilterError::Syntax(_))
        );
        assert_eq!(valid, parsed, "disagreement on {expression}");
    }
}
