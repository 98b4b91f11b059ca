use jsfilter::{validate_expression, Evaluator, Parameters};

fn main() {
    let expression = "event.check.status !== 0 && event.check.occurrences >= threshold";
    validate_expression(expression).expect("invalid expression");

    let evaluator = Evaluator::default();

    // Evaluate against an event
    let event = Parameters::new()
        .set("event.check.status", 2_i64)
        .set("event.check.occurrences", 4_i64)
        .set("threshold", 3_i64);

    match evaluator.evaluate(expression, &event, None) {
        Ok(matched) => println!("Result: {matched}"),
        Err(e) => println!("Evaluation failed: {e}"),
    }
}
