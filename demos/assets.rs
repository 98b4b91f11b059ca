use jsfilter::{Evaluator, Parameters, StaticAssets};

fn main() {
    // Helper scripts run once per runtime, in name order.
    let assets = StaticAssets::new("business-hours")
        .script("01-hours.js", "var OPEN = 9, CLOSE = 17;")
        .script(
            "02-helpers.js",
            "function duringBusinessHours(h) { return h >= OPEN && h < CLOSE; }",
        );

    let evaluator = Evaluator::default();

    for hour in [8_i64, 12, 20] {
        let params = Parameters::new().set("event.hour", hour);
        let matched = evaluator
            .evaluate("duringBusinessHours(event.hour)", &params, Some(&assets))
            .expect("evaluation failed");
        println!("hour {hour}: {matched}");
    }

    println!("{:?}", evaluator.pool_stats("business-hours"));
}
