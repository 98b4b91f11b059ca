use std::sync::Arc;

use jsfilter::{Evaluator, FilterAction, FilterSet, Parameters, StaticAssets};

fn main() {
    let production = FilterSet::new(
        "production_only",
        FilterAction::Allow,
        ["event.entity.environment === 'production'"],
    )
    .expect("invalid filter");

    let helpers = StaticAssets::new("maintenance")
        .script("window.js", "function inWindow(h) { return h >= 2 && h < 4; }");
    let maintenance = FilterSet::new("maintenance_window", FilterAction::Deny, ["inWindow(event.hour)"])
        .expect("invalid filter")
        .with_assets(Arc::new(helpers));

    println!("{production}");
    println!("{maintenance}");

    let evaluator = Evaluator::default();
    let events = [
        Parameters::new()
            .set("event.entity.environment", "production")
            .set("event.hour", 3_i64),
        Parameters::new()
            .set("event.entity.environment", "production")
            .set("event.hour", 14_i64),
        Parameters::new()
            .set("event.entity.environment", "staging")
            .set("event.hour", 14_i64),
    ];

    for (i, event) in events.iter().enumerate() {
        let mut admitted = true;
        for filter in [&production, &maintenance] {
            match filter.admits(&evaluator, event) {
                Ok(true) => {}
                Ok(false) => {
                    println!("event {i}: filtered by {}", filter.name());
                    admitted = false;
                    break;
                }
                Err(e) => {
                    println!("event {i}: {e}");
                    admitted = false;
                    break;
                }
            }
        }
        if admitted {
            println!("event {i}: handled");
        }
    }
}
