use std::sync::Arc;
use std::thread;

use jsfilter::{Evaluator, Parameters};

fn main() {
    let evaluator = Arc::new(Evaluator::default());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ev = Arc::clone(&evaluator);
            thread::spawn(move || {
                let age = 16_i64 + i64::from(i);
                let params = Parameters::new()
                    .set("user.age", age)
                    .set("user.status", "active");

                let result = ev.evaluate("user.age >= 18 && user.status === 'active'", &params, None);
                println!("Thread {i}: {result:?}");
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    println!("{:?}", evaluator.pool_stats(""));
}
