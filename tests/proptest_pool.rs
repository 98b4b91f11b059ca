use std::collections::{HashMap, HashSet};

use jsfilter::RuntimePool;
use proptest::prelude::*;

const KEYS: &[&str] = &["", "alpha", "beta"];

#[derive(Debug, Clone)]
enum Op {
    /// Acquire for a key, building a new instance if none is idle.
    Checkout(usize),
    /// Release the n-th held instance.
    Release(usize),
    /// Discard the n-th held instance.
    Discard(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEYS.len()).prop_map(Op::Checkout),
        any::<usize>().prop_map(Op::Release),
        any::<usize>().prop_map(Op::Discard),
    ]
}

/// Instance tagged with the key it was built for and a unique id.
type Instance = (usize, u64);

// ---------------------------------------------------------------------------
// Invariants, checked after every operation:
//
// - an instance is never held twice
// - an instance is only ever handed out for the key it was built for
// - created = idle + leased + discarded for every key (nothing leaks)
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn pool_bookkeeping_is_consistent(
        ops in prop::collection::vec(arb_op(), 1..80),
        max_idle in prop::option::of(0_usize..4),
    ) {
        let pool: RuntimePool<Instance> = RuntimePool::with_max_idle(max_idle);
        let mut next_id = 0_u64;
        let mut held: Vec<(usize, Instance)> = Vec::new();
        let mut held_ids: HashSet<u64> = HashSet::new();

        for op in ops {
            match op {
                Op::Checkout(k) => {
                    let instance = match pool.acquire(KEYS[k]) {
                        Some(instance) => instance,
                        None => {
                            next_id += 1;
                            pool.register(KEYS[k], (k, next_id));
                            pool.acquire(KEYS[k]).expect("registered instance is idle")
                        }
                    };
                    prop_assert_eq!(instance.0, k, "instance crossed keys");
                    prop_assert!(held_ids.insert(instance.1), "instance held twice");
                    held.push((k, instance));
                }
                Op::Release(n) if !held.is_empty() => {
                    let (k, instance) = held.swap_remove(n % held.len());
                    held_ids.remove(&instance.1);
                    pool.release(KEYS[k], instance);
                }
                Op::Discard(n) if !held.is_empty() => {
                    let (k, instance) = held.swap_remove(n % held.len());
                    held_ids.remove(&instance.1);
                    pool.discard(KEYS[k], instance);
                }
                Op::Release(_) | Op::Discard(_) => {}
            }

            let mut leased_per_key: HashMap<usize, usize> = HashMap::new();
            for (k, _) in &held {
                *leased_per_key.entry(*k).or_default() += 1;
            }
            for (k, key) in KEYS.iter().enumerate() {
                if let Some(stats) = pool.stats(key) {
                    let leased = leased_per_key.get(&k).copied().unwrap_or(0);
                    prop_assert_eq!(stats.leased, leased);
                    prop_assert_eq!(
                        stats.created,
                        (stats.idle + stats.leased) as u64 + stats.discarded
                    );
                    if let Some(max) = max_idle {
                        prop_assert!(stats.idle <= max);
                    }
                }
            }
        }
    }

    #[test]
    fn checkout_reuses_before_building(checkouts in 1_usize..30) {
        let pool: RuntimePool<u64> = RuntimePool::new();
        let mut builds = 0_u64;
        for _ in 0..checkouts {
            let lease = pool
                .checkout("k", || {
                    builds += 1;
                    Ok::<_, ()>(builds)
                })
                .unwrap();
            prop_assert_eq!(*lease, 1);
        }
        prop_assert_eq!(builds, 1);
    }
}
