//! Ledger cleanup property, isolated in its own test binary so that
//! concurrently running tests cannot perturb the process-wide entry count.

use std::panic::{self, AssertUnwindSafe};

use causeway::prelude::*;

#[test]
fn test_ledger_returns_to_baseline_after_episodes() {
    let baseline = causeway::annotation_count();

    // Absorbed episodes.
    for iteration in 0..100 {
        let cause = absorb(|| {
            resolve(
                || "outer".to_owned(),
                || annotate(|| format!("op {iteration}"), || -> () { panic!("root") }),
            )
        })
        .unwrap_err();
        drop(cause);
    }

    // Dispatched episodes.
    for _ in 0..100 {
        let outcome = dispatch(drop, || -> () { causeway::raise!("root") });
        assert!(outcome.is_none());
    }

    // Episodes escaping to a top-level catch, where only dropping the payload
    // releases the entry.
    for _ in 0..100 {
        let payload = panic::catch_unwind(AssertUnwindSafe(|| {
            annotate(|| "lost".to_owned(), || -> () { panic!("root") })
        }))
        .unwrap_err();
        drop(payload);
    }

    assert_eq!(causeway::annotation_count(), baseline);
}
