//! Property-based tests for the rule engine.
//!
//! ## Test Categories
//!
//! - **Range boundaries**: `check_in_range` accepts exactly the closed
//!   interval
//! - **Severity aggregation**: a merged result carries the highest severity
//!   of its failures
//! - **Uniqueness**: `check_unique` agrees with a brute-force pairwise
//!   comparison
//! - **Debounce coalescing**: a burst of edits to one cell yields exactly
//!   one evaluation

use grid_guard::core::{RowSet, RuleSet, Severity, ThrottlingConfig, ValidationContext, ValidationResult};
use grid_guard::grid::{CollectingSink, InMemoryGrid};
use grid_guard::scheduler::ValidationScheduler;
use grid_guard::validators::{check_in_range, check_unique};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Info),
        Just(Severity::Warning),
        Just(Severity::Error)
    ]
}

/// A result that is either a success or a failure of some severity.
fn outcome() -> impl Strategy<Value = Option<Severity>> {
    prop::option::of(severity())
}

proptest! {
    #[test]
    fn prop_in_range_accepts_exactly_the_closed_interval(
        min in -1_000i64..1_000,
        width in 0i64..1_000,
        offset in -50i64..50,
    ) {
        let max = min + width;
        let boundaries = [min, max];
        let value = if offset < 0 { min + offset } else { max + offset };
        let expected = value >= min && value <= max;

        let ctx = ValidationContext::new(0).with_value("Age", value);
        let result = check_in_range(&ctx, "Age", min as f64, max as f64);
        prop_assert_eq!(result.is_valid(), expected);

        for boundary in boundaries {
            let ctx = ValidationContext::new(0).with_value("Age", boundary);
            prop_assert!(check_in_range(&ctx, "Age", min as f64, max as f64).is_valid());
        }
    }

    #[test]
    fn prop_merge_takes_highest_failure_severity(outcomes in prop::collection::vec(outcome(), 0..8)) {
        let results = outcomes.iter().map(|outcome| match outcome {
            Some(severity) => ValidationResult::failure(*severity, "failed"),
            None => ValidationResult::success(),
        });
        let merged = ValidationResult::merge(results);

        match outcomes.iter().flatten().max() {
            Some(highest) => {
                prop_assert!(merged.is_failure());
                prop_assert_eq!(merged.severity(), *highest);
            }
            None => prop_assert!(merged.is_valid()),
        }
    }

    #[test]
    fn prop_uniqueness_matches_pairwise_oracle(
        values in prop::collection::vec(prop::sample::select(vec!["a", "b", " a", "A", "", "  ", "c "]), 0..12)
    ) {
        let rows = RowSet::new(
            values
                .iter()
                .enumerate()
                .map(|(row, value)| ValidationContext::new(row).with_value("Key", *value))
                .collect(),
        );

        for (row, value) in values.iter().enumerate() {
            let key = value.trim();
            let duplicated = !key.is_empty()
                && values
                    .iter()
                    .enumerate()
                    .any(|(other, candidate)| other != row && candidate.trim() == key);

            let ctx = rows.row(row).unwrap();
            prop_assert_eq!(check_unique(ctx, &rows, "Key").is_failure(), duplicated);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_burst_of_edits_is_evaluated_once(
        edits in 1usize..8,
        debounce_ms in 20u64..200,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let (evaluated, coalesced, reports) = runtime.block_on(async {
            let rules = RuleSet::builder("people")
                .add_required("Name")
                .throttling(ThrottlingConfig::default().with_debounce_ms(debounce_ms))
                .build()
                .unwrap();
            let grid = Arc::new(InMemoryGrid::new(["Name"]).with_row([("Name", "Ada")]));
            let sink = Arc::new(CollectingSink::new());
            let scheduler = ValidationScheduler::new(rules, grid.clone(), sink.clone()).unwrap();

            for edit in 0..edits {
                grid.set_cell(0, "Name", format!("Ada {edit}")).unwrap();
                scheduler.cell_edited(0, "Name").await.unwrap();
                tokio::time::sleep(Duration::from_millis(debounce_ms / 2)).await;
            }
            scheduler.wait_idle().await;

            let stats = scheduler.stats();
            (stats.evaluated, stats.coalesced, sink.len())
        });

        prop_assert_eq!(evaluated, 1);
        prop_assert_eq!(coalesced, (edits - 1) as u64);
        prop_assert_eq!(reports, 1);
    }
}
