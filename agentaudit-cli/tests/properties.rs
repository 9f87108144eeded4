//! Property tests for the composite score and change-set algebra

use agentaudit::config::ScoringWeights;
use agentaudit::models::Snapshot;
use agentaudit::scoring::{composite_score, CompositeInputs};
use agentaudit::tracker::get_changes;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-e]{1,2}", 0..8)
}

fn snapshot(agents: BTreeSet<String>, tests: BTreeSet<String>) -> Snapshot {
    Snapshot {
        agent_names: agents,
        test_names: tests,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn composite_stays_in_bounds(
        tc in 0.0f64..=100.0,
        ei in 0.0f64..=100.0,
        eh in 0.0f64..=100.0,
        it in 0.0f64..=100.0,
        ct in 0.0f64..=100.0,
        dp in 0.0f64..=100.0,
        cq in 0.0f64..=100.0,
        raw in prop::array::uniform7(0.01f64..1.0),
    ) {
        let mut weights = ScoringWeights {
            test_coverage: raw[0],
            error_intelligence: raw[1],
            error_handling: raw[2],
            integration: raw[3],
            contract: raw[4],
            dependency: raw[5],
            code_quality: raw[6],
        };
        weights.normalize();
        prop_assert!(weights.is_valid());

        let inputs = CompositeInputs {
            test_coverage: tc,
            error_intelligence: ei,
            error_handling: eh,
            integration: it,
            contract: ct,
            dependency: dp,
            code_quality: cq,
        };
        let score = composite_score(&inputs, &weights);
        prop_assert!((0.0..=100.0).contains(&score));

        let perfect = composite_score(&CompositeInputs::uniform(100.0), &weights);
        prop_assert!((perfect - 100.0).abs() < 1e-9);
    }

    #[test]
    fn change_set_partitions_current(
        previous_agents in names(),
        current_agents in names(),
        previous_tests in names(),
        current_tests in names(),
    ) {
        let previous = snapshot(previous_agents.clone(), previous_tests);
        let current = snapshot(current_agents.clone(), current_tests);
        let changes = get_changes(&current, &previous);

        let new: BTreeSet<String> = changes.new_agents.iter().cloned().collect();
        let unchanged: BTreeSet<String> = changes.unchanged_agents.iter().cloned().collect();
        let removed: BTreeSet<String> = changes.removed_agents.iter().cloned().collect();

        prop_assert!(new.is_disjoint(&unchanged));
        prop_assert_eq!(new.union(&unchanged).cloned().collect::<BTreeSet<_>>(), current_agents.clone());
        prop_assert!(removed.is_disjoint(&current_agents));
        prop_assert!(removed.is_subset(&previous_agents));
        prop_assert_eq!(
            unchanged.union(&removed).cloned().collect::<BTreeSet<_>>(),
            previous_agents
        );

        // Pure: same inputs, same output
        prop_assert_eq!(get_changes(&current, &previous), changes);
    }

    #[test]
    fn identical_snapshots_have_no_changes(agents in names(), tests in names()) {
        let s = snapshot(agents.clone(), tests);
        let changes = get_changes(&s, &s);
        prop_assert!(!changes.has_changes());
        prop_assert_eq!(changes.unchanged_agents.len(), agents.len());
    }
}
