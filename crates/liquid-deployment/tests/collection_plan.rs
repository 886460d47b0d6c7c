//! Set algebra of the collection plan over arbitrary listings

use liquid_deployment::CollectionPlan;
use liquid_types::CollectionName;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn collections() -> impl Strategy<Value = BTreeSet<CollectionName>> {
    prop::collection::btree_set("[a-e]", 0..5)
        .prop_map(|names| names.into_iter().map(CollectionName::new).collect())
}

proptest! {
    #[test]
    fn plan_is_consistent_with_listings(
        declared in collections(),
        running in collections(),
        indexed in collections(),
        residual in collections(),
    ) {
        let plan = CollectionPlan::compute(&declared, &running, &indexed, &residual);

        for name in &plan.to_initialize {
            prop_assert!(declared.contains(name));
            prop_assert!(!indexed.contains(name));
        }
        for name in &declared {
            if !indexed.contains(name) {
                prop_assert!(plan.to_initialize.contains(name));
            }
        }

        for name in &plan.to_gc {
            prop_assert!(running.contains(name));
            prop_assert!(!declared.contains(name));
        }
        prop_assert_eq!(plan.to_gc.len(), running.difference(&declared).count());

        for name in &plan.to_purge {
            prop_assert!(!declared.contains(name));
            prop_assert!(!running.contains(name));
            prop_assert!(indexed.contains(name) || residual.contains(name));
        }

        // Nothing declared is ever stopped or purged.
        prop_assert!(plan.to_gc.is_disjoint(&declared));
        prop_assert!(plan.to_purge.is_disjoint(&declared));
        prop_assert!(plan.to_purge.is_disjoint(&plan.to_gc));
    }

    #[test]
    fn nothing_declared_means_everything_running_is_stopped(
        running in collections(),
        indexed in collections(),
    ) {
        let plan = CollectionPlan::compute(&BTreeSet::new(), &running, &indexed, &BTreeSet::new());
        prop_assert_eq!(&plan.to_gc, &running);
        prop_assert!(plan.to_initialize.is_empty());
    }
}

#[test]
fn test_empty_listings_plan_nothing() {
    let empty = BTreeSet::new();
    assert!(CollectionPlan::compute(&empty, &empty, &empty, &empty).is_empty());
}
