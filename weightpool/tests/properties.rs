use std::collections::BTreeMap;

use proptest::prelude::*;
use weightpool::{Record, WeightedPool};

#[derive(Debug, Clone)]
enum Op {
    Set(u8, Option<u8>),
    Remove(u8),
    Bulk(Vec<(u8, Option<u8>)>),
}

fn entry() -> impl Strategy<Value = (u8, Option<u8>)> {
    (0u8..12, prop::option::of(0u8..6))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => entry().prop_map(|(k, w)| Op::Set(k, w)),
        2 => (0u8..12).prop_map(Op::Remove),
        1 => prop::collection::vec(entry(), 0..6).prop_map(Op::Bulk),
    ]
}

fn weight(w: Option<u8>) -> Option<f64> {
    w.map(f64::from)
}

fn expected_ranking(model: &BTreeMap<u8, Option<f64>>) -> Vec<u8> {
    let mut weighted: Vec<(u8, f64)> = model
        .iter()
        .filter_map(|(&k, &w)| w.filter(|w| *w > 0.0).map(|w| (k, w)))
        .collect();
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    weighted.into_iter().map(|(k, _)| k).collect()
}

proptest! {
    #[test]
    fn prop_index_tracks_weighted_keys(ops in prop::collection::vec(op(), 0..60)) {
        let mut pool: WeightedPool<u8, ()> = WeightedPool::new();
        let mut model: BTreeMap<u8, Option<f64>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(k, w) => {
                    let prev = pool.set(k, weight(w), ()).unwrap();
                    prop_assert_eq!(prev.map(|r| r.weight), model.insert(k, weight(w)));
                }
                Op::Remove(k) => {
                    let removed = pool.remove(&k);
                    prop_assert_eq!(removed.map(|r| r.weight), model.remove(&k));
                }
                Op::Bulk(batch) => {
                    pool.bulk_update(batch.iter().map(|&(k, w)| Record {
                        key: k,
                        weight: weight(w),
                        metadata: (),
                    }))
                    .unwrap();
                    for (k, w) in batch {
                        model.insert(k, weight(w));
                    }
                }
            }

            pool.check_invariants();
            let ranked: Vec<u8> = pool.index().ranked().map(|(k, _)| *k).collect();
            prop_assert_eq!(ranked, expected_ranking(&model));
            prop_assert_eq!(pool.len(), model.len());

            match pool.index().cumulative().last() {
                Some(&last) => prop_assert_eq!(last, 1.0),
                None => prop_assert_eq!(pool.total_weight(), 0.0),
            }
        }
    }

    #[test]
    fn prop_bulk_update_idempotent(
        batch in prop::collection::vec((0u8..20, prop::option::of(0u8..10)), 0..30)
    ) {
        let records: Vec<Record<u8, u8>> = batch
            .iter()
            .map(|&(k, w)| Record { key: k, weight: weight(w), metadata: k })
            .collect();

        let mut once = WeightedPool::new();
        once.bulk_update(records.clone()).unwrap();
        let mut twice = WeightedPool::new();
        twice.bulk_update(records.clone()).unwrap();
        twice.bulk_update(records).unwrap();

        prop_assert_eq!(once.snapshot(), twice.snapshot());
        prop_assert_eq!(once.index().cumulative(), twice.index().cumulative());
    }

    #[test]
    fn prop_snapshot_is_sorted_and_complete(
        batch in prop::collection::vec((0u8..30, prop::option::of(0u8..8)), 0..40)
    ) {
        let pool = WeightedPool::from_records(
            batch.iter().map(|&(k, w)| Record { key: k, weight: weight(w), metadata: () }),
        )
        .unwrap();
        let snap = pool.snapshot();
        prop_assert_eq!(snap.len(), pool.len());

        let weighted = pool.index().len();
        for pair in snap[..weighted].windows(2) {
            prop_assert_eq!(pair[0].rank_cmp(&pair[1]), std::cmp::Ordering::Less);
        }
        for pair in snap[weighted..].windows(2) {
            prop_assert!(pair[0].key < pair[1].key);
        }
        prop_assert!(snap[weighted..].iter().all(|r| !r.is_weighted()));
    }
}
