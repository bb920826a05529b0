//! Minimal pod-set enumeration for a single order.
//!
//! For every item an order demands, the generator enumerates candidate-pod
//! combinations of growing size and keeps the smallest combinations whose
//! joint stock covers the item's full quantity. The per-item choices are
//! then crossed into whole-order pod sets. The cross-product is exponential
//! in the worst case, so enumeration is truncated at a caller-supplied cap
//! and callers sample from the result instead of searching exhaustively.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ItemId, Order, PodId, Warehouse};

/// All k-combinations of `pool`, in lexicographic index order.
fn combinations(pool: &[PodId], k: usize) -> Vec<Vec<PodId>> {
    let mut out = Vec::new();
    if k == 0 || k > pool.len() {
        return out;
    }
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        out.push(indices.iter().map(|&i| pool[i]).collect());
        // Advance to the next combination.
        let mut i = k;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if indices[i] != i + pool.len() - k {
                break;
            }
        }
        indices[i] += 1;
        for j in i + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// Smallest sufficient covering combinations for one item: combinations of
/// size k = 1, 2, … whose summed availability reaches `quantity`; stops at
/// the first size with any valid combination.
fn covering_combinations(
    pool: &[PodId],
    item: ItemId,
    quantity: u32,
    world: &Warehouse,
) -> Vec<Vec<PodId>> {
    for k in 1..=pool.len() {
        let valid: Vec<Vec<PodId>> = combinations(pool, k)
            .into_iter()
            .filter(|combo| {
                combo
                    .iter()
                    .map(|&p| world.pod(p).map_or(0, |pod| pod.count_available(item)))
                    .sum::<u32>()
                    >= quantity
            })
            .collect();
        if !valid.is_empty() {
            return valid;
        }
    }
    Vec::new()
}

/// Enumerates candidate pod sets that, together with the pods already
/// inbound, cover the order's full demand.
///
/// `candidates` maps each demanded item to the pods able to contribute
/// units of it (inbound-to-station pods unioned with unused pods). The
/// returned sets exclude `inbound` pods (those are available regardless),
/// contain at most `max_new_pods` pods (the free-robot bound) and are
/// deduplicated; at most `max_sets` sets are produced.
///
/// Returns an empty list when any demanded item has no covering
/// combination at all.
pub fn pod_sets_for_order(
    order: &Order,
    candidates: &BTreeMap<ItemId, Vec<PodId>>,
    inbound: &BTreeSet<PodId>,
    max_new_pods: usize,
    max_sets: usize,
    world: &Warehouse,
) -> Vec<BTreeSet<PodId>> {
    let mut per_item: Vec<Vec<Vec<PodId>>> = Vec::with_capacity(order.positions.len());
    for (&item, &quantity) in &order.positions {
        let pool = candidates.get(&item).map(Vec::as_slice).unwrap_or(&[]);
        let combos = covering_combinations(pool, item, quantity, world);
        if combos.is_empty() {
            return Vec::new();
        }
        per_item.push(combos);
    }

    // Cross-product over the per-item choices, driven by index counters.
    let mut sets: BTreeSet<BTreeSet<PodId>> = BTreeSet::new();
    let mut cursor = vec![0usize; per_item.len()];
    loop {
        let mut set: BTreeSet<PodId> = BTreeSet::new();
        for (choices, &idx) in per_item.iter().zip(&cursor) {
            set.extend(choices[idx].iter().filter(|p| !inbound.contains(p)));
        }
        if set.len() <= max_new_pods {
            sets.insert(set);
            if sets.len() >= max_sets {
                break;
            }
        }

        // Odometer advance over the per-item choice lists.
        let mut pos = per_item.len();
        loop {
            if pos == 0 {
                return sets.into_iter().collect();
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < per_item[pos].len() {
                break;
            }
            cursor[pos] = 0;
        }
    }
    sets.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderId, Pod, WaypointId};

    fn world() -> Warehouse {
        Warehouse::new()
            .with_pod(Pod::new(PodId(1), WaypointId(1)).with_stock(ItemId(1), 1))
            .with_pod(Pod::new(PodId(2), WaypointId(2)).with_stock(ItemId(1), 1))
            .with_pod(Pod::new(PodId(3), WaypointId(3)).with_stock(ItemId(1), 2))
            .with_pod(Pod::new(PodId(4), WaypointId(4)).with_stock(ItemId(2), 1))
    }

    fn order(items: &[(u32, u32)]) -> Order {
        Order::new(
            OrderId(1),
            items.iter().map(|&(i, q)| (ItemId(i), q)).collect(),
            0,
            1_000,
        )
    }

    fn candidates(items: &[(u32, &[u32])]) -> BTreeMap<ItemId, Vec<PodId>> {
        items.iter()
            .map(|&(item, pods)| (ItemId(item), pods.iter().map(|&p| PodId(p)).collect()))
            .collect()
    }

    #[test]
    fn test_single_pod_suffices() {
        // Item 1 × 2: pod 3 covers alone, pods 1+2 only jointly. Smallest
        // size wins, so only the singleton {3} is proposed.
        let sets = pod_sets_for_order(
            &order(&[(1, 2)]),
            &candidates(&[(1, &[1, 2, 3])]),
            &BTreeSet::new(),
            4,
            64,
            &world(),
        );
        assert_eq!(sets, vec![BTreeSet::from([PodId(3)])]);
    }

    #[test]
    fn test_two_pod_combination_when_no_single_pod_covers() {
        let sets = pod_sets_for_order(
            &order(&[(1, 2)]),
            &candidates(&[(1, &[1, 2])]),
            &BTreeSet::new(),
            4,
            64,
            &world(),
        );
        assert_eq!(sets, vec![BTreeSet::from([PodId(1), PodId(2)])]);
    }

    #[test]
    fn test_cross_product_across_items() {
        let sets = pod_sets_for_order(
            &order(&[(1, 2), (2, 1)]),
            &candidates(&[(1, &[1, 2, 3]), (2, &[4])]),
            &BTreeSet::new(),
            4,
            64,
            &world(),
        );
        assert_eq!(sets, vec![BTreeSet::from([PodId(3), PodId(4)])]);
    }

    #[test]
    fn test_inbound_pods_excluded_from_sets() {
        let inbound = BTreeSet::from([PodId(3)]);
        let sets = pod_sets_for_order(
            &order(&[(1, 2), (2, 1)]),
            &candidates(&[(1, &[1, 2, 3]), (2, &[4])]),
            &inbound,
            4,
            64,
            &world(),
        );
        // Pod 3 covers item 1 but is already inbound, so only pod 4 remains.
        assert_eq!(sets, vec![BTreeSet::from([PodId(4)])]);
    }

    #[test]
    fn test_robot_bound_rejects_large_sets() {
        let sets = pod_sets_for_order(
            &order(&[(1, 2)]),
            &candidates(&[(1, &[1, 2])]),
            &BTreeSet::new(),
            1,
            64,
            &world(),
        );
        assert!(sets.is_empty());
    }

    #[test]
    fn test_uncoverable_item_yields_nothing() {
        let sets = pod_sets_for_order(
            &order(&[(1, 2), (3, 1)]),
            &candidates(&[(1, &[3])]),
            &BTreeSet::new(),
            4,
            64,
            &world(),
        );
        assert!(sets.is_empty());
    }

    #[test]
    fn test_enumeration_cap() {
        let mut world = Warehouse::new();
        for p in 1..=6 {
            world.add_pod(Pod::new(PodId(p), WaypointId(p)).with_stock(ItemId(1), 1));
        }
        let sets = pod_sets_for_order(
            &order(&[(1, 1)]),
            &candidates(&[(1, &[1, 2, 3, 4, 5, 6])]),
            &BTreeSet::new(),
            6,
            3,
            &world,
        );
        assert_eq!(sets.len(), 3);
    }

    #[test]
    fn test_combinations_enumeration() {
        let pool = [PodId(1), PodId(2), PodId(3)];
        let combos = combinations(&pool, 2);
        assert_eq!(
            combos,
            vec![
                vec![PodId(1), PodId(2)],
                vec![PodId(1), PodId(3)],
                vec![PodId(2), PodId(3)],
            ]
        );
        assert!(combinations(&pool, 4).is_empty());
    }
}
