//! Sorted price→aggregate-quantity index, one per book side.
//!
//! Grounded on the sorted-map pattern the closest released crate in this
//! space uses for its own bid/ask books (a concurrent skip list keyed by
//! price), generalized here to a single-threaded index per §5 — the
//! lock-free property is unused, only the ordered-map API is.

use crossbeam_skiplist::SkipMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Price, Qty, Side};

/// One side's price-level index: price → aggregate resting quantity.
pub struct LevelIndex {
    side: Side,
    levels: SkipMap<Price, AtomicU64>,
}

impl LevelIndex {
    /// Create an empty index for `side`. Ordering of "best" depends on
    /// side: highest price for bids, lowest for asks.
    pub fn new(side: Side) -> Self {
        LevelIndex {
            side,
            levels: SkipMap::new(),
        }
    }

    /// Number of distinct price levels currently resting.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the index has no resting levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Aggregate quantity resting at `price`, or 0 if the level does not
    /// exist.
    pub fn qty_at(&self, price: Price) -> Qty {
        self.levels
            .get(&price)
            .map(|e| e.value().load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Add `qty` to the level at `price`, creating it if absent. Returns
    /// `(new_aggregate, created)`.
    pub fn insert_or_add(&self, price: Price, qty: Qty) -> (Qty, bool) {
        if let Some(entry) = self.levels.get(&price) {
            let new = entry.value().fetch_add(qty, Ordering::Relaxed) + qty;
            (new, false)
        } else {
            self.levels.insert(price, AtomicU64::new(qty));
            (qty, true)
        }
    }

    /// Subtract `qty` from the level at `price`. If the result is zero (or
    /// the level was absent, which is a caller bug per §4.1), the level is
    /// removed. Returns the resulting aggregate (0 if removed/absent).
    pub fn decrement(&self, price: Price, qty: Qty) -> Qty {
        let Some(entry) = self.levels.get(&price) else {
            return 0;
        };
        let prev = entry.value().load(Ordering::Relaxed);
        let new = prev.saturating_sub(qty);
        if new == 0 {
            entry.remove();
            0
        } else {
            entry.value().store(new, Ordering::Relaxed);
            new
        }
    }

    /// Best `(price, qty)` for this side, or `(0, 0)` if empty.
    pub fn best(&self) -> (Price, Qty) {
        let entry = match self.side {
            Side::Bid => self.levels.back(),
            Side::Ask => self.levels.front(),
        };
        entry
            .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
            .unwrap_or((0, 0))
    }

    /// The next level strictly worse than `price` (strictly lower for
    /// bids, strictly higher for asks), used when the current best is
    /// emptied. `None` if there is none.
    pub fn neighbor_toward_worse(&self, price: Price) -> Option<(Price, Qty)> {
        match self.side {
            Side::Bid => self
                .levels
                .range(..price)
                .next_back()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
            Side::Ask => self
                .levels
                .range((std::ops::Bound::Excluded(price), std::ops::Bound::Unbounded))
                .next()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
        }
    }

    /// The next level strictly better than `price` (used by the cage scan
    /// to find the next-innermost hidden candidate once one has been
    /// promoted — mirrors `neighbor_toward_worse` but walking inward).
    pub fn neighbor_toward_better(&self, price: Price) -> Option<(Price, Qty)> {
        match self.side {
            Side::Bid => self
                .levels
                .range((std::ops::Bound::Excluded(price), std::ops::Bound::Unbounded))
                .next()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
            Side::Ask => self
                .levels
                .range(..price)
                .next_back()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
        }
    }

    /// Up to `n` `(price, qty)` pairs starting from the best, walking
    /// toward worse prices — used to build snapshot ladders.
    pub fn traverse_from_best(&self, n: usize) -> Vec<(Price, Qty)> {
        let iter: Box<dyn Iterator<Item = (Price, Qty)>> = match self.side {
            Side::Bid => Box::new(
                self.levels
                    .iter()
                    .rev()
                    .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
            ),
            Side::Ask => Box::new(
                self.levels
                    .iter()
                    .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
            ),
        };
        iter.take(n).collect()
    }

    /// All `(price, qty)` levels, in no particular wire-relevant order —
    /// used only for save/load (P8); `from_parts` restores them.
    pub fn entries(&self) -> Vec<(Price, Qty)> {
        self.levels
            .iter()
            .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Rebuild an index from its saved entries.
    pub fn from_parts(side: Side, entries: Vec<(Price, Qty)>) -> Self {
        let idx = LevelIndex::new(side);
        for (p, q) in entries {
            idx.insert_or_add(p, q);
        }
        idx
    }

    /// All levels strictly worse than `price`, from best-of-the-remainder
    /// outward, up to `n` — used for call-auction post-match ladders
    /// (§4.8: "levels strictly worse than the match price").
    pub fn traverse_strictly_worse_than(&self, price: Price, n: usize) -> Vec<(Price, Qty)> {
        self.traverse_from_best(self.len())
            .into_iter()
            .filter(|&(p, _)| match self.side {
                Side::Bid => p < price,
                Side::Ask => p > price,
            })
            .take(n)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_best_is_max_price() {
        let idx = LevelIndex::new(Side::Bid);
        idx.insert_or_add(1000, 100);
        idx.insert_or_add(1010, 50);
        assert_eq!(idx.best(), (1010, 50));
    }

    #[test]
    fn ask_best_is_min_price() {
        let idx = LevelIndex::new(Side::Ask);
        idx.insert_or_add(1000, 100);
        idx.insert_or_add(990, 50);
        assert_eq!(idx.best(), (990, 50));
    }

    #[test]
    fn decrement_to_zero_removes_level() {
        let idx = LevelIndex::new(Side::Bid);
        idx.insert_or_add(1000, 100);
        assert_eq!(idx.decrement(1000, 100), 0);
        assert!(idx.is_empty());
    }

    #[test]
    fn neighbor_toward_worse_walks_outward() {
        let idx = LevelIndex::new(Side::Bid);
        idx.insert_or_add(1000, 1);
        idx.insert_or_add(990, 1);
        assert_eq!(idx.neighbor_toward_worse(1000), Some((990, 1)));
        let idx = LevelIndex::new(Side::Ask);
        idx.insert_or_add(1000, 1);
        idx.insert_or_add(1010, 1);
        assert_eq!(idx.neighbor_toward_worse(1000), Some((1010, 1)));
    }
}
