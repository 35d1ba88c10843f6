//! ChiNext (GEM) price-cage admission machinery (§4.6).
//!
//! During continuous trading GEM allows orders outside ±2% of a moving
//! reference price, but keeps them hidden — out of the visible level
//! index and out of the weighted totals — until the reference moves
//! enough to admit them.

use std::collections::BTreeMap;

use crate::level::LevelIndex;
use crate::price::{cage_lower, cage_upper};
use crate::types::{Price, Qty, Side, TradingPhaseMarket};
use crate::weighted::WeightedTotals;

/// One side's cage state.
#[derive(Default)]
pub struct CageSide {
    side: Option<Side>,
    /// Reference price the ±2% band is measured around.
    pub ref_px: Price,
    /// Orders hidden by the cage, keyed by price. For the bid cage these
    /// are prices above the band; for the ask cage, below it.
    hidden: BTreeMap<Price, Qty>,
    /// Set when the innermost hidden order would cross the book if
    /// promoted; cleared when the crossing trade arrives (§4.6's
    /// "waiting for cage").
    pub waiting_for_match: bool,
}

impl CageSide {
    /// A fresh, empty cage for `side`.
    pub fn new(side: Side) -> Self {
        CageSide {
            side: Some(side),
            ref_px: 0,
            hidden: BTreeMap::new(),
            waiting_for_match: false,
        }
    }

    fn side(&self) -> Side {
        self.side.expect("CageSide constructed via new()")
    }

    /// Park an order in the hidden set (it was outside the band at
    /// ingestion).
    pub fn hide(&mut self, price: Price, qty: Qty) {
        *self.hidden.entry(price).or_insert(0) += qty;
    }

    /// Remove `qty` from a hidden order (e.g. on cancel/partial-fill while
    /// still hidden). Drops the entry if it reaches zero.
    pub fn unhide_decrement(&mut self, price: Price, qty: Qty) -> Qty {
        let Some(existing) = self.hidden.get_mut(&price) else {
            return 0;
        };
        *existing = existing.saturating_sub(qty);
        let remaining = *existing;
        if remaining == 0 {
            self.hidden.remove(&price);
        }
        remaining
    }

    /// Whether any orders are currently hidden by this side's cage.
    pub fn has_hidden(&self) -> bool {
        !self.hidden.is_empty()
    }

    /// The innermost hidden `(price, qty)` — the one closest to the
    /// visible market — or `None`.
    pub fn innermost_hidden(&self) -> Option<(Price, Qty)> {
        match self.side() {
            Side::Bid => self.hidden.iter().next().map(|(&p, &q)| (p, q)),
            Side::Ask => self.hidden.iter().next_back().map(|(&p, &q)| (p, q)),
        }
    }

    fn remove_innermost(&mut self) -> Option<(Price, Qty)> {
        let key = match self.side() {
            Side::Bid => self.hidden.keys().next().copied(),
            Side::Ask => self.hidden.keys().next_back().copied(),
        }?;
        self.hidden.remove(&key).map(|q| (key, q))
    }

    /// The cage admission boundary for this side's reference.
    fn bound(&self) -> Price {
        match self.side() {
            Side::Bid => cage_upper(self.ref_px),
            Side::Ask => cage_lower(self.ref_px),
        }
    }

    fn within_band(&self, price: Price) -> bool {
        match self.side() {
            Side::Bid => price <= self.bound(),
            Side::Ask => price >= self.bound(),
        }
    }

    /// Whether `price` currently rests in the hidden set (used by the book
    /// to route a cancel/decrement to the cage instead of the visible
    /// level index).
    pub fn contains_price(&self, price: Price) -> bool {
        self.hidden.contains_key(&price)
    }

    /// Snapshot the hidden set for save/load, best-to-worst order.
    pub fn hidden_entries(&self) -> Vec<(Price, Qty)> {
        match self.side() {
            Side::Bid => self.hidden.iter().rev().map(|(&p, &q)| (p, q)).collect(),
            Side::Ask => self.hidden.iter().map(|(&p, &q)| (p, q)).collect(),
        }
    }

    /// Rebuild a cage side from its saved parts.
    pub fn from_parts(side: Side, ref_px: Price, waiting_for_match: bool, hidden: Vec<(Price, Qty)>) -> Self {
        let mut c = CageSide::new(side);
        c.ref_px = ref_px;
        c.waiting_for_match = waiting_for_match;
        for (p, q) in hidden {
            c.hide(p, q);
        }
        c
    }
}

/// Result of a cage admission scan: prices promoted from hidden to
/// visible, in promotion order.
pub type Promotions = Vec<(Price, Qty)>;

/// Run the admission scan for `cage` (one side), promoting hidden orders
/// into `levels`/`weighted` until a fixed point, per §4.6. `opposite_best`
/// is the current best price on the *other* side (what a promoted order
/// would cross against).
pub fn scan(
    cage: &mut CageSide,
    levels: &LevelIndex,
    weighted: &mut WeightedTotals,
    opposite_best: Price,
    opposite_best_qty: Qty,
    phase: TradingPhaseMarket,
) -> Promotions {
    let mut promoted = Vec::new();
    loop {
        let Some((edge_px, edge_qty)) = cage.innermost_hidden() else {
            break;
        };
        if !cage.within_band(edge_px) {
            break;
        }
        let would_cross = match cage.side() {
            Side::Bid => opposite_best_qty > 0 && edge_px >= opposite_best,
            Side::Ask => opposite_best_qty > 0 && edge_px <= opposite_best,
        };
        if would_cross && phase != TradingPhaseMarket::VolatilityBreaking {
            cage.waiting_for_match = true;
            break;
        }
        cage.remove_innermost();
        levels.insert_or_add(edge_px, edge_qty);
        weighted.add(edge_px, edge_qty);
        promoted.push((edge_px, edge_qty));
    }
    promoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_when_reference_moves_inside_band() {
        let mut cage = CageSide::new(Side::Bid);
        cage.ref_px = 1000; // bid_ref = 10.00 -> cage_upper = 10.20
        cage.hide(1030, 100); // hidden bid at 10.30
        let levels = LevelIndex::new(Side::Bid);
        let mut weighted = WeightedTotals::new();

        // still outside band, no promotion
        let promoted = scan(&mut cage, &levels, &mut weighted, 0, 0, TradingPhaseMarket::AMTrading);
        assert!(promoted.is_empty());
        assert!(cage.has_hidden());

        // reference widens enough: best-ask moves to 10.40 -> cage_upper ~= 10.61,
        // and the hidden bid (10.30) still sits below the ask, so it does not cross.
        cage.ref_px = 1040;
        let promoted = scan(&mut cage, &levels, &mut weighted, 1040, 50, TradingPhaseMarket::AMTrading);
        assert_eq!(promoted, vec![(1030, 100)]);
        assert_eq!(levels.best(), (1030, 100));
        assert_eq!(weighted.size, 100);
    }

    #[test]
    fn sets_waiting_when_promotion_would_cross() {
        let mut cage = CageSide::new(Side::Bid);
        cage.ref_px = 2000;
        cage.hide(2010, 10);
        let levels = LevelIndex::new(Side::Bid);
        let mut weighted = WeightedTotals::new();
        // opposite best ask at 2005 is below the hidden bid price -> would cross
        let promoted = scan(&mut cage, &levels, &mut weighted, 2005, 10, TradingPhaseMarket::AMTrading);
        assert!(promoted.is_empty());
        assert!(cage.waiting_for_match);
    }
}
