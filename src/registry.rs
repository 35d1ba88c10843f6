//! Order registry: `ApplSeqNum` → live resting order, plus the illegal-
//! order set for GEM IPO-week call auctions (§4.2, §4.5).

use std::collections::{HashMap, HashSet};

use crate::types::{ApplSeqNum, OrdType, Price, Qty, Side};

/// A live resting order, as kept in the registry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RestingOrder {
    /// Exchange sequence number identifying this order.
    pub appl_seq_num: ApplSeqNum,
    /// Side of the book.
    pub side: Side,
    /// Order type as decoded (already collapsed per §4.3's ingestion
    /// rewrite: `SelfSideOptimal` never reaches the registry as itself).
    pub ord_type: OrdType,
    /// Resting price. For a market order this is only meaningful once the
    /// first matching execution sets it.
    pub price: Price,
    /// Remaining resting quantity.
    pub qty: Qty,
    /// Engine-internal timestamp at last mutation.
    pub transact_time: u64,
    /// SSE order number. `None` on SZSE, where cancels are correlated by
    /// `ApplSeqNum` instead (`is_sse_delete` orders are the only ones that
    /// need this).
    pub order_no: Option<u64>,
}

/// Keyed store of live resting orders for one instrument.
#[derive(Default)]
pub struct Registry {
    orders: HashMap<ApplSeqNum, RestingOrder>,
    illegal: HashSet<ApplSeqNum>,
    by_order_no: HashMap<u64, ApplSeqNum>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Insert or replace a resting order.
    pub fn insert(&mut self, order: RestingOrder) {
        if let Some(no) = order.order_no {
            self.by_order_no.insert(no, order.appl_seq_num);
        }
        self.orders.insert(order.appl_seq_num, order);
    }

    /// Look up a resting order by sequence number.
    pub fn get(&self, seq: ApplSeqNum) -> Option<&RestingOrder> {
        self.orders.get(&seq)
    }

    /// Mutable lookup, for in-place quantity decrements.
    pub fn get_mut(&mut self, seq: ApplSeqNum) -> Option<&mut RestingOrder> {
        self.orders.get_mut(&seq)
    }

    /// Resolve an SSE `OrderNo` to the `ApplSeqNum` it was registered
    /// under (SSE deletes carry `OrderNo`, not `ApplSeqNum`).
    pub fn find_by_order_no(&self, order_no: u64) -> Option<ApplSeqNum> {
        self.by_order_no.get(&order_no).copied()
    }

    /// Remove a resting order (full fill or cancel).
    pub fn remove(&mut self, seq: ApplSeqNum) -> Option<RestingOrder> {
        let order = self.orders.remove(&seq)?;
        if let Some(no) = order.order_no {
            self.by_order_no.remove(&no);
        }
        Some(order)
    }

    /// Whether `seq` currently rests in the registry.
    pub fn contains(&self, seq: ApplSeqNum) -> bool {
        self.orders.contains_key(&seq)
    }

    /// Number of live resting orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the registry holds no live orders.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Σ qty over all live orders on `side` — used by property test P1.
    pub fn total_qty(&self, side: Side) -> Qty {
        self.orders
            .values()
            .filter(|o| o.side == side)
            .map(|o| o.qty)
            .sum()
    }

    /// Record `seq` as illegal (GEM IPO-week discard, §4.5).
    pub fn mark_illegal(&mut self, seq: ApplSeqNum) {
        self.illegal.insert(seq);
    }

    /// Whether `seq` was discarded as illegal rather than inserted.
    pub fn is_illegal(&self, seq: ApplSeqNum) -> bool {
        self.illegal.contains(&seq)
    }
}

impl Registry {
    /// Iterate live resting orders (used by save/load, P8).
    pub fn orders(&self) -> impl Iterator<Item = &RestingOrder> {
        self.orders.values()
    }

    /// Iterate the illegal-order set (used by save/load, P8).
    pub fn illegal(&self) -> impl Iterator<Item = &ApplSeqNum> {
        self.illegal.iter()
    }

    /// Rebuild a registry from its saved parts.
    pub fn from_parts(orders: Vec<RestingOrder>, illegal: Vec<ApplSeqNum>) -> Self {
        let mut r = Registry::new();
        for o in orders {
            r.insert(o);
        }
        for seq in illegal {
            r.mark_illegal(seq);
        }
        r
    }
}
