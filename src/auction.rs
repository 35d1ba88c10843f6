//! Call-auction indicative match algorithm (§4.8).
//!
//! Marches the sorted bid (high-to-low) and ask (low-to-high) ladders,
//! consuming the smaller side's remaining quantity at each step, until the
//! bid price no longer meets or exceeds the ask price. The last price at
//! which quantity was actually consumed is the indicative match.

use crate::types::{Price, Qty};

/// Outcome of running the indicative-match march.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The indicative match price, if bid and ask crossed at all.
    pub price: Option<Price>,
    /// Index into `bids` of the (possibly partially-consumed) level the
    /// march stopped at.
    pub bid_index: usize,
    /// Remaining quantity at `bids[bid_index]` after the march.
    pub bid_remaining: Qty,
    /// Index into `asks` of the level the march stopped at.
    pub ask_index: usize,
    /// Remaining quantity at `asks[ask_index]` after the march.
    pub ask_remaining: Qty,
}

/// Run the march. `bids` must be sorted high-to-low, `asks` low-to-high.
pub fn indicative_match(bids: &[(Price, Qty)], asks: &[(Price, Qty)]) -> MatchResult {
    let mut bid_idx = 0usize;
    let mut ask_idx = 0usize;
    let mut bid_remaining = bids.first().map(|&(_, q)| q).unwrap_or(0);
    let mut ask_remaining = asks.first().map(|&(_, q)| q).unwrap_or(0);
    let mut last_price: Option<Price> = None;

    while bid_idx < bids.len() && ask_idx < asks.len() {
        let bid_price = bids[bid_idx].0;
        let ask_price = asks[ask_idx].0;
        if bid_price < ask_price {
            break;
        }
        last_price = Some(bid_price);
        let consumed = bid_remaining.min(ask_remaining);
        bid_remaining -= consumed;
        ask_remaining -= consumed;
        if bid_remaining == 0 {
            bid_idx += 1;
            if bid_idx < bids.len() {
                bid_remaining = bids[bid_idx].1;
            }
        }
        if ask_remaining == 0 {
            ask_idx += 1;
            if ask_idx < asks.len() {
                ask_remaining = asks[ask_idx].1;
            }
        }
    }

    MatchResult {
        price: last_price,
        bid_index: bid_idx,
        bid_remaining,
        ask_index: ask_idx,
        ask_remaining,
    }
}

/// Tie-break per §4.8: when bid and ask ladders exhaust at exactly the
/// same cumulative quantity (`indicative_match` found no crossing price at
/// all — `result.price.is_none()`), pick between the best remaining bid
/// and ask using the reference price (prev-close before the first trade,
/// else last traded price).
pub fn tie_break(best_bid: Price, best_ask: Price, reference: Price) -> Price {
    if best_bid >= reference && reference >= best_ask {
        reference
    } else {
        let bid_dist = (best_bid as i64 - reference as i64).unsigned_abs();
        let ask_dist = (best_ask as i64 - reference as i64).unsigned_abs();
        if bid_dist <= ask_dist {
            best_bid
        } else {
            best_ask
        }
    }
}

/// Post-match ladders: the (possibly partially-filled) level the march
/// stopped on, followed by whatever levels remain unconsumed, up to `n`
/// each.
pub fn post_match_ladders(
    bids: &[(Price, Qty)],
    asks: &[(Price, Qty)],
    result: &MatchResult,
    n: usize,
) -> (Vec<(Price, Qty)>, Vec<(Price, Qty)>) {
    let bid_ladder = remaining_ladder(bids, result.bid_index, result.bid_remaining, n);
    let ask_ladder = remaining_ladder(asks, result.ask_index, result.ask_remaining, n);
    (bid_ladder, ask_ladder)
}

fn remaining_ladder(
    levels: &[(Price, Qty)],
    start_index: usize,
    start_remaining: Qty,
    n: usize,
) -> Vec<(Price, Qty)> {
    let mut out = Vec::with_capacity(n);
    if start_index < levels.len() && start_remaining > 0 {
        out.push((levels[start_index].0, start_remaining));
    }
    let next = if start_remaining > 0 {
        start_index + 1
    } else {
        start_index
    };
    for &(p, q) in levels.iter().skip(next) {
        if out.len() >= n {
            break;
        }
        out.push((p, q));
    }
    out.truncate(n);
    out
}
