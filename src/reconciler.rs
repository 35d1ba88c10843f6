//! Snapshot reconciler: matches regenerated snapshots against exchange-
//! published ones by a `NumTrades` fingerprint, with timestamp sanity
//! (§4.9).

use std::collections::BTreeMap;

use crate::error::AxobError;
use crate::messages::Snapshot;
use crate::types::{SourceExchange, TradingPhaseMarket};

/// Two multimaps keyed by `NumTrades`: regenerated snapshots not yet
/// matched, and exchange snapshots not yet matched.
#[derive(Default)]
pub struct Reconciler {
    rebuilt: BTreeMap<u64, Vec<Snapshot>>,
    market: BTreeMap<u64, Vec<Snapshot>>,
}

impl Reconciler {
    /// A fresh reconciler with no pending entries.
    pub fn new() -> Self {
        Reconciler::default()
    }

    /// Whether any exchange snapshot remains unmatched — the basis for
    /// `are_you_ok()`.
    pub fn has_unmatched_market(&self) -> bool {
        self.market.values().any(|v| !v.is_empty())
    }

    /// Total count of unmatched exchange snapshots, for diagnostics.
    pub fn unmatched_market_count(&self) -> usize {
        self.market.values().map(|v| v.len()).sum()
    }

    /// SZSE timestamp-sanity rule: the regenerated timestamp's second may
    /// trail the exchange timestamp's second by at most one. Waived
    /// during breaking phases or when both sides already agree on a
    /// quiescent phase.
    ///
    /// Returns `Err(AxobError::SseTimestampPolicyUndefined)` for SSE
    /// outside the waived cases, per the open question in §9 — this is
    /// deliberately not guessed at.
    pub fn timestamp_sane(
        source: SourceExchange,
        market_snap: &Snapshot,
        rebuilt_snap: &Snapshot,
    ) -> Result<bool, AxobError> {
        let waived_phase = |p: TradingPhaseMarket| {
            matches!(
                p,
                TradingPhaseMarket::PreTradingBreaking
                    | TradingPhaseMarket::Breaking
                    | TradingPhaseMarket::Ending
                    | TradingPhaseMarket::VolatilityBreaking
            )
        };
        if market_snap.trading_phase_market == rebuilt_snap.trading_phase_market
            && waived_phase(market_snap.trading_phase_market)
        {
            return Ok(true);
        }
        match source {
            SourceExchange::Szse => {
                let se_sec = market_snap.transact_time / 1000;
                let ax_sec = rebuilt_snap.transact_time / 1000;
                Ok(ax_sec <= se_sec + 1)
            }
            SourceExchange::Sse => Err(AxobError::SseTimestampPolicyUndefined),
        }
    }

    fn content_equal(a: &Snapshot, b: &Snapshot) -> bool {
        // Compare everything except the wire-level timestamp, which the
        // `timestamp_sane` check validates separately.
        a.security_id == b.security_id
            && a.num_trades == b.num_trades
            && a.total_volume_trade == b.total_volume_trade
            && a.total_value_trade == b.total_value_trade
            && a.open_px == b.open_px
            && a.high_px == b.high_px
            && a.low_px == b.low_px
            && a.last_px == b.last_px
            && a.bid_weight_px == b.bid_weight_px
            && a.bid_weight_size == b.bid_weight_size
            && a.ask_weight_px == b.ask_weight_px
            && a.ask_weight_size == b.ask_weight_size
            && a.ask == b.ask
            && a.bid == b.bid
            && a.trading_phase_market == b.trading_phase_market
            && a.trading_phase_instrument == b.trading_phase_instrument
    }

    /// Ingest a newly-arrived exchange snapshot, per the §4.9 algorithm.
    /// `source` selects the timestamp-sanity rule.
    pub fn on_market_snapshot(&mut self, source: SourceExchange, snap: Snapshot) {
        let nt = snap.num_trades;

        // Fast path: compare against the most recent rebuilt snapshot
        // overall, regardless of trade count.
        if let Some((&last_nt, last_vec)) = self.rebuilt.iter().next_back() {
            if let Some(last) = last_vec.last() {
                if Self::content_equal(last, &snap)
                    && Self::timestamp_sane(source, &snap, last).unwrap_or(false)
                {
                    self.rebuilt.retain(|&k, _| k >= last_nt);
                    return;
                }
            }
        }

        // Scan rebuilt[nt] for an equal snapshot.
        if let Some(bucket) = self.rebuilt.get(&nt) {
            if let Some(pos) = bucket
                .iter()
                .position(|r| Self::content_equal(r, &snap) && Self::timestamp_sane(source, &snap, r).unwrap_or(false))
            {
                self.rebuilt.retain(|&k, _| k >= nt);
                if let Some(bucket) = self.rebuilt.get_mut(&nt) {
                    bucket.remove(pos);
                }
                return;
            }
        }

        // Otherwise park it.
        tracing::warn!(security_id = snap.security_id, num_trades = nt, "unmatched market snapshot parked");
        self.market.entry(nt).or_default().push(snap);
    }

    /// Ingest a newly-regenerated snapshot, per the symmetric §4.9
    /// algorithm.
    pub fn on_rebuilt_snapshot(&mut self, source: SourceExchange, snap: Snapshot) {
        let nt = snap.num_trades;
        if let Some(bucket) = self.market.get_mut(&nt) {
            bucket.retain(|m| !(Self::content_equal(m, &snap) && Self::timestamp_sane(source, m, &snap).unwrap_or(false)));
            if bucket.is_empty() {
                self.market.remove(&nt);
            }
        }
        self.rebuilt.entry(nt).or_default().push(snap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradingPhaseInstrument;

    fn snap(nt: u64, px: u32, transact_time: u64, phase: TradingPhaseMarket) -> Snapshot {
        Snapshot {
            source: SourceExchange::Szse,
            security_id: 1,
            channel_no: 1,
            transact_time,
            prev_close_px: 1000,
            up_limit_px: 1100,
            dn_limit_px: 900,
            num_trades: nt,
            total_volume_trade: 0,
            total_value_trade: 0,
            open_px: 0,
            high_px: 0,
            low_px: 0,
            last_px: px,
            bid_weight_px: 0,
            bid_weight_size: 0,
            ask_weight_px: 0,
            ask_weight_size: 0,
            ask: vec![],
            bid: vec![],
            trading_phase_market: phase,
            trading_phase_instrument: TradingPhaseInstrument::Normal,
        }
    }

    #[test]
    fn matching_snapshot_clears_backlog() {
        let mut r = Reconciler::new();
        r.on_rebuilt_snapshot(SourceExchange::Szse, snap(1, 1000, 1000, TradingPhaseMarket::AMTrading));
        assert!(!r.has_unmatched_market());
        r.on_market_snapshot(SourceExchange::Szse, snap(1, 1000, 1000, TradingPhaseMarket::AMTrading));
        assert!(!r.has_unmatched_market());
    }

    #[test]
    fn mismatched_snapshot_is_parked() {
        let mut r = Reconciler::new();
        r.on_market_snapshot(SourceExchange::Szse, snap(1, 1000, 1000, TradingPhaseMarket::AMTrading));
        assert!(r.has_unmatched_market());
    }
}
