//! Session multiplexer (§4.10): owns one [`Axob`] per instrument, tracks
//! each wire channel's nominal phase, and synthesizes a
//! [`PhaseSignal`](crate::messages::PhaseSignal) broadcast the first time a
//! channel's member messages qualify for the next phase in the linear
//! state machine.
//!
//! `transact_time` throughout this module is read as milliseconds since
//! local midnight, matching the wire clock the trigger thresholds below
//! are stated against.

use std::collections::HashMap;

use crate::book::Axob;
use crate::config::{EngineConfig, InstrumentConfig};
use crate::error::AxobError;
use crate::messages::{Msg, PhaseSignal, Snapshot};
use crate::types::{SourceExchange, TradingPhaseMarket};

const MS_09_15_00: u64 = 33_300_000;
const MS_09_25_15: u64 = 33_915_000;
const MS_09_30_00: u64 = 34_200_000;
const MS_11_30_15: u64 = 41_415_000;
const MS_13_00_00: u64 = 46_800_000;
const MS_14_57_15: u64 = 53_835_000;
const MS_15_00_15: u64 = 54_015_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MsgKind {
    Order,
    Exec,
    Snapshot,
    Status,
}

struct ChannelRecord {
    phase: TradingPhaseMarket,
    members: Vec<u32>,
}

/// Owns a set of per-symbol [`Axob`] engines, keyed by `SecurityID`, and
/// the per-channel phase state that drives synthetic transition signals.
pub struct Mu {
    config: EngineConfig,
    books: HashMap<u32, Axob>,
    channel_of: HashMap<u32, u32>,
    channels: HashMap<u32, ChannelRecord>,
    order_map_max: usize,
    level_tree_max: usize,
}

impl Mu {
    /// A fresh multiplexer with no registered instruments.
    pub fn new(config: EngineConfig) -> Self {
        Mu {
            config,
            books: HashMap::new(),
            channel_of: HashMap::new(),
            channels: HashMap::new(),
            order_map_max: 0,
            level_tree_max: 0,
        }
    }

    /// Register an instrument and the order/exec channel it trades on
    /// (for SSE, its single session channel). Must be called before any
    /// message addressed to `instrument.security_id` is fed to `on_msg`.
    pub fn register(&mut self, instrument: InstrumentConfig, order_exec_channel_no: u32) {
        self.channel_of.insert(instrument.security_id, order_exec_channel_no);
        self.channels
            .entry(order_exec_channel_no)
            .or_insert_with(|| ChannelRecord {
                phase: TradingPhaseMarket::Starting,
                members: Vec::new(),
            })
            .members
            .push(instrument.security_id);
        self.books.insert(instrument.security_id, Axob::new(self.config, instrument));
    }

    /// Per-exchange channel-id convention: SZSE's snapshot channel is the
    /// order/exec channel plus 1000; SSE carries everything on one
    /// channel, so the snapshot's own `ChannelNo` already is it.
    fn normalize_channel(source: SourceExchange, msg_channel_no: u32, is_snapshot: bool) -> u32 {
        match source {
            SourceExchange::Szse if is_snapshot => msg_channel_no.saturating_sub(1000),
            _ => msg_channel_no,
        }
    }

    /// Whether every owned instrument agrees with the exchange — false
    /// iff some instrument whose phase has gone quiescent (§7) still has
    /// an unmatched exchange snapshot parked. Delegates the freeze gate
    /// to each `Axob`, which tracks its own phase directly.
    pub fn are_you_ok(&self) -> bool {
        self.books.values().all(|b| b.are_you_ok())
    }

    /// Peak order-registry size observed across any single instrument.
    pub fn order_map_max(&self) -> usize {
        self.order_map_max
    }

    /// Peak combined level-tree size (both sides) observed across any
    /// single instrument.
    pub fn level_tree_max(&self) -> usize {
        self.level_tree_max
    }

    /// Borrow a registered instrument's engine, if any.
    pub fn book(&self, security_id: u32) -> Option<&Axob> {
        self.books.get(&security_id)
    }

    /// Route one inbound message, returning the snapshots its target
    /// instrument emitted.
    pub fn on_msg(&mut self, msg: Msg) -> Result<Vec<Snapshot>, AxobError> {
        let out = match msg {
            Msg::Status(s) => {
                let chan = Self::normalize_channel(s.source, s.channel_no, false);
                self.advance_channel(chan, MsgKind::Status, Some(s.trading_phase_market), 0);
                let members = self.channels.get(&chan).map(|c| c.members.clone()).unwrap_or_default();
                let mut out = Vec::new();
                for sid in members {
                    if let Some(book) = self.books.get_mut(&sid) {
                        out.extend(book.on_msg(Msg::Status(s.clone()))?);
                    }
                }
                out
            }
            Msg::Snapshot(s) => {
                let chan = Self::normalize_channel(s.source, s.channel_no, true);
                self.check_channel(s.security_id, s.channel_no, chan)?;
                self.advance_channel(chan, MsgKind::Snapshot, Some(s.trading_phase_market), s.transact_time);
                let sid = s.security_id;
                let snaps = self.route(sid, Msg::Snapshot(s))?;
                for snap in &snaps {
                    if let Some(book) = self.books.get_mut(&sid) {
                        book.record_own_snapshot(snap.clone());
                    }
                }
                snaps
            }
            Msg::Order(o) => {
                let chan = Self::normalize_channel(o.source, o.channel_no, false);
                self.check_channel(o.security_id, o.channel_no, chan)?;
                self.advance_channel(chan, MsgKind::Order, Some(o.trading_phase_market), o.transact_time);
                let sid = o.security_id;
                self.route(sid, Msg::Order(o))?
            }
            Msg::Exec(e) => {
                let chan = Self::normalize_channel(e.source, e.channel_no, false);
                self.check_channel(e.security_id, e.channel_no, chan)?;
                self.advance_channel(chan, MsgKind::Exec, Some(e.trading_phase_market), e.transact_time);
                let sid = e.security_id;
                self.route(sid, Msg::Exec(e))?
            }
            Msg::PhaseSignal(_) => Vec::new(),
        };
        self.update_stats();
        Ok(out)
    }

    /// Validate an inbound message's (already-normalized) channel against
    /// the one its instrument was registered under. Unregistered
    /// instruments are left to `route`'s own drop-and-warn path, not
    /// flagged here.
    fn check_channel(&self, security_id: u32, raw_channel_no: u32, normalized: u32) -> Result<(), AxobError> {
        match self.channel_of.get(&security_id) {
            Some(&expected) if expected != normalized => Err(AxobError::ChannelMismatch {
                symbol: security_id,
                got: raw_channel_no,
                expected,
            }),
            _ => Ok(()),
        }
    }

    fn route(&mut self, security_id: u32, msg: Msg) -> Result<Vec<Snapshot>, AxobError> {
        let Some(book) = self.books.get_mut(&security_id) else {
            tracing::warn!(security_id, "message for unregistered instrument dropped");
            return Ok(Vec::new());
        };
        book.on_msg(msg)
    }

    fn update_stats(&mut self) {
        for book in self.books.values() {
            self.order_map_max = self.order_map_max.max(book.order_count());
            self.level_tree_max = self.level_tree_max.max(book.level_count());
        }
    }

    /// Check the channel's current phase against the linear trigger
    /// table and, on a qualifying transition, advance it and broadcast a
    /// [`PhaseSignal`] to every member instrument ahead of the message
    /// that triggered it.
    fn advance_channel(
        &mut self,
        chan: u32,
        kind: MsgKind,
        carried_phase: Option<TradingPhaseMarket>,
        ts: u64,
    ) {
        let current = self
            .channels
            .entry(chan)
            .or_insert_with(|| ChannelRecord {
                phase: TradingPhaseMarket::Starting,
                members: Vec::new(),
            })
            .phase;

        let Some((next, signal)) = trigger(current, kind, carried_phase, ts) else {
            return;
        };

        if let Some(record) = self.channels.get_mut(&chan) {
            record.phase = next;
        }
        let members = self.channels.get(&chan).map(|c| c.members.clone()).unwrap_or_default();
        tracing::info!(channel = chan, from = ?current, to = ?next, "channel phase transition");
        for sid in members {
            if let Some(book) = self.books.get_mut(&sid) {
                // PhaseSignal never produces a snapshot; errors are not
                // possible along that path either, see `Axob::on_msg`.
                let _ = book.on_msg(Msg::PhaseSignal(signal));
            }
        }
    }
}

/// The linear channel phase table (§4.10). Returns the next phase and
/// the signal to broadcast, if this message qualifies as the first one
/// triggering that transition.
fn trigger(
    current: TradingPhaseMarket,
    kind: MsgKind,
    carried_phase: Option<TradingPhaseMarket>,
    ts: u64,
) -> Option<(TradingPhaseMarket, PhaseSignal)> {
    use TradingPhaseMarket::*;

    let is_order_or_exec = matches!(kind, MsgKind::Order | MsgKind::Exec);
    let snap_at_or_after = |threshold: u64| kind == MsgKind::Snapshot && ts >= threshold;
    let carries = |p: TradingPhaseMarket| carried_phase == Some(p);

    match current {
        Starting if is_order_or_exec || snap_at_or_after(MS_09_15_00) => {
            Some((OpenCall, PhaseSignal::OpenCallBegin))
        }
        OpenCall
            if (kind == MsgKind::Exec && carries(PreTradingBreaking)) || snap_at_or_after(MS_09_25_15) =>
        {
            Some((PreTradingBreaking, PhaseSignal::OpenCallEnd))
        }
        PreTradingBreaking
            if (is_order_or_exec && carries(AMTrading)) || snap_at_or_after(MS_09_30_00) =>
        {
            Some((AMTrading, PhaseSignal::AmTradingBegin))
        }
        AMTrading if snap_at_or_after(MS_11_30_15) => Some((Breaking, PhaseSignal::AmTradingEnd)),
        Breaking if is_order_or_exec || snap_at_or_after(MS_13_00_00) => {
            Some((PMTrading, PhaseSignal::PmTradingBegin))
        }
        PMTrading
            if (is_order_or_exec && carries(CloseCall)) || snap_at_or_after(MS_14_57_15) =>
        {
            Some((CloseCall, PhaseSignal::PmTradingEnd))
        }
        CloseCall if (kind == MsgKind::Exec && carries(Ending)) || snap_at_or_after(MS_15_00_15) => {
            Some((Ending, PhaseSignal::AllEnd))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstrumentType;

    fn instrument(security_id: u32) -> InstrumentConfig {
        InstrumentConfig {
            security_id,
            source: SourceExchange::Szse,
            instrument_type: InstrumentType::Stock,
        }
    }

    #[test]
    fn channel_advances_on_first_qualifying_order() {
        assert_eq!(
            trigger(TradingPhaseMarket::Starting, MsgKind::Order, None, 0),
            Some((TradingPhaseMarket::OpenCall, PhaseSignal::OpenCallBegin))
        );
        assert_eq!(
            trigger(TradingPhaseMarket::Starting, MsgKind::Snapshot, None, MS_09_15_00),
            Some((TradingPhaseMarket::OpenCall, PhaseSignal::OpenCallBegin))
        );
        assert_eq!(
            trigger(TradingPhaseMarket::Starting, MsgKind::Snapshot, None, MS_09_15_00 - 1),
            None
        );
    }

    #[test]
    fn registering_instrument_creates_its_book() {
        let mut mu = Mu::new(EngineConfig::default());
        mu.register(instrument(1), 1011);
        assert!(mu.book(1).is_some());
        assert!(mu.are_you_ok());
    }
}
