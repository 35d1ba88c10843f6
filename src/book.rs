//! The single-instrument reconstruction engine (§4): ingests orders,
//! executions and exchange snapshots for one `SecurityID` and emits
//! regenerated snapshots under the same policy the exchange itself uses.

use serde::{Deserialize, Serialize};

use crate::auction::{self, MatchResult};
use crate::cage::{self, CageSide};
use crate::config::InstrumentConfig;
use crate::error::AxobError;
use crate::holding::Holding;
use crate::level::LevelIndex;
use crate::messages::{ExecMsg, Msg, OrderMsg, Snapshot, StatusMsg};
use crate::price;
use crate::reconciler::Reconciler;
use crate::registry::{Registry, RestingOrder};
use crate::types::{
    ApplSeqNum, InstrumentType, MarketSubtype, OrdType, Price, Qty, Side, SourceExchange,
    TradingPhaseInstrument, TradingPhaseMarket,
};
use crate::weighted::WeightedTotals;

/// Static per-session constants, seeded once from the first `Starting`
/// snapshot (§6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Constants {
    prev_close_px: Price,
    up_limit_px: Price,
    dn_limit_px: Price,
    channel_no: u32,
}

/// A single instrument's reconstructed order book and session state.
pub struct Axob {
    config: crate::config::EngineConfig,
    instrument: InstrumentConfig,
    subtype: MarketSubtype,

    constants: Option<Constants>,

    phase: TradingPhaseMarket,
    phase_instrument: TradingPhaseInstrument,

    last_appl_seq_num: ApplSeqNum,
    clock: u64,

    registry: Registry,
    bid_levels: LevelIndex,
    ask_levels: LevelIndex,
    bid_weighted: WeightedTotals,
    ask_weighted: WeightedTotals,

    bid_cage: Option<CageSide>,
    ask_cage: Option<CageSide>,

    holding: Holding,
    reconciler: Reconciler,

    num_trades: u64,
    total_volume_trade: Qty,
    total_value_trade: u128,
    open_px: Price,
    high_px: Price,
    low_px: Price,
    last_px: Price,
}

impl Axob {
    /// A fresh engine for `instrument`, with no book state until the first
    /// `Starting` snapshot seeds the session constants.
    pub fn new(config: crate::config::EngineConfig, instrument: InstrumentConfig) -> Self {
        let subtype = MarketSubtype::classify(instrument.source, instrument.security_id);
        Axob {
            config,
            instrument,
            subtype,
            constants: None,
            phase: TradingPhaseMarket::Starting,
            phase_instrument: TradingPhaseInstrument::Normal,
            last_appl_seq_num: 0,
            clock: 0,
            registry: Registry::new(),
            bid_levels: LevelIndex::new(Side::Bid),
            ask_levels: LevelIndex::new(Side::Ask),
            bid_weighted: WeightedTotals::new(),
            ask_weighted: WeightedTotals::new(),
            bid_cage: None,
            ask_cage: None,
            holding: Holding::default(),
            reconciler: Reconciler::new(),
            num_trades: 0,
            total_volume_trade: 0,
            total_value_trade: 0,
            open_px: 0,
            high_px: 0,
            low_px: 0,
            last_px: 0,
        }
    }

    /// Instrument identity this engine was constructed for.
    pub fn instrument(&self) -> InstrumentConfig {
        self.instrument
    }

    /// Current market-wide phase.
    pub fn phase(&self) -> TradingPhaseMarket {
        self.phase
    }

    /// Whether all exchange-published snapshots received so far have been
    /// matched by a regenerated one — the book's self-check. A backlog is
    /// only a failure once this instrument's phase has gone quiescent
    /// (§7): during active trading a transient reconciliation lag is
    /// routine, not a fault.
    pub fn are_you_ok(&self) -> bool {
        !(self.phase.is_quiescent() && self.reconciler.has_unmatched_market())
    }

    /// Number of live resting orders — feeds the multiplexer's
    /// `order_map_max` statistic.
    pub fn order_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of distinct resting price levels across both sides — feeds
    /// the multiplexer's `level_tree_max` statistic.
    pub fn level_count(&self) -> usize {
        self.bid_levels.len() + self.ask_levels.len()
    }

    /// Best `(price, qty)` on `side`'s visible level index, `(0, 0)` if
    /// empty — exposed for property tests (P2, P4).
    pub fn best(&self, side: Side) -> (Price, Qty) {
        match side {
            Side::Bid => self.bid_levels.best(),
            Side::Ask => self.ask_levels.best(),
        }
    }

    /// Σ qty over live registry orders on `side` — exposed for P1.
    pub fn registry_qty(&self, side: Side) -> Qty {
        self.registry.total_qty(side)
    }

    /// Σ qty over `side`'s visible levels — exposed for P1.
    pub fn visible_level_qty(&self, side: Side) -> Qty {
        match side {
            Side::Bid => self.bid_levels.entries().iter().map(|&(_, q)| q).sum(),
            Side::Ask => self.ask_levels.entries().iter().map(|&(_, q)| q).sum(),
        }
    }

    /// Σ qty hidden by `side`'s cage (0 if not GEM or nothing hidden) —
    /// exposed so P1 can reconcile registry qty against visible + hidden.
    pub fn hidden_qty(&self, side: Side) -> Qty {
        let cage = match side {
            Side::Bid => self.bid_cage.as_ref(),
            Side::Ask => self.ask_cage.as_ref(),
        };
        cage.map(|c| c.hidden_entries().iter().map(|&(_, q)| q).sum()).unwrap_or(0)
    }

    /// `(size, value)` weighted totals for `side` — exposed for P3.
    pub fn weighted_totals(&self, side: Side) -> (Qty, i128) {
        match side {
            Side::Bid => (self.bid_weighted.size, self.bid_weighted.value),
            Side::Ask => (self.ask_weighted.size, self.ask_weighted.value),
        }
    }

    /// Whether the holding slot currently defers an order — exposed for
    /// P6 (it is statically at most one by construction; this lets a
    /// test observe the slot's occupancy across a message sequence).
    pub fn is_holding(&self) -> bool {
        self.holding.is_holding()
    }

    /// Process one message, returning the 0, 1 or 2 snapshots it produces
    /// (2 when a held order is flushed ahead of the message's own
    /// snapshot, §4.3).
    pub fn on_msg(&mut self, msg: Msg) -> Result<Vec<Snapshot>, AxobError> {
        match msg {
            Msg::Status(s) => {
                self.on_status(s);
                Ok(vec![])
            }
            Msg::PhaseSignal(_) => Ok(vec![]),
            Msg::Snapshot(s) => self.on_exchange_snapshot(s),
            Msg::Order(o) => self.on_order(o),
            Msg::Exec(e) => self.on_exec(e),
        }
    }

    fn on_status(&mut self, s: StatusMsg) {
        self.apply_phase(s.trading_phase_market, false);
    }

    /// Apply a phase carried on an inbound message. `may_exit_vb` is true
    /// only for `Order`/`Exec` messages: a snapshot or status message must
    /// never override an active `VolatilityBreaking` halt (§4.3/§9).
    fn apply_phase(&mut self, phase: TradingPhaseMarket, may_exit_vb: bool) {
        if self.phase == TradingPhaseMarket::VolatilityBreaking && !may_exit_vb {
            return;
        }
        self.phase = phase;
    }

    fn on_exchange_snapshot(&mut self, snap: Snapshot) -> Result<Vec<Snapshot>, AxobError> {
        if self.constants.is_none() && snap.trading_phase_market == TradingPhaseMarket::Starting {
            self.seed_constants(&snap);
        }
        self.apply_phase(snap.trading_phase_market, false);
        self.reconciler.on_market_snapshot(self.instrument.source, snap);
        Ok(vec![])
    }

    fn seed_constants(&mut self, snap: &Snapshot) {
        self.constants = Some(Constants {
            prev_close_px: snap.prev_close_px,
            up_limit_px: snap.up_limit_px,
            dn_limit_px: snap.dn_limit_px,
            channel_no: snap.channel_no,
        });
        if self.subtype.is_gem() {
            self.bid_cage = Some(CageSide::new(Side::Bid));
            self.ask_cage = Some(CageSide::new(Side::Ask));
        }
    }

    fn require_constants(&self) -> Result<(), AxobError> {
        if self.constants.is_none() {
            return Err(AxobError::ConstantsNotSeeded {
                symbol: self.instrument.security_id,
            });
        }
        Ok(())
    }

    /// Check the exchange sequence number strictly increases. A regression
    /// is a routine feed hiccup (duplicate/out-of-order packet), not a
    /// fatal condition: §7 calls for logging and dropping the message, not
    /// aborting the replay. Returns whether the caller should proceed.
    fn check_seqnum(&mut self, seq: ApplSeqNum) -> bool {
        if self.last_appl_seq_num != 0 && seq <= self.last_appl_seq_num {
            tracing::error!(
                symbol = self.instrument.security_id,
                got = seq,
                last = self.last_appl_seq_num,
                "seqnum regression, dropping message"
            );
            return false;
        }
        self.last_appl_seq_num = seq;
        true
    }

    /// Resolve an SSE delete's target `ApplSeqNum` via its `OrderNo` (SSE
    /// deletes do not carry the original order's `ApplSeqNum`, unlike an
    /// SZSE exec-cancel). Checks the holding slot first since a held order
    /// was never inserted into the registry.
    fn resolve_delete_target(&self, order_no: Option<u64>) -> Option<ApplSeqNum> {
        let order_no = order_no?;
        if let Some(held) = self.holding.peek() {
            if held.order_no == Some(order_no) {
                return Some(held.appl_seq_num);
            }
        }
        self.registry.find_by_order_no(order_no)
    }

    // -- order ingestion (§4.3) ------------------------------------------

    fn on_order(&mut self, o: OrderMsg) -> Result<Vec<Snapshot>, AxobError> {
        self.require_constants()?;
        if !self.check_seqnum(o.appl_seq_num) {
            return Ok(Vec::new());
        }
        self.clock = o.transact_time;
        self.apply_phase(o.trading_phase_market, true);

        if o.is_sse_delete {
            let mut out = Vec::new();
            let Some(seq) = self.resolve_delete_target(o.order_no) else {
                return Err(AxobError::UnknownCancelTarget {
                    symbol: self.instrument.security_id,
                    seq: 0,
                    side: o.side,
                });
            };
            if self.holding.peek().map(|h| h.appl_seq_num) == Some(seq) {
                self.holding.take();
                out.push(self.build_snapshot()?);
            } else {
                if let Some(s) = self.flush_holding_unconditionally()? {
                    out.push(s);
                }
                if let Some(s) = self.apply_cancel(seq, o.side)? {
                    out.push(s);
                }
            }
            return Ok(out);
        }

        let mut out = Vec::new();
        if let Some(s) = self.flush_holding_unconditionally()? {
            out.push(s);
        }

        let price = self.resolve_order_price(&o);
        let order = RestingOrder {
            appl_seq_num: o.appl_seq_num,
            side: o.side,
            ord_type: match o.ord_type {
                OrdType::SelfSideOptimal => OrdType::Limit,
                t => t,
            },
            price,
            qty: o.qty,
            transact_time: o.transact_time,
            order_no: o.order_no,
        };

        match self.phase {
            TradingPhaseMarket::OpenCall | TradingPhaseMarket::CloseCall => {
                if self.gem_discard_call_auction(&order) {
                    self.registry.mark_illegal(order.appl_seq_num);
                } else {
                    self.insert_resting(order);
                }
                out.push(self.build_snapshot()?);
            }
            TradingPhaseMarket::AMTrading | TradingPhaseMarket::PMTrading => {
                self.update_cage_refs();
                if order.ord_type == OrdType::Market {
                    self.holding.hold(order);
                } else if self.outside_cage(&order) {
                    self.hide_in_cage(order);
                    out.push(self.build_snapshot()?);
                } else if self.would_cross(&order) {
                    self.holding.hold(order);
                } else {
                    self.insert_resting(order);
                    self.run_cage_scan();
                    out.push(self.build_snapshot()?);
                }
            }
            _ => {
                self.insert_resting(order);
                out.push(self.build_snapshot()?);
            }
        }
        Ok(out)
    }

    fn resolve_order_price(&self, o: &OrderMsg) -> Price {
        match o.ord_type {
            OrdType::SelfSideOptimal => {
                let (best_px, best_qty) = match o.side {
                    Side::Bid => self.bid_levels.best(),
                    Side::Ask => self.ask_levels.best(),
                };
                if best_qty > 0 {
                    best_px
                } else {
                    match (o.side, &self.constants) {
                        (Side::Bid, Some(c)) => c.dn_limit_px,
                        (Side::Ask, Some(c)) => c.up_limit_px,
                        _ => o.price,
                    }
                }
            }
            _ => o.price,
        }
    }

    fn gem_discard_call_auction(&self, order: &RestingOrder) -> bool {
        if !self.subtype.is_gem() {
            return false;
        }
        let Some(c) = self.constants else { return false };
        if c.up_limit_px != crate::types::PRICE_OVERFLOW {
            // Up-limit is seeded (IPO week already over): ordinary daily
            // limits apply and are enforced upstream, not here.
            return false;
        }
        match self.phase {
            TradingPhaseMarket::OpenCall => {
                order.side == Side::Bid && order.price > c.prev_close_px.saturating_mul(9)
            }
            TradingPhaseMarket::CloseCall => {
                let reference = if self.last_px > 0 { self.last_px } else { c.prev_close_px };
                order.price > price::match_upper(reference) || order.price < price::match_lower(reference)
            }
            _ => false,
        }
    }

    // -- execution ingestion (§4.4, §4.7) ---------------------------------

    fn on_exec(&mut self, e: ExecMsg) -> Result<Vec<Snapshot>, AxobError> {
        self.require_constants()?;
        if !self.check_seqnum(e.appl_seq_num) {
            return Ok(Vec::new());
        }
        self.clock = e.transact_time;
        self.apply_phase(e.trading_phase_market, true);

        if e.is_cancel {
            let mut out = Vec::new();
            let (seq, side) = if e.bid_appl_seq_num != 0 {
                (e.bid_appl_seq_num, Side::Bid)
            } else {
                (e.offer_appl_seq_num, Side::Ask)
            };
            if self.holding.peek().map(|h| h.appl_seq_num) == Some(seq) {
                // The cancel targets the order currently deferred in the
                // holding slot: it was never inserted, so there is nothing
                // to dequeue — just drop it.
                self.holding.take();
                out.push(self.build_snapshot()?);
            } else {
                if let Some(s) = self.flush_holding_unconditionally()? {
                    out.push(s);
                }
                if let Some(s) = self.apply_cancel(seq, side)? {
                    out.push(s);
                }
            }
            return Ok(out);
        }

        self.num_trades += 1;
        self.total_volume_trade += e.last_qty;
        self.total_value_trade +=
            price::rescale_trade_value(e.last_px, e.last_qty, self.instrument.source, self.instrument.instrument_type)?;
        self.update_ohlc(e.last_px);

        let held_seq = self.holding.peek().map(|h| h.appl_seq_num);
        let out = match held_seq {
            Some(seq) if seq == e.bid_appl_seq_num || seq == e.offer_appl_seq_num => {
                self.resolve_holding_participant(&e)?
            }
            Some(_) => {
                let mut out = Vec::new();
                if let Some(s) = self.flush_holding_unconditionally()? {
                    out.push(s);
                }
                out.extend(self.default_exec_branch(&e)?);
                out
            }
            None => self.default_exec_branch(&e)?,
        };
        Ok(out)
    }

    fn resolve_holding_participant(&mut self, e: &ExecMsg) -> Result<Vec<Snapshot>, AxobError> {
        let mut out = Vec::new();
        let held_side;
        let held_fully_consumed;
        let held_order_ord_type;
        {
            let held = self.holding.peek_mut().expect("checked by caller");
            held.qty = held.qty.saturating_sub(e.last_qty);
            if held.ord_type == OrdType::Market {
                held.price = e.last_px;
            }
            held_side = held.side;
            held_order_ord_type = held.ord_type;
            held_fully_consumed = held.qty == 0;
        }

        let opp_side = held_side.opposite();
        self.dequeue(opp_side, e.last_px, e.last_qty);
        let opp_seq = if self.holding.peek().map(|h| h.appl_seq_num) == Some(e.bid_appl_seq_num) {
            e.offer_appl_seq_num
        } else {
            e.bid_appl_seq_num
        };
        self.decrement_registry_order(opp_seq, e.last_qty);

        if held_fully_consumed {
            self.holding.take();
        } else if held_order_ord_type == OrdType::Limit {
            let held = self.holding.peek().expect("not consumed").clone();
            if !self.has_crossing_liquidity(held.side, held.price) {
                self.holding.take();
                self.insert_resting(held);
            }
        }

        self.run_cage_scan();
        if !self.holding.is_holding() {
            out.push(self.build_snapshot()?);
        }
        Ok(out)
    }

    fn has_crossing_liquidity(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Bid => {
                let (ap, aq) = self.ask_levels.best();
                aq > 0 && price >= ap
            }
            Side::Ask => {
                let (bp, bq) = self.bid_levels.best();
                bq > 0 && price <= bp
            }
        }
    }

    fn default_exec_branch(&mut self, e: &ExecMsg) -> Result<Vec<Snapshot>, AxobError> {
        let mut out = Vec::new();
        if e.bid_appl_seq_num != 0 {
            self.dequeue(Side::Bid, e.last_px, e.last_qty);
            self.decrement_registry_order(e.bid_appl_seq_num, e.last_qty);
        }
        if e.offer_appl_seq_num != 0 {
            self.dequeue(Side::Ask, e.last_px, e.last_qty);
            self.decrement_registry_order(e.offer_appl_seq_num, e.last_qty);
        }

        let was_call_auction = matches!(
            self.phase,
            TradingPhaseMarket::OpenCall | TradingPhaseMarket::CloseCall
        );
        if was_call_auction {
            let (_, bq) = self.bid_levels.best();
            let (_, aq) = self.ask_levels.best();
            let (bp, _) = self.bid_levels.best();
            let (ap, _) = self.ask_levels.best();
            let still_crosses = bq > 0 && aq > 0 && bp >= ap;
            if !still_crosses {
                out.push(self.build_snapshot()?);
            }
        }

        if self.phase == TradingPhaseMarket::VolatilityBreaking {
            self.phase = e.trading_phase_market;
            out.push(self.build_snapshot()?);
        }

        self.run_cage_scan();
        Ok(out)
    }

    fn apply_cancel(&mut self, seq: ApplSeqNum, side: Side) -> Result<Option<Snapshot>, AxobError> {
        if self.registry.is_illegal(seq) {
            return Ok(None);
        }
        let Some(order) = self.registry.get(seq).cloned() else {
            return Err(AxobError::UnknownCancelTarget {
                symbol: self.instrument.security_id,
                seq,
                side,
            });
        };
        self.dequeue(side, order.price, order.qty);
        self.registry.remove(seq);
        self.run_cage_scan();
        Ok(Some(self.build_snapshot()?))
    }

    // -- holding slot ------------------------------------------------------

    fn flush_holding_unconditionally(&mut self) -> Result<Option<Snapshot>, AxobError> {
        let Some(held) = self.holding.take() else {
            return Ok(None);
        };
        let stamp = held.transact_time;
        self.insert_resting(held);
        self.run_cage_scan();
        Ok(Some(self.build_snapshot_at(stamp)?))
    }

    // -- level/registry plumbing (§4.7) ------------------------------------

    fn insert_resting(&mut self, order: RestingOrder) {
        match order.side {
            Side::Bid => {
                self.bid_levels.insert_or_add(order.price, order.qty);
                self.bid_weighted.add(order.price, order.qty);
            }
            Side::Ask => {
                self.ask_levels.insert_or_add(order.price, order.qty);
                self.ask_weighted.add(order.price, order.qty);
            }
        }
        self.registry.insert(order);
    }

    fn hide_in_cage(&mut self, order: RestingOrder) {
        let cage = match order.side {
            Side::Bid => self.bid_cage.as_mut(),
            Side::Ask => self.ask_cage.as_mut(),
        };
        if let Some(cage) = cage {
            cage.hide(order.price, order.qty);
        }
        self.registry.insert(order);
    }

    fn dequeue(&mut self, side: Side, price: Price, qty: Qty) {
        let hidden = match side {
            Side::Bid => self.bid_cage.as_ref().is_some_and(|c| c.contains_price(price)),
            Side::Ask => self.ask_cage.as_ref().is_some_and(|c| c.contains_price(price)),
        };
        if hidden {
            match side {
                Side::Bid => {
                    if let Some(c) = self.bid_cage.as_mut() {
                        c.unhide_decrement(price, qty);
                    }
                }
                Side::Ask => {
                    if let Some(c) = self.ask_cage.as_mut() {
                        c.unhide_decrement(price, qty);
                    }
                }
            }
        } else {
            match side {
                Side::Bid => {
                    self.bid_levels.decrement(price, qty);
                    self.bid_weighted.remove(price, qty);
                }
                Side::Ask => {
                    self.ask_levels.decrement(price, qty);
                    self.ask_weighted.remove(price, qty);
                }
            }
        }
    }

    fn decrement_registry_order(&mut self, seq: ApplSeqNum, qty: Qty) {
        if seq == 0 {
            return;
        }
        if let Some(o) = self.registry.get_mut(seq) {
            o.qty = o.qty.saturating_sub(qty);
            if o.qty == 0 {
                self.registry.remove(seq);
            }
        }
    }

    fn would_cross(&self, order: &RestingOrder) -> bool {
        match order.side {
            Side::Bid => {
                let (ap, aq) = self.ask_levels.best();
                aq > 0 && order.price >= ap
            }
            Side::Ask => {
                let (bp, bq) = self.bid_levels.best();
                bq > 0 && order.price <= bp
            }
        }
    }

    fn outside_cage(&self, order: &RestingOrder) -> bool {
        match order.side {
            Side::Bid => self
                .bid_cage
                .as_ref()
                .is_some_and(|c| order.price > price::cage_upper(c.ref_px)),
            Side::Ask => self
                .ask_cage
                .as_ref()
                .is_some_and(|c| order.price < price::cage_lower(c.ref_px)),
        }
    }

    fn update_cage_refs(&mut self) {
        let (ask_px, ask_qty) = self.ask_levels.best();
        let (bid_px, bid_qty) = self.bid_levels.best();
        let last = self.last_px;
        let prev_close = self.constants.map(|c| c.prev_close_px).unwrap_or(0);
        if let Some(cage) = self.bid_cage.as_mut() {
            cage.ref_px = if ask_qty > 0 {
                ask_px
            } else if last > 0 {
                last
            } else {
                prev_close
            };
        }
        if let Some(cage) = self.ask_cage.as_mut() {
            cage.ref_px = if bid_qty > 0 {
                bid_px
            } else if last > 0 {
                last
            } else {
                prev_close
            };
        }
    }

    fn run_cage_scan(&mut self) {
        if !self.subtype.is_gem() {
            return;
        }
        self.update_cage_refs();
        loop {
            let mut changed = false;
            let (ask_px, ask_qty) = self.ask_levels.best();
            if let Some(mut cage) = self.bid_cage.take() {
                let promoted = cage::scan(&mut cage, &self.bid_levels, &mut self.bid_weighted, ask_px, ask_qty, self.phase);
                changed |= !promoted.is_empty();
                self.bid_cage = Some(cage);
            }
            let (bid_px, bid_qty) = self.bid_levels.best();
            if let Some(mut cage) = self.ask_cage.take() {
                let promoted = cage::scan(&mut cage, &self.ask_levels, &mut self.ask_weighted, bid_px, bid_qty, self.phase);
                changed |= !promoted.is_empty();
                self.ask_cage = Some(cage);
            }
            if changed {
                self.update_cage_refs();
            } else {
                break;
            }
        }
    }

    fn update_ohlc(&mut self, px: Price) {
        if self.open_px == 0 {
            self.open_px = px;
            self.high_px = px;
            self.low_px = px;
        } else {
            if px > self.high_px {
                self.high_px = px;
            }
            if px < self.low_px {
                self.low_px = px;
            }
        }
        self.last_px = px;
    }

    // -- snapshot generation (§4.8) -----------------------------------------

    fn build_snapshot(&self) -> Result<Snapshot, AxobError> {
        self.build_snapshot_at(self.clock)
    }

    fn build_snapshot_at(&self, ts: u64) -> Result<Snapshot, AxobError> {
        match self.phase {
            TradingPhaseMarket::OpenCall | TradingPhaseMarket::CloseCall => Ok(self.gen_call_snapshot(ts)),
            TradingPhaseMarket::VolatilityBreaking => Ok(self.gen_vb_snapshot(ts)),
            _ => self.gen_trading_snapshot(ts),
        }
    }

    fn gen_trading_snapshot(&self, ts: u64) -> Result<Snapshot, AxobError> {
        if !matches!(self.instrument.instrument_type, InstrumentType::Stock | InstrumentType::Kzz) {
            return Err(AxobError::ContinuousSnapshotUnsupported {
                instrument: self.instrument.instrument_type,
            });
        }
        let n = self.config.ladder_depth as usize;
        let bid = self.bid_levels.traverse_from_best(n);
        let ask = self.ask_levels.traverse_from_best(n);
        Ok(self.finalize_snapshot(ts, bid, ask))
    }

    fn gen_call_snapshot(&self, ts: u64) -> Snapshot {
        let n = self.config.ladder_depth as usize;
        let bids = self.bid_levels.traverse_from_best(self.bid_levels.len());
        let asks = self.ask_levels.traverse_from_best(self.ask_levels.len());
        let result: MatchResult = auction::indicative_match(&bids, &asks);
        let (bid_ladder, ask_ladder) = auction::post_match_ladders(&bids, &asks, &result, n);
        self.finalize_snapshot(ts, bid_ladder, ask_ladder)
    }

    fn gen_vb_snapshot(&self, ts: u64) -> Snapshot {
        self.finalize_snapshot(ts, vec![], vec![])
    }

    fn finalize_snapshot(&self, ts: u64, bid: Vec<(Price, Qty)>, ask: Vec<(Price, Qty)>) -> Snapshot {
        let c = self.constants.expect("seeded before any snapshot is built");
        let in_vb = self.phase == TradingPhaseMarket::VolatilityBreaking;
        Snapshot {
            source: self.instrument.source,
            security_id: self.instrument.security_id,
            channel_no: c.channel_no,
            transact_time: ts,
            prev_close_px: c.prev_close_px,
            up_limit_px: c.up_limit_px,
            dn_limit_px: c.dn_limit_px,
            num_trades: self.num_trades,
            total_volume_trade: self.total_volume_trade,
            total_value_trade: self.total_value_trade,
            open_px: self.open_px,
            high_px: self.high_px,
            low_px: self.low_px,
            last_px: self.last_px,
            bid_weight_px: if in_vb { 0 } else { self.bid_weighted.weighted_price() as u32 },
            bid_weight_size: if in_vb { 0 } else { self.bid_weighted.size },
            ask_weight_px: if in_vb { 0 } else { self.ask_weighted.weighted_price() as u32 },
            ask_weight_size: if in_vb { 0 } else { self.ask_weighted.size },
            ask,
            bid,
            trading_phase_market: self.phase,
            trading_phase_instrument: self.phase_instrument,
        }
    }

    /// Feed this engine's own regenerated snapshot into the reconciler,
    /// so `are_you_ok()` reflects agreement with the exchange. Callers
    /// typically invoke this with every snapshot returned by `on_msg`.
    pub fn record_own_snapshot(&mut self, snap: Snapshot) {
        self.reconciler.on_rebuilt_snapshot(self.instrument.source, snap);
    }

    // -- persistence (P8) ---------------------------------------------------

    /// Serialize the engine's full state for later restoration.
    pub fn snapshot_state(&self) -> AxobState {
        AxobState {
            config: self.config,
            instrument: self.instrument,
            constants: self.constants,
            phase: self.phase,
            phase_instrument: self.phase_instrument,
            last_appl_seq_num: self.last_appl_seq_num,
            clock: self.clock,
            registry_orders: self.registry.orders().cloned().collect(),
            illegal: self.registry.illegal().copied().collect(),
            bid_levels: self.bid_levels.entries(),
            ask_levels: self.ask_levels.entries(),
            bid_weighted: (self.bid_weighted.size, self.bid_weighted.value),
            ask_weighted: (self.ask_weighted.size, self.ask_weighted.value),
            bid_cage: self
                .bid_cage
                .as_ref()
                .map(|c| (c.ref_px, c.waiting_for_match, c.hidden_entries())),
            ask_cage: self
                .ask_cage
                .as_ref()
                .map(|c| (c.ref_px, c.waiting_for_match, c.hidden_entries())),
            holding: self.holding.peek().cloned(),
            num_trades: self.num_trades,
            total_volume_trade: self.total_volume_trade,
            total_value_trade: self.total_value_trade,
            open_px: self.open_px,
            high_px: self.high_px,
            low_px: self.low_px,
            last_px: self.last_px,
        }
    }

    /// Rebuild an engine from state previously produced by `snapshot_state`.
    pub fn restore_state(state: AxobState) -> Self {
        let subtype = MarketSubtype::classify(state.instrument.source, state.instrument.security_id);
        let mut holding = Holding::default();
        if let Some(o) = state.holding {
            holding.hold(o);
        }
        Axob {
            config: state.config,
            instrument: state.instrument,
            subtype,
            constants: state.constants,
            phase: state.phase,
            phase_instrument: state.phase_instrument,
            last_appl_seq_num: state.last_appl_seq_num,
            clock: state.clock,
            registry: Registry::from_parts(state.registry_orders, state.illegal),
            bid_levels: LevelIndex::from_parts(Side::Bid, state.bid_levels),
            ask_levels: LevelIndex::from_parts(Side::Ask, state.ask_levels),
            bid_weighted: WeightedTotals {
                size: state.bid_weighted.0,
                value: state.bid_weighted.1,
            },
            ask_weighted: WeightedTotals {
                size: state.ask_weighted.0,
                value: state.ask_weighted.1,
            },
            bid_cage: state
                .bid_cage
                .map(|(ref_px, waiting, hidden)| CageSide::from_parts(Side::Bid, ref_px, waiting, hidden)),
            ask_cage: state
                .ask_cage
                .map(|(ref_px, waiting, hidden)| CageSide::from_parts(Side::Ask, ref_px, waiting, hidden)),
            holding,
            reconciler: Reconciler::new(),
            num_trades: state.num_trades,
            total_volume_trade: state.total_volume_trade,
            total_value_trade: state.total_value_trade,
            open_px: state.open_px,
            high_px: state.high_px,
            low_px: state.low_px,
            last_px: state.last_px,
        }
    }
}

/// Serializable form of [`Axob`]'s internal state, for `save`/`load` (P8).
/// The reconciler's pending backlog is deliberately not carried across a
/// save/load boundary — it is reconstructed by replaying subsequent
/// exchange snapshots, the same as on a cold start.
#[derive(Debug, Serialize, Deserialize)]
pub struct AxobState {
    config: crate::config::EngineConfig,
    instrument: InstrumentConfig,
    constants: Option<Constants>,
    phase: TradingPhaseMarket,
    phase_instrument: TradingPhaseInstrument,
    last_appl_seq_num: ApplSeqNum,
    clock: u64,
    registry_orders: Vec<RestingOrder>,
    illegal: Vec<ApplSeqNum>,
    bid_levels: Vec<(Price, Qty)>,
    ask_levels: Vec<(Price, Qty)>,
    bid_weighted: (Qty, i128),
    ask_weighted: (Qty, i128),
    bid_cage: Option<(Price, bool, Vec<(Price, Qty)>)>,
    ask_cage: Option<(Price, bool, Vec<(Price, Qty)>)>,
    holding: Option<RestingOrder>,
    num_trades: u64,
    total_volume_trade: Qty,
    total_value_trade: u128,
    open_px: Price,
    high_px: Price,
    low_px: Price,
    last_px: Price,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::SourceExchange;

    fn instrument() -> InstrumentConfig {
        InstrumentConfig {
            security_id: 1,
            source: SourceExchange::Szse,
            instrument_type: InstrumentType::Stock,
        }
    }

    fn starting_snapshot() -> Snapshot {
        Snapshot {
            source: SourceExchange::Szse,
            security_id: 1,
            channel_no: 1,
            transact_time: 0,
            prev_close_px: 1000,
            up_limit_px: 1100,
            dn_limit_px: 900,
            num_trades: 0,
            total_volume_trade: 0,
            total_value_trade: 0,
            open_px: 0,
            high_px: 0,
            low_px: 0,
            last_px: 0,
            bid_weight_px: 0,
            bid_weight_size: 0,
            ask_weight_px: 0,
            ask_weight_size: 0,
            ask: vec![],
            bid: vec![],
            trading_phase_market: TradingPhaseMarket::Starting,
            trading_phase_instrument: TradingPhaseInstrument::Normal,
        }
    }

    fn order(seq: u32, side: Side, price: Price, qty: Qty, ts: u64, phase: TradingPhaseMarket) -> OrderMsg {
        OrderMsg {
            source: SourceExchange::Szse,
            security_id: 1,
            channel_no: 2,
            appl_seq_num: seq,
            transact_time: ts,
            side,
            ord_type: OrdType::Limit,
            price,
            qty,
            order_no: None,
            is_sse_delete: false,
            trading_phase_market: phase,
        }
    }

    #[test]
    fn two_resting_limit_orders_produce_trading_snapshot() {
        let mut book = Axob::new(EngineConfig::default(), instrument());
        book.on_msg(Msg::Snapshot(starting_snapshot())).unwrap();

        let out = book
            .on_msg(Msg::Order(order(1, Side::Bid, 1000, 100, 10, TradingPhaseMarket::AMTrading)))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bid, vec![(1000, 100)]);

        let out = book
            .on_msg(Msg::Order(order(2, Side::Ask, 1010, 50, 11, TradingPhaseMarket::AMTrading)))
            .unwrap();
        assert_eq!(out[0].ask, vec![(1010, 50)]);
        assert_eq!(out[0].bid, vec![(1000, 100)]);
    }

    #[test]
    fn crossing_limit_order_is_held_then_resolved_by_exec() {
        let mut book = Axob::new(EngineConfig::default(), instrument());
        book.on_msg(Msg::Snapshot(starting_snapshot())).unwrap();
        book.on_msg(Msg::Order(order(1, Side::Ask, 1000, 100, 10, TradingPhaseMarket::AMTrading)))
            .unwrap();

        // A crossing bid is held, not inserted — no level appears yet.
        let out = book
            .on_msg(Msg::Order(order(2, Side::Bid, 1000, 50, 11, TradingPhaseMarket::AMTrading)))
            .unwrap();
        assert!(out.is_empty());
        assert!(book.holding.is_holding());

        let exec = ExecMsg {
            source: SourceExchange::Szse,
            security_id: 1,
            channel_no: 2,
            appl_seq_num: 3,
            transact_time: 12,
            bid_appl_seq_num: 2,
            offer_appl_seq_num: 1,
            last_px: 1000,
            last_qty: 50,
            is_cancel: false,
            trading_phase_market: TradingPhaseMarket::AMTrading,
        };
        let out = book.on_msg(Msg::Exec(exec)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ask, vec![(1000, 50)]);
        assert!(out[0].bid.is_empty());
        assert_eq!(out[0].num_trades, 1);
        assert_eq!(out[0].total_volume_trade, 50);
        assert_eq!(out[0].total_value_trade, 1000 * 50 * 100);
    }

    #[test]
    fn save_and_restore_round_trips_book_state() {
        let mut book = Axob::new(EngineConfig::default(), instrument());
        book.on_msg(Msg::Snapshot(starting_snapshot())).unwrap();
        book.on_msg(Msg::Order(order(1, Side::Bid, 1000, 100, 10, TradingPhaseMarket::AMTrading)))
            .unwrap();

        let state = book.snapshot_state();
        let serialized = serde_json::to_vec(&state).unwrap();
        let restored: AxobState = serde_json::from_slice(&serialized).unwrap();
        let mut book2 = Axob::restore_state(restored);

        let out1 = book
            .on_msg(Msg::Order(order(2, Side::Ask, 1010, 30, 11, TradingPhaseMarket::AMTrading)))
            .unwrap();
        let out2 = book2
            .on_msg(Msg::Order(order(2, Side::Ask, 1010, 30, 11, TradingPhaseMarket::AMTrading)))
            .unwrap();
        assert_eq!(out1[0].bid, out2[0].bid);
        assert_eq!(out1[0].ask, out2[0].ask);
    }
}
