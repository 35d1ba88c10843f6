//! Inbound message variants (§6) and the tagged union recommended by §9's
//! design notes, used at both `Axob::on_msg` and `Mu::on_msg`.

use crate::types::{
    ApplSeqNum, OrdType, Price, Qty, Side, SourceExchange, TradingPhaseInstrument,
    TradingPhaseMarket,
};

/// A new order message (`axsbe_order`).
#[derive(Debug, Clone)]
pub struct OrderMsg {
    /// Exchange the message originated on.
    pub source: SourceExchange,
    /// Instrument identifier.
    pub security_id: u32,
    /// Wire channel number.
    pub channel_no: u32,
    /// Exchange sequence number for this message.
    pub appl_seq_num: ApplSeqNum,
    /// Engine-internal timestamp (already converted from wire format).
    pub transact_time: u64,
    /// Side of the order.
    pub side: Side,
    /// Order type as decoded from the wire (pre §4.3 collapse).
    pub ord_type: OrdType,
    /// Raw price, already rescaled to internal fixed point by the caller's
    /// decoder (wire decoding is out of scope, §1).
    pub price: Price,
    /// Order quantity, already rescaled.
    pub qty: Qty,
    /// SSE order number, used to correlate "delete" orders; unused on
    /// SZSE.
    pub order_no: Option<u64>,
    /// Whether this is an SSE "delete" order, which is redirected to the
    /// cancel pipeline rather than treated as a new resting order.
    pub is_sse_delete: bool,
    /// Market-wide phase carried on the message.
    pub trading_phase_market: TradingPhaseMarket,
}

/// An execution message (`axsbe_exe`). SZSE encodes cancels as execs with
/// exactly one of `bid_seq`/`offer_seq` set and `last_qty` as the
/// cancelled quantity; `ob_cancel` normalizes both encodings.
#[derive(Debug, Clone)]
pub struct ExecMsg {
    /// Exchange the message originated on.
    pub source: SourceExchange,
    /// Instrument identifier.
    pub security_id: u32,
    /// Wire channel number.
    pub channel_no: u32,
    /// Exchange sequence number for this message.
    pub appl_seq_num: ApplSeqNum,
    /// Engine-internal timestamp.
    pub transact_time: u64,
    /// Resting bid-side sequence number participating, 0 if none (cancel
    /// of an ask).
    pub bid_appl_seq_num: ApplSeqNum,
    /// Resting ask-side sequence number participating, 0 if none (cancel
    /// of a bid).
    pub offer_appl_seq_num: ApplSeqNum,
    /// Trade price, already rescaled. 0 for a cancel.
    pub last_px: Price,
    /// Trade (or cancelled) quantity, already rescaled.
    pub last_qty: Qty,
    /// Whether this exec is a cancellation (SZSE only distinguishes this
    /// explicitly; SSE cancels never reach `ExecMsg`, see `OrderMsg`).
    pub is_cancel: bool,
    /// Market-wide phase carried on the message.
    pub trading_phase_market: TradingPhaseMarket,
}

/// An exchange-published snapshot (`axsbe_snap_stock`), consumed for
/// reconciliation and produced as the engine's own output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// Exchange the snapshot describes.
    pub source: SourceExchange,
    /// Instrument identifier.
    pub security_id: u32,
    /// Wire channel number (snapshot channel, not the order/exec one).
    pub channel_no: u32,
    /// Engine-internal timestamp at emission.
    pub transact_time: u64,
    /// Previous session's closing price.
    pub prev_close_px: Price,
    /// Daily up-limit price (sentinel `0x7FFF_FFFF` if none, GEM IPO
    /// week).
    pub up_limit_px: Price,
    /// Daily down-limit price.
    pub dn_limit_px: Price,
    /// Cumulative trade count — the reconciler's fingerprint.
    pub num_trades: u64,
    /// Cumulative traded volume.
    pub total_volume_trade: Qty,
    /// Cumulative traded value.
    pub total_value_trade: u128,
    /// Session open price.
    pub open_px: Price,
    /// Session high price.
    pub high_px: Price,
    /// Session low price.
    pub low_px: Price,
    /// Last trade price, 0 before the first trade.
    pub last_px: Price,
    /// Bid-side weighted average price.
    pub bid_weight_px: Price,
    /// Bid-side weighted total quantity.
    pub bid_weight_size: Qty,
    /// Ask-side weighted average price.
    pub ask_weight_px: Price,
    /// Ask-side weighted total quantity.
    pub ask_weight_size: Qty,
    /// Ask ladder, best first, length up to the deployment's `N`.
    pub ask: Vec<(Price, Qty)>,
    /// Bid ladder, best first, length up to the deployment's `N`.
    pub bid: Vec<(Price, Qty)>,
    /// Market-wide phase.
    pub trading_phase_market: TradingPhaseMarket,
    /// Instrument-level phase qualifier.
    pub trading_phase_instrument: TradingPhaseInstrument,
}

/// A status message (`axsbe_status`).
#[derive(Debug, Clone)]
pub struct StatusMsg {
    /// Exchange the message originated on.
    pub source: SourceExchange,
    /// Wire channel number.
    pub channel_no: u32,
    /// Market-wide phase carried on the message.
    pub trading_phase_market: TradingPhaseMarket,
}

/// A synthetic phase-transition signal pushed by the multiplexer ahead of
/// the message that triggered it (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSignal {
    /// First qualifying message of the opening call auction.
    OpenCallBegin,
    /// First qualifying message ending the opening call auction.
    OpenCallEnd,
    /// First qualifying message of morning continuous trading.
    AmTradingBegin,
    /// First qualifying message ending morning continuous trading.
    AmTradingEnd,
    /// First qualifying message of afternoon continuous trading.
    PmTradingBegin,
    /// First qualifying message ending afternoon continuous trading.
    PmTradingEnd,
    /// First qualifying message ending the session.
    AllEnd,
}

/// Tagged union of everything `Axob::on_msg` accepts, per §9's design
/// notes. `SelfSideOptimal` and `Market` order types are not separate
/// variants here: they are resolved to `Limit`-equivalent disposition
/// inside the ingestion pipeline (§4.3), not at the message-type level.
#[derive(Debug, Clone)]
pub enum Msg {
    /// New order.
    Order(OrderMsg),
    /// Execution or cancel-as-exec.
    Exec(ExecMsg),
    /// Exchange-published snapshot, for reconciliation.
    Snapshot(Snapshot),
    /// Status message.
    Status(StatusMsg),
    /// Synthetic phase-transition signal from the multiplexer.
    PhaseSignal(PhaseSignal),
}

impl Msg {
    /// The instrument this message addresses, if applicable (phase
    /// signals are broadcast per-channel and carry no instrument of their
    /// own at the point the multiplexer synthesizes them).
    pub fn security_id(&self) -> Option<u32> {
        match self {
            Msg::Order(m) => Some(m.security_id),
            Msg::Exec(m) => Some(m.security_id),
            Msg::Snapshot(m) => Some(m.security_id),
            Msg::Status(_) | Msg::PhaseSignal(_) => None,
        }
    }
}
