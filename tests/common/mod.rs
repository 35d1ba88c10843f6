use axob::config::InstrumentConfig;
use axob::messages::{ExecMsg, OrderMsg, Snapshot};
use axob::types::{
    ApplSeqNum, InstrumentType, OrdType, Price, Qty, Side, SourceExchange, TradingPhaseInstrument,
    TradingPhaseMarket,
};

pub fn instrument(security_id: u32, source: SourceExchange) -> InstrumentConfig {
    InstrumentConfig {
        security_id,
        source,
        instrument_type: InstrumentType::Stock,
    }
}

pub fn starting_snapshot(instr: &InstrumentConfig, prev_close: Price, up_limit: Price, dn_limit: Price) -> Snapshot {
    Snapshot {
        source: instr.source,
        security_id: instr.security_id,
        channel_no: 1011,
        transact_time: 0,
        prev_close_px: prev_close,
        up_limit_px: up_limit,
        dn_limit_px: dn_limit,
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

#[allow(clippy::too_many_arguments)]
pub fn order(
    instr: &InstrumentConfig,
    seq: ApplSeqNum,
    side: Side,
    ord_type: OrdType,
    price: Price,
    qty: Qty,
    ts: u64,
    phase: TradingPhaseMarket,
) -> OrderMsg {
    OrderMsg {
        source: instr.source,
        security_id: instr.security_id,
        channel_no: 11,
        appl_seq_num: seq,
        transact_time: ts,
        side,
        ord_type,
        price,
        qty,
        order_no: None,
        is_sse_delete: false,
        trading_phase_market: phase,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn sse_order(
    instr: &InstrumentConfig,
    seq: ApplSeqNum,
    side: Side,
    price: Price,
    qty: Qty,
    order_no: u64,
    ts: u64,
    phase: TradingPhaseMarket,
) -> OrderMsg {
    OrderMsg {
        source: instr.source,
        security_id: instr.security_id,
        channel_no: 11,
        appl_seq_num: seq,
        transact_time: ts,
        side,
        ord_type: OrdType::Limit,
        price,
        qty,
        order_no: Some(order_no),
        is_sse_delete: false,
        trading_phase_market: phase,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn sse_delete(
    instr: &InstrumentConfig,
    seq: ApplSeqNum,
    side: Side,
    order_no: u64,
    ts: u64,
    phase: TradingPhaseMarket,
) -> OrderMsg {
    OrderMsg {
        source: instr.source,
        security_id: instr.security_id,
        channel_no: 11,
        appl_seq_num: seq,
        transact_time: ts,
        side,
        ord_type: OrdType::Limit,
        price: 0,
        qty: 0,
        order_no: Some(order_no),
        is_sse_delete: true,
        trading_phase_market: phase,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_trade(
    instr: &InstrumentConfig,
    seq: ApplSeqNum,
    bid_seq: ApplSeqNum,
    offer_seq: ApplSeqNum,
    px: Price,
    qty: Qty,
    ts: u64,
    phase: TradingPhaseMarket,
) -> ExecMsg {
    ExecMsg {
        source: instr.source,
        security_id: instr.security_id,
        channel_no: 11,
        appl_seq_num: seq,
        transact_time: ts,
        bid_appl_seq_num: bid_seq,
        offer_appl_seq_num: offer_seq,
        last_px: px,
        last_qty: qty,
        is_cancel: false,
        trading_phase_market: phase,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_cancel(
    instr: &InstrumentConfig,
    seq: ApplSeqNum,
    bid_seq: ApplSeqNum,
    offer_seq: ApplSeqNum,
    qty: Qty,
    ts: u64,
    phase: TradingPhaseMarket,
) -> ExecMsg {
    ExecMsg {
        source: instr.source,
        security_id: instr.security_id,
        channel_no: 11,
        appl_seq_num: seq,
        transact_time: ts,
        bid_appl_seq_num: bid_seq,
        offer_appl_seq_num: offer_seq,
        last_px: 0,
        last_qty: qty,
        is_cancel: true,
        trading_phase_market: phase,
    }
}
