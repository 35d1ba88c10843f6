//! Error types for the book engine and multiplexer.

use crate::types::{Side, SourceExchange};

/// Errors raised by [`crate::book::Axob`] and [`crate::mu::Mu`].
///
/// Most of the failure kinds the source recognizes are *not* represented
/// here: a clamped price, a truncated quantity, or a flushed holding slot
/// are not failures from the caller's point of view, they are logged via
/// `tracing` and folded into the return value. `AxobError` is reserved for
/// the conditions §7 calls fatal: the caller must see these, because the
/// engine cannot make useful forward progress by itself.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AxobError {
    /// An order or exec arrived before the engine's static constants
    /// (PrevClosePx/UpLimitPx/DnLimitPx/ChannelNo/YYMMDD) were seeded from
    /// the first `Starting`-phase snapshot.
    #[error("constants not seeded for {symbol}: order/exec arrived before first Starting snapshot")]
    ConstantsNotSeeded {
        /// Instrument the message was addressed to.
        symbol: u32,
    },

    /// A cancel/trade named an `ApplSeqNum` absent from both the registry
    /// and the illegal-order set.
    #[error("cancel/trade for {symbol} names unknown seqnum {seq} on {side:?}")]
    UnknownCancelTarget {
        /// Instrument the message was addressed to.
        symbol: u32,
        /// The unrecognized sequence number.
        seq: u32,
        /// The side it was claimed to rest on.
        side: Side,
    },

    /// Decimal precision for this (exchange, instrument type) pair is not
    /// defined by the specification (flagged open question, not guessed).
    #[error("price precision undefined for {source:?}/{instrument:?}")]
    PrecisionUndefined {
        /// Exchange the instrument trades on.
        source: SourceExchange,
        /// Instrument type.
        instrument: crate::types::InstrumentType,
    },

    /// The SSE reconciler timestamp-sanity rule is an open question in the
    /// source; this crate refuses to adjudicate it rather than guess.
    #[error("SSE timestamp reconciliation policy is undefined (open question)")]
    SseTimestampPolicyUndefined,

    /// Continuous-trading snapshot generation is unimplemented for this
    /// instrument type (flagged open question, not guessed).
    #[error("continuous-trading snapshot generation unsupported for {instrument:?}")]
    ContinuousSnapshotUnsupported {
        /// Instrument type that has no continuous-snapshot rule.
        instrument: crate::types::InstrumentType,
    },

    /// A message was routed to the wrong channel for its instrument.
    #[error("channel mismatch for {symbol}: message on channel {got}, expected {expected}")]
    ChannelMismatch {
        /// Instrument the message was addressed to.
        symbol: u32,
        /// Channel the message actually arrived on.
        got: u32,
        /// Channel previously established for this instrument.
        expected: u32,
    },
}
