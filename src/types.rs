//! Core scalar and enum types shared across the engine.

use serde::{Deserialize, Serialize};

/// Internal fixed-point price. Budgeted at 25 bits by the source; stored
/// widened to `u32` since Rust has no native 25-bit integer and the extra
/// headroom costs nothing on commodity hardware (the FPGA port is expected
/// to narrow this back down itself).
pub type Price = u32;

/// Internal fixed-point quantity. Budgeted at 30 bits per order, 38 bits
/// aggregated; stored as `u64` for the same reason as [`Price`].
pub type Qty = u64;

/// Exchange-assigned monotone sequence number, unique per channel.
pub type ApplSeqNum = u32;

/// Sentinel for "no up-limit" (GEM IPO week) and for clamped price
/// overflow, per §6.
pub const PRICE_OVERFLOW: Price = 0x7FFF_FFFF;

/// Which exchange an instrument trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceExchange {
    /// Shenzhen Stock Exchange.
    Szse,
    /// Shanghai Stock Exchange.
    Sse,
}

/// Instrument class, drives price/quantity scaling and cage applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Common stock.
    Stock,
    /// Fund unit.
    Fund,
    /// Convertible bond ("可转债").
    Kzz,
    /// Bond.
    Bond,
    /// Repo ("国债逆回购").
    Nhg,
}

/// Market subtype, derived from `(SourceExchange, SecurityID)`. Only GEM
/// (ChiNext) changes engine behavior (the price cage); the rest is
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketSubtype {
    /// SZSE main board.
    SzseMainBoard,
    /// SZSE small/medium enterprise board.
    SzseSme,
    /// SZSE ChiNext ("创业板", GEM) — the only subtype with a price cage.
    SzseGem,
    /// SZSE B-share.
    SzseB,
    /// SZSE convertible bond.
    SzseKzz,
    /// Anything else on SZSE.
    SzseOther,
    /// SSE (subtype is not further distinguished by this engine).
    Sse,
}

impl MarketSubtype {
    /// Derive the subtype from the exchange and numeric instrument id,
    /// following the source's `market_subtype` convention: SZSE
    /// instrument ids are classified by their leading digits, `300xxxx`
    /// being ChiNext.
    pub fn classify(source: SourceExchange, security_id: u32) -> MarketSubtype {
        match source {
            SourceExchange::Sse => MarketSubtype::Sse,
            SourceExchange::Szse => {
                let lead = security_id / 1000;
                match lead {
                    300 => MarketSubtype::SzseGem,
                    // KZZ (convertible bonds) are issued in the 127xxx/123xxx ranges.
                    123 | 127 | 128 => MarketSubtype::SzseKzz,
                    200 => MarketSubtype::SzseB,
                    2 => MarketSubtype::SzseSme,
                    0 | 1 => MarketSubtype::SzseMainBoard,
                    _ => MarketSubtype::SzseOther,
                }
            }
        }
    }

    /// Whether this subtype is subject to the ChiNext price cage.
    pub fn is_gem(self) -> bool {
        matches!(self, MarketSubtype::SzseGem)
    }
}

/// Which side of the book an order or level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side.
    Bid,
    /// Sell side.
    Ask,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Order type as decoded from the wire message, before the §4.3 ingestion
/// rewrite collapses `SelfSideOptimal` into `Limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrdType {
    /// Resting limit order at a stated price.
    Limit,
    /// Market order; price is revealed by the execution that follows.
    Market,
    /// Self-side-optimal order (SZSE only): resolved to the current best
    /// on its own side at ingestion.
    SelfSideOptimal,
}

/// Session phase of the market as a whole (`TradingPhaseMarket`).
///
/// Linear state machine per §4.10, plus the instrument-specific
/// `VolatilityBreaking` halt that any phase can be interrupted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradingPhaseMarket {
    /// Before the opening call auction begins.
    Starting,
    /// Opening call auction accumulation window.
    OpenCall,
    /// Short pause between opening call and morning continuous trading.
    PreTradingBreaking,
    /// Morning continuous trading.
    AMTrading,
    /// Lunch recess.
    Breaking,
    /// Afternoon continuous trading.
    PMTrading,
    /// Closing call auction accumulation window.
    CloseCall,
    /// Session over.
    Ending,
    /// Instrument-specific temporary halt; ended by the next order/exec.
    VolatilityBreaking,
}

impl TradingPhaseMarket {
    /// Whether this phase is quiescent (§7): no further executions are
    /// expected until the market resumes, so an unmatched reconciler
    /// backlog here is a genuine failure rather than a transient lag.
    pub fn is_quiescent(self) -> bool {
        matches!(
            self,
            TradingPhaseMarket::Starting
                | TradingPhaseMarket::PreTradingBreaking
                | TradingPhaseMarket::Breaking
                | TradingPhaseMarket::Ending
        )
    }
}

/// Instrument-level phase qualifier reported alongside
/// [`TradingPhaseMarket`] in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingPhaseInstrument {
    /// No instrument-specific qualifier in effect.
    Normal,
    /// Instrument is halted independent of the market-wide phase.
    Halted,
}
