/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/10/25
******************************************************************************/

//! Prelude module that re-exports the crate's everyday types.
//!
//! ```rust
//! use axob::prelude::*;
//! ```

pub use crate::book::Axob;
pub use crate::config::{EngineConfig, InstrumentConfig};
pub use crate::error::AxobError;
pub use crate::messages::{ExecMsg, Msg, OrderMsg, PhaseSignal, Snapshot, StatusMsg};
pub use crate::mu::Mu;
pub use crate::types::{
    ApplSeqNum, InstrumentType, MarketSubtype, OrdType, Price, Qty, Side, SourceExchange,
    TradingPhaseInstrument, TradingPhaseMarket,
};
