//! # axob — Limit Order Book Reconstruction Engine
//!
//! Rebuilds Level-N order-book snapshots for Chinese equity tick feeds
//! (SZSE and SSE) from the raw order/execution/cancel stream, the same
//! way the exchange's own snapshot generator does, so a consumer can
//! cross-check — or stand in for — the exchange-published snapshot.
//!
//! This is a reconstruction engine, not a matching engine: it never
//! originates a trade, it only replays the ones the exchange already
//! executed and maintains the resulting resting-order book.
//!
//! ## Layout
//!
//! - [`book`] — [`Axob`], the per-instrument reconstruction engine.
//! - [`mu`] — [`Mu`], the session multiplexer owning one `Axob` per
//!   instrument and the per-channel phase state machine.
//! - [`messages`] — the inbound message shapes and the `Msg` tagged union.
//! - [`types`] — scalar types and session/phase enums shared everywhere.
//! - [`price`] — fixed-point scaling and the ChiNext price-cage formulas.
//! - [`level`] — the sorted price→quantity index backing each book side.
//! - [`cage`] — ChiNext (GEM) price-cage admission bookkeeping.
//! - [`auction`] — the call-auction indicative-match algorithm.
//! - [`reconciler`] — exchange-vs-regenerated snapshot matching.
//! - [`config`] — deployment configuration surface.
//! - [`error`] — [`AxobError`], the crate's fallible-path error type.
//!
//! ## Example
//!
//! ```
//! use axob::book::Axob;
//! use axob::config::{EngineConfig, InstrumentConfig};
//! use axob::types::{InstrumentType, SourceExchange};
//!
//! let instrument = InstrumentConfig {
//!     security_id: 1,
//!     source: SourceExchange::Szse,
//!     instrument_type: InstrumentType::Stock,
//! };
//! let _book = Axob::new(EngineConfig::default(), instrument);
//! ```

pub mod auction;
pub mod book;
pub mod cage;
pub mod config;
pub mod error;
pub mod holding;
pub mod level;
pub mod messages;
pub mod mu;
pub mod price;
pub mod prelude;
pub mod reconciler;
pub mod registry;
pub mod types;
pub mod weighted;

pub use book::Axob;
pub use config::{EngineConfig, InstrumentConfig};
pub use error::AxobError;
pub use messages::{ExecMsg, Msg, OrderMsg, PhaseSignal, Snapshot, StatusMsg};
pub use mu::Mu;
