//! Deployment configuration surface (§10). Plain data — loading it from a
//! file or environment is a caller concern, out of scope per §1.

use serde::{Deserialize, Serialize};

use crate::types::{InstrumentType, SourceExchange};

/// Engine-wide deployment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Snapshot ladder depth, canonical values 5 or 10.
    pub ladder_depth: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { ladder_depth: 10 }
    }
}

/// Per-instrument identity used to construct an [`crate::book::Axob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Numeric instrument identifier.
    pub security_id: u32,
    /// Exchange the instrument trades on.
    pub source: SourceExchange,
    /// Instrument type, drives price scaling and cage applicability.
    pub instrument_type: InstrumentType,
}
