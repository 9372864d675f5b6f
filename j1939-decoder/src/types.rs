//! Core types for the J1939 decoder library
//!
//! This module defines the fundamental types flowing through the bridge:
//! raw frames as produced by the CAN transport, and the named observations
//! the decoder emits from them. The decoder itself is pure - state lives in
//! the telemetry store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Maximum data length of a classic CAN frame
pub const MAX_FRAME_LEN: usize = 8;

/// A raw CAN frame as delivered by the transport layer
///
/// Produced by a [`FrameSource`](crate::source::FrameSource), consumed once
/// by the decoder. The textual `ID: 0x.. Data: ..` form is a serialization
/// concern of the snapshot boundary, never the internal representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// 29-bit extended arbitration identifier
    pub arbitration_id: u32,
    /// Frame data bytes (0-8)
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Extended ID maximum value (29-bit)
    pub const MAX_ARBITRATION_ID: u32 = 0x1FFF_FFFF;

    /// Create a frame, masking the ID to 29 bits and capping data at 8 bytes
    pub fn new(arbitration_id: u32, data: &[u8]) -> Self {
        let len = data.len().min(MAX_FRAME_LEN);
        Self {
            arbitration_id: arbitration_id & Self::MAX_ARBITRATION_ID,
            data: data[..len].to_vec(),
        }
    }

    /// Extract the Parameter Group Number from the arbitration ID
    pub fn pgn(&self) -> u32 {
        (self.arbitration_id >> 8) & 0x1FFFF
    }

    /// Data length code - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// Textual form used in the diagnostic ring buffer
    pub fn to_log_line(&self) -> String {
        format!(
            "ID: 0x{:X} Data: {}",
            self.arbitration_id,
            hex::encode_upper(&self.data)
        )
    }
}

/// Signal grouping used to bucket decoded values in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalCategory {
    /// Engine-side signals (speed, temperatures, fuel rate, load)
    Engine,
    /// Vehicle-side signals (wheel speed, fuel level)
    Vehicle,
}

/// A single decoded engineering-unit value
///
/// Ephemeral: produced per decode, applied to the telemetry store and
/// discarded. No history is retained per field.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// When the frame was decoded
    pub timestamp: Timestamp,
    /// Target field name from the decode table
    pub field: String,
    /// Physical value after scale/bias conversion
    pub value: f64,
    /// Engineering unit (e.g., "rpm", "km/h", "°C")
    pub unit: String,
    /// Bucket the value belongs to in the snapshot
    pub category: SignalCategory,
}

/// Errors raised while loading or validating the decode table
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read decode table: {0}")]
    TableIo(#[from] std::io::Error),

    #[error("failed to parse decode table: {0}")]
    TableParse(#[from] toml::de::Error),

    #[error("invalid signal definition: {0}")]
    InvalidSignal(String),
}

/// Errors reported by the CAN transport collaborator
///
/// Transient by contract: the bridge loop logs them and continues on the
/// next poll without changing device mode.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("bus read failed: {0}")]
    Read(String),

    #[error("bus configuration rejected: {0}")]
    Configure(String),
}
