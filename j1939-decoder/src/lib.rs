//! J1939 Decoder Library
//!
//! Protocol core of the telemetry bridge: decodes single-frame J1939 PGNs
//! from a fixed table into named engineering-unit values and owns the
//! latest-value telemetry state.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on decoding:
//! - Extracts the PGN from each raw frame and looks it up in the decode table
//! - Emits one observation per decodable signal (scale/bias applied)
//! - Keeps the latest value per field plus a bounded raw-frame ring
//! - Abstracts the physical CAN interface behind a non-blocking trait
//!
//! The library does NOT:
//! - Reassemble multi-packet transport-protocol messages
//! - Perform address claiming or diagnostic-trouble-code handling
//! - Serve HTTP or manage the device operating mode
//!
//! All device-level functionality is in the application layer
//! (telemetry-bridge).
//!
//! # Example Usage
//!
//! ```
//! use j1939_decoder::{decode, DecodeTable, RawFrame, TelemetryStore};
//!
//! let table = DecodeTable::builtin();
//! let mut store = TelemetryStore::new();
//!
//! // One frame from the bus: Electronic Engine Controller 1
//! let frame = RawFrame::new(0x0CF00400, &[0x00, 0x00, 0x00, 0x11, 0x94]);
//! let output = decode(&frame, &table);
//!
//! store.record_raw(&frame);
//! store.apply(&output.observations);
//! store.add_decode_errors(output.skipped_signals);
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.engine_fields["engine_speed"], 562.5);
//! ```

pub mod bus;
pub mod decoder;
pub mod source;
pub mod store;
pub mod table;
pub mod types;

// Re-export main types for convenience
pub use bus::{CanBusConfig, DEFAULT_BIT_RATE, MAX_ACCEPTANCE_FILTERS};
pub use decoder::{decode, DecodeOutput};
pub use source::{FrameSource, SimulatedBus};
pub use store::{TelemetrySnapshot, TelemetryStore, RECENT_FRAMES_CAP};
pub use table::{DecodeTable, PgnDefinition, SignalSpec};
pub use types::{
    DecodeError, Observation, RawFrame, Result, SignalCategory, Timestamp, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
