//! Frame decoding engine
//!
//! Extracts named engineering-unit values from raw J1939 frames using the
//! decode table. Decoding is a pure function: it returns observations plus
//! a count of signals skipped for insufficient frame length, and the caller
//! applies both to the telemetry store.
//!
//! Numeric semantics: multi-byte fields are unsigned big-endian exactly as
//! encoded on the bus (no sign extension); scale/bias arithmetic is f64.

use crate::table::{DecodeTable, SignalSpec};
use crate::types::{Observation, RawFrame};
use byteorder::{BigEndian, ByteOrder};
use chrono::Utc;

/// Result of decoding one frame
#[derive(Debug, Clone, Default)]
pub struct DecodeOutput {
    /// One observation per decodable signal of the frame's PGN
    pub observations: Vec<Observation>,
    /// Signals skipped because the frame was shorter than they need
    pub skipped_signals: u32,
}

/// Decode a raw frame against the table
///
/// A PGN absent from the table yields an empty output - most bus traffic is
/// irrelevant and this is not an error. A signal extending past the end of
/// the frame data is skipped and counted without aborting the remaining
/// signals of the same frame.
pub fn decode(frame: &RawFrame, table: &DecodeTable) -> DecodeOutput {
    let mut output = DecodeOutput::default();

    let Some(specs) = table.specs_for(frame.pgn()) else {
        return output;
    };

    let timestamp = Utc::now();
    for spec in specs {
        match extract_raw(&frame.data, spec) {
            Some(raw) => {
                let value = raw as f64 * spec.scale + spec.bias;
                output.observations.push(Observation {
                    timestamp,
                    field: spec.name.clone(),
                    value,
                    unit: spec.unit.clone(),
                    category: spec.category,
                });
            }
            None => {
                log::warn!(
                    "signal '{}' needs bytes {}..{} but frame 0x{:X} has {}",
                    spec.name,
                    spec.byte_offset,
                    spec.byte_offset + spec.byte_length as usize,
                    frame.arbitration_id,
                    frame.data.len()
                );
                output.skipped_signals += 1;
            }
        }
    }

    output
}

/// Extract the unsigned big-endian raw integer for one signal
fn extract_raw(data: &[u8], spec: &SignalSpec) -> Option<u64> {
    let end = spec.byte_offset + spec.byte_length as usize;
    if end > data.len() {
        return None;
    }
    match spec.byte_length {
        1 => Some(u64::from(data[spec.byte_offset])),
        2 => Some(u64::from(BigEndian::read_u16(&data[spec.byte_offset..end]))),
        _ => None,
    }
}
