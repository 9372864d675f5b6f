//! J1939 decode table
//!
//! A fixed, hand-curated mapping from PGN to signal definitions. The table
//! is append-only configuration data, not logic: adding a PGN requires no
//! change to the decoder. The built-in table can be replaced wholesale from
//! a TOML file so byte offsets can be corrected against real hardware
//! without recompiling.

use crate::types::{DecodeError, Result, SignalCategory, MAX_FRAME_LEN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A single signal definition within a PGN's payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Target field name, unique within the PGN's field set
    pub name: String,
    /// Byte offset of the field within the frame payload
    pub byte_offset: usize,
    /// Field width in bytes (1 or 2; multi-byte fields are big-endian)
    pub byte_length: u8,
    /// Scale factor applied to the raw integer
    pub scale: f64,
    /// Bias added after scaling
    #[serde(default)]
    pub bias: f64,
    /// Engineering unit (e.g., "rpm", "km/h", "°C")
    pub unit: String,
    /// Snapshot bucket for the decoded value
    pub category: SignalCategory,
}

/// All signals carried by one parameter group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgnDefinition {
    /// Parameter Group Number (17-bit)
    pub pgn: u32,
    /// Human-readable group name
    pub name: String,
    /// Signal definitions within this group's payload
    pub signal: Vec<SignalSpec>,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    message: Vec<PgnDefinition>,
}

/// The decode table: PGN -> signal definitions
///
/// Loaded once at startup and immutable thereafter.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    entries: BTreeMap<u32, PgnDefinition>,
}

impl DecodeTable {
    /// The built-in table covering the monitored engine/vehicle groups
    pub fn builtin() -> Self {
        let messages = vec![
            PgnDefinition {
                pgn: 0xF004,
                name: "Electronic Engine Controller 1".to_string(),
                signal: vec![
                    signal("engine_speed", 3, 2, 0.125, 0.0, "rpm", SignalCategory::Engine),
                    signal("throttle", 1, 1, 0.4, 0.0, "%", SignalCategory::Engine),
                ],
            },
            PgnDefinition {
                pgn: 0xFEF1,
                name: "Cruise Control/Vehicle Speed".to_string(),
                signal: vec![signal(
                    "wheel_speed",
                    1,
                    2,
                    0.003_906_25,
                    0.0,
                    "km/h",
                    SignalCategory::Vehicle,
                )],
            },
            PgnDefinition {
                pgn: 0xFEEE,
                name: "Engine Temperature".to_string(),
                signal: vec![
                    signal("coolant_temp", 0, 1, 1.0, -40.0, "°C", SignalCategory::Engine),
                    signal("oil_temp", 1, 1, 1.0, -40.0, "°C", SignalCategory::Engine),
                ],
            },
            PgnDefinition {
                pgn: 0xFEF2,
                name: "Fuel Economy".to_string(),
                signal: vec![
                    signal("fuel_rate", 2, 2, 0.05, 0.0, "L/h", SignalCategory::Engine),
                    signal("fuel_level", 1, 1, 0.4, 0.0, "%", SignalCategory::Vehicle),
                ],
            },
            PgnDefinition {
                pgn: 0xF003,
                name: "Engine Load".to_string(),
                signal: vec![signal("load", 2, 1, 0.4, 0.0, "%", SignalCategory::Engine)],
            },
        ];

        let entries = messages.into_iter().map(|m| (m.pgn, m)).collect();
        Self { entries }
    }

    /// Parse a table from TOML text
    ///
    /// Format: repeated `[[message]]` blocks, each with `pgn`, `name` and
    /// one or more `[[message.signal]]` entries.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: TableFile = toml::from_str(text)?;
        Self::from_messages(file.message)
    }

    /// Load a table override from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        log::info!("Loading decode table from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        let table = Self::from_toml_str(&text)?;
        log::info!(
            "Decode table loaded: {} PGNs, {} signals",
            table.len(),
            table.signal_count()
        );
        Ok(table)
    }

    fn from_messages(messages: Vec<PgnDefinition>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for message in messages {
            validate_message(&message)?;
            let pgn = message.pgn;
            if entries.insert(pgn, message).is_some() {
                return Err(DecodeError::InvalidSignal(format!(
                    "duplicate PGN 0x{pgn:X} in decode table"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Signal definitions for a PGN, or None if the group is not monitored
    pub fn specs_for(&self, pgn: u32) -> Option<&[SignalSpec]> {
        self.entries.get(&pgn).map(|m| m.signal.as_slice())
    }

    /// Group definition for a PGN
    pub fn definition(&self, pgn: u32) -> Option<&PgnDefinition> {
        self.entries.get(&pgn)
    }

    /// All monitored PGNs in ascending order
    pub fn pgns(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    /// Number of parameter groups in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table holds no groups
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total signal count across all groups
    pub fn signal_count(&self) -> usize {
        self.entries.values().map(|m| m.signal.len()).sum()
    }
}

impl Default for DecodeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn signal(
    name: &str,
    byte_offset: usize,
    byte_length: u8,
    scale: f64,
    bias: f64,
    unit: &str,
    category: SignalCategory,
) -> SignalSpec {
    SignalSpec {
        name: name.to_string(),
        byte_offset,
        byte_length,
        scale,
        bias,
        unit: unit.to_string(),
        category,
    }
}

fn validate_message(message: &PgnDefinition) -> Result<()> {
    if message.pgn > 0x1FFFF {
        return Err(DecodeError::InvalidSignal(format!(
            "PGN 0x{:X} exceeds the 17-bit range",
            message.pgn
        )));
    }
    let mut seen = Vec::with_capacity(message.signal.len());
    for spec in &message.signal {
        if !matches!(spec.byte_length, 1 | 2) {
            return Err(DecodeError::InvalidSignal(format!(
                "signal '{}': byte_length must be 1 or 2, got {}",
                spec.name, spec.byte_length
            )));
        }
        if spec.byte_offset + spec.byte_length as usize > MAX_FRAME_LEN {
            return Err(DecodeError::InvalidSignal(format!(
                "signal '{}': bytes {}..{} exceed the {}-byte frame limit",
                spec.name,
                spec.byte_offset,
                spec.byte_offset + spec.byte_length as usize,
                MAX_FRAME_LEN
            )));
        }
        if seen.contains(&spec.name.as_str()) {
            return Err(DecodeError::InvalidSignal(format!(
                "duplicate signal name '{}' in PGN 0x{:X}",
                spec.name, message.pgn
            )));
        }
        seen.push(spec.name.as_str());
    }
    Ok(())
}
