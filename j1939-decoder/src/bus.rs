//! CAN bus configuration
//!
//! Produced by the core, consumed by the transport collaborator, which
//! translates it into controller register writes. Carries the fixed bit
//! rate and the PGN acceptance filters derived from the decode table.

use crate::table::DecodeTable;
use serde::Serialize;

/// Acceptance filter slots available on the transceiver
pub const MAX_ACCEPTANCE_FILTERS: usize = 6;

/// Default bus speed for the monitored equipment
pub const DEFAULT_BIT_RATE: u32 = 250_000;

/// Transport configuration handed to the CAN collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanBusConfig {
    /// Bus speed in bit/s
    pub bit_rate: u32,
    /// PGNs to accept, at most [`MAX_ACCEPTANCE_FILTERS`]
    pub pgn_filters: Vec<u32>,
}

impl CanBusConfig {
    /// Derive the transport configuration from a decode table
    ///
    /// One filter per monitored PGN. A table larger than the filter bank
    /// loses hardware filtering for the excess PGNs; those are dropped here
    /// with a warning and their frames are still ignored in software.
    pub fn for_table(bit_rate: u32, table: &DecodeTable) -> Self {
        let mut pgn_filters = table.pgns();
        if pgn_filters.len() > MAX_ACCEPTANCE_FILTERS {
            log::warn!(
                "decode table has {} PGNs but only {} acceptance filters; \
                 not filtering 0x{:X} and beyond in hardware",
                pgn_filters.len(),
                MAX_ACCEPTANCE_FILTERS,
                pgn_filters[MAX_ACCEPTANCE_FILTERS]
            );
            pgn_filters.truncate(MAX_ACCEPTANCE_FILTERS);
        }
        Self {
            bit_rate,
            pgn_filters,
        }
    }
}
