//! Telemetry store
//!
//! The single authoritative mutable state of the bridge: the latest decoded
//! value per field, a bounded ring of raw frame text for diagnostics, and
//! the message-rate window. Mutated only by the decode/apply step and the
//! rate tick; readers take a [`TelemetrySnapshot`] copy so they never
//! observe the store mid-mutation.

use crate::types::{Observation, RawFrame, SignalCategory};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// Capacity of the raw-frame diagnostic ring
pub const RECENT_FRAMES_CAP: usize = 20;

/// A complete, consistent, read-only copy of current telemetry state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// True while the device is associated and monitoring
    pub connected: bool,
    /// Link signal strength in dBm (0 while unassociated)
    pub signal_strength: i32,
    /// Frames received per rolling 1-second window
    pub messages_per_second: u32,
    /// Cumulative decode errors (malformed/truncated signals)
    pub error_count: u64,
    /// Latest engine-side values by field name
    pub engine_fields: BTreeMap<String, f64>,
    /// Latest vehicle-side values by field name
    pub vehicle_fields: BTreeMap<String, f64>,
    /// Textual raw frames, newest first, at most [`RECENT_FRAMES_CAP`]
    pub recent_raw_frames: Vec<String>,
}

/// Owner of the live telemetry state
#[derive(Debug)]
pub struct TelemetryStore {
    connected: bool,
    signal_strength: i32,
    engine_fields: BTreeMap<String, f64>,
    vehicle_fields: BTreeMap<String, f64>,
    recent: VecDeque<String>,
    messages_per_second: u32,
    error_count: u64,
    frames_in_window: u32,
    window_start: Instant,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self {
            connected: false,
            signal_strength: 0,
            engine_fields: BTreeMap::new(),
            vehicle_fields: BTreeMap::new(),
            recent: VecDeque::with_capacity(RECENT_FRAMES_CAP),
            messages_per_second: 0,
            error_count: 0,
            frames_in_window: 0,
            window_start: Instant::now(),
        }
    }

    /// Apply decoded observations, last write wins per field
    pub fn apply(&mut self, observations: &[Observation]) {
        for obs in observations {
            let bucket = match obs.category {
                SignalCategory::Engine => &mut self.engine_fields,
                SignalCategory::Vehicle => &mut self.vehicle_fields,
            };
            bucket.insert(obs.field.clone(), obs.value);
        }
    }

    /// Push a raw frame's textual form into the diagnostic ring
    ///
    /// Newest first; past [`RECENT_FRAMES_CAP`] the oldest entry is evicted.
    pub fn record_raw(&mut self, frame: &RawFrame) {
        self.recent.push_front(frame.to_log_line());
        self.recent.truncate(RECENT_FRAMES_CAP);
        self.frames_in_window = self.frames_in_window.saturating_add(1);
    }

    /// Add decode errors reported by the decoder for one frame
    pub fn add_decode_errors(&mut self, count: u32) {
        self.error_count += u64::from(count);
    }

    /// Record current link state for the next snapshot
    pub fn set_link(&mut self, connected: bool, signal_strength: i32) {
        self.connected = connected;
        self.signal_strength = signal_strength;
    }

    /// Recompute the message rate once per rolling 1-second window
    ///
    /// Monotonic-clock based; a call earlier than one second after the last
    /// recompute is a no-op, so callers may tick on every loop iteration.
    pub fn tick_rate(&mut self) {
        self.tick_rate_at(Instant::now());
    }

    fn tick_rate_at(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let rate = f64::from(self.frames_in_window) / elapsed.as_secs_f64();
        self.messages_per_second = rate.round() as u32;
        self.frames_in_window = 0;
        self.window_start = now;
    }

    /// Reinitialize to the boot state, as when falling back to provisioning
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Take a consistent copy for serialization
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            connected: self.connected,
            signal_strength: self.signal_strength,
            messages_per_second: self.messages_per_second,
            error_count: self.error_count,
            engine_fields: self.engine_fields.clone(),
            vehicle_fields: self.vehicle_fields.clone(),
            recent_raw_frames: self.recent.iter().cloned().collect(),
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn obs(field: &str, value: f64, category: SignalCategory) -> Observation {
        Observation {
            timestamp: Utc::now(),
            field: field.to_string(),
            value,
            unit: String::new(),
            category,
        }
    }

    #[test]
    fn test_apply_buckets_by_category() {
        let mut store = TelemetryStore::new();
        store.apply(&[
            obs("engine_speed", 1200.0, SignalCategory::Engine),
            obs("wheel_speed", 14.5, SignalCategory::Vehicle),
        ]);

        let snap = store.snapshot();
        assert_eq!(snap.engine_fields.get("engine_speed"), Some(&1200.0));
        assert_eq!(snap.vehicle_fields.get("wheel_speed"), Some(&14.5));
        assert!(snap.engine_fields.get("wheel_speed").is_none());
    }

    #[test]
    fn test_apply_is_last_write_wins() {
        let mut store = TelemetryStore::new();
        let observations = [obs("engine_speed", 900.0, SignalCategory::Engine)];

        store.apply(&observations);
        let once = store.snapshot();
        store.apply(&observations);
        let twice = store.snapshot();

        // Applying the same decode twice must not be additive
        assert_eq!(once.engine_fields, twice.engine_fields);
        assert_eq!(twice.engine_fields.get("engine_speed"), Some(&900.0));
    }

    #[test]
    fn test_ring_buffer_bound() {
        let mut store = TelemetryStore::new();
        for i in 0..25u32 {
            store.record_raw(&RawFrame::new(0x0CF0_0400, &[i as u8]));
        }

        let snap = store.snapshot();
        assert_eq!(snap.recent_raw_frames.len(), RECENT_FRAMES_CAP);
        // Newest first
        assert_eq!(snap.recent_raw_frames[0], "ID: 0xCF00400 Data: 18");
        // The oldest five (data 00..04) were evicted
        assert!(!snap
            .recent_raw_frames
            .iter()
            .any(|line| line.ends_with("Data: 00") || line.ends_with("Data: 04")));
    }

    #[test]
    fn test_rate_window_normalizes_by_elapsed() {
        let mut store = TelemetryStore::new();
        for _ in 0..10 {
            store.record_raw(&RawFrame::new(0x0CF0_0400, &[0]));
        }

        let start = store.window_start;
        store.tick_rate_at(start + Duration::from_secs(2));
        assert_eq!(store.snapshot().messages_per_second, 5);
    }

    #[test]
    fn test_rate_tick_before_window_is_noop() {
        let mut store = TelemetryStore::new();
        store.record_raw(&RawFrame::new(0x0CF0_0400, &[0]));

        let start = store.window_start;
        store.tick_rate_at(start + Duration::from_millis(200));
        assert_eq!(store.snapshot().messages_per_second, 0);
        assert_eq!(store.frames_in_window, 1);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut store = TelemetryStore::new();
        store.apply(&[obs("load", 30.0, SignalCategory::Engine)]);
        let snap = store.snapshot();

        store.apply(&[obs("load", 80.0, SignalCategory::Engine)]);
        assert_eq!(snap.engine_fields.get("load"), Some(&30.0));
    }

    #[test]
    fn test_clear_reinitializes() {
        let mut store = TelemetryStore::new();
        store.apply(&[obs("load", 30.0, SignalCategory::Engine)]);
        store.record_raw(&RawFrame::new(0x0CF0_0400, &[0]));
        store.add_decode_errors(3);
        store.set_link(true, -48);

        store.clear();
        let snap = store.snapshot();
        assert_eq!(snap, TelemetrySnapshot::default());
    }
}
