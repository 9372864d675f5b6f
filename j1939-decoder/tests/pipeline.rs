//! End-to-end decode pipeline: simulated bus -> decoder -> store -> snapshot

use j1939_decoder::{
    decode, CanBusConfig, DecodeTable, FrameSource, RawFrame, SimulatedBus, TelemetryStore,
    DEFAULT_BIT_RATE, RECENT_FRAMES_CAP,
};

#[test]
fn simulated_bus_fills_the_snapshot() {
    let table = DecodeTable::builtin();
    let mut bus = SimulatedBus::new();
    bus.configure(&CanBusConfig::for_table(DEFAULT_BIT_RATE, &table))
        .unwrap();

    let mut store = TelemetryStore::new();
    for _ in 0..100 {
        let frame = bus.poll_frame().unwrap().unwrap();
        let output = decode(&frame, &table);
        store.record_raw(&frame);
        store.apply(&output.observations);
        store.add_decode_errors(output.skipped_signals);
    }

    let snapshot = store.snapshot();
    assert_eq!(snapshot.error_count, 0);
    assert_eq!(snapshot.recent_raw_frames.len(), RECENT_FRAMES_CAP);

    for field in ["engine_speed", "throttle", "coolant_temp", "oil_temp", "fuel_rate", "load"] {
        assert!(
            snapshot.engine_fields.contains_key(field),
            "missing engine field {field}"
        );
    }
    for field in ["wheel_speed", "fuel_level"] {
        assert!(
            snapshot.vehicle_fields.contains_key(field),
            "missing vehicle field {field}"
        );
    }
}

#[test]
fn malformed_frames_count_without_stopping_the_pipeline() {
    let table = DecodeTable::builtin();
    let mut store = TelemetryStore::new();

    // A truncated Engine Temperature frame, then a healthy one
    let empty = RawFrame::new(0x18FE_EE00, &[]);
    let output = decode(&empty, &table);
    store.record_raw(&empty);
    store.apply(&output.observations);
    store.add_decode_errors(output.skipped_signals);

    let healthy = RawFrame::new(0x18FE_EE00, &[95, 85, 0, 0, 0, 0, 0, 0]);
    let output = decode(&healthy, &table);
    store.record_raw(&healthy);
    store.apply(&output.observations);
    store.add_decode_errors(output.skipped_signals);

    let snapshot = store.snapshot();
    assert!(snapshot.error_count >= 1);
    assert_eq!(snapshot.engine_fields["coolant_temp"], 55.0);
    assert_eq!(snapshot.engine_fields["oil_temp"], 45.0);
}
