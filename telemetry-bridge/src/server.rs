//! Snapshot server
//!
//! Serves the latest telemetry snapshot to the polling dashboard and routes
//! provisioning/reset requests to the mode state machine. Poll responses
//! never wait for new CAN traffic - they serialize whatever the store holds
//! right now. While the unit is not monitoring, polls report
//! `connected: false` with empty field maps instead of failing.

use crate::mode::{DeviceMode, ModeMachine};
use crate::net::{Credentials, NetworkControl};
use anyhow::Result;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use j1939_decoder::{TelemetrySnapshot, TelemetryStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tower_http::cors::CorsLayer;

/// Mode machine plus its network collaborator, locked as one unit so
/// transitions stay atomic
pub struct BridgeState {
    pub machine: ModeMachine,
    pub network: Box<dyn NetworkControl>,
}

/// Shared handles between the poll loop and the server
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<RwLock<TelemetryStore>>,
    pub bridge: Arc<Mutex<BridgeState>>,
}

/// Wire form of the poll response
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    status: StatusBody,
    engine: BTreeMap<String, f64>,
    vehicle: BTreeMap<String, f64>,
    raw_messages: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    connected: bool,
    wifi_signal: i32,
    messages_per_second: u32,
    errors: u64,
}

impl From<TelemetrySnapshot> for SnapshotResponse {
    fn from(snapshot: TelemetrySnapshot) -> Self {
        Self {
            status: StatusBody {
                connected: snapshot.connected,
                wifi_signal: snapshot.signal_strength,
                messages_per_second: snapshot.messages_per_second,
                errors: snapshot.error_count,
            },
            engine: snapshot.engine_fields,
            vehicle: snapshot.vehicle_fields,
            raw_messages: snapshot.recent_raw_frames,
        }
    }
}

/// Wire form of the provisioning/reset response
#[derive(Debug, Serialize)]
pub struct ProvisioningStatus {
    mode: String,
    ssid: Option<String>,
    networks: Vec<String>,
}

fn provisioning_status(bridge: &mut BridgeState) -> ProvisioningStatus {
    let mode = bridge.machine.mode();
    ProvisioningStatus {
        mode: mode.as_str().to_string(),
        ssid: bridge.machine.ssid().map(str::to_string),
        networks: if mode == DeviceMode::Monitoring {
            Vec::new()
        } else {
            bridge.network.visible_networks()
        },
    }
}

#[derive(Debug, Deserialize)]
struct ConnectRequest {
    ssid: String,
    #[serde(default)]
    password: String,
}

async fn data_handler(State(ctx): State<AppContext>) -> Json<SnapshotResponse> {
    let mode = ctx.bridge.lock().unwrap().machine.mode();
    let snapshot = match mode {
        DeviceMode::Monitoring => ctx.store.read().unwrap().snapshot(),
        _ => TelemetrySnapshot::default(),
    };
    Json(SnapshotResponse::from(snapshot))
}

async fn connect_handler(
    State(ctx): State<AppContext>,
    Form(request): Form<ConnectRequest>,
) -> Json<ProvisioningStatus> {
    let mut bridge = ctx.bridge.lock().unwrap();
    let BridgeState { machine, network } = &mut *bridge;
    machine.submit_credentials(
        Credentials {
            ssid: request.ssid,
            password: request.password,
        },
        network.as_mut(),
    );
    Json(provisioning_status(&mut bridge))
}

async fn reset_handler(State(ctx): State<AppContext>) -> Json<ProvisioningStatus> {
    {
        let mut bridge = ctx.bridge.lock().unwrap();
        let BridgeState { machine, network } = &mut *bridge;
        machine.reset(network.as_mut());
    }
    ctx.store.write().unwrap().clear();

    let mut bridge = ctx.bridge.lock().unwrap();
    Json(provisioning_status(&mut bridge))
}

/// Build the application router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/data", get(data_handler))
        .route("/connect", post(connect_handler))
        .route("/reset", post(reset_handler))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Bind and serve until the process exits
pub async fn serve(listen: &str, ctx: AppContext) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("snapshot server listening on http://{listen}");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ModePolicy;
    use crate::net::SimulatedNetwork;
    use j1939_decoder::{decode, DecodeTable, RawFrame};

    fn context() -> AppContext {
        AppContext {
            store: Arc::new(RwLock::new(TelemetryStore::new())),
            bridge: Arc::new(Mutex::new(BridgeState {
                machine: ModeMachine::new(ModePolicy::default()),
                network: Box::new(SimulatedNetwork::new()),
            })),
        }
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let table = DecodeTable::builtin();
        let mut store = TelemetryStore::new();
        let frame = RawFrame::new(0x0CF0_0400, &[0x00, 0x00, 0x00, 0x11, 0x94]);
        let output = decode(&frame, &table);
        store.record_raw(&frame);
        store.apply(&output.observations);
        store.set_link(true, -52);

        let value = serde_json::to_value(SnapshotResponse::from(store.snapshot())).unwrap();
        assert_eq!(value["status"]["connected"], serde_json::json!(true));
        assert_eq!(value["status"]["wifi_signal"], serde_json::json!(-52));
        assert_eq!(value["status"]["errors"], serde_json::json!(0));
        assert_eq!(value["engine"]["engine_speed"], serde_json::json!(562.5));
        assert_eq!(
            value["raw_messages"][0],
            serde_json::json!("ID: 0xCF00400 Data: 0000001194")
        );
    }

    #[test]
    fn test_absent_fields_are_omitted_not_null() {
        let value =
            serde_json::to_value(SnapshotResponse::from(TelemetrySnapshot::default())).unwrap();
        assert_eq!(value["engine"], serde_json::json!({}));
        assert_eq!(value["vehicle"], serde_json::json!({}));
        assert!(value["engine"].get("engine_speed").is_none());
    }

    #[test]
    fn test_provisioning_status_lists_networks_until_monitoring() {
        let ctx = context();
        {
            let mut bridge = ctx.bridge.lock().unwrap();
            let status = provisioning_status(&mut bridge);
            assert_eq!(status.mode, "provisioning");
            assert!(!status.networks.is_empty());
        }

        let mut bridge = ctx.bridge.lock().unwrap();
        let BridgeState { machine, network } = &mut *bridge;
        machine.submit_credentials(
            Credentials {
                ssid: "FarmOffice".to_string(),
                password: "hunter2".to_string(),
            },
            network.as_mut(),
        );
        while machine.mode() != DeviceMode::Monitoring {
            machine.service(network.as_mut());
        }

        let status = provisioning_status(&mut bridge);
        assert_eq!(status.mode, "monitoring");
        assert_eq!(status.ssid.as_deref(), Some("FarmOffice"));
        assert!(status.networks.is_empty());
    }
}
