//! Network provisioning seam
//!
//! Association handshakes, scanning and captive-portal advertisement are an
//! external collaborator. The mode state machine drives it through
//! [`NetworkControl`]: begin/stop association and read link status, all
//! non-blocking.
//!
//! [`SimulatedNetwork`] is the shipped implementation for bench runs: it
//! associates a fixed number of status polls after `connect`, or never if
//! the password is rejected.

/// Network credentials received from the provisioning interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

/// Current link state as reported by the network collaborator
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStatus {
    /// True once an address has been assigned
    pub associated: bool,
    /// Signal strength in dBm (0 while unassociated)
    pub signal_dbm: i32,
}

/// Opaque network provisioning capability
pub trait NetworkControl: Send {
    /// Begin associating with the given network; completion is observed
    /// through [`status`](Self::status)
    fn connect(&mut self, credentials: &Credentials);

    /// Drop any association or in-progress attempt
    fn disconnect(&mut self);

    /// Non-blocking link status poll
    fn status(&mut self) -> LinkStatus;

    /// Network names visible to the provisioning page
    fn visible_networks(&self) -> Vec<String>;
}

const SIM_ASSOCIATION_POLLS: u32 = 3;
const SIM_SIGNAL_DBM: i32 = -52;

/// Stand-in collaborator that associates after a few status polls
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    target: Option<Credentials>,
    polls_since_connect: u32,
    /// Password that the simulated access point rejects
    reject_password: Option<String>,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a password the simulated network will never accept
    pub fn with_rejected_password(password: &str) -> Self {
        Self {
            reject_password: Some(password.to_string()),
            ..Self::default()
        }
    }
}

impl NetworkControl for SimulatedNetwork {
    fn connect(&mut self, credentials: &Credentials) {
        log::info!("simulated network: associating with '{}'", credentials.ssid);
        self.target = Some(credentials.clone());
        self.polls_since_connect = 0;
    }

    fn disconnect(&mut self) {
        self.target = None;
        self.polls_since_connect = 0;
    }

    fn status(&mut self) -> LinkStatus {
        let Some(target) = &self.target else {
            return LinkStatus::default();
        };
        if self.reject_password.as_deref() == Some(target.password.as_str()) {
            return LinkStatus::default();
        }
        self.polls_since_connect += 1;
        if self.polls_since_connect > SIM_ASSOCIATION_POLLS {
            LinkStatus {
                associated: true,
                signal_dbm: SIM_SIGNAL_DBM,
            }
        } else {
            LinkStatus::default()
        }
    }

    fn visible_networks(&self) -> Vec<String> {
        vec![
            "FarmOffice".to_string(),
            "WorkshopAP".to_string(),
            "Barn-IoT".to_string(),
        ]
    }
}
