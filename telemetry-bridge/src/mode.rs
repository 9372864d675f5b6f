//! Device operating-mode state machine
//!
//! Governs whether the unit is advertising for provisioning, attempting
//! association, or actively monitoring the bus. Transitions are the only
//! place network-affecting state changes; side effects go through the
//! [`NetworkControl`] seam so the machine stays synchronous and testable.
//!
//! States: `Provisioning` (initial) -> `Connecting` -> `Monitoring`, with
//! fallback to `Provisioning` on a spent retry budget, an explicit reset,
//! or sustained link loss.

use crate::net::{Credentials, NetworkControl};

/// Operating mode of the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Advertising for initial network setup; no decoding
    Provisioning,
    /// Credentials received, association in progress
    Connecting,
    /// Associated, frame source running
    Monitoring,
}

impl DeviceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceMode::Provisioning => "provisioning",
            DeviceMode::Connecting => "connecting",
            DeviceMode::Monitoring => "monitoring",
        }
    }
}

/// Bounds on association retries and link-loss tolerance
#[derive(Debug, Clone)]
pub struct ModePolicy {
    /// Association status polls before giving up on a credential set
    pub max_attempts: u32,
    /// Consecutive disassociated polls in Monitoring before fallback
    pub link_loss_threshold: u32,
}

impl Default for ModePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            link_loss_threshold: 5,
        }
    }
}

/// Transition taken by one machine step, for the caller to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    /// Provisioning/Connecting -> Connecting: association (re)started
    AssociationStarted,
    /// Connecting -> Monitoring: address assigned, start the frame source
    Connected,
    /// Connecting -> Provisioning: retry budget spent
    AttemptsExhausted,
    /// Monitoring -> Provisioning: sustained link loss
    LinkLost,
    /// Any -> Provisioning: explicit reset
    Reset,
}

/// The device-mode state machine
#[derive(Debug)]
pub struct ModeMachine {
    mode: DeviceMode,
    credentials: Option<Credentials>,
    attempts: u32,
    missed_polls: u32,
    policy: ModePolicy,
}

impl ModeMachine {
    pub fn new(policy: ModePolicy) -> Self {
        Self {
            mode: DeviceMode::Provisioning,
            credentials: None,
            attempts: 0,
            missed_polls: 0,
            policy,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// SSID of the configured network, if any
    pub fn ssid(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.ssid.as_str())
    }

    /// Credentials received from the provisioning interface
    ///
    /// Starts (or restarts) association. Ignored while Monitoring - the
    /// operator resets first, then reprovisions.
    pub fn submit_credentials(
        &mut self,
        credentials: Credentials,
        net: &mut dyn NetworkControl,
    ) -> Option<ModeChange> {
        if self.mode == DeviceMode::Monitoring {
            log::warn!(
                "ignoring credentials for '{}' while monitoring; reset first",
                credentials.ssid
            );
            return None;
        }
        log::info!("credentials received for '{}', associating", credentials.ssid);
        net.connect(&credentials);
        self.credentials = Some(credentials);
        self.attempts = 0;
        self.mode = DeviceMode::Connecting;
        Some(ModeChange::AssociationStarted)
    }

    /// Explicit reset: clear credentials and fall back to Provisioning
    ///
    /// Unconditional; interrupts an in-progress association attempt.
    pub fn reset(&mut self, net: &mut dyn NetworkControl) -> ModeChange {
        log::info!("reset requested, returning to provisioning");
        net.disconnect();
        self.credentials = None;
        self.attempts = 0;
        self.missed_polls = 0;
        self.mode = DeviceMode::Provisioning;
        ModeChange::Reset
    }

    /// One bounded machine step; callers space calls about a second apart
    pub fn service(&mut self, net: &mut dyn NetworkControl) -> Option<ModeChange> {
        match self.mode {
            DeviceMode::Provisioning => None,
            DeviceMode::Connecting => {
                if net.status().associated {
                    log::info!("association confirmed, entering monitoring");
                    self.attempts = 0;
                    self.missed_polls = 0;
                    self.mode = DeviceMode::Monitoring;
                    return Some(ModeChange::Connected);
                }
                self.attempts += 1;
                if self.attempts >= self.policy.max_attempts {
                    log::warn!(
                        "association failed after {} attempts, returning to provisioning",
                        self.attempts
                    );
                    net.disconnect();
                    self.credentials = None;
                    self.attempts = 0;
                    self.mode = DeviceMode::Provisioning;
                    return Some(ModeChange::AttemptsExhausted);
                }
                None
            }
            DeviceMode::Monitoring => {
                if net.status().associated {
                    self.missed_polls = 0;
                    return None;
                }
                self.missed_polls += 1;
                if self.missed_polls >= self.policy.link_loss_threshold {
                    log::warn!(
                        "link lost for {} polls, returning to provisioning",
                        self.missed_polls
                    );
                    net.disconnect();
                    self.credentials = None;
                    self.missed_polls = 0;
                    self.mode = DeviceMode::Provisioning;
                    return Some(ModeChange::LinkLost);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::LinkStatus;

    /// Scripted network collaborator recording the calls it receives
    #[derive(Default)]
    struct MockNetwork {
        associated: bool,
        connect_calls: u32,
        disconnect_calls: u32,
    }

    impl NetworkControl for MockNetwork {
        fn connect(&mut self, _credentials: &Credentials) {
            self.connect_calls += 1;
        }

        fn disconnect(&mut self) {
            self.disconnect_calls += 1;
            self.associated = false;
        }

        fn status(&mut self) -> LinkStatus {
            LinkStatus {
                associated: self.associated,
                signal_dbm: if self.associated { -60 } else { 0 },
            }
        }

        fn visible_networks(&self) -> Vec<String> {
            vec!["TestNet".to_string()]
        }
    }

    fn creds() -> Credentials {
        Credentials {
            ssid: "TestNet".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_initial_mode_is_provisioning() {
        let machine = ModeMachine::new(ModePolicy::default());
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
        assert!(machine.ssid().is_none());
    }

    #[test]
    fn test_credentials_then_association_reaches_monitoring() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();

        assert_eq!(
            machine.submit_credentials(creds(), &mut net),
            Some(ModeChange::AssociationStarted)
        );
        assert_eq!(machine.mode(), DeviceMode::Connecting);
        assert_eq!(net.connect_calls, 1);

        // A couple of unanswered polls, then the address arrives
        assert_eq!(machine.service(&mut net), None);
        assert_eq!(machine.service(&mut net), None);
        net.associated = true;
        assert_eq!(machine.service(&mut net), Some(ModeChange::Connected));
        assert_eq!(machine.mode(), DeviceMode::Monitoring);
        assert_eq!(machine.ssid(), Some("TestNet"));
    }

    #[test]
    fn test_retry_budget_falls_back_to_provisioning() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();
        machine.submit_credentials(creds(), &mut net);

        for _ in 0..19 {
            assert_eq!(machine.service(&mut net), None);
            assert_eq!(machine.mode(), DeviceMode::Connecting);
        }
        assert_eq!(
            machine.service(&mut net),
            Some(ModeChange::AttemptsExhausted)
        );
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
        assert!(machine.ssid().is_none());
        assert_eq!(net.disconnect_calls, 1);
    }

    #[test]
    fn test_reset_interrupts_connecting() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();
        machine.submit_credentials(creds(), &mut net);
        machine.service(&mut net);

        assert_eq!(machine.reset(&mut net), ModeChange::Reset);
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
        assert!(machine.ssid().is_none());
        assert_eq!(net.disconnect_calls, 1);
    }

    #[test]
    fn test_reset_from_monitoring_clears_credentials() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();
        machine.submit_credentials(creds(), &mut net);
        net.associated = true;
        machine.service(&mut net);
        assert_eq!(machine.mode(), DeviceMode::Monitoring);

        machine.reset(&mut net);
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
        assert!(machine.ssid().is_none());
    }

    #[test]
    fn test_sustained_link_loss_falls_back() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();
        machine.submit_credentials(creds(), &mut net);
        net.associated = true;
        machine.service(&mut net);

        net.associated = false;
        for _ in 0..4 {
            assert_eq!(machine.service(&mut net), None);
            assert_eq!(machine.mode(), DeviceMode::Monitoring);
        }
        assert_eq!(machine.service(&mut net), Some(ModeChange::LinkLost));
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
    }

    #[test]
    fn test_brief_link_drop_is_tolerated() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();
        machine.submit_credentials(creds(), &mut net);
        net.associated = true;
        machine.service(&mut net);

        net.associated = false;
        machine.service(&mut net);
        machine.service(&mut net);
        net.associated = true;
        machine.service(&mut net);

        net.associated = false;
        for _ in 0..4 {
            machine.service(&mut net);
        }
        // The earlier misses were cleared by the good poll
        assert_eq!(machine.mode(), DeviceMode::Monitoring);
    }

    #[test]
    fn test_credentials_ignored_while_monitoring() {
        let mut machine = ModeMachine::new(ModePolicy::default());
        let mut net = MockNetwork::default();
        machine.submit_credentials(creds(), &mut net);
        net.associated = true;
        machine.service(&mut net);

        assert_eq!(machine.submit_credentials(creds(), &mut net), None);
        assert_eq!(machine.mode(), DeviceMode::Monitoring);
        assert_eq!(net.connect_calls, 1);
    }
}
