//! Modem session state
//!
//! The [`Session`] value is shared by the configuration, transmit and receive
//! paths of [`Device`](crate::Device). It tracks the lifecycle of the modem and
//! which provisioning steps have happened, and answers whether a given
//! operation is currently allowed.

use crate::commands::{DevAddress, NetworkPreferences};
use crate::Error;

/// Lifecycle of the modem session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Driver constructed, nothing sent yet
    #[default]
    Uninitialized,
    /// At least one provisioning command has been sent
    Configuring,
    /// The modem accepted the start command
    Running,
    /// The stop command has been issued
    Stopped,
}

/// Provisioning and lifecycle record for one modem
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
    dev_address: Option<DevAddress>,
    preferences: Option<NetworkPreferences>,
    app_key_set: bool,
    network_key_set: bool,
}

impl Session {
    /// Creates a session in the [`SessionState::Uninitialized`] state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Device address configured for this session, if any
    pub fn dev_address(&self) -> Option<DevAddress> {
        self.dev_address
    }

    /// Network preferences last sent to the modem, if any
    pub fn preferences(&self) -> Option<NetworkPreferences> {
        self.preferences
    }

    /// Whether an application session key has been sent
    pub fn has_app_key(&self) -> bool {
        self.app_key_set
    }

    /// Whether a network session key has been sent
    pub fn has_network_key(&self) -> bool {
        self.network_key_set
    }

    /// Checks that provisioning is allowed and enters [`SessionState::Configuring`].
    ///
    /// Provisioning is rejected while the session is running; the address
    /// and keys are fixed for the lifetime of a running session.
    pub fn begin_configuration(&mut self) -> Result<(), Error> {
        if self.state == SessionState::Running {
            return Err(Error::InvalidState(self.state));
        }
        self.state = SessionState::Configuring;
        Ok(())
    }

    pub(crate) fn record_dev_address(&mut self, address: DevAddress) {
        self.dev_address = Some(address);
    }

    pub(crate) fn record_preferences(&mut self, preferences: NetworkPreferences) {
        self.preferences = Some(preferences);
    }

    pub(crate) fn record_app_key(&mut self) {
        self.app_key_set = true;
    }

    pub(crate) fn record_network_key(&mut self) {
        self.network_key_set = true;
    }

    /// Checks that the modem can be started from the current state
    pub fn ensure_startable(&self) -> Result<(), Error> {
        if self.state == SessionState::Running {
            return Err(Error::InvalidState(self.state));
        }
        if self.dev_address.is_none() {
            return Err(Error::NotProvisioned);
        }
        Ok(())
    }

    /// Checks that the session is running
    pub fn ensure_running(&self) -> Result<(), Error> {
        match self.state {
            SessionState::Running => Ok(()),
            other => Err(Error::InvalidState(other)),
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = SessionState::Running;
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.state = SessionState::Stopped;
    }
}
