//! Session state
//!
//! `address` is populated exactly when `status` is `Connected`. The only way
//! to change a [`Session`] is through the transition methods below, which
//! keep that invariant.

use serde::Serialize;
use std::fmt;

use crate::gateway::{Address, ChainId};

/// Connection status of the wallet session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => write!(f, "disconnected"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Wallet session snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    status: SessionStatus,
    address: Option<Address>,
    active_chain_id: Option<ChainId>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            address: None,
            active_chain_id: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Last chain id observed for the wallet, if any
    pub fn active_chain_id(&self) -> Option<ChainId> {
        self.active_chain_id
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub(crate) fn begin_connecting(&mut self) {
        self.status = SessionStatus::Connecting;
        self.address = None;
    }

    pub(crate) fn mark_connected(&mut self, address: Address) {
        self.status = SessionStatus::Connected;
        self.address = Some(address);
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.status = SessionStatus::Disconnected;
        self.address = None;
        self.active_chain_id = None;
    }

    pub(crate) fn observe_chain(&mut self, chain_id: ChainId) {
        self.active_chain_id = Some(chain_id);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
