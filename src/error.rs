//! Error types for the wallet session core

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for session, network and contract operations.
///
/// `Clone` so a single in-flight handshake can hand the same failure to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Connection errors
    #[error("Wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Wallet connection timed out after {0}ms")]
    ConnectionTimeout(u64),

    #[error("Wallet is not connected")]
    NotConnected,

    // Network errors
    #[error("Network switch to chain {chain_id} rejected: {reason}")]
    NetworkSwitchRejected { chain_id: u64, reason: String },

    #[error("Wallet provider cannot switch to chain {0}")]
    UnsupportedChain(u64),

    // Contract errors
    #[error("Contract resolution failed for {address}: {reason}")]
    ContractResolution { address: String, reason: String },

    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    #[error("Contract call {method} failed: {reason}")]
    Invoke { method: String, reason: String },

    #[error("Operation timed out after {0}ms")]
    OperationTimeout(u64),

    // Provider errors
    #[error("Wallet provider unreachable: {0}")]
    Transport(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_) | Error::Transport(_) | Error::OperationTimeout(_)
        )
    }

    /// Check if this error came from the user declining a wallet prompt
    pub fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            Error::ConnectionRejected(_) | Error::NetworkSwitchRejected { .. }
        )
    }
}
