//! Wallet Session Library
//!
//! Connects a wallet, pins it to the required chain and runs token-drop
//! claims and marketplace purchases through an injected chain gateway.

pub mod cli;
pub mod config;
pub mod contracts;
pub mod error;
pub mod gateway;
pub mod network;
pub mod orchestrator;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use contracts::{ContractGateway, ContractKind, ContractRef};
pub use error::{Error, Result};
pub use gateway::{Address, ChainGateway, ChainId, ContractHandle, TransactionReceipt};
pub use network::NetworkGuard;
pub use orchestrator::{OperationOrchestrator, OperationResult};
pub use session::{Session, SessionStatus, WalletSession};
