//! Chain gateway capability
//!
//! The core never talks to a wallet or an RPC node directly. Everything it
//! needs from the outside world goes through [`ChainGateway`], which is
//! injected at construction as an `Arc<dyn ChainGateway>`.
//!
//! # Architecture
//!
//! ```text
//! OperationOrchestrator
//!     ├── WalletSession    ── wallet_connect / wallet_get_address
//!     ├── NetworkGuard     ── wallet_chain_id / wallet_switch_network
//!     └── ContractGateway  ── resolve_contract
//!                 │
//!                 └── contract_call
//! ```

pub mod simulated;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use simulated::{
    Approval, ApprovalRequest, FixedApproval, GatewayCall, Listing, SimulatedGateway,
    SimulatedWalletConfig,
};
pub use types::{
    Address, ChainId, ContractHandle, ContractInterface, ReceiptStatus, TransactionReceipt,
};

/// Capability interface to the wallet provider and contract backend.
///
/// Implementations map their own failures onto the crate [`Error`](crate::Error)
/// taxonomy: a user declining the handshake is `ConnectionRejected`, an
/// unknown listing is `ListingNotFound`, an unreachable provider is
/// `Transport`, and so on.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Whether the provider currently holds an authorized session.
    async fn wallet_is_connected(&self) -> Result<bool>;

    /// Run the wallet handshake. May prompt a human and take arbitrarily long.
    async fn wallet_connect(&self) -> Result<Address>;

    /// Ask the wallet to switch to `chain_id`.
    async fn wallet_switch_network(&self, chain_id: ChainId) -> Result<()>;

    /// Address of the connected account.
    async fn wallet_get_address(&self) -> Result<Address>;

    /// Resolve a callable handle for the contract at `address`.
    async fn resolve_contract(&self, address: &Address) -> Result<ContractHandle>;

    /// Invoke `method` on a resolved contract.
    async fn contract_call(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[String],
    ) -> Result<Vec<TransactionReceipt>>;

    /// Chain the wallet is currently on, if the provider can report it.
    async fn wallet_chain_id(&self) -> Result<Option<ChainId>> {
        Ok(None)
    }

    /// Drop the provider-side session.
    async fn wallet_disconnect(&self) -> Result<()> {
        Ok(())
    }
}
