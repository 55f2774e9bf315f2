//! Operation orchestrator - claim and buy flows
//!
//! Both operations follow the same path:
//!
//! ```text
//! Start → EnsureConnected → EnsureChain → ResolveContract → Invoke → {Success, Failed}
//! ```
//!
//! Resolution does not depend on the connection, so `claim` resolves first
//! and `buy_item` resolves after the chain check. The connection and chain
//! check always complete before the contract is invoked. Errors from every
//! step are returned unchanged; nothing is retried here.
//!
//! The orchestrator does not serialize operations. Two concurrent calls
//! share the handshake but may race at the provider when both invoke.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, OperationsConfig};
use crate::contracts::{ContractGateway, ContractRef};
use crate::error::{Error, Result};
use crate::gateway::{Address, ChainGateway, ReceiptStatus, TransactionReceipt};
use crate::network::NetworkGuard;
use crate::session::WalletSession;

/// Outcome of a completed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub receipts: Vec<TransactionReceipt>,
}

/// Runs claim and buy operations against the configured contracts
pub struct OperationOrchestrator {
    gateway: Arc<dyn ChainGateway>,
    session: Arc<WalletSession>,
    network: NetworkGuard,
    contracts: ContractGateway,
    claim_quantity: String,
    buy_quantity: u64,
    invoke_timeout: Option<Duration>,
}

impl OperationOrchestrator {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        session: Arc<WalletSession>,
        network: NetworkGuard,
        contracts: ContractGateway,
    ) -> Self {
        let defaults = OperationsConfig::default();
        let invoke_timeout = defaults.invoke_timeout();
        Self {
            gateway,
            session,
            network,
            contracts,
            claim_quantity: defaults.claim_quantity,
            buy_quantity: defaults.buy_quantity,
            invoke_timeout,
        }
    }

    /// Wire every component from configuration over one gateway
    pub fn from_config(gateway: Arc<dyn ChainGateway>, config: &Config) -> Self {
        let session = Arc::new(WalletSession::from_config(
            Arc::clone(&gateway),
            &config.session,
        ));
        let network = NetworkGuard::from_config(Arc::clone(&gateway), &config.chain);
        let contracts = ContractGateway::from_config(Arc::clone(&gateway), &config.contracts);

        Self::new(gateway, session, network, contracts).with_operations(&config.operations)
    }

    pub fn with_operations(mut self, operations: &OperationsConfig) -> Self {
        self.claim_quantity = operations.claim_quantity.clone();
        self.buy_quantity = operations.buy_quantity;
        self.invoke_timeout = operations.invoke_timeout();
        self
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn network(&self) -> &NetworkGuard {
        &self.network
    }

    pub fn contracts(&self) -> &ContractGateway {
        &self.contracts
    }

    /// Claim the configured quantity from the token-drop contract
    pub async fn claim(&self) -> Result<OperationResult> {
        info!("Claiming {} tokens", self.claim_quantity);

        let contract = self.contracts.token_drop_contract().await?;
        let address = self.ensure_ready().await?;
        debug!("Claiming as {}", address.short());

        let args = [self.claim_quantity.clone()];
        self.invoke(&contract, "claim", &args).await
    }

    /// Buy one unit of a marketplace listing
    pub async fn buy_item(&self, item_id: &str) -> Result<OperationResult> {
        let item_id = item_id.trim();
        if item_id.is_empty() {
            return Err(Error::ListingNotFound(item_id.to_string()));
        }

        info!("Buying listing {} x{}", item_id, self.buy_quantity);

        let address = self.ensure_ready().await?;
        debug!("Buying as {}", address.short());

        let contract = self.contracts.marketplace_contract().await?;
        let args = [item_id.to_string(), self.buy_quantity.to_string()];
        self.invoke(&contract, "buyListing", &args).await
    }

    /// Connect (idempotent) then re-validate the chain
    async fn ensure_ready(&self) -> Result<Address> {
        let address = self.session.connect().await?;
        self.network.ensure_chain(&self.session).await?;
        Ok(address)
    }

    async fn invoke(
        &self,
        contract: &ContractRef,
        method: &str,
        args: &[String],
    ) -> Result<OperationResult> {
        debug!(
            "Invoking {} on {} contract {} with {:?}",
            method,
            contract.kind,
            contract.address.short(),
            args
        );

        let call = self.gateway.contract_call(&contract.handle, method, args);
        let receipts = match self.invoke_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::OperationTimeout(limit.as_millis() as u64))??,
            None => call.await?,
        };

        if receipts.is_empty() {
            return Err(Error::Invoke {
                method: method.to_string(),
                reason: "no receipt returned".to_string(),
            });
        }

        let reverted = receipts.iter().find_map(|r| match &r.status {
            ReceiptStatus::Reverted(reason) => Some(reason.clone()),
            ReceiptStatus::Confirmed => None,
        });
        if let Some(reason) = reverted {
            warn!("{} reverted: {}", method, reason);
            return Err(Error::Invoke {
                method: method.to_string(),
                reason: format!("transaction reverted: {}", reason),
            });
        }

        info!(
            "{} confirmed in {} transaction(s): {}",
            method,
            receipts.len(),
            receipts
                .iter()
                .map(|r| r.tx_hash.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(OperationResult {
            success: true,
            receipts,
        })
    }
}
