//! Contract gateway - lazily resolved, memoized contract handles

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ContractsConfig;
use crate::error::{Error, Result};
use crate::gateway::{Address, ChainGateway, ContractHandle, ContractInterface};

/// Logical contracts the orchestrator works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    TokenDrop,
    Marketplace,
}

impl ContractKind {
    /// Interface a handle of this kind is scoped to
    pub fn interface(&self) -> ContractInterface {
        match self {
            ContractKind::TokenDrop => ContractInterface::TokenDrop,
            ContractKind::Marketplace => ContractInterface::Marketplace,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::TokenDrop => write!(f, "token-drop"),
            ContractKind::Marketplace => write!(f, "marketplace"),
        }
    }
}

/// Resolved contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRef {
    pub kind: ContractKind,
    pub address: Address,
    pub handle: ContractHandle,
}

/// Resolves the deployment's contracts through the chain gateway
///
/// Resolution does not need a wallet connection. Successful resolutions are
/// cached for the lifetime of the gateway; failures are not.
pub struct ContractGateway {
    gateway: Arc<dyn ChainGateway>,
    token_drop_address: String,
    marketplace_address: String,
    token_drop: OnceCell<ContractRef>,
    marketplace: OnceCell<ContractRef>,
}

impl ContractGateway {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        token_drop_address: impl Into<String>,
        marketplace_address: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            token_drop_address: token_drop_address.into(),
            marketplace_address: marketplace_address.into(),
            token_drop: OnceCell::new(),
            marketplace: OnceCell::new(),
        }
    }

    pub fn from_config(gateway: Arc<dyn ChainGateway>, config: &ContractsConfig) -> Self {
        Self::new(gateway, &config.token_drop, &config.marketplace)
    }

    /// Token-drop contract handle
    pub async fn token_drop_contract(&self) -> Result<ContractRef> {
        self.contract(ContractKind::TokenDrop).await
    }

    /// Marketplace contract handle, scoped to the marketplace interface
    pub async fn marketplace_contract(&self) -> Result<ContractRef> {
        self.contract(ContractKind::Marketplace).await
    }

    async fn contract(&self, kind: ContractKind) -> Result<ContractRef> {
        let (cell, raw_address) = match kind {
            ContractKind::TokenDrop => (&self.token_drop, &self.token_drop_address),
            ContractKind::Marketplace => (&self.marketplace, &self.marketplace_address),
        };

        cell.get_or_try_init(|| self.resolve(kind, raw_address))
            .await
            .cloned()
    }

    async fn resolve(&self, kind: ContractKind, raw_address: &str) -> Result<ContractRef> {
        let address = Address::parse(raw_address).map_err(|_| Error::ContractResolution {
            address: raw_address.to_string(),
            reason: "malformed contract address".to_string(),
        })?;

        debug!("Resolving {} contract at {}", kind, address);

        let handle = self
            .gateway
            .resolve_contract(&address)
            .await
            .map_err(|e| match e {
                Error::ContractResolution { .. } => e,
                other => Error::ContractResolution {
                    address: address.to_string(),
                    reason: other.to_string(),
                },
            })?;

        Ok(ContractRef {
            kind,
            handle: handle.scoped(kind.interface()),
            address,
        })
    }
}
