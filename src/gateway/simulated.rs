//! In-process simulated wallet and contract backend
//!
//! Stands in for a real wallet provider: it keeps a connection flag and an
//! active chain, hosts token-drop and marketplace contracts, asks an
//! [`Approval`] source before every user-facing prompt, and records each
//! call it receives so callers can inspect ordering and counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{
    Address, ChainId, ContractHandle, ContractInterface, ReceiptStatus, TransactionReceipt,
};
use super::ChainGateway;
use crate::config::Config;
use crate::error::{Error, Result};

/// Prompt shown to the wallet user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalRequest {
    /// Grant the application access to the account
    Connect,
    /// Switch the wallet to another chain
    SwitchNetwork(ChainId),
    /// Sign and send a contract call
    Transaction { contract: Address, method: String },
}

/// Source of user decisions for wallet prompts
pub trait Approval: Send + Sync {
    fn approve(&self, request: &ApprovalRequest) -> bool;
}

/// Fixed answers per prompt kind
#[derive(Debug, Clone, Copy)]
pub struct FixedApproval {
    pub connect: bool,
    pub switch_network: bool,
    pub transaction: bool,
}

impl FixedApproval {
    /// Approve every prompt
    pub fn all() -> Self {
        Self {
            connect: true,
            switch_network: true,
            transaction: true,
        }
    }
}

impl Approval for FixedApproval {
    fn approve(&self, request: &ApprovalRequest) -> bool {
        match request {
            ApprovalRequest::Connect => self.connect,
            ApprovalRequest::SwitchNetwork(_) => self.switch_network,
            ApprovalRequest::Transaction { .. } => self.transaction,
        }
    }
}

/// Simulated wallet configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedWalletConfig {
    /// Account the wallet hands out after a handshake
    #[serde(default = "default_wallet_address")]
    pub address: Address,

    /// Chain the wallet starts on
    #[serde(default = "default_initial_chain")]
    pub initial_chain_id: ChainId,

    /// Chains the wallet knows how to switch to
    #[serde(default = "default_supported_chains")]
    pub supported_chains: Vec<ChainId>,

    /// Time the handshake takes before the user answers
    #[serde(default)]
    pub handshake_delay_ms: u64,

    /// Time a contract call takes to be mined
    #[serde(default)]
    pub call_delay_ms: u64,

    /// Listings seeded into the marketplace
    #[serde(default = "default_listings")]
    pub listings: Vec<Listing>,
}

fn default_wallet_address() -> Address {
    Address::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
        .unwrap_or_else(|_| Address::zero())
}

fn default_initial_chain() -> ChainId {
    1
}

fn default_supported_chains() -> Vec<ChainId> {
    vec![1, 5, 10, 420]
}

fn default_listings() -> Vec<Listing> {
    vec![
        Listing::new("0", 5),
        Listing::new("1", 1),
        Listing::new("2", 0),
    ]
}

impl Default for SimulatedWalletConfig {
    fn default() -> Self {
        Self {
            address: default_wallet_address(),
            initial_chain_id: default_initial_chain(),
            supported_chains: default_supported_chains(),
            handshake_delay_ms: 0,
            call_delay_ms: 0,
            listings: default_listings(),
        }
    }
}

/// Marketplace listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    /// Units still available for purchase
    pub quantity: u64,
}

impl Listing {
    pub fn new(id: impl Into<String>, quantity: u64) -> Self {
        Self {
            id: id.into(),
            quantity,
        }
    }
}

/// A call received by the simulated gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    IsConnected,
    Connect,
    SwitchNetwork(ChainId),
    GetAddress,
    ChainId,
    Disconnect,
    Resolve(Address),
    ContractCall {
        contract: Address,
        interface: ContractInterface,
        method: String,
        args: Vec<String>,
    },
}

#[derive(Debug)]
struct WalletState {
    connected: bool,
    chain_id: ChainId,
}

/// In-memory wallet provider and contract host
pub struct SimulatedGateway {
    config: SimulatedWalletConfig,
    approval: Arc<dyn Approval>,
    reachable: AtomicBool,
    state: RwLock<WalletState>,
    /// Deployed contracts: address -> (chain, kind)
    contracts: DashMap<Address, (ChainId, ContractInterface)>,
    listings: DashMap<String, Listing>,
    /// Token-drop balances per claimer
    balances: DashMap<Address, u64>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl SimulatedGateway {
    /// Create a simulated wallet with the given prompt source
    pub fn new(config: SimulatedWalletConfig, approval: Arc<dyn Approval>) -> Self {
        let listings = DashMap::new();
        for listing in &config.listings {
            listings.insert(listing.id.clone(), listing.clone());
        }

        Self {
            state: RwLock::new(WalletState {
                connected: false,
                chain_id: config.initial_chain_id,
            }),
            config,
            approval,
            reachable: AtomicBool::new(true),
            contracts: DashMap::new(),
            listings,
            balances: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Simulated wallet with the configured contracts deployed on the target chain
    pub fn for_deployment(config: &Config, approval: Arc<dyn Approval>) -> Result<Self> {
        let gateway = Self::new(config.simulation.clone(), approval);
        gateway.deploy_token_drop(
            Address::parse(&config.contracts.token_drop)?,
            config.chain.chain_id,
        );
        gateway.deploy_marketplace(
            Address::parse(&config.contracts.marketplace)?,
            config.chain.chain_id,
        );
        Ok(gateway)
    }

    /// Deploy a token-drop contract at `address` on `chain_id`
    pub fn deploy_token_drop(&self, address: Address, chain_id: ChainId) {
        debug!("Simulated token drop deployed at {} on chain {}", address, chain_id);
        self.contracts.insert(address, (chain_id, ContractInterface::TokenDrop));
    }

    /// Deploy a marketplace contract at `address` on `chain_id`
    pub fn deploy_marketplace(&self, address: Address, chain_id: ChainId) {
        debug!("Simulated marketplace deployed at {} on chain {}", address, chain_id);
        self.contracts.insert(address, (chain_id, ContractInterface::Marketplace));
    }

    /// Add or replace a marketplace listing
    pub fn add_listing(&self, listing: Listing) {
        self.listings.insert(listing.id.clone(), listing);
    }

    /// Remaining quantity of a listing
    pub fn listing_quantity(&self, id: &str) -> Option<u64> {
        self.listings.get(id).map(|l| l.quantity)
    }

    /// Tokens claimed by `address`
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.balances.get(address).map(|b| *b).unwrap_or(0)
    }

    /// Make the provider (un)reachable
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulate the user switching chains from the wallet UI
    pub async fn force_chain(&self, chain_id: ChainId) {
        info!("Wallet switched to chain {} out-of-band", chain_id);
        self.state.write().await.chain_id = chain_id;
    }

    /// Current wallet chain
    pub async fn current_chain(&self) -> ChainId {
        self.state.read().await.chain_id
    }

    /// Every call received so far, in order
    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    /// Number of recorded calls matching `predicate`
    pub async fn count_calls<F>(&self, predicate: F) -> usize
    where
        F: Fn(&GatewayCall) -> bool,
    {
        self.calls.lock().await.iter().filter(|c| predicate(c)).count()
    }

    async fn record(&self, call: GatewayCall) {
        self.calls.lock().await.push(call);
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Transport("wallet provider not responding".to_string()))
        }
    }

    async fn ask(&self, request: ApprovalRequest) -> Result<bool> {
        let approval = Arc::clone(&self.approval);
        tokio::task::spawn_blocking(move || approval.approve(&request))
            .await
            .map_err(|e| Error::Transport(format!("approval prompt failed: {}", e)))
    }

    fn receipt(contract: &Address, method: &str, status: ReceiptStatus) -> TransactionReceipt {
        TransactionReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            contract: contract.clone(),
            method: method.to_string(),
            status,
            block_timestamp: Utc::now(),
        }
    }

    fn claim(&self, handle: &ContractHandle, args: &[String]) -> Result<Vec<TransactionReceipt>> {
        let quantity = args
            .first()
            .and_then(|q| q.parse::<u64>().ok())
            .ok_or_else(|| Error::Invoke {
                method: "claim".to_string(),
                reason: format!("invalid quantity {:?}", args.first()),
            })?;

        let claimer = self.config.address.clone();
        *self.balances.entry(claimer.clone()).or_insert(0) += quantity;
        info!("Simulated claim: {} tokens to {}", quantity, claimer.short());

        Ok(vec![Self::receipt(&handle.address, "claim", ReceiptStatus::Confirmed)])
    }

    fn buy_listing(
        &self,
        handle: &ContractHandle,
        args: &[String],
    ) -> Result<Vec<TransactionReceipt>> {
        let (listing_id, quantity) = match args {
            [id, qty] => (
                id.clone(),
                qty.parse::<u64>().map_err(|_| Error::Invoke {
                    method: "buyListing".to_string(),
                    reason: format!("invalid quantity {:?}", qty),
                })?,
            ),
            _ => {
                return Err(Error::Invoke {
                    method: "buyListing".to_string(),
                    reason: format!("expected 2 arguments, got {}", args.len()),
                })
            }
        };

        let mut listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or_else(|| Error::ListingNotFound(listing_id.clone()))?;

        if listing.quantity < quantity {
            warn!(
                "Listing {} has {} units, {} requested",
                listing_id, listing.quantity, quantity
            );
            return Ok(vec![Self::receipt(
                &handle.address,
                "buyListing",
                ReceiptStatus::Reverted("insufficient listing quantity".to_string()),
            )]);
        }

        listing.quantity -= quantity;
        info!("Simulated purchase: listing {} x{}", listing_id, quantity);

        Ok(vec![Self::receipt(
            &handle.address,
            "buyListing",
            ReceiptStatus::Confirmed,
        )])
    }
}

#[async_trait]
impl ChainGateway for SimulatedGateway {
    async fn wallet_is_connected(&self) -> Result<bool> {
        self.record(GatewayCall::IsConnected).await;
        self.ensure_reachable()?;
        Ok(self.state.read().await.connected)
    }

    async fn wallet_connect(&self) -> Result<Address> {
        self.record(GatewayCall::Connect).await;
        self.ensure_reachable()?;

        if self.config.handshake_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.handshake_delay_ms)).await;
        }

        if !self.ask(ApprovalRequest::Connect).await? {
            return Err(Error::ConnectionRejected(
                "user rejected the connection request".to_string(),
            ));
        }

        self.state.write().await.connected = true;
        Ok(self.config.address.clone())
    }

    async fn wallet_switch_network(&self, chain_id: ChainId) -> Result<()> {
        self.record(GatewayCall::SwitchNetwork(chain_id)).await;
        self.ensure_reachable()?;

        if !self.config.supported_chains.contains(&chain_id) {
            return Err(Error::UnsupportedChain(chain_id));
        }

        if !self.ask(ApprovalRequest::SwitchNetwork(chain_id)).await? {
            return Err(Error::NetworkSwitchRejected {
                chain_id,
                reason: "user rejected the network switch".to_string(),
            });
        }

        self.state.write().await.chain_id = chain_id;
        Ok(())
    }

    async fn wallet_get_address(&self) -> Result<Address> {
        self.record(GatewayCall::GetAddress).await;
        self.ensure_reachable()?;

        if !self.state.read().await.connected {
            return Err(Error::NotConnected);
        }
        Ok(self.config.address.clone())
    }

    async fn resolve_contract(&self, address: &Address) -> Result<ContractHandle> {
        self.record(GatewayCall::Resolve(address.clone())).await;
        self.ensure_reachable()?;

        let deployed = self
            .contracts
            .get(address)
            .ok_or_else(|| Error::ContractResolution {
                address: address.to_string(),
                reason: "no contract deployed at address".to_string(),
            })?;
        let (chain_id, _) = *deployed;

        Ok(ContractHandle {
            address: address.clone(),
            chain_id,
            interface: ContractInterface::Base,
        })
    }

    async fn contract_call(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[String],
    ) -> Result<Vec<TransactionReceipt>> {
        self.record(GatewayCall::ContractCall {
            contract: handle.address.clone(),
            interface: handle.interface,
            method: method.to_string(),
            args: args.to_vec(),
        })
        .await;
        self.ensure_reachable()?;

        {
            let state = self.state.read().await;
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if state.chain_id != handle.chain_id {
                return Err(Error::Invoke {
                    method: method.to_string(),
                    reason: format!(
                        "wallet is on chain {}, contract lives on chain {}",
                        state.chain_id, handle.chain_id
                    ),
                });
            }
        }

        let deployed_kind = self.contracts.get(&handle.address).map(|c| c.1);
        if deployed_kind != Some(handle.interface) {
            return Err(Error::Invoke {
                method: method.to_string(),
                reason: format!("contract does not expose the {} interface", handle.interface),
            });
        }

        let request = ApprovalRequest::Transaction {
            contract: handle.address.clone(),
            method: method.to_string(),
        };
        if !self.ask(request).await? {
            return Err(Error::Invoke {
                method: method.to_string(),
                reason: "user rejected the transaction".to_string(),
            });
        }

        if self.config.call_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.call_delay_ms)).await;
        }

        match (handle.interface, method) {
            (ContractInterface::TokenDrop, "claim") => self.claim(handle, args),
            (ContractInterface::Marketplace, "buyListing") => self.buy_listing(handle, args),
            _ => Err(Error::Invoke {
                method: method.to_string(),
                reason: format!("unknown method on {} interface", handle.interface),
            }),
        }
    }

    async fn wallet_chain_id(&self) -> Result<Option<ChainId>> {
        self.record(GatewayCall::ChainId).await;
        self.ensure_reachable()?;
        Ok(Some(self.state.read().await.chain_id))
    }

    async fn wallet_disconnect(&self) -> Result<()> {
        self.record(GatewayCall::Disconnect).await;
        self.state.write().await.connected = false;
        Ok(())
    }
}
