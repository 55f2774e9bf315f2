//! Network guard - pins the wallet to the required chain
//!
//! Runs on every operation entry, after `connect()`. The user can switch
//! chains in their wallet between calls, so the check is repeated even when
//! the session was already connected.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::gateway::{ChainGateway, ChainId};
use crate::session::WalletSession;

/// Ensures the wallet is on the target chain before contract calls
pub struct NetworkGuard {
    gateway: Arc<dyn ChainGateway>,
    target: ChainId,
    network: String,
}

impl NetworkGuard {
    pub fn new(gateway: Arc<dyn ChainGateway>, target: ChainId) -> Self {
        Self {
            gateway,
            target,
            network: format!("chain-{}", target),
        }
    }

    pub fn from_config(gateway: Arc<dyn ChainGateway>, config: &ChainConfig) -> Self {
        Self {
            gateway,
            target: config.chain_id,
            network: config.network.clone(),
        }
    }

    /// Required chain id
    pub fn target(&self) -> ChainId {
        self.target
    }

    /// Switch the wallet to the target chain if it is elsewhere
    ///
    /// On failure the session stays connected with its previous chain id so
    /// a retry re-enters this check without a new handshake.
    pub async fn ensure_chain(&self, session: &WalletSession) -> Result<()> {
        let snapshot = session.snapshot().await;
        if !snapshot.is_connected() {
            return Err(Error::NotConnected);
        }

        let active = match self.gateway.wallet_chain_id().await? {
            Some(chain_id) => {
                session.record_active_chain(chain_id).await;
                Some(chain_id)
            }
            None => snapshot.active_chain_id(),
        };

        if active == Some(self.target) {
            debug!("Wallet already on {} ({})", self.network, self.target);
            return Ok(());
        }

        info!(
            "Switching wallet from chain {} to {} ({})",
            active.map_or_else(|| "unknown".to_string(), |id| id.to_string()),
            self.target,
            self.network
        );

        if let Err(e) = self.gateway.wallet_switch_network(self.target).await {
            warn!("Network switch to {} failed: {}", self.target, e);
            return Err(e);
        }

        session.record_active_chain(self.target).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        Address, ContractHandle, FixedApproval, GatewayCall, SimulatedGateway,
        SimulatedWalletConfig, TransactionReceipt,
    };
    use crate::session::SessionStatus;
    use async_trait::async_trait;

    fn simulated(approval: FixedApproval, initial_chain_id: ChainId) -> Arc<SimulatedGateway> {
        let config = SimulatedWalletConfig {
            initial_chain_id,
            ..SimulatedWalletConfig::default()
        };
        Arc::new(SimulatedGateway::new(config, Arc::new(approval)))
    }

    async fn switches(gw: &SimulatedGateway) -> usize {
        gw.count_calls(|c| matches!(c, GatewayCall::SwitchNetwork(_))).await
    }

    #[tokio::test]
    async fn test_no_switch_when_on_target() {
        let gw = simulated(FixedApproval::all(), 420);
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw.clone(), 420);

        session.connect().await.unwrap();
        guard.ensure_chain(&session).await.unwrap();

        assert_eq!(switches(&gw).await, 0);
        assert_eq!(session.snapshot().await.active_chain_id(), Some(420));
    }

    #[tokio::test]
    async fn test_switches_once_when_on_other_chain() {
        let gw = simulated(FixedApproval::all(), 1);
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw.clone(), 420);

        session.connect().await.unwrap();
        guard.ensure_chain(&session).await.unwrap();
        guard.ensure_chain(&session).await.unwrap();

        assert_eq!(gw.count_calls(|c| *c == GatewayCall::SwitchNetwork(420)).await, 1);
        assert_eq!(gw.current_chain().await, 420);
        assert_eq!(session.snapshot().await.active_chain_id(), Some(420));
    }

    #[tokio::test]
    async fn test_revalidates_after_out_of_band_switch() {
        let gw = simulated(FixedApproval::all(), 420);
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw.clone(), 420);

        session.connect().await.unwrap();
        guard.ensure_chain(&session).await.unwrap();

        gw.force_chain(5).await;
        guard.ensure_chain(&session).await.unwrap();

        assert_eq!(switches(&gw).await, 1);
        assert_eq!(gw.current_chain().await, 420);
    }

    #[tokio::test]
    async fn test_rejected_switch_keeps_session_connected() {
        let gw = simulated(
            FixedApproval {
                switch_network: false,
                ..FixedApproval::all()
            },
            1,
        );
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw.clone(), 420);

        session.connect().await.unwrap();
        let result = guard.ensure_chain(&session).await;

        assert!(matches!(
            result,
            Err(Error::NetworkSwitchRejected { chain_id: 420, .. })
        ));
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status(), SessionStatus::Connected);
        assert_eq!(snapshot.active_chain_id(), Some(1));
    }

    #[tokio::test]
    async fn test_unsupported_chain() {
        let gw = simulated(FixedApproval::all(), 1);
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw.clone(), 31_337);

        session.connect().await.unwrap();
        let result = guard.ensure_chain(&session).await;

        assert_eq!(result, Err(Error::UnsupportedChain(31_337)));
    }

    #[tokio::test]
    async fn test_requires_connected_session() {
        let gw = simulated(FixedApproval::all(), 1);
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw.clone(), 420);

        assert_eq!(guard.ensure_chain(&session).await, Err(Error::NotConnected));
        assert!(gw.calls().await.is_empty());
    }

    /// Provider that cannot report its active chain
    struct BlindGateway(Arc<SimulatedGateway>);

    #[async_trait]
    impl ChainGateway for BlindGateway {
        async fn wallet_is_connected(&self) -> Result<bool> {
            self.0.wallet_is_connected().await
        }

        async fn wallet_connect(&self) -> Result<Address> {
            self.0.wallet_connect().await
        }

        async fn wallet_switch_network(&self, chain_id: ChainId) -> Result<()> {
            self.0.wallet_switch_network(chain_id).await
        }

        async fn wallet_get_address(&self) -> Result<Address> {
            self.0.wallet_get_address().await
        }

        async fn resolve_contract(&self, address: &Address) -> Result<ContractHandle> {
            self.0.resolve_contract(address).await
        }

        async fn contract_call(
            &self,
            handle: &ContractHandle,
            method: &str,
            args: &[String],
        ) -> Result<Vec<TransactionReceipt>> {
            self.0.contract_call(handle, method, args).await
        }
    }

    #[tokio::test]
    async fn test_unknown_chain_switches_then_trusts_cache() {
        let sim = simulated(FixedApproval::all(), 420);
        let gw: Arc<dyn ChainGateway> = Arc::new(BlindGateway(sim.clone()));
        let session = WalletSession::new(gw.clone(), false);
        let guard = NetworkGuard::new(gw, 420);

        session.connect().await.unwrap();
        guard.ensure_chain(&session).await.unwrap();
        guard.ensure_chain(&session).await.unwrap();

        assert_eq!(switches(&sim).await, 1);
        assert_eq!(session.snapshot().await.active_chain_id(), Some(420));
    }
}
