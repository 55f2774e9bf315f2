//! Wallet session - connection state and address resolution
//!
//! Concurrent `connect()` calls share one handshake: the first caller
//! spawns it and installs a shared handle in the in-flight slot, later
//! callers clone and await it, and every caller gets the same address or
//! the same error. The handshake runs on its own task, so it settles the
//! session even when every caller stops waiting. It only commits if its
//! slot is still current; `disconnect()` empties the slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::state::{Session, SessionStatus};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::gateway::{Address, ChainGateway, ChainId};

type Handshake = Shared<BoxFuture<'static, Result<Address>>>;

/// In-flight handshake tagged with its attempt number
type InflightSlot = Arc<Mutex<Option<(u64, Handshake)>>>;

/// Owns the wallet session and the handshake that establishes it
pub struct WalletSession {
    gateway: Arc<dyn ChainGateway>,

    /// Editor/test execution: `get_address()` returns the zero sentinel
    sandbox_execution: bool,

    connect_timeout: Option<Duration>,

    state: Arc<RwLock<Session>>,

    inflight: InflightSlot,

    attempts: AtomicU64,
}

impl WalletSession {
    /// Create a session manager over `gateway`
    pub fn new(gateway: Arc<dyn ChainGateway>, sandbox_execution: bool) -> Self {
        Self {
            gateway,
            sandbox_execution,
            connect_timeout: None,
            state: Arc::new(RwLock::new(Session::new())),
            inflight: Arc::new(Mutex::new(None)),
            attempts: AtomicU64::new(0),
        }
    }

    /// Create a session manager from the `[session]` config section
    pub fn from_config(gateway: Arc<dyn ChainGateway>, config: &SessionConfig) -> Self {
        Self::new(gateway, config.sandbox_execution).with_connect_timeout(config.connect_timeout())
    }

    /// Bound the handshake; expiry fails with `ConnectionTimeout`
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn is_sandbox_execution(&self) -> bool {
        self.sandbox_execution
    }

    /// Ask the provider whether it holds an authorized session
    pub async fn is_connected(&self) -> Result<bool> {
        self.gateway.wallet_is_connected().await
    }

    /// Connect the wallet, reusing the cached address when already connected
    pub async fn connect(&self) -> Result<Address> {
        if let Some(address) = self.state.read().await.address().cloned() {
            debug!("Session already connected as {}", address.short());
            return Ok(address);
        }

        let handshake = {
            let mut inflight = self.inflight.lock().await;
            match inflight.as_ref() {
                Some((attempt, handshake)) => {
                    debug!("Joining in-flight handshake #{}", attempt);
                    handshake.clone()
                }
                None => {
                    // A handshake may have completed since the fast-path check
                    if let Some(address) = self.state.read().await.address().cloned() {
                        return Ok(address);
                    }

                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    self.state.write().await.begin_connecting();

                    let task = tokio::spawn(Self::handshake(
                        Arc::clone(&self.gateway),
                        Arc::clone(&self.state),
                        Arc::clone(&self.inflight),
                        self.connect_timeout,
                        attempt,
                    ));
                    let handshake = async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(Error::Transport(format!(
                                "handshake task failed: {}",
                                e
                            ))),
                        }
                    }
                    .boxed()
                    .shared();
                    *inflight = Some((attempt, handshake.clone()));
                    handshake
                }
            }
        };

        handshake.await
    }

    async fn handshake(
        gateway: Arc<dyn ChainGateway>,
        state: Arc<RwLock<Session>>,
        inflight: InflightSlot,
        timeout: Option<Duration>,
        attempt: u64,
    ) -> Result<Address> {
        info!("Starting wallet handshake #{}", attempt);

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, gateway.wallet_connect()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::ConnectionTimeout(limit.as_millis() as u64)),
            },
            None => gateway.wallet_connect().await,
        };

        let mut slot = inflight.lock().await;
        if !matches!(slot.as_ref(), Some((current, _)) if *current == attempt) {
            warn!("Wallet handshake #{} superseded by disconnect", attempt);
            return Err(Error::NotConnected);
        }
        *slot = None;

        let mut session = state.write().await;
        match outcome {
            Ok(address) => {
                info!("Wallet connected as {}", address);
                session.mark_connected(address.clone());
                Ok(address)
            }
            Err(e) => {
                warn!("Wallet handshake #{} failed: {}", attempt, e);
                session.mark_disconnected();
                Err(e)
            }
        }
    }

    /// Address of the connected account
    ///
    /// Sandbox execution always yields the zero address without touching
    /// the provider.
    pub async fn get_address(&self) -> Result<Address> {
        if self.sandbox_execution {
            return Ok(Address::zero());
        }

        if !self.state.read().await.is_connected() {
            return Err(Error::NotConnected);
        }

        self.gateway.wallet_get_address().await
    }

    /// Drop the provider session and reset local state
    ///
    /// A handshake still in flight is abandoned and will not connect the
    /// session when it completes.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut inflight = self.inflight.lock().await;
            if let Some((attempt, _)) = inflight.take() {
                debug!("Abandoning in-flight handshake #{}", attempt);
            }
            self.state.write().await.mark_disconnected();
        }
        info!("Wallet session reset");
        self.gateway.wallet_disconnect().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    /// Record the chain the wallet was observed on
    pub(crate) async fn record_active_chain(&self, chain_id: ChainId) {
        let mut session = self.state.write().await;
        if session.is_connected() {
            session.observe_chain(chain_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FixedApproval, GatewayCall, SimulatedGateway, SimulatedWalletConfig};
    use tokio_test::assert_ok;

    fn simulated(approval: FixedApproval, handshake_delay_ms: u64) -> Arc<SimulatedGateway> {
        let config = SimulatedWalletConfig {
            handshake_delay_ms,
            ..SimulatedWalletConfig::default()
        };
        Arc::new(SimulatedGateway::new(config, Arc::new(approval)))
    }

    async fn handshakes(gw: &SimulatedGateway) -> usize {
        gw.count_calls(|c| *c == GatewayCall::Connect).await
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let gw = simulated(FixedApproval::all(), 0);
        let session = WalletSession::new(gw.clone(), false);

        let first = session.connect().await.unwrap();
        let second = session.connect().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(handshakes(&gw).await, 1);
        assert_eq!(session.status().await, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn test_concurrent_connects_share_one_handshake() {
        let gw = simulated(FixedApproval::all(), 50);
        let session = WalletSession::new(gw.clone(), false);

        let (a, b, c) = tokio::join!(session.connect(), session.connect(), session.connect());

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
        assert_eq!(handshakes(&gw).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_rejection() {
        let gw = simulated(
            FixedApproval {
                connect: false,
                ..FixedApproval::all()
            },
            30,
        );
        let session = WalletSession::new(gw.clone(), false);

        let (a, b) = tokio::join!(session.connect(), session.connect());

        assert!(matches!(a, Err(Error::ConnectionRejected(_))));
        assert_eq!(a, b);
        assert_eq!(handshakes(&gw).await, 1);
    }

    #[tokio::test]
    async fn test_status_is_connecting_during_handshake() {
        let gw = simulated(FixedApproval::all(), 100);
        let session = Arc::new(WalletSession::new(gw.clone(), false));

        let connecting = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.connect().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.status().await, SessionStatus::Connecting);
        assert!(session.snapshot().await.address().is_none());

        connecting.await.unwrap().unwrap();
        assert_eq!(session.status().await, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn test_rejection_resets_and_next_call_retries() {
        let gw = simulated(
            FixedApproval {
                connect: false,
                ..FixedApproval::all()
            },
            0,
        );
        let session = WalletSession::new(gw.clone(), false);

        let first = session.connect().await;
        assert!(matches!(first, Err(Error::ConnectionRejected(_))));
        assert_eq!(session.status().await, SessionStatus::Disconnected);

        // A fresh call starts a new handshake rather than replaying the failure
        let second = session.connect().await;
        assert!(second.is_err());
        assert_eq!(handshakes(&gw).await, 2);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let gw = simulated(FixedApproval::all(), 500);
        let session = WalletSession::new(gw.clone(), false)
            .with_connect_timeout(Some(Duration::from_millis(20)));

        let result = session.connect().await;

        assert_eq!(result, Err(Error::ConnectionTimeout(20)));
        assert_eq!(session.status().await, SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_sandbox_address_is_zero_without_provider() {
        let gw = simulated(FixedApproval::all(), 0);
        let session = WalletSession::new(gw.clone(), true);

        for _ in 0..3 {
            let address = session.get_address().await.unwrap();
            assert_eq!(address.as_str(), "0x0000000000000000000000000000000000000000");
        }

        assert!(gw.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_address_requires_connection() {
        let gw = simulated(FixedApproval::all(), 0);
        let session = WalletSession::new(gw.clone(), false);

        assert_eq!(session.get_address().await, Err(Error::NotConnected));
        assert_eq!(gw.count_calls(|c| *c == GatewayCall::GetAddress).await, 0);

        let connected = session.connect().await.unwrap();
        assert_eq!(session.get_address().await.unwrap(), connected);
        assert_eq!(gw.count_calls(|c| *c == GatewayCall::GetAddress).await, 1);
    }

    #[tokio::test]
    async fn test_is_connected_surfaces_transport_error() {
        let gw = simulated(FixedApproval::all(), 0);
        let session = WalletSession::new(gw.clone(), false);

        assert_ok!(session.is_connected().await);

        gw.set_reachable(false);
        let result = session.is_connected().await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(session.status().await, SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_resets_session() {
        let gw = simulated(FixedApproval::all(), 0);
        let session = WalletSession::new(gw.clone(), false);

        session.connect().await.unwrap();
        session.record_active_chain(420).await;
        session.disconnect().await.unwrap();

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status(), SessionStatus::Disconnected);
        assert!(snapshot.address().is_none());
        assert!(snapshot.active_chain_id().is_none());

        // Reconnecting performs a new handshake
        session.connect().await.unwrap();
        assert_eq!(handshakes(&gw).await, 2);
    }

    #[tokio::test]
    async fn test_abandoned_connect_still_settles_session() {
        let gw = simulated(FixedApproval::all(), 100);
        let session = WalletSession::new(gw.clone(), false);

        let waited = tokio::time::timeout(Duration::from_millis(20), session.connect()).await;
        assert!(waited.is_err());
        assert_eq!(session.status().await, SessionStatus::Connecting);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(session.status().await, SessionStatus::Connected);

        // The finished handshake is reused, not repeated
        assert_ok!(session.connect().await);
        assert_eq!(handshakes(&gw).await, 1);
    }

    #[tokio::test]
    async fn test_abandoned_rejected_connect_allows_new_attempt() {
        let gw = simulated(
            FixedApproval {
                connect: false,
                ..FixedApproval::all()
            },
            50,
        );
        let session = WalletSession::new(gw.clone(), false);

        let waited = tokio::time::timeout(Duration::from_millis(10), session.connect()).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.status().await, SessionStatus::Disconnected);

        let retry = session.connect().await;
        assert!(matches!(retry, Err(Error::ConnectionRejected(_))));
        assert_eq!(handshakes(&gw).await, 2);
    }

    #[tokio::test]
    async fn test_disconnect_during_handshake_wins() {
        let gw = simulated(FixedApproval::all(), 100);
        let session = Arc::new(WalletSession::new(gw.clone(), false));

        let connecting = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.connect().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_ok!(session.disconnect().await);
        assert_eq!(connecting.await.unwrap(), Err(Error::NotConnected));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status(), SessionStatus::Disconnected);
        assert!(snapshot.address().is_none());

        // A later connect starts a fresh handshake
        assert_ok!(session.connect().await);
        assert_eq!(handshakes(&gw).await, 2);
    }
}
