//! CLI command implementations
//!
//! Every command runs the core against an in-process simulated wallet. The
//! wallet's prompts are answered on the terminal unless `--yes` is given.

use anyhow::Result;
use backoff::{future::retry, ExponentialBackoff};
use dialoguer::Confirm;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, RetryConfig};
use crate::error::Error;
use crate::gateway::{
    Address, Approval, ApprovalRequest, FixedApproval, SimulatedGateway, TransactionReceipt,
};
use crate::orchestrator::{OperationOrchestrator, OperationResult};
use crate::session::WalletSession;

/// Answers wallet prompts on the terminal
pub struct ConsoleApproval;

impl Approval for ConsoleApproval {
    fn approve(&self, request: &ApprovalRequest) -> bool {
        let prompt = match request {
            ApprovalRequest::Connect => "Connect wallet to this application?".to_string(),
            ApprovalRequest::SwitchNetwork(chain_id) => {
                format!("Switch wallet network to chain {}?", chain_id)
            }
            ApprovalRequest::Transaction { contract, method } => {
                format!("Sign and send {} to {}?", method, contract)
            }
        };

        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!("Prompt failed, treating as rejection: {}", e);
                false
            })
    }
}

/// Simulated wallet plus an orchestrator wired over it
fn build(
    config: &Config,
    auto_approve: bool,
) -> Result<(Arc<SimulatedGateway>, OperationOrchestrator)> {
    let approval: Arc<dyn Approval> = if auto_approve {
        Arc::new(FixedApproval::all())
    } else {
        Arc::new(ConsoleApproval)
    };

    let gateway = Arc::new(SimulatedGateway::for_deployment(config, approval)?);
    let orchestrator = OperationOrchestrator::from_config(gateway.clone(), config);
    Ok((gateway, orchestrator))
}

/// Connect with exponential backoff on transient failures
///
/// Retrying is a caller policy; the session itself never retries.
pub async fn connect_with_retry(
    session: &WalletSession,
    policy: &RetryConfig,
) -> Result<Address, Error> {
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(policy.initial_interval_ms),
        max_interval: Duration::from_millis(policy.max_interval_ms),
        max_elapsed_time: Some(Duration::from_millis(policy.max_elapsed_ms)),
        ..Default::default()
    };

    retry(backoff, || async {
        match session.connect().await {
            Ok(address) => Ok(address),
            Err(e) if e.is_retryable() => {
                warn!("Retryable connect error: {}", e);
                Err(backoff::Error::transient(e))
            }
            Err(e) => {
                error!("Permanent connect error: {}", e);
                Err(backoff::Error::permanent(e))
            }
        }
    })
    .await
}

fn print_receipts(receipts: &[TransactionReceipt]) {
    for receipt in receipts {
        println!(
            "  {} {} at {} ({:?})",
            receipt.method,
            receipt.tx_hash,
            receipt.block_timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            receipt.status
        );
    }
}

fn report(result: &OperationResult) {
    if result.success {
        println!("\nTransaction confirmed!");
    } else {
        println!("\nTransaction did not succeed");
    }
    print_receipts(&result.receipts);
}

/// Claim the configured token-drop allocation
pub async fn claim(config: &Config, auto_approve: bool) -> Result<()> {
    let (gateway, orchestrator) = build(config, auto_approve)?;

    let address = connect_with_retry(orchestrator.session(), &config.retry).await?;
    info!("Connected as {}", address);

    let result = orchestrator.claim().await?;
    report(&result);
    println!("Balance: {} tokens", gateway.balance_of(&address));
    Ok(())
}

/// Buy one unit of a marketplace listing
pub async fn buy(config: &Config, item_id: &str, auto_approve: bool) -> Result<()> {
    let (gateway, orchestrator) = build(config, auto_approve)?;

    connect_with_retry(orchestrator.session(), &config.retry).await?;

    match orchestrator.buy_item(item_id).await {
        Ok(result) => {
            report(&result);
            if let Some(left) = gateway.listing_quantity(item_id.trim()) {
                println!("Listing {}: {} left", item_id.trim(), left);
            }
            Ok(())
        }
        Err(Error::ListingNotFound(id)) => {
            anyhow::bail!("No listing with id {:?} in the marketplace", id)
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the wallet address
pub async fn address(config: &Config, auto_approve: bool) -> Result<()> {
    let (_gateway, orchestrator) = build(config, auto_approve)?;
    let session = orchestrator.session();

    if !session.is_sandbox_execution() {
        connect_with_retry(session, &config.retry).await?;
    }

    println!("{}", session.get_address().await?);
    Ok(())
}

/// Connect, pin the chain and print the session as JSON
pub async fn status(config: &Config, auto_approve: bool) -> Result<()> {
    let (_gateway, orchestrator) = build(config, auto_approve)?;
    let session = orchestrator.session();

    println!("\n=== WALLET SESSION ===\n");

    print!("Provider... ");
    match session.is_connected().await {
        Ok(connected) => println!("OK (authorized: {})", connected),
        Err(e) => {
            println!("FAILED: {}", e);
            return Err(e.into());
        }
    }

    connect_with_retry(session, &config.retry).await?;

    print!("Network {}... ", orchestrator.network().target());
    match orchestrator.network().ensure_chain(session).await {
        Ok(()) => println!("OK"),
        Err(e) => println!("FAILED: {}", e),
    }

    let snapshot = session.snapshot().await;
    println!("\n{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.summary());
    Ok(())
}
