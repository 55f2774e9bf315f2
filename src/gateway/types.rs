//! Value types shared between the core and the chain gateway
//!
//! Addresses, chain ids, resolved contract handles and transaction receipts.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Numeric chain identifier
pub type ChainId = u64;

lazy_static::lazy_static! {
    /// 0x-prefixed 20-byte hex address
    static ref ADDRESS_PATTERN: Regex =
        Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Invalid address pattern");
}

/// Wallet or contract address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// All-zero sentinel address
    pub const ZERO_STR: &'static str = "0x0000000000000000000000000000000000000000";

    /// The all-zero sentinel address
    pub fn zero() -> Self {
        Address(Self::ZERO_STR.to_string())
    }

    /// Parse and validate an address
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if !ADDRESS_PATTERN.is_match(trimmed) {
            return Err(Error::Config(format!("Invalid address: {:?}", s)));
        }
        Ok(Address(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO_STR
    }

    /// Shortened form for log lines: 0x07E2…8446
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Address::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sub-interface a contract handle is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractInterface {
    /// Full contract surface as resolved from the address
    Base,
    /// ERC-20 drop extension (claim)
    TokenDrop,
    /// Marketplace extension (listings)
    Marketplace,
}

impl fmt::Display for ContractInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractInterface::Base => write!(f, "base"),
            ContractInterface::TokenDrop => write!(f, "token_drop"),
            ContractInterface::Marketplace => write!(f, "marketplace"),
        }
    }
}

/// Resolved, callable reference to a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractHandle {
    /// Deployed contract address
    pub address: Address,

    /// Chain the contract lives on
    pub chain_id: ChainId,

    /// Interface calls are dispatched through
    pub interface: ContractInterface,
}

impl ContractHandle {
    /// Narrow this handle to one of the contract's extensions
    pub fn scoped(&self, interface: ContractInterface) -> Self {
        Self {
            interface,
            ..self.clone()
        }
    }
}

/// Outcome recorded in a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Confirmed,
    Reverted(String),
}

/// Transaction receipt returned by a contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub tx_hash: String,

    /// Contract the call was sent to
    pub contract: Address,

    /// Method name invoked
    pub method: String,

    /// Execution status
    pub status: ReceiptStatus,

    /// Block timestamp
    pub block_timestamp: DateTime<Utc>,
}

impl TransactionReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReceiptStatus::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse() {
        let addr = Address::parse("0x07E29106198B3b43Ada9A833Aee3e7CE74D38446").unwrap();
        assert_eq!(addr.as_str(), "0x07E29106198B3b43Ada9A833Aee3e7CE74D38446");
        assert!(!addr.is_zero());
        assert_eq!(addr.short(), "0x07E2…8446");
    }

    #[test]
    fn test_address_rejects_malformed() {
        assert!(Address::parse("07E29106198B3b43Ada9A833Aee3e7CE74D38446").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xZZE29106198B3b43Ada9A833Aee3e7CE74D38446").is_err());
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.as_str().len(), 42);
        assert_eq!(Address::parse(Address::ZERO_STR).unwrap(), zero);
    }

    #[test]
    fn test_address_deserialize_validates() {
        let ok: std::result::Result<Address, _> =
            serde_json::from_str(r#""0x641c81F8c10e2958F4e0c00882014c0A3A03f86A""#);
        assert!(ok.is_ok());
        let bad: std::result::Result<Address, _> = serde_json::from_str(r#""not-an-address""#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_handle_scoped() {
        let handle = ContractHandle {
            address: Address::zero(),
            chain_id: 420,
            interface: ContractInterface::Base,
        };
        let market = handle.scoped(ContractInterface::Marketplace);
        assert_eq!(market.interface, ContractInterface::Marketplace);
        assert_eq!(market.address, handle.address);
    }
}
