//! Wallet session module
//!
//! Owns the connection state machine:
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──handshake ok──► Connected
//!      ▲                          │                           │
//!      └── rejected / timeout / ──┘                           │
//!      │       disconnect()                                   │
//!      └──────────────────────── disconnect() ────────────────┘
//! ```
//!
//! A handshake abandoned by its callers still runs to completion and
//! settles the state. One abandoned by `disconnect()` never commits.

pub mod state;
pub mod wallet;

pub use state::{Session, SessionStatus};
pub use wallet::WalletSession;
