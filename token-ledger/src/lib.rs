//! # Token Ledger
//!
//! Append-only token ledger and balance-reconciliation subsystem for the
//! media-generation platform's admin back office.
//!
//! ## Architecture
//!
//! - **Storage**: RocksDB column families for transactions, wallets, and
//!   the audit trail, with bincode rows
//! - **Writer**: a single Tokio task serializes every wallet mutation and
//!   commits each operation's full effect as one atomic batch
//! - **Reads**: paginated ledger views and dashboard aggregates go
//!   straight to storage, never through the writer
//! - **Authorization**: a declarative capability table maps staff roles
//!   to operations
//!
//! ## Invariants
//!
//! - Transactions are immutable; corrections are new offsetting entries
//! - A user's display balance equals the ledger sum floored at zero
//! - Every admin mutation commits atomically with its audit entry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod actor;
pub mod audit;
pub mod authz;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

pub use audit::{AuditEntry, AuditPage, RequestMeta};
pub use authz::{authorize, Capability, Role};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::TokenLedger;
pub use metrics::Metrics;
pub use storage::Storage;
pub use types::{
    ActorId, DailyVolume, DashboardReport, DebitReceipt, GrantReceipt, LedgerFilter, PageRequest,
    ReconcileReport, SystemState, Transaction, TxPage, TxRef, TxType, UserId, UserRecord,
    UserTokens, Wallet,
};
