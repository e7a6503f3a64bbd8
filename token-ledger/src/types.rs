//! Core types for the token ledger
//!
//! All persisted types are designed for:
//! - Deterministic serialization (bincode)
//! - Immutability (transactions are never edited, only offset)
//! - Exact arithmetic (token amounts are signed integers)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier, owned by the external user directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Staff actor identifier (admin account performing an operation)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Create new actor ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    /// Administrative credit to a user's balance
    CreditGrant = 1,
    /// Tokens bought through the production system
    Purchase = 2,
    /// Tokens consumed by a generation job
    UsageDebit = 3,
    /// Refund reversal
    Refund = 4,
    /// Payment chargeback
    Chargeback = 5,
    /// Expired token batch
    Expiration = 6,
    /// Manual correction
    Adjustment = 7,
}

impl TxType {
    /// Wire name, as recorded by the production system
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::CreditGrant => "credit_grant",
            TxType::Purchase => "purchase",
            TxType::UsageDebit => "usage_debit",
            TxType::Refund => "refund",
            TxType::Chargeback => "chargeback",
            TxType::Expiration => "expiration",
            TxType::Adjustment => "adjustment",
        }
    }

    /// Parse from wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit_grant" => Some(TxType::CreditGrant),
            "purchase" => Some(TxType::Purchase),
            "usage_debit" => Some(TxType::UsageDebit),
            "refund" => Some(TxType::Refund),
            "chargeback" => Some(TxType::Chargeback),
            "expiration" => Some(TxType::Expiration),
            "adjustment" => Some(TxType::Adjustment),
            _ => None,
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link to the external entity that caused a transaction
/// (e.g. a generation job). Not enforced as a foreign key; the
/// referenced entity may live in another system. Also doubles as the
/// idempotency key for grants: a repeated (ref_type, ref_id) pair is a
/// no-op returning the prior receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    /// Kind of referenced entity ("generation_job", "invoice", ...)
    pub ref_type: String,

    /// Identifier within that kind
    pub ref_id: String,
}

impl TxRef {
    /// Create new reference
    pub fn new(ref_type: impl Into<String>, ref_id: impl Into<String>) -> Self {
        Self {
            ref_type: ref_type.into(),
            ref_id: ref_id.into(),
        }
    }
}

/// Immutable ledger entry. Created exactly once per balance-changing
/// event; corrections are new offsetting transactions, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Sequence number assigned by the single writer. Total order over
    /// all transactions; pagination ties on `created_at` resolve by it.
    pub seq: u64,

    /// User whose balance this entry changes
    pub user_id: UserId,

    /// Signed amount: positive = credit, negative = debit
    pub amount: i64,

    /// Transaction type
    pub tx_type: TxType,

    /// Free-text reason
    pub reason: Option<String>,

    /// Optional link to the causing entity
    pub reference: Option<TxRef>,

    /// Creation timestamp (immutable)
    pub created_at: DateTime<Utc>,

    /// Staff actor, present only for admin-initiated entries
    pub created_by_admin_id: Option<ActorId>,
}

/// Per-user materialized token balance.
///
/// The ledger is the source of truth; the wallet is a cache over it.
/// The stored value is the *signed* running ledger sum, so over-debits
/// stay visible here rather than being silently clamped away. The
/// display balance floors at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Owning user
    pub user_id: UserId,

    /// Signed running sum of the user's transactions
    pub ledger_sum: i64,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Fresh wallet with zero balance
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ledger_sum: 0,
            updated_at: Utc::now(),
        }
    }

    /// Display balance: the ledger sum floored at zero
    pub fn balance(&self) -> i64 {
        self.ledger_sum.max(0)
    }
}

/// Read model of a user in the external directory. Mirrored here so
/// grants can be validated without a network hop; the directory itself
/// stays externally owned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID
    pub user_id: UserId,

    /// Contact email
    pub email: String,

    /// Terminal removed state; grants to deleted users are rejected
    pub is_deleted: bool,

    /// Record creation timestamp
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Active user record
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }
}

/// Process-wide operational state (banner message, maintenance mode).
/// Stored as a single durable record rather than in-memory globals, so
/// it survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemState {
    /// Banner shown to staff, if any
    pub banner: Option<String>,

    /// Whether the platform is in maintenance mode
    pub maintenance_mode: bool,

    /// Staff actor of the last change
    pub updated_by: Option<ActorId>,

    /// Timestamp of the last change
    pub updated_at: DateTime<Utc>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            banner: None,
            maintenance_mode: false,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }
}

/// Pagination request. Page is 1-indexed; limit is clamped to [1, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Maximum page size
    pub const MAX_LIMIT: u32 = 100;

    /// Build a request, clamping out-of-range values
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// 1-indexed page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows to skip
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Filters for the global ledger view
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    /// Restrict to one user
    pub user_id: Option<UserId>,

    /// Restrict to one transaction type
    pub tx_type: Option<TxType>,
}

impl LedgerFilter {
    /// Whether a transaction passes this filter
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &tx.user_id != user_id {
                return false;
            }
        }
        if let Some(tx_type) = self.tx_type {
            if tx.tx_type != tx_type {
                return false;
            }
        }
        true
    }
}

/// One page of transactions, newest first
#[derive(Debug, Clone)]
pub struct TxPage {
    /// Transactions on this page
    pub transactions: Vec<Transaction>,

    /// Total matching rows across all pages
    pub total: u64,

    /// Echoed page number
    pub page: u32,

    /// Echoed page size
    pub limit: u32,
}

/// Balance plus transaction history for one user
#[derive(Debug, Clone)]
pub struct UserTokens {
    /// User ID
    pub user_id: UserId,

    /// Current display balance
    pub balance: i64,

    /// One page of the user's transactions, newest first
    pub transactions: Vec<Transaction>,

    /// Total transactions for the user
    pub total: u64,

    /// Echoed page number
    pub page: u32,

    /// Echoed page size
    pub limit: u32,
}

/// Issued/consumed volume for one UTC calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVolume {
    /// UTC date
    pub date: NaiveDate,

    /// Sum of positive amounts that day
    pub issued: i64,

    /// Absolute sum of negative amounts that day
    pub consumed: i64,
}

/// Aggregate token report for the admin dashboard
#[derive(Debug, Clone)]
pub struct DashboardReport {
    /// Sum of all positive transaction amounts
    pub total_issued: i64,

    /// Absolute sum of all negative transaction amounts
    pub total_consumed: i64,

    /// Sum of all wallet display balances
    pub outstanding_balance: i64,

    /// Last seven UTC days, oldest first
    pub daily_trend: Vec<DailyVolume>,
}

/// Outcome of a grant
#[derive(Debug, Clone)]
pub struct GrantReceipt {
    /// Ledger entry recording the grant
    pub transaction_id: Uuid,

    /// Credited user
    pub user_id: UserId,

    /// Granted amount
    pub amount: i64,

    /// Wallet display balance after the grant
    pub new_balance: i64,

    /// True when an idempotency reference matched a prior grant and no
    /// new ledger entry was written
    pub deduplicated: bool,
}

/// Outcome of a debit
#[derive(Debug, Clone)]
pub struct DebitReceipt {
    /// Ledger entry recording the debit
    pub transaction_id: Uuid,

    /// Debited user
    pub user_id: UserId,

    /// Wallet display balance after the debit (floored at zero)
    pub new_balance: i64,

    /// True when an idempotency reference matched a prior debit and no
    /// new ledger entry was written
    pub deduplicated: bool,
}

/// Outcome of a balance reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// Reconciled user
    pub user_id: UserId,

    /// Σ amount over the user's ledger entries
    pub ledger_sum: i64,

    /// Display balance before reconciliation
    pub previous_balance: i64,

    /// Display balance after reconciliation
    pub new_balance: i64,

    /// `new_balance - previous_balance`; non-zero means drift was found
    pub drift: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_type_round_trip() {
        for tx_type in [
            TxType::CreditGrant,
            TxType::Purchase,
            TxType::UsageDebit,
            TxType::Refund,
            TxType::Chargeback,
            TxType::Expiration,
            TxType::Adjustment,
        ] {
            assert_eq!(TxType::parse(tx_type.as_str()), Some(tx_type));
        }
        assert_eq!(TxType::parse("bonus"), None);
    }

    #[test]
    fn test_page_request_clamping() {
        let page = PageRequest::new(0, 0);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::new(3, 500);
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 200);
    }

    #[test]
    fn test_wallet_balance_floors_at_zero() {
        let mut wallet = Wallet::new(UserId::new("u-1"));
        assert_eq!(wallet.balance(), 0);

        wallet.ledger_sum = 100;
        assert_eq!(wallet.balance(), 100);

        wallet.ledger_sum = -50;
        assert_eq!(wallet.balance(), 0);
    }

    #[test]
    fn test_ledger_filter() {
        let tx = Transaction {
            id: Uuid::now_v7(),
            seq: 1,
            user_id: UserId::new("u-1"),
            amount: 100,
            tx_type: TxType::CreditGrant,
            reason: None,
            reference: None,
            created_at: Utc::now(),
            created_by_admin_id: None,
        };

        assert!(LedgerFilter::default().matches(&tx));
        assert!(LedgerFilter {
            user_id: Some(UserId::new("u-1")),
            tx_type: Some(TxType::CreditGrant),
        }
        .matches(&tx));
        assert!(!LedgerFilter {
            user_id: Some(UserId::new("u-2")),
            tx_type: None,
        }
        .matches(&tx));
        assert!(!LedgerFilter {
            user_id: None,
            tx_type: Some(TxType::UsageDebit),
        }
        .matches(&tx));
    }
}
