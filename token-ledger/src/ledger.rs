//! Main ledger orchestration layer
//!
//! Ties together storage, the single-writer task, and metrics into the
//! high-level API the admin gateway consumes: grants and debits on one
//! side, paginated ledger views and dashboard aggregates on the other.
//!
//! # Example
//!
//! ```no_run
//! use token_ledger::{Config, TokenLedger};
//!
//! #[tokio::main]
//! async fn main() -> token_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = TokenLedger::open(config).await?;
//!
//!     // let receipt = ledger.grant_tokens(...).await?;
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_writer, WriterHandle},
    audit::{AuditPage, RequestMeta},
    metrics::Metrics,
    storage::StorageStats,
    types::{
        ActorId, DashboardReport, DebitReceipt, GrantReceipt, LedgerFilter, PageRequest,
        ReconcileReport, SystemState, TxRef, TxType, UserId, UserRecord, UserTokens, TxPage,
    },
    Config, Error, Result, Storage,
};
use std::sync::Arc;

/// Number of days in the dashboard trend
const TREND_DAYS: usize = 7;

/// Main ledger interface
pub struct TokenLedger {
    /// Writer handle for mutations
    handle: WriterHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Metrics,
}

impl TokenLedger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        // Seed the outstanding-balance gauge from durable state
        metrics.shift_outstanding(storage.outstanding_balance()?);

        let handle = spawn_writer(storage.clone(), metrics.clone())?;

        Ok(Self {
            handle,
            storage,
            metrics,
        })
    }

    // Mutations (serialized by the writer)

    /// Grant tokens to a user. Fails with [`Error::InvalidAmount`] for
    /// non-positive amounts and [`Error::UserNotFound`] for missing or
    /// deleted users; on success the wallet, ledger entry, and audit
    /// entry commit atomically.
    pub async fn grant_tokens(
        &self,
        user_id: UserId,
        amount: i64,
        reason: impl Into<String>,
        actor: ActorId,
        meta: RequestMeta,
        reference: Option<TxRef>,
    ) -> Result<GrantReceipt> {
        self.handle
            .grant(user_id, amount, reason.into(), actor, meta, reference)
            .await
    }

    /// Debit tokens from a user (usage, refund reversal, chargeback,
    /// expiration, adjustment). The ledger records the full signed
    /// amount; the display balance floors at zero.
    pub async fn debit_tokens(
        &self,
        user_id: UserId,
        amount: i64,
        tx_type: TxType,
        reference: Option<TxRef>,
        actor: Option<ActorId>,
        meta: RequestMeta,
    ) -> Result<DebitReceipt> {
        self.handle
            .debit(user_id, amount, tx_type, reference, actor, meta)
            .await
    }

    /// Recompute a user's balance from the ledger, correcting drift
    pub async fn reconcile(
        &self,
        user_id: UserId,
        actor: Option<ActorId>,
    ) -> Result<ReconcileReport> {
        self.handle.reconcile(user_id, actor).await
    }

    /// Upsert a directory read-model record
    pub async fn upsert_user(&self, user: UserRecord) -> Result<()> {
        self.handle.upsert_user(user).await
    }

    /// Replace the banner / maintenance-mode record
    pub async fn set_system_state(
        &self,
        banner: Option<String>,
        maintenance_mode: bool,
        actor: ActorId,
        meta: RequestMeta,
    ) -> Result<SystemState> {
        self.handle
            .set_system_state(banner, maintenance_mode, actor, meta)
            .await
    }

    // Reads (straight to storage, never through the mailbox)

    /// Balance and paginated history for one user
    pub fn user_tokens(&self, user_id: &UserId, page: PageRequest) -> Result<UserTokens> {
        let user = self
            .storage
            .get_user(user_id)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        if user.is_deleted {
            return Err(Error::UserNotFound(user_id.to_string()));
        }

        let balance = self
            .storage
            .get_wallet(user_id)?
            .map(|w| w.balance())
            .unwrap_or(0);

        let filter = LedgerFilter {
            user_id: Some(user_id.clone()),
            tx_type: None,
        };
        let (transactions, total) = self.storage.list_transactions(&filter, &page)?;

        Ok(UserTokens {
            user_id: user_id.clone(),
            balance,
            transactions,
            total,
            page: page.page(),
            limit: page.limit(),
        })
    }

    /// Global ledger view, filtered and paginated
    pub fn ledger(&self, filter: &LedgerFilter, page: PageRequest) -> Result<TxPage> {
        let (transactions, total) = self.storage.list_transactions(filter, &page)?;
        Ok(TxPage {
            transactions,
            total,
            page: page.page(),
            limit: page.limit(),
        })
    }

    /// Aggregate dashboard report: issued/consumed totals, outstanding
    /// balance, and the seven-day trend
    pub fn dashboard(&self) -> Result<DashboardReport> {
        let (total_issued, total_consumed) = self.storage.aggregate_totals()?;
        let outstanding_balance = self.storage.outstanding_balance()?;
        let daily_trend = self.storage.daily_volume(TREND_DAYS)?;

        Ok(DashboardReport {
            total_issued,
            total_consumed,
            outstanding_balance,
            daily_trend,
        })
    }

    /// Audit trail, newest first
    pub fn audit_log(&self, page: PageRequest) -> Result<AuditPage> {
        let (entries, total) = self.storage.list_audit(&page)?;
        Ok(AuditPage {
            entries,
            total,
            page: page.page(),
            limit: page.limit(),
        })
    }

    /// Current banner / maintenance-mode record
    pub fn system_state(&self) -> Result<SystemState> {
        self.storage.get_system_state()
    }

    /// Directory read-model record for one user
    pub fn get_user(&self, user_id: &UserId) -> Result<Option<UserRecord>> {
        self.storage.get_user(user_id)
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics collector (for the scrape endpoint)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
