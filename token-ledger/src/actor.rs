//! Single-writer concurrency for wallet mutations
//!
//! Every balance-changing operation flows through one Tokio task, which
//! serializes the read-modify-write on wallets and commits each
//! operation's full effect (transaction, indices, wallet, audit entry)
//! as one atomic batch. Two concurrent grants on the same wallet can
//! therefore never lose an update: the writer applies them in some total
//! order and assigns each a sequence number from that order.
//!
//! Reads never enter the mailbox; they go straight to storage.

use crate::audit::{actions, AuditEntry, RequestMeta};
use crate::metrics::Metrics;
use crate::types::{
    ActorId, DebitReceipt, GrantReceipt, ReconcileReport, SystemState, Transaction, TxRef, TxType,
    UserId, UserRecord, Wallet,
};
use crate::{Error, Result, Storage};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the writer
pub enum WriterMessage {
    /// Apply an administrative grant
    Grant {
        /// Credited user
        user_id: UserId,
        /// Amount to credit (must be positive)
        amount: i64,
        /// Free-text reason
        reason: String,
        /// Acting staff member
        actor: ActorId,
        /// Request metadata for the audit entry
        meta: RequestMeta,
        /// Optional idempotency / causal reference
        reference: Option<TxRef>,
        /// Receipt channel
        response: oneshot::Sender<Result<GrantReceipt>>,
    },

    /// Apply a debit
    Debit {
        /// Debited user
        user_id: UserId,
        /// Magnitude to debit (must be positive)
        amount: i64,
        /// Ledger entry type
        tx_type: TxType,
        /// Optional idempotency / causal reference
        reference: Option<TxRef>,
        /// Acting staff member, absent for system-generated debits
        actor: Option<ActorId>,
        /// Request metadata for the audit entry
        meta: RequestMeta,
        /// Receipt channel
        response: oneshot::Sender<Result<DebitReceipt>>,
    },

    /// Recompute a wallet from its ledger history
    Reconcile {
        /// User to reconcile
        user_id: UserId,
        /// Acting staff member, if admin-initiated
        actor: Option<ActorId>,
        /// Report channel
        response: oneshot::Sender<Result<ReconcileReport>>,
    },

    /// Upsert a directory read-model record
    UpsertUser {
        /// Record to store
        user: UserRecord,
        /// Completion channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Replace the operational-state record
    SetSystemState {
        /// New banner, if any
        banner: Option<String>,
        /// New maintenance-mode flag
        maintenance_mode: bool,
        /// Acting staff member
        actor: ActorId,
        /// Request metadata for the audit entry
        meta: RequestMeta,
        /// New state channel
        response: oneshot::Sender<Result<SystemState>>,
    },

    /// Shutdown writer
    Shutdown,
}

/// Writer task owning the operation sequence
pub struct WriterActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<WriterMessage>,

    /// Last sequence number handed out
    next_seq: u64,

    /// Metrics collector
    metrics: Metrics,
}

impl WriterActor {
    /// Create new writer
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<WriterMessage>,
        last_seq: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            next_seq: last_seq,
            metrics,
        }
    }

    /// Run the writer loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                WriterMessage::Shutdown => break,

                WriterMessage::Grant {
                    user_id,
                    amount,
                    reason,
                    actor,
                    meta,
                    reference,
                    response,
                } => {
                    let result = self.apply_grant(user_id, amount, reason, actor, meta, reference);
                    let _ = response.send(result);
                }

                WriterMessage::Debit {
                    user_id,
                    amount,
                    tx_type,
                    reference,
                    actor,
                    meta,
                    response,
                } => {
                    let result = self.apply_debit(user_id, amount, tx_type, reference, actor, meta);
                    let _ = response.send(result);
                }

                WriterMessage::Reconcile {
                    user_id,
                    actor,
                    response,
                } => {
                    let result = self.apply_reconcile(user_id, actor);
                    let _ = response.send(result);
                }

                WriterMessage::UpsertUser { user, response } => {
                    let _ = response.send(self.storage.put_user(&user));
                }

                WriterMessage::SetSystemState {
                    banner,
                    maintenance_mode,
                    actor,
                    meta,
                    response,
                } => {
                    let result = self.apply_system_state(banner, maintenance_mode, actor, meta);
                    let _ = response.send(result);
                }
            }
        }
    }

    fn alloc_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn active_user(&self, user_id: &UserId) -> Result<UserRecord> {
        let user = self
            .storage
            .get_user(user_id)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        if user.is_deleted {
            return Err(Error::UserNotFound(user_id.to_string()));
        }
        Ok(user)
    }

    fn apply_grant(
        &mut self,
        user_id: UserId,
        amount: i64,
        reason: String,
        actor: ActorId,
        meta: RequestMeta,
        reference: Option<TxRef>,
    ) -> Result<GrantReceipt> {
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount));
        }
        self.active_user(&user_id)?;

        if let Some(ref r) = reference {
            if let Some(prior_id) = self.storage.idempotency_lookup(r)? {
                let prior = self.storage.get_transaction(prior_id)?;
                let balance = self
                    .storage
                    .get_wallet(&user_id)?
                    .map(|w| w.balance())
                    .unwrap_or(0);
                tracing::info!(
                    user_id = %user_id,
                    transaction_id = %prior_id,
                    "Grant deduplicated by idempotency reference"
                );
                return Ok(GrantReceipt {
                    transaction_id: prior_id,
                    user_id,
                    amount: prior.amount,
                    new_balance: balance,
                    deduplicated: true,
                });
            }
        }

        let started = Instant::now();
        let now = Utc::now();

        // Wallet is created lazily on first grant, in the same batch
        let mut wallet = self
            .storage
            .get_wallet(&user_id)?
            .unwrap_or_else(|| Wallet::new(user_id.clone()));
        let old_balance = wallet.balance();
        wallet.ledger_sum += amount;
        wallet.updated_at = now;

        let tx = Transaction {
            id: Uuid::now_v7(),
            seq: self.alloc_seq(),
            user_id: user_id.clone(),
            amount,
            tx_type: TxType::CreditGrant,
            reason: Some(reason.clone()),
            reference: reference.clone(),
            created_at: now,
            created_by_admin_id: Some(actor.clone()),
        };

        let entry = AuditEntry::new(actions::TOKENS_GRANT)
            .with_actor(actor)
            .with_target("user", user_id.as_str())
            .with_after(json!({ "amount": amount, "reason": reason }))
            .with_meta(meta);

        self.storage
            .commit_entry(&tx, &wallet, Some(&entry), reference.as_ref())?;

        self.metrics.record_grant(amount);
        self.metrics.shift_outstanding(wallet.balance() - old_balance);
        self.metrics
            .record_apply_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            user_id = %user_id,
            amount,
            new_balance = wallet.balance(),
            transaction_id = %tx.id,
            "Tokens granted"
        );

        Ok(GrantReceipt {
            transaction_id: tx.id,
            user_id,
            amount,
            new_balance: wallet.balance(),
            deduplicated: false,
        })
    }

    fn apply_debit(
        &mut self,
        user_id: UserId,
        amount: i64,
        tx_type: TxType,
        reference: Option<TxRef>,
        actor: Option<ActorId>,
        meta: RequestMeta,
    ) -> Result<DebitReceipt> {
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount));
        }
        if tx_type == TxType::CreditGrant {
            return Err(Error::Validation(
                "debit cannot be recorded as credit_grant".to_string(),
            ));
        }
        self.active_user(&user_id)?;

        if let Some(ref r) = reference {
            if let Some(prior_id) = self.storage.idempotency_lookup(r)? {
                let balance = self
                    .storage
                    .get_wallet(&user_id)?
                    .map(|w| w.balance())
                    .unwrap_or(0);
                return Ok(DebitReceipt {
                    transaction_id: prior_id,
                    user_id,
                    new_balance: balance,
                    deduplicated: true,
                });
            }
        }

        let started = Instant::now();
        let now = Utc::now();

        let mut wallet = self
            .storage
            .get_wallet(&user_id)?
            .unwrap_or_else(|| Wallet::new(user_id.clone()));
        let old_balance = wallet.balance();
        // The stored sum stays signed; only the display balance floors
        // at zero, so over-debits remain visible to reconciliation.
        wallet.ledger_sum -= amount;
        wallet.updated_at = now;

        let tx = Transaction {
            id: Uuid::now_v7(),
            seq: self.alloc_seq(),
            user_id: user_id.clone(),
            amount: -amount,
            tx_type,
            reason: None,
            reference: reference.clone(),
            created_at: now,
            created_by_admin_id: actor.clone(),
        };

        // System-generated debits (usage, expiration) carry no audit
        // entry; admin-initiated ones do.
        let entry = actor.map(|actor| {
            AuditEntry::new(actions::TOKENS_DEBIT)
                .with_actor(actor)
                .with_target("user", user_id.as_str())
                .with_after(json!({ "amount": amount, "type": tx_type.as_str() }))
                .with_meta(meta)
        });

        self.storage
            .commit_entry(&tx, &wallet, entry.as_ref(), reference.as_ref())?;

        self.metrics.record_debit(amount);
        self.metrics.shift_outstanding(wallet.balance() - old_balance);
        self.metrics
            .record_apply_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            user_id = %user_id,
            amount = -amount,
            tx_type = %tx_type,
            new_balance = wallet.balance(),
            "Tokens debited"
        );

        Ok(DebitReceipt {
            transaction_id: tx.id,
            user_id,
            new_balance: wallet.balance(),
            deduplicated: false,
        })
    }

    fn apply_reconcile(
        &mut self,
        user_id: UserId,
        actor: Option<ActorId>,
    ) -> Result<ReconcileReport> {
        let mut wallet = self
            .storage
            .get_wallet(&user_id)?
            .unwrap_or_else(|| Wallet::new(user_id.clone()));
        let previous_balance = wallet.balance();
        let previous_sum = wallet.ledger_sum;

        let ledger_sum = self.storage.sum_for_user(&user_id)?;
        wallet.ledger_sum = ledger_sum;
        wallet.updated_at = Utc::now();
        let new_balance = wallet.balance();

        let audit = actor.map(|actor| {
            let entry = AuditEntry::new(actions::TOKENS_RECONCILE)
                .with_actor(actor)
                .with_target("user", user_id.as_str())
                .with_before(json!({ "balance": previous_balance, "ledger_sum": previous_sum }))
                .with_after(json!({ "balance": new_balance, "ledger_sum": ledger_sum }));
            (entry, self.alloc_seq())
        });

        self.storage
            .commit_wallet(&wallet, audit.as_ref().map(|(e, s)| (e, *s)))?;

        self.metrics.record_reconciliation();
        self.metrics.shift_outstanding(new_balance - previous_balance);

        let drift = new_balance - previous_balance;
        if drift != 0 {
            tracing::warn!(
                user_id = %user_id,
                previous_balance,
                new_balance,
                drift,
                "Wallet drift corrected"
            );
        }

        Ok(ReconcileReport {
            user_id,
            ledger_sum,
            previous_balance,
            new_balance,
            drift,
        })
    }

    fn apply_system_state(
        &mut self,
        banner: Option<String>,
        maintenance_mode: bool,
        actor: ActorId,
        meta: RequestMeta,
    ) -> Result<SystemState> {
        let before = self.storage.get_system_state()?;

        let state = SystemState {
            banner,
            maintenance_mode,
            updated_by: Some(actor.clone()),
            updated_at: Utc::now(),
        };

        let entry = AuditEntry::new(actions::SYSTEM_STATE_SET)
            .with_actor(actor)
            .with_target("system", "state")
            .with_before(json!({
                "banner": before.banner,
                "maintenance_mode": before.maintenance_mode,
            }))
            .with_after(json!({
                "banner": state.banner,
                "maintenance_mode": state.maintenance_mode,
            }))
            .with_meta(meta);

        let seq = self.alloc_seq();
        self.storage.commit_system_state(&state, &entry, seq)?;

        tracing::info!(
            maintenance_mode = state.maintenance_mode,
            "Operational state updated"
        );

        Ok(state)
    }
}

/// Handle for sending messages to the writer
#[derive(Clone)]
pub struct WriterHandle {
    sender: mpsc::Sender<WriterMessage>,
}

impl WriterHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<WriterMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        msg: WriterMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Apply a grant
    pub async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        reason: String,
        actor: ActorId,
        meta: RequestMeta,
        reference: Option<TxRef>,
    ) -> Result<GrantReceipt> {
        let (tx, rx) = oneshot::channel();
        self.request(
            WriterMessage::Grant {
                user_id,
                amount,
                reason,
                actor,
                meta,
                reference,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Apply a debit
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        tx_type: TxType,
        reference: Option<TxRef>,
        actor: Option<ActorId>,
        meta: RequestMeta,
    ) -> Result<DebitReceipt> {
        let (tx, rx) = oneshot::channel();
        self.request(
            WriterMessage::Debit {
                user_id,
                amount,
                tx_type,
                reference,
                actor,
                meta,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Reconcile a wallet
    pub async fn reconcile(
        &self,
        user_id: UserId,
        actor: Option<ActorId>,
    ) -> Result<ReconcileReport> {
        let (tx, rx) = oneshot::channel();
        self.request(
            WriterMessage::Reconcile {
                user_id,
                actor,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Upsert a directory record
    pub async fn upsert_user(&self, user: UserRecord) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(WriterMessage::UpsertUser { user, response: tx }, rx)
            .await
    }

    /// Replace the operational-state record
    pub async fn set_system_state(
        &self,
        banner: Option<String>,
        maintenance_mode: bool,
        actor: ActorId,
        meta: RequestMeta,
    ) -> Result<SystemState> {
        let (tx, rx) = oneshot::channel();
        self.request(
            WriterMessage::SetSystemState {
                banner,
                maintenance_mode,
                actor,
                meta,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Shutdown writer
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WriterMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the writer task, recovering the sequence from storage
pub fn spawn_writer(storage: Arc<Storage>, metrics: Metrics) -> Result<WriterHandle> {
    let last_seq = storage.last_seq()?;
    let (tx, rx) = mpsc::channel(1024); // Bounded channel for backpressure
    let actor = WriterActor::new(storage, rx, last_seq, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    Ok(WriterHandle::new(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn test_storage() -> (Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Arc::new(Storage::open(&config).unwrap()), temp_dir)
    }

    async fn seed_user(handle: &WriterHandle, id: &str) -> UserId {
        let user_id = UserId::new(id);
        handle
            .upsert_user(UserRecord::new(user_id.clone(), format!("{}@example.com", id)))
            .await
            .unwrap();
        user_id
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage, Metrics::new().unwrap()).unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_grant_creates_wallet_and_audit() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();
        let user_id = seed_user(&handle, "u-1").await;

        let receipt = handle
            .grant(
                user_id.clone(),
                100,
                "signup bonus".to_string(),
                ActorId::new("admin-1"),
                RequestMeta::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(receipt.new_balance, 100);
        assert!(!receipt.deduplicated);

        let wallet = storage.get_wallet(&user_id).unwrap().unwrap();
        assert_eq!(wallet.balance(), 100);

        let txs = storage.transactions_for_user(&user_id).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].tx_type, TxType::CreditGrant);
        assert_eq!(
            txs[0].created_by_admin_id.as_ref().unwrap().as_str(),
            "admin-1"
        );

        let (entries, total) = storage
            .list_audit(&crate::types::PageRequest::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].action, actions::TOKENS_GRANT);
        assert_eq!(entries[0].after.as_ref().unwrap()["amount"], 100);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_grant_rejects_bad_amount_without_side_effects() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();
        let user_id = seed_user(&handle, "u-1").await;

        for amount in [0i64, -5] {
            let result = handle
                .grant(
                    user_id.clone(),
                    amount,
                    "test".to_string(),
                    ActorId::new("admin-1"),
                    RequestMeta::default(),
                    None,
                )
                .await;
            assert!(matches!(result, Err(Error::InvalidAmount(_))));
        }

        assert!(storage.get_wallet(&user_id).unwrap().is_none());
        assert!(storage.transactions_for_user(&user_id).unwrap().is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_grant_unknown_or_deleted_user() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();

        let result = handle
            .grant(
                UserId::new("nonexistent-id"),
                100,
                "test".to_string(),
                ActorId::new("actor-1"),
                RequestMeta::default(),
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::UserNotFound(_))));

        let mut user = UserRecord::new(UserId::new("u-gone"), "gone@example.com");
        user.is_deleted = true;
        handle.upsert_user(user).await.unwrap();

        let result = handle
            .grant(
                UserId::new("u-gone"),
                100,
                "test".to_string(),
                ActorId::new("actor-1"),
                RequestMeta::default(),
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::UserNotFound(_))));
        assert!(storage.get_wallet(&UserId::new("u-gone")).unwrap().is_none());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_debit_floors_display_balance() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();
        let user_id = seed_user(&handle, "u-1").await;

        handle
            .grant(
                user_id.clone(),
                100,
                "signup bonus".to_string(),
                ActorId::new("admin-1"),
                RequestMeta::default(),
                None,
            )
            .await
            .unwrap();

        let receipt = handle
            .debit(
                user_id.clone(),
                150,
                TxType::UsageDebit,
                None,
                None,
                RequestMeta::default(),
            )
            .await
            .unwrap();

        assert_eq!(receipt.new_balance, 0);
        assert_eq!(storage.sum_for_user(&user_id).unwrap(), -50);

        let wallet = storage.get_wallet(&user_id).unwrap().unwrap();
        assert_eq!(wallet.ledger_sum, -50);
        assert_eq!(wallet.balance(), 0);

        // System debit wrote no audit entry; the grant wrote one
        let (entries, total) = storage
            .list_audit(&crate::types::PageRequest::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].action, actions::TOKENS_GRANT);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_grant_idempotency_reference() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();
        let user_id = seed_user(&handle, "u-1").await;

        let reference = TxRef::new("invoice", "inv-42");
        let first = handle
            .grant(
                user_id.clone(),
                100,
                "invoice credit".to_string(),
                ActorId::new("admin-1"),
                RequestMeta::default(),
                Some(reference.clone()),
            )
            .await
            .unwrap();
        assert!(!first.deduplicated);

        let second = handle
            .grant(
                user_id.clone(),
                100,
                "invoice credit".to_string(),
                ActorId::new("admin-1"),
                RequestMeta::default(),
                Some(reference),
            )
            .await
            .unwrap();
        assert!(second.deduplicated);
        assert_eq!(second.transaction_id, first.transaction_id);
        assert_eq!(second.new_balance, 100);
        assert_eq!(storage.transactions_for_user(&user_id).unwrap().len(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_grants_lose_no_updates() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();
        let user_id = seed_user(&handle, "u-1").await;

        let mut tasks = Vec::new();
        for i in 1..=16i64 {
            let handle = handle.clone();
            let user_id = user_id.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .grant(
                        user_id,
                        i,
                        "load test".to_string(),
                        ActorId::new("admin-1"),
                        RequestMeta::default(),
                        None,
                    )
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let wallet = storage.get_wallet(&user_id).unwrap().unwrap();
        assert_eq!(wallet.balance(), (1..=16).sum::<i64>());
        assert_eq!(storage.transactions_for_user(&user_id).unwrap().len(), 16);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_corrects_drift() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();
        let user_id = seed_user(&handle, "u-1").await;

        handle
            .grant(
                user_id.clone(),
                100,
                "seed".to_string(),
                ActorId::new("admin-1"),
                RequestMeta::default(),
                None,
            )
            .await
            .unwrap();

        // Introduce drift behind the writer's back
        let mut wallet = storage.get_wallet(&user_id).unwrap().unwrap();
        wallet.ledger_sum = 999;
        storage.commit_wallet(&wallet, None).unwrap();

        let report = handle
            .reconcile(user_id.clone(), Some(ActorId::new("admin-1")))
            .await
            .unwrap();
        assert_eq!(report.previous_balance, 999);
        assert_eq!(report.ledger_sum, 100);
        assert_eq!(report.new_balance, 100);
        assert_eq!(report.drift, -899);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_system_state_round_trip() {
        let (storage, _temp) = test_storage();
        let handle = spawn_writer(storage.clone(), Metrics::new().unwrap()).unwrap();

        let state = handle
            .set_system_state(
                Some("Upgrading render farm".to_string()),
                true,
                ActorId::new("ops-1"),
                RequestMeta::default(),
            )
            .await
            .unwrap();
        assert!(state.maintenance_mode);

        let loaded = storage.get_system_state().unwrap();
        assert_eq!(loaded.banner.as_deref(), Some("Upgrading render farm"));
        assert_eq!(loaded.updated_by.as_ref().unwrap().as_str(), "ops-1");

        let (entries, _) = storage
            .list_audit(&crate::types::PageRequest::default())
            .unwrap();
        assert_eq!(entries[0].action, actions::SYSTEM_STATE_SET);
        assert_eq!(entries[0].before.as_ref().unwrap()["maintenance_mode"], false);

        handle.shutdown().await.unwrap();
    }
}
