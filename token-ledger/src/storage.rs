//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `transactions` - Append-only ledger entries (key: transaction id)
//! - `tx_order` - Global insertion order (key: seq, value: transaction id)
//! - `tx_by_user` - Per-user index (key: user || seq, value: transaction id)
//! - `wallets` - Materialized balances (key: user id)
//! - `users` - Directory read model (key: user id)
//! - `audit` - Admin action trail (key: seq of the causing operation)
//! - `idempotency` - Grant dedup index (key: ref_type || ref_id)
//! - `system` - Single operational-state record
//!
//! All writes for one operation go through a single `WriteBatch`, so a
//! transaction, its indices, the wallet update, and the audit entry
//! become durable together or not at all.

use crate::{
    audit::AuditEntry,
    error::{Error, Result},
    types::{
        DailyVolume, LedgerFilter, PageRequest, SystemState, Transaction, TxRef, UserId,
        UserRecord, Wallet,
    },
    Config,
};
use chrono::{Duration, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_TRANSACTIONS: &str = "transactions";
const CF_TX_ORDER: &str = "tx_order";
const CF_TX_BY_USER: &str = "tx_by_user";
const CF_WALLETS: &str = "wallets";
const CF_USERS: &str = "users";
const CF_AUDIT: &str = "audit";
const CF_IDEMPOTENCY: &str = "idempotency";
const CF_SYSTEM: &str = "system";

/// Key of the single record in `system`
const SYSTEM_STATE_KEY: &[u8] = b"state";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy ledger
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_TX_ORDER, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_TX_BY_USER, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_AUDIT, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_SYSTEM, Self::cf_options_state()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_append_only() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_index() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers
    //
    // Variable-length components are length-prefixed so distinct ids can
    // never produce overlapping key ranges.

    fn user_prefix(user_id: &UserId) -> Vec<u8> {
        let bytes = user_id.as_str().as_bytes();
        let mut key = Vec::with_capacity(4 + bytes.len());
        key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        key.extend_from_slice(bytes);
        key
    }

    fn index_key_user_seq(user_id: &UserId, seq: u64) -> Vec<u8> {
        let mut key = Self::user_prefix(user_id);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn idempotency_key(reference: &TxRef) -> Vec<u8> {
        let rt = reference.ref_type.as_bytes();
        let ri = reference.ref_id.as_bytes();
        let mut key = Vec::with_capacity(8 + rt.len() + ri.len());
        key.extend_from_slice(&(rt.len() as u32).to_be_bytes());
        key.extend_from_slice(rt);
        key.extend_from_slice(&(ri.len() as u32).to_be_bytes());
        key.extend_from_slice(ri);
        key
    }

    // Sequence recovery

    /// Highest sequence number ever committed, for writer recovery
    pub fn last_seq(&self) -> Result<u64> {
        let mut last = 0u64;
        for cf_name in [CF_TX_ORDER, CF_AUDIT] {
            let cf = self.cf_handle(cf_name)?;
            if let Some(item) = self.db.iterator_cf(cf, IteratorMode::End).next() {
                let (key, _) = item?;
                if key.len() == 8 {
                    let seq = u64::from_be_bytes(key[..8].try_into().unwrap());
                    last = last.max(seq);
                }
            }
        }
        Ok(last)
    }

    // Atomic commits

    /// Commit one balance-changing operation: the transaction, both
    /// order indices, the updated wallet, and optionally an audit entry
    /// and an idempotency marker, all in one batch.
    pub fn commit_entry(
        &self,
        tx: &Transaction,
        wallet: &Wallet,
        audit: Option<&AuditEntry>,
        idempotency: Option<&TxRef>,
    ) -> Result<()> {
        if tx.amount == 0 {
            return Err(Error::Validation(
                "zero-amount transaction carries no ledger meaning".to_string(),
            ));
        }
        if tx.user_id != wallet.user_id {
            return Err(Error::Validation(
                "transaction and wallet user mismatch".to_string(),
            ));
        }

        let mut batch = WriteBatch::default();

        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf_tx, tx.id.as_bytes(), bincode::serialize(tx)?);

        let cf_order = self.cf_handle(CF_TX_ORDER)?;
        batch.put_cf(cf_order, tx.seq.to_be_bytes(), tx.id.as_bytes());

        let cf_by_user = self.cf_handle(CF_TX_BY_USER)?;
        batch.put_cf(
            cf_by_user,
            Self::index_key_user_seq(&tx.user_id, tx.seq),
            tx.id.as_bytes(),
        );

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(
            cf_wallets,
            wallet.user_id.as_str().as_bytes(),
            bincode::serialize(wallet)?,
        );

        if let Some(entry) = audit {
            let cf_audit = self.cf_handle(CF_AUDIT)?;
            batch.put_cf(cf_audit, tx.seq.to_be_bytes(), serde_json::to_vec(entry)?);
        }

        if let Some(reference) = idempotency {
            let cf_idem = self.cf_handle(CF_IDEMPOTENCY)?;
            batch.put_cf(cf_idem, Self::idempotency_key(reference), tx.id.as_bytes());
        }

        self.db.write(batch)?;

        tracing::debug!(
            transaction_id = %tx.id,
            user_id = %tx.user_id,
            amount = tx.amount,
            tx_type = %tx.tx_type,
            "Ledger entry committed"
        );

        Ok(())
    }

    /// Commit a wallet rewrite (reconciliation), optionally audited
    pub fn commit_wallet(&self, wallet: &Wallet, audit: Option<(&AuditEntry, u64)>) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(
            cf_wallets,
            wallet.user_id.as_str().as_bytes(),
            bincode::serialize(wallet)?,
        );

        if let Some((entry, seq)) = audit {
            let cf_audit = self.cf_handle(CF_AUDIT)?;
            batch.put_cf(cf_audit, seq.to_be_bytes(), serde_json::to_vec(entry)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    /// Commit the operational-state record together with its audit entry
    pub fn commit_system_state(
        &self,
        state: &SystemState,
        audit: &AuditEntry,
        seq: u64,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_system = self.cf_handle(CF_SYSTEM)?;
        batch.put_cf(cf_system, SYSTEM_STATE_KEY, bincode::serialize(state)?);

        let cf_audit = self.cf_handle(CF_AUDIT)?;
        batch.put_cf(cf_audit, seq.to_be_bytes(), serde_json::to_vec(audit)?);

        self.db.write(batch)?;
        Ok(())
    }

    /// Upsert a directory read-model record
    pub fn put_user(&self, user: &UserRecord) -> Result<()> {
        let cf = self.cf_handle(CF_USERS)?;
        self.db.put_cf(
            cf,
            user.user_id.as_str().as_bytes(),
            bincode::serialize(user)?,
        )?;
        Ok(())
    }

    // Point reads

    /// Get transaction by ID
    pub fn get_transaction(&self, id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Transaction not found: {}", id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    fn load_transaction_bytes(&self, id_bytes: &[u8]) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, id_bytes)?
            .ok_or_else(|| Error::Storage("index points at a missing transaction".to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get wallet by user, if one exists
    pub fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        let cf = self.cf_handle(CF_WALLETS)?;
        match self.db.get_cf(cf, user_id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get directory record by user, if mirrored
    pub fn get_user(&self, user_id: &UserId) -> Result<Option<UserRecord>> {
        let cf = self.cf_handle(CF_USERS)?;
        match self.db.get_cf(cf, user_id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Current operational state; default when never set
    pub fn get_system_state(&self) -> Result<SystemState> {
        let cf = self.cf_handle(CF_SYSTEM)?;
        match self.db.get_cf(cf, SYSTEM_STATE_KEY)? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(SystemState::default()),
        }
    }

    /// Transaction id previously committed under an idempotency
    /// reference, if any
    pub fn idempotency_lookup(&self, reference: &TxRef) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        match self.db.get_cf(cf, Self::idempotency_key(reference))? {
            Some(value) => {
                let bytes: [u8; 16] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("malformed idempotency index value".to_string()))?;
                Ok(Some(Uuid::from_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    // Scans and aggregations

    /// All transactions for a user, in insertion order
    pub fn transactions_for_user(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_TX_BY_USER)?;
        let prefix = Self::user_prefix(user_id);

        let mut transactions = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, &prefix) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            transactions.push(self.load_transaction_bytes(&value)?);
        }

        Ok(transactions)
    }

    /// Σ amount over a user's transactions
    pub fn sum_for_user(&self, user_id: &UserId) -> Result<i64> {
        Ok(self
            .transactions_for_user(user_id)?
            .iter()
            .map(|tx| tx.amount)
            .sum())
    }

    /// One page of transactions matching a filter, newest first, plus
    /// the total match count
    pub fn list_transactions(
        &self,
        filter: &LedgerFilter,
        page: &PageRequest,
    ) -> Result<(Vec<Transaction>, u64)> {
        if let Some(ref user_id) = filter.user_id {
            // Per-user index already narrows the scan
            let mut transactions = self.transactions_for_user(user_id)?;
            transactions.reverse();
            let matching: Vec<Transaction> = transactions
                .into_iter()
                .filter(|tx| filter.matches(tx))
                .collect();
            let total = matching.len() as u64;
            let items = matching
                .into_iter()
                .skip(page.offset())
                .take(page.limit() as usize)
                .collect();
            return Ok((items, total));
        }

        // Global scan in reverse sequence order = created_at descending
        // with ties broken by insertion order
        let cf_order = self.cf_handle(CF_TX_ORDER)?;
        let offset = page.offset() as u64;
        let limit = page.limit() as u64;

        let mut total = 0u64;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf_order, IteratorMode::End) {
            let (_, value) = item?;
            let tx = self.load_transaction_bytes(&value)?;
            if !filter.matches(&tx) {
                continue;
            }
            if total >= offset && (items.len() as u64) < limit {
                items.push(tx);
            }
            total += 1;
        }

        Ok((items, total))
    }

    /// One page of audit entries, newest first, plus the total count
    pub fn list_audit(&self, page: &PageRequest) -> Result<(Vec<AuditEntry>, u64)> {
        let cf = self.cf_handle(CF_AUDIT)?;
        let offset = page.offset() as u64;
        let limit = page.limit() as u64;

        let mut total = 0u64;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_, value) = item?;
            if total >= offset && (entries.len() as u64) < limit {
                entries.push(serde_json::from_slice(&value)?);
            }
            total += 1;
        }

        Ok((entries, total))
    }

    /// Total issued (positive sums) and consumed (absolute negative
    /// sums) across the whole ledger
    pub fn aggregate_totals(&self) -> Result<(i64, i64)> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let mut issued = 0i64;
        let mut consumed = 0i64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let tx: Transaction = bincode::deserialize(&value)?;
            if tx.amount > 0 {
                issued += tx.amount;
            } else {
                consumed += -tx.amount;
            }
        }

        Ok((issued, consumed))
    }

    /// Issued/consumed volume per UTC day for the trailing `days` days,
    /// oldest first, today last
    pub fn daily_volume(&self, days: usize) -> Result<Vec<DailyVolume>> {
        let today = Utc::now().date_naive();
        let start = today - Duration::days(days as i64 - 1);

        let mut buckets: Vec<DailyVolume> = (0..days)
            .map(|i| DailyVolume {
                date: start + Duration::days(i as i64),
                issued: 0,
                consumed: 0,
            })
            .collect();

        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let tx: Transaction = bincode::deserialize(&value)?;
            let day = tx.created_at.date_naive();
            let idx = (day - start).num_days();
            if idx < 0 || idx as usize >= days {
                continue;
            }
            let bucket = &mut buckets[idx as usize];
            if tx.amount > 0 {
                bucket.issued += tx.amount;
            } else {
                bucket.consumed += -tx.amount;
            }
        }

        Ok(buckets)
    }

    /// Σ display balance over all wallets
    pub fn outstanding_balance(&self) -> Result<i64> {
        let cf = self.cf_handle(CF_WALLETS)?;

        let mut outstanding = 0i64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let wallet: Wallet = bincode::deserialize(&value)?;
            outstanding += wallet.balance();
        }

        Ok(outstanding)
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_transactions: self.approximate_count(CF_TRANSACTIONS)?,
            total_wallets: self.approximate_count(CF_WALLETS)?,
            total_users: self.approximate_count(CF_USERS)?,
            total_audit_entries: self.approximate_count(CF_AUDIT)?,
        })
    }

    fn approximate_count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(prop)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate ledger entry count
    pub total_transactions: u64,
    /// Approximate wallet count
    pub total_wallets: u64,
    /// Approximate mirrored user count
    pub total_users: u64,
    /// Approximate audit entry count
    pub total_audit_entries: u64,
}
