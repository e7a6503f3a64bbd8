//! Audit trail for administrative actions
//!
//! Every mutating admin operation writes exactly one entry, committed in
//! the same atomic batch as the operation's own effects. Entries are
//! distinct from ledger transactions: they record who did what, with
//! before/after snapshots and request metadata, and are never mutated.

use crate::types::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit action names
pub mod actions {
    /// Administrative token grant
    pub const TOKENS_GRANT: &str = "tokens.grant";
    /// Administrative token debit
    pub const TOKENS_DEBIT: &str = "tokens.debit";
    /// Wallet balance reconciliation
    pub const TOKENS_RECONCILE: &str = "tokens.reconcile";
    /// Banner / maintenance-mode change
    pub const SYSTEM_STATE_SET: &str = "system.state_set";
}

/// Request metadata captured alongside an admin action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Caller IP address
    pub ip: Option<String>,

    /// Caller user agent
    pub user_agent: Option<String>,
}

/// Immutable record of one administrative action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// Staff actor, if the action was performed by a person
    pub actor_id: Option<ActorId>,

    /// Action name (see [`actions`])
    pub action: String,

    /// Kind of the affected entity ("user", "system", ...)
    pub target_type: Option<String>,

    /// Identifier of the affected entity
    pub target_id: Option<String>,

    /// Opaque snapshot before the action
    pub before: Option<serde_json::Value>,

    /// Opaque snapshot after the action
    pub after: Option<serde_json::Value>,

    /// Caller IP address
    pub ip: Option<String>,

    /// Caller user agent
    pub user_agent: Option<String>,

    /// Entry creation timestamp
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// New entry for an action
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor_id: None,
            action: action.into(),
            target_type: None,
            target_id: None,
            before: None,
            after: None,
            ip: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    /// Set the acting staff member
    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor_id = Some(actor);
        self
    }

    /// Set the affected entity
    pub fn with_target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    /// Set the before snapshot
    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    /// Set the after snapshot
    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }

    /// Attach request metadata
    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.ip = meta.ip;
        self.user_agent = meta.user_agent;
        self
    }
}

/// One page of audit entries, newest first
#[derive(Debug, Clone)]
pub struct AuditPage {
    /// Entries on this page
    pub entries: Vec<AuditEntry>,

    /// Total entries across all pages
    pub total: u64,

    /// Echoed page number
    pub page: u32,

    /// Echoed page size
    pub limit: u32,
}
