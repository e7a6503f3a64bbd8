//! Authorization gate ahead of the ledger API
//!
//! A declarative capability table maps each operation to the staff roles
//! allowed to invoke it. The gateway resolves a staff session to roles
//! and calls [`authorize`] before touching the ledger; the ledger itself
//! never sees role strings.

use crate::error::{Error, Result};
use std::fmt;

/// Staff role, as assigned by the staff directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Read-only dashboards
    Viewer,
    /// Customer support
    Support,
    /// Platform operations
    Ops,
    /// Billing staff
    Billing,
    /// Administrators
    Admin,
    /// Account owners
    Owner,
}

impl Role {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Support => "support",
            Role::Ops => "ops",
            Role::Billing => "billing",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Parse from wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(Role::Viewer),
            "support" => Some(Role::Support),
            "ops" => Some(Role::Ops),
            "billing" => Some(Role::Billing),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation the gate can authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read the token dashboard
    ViewDashboard,
    /// Read the global ledger
    ViewLedger,
    /// Read a user's balance and history
    ViewUserTokens,
    /// Grant tokens to a user
    GrantTokens,
    /// Debit tokens from a user
    DebitTokens,
    /// Reconcile a wallet against the ledger
    Reconcile,
    /// Read the audit trail
    ViewAuditLog,
    /// Change banner / maintenance mode
    ManageSystemState,
    /// Upsert directory read-model records
    ManageUsers,
}

impl Capability {
    /// Roles allowed to exercise this capability
    pub fn allowed_roles(&self) -> &'static [Role] {
        use Role::*;
        match self {
            Capability::ViewDashboard => &[Admin, Owner, Billing, Viewer],
            Capability::ViewLedger => &[Admin, Owner, Billing, Viewer],
            Capability::ViewUserTokens => &[Admin, Owner, Billing, Support],
            Capability::GrantTokens => &[Admin, Owner, Billing],
            Capability::DebitTokens => &[Admin, Owner, Billing],
            Capability::Reconcile => &[Admin, Owner],
            Capability::ViewAuditLog => &[Admin, Owner, Viewer],
            Capability::ManageSystemState => &[Admin, Owner, Ops],
            Capability::ManageUsers => &[Admin, Owner],
        }
    }

    /// Stable name for logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewDashboard => "view_dashboard",
            Capability::ViewLedger => "view_ledger",
            Capability::ViewUserTokens => "view_user_tokens",
            Capability::GrantTokens => "grant_tokens",
            Capability::DebitTokens => "debit_tokens",
            Capability::Reconcile => "reconcile",
            Capability::ViewAuditLog => "view_audit_log",
            Capability::ManageSystemState => "manage_system_state",
            Capability::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check a caller's roles against the capability table
pub fn authorize(roles: &[Role], capability: Capability) -> Result<()> {
    let allowed = capability.allowed_roles();
    if roles.iter().any(|role| allowed.contains(role)) {
        Ok(())
    } else {
        Err(Error::Forbidden(capability.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_round_trip() {
        for role in [
            Role::Viewer,
            Role::Support,
            Role::Ops,
            Role::Billing,
            Role::Admin,
            Role::Owner,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_grant_requires_billing_tier() {
        assert!(authorize(&[Role::Billing], Capability::GrantTokens).is_ok());
        assert!(authorize(&[Role::Admin], Capability::GrantTokens).is_ok());
        assert!(matches!(
            authorize(&[Role::Viewer], Capability::GrantTokens),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&[Role::Support], Capability::GrantTokens),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_any_matching_role_suffices() {
        assert!(authorize(&[Role::Viewer, Role::Billing], Capability::GrantTokens).is_ok());
        assert!(authorize(&[], Capability::ViewDashboard).is_err());
    }

    #[test]
    fn test_support_sees_user_tokens_but_not_ledger() {
        assert!(authorize(&[Role::Support], Capability::ViewUserTokens).is_ok());
        assert!(authorize(&[Role::Support], Capability::ViewLedger).is_err());
    }

    #[test]
    fn test_ops_manages_system_state_only() {
        assert!(authorize(&[Role::Ops], Capability::ManageSystemState).is_ok());
        assert!(authorize(&[Role::Ops], Capability::GrantTokens).is_err());
        assert!(authorize(&[Role::Ops], Capability::ViewDashboard).is_err());
    }
}
