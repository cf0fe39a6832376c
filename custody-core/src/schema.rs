//! Delegation and recovery records
//!
//! These shapes have persistent maps (`proxies`, `recoveries`) but no
//! operation writes or enforces them yet. The ledger only exposes reads.

use crate::types::{BlockHeight, Principal, TrustId};
use serde::{Deserialize, Serialize};

/// Operations a proxy may perform on the grantor's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProxyCapabilities {
    /// May cancel
    pub can_cancel: bool,
    /// May extend
    pub can_extend: bool,
    /// May increase
    pub can_increase: bool,
}

/// Delegate acting for a trust's grantor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustProxy {
    /// Trust the delegation applies to
    pub trust_id: TrustId,
    /// Delegate
    pub delegate: Principal,
    /// Granted capabilities
    pub capabilities: ProxyCapabilities,
    /// Last time point the delegation is valid
    pub expires_at: BlockHeight,
}

impl TrustProxy {
    /// Whether the delegation is still valid at `now`
    pub fn is_valid_at(&self, now: BlockHeight) -> bool {
        now <= self.expires_at
    }
}

/// Emergency recovery request needing grantor and admin approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    /// Trust to recover
    pub trust_id: TrustId,
    /// Grantor approval
    pub grantor_approved: bool,
    /// Admin approval
    pub admin_approved: bool,
    /// Free-text reason
    pub reason: String,
    /// Time point of the request
    pub requested_at: BlockHeight,
}

impl RecoveryRequest {
    /// Both approvals present
    pub fn is_approved(&self) -> bool {
        self.grantor_approved && self.admin_approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_needs_both_approvals() {
        let mut request = RecoveryRequest {
            trust_id: 1,
            grantor_approved: true,
            admin_approved: false,
            reason: "lost key".to_string(),
            requested_at: 10,
        };
        assert!(!request.is_approved());
        request.admin_approved = true;
        assert!(request.is_approved());
    }

    #[test]
    fn test_proxy_expiry_inclusive() {
        let proxy = TrustProxy {
            trust_id: 1,
            delegate: Principal::new("ST1DELEGATE"),
            capabilities: ProxyCapabilities {
                can_extend: true,
                ..Default::default()
            },
            expires_at: 100,
        };
        assert!(proxy.is_valid_at(100));
        assert!(!proxy.is_valid_at(101));
    }
}
