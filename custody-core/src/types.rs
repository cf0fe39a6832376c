//! Core types for the custody ledger
//!
//! All records are designed for:
//! - Deterministic serialization (bincode)
//! - Exact integer arithmetic (no fractional value units)
//! - Single ownership (each record lives in exactly one map, keyed by its id)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Trust identifier (dense, strictly increasing, first id is 1)
pub type TrustId = u64;

/// Split-trust group identifier
pub type GroupId = u64;

/// Amount of the single fungible value unit
pub type Amount = u128;

/// Host time point (monotonic counter)
pub type BlockHeight = u64;

/// Identity supplied by the host (account address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Create new principal
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque milestone marker. Its content never influences release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone(String);

impl Milestone {
    /// Create new milestone marker
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trust status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TrustStatus {
    /// Funds in custody, milestones releasable
    Active = 1,
    /// Cancelled by the grantor (terminal)
    Cancelled = 2,
    /// Refunded after expiry (terminal)
    Reverted = 3,
    /// Flagged by admin or recipient
    Flagged = 4,
}

impl TrustStatus {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustStatus::Active => "active",
            TrustStatus::Cancelled => "cancelled",
            TrustStatus::Reverted => "reverted",
            TrustStatus::Flagged => "flagged",
        }
    }

    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrustStatus::Cancelled | TrustStatus::Reverted)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, next: TrustStatus) -> bool {
        matches!(
            (self, next),
            (TrustStatus::Active, TrustStatus::Cancelled)
                | (TrustStatus::Active, TrustStatus::Reverted)
                | (TrustStatus::Active, TrustStatus::Flagged)
                | (TrustStatus::Flagged, TrustStatus::Reverted)
        )
    }

    /// Apply a lifecycle edge, rejecting anything outside the edge set
    pub fn transition(self, next: TrustStatus) -> Result<TrustStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TrustStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Milestone-gated custody record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trust {
    /// Trust ID
    pub id: TrustId,

    /// Depositor; receives refunds
    pub grantor: Principal,

    /// Receives milestone releases
    pub recipient: Principal,

    /// Total committed value (changes only through `increase`)
    pub amount: Amount,

    /// Lifecycle status
    pub status: TrustStatus,

    /// Creation time point
    pub created_at: BlockHeight,

    /// Last time point at which grantor operations are allowed
    pub terminates_at: BlockHeight,

    /// Ordered milestone markers (bounded at creation)
    pub milestones: Vec<Milestone>,

    /// Number of verified milestones, never above `milestones.len()`
    pub verified_milestones: u32,
}

impl Trust {
    /// Value released per verified milestone, `⌊amount / len(milestones)⌋`
    pub fn per_milestone_release(&self) -> Amount {
        self.amount
            .checked_div(self.milestones.len() as Amount)
            .unwrap_or(0)
    }

    /// Value released to the recipient so far
    pub fn released_to_date(&self) -> Amount {
        self.per_milestone_release() * Amount::from(self.verified_milestones)
    }

    /// Value a cancellation returns to the grantor
    pub fn remaining_after_release(&self) -> Amount {
        self.amount.saturating_sub(self.released_to_date())
    }

    /// Milestones not yet verified
    pub fn milestones_remaining(&self) -> u32 {
        (self.milestones.len() as u32).saturating_sub(self.verified_milestones)
    }

    /// Whether `now` is past the termination point
    pub fn is_expired_at(&self, now: BlockHeight) -> bool {
        now > self.terminates_at
    }

    /// Check if trust is active
    pub fn is_active(&self) -> bool {
        self.status == TrustStatus::Active
    }
}

/// Beneficiary entry of a split trust
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShare {
    /// Beneficiary
    pub recipient: Principal,

    /// Percentage share
    pub share: u32,
}

impl SplitShare {
    /// Create new share entry
    pub fn new(recipient: Principal, share: u32) -> Self {
        Self { recipient, share }
    }
}

/// One-to-many custody record. No release path exists yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTrust {
    /// Group ID
    pub id: GroupId,

    /// Depositor
    pub grantor: Principal,

    /// Beneficiaries, shares sum to 100
    pub beneficiaries: Vec<SplitShare>,

    /// Escrowed value
    pub total_amount: Amount,

    /// Creation time point
    pub created_at: BlockHeight,

    /// Lifecycle status
    pub status: TrustStatus,
}

/// Fixed-size proof digest (SHA-256)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofDigest([u8; 32]);

impl ProofDigest {
    /// Hash arbitrary proof material
    pub fn of(material: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(material);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ProofDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Evidentiary progress annotation; never gates release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// Trust this record annotates
    pub trust_id: TrustId,

    /// Milestone index
    pub index: u32,

    /// Progress level (0-100)
    pub progress: u8,

    /// Free-text details
    pub details: String,

    /// Time point of submission
    pub recorded_at: BlockHeight,

    /// Digest of the off-ledger proof
    pub proof: ProofDigest,
}

/// Rolling-window creation counter for one grantor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrantorActivity {
    /// Time point of the last rate-checked creation
    pub last_action: BlockHeight,

    /// Creations counted in the current window
    pub count: u32,
}

/// Flag annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedTrust {
    /// Flagged trust
    pub trust_id: TrustId,

    /// Admin or recipient who raised the flag
    pub flagged_by: Principal,

    /// Free-text reason
    pub reason: String,

    /// Time point of flagging
    pub flagged_at: BlockHeight,
}

/// Audit annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Audited trust
    pub trust_id: TrustId,

    /// Caller who opened the audit
    pub auditor: Principal,

    /// Free-text findings
    pub findings: String,

    /// Deposit posted into custody
    pub deposit: Amount,

    /// Time point of submission
    pub submitted_at: BlockHeight,

    /// Completion marker (no operation sets it yet)
    pub completed: bool,
}
