//! Custody Core
//!
//! Milestone-gated fund custody: a grantor escrows value for a recipient and
//! an admin releases it in equal installments as milestones are verified.
//!
//! # Architecture
//!
//! - **Call-atomic**: every operation stages writes and transfers on a frame
//!   and commits all of them or none
//! - **Explicit context**: caller, host, and storage are passed in, never ambient
//! - **Closed lifecycle**: trust status is a tagged enum with an explicit edge set
//! - **Pluggable storage**: in-memory by default, RocksDB behind a feature
//!
//! # Invariants
//!
//! - Ids are dense and strictly increasing from 1
//! - `verified_milestones <= len(milestones)`
//! - Released to date = `verified_milestones * ⌊amount / len(milestones)⌋`
//! - Records are never deleted; terminal states are final markers

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod config;
pub mod custody;
pub mod error;
pub mod frame;
pub mod guard;
pub mod host;
pub mod ledger;
pub mod metrics;
pub mod registry;
pub mod schema;
pub mod split;
pub mod storage;
pub mod types;
pub mod verification;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use host::{Host, MemoryHost, TransferError};
pub use ledger::CustodyLedger;
pub use schema::{ProxyCapabilities, RecoveryRequest, TrustProxy};
pub use storage::Storage;
pub use types::{
    Amount, AuditRecord, BlockHeight, FlaggedTrust, GrantorActivity, GroupId, Milestone,
    MilestoneRecord, Principal, ProofDigest, SplitShare, SplitTrust, Trust, TrustId, TrustStatus,
};
pub use verification::Release;
