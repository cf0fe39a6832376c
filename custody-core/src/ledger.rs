//! Public ledger surface
//!
//! [`CustodyLedger`] ties storage, the host, and the operation modules into
//! one call-atomic API. Every mutating method:
//!
//! 1. opens a [`Frame`] at the host's current time point,
//! 2. runs the operation against it (validation, staged writes, queued transfers),
//! 3. settles it: transfers through the host, then one atomic storage commit.
//!
//! A failure in step 2 discards the frame. A declined transfer in step 3
//! reverses the transfers already executed for this call and discards the
//! frame. Either way, the call leaves no trace.
//!
//! # Example
//!
//! ```
//! use custody_core::{CustodyLedger, Config, MemoryHost, Milestone, Principal};
//!
//! # fn main() -> custody_core::Result<()> {
//! let config = Config::default();
//! let admin = config.admin.clone();
//! let grantor = Principal::new("ST1GRANTOR");
//! let recipient = Principal::new("ST1RECIPIENT");
//!
//! let mut host = MemoryHost::new();
//! host.mint(&grantor, 1_000);
//!
//! let mut ledger = CustodyLedger::open(config, host)?;
//! let id = ledger.create(&grantor, recipient.clone(), 400, vec![
//!     Milestone::new("foundation"),
//!     Milestone::new("roof"),
//! ])?;
//!
//! ledger.verify_one(&admin, id)?;
//! assert_eq!(ledger.host().balance(&recipient), 200);
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    custody,
    error::{Error, Result},
    frame::{Frame, PendingTransfer},
    guard,
    host::Host,
    metrics::Metrics,
    registry,
    schema::{RecoveryRequest, TrustProxy},
    split,
    storage::{self, Storage, Table, WriteSet, META_LAST_TRUST_ID, META_PLATFORM_FROZEN},
    types::{
        Amount, AuditRecord, BlockHeight, FlaggedTrust, GrantorActivity, GroupId, Milestone,
        MilestoneRecord, Principal, ProofDigest, SplitShare, SplitTrust, Trust, TrustId,
    },
    verification::{self, Release},
};

/// Custody ledger bound to a host
pub struct CustodyLedger<H: Host> {
    config: Config,
    storage: Storage,
    host: H,
    metrics: Metrics,
}

impl<H: Host> CustodyLedger<H> {
    /// Open the ledger with the storage backend named in `config`
    pub fn open(config: Config, host: H) -> Result<Self> {
        let storage = Storage::open(&config)?;
        Self::with_storage(config, storage, host)
    }

    /// Open the ledger over existing storage
    pub fn with_storage(config: Config, storage: Storage, host: H) -> Result<Self> {
        config.validate()?;
        let metrics = Metrics::new().map_err(|e| Error::Config(e.to_string()))?;

        tracing::info!(
            admin = %config.admin,
            custody = %config.custody_account,
            backend = ?config.storage.backend,
            "Custody ledger opened"
        );

        Ok(Self {
            config,
            storage,
            host,
            metrics,
        })
    }

    /// Host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host (clock, balances)
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run `op` atomically on behalf of `caller`
    fn execute<T>(
        &mut self,
        op: &'static str,
        caller: &Principal,
        f: impl FnOnce(&mut Frame<'_>) -> Result<T>,
    ) -> Result<T> {
        let span = tracing::info_span!("custody_call", op, caller = %caller);
        let _enter = span.enter();

        let now = self.host.block_height();
        let mut frame = Frame::new(&self.storage, &self.config, caller.clone(), now);
        let outcome = f(&mut frame);
        let (writes, transfers) = frame.into_parts();

        let result = outcome.and_then(|value| {
            let transfer_count = transfers.len();
            self.settle(writes, transfers)?;
            tracing::info!(height = now, transfers = transfer_count, "Call committed");
            Ok(value)
        });

        if let Err(ref e) = result {
            self.metrics.record_rejection(e.kind());
            tracing::debug!(error = %e, "Call rejected");
        }
        result
    }

    fn settle(&mut self, writes: WriteSet, transfers: Vec<PendingTransfer>) -> Result<()> {
        let mut executed = Vec::with_capacity(transfers.len());

        for transfer in transfers {
            if let Err(e) = self
                .host
                .transfer(transfer.amount, &transfer.from, &transfer.to)
            {
                tracing::warn!(
                    amount = %transfer.amount,
                    from = %transfer.from,
                    to = %transfer.to,
                    error = %e,
                    rollback = executed.len(),
                    "Transfer declined, rolling back call"
                );
                self.compensate(&executed)?;
                return Err(Error::TransferFailed(e));
            }
            executed.push(transfer);
        }

        if let Err(e) = self.storage.commit(writes) {
            self.compensate(&executed)?;
            return Err(e);
        }
        Ok(())
    }

    /// Reverse executed transfers, newest first
    fn compensate(&mut self, executed: &[PendingTransfer]) -> Result<()> {
        for transfer in executed.iter().rev() {
            self.host
                .transfer(transfer.amount, &transfer.to, &transfer.from)
                .map_err(|e| {
                    tracing::error!(
                        amount = %transfer.amount,
                        from = %transfer.to,
                        to = %transfer.from,
                        error = %e,
                        "Compensating transfer failed"
                    );
                    Error::InvariantViolation(format!(
                        "could not reverse transfer of {} from {} to {}: {}",
                        transfer.amount, transfer.from, transfer.to, e
                    ))
                })?;
        }
        Ok(())
    }

    // Custody ledger

    /// Escrow `amount` from `caller` for `recipient`
    pub fn create(
        &mut self,
        caller: &Principal,
        recipient: Principal,
        amount: Amount,
        milestones: Vec<Milestone>,
    ) -> Result<TrustId> {
        let id = self.execute("create", caller, |frame| {
            custody::create(frame, recipient, amount, milestones)
        })?;
        self.metrics.record_trust_created();
        Ok(id)
    }

    /// Cancel an active, unexpired trust. Returns the refund.
    pub fn cancel(&mut self, caller: &Principal, id: TrustId) -> Result<Amount> {
        let refund = self.execute("cancel", caller, |frame| custody::cancel(frame, id))?;
        self.metrics.record_refund(refund);
        Ok(refund)
    }

    /// Refund an expired trust in full. Returns the refund.
    pub fn revert_expired(&mut self, caller: &Principal, id: TrustId) -> Result<Amount> {
        let refund = self.execute("revert_expired", caller, |frame| {
            custody::revert_expired(frame, id)
        })?;
        self.metrics.record_refund(refund);
        Ok(refund)
    }

    /// Extend a trust. Returns the new termination point.
    pub fn extend(
        &mut self,
        caller: &Principal,
        id: TrustId,
        extra: BlockHeight,
    ) -> Result<BlockHeight> {
        self.execute("extend", caller, |frame| custody::extend(frame, id, extra))
    }

    /// Add value to a trust. Returns the new amount.
    pub fn increase(
        &mut self,
        caller: &Principal,
        id: TrustId,
        extra_amount: Amount,
    ) -> Result<Amount> {
        self.execute("increase", caller, |frame| {
            custody::increase(frame, id, extra_amount)
        })
    }

    // Verification engine

    /// Verify the next milestone of a trust
    pub fn verify_one(&mut self, caller: &Principal, id: TrustId) -> Result<Release> {
        let release = self.execute("verify_one", caller, |frame| {
            verification::verify_one(frame, id)
        })?;
        self.metrics.record_release(release.amount);
        Ok(release)
    }

    /// Verify one milestone on each trust; all or nothing
    pub fn verify_batch(&mut self, caller: &Principal, ids: &[TrustId]) -> Result<Vec<Release>> {
        let releases = self.execute("verify_batch", caller, |frame| {
            verification::verify_batch(frame, ids)
        })?;
        for release in &releases {
            self.metrics.record_release(release.amount);
        }
        Ok(releases)
    }

    // Split trusts

    /// Escrow `amount` for a group of beneficiaries
    pub fn create_split(
        &mut self,
        caller: &Principal,
        beneficiaries: Vec<SplitShare>,
        amount: Amount,
    ) -> Result<GroupId> {
        let id = self.execute("create_split", caller, |frame| {
            split::create_split(frame, beneficiaries, amount)
        })?;
        self.metrics.record_split_created();
        Ok(id)
    }

    // Security guard

    /// Rate-guarded creation
    pub fn secure_create(
        &mut self,
        caller: &Principal,
        recipient: Principal,
        amount: Amount,
        milestones: Vec<Milestone>,
    ) -> Result<TrustId> {
        let id = self.execute("secure_create", caller, |frame| {
            guard::secure_create(frame, recipient, amount, milestones)
        })?;
        self.metrics.record_trust_created();
        Ok(id)
    }

    /// Rate-guarded creation for approved recipients on an unfrozen platform
    pub fn protected_create(
        &mut self,
        caller: &Principal,
        recipient: Principal,
        amount: Amount,
        milestones: Vec<Milestone>,
    ) -> Result<TrustId> {
        let id = self.execute("protected_create", caller, |frame| {
            guard::protected_create(frame, recipient, amount, milestones)
        })?;
        self.metrics.record_trust_created();
        Ok(id)
    }

    // Registry

    /// Flag a trust
    pub fn flag(
        &mut self,
        caller: &Principal,
        id: TrustId,
        reason: impl Into<String>,
    ) -> Result<()> {
        let reason = reason.into();
        self.execute("flag", caller, |frame| registry::flag(frame, id, reason))
    }

    /// Open the audit of a trust. Returns the deposit taken.
    pub fn submit_audit(
        &mut self,
        caller: &Principal,
        id: TrustId,
        findings: impl Into<String>,
    ) -> Result<Amount> {
        let findings = findings.into();
        self.execute("submit_audit", caller, |frame| {
            registry::submit_audit(frame, id, findings)
        })
    }

    /// Record progress evidence for a milestone
    pub fn submit_milestone_evidence(
        &mut self,
        caller: &Principal,
        id: TrustId,
        index: u32,
        progress: u8,
        details: impl Into<String>,
        proof: ProofDigest,
    ) -> Result<()> {
        let details = details.into();
        self.execute("submit_milestone_evidence", caller, |frame| {
            registry::submit_milestone_evidence(frame, id, index, progress, details, proof)
        })
    }

    /// Freeze or unfreeze guarded creation
    pub fn set_platform_status(&mut self, caller: &Principal, frozen: bool) -> Result<()> {
        self.execute("set_platform_status", caller, |frame| {
            registry::set_platform_status(frame, frozen)
        })
    }

    /// Add or remove a recipient from the allow-list
    pub fn set_recipient_approval(
        &mut self,
        caller: &Principal,
        recipient: &Principal,
        approved: bool,
    ) -> Result<()> {
        self.execute("set_recipient_approval", caller, |frame| {
            registry::set_recipient_approval(frame, recipient, approved)
        })
    }

    // Read-only queries

    /// Trust by id
    pub fn trust(&self, id: TrustId) -> Result<Option<Trust>> {
        self.storage.get(Table::Trusts, &storage::id_key(id))
    }

    /// Split trust by id
    pub fn split_trust(&self, id: GroupId) -> Result<Option<SplitTrust>> {
        self.storage.get(Table::SplitTrusts, &storage::id_key(id))
    }

    /// Evidence for one milestone
    pub fn milestone_record(&self, id: TrustId, index: u32) -> Result<Option<MilestoneRecord>> {
        self.storage
            .get(Table::Milestones, &storage::milestone_key(id, index))
    }

    /// Flag annotation of a trust
    pub fn flag_record(&self, id: TrustId) -> Result<Option<FlaggedTrust>> {
        self.storage.get(Table::Flags, &storage::id_key(id))
    }

    /// Audit annotation of a trust
    pub fn audit_record(&self, id: TrustId) -> Result<Option<AuditRecord>> {
        self.storage.get(Table::Audits, &storage::id_key(id))
    }

    /// Rate window state of a grantor
    pub fn grantor_activity(&self, grantor: &Principal) -> Result<Option<GrantorActivity>> {
        self.storage
            .get(Table::Activity, &storage::principal_key(grantor))
    }

    /// Proxy registered for a trust
    pub fn proxy(&self, id: TrustId) -> Result<Option<TrustProxy>> {
        self.storage.get(Table::Proxies, &storage::id_key(id))
    }

    /// Recovery request registered for a trust
    pub fn recovery_request(&self, id: TrustId) -> Result<Option<RecoveryRequest>> {
        self.storage.get(Table::Recoveries, &storage::id_key(id))
    }

    /// Whether a recipient is on the allow-list
    pub fn is_recipient_approved(&self, recipient: &Principal) -> Result<bool> {
        Ok(self
            .storage
            .get(Table::Approvals, &storage::principal_key(recipient))?
            .unwrap_or(false))
    }

    /// Whether the platform is frozen
    pub fn is_platform_frozen(&self) -> Result<bool> {
        Ok(self
            .storage
            .get(Table::Meta, META_PLATFORM_FROZEN)?
            .unwrap_or(false))
    }

    /// Last issued trust id (0 before the first creation)
    pub fn last_trust_id(&self) -> Result<TrustId> {
        Ok(self.storage.get(Table::Meta, META_LAST_TRUST_ID)?.unwrap_or(0))
    }
}
