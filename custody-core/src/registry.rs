//! Flagging, audit and evidence registry, plus platform controls
//!
//! Annotations reference a trust by id and live in their own maps. Flagging
//! is the only annotation that touches the trust itself (its status).

use crate::{
    custody::require_active,
    error::{Error, Result},
    frame::Frame,
    storage::{self, Table, META_PLATFORM_FROZEN},
    types::{
        Amount, AuditRecord, FlaggedTrust, MilestoneRecord, Principal, ProofDigest, TrustId,
        TrustStatus,
    },
};

fn require_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        Err(Error::InvalidInput(format!(
            "{} is {} bytes, limit is {}",
            field,
            value.len(),
            max
        )))
    } else {
        Ok(())
    }
}

/// Whether the platform is frozen
pub fn platform_frozen(frame: &Frame<'_>) -> Result<bool> {
    Ok(frame.read(Table::Meta, META_PLATFORM_FROZEN)?.unwrap_or(false))
}

/// Whether a recipient is on the allow-list
pub fn recipient_approved(frame: &Frame<'_>, recipient: &Principal) -> Result<bool> {
    Ok(frame
        .read(Table::Approvals, &storage::principal_key(recipient))?
        .unwrap_or(false))
}

/// Admin toggle of the platform freeze
pub fn set_platform_status(frame: &mut Frame<'_>, frozen: bool) -> Result<()> {
    frame.require_admin("set platform status")?;
    frame.write(Table::Meta, META_PLATFORM_FROZEN.to_vec(), &frozen)?;
    tracing::debug!(frozen, "Platform status staged");
    Ok(())
}

/// Admin maintenance of the recipient allow-list
pub fn set_recipient_approval(
    frame: &mut Frame<'_>,
    recipient: &Principal,
    approved: bool,
) -> Result<()> {
    frame.require_admin("set recipient approval")?;
    frame.write(Table::Approvals, storage::principal_key(recipient), &approved)?;
    tracing::debug!(recipient = %recipient, approved, "Recipient approval staged");
    Ok(())
}

/// Flag a trust. Only the admin or the trust's recipient may flag.
pub fn flag(frame: &mut Frame<'_>, id: TrustId, reason: String) -> Result<()> {
    let mut trust = frame.trust(id)?;
    if !frame.caller_is_admin() && &trust.recipient != frame.caller() {
        return Err(Error::unauthorized(frame.caller(), "flag"));
    }
    require_len("reason", &reason, frame.config().limits.max_reason_len)?;

    trust.status = trust.status.transition(TrustStatus::Flagged)?;
    frame.put_trust(&trust)?;

    let record = FlaggedTrust {
        trust_id: id,
        flagged_by: frame.caller().clone(),
        reason,
        flagged_at: frame.now(),
    };
    frame.write(Table::Flags, storage::id_key(id), &record)?;

    tracing::debug!(trust_id = id, flagged_by = %record.flagged_by, "Flag staged");
    Ok(())
}

/// Open the single audit of a trust, posting the audit deposit
pub fn submit_audit(frame: &mut Frame<'_>, id: TrustId, findings: String) -> Result<Amount> {
    let limits = &frame.config().limits;

    frame.trust(id)?;
    let key = storage::id_key(id);
    if frame.read::<AuditRecord>(Table::Audits, &key)?.is_some() {
        return Err(Error::AuditExists(id));
    }
    require_len("findings", &findings, limits.max_findings_len)?;

    let record = AuditRecord {
        trust_id: id,
        auditor: frame.caller().clone(),
        findings,
        deposit: limits.audit_deposit,
        submitted_at: frame.now(),
        completed: false,
    };

    frame.write(Table::Audits, key, &record)?;
    frame.queue_transfer(record.deposit, &record.auditor, frame.custody());

    tracing::debug!(trust_id = id, auditor = %record.auditor, "Audit staged");
    Ok(record.deposit)
}

/// Record progress evidence for one milestone. Recipient only; never
/// releases value.
pub fn submit_milestone_evidence(
    frame: &mut Frame<'_>,
    id: TrustId,
    index: u32,
    progress: u8,
    details: String,
    proof: ProofDigest,
) -> Result<()> {
    let trust = frame.trust(id)?;
    if &trust.recipient != frame.caller() {
        return Err(Error::unauthorized(frame.caller(), "submit milestone evidence"));
    }
    require_active(&trust)?;

    if index as usize >= trust.milestones.len() {
        return Err(Error::InvalidInput(format!(
            "milestone index {} out of range for {} milestones",
            index,
            trust.milestones.len()
        )));
    }
    if progress > 100 {
        return Err(Error::InvalidInput(format!(
            "progress {} exceeds 100",
            progress
        )));
    }
    require_len("details", &details, frame.config().limits.max_details_len)?;

    let record = MilestoneRecord {
        trust_id: id,
        index,
        progress,
        details,
        recorded_at: frame.now(),
        proof,
    };
    frame.write(Table::Milestones, storage::milestone_key(id, index), &record)?;

    tracing::debug!(trust_id = id, index, progress, proof = %proof, "Milestone evidence staged");
    Ok(())
}
