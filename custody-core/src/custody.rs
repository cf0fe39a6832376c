//! Custody ledger: trust lifecycle
//!
//! ```text
//! create ──► Active ──► Cancelled   (grantor, before expiry)
//!              │   └──► Reverted    (admin, after expiry)
//!              └──► Flagged ──► Reverted
//! ```
//!
//! Every operation here stages its writes and transfers on the call's
//! [`Frame`]; nothing is visible until the ledger settles the frame.

use crate::{
    error::{Error, Result},
    frame::Frame,
    storage::META_LAST_TRUST_ID,
    types::{Amount, BlockHeight, Milestone, Principal, Trust, TrustId, TrustStatus},
};

/// Fail with `AlreadyTerminal` unless the trust is active
pub(crate) fn require_active(trust: &Trust) -> Result<()> {
    if trust.is_active() {
        Ok(())
    } else {
        Err(Error::AlreadyTerminal {
            id: trust.id,
            status: trust.status,
        })
    }
}

fn require_grantor(frame: &Frame<'_>, trust: &Trust, action: &'static str) -> Result<()> {
    if &trust.grantor == frame.caller() {
        Ok(())
    } else {
        Err(Error::unauthorized(frame.caller(), action))
    }
}

fn require_unexpired(frame: &Frame<'_>, trust: &Trust) -> Result<()> {
    if trust.is_expired_at(frame.now()) {
        Err(Error::Expired(trust.id))
    } else {
        Ok(())
    }
}

/// Escrow `amount` from the caller for `recipient`
pub fn create(
    frame: &mut Frame<'_>,
    recipient: Principal,
    amount: Amount,
    milestones: Vec<Milestone>,
) -> Result<TrustId> {
    let limits = &frame.config().limits;

    if amount == 0 {
        return Err(Error::InvalidInput("amount must be positive".to_string()));
    }
    if &recipient == frame.caller() {
        return Err(Error::InvalidInput(
            "recipient must differ from grantor".to_string(),
        ));
    }
    if milestones.is_empty() {
        return Err(Error::InvalidInput(
            "at least one milestone is required".to_string(),
        ));
    }
    if milestones.len() > limits.max_milestones {
        return Err(Error::InvalidInput(format!(
            "{} milestones exceed the limit of {}",
            milestones.len(),
            limits.max_milestones
        )));
    }

    let id = frame.next_sequence(META_LAST_TRUST_ID)?;
    let grantor = frame.caller().clone();
    let now = frame.now();

    let trust = Trust {
        id,
        grantor,
        recipient,
        amount,
        status: TrustStatus::Active,
        created_at: now,
        terminates_at: now.saturating_add(limits.trust_duration),
        milestones,
        verified_milestones: 0,
    };

    frame.put_trust(&trust)?;
    frame.queue_transfer(amount, &trust.grantor, frame.custody());

    tracing::debug!(
        trust_id = id,
        grantor = %trust.grantor,
        recipient = %trust.recipient,
        amount = %amount,
        terminates_at = trust.terminates_at,
        "Trust staged"
    );

    Ok(id)
}

/// Return the unreleased value to the grantor. Returns the refund.
pub fn cancel(frame: &mut Frame<'_>, id: TrustId) -> Result<Amount> {
    let mut trust = frame.trust(id)?;
    require_grantor(frame, &trust, "cancel")?;
    require_active(&trust)?;
    require_unexpired(frame, &trust)?;

    let refund = trust.remaining_after_release();
    trust.status = trust.status.transition(TrustStatus::Cancelled)?;

    frame.put_trust(&trust)?;
    frame.queue_transfer(refund, frame.custody(), &trust.grantor);

    tracing::debug!(trust_id = id, refund = %refund, "Cancellation staged");
    Ok(refund)
}

/// Refund an expired trust to its grantor. Returns the refund.
///
/// The refund is the full recorded `amount`, not the unreleased remainder:
/// value already paid out for verified milestones is refunded a second time,
/// drawing on custody funds of other trusts.
pub fn revert_expired(frame: &mut Frame<'_>, id: TrustId) -> Result<Amount> {
    frame.require_admin("revert")?;

    let mut trust = frame.trust(id)?;
    if !trust.status.can_transition_to(TrustStatus::Reverted) {
        return Err(Error::AlreadyTerminal {
            id,
            status: trust.status,
        });
    }
    if !trust.is_expired_at(frame.now()) {
        return Err(Error::NotYetExpired(id));
    }

    let refund = trust.amount;
    if trust.released_to_date() > 0 {
        tracing::warn!(
            trust_id = id,
            refund = %refund,
            released = %trust.released_to_date(),
            "Revert refunds value already released to the recipient"
        );
    }

    trust.status = trust.status.transition(TrustStatus::Reverted)?;
    frame.put_trust(&trust)?;
    frame.queue_transfer(refund, frame.custody(), &trust.grantor);

    tracing::debug!(trust_id = id, refund = %refund, "Revert staged");
    Ok(refund)
}

/// Push the termination point back. Returns the new termination point.
pub fn extend(frame: &mut Frame<'_>, id: TrustId, extra: BlockHeight) -> Result<BlockHeight> {
    let max_extension = frame.config().limits.max_extension;

    let mut trust = frame.trust(id)?;
    require_grantor(frame, &trust, "extend")?;
    require_active(&trust)?;
    require_unexpired(frame, &trust)?;

    if extra == 0 || extra > max_extension {
        return Err(Error::InvalidInput(format!(
            "extension must be within 1..={}",
            max_extension
        )));
    }

    trust.terminates_at = trust
        .terminates_at
        .checked_add(extra)
        .ok_or_else(|| Error::InvalidInput("termination point overflow".to_string()))?;
    frame.put_trust(&trust)?;

    tracing::debug!(trust_id = id, terminates_at = trust.terminates_at, "Extension staged");
    Ok(trust.terminates_at)
}

/// Add value to a trust. Returns the new amount.
pub fn increase(frame: &mut Frame<'_>, id: TrustId, extra_amount: Amount) -> Result<Amount> {
    let mut trust = frame.trust(id)?;
    require_grantor(frame, &trust, "increase")?;
    require_active(&trust)?;
    require_unexpired(frame, &trust)?;

    if extra_amount == 0 {
        return Err(Error::InvalidInput("amount must be positive".to_string()));
    }

    trust.amount = trust
        .amount
        .checked_add(extra_amount)
        .ok_or_else(|| Error::InvalidInput("amount overflow".to_string()))?;

    frame.put_trust(&trust)?;
    frame.queue_transfer(extra_amount, &trust.grantor, frame.custody());

    tracing::debug!(trust_id = id, amount = %trust.amount, "Increase staged");
    Ok(trust.amount)
}
