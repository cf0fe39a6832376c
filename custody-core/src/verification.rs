//! Milestone verification engine
//!
//! Each verification releases `⌊amount / len(milestones)⌋` from custody to the
//! recipient. A batch runs every element against the same frame: the first
//! failing element aborts the call and the frame, with every release staged
//! for earlier elements, is discarded.

use crate::{
    custody::require_active,
    error::{Error, Result},
    frame::Frame,
    types::{Amount, TrustId},
};

/// Outcome of one verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    /// Verified trust
    pub trust_id: TrustId,
    /// Value released by this verification
    pub amount: Amount,
    /// Verified count after this verification
    pub verified_milestones: u32,
}

/// Verify the next milestone of one trust
pub fn verify_one(frame: &mut Frame<'_>, id: TrustId) -> Result<Release> {
    frame.require_admin("verify")?;

    let mut trust = frame.trust(id)?;
    require_active(&trust)?;
    if trust.milestones_remaining() == 0 {
        return Err(Error::AlreadyTerminal {
            id,
            status: trust.status,
        });
    }

    let amount = trust.per_milestone_release();
    trust.verified_milestones += 1;

    frame.put_trust(&trust)?;
    frame.queue_transfer(amount, frame.custody(), &trust.recipient);

    tracing::debug!(
        trust_id = id,
        verified = trust.verified_milestones,
        total = trust.milestones.len(),
        release = %amount,
        "Milestone release staged"
    );

    Ok(Release {
        trust_id: id,
        amount,
        verified_milestones: trust.verified_milestones,
    })
}

/// Verify one milestone on each trust, in order, all or nothing
pub fn verify_batch(frame: &mut Frame<'_>, ids: &[TrustId]) -> Result<Vec<Release>> {
    frame.require_admin("verify")?;

    let max = frame.config().limits.max_batch_size;
    if ids.is_empty() || ids.len() > max {
        return Err(Error::InvalidInput(format!(
            "batch must hold 1..={} trust ids, got {}",
            max,
            ids.len()
        )));
    }

    ids.iter().map(|&id| verify_one(frame, id)).collect()
}
