//! Split-trust ledger
//!
//! One grantor, up to five beneficiaries with percentage shares. Value is
//! escrowed on creation; distribution to beneficiaries does not exist yet.

use crate::{
    error::{Error, Result},
    frame::Frame,
    storage::{self, Table, META_LAST_GROUP_ID},
    types::{Amount, GroupId, SplitShare, SplitTrust, TrustStatus},
};

/// Shares must sum to exactly this
pub const TOTAL_SHARES: u64 = 100;

/// Escrow `amount` from the caller for a group of beneficiaries
pub fn create_split(
    frame: &mut Frame<'_>,
    beneficiaries: Vec<SplitShare>,
    amount: Amount,
) -> Result<GroupId> {
    let max = frame.config().limits.max_beneficiaries;

    if beneficiaries.is_empty() {
        return Err(Error::InvalidInput(
            "at least one beneficiary is required".to_string(),
        ));
    }
    if beneficiaries.len() > max {
        return Err(Error::TooManyRecipients {
            count: beneficiaries.len(),
            max,
        });
    }
    if amount == 0 {
        return Err(Error::InvalidInput("amount must be positive".to_string()));
    }

    let total: u64 = beneficiaries.iter().map(|b| u64::from(b.share)).sum();
    if total != TOTAL_SHARES {
        return Err(Error::DistributionInvalid(total));
    }

    let id = frame.next_sequence(META_LAST_GROUP_ID)?;
    let split = SplitTrust {
        id,
        grantor: frame.caller().clone(),
        beneficiaries,
        total_amount: amount,
        created_at: frame.now(),
        status: TrustStatus::Active,
    };

    frame.write(Table::SplitTrusts, storage::id_key(id), &split)?;
    frame.queue_transfer(amount, &split.grantor, frame.custody());

    tracing::debug!(
        group_id = id,
        grantor = %split.grantor,
        beneficiaries = split.beneficiaries.len(),
        amount = %amount,
        "Split trust staged"
    );

    Ok(id)
}
