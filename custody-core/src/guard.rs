//! Security guard around trust creation
//!
//! Two checks run before a guarded creation, in this order:
//!
//! 1. **Rate limit**: at most `max_per_window` creations per grantor while
//!    consecutive creations are no more than `rate_window` apart. A gap longer
//!    than the window starts a fresh window.
//! 2. **Suspicious amount**: a high-value creation is refused once the
//!    grantor's prior count in the window has reached `consecutive_threshold`.
//!    The prior count is the one read before this creation is recorded.
//!
//! The updated activity is staged on the frame; if anything later in the call
//! fails, it is discarded with the rest of the frame.

use crate::{
    config::GuardConfig,
    custody,
    error::{Error, Result},
    frame::Frame,
    registry,
    storage::{self, Table},
    types::{Amount, BlockHeight, GrantorActivity, Milestone, Principal, TrustId},
};

/// Decide whether a creation may proceed; returns the activity to persist
pub fn evaluate(
    config: &GuardConfig,
    grantor: &Principal,
    previous: Option<GrantorActivity>,
    now: BlockHeight,
    amount: Amount,
) -> Result<GrantorActivity> {
    let prior_count = match previous {
        Some(activity) if now.saturating_sub(activity.last_action) <= config.rate_window => {
            activity.count
        }
        _ => 0,
    };

    if prior_count >= config.max_per_window {
        tracing::warn!(
            grantor = %grantor,
            count = prior_count,
            max = config.max_per_window,
            "Rate limit exceeded"
        );
        return Err(Error::RateExceeded(grantor.clone()));
    }

    if amount > config.high_value_threshold && prior_count >= config.consecutive_threshold {
        tracing::warn!(
            grantor = %grantor,
            amount = %amount,
            count = prior_count,
            "Suspicious high-value creation"
        );
        return Err(Error::SuspiciousPattern(grantor.clone()));
    }

    Ok(GrantorActivity {
        last_action: now,
        count: prior_count + 1,
    })
}

/// Run both checks for the caller and stage the updated activity
pub fn check_and_record(frame: &mut Frame<'_>, amount: Amount) -> Result<GrantorActivity> {
    let grantor = frame.caller().clone();
    let key = storage::principal_key(&grantor);
    let previous: Option<GrantorActivity> = frame.read(Table::Activity, &key)?;

    let activity = evaluate(&frame.config().guard, &grantor, previous, frame.now(), amount)?;
    frame.write(Table::Activity, key, &activity)?;
    Ok(activity)
}

/// Rate-guarded creation
pub fn secure_create(
    frame: &mut Frame<'_>,
    recipient: Principal,
    amount: Amount,
    milestones: Vec<Milestone>,
) -> Result<TrustId> {
    check_and_record(frame, amount)?;
    custody::create(frame, recipient, amount, milestones)
}

/// Rate-guarded creation that also requires an unfrozen platform and an
/// approved recipient
pub fn protected_create(
    frame: &mut Frame<'_>,
    recipient: Principal,
    amount: Amount,
    milestones: Vec<Milestone>,
) -> Result<TrustId> {
    check_and_record(frame, amount)?;

    if registry::platform_frozen(frame)? {
        return Err(Error::PlatformFrozen);
    }
    if !registry::recipient_approved(frame, &recipient)? {
        return Err(Error::RecipientNotApproved(recipient));
    }

    custody::create(frame, recipient, amount, milestones)
}
