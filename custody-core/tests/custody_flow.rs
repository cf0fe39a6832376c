//! End-to-end custody flows against the in-memory host

use custody_core::{
    Config, CustodyLedger, Error, MemoryHost, Milestone, Principal, ProofDigest, SplitShare,
    TrustStatus,
};

struct Fixture {
    ledger: CustodyLedger<MemoryHost>,
    admin: Principal,
    grantor: Principal,
    recipient: Principal,
    custody: Principal,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture() -> Fixture {
    init_tracing();

    let config = Config::default();
    let admin = config.admin.clone();
    let custody = config.custody_account.clone();
    let grantor = Principal::new("ST1GRANTOR");
    let recipient = Principal::new("ST1RECIPIENT");

    let mut host = MemoryHost::new();
    host.mint(&grantor, 10_000_000_000_000);

    Fixture {
        ledger: CustodyLedger::open(config, host).unwrap(),
        admin,
        grantor,
        recipient,
        custody,
    }
}

fn milestones(n: usize) -> Vec<Milestone> {
    (0..n).map(|i| Milestone::new(format!("phase-{}", i))).collect()
}

#[test]
fn create_moves_amount_into_custody_with_dense_ids() {
    let mut f = fixture();

    for expected in 1..=4u64 {
        let before = f.ledger.host().balance(&f.custody);
        let id = f
            .ledger
            .create(&f.grantor, f.recipient.clone(), 250, milestones(2))
            .unwrap();
        assert_eq!(id, expected);
        assert_eq!(f.ledger.host().balance(&f.custody), before + 250);
    }
    assert_eq!(f.ledger.last_trust_id().unwrap(), 4);
}

#[test]
fn verifying_every_milestone_releases_equal_installments() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 1_003, milestones(4))
        .unwrap();

    for n in 1..=4u32 {
        let release = f.ledger.verify_one(&f.admin, id).unwrap();
        assert_eq!(release.amount, 250);
        assert_eq!(release.verified_milestones, n);
        assert_eq!(f.ledger.host().balance(&f.recipient), 250 * u128::from(n));
    }

    let transfers = f.ledger.host().transfer_count();
    assert!(matches!(
        f.ledger.verify_one(&f.admin, id),
        Err(Error::AlreadyTerminal { .. })
    ));
    assert_eq!(f.ledger.host().transfer_count(), transfers);

    // Remainder of the integer division stays in custody
    assert_eq!(f.ledger.host().balance(&f.custody), 3);
}

#[test]
fn failed_batch_leaves_no_partial_progress() {
    let mut f = fixture();
    let a = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();
    let b = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(1))
        .unwrap();
    let c = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();
    f.ledger.verify_one(&f.admin, b).unwrap();

    let recipient_before = f.ledger.host().balance(&f.recipient);
    let transfers_before = f.ledger.host().transfer_count();

    let result = f.ledger.verify_batch(&f.admin, &[a, b, c]);
    assert!(matches!(result, Err(Error::AlreadyTerminal { id, .. }) if id == b));

    assert_eq!(f.ledger.host().balance(&f.recipient), recipient_before);
    assert_eq!(f.ledger.host().transfer_count(), transfers_before);
    assert_eq!(f.ledger.trust(a).unwrap().unwrap().verified_milestones, 0);
    assert_eq!(f.ledger.trust(b).unwrap().unwrap().verified_milestones, 1);
    assert_eq!(f.ledger.trust(c).unwrap().unwrap().verified_milestones, 0);
}

#[test]
fn successful_batch_releases_each_trust() {
    let mut f = fixture();
    let ids: Vec<_> = (0..3)
        .map(|_| {
            f.ledger
                .create(&f.grantor, f.recipient.clone(), 90, milestones(3))
                .unwrap()
        })
        .collect();

    let releases = f.ledger.verify_batch(&f.admin, &ids).unwrap();
    assert_eq!(releases.len(), 3);
    assert!(releases.iter().all(|r| r.amount == 30));
    assert_eq!(f.ledger.host().balance(&f.recipient), 90);
    assert_eq!(f.ledger.metrics().releases.get(), 3);
}

#[test]
fn cancel_returns_unreleased_value_once() {
    let mut f = fixture();
    let start = f.ledger.host().balance(&f.grantor);
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(4))
        .unwrap();
    f.ledger.verify_one(&f.admin, id).unwrap();

    let refund = f.ledger.cancel(&f.grantor, id).unwrap();
    assert_eq!(refund, 75);
    assert_eq!(f.ledger.host().balance(&f.grantor), start - 25);

    let trust = f.ledger.trust(id).unwrap().unwrap();
    assert_eq!(trust.status, TrustStatus::Cancelled);

    assert!(matches!(
        f.ledger.cancel(&f.grantor, id),
        Err(Error::AlreadyTerminal { .. })
    ));
    assert!(matches!(
        f.ledger.cancel(&f.recipient, id),
        Err(Error::Unauthorized { .. })
    ));
}

#[test]
fn cancel_after_expiry_is_rejected() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(1))
        .unwrap();

    f.ledger.host_mut().advance(1008);
    // Last allowed time point
    assert!(f.ledger.extend(&f.grantor, id, 1).is_ok());

    f.ledger.host_mut().advance(2);
    assert!(matches!(f.ledger.cancel(&f.grantor, id), Err(Error::Expired(_))));
}

#[test]
fn revert_waits_for_expiry_then_refunds_full_amount() {
    let mut f = fixture();
    let start = f.ledger.host().balance(&f.grantor);

    // A second trust funds custody beyond the first one's remainder
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(4))
        .unwrap();
    f.ledger
        .create(&f.grantor, f.recipient.clone(), 500, milestones(1))
        .unwrap();
    f.ledger.verify_one(&f.admin, id).unwrap();

    assert!(matches!(
        f.ledger.revert_expired(&f.admin, id),
        Err(Error::NotYetExpired(_))
    ));
    assert!(matches!(
        f.ledger.revert_expired(&f.grantor, id),
        Err(Error::Unauthorized { .. })
    ));

    f.ledger.host_mut().advance(1009);
    let refund = f.ledger.revert_expired(&f.admin, id).unwrap();

    // Known over-payment: the 25 already released is refunded again
    assert_eq!(refund, 100);
    assert_eq!(f.ledger.host().balance(&f.recipient), 25);
    assert_eq!(f.ledger.host().balance(&f.grantor), start - 500);
    assert_eq!(f.ledger.host().balance(&f.custody), 475);
    assert_eq!(
        f.ledger.trust(id).unwrap().unwrap().status,
        TrustStatus::Reverted
    );
}

#[test]
fn flagged_trust_can_be_reverted_after_expiry() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(1))
        .unwrap();
    f.ledger.flag(&f.admin, id, "dispute").unwrap();

    assert!(matches!(
        f.ledger.cancel(&f.grantor, id),
        Err(Error::AlreadyTerminal { .. })
    ));

    f.ledger.host_mut().advance(2_000);
    assert_eq!(f.ledger.revert_expired(&f.admin, id).unwrap(), 100);
    assert!(matches!(
        f.ledger.revert_expired(&f.admin, id),
        Err(Error::AlreadyTerminal { .. })
    ));
}

#[test]
fn extend_and_increase_are_grantor_only() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();

    assert!(matches!(
        f.ledger.extend(&f.recipient, id, 10),
        Err(Error::Unauthorized { .. })
    ));
    assert!(matches!(
        f.ledger.increase(&f.recipient, id, 10),
        Err(Error::Unauthorized { .. })
    ));
    assert!(matches!(
        f.ledger.increase(&f.grantor, id, 0),
        Err(Error::InvalidInput(_))
    ));

    assert_eq!(f.ledger.extend(&f.grantor, id, 100).unwrap(), 1108);
    assert_eq!(f.ledger.increase(&f.grantor, id, 50).unwrap(), 150);
    assert_eq!(f.ledger.host().balance(&f.custody), 150);

    let release = f.ledger.verify_one(&f.admin, id).unwrap();
    assert_eq!(release.amount, 75);
}

#[test]
fn split_trust_requires_exact_distribution() {
    let mut f = fixture();
    let shares = |values: &[u32]| -> Vec<SplitShare> {
        values
            .iter()
            .enumerate()
            .map(|(i, &s)| SplitShare::new(Principal::new(format!("ST1B{}", i)), s))
            .collect()
    };

    assert!(matches!(
        f.ledger.create_split(&f.grantor, shares(&[30, 30, 30, 9]), 1_000),
        Err(Error::DistributionInvalid(99))
    ));
    assert_eq!(f.ledger.host().balance(&f.custody), 0);

    let id = f
        .ledger
        .create_split(&f.grantor, shares(&[20, 20, 20, 20, 20]), 1_000)
        .unwrap();
    let split = f.ledger.split_trust(id).unwrap().unwrap();
    assert_eq!(split.beneficiaries.len(), 5);
    assert_eq!(split.grantor, f.grantor);
    assert_eq!(f.ledger.host().balance(&f.custody), 1_000);
}

#[test]
fn rate_window_limits_secure_creation() {
    let mut f = fixture();

    for _ in 0..5 {
        f.ledger
            .secure_create(&f.grantor, f.recipient.clone(), 10, milestones(1))
            .unwrap();
        f.ledger.host_mut().advance(1);
    }

    assert!(matches!(
        f.ledger
            .secure_create(&f.grantor, f.recipient.clone(), 10, milestones(1)),
        Err(Error::RateExceeded(_))
    ));
    assert_eq!(f.ledger.grantor_activity(&f.grantor).unwrap().unwrap().count, 5);

    f.ledger.host_mut().advance(145);
    f.ledger
        .secure_create(&f.grantor, f.recipient.clone(), 10, milestones(1))
        .unwrap();
    assert_eq!(f.ledger.grantor_activity(&f.grantor).unwrap().unwrap().count, 1);
}

#[test]
fn high_value_after_consecutive_actions_is_suspicious() {
    let mut f = fixture();
    let high = f.ledger.config().guard.high_value_threshold + 1;

    for _ in 0..3 {
        f.ledger
            .secure_create(&f.grantor, f.recipient.clone(), 10, milestones(1))
            .unwrap();
    }
    assert!(matches!(
        f.ledger
            .secure_create(&f.grantor, f.recipient.clone(), high, milestones(1)),
        Err(Error::SuspiciousPattern(_))
    ));
    // Rejected call did not record activity
    assert_eq!(f.ledger.grantor_activity(&f.grantor).unwrap().unwrap().count, 3);
}

#[test]
fn protected_create_checks_freeze_and_allow_list() {
    let mut f = fixture();

    assert!(!f.ledger.is_recipient_approved(&f.recipient).unwrap());
    assert!(matches!(
        f.ledger
            .protected_create(&f.grantor, f.recipient.clone(), 10, milestones(1)),
        Err(Error::RecipientNotApproved(_))
    ));
    // Rolled back together with the rejection
    assert!(f.ledger.grantor_activity(&f.grantor).unwrap().is_none());

    f.ledger
        .set_recipient_approval(&f.admin, &f.recipient, true)
        .unwrap();
    f.ledger.set_platform_status(&f.admin, true).unwrap();
    assert!(f.ledger.is_platform_frozen().unwrap());
    assert!(matches!(
        f.ledger
            .protected_create(&f.grantor, f.recipient.clone(), 10, milestones(1)),
        Err(Error::PlatformFrozen)
    ));

    f.ledger.set_platform_status(&f.admin, false).unwrap();
    let id = f
        .ledger
        .protected_create(&f.grantor, f.recipient.clone(), 10, milestones(1))
        .unwrap();
    assert_eq!(f.ledger.trust(id).unwrap().unwrap().status, TrustStatus::Active);
}

#[test]
fn audit_takes_deposit_and_is_unique() {
    let mut f = fixture();
    let auditor = Principal::new("ST1AUDITOR");
    let deposit = f.ledger.config().limits.audit_deposit;
    f.ledger.host_mut().mint(&auditor, deposit * 2);

    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(1))
        .unwrap();

    assert_eq!(f.ledger.submit_audit(&auditor, id, "ok").unwrap(), deposit);
    assert_eq!(f.ledger.host().balance(&auditor), deposit);

    let record = f.ledger.audit_record(id).unwrap().unwrap();
    assert_eq!(record.auditor, auditor);
    assert_eq!(record.deposit, deposit);
    assert!(!record.completed);

    assert!(matches!(
        f.ledger.submit_audit(&auditor, id, "again"),
        Err(Error::AuditExists(_))
    ));
    assert_eq!(f.ledger.host().balance(&auditor), deposit);
}

#[test]
fn milestone_evidence_is_recorded_without_release() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();
    let proof = ProofDigest::of(b"site photos");

    assert!(matches!(
        f.ledger
            .submit_milestone_evidence(&f.grantor, id, 0, 50, "half", proof),
        Err(Error::Unauthorized { .. })
    ));

    f.ledger
        .submit_milestone_evidence(&f.recipient, id, 0, 50, "half", proof)
        .unwrap();
    let record = f.ledger.milestone_record(id, 0).unwrap().unwrap();
    assert_eq!(record.progress, 50);
    assert_eq!(record.details, "half");
    assert_eq!(f.ledger.host().balance(&f.recipient), 0);
}

#[test]
fn extend_and_increase_are_rejected_after_expiry() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();

    f.ledger.host_mut().advance(1009);
    let grantor_before = f.ledger.host().balance(&f.grantor);
    let transfers_before = f.ledger.host().transfer_count();

    assert!(matches!(
        f.ledger.extend(&f.grantor, id, 10),
        Err(Error::Expired(expired)) if expired == id
    ));
    assert!(matches!(
        f.ledger.increase(&f.grantor, id, 50),
        Err(Error::Expired(expired)) if expired == id
    ));

    let trust = f.ledger.trust(id).unwrap().unwrap();
    assert_eq!(trust.amount, 100);
    assert_eq!(trust.terminates_at, 1008);
    assert_eq!(trust.status, TrustStatus::Active);
    assert_eq!(f.ledger.host().balance(&f.grantor), grantor_before);
    assert_eq!(f.ledger.host().balance(&f.custody), 100);
    assert_eq!(f.ledger.host().transfer_count(), transfers_before);
}

#[test]
fn revert_is_declined_when_custody_cannot_cover_full_amount() {
    let mut f = fixture();
    let id = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(4))
        .unwrap();
    f.ledger.verify_one(&f.admin, id).unwrap();

    // Only this trust is in custody, and 25 of it is already released
    assert_eq!(f.ledger.host().balance(&f.custody), 75);
    f.ledger.host_mut().advance(1009);

    assert!(matches!(
        f.ledger.revert_expired(&f.admin, id),
        Err(Error::TransferFailed(_))
    ));

    let trust = f.ledger.trust(id).unwrap().unwrap();
    assert_eq!(trust.status, TrustStatus::Active);
    assert_eq!(trust.verified_milestones, 1);
    assert_eq!(f.ledger.host().balance(&f.custody), 75);
    assert_eq!(f.ledger.host().balance(&f.recipient), 25);
    assert_eq!(
        f.ledger
            .metrics()
            .rejections
            .with_label_values(&["transfer_failed"])
            .get(),
        1
    );
}

#[test]
fn failed_compensation_reports_invariant_violation() {
    let mut f = fixture();
    let a = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();
    let b = f
        .ledger
        .create(&f.grantor, f.recipient.clone(), 100, milestones(2))
        .unwrap();

    // First release leg goes through; the second and its reversal are declined
    let executed = f.ledger.host().transfer_count();
    f.ledger.host_mut().fail_after(executed + 1);

    let result = f.ledger.verify_batch(&f.admin, &[a, b]);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));

    // Nothing was committed, but the stray installment stayed with the recipient
    assert_eq!(f.ledger.trust(a).unwrap().unwrap().verified_milestones, 0);
    assert_eq!(f.ledger.trust(b).unwrap().unwrap().verified_milestones, 0);
    assert_eq!(f.ledger.host().balance(&f.recipient), 50);
    assert_eq!(f.ledger.host().balance(&f.custody), 150);
    assert_eq!(f.ledger.metrics().releases.get(), 0);
    assert_eq!(
        f.ledger
            .metrics()
            .rejections
            .with_label_values(&["invariant_violation"])
            .get(),
        1
    );
}
