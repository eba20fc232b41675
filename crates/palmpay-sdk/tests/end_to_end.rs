//! End-to-end flows: enrollment, authentication, and palm-gated payments.

use image::{DynamicImage, GrayImage, Luma};
use palmpay_sdk::PalmPay;
use palmpay_types::{Amount, AttemptOutcome, PalmPayError, TransactionKind, UserId};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Cursor;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Synthetic palm capture: a 400x300 grid of 5x5 blocks with seeded random
/// intensities, PNG-encoded. High-contrast block corners give the detector
/// plenty of keypoints; different seeds produce unrelated descriptor sets.
fn palm_capture(seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks: Vec<u8> = (0..80 * 60).map(|_| rng.gen()).collect();
    let gray = GrayImage::from_fn(400, 300, |x, y| {
        Luma([blocks[((y / 5) * 80 + x / 5) as usize]])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png encoding");
    bytes
}

#[tokio::test]
async fn test_enroll_and_authenticate_same_capture() {
    init_tracing();
    let bank = PalmPay::in_memory();
    let alice = UserId::new();
    let capture = palm_capture(7);

    bank.enroll(&alice, &capture).await.unwrap();

    let result = bank.authenticate(&capture, Some("192.0.2.1".into())).await.unwrap();
    assert_eq!(result.outcome, AttemptOutcome::Accepted);
    assert_eq!(result.identity, Some(alice));
    assert!(result.score > 0.99, "score was {}", result.score);

    let attempts = bank.recent_attempts(10).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].origin.as_deref(), Some("192.0.2.1"));
}

#[tokio::test]
async fn test_unknown_palm_is_not_authenticated() {
    let bank = PalmPay::in_memory();
    let alice = UserId::new();

    bank.enroll(&alice, &palm_capture(7)).await.unwrap();

    let result = bank.authenticate(&palm_capture(99), None).await.unwrap();
    assert!(!result.outcome.is_authenticated());
    assert!(result.identity.is_none());
}

#[tokio::test]
async fn test_empty_enrollment_always_rejects() {
    let bank = PalmPay::in_memory();

    let result = bank.authenticate(&palm_capture(3), None).await.unwrap();
    assert_eq!(result.outcome, AttemptOutcome::Rejected);
    assert!(result.identity.is_none());
    assert_eq!(result.score, 0.0);
}

#[tokio::test]
async fn test_decode_failure_still_logs_an_attempt() {
    let bank = PalmPay::in_memory();

    let result = bank
        .authenticate(b"definitely not an image", Some("198.51.100.7".into()))
        .await
        .unwrap();
    assert!(matches!(result.outcome, AttemptOutcome::Failed { .. }));

    let attempts = bank.recent_attempts(10).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].score, 0.0);
    assert!(attempts[0].identity.is_none());
}

#[tokio::test]
async fn test_reenrollment_replaces_the_template() {
    let bank = PalmPay::in_memory();
    let alice = UserId::new();

    bank.enroll(&alice, &palm_capture(1)).await.unwrap();
    bank.enroll(&alice, &palm_capture(2)).await.unwrap();

    let new_scan = bank.authenticate(&palm_capture(2), None).await.unwrap();
    assert_eq!(new_scan.identity, Some(alice));

    let old_scan = bank.authenticate(&palm_capture(1), None).await.unwrap();
    assert!(!old_scan.outcome.is_authenticated());
}

#[tokio::test]
async fn test_pay_by_palm_moves_funds_and_refunds() {
    init_tracing();
    let bank = PalmPay::in_memory();
    let alice = UserId::new();
    let bob = UserId::new();
    let capture = palm_capture(7);

    bank.enroll(&alice, &capture).await.unwrap();
    let alice_account = bank.open_account(alice.clone()).await;
    let bob_account = bank.open_account(bob).await;
    bank.deposit(&alice_account.id, Amount::from_human(100.0)).await.unwrap();

    let payment = bank
        .pay_by_palm(
            &capture,
            None,
            &bob_account.id,
            Amount::from_human(40.0),
            Some("lunch".into()),
        )
        .await
        .unwrap();

    assert_eq!(payment.kind, TransactionKind::Payment);
    assert_eq!(bank.balance(&alice_account.id).await.unwrap(), Amount::from_human(60.0));
    assert_eq!(bank.balance(&bob_account.id).await.unwrap(), Amount::from_human(40.0));

    let history = bank.history(&bob_account.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, payment.id);

    let refund = bank.refund(&payment.id, "order cancelled").await.unwrap();
    assert!(matches!(refund.kind, TransactionKind::Refund { ref original } if *original == payment.id));
    assert_eq!(bank.balance(&alice_account.id).await.unwrap(), Amount::from_human(100.0));
    assert_eq!(bank.balance(&bob_account.id).await.unwrap(), Amount::zero());

    let second = bank.refund(&payment.id, "again").await;
    assert!(matches!(second, Err(PalmPayError::NotRefundable { .. })));
}

#[tokio::test]
async fn test_rejected_palm_never_touches_the_ledger() {
    let bank = PalmPay::in_memory();
    let alice = UserId::new();
    let mallory_scan = palm_capture(41);

    bank.enroll(&alice, &palm_capture(7)).await.unwrap();
    let alice_account = bank.open_account(alice).await;
    let merchant = bank.open_account(UserId::new()).await;
    bank.deposit(&alice_account.id, Amount::from_human(100.0)).await.unwrap();

    let err = bank
        .pay_by_palm(&mallory_scan, None, &merchant.id, Amount::from_human(40.0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PalmPayError::AuthenticationRejected { .. }));

    assert_eq!(bank.balance(&alice_account.id).await.unwrap(), Amount::from_human(100.0));
    assert_eq!(bank.balance(&merchant.id).await.unwrap(), Amount::zero());
    assert!(bank.history(&merchant.id, 10).await.unwrap().is_empty());

    // The failed attempt is still on the audit trail
    let attempts = bank.recent_attempts(1).await.unwrap();
    assert!(!attempts[0].outcome.is_authenticated());
}

#[tokio::test]
async fn test_capture_validation_reports_reasons() {
    let bank = PalmPay::in_memory();

    let garbage = bank.validate_capture(b"junk");
    assert!(!garbage.valid);

    // Flat mid-gray image: decodes fine, but has no usable contrast
    let flat = {
        let gray = GrayImage::from_pixel(400, 300, Luma([128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    };
    let validity = bank.validate_capture(&flat);
    assert!(!validity.valid);
    assert_eq!(validity.reason.as_deref(), Some("insufficient contrast"));

    let good = bank.validate_capture(&palm_capture(5));
    assert!(good.valid);
}
