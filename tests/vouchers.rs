mod common;

use chrono::{Duration, Utc};

use bookstore_orders::domain::aggregates::{Requester, Voucher, VoucherKind, VoucherPatch};
use bookstore_orders::domain::value_objects::{Money, VoucherCode};
use bookstore_orders::services::{ApplyVoucherRequest, NewVoucher};
use bookstore_orders::BookstoreError;
use common::{week_long, Harness};

fn apply(code: &str, order_total: i64) -> ApplyVoucherRequest {
    ApplyVoucherRequest { code: code.to_string(), order_total }
}

fn new_voucher(code: &str, kind: VoucherKind, discount: i64) -> NewVoucher {
    NewVoucher {
        code: code.to_string(),
        description: String::new(),
        kind,
        discount,
        min_order: None,
        max_uses: None,
        start_date: None,
        end_date: Utc::now() + Duration::days(30),
    }
}

#[tokio::test]
async fn test_apply_prices_without_redeeming() {
    let h = Harness::new().await;
    let sale = h.voucher(week_long("SALE10", VoucherKind::Percent, 10).with_min_order(Money::vnd(100_000))).await;

    let applied = h.services.vouchers.apply(&apply("  sale10 ", 250_000)).await.unwrap();

    assert_eq!(applied.discount_amount, Money::vnd(25_000));
    assert_eq!(applied.voucher.id(), sale.id());
    assert!(applied.message.contains("SALE10"));
    assert_eq!(h.used_count(sale.id()).await, 0);
}

#[tokio::test]
async fn test_apply_reports_each_rejection() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.voucher(week_long("SALE10", VoucherKind::Percent, 10).with_min_order(Money::vnd(100_000))).await;
    h.voucher(
        Voucher::create(VoucherCode::new("OLD").unwrap(), VoucherKind::Fixed, 10_000, now - Duration::days(1))
            .starting_at(now - Duration::days(10)),
    )
    .await;
    h.voucher(
        Voucher::create(VoucherCode::new("SOON").unwrap(), VoucherKind::Fixed, 10_000, now + Duration::days(10))
            .starting_at(now + Duration::days(2)),
    )
    .await;
    let off = h.voucher(week_long("OFF", VoucherKind::Fixed, 10_000)).await;
    h.services.vouchers.toggle_active(&h.admin, off.id()).await.unwrap();

    let err = h.services.vouchers.apply(&apply("SALE10", 99_999)).await.unwrap_err();
    assert!(matches!(err, BookstoreError::MinimumOrderNotMet { minimum, .. } if minimum == Money::vnd(100_000)));
    assert!(matches!(h.services.vouchers.apply(&apply("OLD", 500_000)).await, Err(BookstoreError::VoucherExpired { .. })));
    assert!(matches!(h.services.vouchers.apply(&apply("SOON", 500_000)).await, Err(BookstoreError::VoucherNotYetValid { .. })));
    assert!(matches!(h.services.vouchers.apply(&apply("OFF", 500_000)).await, Err(BookstoreError::VoucherDisabled(_))));
    assert!(matches!(h.services.vouchers.apply(&apply("MISSING", 500_000)).await, Err(BookstoreError::VoucherNotFound(c)) if c == "MISSING"));
    assert!(matches!(h.services.vouchers.apply(&apply("", 500_000)).await, Err(BookstoreError::Validation(_))));
}

#[tokio::test]
async fn test_active_listing_hides_disabled_and_expired() {
    let h = Harness::new().await;
    let now = Utc::now();
    let live = h.voucher(week_long("LIVE", VoucherKind::Fixed, 10_000)).await;
    let off = h.voucher(week_long("OFF", VoucherKind::Fixed, 10_000)).await;
    h.services.vouchers.toggle_active(&h.admin, off.id()).await.unwrap();
    h.voucher(
        Voucher::create(VoucherCode::new("OLD").unwrap(), VoucherKind::Fixed, 10_000, now - Duration::hours(1))
            .starting_at(now - Duration::days(3)),
    )
    .await;

    let listed = h.services.vouchers.lookup_active().await.unwrap();
    assert_eq!(listed.iter().map(Voucher::id).collect::<Vec<_>>(), [live.id()]);
    assert_eq!(h.services.vouchers.list_all(&h.admin).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_respect_cap() {
    let h = Harness::new().await;
    let capped = h.voucher(week_long("FIVE", VoucherKind::Fixed, 5_000).with_max_uses(5)).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let ledger = h.services.vouchers.clone();
            let id = capped.id();
            tokio::spawn(async move { ledger.redeem(id).await })
        })
        .collect();
    let mut redeemed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => redeemed += 1,
            Err(e) => assert!(matches!(e, BookstoreError::VoucherExhausted(_))),
        }
    }

    assert_eq!(redeemed, 5);
    assert_eq!(h.used_count(capped.id()).await, 5);
}

#[tokio::test]
async fn test_admin_create_applies_defaults() {
    let h = Harness::new().await;

    let created = h.services.vouchers.create(&h.admin, new_voucher("bookfair", VoucherKind::Fixed, 50_000)).await.unwrap();

    assert_eq!(created.code().as_str(), "BOOKFAIR");
    assert_eq!(created.max_uses(), Voucher::DEFAULT_MAX_USES);
    assert_eq!(created.used_count(), 0);
    assert_eq!(created.min_order(), Money::ZERO);
    assert!(created.is_active());
}

#[tokio::test]
async fn test_admin_create_rejections() {
    let h = Harness::new().await;
    let customer = Requester::customer(h.customer("Nguyễn Văn A").await);
    h.services.vouchers.create(&h.admin, new_voucher("BOOKFAIR", VoucherKind::Fixed, 50_000)).await.unwrap();

    let err = h.services.vouchers.create(&h.admin, new_voucher("bookfair", VoucherKind::Percent, 5)).await.unwrap_err();
    assert!(matches!(err, BookstoreError::DuplicateCode(c) if c == "BOOKFAIR"));

    let err = h.services.vouchers.create(&h.admin, new_voucher("HALF", VoucherKind::Percent, 150)).await.unwrap_err();
    assert!(matches!(err, BookstoreError::Validation(_)));

    let mut backwards = new_voucher("BACKWARDS", VoucherKind::Fixed, 1_000);
    backwards.start_date = Some(backwards.end_date + Duration::days(1));
    assert!(matches!(h.services.vouchers.create(&h.admin, backwards).await, Err(BookstoreError::Validation(_))));

    let err = h.services.vouchers.create(&customer, new_voucher("MINE", VoucherKind::Fixed, 1_000)).await.unwrap_err();
    assert!(matches!(err, BookstoreError::Unauthorized));
    assert!(matches!(h.services.vouchers.list_all(&customer).await, Err(BookstoreError::Unauthorized)));
}

#[tokio::test]
async fn test_update_keeps_redemptions() {
    let h = Harness::new().await;
    let voucher = h.voucher(week_long("SALE10", VoucherKind::Percent, 10).with_max_uses(10)).await;
    let other = h.voucher(week_long("OTHER", VoucherKind::Fixed, 1_000)).await;
    for _ in 0..3 {
        h.services.vouchers.redeem(voucher.id()).await.unwrap();
    }

    let patch = VoucherPatch { discount: Some(15), description: Some("Hội sách".into()), ..VoucherPatch::default() };
    let updated = h.services.vouchers.update(&h.admin, voucher.id(), patch).await.unwrap();
    assert_eq!(updated.discount(), 15);
    assert_eq!(updated.description(), "Hội sách");
    assert_eq!(updated.used_count(), 3);

    let shrink = VoucherPatch { max_uses: Some(2), ..VoucherPatch::default() };
    let err = h.services.vouchers.update(&h.admin, voucher.id(), shrink).await.unwrap_err();
    assert!(matches!(err, BookstoreError::Validation(_)));

    let steal = VoucherPatch { code: Some("other".into()), ..VoucherPatch::default() };
    let err = h.services.vouchers.update(&h.admin, voucher.id(), steal).await.unwrap_err();
    assert!(matches!(err, BookstoreError::DuplicateCode(_)));
    let untouched = h.services.vouchers.list_all(&h.admin).await.unwrap();
    assert!(untouched.iter().any(|v| v.id() == other.id() && v.code().as_str() == "OTHER"));
}

#[tokio::test]
async fn test_toggle_and_delete() {
    let h = Harness::new().await;
    let voucher = h.voucher(week_long("SALE10", VoucherKind::Percent, 10)).await;

    assert!(!h.services.vouchers.toggle_active(&h.admin, voucher.id()).await.unwrap().is_active());
    assert!(h.services.vouchers.toggle_active(&h.admin, voucher.id()).await.unwrap().is_active());

    h.services.vouchers.delete(&h.admin, voucher.id()).await.unwrap();
    let err = h.services.vouchers.delete(&h.admin, voucher.id()).await.unwrap_err();
    assert!(matches!(err, BookstoreError::VoucherIdNotFound(id) if id == voucher.id()));
    assert!(matches!(h.services.vouchers.apply(&apply("SALE10", 100_000)).await, Err(BookstoreError::VoucherNotFound(_))));
}
