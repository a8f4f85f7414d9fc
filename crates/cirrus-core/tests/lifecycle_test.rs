//! End-to-end rental lifecycle scenarios against the public service API.

use chrono::{Duration, Utc};
use cirrus_common::ResourceId;
use cirrus_core::{
    CirrusService, CoreConfig, CoreError, Credits, Hardware, Priority, RequestStatus, Resource,
    ResourceKind, Role,
};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn service_with_inventory() -> (CirrusService, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        data_dir: dir.path().join("data"),
        ..CoreConfig::default()
    };
    let mut svc = CirrusService::new(config);
    svc.add_resource(Resource::new(
        ResourceId::new("CPU001"),
        "Intel Xeon Platinum 8380",
        Credits::from_f64(4.0).unwrap(),
        512,
        Hardware::Cpu {
            cores: 40,
            clock_ghz: 2.3,
        },
    ))
    .unwrap();
    svc.add_resource(Resource::new(
        ResourceId::new("GPU001"),
        "NVIDIA H100 80GB",
        Credits::zero(),
        2048,
        Hardware::Gpu {
            parallel_cores: 16896,
            vram_gb: 80,
        },
    ))
    .unwrap();
    (svc, dir)
}

#[test]
fn three_hours_at_four_credits_bills_twelve() {
    let (mut svc, _dir) = service_with_inventory();
    let user = svc.register_user("alice", "pw", Role::Student).unwrap();
    svc.deposit(&user, Credits::from_f64(50.0).unwrap()).unwrap();

    let now = Utc::now();
    let request = svc
        .create_request_at(&user, &ResourceId::new("CPU001"), now, 3, now)
        .unwrap();
    let rental = svc.approve_request_at(request, "fine", now).unwrap();
    let bill = svc
        .complete_rental_at(rental, now + Duration::hours(3))
        .unwrap();

    assert_eq!(svc.bill(bill).unwrap().amount.as_decimal(), dec!(12));
    svc.pay_bill_at(bill, now + Duration::hours(3)).unwrap();
    assert_eq!(svc.user(&user).unwrap().balance.as_decimal(), dec!(38));
}

#[test]
fn underfunded_payment_leaves_bill_and_balance_untouched() {
    let (mut svc, _dir) = service_with_inventory();
    let user = svc.register_user("bob", "pw", Role::Student).unwrap();
    svc.deposit(&user, Credits::from_f64(10.0).unwrap()).unwrap();

    let now = Utc::now();
    let request = svc
        .create_request_at(&user, &ResourceId::new("CPU001"), now, 3, now)
        .unwrap();
    let rental = svc.approve_request_at(request, "", now).unwrap();
    let bill = svc
        .complete_rental_at(rental, now + Duration::hours(3))
        .unwrap();

    let err = svc.pay_bill_at(bill, now).unwrap_err();
    assert!(matches!(err, CoreError::InsufficientFunds { .. }));
    assert_eq!(svc.user(&user).unwrap().balance.as_decimal(), dec!(10));
    assert!(!svc.bill(bill).unwrap().paid);
    assert!(svc
        .unread_notifications(&user)
        .iter()
        .any(|n| n.priority == Priority::High));
}

#[test]
fn zero_rate_resource_uses_kind_rule() {
    let (mut svc, _dir) = service_with_inventory();
    svc.set_billing_rule(ResourceKind::Gpu, Credits::from_f64(8.0).unwrap())
        .unwrap();
    let user = svc.register_user("carol", "pw", Role::Teacher).unwrap();
    svc.deposit(&user, Credits::from_f64(100.0).unwrap())
        .unwrap();

    let now = Utc::now();
    let request = svc
        .create_request_at(&user, &ResourceId::new("GPU001"), now, 2, now)
        .unwrap();
    let rental = svc.approve_request_at(request, "", now).unwrap();
    let bill = svc
        .complete_rental_at(rental, now + Duration::hours(2))
        .unwrap();

    assert_eq!(svc.bill(bill).unwrap().amount.as_decimal(), dec!(16));
}

#[test]
fn two_requests_one_resource_second_waits() {
    let (mut svc, _dir) = service_with_inventory();
    let alice = svc.register_user("alice", "pw", Role::Student).unwrap();
    let bob = svc.register_user("bob", "pw", Role::Student).unwrap();
    svc.deposit(&alice, Credits::from_f64(50.0).unwrap())
        .unwrap();
    svc.deposit(&bob, Credits::from_f64(50.0).unwrap()).unwrap();

    let now = Utc::now();
    let first = svc
        .create_request_at(&alice, &ResourceId::new("CPU001"), now, 2, now)
        .unwrap();
    let second = svc
        .create_request_at(&bob, &ResourceId::new("CPU001"), now + Duration::hours(3), 2, now)
        .unwrap();

    let rental = svc.approve_request_at(first, "", now).unwrap();
    assert!(matches!(
        svc.approve_request_at(second, "", now),
        Err(CoreError::ResourceUnavailable { .. })
    ));

    // After the first rental completes, the waiting request goes through.
    svc.complete_rental_at(rental, now + Duration::hours(2))
        .unwrap();
    svc.approve_request_at(second, "", now + Duration::hours(2))
        .unwrap();
    assert_eq!(
        svc.request(second).unwrap().status,
        RequestStatus::Approved
    );
}

#[test]
fn notifications_track_the_whole_lifecycle() {
    let (mut svc, _dir) = service_with_inventory();
    let user = svc.register_user("dave", "pw", Role::Student).unwrap();
    svc.deposit(&user, Credits::from_f64(50.0).unwrap()).unwrap();

    let now = Utc::now();
    let request = svc
        .create_request_at(&user, &ResourceId::new("CPU001"), now, 1, now)
        .unwrap();
    let rental = svc.approve_request_at(request, "", now).unwrap();
    svc.complete_rental_at(rental, now + Duration::hours(1))
        .unwrap();

    // Approval plus completion.
    assert_eq!(svc.unread_notifications(&user).len(), 2);
    assert_eq!(svc.mark_all_notifications_read(&user), 2);
    assert!(svc.unread_notifications(&user).is_empty());
}
