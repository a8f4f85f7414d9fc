//! Save/load round trips across a full service restart.

use chrono::{Duration, Utc};
use cirrus_common::ResourceId;
use cirrus_core::{
    CirrusService, CoreConfig, Credits, Hardware, Resource, ResourceKind, Role,
};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn config_in(dir: &tempfile::TempDir) -> CoreConfig {
    CoreConfig {
        data_dir: dir.path().join("data"),
        ..CoreConfig::default()
    }
}

fn sample_inventory(svc: &mut CirrusService) {
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
        ResourceId::new("CPU002"),
        "AMD EPYC 7763",
        Credits::from_f64(3.5).unwrap(),
        256,
        Hardware::Cpu {
            cores: 64,
            clock_ghz: 2.45,
        },
    ))
    .unwrap();
    svc.add_resource(Resource::new(
        ResourceId::new("GPU001"),
        "NVIDIA H100 80GB",
        Credits::from_f64(10.0).unwrap(),
        2048,
        Hardware::Gpu {
            parallel_cores: 16896,
            vram_gb: 80,
        },
    ))
    .unwrap();
}

#[test]
fn reload_preserves_every_family_and_their_order() {
    let dir = tempfile::tempdir().unwrap();

    let now = Utc::now();
    let (user_id, bill_id);
    {
        let mut svc = CirrusService::new(config_in(&dir));
        sample_inventory(&mut svc);
        user_id = svc.register_user("alice", "secret", Role::Student).unwrap();
        svc.deposit(&user_id, Credits::from_f64(100.0).unwrap())
            .unwrap();
        svc.set_billing_rule(ResourceKind::Gpu, Credits::from_f64(8.0).unwrap())
            .unwrap();

        let request = svc
            .create_request_at(&user_id, &ResourceId::new("CPU001"), now, 3, now)
            .unwrap();
        let rental = svc.approve_request_at(request, "ok", now).unwrap();
        bill_id = svc
            .complete_rental_at(rental, now + Duration::hours(3))
            .unwrap();
        svc.save().unwrap();
    }

    let svc = CirrusService::load(config_in(&dir));

    let ids: Vec<_> = svc.resources().map(|r| r.id.as_str().to_string()).collect();
    assert_eq!(ids, ["CPU001", "CPU002", "GPU001"]);

    let user = svc.user(&user_id).unwrap();
    assert_eq!(user.balance.as_decimal(), dec!(100));
    assert!(svc.authenticate("alice", "secret").is_some());

    let bill = svc.bill(bill_id).unwrap();
    assert_eq!(bill.amount.as_decimal(), dec!(12));
    assert!(!bill.paid);

    let rules: Vec<_> = svc.billing_rules().collect();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].kind, ResourceKind::Gpu);

    assert_eq!(svc.user_rentals(&user_id).len(), 1);
    assert_eq!(svc.unread_notifications(&user_id).len(), 2);
}

#[test]
fn paying_after_reload_settles_the_bill() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    let (user_id, bill_id);
    {
        let mut svc = CirrusService::new(config_in(&dir));
        sample_inventory(&mut svc);
        user_id = svc.register_user("bob", "pw", Role::Teacher).unwrap();
        svc.deposit(&user_id, Credits::from_f64(1000.0).unwrap())
            .unwrap();
        let request = svc
            .create_request_at(&user_id, &ResourceId::new("GPU001"), now, 2, now)
            .unwrap();
        let rental = svc.approve_request_at(request, "", now).unwrap();
        bill_id = svc
            .complete_rental_at(rental, now + Duration::hours(2))
            .unwrap();
        svc.save().unwrap();
    }

    let mut svc = CirrusService::load(config_in(&dir));
    svc.pay_bill_at(bill_id, now + Duration::hours(2)).unwrap();
    assert_eq!(svc.user(&user_id).unwrap().balance.as_decimal(), dec!(980));
    assert!(svc.bill(bill_id).unwrap().paid);
}

#[test]
fn corrupt_family_starts_empty_without_poisoning_the_rest() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut svc = CirrusService::new(config_in(&dir));
        sample_inventory(&mut svc);
        svc.register_user("carol", "pw", Role::Student).unwrap();
        svc.save().unwrap();
    }

    std::fs::write(dir.path().join("data").join("resources.dat"), b"garbage").unwrap();

    let svc = CirrusService::load(config_in(&dir));
    assert_eq!(svc.resources().count(), 0);
    assert!(svc.authenticate("carol", "pw").is_some());
}

#[test]
fn fresh_data_directory_boots_empty_and_seeds() {
    let dir = tempfile::tempdir().unwrap();
    let mut svc = CirrusService::load(config_in(&dir));
    assert_eq!(svc.users().count(), 0);

    svc.seed_defaults().unwrap();
    assert!(svc.authenticate("admin", "admin123").is_some());
    assert!(svc.resource(&ResourceId::new("CPU001")).is_some());
    assert_eq!(
        svc.user(&cirrus_common::UserId::new("teacher001"))
            .unwrap()
            .balance
            .as_decimal(),
        dec!(1000)
    );
}
