//! Authorization rule, table bounds and persistence of the access tables.

use gatehouse_core::{
    ErrorKind,
    access::{
        AccessConfig, AccessControl, AccessError, DEVICE_TABLE, DeviceEntry, KEY_TABLE, KeyEntry,
    },
};
use gatehouse_store::{FileStore, LineStore, MemoryStore};
use proptest::prelude::*;
use tempfile::tempdir;

/// Eight-character keys keep the scenarios readable.
fn short_keys() -> AccessConfig {
    AccessConfig { key_length: 8, ..AccessConfig::default() }
}

fn open(config: AccessConfig) -> AccessControl<MemoryStore> {
    AccessControl::open(MemoryStore::new(), config).expect("open")
}

#[test]
fn device_45_scenario() {
    let access = open(short_keys());
    access.add_device(45, 2).expect("add device");
    access.add_key("key00001", 3).expect("add key");

    assert_eq!(access.authorize(45, "key00001"), Ok(true));

    access.change_device_access_level(45, 4).expect("raise device");
    assert_eq!(access.authorize(45, "key00001"), Ok(false));
    assert_eq!(access.list_devices(), [DeviceEntry { id: 45, level: 4 }]);

    access.delete_device(45).expect("delete device");
    let err = access.authorize(45, "key00001").expect_err("device gone");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn lowering_a_key_revokes_access() {
    let access = open(short_keys());
    access.add_device(45, 3).expect("add device");
    access.add_key("key00001", 5).expect("add key");

    assert_eq!(access.authorize(45, "key00001"), Ok(true));

    access.change_key_access_level("key00001", 2).expect("lower key");
    assert_eq!(access.authorize(45, "key00001"), Ok(false));

    access.delete_device(45).expect("delete device");
    let err = access.authorize(45, "key00001").expect_err("device gone");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn unknown_key_is_not_found() {
    let access = open(short_keys());
    access.add_device(1, 0).expect("add device");
    assert!(matches!(
        access.authorize(1, "key00009"),
        Err(AccessError::NotFound { kind: "key", .. })
    ));
}

#[test]
fn boundary_validation() {
    let access = open(AccessConfig::default());

    assert_eq!(access.add_key(&"A".repeat(15), 1).expect_err("15").kind(), ErrorKind::InvalidInput);
    assert_eq!(access.add_key(&"A".repeat(17), 1).expect_err("17").kind(), ErrorKind::InvalidInput);
    access.add_key(&"A".repeat(16), 1).expect("16 accepted");

    assert_eq!(access.add_device(0, 1).expect_err("0").kind(), ErrorKind::InvalidInput);
    assert_eq!(access.add_device(100, 1).expect_err("100").kind(), ErrorKind::InvalidInput);
    access.add_device(99, 1).expect("99 accepted");

    assert_eq!(access.add_device(5, 10).expect_err("level 10").kind(), ErrorKind::InvalidInput);
    assert_eq!(
        access.change_device_access_level(99, 10).expect_err("level 10").kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(access.device_count(), 1);
}

#[test]
fn forty_first_key_is_rejected() {
    let access = open(short_keys());
    for i in 0..40 {
        access.add_key(&format!("key{i:05}"), 1).expect("add");
    }

    let err = access.add_key("key99999", 1).expect_err("full");
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(access.key_count(), 40);

    // A freed slot can be reused.
    access.delete_key("key00000").expect("delete");
    access.add_key("key99999", 1).expect("add after delete");
}

#[test]
fn duplicates_and_missing_entries() {
    let access = open(short_keys());
    access.add_device(7, 1).expect("add");

    assert_eq!(access.add_device(7, 2).expect_err("dup").kind(), ErrorKind::Duplicate);
    assert_eq!(access.delete_device(8).expect_err("missing").kind(), ErrorKind::NotFound);
    assert_eq!(
        access.change_key_access_level("key00001", 1).expect_err("missing").kind(),
        ErrorKind::NotFound
    );
    assert_eq!(access.list_devices(), vec![DeviceEntry { id: 7, level: 1 }]);
}

#[test]
fn delete_compacts_table_and_store() {
    let store = MemoryStore::new();
    let access = AccessControl::open(store.clone(), short_keys()).expect("open");
    for (i, level) in [(1, 1), (2, 2), (3, 3)] {
        access.add_device(i, level).expect("add");
    }

    access.delete_device(2).expect("delete middle");
    access.change_device_access_level(3, 7).expect("change last");

    assert_eq!(
        access.list_devices(),
        vec![DeviceEntry { id: 1, level: 1 }, DeviceEntry { id: 3, level: 7 }]
    );
    assert_eq!(store.read_all(DEVICE_TABLE).expect("read"), vec!["01,1", "03,7"]);
}

#[test]
fn file_backed_tables_survive_restart() {
    let dir = tempdir().expect("tempdir");
    {
        let store = FileStore::open(dir.path()).expect("store");
        let access = AccessControl::open(store, AccessConfig::default()).expect("open");
        access.add_key("00A1B2C3D4E5F607", 4).expect("add");
        access.add_device(45, 3).expect("add");
    }

    assert_eq!(
        std::fs::read_to_string(dir.path().join(KEY_TABLE)).expect("read"),
        "00A1B2C3D4E5F607,4\n"
    );

    let store = FileStore::open(dir.path()).expect("store");
    let access = AccessControl::open(store, AccessConfig::default()).expect("reopen");
    assert_eq!(access.list_keys(), vec![KeyEntry { id: "00A1B2C3D4E5F607".into(), level: 4 }]);
    assert_eq!(access.authorize(45, "00A1B2C3D4E5F607"), Ok(true));
}

#[test]
fn corrupt_key_file_refuses_to_start() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join(KEY_TABLE), "00A1B2C3D4E5F607,4\nnot a key line\n")
        .expect("write");

    let store = FileStore::open(dir.path()).expect("store");
    let err = AccessControl::open(store, AccessConfig::default()).err().expect("fatal");
    assert!(matches!(err, AccessError::MalformedRecord { table: KEY_TABLE, line: 2, .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_authorization_is_level_comparison(key_level in 0u8..=9, device_level in 0u8..=9) {
        let access = open(short_keys());
        access.add_device(12, device_level).expect("add device");
        access.add_key("key00001", key_level).expect("add key");

        prop_assert_eq!(access.authorize(12, "key00001"), Ok(key_level >= device_level));
    }

    #[test]
    fn prop_raising_key_level_never_revokes(
        device_level in 0u8..=9,
        start in 0u8..=9,
        raise in 0u8..=9,
    ) {
        let access = open(short_keys());
        access.add_device(3, device_level).expect("add device");
        access.add_key("key00001", start).expect("add key");
        let before = access.authorize(3, "key00001").expect("authorize");

        let raised = start.max(raise);
        access.change_key_access_level("key00001", raised).expect("change");
        let after = access.authorize(3, "key00001").expect("authorize");

        prop_assert!(!before || after);
    }

    #[test]
    fn prop_add_list_delete_round_trip(
        devices in prop::collection::btree_map(1u8..=99, 0u8..=9, 0..40),
    ) {
        let store = MemoryStore::new();
        let access = AccessControl::open(store.clone(), short_keys()).expect("open");
        for (&id, &level) in &devices {
            access.add_device(id, level).expect("add");
        }

        let listed = access.list_devices();
        let expected: Vec<_> =
            devices.iter().map(|(&id, &level)| DeviceEntry { id, level }).collect();
        prop_assert_eq!(&listed, &expected);

        for &id in devices.keys() {
            access.delete_device(id).expect("delete");
        }
        prop_assert_eq!(access.device_count(), 0);
        prop_assert_eq!(store.count(DEVICE_TABLE).expect("count"), 0);
    }
}
