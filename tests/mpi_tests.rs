//! Tests for the manifest provisioning information store.
//!
//! Validates the load-time validation ladder, role/class uniqueness,
//! degenerate-UUID rejection, the erased-slot contract, and lookups.

use dfucore::constants::{
    ERASED_BYTE, MPI_CLASS_UUID_OFFSET, MPI_DOWNGRADE_OFFSET, MPI_INDEPENDENT_OFFSET,
    MPI_RECORD_SIZE, MPI_SIGNATURE_OFFSET, MPI_VENDOR_UUID_OFFSET, MPI_VERSION,
};
use dfucore::{
    ClassInfo, DowngradePrevention, Error, IndependentUpdateability, ManifestRole, MpiStore,
    SignatureVerification,
};
use uuid::Uuid;

/// Builds a valid provisioned record. Vendor and class UUIDs are filled
/// with the given seed bytes; policies use legal wire values.
fn record(vendor: u8, class: u8) -> Vec<u8> {
    let mut data = vec![ERASED_BYTE; MPI_RECORD_SIZE];
    data[0] = MPI_VERSION;
    data[MPI_VENDOR_UUID_OFFSET..MPI_VENDOR_UUID_OFFSET + 16].fill(vendor);
    data[MPI_CLASS_UUID_OFFSET..MPI_CLASS_UUID_OFFSET + 16].fill(class);
    data[MPI_DOWNGRADE_OFFSET] = 0x02; // enabled
    data[MPI_INDEPENDENT_OFFSET] = 0x02; // allowed
    data[MPI_SIGNATURE_OFFSET] = 0x03; // on update and boot
    data
}

fn uuid_of(seed: u8) -> Uuid {
    Uuid::from_bytes([seed; 16])
}

// =============================================================================
// Load and Lookup Tests
// =============================================================================

#[test]
fn test_load_then_lookup_by_role_and_class() {
    let mut store = MpiStore::new();
    store
        .configuration_load(ManifestRole::Root, 0xF000, &record(0x10, 0x20))
        .unwrap();
    store
        .configuration_load(ManifestRole::Application, 0xF100, &record(0x10, 0x21))
        .unwrap();

    assert_eq!(store.role_get(&uuid_of(0x20)).unwrap(), ManifestRole::Root);
    assert_eq!(store.class_get(ManifestRole::Application).unwrap(), uuid_of(0x21));

    let rec = store.get(&uuid_of(0x21)).unwrap();
    assert_eq!(rec.vendor_id, uuid_of(0x10));
    assert_eq!(rec.downgrade_prevention, DowngradePrevention::Enabled);
    assert_eq!(
        rec.independent_updateability,
        IndependentUpdateability::Allowed
    );
    assert_eq!(
        rec.signature_verification,
        SignatureVerification::OnUpdateAndBoot
    );

    assert_eq!(store.role_get(&uuid_of(0x7F)), Err(Error::NotFound));
    assert_eq!(store.class_get(ManifestRole::Radio), Err(Error::NotFound));
}

#[test]
fn test_class_infos_export_and_buffer_check() {
    let mut store = MpiStore::new();
    store
        .configuration_load(ManifestRole::Root, 0xF000, &record(0x10, 0x20))
        .unwrap();
    store
        .configuration_load(ManifestRole::Recovery, 0xF100, &record(0x10, 0x22))
        .unwrap();

    let empty = ClassInfo {
        vendor_id: Uuid::nil(),
        class_id: Uuid::nil(),
        role: ManifestRole::Root,
    };

    let mut small = [empty; 1];
    assert_eq!(
        store.class_infos(&mut small),
        Err(Error::BufferTooSmall {
            needed: 2,
            capacity: 1
        })
    );

    let mut out = [empty; 4];
    let written = store.class_infos(&mut out).unwrap();
    assert_eq!(written, 2);
    assert_eq!(out[0].class_id, uuid_of(0x20));
    assert_eq!(out[1].role, ManifestRole::Recovery);
}

// =============================================================================
// Uniqueness Tests
// =============================================================================

#[test]
fn test_duplicate_role_leaves_table_unchanged() {
    let mut store = MpiStore::new();
    store
        .configuration_load(ManifestRole::Root, 0xF000, &record(0x10, 0x20))
        .unwrap();

    let err = store.configuration_load(ManifestRole::Root, 0xF100, &record(0x10, 0x30));
    assert_eq!(err, Err(Error::AlreadyExists("mpi role already registered")));
    assert_eq!(store.entry_count(), 1);
    assert_eq!(store.class_get(ManifestRole::Root).unwrap(), uuid_of(0x20));
}

#[test]
fn test_same_class_under_two_roles_is_rejected() {
    let mut store = MpiStore::new();
    store
        .configuration_load(ManifestRole::Root, 0xF000, &record(0x10, 0x20))
        .unwrap();

    let err = store.configuration_load(ManifestRole::Application, 0xF100, &record(0x10, 0x20));
    assert_eq!(err, Err(Error::AlreadyExists("manifest class already claimed")));
    assert_eq!(store.entry_count(), 1);
}

// =============================================================================
// Validation Ladder Tests
// =============================================================================

#[test]
fn test_degenerate_uuids_are_rejected() {
    let mut store = MpiStore::new();

    // All-zero vendor.
    let err = store.configuration_load(ManifestRole::Root, 0xF000, &record(0x00, 0x20));
    assert!(matches!(err, Err(Error::OutOfBounds(_))));
    assert_eq!(store.entry_count(), 0, "rejected record must not register");

    // All-one class. The class field doubles as erased flash, which the
    // uniqueness scan must not be confused by.
    let err = store.configuration_load(ManifestRole::Root, 0xF000, &record(0x10, 0xFF));
    assert!(matches!(err, Err(Error::OutOfBounds(_))));
    assert_eq!(store.entry_count(), 0);
}

#[test]
fn test_invalid_policy_bytes_are_rejected() {
    let mut store = MpiStore::new();

    let mut bad = record(0x10, 0x20);
    bad[MPI_DOWNGRADE_OFFSET] = 0x09;
    assert!(matches!(
        store.configuration_load(ManifestRole::Root, 0xF000, &bad),
        Err(Error::OutOfBounds(_))
    ));

    let mut bad = record(0x10, 0x20);
    bad[MPI_SIGNATURE_OFFSET] = 0x00;
    assert!(matches!(
        store.configuration_load(ManifestRole::Root, 0xF000, &bad),
        Err(Error::OutOfBounds(_))
    ));

    assert_eq!(store.entry_count(), 0);
}

#[test]
fn test_anchor_roles_must_be_independently_updateable() {
    let mut store = MpiStore::new();
    let mut denied = record(0x10, 0x20);
    denied[MPI_INDEPENDENT_OFFSET] = 0x01; // denied

    for role in [ManifestRole::Root, ManifestRole::Recovery] {
        assert!(
            matches!(
                store.configuration_load(role, 0xF000, &denied),
                Err(Error::OutOfBounds(_))
            ),
            "independent updates denied must be illegal for {role}"
        );
    }
    assert_eq!(store.entry_count(), 0);
}

// =============================================================================
// Erased-Slot Tests
// =============================================================================

#[test]
fn test_erased_slot_is_not_found_and_loading_continues() {
    let mut store = MpiStore::new();
    let erased = vec![ERASED_BYTE; MPI_RECORD_SIZE];

    assert_eq!(
        store.configuration_load(ManifestRole::Radio, 0xF000, &erased),
        Err(Error::NotFound),
        "an unprovisioned slot is absent, not corrupt"
    );

    // Other roles still load into an unchanged table.
    store
        .configuration_load(ManifestRole::Root, 0xF100, &record(0x10, 0x20))
        .unwrap();
    assert_eq!(store.entry_count(), 1);
    assert!(!store.is_loaded(ManifestRole::Radio));
}

#[test]
fn test_garbage_region_is_out_of_bounds() {
    let mut store = MpiStore::new();
    let mut garbage = vec![ERASED_BYTE; MPI_RECORD_SIZE];
    garbage[40] = 0x5A; // neither provisioned nor fully erased

    assert!(matches!(
        store.configuration_load(ManifestRole::Radio, 0xF000, &garbage),
        Err(Error::OutOfBounds(_))
    ));
}

#[test]
fn test_init_clears_loaded_entries() {
    let mut store = MpiStore::new();
    store
        .configuration_load(ManifestRole::Root, 0xF000, &record(0x10, 0x20))
        .unwrap();
    store.init();
    assert_eq!(store.entry_count(), 0);
    assert_eq!(store.class_get(ManifestRole::Root), Err(Error::NotFound));
}
