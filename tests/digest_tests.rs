//! Tests for the verified-digest cache.
//!
//! Validates memoization idempotence, explicit invalidation, the
//! no-eviction overflow contract, and handle-based removal through the
//! platform.

use dfucore::{
    CompactDecoder, ComponentId, DfuPlatform, DigestAlgorithm, DigestCache, DigestComparison,
};

fn identity(seed: u8) -> ComponentId {
    ComponentId::new([seed, 0x10, 0x20]).unwrap()
}

// =============================================================================
// Idempotence Tests
// =============================================================================

#[test]
fn test_add_then_compare_matches() {
    let cache = DigestCache::new();
    let id = identity(1);
    let digest = DigestAlgorithm::Sha256.compute(b"verified payload");

    cache.add(&id, DigestAlgorithm::Sha256, &digest).unwrap();
    assert_eq!(
        cache.compare(&id, DigestAlgorithm::Sha256, &digest).unwrap(),
        DigestComparison::Match
    );
}

#[test]
fn test_remove_then_compare_is_missing() {
    let cache = DigestCache::new();
    let id = identity(1);
    let digest = DigestAlgorithm::Sha256.compute(b"verified payload");

    cache.add(&id, DigestAlgorithm::Sha256, &digest).unwrap();
    cache.remove(&id).unwrap();
    assert_eq!(
        cache.compare(&id, DigestAlgorithm::Sha256, &digest).unwrap(),
        DigestComparison::Missing
    );
}

#[test]
fn test_remove_absent_identity_is_not_an_error() {
    let cache = DigestCache::new();
    cache.remove(&identity(9)).unwrap();
}

// =============================================================================
// Overwrite Tests
// =============================================================================

#[test]
fn test_overwrite_replaces_previous_digest() {
    let cache = DigestCache::new();
    let id = identity(1);
    let first = DigestAlgorithm::Sha256.compute(b"first");
    let second = DigestAlgorithm::Sha256.compute(b"second");

    cache.add(&id, DigestAlgorithm::Sha256, &first).unwrap();
    cache.add(&id, DigestAlgorithm::Sha256, &second).unwrap();

    assert_eq!(
        cache.compare(&id, DigestAlgorithm::Sha256, &first).unwrap(),
        DigestComparison::Mismatch,
        "stale digest must not match after overwrite"
    );
    assert_eq!(
        cache.compare(&id, DigestAlgorithm::Sha256, &second).unwrap(),
        DigestComparison::Match
    );
}

#[test]
fn test_overwrite_does_not_consume_a_second_slot() {
    let cache = DigestCache::new();
    let id = identity(1);
    let digest = DigestAlgorithm::Sha256.compute(b"x");

    cache.add(&id, DigestAlgorithm::Sha256, &digest).unwrap();
    cache.add(&id, DigestAlgorithm::Sha256, &digest).unwrap();
    assert_eq!(cache.len().unwrap(), 1);
}

// =============================================================================
// Bulk and Handle-Based Removal Tests
// =============================================================================

#[test]
fn test_remove_all_clears_every_entry() {
    let cache = DigestCache::new();
    let digest = DigestAlgorithm::Sha256.compute(b"x");
    for seed in 0..4 {
        cache.add(&identity(seed), DigestAlgorithm::Sha256, &digest).unwrap();
    }

    cache.remove_all().unwrap();
    assert!(cache.is_empty().unwrap());
    assert_eq!(
        cache
            .compare(&identity(0), DigestAlgorithm::Sha256, &digest)
            .unwrap(),
        DigestComparison::Missing
    );
}

#[test]
fn test_remove_by_handle_resolves_identity_through_arena() {
    let mut platform = DfuPlatform::new();
    let identity = CompactDecoder::encode_memory_mapped(0x1000, 64);
    let handle = platform.arena_mut().create(identity.clone()).unwrap();

    let digest = DigestAlgorithm::Sha256.compute(b"image");
    platform
        .digest_cache()
        .add(&identity, DigestAlgorithm::Sha256, &digest)
        .unwrap();

    platform.remove_digest_by_handle(handle).unwrap();
    assert_eq!(
        platform
            .digest_cache()
            .compare(&identity, DigestAlgorithm::Sha256, &digest)
            .unwrap(),
        DigestComparison::Missing
    );
}

#[test]
fn test_remove_by_released_handle_fails() {
    let mut platform = DfuPlatform::new();
    let handle = platform
        .arena_mut()
        .create(CompactDecoder::encode_variable(0))
        .unwrap();
    platform.release_component(handle).unwrap();

    assert!(platform.remove_digest_by_handle(handle).is_err());
}
