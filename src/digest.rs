//! # Verified-Digest Cache
//!
//! Memoizes (component identity → verified digest) so the manifest
//! interpreter can skip re-verifying data that has not changed between
//! manifest processing passes.
//!
//! ## Security Model
//!
//! The cache stores **verified** digests only — a hit means "this exact
//! digest was checked against this component before", never "these bytes
//! hash to this". Two consequences shape the design:
//!
//! - **No eviction.** When every slot is taken, [`DigestCache::add`]
//!   fails with overflow. Silently dropping a verified-digest fact to
//!   make room would let a later pass skip verification it never did.
//! - **No indefinite blocking.** The table lock is acquired with a
//!   deadline ([`CACHE_LOCK_TIMEOUT`]); on timeout the caller gets a
//!   hard failure. On the boot path a failed update beats a hung one.
//!
//! Entries own their identity and digest bytes, so no cached span can
//! outlive its backing buffer.

use crate::constants::{CACHE_LOCK_TIMEOUT, DIGEST_CACHE_SLOTS};
use crate::error::{Error, Result};
use crate::identity::ComponentId;
use parking_lot::{Mutex, MutexGuard};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::{debug, warn};

// =============================================================================
// Algorithm
// =============================================================================

/// Digest algorithms the cache can tag entries with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Computes the digest of `data`.
    ///
    /// Provided for callers staging verified digests; the cache itself
    /// never hashes on its lookup path.
    pub fn compute(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

// =============================================================================
// Comparison Outcome
// =============================================================================

/// Outcome of [`DigestCache::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestComparison {
    /// An entry exists for the identity and both algorithm and digest match.
    Match,
    /// An entry exists for the identity but algorithm or digest differ.
    Mismatch,
    /// No entry exists for the identity.
    Missing,
}

// =============================================================================
// DigestCache
// =============================================================================

struct Entry {
    identity: ComponentId,
    algorithm: DigestAlgorithm,
    digest: Box<[u8]>,
}

/// Fixed-capacity, deadline-locked cache of verified digests.
pub struct DigestCache {
    slots: Mutex<Vec<Option<Entry>>>,
}

impl Default for DigestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(DIGEST_CACHE_SLOTS);
        slots.resize_with(DIGEST_CACHE_SLOTS, || None);
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Records a verified digest for `identity`.
    ///
    /// Overwrites an existing entry for the same identity; otherwise
    /// fills the first free slot.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for an empty digest or a digest whose
    ///   length does not match the algorithm.
    /// - [`Error::Overflow`] when no same-identity or free slot exists.
    ///   The cache never evicts.
    /// - [`Error::LockTimeout`] if the table lock cannot be acquired in
    ///   time.
    pub fn add(
        &self,
        identity: &ComponentId,
        algorithm: DigestAlgorithm,
        digest: &[u8],
    ) -> Result<()> {
        if digest.is_empty() {
            return Err(Error::InvalidArgument("empty digest"));
        }
        if digest.len() != algorithm.digest_len() {
            return Err(Error::InvalidArgument("digest length does not match algorithm"));
        }

        let mut slots = self.lock()?;

        let target = slots
            .iter_mut()
            .position(|slot| matches!(slot, Some(e) if e.identity == *identity))
            .or_else(|| slots.iter().position(Option::is_none));

        match target {
            Some(index) => {
                slots[index] = Some(Entry {
                    identity: identity.clone(),
                    algorithm,
                    digest: digest.into(),
                });
                debug!(slot = index, "digest cached");
                Ok(())
            }
            None => {
                warn!("digest cache full, refusing to evict a verified digest");
                Err(Error::Overflow("digest cache full"))
            }
        }
    }

    /// Removes the entry for `identity`. Absence of a match is not an error.
    pub fn remove(&self, identity: &ComponentId) -> Result<()> {
        let mut slots = self.lock()?;
        for slot in slots.iter_mut() {
            if matches!(slot, Some(e) if e.identity == *identity) {
                *slot = None;
                debug!("cached digest removed");
                break;
            }
        }
        Ok(())
    }

    /// Removes every entry.
    pub fn remove_all(&self) -> Result<()> {
        let mut slots = self.lock()?;
        for slot in slots.iter_mut() {
            *slot = None;
        }
        debug!("digest cache cleared");
        Ok(())
    }

    /// Compares `(algorithm, digest)` against the cached entry for
    /// `identity`.
    pub fn compare(
        &self,
        identity: &ComponentId,
        algorithm: DigestAlgorithm,
        digest: &[u8],
    ) -> Result<DigestComparison> {
        let slots = self.lock()?;
        let entry = slots
            .iter()
            .flatten()
            .find(|e| e.identity == *identity);
        let outcome = match entry {
            None => DigestComparison::Missing,
            Some(e) if e.algorithm == algorithm && *e.digest == *digest => DigestComparison::Match,
            Some(_) => DigestComparison::Mismatch,
        };
        Ok(outcome)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.iter().flatten().count())
    }

    /// True if no digests are cached.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Option<Entry>>>> {
        self.slots
            .try_lock_for(CACHE_LOCK_TIMEOUT)
            .ok_or(Error::LockTimeout("digest cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(byte: u8) -> ComponentId {
        ComponentId::new([byte, 1, 2]).unwrap()
    }

    #[test]
    fn digest_length_is_validated() {
        let cache = DigestCache::new();
        let err = cache.add(&identity(1), DigestAlgorithm::Sha256, &[0u8; 16]);
        assert_eq!(
            err,
            Err(Error::InvalidArgument("digest length does not match algorithm"))
        );
    }

    #[test]
    fn algorithm_mismatch_is_reported_as_mismatch() {
        let cache = DigestCache::new();
        let id = identity(1);
        let d256 = DigestAlgorithm::Sha256.compute(b"payload");
        cache.add(&id, DigestAlgorithm::Sha256, &d256).unwrap();

        let d384 = DigestAlgorithm::Sha384.compute(b"payload");
        assert_eq!(
            cache.compare(&id, DigestAlgorithm::Sha384, &d384).unwrap(),
            DigestComparison::Mismatch
        );
    }

    #[test]
    fn full_cache_rejects_new_identity_but_updates_existing() {
        let cache = DigestCache::new();
        let digest = DigestAlgorithm::Sha256.compute(b"x");
        for i in 0..DIGEST_CACHE_SLOTS {
            cache
                .add(&identity(i as u8), DigestAlgorithm::Sha256, &digest)
                .unwrap();
        }

        let fresh = ComponentId::new([0xAA, 0xBB]).unwrap();
        assert_eq!(
            cache.add(&fresh, DigestAlgorithm::Sha256, &digest),
            Err(Error::Overflow("digest cache full"))
        );

        // Overwriting an identity that already has a slot still works.
        let updated = DigestAlgorithm::Sha256.compute(b"y");
        cache
            .add(&identity(0), DigestAlgorithm::Sha256, &updated)
            .unwrap();
        assert_eq!(
            cache
                .compare(&identity(0), DigestAlgorithm::Sha256, &updated)
                .unwrap(),
            DigestComparison::Match
        );
    }
}
