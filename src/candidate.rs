//! # Update-Candidate Registry
//!
//! The atomic "what to flash next" pointer: an ordered list of staged
//! memory regions that together form the next update package. The
//! bootloader/updater reads this registry on the next cycle; everything
//! else in the DFU pipeline exists to populate it.
//!
//! ## Erase-Before-Validate
//!
//! [`CandidateRegistry::set`] erases the stored candidate *first*, then
//! validates and writes the replacement. A rejected `set` therefore
//! leaves the registry reporting not-found rather than the previous
//! candidate. This is a deliberate fail-closed contract, not a write
//! ordering accident: a boot path that can still see a stale candidate
//! after a failed replace may flash firmware the caller believed it had
//! replaced.

use crate::constants::MAX_CANDIDATE_REGIONS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One staged update package fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRegion {
    /// Device address of the fragment. Never zero in a stored candidate.
    pub address: u64,
    /// Fragment length in bytes. Never zero in a stored candidate.
    pub size: u32,
}

/// Registry of the staged update candidate.
pub struct CandidateRegistry {
    regions: Vec<CandidateRegion>,
}

impl Default for CandidateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateRegistry {
    /// Creates an empty registry (no candidate staged).
    pub fn new() -> Self {
        Self {
            regions: Vec::with_capacity(MAX_CANDIDATE_REGIONS),
        }
    }

    /// Returns the staged candidate regions.
    ///
    /// Fails with [`Error::NotFound`] whenever no valid candidate is
    /// staged, including immediately after a rejected [`set`](Self::set).
    pub fn get(&self) -> Result<&[CandidateRegion]> {
        if self.regions.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(&self.regions)
    }

    /// Replaces the staged candidate.
    ///
    /// An empty `regions` slice is a clear request and always succeeds,
    /// including when the registry is already empty.
    ///
    /// The stored candidate is erased before validation (see module
    /// docs). Rejection leaves the registry empty.
    ///
    /// # Errors
    ///
    /// - [`Error::Overflow`] if `regions` exceeds
    ///   [`MAX_CANDIDATE_REGIONS`].
    /// - [`Error::InvalidArgument`] if any element has a zero address or
    ///   zero size.
    pub fn set(&mut self, regions: &[CandidateRegion]) -> Result<()> {
        // Fail closed: no stale candidate survives a rejected replace.
        self.regions.clear();

        if regions.is_empty() {
            info!("update candidate cleared");
            return Ok(());
        }

        if regions.len() > MAX_CANDIDATE_REGIONS {
            warn!(
                count = regions.len(),
                max = MAX_CANDIDATE_REGIONS,
                "candidate rejected, too many regions"
            );
            return Err(Error::Overflow("too many candidate regions"));
        }

        for region in regions {
            if region.address == 0 {
                warn!("candidate rejected, null region address");
                return Err(Error::InvalidArgument("candidate region address is null"));
            }
            if region.size == 0 {
                warn!(address = region.address, "candidate rejected, empty region");
                return Err(Error::InvalidArgument("candidate region size is zero"));
            }
        }

        self.regions.extend_from_slice(regions);
        info!(count = regions.len(), "update candidate staged");
        Ok(())
    }

    /// Clears the staged candidate. Equivalent to `set(&[])`.
    pub fn clear(&mut self) {
        self.regions.clear();
        debug!("update candidate cleared");
    }

    /// True if a candidate is staged.
    pub fn has_candidate(&self) -> bool {
        !self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_is_idempotent() {
        let mut registry = CandidateRegistry::new();
        registry.set(&[]).unwrap();
        registry.set(&[]).unwrap();
        assert_eq!(registry.get(), Err(Error::NotFound));
    }

    #[test]
    fn rejected_set_reports_not_found_afterward() {
        let mut registry = CandidateRegistry::new();
        registry
            .set(&[CandidateRegion {
                address: 0xCAFE_FECA,
                size: 2044,
            }])
            .unwrap();

        let bad = [CandidateRegion {
            address: 0x1000,
            size: 0,
        }];
        assert!(registry.set(&bad).is_err());
        assert_eq!(
            registry.get(),
            Err(Error::NotFound),
            "rejected replace must not expose the previous candidate"
        );
    }

    #[test]
    fn region_count_is_bounded() {
        let mut registry = CandidateRegistry::new();
        let too_many = vec![
            CandidateRegion {
                address: 0x1000,
                size: 4,
            };
            MAX_CANDIDATE_REGIONS + 1
        ];
        assert_eq!(
            registry.set(&too_many),
            Err(Error::Overflow("too many candidate regions"))
        );
    }
}
