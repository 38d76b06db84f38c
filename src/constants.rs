//! # DFU Core Constants
//!
//! Defines all table capacities, lock deadlines, and persisted-ABI byte
//! offsets for the trust-and-storage core. These constants are the
//! **single source of truth** for security-critical bounds throughout
//! the codebase.
//!
//! ## Security Rationale
//!
//! Every table in this core is fixed-capacity. Exhaustion is a hard,
//! reportable error rather than a reallocation: the core runs on the
//! last line of defense before a device flashes new firmware, and an
//! attacker who can grow a trust table can usually also starve it.
//!
//! ## Modification Guidelines
//!
//! The `MPI_*` offsets are a persisted ABI shared with factory
//! provisioning tooling. They must remain stable across firmware
//! versions; changing them orphans every provisioned device.

use std::time::Duration;

// =============================================================================
// Table Capacities
// =============================================================================

/// Maximum number of live component handles in the resource arena.
///
/// **Security**: Bounds per-update memory for component tracking. A
/// manifest referencing more components than this is rejected outright.
pub const MAX_COMPONENTS: usize = 32;

/// Capacity of the backing-region pool shared by memory-backed components.
///
/// Smaller than [`MAX_COMPONENTS`]: only memory-mapped, candidate-image,
/// candidate-manifest, and cache-pool components consume a pool record.
pub const MEM_REGION_POOL_SIZE: usize = 16;

/// Number of slots in the verified-digest cache.
///
/// **Security**: The cache memoizes *verified* digests only. When full,
/// insertion fails instead of evicting — silently dropping a
/// "this digest was already verified" fact must never happen implicitly.
pub const DIGEST_CACHE_SLOTS: usize = 32;

/// Maximum number of loaded manifest provisioning records.
///
/// One per manifest role slot; larger than the role count to leave room
/// for platform extensions without an ABI break.
pub const MAX_MPI_ENTRIES: usize = 8;

/// Maximum number of memory regions in a staged update candidate.
pub const MAX_CANDIDATE_REGIONS: usize = 8;

/// Maximum number of registered fetch-source providers.
pub const MAX_FETCH_SOURCES: usize = 8;

/// Maximum number of registered domain-specific copy routes.
pub const MAX_COPY_ROUTES: usize = 8;

/// Number of manifest variables addressable by copy operations.
pub const MAX_MANIFEST_VARIABLES: usize = 32;

// =============================================================================
// Lock Deadlines
// =============================================================================
//
// The digest cache and fetch session state are the only locked tables in
// this core. Both locks are acquired with a deadline: on the boot path a
// hard failure is always preferable to an indefinite hang.
// =============================================================================

/// Deadline for acquiring the digest-cache lock.
pub const CACHE_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Deadline for acquiring the fetch-session lock.
pub const SESSION_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

// =============================================================================
// MPI Record ABI
// =============================================================================
//
// Layout of one provisioned Manifest Provisioning Information record,
// written once at manufacturing/commissioning time into a
// write-protected region. Byte offsets are a persisted ABI.
//
//   offset  size  field
//   ------  ----  -----------------------------------------
//        0     1  version tag (MPI_VERSION)
//        1    16  vendor UUID
//       17    16  class UUID
//       33     1  downgrade-prevention policy
//       34     1  independent-updateability policy
//       35     1  signature-verification policy
//       36    12  reserved, must be all 0xFF
// =============================================================================

/// Expected version tag of a provisioned MPI record.
pub const MPI_VERSION: u8 = 0x01;

/// Total size of one MPI record in bytes.
pub const MPI_RECORD_SIZE: usize = 48;

/// Byte offset of the vendor UUID field.
pub const MPI_VENDOR_UUID_OFFSET: usize = 1;

/// Byte offset of the class UUID field.
pub const MPI_CLASS_UUID_OFFSET: usize = 17;

/// Byte offset of the downgrade-prevention policy byte.
pub const MPI_DOWNGRADE_OFFSET: usize = 33;

/// Byte offset of the independent-updateability policy byte.
pub const MPI_INDEPENDENT_OFFSET: usize = 34;

/// Byte offset of the signature-verification policy byte.
pub const MPI_SIGNATURE_OFFSET: usize = 35;

/// Byte offset of the reserved tail.
pub const MPI_RESERVED_OFFSET: usize = 36;

/// Erased-flash sentinel byte. A region consisting entirely of this value
/// was never provisioned; anything else without a valid version tag is
/// corruption.
pub const ERASED_BYTE: u8 = 0xFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpi_layout_is_contiguous() {
        assert_eq!(MPI_VENDOR_UUID_OFFSET, 1);
        assert_eq!(MPI_CLASS_UUID_OFFSET, MPI_VENDOR_UUID_OFFSET + 16);
        assert_eq!(MPI_DOWNGRADE_OFFSET, MPI_CLASS_UUID_OFFSET + 16);
        assert_eq!(MPI_RESERVED_OFFSET, MPI_SIGNATURE_OFFSET + 1);
        assert_eq!(MPI_RESERVED_OFFSET + 12, MPI_RECORD_SIZE);
    }

    #[test]
    fn pool_not_larger_than_arena() {
        assert!(MEM_REGION_POOL_SIZE <= MAX_COMPONENTS);
    }
}
