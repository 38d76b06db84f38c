//! # Manifest Provisioning Information (MPI) Store
//!
//! A read-mostly table of per-role manifest policy records, loaded once
//! at startup from dedicated, write-protected memory regions — one
//! region per manifest role slot, provisioned at manufacturing or
//! commissioning time.
//!
//! Each record states which manifest *class* may claim a *role* and
//! which update/security policies apply to manifests holding that role.
//! The byte layout is a persisted ABI (see [`crate::constants`]); the
//! parse here is offset-exact and rejects anything it does not fully
//! understand.
//!
//! ## Validation Ladder
//!
//! `configuration_load` validates, in order: version tag, role
//! uniqueness, class uniqueness across roles, table capacity,
//! downgrade-prevention enum, independent-updateability enum (with the
//! root/recovery exception), signature-verification enum, reserved-field
//! all-ones, vendor UUID non-degenerate, class UUID non-degenerate. Any
//! failure leaves the table untouched.
//!
//! A region that is entirely erased flash is reported as [`Error::NotFound`]
//! rather than a validation failure — an unprovisioned role slot is
//! normal, and callers continue loading the remaining roles.

use crate::constants::{
    ERASED_BYTE, MAX_MPI_ENTRIES, MPI_CLASS_UUID_OFFSET, MPI_DOWNGRADE_OFFSET,
    MPI_INDEPENDENT_OFFSET, MPI_RECORD_SIZE, MPI_RESERVED_OFFSET, MPI_SIGNATURE_OFFSET,
    MPI_VENDOR_UUID_OFFSET, MPI_VERSION,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

// =============================================================================
// Roles
// =============================================================================

/// Manifest role slots this platform provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestRole {
    /// Root-of-trust manifest. Update trust anchor.
    Root,
    /// Recovery manifest. Update trust anchor.
    Recovery,
    /// Application firmware manifest.
    Application,
    /// Radio/network-core firmware manifest.
    Radio,
}

impl ManifestRole {
    /// Roles that anchor the update trust chain. These manifests must
    /// remain independently updateable: if the anchor can only be
    /// updated together with something else, a bricked companion image
    /// locks the device out of recovery.
    pub fn is_trust_anchor(self) -> bool {
        matches!(self, Self::Root | Self::Recovery)
    }
}

impl std::fmt::Display for ManifestRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Root => "root",
            Self::Recovery => "recovery",
            Self::Application => "application",
            Self::Radio => "radio",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Provisioned Policies
// =============================================================================
//
// Wire values are deliberately neither 0x00 nor 0xFF so that blank and
// erased flash can never parse as a valid policy.
// =============================================================================

/// Downgrade-prevention policy provisioned for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DowngradePrevention {
    Disabled,
    Enabled,
}

impl DowngradePrevention {
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Disabled),
            0x02 => Some(Self::Enabled),
            _ => None,
        }
    }
}

/// Whether manifests in this role may be updated on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndependentUpdateability {
    Denied,
    Allowed,
}

impl IndependentUpdateability {
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Denied),
            0x02 => Some(Self::Allowed),
            _ => None,
        }
    }
}

/// When signature verification is required for manifests in this role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureVerification {
    Disabled,
    OnUpdate,
    OnUpdateAndBoot,
}

impl SignatureVerification {
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Disabled),
            0x02 => Some(Self::OnUpdate),
            0x03 => Some(Self::OnUpdateAndBoot),
            _ => None,
        }
    }
}

// =============================================================================
// External Policy Translation
// =============================================================================
//
// The condition-evaluation layer above this core speaks its own policy
// enums. The translators below are total functions with an explicit
// Unknown sentinel; given load-time validation the sentinel should be
// unreachable, but the mapping must not panic on a future wire value.
// =============================================================================

/// Downgrade policy as consumed by the manifest condition evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DowngradePolicy {
    AllowDowngrade,
    RejectDowngrade,
    Unknown,
}

/// Independent-update policy as consumed by the update coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndependentUpdatePolicy {
    UpdateDenied,
    UpdateAllowed,
    Unknown,
}

/// Signature-check policy as consumed by the boot and update paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureCheckPolicy {
    NoCheck,
    CheckOnUpdate,
    CheckOnUpdateAndBoot,
    Unknown,
}

/// Maps a provisioned downgrade-prevention value to the external policy.
pub fn downgrade_policy(value: DowngradePrevention) -> DowngradePolicy {
    match value {
        DowngradePrevention::Disabled => DowngradePolicy::AllowDowngrade,
        DowngradePrevention::Enabled => DowngradePolicy::RejectDowngrade,
    }
}

/// Maps a provisioned independent-updateability value to the external policy.
pub fn independent_update_policy(value: IndependentUpdateability) -> IndependentUpdatePolicy {
    match value {
        IndependentUpdateability::Denied => IndependentUpdatePolicy::UpdateDenied,
        IndependentUpdateability::Allowed => IndependentUpdatePolicy::UpdateAllowed,
    }
}

/// Maps a provisioned signature-verification value to the external policy.
pub fn signature_check_policy(value: SignatureVerification) -> SignatureCheckPolicy {
    match value {
        SignatureVerification::Disabled => SignatureCheckPolicy::NoCheck,
        SignatureVerification::OnUpdate => SignatureCheckPolicy::CheckOnUpdate,
        SignatureVerification::OnUpdateAndBoot => SignatureCheckPolicy::CheckOnUpdateAndBoot,
    }
}

/// Maps a raw wire byte to the external downgrade policy.
///
/// Used by diagnostics paths that inspect unvalidated flash.
pub fn downgrade_policy_from_wire(byte: u8) -> DowngradePolicy {
    DowngradePrevention::from_wire(byte)
        .map(downgrade_policy)
        .unwrap_or(DowngradePolicy::Unknown)
}

/// Maps a raw wire byte to the external independent-update policy.
pub fn independent_update_policy_from_wire(byte: u8) -> IndependentUpdatePolicy {
    IndependentUpdateability::from_wire(byte)
        .map(independent_update_policy)
        .unwrap_or(IndependentUpdatePolicy::Unknown)
}

/// Maps a raw wire byte to the external signature-check policy.
pub fn signature_check_policy_from_wire(byte: u8) -> SignatureCheckPolicy {
    SignatureVerification::from_wire(byte)
        .map(signature_check_policy)
        .unwrap_or(SignatureCheckPolicy::Unknown)
}

// =============================================================================
// Records
// =============================================================================

/// A fully validated MPI record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpiRecord {
    /// Vendor that provisioned this role slot.
    pub vendor_id: Uuid,
    /// Manifest class allowed to claim the role.
    pub class_id: Uuid,
    pub downgrade_prevention: DowngradePrevention,
    pub independent_updateability: IndependentUpdateability,
    pub signature_verification: SignatureVerification,
}

/// (vendor, class, role) triple exported by [`MpiStore::class_infos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub vendor_id: Uuid,
    pub class_id: Uuid,
    pub role: ManifestRole,
}

struct MpiEntry {
    role: ManifestRole,
    record: MpiRecord,
    /// Device address of the provisioned region, kept for diagnostics.
    address: u64,
}

// =============================================================================
// MpiStore
// =============================================================================

/// Fixed-capacity table of loaded MPI records.
pub struct MpiStore {
    entries: Vec<MpiEntry>,
}

impl Default for MpiStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MpiStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_MPI_ENTRIES),
        }
    }

    /// Clears the table to empty.
    pub fn init(&mut self) {
        self.entries.clear();
        info!("mpi store initialized");
    }

    /// Interprets the provisioned region at `address` as the MPI record
    /// for `role` and appends it to the table.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the region is entirely erased flash —
    ///   this role slot was never provisioned, and the caller may keep
    ///   loading other roles.
    /// - [`Error::OutOfBounds`] for a missing version tag over
    ///   non-erased bytes, a short region, or any failed field
    ///   validation.
    /// - [`Error::AlreadyExists`] if the role is already registered, or
    ///   the class UUID is already claimed under a different role.
    /// - [`Error::Overflow`] if the table is at capacity.
    pub fn configuration_load(
        &mut self,
        role: ManifestRole,
        address: u64,
        data: &[u8],
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("empty mpi region"));
        }

        if data.len() < MPI_RECORD_SIZE || data[0] != MPI_VERSION {
            return if data.iter().all(|&b| b == ERASED_BYTE) {
                debug!(%role, "mpi slot erased, never provisioned");
                Err(Error::NotFound)
            } else {
                warn!(%role, "mpi region is neither provisioned nor erased");
                Err(Error::OutOfBounds(format!(
                    "mpi region for role {role} holds garbage"
                )))
            };
        }

        if self.entries.iter().any(|e| e.role == role) {
            return Err(Error::AlreadyExists("mpi role already registered"));
        }

        let class_id = Self::uuid_at(data, MPI_CLASS_UUID_OFFSET);
        if self.entries.iter().any(|e| e.record.class_id == class_id) {
            // A class claimed under two roles would make role lookup by
            // class ambiguous.
            return Err(Error::AlreadyExists("manifest class already claimed"));
        }

        if self.entries.len() >= MAX_MPI_ENTRIES {
            return Err(Error::Overflow("mpi table full"));
        }

        let record = Self::validate(role, class_id, data)?;

        self.entries.push(MpiEntry {
            role,
            record,
            address,
        });
        info!(%role, class = %record.class_id, "mpi record loaded");
        Ok(())
    }

    /// Returns the role claimed by `class_id`.
    pub fn role_get(&self, class_id: &Uuid) -> Result<ManifestRole> {
        self.entries
            .iter()
            .find(|e| e.record.class_id == *class_id)
            .map(|e| e.role)
            .ok_or(Error::NotFound)
    }

    /// Returns the class UUID registered for `role`.
    pub fn class_get(&self, role: ManifestRole) -> Result<Uuid> {
        self.entries
            .iter()
            .find(|e| e.role == role)
            .map(|e| e.record.class_id)
            .ok_or(Error::NotFound)
    }

    /// Returns the full policy record for `class_id`.
    pub fn get(&self, class_id: &Uuid) -> Result<MpiRecord> {
        self.entries
            .iter()
            .find(|e| e.record.class_id == *class_id)
            .map(|e| e.record)
            .ok_or(Error::NotFound)
    }

    /// Exports the (vendor, class, role) triple of every loaded entry
    /// into `out`, returning the number written.
    ///
    /// Fails with [`Error::BufferTooSmall`] if `out` cannot hold every
    /// entry; nothing is written in that case.
    pub fn class_infos(&self, out: &mut [ClassInfo]) -> Result<usize> {
        if out.len() < self.entries.len() {
            return Err(Error::BufferTooSmall {
                needed: self.entries.len(),
                capacity: out.len(),
            });
        }
        for (slot, entry) in out.iter_mut().zip(self.entries.iter()) {
            *slot = ClassInfo {
                vendor_id: entry.record.vendor_id,
                class_id: entry.record.class_id,
                role: entry.role,
            };
        }
        Ok(self.entries.len())
    }

    /// Number of loaded records.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// True if a record is loaded for `role`.
    pub fn is_loaded(&self, role: ManifestRole) -> bool {
        self.entries.iter().any(|e| e.role == role)
    }

    /// Device address the record for `role` was loaded from.
    pub fn address_of(&self, role: ManifestRole) -> Result<u64> {
        self.entries
            .iter()
            .find(|e| e.role == role)
            .map(|e| e.address)
            .ok_or(Error::NotFound)
    }

    // -------------------------------------------------------------------------
    // Record Parsing
    // -------------------------------------------------------------------------

    fn validate(role: ManifestRole, class_id: Uuid, data: &[u8]) -> Result<MpiRecord> {
        let downgrade_prevention = DowngradePrevention::from_wire(data[MPI_DOWNGRADE_OFFSET])
            .ok_or_else(|| {
                Error::OutOfBounds(format!(
                    "invalid downgrade-prevention value {:#04x}",
                    data[MPI_DOWNGRADE_OFFSET]
                ))
            })?;

        let independent_updateability =
            IndependentUpdateability::from_wire(data[MPI_INDEPENDENT_OFFSET]).ok_or_else(|| {
                Error::OutOfBounds(format!(
                    "invalid independent-updateability value {:#04x}",
                    data[MPI_INDEPENDENT_OFFSET]
                ))
            })?;
        if independent_updateability == IndependentUpdateability::Denied && role.is_trust_anchor() {
            warn!(%role, "trust-anchor role provisioned as not independently updateable");
            return Err(Error::OutOfBounds(format!(
                "role {role} must remain independently updateable"
            )));
        }

        let signature_verification = SignatureVerification::from_wire(data[MPI_SIGNATURE_OFFSET])
            .ok_or_else(|| {
            Error::OutOfBounds(format!(
                "invalid signature-verification value {:#04x}",
                data[MPI_SIGNATURE_OFFSET]
            ))
        })?;

        if data[MPI_RESERVED_OFFSET..MPI_RECORD_SIZE]
            .iter()
            .any(|&b| b != ERASED_BYTE)
        {
            return Err(Error::OutOfBounds(
                "reserved field touched in mpi record".to_string(),
            ));
        }

        let vendor_id = Self::uuid_at(data, MPI_VENDOR_UUID_OFFSET);
        if Self::degenerate(&vendor_id) {
            return Err(Error::OutOfBounds("degenerate vendor uuid".to_string()));
        }
        if Self::degenerate(&class_id) {
            return Err(Error::OutOfBounds("degenerate class uuid".to_string()));
        }

        Ok(MpiRecord {
            vendor_id,
            class_id,
            downgrade_prevention,
            independent_updateability,
            signature_verification,
        })
    }

    fn uuid_at(data: &[u8], offset: usize) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&data[offset..offset + 16]);
        Uuid::from_bytes(bytes)
    }

    fn degenerate(uuid: &Uuid) -> bool {
        uuid.is_nil() || uuid.is_max()
    }
}
