//! # Component Identity and the Decoder Seam
//!
//! Every resource an update manifest touches is named by an opaque byte
//! string — its *identity*. This core never interprets identity bytes
//! itself; it asks an [`IdentityDecoder`] for the three facts it needs:
//!
//! - which [`ResourceKind`] the identity names,
//! - for memory-backed kinds, the declared (address, size) window,
//! - for indexed kinds, the numeric id.
//!
//! The decoder is a seam: the manifest format owns the encoding, this
//! core owns the tables keyed by it. [`CompactDecoder`] is the built-in
//! codec used by the default platform and by tests.
//!
//! ## Ownership Model
//!
//! [`ComponentId`] owns its bytes behind an `Arc`, so cloning an identity
//! into the arena or the digest cache is a refcount bump, never a deep
//! copy, and no table ever holds a borrowed span whose backing buffer
//! could disappear under it.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// ComponentId
// =============================================================================

/// Immutable byte-string identity of a component.
///
/// Two identities are equal iff their bytes are equal. Construction
/// rejects empty input — an empty identity can never decode to anything.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ComponentId(Arc<[u8]>);

impl ComponentId {
    /// Creates an identity from raw bytes.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("empty component identity"));
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// Returns the identity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; empty identities are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", hex::encode(&self.0))
    }
}

// =============================================================================
// ResourceKind
// =============================================================================

/// The class of resource an identity names.
///
/// The arena uses the kind to decide whether a backing region is needed;
/// the copy dispatcher uses (destination kind, source kind) pairs for
/// routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A fixed memory-mapped range (address + declared maximum size).
    MemoryMapped,
    /// A staged candidate firmware image buffer.
    CandidateImage,
    /// A staged candidate manifest buffer.
    CandidateManifest,
    /// A slot in the shared cache pool.
    CachePool,
    /// A numbered manifest variable.
    ManifestVariable,
    /// Decoded but not recognized by this core.
    Unsupported,
}

impl ResourceKind {
    /// Returns true if components of this kind own a backing-region record.
    pub fn needs_backing_region(self) -> bool {
        matches!(
            self,
            Self::MemoryMapped | Self::CandidateImage | Self::CandidateManifest | Self::CachePool
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MemoryMapped => "memory-mapped",
            Self::CandidateImage => "candidate-image",
            Self::CandidateManifest => "candidate-manifest",
            Self::CachePool => "cache-pool",
            Self::ManifestVariable => "manifest-variable",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

// =============================================================================
// MemRegion
// =============================================================================

/// A (device address, length) window decoded from a memory-backed identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemRegion {
    /// Device address of the first byte.
    pub address: u64,
    /// Length of the window in bytes.
    pub size: u32,
}

// =============================================================================
// IdentityDecoder
// =============================================================================

/// Black-box decoder for identity bytes.
///
/// The manifest format (CBOR component ids in practice) defines the
/// encoding; implementations translate it into the three facts the core
/// needs. All methods fail with [`Error::UnsupportedComponentId`] when
/// the bytes do not carry the requested fact.
pub trait IdentityDecoder: Send + Sync {
    /// Decodes the resource kind.
    fn decode_kind(&self, id: &ComponentId) -> Result<ResourceKind>;

    /// Decodes the declared (address, size) window of a memory-backed
    /// identity.
    fn decode_region(&self, id: &ComponentId) -> Result<MemRegion>;

    /// Decodes the numeric index of an indexed identity (manifest
    /// variables, cache-pool slots).
    fn decode_index(&self, id: &ComponentId) -> Result<u32>;
}

// =============================================================================
// CompactDecoder
// =============================================================================

/// Built-in identity codec: one kind tag byte followed by a
/// little-endian payload.
///
/// | tag  | kind               | payload                    |
/// |------|--------------------|----------------------------|
/// | 0x01 | memory-mapped      | u64 address, u32 size      |
/// | 0x02 | candidate-image    | u64 address, u32 size      |
/// | 0x03 | candidate-manifest | u64 address, u32 size      |
/// | 0x04 | cache-pool         | u32 index                  |
/// | 0x05 | manifest-variable  | u32 index                  |
///
/// Unknown tags decode to [`ResourceKind::Unsupported`] so the arena can
/// hold components this core merely tracks without understanding.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactDecoder;

const TAG_MEMORY_MAPPED: u8 = 0x01;
const TAG_CANDIDATE_IMAGE: u8 = 0x02;
const TAG_CANDIDATE_MANIFEST: u8 = 0x03;
const TAG_CACHE_POOL: u8 = 0x04;
const TAG_MANIFEST_VARIABLE: u8 = 0x05;

impl CompactDecoder {
    /// Encodes a memory-mapped identity.
    pub fn encode_memory_mapped(address: u64, size: u32) -> ComponentId {
        Self::encode_region(TAG_MEMORY_MAPPED, address, size)
    }

    /// Encodes a candidate-image identity.
    pub fn encode_candidate_image(address: u64, size: u32) -> ComponentId {
        Self::encode_region(TAG_CANDIDATE_IMAGE, address, size)
    }

    /// Encodes a candidate-manifest identity.
    pub fn encode_candidate_manifest(address: u64, size: u32) -> ComponentId {
        Self::encode_region(TAG_CANDIDATE_MANIFEST, address, size)
    }

    /// Encodes a cache-pool identity.
    pub fn encode_cache_pool(index: u32) -> ComponentId {
        Self::encode_indexed(TAG_CACHE_POOL, index)
    }

    /// Encodes a manifest-variable identity.
    pub fn encode_variable(index: u32) -> ComponentId {
        Self::encode_indexed(TAG_MANIFEST_VARIABLE, index)
    }

    fn encode_region(tag: u8, address: u64, size: u32) -> ComponentId {
        let mut bytes = Vec::with_capacity(13);
        bytes.push(tag);
        bytes.extend_from_slice(&address.to_le_bytes());
        bytes.extend_from_slice(&size.to_le_bytes());
        // Non-empty by construction; new() cannot fail here.
        ComponentId(Arc::from(bytes.as_slice()))
    }

    fn encode_indexed(tag: u8, index: u32) -> ComponentId {
        let mut bytes = Vec::with_capacity(5);
        bytes.push(tag);
        bytes.extend_from_slice(&index.to_le_bytes());
        ComponentId(Arc::from(bytes.as_slice()))
    }
}

impl IdentityDecoder for CompactDecoder {
    fn decode_kind(&self, id: &ComponentId) -> Result<ResourceKind> {
        let kind = match id.as_bytes()[0] {
            TAG_MEMORY_MAPPED => ResourceKind::MemoryMapped,
            TAG_CANDIDATE_IMAGE => ResourceKind::CandidateImage,
            TAG_CANDIDATE_MANIFEST => ResourceKind::CandidateManifest,
            TAG_CACHE_POOL => ResourceKind::CachePool,
            TAG_MANIFEST_VARIABLE => ResourceKind::ManifestVariable,
            _ => ResourceKind::Unsupported,
        };
        Ok(kind)
    }

    fn decode_region(&self, id: &ComponentId) -> Result<MemRegion> {
        let bytes = id.as_bytes();
        let tag = bytes[0];
        if !matches!(
            tag,
            TAG_MEMORY_MAPPED | TAG_CANDIDATE_IMAGE | TAG_CANDIDATE_MANIFEST
        ) {
            return Err(Error::UnsupportedComponentId(format!(
                "identity tag {tag:#04x} carries no memory region"
            )));
        }
        if bytes.len() != 13 {
            return Err(Error::UnsupportedComponentId(format!(
                "region identity has {} bytes, expected 13",
                bytes.len()
            )));
        }
        let address = u64::from_le_bytes(bytes[1..9].try_into().map_err(|_| {
            Error::UnsupportedComponentId("truncated address field".to_string())
        })?);
        let size = u32::from_le_bytes(bytes[9..13].try_into().map_err(|_| {
            Error::UnsupportedComponentId("truncated size field".to_string())
        })?);
        Ok(MemRegion { address, size })
    }

    fn decode_index(&self, id: &ComponentId) -> Result<u32> {
        let bytes = id.as_bytes();
        let tag = bytes[0];
        if !matches!(tag, TAG_CACHE_POOL | TAG_MANIFEST_VARIABLE) {
            return Err(Error::UnsupportedComponentId(format!(
                "identity tag {tag:#04x} carries no index"
            )));
        }
        if bytes.len() != 5 {
            return Err(Error::UnsupportedComponentId(format!(
                "indexed identity has {} bytes, expected 5",
                bytes.len()
            )));
        }
        Ok(u32::from_le_bytes(bytes[1..5].try_into().map_err(
            |_| Error::UnsupportedComponentId("truncated index field".to_string()),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_rejected() {
        assert_eq!(
            ComponentId::new([]),
            Err(Error::InvalidArgument("empty component identity"))
        );
    }

    #[test]
    fn identity_equality_is_byte_equality() {
        let a = ComponentId::new([1, 2, 3]).unwrap();
        let b = ComponentId::new([1, 2, 3]).unwrap();
        let c = ComponentId::new([1, 2, 4]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn region_roundtrip() {
        let id = CompactDecoder::encode_memory_mapped(0x0800_0000, 4096);
        let dec = CompactDecoder;
        assert_eq!(dec.decode_kind(&id).unwrap(), ResourceKind::MemoryMapped);
        assert_eq!(
            dec.decode_region(&id).unwrap(),
            MemRegion {
                address: 0x0800_0000,
                size: 4096
            }
        );
        assert!(dec.decode_index(&id).is_err());
    }

    #[test]
    fn variable_index_roundtrip() {
        let id = CompactDecoder::encode_variable(7);
        let dec = CompactDecoder;
        assert_eq!(
            dec.decode_kind(&id).unwrap(),
            ResourceKind::ManifestVariable
        );
        assert_eq!(dec.decode_index(&id).unwrap(), 7);
        assert!(dec.decode_region(&id).is_err());
    }

    #[test]
    fn unknown_tag_decodes_as_unsupported() {
        let id = ComponentId::new([0x7F, 0, 0]).unwrap();
        assert_eq!(
            CompactDecoder.decode_kind(&id).unwrap(),
            ResourceKind::Unsupported
        );
    }
}
