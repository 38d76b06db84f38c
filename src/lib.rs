//! # dfucore
//!
//! **Trust-and-Storage Core for Device Firmware Update Pipelines**
//!
//! This crate is the resource/trust management layer a DFU pipeline
//! stands on: it tracks which update manifests a device trusts, stages
//! incoming update images, memoizes verification results, and streams
//! bytes from pluggable fetch sources into destination sinks. It runs on
//! the last line of defense before a device boots or flashes new
//! firmware, so every operation fails closed rather than corrupt state.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                     manifest interpreter (external)                │
//! └───────┬──────────────┬──────────────┬──────────────┬──────────────┘
//!         │              │              │              │
//! ┌───────▼──────┐ ┌─────▼──────┐ ┌─────▼──────┐ ┌─────▼──────────────┐
//! │ Component    │ │ Digest     │ │ MPI Store  │ │ Copy Dispatcher    │
//! │ Arena        │ │ Cache      │ │ role →     │ │ (dst,src) kind →   │
//! │ generational │ │ verified   │ │ class +    │ │ variables / route  │
//! │ handles      │ │ only, no   │ │ policies   │ └─────┬──────────────┘
//! │ + region pool│ │ eviction   │ └────────────┘       │
//! └──────────────┘ └────────────┘                ┌─────▼──────────────┐
//! ┌──────────────────────────────┐               │ Fetch Session Mgr  │
//! │ Update-Candidate Registry    │               │ single-flight,     │
//! │ "what to flash next",        │◄── bootloader │ provider fallback  │
//! │ erase-before-validate        │               │ → StreamSink       │
//! └──────────────────────────────┘               └────────────────────┘
//! ```
//!
//! # Fail-Closed Properties
//!
//! - **Handle freshness**: released component handles never alias a
//!   reused slot (generational arena).
//! - **No silent eviction**: a full digest cache rejects insertion; a
//!   verified-digest fact is never dropped to make room.
//! - **No stale candidate**: a rejected candidate replace leaves the
//!   registry reporting not-found, never the previous candidate.
//! - **No indefinite blocking**: every internal lock is acquired with a
//!   deadline; timeout is a hard error, not a retry.
//! - **Single-flight fetch**: one streaming session at a time, with
//!   provider fallback only before the first byte is committed.
//!
//! # Out of Scope
//!
//! Manifest parsing and command interpretation, signature and condition
//! evaluation, raw flash drivers, and concrete flash sinks live with
//! their own subsystems. This crate specifies their boundary traits
//! ([`IdentityDecoder`], [`StreamSink`], [`FetchSource`],
//! [`ComponentCopier`], [`VarAccessPolicy`]) and nothing more.
//!
//! # Example
//!
//! ```rust
//! use dfucore::{CompactDecoder, DfuPlatform, DigestAlgorithm};
//!
//! fn main() -> dfucore::Result<()> {
//!     let mut platform = DfuPlatform::new();
//!
//!     // Track a memory-mapped component referenced by a manifest.
//!     let identity = CompactDecoder::encode_memory_mapped(0x0800_0000, 0x4000);
//!     let image = platform.arena_mut().create(identity.clone())?;
//!
//!     // Memoize its verified digest for later passes.
//!     let digest = DigestAlgorithm::Sha256.compute(b"firmware image bytes");
//!     platform
//!         .digest_cache()
//!         .add(&identity, DigestAlgorithm::Sha256, &digest)?;
//!
//!     platform.release_component(image)?;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod candidate;
pub mod constants;
pub mod copy;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod mpi;
pub mod platform;
pub mod sink;
pub mod vars;

pub use arena::{ComponentArena, ComponentHandle};
pub use candidate::{CandidateRegion, CandidateRegistry};
pub use copy::{ComponentCopier, CopyDispatcher, CopyRequest, EncryptionInfo};
pub use digest::{DigestAlgorithm, DigestCache, DigestComparison};
pub use error::{Error, Result};
pub use fetch::{FetchManager, FetchSource, SessionId, StreamPusher};
pub use identity::{CompactDecoder, ComponentId, IdentityDecoder, MemRegion, ResourceKind};
pub use mpi::{
    ClassInfo, DowngradePolicy, DowngradePrevention, IndependentUpdateability,
    IndependentUpdatePolicy, ManifestRole, MpiRecord, MpiStore, SignatureCheckPolicy,
    SignatureVerification,
};
pub use platform::DfuPlatform;
pub use sink::{MemorySink, StreamSink};
pub use vars::{VarAccessPolicy, VariableStore};
