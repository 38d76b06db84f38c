//! # DFU Platform Context
//!
//! [`DfuPlatform`] owns every table in the trust-and-storage core: the
//! component arena, the verified-digest cache, the MPI store, the
//! update-candidate registry, the fetch session manager, the manifest
//! variable store, and the copy routes. There is no global state —
//! construct as many independent platforms as you like, which is
//! exactly what the tests do.
//!
//! The manifest interpreter drives one platform instance from a single
//! execution context. The only members that synchronize internally (the
//! digest cache and the fetch session) are the ones external contexts
//! may touch concurrently through provider pushes; everything else is
//! `&mut`-threaded and single-writer by construction.

use crate::arena::{ComponentArena, ComponentHandle};
use crate::candidate::CandidateRegistry;
use crate::copy::{ComponentCopier, CopyDispatcher, EncryptionInfo};
use crate::digest::DigestCache;
use crate::error::Result;
use crate::fetch::{FetchManager, FetchSource};
use crate::identity::{CompactDecoder, ComponentId, IdentityDecoder, ResourceKind};
use crate::mpi::MpiStore;
use crate::sink::StreamSink;
use crate::vars::{VarAccessPolicy, VariableStore};
use std::sync::Arc;

/// The trust-and-storage core of one DFU pipeline.
pub struct DfuPlatform {
    arena: ComponentArena,
    digest_cache: DigestCache,
    mpi: MpiStore,
    candidates: CandidateRegistry,
    fetch: FetchManager,
    vars: VariableStore,
    copy: CopyDispatcher,
}

impl Default for DfuPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl DfuPlatform {
    /// Creates a platform using the built-in compact identity codec.
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(CompactDecoder))
    }

    /// Creates a platform with a custom identity decoder.
    pub fn with_decoder(decoder: Arc<dyn IdentityDecoder>) -> Self {
        Self {
            arena: ComponentArena::new(decoder.clone()),
            digest_cache: DigestCache::new(),
            mpi: MpiStore::new(),
            candidates: CandidateRegistry::new(),
            fetch: FetchManager::new(),
            vars: VariableStore::new(),
            copy: CopyDispatcher::new(decoder),
        }
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    /// Creates a component from raw identity bytes.
    pub fn create_component(&mut self, identity: impl AsRef<[u8]>) -> Result<ComponentHandle> {
        self.arena.create(ComponentId::new(identity)?)
    }

    /// Releases a component handle.
    pub fn release_component(&mut self, handle: ComponentHandle) -> Result<()> {
        self.arena.release(handle)
    }

    /// The component arena.
    pub fn arena(&self) -> &ComponentArena {
        &self.arena
    }

    /// The component arena, mutably.
    pub fn arena_mut(&mut self) -> &mut ComponentArena {
        &mut self.arena
    }

    // -------------------------------------------------------------------------
    // Digest Cache
    // -------------------------------------------------------------------------

    /// The verified-digest cache.
    pub fn digest_cache(&self) -> &DigestCache {
        &self.digest_cache
    }

    /// Removes the cached digest of the component behind `handle`.
    ///
    /// Spans the arena and the cache: the handle resolves to its
    /// identity, which keys the cache entry.
    pub fn remove_digest_by_handle(&self, handle: ComponentHandle) -> Result<()> {
        let identity = self.arena.identity(handle)?.clone();
        self.digest_cache.remove(&identity)
    }

    // -------------------------------------------------------------------------
    // MPI Store
    // -------------------------------------------------------------------------

    /// The MPI store.
    pub fn mpi(&self) -> &MpiStore {
        &self.mpi
    }

    /// The MPI store, mutably (startup loading).
    pub fn mpi_mut(&mut self) -> &mut MpiStore {
        &mut self.mpi
    }

    // -------------------------------------------------------------------------
    // Update Candidate
    // -------------------------------------------------------------------------

    /// The update-candidate registry.
    pub fn candidates(&self) -> &CandidateRegistry {
        &self.candidates
    }

    /// The update-candidate registry, mutably.
    pub fn candidates_mut(&mut self) -> &mut CandidateRegistry {
        &mut self.candidates
    }

    // -------------------------------------------------------------------------
    // Fetch
    // -------------------------------------------------------------------------

    /// Registers a fetch-source provider.
    pub fn register_fetch_source(&mut self, provider: Arc<dyn FetchSource>) -> Result<()> {
        self.fetch.register(provider)
    }

    /// Streams `uri` into `sink` through the registered providers.
    pub fn stream(&self, uri: &str, sink: Box<dyn StreamSink>) -> Result<()> {
        self.fetch.stream(uri, sink)
    }

    /// The fetch session manager, for providers that push directly.
    pub fn fetch(&self) -> &FetchManager {
        &self.fetch
    }

    // -------------------------------------------------------------------------
    // Variables & Copy
    // -------------------------------------------------------------------------

    /// Installs the variable access policy.
    pub fn set_var_policy(&mut self, policy: Arc<dyn VarAccessPolicy>) {
        self.vars.set_policy(policy);
    }

    /// The manifest variable store.
    pub fn vars(&self) -> &VariableStore {
        &self.vars
    }

    /// The manifest variable store, mutably.
    pub fn vars_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }

    /// Registers a domain copier for one (destination, source) kind pair.
    pub fn register_copier(
        &mut self,
        dst_kind: ResourceKind,
        src_kind: ResourceKind,
        copier: Arc<dyn ComponentCopier>,
    ) -> Result<()> {
        self.copy.register(dst_kind, src_kind, copier)
    }

    /// Validates a copy between two components without mutating state.
    pub fn copy_check(
        &self,
        dst: ComponentHandle,
        src: ComponentHandle,
        caller: &ComponentId,
        encryption: Option<&EncryptionInfo>,
    ) -> Result<()> {
        self.copy
            .check(&self.arena, &self.vars, dst, src, caller, encryption)
    }

    /// Performs a copy between two components.
    pub fn copy(
        &mut self,
        dst: ComponentHandle,
        src: ComponentHandle,
        caller: &ComponentId,
        encryption: Option<&EncryptionInfo>,
    ) -> Result<()> {
        self.copy
            .copy(&self.arena, &mut self.vars, dst, src, caller, encryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platforms_are_independent() {
        let mut a = DfuPlatform::new();
        let b = DfuPlatform::new();

        let id = CompactDecoder::encode_variable(0);
        a.arena_mut().create(id).unwrap();
        assert_eq!(a.arena().len(), 1);
        assert_eq!(b.arena().len(), 0);
    }
}
