//! # Copy Dispatcher
//!
//! Resolves a (destination kind, source kind) pair into one of three
//! outcomes: a manifest-variable value transfer, delegation to a
//! registered domain-specific [`ComponentCopier`], or rejection.
//!
//! `check` performs every validation `copy` does — kind pairing,
//! encryption-info rules, variable existence, caller authorization —
//! without mutating anything, so the manifest interpreter can dry-run a
//! command sequence before committing it.

use crate::arena::{ComponentArena, ComponentHandle};
use crate::constants::MAX_COPY_ROUTES;
use crate::error::{Error, Result};
use crate::identity::{ComponentId, IdentityDecoder, MemRegion, ResourceKind};
use crate::vars::VariableStore;
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// Encryption Envelope
// =============================================================================

/// Opaque encryption parameters passed through to domain copiers.
///
/// This core never interprets the contents; it only enforces where the
/// envelope may appear (never on a manifest-variable transfer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo(Vec<u8>);

impl EncryptionInfo {
    /// Wraps raw encryption parameters.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw parameter bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// Domain Copier Interface
// =============================================================================

/// Everything a domain copier sees about one copy request.
pub struct CopyRequest<'a> {
    pub dst: ComponentHandle,
    pub src: ComponentHandle,
    /// Visible backing window of the destination, when it has one.
    pub dst_region: Option<MemRegion>,
    /// Visible backing window of the source, when it has one.
    pub src_region: Option<MemRegion>,
    pub caller: &'a ComponentId,
    pub encryption: Option<&'a EncryptionInfo>,
}

/// Domain-specific copy implementation for one (dst, src) kind pair.
///
/// Registered by the platform integration; external collaborators from
/// this core's point of view.
pub trait ComponentCopier: Send + Sync {
    /// Validates the request without side effects.
    fn check(&self, request: &CopyRequest<'_>) -> Result<()>;

    /// Performs the transfer.
    fn copy(&self, request: &CopyRequest<'_>) -> Result<()>;
}

// =============================================================================
// CopyDispatcher
// =============================================================================

struct Route {
    dst_kind: ResourceKind,
    src_kind: ResourceKind,
    copier: Arc<dyn ComponentCopier>,
}

/// Type-dispatching copy between components.
pub struct CopyDispatcher {
    routes: Vec<Route>,
    decoder: Arc<dyn IdentityDecoder>,
}

impl CopyDispatcher {
    /// Creates a dispatcher with no routes registered.
    pub fn new(decoder: Arc<dyn IdentityDecoder>) -> Self {
        Self {
            routes: Vec::with_capacity(MAX_COPY_ROUTES),
            decoder,
        }
    }

    /// Registers a copier for one (destination kind, source kind) pair.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyExists`] for a duplicate pair.
    /// - [`Error::Overflow`] when the route table is full.
    /// - [`Error::UnsupportedParameter`] for manifest-variable kinds;
    ///   variable transfers are built in and not routable.
    pub fn register(
        &mut self,
        dst_kind: ResourceKind,
        src_kind: ResourceKind,
        copier: Arc<dyn ComponentCopier>,
    ) -> Result<()> {
        if dst_kind == ResourceKind::ManifestVariable || src_kind == ResourceKind::ManifestVariable
        {
            return Err(Error::UnsupportedParameter(
                "variable transfers are not routable",
            ));
        }
        if self
            .routes
            .iter()
            .any(|r| r.dst_kind == dst_kind && r.src_kind == src_kind)
        {
            return Err(Error::AlreadyExists("copy route already registered"));
        }
        if self.routes.len() >= MAX_COPY_ROUTES {
            return Err(Error::Overflow("copy route table full"));
        }
        debug!(dst = %dst_kind, src = %src_kind, "copy route registered");
        self.routes.push(Route {
            dst_kind,
            src_kind,
            copier,
        });
        Ok(())
    }

    /// Validates a copy without mutating any state.
    pub fn check(
        &self,
        arena: &ComponentArena,
        vars: &VariableStore,
        dst: ComponentHandle,
        src: ComponentHandle,
        caller: &ComponentId,
        encryption: Option<&EncryptionInfo>,
    ) -> Result<()> {
        match self.classify(arena, dst, src)? {
            Plan::Variables { dst_index, src_index } => {
                self.check_variables(vars, caller, dst_index, src_index, encryption)
            }
            Plan::Route(route) => {
                let request = self.request(arena, dst, src, caller, encryption)?;
                route.copier.check(&request)
            }
        }
    }

    /// Validates and performs a copy.
    pub fn copy(
        &self,
        arena: &ComponentArena,
        vars: &mut VariableStore,
        dst: ComponentHandle,
        src: ComponentHandle,
        caller: &ComponentId,
        encryption: Option<&EncryptionInfo>,
    ) -> Result<()> {
        match self.classify(arena, dst, src)? {
            Plan::Variables { dst_index, src_index } => {
                self.check_variables(vars, caller, dst_index, src_index, encryption)?;
                let value = vars.read(src_index)?;
                vars.write(dst_index, value)?;
                debug!(src_index, dst_index, "manifest variable transferred");
                Ok(())
            }
            Plan::Route(route) => {
                let request = self.request(arena, dst, src, caller, encryption)?;
                route.copier.check(&request)?;
                route.copier.copy(&request)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn classify(
        &self,
        arena: &ComponentArena,
        dst: ComponentHandle,
        src: ComponentHandle,
    ) -> Result<Plan<'_>> {
        let dst_kind = arena.kind(dst)?;
        let src_kind = arena.kind(src)?;

        let dst_is_var = dst_kind == ResourceKind::ManifestVariable;
        let src_is_var = src_kind == ResourceKind::ManifestVariable;

        if dst_is_var || src_is_var {
            if dst_is_var != src_is_var {
                warn!(dst = %dst_kind, src = %src_kind, "copy mixes variable and non-variable kinds");
                return Err(Error::UnsupportedParameter(
                    "manifest variables only transfer to manifest variables",
                ));
            }
            let dst_index = self.decoder.decode_index(arena.identity(dst)?)?;
            let src_index = self.decoder.decode_index(arena.identity(src)?)?;
            return Ok(Plan::Variables {
                dst_index,
                src_index,
            });
        }

        match self
            .routes
            .iter()
            .find(|r| r.dst_kind == dst_kind && r.src_kind == src_kind)
        {
            Some(route) => Ok(Plan::Route(route)),
            None => {
                warn!(dst = %dst_kind, src = %src_kind, "no copy route for kind pair");
                Err(Error::UnsupportedComponentId(format!(
                    "no copy defined from {src_kind} to {dst_kind}"
                )))
            }
        }
    }

    fn check_variables(
        &self,
        vars: &VariableStore,
        caller: &ComponentId,
        dst_index: u32,
        src_index: u32,
        encryption: Option<&EncryptionInfo>,
    ) -> Result<()> {
        if encryption.is_some() {
            return Err(Error::UnsupportedParameter(
                "encryption info not applicable to variable transfers",
            ));
        }
        vars.ensure_exists(dst_index)?;
        vars.authorize_read_write(caller, dst_index)?;
        vars.ensure_exists(src_index)?;
        vars.authorize_read(caller, src_index)?;
        Ok(())
    }

    fn request<'a>(
        &self,
        arena: &ComponentArena,
        dst: ComponentHandle,
        src: ComponentHandle,
        caller: &'a ComponentId,
        encryption: Option<&'a EncryptionInfo>,
    ) -> Result<CopyRequest<'a>> {
        Ok(CopyRequest {
            dst,
            src,
            dst_region: arena.backing_region(dst).ok(),
            src_region: arena.backing_region(src).ok(),
            caller,
            encryption,
        })
    }
}

enum Plan<'a> {
    Variables { dst_index: u32, src_index: u32 },
    Route(&'a Route),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CompactDecoder;

    fn fixture() -> (ComponentArena, VariableStore, CopyDispatcher) {
        let decoder: Arc<dyn IdentityDecoder> = Arc::new(CompactDecoder);
        (
            ComponentArena::new(decoder.clone()),
            VariableStore::new(),
            CopyDispatcher::new(decoder),
        )
    }

    fn caller() -> ComponentId {
        ComponentId::new([0xC0]).unwrap()
    }

    #[test]
    fn variable_routes_cannot_be_registered() {
        let (_, _, mut dispatcher) = fixture();
        struct Nop;
        impl ComponentCopier for Nop {
            fn check(&self, _request: &CopyRequest<'_>) -> Result<()> {
                Ok(())
            }
            fn copy(&self, _request: &CopyRequest<'_>) -> Result<()> {
                Ok(())
            }
        }
        assert_eq!(
            dispatcher.register(
                ResourceKind::ManifestVariable,
                ResourceKind::MemoryMapped,
                Arc::new(Nop)
            ),
            Err(Error::UnsupportedParameter(
                "variable transfers are not routable"
            ))
        );
    }

    #[test]
    fn mixed_variable_copy_is_rejected() {
        let (mut arena, vars, dispatcher) = fixture();
        let var = arena.create(CompactDecoder::encode_variable(1)).unwrap();
        let mem = arena
            .create(CompactDecoder::encode_memory_mapped(0x1000, 64))
            .unwrap();
        assert!(matches!(
            dispatcher.check(&arena, &vars, var, mem, &caller(), None),
            Err(Error::UnsupportedParameter(_))
        ));
    }

    #[test]
    fn variable_transfer_moves_the_value() {
        let (mut arena, mut vars, dispatcher) = fixture();
        let dst = arena.create(CompactDecoder::encode_variable(0)).unwrap();
        let src = arena.create(CompactDecoder::encode_variable(1)).unwrap();
        vars.write(1, 77).unwrap();

        dispatcher
            .copy(&arena, &mut vars, dst, src, &caller(), None)
            .unwrap();
        assert_eq!(vars.read(0).unwrap(), 77);
    }

    #[test]
    fn encryption_info_is_rejected_for_variables() {
        let (mut arena, vars, dispatcher) = fixture();
        let dst = arena.create(CompactDecoder::encode_variable(0)).unwrap();
        let src = arena.create(CompactDecoder::encode_variable(1)).unwrap();
        let enc = EncryptionInfo::new(vec![1, 2, 3]);
        assert!(matches!(
            dispatcher.check(&arena, &vars, dst, src, &caller(), Some(&enc)),
            Err(Error::UnsupportedParameter(_))
        ));
    }

    #[test]
    fn unrecognized_pair_is_unsupported_component_id() {
        let (mut arena, vars, dispatcher) = fixture();
        let dst = arena
            .create(CompactDecoder::encode_memory_mapped(0x1000, 64))
            .unwrap();
        let src = arena
            .create(CompactDecoder::encode_candidate_image(0x2000, 64))
            .unwrap();
        assert!(matches!(
            dispatcher.check(&arena, &vars, dst, src, &caller(), None),
            Err(Error::UnsupportedComponentId(_))
        ));
    }
}
