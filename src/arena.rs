//! # Resource Arena
//!
//! A fixed-capacity table mapping opaque [`ComponentHandle`] values to
//! component identity, kind, and an optional backing-region record. The
//! manifest interpreter creates one handle per component referenced by a
//! manifest and releases them when processing ends.
//!
//! ## Handle Freshness
//!
//! Handles are generational: a handle embeds the slot index *and* the
//! generation the slot had when the component was created. Releasing a
//! slot bumps its generation, so a stale handle held across a
//! release/create cycle can never silently alias the new occupant — it
//! fails with `unsupported component id` like any other dead handle.
//!
//! ## Backing-Region Pool
//!
//! Memory-backed kinds (memory-mapped, candidate-image,
//! candidate-manifest, cache-pool) own one record in a small fixed pool.
//! For the memory-mapped kind the record starts at the identity-declared
//! address with **length zero**; the true payload length is only set by
//! [`ComponentArena::override_image_size`] once a fetch has determined
//! it. The visible window may shrink below the declared size, never grow
//! past it.
//!
//! ## Locking
//!
//! The arena carries no lock. All manifest-processing calls are expected
//! to run on a single execution context, and the arena is threaded
//! through `&mut` so the compiler enforces that discipline instead of
//! the caller's good manners.

use crate::constants::{MAX_COMPONENTS, MEM_REGION_POOL_SIZE};
use crate::error::{Error, Result};
use crate::identity::{ComponentId, IdentityDecoder, MemRegion, ResourceKind};
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// Handles
// =============================================================================

/// Opaque handle to one live arena slot.
///
/// Valid only against the arena that issued it, and only until the
/// component is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    index: u16,
    generation: u32,
}

// =============================================================================
// Slots
// =============================================================================

struct Slot {
    generation: u32,
    occupant: Option<Occupant>,
}

struct Occupant {
    identity: ComponentId,
    kind: ResourceKind,
    /// Opaque caller word for interpreter bookkeeping.
    impl_data: u32,
    /// Index into the backing-region pool, for memory-backed kinds.
    backing: Option<usize>,
}

/// One backing-region record: the currently visible (address, length)
/// window of a memory-backed component.
#[derive(Debug, Clone, Copy)]
struct BackingRecord {
    region: MemRegion,
}

// =============================================================================
// ComponentArena
// =============================================================================

/// Fixed-capacity generational arena of update-relevant components.
pub struct ComponentArena {
    slots: Vec<Slot>,
    pool: Vec<Option<BackingRecord>>,
    decoder: Arc<dyn IdentityDecoder>,
}

impl ComponentArena {
    /// Creates an empty arena using the given identity decoder.
    pub fn new(decoder: Arc<dyn IdentityDecoder>) -> Self {
        let slots = (0..MAX_COMPONENTS)
            .map(|_| Slot {
                generation: 0,
                occupant: None,
            })
            .collect();
        Self {
            slots,
            pool: vec![None; MEM_REGION_POOL_SIZE],
            decoder,
        }
    }

    /// Creates a component for `identity` and returns its handle.
    ///
    /// Decodes the resource kind up front; memory-backed kinds acquire a
    /// backing-region record, and the memory-mapped kind seeds it with
    /// the identity-declared address and a zero length.
    ///
    /// # Errors
    ///
    /// - [`Error::Overflow`] if the arena or the backing pool is full.
    /// - [`Error::UnsupportedComponentId`] if the identity does not decode.
    pub fn create(&mut self, identity: ComponentId) -> Result<ComponentHandle> {
        let kind = self.decoder.decode_kind(&identity)?;

        let index = self
            .slots
            .iter()
            .position(|s| s.occupant.is_none())
            .ok_or(Error::Overflow("component arena full"))?;

        let backing = if kind.needs_backing_region() {
            let region = if kind == ResourceKind::MemoryMapped {
                let declared = self.decoder.decode_region(&identity)?;
                // Visible length starts at zero until a fetch reports the
                // true payload length via override_image_size.
                MemRegion {
                    address: declared.address,
                    size: 0,
                }
            } else {
                MemRegion {
                    address: 0,
                    size: 0,
                }
            };
            Some(self.acquire_backing(region)?)
        } else {
            None
        };

        let slot = &mut self.slots[index];
        slot.occupant = Some(Occupant {
            identity,
            kind,
            impl_data: 0,
            backing,
        });

        let handle = ComponentHandle {
            index: index as u16,
            generation: slot.generation,
        };
        debug!(index, kind = %kind, "component created");
        Ok(handle)
    }

    /// Releases a component, returning its backing record to the pool.
    ///
    /// Double release is rejected: the first release bumps the slot
    /// generation, so the second resolves to a dead handle.
    pub fn release(&mut self, handle: ComponentHandle) -> Result<()> {
        let slot = self.live_slot_mut(handle)?;
        let occupant = slot
            .occupant
            .take()
            .ok_or_else(|| Error::UnsupportedComponentId("slot already free".to_string()))?;
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(pool_index) = occupant.backing {
            self.pool[pool_index] = None;
        }
        debug!(index = handle.index, "component released");
        Ok(())
    }

    /// Returns the resource kind of a live component.
    pub fn kind(&self, handle: ComponentHandle) -> Result<ResourceKind> {
        Ok(self.occupant(handle)?.kind)
    }

    /// Returns the identity of a live component.
    pub fn identity(&self, handle: ComponentHandle) -> Result<&ComponentId> {
        Ok(&self.occupant(handle)?.identity)
    }

    /// Returns the opaque caller word of a live component.
    pub fn impl_data(&self, handle: ComponentHandle) -> Result<u32> {
        Ok(self.occupant(handle)?.impl_data)
    }

    /// Sets the opaque caller word of a live component.
    pub fn set_impl_data(&mut self, handle: ComponentHandle, data: u32) -> Result<()> {
        self.occupant_mut(handle)?.impl_data = data;
        Ok(())
    }

    /// Returns the currently visible backing region of a memory-backed
    /// component.
    pub fn backing_region(&self, handle: ComponentHandle) -> Result<MemRegion> {
        let occupant = self.occupant(handle)?;
        let pool_index = occupant
            .backing
            .ok_or(Error::UnsupportedCommand("component has no backing region"))?;
        let record = self.pool[pool_index]
            .as_ref()
            .ok_or_else(|| Error::Unrecoverable("backing record vanished".to_string()))?;
        Ok(record.region)
    }

    /// Shrinks the visible window of a memory-mapped component to the
    /// true payload length.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedCommand`] for any other kind.
    /// - [`Error::OutOfBounds`] if `new_size` exceeds the size declared
    ///   in the identity. The window may never grow past the declared
    ///   memory region.
    pub fn override_image_size(&mut self, handle: ComponentHandle, new_size: u32) -> Result<()> {
        let occupant = self.occupant(handle)?;
        if occupant.kind != ResourceKind::MemoryMapped {
            return Err(Error::UnsupportedCommand(
                "size override is only defined for memory-mapped components",
            ));
        }
        let declared = self.decoder.decode_region(&occupant.identity)?;
        if new_size > declared.size {
            warn!(
                new_size,
                declared = declared.size,
                "size override beyond declared region rejected"
            );
            return Err(Error::OutOfBounds(format!(
                "override size {new_size} exceeds declared size {}",
                declared.size
            )));
        }
        let pool_index = occupant
            .backing
            .ok_or_else(|| Error::Unrecoverable("memory-mapped slot without backing".to_string()))?;
        let record = self.pool[pool_index]
            .as_mut()
            .ok_or_else(|| Error::Unrecoverable("backing record vanished".to_string()))?;
        record.region.size = new_size;
        debug!(index = handle.index, new_size, "image size overridden");
        Ok(())
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.occupant.is_some()).count()
    }

    /// True if no components are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn acquire_backing(&mut self, region: MemRegion) -> Result<usize> {
        let index = self
            .pool
            .iter()
            .position(|r| r.is_none())
            .ok_or(Error::Overflow("backing-region pool exhausted"))?;
        self.pool[index] = Some(BackingRecord { region });
        Ok(index)
    }

    fn live_slot_mut(&mut self, handle: ComponentHandle) -> Result<&mut Slot> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or_else(|| Error::UnsupportedComponentId("handle index out of range".to_string()))?;
        if slot.generation != handle.generation || slot.occupant.is_none() {
            return Err(Error::UnsupportedComponentId(
                "stale or released handle".to_string(),
            ));
        }
        Ok(slot)
    }

    fn occupant(&self, handle: ComponentHandle) -> Result<&Occupant> {
        let slot = self
            .slots
            .get(handle.index as usize)
            .ok_or_else(|| Error::UnsupportedComponentId("handle index out of range".to_string()))?;
        if slot.generation != handle.generation {
            return Err(Error::UnsupportedComponentId(
                "stale or released handle".to_string(),
            ));
        }
        slot.occupant
            .as_ref()
            .ok_or_else(|| Error::UnsupportedComponentId("released handle".to_string()))
    }

    fn occupant_mut(&mut self, handle: ComponentHandle) -> Result<&mut Occupant> {
        let slot = self.live_slot_mut(handle)?;
        slot.occupant
            .as_mut()
            .ok_or_else(|| Error::UnsupportedComponentId("released handle".to_string()))
    }
}
