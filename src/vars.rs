//! # Manifest Variable Store
//!
//! A fixed table of numbered `u32` variables that manifests read and
//! write through the copy dispatcher — sequence counters, slot
//! selectors, staging flags. Variable ids are the numeric indices a
//! manifest-variable identity decodes to.
//!
//! ## Authorization Seam
//!
//! Whether a given manifest may touch a given variable is a platform
//! policy, absent entirely on variants that do not support it. The store
//! holds an optional [`VarAccessPolicy`]; with no policy installed every
//! authorization check degenerates to allow.

use crate::constants::MAX_MANIFEST_VARIABLES;
use crate::error::{Error, Result};
use crate::identity::ComponentId;
use std::sync::Arc;
use tracing::debug;

/// Platform policy deciding variable access per caller.
pub trait VarAccessPolicy: Send + Sync {
    /// May `caller` read variable `index`?
    fn can_read(&self, caller: &ComponentId, index: u32) -> bool;

    /// May `caller` write variable `index`?
    fn can_write(&self, caller: &ComponentId, index: u32) -> bool;
}

/// Fixed table of manifest variables.
pub struct VariableStore {
    values: Vec<u32>,
    policy: Option<Arc<dyn VarAccessPolicy>>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// Creates a store with every variable zeroed and no access policy.
    pub fn new() -> Self {
        Self {
            values: vec![0; MAX_MANIFEST_VARIABLES],
            policy: None,
        }
    }

    /// Installs the access policy. Replaces any previous policy.
    pub fn set_policy(&mut self, policy: Arc<dyn VarAccessPolicy>) {
        self.policy = Some(policy);
    }

    /// Fails with [`Error::NotFound`] if `index` is not a variable.
    pub fn ensure_exists(&self, index: u32) -> Result<()> {
        if (index as usize) < self.values.len() {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Reads variable `index`.
    pub fn read(&self, index: u32) -> Result<u32> {
        self.values
            .get(index as usize)
            .copied()
            .ok_or(Error::NotFound)
    }

    /// Writes variable `index`.
    pub fn write(&mut self, index: u32, value: u32) -> Result<()> {
        let slot = self
            .values
            .get_mut(index as usize)
            .ok_or(Error::NotFound)?;
        *slot = value;
        debug!(index, value, "manifest variable written");
        Ok(())
    }

    /// Checks read access for `caller` on variable `index`.
    pub fn authorize_read(&self, caller: &ComponentId, index: u32) -> Result<()> {
        match &self.policy {
            Some(policy) if !policy.can_read(caller, index) => {
                Err(Error::AccessDenied("variable not readable by caller"))
            }
            _ => Ok(()),
        }
    }

    /// Checks read-write access for `caller` on variable `index`.
    pub fn authorize_read_write(&self, caller: &ComponentId, index: u32) -> Result<()> {
        match &self.policy {
            Some(policy) if !(policy.can_read(caller, index) && policy.can_write(caller, index)) => {
                Err(Error::AccessDenied("variable not writable by caller"))
            }
            _ => Ok(()),
        }
    }
}
