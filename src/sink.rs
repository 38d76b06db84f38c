//! # Stream Sink Capability
//!
//! A [`StreamSink`] is the destination end of every fetch or copy: RAM
//! buffers, the flash cache, raw device addresses. Concrete sinks live
//! with their drivers; this module owns only the capability contract and
//! one in-memory reference implementation.
//!
//! ## Partial Capability
//!
//! Only `write` and `release` are mandatory. `seek`, `used_storage`, and
//! `erase` are optional: the default implementations report
//! [`Error::NotSupported`], and the `supports_*` queries let dispatch
//! layers check for a capability before committing bytes to a sink that
//! cannot honor it.

use crate::error::{Error, Result};
use tracing::debug;

/// Destination abstraction receiving bytes during fetch and copy
/// operations.
///
/// Implementations must be `Send` so a fetch provider may push from a
/// different execution context than the one that opened the session.
pub trait StreamSink: Send {
    /// Appends `data` at the current write position.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Moves the write position to `offset` bytes from the start.
    ///
    /// Optional capability; the default reports not-supported.
    fn seek(&mut self, offset: u64) -> Result<()> {
        let _ = offset;
        Err(Error::NotSupported("sink has no seek capability"))
    }

    /// Returns the number of bytes committed to the sink so far.
    ///
    /// Optional capability; the default reports not-supported.
    fn used_storage(&self) -> Result<u64> {
        Err(Error::NotSupported("sink has no used-storage capability"))
    }

    /// Erases the sink's backing storage.
    ///
    /// Optional capability; the default reports not-supported.
    fn erase(&mut self) -> Result<()> {
        Err(Error::NotSupported("sink has no erase capability"))
    }

    /// Releases the sink's backing resource. Called exactly once, when
    /// the consuming operation finishes on any path.
    fn release(&mut self) -> Result<()>;

    /// True if [`seek`](Self::seek) is implemented.
    fn supports_seek(&self) -> bool {
        false
    }

    /// True if [`erase`](Self::erase) is implemented.
    fn supports_erase(&self) -> bool {
        false
    }
}

// =============================================================================
// MemorySink
// =============================================================================

/// In-memory sink implementing the full capability set.
///
/// Used by tests and by callers staging small payloads in RAM before
/// committing them elsewhere.
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Vec<u8>,
    position: usize,
    released: bool,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bytes written so far.
    pub fn contents(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the sink and returns its buffer.
    pub fn into_contents(self) -> Vec<u8> {
        self.buffer
    }

    /// True once [`StreamSink::release`] has run.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl StreamSink for MemorySink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.released {
            return Err(Error::IncorrectState {
                operation: "write",
                state: "released",
            });
        }
        let end = self.position + data.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if self.released {
            return Err(Error::IncorrectState {
                operation: "seek",
                state: "released",
            });
        }
        self.position = usize::try_from(offset)
            .map_err(|_| Error::InvalidArgument("seek offset exceeds address space"))?;
        Ok(())
    }

    fn used_storage(&self) -> Result<u64> {
        Ok(self.buffer.len() as u64)
    }

    fn erase(&mut self) -> Result<()> {
        self.buffer.clear();
        self.position = 0;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        debug!(bytes = self.buffer.len(), "memory sink released");
        self.released = true;
        Ok(())
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn supports_erase(&self) -> bool {
        true
    }
}
