//! # Fetch Session Manager
//!
//! Coordinates one in-flight streaming session between a registered
//! [`FetchSource`] provider and a caller-supplied [`StreamSink`].
//!
//! ## Single Flight
//!
//! Exactly one session may be open at a time. This is a deliberate
//! simplicity/safety trade-off: the DFU pipeline stages one payload at a
//! time, and a second concurrent writer into device storage is a
//! corruption hazard, not a throughput feature.
//!
//! ## Provider Fallback Boundary
//!
//! [`FetchManager::stream`] tries providers in registration order. A
//! provider error is retryable only while the session is still
//! `PendingFirstResponse` — no bytes committed, safe to ask the next
//! provider. Once any push has advanced the session to `InProgress`, a
//! provider error aborts the stream: trying another provider would
//! duplicate or corrupt bytes already in the sink.
//!
//! ## Stale Completions
//!
//! Session ids are monotonically increasing, never zero, and skip zero
//! on wraparound. A push carrying the id of an already-closed session
//! misses the id match and is rejected with not-found; that mismatch is
//! the only cancellation-safety mechanism, and it is sufficient because
//! ids are not reused.

use crate::constants::{MAX_FETCH_SOURCES, SESSION_LOCK_TIMEOUT};
use crate::error::{Error, Result};
use crate::sink::StreamSink;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Session Identity
// =============================================================================

/// Identifier correlating asynchronous pushes with one open session.
///
/// Never zero; never reused until the u32 counter wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u32);

impl SessionId {
    /// Raw counter value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Provider Interface
// =============================================================================

/// Narrow push surface handed to providers while they serve a request.
pub trait StreamPusher: Sync {
    /// Forwards a chunk to the open session's sink.
    fn push_data(&self, session: SessionId, data: &[u8]) -> Result<()>;

    /// Forwards a seek to the open session's sink.
    fn push_seek(&self, session: SessionId, offset: u64) -> Result<()>;
}

/// External, pluggable provider capable of retrieving bytes for a URI.
///
/// `request` is synchronous from the manager's point of view: the
/// provider either serves the payload (pushing zero or more chunks
/// through `pusher`, possibly from another execution context) and
/// returns success, or returns an error. An error before the first push
/// means "I cannot serve this URI" and the manager falls back to the
/// next provider.
pub trait FetchSource: Send + Sync {
    /// Serves `uri` into the session identified by `session`.
    fn request(&self, uri: &str, session: SessionId, pusher: &dyn StreamPusher) -> Result<()>;
}

// =============================================================================
// Session State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStage {
    PendingFirstResponse,
    InProgress,
}

struct OpenSession {
    id: SessionId,
    stage: SessionStage,
    sink: Box<dyn StreamSink>,
}

struct SessionState {
    open: Option<OpenSession>,
    last_id: u32,
}

// =============================================================================
// FetchManager
// =============================================================================

/// Provider registry plus the singleton streaming session.
pub struct FetchManager {
    providers: Vec<Arc<dyn FetchSource>>,
    state: Mutex<SessionState>,
}

impl Default for FetchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchManager {
    /// Creates a manager with no providers registered.
    pub fn new() -> Self {
        Self {
            providers: Vec::with_capacity(MAX_FETCH_SOURCES),
            state: Mutex::new(SessionState {
                open: None,
                last_id: 0,
            }),
        }
    }

    /// Registers a fetch-source provider. Providers are consulted in
    /// registration order.
    pub fn register(&mut self, provider: Arc<dyn FetchSource>) -> Result<()> {
        if self.providers.len() >= MAX_FETCH_SOURCES {
            return Err(Error::Overflow("fetch source table full"));
        }
        self.providers.push(provider);
        debug!(count = self.providers.len(), "fetch source registered");
        Ok(())
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Streams `uri` into `sink`.
    ///
    /// Opens the singleton session, then asks each provider in turn to
    /// serve the URI. The sink is moved into the manager and its
    /// `release` capability is invoked exactly once on every path,
    /// including rejected opens.
    ///
    /// # Errors
    ///
    /// - [`Error::IncorrectState`] if a session is already open, or if a
    ///   provider failed after bytes were committed.
    /// - [`Error::Unrecoverable`] if every provider declined.
    /// - [`Error::InvalidArgument`] for an empty URI.
    /// - [`Error::LockTimeout`] if session state cannot be locked in time.
    pub fn stream(&self, uri: &str, mut sink: Box<dyn StreamSink>) -> Result<()> {
        if uri.is_empty() {
            let _ = sink.release();
            return Err(Error::InvalidArgument("empty fetch uri"));
        }

        let session_id = {
            let mut state = match self.lock() {
                Ok(state) => state,
                Err(err) => {
                    let _ = sink.release();
                    return Err(err);
                }
            };
            if state.open.is_some() {
                drop(state);
                let _ = sink.release();
                warn!(uri, "fetch rejected, session already open");
                return Err(Error::IncorrectState {
                    operation: "stream",
                    state: "a fetch session is already open",
                });
            }
            let id = Self::next_id(&mut state);
            state.open = Some(OpenSession {
                id,
                stage: SessionStage::PendingFirstResponse,
                sink,
            });
            id
        };
        info!(uri, session = %session_id, "fetch session opened");

        for provider in &self.providers {
            let outcome = provider.request(uri, session_id, self);

            let mut state = self.lock()?;
            match outcome {
                Ok(()) => {
                    let release = Self::close_locked(&mut state);
                    info!(session = %session_id, "fetch session completed");
                    return release;
                }
                Err(err) => {
                    let stage = state
                        .open
                        .as_ref()
                        .map(|s| s.stage)
                        .unwrap_or(SessionStage::PendingFirstResponse);
                    if stage == SessionStage::InProgress {
                        // Bytes are already committed to the sink; another
                        // provider would duplicate or corrupt them.
                        let _ = Self::close_locked(&mut state);
                        warn!(session = %session_id, %err, "provider failed mid-stream");
                        return Err(Error::IncorrectState {
                            operation: "stream",
                            state: "provider failed after data was committed",
                        });
                    }
                    debug!(session = %session_id, %err, "provider declined, trying next");
                }
            }
        }

        let mut state = self.lock()?;
        let _ = Self::close_locked(&mut state);
        warn!(uri, "no fetch source could serve uri");
        Err(Error::Unrecoverable(format!(
            "no fetch source could serve {uri}"
        )))
    }

    fn next_id(state: &mut SessionState) -> SessionId {
        state.last_id = match state.last_id {
            u32::MAX => 1,
            n => n + 1,
        };
        SessionId(state.last_id)
    }

    /// Closes the open session and releases its sink.
    fn close_locked(state: &mut SessionState) -> Result<()> {
        match state.open.take() {
            Some(mut session) => session.sink.release(),
            None => Ok(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state
            .try_lock_for(SESSION_LOCK_TIMEOUT)
            .ok_or(Error::LockTimeout("fetch session"))
    }

    /// Runs `op` against the open session's sink if `session` matches.
    fn with_session<T>(
        &self,
        session: SessionId,
        op: impl FnOnce(&mut OpenSession) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock()?;
        let open = match state.open.as_mut() {
            Some(open) if open.id == session => open,
            _ => {
                debug!(session = %session, "push for unknown or closed session");
                return Err(Error::NotFound);
            }
        };
        // The sink call runs under the session lock; bounded by the
        // sink's own non-blocking contract, and only one session exists.
        op(open)
    }
}

impl StreamPusher for FetchManager {
    fn push_data(&self, session: SessionId, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("empty data push"));
        }
        self.with_session(session, |open| {
            // The first chunk commits the session to this provider; a
            // later provider error is no longer retryable.
            open.stage = SessionStage::InProgress;
            open.sink.write(data)
        })
    }

    fn push_seek(&self, session: SessionId, offset: u64) -> Result<()> {
        self.with_session(session, |open| {
            if !open.sink.supports_seek() {
                // Capability absent: report it without committing the
                // session to this provider.
                return Err(Error::NotSupported("sink has no seek capability"));
            }
            open.stage = SessionStage::InProgress;
            open.sink.seek(offset)
        })
    }
}
