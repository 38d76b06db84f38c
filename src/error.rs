//! Error types for the DFU trust-and-storage core.

/// Result type alias for DFU core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the DFU trust-and-storage core.
///
/// Every fallible operation in this crate reports one of these kinds;
/// nothing panics on the non-test path. The manifest interpreter driving
/// this core decides whether a given kind aborts the whole update.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Argument Errors
    // =========================================================================
    /// Null, empty, or zero-length input where content is required.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Handle or identity does not decode or resolve to a live component.
    #[error("unsupported component id: {0}")]
    UnsupportedComponentId(String),

    /// Semantically invalid parameter combination.
    #[error("unsupported parameter: {0}")]
    UnsupportedParameter(&'static str),

    /// The component kinds are valid but the operation is not defined for them.
    #[error("unsupported command: {0}")]
    UnsupportedCommand(&'static str),

    // =========================================================================
    // Capacity Errors
    // =========================================================================
    /// A fixed-capacity table is full.
    #[error("no resources: {0}")]
    Overflow(&'static str),

    /// Caller-supplied output buffer is smaller than the result.
    #[error("buffer too small: need {needed}, got {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    // =========================================================================
    // Table State Errors
    // =========================================================================
    /// Duplicate role or class registration.
    #[error("already exists: {0}")]
    AlreadyExists(&'static str),

    /// Validation failure on provisioned or persisted data.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// Absent entry, including "erased, never provisioned".
    #[error("not found")]
    NotFound,

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Operation attempted from the wrong state.
    #[error("incorrect state for {operation}: {state}")]
    IncorrectState {
        operation: &'static str,
        state: &'static str,
    },

    /// A capability the operation needs is absent on this sink or variant.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// The caller is not authorized for the requested variable access.
    #[error("access denied: {0}")]
    AccessDenied(&'static str),

    // =========================================================================
    // Unrecoverable Errors
    // =========================================================================
    /// Bounded lock acquisition timed out. The caller must fail the update
    /// rather than retry; this core never blocks indefinitely on the boot path.
    #[error("lock timeout on {0}")]
    LockTimeout(&'static str),

    /// All fallback options exhausted or an invariant the core cannot
    /// recover from was violated.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),
}

impl Error {
    /// Returns true if the error indicates a full fixed-capacity table.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Overflow(_) | Self::BufferTooSmall { .. })
    }
}
