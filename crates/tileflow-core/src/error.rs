//! Error types for tiled linear-algebra operations
//!
//! Provides a unified error type for all tileflow crates. Every detectable
//! failure is reported before any worker thread is engaged, so a returned
//! error always means the caller's output operand is untouched.

use thiserror::Error;

/// Status code of a successful call
pub const SUCCESS: i32 = 0;
/// Status code of a call made on an engine whose pool no longer exists
pub const NOT_INITIALIZED: i32 = -101;
/// Status code of a failed scratch allocation or thread spawn
pub const OUT_OF_RESOURCES: i32 = -102;
/// Status code of an invalid engine configuration
pub const INVALID_CONFIG: i32 = -103;
/// Status code of an internal shape or bounds mismatch
pub const SHAPE_MISMATCH: i32 = -104;
/// Status code of any other failure
pub const OTHER: i32 = -105;

/// Core error type for tiled operations
#[derive(Error, Debug)]
pub enum Error {
    /// A driver argument violated its precondition
    ///
    /// `position` is the 1-based index of the argument in the driver's
    /// parameter list and determines the classic `-position` status code.
    #[error("Illegal value of argument {position} ({name}): {reason}")]
    IllegalArgument {
        position: usize,
        name: &'static str,
        reason: String,
    },

    /// The worker pool or its buffers do not exist
    #[error("Engine not initialized: {0}")]
    NotInitialized(String),

    /// Scratch allocation or thread creation failed
    #[error("Out of resources: could not provide {requested} elements for {what}")]
    OutOfResources { what: &'static str, requested: usize },

    /// Engine configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A descriptor or view did not fit the storage it refers to
    #[error("Shape error: {0}")]
    Shape(String),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an illegal-argument error
    pub fn illegal(position: usize, name: &'static str, reason: impl Into<String>) -> Self {
        Self::IllegalArgument {
            position,
            name,
            reason: reason.into(),
        }
    }

    /// Create an allocation failure error
    pub fn out_of_resources(what: &'static str, requested: usize) -> Self {
        Self::OutOfResources { what, requested }
    }

    /// Create an error for a storage region that is too small
    pub fn too_small(what: &str, required: usize, actual: usize) -> Self {
        Self::Shape(format!(
            "{what} holds {actual} elements but {required} are required"
        ))
    }

    /// Integer status code in the classic tiled-LAPACK convention
    pub fn status_code(&self) -> i32 {
        match self {
            Self::IllegalArgument { position, .. } => -(*position as i32),
            Self::NotInitialized(_) => NOT_INITIALIZED,
            Self::OutOfResources { .. } => OUT_OF_RESOURCES,
            Self::InvalidConfig(_) => INVALID_CONFIG,
            Self::Shape(_) => SHAPE_MISMATCH,
            Self::Other(_) => OTHER,
        }
    }

    /// Whether this error reports a violated argument precondition
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, Self::IllegalArgument { .. })
    }
}

/// Status code of a driver result
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(err) => err.status_code(),
    }
}
