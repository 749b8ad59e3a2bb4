//! Error kinds for the GenSVM core, one variant per §7 of the design.

use thiserror::Error;

/// All fallible outcomes the core can produce.
///
/// Numerical-soft conditions (Cholesky-of-majorant failure) are not
/// represented here: they are logged and handled in place by falling back
/// to a symmetric-indefinite solve, per the design's error-handling table.
#[derive(Error, Debug)]
pub enum GenSvmError {
    #[error("input format error at {location}: {message}")]
    InputFormat { location: String, message: String },

    #[error("configuration conflict: {message} (ignoring extra parameter)")]
    ConfigConflict { message: String },

    #[error("allocation failure requesting {bytes} bytes at {site}")]
    Allocation { bytes: usize, site: String },

    #[error("kernel matrix is not positive definite for kerneltype {kernel} with the given parameters")]
    KernelNotPositiveDefinite { kernel: String },

    #[error("linear system solve failed: {message}")]
    SolveFailed { message: String },

    #[error("operation cancelled by user interrupt")]
    Cancelled,

    #[error("invalid hyperparameter {name}: {message}")]
    InvalidHyperparameter { name: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GenSvmError>;
