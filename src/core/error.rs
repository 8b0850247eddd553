//! Error types for kernel computation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Binding failed: {0}")]
    Binding(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid matrix shape: {0}")]
    Shape(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Kernel is not bound to features")]
    NotBound,

    #[error("No kernel set")]
    NoKernel,

    #[error("Unsupported init data format version: expected {expected}, found {found}")]
    FormatVersion { expected: u32, found: u32 },

    #[error("Init data belongs to kernel {found}, expected {expected}")]
    KernelMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
