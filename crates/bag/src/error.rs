//! Error types for BAG datasets.

use thiserror::Error;

/// Errors that can occur while working with a BAG dataset.
///
/// Every variant carries a stable numeric code (see [`BagError::code`]) that
/// is what callers at the API/CLI boundary actually see.
#[derive(Error, Debug)]
pub enum BagError {
    /// A layer or container path is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A layer of this type is already registered.
    #[error("layer already exists: {0}")]
    AlreadyExists(String),

    /// The requested region exceeds the grid shape or is inverted.
    #[error("requested region {requested} is outside grid bounds {grid}")]
    OutOfBounds { requested: String, grid: String },

    /// A write was issued without any data.
    #[error("no buffer supplied")]
    NullBuffer,

    /// The operation is not supported by this layer variant.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The handle refers to a closed or never-opened dataset.
    #[error("invalid dataset handle: {0}")]
    InvalidHandle(String),

    /// Failure reported by the underlying container.
    #[error("container error: {0}")]
    ContainerIo(String),

    /// Metadata-declared shape disagrees with the physical elevation shape.
    #[error("metadata mismatch: {0}")]
    MetadataMismatch(String),

    /// Metadata could not be parsed or failed validation.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Mutation attempted on a dataset opened read-only.
    #[error("dataset is read-only: {0}")]
    ReadOnly(String),

    /// Caller-supplied buffer has the wrong length.
    #[error("buffer holds {actual} bytes, {expected} required")]
    BufferSize { expected: usize, actual: usize },

    /// Tracking list index past the end.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

impl BagError {
    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl Into<String>, grid: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            grid: grid.into(),
        }
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a ContainerIo error.
    pub fn container(msg: impl Into<String>) -> Self {
        Self::ContainerIo(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Numeric code reported at the API boundary. Zero is reserved for success.
    pub fn code(&self) -> u32 {
        match self {
            Self::NotFound(_) => 1,
            Self::AlreadyExists(_) => 2,
            Self::OutOfBounds { .. } => 3,
            Self::NullBuffer => 4,
            Self::Unsupported(_) => 5,
            Self::InvalidHandle(_) => 6,
            Self::ContainerIo(_) => 7,
            Self::MetadataMismatch(_) => 8,
            Self::InvalidMetadata(_) => 9,
            Self::ReadOnly(_) => 10,
            Self::BufferSize { .. } => 11,
            Self::IndexOutOfRange { .. } => 12,
        }
    }
}

/// Static description for a numeric error code.
pub fn error_string(code: u32) -> &'static str {
    match code {
        0 => "success",
        1 => "layer or path not found",
        2 => "layer already exists",
        3 => "region outside grid bounds",
        4 => "no buffer supplied",
        5 => "operation not supported by this layer",
        6 => "invalid dataset handle",
        7 => "container I/O failure",
        8 => "metadata disagrees with physical grid shape",
        9 => "invalid metadata",
        10 => "dataset is read-only",
        11 => "buffer has the wrong size",
        12 => "index out of range",
        _ => "unknown error code",
    }
}

impl From<std::io::Error> for BagError {
    fn from(err: std::io::Error) -> Self {
        Self::ContainerIo(err.to_string())
    }
}

impl From<serde_json::Error> for BagError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<quick_xml::Error> for BagError {
    fn from(err: quick_xml::Error) -> Self {
        Self::InvalidMetadata(format!("XML error: {}", err))
    }
}

/// Result type for BAG operations.
pub type Result<T> = std::result::Result<T, BagError>;
