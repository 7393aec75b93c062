//! Container trait and implementations.
//!
//! The core never touches storage directly. Everything it needs from the
//! chunked container (groups, attributes, 2-D datasets and rectangular
//! region I/O) goes through [`Container`].

mod memory;
mod zarr;

pub use memory::MemoryContainer;
pub use zarr::ZarrContainer;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DataType, GroupType, Region};

/// Physical element stored at each node of a container dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageElement {
    Float32,
    UInt32,
    /// Opaque packed record of the given size in bytes.
    Record(usize),
}

impl StorageElement {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Float32 | Self::UInt32 => 4,
            Self::Record(n) => *n,
        }
    }

    /// Storage element for a plain layer data type.
    pub fn from_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Float32 => Self::Float32,
            DataType::UInt32 => Self::UInt32,
        }
    }

    /// Storage element for a packed legacy group.
    pub fn for_group(group: GroupType) -> Self {
        Self::Record(group.record_size())
    }
}

/// Reference to an open container dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    pub path: String,
    pub element: StorageElement,
}

/// Physical layout requested when creating a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    /// Grid shape (rows, cols).
    pub dims: (u32, u32),
    pub element: StorageElement,
    /// Chunk shape (rows, cols); `None` stores the dataset contiguously.
    pub chunk_dims: Option<(u32, u32)>,
    /// Deflate-style level, 0 for no compression filter.
    pub compression_level: u8,
    /// Bytes of one element used to pre-fill the dataset.
    pub fill: Vec<u8>,
}

impl DatasetSpec {
    /// Spec with zero fill, no chunking and no compression.
    pub fn new(dims: (u32, u32), element: StorageElement) -> Self {
        Self {
            dims,
            element,
            chunk_dims: None,
            compression_level: 0,
            fill: vec![0; element.size()],
        }
    }

    /// Set the chunk shape.
    pub fn with_chunks(mut self, chunk_dims: Option<(u32, u32)>) -> Self {
        self.chunk_dims = chunk_dims;
        self
    }

    /// Set the compression level.
    pub fn with_compression(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the fill element; must be exactly one element long.
    pub fn with_fill(mut self, fill: Vec<u8>) -> Self {
        self.fill = fill;
        self
    }
}

/// Narrow I/O interface onto a hierarchical chunked container.
///
/// Paths are absolute (`/BAG_root/elevation`). Region buffers are dense,
/// row-major, native-endian bytes of `rows * cols * element.size()`.
pub trait Container {
    /// Human-readable location, used in logs and errors.
    fn location(&self) -> &str;

    /// Whether mutating calls are permitted.
    fn is_writable(&self) -> bool;

    /// Whether a group exists at `path`.
    fn group_exists(&self, path: &str) -> Result<bool>;

    /// Create a group (and any missing parents).
    fn create_group(&mut self, path: &str) -> Result<()>;

    /// Read a named attribute of a group or dataset.
    fn read_attribute(&self, node: &str, name: &str) -> Result<Option<serde_json::Value>>;

    /// Write a named attribute of an existing group or dataset.
    fn write_attribute(&mut self, node: &str, name: &str, value: serde_json::Value)
        -> Result<()>;

    /// Open the dataset at `path`; `None` if nothing is stored there.
    fn open_dataset(&self, path: &str) -> Result<Option<DatasetHandle>>;

    /// Create a new dataset at `path`.
    fn create_dataset(&mut self, path: &str, spec: &DatasetSpec) -> Result<DatasetHandle>;

    /// Read one rectangular region.
    fn read_region(&self, handle: &DatasetHandle, region: &Region) -> Result<Vec<u8>>;

    /// Write one rectangular region.
    fn write_region(&mut self, handle: &DatasetHandle, region: &Region, data: &[u8])
        -> Result<()>;

    /// Physical shape (rows, cols).
    fn shape(&self, handle: &DatasetHandle) -> Result<(u32, u32)>;

    /// Compression level of the dataset's filter, 0 if none.
    fn compression_level(&self, handle: &DatasetHandle) -> Result<u32>;

    /// Chunk shape (rows, cols), `None` if stored contiguously.
    fn chunk_dims(&self, handle: &DatasetHandle) -> Result<Option<(u32, u32)>>;
}

/// Parent group paths of `path`, outermost first (excluding `/`).
pub(crate) fn parent_groups(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    (1..parts.len())
        .map(|n| format!("/{}", parts[..n].join("/")))
        .collect()
}
