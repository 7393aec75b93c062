//! Bathymetric Attributed Grid (BAG) data model.
//!
//! A BAG is a georeferenced 2-D grid carrying several co-registered layers
//! (elevation, uncertainty, hypothesis statistics, ...) plus a tracking list
//! of node edits and an ISO 19115 style metadata record. This crate provides:
//!
//! - **Layer registry**: typed, bounds-checked region reads and writes
//! - **Legacy decode**: splitting packed per-node records into layers
//! - **Georeference**: grid index to geographic coordinate transforms
//! - **Containers**: an in-memory hierarchy and a Zarr V3 directory store
//!
//! # Architecture
//!
//! ```text
//! Session (BagHandle table)
//!      │
//!      ▼
//! Dataset ──► Metadata ──► Georeference
//!      │
//!      ├─► layers: LayerType → Layer { Simple | Interleaved | Compound }
//!      │         │
//!      │         └─► LayerRef / LayerMut ──► Container::read_region / write_region
//!      │
//!      └─► TrackingList
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bag::{BagConfig, Dataset, LayerType, MetadataRecord, Region};
//!
//! let record = MetadataRecord::for_grid((100, 50), (0.0, 0.0), (1.0, 1.0));
//! let mut dataset = Dataset::create("survey.bag", record, BagConfig::default())?;
//!
//! let region = Region::new(0, 0, 9, 9);
//! let depths = vec![-12.5f32; region.len()];
//! dataset
//!     .layer_mut(LayerType::Elevation)?
//!     .write(&region, bytemuck::cast_slice(&depths))?;
//!
//! let (x, y) = dataset.grid_to_geo(10, 20);
//! dataset.close()?;
//! ```

pub mod api;
pub mod config;
pub mod container;
pub mod dataset;
pub mod error;
pub mod layer;
pub mod metadata;
pub mod paths;
pub mod tracking;
pub mod transform;
pub mod types;

// Re-export commonly used types at crate root
pub use api::{allocate_buffer, null_value, BagHandle, RegionData, Session, TrackingSort};
pub use config::{BagConfig, ImportConfig};
pub use container::{Container, MemoryContainer, ZarrContainer};
pub use dataset::Dataset;
pub use error::{error_string, BagError, Result};
pub use layer::{decode_interleaved, CompoundLayer, FieldDefinition, Layer, LayerKind, LayerMut, LayerRef};
pub use metadata::{
    export_to_xml, import_from_xml_buffer, import_from_xml_file, Metadata, MetadataRecord,
};
pub use tracking::{TrackingItem, TrackingList};
pub use transform::Georeference;
pub use types::{DataType, FormatVersion, GroupType, LayerType, NullValue, OpenMode, Region};
