//! Zarr V3 container on the local filesystem.
//!
//! Layout mirrors the HDF5 hierarchy of a BAG file: `/BAG_root` is a Zarr
//! group, every layer is a 2-D array under it. Packed legacy records are
//! stored as 3-D `uint8` arrays whose trailing axis holds the record bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType as ZarrDataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;

use super::{parent_groups, Container, DatasetHandle, DatasetSpec, StorageElement};
use crate::error::{BagError, Result};
use crate::types::Region;

/// Array attribute recording the compression level a dataset was built with.
const COMPRESSION_LEVEL_ATTR: &str = "compression_level";

/// Array attribute recording whether the dataset was requested chunked.
const CHUNKED_ATTR: &str = "chunked";

fn zarr_err(e: impl std::fmt::Display) -> BagError {
    BagError::container(e.to_string())
}

/// A BAG container stored as a Zarr V3 hierarchy in a directory.
pub struct ZarrContainer {
    root: PathBuf,
    location: String,
    store: Arc<FilesystemStore>,
    writable: bool,
}

impl ZarrContainer {
    /// Open an existing container directory.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.join("zarr.json").is_file() {
            return Err(BagError::not_found(format!(
                "no container at {}",
                root.display()
            )));
        }

        let store = Arc::new(FilesystemStore::new(&root).map_err(zarr_err)?);

        Ok(Self {
            location: root.display().to_string(),
            root,
            store,
            writable,
        })
    }

    /// Create a new, empty container directory.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if root.join("zarr.json").exists() {
            return Err(BagError::AlreadyExists(root.display().to_string()));
        }

        std::fs::create_dir_all(&root)?;
        let store = Arc::new(FilesystemStore::new(&root).map_err(zarr_err)?);

        let group = GroupBuilder::new()
            .build(store.clone(), "/")
            .map_err(zarr_err)?;
        group.store_metadata().map_err(zarr_err)?;

        tracing::debug!(path = %root.display(), "Created Zarr container");

        Ok(Self {
            location: root.display().to_string(),
            root,
            store,
            writable: true,
        })
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(BagError::ReadOnly(self.location.clone()))
        }
    }

    /// Node type recorded in the node's `zarr.json`, if the node exists.
    fn node_type(&self, path: &str) -> Result<Option<String>> {
        let meta_path = self
            .root
            .join(path.trim_start_matches('/'))
            .join("zarr.json");
        if !meta_path.is_file() {
            return Ok(None);
        }

        let raw = std::fs::read(&meta_path)?;
        let meta: Value = serde_json::from_slice(&raw).map_err(zarr_err)?;
        Ok(meta
            .get("node_type")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    fn open_array(&self, path: &str) -> Result<Array<FilesystemStore>> {
        Array::open(self.store.clone(), path).map_err(zarr_err)
    }

    /// Zarr subset for a region; records get a third axis over their bytes.
    fn subset(region: &Region, element: StorageElement) -> Result<ArraySubset> {
        let mut start = vec![region.row_start as u64, region.col_start as u64];
        let mut shape = vec![region.rows() as u64, region.cols() as u64];
        if let StorageElement::Record(n) = element {
            start.push(0);
            shape.push(n as u64);
        }
        ArraySubset::new_with_start_shape(start, shape).map_err(zarr_err)
    }

    /// Create the compression codec for a dataset.
    fn compression_codec(
        level: u8,
        element: StorageElement,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(level)
            .map_err(|_| BagError::container("invalid compression level"))?;

        // Records are stored as bytes; shuffle only helps for 4-byte elements.
        let (shuffle, typesize) = match element {
            StorageElement::Float32 | StorageElement::UInt32 => {
                (BloscShuffleMode::Shuffle, Some(element.size()))
            }
            StorageElement::Record(_) => (BloscShuffleMode::NoShuffle, None),
        };

        let codec = BloscCodec::new(BloscCompressor::Zstd, level, None, shuffle, typesize)
            .map_err(zarr_err)?;

        Ok(Arc::new(codec))
    }
}

impl Container for ZarrContainer {
    fn location(&self) -> &str {
        &self.location
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn group_exists(&self, path: &str) -> Result<bool> {
        Ok(self.node_type(path)?.as_deref() == Some("group"))
    }

    fn create_group(&mut self, path: &str) -> Result<()> {
        self.check_writable()?;

        let mut groups = parent_groups(path);
        groups.push(path.to_string());
        for group_path in groups {
            match self.node_type(&group_path)?.as_deref() {
                Some("group") => continue,
                Some(other) => {
                    return Err(BagError::container(format!(
                        "{} exists as {}",
                        group_path, other
                    )))
                }
                None => {}
            }
            let group = GroupBuilder::new()
                .build(self.store.clone(), &group_path)
                .map_err(zarr_err)?;
            group.store_metadata().map_err(zarr_err)?;
        }

        Ok(())
    }

    fn read_attribute(&self, node: &str, name: &str) -> Result<Option<Value>> {
        match self.node_type(node)?.as_deref() {
            Some("group") => {
                let group = Group::open(self.store.clone(), node).map_err(zarr_err)?;
                Ok(group.attributes().get(name).cloned())
            }
            Some("array") => {
                let array = self.open_array(node)?;
                Ok(array.attributes().get(name).cloned())
            }
            _ => Ok(None),
        }
    }

    fn write_attribute(&mut self, node: &str, name: &str, value: Value) -> Result<()> {
        self.check_writable()?;

        match self.node_type(node)?.as_deref() {
            Some("group") => {
                let mut group = Group::open(self.store.clone(), node).map_err(zarr_err)?;
                group.attributes_mut().insert(name.to_string(), value);
                group.store_metadata().map_err(zarr_err)
            }
            Some("array") => {
                let mut array = self.open_array(node)?;
                array.attributes_mut().insert(name.to_string(), value);
                array.store_metadata().map_err(zarr_err)
            }
            _ => Err(BagError::not_found(node.to_string())),
        }
    }

    fn open_dataset(&self, path: &str) -> Result<Option<DatasetHandle>> {
        if self.node_type(path)?.as_deref() != Some("array") {
            return Ok(None);
        }

        let array = self.open_array(path)?;
        let shape = array.shape();
        let element = match (array.data_type(), shape.len()) {
            (ZarrDataType::Float32, 2) => StorageElement::Float32,
            (ZarrDataType::UInt32, 2) => StorageElement::UInt32,
            (ZarrDataType::UInt8, 3) => StorageElement::Record(shape[2] as usize),
            (other, rank) => {
                return Err(BagError::container(format!(
                    "unsupported dataset {} ({:?}, rank {})",
                    path, other, rank
                )))
            }
        };

        Ok(Some(DatasetHandle {
            path: path.to_string(),
            element,
        }))
    }

    fn create_dataset(&mut self, path: &str, spec: &DatasetSpec) -> Result<DatasetHandle> {
        self.check_writable()?;
        if self.node_type(path)?.is_some() {
            return Err(BagError::AlreadyExists(path.to_string()));
        }
        for parent in parent_groups(path) {
            self.create_group(&parent)?;
        }

        let (rows, cols) = spec.dims;
        let (chunk_rows, chunk_cols) = spec
            .chunk_dims
            .unwrap_or((rows, cols));
        let mut shape = vec![rows as u64, cols as u64];
        let mut chunk_shape = vec![chunk_rows.max(1) as u64, chunk_cols.max(1) as u64];

        let (data_type, fill_value) = match spec.element {
            StorageElement::Float32 => (ZarrDataType::Float32, FillValue::new(spec.fill.clone())),
            StorageElement::UInt32 => (ZarrDataType::UInt32, FillValue::new(spec.fill.clone())),
            StorageElement::Record(n) => {
                shape.push(n as u64);
                chunk_shape.push(n as u64);
                (ZarrDataType::UInt8, FillValue::from(0u8))
            }
        };

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| BagError::container(format!("{:?}", e)))?;

        let mut attrs = serde_json::Map::new();
        attrs.insert(
            COMPRESSION_LEVEL_ATTR.to_string(),
            serde_json::json!(spec.compression_level),
        );
        attrs.insert(
            CHUNKED_ATTR.to_string(),
            serde_json::json!(spec.chunk_dims.is_some()),
        );

        let mut binding = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(attrs);

        if spec.compression_level > 0 {
            let codec = Self::compression_codec(spec.compression_level, spec.element)?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(self.store.clone(), path)
            .map_err(zarr_err)?;
        array.store_metadata().map_err(zarr_err)?;

        tracing::debug!(
            container = %self.location,
            path = path,
            rows = rows,
            cols = cols,
            element = ?spec.element,
            "Created dataset"
        );

        Ok(DatasetHandle {
            path: path.to_string(),
            element: spec.element,
        })
    }

    fn read_region(&self, handle: &DatasetHandle, region: &Region) -> Result<Vec<u8>> {
        let array = self.open_array(&handle.path)?;
        let subset = Self::subset(region, handle.element)?;

        let bytes = match handle.element {
            StorageElement::Float32 => {
                let values: Vec<f32> = array
                    .retrieve_array_subset_elements(&subset)
                    .map_err(zarr_err)?;
                bytemuck::cast_slice(&values).to_vec()
            }
            StorageElement::UInt32 => {
                let values: Vec<u32> = array
                    .retrieve_array_subset_elements(&subset)
                    .map_err(zarr_err)?;
                bytemuck::cast_slice(&values).to_vec()
            }
            StorageElement::Record(_) => array
                .retrieve_array_subset_elements::<u8>(&subset)
                .map_err(zarr_err)?,
        };

        Ok(bytes)
    }

    fn write_region(&mut self, handle: &DatasetHandle, region: &Region, data: &[u8]) -> Result<()> {
        self.check_writable()?;

        let expected = region.buffer_size(handle.element.size());
        if data.len() != expected {
            return Err(BagError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let array = self.open_array(&handle.path)?;
        let subset = Self::subset(region, handle.element)?;

        match handle.element {
            StorageElement::Float32 => {
                let values: Vec<f32> = bytemuck::pod_collect_to_vec(data);
                array
                    .store_array_subset_elements(&subset, &values)
                    .map_err(zarr_err)
            }
            StorageElement::UInt32 => {
                let values: Vec<u32> = bytemuck::pod_collect_to_vec(data);
                array
                    .store_array_subset_elements(&subset, &values)
                    .map_err(zarr_err)
            }
            StorageElement::Record(_) => array
                .store_array_subset_elements(&subset, data)
                .map_err(zarr_err),
        }
    }

    fn shape(&self, handle: &DatasetHandle) -> Result<(u32, u32)> {
        let array = self.open_array(&handle.path)?;
        let shape = array.shape();
        if shape.len() < 2 {
            return Err(BagError::container(format!(
                "{} has rank {}",
                handle.path,
                shape.len()
            )));
        }
        Ok((shape[0] as u32, shape[1] as u32))
    }

    fn compression_level(&self, handle: &DatasetHandle) -> Result<u32> {
        let array = self.open_array(&handle.path)?;
        Ok(array
            .attributes()
            .get(COMPRESSION_LEVEL_ATTR)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32)
    }

    fn chunk_dims(&self, handle: &DatasetHandle) -> Result<Option<(u32, u32)>> {
        let array = self.open_array(&handle.path)?;
        let shape = array.shape();

        // Use origin [0, 0] for getting chunk shape
        let origin = vec![0u64; shape.len()];
        let chunk_shape = array
            .chunk_grid()
            .chunk_shape(&origin, array.shape())
            .map_err(zarr_err)?
            .ok_or_else(|| BagError::container("missing chunk shape"))?;

        let chunk = (chunk_shape[0].get() as u32, chunk_shape[1].get() as u32);
        let full = (shape[0] as u32, shape[1] as u32);

        let chunked = array
            .attributes()
            .get(CHUNKED_ATTR)
            .and_then(|v| v.as_bool())
            .unwrap_or(chunk != full);

        Ok(if chunked { Some(chunk) } else { None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_reopen() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("test.bag");

        {
            let mut c = ZarrContainer::create(&path).expect("Failed to create");
            c.create_group("/BAG_root").expect("Failed to create group");
            c.write_attribute("/BAG_root", "Bag Version", Value::from("1.6.0"))
                .expect("Failed to write attribute");
        }

        let c = ZarrContainer::open(&path, false).expect("Failed to open");
        assert!(!c.is_writable());
        assert!(c.group_exists("/BAG_root").unwrap());
        assert_eq!(
            c.read_attribute("/BAG_root", "Bag Version").unwrap(),
            Some(Value::from("1.6.0"))
        );
    }

    #[test]
    fn test_open_missing_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = ZarrContainer::open(temp_dir.path().join("absent.bag"), false);
        assert!(matches!(result, Err(BagError::NotFound(_))));
    }

    #[test]
    fn test_float_region_round_trip() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut c = ZarrContainer::create(temp_dir.path().join("t.bag")).unwrap();

        let spec = DatasetSpec::new((20, 30), StorageElement::Float32)
            .with_chunks(Some((8, 8)))
            .with_compression(3);
        let h = c.create_dataset("/BAG_root/elevation", &spec).unwrap();

        let region = Region::new(5, 6, 9, 12);
        let values: Vec<f32> = (0..region.len()).map(|i| i as f32 * 0.5).collect();
        let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
        c.write_region(&h, &region, &bytes).unwrap();

        assert_eq!(c.read_region(&h, &region).unwrap(), bytes);
        assert_eq!(c.shape(&h).unwrap(), (20, 30));
        assert_eq!(c.compression_level(&h).unwrap(), 3);
        assert_eq!(c.chunk_dims(&h).unwrap(), Some((8, 8)));
    }

    #[test]
    fn test_unchunked_uncompressed_dataset() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut c = ZarrContainer::create(temp_dir.path().join("t.bag")).unwrap();

        let spec = DatasetSpec::new((4, 5), StorageElement::UInt32);
        let h = c.create_dataset("/BAG_root/count", &spec).unwrap();

        assert_eq!(c.compression_level(&h).unwrap(), 0);
        assert_eq!(c.chunk_dims(&h).unwrap(), None);
        assert_eq!(
            c.open_dataset("/BAG_root/count").unwrap().unwrap().element,
            StorageElement::UInt32
        );
    }

    #[test]
    fn test_record_dataset_round_trip() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut c = ZarrContainer::create(temp_dir.path().join("t.bag")).unwrap();

        let spec = DatasetSpec::new((3, 3), StorageElement::Record(8));
        let h = c.create_dataset("/BAG_root/node", &spec).unwrap();

        let region = Region::new(1, 1, 2, 2);
        let bytes: Vec<u8> = (0..region.buffer_size(8)).map(|i| i as u8).collect();
        c.write_region(&h, &region, &bytes).unwrap();

        let reopened = c.open_dataset("/BAG_root/node").unwrap().unwrap();
        assert_eq!(reopened.element, StorageElement::Record(8));
        assert_eq!(c.shape(&reopened).unwrap(), (3, 3));
        assert_eq!(c.read_region(&reopened, &region).unwrap(), bytes);
    }

    #[test]
    fn test_array_attributes() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut c = ZarrContainer::create(temp_dir.path().join("t.bag")).unwrap();
        c.create_dataset(
            "/BAG_root/elevation",
            &DatasetSpec::new((2, 2), StorageElement::Float32),
        )
        .unwrap();

        c.write_attribute("/BAG_root/elevation", "Maximum Elevation Value", Value::from(-5.0))
            .unwrap();
        assert_eq!(
            c.read_attribute("/BAG_root/elevation", "Maximum Elevation Value")
                .unwrap(),
            Some(Value::from(-5.0))
        );
    }
}
