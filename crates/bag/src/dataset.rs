//! Dataset: owns the container, the layer registry, metadata and the
//! tracking list.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::BagConfig;
use crate::container::{Container, DatasetHandle, DatasetSpec, StorageElement, ZarrContainer};
use crate::error::{BagError, Result};
use crate::layer::{CompoundLayer, FieldDefinition, Layer, LayerMut, LayerRef};
use crate::metadata::{Metadata, MetadataRecord};
use crate::paths::{BAG_VERSION, BAG_VERSION_NAME, ROOT_PATH};
use crate::tracking::TrackingList;
use crate::types::{FormatVersion, GroupType, LayerType, OpenMode};

/// An open BAG dataset.
///
/// The access mode is fixed when the dataset is opened or created. Layers
/// are borrowed from the dataset and cannot outlive it.
pub struct Dataset {
    pub(crate) container: Box<dyn Container>,
    pub(crate) layers: BTreeMap<LayerType, Layer>,
    metadata: Metadata,
    tracking_list: TrackingList,
    mode: OpenMode,
    version: FormatVersion,
    config: BagConfig,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("location", &self.container.location())
            .field("mode", &self.mode)
            .field("version", &self.version)
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dataset {
    /// Open a Zarr container on disk.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let container = ZarrContainer::open(path, mode == OpenMode::ReadWrite)?;
        Self::open_with(Box::new(container), mode, BagConfig::default())
    }

    /// Open a dataset stored in any container.
    pub fn open_with(container: Box<dyn Container>, mode: OpenMode, config: BagConfig) -> Result<Self> {
        if mode == OpenMode::ReadWrite && !container.is_writable() {
            return Err(BagError::ReadOnly(container.location().to_string()));
        }
        if !container.group_exists(ROOT_PATH)? {
            return Err(BagError::not_found(format!(
                "{} in {}",
                ROOT_PATH,
                container.location()
            )));
        }

        let version = Self::read_version(container.as_ref())?;
        let mut layers = BTreeMap::new();

        for layer_type in LayerType::ALL {
            let Some(path) = layer_type.internal_path() else {
                continue;
            };
            let Some(handle) = container.open_dataset(path)? else {
                continue;
            };

            let expected = StorageElement::from_data_type(layer_type.data_type());
            if handle.element != expected {
                return Err(BagError::container(format!(
                    "{} stores {:?}, expected {:?}",
                    path, handle.element, expected
                )));
            }

            debug!(layer = %layer_type, path = path, "Discovered layer");
            layers.insert(layer_type, Layer::simple(layer_type, handle));
        }

        if !layers.contains_key(&LayerType::Elevation) {
            return Err(BagError::not_found(format!(
                "elevation layer in {}",
                container.location()
            )));
        }

        if version.is_legacy() {
            for group in [GroupType::Node, GroupType::ElevationSolution] {
                Self::discover_interleaved(container.as_ref(), group, &mut layers)?;
            }
        }

        let metadata = Metadata::from_container(container.as_ref(), &config.import_config())?;
        let tracking_list = TrackingList::load(container.as_ref())?;

        let dataset = Self {
            container,
            layers,
            metadata,
            tracking_list,
            mode,
            version,
            config,
        };

        let dims = dataset.dims()?;
        dataset.metadata.check_against_dims(dims)?;

        debug!(
            location = dataset.location(),
            version = %dataset.version,
            rows = dims.0,
            cols = dims.1,
            layers = dataset.layers.len(),
            mode = ?mode,
            "Opened dataset"
        );

        Ok(dataset)
    }

    /// Create a new Zarr container on disk.
    pub fn create(path: impl AsRef<Path>, record: MetadataRecord, config: BagConfig) -> Result<Self> {
        let container = ZarrContainer::create(path)?;
        Self::create_with(Box::new(container), record, config)
    }

    /// Create a dataset in an empty container.
    ///
    /// The grid shape comes from the metadata record; Elevation and
    /// Uncertainty layers are created and filled with their null value.
    pub fn create_with(
        mut container: Box<dyn Container>,
        record: MetadataRecord,
        config: BagConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BagError::unsupported(format!("invalid configuration: {}", e)))?;
        if config.validate_metadata {
            record.validate()?;
        }
        if !container.is_writable() {
            return Err(BagError::ReadOnly(container.location().to_string()));
        }
        if container.group_exists(ROOT_PATH)? {
            return Err(BagError::AlreadyExists(format!(
                "{} in {}",
                ROOT_PATH,
                container.location()
            )));
        }

        container.create_group(ROOT_PATH)?;
        container.write_attribute(ROOT_PATH, BAG_VERSION_NAME, serde_json::json!(BAG_VERSION))?;

        let metadata = Metadata::new(record);
        metadata.save(container.as_mut())?;

        let dims = (metadata.rows(), metadata.cols());
        let mut layers = BTreeMap::new();
        for layer_type in [LayerType::Elevation, LayerType::Uncertainty] {
            let handle = Self::create_layer_storage(container.as_mut(), layer_type, dims, &config)?;
            layers.insert(layer_type, Layer::simple(layer_type, handle));
        }

        let tracking_list = TrackingList::new();
        tracking_list.save(container.as_mut())?;

        let version = FormatVersion::parse(BAG_VERSION)?;

        debug!(
            location = container.location(),
            rows = dims.0,
            cols = dims.1,
            compression_level = config.compression_level,
            chunk_size = config.chunk_size,
            "Created dataset"
        );

        Ok(Self {
            container,
            layers,
            metadata,
            tracking_list,
            mode: OpenMode::ReadWrite,
            version,
            config,
        })
    }

    fn read_version(container: &dyn Container) -> Result<FormatVersion> {
        let value = container
            .read_attribute(ROOT_PATH, BAG_VERSION_NAME)?
            .ok_or_else(|| BagError::invalid_metadata(format!("missing '{}' attribute", BAG_VERSION_NAME)))?;
        let text = value
            .as_str()
            .ok_or_else(|| BagError::invalid_metadata(format!("'{}' is not a string", BAG_VERSION_NAME)))?;
        FormatVersion::parse(text)
    }

    /// Register every layer packed into `group`'s records, if present.
    fn discover_interleaved(
        container: &dyn Container,
        group: GroupType,
        layers: &mut BTreeMap<LayerType, Layer>,
    ) -> Result<()> {
        let Some(handle) = container.open_dataset(group.internal_path())? else {
            return Ok(());
        };

        let expected = StorageElement::for_group(group);
        if handle.element != expected {
            return Err(BagError::container(format!(
                "{} stores {:?}, expected {:?}",
                handle.path, handle.element, expected
            )));
        }

        for &layer_type in group.layer_types() {
            debug!(layer = %layer_type, group = ?group, "Discovered interleaved layer");
            layers.insert(layer_type, Layer::interleaved(layer_type, group, handle.clone()));
        }

        Ok(())
    }

    fn create_layer_storage(
        container: &mut dyn Container,
        layer_type: LayerType,
        dims: (u32, u32),
        config: &BagConfig,
    ) -> Result<DatasetHandle> {
        let path = layer_type.internal_path().ok_or_else(|| {
            BagError::unsupported(format!(
                "{} only exists inside legacy records and cannot be created",
                layer_type
            ))
        })?;

        let spec = DatasetSpec::new(dims, StorageElement::from_data_type(layer_type.data_type()))
            .with_chunks(config.chunk_dims(dims))
            .with_compression(config.compression_level)
            .with_fill(layer_type.null_value().to_ne_bytes().to_vec());

        container.create_dataset(path, &spec)
    }

    pub(crate) fn container(&self) -> &dyn Container {
        self.container.as_ref()
    }

    /// Container location, for logs and messages.
    pub fn location(&self) -> &str {
        self.container.location()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.mode == OpenMode::ReadWrite
    }

    /// Format version read from (or written to) the container.
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn config(&self) -> &BagConfig {
        &self.config
    }

    /// Registered layer types, in code order.
    pub fn layer_types(&self) -> Vec<LayerType> {
        self.layers.keys().copied().collect()
    }

    pub fn contains_layer(&self, layer_type: LayerType) -> bool {
        self.layers.contains_key(&layer_type)
    }

    /// Create storage for a new layer and register it.
    pub fn add_layer(&mut self, layer_type: LayerType) -> Result<LayerMut<'_>> {
        if self.layers.contains_key(&layer_type) {
            return Err(BagError::AlreadyExists(layer_type.to_string()));
        }
        if !self.is_writable() {
            return Err(BagError::ReadOnly(self.location().to_string()));
        }

        let dims = self.dims()?;
        let handle = Self::create_layer_storage(self.container.as_mut(), layer_type, dims, &self.config)?;
        self.layers.insert(layer_type, Layer::simple(layer_type, handle));

        debug!(location = self.location(), layer = %layer_type, "Added layer");

        Ok(LayerMut::new(self, layer_type))
    }

    /// Register a compound layer under `layer_type`. Compound layers have no
    /// persisted schema and are not written to the container.
    pub fn add_compound_layer(
        &mut self,
        layer_type: LayerType,
        definitions: Vec<FieldDefinition>,
    ) -> Result<LayerRef<'_>> {
        if self.layers.contains_key(&layer_type) {
            return Err(BagError::AlreadyExists(layer_type.to_string()));
        }
        if !self.is_writable() {
            return Err(BagError::ReadOnly(self.location().to_string()));
        }

        self.layers
            .insert(layer_type, Layer::compound(layer_type, CompoundLayer::new(definitions)));
        self.layer(layer_type)
    }

    pub fn layer(&self, layer_type: LayerType) -> Result<LayerRef<'_>> {
        self.layers
            .get(&layer_type)
            .map(|layer| LayerRef::new(self, layer))
            .ok_or_else(|| BagError::not_found(format!("layer {}", layer_type)))
    }

    pub fn layer_mut(&mut self, layer_type: LayerType) -> Result<LayerMut<'_>> {
        if !self.layers.contains_key(&layer_type) {
            return Err(BagError::not_found(format!("layer {}", layer_type)));
        }
        Ok(LayerMut::new(self, layer_type))
    }

    fn elevation_handle(&self) -> Result<&DatasetHandle> {
        self.layers
            .get(&LayerType::Elevation)
            .and_then(|layer| layer.handle())
            .ok_or_else(|| BagError::not_found("elevation layer"))
    }

    /// Grid shape `(rows, cols)`, always taken from the elevation layer.
    pub fn dims(&self) -> Result<(u32, u32)> {
        self.container.shape(self.elevation_handle()?)
    }

    /// Compression level of the elevation layer, 0 if none or unknown.
    pub fn compression_level(&self) -> u32 {
        let level = self
            .elevation_handle()
            .and_then(|handle| self.container.compression_level(handle));

        match level {
            Ok(level) => level,
            Err(e) => {
                warn!(location = self.location(), error = %e, "Could not read compression level");
                0
            }
        }
    }

    /// Chunk shape of the elevation layer, `None` if stored contiguously.
    pub fn chunk_dims(&self) -> Option<(u32, u32)> {
        let dims = self
            .elevation_handle()
            .and_then(|handle| self.container.chunk_dims(handle));

        match dims {
            Ok(dims) => dims,
            Err(e) => {
                warn!(location = self.location(), error = %e, "Could not read chunk shape");
                None
            }
        }
    }

    /// Chunk edge length (rows) of the elevation layer, 0 if unchunked.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_dims().map(|(rows, _)| rows).unwrap_or(0)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Geographic position of a grid node.
    pub fn grid_to_geo(&self, row: u32, col: u32) -> (f64, f64) {
        self.metadata.georeference().grid_to_geo(row, col)
    }

    /// Nearest grid node to a geographic position.
    pub fn geo_to_grid(&self, x: f64, y: f64) -> Result<(u32, u32)> {
        self.metadata.georeference().geo_to_grid(x, y)
    }

    pub fn tracking_list(&self) -> &TrackingList {
        &self.tracking_list
    }

    pub fn tracking_list_mut(&mut self) -> &mut TrackingList {
        &mut self.tracking_list
    }

    /// Persist the tracking list to the container.
    pub fn flush(&mut self) -> Result<()> {
        if !self.is_writable() {
            return Err(BagError::ReadOnly(self.location().to_string()));
        }
        self.tracking_list.save(self.container.as_mut())?;
        debug!(location = self.location(), "Flushed dataset");
        Ok(())
    }

    /// Flush (when writable) and release the container.
    pub fn close(self) -> Result<()> {
        self.into_container().map(drop)
    }

    /// Flush (when writable) and hand back the underlying container.
    pub fn into_container(mut self) -> Result<Box<dyn Container>> {
        if self.is_writable() {
            self.flush()?;
        }
        debug!(location = self.location(), "Closed dataset");
        Ok(self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use crate::types::Region;

    fn new_dataset(dims: (u32, u32)) -> Dataset {
        let record = MetadataRecord::for_grid(dims, (0.0, 0.0), (1.0, 1.0));
        Dataset::create_with(Box::new(MemoryContainer::new("mem")), record, BagConfig::default()).unwrap()
    }

    #[test]
    fn test_create_registers_mandatory_layers() {
        let ds = new_dataset((100, 50));
        assert_eq!(ds.layer_types(), vec![LayerType::Elevation, LayerType::Uncertainty]);
        assert_eq!(ds.dims().unwrap(), (100, 50));
        assert_eq!(ds.version().to_string(), "1.6.0");
        assert!(ds.is_writable());
    }

    #[test]
    fn test_new_layers_are_null_filled() {
        let ds = new_dataset((3, 3));
        let bytes = ds.layer(LayerType::Elevation).unwrap().read(&Region::full((3, 3))).unwrap();
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(values, vec![1_000_000.0; 9]);
    }

    #[test]
    fn test_add_existing_layer_fails() {
        let mut ds = new_dataset((10, 10));
        assert!(matches!(
            ds.add_layer(LayerType::Elevation),
            Err(BagError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_add_interleaved_only_layer_is_unsupported() {
        let mut ds = new_dataset((10, 10));
        assert!(matches!(
            ds.add_layer(LayerType::StdDev),
            Err(BagError::Unsupported(_))
        ));
        assert!(!ds.contains_layer(LayerType::StdDev));
    }

    #[test]
    fn test_add_layer_then_write() {
        let mut ds = new_dataset((4, 4));
        let mut layer = ds.add_layer(LayerType::NumSoundings).unwrap();

        let region = Region::new(1, 1, 2, 2);
        let values: Vec<u32> = vec![3, 4, 5, 6];
        layer.write(&region, bytemuck::cast_slice(&values)).unwrap();

        let bytes = ds.layer(LayerType::NumSoundings).unwrap().read(&region).unwrap();
        assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&bytes), values);
        assert!(ds.contains_layer(LayerType::NumSoundings));
    }

    #[test]
    fn test_missing_layer_is_not_found() {
        let mut ds = new_dataset((10, 10));
        assert!(matches!(
            ds.layer(LayerType::AverageElevation),
            Err(BagError::NotFound(_))
        ));
        assert!(ds.layer_mut(LayerType::NominalElevation).is_err());
    }

    #[test]
    fn test_introspection() {
        let config = BagConfig {
            compression_level: 4,
            chunk_size: 16,
            validate_metadata: true,
        };
        let record = MetadataRecord::for_grid((40, 20), (0.0, 0.0), (1.0, 1.0));
        let ds = Dataset::create_with(Box::new(MemoryContainer::new("mem")), record, config).unwrap();

        assert_eq!(ds.compression_level(), 4);
        assert_eq!(ds.chunk_dims(), Some((16, 16)));
        assert_eq!(ds.chunk_size(), 16);
    }

    #[test]
    fn test_unchunked_uncompressed_reports_zero() {
        let config = BagConfig {
            compression_level: 0,
            chunk_size: 0,
            validate_metadata: true,
        };
        let record = MetadataRecord::for_grid((8, 8), (0.0, 0.0), (1.0, 1.0));
        let ds = Dataset::create_with(Box::new(MemoryContainer::new("mem")), record, config).unwrap();

        assert_eq!(ds.compression_level(), 0);
        assert_eq!(ds.chunk_size(), 0);
    }

    #[test]
    fn test_create_rejects_invalid_metadata() {
        let record = MetadataRecord::for_grid((0, 10), (0.0, 0.0), (1.0, 1.0));
        let result = Dataset::create_with(Box::new(MemoryContainer::new("mem")), record, BagConfig::default());
        assert!(matches!(result, Err(BagError::InvalidMetadata(_))));
    }

    #[test]
    fn test_compound_layer_is_registered_but_inert() {
        let mut ds = new_dataset((5, 5));
        let layer = ds
            .add_compound_layer(
                LayerType::AverageElevation,
                vec![FieldDefinition::new("depth", crate::types::DataType::Float32)],
            )
            .unwrap();
        assert!(layer.read(&Region::new(0, 0, 1, 1)).unwrap().is_empty());
        assert_eq!(layer.read_buffer_size(&Region::new(0, 0, 1, 1)), 0);

        let mut layer = ds.layer_mut(LayerType::AverageElevation).unwrap();
        assert!(layer.write(&Region::new(0, 0, 0, 0), &[0; 4]).is_ok());
        assert!(matches!(
            layer.write(&Region::new(0, 0, 5, 0), &[0; 4]),
            Err(BagError::OutOfBounds { .. })
        ));
        assert_eq!(layer.extents().unwrap(), None);
    }

    #[test]
    fn test_compound_layer_respects_read_only() {
        let record = MetadataRecord::for_grid((5, 5), (0.0, 0.0), (1.0, 1.0));
        let container = MemoryContainer::new("mem");
        let ds = Dataset::create_with(Box::new(container), record, BagConfig::default()).unwrap();
        let container = ds.into_container().unwrap();

        let mut ro = Dataset::open_with(container, OpenMode::ReadOnly, BagConfig::default()).unwrap();
        let defs = vec![FieldDefinition::new("depth", crate::types::DataType::Float32)];
        assert!(matches!(
            ro.add_compound_layer(LayerType::AverageElevation, defs),
            Err(BagError::ReadOnly(_))
        ));
        assert!(!ro.contains_layer(LayerType::AverageElevation));
    }

    #[test]
    fn test_flush_persists_tracking_list() {
        let mut ds = new_dataset((5, 5));
        ds.tracking_list_mut()
            .append(crate::tracking::TrackingItem::new(1, 2, -3.0, 0.5, 1, 0));
        ds.flush().unwrap();

        let stored = TrackingList::load(ds.container()).unwrap();
        assert_eq!(stored.len(), 1);
    }
}
