//! Handle-based API surface.
//!
//! A [`Session`] owns every open dataset and hands out copyable
//! [`BagHandle`]s. Handles carry a generation, so a handle kept after
//! `close` is rejected with `InvalidHandle` instead of reaching a dataset
//! that reused the same slot.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::BagConfig;
use crate::container::Container;
use crate::dataset::Dataset;
use crate::error::{BagError, Result};
use crate::metadata::{import_from_xml_file, MetadataRecord};
use crate::tracking::TrackingItem;
use crate::types::{LayerType, NullValue, OpenMode, Region};

/// Reference to a dataset owned by a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagHandle {
    index: usize,
    generation: u64,
}

impl std::fmt::Display for BagHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Values of a region, optionally with the coordinates of its rows and
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionData {
    pub region: Region,
    /// Native-endian values, row-major.
    pub data: Vec<u8>,
    /// X coordinate of each row of the region.
    pub x: Option<Vec<f64>>,
    /// Y coordinate of each column of the region.
    pub y: Option<Vec<f64>>,
}

/// Sort key for the tracking list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingSort {
    Node,
    Series,
    Code,
}

struct Slot {
    generation: u64,
    dataset: Option<Dataset>,
}

/// Table of open datasets.
pub struct Session {
    slots: Vec<Slot>,
    free: Vec<usize>,
    config: BagConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(BagConfig::default())
    }
}

impl Session {
    pub fn new(config: BagConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &BagConfig {
        &self.config
    }

    /// Number of datasets currently open.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.dataset.is_some()).count()
    }

    fn insert(&mut self, dataset: Dataset) -> BagHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.dataset = Some(dataset);
            BagHandle {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                dataset: Some(dataset),
            });
            BagHandle {
                index: self.slots.len() - 1,
                generation: 0,
            }
        }
    }

    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<BagHandle> {
        let dataset = Dataset::open(path, mode)?;
        Ok(self.insert(dataset))
    }

    pub fn open_container(&mut self, container: Box<dyn Container>, mode: OpenMode) -> Result<BagHandle> {
        let dataset = Dataset::open_with(container, mode, self.config.clone())?;
        Ok(self.insert(dataset))
    }

    pub fn create(&mut self, path: impl AsRef<Path>, record: MetadataRecord) -> Result<BagHandle> {
        let dataset = Dataset::create(path, record, self.config.clone())?;
        Ok(self.insert(dataset))
    }

    /// Create a dataset whose metadata is imported from an XML file.
    pub fn create_from_xml(
        &mut self,
        path: impl AsRef<Path>,
        metadata_file: impl AsRef<Path>,
    ) -> Result<BagHandle> {
        let record = import_from_xml_file(metadata_file, &self.config.import_config())?;
        self.create(path, record)
    }

    pub fn create_container(
        &mut self,
        container: Box<dyn Container>,
        record: MetadataRecord,
    ) -> Result<BagHandle> {
        let dataset = Dataset::create_with(container, record, self.config.clone())?;
        Ok(self.insert(dataset))
    }

    /// Close a dataset, flushing it first when it is writable. The handle
    /// is invalid afterwards even if closing fails.
    pub fn close(&mut self, handle: BagHandle) -> Result<()> {
        let dataset = self
            .slot_mut(handle)?
            .dataset
            .take()
            .ok_or_else(|| BagError::InvalidHandle(handle.to_string()))?;
        self.free.push(handle.index);
        dataset.close()
    }

    fn slot_mut(&mut self, handle: BagHandle) -> Result<&mut Slot> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or_else(|| BagError::InvalidHandle(handle.to_string()))
    }

    pub fn dataset(&self, handle: BagHandle) -> Result<&Dataset> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.dataset.as_ref())
            .ok_or_else(|| BagError::InvalidHandle(handle.to_string()))
    }

    pub fn dataset_mut(&mut self, handle: BagHandle) -> Result<&mut Dataset> {
        self.slot_mut(handle)?
            .dataset
            .as_mut()
            .ok_or_else(|| BagError::InvalidHandle(handle.to_string()))
    }

    pub fn add_layer(&mut self, handle: BagHandle, layer_type: LayerType) -> Result<()> {
        self.dataset_mut(handle)?.add_layer(layer_type).map(|_| ())
    }

    pub fn get_dims(&self, handle: BagHandle) -> Result<(u32, u32)> {
        self.dataset(handle)?.dims()
    }

    pub fn contains_layer(&self, handle: BagHandle, layer_type: LayerType) -> Result<bool> {
        Ok(self.dataset(handle)?.contains_layer(layer_type))
    }

    pub fn get_min_max(&self, handle: BagHandle, layer_type: LayerType) -> Result<Option<(f64, f64)>> {
        self.dataset(handle)?.layer(layer_type)?.extents()
    }

    pub fn set_min_max(&mut self, handle: BagHandle, layer_type: LayerType, min: f64, max: f64) -> Result<()> {
        self.dataset_mut(handle)?
            .layer_mut(layer_type)?
            .set_extents(min, max)
    }

    /// Read a region, optionally with the coordinates of each row and column.
    pub fn read(
        &self,
        handle: BagHandle,
        layer_type: LayerType,
        region: &Region,
        with_positions: bool,
    ) -> Result<RegionData> {
        let dataset = self.dataset(handle)?;
        let data = dataset.layer(layer_type)?.read(region)?;

        let (x, y) = if with_positions {
            let x = (region.row_start..=region.row_end)
                .map(|row| dataset.grid_to_geo(row, region.col_start).0)
                .collect();
            let y = (region.col_start..=region.col_end)
                .map(|col| dataset.grid_to_geo(region.row_start, col).1)
                .collect();
            (Some(x), Some(y))
        } else {
            (None, None)
        };

        Ok(RegionData {
            region: *region,
            data,
            x,
            y,
        })
    }

    pub fn write(&mut self, handle: BagHandle, layer_type: LayerType, region: &Region, data: &[u8]) -> Result<()> {
        self.dataset_mut(handle)?
            .layer_mut(layer_type)?
            .write(region, data)
    }

    pub fn get_metadata(&self, handle: BagHandle) -> Result<&MetadataRecord> {
        Ok(self.dataset(handle)?.metadata().record())
    }

    pub fn compute_position(&self, handle: BagHandle, row: u32, col: u32) -> Result<(f64, f64)> {
        Ok(self.dataset(handle)?.grid_to_geo(row, col))
    }

    pub fn compute_index(&self, handle: BagHandle, x: f64, y: f64) -> Result<(u32, u32)> {
        self.dataset(handle)?.geo_to_grid(x, y)
    }

    pub fn tracking_list_length(&self, handle: BagHandle) -> Result<usize> {
        Ok(self.dataset(handle)?.tracking_list().len())
    }

    pub fn read_tracking_item(&self, handle: BagHandle, index: usize) -> Result<TrackingItem> {
        self.dataset(handle)?.tracking_list().at(index).copied()
    }

    /// Append an item to the tracking list; persisted on flush or close.
    pub fn write_tracking_item(&mut self, handle: BagHandle, item: TrackingItem) -> Result<()> {
        let dataset = self.dataset_mut(handle)?;
        if !dataset.is_writable() {
            return Err(BagError::ReadOnly(dataset.location().to_string()));
        }
        dataset.tracking_list_mut().append(item);
        Ok(())
    }

    pub fn sort_tracking_list(&mut self, handle: BagHandle, key: TrackingSort) -> Result<()> {
        let list = self.dataset_mut(handle)?.tracking_list_mut();
        match key {
            TrackingSort::Node => list.sort_by_node(),
            TrackingSort::Series => list.sort_by_series(),
            TrackingSort::Code => list.sort_by_code(),
        }
        Ok(())
    }
}

/// Zeroed buffer sized for reading `region` of a `layer_type` layer.
pub fn allocate_buffer(region: &Region, layer_type: LayerType) -> Vec<u8> {
    vec![0; region.buffer_size(layer_type.data_type().element_size())]
}

/// Null value stored in empty nodes of a `layer_type` layer.
pub fn null_value(layer_type: LayerType) -> NullValue {
    layer_type.null_value()
}
