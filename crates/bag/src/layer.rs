//! Layers: typed views onto one raster surface of a dataset.
//!
//! A [`Layer`] only describes where its values live. Region I/O goes through
//! [`LayerRef`] and [`LayerMut`], which borrow the owning [`Dataset`] so a
//! layer can never be used after its dataset is gone.

use serde::{Deserialize, Serialize};

use crate::container::DatasetHandle;
use crate::dataset::Dataset;
use crate::error::{BagError, Result};
use crate::types::{DataType, GroupType, LayerType, Region};

/// One named field of a compound layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub data_type: DataType,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Multi-attribute per-node layer. No storage schema is defined for these
/// yet, so reads return nothing and writes are accepted and dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundLayer {
    definitions: Vec<FieldDefinition>,
}

impl CompoundLayer {
    pub fn new(definitions: Vec<FieldDefinition>) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &[FieldDefinition] {
        &self.definitions
    }

    /// Bytes of one record if every field were stored packed.
    pub fn record_size(&self) -> usize {
        self.definitions
            .iter()
            .map(|d| d.data_type.element_size())
            .sum()
    }
}

/// Physical storage variant of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// One 2-D dataset holding exactly this layer's values.
    Simple(DatasetHandle),
    /// One field of a packed legacy record shared with sibling layers.
    Interleaved {
        group: GroupType,
        handle: DatasetHandle,
    },
    Compound(CompoundLayer),
}

/// A registered layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    layer_type: LayerType,
    kind: LayerKind,
}

impl Layer {
    pub(crate) fn simple(layer_type: LayerType, handle: DatasetHandle) -> Self {
        Self {
            layer_type,
            kind: LayerKind::Simple(handle),
        }
    }

    pub(crate) fn interleaved(layer_type: LayerType, group: GroupType, handle: DatasetHandle) -> Self {
        Self {
            layer_type,
            kind: LayerKind::Interleaved { group, handle },
        }
    }

    pub(crate) fn compound(layer_type: LayerType, compound: CompoundLayer) -> Self {
        Self {
            layer_type,
            kind: LayerKind::Compound(compound),
        }
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.layer_type.data_type()
    }

    /// Bytes per node in buffers returned by `read`.
    pub fn element_size(&self) -> usize {
        self.data_type().element_size()
    }

    /// Bytes per node in physical storage.
    pub fn complex_element_size(&self) -> usize {
        match &self.kind {
            LayerKind::Simple(_) => self.element_size(),
            LayerKind::Interleaved { group, .. } => group.record_size(),
            LayerKind::Compound(compound) => compound.record_size(),
        }
    }

    /// Bytes needed to hold `region` as returned by `read`.
    pub fn read_buffer_size(&self, region: &Region) -> usize {
        match &self.kind {
            LayerKind::Simple(_) | LayerKind::Interleaved { .. } => {
                region.buffer_size(self.element_size())
            }
            LayerKind::Compound(_) => 0,
        }
    }

    /// Dataset handle backing this layer, if it has physical storage.
    pub fn handle(&self) -> Option<&DatasetHandle> {
        match &self.kind {
            LayerKind::Simple(handle) | LayerKind::Interleaved { handle, .. } => Some(handle),
            LayerKind::Compound(_) => None,
        }
    }
}

/// Extract one field of every packed record in `records`.
///
/// `records` holds `cols` records per row, `group.record_size()` bytes each.
/// The result holds the selected field only, in the same row-major order.
pub fn decode_interleaved(
    records: &[u8],
    group: GroupType,
    layer_type: LayerType,
    cols: usize,
) -> Result<Vec<u8>> {
    let offset = group.field_offset(layer_type).ok_or_else(|| {
        BagError::unsupported(format!("{} is not stored in {:?} records", layer_type, group))
    })?;
    let record_size = group.record_size();
    let field_size = layer_type.data_type().element_size();
    let row_bytes = cols * record_size;

    if row_bytes == 0 || records.len() % row_bytes != 0 {
        return Err(BagError::container(format!(
            "{} bytes is not a whole number of {}-record rows",
            records.len(),
            cols
        )));
    }

    let mut out = Vec::with_capacity(records.len() / record_size * field_size);
    for row in records.chunks_exact(row_bytes) {
        for record in row.chunks_exact(record_size) {
            out.extend_from_slice(&record[offset..offset + field_size]);
        }
    }

    Ok(out)
}

fn parse_extent(value: Option<serde_json::Value>) -> Option<f64> {
    value.and_then(|v| v.as_f64())
}

/// Read access to one layer of a dataset.
#[derive(Clone, Copy)]
pub struct LayerRef<'a> {
    dataset: &'a Dataset,
    layer: &'a Layer,
}

impl<'a> LayerRef<'a> {
    pub(crate) fn new(dataset: &'a Dataset, layer: &'a Layer) -> Self {
        Self { dataset, layer }
    }

    pub fn layer(&self) -> &'a Layer {
        self.layer
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer.layer_type()
    }

    pub fn data_type(&self) -> DataType {
        self.layer.data_type()
    }

    pub fn element_size(&self) -> usize {
        self.layer.element_size()
    }

    pub fn complex_element_size(&self) -> usize {
        self.layer.complex_element_size()
    }

    pub fn read_buffer_size(&self, region: &Region) -> usize {
        self.layer.read_buffer_size(region)
    }

    /// Read an inclusive region into a new buffer.
    pub fn read(&self, region: &Region) -> Result<Vec<u8>> {
        region.check(self.dataset.dims()?)?;

        let container = self.dataset.container();
        match &self.layer.kind {
            LayerKind::Simple(handle) => container.read_region(handle, region),
            LayerKind::Interleaved { group, handle } => {
                let scratch = container.read_region(handle, region)?;
                decode_interleaved(&scratch, *group, self.layer.layer_type, region.cols())
            }
            LayerKind::Compound(_) => Ok(Vec::new()),
        }
    }

    /// Read an inclusive region into a caller buffer of exactly
    /// `read_buffer_size(region)` bytes. On failure `buffer` is untouched.
    pub fn read_into(&self, region: &Region, buffer: &mut [u8]) -> Result<()> {
        let expected = self.read_buffer_size(region);
        if buffer.len() != expected {
            return Err(BagError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }

        let data = self.read(region)?;
        buffer.copy_from_slice(&data);
        Ok(())
    }

    /// Stored `(min, max)` of the layer, `None` if not yet computed.
    pub fn extents(&self) -> Result<Option<(f64, f64)>> {
        let LayerKind::Simple(handle) = &self.layer.kind else {
            return Ok(None);
        };

        let (min_name, max_name) = self.layer.layer_type.extents_attribute_names();
        let container = self.dataset.container();
        let min = parse_extent(container.read_attribute(&handle.path, min_name)?);
        let max = parse_extent(container.read_attribute(&handle.path, max_name)?);

        Ok(min.zip(max))
    }
}

/// Read-write access to one layer of a dataset.
pub struct LayerMut<'a> {
    dataset: &'a mut Dataset,
    layer_type: LayerType,
}

impl<'a> LayerMut<'a> {
    pub(crate) fn new(dataset: &'a mut Dataset, layer_type: LayerType) -> Self {
        Self {
            dataset,
            layer_type,
        }
    }

    /// Shared view of the same layer.
    pub fn view(&self) -> LayerRef<'_> {
        LayerRef::new(&*self.dataset, self.layer())
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn read(&self, region: &Region) -> Result<Vec<u8>> {
        self.view().read(region)
    }

    pub fn extents(&self) -> Result<Option<(f64, f64)>> {
        self.view().extents()
    }

    fn layer(&self) -> &Layer {
        // LayerMut is only constructed for registered types and layers are
        // never removed while it is borrowed.
        &self.dataset.layers[&self.layer_type]
    }

    /// Write an inclusive region from `buffer`.
    ///
    /// An empty buffer fails with `NullBuffer`; any failure leaves the
    /// stored values unchanged.
    pub fn write(&mut self, region: &Region, buffer: &[u8]) -> Result<()> {
        let dims = self.dataset.dims()?;
        let writable = self.dataset.is_writable();
        let location = self.dataset.location().to_string();

        let ds = &mut *self.dataset;
        let layer = &ds.layers[&self.layer_type];

        if let LayerKind::Interleaved { .. } = layer.kind {
            return Err(BagError::unsupported(format!(
                "{} is a legacy interleaved layer and is read-only",
                self.layer_type
            )));
        }
        if !writable {
            return Err(BagError::ReadOnly(location));
        }
        region.check(dims)?;

        let handle = match &layer.kind {
            LayerKind::Simple(handle) => handle,
            // No schema to store yet.
            LayerKind::Compound(_) | LayerKind::Interleaved { .. } => return Ok(()),
        };

        if buffer.is_empty() {
            return Err(BagError::NullBuffer);
        }

        let expected = layer.read_buffer_size(region);
        if buffer.len() != expected {
            return Err(BagError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }

        ds.container.write_region(handle, region, buffer)
    }

    /// Store the layer's `(min, max)` as attributes on its dataset.
    pub fn set_extents(&mut self, min: f64, max: f64) -> Result<()> {
        let writable = self.dataset.is_writable();
        let location = self.dataset.location().to_string();

        let ds = &mut *self.dataset;
        let layer = &ds.layers[&self.layer_type];
        let LayerKind::Simple(handle) = &layer.kind else {
            return Err(BagError::unsupported(format!(
                "{} has no dataset to hold extents",
                self.layer_type
            )));
        };

        if !writable {
            return Err(BagError::ReadOnly(location));
        }

        let (min_name, max_name) = self.layer_type.extents_attribute_names();
        ds.container
            .write_attribute(&handle.path, min_name, serde_json::json!(min))?;
        ds.container
            .write_attribute(&handle.path, max_name, serde_json::json!(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::StorageElement;

    fn node_records(values: &[(f32, u32)]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|(h, n)| {
                let mut rec = h.to_ne_bytes().to_vec();
                rec.extend_from_slice(&n.to_ne_bytes());
                rec
            })
            .collect()
    }

    fn solution_records(values: &[(f32, f32, u32)]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|(s, d, n)| {
                let mut rec = s.to_ne_bytes().to_vec();
                rec.extend_from_slice(&d.to_ne_bytes());
                rec.extend_from_slice(&n.to_ne_bytes());
                rec
            })
            .collect()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn uints(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_decode_node_group() {
        let values = [(0.5, 1), (1.5, 2), (2.5, 3), (3.5, 4), (4.5, 5), (5.5, 6)];
        let records = node_records(&values);

        let strength =
            decode_interleaved(&records, GroupType::Node, LayerType::HypothesisStrength, 3).unwrap();
        assert_eq!(floats(&strength), vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);

        let count = decode_interleaved(&records, GroupType::Node, LayerType::NumHypotheses, 3).unwrap();
        assert_eq!(uints(&count), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_decode_elevation_solution_group() {
        let values = [(-10.0, 0.25, 7), (-11.0, 0.5, 8), (-12.0, 0.75, 9), (-13.0, 1.0, 10)];
        let records = solution_records(&values);
        let g = GroupType::ElevationSolution;

        let shoal = decode_interleaved(&records, g, LayerType::ShoalElevation, 2).unwrap();
        assert_eq!(floats(&shoal), vec![-10.0, -11.0, -12.0, -13.0]);

        let std_dev = decode_interleaved(&records, g, LayerType::StdDev, 2).unwrap();
        assert_eq!(floats(&std_dev), vec![0.25, 0.5, 0.75, 1.0]);

        let soundings = decode_interleaved(&records, g, LayerType::NumSoundings, 2).unwrap();
        assert_eq!(uints(&soundings), vec![7, 8, 9, 10]);
    }

    #[test]
    fn test_decode_rejects_foreign_field() {
        let records = node_records(&[(1.0, 1)]);
        assert!(matches!(
            decode_interleaved(&records, GroupType::Node, LayerType::StdDev, 1),
            Err(BagError::Unsupported(_))
        ));
    }

    #[test]
    fn test_decode_rejects_partial_rows() {
        let records = node_records(&[(1.0, 1), (2.0, 2), (3.0, 3)]);
        assert!(decode_interleaved(&records, GroupType::Node, LayerType::NumHypotheses, 2).is_err());
    }

    #[test]
    fn test_element_sizes_by_kind() {
        let handle = DatasetHandle {
            path: "/BAG_root/elevation_solution".to_string(),
            element: StorageElement::Record(12),
        };
        let layer = Layer::interleaved(LayerType::StdDev, GroupType::ElevationSolution, handle);
        assert_eq!(layer.element_size(), 4);
        assert_eq!(layer.complex_element_size(), 12);
        assert_eq!(layer.read_buffer_size(&Region::new(0, 0, 1, 2)), 24);

        let compound = Layer::compound(
            LayerType::AverageElevation,
            CompoundLayer::new(vec![
                FieldDefinition::new("depth", DataType::Float32),
                FieldDefinition::new("count", DataType::UInt32),
            ]),
        );
        assert_eq!(compound.complex_element_size(), 8);
        assert_eq!(compound.read_buffer_size(&Region::new(0, 0, 1, 2)), 0);
        assert!(compound.handle().is_none());
    }
}
