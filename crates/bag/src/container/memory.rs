//! In-memory container.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{parent_groups, Container, DatasetHandle, DatasetSpec, StorageElement};
use crate::error::{BagError, Result};
use crate::types::Region;

#[derive(Debug, Clone)]
struct MemoryDataset {
    dims: (u32, u32),
    element: StorageElement,
    chunk_dims: Option<(u32, u32)>,
    compression_level: u8,
    data: Vec<u8>,
    attributes: Map<String, Value>,
}

#[derive(Debug, Clone)]
enum Node {
    Group(Map<String, Value>),
    Dataset(MemoryDataset),
}

/// A complete container hierarchy held in memory.
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    name: String,
    writable: bool,
    nodes: BTreeMap<String, Node>,
}

impl MemoryContainer {
    /// Create an empty, writable container.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writable: true,
            nodes: BTreeMap::new(),
        }
    }

    /// A read-only view of this container's current contents.
    pub fn read_only(&self) -> Self {
        Self {
            writable: false,
            ..self.clone()
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(BagError::ReadOnly(self.name.clone()))
        }
    }

    fn dataset(&self, handle: &DatasetHandle) -> Result<&MemoryDataset> {
        match self.nodes.get(&handle.path) {
            Some(Node::Dataset(ds)) => Ok(ds),
            _ => Err(BagError::container(format!(
                "no dataset at {} in {}",
                handle.path, self.name
            ))),
        }
    }

    fn ensure_parents(&mut self, path: &str) {
        for parent in parent_groups(path) {
            self.nodes
                .entry(parent)
                .or_insert_with(|| Node::Group(Map::new()));
        }
    }
}

/// Check a region against a dataset shape, reported as a container failure.
fn check_region(ds: &MemoryDataset, region: &Region) -> Result<()> {
    region
        .check(ds.dims)
        .map_err(|e| BagError::container(e.to_string()))
}

impl Container for MemoryContainer {
    fn location(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn group_exists(&self, path: &str) -> Result<bool> {
        Ok(matches!(self.nodes.get(path), Some(Node::Group(_))))
    }

    fn create_group(&mut self, path: &str) -> Result<()> {
        self.check_writable()?;
        if let Some(Node::Dataset(_)) = self.nodes.get(path) {
            return Err(BagError::container(format!("{} is a dataset", path)));
        }
        self.ensure_parents(path);
        self.nodes
            .entry(path.to_string())
            .or_insert_with(|| Node::Group(Map::new()));
        Ok(())
    }

    fn read_attribute(&self, node: &str, name: &str) -> Result<Option<Value>> {
        let attrs = match self.nodes.get(node) {
            Some(Node::Group(attrs)) => attrs,
            Some(Node::Dataset(ds)) => &ds.attributes,
            None => return Ok(None),
        };
        Ok(attrs.get(name).cloned())
    }

    fn write_attribute(&mut self, node: &str, name: &str, value: Value) -> Result<()> {
        self.check_writable()?;
        let attrs = match self.nodes.get_mut(node) {
            Some(Node::Group(attrs)) => attrs,
            Some(Node::Dataset(ds)) => &mut ds.attributes,
            None => return Err(BagError::not_found(node.to_string())),
        };
        attrs.insert(name.to_string(), value);
        Ok(())
    }

    fn open_dataset(&self, path: &str) -> Result<Option<DatasetHandle>> {
        Ok(match self.nodes.get(path) {
            Some(Node::Dataset(ds)) => Some(DatasetHandle {
                path: path.to_string(),
                element: ds.element,
            }),
            _ => None,
        })
    }

    fn create_dataset(&mut self, path: &str, spec: &DatasetSpec) -> Result<DatasetHandle> {
        self.check_writable()?;
        if self.nodes.contains_key(path) {
            return Err(BagError::AlreadyExists(path.to_string()));
        }
        if spec.fill.len() != spec.element.size() {
            return Err(BagError::BufferSize {
                expected: spec.element.size(),
                actual: spec.fill.len(),
            });
        }

        let count = spec.dims.0 as usize * spec.dims.1 as usize;
        let data = spec.fill.repeat(count);

        self.ensure_parents(path);
        self.nodes.insert(
            path.to_string(),
            Node::Dataset(MemoryDataset {
                dims: spec.dims,
                element: spec.element,
                chunk_dims: spec.chunk_dims,
                compression_level: spec.compression_level,
                data,
                attributes: Map::new(),
            }),
        );

        Ok(DatasetHandle {
            path: path.to_string(),
            element: spec.element,
        })
    }

    fn read_region(&self, handle: &DatasetHandle, region: &Region) -> Result<Vec<u8>> {
        let ds = self.dataset(handle)?;
        check_region(ds, region)?;

        let elem = ds.element.size();
        let row_bytes = region.cols() * elem;
        let stride = ds.dims.1 as usize * elem;
        let mut out = Vec::with_capacity(region.buffer_size(elem));

        for row in region.row_start..=region.row_end {
            let start = row as usize * stride + region.col_start as usize * elem;
            out.extend_from_slice(&ds.data[start..start + row_bytes]);
        }

        Ok(out)
    }

    fn write_region(&mut self, handle: &DatasetHandle, region: &Region, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        let name = self.name.clone();
        let ds = match self.nodes.get_mut(&handle.path) {
            Some(Node::Dataset(ds)) => ds,
            _ => {
                return Err(BagError::container(format!(
                    "no dataset at {} in {}",
                    handle.path, name
                )))
            }
        };
        check_region(ds, region)?;

        let elem = ds.element.size();
        let expected = region.buffer_size(elem);
        if data.len() != expected {
            return Err(BagError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let row_bytes = region.cols() * elem;
        let stride = ds.dims.1 as usize * elem;
        for (i, src) in data.chunks_exact(row_bytes).enumerate() {
            let row = region.row_start as usize + i;
            let start = row * stride + region.col_start as usize * elem;
            ds.data[start..start + row_bytes].copy_from_slice(src);
        }

        Ok(())
    }

    fn shape(&self, handle: &DatasetHandle) -> Result<(u32, u32)> {
        Ok(self.dataset(handle)?.dims)
    }

    fn compression_level(&self, handle: &DatasetHandle) -> Result<u32> {
        Ok(self.dataset(handle)?.compression_level as u32)
    }

    fn chunk_dims(&self, handle: &DatasetHandle) -> Result<Option<(u32, u32)>> {
        Ok(self.dataset(handle)?.chunk_dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn test_create_and_read_fill() {
        let mut c = MemoryContainer::new("mem");
        let spec = DatasetSpec::new((3, 4), StorageElement::Float32)
            .with_fill(7.5f32.to_ne_bytes().to_vec());
        let h = c.create_dataset("/BAG_root/elevation", &spec).unwrap();

        assert!(c.group_exists("/BAG_root").unwrap());
        assert_eq!(c.shape(&h).unwrap(), (3, 4));

        let bytes = c.read_region(&h, &Region::new(1, 1, 2, 2)).unwrap();
        assert_eq!(bytes, float_bytes(&[7.5; 4]));
    }

    #[test]
    fn test_write_then_read_subregion() {
        let mut c = MemoryContainer::new("mem");
        let h = c
            .create_dataset("/d", &DatasetSpec::new((4, 4), StorageElement::Float32))
            .unwrap();

        let region = Region::new(1, 2, 2, 3);
        c.write_region(&h, &region, &float_bytes(&[1.0, 2.0, 3.0, 4.0]))
            .unwrap();

        let row1 = c.read_region(&h, &Region::new(1, 0, 1, 3)).unwrap();
        assert_eq!(row1, float_bytes(&[0.0, 0.0, 1.0, 2.0]));
        let row2 = c.read_region(&h, &Region::new(2, 0, 2, 3)).unwrap();
        assert_eq!(row2, float_bytes(&[0.0, 0.0, 3.0, 4.0]));
    }

    #[test]
    fn test_wrong_size_write_leaves_data_unchanged() {
        let mut c = MemoryContainer::new("mem");
        let h = c
            .create_dataset("/d", &DatasetSpec::new((2, 2), StorageElement::UInt32))
            .unwrap();

        let err = c
            .write_region(&h, &Region::new(0, 0, 1, 1), &[1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, BagError::BufferSize { expected: 16, actual: 3 }));
        assert_eq!(c.read_region(&h, &Region::full((2, 2))).unwrap(), vec![0; 16]);
    }

    #[test]
    fn test_attributes() {
        let mut c = MemoryContainer::new("mem");
        c.create_group("/BAG_root").unwrap();
        c.write_attribute("/BAG_root", "Bag Version", Value::from("1.6.0"))
            .unwrap();

        assert_eq!(
            c.read_attribute("/BAG_root", "Bag Version").unwrap(),
            Some(Value::from("1.6.0"))
        );
        assert_eq!(c.read_attribute("/BAG_root", "missing").unwrap(), None);
        assert_eq!(c.read_attribute("/nowhere", "x").unwrap(), None);
        assert!(c.write_attribute("/nowhere", "x", Value::Null).is_err());
    }

    #[test]
    fn test_read_only_view_rejects_mutation() {
        let mut c = MemoryContainer::new("mem");
        c.create_group("/g").unwrap();
        let mut ro = c.read_only();
        assert!(!ro.is_writable());
        assert!(matches!(ro.create_group("/h"), Err(BagError::ReadOnly(_))));
        assert!(ro.group_exists("/g").unwrap());
    }

    #[test]
    fn test_open_missing_dataset_is_none() {
        let c = MemoryContainer::new("mem");
        assert_eq!(c.open_dataset("/BAG_root/uncertainty").unwrap(), None);
    }
}
