//! Tracking list: an ordered log of edits made to individual grid nodes.

use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::error::{BagError, Result};
use crate::paths::{TRACKING_LIST_ITEMS_NAME, TRACKING_LIST_LENGTH_NAME, TRACKING_LIST_PATH};

/// One edit record for a grid node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingItem {
    pub row: u32,
    pub col: u32,
    /// Depth before the edit.
    pub depth: f32,
    /// Uncertainty before the edit.
    pub uncertainty: f32,
    /// Reason code for the edit.
    pub track_code: u8,
    /// Index of the metadata lineage entry that produced the edit.
    pub list_series: u16,
}

impl TrackingItem {
    pub fn new(row: u32, col: u32, depth: f32, uncertainty: f32, track_code: u8, list_series: u16) -> Self {
        Self {
            row,
            col,
            depth,
            uncertainty,
            track_code,
            list_series,
        }
    }
}

/// Ordered collection of [`TrackingItem`]s, insertion order by default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingList {
    items: Vec<TrackingItem>,
}

impl TrackingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`.
    pub fn at(&self, index: usize) -> Result<&TrackingItem> {
        self.items.get(index).ok_or(BagError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    pub fn append(&mut self, item: TrackingItem) {
        self.items.push(item);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackingItem> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[TrackingItem] {
        &self.items
    }

    /// Stable sort by `(row, col)`.
    pub fn sort_by_node(&mut self) {
        self.items.sort_by_key(|item| (item.row, item.col));
    }

    /// Stable sort by series index.
    pub fn sort_by_series(&mut self) {
        self.items.sort_by_key(|item| item.list_series);
    }

    /// Stable sort by reason code.
    pub fn sort_by_code(&mut self) {
        self.items.sort_by_key(|item| item.track_code);
    }

    /// Items recorded against one node, in list order.
    pub fn items_at_node(&self, row: u32, col: u32) -> Vec<TrackingItem> {
        self.filtered(|item| item.row == row && item.col == col)
    }

    /// Items with the given reason code, in list order.
    pub fn items_with_code(&self, code: u8) -> Vec<TrackingItem> {
        self.filtered(|item| item.track_code == code)
    }

    /// Items from the given lineage series, in list order.
    pub fn items_in_series(&self, series: u16) -> Vec<TrackingItem> {
        self.filtered(|item| item.list_series == series)
    }

    fn filtered(&self, pred: impl Fn(&TrackingItem) -> bool) -> Vec<TrackingItem> {
        self.items.iter().copied().filter(|item| pred(item)).collect()
    }

    /// Load the list stored in a container; an absent list is empty.
    pub fn load(container: &dyn Container) -> Result<Self> {
        if !container.group_exists(TRACKING_LIST_PATH)? {
            return Ok(Self::new());
        }

        let items: Vec<TrackingItem> =
            match container.read_attribute(TRACKING_LIST_PATH, TRACKING_LIST_ITEMS_NAME)? {
                Some(value) => serde_json::from_value(value)?,
                None => Vec::new(),
            };

        if let Some(len) = container
            .read_attribute(TRACKING_LIST_PATH, TRACKING_LIST_LENGTH_NAME)?
            .and_then(|v| v.as_u64())
        {
            if len as usize != items.len() {
                return Err(BagError::invalid_metadata(format!(
                    "tracking list length {} but {} items stored",
                    len,
                    items.len()
                )));
            }
        }

        Ok(Self { items })
    }

    /// Persist the list into a container, replacing any stored list.
    pub fn save(&self, container: &mut dyn Container) -> Result<()> {
        container.create_group(TRACKING_LIST_PATH)?;
        container.write_attribute(
            TRACKING_LIST_PATH,
            TRACKING_LIST_LENGTH_NAME,
            serde_json::json!(self.items.len()),
        )?;
        container.write_attribute(
            TRACKING_LIST_PATH,
            TRACKING_LIST_ITEMS_NAME,
            serde_json::to_value(&self.items)?,
        )?;

        tracing::debug!(
            container = container.location(),
            items = self.items.len(),
            "Saved tracking list"
        );

        Ok(())
    }
}

impl<'a> IntoIterator for &'a TrackingList {
    type Item = &'a TrackingItem;
    type IntoIter = std::slice::Iter<'a, TrackingItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;

    fn item(row: u32, col: u32, code: u8, series: u16, depth: f32) -> TrackingItem {
        TrackingItem::new(row, col, depth, 0.5, code, series)
    }

    #[test]
    fn test_append_and_at() {
        let mut list = TrackingList::new();
        assert!(list.is_empty());
        list.append(item(1, 2, 3, 4, 10.0));

        assert_eq!(list.len(), 1);
        assert_eq!(list.at(0).unwrap().col, 2);
        assert!(matches!(
            list.at(1),
            Err(BagError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_sort_by_node_is_stable() {
        let mut list = TrackingList::new();
        list.append(item(5, 1, 0, 0, 1.0));
        list.append(item(2, 3, 0, 0, 2.0));
        list.append(item(5, 1, 0, 0, 3.0));
        list.append(item(2, 0, 0, 0, 4.0));

        list.sort_by_node();
        let depths: Vec<f32> = list.iter().map(|i| i.depth).collect();
        assert_eq!(depths, vec![4.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_sort_by_series_and_code_are_stable() {
        let mut list = TrackingList::new();
        list.append(item(0, 0, 2, 1, 1.0));
        list.append(item(0, 0, 1, 0, 2.0));
        list.append(item(0, 0, 2, 1, 3.0));
        list.append(item(0, 0, 1, 0, 4.0));

        list.sort_by_series();
        let depths: Vec<f32> = list.iter().map(|i| i.depth).collect();
        assert_eq!(depths, vec![2.0, 4.0, 1.0, 3.0]);

        list.sort_by_code();
        let depths: Vec<f32> = list.iter().map(|i| i.depth).collect();
        assert_eq!(depths, vec![2.0, 4.0, 1.0, 3.0]);
    }

    #[test]
    fn test_queries() {
        let mut list = TrackingList::new();
        list.append(item(1, 1, 7, 0, 1.0));
        list.append(item(1, 2, 7, 1, 2.0));
        list.append(item(1, 1, 3, 1, 3.0));

        assert_eq!(list.items_at_node(1, 1).len(), 2);
        assert_eq!(list.items_with_code(7).len(), 2);
        assert_eq!(list.items_in_series(1)[1].depth, 3.0);
        assert!(list.items_at_node(9, 9).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let mut container = MemoryContainer::new("mem");
        assert!(TrackingList::load(&container).unwrap().is_empty());

        let mut list = TrackingList::new();
        list.append(item(3, 4, 1, 2, -12.5));
        list.append(item(0, 9, 2, 0, -3.25));
        list.save(&mut container).unwrap();

        let loaded = TrackingList::load(&container).unwrap();
        assert_eq!(loaded, list);
    }
}
