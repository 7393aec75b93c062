//! Internal container paths and attribute names.
//!
//! These strings are part of the on-disk format and must match existing
//! containers byte for byte.

/// Root group holding every BAG node.
pub const ROOT_PATH: &str = "/BAG_root";

/// Format version attribute on the root group.
pub const BAG_VERSION_NAME: &str = "Bag Version";

/// Format version written by this crate.
pub const BAG_VERSION: &str = "1.6.0";

pub const ELEVATION_PATH: &str = "/BAG_root/elevation";
pub const UNCERTAINTY_PATH: &str = "/BAG_root/uncertainty";
pub const AVERAGE_PATH: &str = "/BAG_root/average";
pub const NOMINAL_ELEVATION_PATH: &str = "/BAG_root/nominal_elevation";

/// Legacy packed hypothesis records (strength + count).
pub const NODE_GROUP_PATH: &str = "/BAG_root/node";

/// Legacy packed elevation-solution records (shoal, std dev, sounding count).
pub const ELEVATION_SOLUTION_GROUP_PATH: &str = "/BAG_root/elevation_solution";

pub const TRACKING_LIST_PATH: &str = "/BAG_root/tracking_list";
pub const TRACKING_LIST_LENGTH_NAME: &str = "Tracking List Length";
pub const TRACKING_LIST_ITEMS_NAME: &str = "Tracking List Items";

pub const METADATA_PATH: &str = "/BAG_root/metadata";

/// Attribute on [`METADATA_PATH`] holding the XML document.
pub const METADATA_XML_NAME: &str = "xml";

pub const MIN_ELEVATION_NAME: &str = "Minimum Elevation Value";
pub const MAX_ELEVATION_NAME: &str = "Maximum Elevation Value";
pub const MIN_UNCERTAINTY_NAME: &str = "Minimum Uncertainty Value";
pub const MAX_UNCERTAINTY_NAME: &str = "Maximum Uncertainty Value";
pub const MIN_VALUE_NAME: &str = "Minimum Value";
pub const MAX_VALUE_NAME: &str = "Maximum Value";
