//! Core types shared across the dataset, layers and API surface.

use serde::{Deserialize, Serialize};

use crate::error::{BagError, Result};
use crate::paths;

/// The closed set of recognized layer roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerType {
    Elevation,
    Uncertainty,
    HypothesisStrength,
    NumHypotheses,
    ShoalElevation,
    StdDev,
    NumSoundings,
    AverageElevation,
    NominalElevation,
}

impl LayerType {
    /// Every layer type, in code order.
    pub const ALL: [LayerType; 9] = [
        Self::Elevation,
        Self::Uncertainty,
        Self::HypothesisStrength,
        Self::NumHypotheses,
        Self::ShoalElevation,
        Self::StdDev,
        Self::NumSoundings,
        Self::AverageElevation,
        Self::NominalElevation,
    ];

    /// Element type stored for this layer.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Elevation
            | Self::Uncertainty
            | Self::HypothesisStrength
            | Self::ShoalElevation
            | Self::StdDev
            | Self::AverageElevation
            | Self::NominalElevation => DataType::Float32,
            Self::NumHypotheses | Self::NumSoundings => DataType::UInt32,
        }
    }

    /// Dedicated container path, or `None` for types that only exist inside
    /// a packed legacy record.
    pub fn internal_path(&self) -> Option<&'static str> {
        match self {
            Self::Elevation => Some(paths::ELEVATION_PATH),
            Self::Uncertainty => Some(paths::UNCERTAINTY_PATH),
            Self::AverageElevation => Some(paths::AVERAGE_PATH),
            Self::NominalElevation => Some(paths::NOMINAL_ELEVATION_PATH),
            Self::HypothesisStrength
            | Self::NumHypotheses
            | Self::ShoalElevation
            | Self::StdDev
            | Self::NumSoundings => None,
        }
    }

    /// Legacy group this type is packed into, if any.
    pub fn interleaved_group(&self) -> Option<GroupType> {
        match self {
            Self::HypothesisStrength | Self::NumHypotheses => Some(GroupType::Node),
            Self::ShoalElevation | Self::StdDev | Self::NumSoundings => {
                Some(GroupType::ElevationSolution)
            }
            _ => None,
        }
    }

    /// Value written into nodes that carry no data.
    pub fn null_value(&self) -> NullValue {
        match self.data_type() {
            DataType::Float32 => NullValue::Float(NULL_FLOAT),
            DataType::UInt32 => NullValue::UInt(NULL_UINT),
        }
    }

    /// Names of the min/max attributes stored on this layer's dataset.
    pub fn extents_attribute_names(&self) -> (&'static str, &'static str) {
        match self {
            Self::Elevation => (paths::MIN_ELEVATION_NAME, paths::MAX_ELEVATION_NAME),
            Self::Uncertainty => (paths::MIN_UNCERTAINTY_NAME, paths::MAX_UNCERTAINTY_NAME),
            _ => (paths::MIN_VALUE_NAME, paths::MAX_VALUE_NAME),
        }
    }

    /// Stable name used by the CLI and in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elevation => "elevation",
            Self::Uncertainty => "uncertainty",
            Self::HypothesisStrength => "hypothesis_strength",
            Self::NumHypotheses => "num_hypotheses",
            Self::ShoalElevation => "shoal_elevation",
            Self::StdDev => "std_dev",
            Self::NumSoundings => "num_soundings",
            Self::AverageElevation => "average_elevation",
            Self::NominalElevation => "nominal_elevation",
        }
    }

    /// Numeric code used at the API boundary.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Inverse of [`LayerType::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl std::str::FromStr for LayerType {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| BagError::not_found(format!("unknown layer type '{}'", s)))
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Null value for float layers.
pub const NULL_FLOAT: f32 = 1_000_000.0;

/// Null value for unsigned integer layers.
pub const NULL_UINT: u32 = 0;

/// Null value of a layer, typed by its element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NullValue {
    Float(f32),
    UInt(u32),
}

impl NullValue {
    /// Native-endian bytes of the value.
    pub fn to_ne_bytes(&self) -> [u8; 4] {
        match self {
            Self::Float(v) => v.to_ne_bytes(),
            Self::UInt(v) => v.to_ne_bytes(),
        }
    }
}

/// Element type of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Float32,
    UInt32,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            Self::Float32 => std::mem::size_of::<f32>(),
            Self::UInt32 => std::mem::size_of::<u32>(),
        }
    }
}

/// Access mode a dataset is opened with; fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Layout of a packed legacy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupType {
    /// `{ hyp_strength: f32, num_hypotheses: u32 }`
    Node,
    /// `{ shoal_elevation: f32, stddev: f32, num_soundings: u32 }`
    ElevationSolution,
}

impl GroupType {
    /// Container path of the packed dataset.
    pub fn internal_path(&self) -> &'static str {
        match self {
            Self::Node => paths::NODE_GROUP_PATH,
            Self::ElevationSolution => paths::ELEVATION_SOLUTION_GROUP_PATH,
        }
    }

    /// Layer types packed into one record, in field order.
    pub fn layer_types(&self) -> &'static [LayerType] {
        match self {
            Self::Node => &[LayerType::HypothesisStrength, LayerType::NumHypotheses],
            Self::ElevationSolution => &[
                LayerType::ShoalElevation,
                LayerType::StdDev,
                LayerType::NumSoundings,
            ],
        }
    }

    /// Size in bytes of one packed record.
    pub fn record_size(&self) -> usize {
        self.layer_types()
            .iter()
            .map(|t| t.data_type().element_size())
            .sum()
    }

    /// Byte offset of `layer_type`'s field within a record.
    pub fn field_offset(&self, layer_type: LayerType) -> Option<usize> {
        let mut offset = 0;
        for t in self.layer_types() {
            if *t == layer_type {
                return Some(offset);
            }
            offset += t.data_type().element_size();
        }
        None
    }
}

/// Inclusive rectangular region of grid nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub row_start: u32,
    pub col_start: u32,
    pub row_end: u32,
    pub col_end: u32,
}

impl Region {
    /// Create a new region; bounds are inclusive.
    pub fn new(row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Self {
        Self {
            row_start,
            col_start,
            row_end,
            col_end,
        }
    }

    /// Region covering a whole `(rows, cols)` grid.
    pub fn full(dims: (u32, u32)) -> Self {
        Self::new(0, 0, dims.0.saturating_sub(1), dims.1.saturating_sub(1))
    }

    /// Number of rows covered.
    pub fn rows(&self) -> usize {
        (self.row_end as usize).saturating_sub(self.row_start as usize) + 1
    }

    /// Number of columns covered.
    pub fn cols(&self) -> usize {
        (self.col_end as usize).saturating_sub(self.col_start as usize) + 1
    }

    /// Number of nodes covered.
    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Bytes needed for the region at `element_size` bytes per node.
    pub fn buffer_size(&self, element_size: usize) -> usize {
        self.len() * element_size
    }

    /// Check the region against a `(rows, cols)` grid shape.
    pub fn check(&self, dims: (u32, u32)) -> Result<()> {
        let (num_rows, num_cols) = dims;
        if self.row_start > self.row_end
            || self.col_start > self.col_end
            || self.row_end >= num_rows
            || self.col_end >= num_cols
        {
            return Err(BagError::out_of_bounds(
                self.to_string(),
                format!("{}x{}", num_rows, num_cols),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows {}..={}, cols {}..={}",
            self.row_start, self.row_end, self.col_start, self.col_end
        )
    }
}

/// Parsed `major.minor.revision` format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl FormatVersion {
    /// Parse a version string; missing components default to zero.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.trim().trim_end_matches('\0').split('.');
        let mut next = |name: &str| -> Result<u32> {
            match parts.next() {
                Some(p) => p.trim().parse().map_err(|_| {
                    BagError::invalid_metadata(format!("bad {} in version '{}'", name, s))
                }),
                None => Ok(0),
            }
        };
        Ok(Self {
            major: next("major")?,
            minor: next("minor")?,
            revision: next("revision")?,
        })
    }

    /// Layouts before 2.0 pack optional layers into compound records.
    pub fn is_legacy(&self) -> bool {
        self.major < 2
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_data_types() {
        assert_eq!(LayerType::Elevation.data_type(), DataType::Float32);
        assert_eq!(LayerType::NumHypotheses.data_type(), DataType::UInt32);
        assert_eq!(LayerType::NumSoundings.data_type(), DataType::UInt32);
        for t in LayerType::ALL {
            assert_eq!(t.data_type().element_size(), 4);
        }
    }

    #[test]
    fn test_interleaved_types_have_no_path() {
        for t in LayerType::ALL {
            assert_eq!(t.internal_path().is_none(), t.interleaved_group().is_some());
        }
        assert_eq!(LayerType::Elevation.internal_path(), Some("/BAG_root/elevation"));
    }

    #[test]
    fn test_layer_codes_round_trip() {
        for t in LayerType::ALL {
            assert_eq!(LayerType::from_code(t.code()), Some(t));
        }
        assert_eq!(LayerType::from_code(9), None);
        assert_eq!(LayerType::NominalElevation.code(), 8);
    }

    #[test]
    fn test_layer_from_str() {
        assert_eq!("Elevation".parse::<LayerType>().unwrap(), LayerType::Elevation);
        assert_eq!("std-dev".parse::<LayerType>().unwrap(), LayerType::StdDev);
        assert!("depth".parse::<LayerType>().is_err());
    }

    #[test]
    fn test_node_group_layout() {
        let g = GroupType::Node;
        assert_eq!(g.record_size(), 8);
        assert_eq!(g.field_offset(LayerType::HypothesisStrength), Some(0));
        assert_eq!(g.field_offset(LayerType::NumHypotheses), Some(4));
        assert_eq!(g.field_offset(LayerType::StdDev), None);
    }

    #[test]
    fn test_elevation_solution_layout() {
        let g = GroupType::ElevationSolution;
        assert_eq!(g.record_size(), 12);
        assert_eq!(g.field_offset(LayerType::ShoalElevation), Some(0));
        assert_eq!(g.field_offset(LayerType::StdDev), Some(4));
        assert_eq!(g.field_offset(LayerType::NumSoundings), Some(8));
        assert_eq!(g.field_offset(LayerType::HypothesisStrength), None);
    }

    #[test]
    fn test_region_sizes() {
        let r = Region::new(2, 3, 4, 7);
        assert_eq!(r.rows(), 3);
        assert_eq!(r.cols(), 5);
        assert_eq!(r.buffer_size(4), 60);
        assert_eq!(Region::full((100, 50)), Region::new(0, 0, 99, 49));
    }

    #[test]
    fn test_region_check() {
        let dims = (10, 5);
        assert!(Region::new(0, 0, 9, 4).check(dims).is_ok());
        assert!(matches!(
            Region::new(0, 0, 10, 4).check(dims),
            Err(BagError::OutOfBounds { .. })
        ));
        assert!(Region::new(0, 0, 9, 5).check(dims).is_err());
        assert!(Region::new(3, 0, 2, 4).check(dims).is_err());
        assert!(Region::new(0, 3, 9, 2).check(dims).is_err());
    }

    #[test]
    fn test_format_version() {
        let v = FormatVersion::parse("1.6.0").unwrap();
        assert_eq!(v, FormatVersion { major: 1, minor: 6, revision: 0 });
        assert!(v.is_legacy());
        assert!(!FormatVersion::parse("2.0.1").unwrap().is_legacy());
        assert_eq!(FormatVersion::parse("1.5\0\0").unwrap().minor, 5);
        assert!(FormatVersion::parse("one.two").is_err());
    }

    #[test]
    fn test_null_values() {
        assert_eq!(LayerType::Elevation.null_value(), NullValue::Float(1_000_000.0));
        assert_eq!(LayerType::NumSoundings.null_value(), NullValue::UInt(0));
    }
}
