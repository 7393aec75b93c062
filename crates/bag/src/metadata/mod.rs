//! Dataset metadata: grid description, georeference and provenance.
//!
//! A [`MetadataRecord`] is plain data, produced by the XML importer or built
//! in code. [`Metadata`] wraps one for the lifetime of a dataset and is
//! immutable once constructed.

mod xml;

pub use xml::{export_to_xml, import_from_xml_buffer, import_from_xml_file};

use serde::{Deserialize, Serialize};

use crate::config::ImportConfig;
use crate::container::Container;
use crate::error::{BagError, Result};
use crate::paths::{METADATA_PATH, METADATA_XML_NAME};
use crate::transform::Georeference;

/// Grid shape, resolution and corner points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRepresentation {
    pub num_rows: u32,
    pub num_cols: u32,
    pub row_resolution: f64,
    pub col_resolution: f64,
    /// Unit of both resolutions, typically `Metres`.
    pub resolution_unit: String,
    /// `point` or `area`.
    pub cell_geometry: String,
    pub ll_corner_x: f64,
    pub ll_corner_y: f64,
    pub ur_corner_x: f64,
    pub ur_corner_y: f64,
}

/// A coordinate reference system identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSystem {
    /// The definition itself, usually WKT or an EPSG code.
    pub definition: String,
    /// Code space of the definition (`WKT`, `EPSG`, ...).
    pub kind: String,
}

/// One lineage entry; tracking list items refer to these by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub description: String,
    pub date_time: String,
    pub tracking_id: String,
}

/// Structured metadata record as produced by the importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub file_identifier: String,
    pub language: String,
    pub date_stamp: String,
    pub contact_name: String,
    pub title: String,
    pub abstract_text: String,
    pub spatial: SpatialRepresentation,
    pub horizontal_reference: ReferenceSystem,
    pub vertical_reference: ReferenceSystem,
    pub lineage: Vec<ProcessStep>,
}

impl MetadataRecord {
    /// Record for a `(rows, cols)` grid anchored at the lower-left corner.
    ///
    /// The upper-right corner is derived from the shape and resolution; the
    /// identifier is a fresh UUID and the date stamp is today.
    pub fn for_grid(
        dims: (u32, u32),
        ll_corner: (f64, f64),
        resolution: (f64, f64),
    ) -> Self {
        let geo = Georeference::from_corner(ll_corner.0, ll_corner.1, resolution.0, resolution.1, dims);

        Self {
            file_identifier: uuid::Uuid::new_v4().to_string(),
            language: "en".to_string(),
            date_stamp: chrono::Utc::now().format("%Y-%m-%d").to_string(),
            contact_name: String::new(),
            title: String::new(),
            abstract_text: String::new(),
            spatial: SpatialRepresentation {
                num_rows: dims.0,
                num_cols: dims.1,
                row_resolution: resolution.0,
                col_resolution: resolution.1,
                resolution_unit: "Metres".to_string(),
                cell_geometry: "point".to_string(),
                ll_corner_x: geo.ll_x,
                ll_corner_y: geo.ll_y,
                ur_corner_x: geo.ur_x,
                ur_corner_y: geo.ur_y,
            },
            horizontal_reference: ReferenceSystem::default(),
            vertical_reference: ReferenceSystem::default(),
            lineage: Vec::new(),
        }
    }

    /// Check that the grid description is usable for addressing.
    pub fn validate(&self) -> Result<()> {
        let s = &self.spatial;

        if s.num_rows == 0 || s.num_cols == 0 {
            return Err(BagError::invalid_metadata(format!(
                "grid shape {}x{} is empty",
                s.num_rows, s.num_cols
            )));
        }

        for (name, res) in [("row", s.row_resolution), ("column", s.col_resolution)] {
            if !(res.is_finite() && res > 0.0) {
                return Err(BagError::invalid_metadata(format!(
                    "{} resolution {} must be positive",
                    name, res
                )));
            }
        }

        if s.ur_corner_x < s.ll_corner_x || s.ur_corner_y < s.ll_corner_y {
            return Err(BagError::invalid_metadata(format!(
                "upper-right corner ({}, {}) lies below lower-left ({}, {})",
                s.ur_corner_x, s.ur_corner_y, s.ll_corner_x, s.ll_corner_y
            )));
        }

        Ok(())
    }
}

/// Metadata owned by a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    record: MetadataRecord,
}

impl Metadata {
    pub fn new(record: MetadataRecord) -> Self {
        Self { record }
    }

    /// Load the XML document stored in a container.
    pub fn from_container(container: &dyn Container, config: &ImportConfig) -> Result<Self> {
        let xml = container
            .read_attribute(METADATA_PATH, METADATA_XML_NAME)?
            .ok_or_else(|| BagError::not_found(format!("{}/{}", METADATA_PATH, METADATA_XML_NAME)))?;

        let text = xml
            .as_str()
            .ok_or_else(|| BagError::invalid_metadata("metadata attribute is not a string"))?;

        Ok(Self::new(import_from_xml_buffer(text.as_bytes(), config)?))
    }

    /// Store the record as XML in a container.
    pub fn save(&self, container: &mut dyn Container) -> Result<()> {
        let xml = export_to_xml(&self.record)?;
        container.create_group(METADATA_PATH)?;
        container.write_attribute(METADATA_PATH, METADATA_XML_NAME, serde_json::Value::String(xml))
    }

    pub fn record(&self) -> &MetadataRecord {
        &self.record
    }

    pub fn rows(&self) -> u32 {
        self.record.spatial.num_rows
    }

    pub fn cols(&self) -> u32 {
        self.record.spatial.num_cols
    }

    pub fn row_resolution(&self) -> f64 {
        self.record.spatial.row_resolution
    }

    pub fn col_resolution(&self) -> f64 {
        self.record.spatial.col_resolution
    }

    pub fn ll_corner(&self) -> (f64, f64) {
        (self.record.spatial.ll_corner_x, self.record.spatial.ll_corner_y)
    }

    pub fn ur_corner(&self) -> (f64, f64) {
        (self.record.spatial.ur_corner_x, self.record.spatial.ur_corner_y)
    }

    pub fn resolution_unit(&self) -> &str {
        &self.record.spatial.resolution_unit
    }

    pub fn cell_geometry(&self) -> &str {
        &self.record.spatial.cell_geometry
    }

    pub fn horizontal_reference(&self) -> &ReferenceSystem {
        &self.record.horizontal_reference
    }

    pub fn vertical_reference(&self) -> &ReferenceSystem {
        &self.record.vertical_reference
    }

    pub fn lineage(&self) -> &[ProcessStep] {
        &self.record.lineage
    }

    /// `(ll_x, ll_y, ur_x, ur_y)` of the grid.
    pub fn geo_cover(&self) -> (f64, f64, f64, f64) {
        self.georeference().cover()
    }

    /// Distance between adjacent nodes `(row, column)`.
    pub fn node_spacing(&self) -> (f64, f64) {
        (self.row_resolution(), self.col_resolution())
    }

    /// Affine georeference described by this record.
    pub fn georeference(&self) -> Georeference {
        let s = &self.record.spatial;
        Georeference {
            ll_x: s.ll_corner_x,
            ll_y: s.ll_corner_y,
            ur_x: s.ur_corner_x,
            ur_y: s.ur_corner_y,
            row_resolution: s.row_resolution,
            col_resolution: s.col_resolution,
        }
    }

    /// Fail with `MetadataMismatch` unless the declared shape and corners
    /// agree with the physical `(rows, cols)` grid.
    pub fn check_against_dims(&self, dims: (u32, u32)) -> Result<()> {
        if (self.rows(), self.cols()) != dims {
            return Err(BagError::MetadataMismatch(format!(
                "metadata declares {}x{}, elevation layer is {}x{}",
                self.rows(),
                self.cols(),
                dims.0,
                dims.1
            )));
        }

        let expected = Georeference::from_corner(
            self.record.spatial.ll_corner_x,
            self.record.spatial.ll_corner_y,
            self.row_resolution(),
            self.col_resolution(),
            dims,
        );
        let (ur_x, ur_y) = self.ur_corner();
        if (ur_x - expected.ur_x).abs() > 0.5 * self.row_resolution().abs()
            || (ur_y - expected.ur_y).abs() > 0.5 * self.col_resolution().abs()
        {
            return Err(BagError::MetadataMismatch(format!(
                "upper-right corner ({}, {}) does not match ({}, {}) implied by the grid",
                ur_x, ur_y, expected.ur_x, expected.ur_y
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;

    #[test]
    fn test_for_grid_derives_corners() {
        let record = MetadataRecord::for_grid((100, 50), (0.0, 0.0), (1.0, 1.0));
        let metadata = Metadata::new(record);

        assert_eq!(metadata.geo_cover(), (0.0, 0.0, 99.0, 49.0));
        assert_eq!(metadata.node_spacing(), (1.0, 1.0));
        assert!(metadata.record().validate().is_ok());
        assert!(metadata.check_against_dims((100, 50)).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_grids() {
        let mut record = MetadataRecord::for_grid((10, 10), (0.0, 0.0), (1.0, 1.0));
        record.spatial.num_cols = 0;
        assert!(matches!(record.validate(), Err(BagError::InvalidMetadata(_))));

        let mut record = MetadataRecord::for_grid((10, 10), (0.0, 0.0), (1.0, 1.0));
        record.spatial.row_resolution = -2.0;
        assert!(record.validate().is_err());

        let mut record = MetadataRecord::for_grid((10, 10), (0.0, 0.0), (1.0, 1.0));
        record.spatial.ur_corner_y = -5.0;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_shape_mismatch_detected() {
        let metadata = Metadata::new(MetadataRecord::for_grid((100, 50), (0.0, 0.0), (1.0, 1.0)));
        assert!(matches!(
            metadata.check_against_dims((100, 51)),
            Err(BagError::MetadataMismatch(_))
        ));
    }

    #[test]
    fn test_corner_mismatch_detected() {
        let mut record = MetadataRecord::for_grid((100, 50), (0.0, 0.0), (1.0, 1.0));
        record.spatial.ur_corner_x = 150.0;
        let metadata = Metadata::new(record);
        assert!(matches!(
            metadata.check_against_dims((100, 50)),
            Err(BagError::MetadataMismatch(_))
        ));
    }

    #[test]
    fn test_save_and_load_from_container() {
        let mut container = MemoryContainer::new("mem");
        let mut record = MetadataRecord::for_grid((20, 30), (500.0, 4000.0), (2.0, 2.0));
        record.title = "Survey H12345".to_string();
        let metadata = Metadata::new(record);

        metadata.save(&mut container).unwrap();
        let loaded = Metadata::from_container(&container, &ImportConfig::default()).unwrap();
        assert_eq!(loaded, metadata);
    }

    #[test]
    fn test_missing_metadata_is_not_found() {
        let container = MemoryContainer::new("mem");
        assert!(matches!(
            Metadata::from_container(&container, &ImportConfig::default()),
            Err(BagError::NotFound(_))
        ));
    }
}
