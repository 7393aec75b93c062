//! Common test fixtures for BAG tests.
//!
//! This module provides pre-defined grids and metadata documents that
//! represent common survey layouts.

/// Common grid specifications for testing.
pub mod grid {
    /// 100 x 50 grid at 1 m, anchored at the origin.
    pub const UNIT_100X50: GridSpec = GridSpec {
        rows: 100,
        cols: 50,
        ll_x: 0.0,
        ll_y: 0.0,
        row_resolution: 1.0,
        col_resolution: 1.0,
    };

    /// Small projected survey grid (UTM-like coordinates).
    pub const HARBOUR_SURVEY: GridSpec = GridSpec {
        rows: 64,
        cols: 48,
        ll_x: 354_000.0,
        ll_y: 4_690_000.0,
        row_resolution: 4.0,
        col_resolution: 4.0,
    };

    /// Simple 10x10 test grid
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        rows: 10,
        cols: 10,
        ll_x: -10.0,
        ll_y: -10.0,
        row_resolution: 2.0,
        col_resolution: 2.0,
    };

    /// Grid specification for test fixtures.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GridSpec {
        pub rows: u32,
        pub cols: u32,
        pub ll_x: f64,
        pub ll_y: f64,
        pub row_resolution: f64,
        pub col_resolution: f64,
    }

    impl GridSpec {
        /// Total number of nodes.
        pub fn total_points(&self) -> usize {
            self.rows as usize * self.cols as usize
        }

        /// Upper-right corner (centre of the last node).
        pub fn ur_corner(&self) -> (f64, f64) {
            (
                self.ll_x + (self.rows - 1) as f64 * self.row_resolution,
                self.ll_y + (self.cols - 1) as f64 * self.col_resolution,
            )
        }
    }
}

/// Metadata documents for testing.
pub mod metadata {
    use super::grid::GridSpec;

    /// Build an ISO 19115 metadata document describing `spec`.
    pub fn metadata_xml(spec: &GridSpec) -> String {
        let (ur_x, ur_y) = spec.ur_corner();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gmi:MI_Metadata xmlns:gmi="http://www.isotc211.org/2005/gmi"
    xmlns:gmd="http://www.isotc211.org/2005/gmd"
    xmlns:gco="http://www.isotc211.org/2005/gco"
    xmlns:gml="http://www.opengis.net/gml/3.2"
    xmlns:bag="http://www.opennavsurf.org/schema/bag">
  <gmd:fileIdentifier><gco:CharacterString>test-fixture-0001</gco:CharacterString></gmd:fileIdentifier>
  <gmd:language><gco:CharacterString>en</gco:CharacterString></gmd:language>
  <gmd:contact><gmd:CI_ResponsibleParty>
    <gmd:individualName><gco:CharacterString>Test Hydrographer</gco:CharacterString></gmd:individualName>
    <gmd:role><gmd:CI_RoleCode codeListValue="pointOfContact">pointOfContact</gmd:CI_RoleCode></gmd:role>
  </gmd:CI_ResponsibleParty></gmd:contact>
  <gmd:dateStamp><gco:Date>2020-01-01</gco:Date></gmd:dateStamp>
  <gmd:spatialRepresentationInfo><gmd:MD_Georectified>
    <gmd:numberOfDimensions><gco:Integer>2</gco:Integer></gmd:numberOfDimensions>
    <gmd:axisDimensionProperties><gmd:MD_Dimension>
      <gmd:dimensionName><gmd:MD_DimensionNameTypeCode codeListValue="row">row</gmd:MD_DimensionNameTypeCode></gmd:dimensionName>
      <gmd:dimensionSize><gco:Integer>{rows}</gco:Integer></gmd:dimensionSize>
      <gmd:resolution><gco:Measure uom="Metres">{row_res}</gco:Measure></gmd:resolution>
    </gmd:MD_Dimension></gmd:axisDimensionProperties>
    <gmd:axisDimensionProperties><gmd:MD_Dimension>
      <gmd:dimensionName><gmd:MD_DimensionNameTypeCode codeListValue="column">column</gmd:MD_DimensionNameTypeCode></gmd:dimensionName>
      <gmd:dimensionSize><gco:Integer>{cols}</gco:Integer></gmd:dimensionSize>
      <gmd:resolution><gco:Measure uom="Metres">{col_res}</gco:Measure></gmd:resolution>
    </gmd:MD_Dimension></gmd:axisDimensionProperties>
    <gmd:cellGeometry><gmd:MD_CellGeometryCode codeListValue="point">point</gmd:MD_CellGeometryCode></gmd:cellGeometry>
    <gmd:cornerPoints><gml:Point><gml:coordinates decimal="." cs="," ts=" ">{ll_x},{ll_y} {ur_x},{ur_y}</gml:coordinates></gml:Point></gmd:cornerPoints>
  </gmd:MD_Georectified></gmd:spatialRepresentationInfo>
  <gmd:referenceSystemInfo><gmd:MD_ReferenceSystem><gmd:referenceSystemIdentifier><gmd:RS_Identifier>
    <gmd:code><gco:CharacterString>EPSG:32619</gco:CharacterString></gmd:code>
    <gmd:codeSpace><gco:CharacterString>EPSG</gco:CharacterString></gmd:codeSpace>
  </gmd:RS_Identifier></gmd:referenceSystemIdentifier></gmd:MD_ReferenceSystem></gmd:referenceSystemInfo>
  <gmd:referenceSystemInfo><gmd:MD_ReferenceSystem><gmd:referenceSystemIdentifier><gmd:RS_Identifier>
    <gmd:code><gco:CharacterString>MLLW</gco:CharacterString></gmd:code>
    <gmd:codeSpace><gco:CharacterString>name</gco:CharacterString></gmd:codeSpace>
  </gmd:RS_Identifier></gmd:referenceSystemIdentifier></gmd:MD_ReferenceSystem></gmd:referenceSystemInfo>
  <gmd:identificationInfo><bag:BAG_DataIdentification>
    <gmd:citation><gmd:CI_Citation><gmd:title><gco:CharacterString>Test survey</gco:CharacterString></gmd:title></gmd:CI_Citation></gmd:citation>
    <gmd:abstract><gco:CharacterString>Synthetic grid for tests</gco:CharacterString></gmd:abstract>
  </bag:BAG_DataIdentification></gmd:identificationInfo>
  <gmd:dataQualityInfo><gmd:DQ_DataQuality><gmd:lineage><gmd:LI_Lineage>
    <gmd:processStep><bag:BAG_ProcessStep>
      <gmd:description><gco:CharacterString>Gridded from multibeam soundings</gco:CharacterString></gmd:description>
      <gmd:dateTime><gco:DateTime>2020-01-01T00:00:00</gco:DateTime></gmd:dateTime>
      <bag:trackingId><gco:CharacterString>0</gco:CharacterString></bag:trackingId>
    </bag:BAG_ProcessStep></gmd:processStep>
  </gmd:LI_Lineage></gmd:lineage></gmd:DQ_DataQuality></gmd:dataQualityInfo>
</gmi:MI_Metadata>
"#,
            rows = spec.rows,
            cols = spec.cols,
            row_res = spec.row_resolution,
            col_res = spec.col_resolution,
            ll_x = spec.ll_x,
            ll_y = spec.ll_y,
            ur_x = ur_x,
            ur_y = ur_y,
        )
    }

    /// Metadata for [`super::grid::UNIT_100X50`].
    pub fn unit_grid_xml() -> String {
        metadata_xml(&super::grid::UNIT_100X50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_spec_corners() {
        assert_eq!(grid::UNIT_100X50.ur_corner(), (99.0, 49.0));
        assert_eq!(grid::SIMPLE_10X10.ur_corner(), (8.0, 8.0));
        assert_eq!(grid::HARBOUR_SURVEY.total_points(), 64 * 48);
    }

    #[test]
    fn test_metadata_xml_mentions_shape() {
        let xml = metadata::unit_grid_xml();
        assert!(xml.contains("<gco:Integer>100</gco:Integer>"));
        assert!(xml.contains("<gco:Integer>50</gco:Integer>"));
        assert!(xml.contains("0,0 99,49"));
    }
}
