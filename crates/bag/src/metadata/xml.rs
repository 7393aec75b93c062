//! ISO 19115 style XML import and export for [`MetadataRecord`].

use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{MetadataRecord, ProcessStep, ReferenceSystem, SpatialRepresentation};
use crate::config::ImportConfig;
use crate::error::{BagError, Result};

const NAMESPACES: [(&str, &str); 5] = [
    ("xmlns:gmi", "http://www.isotc211.org/2005/gmi"),
    ("xmlns:gmd", "http://www.isotc211.org/2005/gmd"),
    ("xmlns:gco", "http://www.isotc211.org/2005/gco"),
    ("xmlns:gml", "http://www.opengis.net/gml/3.2"),
    ("xmlns:bag", "http://www.opennavsurf.org/schema/bag"),
];

/// Parse a metadata document from a file.
pub fn import_from_xml_file(path: impl AsRef<Path>, config: &ImportConfig) -> Result<MetadataRecord> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        BagError::not_found(format!("metadata file {}: {}", path.display(), e))
    })?;
    import_from_xml_buffer(&bytes, config)
}

/// Parse a metadata document from memory.
pub fn import_from_xml_buffer(xml: &[u8], config: &ImportConfig) -> Result<MetadataRecord> {
    let text = std::str::from_utf8(xml)
        .map_err(|e| BagError::invalid_metadata(format!("metadata is not UTF-8: {}", e)))?;

    let record = parse(text)?;
    if config.validate {
        record.validate()?;
    }

    tracing::debug!(
        file_identifier = %record.file_identifier,
        rows = record.spatial.num_rows,
        cols = record.spatial.num_cols,
        "Imported metadata"
    );

    Ok(record)
}

#[derive(Default)]
struct Dimension {
    name: String,
    size: Option<u32>,
    resolution: Option<f64>,
}

#[derive(Default)]
struct ParseState {
    file_identifier: String,
    language: String,
    date_stamp: String,
    contact_name: String,
    title: String,
    abstract_text: String,
    resolution_unit: String,
    cell_geometry: String,
    corners: Option<(f64, f64, f64, f64)>,
    dimensions: Vec<Dimension>,
    references: Vec<ReferenceSystem>,
    lineage: Vec<ProcessStep>,
}

fn ends_with(stack: &[String], tail: &[&str]) -> bool {
    stack.len() >= tail.len()
        && stack[stack.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

fn inside(stack: &[String], name: &str) -> bool {
    stack.iter().any(|s| s == name)
}

fn parse_number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| BagError::invalid_metadata(format!("bad {} '{}'", what, text)))
}

/// `"llx,lly urx,ury"` with `,` between ordinates and whitespace between points.
fn parse_corners(text: &str) -> Result<(f64, f64, f64, f64)> {
    let values: Vec<f64> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| parse_number(s, "corner coordinate"))
        .collect::<Result<_>>()?;

    match values.as_slice() {
        [llx, lly, urx, ury] => Ok((*llx, *lly, *urx, *ury)),
        _ => Err(BagError::invalid_metadata(format!(
            "expected two corner points, got '{}'",
            text
        ))),
    }
}

/// Value of a `codeListValue` attribute, if present.
fn code_list_value(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"codeListValue")
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

impl ParseState {
    fn start(&mut self, stack: &[String], e: &BytesStart) {
        let name = e.local_name();
        match name.as_ref() {
            b"MD_Dimension" => self.dimensions.push(Dimension::default()),
            b"RS_Identifier" | b"MD_Identifier" if inside(stack, "referenceSystemInfo") => {
                self.references.push(ReferenceSystem::default())
            }
            b"BAG_ProcessStep" | b"LI_ProcessStep" => self.lineage.push(ProcessStep::default()),
            b"Measure" => {
                if let Some(uom) = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"uom")
                {
                    self.resolution_unit = String::from_utf8_lossy(&uom.value).into_owned();
                }
            }
            b"MD_CellGeometryCode" => {
                if let Some(code) = code_list_value(e) {
                    self.cell_geometry = code;
                }
            }
            b"MD_DimensionNameTypeCode" => {
                if let (Some(code), Some(dim)) = (code_list_value(e), self.dimensions.last_mut()) {
                    dim.name = code;
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, stack: &[String], text: String) -> Result<()> {
        if ends_with(stack, &["fileIdentifier", "CharacterString"]) {
            self.file_identifier = text;
        } else if ends_with(stack, &["language", "CharacterString"])
            || ends_with(stack, &["language", "LanguageCode"])
        {
            if !inside(stack, "identificationInfo") {
                self.language = text;
            }
        } else if inside(stack, "dateStamp") {
            self.date_stamp = text;
        } else if ends_with(stack, &["individualName", "CharacterString"]) && inside(stack, "contact") {
            self.contact_name = text;
        } else if ends_with(stack, &["dimensionName", "MD_DimensionNameTypeCode"]) {
            if let Some(dim) = self.dimensions.last_mut() {
                dim.name = text;
            }
        } else if ends_with(stack, &["dimensionSize", "Integer"]) {
            if let Some(dim) = self.dimensions.last_mut() {
                dim.size = Some(parse_number(&text, "dimension size")?);
            }
        } else if ends_with(stack, &["resolution", "Measure"]) {
            if let Some(dim) = self.dimensions.last_mut() {
                dim.resolution = Some(parse_number(&text, "resolution")?);
            }
        } else if ends_with(stack, &["cellGeometry", "MD_CellGeometryCode"]) {
            self.cell_geometry = text;
        } else if ends_with(stack, &["cornerPoints", "Point", "coordinates"])
            || ends_with(stack, &["cornerPoints", "Point", "pos"])
        {
            self.corners = Some(parse_corners(&text)?);
        } else if ends_with(stack, &["code", "CharacterString"]) && inside(stack, "referenceSystemInfo") {
            if let Some(rs) = self.references.last_mut() {
                rs.definition = text;
            }
        } else if ends_with(stack, &["codeSpace", "CharacterString"]) && inside(stack, "referenceSystemInfo") {
            if let Some(rs) = self.references.last_mut() {
                rs.kind = text;
            }
        } else if ends_with(stack, &["title", "CharacterString"]) && inside(stack, "identificationInfo") {
            self.title = text;
        } else if ends_with(stack, &["abstract", "CharacterString"]) {
            self.abstract_text = text;
        } else if inside(stack, "processStep") {
            if let Some(step) = self.lineage.last_mut() {
                if ends_with(stack, &["description", "CharacterString"]) && !inside(stack, "source") {
                    step.description = text;
                } else if ends_with(stack, &["dateTime", "DateTime"]) {
                    step.date_time = text;
                } else if ends_with(stack, &["trackingId", "CharacterString"]) {
                    step.tracking_id = text;
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<MetadataRecord> {
        let mut rows = None;
        let mut cols = None;
        for (i, dim) in self.dimensions.iter().enumerate() {
            let is_row = match dim.name.as_str() {
                "row" => true,
                "column" => false,
                _ => i == 0,
            };
            let entry = (dim.size.unwrap_or(0), dim.resolution.unwrap_or(0.0));
            if is_row {
                rows = Some(entry);
            } else {
                cols = Some(entry);
            }
        }

        let (num_rows, row_resolution) =
            rows.ok_or_else(|| BagError::invalid_metadata("missing row dimension"))?;
        let (num_cols, col_resolution) =
            cols.ok_or_else(|| BagError::invalid_metadata("missing column dimension"))?;
        let (ll_x, ll_y, ur_x, ur_y) = self
            .corners
            .ok_or_else(|| BagError::invalid_metadata("missing corner points"))?;

        let mut references = self.references.into_iter();

        Ok(MetadataRecord {
            file_identifier: self.file_identifier,
            language: self.language,
            date_stamp: self.date_stamp,
            contact_name: self.contact_name,
            title: self.title,
            abstract_text: self.abstract_text,
            spatial: SpatialRepresentation {
                num_rows,
                num_cols,
                row_resolution,
                col_resolution,
                resolution_unit: self.resolution_unit,
                cell_geometry: self.cell_geometry,
                ll_corner_x: ll_x,
                ll_corner_y: ll_y,
                ur_corner_x: ur_x,
                ur_corner_y: ur_y,
            },
            horizontal_reference: references.next().unwrap_or_default(),
            vertical_reference: references.next().unwrap_or_default(),
            lineage: self.lineage,
        })
    }
}

fn parse(xml: &str) -> Result<MetadataRecord> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut state = ParseState::default();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() {
                    if name != "MI_Metadata" && name != "MD_Metadata" {
                        return Err(BagError::invalid_metadata(format!(
                            "unexpected root element <{}>",
                            name
                        )));
                    }
                    saw_root = true;
                }
                state.start(&stack, &e);
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                state.start(&stack, &e);
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape()?.into_owned();
                state.text(&stack, text)?;
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(BagError::invalid_metadata(format!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(BagError::invalid_metadata("document has no metadata element"));
    }

    state.finish()
}

/// Small helper over a quick-xml writer for nested element output.
struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        Ok(())
    }

    fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// `<outer><inner attrs>text</inner></outer>`
    fn leaf(&mut self, outer: &str, inner: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.open(outer)?;
        self.open_with(inner, attrs)?;
        self.text(text)?;
        self.close(inner)?;
        self.close(outer)
    }

    fn string(&mut self, outer: &str, text: &str) -> Result<()> {
        self.leaf(outer, "gco:CharacterString", &[], text)
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| BagError::invalid_metadata(e.to_string()))
    }
}

fn write_dimension(out: &mut XmlOut, name: &str, size: u32, resolution: f64, unit: &str) -> Result<()> {
    out.open("gmd:axisDimensionProperties")?;
    out.open("gmd:MD_Dimension")?;
    out.leaf(
        "gmd:dimensionName",
        "gmd:MD_DimensionNameTypeCode",
        &[("codeListValue", name)],
        name,
    )?;
    out.leaf("gmd:dimensionSize", "gco:Integer", &[], &size.to_string())?;
    out.leaf("gmd:resolution", "gco:Measure", &[("uom", unit)], &resolution.to_string())?;
    out.close("gmd:MD_Dimension")?;
    out.close("gmd:axisDimensionProperties")
}

fn write_reference(out: &mut XmlOut, rs: &ReferenceSystem) -> Result<()> {
    out.open("gmd:referenceSystemInfo")?;
    out.open("gmd:MD_ReferenceSystem")?;
    out.open("gmd:referenceSystemIdentifier")?;
    out.open("gmd:RS_Identifier")?;
    out.string("gmd:code", &rs.definition)?;
    out.string("gmd:codeSpace", &rs.kind)?;
    out.close("gmd:RS_Identifier")?;
    out.close("gmd:referenceSystemIdentifier")?;
    out.close("gmd:MD_ReferenceSystem")?;
    out.close("gmd:referenceSystemInfo")
}

/// Serialise a record into a metadata document accepted by the importer.
pub fn export_to_xml(record: &MetadataRecord) -> Result<String> {
    let s = &record.spatial;
    let mut out = XmlOut::new();

    out.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.open_with("gmi:MI_Metadata", &NAMESPACES)?;

    out.string("gmd:fileIdentifier", &record.file_identifier)?;
    out.string("gmd:language", &record.language)?;

    out.open("gmd:contact")?;
    out.open("gmd:CI_ResponsibleParty")?;
    out.string("gmd:individualName", &record.contact_name)?;
    out.leaf(
        "gmd:role",
        "gmd:CI_RoleCode",
        &[("codeListValue", "pointOfContact")],
        "pointOfContact",
    )?;
    out.close("gmd:CI_ResponsibleParty")?;
    out.close("gmd:contact")?;

    out.leaf("gmd:dateStamp", "gco:Date", &[], &record.date_stamp)?;

    out.open("gmd:spatialRepresentationInfo")?;
    out.open("gmd:MD_Georectified")?;
    out.leaf("gmd:numberOfDimensions", "gco:Integer", &[], "2")?;
    write_dimension(&mut out, "row", s.num_rows, s.row_resolution, &s.resolution_unit)?;
    write_dimension(&mut out, "column", s.num_cols, s.col_resolution, &s.resolution_unit)?;
    out.leaf(
        "gmd:cellGeometry",
        "gmd:MD_CellGeometryCode",
        &[("codeListValue", s.cell_geometry.as_str())],
        &s.cell_geometry,
    )?;
    out.open("gmd:cornerPoints")?;
    out.open("gml:Point")?;
    out.open_with("gml:coordinates", &[("decimal", "."), ("cs", ","), ("ts", " ")])?;
    out.text(&format!(
        "{},{} {},{}",
        s.ll_corner_x, s.ll_corner_y, s.ur_corner_x, s.ur_corner_y
    ))?;
    out.close("gml:coordinates")?;
    out.close("gml:Point")?;
    out.close("gmd:cornerPoints")?;
    out.close("gmd:MD_Georectified")?;
    out.close("gmd:spatialRepresentationInfo")?;

    write_reference(&mut out, &record.horizontal_reference)?;
    write_reference(&mut out, &record.vertical_reference)?;

    out.open("gmd:identificationInfo")?;
    out.open("bag:BAG_DataIdentification")?;
    out.open("gmd:citation")?;
    out.open("gmd:CI_Citation")?;
    out.string("gmd:title", &record.title)?;
    out.close("gmd:CI_Citation")?;
    out.close("gmd:citation")?;
    out.string("gmd:abstract", &record.abstract_text)?;
    out.close("bag:BAG_DataIdentification")?;
    out.close("gmd:identificationInfo")?;

    out.open("gmd:dataQualityInfo")?;
    out.open("gmd:DQ_DataQuality")?;
    out.open("gmd:lineage")?;
    out.open("gmd:LI_Lineage")?;
    for step in &record.lineage {
        out.open("gmd:processStep")?;
        out.open("bag:BAG_ProcessStep")?;
        out.string("gmd:description", &step.description)?;
        out.leaf("gmd:dateTime", "gco:DateTime", &[], &step.date_time)?;
        out.string("bag:trackingId", &step.tracking_id)?;
        out.close("bag:BAG_ProcessStep")?;
        out.close("gmd:processStep")?;
    }
    out.close("gmd:LI_Lineage")?;
    out.close("gmd:lineage")?;
    out.close("gmd:DQ_DataQuality")?;
    out.close("gmd:dataQualityInfo")?;

    out.close("gmi:MI_Metadata")?;
    out.finish()
}
