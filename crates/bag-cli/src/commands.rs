//! Subcommand implementations.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use bag::{
    import_from_xml_file, BagConfig, BagError, BagHandle, DataType, Dataset, LayerType, OpenMode,
    Region, Session, TrackingItem, TrackingSort, ZarrContainer,
};

use crate::OutputFormat;

/// Exit status for failures that did not originate in the BAG library.
pub const OTHER_FAILURE: u8 = 100;

/// Parse an inclusive `start:end` range.
pub fn parse_range(s: &str) -> Result<(u32, u32), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected start:end, got '{}'", s))?;
    let start: u32 = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid range start '{}': {}", start, e))?;
    let end: u32 = end
        .trim()
        .parse()
        .map_err(|e| format!("invalid range end '{}': {}", end, e))?;
    if end < start {
        return Err(format!("range end {} precedes start {}", end, start));
    }
    Ok((start, end))
}

/// Process exit status for an error: the library code when there is one.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BagError>())
        .and_then(|e| u8::try_from(e.code()).ok())
        .unwrap_or(OTHER_FAILURE)
}

fn open_session(path: &Path, config: BagConfig, mode: OpenMode) -> anyhow::Result<(Session, BagHandle)> {
    let container = ZarrContainer::open(path, mode == OpenMode::ReadWrite)?;
    let mut session = Session::new(config);
    let handle = session
        .open_container(Box::new(container), mode)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    debug!(handle = %handle, path = %path.display(), "Opened dataset");
    Ok((session, handle))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct LayerSummary {
    layer: LayerType,
    data_type: DataType,
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Serialize)]
struct InfoReport {
    location: String,
    version: String,
    rows: u32,
    cols: u32,
    ll_corner: (f64, f64),
    ur_corner: (f64, f64),
    resolution: (f64, f64),
    horizontal_reference: String,
    vertical_reference: String,
    compression_level: u32,
    chunk_dims: Option<(u32, u32)>,
    tracking_items: usize,
    layers: Vec<LayerSummary>,
}

pub fn info(path: &Path, config: BagConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (session, handle) = open_session(path, config, OpenMode::ReadOnly)?;
    let dataset = session.dataset(handle)?;
    let (rows, cols) = dataset.dims()?;
    let metadata = dataset.metadata();

    let mut layers = Vec::new();
    for layer_type in dataset.layer_types() {
        let layer = dataset.layer(layer_type)?;
        // Only stored layers carry extents.
        let extents = layer.extents().unwrap_or(None);
        layers.push(LayerSummary {
            layer: layer_type,
            data_type: layer.data_type(),
            min: extents.map(|(min, _)| min),
            max: extents.map(|(_, max)| max),
        });
    }

    let report = InfoReport {
        location: dataset.location().to_string(),
        version: dataset.version().to_string(),
        rows,
        cols,
        ll_corner: metadata.ll_corner(),
        ur_corner: metadata.ur_corner(),
        resolution: metadata.node_spacing(),
        horizontal_reference: metadata.horizontal_reference().definition.clone(),
        vertical_reference: metadata.vertical_reference().definition.clone(),
        compression_level: dataset.compression_level(),
        chunk_dims: dataset.chunk_dims(),
        tracking_items: dataset.tracking_list().len(),
        layers,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("Location:     {}", report.location);
            println!("Version:      {}", report.version);
            println!("Shape:        {} rows x {} cols", report.rows, report.cols);
            println!(
                "Corners:      ({}, {}) .. ({}, {})",
                report.ll_corner.0, report.ll_corner.1, report.ur_corner.0, report.ur_corner.1
            );
            println!("Resolution:   {} x {}", report.resolution.0, report.resolution.1);
            println!("Horizontal:   {}", report.horizontal_reference);
            println!("Vertical:     {}", report.vertical_reference);
            match report.chunk_dims {
                Some((r, c)) => println!("Chunks:       {} x {}", r, c),
                None => println!("Chunks:       none"),
            }
            println!("Compression:  {}", report.compression_level);
            println!("Tracking:     {} items", report.tracking_items);
            println!();
            println!("{:<28} {:<8} {:>14} {:>14}", "LAYER", "TYPE", "MIN", "MAX");
            for layer in &report.layers {
                let fmt_opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{:<28} {:<8} {:>14} {:>14}",
                    layer.layer.as_str(),
                    format!("{:?}", layer.data_type),
                    fmt_opt(layer.min),
                    fmt_opt(layer.max)
                );
            }
        }
    }
    Ok(())
}

pub fn create(path: &Path, metadata: &Path, config: BagConfig) -> anyhow::Result<()> {
    let record = import_from_xml_file(metadata, &config.import_config())
        .with_context(|| format!("Failed to import {}", metadata.display()))?;
    let dataset = Dataset::create(path, record, config)?;
    let (rows, cols) = dataset.dims()?;
    dataset.close()?;

    info!(path = %path.display(), rows, cols, "Created dataset");
    println!("Created {} ({} x {})", path.display(), rows, cols);
    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum Values {
    Float(Vec<f32>),
    UInt(Vec<u32>),
}

impl Values {
    fn decode(data_type: DataType, bytes: &[u8]) -> Self {
        match data_type {
            DataType::Float32 => Values::Float(bytemuck::pod_collect_to_vec(bytes)),
            DataType::UInt32 => Values::UInt(bytemuck::pod_collect_to_vec(bytes)),
        }
    }

    fn row(&self, index: usize, cols: usize) -> Vec<String> {
        let range = index * cols..(index + 1) * cols;
        match self {
            Values::Float(v) => v[range].iter().map(|x| x.to_string()).collect(),
            Values::UInt(v) => v[range].iter().map(|x| x.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
struct ReadReport {
    layer: LayerType,
    region: Region,
    values: Values,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<Vec<f64>>,
}

pub fn read(
    path: &Path,
    config: BagConfig,
    layer: LayerType,
    rows: (u32, u32),
    cols: (u32, u32),
    positions: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (session, handle) = open_session(path, config, OpenMode::ReadOnly)?;
    let region = Region::new(rows.0, cols.0, rows.1, cols.1);
    let data_type = session.dataset(handle)?.layer(layer)?.data_type();
    let result = session.read(handle, layer, &region, positions)?;

    let report = ReadReport {
        layer,
        region,
        values: Values::decode(data_type, &result.data),
        x: result.x,
        y: result.y,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            if let Some(y) = &report.y {
                let header: Vec<String> = y.iter().map(|v| v.to_string()).collect();
                println!("{:>14} {}", "", header.join(" "));
            }
            for (i, row) in (region.row_start..=region.row_end).enumerate() {
                let label = match &report.x {
                    Some(x) => format!("{:>14}", x[i]),
                    None => format!("{:>6}", row),
                };
                println!("{} {}", label, report.values.row(i, region.cols()).join(" "));
            }
        }
    }
    Ok(())
}

pub fn position(path: &Path, config: BagConfig, row: u32, col: u32) -> anyhow::Result<()> {
    let (session, handle) = open_session(path, config, OpenMode::ReadOnly)?;
    let (x, y) = session.compute_position(handle, row, col)?;
    println!("{} {}", x, y);
    Ok(())
}

pub fn index(path: &Path, config: BagConfig, x: f64, y: f64) -> anyhow::Result<()> {
    let (session, handle) = open_session(path, config, OpenMode::ReadOnly)?;
    let (row, col) = session.compute_index(handle, x, y)?;
    println!("{} {}", row, col);
    Ok(())
}

pub fn add_layer(path: &Path, config: BagConfig, layer: LayerType) -> anyhow::Result<()> {
    let (mut session, handle) = open_session(path, config, OpenMode::ReadWrite)?;
    session.add_layer(handle, layer)?;
    session.close(handle)?;

    info!(path = %path.display(), layer = %layer, "Added layer");
    println!("Added {} to {}", layer, path.display());
    Ok(())
}

pub fn tracking(
    path: &Path,
    config: BagConfig,
    sort: Option<TrackingSort>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (mut session, handle) = open_session(path, config, OpenMode::ReadOnly)?;
    if let Some(key) = sort {
        session.sort_tracking_list(handle, key)?;
    }

    let len = session.tracking_list_length(handle)?;
    let items = (0..len)
        .map(|i| session.read_tracking_item(handle, i))
        .collect::<bag::Result<Vec<TrackingItem>>>()?;

    match format {
        OutputFormat::Json => print_json(&items)?,
        OutputFormat::Table => {
            println!(
                "{:>6} {:>6} {:>12} {:>12} {:>5} {:>6}",
                "ROW", "COL", "DEPTH", "UNCERT", "CODE", "SERIES"
            );
            for item in &items {
                println!(
                    "{:>6} {:>6} {:>12} {:>12} {:>5} {:>6}",
                    item.row, item.col, item.depth, item.uncertainty, item.track_code, item.list_series
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0:9"), Ok((0, 9)));
        assert_eq!(parse_range(" 3 : 3 "), Ok((3, 3)));
        assert!(parse_range("9:0").is_err());
        assert!(parse_range("5").is_err());
        assert!(parse_range("a:b").is_err());
    }

    #[test]
    fn test_exit_code_uses_library_code() {
        let err = anyhow::Error::new(BagError::NullBuffer);
        assert_eq!(exit_code(&err), 4);

        let wrapped = anyhow::Error::new(BagError::not_found("/BAG_root")).context("Failed to open");
        assert_eq!(exit_code(&wrapped), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("boom")), OTHER_FAILURE);
    }

    #[test]
    fn test_values_decode_rows() {
        let bytes: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let values = Values::decode(DataType::Float32, &bytes);
        assert_eq!(values.row(1, 2), vec!["3".to_string(), "4".to_string()]);
    }

    #[test]
    fn test_create_then_query() {
        let (_dir, path) = test_utils::temp_bag_path("cli.bag");
        let xml_path = path.with_extension("xml");
        std::fs::write(&xml_path, test_utils::metadata::unit_grid_xml()).unwrap();

        create(&path, &xml_path, BagConfig::default()).unwrap();
        add_layer(&path, BagConfig::default(), LayerType::NominalElevation).unwrap();

        let err = add_layer(&path, BagConfig::default(), LayerType::StdDev).unwrap_err();
        assert_eq!(exit_code(&err), BagError::unsupported("").code() as u8);

        let (session, handle) = open_session(&path, BagConfig::default(), OpenMode::ReadOnly).unwrap();
        assert_eq!(session.get_dims(handle).unwrap(), (100, 50));
        assert!(session.contains_layer(handle, LayerType::NominalElevation).unwrap());
        assert!(!session.contains_layer(handle, LayerType::StdDev).unwrap());
        assert_eq!(session.compute_index(handle, 10.0, 20.0).unwrap(), (10, 20));
    }
}
