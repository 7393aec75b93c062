//! Command-line tool for BAG datasets.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use bag::{BagConfig, LayerType, TrackingSort};

#[derive(Parser)]
#[command(name = "bag")]
#[command(about = "Inspect and edit Bathymetric Attributed Grid datasets", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Compression level for new layers (0-9)
    #[arg(long, global = true)]
    compression_level: Option<u8>,

    /// Chunk edge length for new layers (0 = unchunked)
    #[arg(long, global = true)]
    chunk_size: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortKey {
    Node,
    Series,
    Code,
}

impl From<SortKey> for TrackingSort {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Node => TrackingSort::Node,
            SortKey::Series => TrackingSort::Series,
            SortKey::Code => TrackingSort::Code,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, shape, layers and georeference of a dataset
    Info {
        path: PathBuf,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Create a dataset from a metadata XML document
    Create {
        path: PathBuf,

        /// Metadata XML file describing the grid
        #[arg(short, long)]
        metadata: PathBuf,
    },

    /// Read a region of a layer
    Read {
        path: PathBuf,

        /// Layer name (e.g. elevation, uncertainty, std_dev)
        #[arg(short, long)]
        layer: LayerType,

        /// Inclusive row range, `start:end`
        #[arg(long, value_parser = commands::parse_range)]
        rows: (u32, u32),

        /// Inclusive column range, `start:end`
        #[arg(long, value_parser = commands::parse_range)]
        cols: (u32, u32),

        /// Include the coordinates of each row and column
        #[arg(long)]
        positions: bool,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Geographic position of a grid node
    Position { path: PathBuf, row: u32, col: u32 },

    /// Grid node nearest to a geographic position
    Index {
        path: PathBuf,

        #[arg(allow_hyphen_values = true)]
        x: f64,

        #[arg(allow_hyphen_values = true)]
        y: f64,
    },

    /// Add an empty layer to a dataset
    AddLayer { path: PathBuf, layer: LayerType },

    /// List the tracking list of a dataset
    Tracking {
        path: PathBuf,

        #[arg(short, long, value_enum)]
        sort: Option<SortKey>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = BagConfig::from_env();
    if let Some(level) = cli.compression_level {
        config.compression_level = level;
    }
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Info { path, format } => commands::info(&path, config, format),
        Commands::Create { path, metadata } => commands::create(&path, &metadata, config),
        Commands::Read {
            path,
            layer,
            rows,
            cols,
            positions,
            format,
        } => commands::read(&path, config, layer, rows, cols, positions, format),
        Commands::Position { path, row, col } => commands::position(&path, config, row, col),
        Commands::Index { path, x, y } => commands::index(&path, config, x, y),
        Commands::AddLayer { path, layer } => commands::add_layer(&path, config, layer),
        Commands::Tracking { path, sort, format } => {
            commands::tracking(&path, config, sort.map(Into::into), format)
        }
    }
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
