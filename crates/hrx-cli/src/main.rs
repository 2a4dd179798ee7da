use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use hrx_lib::{
    config::{load_config, EdgeMode, HrxConfig, Normalization, PanTompkinsConfig},
    detectors::ecg::{compute_heart_rate_with_config, run_pipeline, HeartRateResult},
    io::{table as table_io, text as text_io},
    signal::TimeSeries,
};
use log::{info, warn};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "hrx",
    version,
    about = "HRX: Pan-Tompkins heart-rate extraction for ECG recordings"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// TOML file with sampling, column and pipeline defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EdgeArg {
    Nearest,
    Reflect,
    Zero,
}

impl From<EdgeArg> for EdgeMode {
    fn from(arg: EdgeArg) -> Self {
        match arg {
            EdgeArg::Nearest => EdgeMode::Nearest,
            EdgeArg::Reflect => EdgeMode::Reflect,
            EdgeArg::Zero => EdgeMode::Zero,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum NormalizeArg {
    None,
    #[value(name = "z-score")]
    ZScore,
    #[value(name = "unit-peak")]
    UnitPeak,
}

impl From<NormalizeArg> for Normalization {
    fn from(arg: NormalizeArg) -> Self {
        match arg {
            NormalizeArg::None => Normalization::None,
            NormalizeArg::ZScore => Normalization::ZScore,
            NormalizeArg::UnitPeak => Normalization::UnitPeak,
        }
    }
}

/// Column layout of delimited recordings.
#[derive(Args, Clone, Debug)]
struct TableArgs {
    /// Voltage column (name or zero-based index)
    #[arg(long)]
    column: Option<String>,
    /// Time column in seconds, used to estimate the sampling frequency when --fs is absent
    #[arg(long)]
    time_column: Option<String>,
    /// Field delimiter (default: tab)
    #[arg(long)]
    delimiter: Option<char>,
}

/// Where one recording comes from.
#[derive(Args, Clone, Debug)]
struct SourceArgs {
    /// Newline-delimited samples; stdin is read when neither --input nor --table is given
    #[arg(long, conflicts_with = "table")]
    input: Option<PathBuf>,
    /// Delimited recording with a header row
    #[arg(long)]
    table: Option<PathBuf>,
    /// Sampling frequency in Hz
    #[arg(long)]
    fs: Option<f64>,
    #[command(flatten)]
    layout: TableArgs,
}

/// Command-line overrides for the pipeline configuration.
#[derive(Args, Clone, Debug)]
struct PipelineArgs {
    #[arg(long)]
    lowcut_hz: Option<f64>,
    #[arg(long)]
    highcut_hz: Option<f64>,
    #[arg(long)]
    filter_order: Option<usize>,
    #[arg(long)]
    integration_window_s: Option<f64>,
    /// Minimum peak prominence in the integrated signal
    #[arg(long)]
    prominence: Option<f64>,
    #[arg(long, value_enum)]
    edge_mode: Option<EdgeArg>,
    #[arg(long, value_enum)]
    normalize: Option<NormalizeArg>,
}

impl PipelineArgs {
    fn resolve(&self, base: PanTompkinsConfig) -> PanTompkinsConfig {
        PanTompkinsConfig {
            lowcut_hz: self.lowcut_hz.unwrap_or(base.lowcut_hz),
            highcut_hz: self.highcut_hz.unwrap_or(base.highcut_hz),
            filter_order: self.filter_order.unwrap_or(base.filter_order),
            integration_window_s: self
                .integration_window_s
                .unwrap_or(base.integration_window_s),
            edge_mode: self.edge_mode.map_or(base.edge_mode, EdgeMode::from),
            peak_prominence_threshold: self.prominence.unwrap_or(base.peak_prominence_threshold),
            normalization: self
                .normalize
                .map_or(base.normalization, Normalization::from),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the heart rate (bpm) of one recording
    HeartRate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Dump every intermediate pipeline stage of one recording as JSON
    Stages {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Estimate heart rates for several delimited recordings, one JSON line each
    Batch {
        #[arg(required = true)]
        tables: Vec<PathBuf>,
        /// Sampling frequency in Hz shared by every recording
        #[arg(long)]
        fs: Option<f64>,
        #[command(flatten)]
        layout: TableArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// List the columns of a delimited recording
    Columns {
        table: PathBuf,
        /// Field delimiter (default: tab)
        #[arg(long)]
        delimiter: Option<char>,
    },
}

#[derive(Serialize)]
struct BatchLine<'a> {
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<HeartRateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ColumnsOutput<'a> {
    columns: &'a [String],
    units: &'a [Option<String>],
    rows: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let file_cfg = match cli.config.as_deref() {
        Some(path) => {
            info!("loading config from {}", path.display());
            load_config(path)?
        }
        None => HrxConfig::default(),
    };

    match cli.command {
        Commands::HeartRate { source, pipeline } => cmd_heart_rate(&file_cfg, &source, &pipeline)?,
        Commands::Stages { source, pipeline } => cmd_stages(&file_cfg, &source, &pipeline)?,
        Commands::Batch {
            tables,
            fs,
            layout,
            pipeline,
        } => cmd_batch(&file_cfg, &tables, fs, &layout, &pipeline)?,
        Commands::Columns { table, delimiter } => cmd_columns(&file_cfg, &table, delimiter)?,
    }
    Ok(())
}

fn delimiter_byte(file_cfg: &HrxConfig, flag: Option<char>) -> Result<u8> {
    match flag.or(file_cfg.delimiter) {
        None => Ok(table_io::DEFAULT_DELIMITER),
        Some(c) if c.is_ascii() => Ok(c as u8),
        Some(c) => bail!("delimiter must be a single ASCII character, got {:?}", c),
    }
}

fn load_table_recording(
    file_cfg: &HrxConfig,
    path: &Path,
    fs: Option<f64>,
    layout: &TableArgs,
) -> Result<TimeSeries> {
    let column = layout
        .column
        .as_deref()
        .or(file_cfg.column.as_deref())
        .ok_or_else(|| anyhow!("--column is required for delimited recordings"))?;
    let time_column = layout
        .time_column
        .as_deref()
        .or(file_cfg.time_column.as_deref());
    let delimiter = delimiter_byte(file_cfg, layout.delimiter)?;
    table_io::load_column(path, column, delimiter, fs.or(file_cfg.fs), time_column)
}

fn load_recording(file_cfg: &HrxConfig, source: &SourceArgs) -> Result<TimeSeries> {
    let ts = if let Some(path) = source.table.as_deref() {
        load_table_recording(file_cfg, path, source.fs, &source.layout)?
    } else {
        let fs = source
            .fs
            .or(file_cfg.fs)
            .ok_or_else(|| anyhow!("--fs is required for newline-delimited samples"))?;
        let data = match source.input.as_deref() {
            Some(path) => text_io::read_samples_file(path)?,
            None => text_io::read_samples(io::stdin().lock())?,
        };
        TimeSeries::new(fs, data)
    };
    info!("loaded {} samples at {} Hz", ts.len(), ts.fs);
    Ok(ts)
}

fn cmd_heart_rate(file_cfg: &HrxConfig, source: &SourceArgs, pipeline: &PipelineArgs) -> Result<()> {
    let ts = load_recording(file_cfg, source)?;
    let cfg = pipeline.resolve(file_cfg.pipeline);
    let result = compute_heart_rate_with_config(&ts, &cfg).context("estimating heart rate")?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_stages(file_cfg: &HrxConfig, source: &SourceArgs, pipeline: &PipelineArgs) -> Result<()> {
    let ts = load_recording(file_cfg, source)?;
    let cfg = pipeline.resolve(file_cfg.pipeline);
    let trace = run_pipeline(&ts, &cfg).context("running pipeline")?;
    println!("{}", serde_json::to_string(&trace)?);
    Ok(())
}

fn cmd_batch(
    file_cfg: &HrxConfig,
    tables: &[PathBuf],
    fs: Option<f64>,
    layout: &TableArgs,
    pipeline: &PipelineArgs,
) -> Result<()> {
    let cfg = pipeline.resolve(file_cfg.pipeline);
    let mut failures = 0usize;
    for path in tables {
        let outcome = load_table_recording(file_cfg, path, fs, layout).and_then(|ts| {
            compute_heart_rate_with_config(&ts, &cfg).context("estimating heart rate")
        });
        let line = match outcome {
            Ok(result) => BatchLine {
                path,
                result: Some(result),
                error: None,
            },
            Err(err) => {
                warn!("{}: {:#}", path.display(), err);
                failures += 1;
                BatchLine {
                    path,
                    result: None,
                    error: Some(format!("{:#}", err)),
                }
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    if failures > 0 {
        bail!("{} of {} recordings failed", failures, tables.len());
    }
    Ok(())
}

fn cmd_columns(file_cfg: &HrxConfig, path: &Path, delimiter: Option<char>) -> Result<()> {
    let table = table_io::read_table(path, delimiter_byte(file_cfg, delimiter)?)?;
    let out = ColumnsOutput {
        columns: &table.columns,
        units: &table.units,
        rows: table.row_count(),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
