//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::equity_report::EquityReport;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::message_report::MessageReport;
use crate::domain::batch::{run_batch, BatchReport, SeriesFailure};
use crate::domain::error::SoupError;
use crate::domain::run_config::{DataSource, RunConfig};
use crate::domain::series::SeriesKey;
use crate::domain::summary::NextBarSignal;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::store_port::SignalStore;

#[derive(Parser, Debug)]
#[command(name = "turtlesoup", about = "Turtle Soup breakout-fade signal generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute features and next-bar signals for every configured series
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Write the "Soup of the Day" message to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the equity curve CSV to this file
        #[arg(long)]
        equity: Option<PathBuf>,
    },
    /// Load CSV bar files into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv_dir: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show bar count and date range per series
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// List series available from the configured data source
    ListSeries {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Bar source and signal sink behind one configured backend.
pub trait SeriesBackend: DataPort + SignalStore + Sync {}

impl<T: DataPort + SignalStore + Sync> SeriesBackend for T {}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            instrument,
            timeframe,
            output,
            equity,
        } => run_signals(
            &config,
            instrument.as_deref(),
            timeframe.as_deref(),
            output.as_deref(),
            equity.as_deref(),
        ),
        Command::Import { config, csv_dir } => run_import(&config, &csv_dir),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            config,
            instrument,
            timeframe,
        } => run_info(&config, instrument.as_deref(), timeframe.as_deref()),
        Command::ListSeries { config } => run_list_series(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SoupError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: &SoupError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn open_backend(run: &RunConfig) -> Result<Box<dyn SeriesBackend>, SoupError> {
    match run.source {
        DataSource::Csv => Ok(Box::new(CsvAdapter::new(run.dir.clone()))),
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => {
            let adapter =
                crate::adapters::sqlite_adapter::SqliteAdapter::open(&run.db_path, run.pool_size)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => Err(SoupError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "sqlite support was not compiled in".into(),
        }),
    }
}

/// Persists every completed series; a store failure moves that series to
/// the failed list.
pub fn persist<S>(backend: &S, report: &mut BatchReport)
where
    S: SignalStore + ?Sized,
{
    let completed = std::mem::take(&mut report.completed);
    for output in completed {
        match backend.save_series(&output) {
            Ok(()) => report.completed.push(output),
            Err(error) => {
                tracing::warn!(series = %output.key, "failed to store signals: {error}");
                report.failed.push(SeriesFailure {
                    key: output.key,
                    error,
                });
            }
        }
    }
}

fn run_signals(
    config_path: &Path,
    instrument: Option<&str>,
    timeframe: Option<&str>,
    output_path: Option<&Path>,
    equity_path: Option<&Path>,
) -> ExitCode {
    tracing::info!("loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let run_config = match RunConfig::from_config(&config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let jobs = run_config.jobs(instrument, timeframe);
    if jobs.is_empty() {
        return fail(&SoupError::ConfigInvalid {
            section: "strategy".into(),
            key: "instruments".into(),
            reason: "no configured series match the requested instrument/timeframe".into(),
        });
    }

    let backend = match open_backend(&run_config) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };

    tracing::info!(series = jobs.len(), "computing signals");
    let mut report = run_batch(&*backend, &jobs);
    persist(&*backend, &mut report);

    for output in &report.completed {
        println!("{}", NextBarSignal::from_output(output).line());
    }

    if let Some(path) = output_path {
        if let Err(e) = MessageReport::now_local().write(&report.completed, path) {
            return fail(&e);
        }
    }
    if let Some(path) = equity_path {
        if let Err(e) = EquityReport.write(&report.completed, path) {
            return fail(&e);
        }
    }

    if !report.failed.is_empty() {
        eprintln!(
            "{} of {} series failed",
            report.failed.len(),
            report.failed.len() + report.completed.len()
        );
    }
    match (report.completed.is_empty(), report.failed.first()) {
        (true, Some(failure)) => (&failure.error).into(),
        _ => ExitCode::SUCCESS,
    }
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, csv_dir: &Path) -> ExitCode {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let run_config = match RunConfig::from_config(&config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let store = match SqliteAdapter::open(&run_config.db_path, run_config.pool_size) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = store.initialize_schema() {
        return fail(&e);
    }

    let source = CsvAdapter::new(csv_dir.to_path_buf());
    let keys = match source.list_series() {
        Ok(k) => k,
        Err(e) => return fail(&e),
    };
    if keys.is_empty() {
        eprintln!("No CSV series found in {}", csv_dir.display());
        return ExitCode::SUCCESS;
    }

    let mut imported = 0;
    for key in &keys {
        let result = source
            .fetch_bars(&key.instrument, &key.timeframe)
            .and_then(|bars| store.save_bars(key, &bars).map(|_| bars.len()));
        match result {
            Ok(count) => {
                tracing::info!(series = %key, bars = count, "imported");
                imported += 1;
            }
            Err(e) => tracing::warn!(series = %key, "skipping import: {e}"),
        }
    }

    eprintln!("{imported} of {} series imported", keys.len());
    if imported == 0 {
        ExitCode::from(5)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_config_path: &Path, _csv_dir: &Path) -> ExitCode {
    eprintln!("error: sqlite feature is required for import");
    ExitCode::from(1)
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let run_config = match RunConfig::from_config(&config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    for (name, params) in &run_config.params {
        eprintln!(
            "  {name}: tick {} x {} per point, commission {}, periods {}/{}, risk {}, capital {}",
            params.tick_size,
            params.dollar_per_point,
            params.commission_per_unit,
            params.entry_period,
            params.exit_period,
            params.risk_percent,
            params.initial_account_value,
        );
    }
    eprintln!("  timeframes: {}", run_config.timeframes.join(", "));
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn format_range(first: i64, last: i64) -> (String, String) {
    let fmt = |ms: i64| {
        chrono::DateTime::from_timestamp_millis(ms)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ms.to_string())
    };
    (fmt(first), fmt(last))
}

fn run_info(config_path: &Path, instrument: Option<&str>, timeframe: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let run_config = match RunConfig::from_config(&config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let backend = match open_backend(&run_config) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };

    let keys: Vec<SeriesKey> = run_config
        .jobs(instrument, timeframe)
        .into_iter()
        .map(|job| job.key)
        .collect();
    for key in &keys {
        match backend.get_data_range(&key.instrument, &key.timeframe) {
            Ok(Some((first, last, count))) => {
                let (from, to) = format_range(first, last);
                println!("{key}: {count} bars, {from} to {to}");
            }
            Ok(None) => eprintln!("{key}: no data found"),
            Err(e) => eprintln!("error querying {key}: {e}"),
        }
    }
    ExitCode::SUCCESS
}

fn run_list_series(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let run_config = match RunConfig::from_config(&config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let backend = match open_backend(&run_config) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };

    let keys = match backend.list_series() {
        Ok(k) => k,
        Err(e) => return fail(&e),
    };
    if keys.is_empty() {
        eprintln!("No series found");
    } else {
        for key in &keys {
            println!("{key}");
        }
        eprintln!("{} series found", keys.len());
    }
    ExitCode::SUCCESS
}
