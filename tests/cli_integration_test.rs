//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config loading and validation with real INI files on disk
//! - `run` end to end over a CSV directory (signals, message, equity outputs)
//! - Exit codes for config, data and database failures
//! - `import` into SQLite followed by a SQLite-backed run

mod common;

use clap::Parser;
use common::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;
use turtlesoup::adapters::file_config_adapter::FileConfigAdapter;
use turtlesoup::cli::{self, Cli};
use turtlesoup::domain::run_config::{DataSource, RunConfig};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode doesn't implement PartialEq, so compare the Debug output
fn same_code(actual: ExitCode, expected: u8) -> bool {
    format!("{actual:?}") == format!("{:?}", ExitCode::from(expected))
}

fn run_cli(args: &[&str]) -> ExitCode {
    let mut argv = vec!["turtlesoup"];
    argv.extend_from_slice(args);
    cli::run(Cli::parse_from(argv))
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Data directory holding the breakdown round-trip series and its config.
fn scenario_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("I:NDX_1d.csv"), bars_csv(&round_trip_bars())).unwrap();
    let ini = dir.path().join("soup.ini");
    fs::write(&ini, scenario_ini(path_str(dir.path()))).unwrap();
    (dir, ini)
}

mod config_loading {
    use super::*;

    #[test]
    fn scenario_config_resolves() {
        let adapter = FileConfigAdapter::from_string(&scenario_ini("/data")).unwrap();
        let run = RunConfig::from_config(&adapter).unwrap();

        assert_eq!(run.source, DataSource::Csv);
        assert_eq!(run.dir, PathBuf::from("/data"));
        assert_eq!(run.params["I:NDX"], ndx_params());
        assert_eq!(run.jobs(None, None).len(), 1);
    }

    #[test]
    fn load_config_missing_file_is_config_error() {
        let result = cli::load_config(Path::new("/nonexistent/path/soup.ini"));
        assert!(same_code(result.err().unwrap(), 2));
    }

    #[test]
    fn validate_command_accepts_valid_file() {
        let file = write_temp_ini(&scenario_ini("data"));
        assert!(same_code(run_cli(&["validate", "-c", path_str(file.path())]), 0));
    }

    #[test]
    fn validate_command_rejects_unknown_instrument() {
        let ini = scenario_ini("data").replace("instruments = I:NDX", "instruments = I:NDX, QQQ");
        let file = write_temp_ini(&ini);
        assert!(same_code(run_cli(&["validate", "-c", path_str(file.path())]), 2));
    }
}

mod run_command {
    use super::*;

    #[test]
    fn run_writes_signals_message_and_equity() {
        let (dir, ini) = scenario_dir();
        let message = dir.path().join("out").join("message.txt");
        let equity = dir.path().join("out").join("equity.csv");

        let code = run_cli(&[
            "run",
            "-c",
            path_str(&ini),
            "-o",
            path_str(&message),
            "--equity",
            path_str(&equity),
        ]);
        assert!(same_code(code, 0));

        let signals = fs::read_to_string(dir.path().join("I:NDX_1d_signals.csv")).unwrap();
        let rows: Vec<&str> = signals.lines().collect();
        assert_eq!(rows.len(), 31);
        assert!(rows[26].contains(",long,99,96.75,110,,44,10000,"));
        assert!(rows[30].contains(",close,"));
        assert!(rows[30].ends_with(",target,110"));

        let text = fs::read_to_string(&message).unwrap();
        assert!(text.starts_with("**Soup of the Day - "));
        assert!(text.contains("**I:NDX 1d**: No signal for next bar"));

        let curve = fs::read_to_string(&equity).unwrap();
        let last = curve.lines().last().unwrap();
        assert_eq!(last, format!("I:NDX,1d,{},10401.92,4.0192", ts(29)));
    }

    #[test]
    fn run_is_repeatable() {
        let (dir, ini) = scenario_dir();
        let signals = dir.path().join("I:NDX_1d_signals.csv");

        assert!(same_code(run_cli(&["run", "-c", path_str(&ini)]), 0));
        let first = fs::read_to_string(&signals).unwrap();
        assert!(same_code(run_cli(&["run", "-c", path_str(&ini)]), 0));
        assert_eq!(fs::read_to_string(&signals).unwrap(), first);
    }

    #[test]
    fn unmatched_filter_is_config_error() {
        let (_dir, ini) = scenario_dir();
        let code = run_cli(&["run", "-c", path_str(&ini), "--timeframe", "5m"]);
        assert!(same_code(code, 2));
    }

    #[test]
    fn missing_csv_is_database_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&scenario_ini(path_str(dir.path())));
        assert!(same_code(run_cli(&["run", "-c", path_str(ini.path())]), 3));
    }

    #[test]
    fn missing_column_is_data_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("I:NDX_1d.csv"),
            "timestamp,open,high,close\n1,2,3,2\n",
        )
        .unwrap();
        let ini = write_temp_ini(&scenario_ini(path_str(dir.path())));
        assert!(same_code(run_cli(&["run", "-c", path_str(ini.path())]), 5));
    }

    #[test]
    fn one_bad_series_does_not_fail_the_run() {
        let (dir, _) = scenario_dir();
        let ini = scenario_ini(path_str(dir.path()))
            .replace("instruments = I:NDX", "instruments = I:NDX, SPY")
            + "\n[instrument.SPY]\ntick_size = 0.01\ndollar_per_point = 1\n";
        let file = write_temp_ini(&ini);

        assert!(same_code(run_cli(&["run", "-c", path_str(file.path())]), 0));
        assert!(dir.path().join("I:NDX_1d_signals.csv").exists());
        assert!(!dir.path().join("SPY_1d_signals.csv").exists());
    }
}

mod listing {
    use super::*;

    #[test]
    fn list_series_and_info_succeed() {
        let (_dir, ini) = scenario_dir();
        assert!(same_code(run_cli(&["list-series", "-c", path_str(&ini)]), 0));
        assert!(same_code(
            run_cli(&["info", "-c", path_str(&ini), "--instrument", "I:NDX"]),
            0
        ));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_import {
    use super::*;
    use turtlesoup::adapters::sqlite_adapter::SqliteAdapter;
    use turtlesoup::ports::data_port::DataPort;

    #[test]
    fn import_then_run_from_sqlite() {
        let (dir, _) = scenario_dir();
        let db = dir.path().join("market.db");
        let ini = scenario_ini(path_str(dir.path()))
            .replace("source = csv", "source = sqlite")
            .replace("[data]", &format!("[data]\ndb_path = {}", path_str(&db)));
        let file = write_temp_ini(&ini);
        let config = path_str(file.path());

        let code = run_cli(&["import", "-c", config, "--csv-dir", path_str(dir.path())]);
        assert!(same_code(code, 0));
        assert!(same_code(run_cli(&["run", "-c", config]), 0));

        let adapter = SqliteAdapter::open(&db, 1).unwrap();
        assert_eq!(adapter.fetch_bars("I:NDX", "1d").unwrap(), round_trip_bars());
        let records = adapter
            .fetch_signals(&turtlesoup::domain::series::SeriesKey::new("I:NDX", "1d"))
            .unwrap();
        assert_eq!(records.len(), 30);
        assert!((records[29].account_value - 10_401.92).abs() < 1e-9);
    }
}
