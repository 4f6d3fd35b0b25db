//! Equity curve CSV for plotting, one block of rows per series.

use std::fs;
use std::path::Path;

use crate::domain::equity::equity_curve;
use crate::domain::error::SoupError;
use crate::domain::series::SeriesOutput;
use crate::ports::report_port::ReportPort;

pub struct EquityReport;

impl ReportPort for EquityReport {
    fn write(&self, outputs: &[SeriesOutput], output_path: &Path) -> Result<(), SoupError> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(SoupError::Io)?;
        }

        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| {
            SoupError::Io(std::io::Error::other(e.to_string()))
        })?;
        let write_err = |e: csv::Error| SoupError::Io(std::io::Error::other(e.to_string()));

        wtr.write_record([
            "instrument",
            "timeframe",
            "timestamp",
            "account_value",
            "percent_change",
        ])
        .map_err(write_err)?;

        for output in outputs {
            // the first record always carries the starting capital
            let Some(initial) = output.records.first().map(|r| r.account_value) else {
                continue;
            };
            for point in equity_curve(&output.records, initial) {
                wtr.write_record([
                    output.key.instrument.clone(),
                    output.key.timeframe.clone(),
                    point.timestamp.to_string(),
                    format!("{:.2}", point.account_value),
                    format!("{:.4}", point.percent_change),
                ])
                .map_err(write_err)?;
            }
        }
        wtr.flush().map_err(SoupError::Io)?;

        tracing::info!(
            path = %output_path.display(),
            series = outputs.len(),
            "equity curve written"
        );
        Ok(())
    }
}
