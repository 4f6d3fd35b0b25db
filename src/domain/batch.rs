//! Runs many independent series in parallel.
//!
//! Each (instrument, timeframe) pair is one rayon task with no shared mutable
//! state. A series that fails to load or simulate is recorded and logged; the
//! rest of the batch carries on.

use crate::domain::error::SoupError;
use crate::domain::instrument::InstrumentParams;
use crate::domain::series::{run_series, SeriesKey, SeriesOutput};
use crate::ports::data_port::DataPort;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct SeriesJob {
    pub key: SeriesKey,
    pub params: InstrumentParams,
}

#[derive(Debug)]
pub struct SeriesFailure {
    pub key: SeriesKey,
    pub error: SoupError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<SeriesOutput>,
    pub failed: Vec<SeriesFailure>,
}

fn run_job<P>(data_port: &P, job: &SeriesJob) -> Result<SeriesOutput, SoupError>
where
    P: DataPort + ?Sized,
{
    let bars = data_port.fetch_bars(&job.key.instrument, &job.key.timeframe)?;
    if bars.is_empty() {
        return Err(SoupError::NoData {
            instrument: job.key.instrument.clone(),
            timeframe: job.key.timeframe.clone(),
        });
    }
    tracing::debug!(series = %job.key, bars = bars.len(), "simulating series");
    run_series(job.key.clone(), bars, &job.params)
}

/// Results come back in job order regardless of completion order.
pub fn run_batch<P>(data_port: &P, jobs: &[SeriesJob]) -> BatchReport
where
    P: DataPort + Sync + ?Sized,
{
    let results: Vec<(SeriesKey, Result<SeriesOutput, SoupError>)> = jobs
        .par_iter()
        .map(|job| (job.key.clone(), run_job(data_port, job)))
        .collect();

    let mut report = BatchReport::default();
    for (key, result) in results {
        match result {
            Ok(output) => {
                tracing::info!(series = %key, bars = output.bars.len(), "signals computed");
                report.completed.push(output);
            }
            Err(error) => {
                tracing::warn!(series = %key, "skipping series: {error}");
                report.failed.push(SeriesFailure { key, error });
            }
        }
    }
    report
}
