//! "Soup of the Day" message report.
//!
//! Writes the next-bar summary as plain text for a chat notifier to post.
//! When the message is over the chat limit its chunks are written in order,
//! separated by a line holding only [`CHUNK_SEPARATOR`].

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::error::SoupError;
use crate::domain::series::SeriesOutput;
use crate::domain::summary::{build_message, chunk_message, NextBarSignal};
use crate::ports::report_port::ReportPort;

pub const CHUNK_SEPARATOR: &str = "---";

pub struct MessageReport {
    now: NaiveDateTime,
}

impl MessageReport {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn now_local() -> Self {
        Self::new(chrono::Local::now().naive_local())
    }

    /// Message chunks, each within the chat limit.
    pub fn render(&self, outputs: &[SeriesOutput]) -> Vec<String> {
        let lines: Vec<String> = outputs
            .iter()
            .map(|o| NextBarSignal::from_output(o).line())
            .collect();
        chunk_message(&build_message(self.now, &lines))
    }
}

impl ReportPort for MessageReport {
    fn write(&self, outputs: &[SeriesOutput], output_path: &Path) -> Result<(), SoupError> {
        let chunks = self.render(outputs);
        let text = chunks.join(&format!("\n{CHUNK_SEPARATOR}\n"));

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(SoupError::Io)?;
        }
        fs::write(output_path, text).map_err(SoupError::Io)?;

        tracing::info!(
            path = %output_path.display(),
            chunks = chunks.len(),
            "message written"
        );
        Ok(())
    }
}
