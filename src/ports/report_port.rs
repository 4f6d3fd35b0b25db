//! Report generation port trait.

use crate::domain::error::SoupError;
use crate::domain::series::SeriesOutput;
use std::path::Path;

/// Port for writing what downstream notifiers and plotters consume.
pub trait ReportPort {
    fn write(&self, outputs: &[SeriesOutput], output_path: &Path) -> Result<(), SoupError>;
}
