pub mod artifacts;
pub mod chart;
mod document;
mod error;
pub mod pdf;

pub use artifacts::ReportArtifacts;
pub use chart::{Chart, ChartLabel, Series};
pub use document::{REPORT_TITLE, ReportRequest, generate_report};
pub use error::ReportError;
pub use pdf::ReportWriter;
