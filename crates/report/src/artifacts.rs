use crate::ReportError;
use image::RgbImage;
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch directory for the files one report is built from.
///
/// Each report gets its own directory, so concurrent reports never share
/// a chart file. Everything is removed when the value is dropped.
#[derive(Debug)]
pub struct ReportArtifacts {
    dir: TempDir,
}

impl ReportArtifacts {
    pub fn new() -> Result<Self, ReportError> {
        let dir = tempfile::Builder::new().prefix("report-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Write a chart raster as PNG and return its path.
    pub fn save_chart(&self, image: &RgbImage) -> Result<PathBuf, ReportError> {
        let path = self.dir.path().join("confidence_chart.png");
        image.save_with_format(&path, image::ImageFormat::Png)?;
        Ok(path)
    }
}
