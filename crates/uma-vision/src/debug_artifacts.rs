use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::PathBuf;
use tracing::debug;

/// Persists crops that failed recognition so they can be inspected offline.
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    dir: PathBuf,
    enabled: bool,
}

impl DebugArtifacts {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    /// File name for a failed crop, derived only from its label and capture time.
    pub fn failure_file_name(label: &str, captured_at_ms: u64) -> String {
        format!("debug_{}_failed_{}.png", label, captured_at_ms)
    }

    /// Save `image` as a failed `label` crop. Returns the written path,
    /// or `None` when artifacts are disabled or the crop is empty.
    pub fn save_failure(
        &self,
        label: &str,
        image: &RgbaImage,
        captured_at_ms: u64,
    ) -> Result<Option<PathBuf>> {
        if !self.enabled || image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self
            .dir
            .join(Self::failure_file_name(label, captured_at_ms));
        image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Saved debug image {} ({}x{})", path.display(), image.width(), image.height());
        Ok(Some(path))
    }
}
