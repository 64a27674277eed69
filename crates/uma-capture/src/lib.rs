use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Pixel rectangle on the device screen (x, y, width, height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamp this region to an image of the given size.
    /// Returns `None` when nothing of the region lies inside the image.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<ScreenRegion> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(ScreenRegion::new(self.x, self.y, width, height))
    }
}

/// Well-known regions for the portrait phone layout (1080 px wide, up to 2400 px tall).
pub mod regions {
    use super::ScreenRegion;

    /// Left-edge strip where the event choice markers are drawn.
    pub const fn event_choices() -> ScreenRegion {
        ScreenRegion::new(6, 450, 126, 1776)
    }

    /// Event title banner at the top of an event dialog.
    pub const fn event_name() -> ScreenRegion {
        ScreenRegion::new(243, 201, 365, 45)
    }
}

/// A captured frame plus the moment it was taken.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub image: Arc<RgbaImage>,
    /// Milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
}

impl Screenshot {
    pub fn new(image: RgbaImage, captured_at_ms: u64) -> Self {
        Self {
            image: Arc::new(image),
            captured_at_ms,
        }
    }

    /// Wrap an image stamped with the current wall-clock time.
    pub fn now(image: RgbaImage) -> Self {
        Self::new(image, now_millis())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn crop(&self, region: &ScreenRegion) -> RgbaImage {
        crop_region(&self.image, region)
    }
}

/// Supplies screenshots to the decision pipeline.
///
/// Implementations wrap whatever device or emulator I/O is available; the
/// pipeline only needs a fresh frame on demand.
pub trait ScreenSource {
    fn capture(&mut self) -> Result<Screenshot>;
}

/// Replays a single still image, restamped on every capture.
/// Used by the CLI and for offline analysis of saved frames.
pub struct StillImageSource {
    path: PathBuf,
    image: Arc<RgbaImage>,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to open screenshot {}", path.display()))?
            .to_rgba8();
        info!(
            "Loaded still screenshot {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            path: path.to_path_buf(),
            image: Arc::new(image),
        })
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            image: Arc::new(image),
        }
    }
}

impl ScreenSource for StillImageSource {
    fn capture(&mut self) -> Result<Screenshot> {
        debug!("Replaying still frame from {}", self.path.display());
        Ok(Screenshot {
            image: self.image.clone(),
            captured_at_ms: now_millis(),
        })
    }
}

/// Crop a pixel region from a frame, clamped to the frame bounds.
/// A region entirely outside the frame yields an empty image.
pub fn crop_region(frame: &RgbaImage, region: &ScreenRegion) -> RgbaImage {
    match region.clamp_to(frame.width(), frame.height()) {
        Some(r) => image::imageops::crop_imm(frame, r.x, r.y, r.width, r.height).to_image(),
        None => RgbaImage::new(0, 0),
    }
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regions_fit_reference_screen() {
        for region in [regions::event_choices(), regions::event_name()] {
            assert!(region.width > 0 && region.height > 0);
            assert!(region.x + region.width <= 1080);
            assert!(region.y + region.height <= 2400);
        }
    }

    #[test]
    fn test_crop_region() {
        let img = RgbaImage::new(1080, 1920);
        let cropped = crop_region(&img, &ScreenRegion::new(100, 200, 50, 40));
        assert_eq!(cropped.dimensions(), (50, 40));
    }

    #[test]
    fn test_crop_region_clamps_to_frame() {
        let img = RgbaImage::new(200, 300);
        let cropped = crop_region(&img, &ScreenRegion::new(150, 250, 100, 100));
        assert_eq!(cropped.dimensions(), (50, 50));
    }

    #[test]
    fn test_crop_region_outside_frame_is_empty() {
        let img = RgbaImage::new(200, 300);
        let cropped = crop_region(&img, &ScreenRegion::new(500, 10, 20, 20));
        assert_eq!(cropped.dimensions(), (0, 0));
    }

    #[test]
    fn test_still_source_restamps() {
        let mut source = StillImageSource::from_image(RgbaImage::new(4, 4));
        let shot = source.capture().unwrap();
        assert_eq!(shot.width(), 4);
        assert!(shot.captured_at_ms > 0);
    }
}
