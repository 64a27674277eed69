use image::{GrayImage, RgbaImage};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};
use uma_capture::{ScreenRegion, Screenshot};

/// Gray level above which a pixel counts as (white) title text
const TEXT_THRESHOLD: u8 = 200;

/// Default minimum Tesseract word confidence (0-100)
pub const DEFAULT_MIN_WORD_CONFIDENCE: f64 = 80.0;

/// OCR output for one region. An empty string is a failed read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedText(String);

impl RecognizedText {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(text.as_ref().trim().to_string())
    }

    pub fn failed() -> Self {
        Self(String::new())
    }

    pub fn is_failure(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Turns a cropped image into text.
pub trait TextReader {
    fn read_text(&self, image: &RgbaImage) -> RecognizedText;
}

/// Crop exactly `region` from the screenshot and read it.
pub fn extract_text(
    reader: &dyn TextReader,
    screenshot: &Screenshot,
    region: &ScreenRegion,
) -> (RecognizedText, RgbaImage) {
    let crop = screenshot.crop(region);
    if crop.width() == 0 || crop.height() == 0 {
        warn!("Text region {:?} is empty for this frame", region);
        return (RecognizedText::failed(), crop);
    }
    let text = reader.read_text(&crop);
    (text, crop)
}

/// Reads event titles using the Tesseract CLI.
/// Falls back gracefully when Tesseract is not installed.
pub struct EventNameReader {
    tesseract_available: bool,
    min_word_confidence: f64,
    temp_dir: PathBuf,
}

impl Default for EventNameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EventNameReader {
    pub fn new() -> Self {
        let tesseract_available = check_tesseract();
        if tesseract_available {
            debug!("Tesseract OCR available");
        } else {
            warn!("Tesseract not found. Event name OCR disabled.");
        }

        let temp_dir = std::env::temp_dir().join("uma_pilot_ocr");
        let _ = std::fs::create_dir_all(&temp_dir);

        Self {
            tesseract_available,
            min_word_confidence: DEFAULT_MIN_WORD_CONFIDENCE,
            temp_dir,
        }
    }

    pub fn with_min_word_confidence(mut self, confidence: f64) -> Self {
        self.min_word_confidence = confidence;
        self
    }

    pub fn is_available(&self) -> bool {
        self.tesseract_available
    }

    fn run_tesseract(&self, image: &GrayImage) -> Option<String> {
        let temp = ScratchImage::write(
            self.temp_dir
                .join(format!("event_name_{}.png", std::process::id())),
            image,
        )?;

        let output = Command::new("tesseract")
            .arg(&temp.path)
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .arg("-c")
            .arg("preserve_interword_spaces=1")
            .arg("tsv")
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let tsv = String::from_utf8(output.stdout).ok()?;
        Some(confident_words(&tsv, self.min_word_confidence))
    }
}

impl TextReader for EventNameReader {
    fn read_text(&self, image: &RgbaImage) -> RecognizedText {
        if !self.tesseract_available {
            return RecognizedText::failed();
        }

        let processed = preprocess_for_ocr(image);
        match self.run_tesseract(&processed) {
            Some(text) => {
                debug!("Event name OCR result: '{}'", text);
                RecognizedText::new(text)
            }
            None => RecognizedText::failed(),
        }
    }
}

/// Image file handed to Tesseract; removed again when dropped.
struct ScratchImage {
    path: PathBuf,
}

impl ScratchImage {
    fn write(path: PathBuf, image: &GrayImage) -> Option<Self> {
        match image.save(&path) {
            Ok(()) => Some(Self { path }),
            Err(e) => {
                warn!("Failed to write OCR input {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Drop for ScratchImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Join the words of Tesseract TSV output whose confidence reaches `min_confidence`.
fn confident_words(tsv: &str, min_confidence: f64) -> String {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let conf: f64 = cols[10].trim().parse().ok()?;
            let word = cols[11].trim();
            (!word.is_empty() && conf >= min_confidence).then_some(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pre-process an RGBA crop for OCR:
/// 1. Convert to grayscale
/// 2. Keep only bright pixels (titles are white)
/// 3. Invert so text is dark on white (Tesseract preference)
pub fn preprocess_for_ocr(image: &RgbaImage) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let (w, h) = gray.dimensions();

    GrayImage::from_fn(w, h, |x, y| {
        if gray.get_pixel(x, y)[0] > TEXT_THRESHOLD {
            image::Luma([0u8])
        } else {
            image::Luma([255u8])
        }
    })
}

/// Linearly stretch each channel so the crop spans the full 0-255 range.
/// Helps banners drawn over tinted backgrounds reach the text threshold.
pub fn stretch_contrast(image: &RgbaImage) -> RgbaImage {
    let gray = image::imageops::grayscale(image);
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if hi <= lo {
        return image.clone();
    }

    let scale = 255.0 / (hi - lo) as f64;
    let mut out = image.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            let v = (px[c].saturating_sub(lo) as f64 * scale).round();
            px[c] = v.clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn check_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([230, 230, 230, 255])
            } else {
                image::Rgba([150, 150, 150, 255])
            }
        });
        let processed = preprocess_for_ocr(&img);
        assert_eq!(processed.get_pixel(0, 0)[0], 0);
        assert_eq!(processed.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn test_confident_words_filters_low_confidence() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t365\t45\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t3\t4\t60\t30\t96.5\tNew\n\
                   5\t1\t1\t1\t1\t2\t70\t4\t60\t30\t42.0\t~\n\
                   5\t1\t1\t1\t1\t3\t140\t4\t60\t30\t91.0\tYear\n";
        assert_eq!(confident_words(tsv, 80.0), "New Year");
    }

    #[test]
    fn test_recognized_text_trims_and_flags_failure() {
        assert_eq!(RecognizedText::new("  Dance Lesson \n").as_str(), "Dance Lesson");
        assert!(RecognizedText::new("   ").is_failure());
        assert!(RecognizedText::failed().is_failure());
    }

    #[test]
    fn test_scratch_image_removed_on_drop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("event_name_1.png");
        let scratch = ScratchImage::write(path.clone(), &GrayImage::new(4, 4)).unwrap();
        assert!(scratch.path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_image_unwritable_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("event_name_1.png");
        assert!(ScratchImage::write(path, &GrayImage::new(4, 4)).is_none());
    }

    struct EchoReader;

    impl TextReader for EchoReader {
        fn read_text(&self, image: &RgbaImage) -> RecognizedText {
            RecognizedText::new(format!("{}x{}", image.width(), image.height()))
        }
    }

    #[test]
    fn test_extract_text_crops_exact_region() {
        let shot = Screenshot::new(RgbaImage::new(400, 400), 7);
        let (text, crop) = extract_text(&EchoReader, &shot, &ScreenRegion::new(10, 20, 120, 30));
        assert_eq!(text.as_str(), "120x30");
        assert_eq!(crop.dimensions(), (120, 30));
    }

    #[test]
    fn test_extract_text_outside_frame_fails() {
        let shot = Screenshot::new(RgbaImage::new(100, 100), 7);
        let (text, _) = extract_text(&EchoReader, &shot, &ScreenRegion::new(300, 300, 10, 10));
        assert!(text.is_failure());
    }

    #[test]
    fn test_stretch_contrast_spans_range() {
        let img = RgbaImage::from_fn(4, 1, |x, _| {
            let v = 100 + x as u8 * 20;
            image::Rgba([v, v, v, 255])
        });
        let out = stretch_contrast(&img);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(3, 0)[0], 255);
    }
}
