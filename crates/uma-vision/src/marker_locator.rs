use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use uma_capture::{ScreenRegion, Screenshot};
use uma_state::TemplateMatch;

/// Default center-distance radius under which two hits count as the same marker
pub const DEFAULT_DEDUP_RADIUS: f64 = 150.0;

/// Thresholds for one `locate_markers` call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocateParams {
    pub region: ScreenRegion,
    /// Minimum NCC score in [0, 1]
    pub confidence_threshold: f64,
    /// Matched boxes must be strictly brighter than this mean gray value
    pub brightness_threshold: f64,
}

/// Pre-processed marker template
struct MarkerTemplate {
    width: u32,
    height: u32,
    /// Zero-mean pixel values, row-major
    centered: Vec<f64>,
    /// sqrt(sum(centered^2))
    norm: f64,
}

impl MarkerTemplate {
    fn from_gray(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let n = (width * height) as f64;
        let mean = if n > 0.0 {
            gray.pixels().map(|p| p[0] as f64).sum::<f64>() / n
        } else {
            0.0
        };
        let centered: Vec<f64> = gray.pixels().map(|p| p[0] as f64 - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f64>().sqrt();
        Self {
            width,
            height,
            centered,
            norm,
        }
    }
}

/// Finds choice markers inside a bounded screen region by template correlation.
pub struct MarkerLocator {
    templates: HashMap<String, MarkerTemplate>,
    dedup_radius: f64,
}

impl Default for MarkerLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerLocator {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
            dedup_radius: DEFAULT_DEDUP_RADIUS,
        }
    }

    pub fn with_dedup_radius(mut self, radius: f64) -> Self {
        self.dedup_radius = radius;
        self
    }

    pub fn insert(&mut self, id: &str, gray: &GrayImage) {
        self.templates
            .insert(id.to_string(), MarkerTemplate::from_gray(gray));
    }

    /// Locate every instance of `template_id` inside `params.region`.
    ///
    /// Hits below the confidence threshold are dropped, overlapping hits keep
    /// the strongest one, dim boxes are dropped, and the survivors are ordered
    /// top to bottom (then left to right).
    pub fn locate_markers(
        &self,
        screenshot: &Screenshot,
        template_id: &str,
        params: &LocateParams,
    ) -> Vec<TemplateMatch> {
        let Some(tmpl) = self.templates.get(template_id) else {
            warn!("Unknown marker template '{}'", template_id);
            return Vec::new();
        };
        let Some(region) = params
            .region
            .clamp_to(screenshot.width(), screenshot.height())
        else {
            debug!("Search region {:?} lies outside the frame", params.region);
            return Vec::new();
        };

        let roi = image::imageops::grayscale(&screenshot.crop(&region));
        let raw = correlate(&roi, tmpl, params.confidence_threshold);
        debug!(
            "Raw marker hits for '{}': {} (threshold {:.2})",
            template_id,
            raw.len(),
            params.confidence_threshold
        );
        if raw.is_empty() {
            return Vec::new();
        }

        let absolute: Vec<TemplateMatch> = raw
            .into_iter()
            .map(|(x, y, confidence)| TemplateMatch {
                x: x + region.x,
                y: y + region.y,
                width: tmpl.width,
                height: tmpl.height,
                confidence,
                brightness: 0.0,
            })
            .collect();

        let unique = deduplicate(absolute, self.dedup_radius);

        let gray = image::imageops::grayscale(screenshot.image.as_ref());
        let mut bright: Vec<TemplateMatch> = unique
            .into_iter()
            .filter_map(|mut m| {
                m.brightness = mean_brightness(&gray, &m);
                debug!(
                    "Marker at ({},{},{},{}) confidence {:.2} brightness {:.1}",
                    m.x, m.y, m.width, m.height, m.confidence, m.brightness
                );
                (m.brightness > params.brightness_threshold).then_some(m)
            })
            .collect();

        bright.sort_by_key(|m| (m.y, m.x));
        debug!(
            "Final bright markers: {} (brightness threshold {:.1})",
            bright.len(),
            params.brightness_threshold
        );
        bright
    }
}

/// Zero-mean normalized cross-correlation of the template at every offset of `roi`.
/// Returns (x, y, score) for every offset scoring at least `threshold`.
fn correlate(roi: &GrayImage, tmpl: &MarkerTemplate, threshold: f64) -> Vec<(u32, u32, f64)> {
    let (rw, rh) = roi.dimensions();
    let (tw, th) = (tmpl.width, tmpl.height);
    if tw == 0 || th == 0 || tw > rw || th > rh || tmpl.norm < 1e-10 {
        return Vec::new();
    }

    let (sum, sum_sq) = integral_images(roi);
    let stride = (rw + 1) as usize;
    let area = |table: &[f64], x: u32, y: u32| -> f64 {
        let (x0, y0, x1, y1) = (x as usize, y as usize, (x + tw) as usize, (y + th) as usize);
        table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
            + table[y0 * stride + x0]
    };

    let n = (tw * th) as f64;
    let raw = roi.as_raw();
    let mut hits = Vec::new();

    for oy in 0..=(rh - th) {
        for ox in 0..=(rw - tw) {
            let s = area(&sum, ox, oy);
            let window_var = area(&sum_sq, ox, oy) - s * s / n;
            if window_var < 1e-6 {
                continue;
            }

            let mut cross = 0.0;
            for ty in 0..th {
                let row = ((oy + ty) * rw + ox) as usize;
                let trow = (ty * tw) as usize;
                for tx in 0..tw as usize {
                    cross += raw[row + tx] as f64 * tmpl.centered[trow + tx];
                }
            }

            let score = cross / (window_var.sqrt() * tmpl.norm);
            if score >= threshold {
                hits.push((ox, oy, score.min(1.0)));
            }
        }
    }

    hits
}

/// Summed-area tables of pixel values and squared pixel values, (w+1)x(h+1).
fn integral_images(img: &GrayImage) -> (Vec<f64>, Vec<f64>) {
    let (w, h) = img.dimensions();
    let stride = (w + 1) as usize;
    let mut sum = vec![0.0; stride * (h + 1) as usize];
    let mut sum_sq = vec![0.0; stride * (h + 1) as usize];

    for y in 0..h as usize {
        let mut row_sum = 0.0;
        let mut row_sq = 0.0;
        for x in 0..w as usize {
            let v = img.as_raw()[y * w as usize + x] as f64;
            row_sum += v;
            row_sq += v * v;
            sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
            sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
        }
    }

    (sum, sum_sq)
}

/// Keep the strongest hit of every cluster whose centers lie within `radius`.
fn deduplicate(mut matches: Vec<TemplateMatch>, radius: f64) -> Vec<TemplateMatch> {
    matches.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });

    let mut kept: Vec<TemplateMatch> = Vec::new();
    for m in matches {
        let (cx, cy) = m.center();
        let duplicate = kept.iter().any(|k| {
            let (kx, ky) = k.center();
            let dx = cx as f64 - kx as f64;
            let dy = cy as f64 - ky as f64;
            (dx * dx + dy * dy).sqrt() < radius
        });
        if !duplicate {
            kept.push(m);
        }
    }
    kept
}

/// Mean gray value of a matched box
fn mean_brightness(gray: &GrayImage, m: &TemplateMatch) -> f64 {
    let x_end = (m.x + m.width).min(gray.width());
    let y_end = (m.y + m.height).min(gray.height());
    let mut sum = 0.0;
    let mut count = 0u32;
    for y in m.y..y_end {
        for x in m.x..x_end {
            sum += gray.get_pixel(x, y)[0] as f64;
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}
