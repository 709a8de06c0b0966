use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{GameLensError, GameLensResult};

/// Immutable RGBA pixel data, row-major. Alpha is carried but ignored by the
/// engines (every pixel is treated as opaque).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> GameLensResult<Self> {
        if width == 0 || height == 0 {
            return Err(GameLensError::InvalidImage(format!(
                "zero-sized image {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(GameLensError::InvalidImage(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Build a buffer filled by `f(x, y) -> [r, g, b]`.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> GameLensResult<Self>
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = f(x, y);
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }
        Self::new(width, height, data)
    }

    pub fn from_image(img: &image::DynamicImage) -> GameLensResult<Self> {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        Self::new(w, h, rgba.into_raw())
    }

    pub fn open(path: &Path) -> GameLensResult<Self> {
        let img = image::open(path)?;
        Self::from_image(&img)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// True when every pixel carries the same RGB value.
    pub fn is_uniform(&self) -> bool {
        let first = [self.data[0], self.data[1], self.data[2]];
        self.data.chunks_exact(4).all(|p| p[0] == first[0] && p[1] == first[1] && p[2] == first[2])
    }
}

/// Axis-aligned rectangle in working-canvas pixels, half-open on the right
/// and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn aspect(&self) -> f32 {
        if self.h == 0 {
            return 0.0;
        }
        self.w as f32 / self.h as f32
    }

    pub fn intersection_area(&self, other: &Rect) -> u64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return 0;
        }
        (x2 - x1) as u64 * (y2 - y1) as u64
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Chebyshev gap between two rectangles; zero when they touch or overlap.
    pub fn gap(&self, other: &Rect) -> u32 {
        let dx = self.x.max(other.x).saturating_sub(self.right().min(other.right()));
        let dy = self.y.max(other.y).saturating_sub(self.bottom().min(other.bottom()));
        dx.max(dy)
    }
}

/// Which detector produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Channel A: flat-color tile clustering.
    ColorBlock,
    /// Channel B: Sobel/Otsu edge regions.
    Edge,
}

/// A candidate detection in working-canvas coordinates (a "raw box").
///
/// Both channels emit this one type. Channel-specific scoring happens before
/// construction, so `confidence` is already normalised to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub rect: Rect,
    pub pixel_count: u64,
    /// `pixel_count / rect.area()`, in (0, 1].
    pub rect_fill: f32,
    pub confidence: f32,
    pub channel: Channel,
}

impl Candidate {
    pub fn new(rect: Rect, pixel_count: u64, confidence: f32, channel: Channel) -> Self {
        let area = rect.area().max(1);
        let pixel_count = pixel_count.clamp(1, area);
        Self {
            rect,
            pixel_count,
            rect_fill: pixel_count as f32 / area as f32,
            confidence: confidence.clamp(0.0, 1.0),
            channel,
        }
    }

    pub fn area(&self) -> u64 {
        self.rect.area()
    }
}

/// Coarse semantic label assigned from geometry alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementLabel {
    Button,
    Icon,
    Card,
    Region,
    Unknown,
}

impl ElementLabel {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ElementLabel::Button => "btn",
            ElementLabel::Icon => "icon",
            ElementLabel::Card => "card",
            ElementLabel::Region => "region",
            ElementLabel::Unknown => "obj",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Auto,
    Manual,
}

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl ScreenRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn iou(&self, other: &ScreenRect) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.w).min(other.x + other.w);
        let iy2 = (self.y + self.h).min(other.y + other.h);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Public detector output: a candidate rescaled to screen space and labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedBox {
    /// Short per-label id, e.g. `btn_1`, `icon_2`.
    pub id: String,
    pub label: ElementLabel,
    pub bbox: ScreenRect,
    pub confidence: f32,
    /// Share of the box covered by the detected region.
    pub rect_fill: f32,
    /// Region pixels in screen units (canvas count times the scale area).
    pub pixel_count: u64,
    pub source: Provenance,
    pub channel: Channel,
}

/// Per-pixel attention field in [0, 1], row-major at `width`×`height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyResult {
    pub saliency_map: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl SaliencyResult {
    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.saliency_map[y as usize * self.width as usize + x as usize]
    }

    pub fn mean(&self) -> f32 {
        if self.saliency_map.is_empty() {
            return 0.0;
        }
        self.saliency_map.iter().sum::<f32>() / self.saliency_map.len() as f32
    }

    /// Location and value of the strongest pixel (first one on ties).
    pub fn peak(&self) -> (u32, u32, f32) {
        let mut best = (0usize, f32::MIN);
        for (i, &v) in self.saliency_map.iter().enumerate() {
            if v > best.1 {
                best = (i, v);
            }
        }
        let w = self.width.max(1) as usize;
        ((best.0 % w) as u32, (best.0 / w) as u32, best.1.max(0.0))
    }

    /// Largest absolute per-pixel difference against another result of the
    /// same size; `None` when dimensions differ.
    pub fn max_abs_diff(&self, other: &SaliencyResult) -> Option<f32> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        Some(
            self.saliency_map
                .iter()
                .zip(other.saliency_map.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_rejects_bad_lengths() {
        assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_err());
        assert!(PixelBuffer::new(0, 2, vec![]).is_err());
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn uniform_detection() {
        let flat = PixelBuffer::from_fn(4, 3, |_, _| [10, 20, 30]).unwrap();
        assert!(flat.is_uniform());
        let dotted = PixelBuffer::from_fn(4, 3, |x, y| if x == 3 && y == 2 { [0, 0, 0] } else { [10, 20, 30] }).unwrap();
        assert!(!dotted.is_uniform());
    }

    #[test]
    fn rect_geometry() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection_area(&b), 25);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert_eq!(a.union(&b), Rect::new(0, 0, 15, 15));
        assert_eq!(a.gap(&b), 0);
        assert_eq!(a.gap(&Rect::new(14, 2, 3, 3)), 4);
        assert_eq!(a.gap(&Rect::new(2, 13, 3, 3)), 3);
    }

    #[test]
    fn candidate_fill_is_bounded() {
        let c = Candidate::new(Rect::new(0, 0, 4, 4), 40, 1.7, Channel::Edge);
        assert_eq!(c.pixel_count, 16);
        assert_eq!(c.rect_fill, 1.0);
        assert_eq!(c.confidence, 1.0);
    }
}
