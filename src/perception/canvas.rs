/// Working canvas: a bounded-resolution copy of the caller's pixels.
use image::imageops::FilterType;

use crate::errors::{GameLensError, GameLensResult};
use crate::perception::color_space;
use crate::perception::types::PixelBuffer;

pub struct WorkingCanvas {
    pub width: usize,
    pub height: usize,
    /// Interleaved RGBA, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl WorkingCanvas {
    /// Downsample so the longer side is at most `max_dim`. Images already
    /// within bounds are copied verbatim.
    pub fn from_buffer(image: &PixelBuffer, max_dim: u32) -> GameLensResult<Self> {
        if max_dim == 0 {
            return Err(GameLensError::InvalidParameter("max_dim must be positive".into()));
        }
        let (w, h) = (image.width(), image.height());
        let longest = w.max(h);
        if longest <= max_dim {
            return Ok(Self {
                width: w as usize,
                height: h as usize,
                rgba: image.as_raw().to_vec(),
            });
        }

        let scale = max_dim as f32 / longest as f32;
        let nw = ((w as f32 * scale).round() as u32).max(1);
        let nh = ((h as f32 * scale).round() as u32).max(1);
        let src = image::RgbaImage::from_raw(w, h, image.as_raw().to_vec())
            .ok_or_else(|| GameLensError::InvalidImage("buffer does not match its dimensions".into()))?;
        let resized = image::imageops::resize(&src, nw, nh, FilterType::Triangle);
        tracing::debug!(src_w = w, src_h = h, dst_w = nw, dst_h = nh, "working canvas downsampled");

        Ok(Self {
            width: nw as usize,
            height: nh as usize,
            rgba: resized.into_raw(),
        })
    }

    #[inline]
    pub fn rgb(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2]]
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn grayscale(&self) -> Vec<f32> {
        color_space::grayscale(&self.rgba)
    }
}
