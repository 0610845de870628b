// THEORY:
// This is the boundary between the outside world and the engine. Whatever the
// caller decoded (PNG with alpha, grayscale JPEG, a raw RGBA framebuffer), it
// becomes a `SourceImage` here, once, as tightly packed RGB8. Nothing past this
// point ever has to ask how many channels a pixel has.
//
// A `SourceImage` is read-only after construction and cheap to clone: the
// pixels live behind an `Arc` so every worker can hold the same buffer.

use crate::core_modules::pixel::pixel::CHANNELS;
use crate::error::{MosaicError, MosaicResult};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;

/// An immutable RGB8 image shared by every stage of one invocation.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Arc<RgbImage>,
}

impl SourceImage {
    /// Normalises any decoded image to RGB8, dropping alpha.
    pub fn from_dynamic(image: DynamicImage) -> MosaicResult<Self> {
        let rgb = match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };
        Self::from_rgb(rgb)
    }

    pub fn from_rgb(image: RgbImage) -> MosaicResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MosaicError::invalid(format!(
                "image must have a non-zero area, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            pixels: Arc::new(image),
        })
    }

    /// Builds an image from a tightly packed RGB or RGBA byte buffer.
    pub fn from_raw(width: u32, height: u32, channels: usize, data: Vec<u8>) -> MosaicResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| MosaicError::invalid("image dimensions overflow"))?;
        if data.len() != expected {
            return Err(MosaicError::invalid(format!(
                "buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                data.len()
            )));
        }

        let rgb = match channels {
            3 => data,
            4 => {
                let mut packed = Vec::new();
                packed.try_reserve_exact(width as usize * height as usize * CHANNELS)?;
                for px in data.chunks_exact(4) {
                    packed.extend_from_slice(&px[..CHANNELS]);
                }
                packed
            }
            n => {
                return Err(MosaicError::invalid(format!(
                    "unsupported channel count {n}, expected 3 or 4"
                )));
            }
        };

        let image = RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| MosaicError::invalid("buffer does not match image dimensions"))?;
        Self::from_rgb(image)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// Packed RGB bytes, row-major, no padding.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}
