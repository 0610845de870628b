// THEORY:
// A tile is the whole source image, shrunk to fit one block and tinted so that
// its average color matches the block it replaces. Building one is two steps:
//
// 1.  **Resample**: The source is resized to exactly the block's size with
//     `fast_image_resize`. Quality levels route the resize through a larger
//     intermediate resolution first (see `quality`), trading time for detail.
// 2.  **Recolor**: The resampled miniature's own mean is compared to the target
//     color, and every pixel is moved by that difference. Each channel is clamped
//     to [0, 255], never wrapped. On saturated images the clamp means the tile's
//     realised mean can miss the target by a little; that is accepted.
//
// Optimization: within one image nearly every block has the same size, and the
// edge blocks add at most three more. The resampled miniature depends only on
// that size, so `TileRecolorer` keeps one miniature per size and only the cheap
// recolor runs per block. The recolor itself is three 256-entry lookup tables,
// one per channel, so the per-pixel work is a table lookup.

use crate::core_modules::chunk::chunk::average_image;
use crate::core_modules::image_helper::SourceImage;
use crate::core_modules::pixel::pixel::{AverageColor, CHANNELS};
use crate::core_modules::quality::{QualityLevel, RecolorMode};
use crate::error::{MosaicError, MosaicResult};
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{PixelType, ResizeOptions, Resizer};
use image::RgbImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type ChannelLut = [u8; 256];

/// A recolored miniature sized for exactly one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pixels: RgbImage,
}

impl Tile {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbImage {
        self.pixels
    }
}

/// A resampled, not yet recolored copy of the source at one target size.
#[derive(Debug)]
pub struct Miniature {
    pixels: RgbImage,
    mean: AverageColor,
}

impl Miniature {
    pub fn build(source: &RgbImage, target: (u32, u32), quality: QualityLevel) -> MosaicResult<Self> {
        let pixels = resample(source, target, quality)?;
        let mean = average_image(&pixels)?;
        Ok(Self { pixels, mean })
    }

    pub fn mean(&self) -> AverageColor {
        self.mean
    }

    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Produces a tile whose mean is pulled toward `target`.
    pub fn recolor(&self, target: AverageColor, mode: RecolorMode) -> MosaicResult<Tile> {
        let luts = recolor_luts(self.mean, target, mode);
        let src = self.pixels.as_raw();

        let mut out = Vec::new();
        out.try_reserve_exact(src.len())?;
        for px in src.chunks_exact(CHANNELS) {
            out.push(luts[0][px[0] as usize]);
            out.push(luts[1][px[1] as usize]);
            out.push(luts[2][px[2] as usize]);
        }

        let (w, h) = self.size();
        let pixels = RgbImage::from_raw(w, h, out).ok_or_else(|| MosaicError::mismatch((w, h), (0, 0)))?;
        Ok(Tile { pixels })
    }
}

/// Builds a single tile from scratch, using additive recoloring.
pub fn make_tile(
    source: &SourceImage,
    target_size: (u32, u32),
    target_color: AverageColor,
    quality: QualityLevel,
) -> MosaicResult<Tile> {
    Miniature::build(source.as_rgb(), target_size, quality)?.recolor(target_color, RecolorMode::Shift)
}

/// Resizes `source` to exactly `target`, through a quality-dependent intermediate size.
pub fn resample(source: &RgbImage, target: (u32, u32), quality: QualityLevel) -> MosaicResult<RgbImage> {
    if target.0 == 0 || target.1 == 0 {
        return Err(MosaicError::invalid(format!(
            "tile size must be non-zero, got {}x{}",
            target.0, target.1
        )));
    }
    if source.dimensions() == target {
        return Ok(source.clone());
    }

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(quality.resize_alg());

    let resized = match quality.intermediate_size(source.dimensions(), target) {
        Some(mid) => {
            let mid_buf = resize_rgb(&mut resizer, &options, source.as_raw(), source.dimensions(), mid)?;
            resize_rgb(&mut resizer, &options, &mid_buf, mid, target)?
        }
        None => resize_rgb(&mut resizer, &options, source.as_raw(), source.dimensions(), target)?,
    };

    RgbImage::from_raw(target.0, target.1, resized).ok_or_else(|| MosaicError::mismatch(target, (0, 0)))
}

fn resize_rgb(
    resizer: &mut Resizer,
    options: &ResizeOptions,
    src: &[u8],
    src_size: (u32, u32),
    dst_size: (u32, u32),
) -> MosaicResult<Vec<u8>> {
    let src_view = ImageRef::new(src_size.0, src_size.1, src, PixelType::U8x3)?;
    let mut dst = Image::new(dst_size.0, dst_size.1, PixelType::U8x3);
    resizer.resize(&src_view, &mut dst, options)?;
    Ok(dst.into_vec())
}

fn recolor_luts(current: AverageColor, target: AverageColor, mode: RecolorMode) -> [ChannelLut; CHANNELS] {
    let mut luts = [[0u8; 256]; CHANNELS];
    match mode {
        RecolorMode::Shift => {
            let delta = target.delta(&current);
            for (lut, d) in luts.iter_mut().zip(delta) {
                for (v, slot) in lut.iter_mut().enumerate() {
                    *slot = (v as i16 + d).clamp(0, 255) as u8;
                }
            }
        }
        RecolorMode::Scale => {
            let cur = current.channels();
            let tgt = target.channels();
            for c in 0..CHANNELS {
                let factor = tgt[c] as f32 / cur[c].max(1) as f32;
                for (v, slot) in luts[c].iter_mut().enumerate() {
                    *slot = (v as f32 * factor).clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
    luts
}

/// Produces tiles for one source image, memoising one miniature per block size.
#[derive(Debug)]
pub struct TileRecolorer {
    source: SourceImage,
    quality: QualityLevel,
    mode: RecolorMode,
    miniatures: Mutex<HashMap<(u32, u32), Arc<Miniature>>>,
}

impl TileRecolorer {
    pub fn new(source: SourceImage, quality: QualityLevel, mode: RecolorMode) -> Self {
        Self {
            source,
            quality,
            mode,
            miniatures: Mutex::new(HashMap::new()),
        }
    }

    /// The resampled miniature for `size`, built on first request.
    pub fn miniature(&self, size: (u32, u32)) -> MosaicResult<Arc<Miniature>> {
        // Held across the resample so concurrent workers never build the same size twice.
        let mut miniatures = self.miniatures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(m) = miniatures.get(&size) {
            return Ok(Arc::clone(m));
        }
        let built = Arc::new(Miniature::build(self.source.as_rgb(), size, self.quality)?);
        miniatures.insert(size, Arc::clone(&built));
        Ok(built)
    }

    pub fn make_tile(&self, target_size: (u32, u32), target_color: AverageColor) -> MosaicResult<Tile> {
        self.miniature(target_size)?.recolor(target_color, self.mode)
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    pub fn mode(&self) -> RecolorMode {
        self.mode
    }

    pub fn cached_sizes(&self) -> usize {
        self.miniatures.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
