// THEORY:
// The compositor is the only code that writes to the output image. A `Canvas`
// owns the output buffer and accepts one tile per block. Each paste copies the
// tile row by row into the block's rectangle and touches nothing else.
//
// Because the `BlockGrid` guarantees blocks never overlap, pastes commute: the
// final image is the same whatever order blocks arrive in. The canvas keeps a
// running count of painted pixels so `finish` can refuse to hand back an image
// with a hole in it.

use crate::core_modules::grid_manager::Block;
use crate::core_modules::pixel::pixel::CHANNELS;
use crate::core_modules::tile::Tile;
use crate::error::{try_zeroed, MosaicError, MosaicResult};
use image::RgbImage;

/// Copies `tile` into `output` at the block's offset.
pub fn paste(output: &mut RgbImage, block: &Block, tile: &Tile) -> MosaicResult<()> {
    if tile.size() != block.size() {
        return Err(MosaicError::mismatch(block.size(), tile.size()));
    }
    if !block.fits_within(output.width(), output.height()) {
        return Err(MosaicError::mismatch(
            output.dimensions(),
            (block.x.saturating_add(block.width), block.y.saturating_add(block.height)),
        ));
    }

    let stride = output.width() as usize * CHANNELS;
    let row_bytes = block.width as usize * CHANNELS;
    let x_off = block.x as usize * CHANNELS;
    let dst = output
        .chunks_exact_mut(stride)
        .skip(block.y as usize)
        .take(block.height as usize);

    for (dst_row, src_row) in dst.zip(tile.as_raw().chunks_exact(row_bytes)) {
        dst_row[x_off..x_off + row_bytes].copy_from_slice(src_row);
    }
    Ok(())
}

/// The output image under construction.
#[derive(Debug)]
pub struct Canvas {
    image: RgbImage,
    painted: u64,
}

impl Canvas {
    /// Allocates a black canvas, reporting allocation failure as `ResourceExhaustion`.
    pub fn new(width: u32, height: u32) -> MosaicResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or_else(|| MosaicError::ResourceExhaustion(format!("{width}x{height} canvas overflows")))?;
        let buf = try_zeroed(len)?;
        let image = RgbImage::from_raw(width, height, buf).ok_or_else(|| MosaicError::mismatch((width, height), (0, 0)))?;
        Ok(Self { image, painted: 0 })
    }

    pub fn paste(&mut self, block: &Block, tile: &Tile) -> MosaicResult<()> {
        paste(&mut self.image, block, tile)?;
        self.painted += block.area();
        Ok(())
    }

    pub fn painted_area(&self) -> u64 {
        self.painted
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Hands back the image once every pixel has been painted exactly once.
    pub fn finish(self) -> MosaicResult<RgbImage> {
        let (w, h) = self.image.dimensions();
        let total = w as u64 * h as u64;
        if self.painted != total {
            return Err(MosaicError::DimensionMismatch {
                expected: (w, h),
                actual: (self.painted.min(u32::MAX as u64) as u32, 1),
            });
        }
        Ok(self.image)
    }
}
