// THEORY:
// The `BlockGrid` is the spatial skeleton of a mosaic pass. It takes nothing but
// the image dimensions and a block size and produces the ordered list of
// `Block`s that every other stage works on. It never touches pixel data.
//
// Key architectural principles:
// 1.  **Exact Tiling**: The blocks cover `[0, width) x [0, height)` with no gaps and
//     no overlaps. Blocks in the last column and last row are clipped to the image
//     instead of being dropped, so images whose sides are not a multiple of the
//     block size are still fully covered.
// 2.  **Row-Major Order**: Blocks are emitted top-to-bottom, left-to-right. The final
//     composite does not depend on this order; progress reporting and worker
//     chunking do.
// 3.  **Immutability**: A grid is derived once per invocation and never changes. The
//     blocks are handed to workers behind an `Arc<[Block]>`.

use crate::error::{MosaicError, MosaicResult};
use std::sync::Arc;

/// A rectangular region of the image grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// Row index of this block in the grid.
    pub row: u32,
    /// Column index of this block in the grid.
    pub col: u32,
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Block {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the block lies fully inside an image of the given size.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// The ordered partition of an image into blocks.
#[derive(Debug, Clone)]
pub struct BlockGrid {
    image_width: u32,
    image_height: u32,
    block_size: u32,
    /// The width of the grid in blocks.
    columns: u32,
    /// The height of the grid in blocks.
    rows: u32,
    blocks: Arc<[Block]>,
}

impl BlockGrid {
    /// Partitions a `image_width x image_height` image into `block_size` squares,
    /// clipping the trailing column and row.
    pub fn partition(image_width: u32, image_height: u32, block_size: u32) -> MosaicResult<Self> {
        if block_size == 0 {
            return Err(MosaicError::invalid("block size must be a positive integer"));
        }
        if image_width == 0 || image_height == 0 {
            return Err(MosaicError::invalid(format!(
                "cannot partition an empty {image_width}x{image_height} image"
            )));
        }

        let columns = image_width.div_ceil(block_size);
        let rows = image_height.div_ceil(block_size);

        let mut blocks = Vec::with_capacity(columns as usize * rows as usize);
        for row in 0..rows {
            let y = row * block_size;
            let height = block_size.min(image_height - y);
            for col in 0..columns {
                let x = col * block_size;
                let width = block_size.min(image_width - x);
                blocks.push(Block {
                    row,
                    col,
                    x,
                    y,
                    width,
                    height,
                });
            }
        }

        Ok(Self {
            image_width,
            image_height,
            block_size,
            columns,
            rows,
            blocks: blocks.into(),
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Shared handle to the block list, for handing to worker tasks.
    pub fn shared_blocks(&self) -> Arc<[Block]> {
        Arc::clone(&self.blocks)
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of all block areas. Equals `width * height` for a valid grid.
    pub fn total_area(&self) -> u64 {
        self.blocks.iter().map(Block::area).sum()
    }

    /// Distinct block sizes in the grid: at most four (interior, right edge,
    /// bottom edge, corner).
    pub fn distinct_sizes(&self) -> Vec<(u32, u32)> {
        let mut sizes: Vec<(u32, u32)> = self.blocks.iter().map(Block::size).collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}
