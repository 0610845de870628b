// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the stages
// together into one call: an image and a configuration go in, a finished mosaic
// (or a structured error) comes out.
//
// The order of operations is fixed:
// 1.  **Validate** every parameter and derive the `BlockGrid`. Nothing is spawned
//     until this succeeds, so a doomed invocation does no work.
// 2.  **Allocate** the output canvas up front, so running out of memory surfaces
//     before any tile is built.
// 3.  **Distribute** blocks over the `WorkerPool`. Each worker averages its blocks
//     through the shared `ColorAverager` and builds tiles with the shared
//     `TileRecolorer`.
// 4.  **Composite** every worker's tiles onto the canvas and hand it back only if
//     every pixel was painted and nobody cancelled.

use crate::core_modules::chunk::chunk::ColorAverager;
use crate::core_modules::compositor::Canvas;
use crate::core_modules::grid_manager::{Block, BlockGrid};
use crate::core_modules::progress::{CancelToken, NoProgress, ProgressSink};
use crate::core_modules::tile::{Tile, TileRecolorer};
use crate::error::{MosaicError, MosaicResult};
use crate::parallel_pipeline::{resolve_worker_count, WorkerPool};
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

// Re-export key data structures for the public API.
pub use crate::core_modules::image_helper::SourceImage;
pub use crate::core_modules::pixel::pixel::AverageColor;
pub use crate::core_modules::progress::Progress;
pub use crate::core_modules::quality::{QualityLevel, RecolorMode};

pub const DEFAULT_BLOCK_SIZE: u32 = 16;

/// Configuration for one mosaic pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Edge length of a block in pixels.
    pub block_size: u32,
    pub quality: QualityLevel,
    /// Worker hint. `None` uses one worker per CPU; always bounded by `MAX_WORKERS`.
    pub workers: Option<usize>,
    pub recolor: RecolorMode,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            quality: QualityLevel::default(),
            workers: None,
            recolor: RecolorMode::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn new(block_size: u32, quality: QualityLevel) -> Self {
        Self {
            block_size,
            quality,
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_recolor(mut self, recolor: RecolorMode) -> Self {
        self.recolor = recolor;
        self
    }

    pub fn validate(&self) -> MosaicResult<()> {
        if self.block_size == 0 {
            return Err(MosaicError::invalid("block size must be a positive integer"));
        }
        if self.workers == Some(0) {
            return Err(MosaicError::invalid("worker count must be at least 1"));
        }
        Ok(())
    }
}

/// The fractal mosaic filter for one source image.
pub struct ImageProcessor {
    source: SourceImage,
    config: ProcessorConfig,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl ImageProcessor {
    pub fn new(source: SourceImage, config: ProcessorConfig) -> Self {
        Self {
            source,
            config,
            progress: Arc::new(NoProgress),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Arc::new(sink);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// A handle the caller can use to abandon the run from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs one substitution pass and returns the composited image.
    pub async fn process(&self) -> MosaicResult<RgbImage> {
        self.config.validate()?;
        let (width, height) = self.source.dimensions();
        let grid = BlockGrid::partition(width, height, self.config.block_size)?;
        let workers = resolve_worker_count(self.config.workers, grid.len());
        let pool = WorkerPool::new(workers)?;
        let mut canvas = Canvas::new(width, height)?;

        info!(
            width,
            height,
            blocks = grid.len(),
            columns = grid.columns(),
            rows = grid.rows(),
            workers,
            quality = %self.config.quality,
            "starting mosaic pass"
        );
        let started = Instant::now();

        let averager = Arc::new(ColorAverager::new(self.source.clone()));
        let recolorer = Arc::new(TileRecolorer::new(
            self.source.clone(),
            self.config.quality,
            self.config.recolor,
        ));

        let per_block = {
            let averager = Arc::clone(&averager);
            let recolorer = Arc::clone(&recolorer);
            move |block: &Block| -> MosaicResult<(Block, Tile)> {
                let color = averager.average(block)?;
                let tile = recolorer.make_tile(block.size(), color)?;
                Ok((*block, tile))
            }
        };

        let chunks = pool
            .run(grid.shared_blocks(), per_block, Arc::clone(&self.progress), self.cancel.clone())
            .await?;

        for (block, tile) in chunks.iter().flatten() {
            canvas.paste(block, tile)?;
        }

        debug!(
            cached_colors = averager.cache().len(),
            cache_hits = averager.cache().hits(),
            miniatures = recolorer.cached_sizes(),
            "cache statistics"
        );

        if self.cancel.is_cancelled() {
            return Err(MosaicError::Cancelled);
        }
        let output = canvas.finish()?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "mosaic pass complete");
        Ok(output)
    }

    /// Synchronous wrapper for callers without a tokio runtime.
    pub fn process_blocking(&self) -> MosaicResult<RgbImage> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| MosaicError::ResourceExhaustion(format!("failed to start runtime: {e}")))?;
        runtime.block_on(self.process())
    }
}

/// One-shot helper: applies the filter to `source` with `config`.
pub async fn apply(source: SourceImage, config: ProcessorConfig) -> MosaicResult<RgbImage> {
    ImageProcessor::new(source, config).process().await
}
