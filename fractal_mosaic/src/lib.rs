// THEORY:
// This file is the main entry point for the `fractal_mosaic` library crate. It
// exposes the `ImageProcessor` and its configuration as the high-level way to
// run the filter, and the individual stages (`core_modules`) for callers who
// want to partition, average, or build tiles on their own.
//
// The engine is a pure function of an image and its parameters. Uploading,
// decoding, displaying, and encoding the result belong to the caller; the
// `mosaic_tester` binary in this workspace is one such caller.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::grid_manager::{Block, BlockGrid};
pub use core_modules::progress::{CancelToken, ChannelProgress, NoProgress, ProgressSink};
pub use core_modules::tile::Tile;
pub use error::{MosaicError, MosaicResult};
pub use pipeline::{
    apply, AverageColor, ImageProcessor, Progress, ProcessorConfig, QualityLevel, RecolorMode, SourceImage,
    DEFAULT_BLOCK_SIZE,
};
