use anyhow::{Context, Result};
use clap::Parser;
use fractal_mosaic::{
    CancelToken, ImageProcessor, Progress, ProcessorConfig, QualityLevel, RecolorMode, SourceImage, DEFAULT_BLOCK_SIZE,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Apply the recursive "fractal photomosaic" filter to an image:
/// every block is replaced by a recolored miniature of the whole picture.
#[derive(Parser, Debug)]
#[command(name = "mosaic_tester")]
#[command(about = "Turn an image into a fractal photomosaic of itself")]
struct Args {
    /// Input image (any format the `image` crate can decode)
    input: PathBuf,

    /// Output PNG path
    output: PathBuf,

    /// Block size in pixels
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    /// Tile quality: low, normal, high, ultra
    #[arg(short, long, default_value_t = QualityLevel::Normal)]
    quality: QualityLevel,

    /// Worker threads (defaults to one per CPU)
    #[arg(short, long)]
    workers: Option<usize>,

    /// How tiles are recolored: shift (additive) or scale (multiplicative)
    #[arg(short, long, default_value_t = RecolorMode::Shift)]
    recolor: RecolorMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // --- 1. Argument Parsing & Setup ---
    let args = Args::parse();
    let mut config = ProcessorConfig::new(args.block_size, args.quality).with_recolor(args.recolor);
    config.workers = args.workers;
    config.validate()?;

    // --- 2. Decode & Normalise ---
    let decoded = image::open(&args.input).with_context(|| format!("failed to open {}", args.input.display()))?;
    let source = SourceImage::from_dynamic(decoded)?;
    info!(
        width = source.width(),
        height = source.height(),
        "loaded {}",
        args.input.display()
    );

    // --- 3. Mosaic Pass ---
    // Progress is logged at every 10% step; Ctrl-C abandons the pass.
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let processor = ImageProcessor::new(source, config)
        .with_cancel(cancel)
        .with_progress(|p: Progress| {
            let step = (p.total / 10).max(1);
            if p.completed % step == 0 || p.is_done() {
                info!("processing: {p}");
            }
        });
    let mosaic = processor.process().await.context("mosaic pass failed")?;

    // --- 4. Encode ---
    mosaic
        .save_with_format(&args.output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("wrote {}", args.output.display());

    Ok(())
}
