//! End-to-end tests for the mosaic pipeline.

use fractal_mosaic::core_modules::chunk::chunk::average;
use fractal_mosaic::{
    BlockGrid, CancelToken, ChannelProgress, ImageProcessor, MosaicError, Progress, ProcessorConfig,
    QualityLevel, RecolorMode, SourceImage,
};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

fn landscape(width: u32, height: u32) -> SourceImage {
    SourceImage::from_rgb(RgbImage::from_fn(width, height, |x, y| {
        let sky = y < height / 2;
        if sky {
            Rgb([(60 + x % 40) as u8, (120 + y % 60) as u8, 220])
        } else {
            Rgb([(30 + (x * y) % 50) as u8, (140 - y % 40) as u8, (20 + x % 30) as u8])
        }
    }))
    .unwrap()
}

/// Low-contrast gradient: no tile ever needs to be clamped to hit its block color.
fn soft_gradient(width: u32, height: u32) -> SourceImage {
    SourceImage::from_rgb(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(80 + x / 4) as u8, (90 + y / 4) as u8, (100 + (x + y) / 8) as u8])
    }))
    .unwrap()
}

#[tokio::test]
async fn solid_red_image_is_unchanged() {
    let red = RgbImage::from_pixel(100, 100, Rgb([255, 0, 0]));
    let src = SourceImage::from_rgb(red.clone()).unwrap();

    let out = ImageProcessor::new(src, ProcessorConfig::new(10, QualityLevel::Normal))
        .process()
        .await
        .unwrap();

    assert_eq!(out.dimensions(), (100, 100));
    assert_eq!(out, red);
}

#[tokio::test]
async fn non_divisible_image_is_fully_painted() {
    let grid = BlockGrid::partition(17, 23, 10).unwrap();
    assert_eq!((grid.columns(), grid.rows()), (2, 3));
    assert!(grid.blocks().iter().filter(|b| b.col == 1).all(|b| b.width == 7));
    let heights: Vec<u32> = grid.blocks().iter().filter(|b| b.col == 0).map(|b| b.height).collect();
    assert_eq!(heights, vec![10, 10, 3]);

    // A source with no black pixels: any unpainted pixel would stay (0, 0, 0).
    let src = SourceImage::from_rgb(RgbImage::from_fn(17, 23, |x, y| {
        Rgb([100 + x as u8, 100 + y as u8, 150])
    }))
    .unwrap();
    let out = ImageProcessor::new(src, ProcessorConfig::new(10, QualityLevel::High))
        .process()
        .await
        .unwrap();

    assert_eq!(out.dimensions(), (17, 23));
    assert!(out.pixels().all(|px| px.0 != [0, 0, 0]));
}

#[tokio::test]
async fn block_colors_follow_the_source() {
    let src = soft_gradient(120, 80);
    let out = ImageProcessor::new(src.clone(), ProcessorConfig::new(20, QualityLevel::Normal))
        .process()
        .await
        .unwrap();

    let grid = BlockGrid::partition(120, 80, 20).unwrap();
    for block in grid.blocks() {
        let want = average(src.as_rgb(), block).unwrap();
        let got = average(&out, block).unwrap();
        for (g, w) in got.channels().iter().zip(want.channels()) {
            assert!((*g as i16 - w as i16).abs() <= 2, "{block:?}: {got:?} vs {want:?}");
        }
    }
}

#[tokio::test]
async fn worker_count_does_not_change_the_output() {
    let src = landscape(150, 90);
    for quality in QualityLevel::ALL {
        let single = ImageProcessor::new(src.clone(), ProcessorConfig::new(12, quality).with_workers(1))
            .process()
            .await
            .unwrap();
        let eight = ImageProcessor::new(src.clone(), ProcessorConfig::new(12, quality).with_workers(8))
            .process()
            .await
            .unwrap();
        assert_eq!(single.as_raw(), eight.as_raw(), "{quality}");
    }
}

#[tokio::test]
async fn cancelling_half_way_returns_no_image() {
    let src = landscape(100, 100);
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let seen = Arc::new(Mutex::new(0usize));
    let seen_in_sink = Arc::clone(&seen);

    let result = ImageProcessor::new(src, ProcessorConfig::new(10, QualityLevel::Low).with_workers(1))
        .with_cancel(cancel)
        .with_progress(move |p: Progress| {
            *seen_in_sink.lock().unwrap() = p.completed;
            if p.completed * 2 >= p.total {
                trigger.cancel();
            }
        })
        .process()
        .await;

    assert!(matches!(result, Err(MosaicError::Cancelled)));
    assert_eq!(*seen.lock().unwrap(), 50);
}

#[tokio::test]
async fn cancelling_with_many_workers_returns_no_image() {
    let src = landscape(200, 200);
    let cancel = CancelToken::new();
    let trigger = cancel.clone();

    let result = ImageProcessor::new(src, ProcessorConfig::new(5, QualityLevel::Normal).with_workers(8))
        .with_cancel(cancel)
        .with_progress(move |p: Progress| {
            if p.completed * 2 >= p.total {
                trigger.cancel();
            }
        })
        .process()
        .await;

    assert!(matches!(result, Err(MosaicError::Cancelled)));
}

#[tokio::test]
async fn invalid_block_size_fails_before_any_work() {
    let (sink, mut rx) = ChannelProgress::channel();
    let result = ImageProcessor::new(landscape(30, 30), ProcessorConfig::new(0, QualityLevel::Normal))
        .with_progress(sink)
        .process()
        .await;

    assert!(matches!(result, Err(MosaicError::InvalidParameter(_))));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn progress_stream_reaches_the_total() {
    let (sink, mut rx) = ChannelProgress::channel();
    let processor =
        ImageProcessor::new(landscape(64, 48), ProcessorConfig::new(16, QualityLevel::Low)).with_progress(sink);
    processor.process().await.unwrap();
    drop(processor);

    let mut last = None;
    while let Some(p) = rx.recv().await {
        last = Some(p);
    }
    assert_eq!(last, Some(Progress { completed: 12, total: 12 }));
}

#[tokio::test]
async fn block_larger_than_image_gives_one_tile() {
    let src = landscape(40, 30);
    let out = ImageProcessor::new(src.clone(), ProcessorConfig::new(64, QualityLevel::Normal))
        .process()
        .await
        .unwrap();
    // The single tile is the source itself at full size, already on its own mean.
    assert_eq!(&out, src.as_rgb());
}

#[tokio::test]
async fn alpha_input_is_accepted() {
    let rgba = RgbaImage::from_fn(24, 24, |x, y| Rgba([(x * 10) as u8, (y * 10) as u8, 90, (x + y) as u8]));
    let src = SourceImage::from_dynamic(DynamicImage::ImageRgba8(rgba)).unwrap();
    let out = ImageProcessor::new(src, ProcessorConfig::new(8, QualityLevel::Ultra))
        .process()
        .await
        .unwrap();
    assert_eq!(out.dimensions(), (24, 24));
}

#[tokio::test]
async fn scale_mode_keeps_solid_images_solid() {
    let blue = RgbImage::from_pixel(30, 30, Rgb([10, 20, 200]));
    let src = SourceImage::from_rgb(blue.clone()).unwrap();
    let out = ImageProcessor::new(src, ProcessorConfig::new(7, QualityLevel::Low).with_recolor(RecolorMode::Scale))
        .process()
        .await
        .unwrap();
    assert_eq!(out, blue);
}
