// THEORY:
// The `chunk` module answers one question, many thousands of times per image:
// what is the average color of this rectangle? It is the hottest path in the
// engine, so it is written for throughput.
//
// Key architectural principles:
// 1.  **Bulk Row Processing**: The region is walked as contiguous row slices of the
//     packed RGB buffer, each consumed with `chunks_exact(3)`. There is no per-pixel
//     coordinate math or bounds check inside the loop, which lets the compiler
//     vectorise the accumulation.
// 2.  **Overflow-Free Accumulation**: Channel sums are `u64`. A single channel of a
//     region can reach `255 * width * height`, which overflows `u32` on images past
//     roughly 16 megapixels.
// 3.  **Invocation-Scoped Memoisation**: `ColorAverager` owns the source image it
//     averages and a `ColorCache` keyed by block coordinates. Because the cache is
//     bound to exactly one image and dropped with the invocation, a key can never
//     refer to stale pixels from a previous upload.
// 4.  **Shared Access**: Workers share one averager. The cache is the only shared
//     mutable state in a mosaic pass and sits behind a single `Mutex`. Values are
//     computed outside the lock; the first value stored for a key wins, and since
//     averaging is deterministic every racer would have stored the same value.

pub mod chunk {
    use crate::core_modules::grid_manager::Block;
    use crate::core_modules::image_helper::SourceImage;
    use crate::core_modules::pixel::pixel::{AverageColor, ChannelSum, CHANNELS};
    use crate::error::{MosaicError, MosaicResult};
    use image::RgbImage;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Cache key: the pixel rectangle a block covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct RegionKey {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    }

    impl From<&Block> for RegionKey {
        fn from(b: &Block) -> Self {
            Self {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
            }
        }
    }

    /// Computes the mean color of `block` within `image`.
    pub fn average(image: &RgbImage, block: &Block) -> MosaicResult<AverageColor> {
        if block.is_empty() {
            return Err(MosaicError::invalid(format!(
                "cannot average an empty {}x{} region",
                block.width, block.height
            )));
        }
        if !block.fits_within(image.width(), image.height()) {
            return Err(MosaicError::invalid(format!(
                "region {}x{}+{}+{} lies outside the {}x{} image",
                block.width,
                block.height,
                block.x,
                block.y,
                image.width(),
                image.height()
            )));
        }

        let stride = image.width() as usize * CHANNELS;
        let start = block.x as usize * CHANNELS;
        let end = start + block.width as usize * CHANNELS;

        let mut sums: [ChannelSum; CHANNELS] = [0; CHANNELS];
        for row in image
            .as_raw()
            .chunks_exact(stride)
            .skip(block.y as usize)
            .take(block.height as usize)
        {
            let (r, g, b) = sum_row(&row[start..end]);
            sums[0] += r;
            sums[1] += g;
            sums[2] += b;
        }

        AverageColor::from_sums(sums, block.area())
            .ok_or_else(|| MosaicError::invalid("cannot average an empty region"))
    }

    /// Mean color of a whole image.
    pub fn average_image(image: &RgbImage) -> MosaicResult<AverageColor> {
        let whole = Block {
            row: 0,
            col: 0,
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        };
        average(image, &whole)
    }

    #[inline]
    fn sum_row(span: &[u8]) -> (ChannelSum, ChannelSum, ChannelSum) {
        // A row is at most u32::MAX pixels, so each partial sum fits in u64 easily.
        span.chunks_exact(CHANNELS).fold((0, 0, 0), |(r, g, b), px| {
            (r + px[0] as ChannelSum, g + px[1] as ChannelSum, b + px[2] as ChannelSum)
        })
    }

    /// Thread-safe memo of block averages for a single invocation.
    #[derive(Debug, Default)]
    pub struct ColorCache {
        entries: Mutex<HashMap<RegionKey, AverageColor>>,
        hits: AtomicU64,
        misses: AtomicU64,
    }

    impl ColorCache {
        pub fn new() -> Self {
            Self::default()
        }

        fn lookup(&self, key: &RegionKey) -> Option<AverageColor> {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.get(key).copied()
        }

        fn store(&self, key: RegionKey, color: AverageColor) -> AverageColor {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            *entries.entry(key).or_insert(color)
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn hits(&self) -> u64 {
            self.hits.load(Ordering::Relaxed)
        }

        pub fn misses(&self) -> u64 {
            self.misses.load(Ordering::Relaxed)
        }
    }

    /// Averages blocks of one source image, memoising every result.
    #[derive(Debug)]
    pub struct ColorAverager {
        source: SourceImage,
        cache: ColorCache,
    }

    impl ColorAverager {
        pub fn new(source: SourceImage) -> Self {
            Self {
                source,
                cache: ColorCache::new(),
            }
        }

        /// Returns the cached average for `block`, computing it on first use.
        pub fn average(&self, block: &Block) -> MosaicResult<AverageColor> {
            let key = RegionKey::from(block);
            if let Some(color) = self.cache.lookup(&key) {
                self.cache.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(color);
            }

            let color = average(self.source.as_rgb(), block)?;
            self.cache.misses.fetch_add(1, Ordering::Relaxed);
            Ok(self.cache.store(key, color))
        }

        pub fn cache(&self) -> &ColorCache {
            &self.cache
        }

        pub fn source(&self) -> &SourceImage {
            &self.source
        }
    }
}
