// THEORY:
// The `pixel` module holds the smallest unit the mosaic engine reasons about:
// an RGB color. The engine never needs alpha (inputs are normalised to three
// channels at the boundary), so a color here is exactly three 8-bit channels.
//
// `AverageColor` is a "dumb" data container. It knows how to build itself from
// channel sums and how to present itself to the `image` crate, but it does not
// know where its pixels came from. Averaging over a region is the job of the
// `chunk` module; shifting a tile toward a color is the job of `tile`.
//
// Rounding rule: a mean is rounded to the nearest integer, ties going up. In
// integer arithmetic that is `(sum + count / 2) / count`, which is exact for
// every sum a `u64` can hold and avoids any floating point drift between runs.

pub mod pixel {
    use image::Rgb;

    pub type Channel = u8;
    pub type ChannelSum = u64;

    /// Number of channels in every image the engine touches.
    pub const CHANNELS: usize = 3;

    /// Per-channel mean color of a region, rounded half-up to 8 bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AverageColor {
        /// The red channel mean (0-255).
        pub red: Channel,
        /// The green channel mean (0-255).
        pub green: Channel,
        /// The blue channel mean (0-255).
        pub blue: Channel,
    }

    impl AverageColor {
        pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// Builds the rounded mean from raw channel sums over `count` pixels.
        /// Returns `None` for an empty region.
        pub fn from_sums(sums: [ChannelSum; CHANNELS], count: u64) -> Option<Self> {
            if count == 0 {
                return None;
            }
            let mean = |sum: ChannelSum| ((sum + count / 2) / count).min(255) as Channel;
            Some(Self {
                red: mean(sums[0]),
                green: mean(sums[1]),
                blue: mean(sums[2]),
            })
        }

        pub fn channels(&self) -> [Channel; CHANNELS] {
            [self.red, self.green, self.blue]
        }

        /// Signed per-channel difference `self - other`.
        pub fn delta(&self, other: &AverageColor) -> [i16; CHANNELS] {
            let a = self.channels();
            let b = other.channels();
            [
                a[0] as i16 - b[0] as i16,
                a[1] as i16 - b[1] as i16,
                a[2] as i16 - b[2] as i16,
            ]
        }
    }

    impl From<[Channel; CHANNELS]> for AverageColor {
        fn from(c: [Channel; CHANNELS]) -> Self {
            Self::new(c[0], c[1], c[2])
        }
    }

    impl From<Rgb<Channel>> for AverageColor {
        fn from(px: Rgb<Channel>) -> Self {
            Self::from(px.0)
        }
    }

    impl From<AverageColor> for Rgb<Channel> {
        fn from(c: AverageColor) -> Self {
            Rgb(c.channels())
        }
    }
}
