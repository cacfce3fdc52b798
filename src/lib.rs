//! Reduces RGB images to a small palette, dithers them, and stores them compactly.
//!
//! 1. [`median_cut`] builds a palette from a subsample of the pixels,
//!    optionally improved with k-means ([`refine`]).
//! 2. [`dither`] replaces pixels with palette colors in place, diffusing the error.
//! 3. [`encode`] writes the palette and run-length encoded color codes, [`decode`] reads them back.
//!
//! [`Attributes`] bundles these steps with configurable settings.
//!
//! Loading and saving regular image files is outside scope of this library.
//! Pixels are accessed through the [`Raster`] trait, or an owned [`Image`].

mod attr;
mod codec;
mod error;
mod image;
mod kmeans;
mod mediancut;
mod nearest;
mod pal;
mod quant;
mod remap;

#[cfg(not(feature = "threads"))]
mod rayoff;

#[cfg(feature = "threads")]
mod rayoff {
    pub(crate) use rayon::prelude::*;
    pub(crate) use thread_local::ThreadLocal;
}

pub use crate::attr::Attributes;
pub use crate::attr::DEFAULT_SAMPLE_STRIDE;
pub use crate::codec::{decode, decode_lossy, encode, Decoded, HEADER_LEN, MAX_RUN};
pub use crate::error::Error;
pub use crate::image::{subsample, Image, Raster};
pub use crate::kmeans::{refine, KMEANS_ITERATIONS, KMEANS_STRIDE, KMEANS_THRESHOLD};
pub use crate::mediancut::{median_cut, ChannelTie};
pub use crate::nearest::nearest_color;
pub use crate::pal::{color_diff, Color, PalIndex, Palette, MAX_COLORS};
pub use crate::quant::QuantizationResult;
pub use crate::remap::{dither, remap_to_palette, DitherMode};

/// Start here: creates new handle for library configuration
///
/// See [`Attributes`]
#[inline(always)]
#[must_use]
pub fn new() -> Attributes {
    Attributes::new()
}

/// Palette of `colors` entries from every `stride`-th pixel, using default settings.
///
/// Shorthand for [`subsample`] followed by [`median_cut`] with [`ChannelTie::Keep`].
pub fn quantize<R: Raster + ?Sized>(image: &R, colors: u32, stride: usize) -> Result<Palette, Error> {
    median_cut(&subsample(image, stride)?, colors, ChannelTie::Keep)
}

#[test]
fn pipeline_2x2_black() {
    let mut img = Image::new(2, 2).unwrap();
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    let enc = encode(&img, &pal).unwrap();
    assert_eq!(HEADER_LEN + 6 + 2, enc.len());
    assert_eq!(&[4, 0], &enc[HEADER_LEN + 6..]);
    let (dec, _) = decode(&enc).unwrap();
    assert_eq!(img, dec);
}

#[test]
fn quantize_single_color_is_mean() {
    let pixels = vec![Color::new(0, 0, 0), Color::new(0, 0, 0), Color::new(30, 60, 90), Color::new(30, 60, 91)];
    let img = Image::from_pixels(pixels, 2, 2).unwrap();
    let pal = quantize(&img, 1, 1).unwrap();
    assert_eq!(&[Color::new(15, 30, 45)], pal.as_slice());
    assert!(quantize(&img, 0, 1).is_err());
    assert!(quantize(&img, 1, 0).is_err());
}

#[test]
fn dither_image_returns_palette() {
    let pixels: Vec<_> = (0..100u32).map(|i| Color::new((i * 2) as u8, 30, (200 - i) as u8)).collect();
    let mut img = Image::from_pixels(pixels, 10, 10).unwrap();
    let mut attr = new();
    attr.set_max_colors(8).unwrap();
    attr.set_sample_stride(3).unwrap();
    let pal = attr.dither_image(&mut img).unwrap();
    assert_eq!(8, pal.len());
    for y in 0..9 {
        for x in 0..9 {
            assert!(pal.contains(&img.get_pixel(x, y)));
        }
    }
}
