use crate::attr::Attributes;
use crate::codec;
use crate::error::Error;
use crate::image::{subsample, Raster};
use crate::mediancut::median_cut_stats;
use crate::pal::Palette;
use crate::remap::{dither, remap_to_palette, DitherMode};

/// Palette made by [`Attributes::quantize()`], ready for dithering
#[derive(Clone, Debug)]
pub struct QuantizationResult {
    pub(crate) palette: Palette,
    pub(crate) dither_mode: DitherMode,
}

impl QuantizationResult {
    pub(crate) fn new<R: Raster + ?Sized>(attr: &Attributes, image: &R) -> Result<Self, Error> {
        let samples = subsample(image, attr.sample_stride)?;
        let (mut palette, unsplit, empty) = median_cut_stats(&samples, attr.max_colors, attr.channel_tie)?;
        attr.verbose_print(format!("  median cut: {} colors from {} samples", palette.len(), samples.len()));
        if unsplit > 0 {
            attr.verbose_print(format!("  warning: {unsplit} buckets had no dominant channel and were not split"));
        }
        if empty > 0 {
            attr.verbose_print(format!("  {empty} empty buckets became black"));
        }

        if attr.kmeans {
            palette = attr.refine(image, &palette)?;
        }

        Ok(Self {
            palette,
            dither_mode: attr.dither_mode,
        })
    }

    /// The final palette
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[inline]
    #[must_use]
    pub fn into_palette(self) -> Palette {
        self.palette
    }

    /// Overrides the mode copied from [`Attributes`]
    #[inline]
    pub fn set_dither_mode(&mut self, mode: DitherMode) {
        self.dither_mode = mode;
    }

    #[inline]
    #[must_use]
    pub fn dither_mode(&self) -> DitherMode {
        self.dither_mode
    }

    /// Error-diffusion dithering of the image in place, see [`dither`][crate::dither]
    pub fn dither<R: Raster + ?Sized>(&self, image: &mut R) -> Result<&Palette, Error> {
        dither(image, &self.palette, self.dither_mode)
    }

    /// Snaps remaining pixels to the palette, and encodes the image.
    ///
    /// This never fails with `MissingPaletteEntry`.
    pub fn encode<R: Raster + ?Sized>(&self, image: &mut R) -> Result<Vec<u8>, Error> {
        remap_to_palette(image, &self.palette)?;
        codec::encode(image, &self.palette)
    }
}

#[cfg(test)]
use crate::image::Image;
#[cfg(test)]
use crate::pal::Color;

#[test]
fn quantize_uses_settings() {
    let pixels: Vec<_> = (0..64u8).map(|i| Color::new(i * 4, i, 0)).collect();
    let img = Image::from_pixels(pixels, 8, 8).unwrap();
    let mut attr = Attributes::new();
    attr.set_sample_stride(1).unwrap();
    attr.set_max_colors(4).unwrap();
    attr.set_dither_mode(DitherMode::Corrected);
    let res = attr.quantize(&img).unwrap();
    assert_eq!(4, res.palette().len());
    assert_eq!(DitherMode::Corrected, res.dither_mode());
    assert!(res.palette().windows(2).all(|w| w[0].r < w[1].r));
}

#[test]
fn kmeans_after_median_cut() {
    let mut pixels = vec![Color::new(10, 10, 200); 32];
    pixels.extend(std::iter::repeat(Color::new(240, 20, 20)).take(32));
    let img = Image::from_pixels(pixels, 8, 8).unwrap();
    let mut attr = Attributes::new();
    attr.set_sample_stride(1).unwrap();
    attr.set_kmeans_stride(1).unwrap();
    attr.set_max_colors(2).unwrap();
    attr.set_kmeans(true);
    let res = attr.quantize(&img).unwrap();
    assert_eq!(&[Color::new(10, 10, 200), Color::new(240, 20, 20)], res.palette().as_slice());
}

#[test]
fn encode_snaps_edges() {
    let pixels: Vec<_> = (0..36u8).map(|i| Color::new(i * 7, 100, 255 - i * 7)).collect();
    let mut img = Image::from_pixels(pixels, 6, 6).unwrap();
    let mut attr = Attributes::new();
    attr.set_sample_stride(1).unwrap();
    attr.set_max_colors(4).unwrap();
    let res = attr.quantize(&img).unwrap();
    res.dither(&mut img).unwrap();
    let enc = res.encode(&mut img).unwrap();
    let (dec, pal) = codec::decode(&enc).unwrap();
    assert_eq!(&pal, res.palette());
    assert_eq!(img, dec);
}
