use crate::error::Error;
use crate::image::Raster;
use crate::kmeans::{refine_samples, KMEANS_ITERATIONS, KMEANS_STRIDE, KMEANS_THRESHOLD};
use crate::mediancut::ChannelTie;
use crate::pal::{Palette, MAX_COLORS};
use crate::quant::QuantizationResult;
use crate::remap::DitherMode;
use std::sync::Arc;

/// Every n-th pixel is given to median cut
pub const DEFAULT_SAMPLE_STRIDE: usize = 300;

/// Starting point and settings for the quantization process
#[derive(Clone)]
pub struct Attributes {
    pub(crate) max_colors: u32,
    pub(crate) sample_stride: usize,
    pub(crate) kmeans: bool,
    pub(crate) kmeans_iterations: u16,
    pub(crate) kmeans_threshold: u32,
    pub(crate) kmeans_stride: usize,
    pub(crate) channel_tie: ChannelTie,
    pub(crate) dither_mode: DitherMode,

    log_callback: Option<Arc<dyn Fn(&Attributes, &str) + Send + Sync>>,
    log_flush_callback: Option<Arc<dyn Fn(&Attributes) + Send + Sync>>,
}

impl Attributes {
    /// New handle for library configuration
    ///
    /// 16 colors, no k-means refinement, [`DitherMode::Literal`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_colors: 16,
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            kmeans: false,
            kmeans_iterations: KMEANS_ITERATIONS,
            kmeans_threshold: KMEANS_THRESHOLD,
            kmeans_stride: KMEANS_STRIDE,
            channel_tie: ChannelTie::Keep,
            dither_mode: DitherMode::Literal,
            log_callback: None,
            log_flush_callback: None,
        }
    }

    /// Generate palette for the image
    pub fn quantize<R: Raster + ?Sized>(&self, image: &R) -> Result<QuantizationResult, Error> {
        QuantizationResult::new(self, image)
    }

    /// Quantizes the image, dithers it in place, and returns the palette.
    ///
    /// With [`DitherMode::Literal`] the last row and column keep their colors,
    /// see [`remap_to_palette`][crate::remap_to_palette].
    pub fn dither_image<R: Raster + ?Sized>(&self, image: &mut R) -> Result<Palette, Error> {
        let res = self.quantize(&*image)?;
        self.verbose_print(format!("  dithering {}x{} with {} colors, {:?}", image.width(), image.height(), res.palette().len(), res.dither_mode()));
        res.dither(image)?;
        Ok(res.into_palette())
    }

    /// K-means refinement of any palette, using these settings
    pub fn refine<R: Raster + ?Sized>(&self, image: &R, palette: &Palette) -> Result<Palette, Error> {
        let samples = crate::image::subsample(image, self.kmeans_stride)?;
        let (refined, stats) = refine_samples(&samples, palette, self.kmeans_iterations, self.kmeans_threshold)?;
        self.verbose_print(format!(
            "  k-means: {} iterations over {} samples, {} excluded, {} of {} colors unchanged",
            self.kmeans_iterations, stats.samples, stats.excluded, stats.stale_means, refined.len()
        ));
        Ok(refined)
    }

    /// Palette size, 1-255. The default is 16.
    ///
    /// Powers of two split the samples most evenly.
    #[inline]
    pub fn set_max_colors(&mut self, colors: u32) -> Result<(), Error> {
        if !(1..=MAX_COLORS as u32).contains(&colors) {
            return Err(Error::InvalidArgument);
        }
        if !colors.is_power_of_two() {
            self.verbose_print("  warning: color count is not a power of two, buckets will be uneven");
        }
        self.max_colors = colors;
        Ok(())
    }

    /// Return max number of colors set
    #[inline(always)]
    #[must_use]
    pub fn max_colors(&self) -> u32 {
        self.max_colors
    }

    /// Only every n-th pixel is used to build the palette. 1 uses all pixels.
    ///
    /// The default is 300.
    #[inline]
    pub fn set_sample_stride(&mut self, stride: usize) -> Result<(), Error> {
        if stride == 0 {
            return Err(Error::InvalidArgument);
        }
        self.sample_stride = stride;
        Ok(())
    }

    #[inline(always)]
    #[must_use]
    pub fn sample_stride(&self) -> usize {
        self.sample_stride
    }

    /// Refine median cut palette with k-means. Off by default.
    #[inline(always)]
    pub fn set_kmeans(&mut self, enabled: bool) {
        self.kmeans = enabled;
    }

    #[inline(always)]
    #[must_use]
    pub fn kmeans(&self) -> bool {
        self.kmeans
    }

    /// Number of k-means rounds. The default is 100.
    #[inline(always)]
    pub fn set_kmeans_iterations(&mut self, iterations: u16) {
        self.kmeans_iterations = iterations;
    }

    #[inline(always)]
    #[must_use]
    pub fn kmeans_iterations(&self) -> u16 {
        self.kmeans_iterations
    }

    /// Pixels at this squared distance from every palette color, or farther, are ignored by k-means.
    ///
    /// The default is 250.
    #[inline(always)]
    pub fn set_kmeans_threshold(&mut self, squared_distance: u32) {
        self.kmeans_threshold = squared_distance;
    }

    #[inline(always)]
    #[must_use]
    pub fn kmeans_threshold(&self) -> u32 {
        self.kmeans_threshold
    }

    /// Only every n-th pixel is scanned by k-means. The default is 300.
    #[inline]
    pub fn set_kmeans_stride(&mut self, stride: usize) -> Result<(), Error> {
        if stride == 0 {
            return Err(Error::InvalidArgument);
        }
        self.kmeans_stride = stride;
        Ok(())
    }

    #[inline(always)]
    #[must_use]
    pub fn kmeans_stride(&self) -> usize {
        self.kmeans_stride
    }

    /// How median cut handles buckets without a single dominant channel
    #[inline(always)]
    pub fn set_channel_tie(&mut self, policy: ChannelTie) {
        self.channel_tie = policy;
    }

    #[inline(always)]
    #[must_use]
    pub fn channel_tie(&self) -> ChannelTie {
        self.channel_tie
    }

    /// Dithering kernel used by results of [`Attributes::quantize`]
    #[inline(always)]
    pub fn set_dither_mode(&mut self, mode: DitherMode) {
        self.dither_mode = mode;
    }

    #[inline(always)]
    #[must_use]
    pub fn dither_mode(&self) -> DitherMode {
        self.dither_mode
    }

    /// Set callback function to be called every time the library wants to print a message.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_log_callback<F: Fn(&Attributes, &str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_callback = Some(Arc::new(callback));
    }

    /// Callback for flushing output (if you buffer messages, that's the time to flush those buffers)
    #[inline]
    pub fn set_log_flush_callback<F: Fn(&Attributes) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_flush_callback = Some(Arc::new(callback));
    }

    #[inline(always)]
    pub(crate) fn verbose_print(self: &Attributes, msg: impl AsRef<str>) {
        fn _print(a: &Attributes, msg: &str) {
            if let Some(f) = &a.log_callback {
                f(a, msg);
            }
        }
        _print(self, msg.as_ref());
    }

    #[inline]
    pub(crate) fn verbose_printf_flush(self: &Attributes) {
        if let Some(f) = &self.log_flush_callback {
            f(self);
        }
    }
}

impl Drop for Attributes {
    fn drop(&mut self) {
        self.verbose_printf_flush();
    }
}

impl Default for Attributes {
    #[inline(always)]
    fn default() -> Attributes {
        Attributes::new()
    }
}

#[test]
fn getset() {
    let mut a = Attributes::new();
    assert_eq!(16, a.max_colors());
    a.set_max_colors(255).unwrap();
    assert_eq!(255, a.max_colors());
    assert!(a.set_max_colors(0).is_err());
    assert!(a.set_max_colors(256).is_err());
    assert_eq!(255, a.max_colors());

    assert_eq!(300, a.sample_stride());
    assert!(a.set_sample_stride(0).is_err());
    a.set_sample_stride(1).unwrap();
    assert_eq!(1, a.sample_stride());

    assert!(!a.kmeans());
    a.set_kmeans(true);
    assert!(a.kmeans());
    assert_eq!(100, a.kmeans_iterations());
    assert_eq!(250, a.kmeans_threshold());
    assert!(a.set_kmeans_stride(0).is_err());

    assert_eq!(ChannelTie::Keep, a.channel_tie());
    a.set_channel_tie(ChannelTie::Halve);
    assert_eq!(ChannelTie::Halve, a.channel_tie());
    assert_eq!(DitherMode::Literal, a.dither_mode());
}

#[test]
fn log_callback() {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    let messages = Arc::new(AtomicUsize::new(0));
    let flushes = Arc::new(AtomicUsize::new(0));
    let mut a = Attributes::new();
    let m = messages.clone();
    a.set_log_callback(move |_, msg| {
        assert!(msg.starts_with("  "));
        m.fetch_add(1, SeqCst);
    });
    let f = flushes.clone();
    a.set_log_flush_callback(move |_| {
        f.fetch_add(1, SeqCst);
    });
    a.set_max_colors(12).unwrap();
    assert_eq!(1, messages.load(SeqCst));
    a.set_max_colors(8).unwrap();
    assert_eq!(1, messages.load(SeqCst));
    drop(a);
    assert_eq!(1, flushes.load(SeqCst));
}
