use crate::error::Error;
use crate::pal::Color;

/// Pixel access the library needs from an image it doesn't own.
///
/// Loading, saving and displaying images is outside scope of this library.
/// Implement this for your image type, or copy pixels into an [`Image`].
///
/// Coordinates are always within `0..width()` and `0..height()`.
pub trait Raster {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn get_pixel(&self, x: u32, y: u32) -> Color;
    fn set_pixel(&mut self, x: u32, y: u32, color: Color);
}

/// Row-major RGB bitmap owned by the library
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Image {
    /// Black image of the given size
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        let len = Self::pixel_count(width, height)?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len)?;
        pixels.resize(len, Color::default());
        Ok(Self { width, height, pixels })
    }

    /// Takes `width * height` pixels in row-major order
    pub fn from_pixels<VecRGB>(pixels: VecRGB, width: u32, height: u32) -> Result<Self, Error> where VecRGB: Into<Vec<Color>> {
        let pixels = pixels.into();
        if pixels.len() != Self::pixel_count(width, height)? {
            return Err(Error::InvalidArgument);
        }
        Ok(Self { width, height, pixels })
    }

    /// Copies pixels out of any other raster
    pub fn from_raster<R: Raster + ?Sized>(raster: &R) -> Result<Self, Error> {
        let mut img = Self::new(raster.width(), raster.height())?;
        let width = img.width as usize;
        for (n, px) in img.pixels.iter_mut().enumerate() {
            *px = raster.get_pixel((n % width) as u32, (n / width) as u32);
        }
        Ok(img)
    }

    fn pixel_count(width: u32, height: u32) -> Result<usize, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument);
        }
        (width as usize).checked_mul(height as usize)
            .filter(|&len| len <= isize::MAX as usize / std::mem::size_of::<Color>())
            .ok_or(Error::OutOfMemory)
    }

    #[inline(always)]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All pixels, row by row
    #[inline(always)]
    #[must_use]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline(always)]
    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    #[inline]
    #[must_use]
    pub fn into_pixels(self) -> Vec<Color> {
        self.pixels
    }

    #[inline(always)]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }
}

impl Raster for Image {
    #[inline(always)]
    fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    fn get_pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    #[inline(always)]
    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        let i = self.index(x, y);
        self.pixels[i] = color;
    }
}

/// Number of pixels, or `InvalidArgument` if the image is empty
pub(crate) fn raster_len<R: Raster + ?Sized>(image: &R) -> Result<usize, Error> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument);
    }
    width.checked_mul(height).ok_or(Error::OutOfMemory)
}

/// Pixel at flat row-major index `n = y * width + x`
#[inline(always)]
pub(crate) fn pixel_at<R: Raster + ?Sized>(image: &R, n: usize) -> Color {
    let width = image.width() as usize;
    image.get_pixel((n % width) as u32, (n / width) as u32)
}

/// Every `stride`-th pixel, walking rows top to bottom, each row left to right.
///
/// `stride` of 1 takes every pixel. The first pixel is always included.
pub fn subsample<R: Raster + ?Sized>(image: &R, stride: usize) -> Result<Vec<Color>, Error> {
    if stride == 0 {
        return Err(Error::InvalidArgument);
    }
    let len = raster_len(image)?;
    let mut samples = Vec::new();
    samples.try_reserve_exact((len + stride - 1) / stride)?;
    samples.extend((0..len).step_by(stride).map(|n| pixel_at(image, n)));
    Ok(samples)
}

#[test]
fn image_size_checks() {
    assert_eq!(Err(Error::InvalidArgument), Image::new(0, 5).map(|_| ()));
    assert_eq!(Err(Error::InvalidArgument), Image::new(5, 0).map(|_| ()));
    assert!(Image::from_pixels(vec![Color::default(); 5], 2, 2).is_err());

    let img = Image::new(3, 2).unwrap();
    assert_eq!(6, img.pixels().len());
    assert!(img.pixels().iter().all(|&px| px == Color::new(0, 0, 0)));
}

#[test]
fn row_major_addressing() {
    let pixels: Vec<_> = (0..6u8).map(|n| Color::new(n, 0, 0)).collect();
    let mut img = Image::from_pixels(pixels, 3, 2).unwrap();
    assert_eq!(Color::new(4, 0, 0), img.get_pixel(1, 1));
    assert_eq!(Color::new(2, 0, 0), pixel_at(&img, 2));
    img.set_pixel(2, 1, Color::new(9, 9, 9));
    assert_eq!(Color::new(9, 9, 9), img.pixels()[5]);

    let copy = Image::from_raster(&img).unwrap();
    assert_eq!(img, copy);
}

#[test]
fn subsample_stride() {
    let pixels: Vec<_> = (0..10u8).map(|n| Color::new(n, n, n)).collect();
    let img = Image::from_pixels(pixels, 5, 2).unwrap();

    assert_eq!(10, subsample(&img, 1).unwrap().len());
    let s = subsample(&img, 3).unwrap();
    assert_eq!(vec![0, 3, 6, 9], s.iter().map(|c| c.r).collect::<Vec<_>>());
    assert_eq!(1, subsample(&img, 300).unwrap().len());
    assert!(subsample(&img, 0).is_err());
}
