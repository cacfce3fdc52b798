use crate::error::Error;
use crate::image::Raster;
use crate::nearest::Nearest;
use crate::pal::{Color, Palette};

/// Which error diffusion kernel [`dither`] uses
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DitherMode {
    /// The historical `.fsd` behavior, kept bit-exact so old output can be reproduced.
    ///
    /// Columns are walked outermost. The last row and the last column are never touched.
    /// Negative error is clamped to 0, and the 7/16-style weights are whole-number divisions
    /// (1/7, 1/1, 1/5, 1/3), so the entire error lands on the pixel diagonally down-right.
    #[default]
    Literal,
    /// Regular Floyd-Steinberg: rows top to bottom, every pixel, signed error, 7/16 1/16 5/16 3/16
    Corrected,
}

/// Error share for one neighbor: `error * num / den`
struct Weight {
    dx: i32,
    dy: i32,
    num: i32,
    den: i32,
}

/// (x+1, y), (x+1, y+1), (x, y+1), (x-1, y+1)
const LITERAL_KERNEL: [Weight; 4] = [
    Weight { dx: 1, dy: 0, num: 1, den: 7 },
    Weight { dx: 1, dy: 1, num: 1, den: 1 },
    Weight { dx: 0, dy: 1, num: 1, den: 5 },
    Weight { dx: -1, dy: 1, num: 1, den: 3 },
];

const FLOYD_STEINBERG_KERNEL: [Weight; 4] = [
    Weight { dx: 1, dy: 0, num: 7, den: 16 },
    Weight { dx: 1, dy: 1, num: 1, den: 16 },
    Weight { dx: 0, dy: 1, num: 5, den: 16 },
    Weight { dx: -1, dy: 1, num: 3, den: 16 },
];

impl Weight {
    #[inline(always)]
    fn share(&self, err: i32, mode: DitherMode) -> i32 {
        match mode {
            // the weight is truncated before it's applied
            DitherMode::Literal => err * (self.num / self.den),
            DitherMode::Corrected => (err * self.num).div_euclid(self.den),
        }
    }
}

/// Replaces every processed pixel with its nearest palette color, spreading the difference
/// onto pixels that haven't been processed yet.
///
/// Pixels are read after earlier pixels have written error into them, so the visiting order
/// described in [`DitherMode`] determines the output. Returns the palette it was given.
#[inline(never)]
pub fn dither<'pal, R: Raster + ?Sized>(image: &mut R, palette: &'pal Palette, mode: DitherMode) -> Result<&'pal Palette, Error> {
    let n = Nearest::new(palette)?;
    let (width, height) = (image.width(), image.height());
    let mut last_match = 0;
    let mut visit = |image: &mut R, x: u32, y: u32, kernel: &[Weight; 4]| {
        let pix = image.get_pixel(x, y);
        let (matched, _) = n.search(pix, last_match);
        last_match = matched;
        let wanted = palette[matched as usize];
        image.set_pixel(x, y, wanted);

        let err = pixel_error(pix, wanted, mode);
        diffuse(image, x, y, err, kernel, mode);
    };

    match mode {
        DitherMode::Literal => {
            for x in 0..width.saturating_sub(1) {
                for y in 0..height.saturating_sub(1) {
                    visit(image, x, y, &LITERAL_KERNEL);
                }
            }
        },
        DitherMode::Corrected => {
            for y in 0..height {
                for x in 0..width {
                    visit(image, x, y, &FLOYD_STEINBERG_KERNEL);
                }
            }
        },
    }
    Ok(palette)
}

#[inline(always)]
fn pixel_error(pix: Color, wanted: Color, mode: DitherMode) -> [i32; 3] {
    let diff = |a: u8, b: u8| {
        let d = i32::from(a) - i32::from(b);
        match mode {
            DitherMode::Literal => d.clamp(0, 255),
            DitherMode::Corrected => d,
        }
    };
    [diff(pix.r, wanted.r), diff(pix.g, wanted.g), diff(pix.b, wanted.b)]
}

fn diffuse<R: Raster + ?Sized>(image: &mut R, x: u32, y: u32, err: [i32; 3], kernel: &[Weight; 4], mode: DitherMode) {
    for w in kernel {
        let share = err.map(|e| w.share(e, mode));
        if share == [0; 3] {
            continue;
        }
        let (nx, ny) = (i64::from(x) + i64::from(w.dx), i64::from(y) + i64::from(w.dy));
        if nx < 0 || ny < 0 || nx >= i64::from(image.width()) || ny >= i64::from(image.height()) {
            continue;
        }
        let (nx, ny) = (nx as u32, ny as u32);
        let px = image.get_pixel(nx, ny);
        let add = |c: u8, s: i32| (i32::from(c) + s).clamp(0, 255) as u8;
        image.set_pixel(nx, ny, Color::new(add(px.r, share[0]), add(px.g, share[1]), add(px.b, share[2])));
    }
}

/// Replaces every pixel with its nearest palette color, without any dithering.
///
/// Use this after [`DitherMode::Literal`] dithering to snap the last row and column to the palette,
/// so that the image can be encoded. Returns number of pixels that changed.
pub fn remap_to_palette<R: Raster + ?Sized>(image: &mut R, palette: &Palette) -> Result<usize, Error> {
    let n = Nearest::new(palette)?;
    let mut changed = 0;
    let mut last_match = 0;
    for y in 0..image.height() {
        for x in 0..image.width() {
            let pix = image.get_pixel(x, y);
            let (matched, diff) = n.search(pix, last_match);
            last_match = matched;
            if diff != 0 {
                image.set_pixel(x, y, palette[matched as usize]);
                changed += 1;
            }
        }
    }
    Ok(changed)
}

#[cfg(test)]
use crate::image::Image;

#[cfg(test)]
fn bw() -> Palette {
    Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap()
}

#[test]
fn thin_images_are_untouched() {
    let pal = bw();
    for (w, h) in [(1, 1), (1, 5), (5, 1)] {
        let pixels: Vec<_> = (0..w * h).map(|i| Color::new(100 + i as u8, 50, 7)).collect();
        let mut img = Image::from_pixels(pixels.clone(), w, h).unwrap();
        dither(&mut img, &pal, DitherMode::Literal).unwrap();
        assert_eq!(pixels, img.pixels());
    }
}

#[test]
fn literal_last_row_and_column_untouched() {
    let pal = bw();
    let gray = Color::new(90, 90, 90);
    let mut img = Image::from_pixels(vec![gray; 4 * 3], 4, 3).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    for y in 0..3 {
        for x in 0..4 {
            let px = img.get_pixel(x, y);
            if x == 3 || y == 2 {
                assert_ne!(px, Color::new(0, 0, 0), "{x},{y}");
                assert_ne!(px, Color::new(255, 255, 255), "{x},{y}");
            } else {
                assert!(pal.contains(&px), "{x},{y}");
            }
        }
    }
}

#[test]
fn literal_diffusion_only_goes_diagonally() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(200, 200, 200)]).unwrap();
    let base = Color::new(100, 100, 100);
    let mut pixels = vec![base; 3 * 3];
    // nearest to (21, 0, 0) is black, leaving an error of 21 in red
    pixels[1] = Color::new(21, 0, 0);
    let mut img = Image::from_pixels(pixels, 3, 3).unwrap();

    let mut probe = img.clone();
    probe.set_pixel(1, 0, Color::new(21, 0, 0));
    let before = [probe.get_pixel(2, 0), probe.get_pixel(2, 1), probe.get_pixel(1, 1), probe.get_pixel(0, 1)];
    diffuse(&mut probe, 1, 0, pixel_error(Color::new(21, 0, 0), Color::new(0, 0, 0), DitherMode::Literal), &LITERAL_KERNEL, DitherMode::Literal);
    assert_eq!(before[0], probe.get_pixel(2, 0));
    assert_eq!(Color::new(121, 100, 100), probe.get_pixel(2, 1));
    assert_eq!(before[2], probe.get_pixel(1, 1));
    assert_eq!(before[3], probe.get_pixel(0, 1));

    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    assert_eq!(Color::new(0, 0, 0), img.get_pixel(1, 0));
}

#[test]
fn literal_clamps_negative_error() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap();
    let light = Color::new(200, 200, 200);
    let mut img = Image::from_pixels(vec![light; 4], 2, 2).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    // 200 - 255 is clamped to 0, so nothing is diffused
    assert_eq!(Color::new(255, 255, 255), img.get_pixel(0, 0));
    assert_eq!(light, img.get_pixel(1, 1));
    assert_eq!(light, img.get_pixel(1, 0));
    assert_eq!(light, img.get_pixel(0, 1));
}

#[test]
fn literal_error_saturates() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap();
    let mut img = Image::from_pixels(vec![Color::new(120, 10, 0), Color::default(), Color::default(), Color::new(250, 0, 0)], 2, 2).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    assert_eq!(Color::new(0, 0, 0), img.get_pixel(0, 0));
    assert_eq!(Color::new(255, 10, 0), img.get_pixel(1, 1));
}

#[test]
fn literal_writes_are_visible_to_later_reads() {
    // error from (0,0) lands on (1,1), and (1,1) is then matched from the changed value
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(100, 100, 100)]).unwrap();
    let mut pixels = vec![Color::new(40, 40, 40); 9];
    pixels[0] = Color::new(45, 45, 45);
    let mut img = Image::from_pixels(pixels, 3, 3).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    // (1,1) was 40 + 45 = 85, nearer to 100
    assert_eq!(Color::new(100, 100, 100), img.get_pixel(1, 1));
    assert_eq!(Color::new(0, 0, 0), img.get_pixel(0, 1));
    assert_eq!(Color::new(0, 0, 0), img.get_pixel(1, 0));
}

#[test]
fn corrected_is_floyd_steinberg() {
    let pal = bw();
    let mut img = Image::from_pixels(vec![Color::new(128, 128, 128); 4 * 4], 4, 4).unwrap();
    dither(&mut img, &pal, DitherMode::Corrected).unwrap();
    assert!(img.pixels().iter().all(|px| pal.contains(px)));
    let whites = img.pixels().iter().filter(|px| px.r == 255).count();
    assert!((6..=10).contains(&whites), "{whites}");

    // negative error darkens the pixel to the right: 200 -> 255 gives -55, 7/16 of it is floor(-24.06) = -25
    let mut img = Image::from_pixels(vec![Color::new(200, 200, 200), Color::new(100, 100, 100)], 2, 1).unwrap();
    let mut probe = img.clone();
    probe.set_pixel(0, 0, Color::new(255, 255, 255));
    diffuse(&mut probe, 0, 0, pixel_error(Color::new(200, 200, 200), Color::new(255, 255, 255), DitherMode::Corrected), &FLOYD_STEINBERG_KERNEL, DitherMode::Corrected);
    assert_eq!(Color::new(75, 75, 75), probe.get_pixel(1, 0));
    dither(&mut img, &pal, DitherMode::Corrected).unwrap();
    assert_eq!(Color::new(255, 255, 255), img.get_pixel(0, 0));
    assert_eq!(Color::new(0, 0, 0), img.get_pixel(1, 0));
}

#[test]
fn corrected_kernel_weights() {
    let base = Color::new(100, 100, 100);
    let mut img = Image::from_pixels(vec![base; 3 * 2], 3, 2).unwrap();
    diffuse(&mut img, 1, 0, [100, 0, -55], &FLOYD_STEINBERG_KERNEL, DitherMode::Corrected);
    assert_eq!(base, img.get_pixel(0, 0));
    assert_eq!(base, img.get_pixel(1, 0));
    // 7/16: 43.75 and -24.06
    assert_eq!(Color::new(143, 100, 75), img.get_pixel(2, 0));
    // 1/16: 6.25 and -3.44
    assert_eq!(Color::new(106, 100, 96), img.get_pixel(2, 1));
    // 5/16: 31.25 and -17.19
    assert_eq!(Color::new(131, 100, 82), img.get_pixel(1, 1));
    // 3/16: 18.75 and -10.31
    assert_eq!(Color::new(118, 100, 89), img.get_pixel(0, 1));
}

#[test]
fn remap_snaps_everything() {
    let pal = bw();
    let mut img = Image::from_pixels(vec![Color::new(10, 10, 10), Color::new(250, 240, 230), Color::new(0, 0, 0)], 3, 1).unwrap();
    assert_eq!(2, remap_to_palette(&mut img, &pal).unwrap());
    assert_eq!(&[Color::new(0, 0, 0), Color::new(255, 255, 255), Color::new(0, 0, 0)], img.pixels());
    assert!(dither(&mut img, &Palette::new(), DitherMode::Literal).is_err());
}
