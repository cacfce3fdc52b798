//! The `.fsd` format: a palette followed by run-length encoded palette codes.
//!
//! | bytes | |
//! |---|---|
//! | 4 | width, little-endian |
//! | 4 | height, little-endian |
//! | 1 | number of palette entries |
//! | 3 × entries | R, G, B of each entry |
//! | 2 × runs | run length (1-254), color code |
//!
//! Pixels are stored in rows top to bottom, each row left to right.
//! There is no magic number or version field.

use crate::error::Error;
use crate::image::{pixel_at, raster_len, Image, Raster};
use crate::pal::{Color, Palette, MAX_COLORS};

/// Longest run stored in one entry. 255 is reserved and never written.
pub const MAX_RUN: u8 = 254;

/// width + height + palette length
pub const HEADER_LEN: usize = 4 + 4 + 1;

/// Result of [`decode_lossy`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub image: Image,
    pub palette: Palette,
    /// Pixels filled from the run stream. Pixels after these are black.
    pub pixels_written: usize,
}

impl Decoded {
    /// All pixels were present in the stream
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pixels_written == self.image.pixels().len()
    }
}

/// Serializes the image as codes of `palette`.
///
/// Every pixel must be exactly equal to some palette entry (e.g. after [`remap_to_palette`][crate::remap_to_palette]),
/// otherwise this fails with [`Error::MissingPaletteEntry`]. If the palette has duplicates,
/// the first copy's code is used.
pub fn encode<R: Raster + ?Sized>(image: &R, palette: &Palette) -> Result<Vec<u8>, Error> {
    if palette.is_empty() {
        return Err(Error::InvalidArgument);
    }
    let len = raster_len(image)?;
    debug_assert!(palette.len() <= MAX_COLORS);

    let mut out = Vec::new();
    out.try_reserve(HEADER_LEN + palette.len() * 3 + 64)?;
    out.extend_from_slice(&image.width().to_le_bytes());
    out.extend_from_slice(&image.height().to_le_bytes());
    out.push(palette.len() as u8);
    for c in palette.iter() {
        out.extend_from_slice(&[c.r, c.g, c.b]);
    }

    let mut run_color = pixel_at(image, 0);
    let mut run_length = 1u8;
    for n in 1..len {
        let px = pixel_at(image, n);
        if px == run_color && run_length < MAX_RUN {
            run_length += 1;
        } else {
            push_run(&mut out, palette, run_color, run_length)?;
            run_color = px;
            run_length = 1;
        }
    }
    push_run(&mut out, palette, run_color, run_length)?;
    Ok(out)
}

#[inline]
fn push_run(out: &mut Vec<u8>, palette: &Palette, color: Color, length: u8) -> Result<(), Error> {
    debug_assert!((1..=MAX_RUN).contains(&length));
    let code = palette.code_of(color).ok_or(Error::MissingPaletteEntry)?;
    out.try_reserve(2)?;
    out.extend_from_slice(&[length, code]);
    Ok(())
}

/// Reads an image encoded with [`encode`].
///
/// Fails with [`Error::Incomplete`] if the stream ends before all pixels are decoded;
/// use [`decode_lossy`] to get whatever was decoded. A stream too short to cover
/// the image is rejected before the pixel buffer is allocated.
pub fn decode(data: &[u8]) -> Result<(Image, Palette), Error> {
    let (width, height, palette, runs) = read_header(data)?;
    let total = (width as usize).checked_mul(height as usize).ok_or(Error::OutOfMemory)?;
    if (runs.len() / 2).saturating_mul(usize::from(u8::MAX)) < total {
        return Err(Error::Incomplete);
    }
    let mut image = Image::new(width, height)?;
    if fill_runs(image.pixels_mut(), runs, &palette)? < total {
        return Err(Error::Incomplete);
    }
    Ok((image, palette))
}

/// Like [`decode`], but a stream that ends too early is not an error.
///
/// Check [`Decoded::is_complete`]. Malformed headers and invalid runs are still errors.
///
/// The whole `width * height` image is allocated up front, however short the stream is,
/// so a 12-byte stream can ask for gigabytes. Use [`decode`] for untrusted data.
pub fn decode_lossy(data: &[u8]) -> Result<Decoded, Error> {
    let (width, height, palette, runs) = read_header(data)?;
    let mut image = Image::new(width, height)?;
    let pixels_written = fill_runs(image.pixels_mut(), runs, &palette)?;
    Ok(Decoded {
        image,
        palette,
        pixels_written,
    })
}

/// Width, height, palette, and the run bytes that follow them
fn read_header(data: &[u8]) -> Result<(u32, u32, Palette, &[u8]), Error> {
    let mut reader = Reader(data);
    let width = reader.u32_le()?;
    let height = reader.u32_le()?;
    if width == 0 || height == 0 {
        return Err(Error::FormatError);
    }
    let palette_len = reader.u8()?;
    let mut palette = Palette::new();
    for c in reader.take(usize::from(palette_len) * 3)?.chunks_exact(3) {
        palette.push(Color::new(c[0], c[1], c[2]))?;
    }
    Ok((width, height, palette, reader.0))
}

/// Returns number of pixels filled
fn fill_runs(pixels: &mut [Color], runs: &[u8], palette: &Palette) -> Result<usize, Error> {
    let total = pixels.len();
    let mut written = 0;
    // a trailing odd byte is half of a run, so it's treated as the end of the stream
    for run in runs.chunks_exact(2) {
        if written == total {
            break;
        }
        let (length, code) = (usize::from(run[0]), run[1]);
        if length == 0 {
            return Err(Error::FormatError);
        }
        let color = *palette.get(usize::from(code)).ok_or(Error::FormatError)?;
        let end = (written + length).min(total);
        pixels[written..end].fill(color);
        written = end;
    }
    Ok(written)
}

struct Reader<'data>(&'data [u8]);

impl<'data> Reader<'data> {
    #[inline]
    fn take(&mut self, len: usize) -> Result<&'data [u8], Error> {
        if self.0.len() < len {
            return Err(Error::FormatError);
        }
        let (head, rest) = self.0.split_at(len);
        self.0 = rest;
        Ok(head)
    }

    #[inline]
    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    fn u32_le(&mut self) -> Result<u32, Error> {
        let mut b = [0; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }
}

#[cfg(test)]
fn bw() -> Palette {
    Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap()
}

#[cfg(test)]
fn runs(encoded: &[u8], palette_len: usize) -> Vec<(u8, u8)> {
    encoded[HEADER_LEN + palette_len * 3..].chunks_exact(2).map(|r| (r[0], r[1])).collect()
}

#[test]
fn minimal_round_trip() {
    let pal = bw();
    let img = Image::new(2, 2).unwrap();
    let enc = encode(&img, &pal).unwrap();
    assert_eq!(vec![
        2, 0, 0, 0,
        2, 0, 0, 0,
        2,
        0, 0, 0,
        255, 255, 255,
        4, 0,
    ], enc);
    let (dec, dec_pal) = decode(&enc).unwrap();
    assert_eq!(img, dec);
    assert_eq!(pal, dec_pal);
}

#[test]
fn runs_are_capped() {
    let pal = bw();
    let img = Image::new(300, 1).unwrap();
    let enc = encode(&img, &pal).unwrap();
    assert_eq!(vec![(254, 0), (46, 0)], runs(&enc, 2));
    assert_eq!(img, decode(&enc).unwrap().0);

    let img = Image::new(254, 2).unwrap();
    assert_eq!(vec![(254, 0), (254, 0)], runs(&encode(&img, &pal).unwrap(), 2));
}

#[test]
fn runs_cross_rows() {
    let pal = bw();
    let w = Color::new(255, 255, 255);
    let b = Color::new(0, 0, 0);
    let img = Image::from_pixels(vec![b, w, w, w, w, b], 3, 2).unwrap();
    let enc = encode(&img, &pal).unwrap();
    assert_eq!(vec![(1, 0), (4, 1), (1, 0)], runs(&enc, 2));
    assert_eq!(img, decode(&enc).unwrap().0);
}

#[test]
fn duplicate_entries_use_first_code() {
    let c = Color::new(9, 8, 7);
    let pal = Palette::from_colors(&[Color::new(1, 1, 1), c, c]).unwrap();
    let img = Image::from_pixels(vec![c; 3], 3, 1).unwrap();
    assert_eq!(vec![(3, 1)], runs(&encode(&img, &pal).unwrap(), 3));
}

#[test]
fn missing_color_fails() {
    let pal = bw();
    let img = Image::from_pixels(vec![Color::new(0, 0, 0), Color::new(1, 2, 3)], 2, 1).unwrap();
    assert_eq!(Err(Error::MissingPaletteEntry), encode(&img, &pal));
    assert_eq!(Err(Error::InvalidArgument), encode(&img, &Palette::new()));
}

#[test]
fn bad_headers() {
    assert_eq!(Err(Error::FormatError), decode(&[]));
    assert_eq!(Err(Error::FormatError), decode(&[1, 0, 0, 0, 1, 0, 0]));
    // no palette length
    assert_eq!(Err(Error::FormatError), decode(&[1, 0, 0, 0, 1, 0, 0, 0]));
    // palette says 2 entries, has 1
    assert_eq!(Err(Error::FormatError), decode(&[1, 0, 0, 0, 1, 0, 0, 0, 2, 1, 2, 3]));
    // zero width
    assert_eq!(Err(Error::FormatError), decode(&[0, 0, 0, 0, 1, 0, 0, 0, 1, 1, 2, 3, 1, 0]));
}

#[test]
fn bad_runs() {
    let header = [2u8, 0, 0, 0, 1, 0, 0, 0, 1, 10, 20, 30];
    let mut code_out_of_range = header.to_vec();
    code_out_of_range.extend_from_slice(&[2, 1]);
    assert_eq!(Err(Error::FormatError), decode(&code_out_of_range));

    let mut zero_run = header.to_vec();
    zero_run.extend_from_slice(&[0, 0, 2, 0]);
    assert_eq!(Err(Error::FormatError), decode(&zero_run));

    // overlong runs are cut at the last pixel, and anything after that is ignored
    let mut overlong = header.to_vec();
    overlong.extend_from_slice(&[255, 0, 9, 9, 9]);
    let (img, _) = decode(&overlong).unwrap();
    assert_eq!(&[Color::new(10, 20, 30); 2], img.pixels());
}

#[test]
fn truncated_stream() {
    let pal = bw();
    let w = Color::new(255, 255, 255);
    let img = Image::from_pixels(vec![w, w, w, Color::new(0, 0, 0), w], 5, 1).unwrap();
    let enc = encode(&img, &pal).unwrap();
    assert_eq!(vec![(3, 1), (1, 0), (1, 1)], runs(&enc, 2));

    let cut = &enc[..enc.len() - 3];
    assert_eq!(Err(Error::Incomplete), decode(cut));
    let partial = decode_lossy(cut).unwrap();
    assert!(!partial.is_complete());
    assert_eq!(3, partial.pixels_written);
    assert_eq!(&[w, w, w, Color::new(0, 0, 0), Color::new(0, 0, 0)], partial.image.pixels());
    assert_eq!(pal, partial.palette);

    // header only
    let partial = decode_lossy(&enc[..HEADER_LEN + 6]).unwrap();
    assert_eq!(0, partial.pixels_written);
}

#[test]
fn short_stream_is_rejected_before_allocating() {
    // 20000x20000 would need 1.2GB, and there isn't a single run to fill it
    let huge = [0x20, 0x4e, 0, 0, 0x20, 0x4e, 0, 0, 1, 9, 9, 9];
    assert_eq!(Err(Error::Incomplete), decode(&huge).map(|_| ()));

    // 2 runs can cover at most 510 pixels
    let mut wide = vec![0xff, 1, 0, 0, 1, 0, 0, 0, 1, 9, 9, 9];
    wide.extend_from_slice(&[255, 0, 255, 0]);
    assert_eq!(Err(Error::Incomplete), decode(&wide).map(|_| ()));
    wide[0] = 0xfe;
    let (img, _) = decode(&wide).unwrap();
    assert_eq!(510, img.pixels().len());
}

#[test]
fn full_palette() {
    let colors: Vec<_> = (0..255u8).map(|i| Color::new(i, 255 - i, i / 2)).collect();
    let pal = Palette::from_colors(&colors).unwrap();
    let img = Image::from_pixels(colors.clone(), 15, 17).unwrap();
    let enc = encode(&img, &pal).unwrap();
    assert_eq!(255, enc[8]);
    assert_eq!(HEADER_LEN + 255 * 3 + 255 * 2, enc.len());
    let (dec, dec_pal) = decode(&enc).unwrap();
    assert_eq!(img, dec);
    assert_eq!(pal, dec_pal);
}
