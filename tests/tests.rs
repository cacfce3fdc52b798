use fsdither::*;

/// PNG bitmap decoded by lodepng, used as a raster the library doesn't own
struct Png(lodepng::Bitmap<Color>);

impl Raster for Png {
    fn width(&self) -> u32 {
        self.0.width as u32
    }

    fn height(&self) -> u32 {
        self.0.height as u32
    }

    fn get_pixel(&self, x: u32, y: u32) -> Color {
        self.0.buffer[y as usize * self.0.width + x as usize]
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        let w = self.0.width;
        self.0.buffer[y as usize * w + x as usize] = color;
    }
}

fn gradient(width: usize, height: usize) -> Vec<Color> {
    (0..width * height).map(|n| {
        let (x, y) = (n % width, n / width);
        Color::new((x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) * 3 % 256) as u8)
    }).collect()
}

fn png(pixels: &[Color], width: usize, height: usize) -> Png {
    let file = lodepng::encode24(pixels, width, height).unwrap();
    Png(lodepng::decode24(&file).unwrap())
}

#[test]
fn png_round_trip_through_fsd() {
    let mut img = png(&gradient(64, 40), 64, 40);
    let mut attr = new();
    attr.set_max_colors(16).unwrap();
    attr.set_sample_stride(7).unwrap();
    let res = attr.quantize(&img).unwrap();
    assert_eq!(16, res.palette().len());

    res.dither(&mut img).unwrap();
    let fsd = res.encode(&mut img).unwrap();
    assert_eq!(64, u32::from_le_bytes(fsd[0..4].try_into().unwrap()));
    assert_eq!(40, u32::from_le_bytes(fsd[4..8].try_into().unwrap()));
    assert_eq!(16, fsd[8]);

    let (decoded, pal) = decode(&fsd).unwrap();
    assert_eq!(res.palette(), &pal);
    assert_eq!(&img.0.buffer[..], decoded.pixels());

    // decoded image can be saved as PNG again
    let again = lodepng::encode24(decoded.pixels(), 64, 40).unwrap();
    assert_eq!(img.0.buffer, lodepng::decode24(&again).unwrap().buffer);
}

#[test]
fn long_row_splits_runs() {
    let img = png(&vec![Color::new(0, 0, 0); 300], 300, 1);
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap();
    let fsd = encode(&img, &pal).unwrap();
    assert_eq!(&[254, 0, 46, 0], &fsd[HEADER_LEN + 6..]);
}

#[test]
fn minimal_file() {
    let mut img = Image::new(2, 2).unwrap();
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    let fsd = encode(&img, &pal).unwrap();
    assert_eq!(vec![2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 255, 255, 255, 4, 0], fsd);
}

#[test]
fn thin_images_pass_through_literal_dither() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 255, 255)]).unwrap();
    for (w, h) in [(1, 7), (7, 1)] {
        let pixels = gradient(w, h);
        let mut img = png(&pixels, w, h);
        dither(&mut img, &pal, DitherMode::Literal).unwrap();
        assert_eq!(pixels, img.0.buffer);
    }
}

#[test]
fn literal_dither_needs_remap_before_encode() {
    let pixels = gradient(20, 10);
    let mut img = Image::from_pixels(pixels, 20, 10).unwrap();
    let pal = quantize(&img, 4, 1).unwrap();
    dither(&mut img, &pal, DitherMode::Literal).unwrap();
    assert_eq!(Err(Error::MissingPaletteEntry), encode(&img, &pal));

    assert!(remap_to_palette(&mut img, &pal).unwrap() > 0);
    let fsd = encode(&img, &pal).unwrap();
    assert_eq!(img, decode(&fsd).unwrap().0);
}

#[test]
fn corrected_dither_encodes_directly() {
    let mut img = png(&gradient(33, 17), 33, 17);
    let mut attr = new();
    attr.set_max_colors(8).unwrap();
    attr.set_sample_stride(1).unwrap();
    attr.set_dither_mode(DitherMode::Corrected);
    attr.set_kmeans(true);
    attr.set_kmeans_stride(5).unwrap();
    attr.set_kmeans_iterations(10);
    let res = attr.quantize(&img).unwrap();
    res.dither(&mut img).unwrap();
    let fsd = encode(&img, res.palette()).unwrap();
    let (decoded, _) = decode(&fsd).unwrap();
    assert_eq!(&img.0.buffer[..], decoded.pixels());
}

#[test]
fn refined_palette_keeps_shape() {
    let img = Image::from_pixels(gradient(30, 30), 30, 30).unwrap();
    let pal = quantize(&img, 6, 1).unwrap();
    let refined = refine(&img, &pal).unwrap();
    assert_eq!(pal.len(), refined.len());

    let (idx, color) = nearest_color(&refined, img.pixels()[0]).unwrap();
    assert_eq!(refined[idx as usize], color);
}

#[test]
fn truncated_files() {
    let img = Image::from_pixels(gradient(8, 8), 8, 8).unwrap();
    let pal = quantize(&img, 4, 1).unwrap();
    let mut img = img;
    remap_to_palette(&mut img, &pal).unwrap();
    let fsd = encode(&img, &pal).unwrap();

    assert_eq!(Err(Error::FormatError), decode(&fsd[..HEADER_LEN - 1]).map(|_| ()));
    assert_eq!(Err(Error::Incomplete), decode(&fsd[..fsd.len() - 2]).map(|_| ()));
    let partial = decode_lossy(&fsd[..fsd.len() - 2]).unwrap();
    assert!(!partial.is_complete());
    assert!(partial.pixels_written < 64);
    assert_eq!(&img.pixels()[..partial.pixels_written], &partial.image.pixels()[..partial.pixels_written]);
}
