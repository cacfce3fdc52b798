#![feature(test)]

extern crate test;
use test::Bencher;

use fsdither::*;

fn noise(width: u32, height: u32) -> Image {
    let mut seed = 0x2545_f491_u32;
    let pixels: Vec<_> = (0..width * height).map(|_| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let [r, g, b, _] = seed.to_le_bytes();
        Color::new(r, g, b)
    }).collect();
    Image::from_pixels(pixels, width, height).unwrap()
}

#[bench]
fn median_cut_256k(b: &mut Bencher) {
    let img = noise(512, 512);
    let samples = subsample(&img, 1).unwrap();
    b.iter(move || {
        median_cut(&samples, 255, ChannelTie::Keep).unwrap()
    });
}

#[bench]
fn kmeans(b: &mut Bencher) {
    let img = noise(512, 512);
    let mut attr = new();
    attr.set_max_colors(64).unwrap();
    attr.set_kmeans_iterations(5);
    attr.set_kmeans_stride(1).unwrap();
    let pal = attr.quantize(&img).unwrap().into_palette();
    b.iter(move || {
        attr.refine(&img, &pal).unwrap()
    });
}

#[bench]
fn dither_literal(b: &mut Bencher) {
    let img = noise(512, 512);
    let pal = quantize(&img, 16, DEFAULT_SAMPLE_STRIDE).unwrap();
    b.iter(move || {
        let mut img = img.clone();
        dither(&mut img, &pal, DitherMode::Literal).unwrap();
    });
}

#[bench]
fn dither_corrected(b: &mut Bencher) {
    let img = noise(512, 512);
    let pal = quantize(&img, 16, DEFAULT_SAMPLE_STRIDE).unwrap();
    b.iter(move || {
        let mut img = img.clone();
        dither(&mut img, &pal, DitherMode::Corrected).unwrap();
    });
}

#[bench]
fn encode_fsd(b: &mut Bencher) {
    let mut img = noise(512, 512);
    let pal = quantize(&img, 16, DEFAULT_SAMPLE_STRIDE).unwrap();
    dither(&mut img, &pal, DitherMode::Corrected).unwrap();
    b.iter(move || {
        let fsd = encode(&img, &pal).unwrap();
        decode(&fsd).unwrap()
    });
}
