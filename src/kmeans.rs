use crate::error::Error;
use crate::image::{subsample, Raster};
use crate::mediancut::ColorSum;
use crate::nearest::Nearest;
use crate::pal::{Color, PalIndex, Palette};
use crate::rayoff::*;
use std::cell::RefCell;

/// Number of refinement rounds. There's no convergence check, all of them always run.
pub const KMEANS_ITERATIONS: u16 = 100;
/// Pixels at this squared distance from their nearest mean, or farther, don't move any mean
pub const KMEANS_THRESHOLD: u32 = 250;
/// Every n-th pixel is scanned
pub const KMEANS_STRIDE: usize = 300;

pub(crate) struct Kmeans {
    averages: Vec<ColorSum>,
    /// pixels that were too far from every mean
    excluded: u64,
}

/// What happened during refinement, for logging
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct KmeansStats {
    pub samples: usize,
    /// means that had no pixels in the last round
    pub stale_means: usize,
    /// pixels excluded in the last round
    pub excluded: u64,
}

/// K-Means iteration: new palette color is the average of colors that map best to that palette entry.
impl Kmeans {
    #[inline]
    pub fn new(pal_len: usize) -> Result<Self, Error> {
        let mut averages = Vec::new();
        averages.try_reserve_exact(pal_len)?;
        averages.resize(pal_len, ColorSum::default());
        Ok(Self { averages, excluded: 0 })
    }

    #[inline]
    pub fn update_color(&mut self, px: Color, matched: PalIndex) {
        self.averages[matched as usize].add(px);
    }

    /// Moves every mean that got any pixels. Returns number of means left as they were.
    pub fn finalize(self, palette: &mut Palette) -> usize {
        let mut stale = 0;
        for (avg, color) in self.averages.iter().zip(palette.as_mut_slice()) {
            match avg.mean() {
                Some(mean) => *color = mean,
                None => stale += 1,
            }
        }
        stale
    }

    fn iterate_batch(&mut self, batch: &[Color], n: &Nearest<'_>, threshold: u32) {
        let mut last_match = 0;
        for &px in batch {
            match n.search_within(px, last_match, threshold) {
                Some((matched, _)) => {
                    last_match = matched;
                    self.update_color(px, matched);
                },
                None => self.excluded += 1,
            }
        }
    }

    #[inline]
    pub fn merge(mut self, new: Kmeans) -> Kmeans {
        self.excluded += new.excluded;
        self.averages.iter_mut().zip(&new.averages).for_each(|(p, n)| p.merge(n));
        self
    }

    #[inline]
    pub fn try_merge<E>(old: Result<Self, E>, new: Result<Self, E>) -> Result<Self, E> {
        match (old, new) {
            (Ok(old), Ok(new)) => Ok(Kmeans::merge(old, new)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }

    /// One round: every sample is matched against the same snapshot of the means,
    /// and the means are updated only after all samples have been seen.
    #[inline(never)]
    pub(crate) fn iteration(samples: &[Color], palette: &mut Palette, threshold: u32) -> Result<(usize, u64), Error> {
        let len = palette.len();
        let snapshot = palette.clone();
        let n = Nearest::new(&snapshot)?;

        let tls = ThreadLocal::new();
        // chunk size is a trade-off between parallelization and overhead
        samples.par_chunks(256).for_each(|batch| {
            let kmeans = tls.get_or(move || RefCell::new(Kmeans::new(len)));
            if let Ok(ref mut kmeans) = *kmeans.borrow_mut() {
                kmeans.iterate_batch(batch, &n, threshold);
            }
        });

        let merged = tls.into_iter()
            .map(RefCell::into_inner)
            .reduce(Kmeans::try_merge)
            .transpose()?;
        Ok(match merged {
            Some(kmeans) => {
                let excluded = kmeans.excluded;
                (kmeans.finalize(palette), excluded)
            },
            None => (len, 0),
        })
    }
}

pub(crate) fn refine_samples(samples: &[Color], initial: &Palette, iterations: u16, threshold: u32) -> Result<(Palette, KmeansStats), Error> {
    if initial.is_empty() {
        return Err(Error::InvalidArgument);
    }
    let mut palette = initial.clone();
    let mut stats = KmeansStats { samples: samples.len(), stale_means: 0, excluded: 0 };
    for _ in 0..iterations {
        let (stale_means, excluded) = Kmeans::iteration(samples, &mut palette, threshold)?;
        stats.stale_means = stale_means;
        stats.excluded = excluded;
    }
    Ok((palette, stats))
}

/// Moves every palette color to the average of the sampled pixels nearest to it.
///
/// Runs [`KMEANS_ITERATIONS`] rounds over every [`KMEANS_STRIDE`]-th pixel, ignoring pixels
/// that aren't within [`KMEANS_THRESHOLD`] squared distance of any color.
/// The output has the same length and order as `initial`.
pub fn refine<R: Raster + ?Sized>(image: &R, initial: &Palette) -> Result<Palette, Error> {
    let samples = subsample(image, KMEANS_STRIDE)?;
    Ok(refine_samples(&samples, initial, KMEANS_ITERATIONS, KMEANS_THRESHOLD)?.0)
}

#[cfg(test)]
use crate::image::Image;

#[test]
fn fixed_point() {
    let pixels = vec![Color::new(10, 10, 10), Color::new(12, 12, 12), Color::new(200, 0, 0), Color::new(202, 0, 0)];
    let img = Image::from_pixels(pixels, 2, 2).unwrap();
    let pal = Palette::from_colors(&[Color::new(11, 11, 11), Color::new(201, 0, 0)]).unwrap();
    let samples = subsample(&img, 1).unwrap();
    let (refined, stats) = refine_samples(&samples, &pal, KMEANS_ITERATIONS, KMEANS_THRESHOLD).unwrap();
    assert_eq!(pal, refined);
    assert_eq!(0, stats.stale_means);
    assert_eq!(0, stats.excluded);
}

#[test]
fn moves_towards_cluster() {
    let samples = [Color::new(100, 100, 100), Color::new(104, 100, 100), Color::new(100, 104, 100)];
    let pal = Palette::from_colors(&[Color::new(110, 100, 100)]).unwrap();
    let (refined, _) = refine_samples(&samples, &pal, 1, KMEANS_THRESHOLD).unwrap();
    // (100 + 104 + 100) / 3 = 101.33, (100 + 100 + 104) / 3 = 101.33
    assert_eq!(Color::new(101, 101, 100), refined[0]);
}

#[test]
fn far_pixels_are_excluded() {
    let samples = [Color::new(0, 0, 0), Color::new(4, 0, 0), Color::new(255, 255, 255)];
    let pal = Palette::from_colors(&[Color::new(1, 1, 1), Color::new(128, 128, 128)]).unwrap();
    let (refined, stats) = refine_samples(&samples, &pal, 3, KMEANS_THRESHOLD).unwrap();
    assert_eq!(Color::new(2, 0, 0), refined[0]);
    // nothing is within the threshold of the gray mean, so it doesn't move
    assert_eq!(Color::new(128, 128, 128), refined[1]);
    assert_eq!(1, stats.stale_means);
    assert_eq!(1, stats.excluded);
}

#[test]
fn threshold_is_exclusive() {
    // 15^2 = 225 is in, 16^2 = 256 is out
    let pal = Palette::from_colors(&[Color::new(0, 0, 0)]).unwrap();
    let (refined, _) = refine_samples(&[Color::new(15, 0, 0)], &pal, 1, KMEANS_THRESHOLD).unwrap();
    assert_eq!(Color::new(15, 0, 0), refined[0]);
    let (refined, _) = refine_samples(&[Color::new(16, 0, 0)], &pal, 1, KMEANS_THRESHOLD).unwrap();
    assert_eq!(Color::new(0, 0, 0), refined[0]);
}

#[test]
fn order_and_length_preserved() {
    let samples: Vec<_> = (0..1000u32).map(|i| Color::new((i % 256) as u8, (i / 4 % 256) as u8, 7)).collect();
    let pal = Palette::from_colors(&[Color::new(200, 0, 0), Color::new(0, 0, 0), Color::new(100, 100, 0)]).unwrap();
    let (refined, stats) = refine_samples(&samples, &pal, 10, KMEANS_THRESHOLD).unwrap();
    assert_eq!(3, refined.len());
    assert_eq!(1000, stats.samples);
    assert!(refined[0].r > refined[1].r);
}

#[test]
fn refine_errors() {
    let img = Image::new(4, 4).unwrap();
    assert_eq!(Err(Error::InvalidArgument), refine(&img, &Palette::new()));
    let pal = Palette::from_colors(&[Color::new(3, 3, 3)]).unwrap();
    // one sampled pixel (black), within threshold of the mean
    assert_eq!(&[Color::new(0, 0, 0)], refine(&img, &pal).unwrap().as_slice());
}
