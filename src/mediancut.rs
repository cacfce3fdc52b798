use crate::error::Error;
use crate::pal::{Color, Palette, MAX_COLORS};
use crate::rayoff::*;
use std::ops::Range;

/// What to do with a bucket where no channel sum is strictly larger than both others
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ChannelTie {
    /// Leave the bucket unsplit. It is carried over whole, with an empty sibling next to it,
    /// so the palette still has the requested length, but some entries are black.
    #[default]
    Keep,
    /// Split at the midpoint in the current order, without sorting
    Halve,
    /// Sort by the first of the tied channels (R before G before B), then split
    FirstWidest,
}

/// A group of samples, stored as a range of the shared sample arena
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Bucket {
    begin: usize,
    end: usize,
}

impl Bucket {
    #[inline(always)]
    fn range(self) -> Range<usize> {
        self.begin..self.end
    }

    #[inline(always)]
    fn is_empty(self) -> bool {
        self.begin == self.end
    }
}

#[derive(Copy, Clone, Debug)]
enum Channel {
    R,
    G,
    B,
}

impl Channel {
    #[inline(always)]
    fn of(self, c: &Color) -> u8 {
        match self {
            Self::R => c.r,
            Self::G => c.g,
            Self::B => c.b,
        }
    }
}

/// Channel whose sum strictly exceeds both other sums
fn dominant_channel(colors: &[Color], ties: ChannelTie) -> Option<Channel> {
    let (r, g, b) = colors.iter().fold((0u64, 0u64, 0u64), |(r, g, b), c| {
        (r + u64::from(c.r), g + u64::from(c.g), b + u64::from(c.b))
    });
    if r > g && r > b {
        Some(Channel::R)
    } else if g > r && g > b {
        Some(Channel::G)
    } else if b > r && b > g {
        Some(Channel::B)
    } else if ties == ChannelTie::FirstWidest {
        let max = r.max(g).max(b);
        Some(if r == max { Channel::R } else if g == max { Channel::G } else { Channel::B })
    } else {
        None
    }
}

/// How one bucket of a generation is handled in the next one
#[derive(Copy, Clone)]
enum Cut {
    /// sorted (if there was a channel to sort by) and halved
    Split,
    /// channel tie with `ChannelTie::Keep`
    Unsplit,
    /// no splits left for this round
    Carry,
}

pub(crate) struct MedianCutter {
    samples: Vec<Color>,
    boxes: Vec<Bucket>,
    target_colors: usize,
    ties: ChannelTie,
    /// non-empty buckets left whole because of a channel tie
    pub(crate) unsplit: usize,
}

impl MedianCutter {
    pub fn new(samples: &[Color], target_colors: u32, ties: ChannelTie) -> Result<Self, Error> {
        if target_colors == 0 || target_colors as usize > MAX_COLORS {
            return Err(Error::InvalidArgument);
        }
        let target_colors = target_colors as usize;
        let mut arena = Vec::new();
        arena.try_reserve_exact(samples.len())?;
        arena.extend_from_slice(samples);

        let mut boxes = Vec::new();
        boxes.try_reserve(target_colors)?;
        boxes.push(Bucket { begin: 0, end: arena.len() });

        Ok(Self {
            samples: arena,
            boxes,
            target_colors,
            ties,
            unsplit: 0,
        })
    }

    /// Splits every bucket of the current generation, breadth-first, until there are `target_colors` of them
    fn cut(&mut self) {
        while self.boxes.len() < self.target_colors {
            let mut splits_left = self.target_colors - self.boxes.len();
            let ties = self.ties;

            let mut jobs = Vec::with_capacity(self.boxes.len());
            let mut rest = &mut self.samples[..];
            let mut taken = 0;
            for b in &self.boxes {
                let (this_box, tail) = std::mem::take(&mut rest).split_at_mut(b.end - taken);
                rest = tail;
                taken = b.end;
                let cut = if splits_left == 0 {
                    Cut::Carry
                } else {
                    splits_left -= 1;
                    Cut::Split
                };
                jobs.push((this_box, cut));
            }

            // buckets are disjoint, so their sorting is independent
            jobs.par_iter_mut().for_each(|(colors, cut)| {
                if let Cut::Split = cut {
                    match dominant_channel(colors, ties) {
                        Some(ch) => colors.sort_by_key(|c| ch.of(c)),
                        None if ties == ChannelTie::Keep => *cut = Cut::Unsplit,
                        None => {},
                    }
                }
            });

            let mut next = Vec::with_capacity(self.target_colors);
            for (b, (_, cut)) in self.boxes.iter().zip(&jobs) {
                match cut {
                    Cut::Split => {
                        let mid = b.begin + (b.end - b.begin) / 2;
                        next.push(Bucket { begin: b.begin, end: mid });
                        next.push(Bucket { begin: mid, end: b.end });
                    },
                    Cut::Unsplit => {
                        if !b.is_empty() {
                            self.unsplit += 1;
                        }
                        next.push(*b);
                        next.push(Bucket { begin: b.end, end: b.end });
                    },
                    Cut::Carry => next.push(*b),
                }
            }
            self.boxes = next;
        }
        debug_assert_eq!(self.boxes.len(), self.target_colors);
    }

    fn into_palette(self) -> Palette {
        let mut palette = Palette::new();
        for b in &self.boxes {
            // there are exactly target_colors <= MAX_COLORS buckets
            let _ = palette.push(average_color(&self.samples[b.range()]));
        }
        palette
    }

    pub(crate) fn empty_boxes(&self) -> usize {
        self.boxes.iter().filter(|b| b.is_empty()).count()
    }
}

/// Palette of exactly `target_colors` entries, from recursive halving of the samples
/// along the channel with the largest sum.
///
/// Buckets are split a whole generation at a time, so powers of two give evenly sized buckets.
/// For other counts the last round only splits the first buckets of the generation.
/// Empty buckets become black entries.
#[inline(never)]
pub fn median_cut(samples: &[Color], target_colors: u32, ties: ChannelTie) -> Result<Palette, Error> {
    let mut mc = MedianCutter::new(samples, target_colors, ties)?;
    mc.cut();
    Ok(mc.into_palette())
}

/// Same as `median_cut`, also returning (unsplit buckets, empty buckets) for logging
pub(crate) fn median_cut_stats(samples: &[Color], target_colors: u32, ties: ChannelTie) -> Result<(Palette, usize, usize), Error> {
    let mut mc = MedianCutter::new(samples, target_colors, ties)?;
    mc.cut();
    let unsplit = mc.unsplit;
    let empty = mc.empty_boxes();
    Ok((mc.into_palette(), unsplit, empty))
}

/// Per-channel mean, rounded to nearest. Black if there are no colors.
pub(crate) fn average_color(colors: &[Color]) -> Color {
    let mut sum = ColorSum::default();
    colors.iter().for_each(|&c| sum.add(c));
    sum.mean().unwrap_or_default()
}

/// Integer accumulator, so the order of additions never matters
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ColorSum {
    pub r: u64,
    pub g: u64,
    pub b: u64,
    pub total: u64,
}

impl ColorSum {
    #[inline(always)]
    pub fn add(&mut self, c: Color) {
        self.r += u64::from(c.r);
        self.g += u64::from(c.g);
        self.b += u64::from(c.b);
        self.total += 1;
    }

    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.r += other.r;
        self.g += other.g;
        self.b += other.b;
        self.total += other.total;
    }

    #[inline]
    pub fn mean(&self) -> Option<Color> {
        if self.total == 0 {
            return None;
        }
        let div = |sum: u64| ((sum + self.total / 2) / self.total) as u8;
        Some(Color::new(div(self.r), div(self.g), div(self.b)))
    }
}

#[cfg(test)]
fn gradient() -> Vec<Color> {
    (0..64u8).map(|i| Color::new(i * 4, i, 0)).collect()
}

#[test]
fn single_color_is_the_mean() {
    let samples = [Color::new(10, 20, 30), Color::new(11, 20, 31), Color::new(13, 21, 30)];
    let pal = median_cut(&samples, 1, ChannelTie::Keep).unwrap();
    // 34/3 = 11.33, 61/3 = 20.33, 91/3 = 30.33
    assert_eq!(&[Color::new(11, 20, 30)], pal.as_slice());

    let pal = median_cut(&[Color::new(0, 0, 1), Color::new(0, 0, 2)], 1, ChannelTie::Keep).unwrap();
    assert_eq!(Color::new(0, 0, 2), pal[0], "1.5 rounds up");
}

#[test]
fn color_count_limits() {
    let samples = gradient();
    assert_eq!(Err(Error::InvalidArgument), median_cut(&samples, 0, ChannelTie::Keep));
    assert_eq!(Err(Error::InvalidArgument), median_cut(&samples, 256, ChannelTie::Keep));
    assert_eq!(255, median_cut(&samples, 255, ChannelTie::Keep).unwrap().len());
}

#[test]
fn splits_along_dominant_channel() {
    // red sum dominates, so the split is by red regardless of the order of samples
    let samples = [Color::new(200, 0, 50), Color::new(10, 0, 60), Color::new(190, 0, 40), Color::new(20, 0, 70)];
    let pal = median_cut(&samples, 2, ChannelTie::Keep).unwrap();
    assert_eq!(&[Color::new(15, 0, 65), Color::new(195, 0, 45)], pal.as_slice());
}

#[test]
fn power_of_two_generations() {
    let samples = gradient();
    let pal = median_cut(&samples, 4, ChannelTie::Keep).unwrap();
    // 16 samples per bucket, mean of i in 0..16 is 7.5
    let expected: Vec<_> = (0..4u32).map(|q| {
        let i = q * 16 * 2 + 15; // 2 * mean index
        Color::new(((i * 4 + 1) / 2) as u8, ((i + 1) / 2) as u8, 0)
    }).collect();
    assert_eq!(expected, pal.as_slice());
}

#[test]
fn non_power_of_two_lands_on_target() {
    let samples = gradient();
    for n in [3, 5, 6, 7, 11, 100] {
        let pal = median_cut(&samples, n, ChannelTie::Keep).unwrap();
        assert_eq!(n as usize, pal.len());
    }
    // 64 -> 32 + 32 -> first one splits into 16 + 16, the second is carried over
    let pal = median_cut(&samples, 3, ChannelTie::Keep).unwrap();
    assert_eq!(average_color(&samples[..16]), pal[0]);
    assert_eq!(average_color(&samples[16..32]), pal[1]);
    assert_eq!(average_color(&samples[32..]), pal[2]);
}

#[test]
fn empty_buckets_are_black() {
    let samples = [Color::new(100, 0, 0), Color::new(200, 0, 0)];
    let pal = median_cut(&samples, 8, ChannelTie::Keep).unwrap();
    assert_eq!(8, pal.len());
    assert!(pal.contains(&Color::new(100, 0, 0)));
    assert!(pal.contains(&Color::new(200, 0, 0)));
    assert_eq!(6, pal.iter().filter(|&&c| c == Color::new(0, 0, 0)).count());

    let pal = median_cut(&[], 4, ChannelTie::Keep).unwrap();
    assert_eq!(&[Color::default(); 4], pal.as_slice());
}

#[test]
fn gray_ties_keep_bucket_whole() {
    let samples: Vec<_> = (0..16u8).map(|i| Color::new(i * 10, i * 10, i * 10)).collect();
    let (pal, unsplit, empty) = median_cut_stats(&samples, 4, ChannelTie::Keep).unwrap();
    assert_eq!(4, pal.len());
    // round 1: [all, empty]; round 2: [all, empty] + [empty, empty]
    assert_eq!(2, unsplit);
    assert_eq!(3, empty);
    assert_eq!(average_color(&samples), pal[0]);
    assert_eq!(&[Color::default(); 3], &pal[1..]);
}

#[test]
fn gray_ties_other_policies() {
    let samples: Vec<_> = [5u8, 1, 7, 3].iter().map(|&i| Color::new(i, i, i)).collect();

    let pal = median_cut(&samples, 2, ChannelTie::Halve).unwrap();
    // unsorted halves: [5, 1] and [7, 3]
    assert_eq!(&[Color::new(3, 3, 3), Color::new(5, 5, 5)], pal.as_slice());

    let pal = median_cut(&samples, 2, ChannelTie::FirstWidest).unwrap();
    // sorted: [1, 3] and [5, 7]
    assert_eq!(&[Color::new(2, 2, 2), Color::new(6, 6, 6)], pal.as_slice());
}

#[test]
fn two_way_tie_is_a_tie() {
    let samples = [Color::new(100, 100, 0), Color::new(0, 0, 0)];
    let (_, unsplit, _) = median_cut_stats(&samples, 2, ChannelTie::Keep).unwrap();
    assert_eq!(1, unsplit);
}
