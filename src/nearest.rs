use crate::error::Error;
use crate::pal::{color_diff, Color, PalIndex, Palette, MAX_COLORS};

/// Nearest-color lookup for a fixed palette.
///
/// When several entries are equally near, the one earliest in the palette wins.
pub(crate) struct Nearest<'pal> {
    colors: &'pal [Color],
    /// squared distance to the nearest *other* palette entry
    nearest_other_color_dist: [u32; MAX_COLORS],
}

impl<'pal> Nearest<'pal> {
    #[inline(never)]
    pub fn new(palette: &'pal Palette) -> Result<Self, Error> {
        let colors = palette.as_slice();
        if colors.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut nearest_other_color_dist = [u32::MAX; MAX_COLORS];
        for (i, &a) in colors.iter().enumerate() {
            nearest_other_color_dist[i] = colors.iter().enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &b)| color_diff(a, b))
                .min()
                .unwrap_or(u32::MAX);
        }
        Ok(Self { colors, nearest_other_color_dist })
    }

    /// Index and squared distance of the nearest palette entry.
    ///
    /// `likely_colormap_index` is only a speed hint (e.g. the previous match), it never changes the result.
    #[inline]
    pub fn search(&self, px: Color, likely_colormap_index: PalIndex) -> (PalIndex, u32) {
        // The index may be invalid, so it needs to be checked
        if let Some(&pal_px) = self.colors.get(likely_colormap_index as usize) {
            let guess_diff = color_diff(px, pal_px);
            // closer than half the distance to any other entry, so nothing else can tie or win
            if u64::from(guess_diff) * 4 < u64::from(self.nearest_other_color_dist[likely_colormap_index as usize]) {
                return (likely_colormap_index, guess_diff);
            }
        }
        self.search_all(px)
    }

    /// Like `search`, but entries at `max_diff` squared distance or farther don't count
    #[inline]
    pub fn search_within(&self, px: Color, likely_colormap_index: PalIndex, max_diff: u32) -> Option<(PalIndex, u32)> {
        Some(self.search(px, likely_colormap_index)).filter(|&(_, diff)| diff < max_diff)
    }

    fn search_all(&self, px: Color) -> (PalIndex, u32) {
        let mut best = (0, u32::MAX);
        for (i, &c) in self.colors.iter().enumerate() {
            let diff = color_diff(px, c);
            if diff < best.1 {
                best = (i as PalIndex, diff);
            }
        }
        best
    }
}

/// Color of the palette entry nearest to `color`, by squared Euclidean distance.
///
/// Ties go to the entry that comes first. Fails only if the palette is empty.
pub fn nearest_color(palette: &Palette, color: Color) -> Result<(PalIndex, Color), Error> {
    let n = Nearest::new(palette)?;
    let (idx, _) = n.search(color, 0);
    Ok((idx, palette[idx as usize]))
}

#[test]
fn exact_match() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(255, 0, 0), Color::new(0, 255, 0), Color::new(12, 34, 56)]).unwrap();
    let n = Nearest::new(&pal).unwrap();
    for (i, &c) in pal.iter().enumerate() {
        for guess in 0..5 {
            assert_eq!((i as PalIndex, 0), n.search(c, guess));
        }
    }
}

#[test]
fn ties_go_to_first() {
    let pal = Palette::from_colors(&[Color::new(10, 0, 0), Color::new(0, 10, 0), Color::new(10, 0, 0)]).unwrap();
    let n = Nearest::new(&pal).unwrap();
    // equidistant from entries 0 and 1
    assert_eq!(0, n.search(Color::new(5, 5, 0), 1).0);
    // duplicates: the later copy is never picked
    assert_eq!(0, n.search(Color::new(10, 0, 0), 2).0);
    assert_eq!(0, n.search(Color::new(12, 0, 0), 2).0);
}

#[test]
fn guess_does_not_change_result() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(100, 100, 100), Color::new(200, 200, 200), Color::new(255, 0, 0)]).unwrap();
    let n = Nearest::new(&pal).unwrap();
    for v in (0..=255u8).step_by(5) {
        let px = Color::new(v, v / 2, 255 - v);
        let expected = n.search_all(px);
        for guess in 0..=4 {
            assert_eq!(expected, n.search(px, guess));
        }
    }
}

#[test]
fn within_threshold() {
    let pal = Palette::from_colors(&[Color::new(0, 0, 0), Color::new(100, 0, 0)]).unwrap();
    let n = Nearest::new(&pal).unwrap();
    assert_eq!(Some((0, 225)), n.search_within(Color::new(15, 0, 0), 0, 250));
    assert_eq!(None, n.search_within(Color::new(16, 0, 0), 0, 250));
    assert!(Nearest::new(&Palette::new()).is_err());
    assert_eq!(Ok((1, Color::new(100, 0, 0))), nearest_color(&pal, Color::new(90, 0, 0)));
}
