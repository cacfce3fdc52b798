use crate::error::Error;
use arrayvec::ArrayVec;
use std::ops::Deref;

/// 8-bit RGB. This is the only color format used by the library.
pub type Color = rgb::RGB8;

/// Position of a color in the palette, which is also its code in the encoded stream
pub type PalIndex = u8;

/// The encoded stream stores the palette length and the color codes in a single byte each
pub const MAX_COLORS: usize = 255;

/// Squared Euclidean distance between two colors.
///
/// The square root is never taken, this is only used to compare distances.
#[inline(always)]
#[must_use]
pub fn color_diff(a: Color, b: Color) -> u32 {
    let dr = i32::from(a.r) - i32::from(b.r);
    let dg = i32::from(a.g) - i32::from(b.g);
    let db = i32::from(a.b) - i32::from(b.b);
    (dr * dr + dg * dg + db * db) as u32
}

/// Ordered list of up to 255 colors.
///
/// Order is significant: the index of a color is its code in the encoded stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    entries: ArrayVec<Color, MAX_COLORS>,
}

impl Palette {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies colors from a slice. Fails if there are more than 255 of them.
    pub fn from_colors(colors: &[Color]) -> Result<Self, Error> {
        let mut pal = Self::new();
        for &c in colors {
            pal.push(c)?;
        }
        Ok(pal)
    }

    /// Appends a color, even if it's a duplicate. Duplicates are never picked by lookups.
    #[inline]
    pub fn push(&mut self, color: Color) -> Result<(), Error> {
        self.entries.try_push(color).map_err(|_| Error::InvalidArgument)
    }

    /// Code of the first entry that is exactly equal to the color
    #[inline]
    #[must_use]
    pub fn code_of(&self, color: Color) -> Option<PalIndex> {
        self.entries.iter().position(|&c| c == color).map(|i| i as PalIndex)
    }

    #[inline(always)]
    #[must_use]
    pub fn as_slice(&self) -> &[Color] {
        &self.entries
    }

    #[inline(always)]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Color] {
        &mut self.entries
    }
}

impl Deref for Palette {
    type Target = [Color];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl TryFrom<&[Color]> for Palette {
    type Error = Error;

    #[inline]
    fn try_from(colors: &[Color]) -> Result<Self, Error> {
        Self::from_colors(colors)
    }
}

impl TryFrom<Vec<Color>> for Palette {
    type Error = Error;

    #[inline]
    fn try_from(colors: Vec<Color>) -> Result<Self, Error> {
        Self::from_colors(&colors)
    }
}

#[test]
fn diff_test() {
    let black = Color::new(0, 0, 0);
    let white = Color::new(255, 255, 255);
    assert_eq!(0, color_diff(white, white));
    assert_eq!(3 * 255 * 255, color_diff(black, white));
    assert_eq!(color_diff(black, white), color_diff(white, black));
    assert_eq!(1 + 4 + 9, color_diff(Color::new(10, 20, 30), Color::new(11, 18, 33)));
}

#[test]
fn pal_test() {
    let mut p = Palette::new();
    for i in 0..MAX_COLORS {
        p.push(Color::new(i as u8, i as u8, 0)).unwrap();
        assert_eq!(i + 1, p.len());
    }
    assert_eq!(Err(Error::InvalidArgument), p.push(Color::new(1, 2, 3)));
    assert_eq!(Some(7), p.code_of(Color::new(7, 7, 0)));
    assert_eq!(None, p.code_of(Color::new(7, 7, 7)));

    let dup = Palette::from_colors(&[Color::new(1, 1, 1), Color::new(9, 9, 9), Color::new(1, 1, 1)]).unwrap();
    assert_eq!(Some(0), dup.code_of(Color::new(1, 1, 1)));

    let too_many = vec![Color::default(); 256];
    assert!(Palette::try_from(too_many).is_err());
}
