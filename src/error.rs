use std::collections::TryReserveError;
use std::fmt;

/// Error codes
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Function called with invalid arguments, e.g. zero or more than 255 colors, or an empty image
    InvalidArgument = 100,
    /// The byte stream is not a valid encoded image (truncated header, bad palette code, zero-length run)
    FormatError,
    /// The run stream ended before every pixel was decoded. Use [`decode_lossy`][crate::decode_lossy] to get the partial image
    Incomplete,
    /// The image has a color that isn't in the palette, so it has no code
    MissingPaletteEntry,
    /// Either the system/process really hit a limit, or some data like image size was ridiculously wrong
    OutOfMemory,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FormatError => "FORMAT_ERROR",
            Self::Incomplete => "INCOMPLETE",
            Self::MissingPaletteEntry => "MISSING_PALETTE_ENTRY",
            Self::OutOfMemory => "OUT_OF_MEMORY",
        })
    }
}

impl From<TryReserveError> for Error {
    #[cold]
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

#[test]
fn codes_are_printable() {
    assert_eq!("INCOMPLETE", Error::Incomplete.to_string());
    assert_eq!("MISSING_PALETTE_ENTRY", Error::MissingPaletteEntry.to_string());
    let err: Box<dyn std::error::Error> = Box::new(Error::FormatError);
    assert_eq!("FORMAT_ERROR", err.to_string());
}
