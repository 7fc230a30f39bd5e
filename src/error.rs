//! Crate-level error types.

use std::fmt;
use std::path::PathBuf;

/// Errors produced by the spectra crate.
///
/// Grid mismatches between spectra and NaNs inside the integrator are not
/// represented here; those are implementation bugs and abort through
/// assertions instead of propagating.
#[derive(Debug)]
pub enum SpectraError {
    /// Malformed or missing command-line argument.
    BadArgs(String),
    /// Scene name outside the built-in set.
    UnknownScene(String),
    /// A required data file could not be opened.
    FileOpen(PathBuf, std::io::Error),
    /// Malformed spectral CSV (ragged rows or non-numeric cells).
    BadCsv(PathBuf, String),
    /// The D65 table is not normalized to 100 at 560 nm.
    BadIlluminant(f32),
    /// A sampled spectrum was constructed from fewer than two samples.
    InvalidSpectrum(usize),
    /// A reflectance texture could not be decoded.
    BadTexture(PathBuf, String),
    /// Generic I/O failure while writing the rendered image.
    Io(std::io::Error),
    /// PNG encoding failure.
    ImageEncode(String),
}

impl fmt::Display for SpectraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadArgs(msg) => write!(f, "argument error: {msg}"),
            Self::UnknownScene(name) => write!(
                f,
                "unrecognized scene \"{name}\" (supported scenes: \
                 \"cornell\", \"cornell-srgb\", \"plane-srgb\")"
            ),
            Self::FileOpen(path, e) => {
                write!(f, "could not open required file {}: {e}", path.display())
            }
            Self::BadCsv(path, msg) => {
                write!(f, "invalid data in {}: {msg}", path.display())
            }
            Self::BadIlluminant(v) => write!(
                f,
                "D65 table must equal 100 at 560 nm (found {v})"
            ),
            Self::InvalidSpectrum(n) => write!(
                f,
                "sampled spectrum needs at least two samples (got {n})"
            ),
            Self::BadTexture(path, msg) => {
                write!(f, "could not load texture {}: {msg}", path.display())
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ImageEncode(msg) => write!(f, "image encode error: {msg}"),
        }
    }
}

impl std::error::Error for SpectraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileOpen(_, e) | Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SpectraError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for SpectraError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageEncode(e.to_string())
    }
}
