//! Error types for the irregular-watershed crate.

/// Errors that can occur while validating, correcting or storing a mask.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image has no pixels.
    #[error("image is empty ({width}x{height})")]
    EmptyImage {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// The image contains a value other than 0 or 255.
    #[error("not a binary mask: pixel ({x}, {y}) has value {value}, expected 0 or 255")]
    NotBinary {
        /// Column of the first offending pixel.
        x: u32,
        /// Row of the first offending pixel.
        y: u32,
        /// The offending value.
        value: u8,
    },

    /// The erosion cycle count is outside `1..=255`.
    #[error("invalid erosion cycle count {0}: must be between 1 and 255")]
    InvalidCycles(u32),

    /// The convexity threshold is outside `[0, 1]`.
    #[error("invalid convexity threshold {0}: must be between 0.0 and 1.0")]
    InvalidThreshold(f64),

    /// A collaborator produced a mask whose size differs from its input.
    #[error("mask size mismatch: expected {}x{}, found {}x{}", expected.0, expected.1, found.0, found.1)]
    DimensionMismatch {
        /// Dimensions of the input mask.
        expected: (u32, u32),
        /// Dimensions of the returned mask.
        found: (u32, u32),
    },

    /// The watershed collaborator failed to split the mask.
    #[error("watershed failed: {0}")]
    Watershed(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
