//! Error types for payload decoding.

use thiserror::Error;

/// Errors that can occur while turning fetched bytes into a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The image data could not be decoded.
    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),

    /// The source buffer was empty.
    #[error("Empty tile data")]
    Empty,

    /// The decoded image has unusable dimensions.
    #[error("Invalid dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The payload kind does not support this operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}
