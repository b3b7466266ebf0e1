use std::path::PathBuf;

use thiserror::Error;

/// Error type for every gifstamp operation.
///
/// Each variant is fatal to the operation that raised it; nothing is retried
/// and no partial output is left behind.
#[derive(Debug, Error)]
pub enum GifStampError {
    /// The background file could not be read.
    #[error("could not read '{}': {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The byte stream is not a valid animated GIF.
    #[error("invalid GIF: {0}")]
    Format(String),

    /// The font is unreadable or unusable at the requested size.
    #[error("font load failed: {0}")]
    FontLoad(String),

    /// A frame or palette violates GIF constraints.
    #[error("GIF encode failed: {0}")]
    Encode(String),

    /// The output could not be persisted.
    #[error("could not write '{}': {source}", path.display())]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid overlay configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<gif::DecodingError> for GifStampError {
    fn from(e: gif::DecodingError) -> Self {
        GifStampError::Format(e.to_string())
    }
}

impl From<gif::EncodingError> for GifStampError {
    fn from(e: gif::EncodingError) -> Self {
        GifStampError::Encode(e.to_string())
    }
}

impl From<ab_glyph::InvalidFont> for GifStampError {
    fn from(e: ab_glyph::InvalidFont) -> Self {
        GifStampError::FontLoad(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GifStampError>;
