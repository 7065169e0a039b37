mod loader;
mod nbs;

pub use loader::load_song;
pub use nbs::decode;

use thiserror::Error;

/// Errors from loading a song, in either format.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The binary stream ended in the middle of a required field.
    #[error("song data ended mid-field")]
    TruncatedInput,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The structured song file did not match the expected shape.
    #[error("malformed song file: {0}")]
    MalformedStructured(String),
    #[error("no song file found for {0:?}")]
    NotFound(String),
}
