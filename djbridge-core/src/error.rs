//! Error types for djbridge-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{blob} blob truncated at byte {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        blob: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Decompressed length {actual} does not match header length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("No match: {0}")]
    NoMatch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported crate key '{key}' at byte {offset}")]
    UnsupportedKey { key: String, offset: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Song {id}: {source}")]
    Song {
        id: i64,
        #[source]
        source: Box<Error>,
    },

    #[error("Playlist {id}: {source}")]
    Playlist {
        id: i64,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Attach a song ID to an error raised while converting that song.
    pub fn for_song(self, id: i64) -> Self {
        Error::Song {
            id,
            source: Box::new(self),
        }
    }

    /// Attach a playlist ID to an error raised while placing that playlist.
    pub fn for_playlist(self, id: i64) -> Self {
        Error::Playlist {
            id,
            source: Box::new(self),
        }
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(e: quick_xml::DeError) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<quick_xml::SeError> for Error {
    fn from(e: quick_xml::SeError) -> Self {
        Error::Xml(e.to_string())
    }
}
