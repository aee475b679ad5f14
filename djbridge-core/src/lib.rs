//! djbridge-core: DJ library conversion through a neutral model
//!
//! Every supported format converts to and from [`Library`]:
//! - Engine DJ (`Database2/m.db`, `hm.db`) with zlib-compressed
//!   performance-data blobs - import
//! - Rekordbox XML - import and export
//! - Serato crates - import
//!
//! Dates, ratings, keys, paths and colors are mapped by [`convert`].

pub mod convert;
pub mod engine;
pub mod error;
pub mod library;
pub mod rbxml;
pub mod serato;

pub use error::{Error, Result};
pub use library::{HotCue, Library, Loop, Marker, Playlist, Song};
