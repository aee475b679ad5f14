//! Engine library import
//!
//! An Engine library is a directory holding `Database2/m.db` (tracks,
//! performance data, playlists) and `Database2/hm.db` (play history).
//! Import happens in two steps: [`extract`] materialises the rows with every
//! column nullable, then [`assemble`] turns them into a [`Library`].

pub mod assemble;
pub mod beatgrid;
pub mod blob;
pub mod cues;
pub mod extract;
pub(crate) mod layout;
pub mod loops;
pub mod playlist;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use self::layout::Argb;
use crate::error::Result;
use crate::library::Library;

/// How ambiguous Engine data is resolved during import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Take the analyser's beatgrid instead of the user-adjusted one
    pub import_original_grids: bool,
    /// Take the analyser's main cue instead of the user-moved one
    pub import_original_cues: bool,
    /// Keep track paths relative to the library directory
    pub preserve_original_paths: bool,
}

/// `Track` row from `m.db`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SongRow {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub composer: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub file_type: Option<String>,
    pub file_bytes: Option<i64>,
    pub length: Option<f64>,
    pub year: Option<i64>,
    pub bpm: Option<f64>,
    pub date_added: Option<i64>,
    pub bitrate: Option<i64>,
    pub comment: Option<String>,
    pub rating: Option<i64>,
    pub path: Option<String>,
    pub remixer: Option<String>,
    pub key: Option<i64>,
    pub label: Option<String>,
    pub last_edit_time: Option<i64>,
}

/// `PerformanceData` row, blobs still compressed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerformanceDataRow {
    pub track_id: Option<i64>,
    pub beat_data: Option<Vec<u8>>,
    pub quick_cues: Option<Vec<u8>>,
    pub loops: Option<Vec<u8>>,
}

/// Play history aggregated per track from `hm.db`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryRow {
    pub track_id: Option<i64>,
    pub play_count: Option<i64>,
    pub last_played: Option<i64>,
}

/// `Playlist` row. Siblings are chained through `next_list_id`; 0 ends the
/// chain and a `parent_list_id` of 0 marks a root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaylistRow {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub parent_list_id: Option<i64>,
    pub next_list_id: Option<i64>,
}

/// `PlaylistEntity` row, one track inside one playlist
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaylistEntityRow {
    pub id: Option<i64>,
    pub list_id: Option<i64>,
    pub track_id: Option<i64>,
    pub next_entity_id: Option<i64>,
}

/// `Smartlist` row. Only its position is used, rules are kept opaque.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmartlistRow {
    pub list_uuid: Option<String>,
    pub title: Option<String>,
    pub parent_playlist_path: Option<String>,
    pub next_playlist_path: Option<String>,
    pub next_list_uuid: Option<String>,
    pub rules: Option<String>,
}

/// Everything read from an Engine library
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineRows {
    pub songs: Vec<SongRow>,
    pub performance_data: Vec<PerformanceDataRow>,
    pub history: Vec<HistoryRow>,
    pub playlists: Vec<PlaylistRow>,
    pub playlist_entities: Vec<PlaylistEntityRow>,
    pub smartlists: Vec<SmartlistRow>,
}

/// Import the Engine library in `dir`.
pub fn import<P: AsRef<Path>>(dir: P, options: &ImportOptions) -> Result<Library> {
    let dir = dir.as_ref();
    info!("Importing Engine library from {}", dir.display());

    let rows = extract::extract(dir)?;
    import_rows(rows, dir, options)
}

/// Assemble already-extracted rows. Relative track paths resolve against
/// `library_root` unless paths are preserved.
pub fn import_rows(rows: EngineRows, library_root: &Path, options: &ImportOptions) -> Result<Library> {
    let library = assemble::assemble(rows, library_root, options)?;

    info!(
        "Imported {} songs and {} playlists",
        library.songs.len(),
        library.playlist_count()
    );
    Ok(library)
}
