//! Rekordbox XML library format
//!
//! The record structs below mirror the `DJ_PLAYLISTS` document one to one
//! and are (de)serialised with quick-xml's serde support. Conversion to and
//! from the neutral model lives in [`export`](mod@export) and
//! [`import`](mod@import).

mod export;
mod import;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::library::Library;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
pub const DOCUMENT_VERSION: &str = "1.0.0";
pub const PRODUCT_NAME: &str = "djbridge";
pub const PRODUCT_COMPANY: &str = "djbridge";

/// Position mark types
pub mod mark_type {
    pub const CUE: i32 = 0;
    pub const LOOP: i32 = 4;
}

/// Playlist node types
pub mod node_type {
    pub const FOLDER: i32 = 0;
    pub const PLAYLIST: i32 = 1;
}

/// `Num` of the main (memory) cue
pub const MAIN_CUE_NUM: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Format dates in UTC instead of local time
    pub use_utc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Parse dates as UTC instead of local time
    pub use_utc: bool,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "DJ_PLAYLISTS", default)]
pub struct DjPlaylists {
    #[serde(rename = "@Version")]
    pub version: String,
    #[serde(rename = "PRODUCT")]
    pub product: Product,
    #[serde(rename = "COLLECTION")]
    pub collection: Collection,
    #[serde(rename = "PLAYLISTS")]
    pub playlists: Playlists,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "@Name", default)]
    pub name: String,
    #[serde(rename = "@Version", default)]
    pub version: String,
    #[serde(rename = "@Company", default)]
    pub company: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "@Entries", default)]
    pub entries: usize,
    #[serde(rename = "TRACK", default)]
    pub tracks: Vec<Track>,
}

/// One `COLLECTION/TRACK`. Empty and zero attributes are omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    #[serde(rename = "@TrackID")]
    pub track_id: i64,
    #[serde(rename = "@Name", skip_serializing_if = "is_default")]
    pub name: String,
    #[serde(rename = "@Artist", skip_serializing_if = "is_default")]
    pub artist: String,
    #[serde(rename = "@Composer", skip_serializing_if = "is_default")]
    pub composer: String,
    #[serde(rename = "@Album", skip_serializing_if = "is_default")]
    pub album: String,
    #[serde(rename = "@Grouping", skip_serializing_if = "is_default")]
    pub grouping: String,
    #[serde(rename = "@Genre", skip_serializing_if = "is_default")]
    pub genre: String,
    #[serde(rename = "@Kind", skip_serializing_if = "is_default")]
    pub kind: String,
    #[serde(rename = "@Size", skip_serializing_if = "is_default")]
    pub size: i64,
    /// Seconds
    #[serde(rename = "@TotalTime", skip_serializing_if = "is_default")]
    pub total_time: f64,
    #[serde(rename = "@TrackNumber", skip_serializing_if = "is_default")]
    pub track_number: i32,
    #[serde(rename = "@Year", skip_serializing_if = "is_default")]
    pub year: i32,
    #[serde(rename = "@AverageBpm", skip_serializing_if = "is_default")]
    pub average_bpm: f64,
    /// `YYYY-MM-DD`
    #[serde(rename = "@DateModified", skip_serializing_if = "is_default")]
    pub date_modified: String,
    /// `YYYY-MM-DD`
    #[serde(rename = "@DateAdded", skip_serializing_if = "is_default")]
    pub date_added: String,
    #[serde(rename = "@BitRate", skip_serializing_if = "is_default")]
    pub bit_rate: i32,
    #[serde(rename = "@SampleRate", skip_serializing_if = "is_default")]
    pub sample_rate: f64,
    #[serde(rename = "@Comments", skip_serializing_if = "is_default")]
    pub comments: String,
    #[serde(rename = "@PlayCount", skip_serializing_if = "is_default")]
    pub play_count: i32,
    /// `YYYY-MM-DD`
    #[serde(rename = "@LastPlayed", skip_serializing_if = "is_default")]
    pub last_played: String,
    /// 0..=255 in steps of 51
    #[serde(rename = "@Rating", skip_serializing_if = "is_default")]
    pub rating: i64,
    /// `file://localhost/...`
    #[serde(rename = "@Location", skip_serializing_if = "is_default")]
    pub location: String,
    #[serde(rename = "@Remixer", skip_serializing_if = "is_default")]
    pub remixer: String,
    /// Camelot notation
    #[serde(rename = "@Tonality", skip_serializing_if = "is_default")]
    pub tonality: String,
    #[serde(rename = "@Label", skip_serializing_if = "is_default")]
    pub label: String,
    #[serde(rename = "@Mix", skip_serializing_if = "is_default")]
    pub mix: String,
    /// `0xRRGGBB`
    #[serde(rename = "@Colour", skip_serializing_if = "is_default")]
    pub colour: String,
    #[serde(rename = "TEMPO")]
    pub tempo: Vec<Tempo>,
    #[serde(rename = "POSITION_MARK")]
    pub position_marks: Vec<PositionMark>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tempo {
    /// Start in seconds
    #[serde(rename = "@Inizio")]
    pub inizio: f64,
    #[serde(rename = "@Bpm")]
    pub bpm: f64,
    /// Time signature, e.g. `4/4`
    #[serde(rename = "@Metro")]
    pub metro: String,
    /// Beat in the bar, 1-indexed
    #[serde(rename = "@Battito")]
    pub battito: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionMark {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Type")]
    pub mark_type: i32,
    /// Seconds
    #[serde(rename = "@Start")]
    pub start: f64,
    /// Seconds, loops only
    #[serde(rename = "@End", skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    /// Hot cue slot from 0, or [`MAIN_CUE_NUM`]
    #[serde(rename = "@Num")]
    pub num: i32,
    #[serde(rename = "@Red", skip_serializing_if = "Option::is_none")]
    pub red: Option<u8>,
    #[serde(rename = "@Green", skip_serializing_if = "Option::is_none")]
    pub green: Option<u8>,
    #[serde(rename = "@Blue", skip_serializing_if = "Option::is_none")]
    pub blue: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Playlists {
    #[serde(rename = "NODE")]
    pub root: Node,
}

/// A folder (`Type=0`) holding nodes, or a playlist (`Type=1`) holding
/// track keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "@Type")]
    pub node_type: i32,
    #[serde(rename = "@Name")]
    pub name: String,
    /// Child node count, folders only
    #[serde(rename = "@Count", skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Track count, playlists only
    #[serde(rename = "@Entries", skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    /// 0 means tracks are referenced by `TrackID`
    #[serde(rename = "@KeyType")]
    pub key_type: i32,
    #[serde(rename = "TRACK")]
    pub tracks: Vec<NodeTrack>,
    #[serde(rename = "NODE")]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeTrack {
    #[serde(rename = "@Key")]
    pub key: i64,
}

impl DjPlaylists {
    /// Tracks by ID, each track's marks by type then slot.
    pub fn sort(&mut self) {
        self.collection.tracks.sort_by_key(|t| t.track_id);
        for track in &mut self.collection.tracks {
            track.position_marks.sort_by_key(|m| (m.mark_type, m.num));
        }
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::from(XML_DECLARATION);
        let mut serializer = quick_xml::se::Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;
        xml.push('\n');
        Ok(xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Parse the document at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let xml = fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    /// Write to a sibling temp file and rename over `path`, so a failed
    /// write never leaves a half-written library behind.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let xml = self.to_xml()?;

        let temp_path = path.with_extension("xml.tmp");
        fs::write(&temp_path, xml).map_err(Error::from)?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::from(e)
        })?;
        Ok(())
    }
}

/// Export `library` as a Rekordbox XML document at `path`.
pub fn export<P: AsRef<Path>>(library: &Library, path: P, options: &ExportOptions) -> Result<()> {
    let path = path.as_ref();
    let mut document = export::to_document(library, options)?;
    document.sort();
    document.write(path)?;

    info!(
        "Wrote {} tracks and {} playlists to {}",
        document.collection.entries,
        library.playlist_count(),
        path.display()
    );
    Ok(())
}

/// Import the Rekordbox XML document at `path`. Tracks without a tempo are
/// dropped as corrupt.
pub fn import<P: AsRef<Path>>(path: P, options: &ImportOptions) -> Result<Library> {
    let path = path.as_ref();
    let document = DjPlaylists::read(path)?;
    let mut library = import::from_document(&document, options)?;
    library.remove_corrupt_songs();

    info!(
        "Read {} songs and {} playlists from {}",
        library.songs.len(),
        library.playlist_count(),
        path.display()
    );
    Ok(library)
}
