//! Neutral library model
//!
//! Every importer produces a [`Library`] and every exporter consumes one.
//! Nothing in here knows about a particular DJ package; nullable source columns
//! are resolved to defaults before they reach these types.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// A marker in a beatgrid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Marker {
    /// Start position in seconds
    pub start_position: f64,
    /// Tempo from this marker up to the next one
    pub bpm: f64,
    /// Beat in the bar this marker lands on, 0-indexed, 4/4 assumed
    pub beat_number: u8,
}

/// A saved hot cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HotCue {
    pub name: String,
    /// Offset in seconds
    pub offset: f64,
    /// Pad slot, 1-indexed (1..=8)
    pub position: u8,
    /// `#RRGGBB`
    pub color: String,
}

/// A saved loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Loop {
    pub name: String,
    /// Loop start in seconds
    pub start: f64,
    /// Loop end in seconds
    pub end: f64,
    /// Pad slot, 1-indexed (1..=8)
    pub position: u8,
    /// `#RRGGBB`
    pub color: String,
}

/// Metadata, analysis and saved performance data for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub composer: String,
    pub album: String,
    pub grouping: String,
    pub genre: String,
    /// Lowercase extension, e.g. `mp3`
    pub filetype: String,
    /// File size in bytes
    pub size: i64,
    /// Length in seconds
    pub length: f64,
    pub track_number: i32,
    pub year: i32,
    pub bpm: f64,
    /// Unix seconds
    pub date_modified: i64,
    /// Unix seconds
    pub date_added: i64,
    /// kbps
    pub bitrate: i32,
    /// Hz
    pub sample_rate: f64,
    pub comment: String,
    pub play_count: i32,
    /// Unix seconds, 0 if never played
    pub last_played: i64,
    /// One of 0, 20, 40, 60, 80, 100
    pub rating: u8,
    pub path: String,
    pub remixer: String,
    /// Camelot index 0..=23: 0=8B, 1=8A, 2=9B ... 23=7A
    pub key: u8,
    pub label: String,
    pub mix: String,
    /// `#RRGGBB`, empty if unset
    pub color: String,
    /// Main cue point in seconds
    pub cue: f64,
    /// Ordered by start position
    pub grid: Vec<Marker>,
    pub cues: Vec<HotCue>,
    pub loops: Vec<Loop>,
    /// Set when the source data for this song could not be trusted.
    /// Corrupt songs never survive [`Library::remove_corrupt_songs`].
    pub corrupt: bool,
}

/// An ordered set of songs that may contain other playlists.
///
/// `songs` holds the playlist's own songs followed by the songs of every
/// descendant, in child traversal order. A folder is a playlist whose own
/// song list is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub songs: Vec<i64>,
    pub sub_playlists: Vec<Playlist>,
}

impl Playlist {
    /// Total number of songs contributed by the sub-playlists.
    fn descendant_song_count(&self) -> usize {
        self.sub_playlists.iter().map(|p| p.songs.len()).sum()
    }

    /// The songs that belong to this playlist directly, without the songs
    /// inherited from sub-playlists.
    pub fn own_songs(&self) -> &[i64] {
        let inherited = self.descendant_song_count();
        if inherited > self.songs.len() {
            return &self.songs;
        }
        &self.songs[..self.songs.len() - inherited]
    }

    /// Number of playlists in this subtree, including this one.
    pub fn tree_size(&self) -> usize {
        1 + self.sub_playlists.iter().map(Playlist::tree_size).sum::<usize>()
    }
}

/// An entire DJ library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Library {
    /// Unordered, IDs unique
    pub songs: Vec<Song>,
    /// Root playlists, ordered
    pub playlists: Vec<Playlist>,
}

impl Library {
    /// Orders songs by ID and each song's cues and loops by position.
    /// Songs carry no inherent order, so this gives comparisons and
    /// serialised output a stable shape.
    pub fn sort_songs(&mut self) {
        self.songs.sort_by_key(|s| s.id);
        for song in &mut self.songs {
            song.cues.sort_by_key(|c| c.position);
            song.loops.sort_by_key(|l| l.position);
        }
    }

    /// Removes every song flagged corrupt, from the song set and from every
    /// playlist in the tree. Playlists keep the relative order of the songs
    /// that remain.
    pub fn remove_corrupt_songs(&mut self) -> usize {
        let corrupt: HashSet<i64> = self
            .songs
            .iter()
            .filter(|s| s.corrupt)
            .map(|s| s.id)
            .collect();

        if corrupt.is_empty() {
            return 0;
        }

        self.songs.retain(|s| !s.corrupt);
        prune_playlists(&mut self.playlists, &corrupt);

        info!("Removed {} corrupt songs", corrupt.len());
        corrupt.len()
    }

    pub fn song(&self, id: i64) -> Option<&Song> {
        self.songs.iter().find(|s| s.id == id)
    }

    /// Number of playlists in the whole forest.
    pub fn playlist_count(&self) -> usize {
        self.playlists.iter().map(Playlist::tree_size).sum()
    }

    /// Save as pretty-printed JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a library previously written by [`Library::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn prune_playlists(playlists: &mut [Playlist], removed: &HashSet<i64>) {
    for playlist in playlists {
        playlist.songs.retain(|id| !removed.contains(id));
        prune_playlists(&mut playlist.sub_playlists, removed);
    }
}
