//! Engine rows to [`Library`]
//!
//! Stages run in a fixed order over one owned library value:
//! songs, performance data, history, playlists, smartlists, then the
//! corruption sweep. Performance data problems only flag the song; every
//! other error aborts the import.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::beatgrid::BeatData;
use super::blob::decompress;
use super::cues::QuickCues;
use super::loops::Loops;
use super::playlist::{build_tree, order_smartlists};
use super::{EngineRows, HistoryRow, ImportOptions, PerformanceDataRow, SmartlistRow, SongRow};
use crate::convert::{camelot_from_key, check_rating};
use crate::error::{Error, Result};
use crate::library::{HotCue, Library, Loop, Marker, Playlist, Song};

pub fn assemble(rows: EngineRows, library_root: &Path, options: &ImportOptions) -> Result<Library> {
    let mut library = Library {
        songs: convert_songs(&rows.songs, library_root, options)?,
        playlists: Vec::new(),
    };

    apply_performance_data(&mut library.songs, &rows.performance_data, options);
    apply_history(&mut library.songs, &rows.history)?;
    library.playlists = build_tree(&rows.playlists, &rows.playlist_entities)?;
    check_playlist_songs(&library)?;
    report_smartlists(&rows.smartlists);
    library.remove_corrupt_songs();

    Ok(library)
}

fn convert_songs(rows: &[SongRow], library_root: &Path, options: &ImportOptions) -> Result<Vec<Song>> {
    let songs = rows
        .iter()
        .map(|row| {
            let id = row
                .id
                .ok_or_else(|| Error::Parse(format!("track row {:?} has no id", row.title)))?;
            convert_song(id, row, library_root, options).map_err(|e| e.for_song(id))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Converted {} songs", songs.len());
    Ok(songs)
}

fn convert_song(id: i64, row: &SongRow, library_root: &Path, options: &ImportOptions) -> Result<Song> {
    let key = match row.key {
        Some(key) => {
            camelot_from_key(key)?;
            key as u8
        }
        None => 0,
    };
    let rating = check_rating(row.rating.unwrap_or(0))?;

    let raw_path = row.path.clone().unwrap_or_default();
    let path = if options.preserve_original_paths || raw_path.is_empty() {
        raw_path
    } else {
        resolve_path(library_root, &raw_path)
    };

    Ok(Song {
        id,
        title: text(&row.title),
        artist: text(&row.artist),
        composer: text(&row.composer),
        album: text(&row.album),
        genre: text(&row.genre),
        filetype: text(&row.file_type).to_lowercase(),
        size: row.file_bytes.unwrap_or(0),
        length: row.length.unwrap_or(0.0),
        year: narrow(row.year, "year")?,
        bpm: row.bpm.unwrap_or(0.0),
        date_added: row.date_added.unwrap_or(0),
        date_modified: row.last_edit_time.unwrap_or(0),
        bitrate: narrow(row.bitrate, "bitrate")?,
        comment: text(&row.comment),
        rating,
        path,
        remixer: text(&row.remixer),
        key,
        label: text(&row.label),
        ..Default::default()
    })
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn narrow(value: Option<i64>, field: &str) -> Result<i32> {
    i32::try_from(value.unwrap_or(0))
        .map_err(|_| Error::OutOfRange(format!("{} {:?}", field, value)))
}

/// Join a library-relative path onto the library root and fold `.`/`..`
/// without touching the filesystem.
fn resolve_path(library_root: &Path, relative: &str) -> String {
    let mut resolved = PathBuf::new();
    for component in library_root.join(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(resolved.components().next_back(), Some(Component::Normal(_))) {
                    resolved.pop();
                } else {
                    resolved.push(component);
                }
            }
            other => resolved.push(other),
        }
    }
    resolved.to_string_lossy().into_owned()
}

/// Decoded performance data in the units of the neutral model
struct Performance {
    sample_rate: f64,
    cue: f64,
    grid: Vec<Marker>,
    cues: Vec<HotCue>,
    loops: Vec<Loop>,
}

fn decode_performance(row: &PerformanceDataRow, options: &ImportOptions) -> Result<Performance> {
    let beat_blob = row
        .beat_data
        .as_deref()
        .ok_or_else(|| Error::NotFound("beatgrid blob".into()))?;
    let beat_data = BeatData::decode(&decompress(beat_blob)?)?;
    let sample_rate = beat_data.sample_rate;
    let grid = beat_data.markers(options.import_original_grids)?;

    let (cue, cues) = match row.quick_cues.as_deref() {
        Some(blob) => {
            let quick_cues = QuickCues::decode(&decompress(blob)?)?;
            (
                quick_cues.main_cue(sample_rate, options.import_original_cues),
                quick_cues.hot_cues(sample_rate)?,
            )
        }
        None => (0.0, Vec::new()),
    };

    let loops = match row.loops.as_deref() {
        Some(blob) => Loops::decode(&decompress(blob)?)?.loops(sample_rate)?,
        None => Vec::new(),
    };

    Ok(Performance {
        sample_rate,
        cue,
        grid,
        cues,
        loops,
    })
}

fn apply_performance_data(songs: &mut [Song], rows: &[PerformanceDataRow], options: &ImportOptions) {
    let index: HashMap<i64, usize> = songs.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
    let mut has_data = vec![false; songs.len()];

    for row in rows {
        let Some(&i) = row.track_id.and_then(|id| index.get(&id)) else {
            debug!("Ignoring performance data for unknown track {:?}", row.track_id);
            continue;
        };
        has_data[i] = true;
        let song = &mut songs[i];

        match decode_performance(row, options) {
            Ok(performance) => {
                song.sample_rate = performance.sample_rate;
                song.cue = performance.cue;
                song.grid = performance.grid;
                song.cues = performance.cues;
                song.loops = performance.loops;
            }
            Err(e) => {
                warn!("Song {} has unusable performance data: {}", song.id, e);
                song.corrupt = true;
            }
        }
    }

    for (song, found) in songs.iter_mut().zip(has_data) {
        if !found {
            warn!("Song {} has no performance data", song.id);
            song.corrupt = true;
        }
    }
}

fn apply_history(songs: &mut [Song], rows: &[HistoryRow]) -> Result<()> {
    let index: HashMap<i64, usize> = songs.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

    let mut applied = 0;
    for row in rows {
        let Some(&i) = row.track_id.and_then(|id| index.get(&id)) else {
            continue;
        };
        let song = &mut songs[i];
        if song.corrupt {
            continue;
        }
        song.play_count = narrow(row.play_count, "play count").map_err(|e| e.for_song(song.id))?;
        song.last_played = row.last_played.unwrap_or(0);
        applied += 1;
    }

    debug!("Applied play history to {} songs", applied);
    Ok(())
}

/// Every playlist entry must name a converted track.
fn check_playlist_songs(library: &Library) -> Result<()> {
    let ids: HashSet<i64> = library.songs.iter().map(|s| s.id).collect();
    check_playlists(&library.playlists, &ids)
}

fn check_playlists(playlists: &[Playlist], ids: &HashSet<i64>) -> Result<()> {
    for playlist in playlists {
        if let Some(missing) = playlist.own_songs().iter().find(|&&id| !ids.contains(&id)) {
            return Err(Error::NotFound(format!("track {}", missing)).for_playlist(playlist.id));
        }
        check_playlists(&playlist.sub_playlists, ids)?;
    }
    Ok(())
}

fn report_smartlists(rows: &[SmartlistRow]) {
    if rows.is_empty() {
        return;
    }
    match order_smartlists(rows) {
        Ok(ordered) => {
            info!("Skipping {} smartlists, rules are not converted", ordered.len());
            for smartlist in ordered {
                debug!("Smartlist {:?}", smartlist.title);
            }
        }
        Err(e) => warn!("Could not order smartlists: {}", e),
    }
}
