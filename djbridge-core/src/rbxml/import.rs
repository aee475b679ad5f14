use tracing::debug;

use super::{mark_type, DjPlaylists, ImportOptions, Node, PositionMark, Track, MAIN_CUE_NUM};
use crate::convert::{hex_to_rgb, key_from_camelot, rating_import, rgb_to_hex, unix_from_date, uri_to_path};
use crate::error::{Error, Result};
use crate::library::{HotCue, Library, Loop, Marker, Playlist, Song};

/// Convert a parsed document. Corrupt songs are flagged, not removed.
pub(super) fn from_document(document: &DjPlaylists, options: &ImportOptions) -> Result<Library> {
    let songs = document
        .collection
        .tracks
        .iter()
        .map(|track| to_song(track, options).map_err(|e| e.for_song(track.track_id)))
        .collect::<Result<Vec<_>>>()?;

    let mut next_id = 1;
    let (playlists, _) = to_playlists(&document.playlists.root.nodes, &mut next_id);

    Ok(Library { songs, playlists })
}

fn to_song(track: &Track, options: &ImportOptions) -> Result<Song> {
    let use_utc = options.use_utc;

    let mut song = Song {
        id: track.track_id,
        title: track.name.clone(),
        artist: track.artist.clone(),
        composer: track.composer.clone(),
        album: track.album.clone(),
        grouping: track.grouping.clone(),
        genre: track.genre.clone(),
        filetype: track.kind.clone(),
        size: track.size,
        length: track.total_time,
        track_number: track.track_number,
        year: track.year,
        bpm: track.average_bpm,
        date_modified: unix_from_date(&track.date_modified, use_utc)?,
        date_added: unix_from_date(&track.date_added, use_utc)?,
        bitrate: track.bit_rate,
        sample_rate: track.sample_rate,
        comment: track.comments.clone(),
        play_count: track.play_count,
        last_played: unix_from_date(&track.last_played, use_utc)?,
        rating: rating_import(track.rating)?,
        path: if track.location.is_empty() {
            String::new()
        } else {
            uri_to_path(&track.location)?
        },
        remixer: track.remixer.clone(),
        key: if track.tonality.is_empty() {
            0
        } else {
            key_from_camelot(&track.tonality)?
        },
        label: track.label.clone(),
        mix: track.mix.clone(),
        color: from_colour(&track.colour)?,
        corrupt: track.average_bpm == 0.0,
        ..Default::default()
    };

    song.grid = track
        .tempo
        .iter()
        .map(|tempo| {
            let beat_number = u8::try_from(tempo.battito - 1)
                .map_err(|_| Error::OutOfRange(format!("Battito {}", tempo.battito)))?;
            Ok(Marker {
                start_position: tempo.inizio,
                bpm: tempo.bpm,
                beat_number,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut main_cue_set = false;
    for mark in &track.position_marks {
        match (mark.mark_type, mark.num) {
            (mark_type::CUE, MAIN_CUE_NUM) if main_cue_set => {
                debug!("Track {} keeps its first memory cue, dropping {}", track.track_id, mark.start);
            }
            (mark_type::CUE, MAIN_CUE_NUM) => {
                song.cue = mark.start;
                main_cue_set = true;
            }
            (mark_type::LOOP, MAIN_CUE_NUM) => {
                debug!("Track {} memory loop at {} has no pad slot", track.track_id, mark.start);
            }
            (mark_type::CUE, num) => song.cues.push(HotCue {
                name: mark.name.clone(),
                offset: mark.start,
                position: slot(num)?,
                color: mark_color(mark)?,
            }),
            (mark_type::LOOP, num) => song.loops.push(Loop {
                name: mark.name.clone(),
                start: mark.start,
                end: mark.end.unwrap_or(mark.start),
                position: slot(num)?,
                color: mark_color(mark)?,
            }),
            (other, num) => {
                debug!("Track {} skips position mark type {} num {}", track.track_id, other, num);
            }
        }
    }

    Ok(song)
}

/// `0xRRGGBB` to `#RRGGBB`
fn from_colour(colour: &str) -> Result<String> {
    if colour.is_empty() {
        return Ok(String::new());
    }
    let digits = colour
        .strip_prefix("0x")
        .or_else(|| colour.strip_prefix("0X"))
        .ok_or_else(|| Error::Parse(format!("colour '{}' is not 0xRRGGBB", colour)))?;
    let (red, green, blue) = hex_to_rgb(&format!("#{}", digits))?;
    rgb_to_hex(red.into(), green.into(), blue.into())
}

fn mark_color(mark: &PositionMark) -> Result<String> {
    match (mark.red, mark.green, mark.blue) {
        (Some(red), Some(green), Some(blue)) => rgb_to_hex(red.into(), green.into(), blue.into()),
        _ => Ok(String::new()),
    }
}

/// 0-indexed `Num` to 1-indexed pad slot
fn slot(num: i32) -> Result<u8> {
    u8::try_from(num + 1)
        .ok()
        .filter(|position| (1..=8).contains(position))
        .ok_or_else(|| Error::OutOfRange(format!("position mark Num {}", num)))
}

/// Playlists get IDs in document order. A node's songs are its own tracks
/// followed by the songs of its child nodes. Returns the playlists and all
/// their songs.
fn to_playlists(nodes: &[Node], next_id: &mut i64) -> (Vec<Playlist>, Vec<i64>) {
    let mut playlists = Vec::with_capacity(nodes.len());
    let mut all_songs = Vec::new();

    for node in nodes {
        let id = *next_id;
        *next_id += 1;

        let mut songs: Vec<i64> = node.tracks.iter().map(|t| t.key).collect();
        let (sub_playlists, sub_songs) = to_playlists(&node.nodes, next_id);
        songs.extend(sub_songs);
        all_songs.extend_from_slice(&songs);

        playlists.push(Playlist {
            id,
            name: node.name.clone(),
            songs,
            sub_playlists,
        });
    }

    (playlists, all_songs)
}
