//! Row extraction from the Engine database pair

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, info};

use super::{
    EngineRows, HistoryRow, PerformanceDataRow, PlaylistEntityRow, PlaylistRow, SmartlistRow, SongRow,
};
use crate::error::{Error, Result};

const TRACK_QUERY: &str = "SELECT id, title, artist, composer, album, genre, fileType, fileBytes, \
     length, year, bpm, dateAdded, bitrate, comment, rating, path, remixer, key, label, lastEditTime \
     FROM Track ORDER BY id";

const HISTORY_QUERY: &str = "SELECT Track.originTrackId, COUNT(HistorylistEntity.trackId), \
     MAX(HistorylistEntity.startTime) \
     FROM Track JOIN HistorylistEntity ON Track.id = HistorylistEntity.trackId \
     GROUP BY Track.originTrackId ORDER BY Track.originTrackId";

const PERFORMANCE_DATA_QUERY: &str =
    "SELECT trackId, beatData, quickCues, loops FROM PerformanceData ORDER BY trackId";

const PLAYLIST_QUERY: &str =
    "SELECT id, title, parentListId, nextListId FROM Playlist ORDER BY id";

const PLAYLIST_ENTITY_QUERY: &str =
    "SELECT id, listId, trackId, nextEntityId FROM PlaylistEntity ORDER BY listId, id";

const SMARTLIST_QUERY: &str = "SELECT listUuid, title, parentPlaylistPath, nextPlaylistPath, \
     nextListUuid, rules FROM Smartlist ORDER BY listUuid";

/// `Database2/m.db` and `Database2/hm.db` under a library directory
pub fn database_paths(dir: &Path) -> (PathBuf, PathBuf) {
    let database = dir.join("Database2");
    (database.join("m.db"), database.join("hm.db"))
}

fn open(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("Engine database {}", path.display())));
    }
    debug!("Opening {}", path.display());
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

fn query_rows<T, F>(conn: &Connection, query: &str, map: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}

/// Read every row the import needs from the library in `dir`.
pub fn extract(dir: &Path) -> Result<EngineRows> {
    let (m_path, hm_path) = database_paths(dir);
    let m = open(&m_path)?;
    let hm = open(&hm_path)?;

    let rows = EngineRows {
        songs: query_rows(&m, TRACK_QUERY, song_row)?,
        performance_data: query_rows(&m, PERFORMANCE_DATA_QUERY, |row| {
            Ok(PerformanceDataRow {
                track_id: row.get(0)?,
                beat_data: row.get(1)?,
                quick_cues: row.get(2)?,
                loops: row.get(3)?,
            })
        })?,
        history: query_rows(&hm, HISTORY_QUERY, |row| {
            Ok(HistoryRow {
                track_id: row.get(0)?,
                play_count: row.get(1)?,
                last_played: row.get(2)?,
            })
        })?,
        playlists: query_rows(&m, PLAYLIST_QUERY, |row| {
            Ok(PlaylistRow {
                id: row.get(0)?,
                title: row.get(1)?,
                parent_list_id: row.get(2)?,
                next_list_id: row.get(3)?,
            })
        })?,
        playlist_entities: query_rows(&m, PLAYLIST_ENTITY_QUERY, |row| {
            Ok(PlaylistEntityRow {
                id: row.get(0)?,
                list_id: row.get(1)?,
                track_id: row.get(2)?,
                next_entity_id: row.get(3)?,
            })
        })?,
        smartlists: query_rows(&m, SMARTLIST_QUERY, |row| {
            Ok(SmartlistRow {
                list_uuid: row.get(0)?,
                title: row.get(1)?,
                parent_playlist_path: row.get(2)?,
                next_playlist_path: row.get(3)?,
                next_list_uuid: row.get(4)?,
                rules: row.get(5)?,
            })
        })?,
    };

    info!(
        "Extracted {} tracks, {} performance rows, {} playlists, {} entries, {} smartlists",
        rows.songs.len(),
        rows.performance_data.len(),
        rows.playlists.len(),
        rows.playlist_entities.len(),
        rows.smartlists.len()
    );
    Ok(rows)
}

fn song_row(row: &Row<'_>) -> rusqlite::Result<SongRow> {
    Ok(SongRow {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        composer: row.get(3)?,
        album: row.get(4)?,
        genre: row.get(5)?,
        file_type: row.get(6)?,
        file_bytes: row.get(7)?,
        length: row.get(8)?,
        year: row.get(9)?,
        bpm: row.get(10)?,
        date_added: row.get(11)?,
        bitrate: row.get(12)?,
        comment: row.get(13)?,
        rating: row.get(14)?,
        path: row.get(15)?,
        remixer: row.get(16)?,
        key: row.get(17)?,
        label: row.get(18)?,
        last_edit_time: row.get(19)?,
    })
}
