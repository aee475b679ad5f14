use std::path::Path;

use djbridge_core::engine::{self, ImportOptions};
use djbridge_core::rbxml;
use djbridge_core::Library;
use rusqlite::{params, Connection};
use tempfile::TempDir;

/// Compressed beatgrid of a 145 bpm track analysed at 44.1 kHz
const BEAT_DATA_BLOB: [u8; 66] = [
    0, 0, 0, 138, 120, 156, 115, 120, 218, 209, 192, 0, 4, 142, 81, 231, 189, 29, 128, 52, 35, 3, 4,
    48, 73, 37, 238, 92, 46, 120, 233, 227, 129, 63, 255, 33, 160, 13, 36, 147, 192, 192, 144, 217,
    242, 116, 222, 190, 123, 81, 142, 77, 48, 149, 72, 154, 40, 208, 199, 192, 0, 0, 75, 220, 41, 20,
];

const M_SCHEMA: &str = "
    CREATE TABLE Track (
        id INTEGER PRIMARY KEY, title TEXT, artist TEXT, composer TEXT, album TEXT, genre TEXT,
        fileType TEXT, fileBytes INTEGER, length REAL, year INTEGER, bpm REAL, dateAdded INTEGER,
        bitrate INTEGER, comment TEXT, rating INTEGER, path TEXT, remixer TEXT, key INTEGER,
        label TEXT, lastEditTime INTEGER
    );
    CREATE TABLE PerformanceData (trackId INTEGER, beatData BLOB, quickCues BLOB, loops BLOB);
    CREATE TABLE Playlist (id INTEGER, title TEXT, parentListId INTEGER, nextListId INTEGER);
    CREATE TABLE PlaylistEntity (id INTEGER, listId INTEGER, trackId INTEGER, nextEntityId INTEGER);
    CREATE TABLE Smartlist (
        listUuid TEXT, title TEXT, parentPlaylistPath TEXT, nextPlaylistPath TEXT,
        nextListUuid TEXT, rules TEXT
    );
";

const HM_SCHEMA: &str = "
    CREATE TABLE Track (id INTEGER PRIMARY KEY, originTrackId INTEGER);
    CREATE TABLE HistorylistEntity (trackId INTEGER, startTime INTEGER);
";

fn create_library(root: &Path) {
    let database = root.join("Database2");
    std::fs::create_dir(&database).unwrap();

    let m = Connection::open(database.join("m.db")).unwrap();
    m.execute_batch(M_SCHEMA).unwrap();
    for id in 1..=3_i64 {
        m.execute(
            "INSERT INTO Track (id, title, artist, fileType, fileBytes, length, year, bpm, \
             dateAdded, bitrate, rating, path, key, lastEditTime) \
             VALUES (?1, ?2, 'Artist', 'MP3', 1000, 180.5, 2020, 145.0, 1600000000, 320, 80, ?3, 5, 1600000100)",
            params![id, format!("Track {}", id), format!("../Music/track{}.mp3", id)],
        )
        .unwrap();
    }

    for id in [1_i64, 3] {
        m.execute(
            "INSERT INTO PerformanceData (trackId, beatData) VALUES (?1, ?2)",
            params![id, BEAT_DATA_BLOB.to_vec()],
        )
        .unwrap();
    }
    m.execute("INSERT INTO PerformanceData (trackId, beatData) VALUES (2, NULL)", [])
        .unwrap();

    m.execute_batch(
        "INSERT INTO Playlist VALUES (2, 'Warmup', 0, 0);
         INSERT INTO Playlist VALUES (1, 'Peak', 0, 2);
         INSERT INTO Playlist VALUES (3, 'Encore', 1, 0);
         INSERT INTO PlaylistEntity VALUES (10, 1, 3, 11);
         INSERT INTO PlaylistEntity VALUES (11, 1, 2, 12);
         INSERT INTO PlaylistEntity VALUES (12, 1, 1, 0);
         INSERT INTO PlaylistEntity VALUES (20, 2, 1, 0);
         INSERT INTO PlaylistEntity VALUES (30, 3, 2, 0);",
    )
    .unwrap();

    let hm = Connection::open(database.join("hm.db")).unwrap();
    hm.execute_batch(HM_SCHEMA).unwrap();
    hm.execute_batch(
        "INSERT INTO Track VALUES (100, 1);
         INSERT INTO HistorylistEntity VALUES (100, 1700000000);
         INSERT INTO HistorylistEntity VALUES (100, 1700000500);",
    )
    .unwrap();
}

fn import(options: &ImportOptions) -> (TempDir, Library) {
    let tmp = TempDir::new().unwrap();
    create_library(tmp.path());
    let library = engine::import(tmp.path(), options).unwrap();
    (tmp, library)
}

#[test]
fn test_import_sweeps_corrupt_song() {
    let (_tmp, library) = import(&ImportOptions::default());

    let ids: Vec<i64> = library.songs.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 3]);

    let names: Vec<&str> = library.playlists.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Peak", "Warmup"]);

    let peak = &library.playlists[0];
    assert_eq!(peak.songs, vec![3, 1]);
    assert_eq!(peak.sub_playlists[0].name, "Encore");
    assert!(peak.sub_playlists[0].songs.is_empty());
    assert_eq!(library.playlists[1].songs, vec![1]);
}

#[test]
fn test_import_song_fields() {
    let (tmp, library) = import(&ImportOptions::default());
    let song = library.song(1).unwrap();

    assert_eq!(song.title, "Track 1");
    assert_eq!(song.filetype, "mp3");
    assert_eq!(song.rating, 80);
    assert_eq!(song.key, 5);
    assert_eq!(song.sample_rate, 44100.0);
    assert!((song.grid[0].bpm - 145.0).abs() < 1e-9);
    assert!(song.cues.is_empty());
    assert!(song.loops.is_empty());
    assert_eq!(song.play_count, 2);
    assert_eq!(song.last_played, 1_700_000_500);

    let parent = tmp.path().parent().unwrap();
    assert_eq!(
        Path::new(&song.path),
        parent.join("Music").join("track1.mp3").as_path()
    );
}

#[test]
fn test_import_preserves_paths() {
    let options = ImportOptions {
        preserve_original_paths: true,
        ..Default::default()
    };
    let (_tmp, library) = import(&options);
    assert_eq!(library.song(3).unwrap().path, "../Music/track3.mp3");
}

#[test]
fn test_import_then_export_xml() {
    let (tmp, library) = import(&ImportOptions::default());
    let xml = tmp.path().join("rekordbox.xml");

    rbxml::export(&library, &xml, &rbxml::ExportOptions::default()).unwrap();
    let reloaded = rbxml::import(&xml, &rbxml::ImportOptions::default()).unwrap();

    let ids: Vec<i64> = reloaded.songs.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(reloaded.song(1).unwrap().grid, library.song(1).unwrap().grid);
}
