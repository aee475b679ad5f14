//! Serato crate files
//!
//! A crate is a flat sequence of tagged records:
//!
//! | Size | Field |
//! |---|---|
//! | 4 | ASCII key |
//! | 4 | value length, **big-endian** u32 |
//! | n | value |
//!
//! `otrk` values nest further records (one track each), `vrsn` and `ptrk`
//! values are **UTF-16BE** text. Column and sort settings use keys starting
//! with `o`, `t`, `p`, `u`, `s` or `b` and are skipped.
//!
//! Cues, loops and beatgrids live in the audio files themselves, see
//! [`geob`].

pub mod geob;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::library::{Library, Playlist, Song};

const BLOB: &str = "crate";
const RECORD_HEADER_LEN: usize = 8;
const SKIPPED_KEY_PREFIXES: &[u8] = b"otpusb";

/// Version string Serato writes into new crates
pub const DEFAULT_VERSION: &str = "1.0/Serato ScratchLive Crate";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Crate {
    /// File stem of the crate file
    pub name: String,
    pub version: String,
    /// Track paths as stored, without a leading separator
    pub paths: Vec<String>,
}

impl Crate {
    /// Parse crate file contents.
    pub fn parse(name: &str, data: &[u8]) -> Result<Self> {
        let mut krate = Crate {
            name: name.to_string(),
            ..Default::default()
        };
        krate.read_records(data, 0)?;
        Ok(krate)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name, &fs::read(path)?)
    }

    /// `base` is the offset of `data` in the file, for error reporting.
    fn read_records(&mut self, data: &[u8], base: usize) -> Result<()> {
        let mut pos = 0;
        while pos < data.len() {
            let offset = base + pos;
            let header = data.get(pos..pos + RECORD_HEADER_LEN).ok_or(Error::TruncatedInput {
                blob: BLOB,
                offset,
                needed: RECORD_HEADER_LEN,
                available: data.len() - pos,
            })?;
            let key = &header[..4];
            let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
            pos += RECORD_HEADER_LEN;

            let value = data.get(pos..pos + length).ok_or(Error::TruncatedInput {
                blob: BLOB,
                offset: base + pos,
                needed: length,
                available: data.len() - pos,
            })?;

            match key {
                b"otrk" => self.read_records(value, base + pos)?,
                b"vrsn" => self.version = utf16_to_string(value, base + pos)?,
                b"ptrk" => self.paths.push(utf16_to_string(value, base + pos)?),
                _ if SKIPPED_KEY_PREFIXES.contains(&key[0]) => {
                    debug!("Skipping crate record {}", String::from_utf8_lossy(key));
                }
                _ => {
                    return Err(Error::UnsupportedKey {
                        key: String::from_utf8_lossy(key).into_owned(),
                        offset,
                    })
                }
            }
            pos += length;
        }
        Ok(())
    }

    /// Serialise as a crate file holding the version and one `otrk` per path.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let version = if self.version.is_empty() {
            DEFAULT_VERSION
        } else {
            &self.version
        };
        write_record(&mut data, b"vrsn", &string_to_utf16(version))?;

        for path in &self.paths {
            let mut track = Vec::new();
            write_record(&mut track, b"ptrk", &string_to_utf16(path))?;
            write_record(&mut data, b"otrk", &track)?;
        }
        Ok(data)
    }
}

fn write_record(buffer: &mut Vec<u8>, key: &[u8; 4], value: &[u8]) -> Result<()> {
    let length = u32::try_from(value.len())
        .map_err(|_| Error::OutOfRange(format!("crate record of {} bytes", value.len())))?;
    buffer.extend_from_slice(key);
    buffer.extend_from_slice(&length.to_be_bytes());
    buffer.extend_from_slice(value);
    Ok(())
}

fn utf16_to_string(data: &[u8], offset: usize) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(Error::Parse(format!(
            "UTF-16 text at byte {} has odd length {}",
            offset,
            data.len()
        )));
    }
    let units = data.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Parse(format!("UTF-16 text at byte {}: {}", offset, e)))
}

fn string_to_utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

/// Crate files in `<dir>/Subcrates`, sorted by file name.
pub fn list_crate_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let subcrates = dir.as_ref().join("Subcrates");
    if !subcrates.is_dir() {
        return Err(Error::NotFound(format!("crate folder {}", subcrates.display())));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&subcrates)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "crate") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Import the Serato folder `dir` (usually `_Serato_`).
///
/// Each crate becomes a root playlist, ordered by crate name. Each distinct
/// track path becomes a song; IDs follow first appearance. Songs whose
/// Serato tags cannot be decoded are dropped.
pub fn import<P: AsRef<Path>>(dir: P) -> Result<Library> {
    let mut crates = list_crate_files(&dir)?
        .iter()
        .map(Crate::read)
        .collect::<Result<Vec<_>>>()?;
    crates.sort_by(|a, b| a.name.cmp(&b.name));

    let mut library = Library::default();
    let mut ids: HashMap<String, i64> = HashMap::new();

    for (index, krate) in crates.iter().enumerate() {
        let mut songs = Vec::with_capacity(krate.paths.len());
        for stored in &krate.paths {
            let path = absolute_path(stored);
            let id = match ids.get(&path) {
                Some(&id) => id,
                None => {
                    let id = library.songs.len() as i64 + 1;
                    let mut song = song_from_path(id, &path);
                    read_performance(&mut song);
                    library.songs.push(song);
                    ids.insert(path, id);
                    id
                }
            };
            songs.push(id);
        }

        library.playlists.push(Playlist {
            id: index as i64 + 1,
            name: krate.name.clone(),
            songs,
            sub_playlists: Vec::new(),
        });
    }
    library.remove_corrupt_songs();

    info!(
        "Imported {} crates with {} songs",
        library.playlists.len(),
        library.songs.len()
    );
    Ok(library)
}

/// Cues, loops and grid from the file's GEOB frames. Files that are not on
/// this machine keep none.
fn read_performance(song: &mut Song) {
    let path = PathBuf::from(&song.path);
    if !path.is_file() {
        debug!("{} not found, importing without performance data", path.display());
        return;
    }
    if let Err(e) = geob::read_geobs(&path).and_then(|geobs| geob::apply(song, &geobs)) {
        warn!("Song {} has unreadable Serato tags: {}", song.id, e);
        song.corrupt = true;
    }
}

/// Crates store paths relative to the volume root.
fn absolute_path(stored: &str) -> String {
    if stored.starts_with('/') {
        stored.to_string()
    } else {
        format!("/{}", stored)
    }
}

fn song_from_path(id: i64, path: &str) -> Song {
    let file = Path::new(path);
    Song {
        id,
        title: file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        filetype: file
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
        path: path.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(key: &[u8; 4], value: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        write_record(&mut data, key, value).unwrap();
        data
    }

    fn track(path: &str) -> Vec<u8> {
        record(b"otrk", &record(b"ptrk", &string_to_utf16(path)))
    }

    #[test]
    fn test_parse_crate() {
        let mut data = record(b"vrsn", &string_to_utf16(DEFAULT_VERSION));
        data.extend(record(b"osrt", &record(b"tvcn", &string_to_utf16("song"))));
        data.extend(record(b"ovct", &record(b"tvcw", &string_to_utf16("0"))));
        data.extend(track("Users/dj/Music/one.mp3"));
        data.extend(track("Users/dj/Music/ünï.flac"));

        let krate = Crate::parse("House", &data).unwrap();
        assert_eq!(krate.version, DEFAULT_VERSION);
        assert_eq!(
            krate.paths,
            vec!["Users/dj/Music/one.mp3", "Users/dj/Music/ünï.flac"]
        );

        // column settings are not written back
        let mut expected = record(b"vrsn", &string_to_utf16(DEFAULT_VERSION));
        expected.extend(track("Users/dj/Music/one.mp3"));
        expected.extend(track("Users/dj/Music/ünï.flac"));
        assert_eq!(krate.to_bytes().unwrap(), expected);
    }

    #[test]
    fn test_roundtrip() {
        let krate = Crate {
            name: "Techno".into(),
            version: DEFAULT_VERSION.into(),
            paths: vec!["a/b.mp3".into(), "c.wav".into()],
        };
        assert_eq!(Crate::parse("Techno", &krate.to_bytes().unwrap()).unwrap(), krate);
    }

    #[test]
    fn test_unsupported_key() {
        let mut data = record(b"vrsn", &string_to_utf16("1.0"));
        let offset = data.len();
        data.extend(record(b"zzzz", &[1, 2]));

        match Crate::parse("x", &data) {
            Err(Error::UnsupportedKey { key, offset: at }) => {
                assert_eq!(key, "zzzz");
                assert_eq!(at, offset);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncated_records() {
        assert!(matches!(
            Crate::parse("x", b"vrs"),
            Err(Error::TruncatedInput { offset: 0, needed: 8, .. })
        ));

        let mut data = record(b"vrsn", &string_to_utf16("1.0"));
        data.truncate(data.len() - 1);
        assert!(matches!(
            Crate::parse("x", &data),
            Err(Error::TruncatedInput { offset: 8, needed: 6, available: 5, .. })
        ));
    }

    #[test]
    fn test_odd_utf16() {
        let data = record(b"ptrk", &[0, 65, 0]);
        assert!(matches!(Crate::parse("x", &data), Err(Error::Parse(_))));
    }

    #[test]
    fn test_import_folder() {
        let tmp = TempDir::new().unwrap();
        let subcrates = tmp.path().join("Subcrates");
        fs::create_dir(&subcrates).unwrap();

        let write = |name: &str, paths: &[&str]| {
            let krate = Crate {
                name: name.into(),
                version: DEFAULT_VERSION.into(),
                paths: paths.iter().map(|p| p.to_string()).collect(),
            };
            fs::write(subcrates.join(format!("{}.crate", name)), krate.to_bytes().unwrap()).unwrap();
        };
        write("b-side", &["music/two.MP3", "music/one.mp3"]);
        write("a-side", &["music/one.mp3"]);
        fs::write(subcrates.join("notes.txt"), "not a crate").unwrap();

        let files = list_crate_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);

        let library = import(tmp.path()).unwrap();
        let names: Vec<&str> = library.playlists.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a-side", "b-side"]);
        assert_eq!(library.playlists[0].songs, vec![1]);
        assert_eq!(library.playlists[1].songs, vec![2, 1]);

        let song = library.song(2).unwrap();
        assert_eq!(song.path, "/music/two.MP3");
        assert_eq!(song.title, "two");
        assert_eq!(song.filetype, "mp3");
    }

    #[test]
    fn test_import_local_files() {
        let tmp = TempDir::new().unwrap();
        let subcrates = tmp.path().join("Subcrates");
        fs::create_dir(&subcrates).unwrap();
        let wav = tmp.path().join("take.wav");
        fs::write(&wav, b"RIFF").unwrap();
        let broken = tmp.path().join("broken.mp3");
        fs::write(&broken, b"not an mpeg stream").unwrap();

        let krate = Crate {
            name: "local".into(),
            version: DEFAULT_VERSION.into(),
            paths: vec![
                wav.to_string_lossy().into_owned(),
                broken.to_string_lossy().into_owned(),
            ],
        };
        fs::write(subcrates.join("local.crate"), krate.to_bytes().unwrap()).unwrap();

        let library = import(tmp.path()).unwrap();
        assert_eq!(library.songs.len(), 1);
        assert_eq!(library.songs[0].title, "take");
        assert!(library.songs[0].cues.is_empty());
        assert_eq!(library.playlists[0].songs, vec![1]);
    }

    #[test]
    fn test_missing_subcrates() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(list_crate_files(tmp.path()), Err(Error::NotFound(_))));
    }
}
