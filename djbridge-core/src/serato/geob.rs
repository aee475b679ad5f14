//! Serato performance data in ID3v2 `GEOB` frames
//!
//! Serato keeps its analysis inside the audio file. Two frames matter:
//!
//! - `Serato Markers2`: base64 text wrapping tagged entries (`COLOR`, `CUE`,
//!   `LOOP`, `BPMLOCK`, ...). Each entry is a NUL-terminated name, a
//!   **big-endian** u32 length and the entry bytes. Positions are
//!   milliseconds.
//! - `Serato BeatGrid`: a **big-endian** marker count, then markers of an
//!   f32 position in seconds and the beats until the next marker. The last
//!   marker stores its BPM as an f32 instead.

use std::fs::File;
use std::path::Path;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use lofty::config::ParseOptions;
use lofty::file::AudioFile;
use lofty::id3::v2::Frame;
use lofty::mpeg::MpegFile;
use tracing::debug;

use crate::engine::layout::{BlobReader, SLOT_COUNT};
use crate::engine::Argb;
use crate::error::{Error, Result};
use crate::library::{HotCue, Loop, Marker, Song};

pub const MARKERS2: &str = "Serato Markers2";
pub const BEATGRID: &str = "Serato BeatGrid";

const GEOB: &str = "GEOB frame";
const MARKERS2_HEADER: [u8; 2] = [0x01, 0x01];
const BEATGRID_HEADER: [u8; 2] = [0x01, 0x00];

/// Serato writes unpadded base64, sometimes with a stray trailing character.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// One `GEOB` frame, keyed by its description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Geob {
    pub description: String,
    pub data: Vec<u8>,
}

impl Geob {
    /// Parse a frame body: text encoding, MIME type, file name,
    /// description, then the object itself.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut reader = BlobReader::new(body, GEOB);
        let encoding = reader.read_be::<u8>()?;
        reader.read_until_nul()?;

        let text = |bytes: Vec<u8>| -> Result<String> {
            match encoding {
                0 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
                3 => String::from_utf8(bytes).map_err(|e| Error::Parse(format!("GEOB text: {}", e))),
                other => Err(Error::Parse(format!("GEOB text encoding {} is not supported", other))),
            }
        };
        text(reader.read_until_nul()?)?;
        let description = text(reader.read_until_nul()?)?;

        Ok(Self {
            description,
            data: reader.rest(),
        })
    }
}

/// `GEOB` frames of the audio file at `path`, sorted by description.
///
/// Only MP3 files carry them in ID3v2; other formats yield nothing.
pub fn read_geobs(path: &Path) -> Result<Vec<Geob>> {
    let is_mp3 = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
    if !is_mp3 {
        debug!("No ID3v2 GEOB frames in {}", path.display());
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    let mpeg = MpegFile::read_from(&mut file, ParseOptions::new())
        .map_err(|e| Error::Parse(format!("tags of {}: {}", path.display(), e)))?;

    let mut geobs = Vec::new();
    if let Some(tag) = mpeg.id3v2() {
        for frame in tag {
            if let Frame::Binary(binary) = frame {
                if frame.id_str() == "GEOB" {
                    geobs.push(Geob::parse(&binary.data)?);
                }
            }
        }
    }
    geobs.sort_by(|a, b| a.description.cmp(&b.description));
    Ok(geobs)
}

/// Fill cues, loops, colour and grid of `song` from its frames.
pub fn apply(song: &mut Song, geobs: &[Geob]) -> Result<()> {
    for geob in geobs {
        match geob.description.as_str() {
            MARKERS2 => {
                let markers = Markers2::decode(&geob.data)?;
                song.cues = markers.cues;
                song.loops = markers.loops;
                if let Some(color) = markers.color {
                    song.color = color;
                }
            }
            BEATGRID => {
                song.grid = decode_beatgrid(&geob.data)?;
                if song.bpm == 0.0 {
                    song.bpm = song.grid.first().map_or(0.0, |marker| marker.bpm);
                }
            }
            other => debug!("Skipping GEOB frame {:?}", other),
        }
    }
    Ok(())
}

/// Decoded `Serato Markers2` frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Markers2 {
    /// Track colour
    pub color: Option<String>,
    pub bpm_lock: bool,
    pub cues: Vec<HotCue>,
    pub loops: Vec<Loop>,
}

impl Markers2 {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let payload = markers2_payload(data)?;
        let mut reader = BlobReader::new(&payload, MARKERS2);
        if reader.read_bytes(2)? != MARKERS2_HEADER {
            return Err(Error::Parse(format!("{} payload header", MARKERS2)));
        }

        let mut markers = Self::default();
        while reader.remaining() > 0 {
            let name = reader.read_until_nul()?;
            if name.is_empty() {
                break;
            }
            let len = reader.read_be::<u32>()? as usize;
            let entry = reader.read_bytes(len)?;
            markers.read_entry(&name, &entry)?;
        }
        Ok(markers)
    }

    fn read_entry(&mut self, name: &[u8], entry: &[u8]) -> Result<()> {
        let mut reader = BlobReader::new(entry, MARKERS2);
        match name {
            b"COLOR" => {
                let color = reader.read_be::<Argb>()?;
                self.color = Some(color.to_hex()?);
            }
            b"BPMLOCK" => self.bpm_lock = reader.read_be::<u8>()? != 0,
            b"CUE" => {
                reader.read_bytes(1)?;
                let index = reader.read_be::<u8>()?;
                let position = reader.read_be::<u32>()?;
                let color = reader.read_be::<Argb>()?;
                reader.read_bytes(2)?;
                let label = reader.read_until_nul()?;
                self.cues.push(HotCue {
                    name: label_text(label)?,
                    offset: seconds(position),
                    position: slot(index)?,
                    color: color.to_hex()?,
                });
            }
            b"LOOP" => {
                reader.read_bytes(1)?;
                let index = reader.read_be::<u8>()?;
                let start = reader.read_be::<u32>()?;
                let end = reader.read_be::<u32>()?;
                reader.read_bytes(4)?;
                let color = reader.read_be::<Argb>()?;
                reader.read_bytes(2)?;
                let label = reader.read_until_nul()?;
                self.loops.push(Loop {
                    name: label_text(label)?,
                    start: seconds(start),
                    end: seconds(end),
                    position: slot(index)?,
                    color: color.to_hex()?,
                });
            }
            other => debug!("Skipping {} entry {}", MARKERS2, String::from_utf8_lossy(other)),
        }
        Ok(())
    }
}

fn markers2_payload(data: &[u8]) -> Result<Vec<u8>> {
    let body = data
        .strip_prefix(&MARKERS2_HEADER[..])
        .ok_or_else(|| Error::Parse(format!("{} frame header", MARKERS2)))?;

    let mut encoded: Vec<u8> = body
        .iter()
        .copied()
        .take_while(|&b| b != 0)
        .filter(|&b| b != b'\n')
        .collect();
    if encoded.len() % 4 == 1 {
        encoded.pop();
    }
    BASE64
        .decode(&encoded)
        .map_err(|e| Error::Parse(format!("{} base64: {}", MARKERS2, e)))
}

fn seconds(milliseconds: u32) -> f64 {
    f64::from(milliseconds) / 1000.0
}

/// 0-indexed pad to 1-indexed slot
fn slot(index: u8) -> Result<u8> {
    if usize::from(index) >= SLOT_COUNT {
        return Err(Error::OutOfRange(format!("{} pad index {}", MARKERS2, index)));
    }
    Ok(index + 1)
}

fn label_text(label: Vec<u8>) -> Result<String> {
    String::from_utf8(label).map_err(|e| Error::Parse(format!("{} label: {}", MARKERS2, e)))
}

/// Decode a `Serato BeatGrid` frame into markers.
///
/// BPM between two markers follows from their distance and beat count. The
/// beat in the bar counts up from the first marker's downbeat.
pub fn decode_beatgrid(data: &[u8]) -> Result<Vec<Marker>> {
    let mut reader = BlobReader::new(data, BEATGRID);
    if reader.read_bytes(2)? != BEATGRID_HEADER {
        return Err(Error::Parse(format!("{} header", BEATGRID)));
    }
    let count = reader.read_be::<u32>()?;
    let count = reader.require_records(u64::from(count), 8)?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut positions = Vec::with_capacity(count);
    let mut beats = Vec::with_capacity(count - 1);
    for _ in 1..count {
        positions.push(f64::from(reader.read_be::<f32>()?));
        beats.push(reader.read_be::<u32>()?);
    }
    positions.push(f64::from(reader.read_be::<f32>()?));
    let last_bpm = f64::from(reader.read_be::<f32>()?);

    let mut markers = Vec::with_capacity(count);
    let mut beat: u64 = 0;
    for (i, &start) in positions.iter().enumerate() {
        let bpm = match (beats.get(i), positions.get(i + 1)) {
            (Some(&beat_count), Some(&next)) => {
                if next <= start {
                    return Err(Error::OutOfRange(format!(
                        "{} marker at {} is not before the next one at {}",
                        BEATGRID, start, next
                    )));
                }
                f64::from(beat_count) * 60.0 / (next - start)
            }
            _ => last_bpm,
        };
        markers.push(Marker {
            start_position: start,
            bpm,
            beat_number: (beat % 4) as u8,
        });
        beat += beats.get(i).copied().map_or(0, u64::from);
    }
    Ok(markers)
}
