//! Beatgrid blob (`PerformanceData.beatData`)
//!
//! Layout after decompression:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 8 | sample rate, **big-endian** f64 |
//! | 8 | 8 | track length in samples, **big-endian** f64 |
//! | 16 | 1 | set flag |
//! | 17 | 8 | default grid marker count, **big-endian** u64 |
//! | 25 | 24 × n | default grid markers, **little-endian** |
//! | .. | 8 | adjusted grid marker count, **big-endian** u64 |
//! | .. | 24 × m | adjusted grid markers, **little-endian** |
//! | .. | rest | trailer, kept verbatim |

use binrw::binrw;

use super::layout::{BlobReader, BlobWriter};
use crate::error::{Error, Result};
use crate::library::Marker;

const BLOB: &str = "beatgrid";

/// Sample rate, length and flag
const HEADER_LEN: usize = 17;
/// Header plus both marker counts
const MIN_LEN: usize = HEADER_LEN + 8 + 8;
const MARKER_LEN: usize = 24;

/// One marker as stored in the blob
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMarker {
    /// Position in samples
    pub sample_offset: f64,
    /// Absolute beat index, negative before the first downbeat
    pub beat_number: i64,
    /// Beats until the next marker
    pub num_beats: u32,
    /// Not understood, non-zero in real libraries
    pub unknown: u32,
}

/// Decoded beatgrid blob
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeatData {
    pub sample_rate: f64,
    pub sample_count: f64,
    pub is_set: u8,
    /// Grid from the analyser
    pub default_grid: Vec<RawMarker>,
    /// Grid after manual edits
    pub adjusted_grid: Vec<RawMarker>,
    pub trailer: Vec<u8>,
}

impl BeatData {
    /// Parse a decompressed beatgrid blob.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = BlobReader::new(data, BLOB);
        reader.require(MIN_LEN)?;

        let sample_rate = reader.read_be::<f64>()?;
        let sample_count = reader.read_be::<f64>()?;
        let is_set = reader.read_be::<u8>()?;

        let default_grid = read_grid(&mut reader)?;
        reader.require(8)?;
        let adjusted_grid = read_grid(&mut reader)?;

        Ok(Self {
            sample_rate,
            sample_count,
            is_set,
            default_grid,
            adjusted_grid,
            trailer: reader.rest(),
        })
    }

    /// Serialise back to the blob layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BlobWriter::default();
        writer.write_be(&self.sample_rate)?;
        writer.write_be(&self.sample_count)?;
        writer.write_be(&self.is_set)?;
        write_grid(&mut writer, &self.default_grid)?;
        write_grid(&mut writer, &self.adjusted_grid)?;
        writer.write_bytes(&self.trailer);
        Ok(writer.into_inner())
    }

    /// Markers of the analyser grid when `original` is set, otherwise of the
    /// adjusted grid.
    pub fn markers(&self, original: bool) -> Result<Vec<Marker>> {
        let grid = if original {
            &self.default_grid
        } else {
            &self.adjusted_grid
        };
        markers(grid, self.sample_rate)
    }
}

fn read_grid(reader: &mut BlobReader<'_>) -> Result<Vec<RawMarker>> {
    let count = reader.read_be::<u64>()?;
    let count = reader.require_records(count, MARKER_LEN)?;

    let mut grid = Vec::with_capacity(count);
    for _ in 0..count {
        grid.push(reader.read_le::<RawMarker>()?);
    }
    Ok(grid)
}

fn write_grid(writer: &mut BlobWriter, grid: &[RawMarker]) -> Result<()> {
    writer.write_be(&(grid.len() as u64))?;
    for marker in grid {
        writer.write_le(marker)?;
    }
    Ok(())
}

/// Derive tempo markers from consecutive raw markers.
///
/// Each marker's BPM is measured against the following one, so the last raw
/// marker only closes the final segment and yields no output.
pub fn markers(grid: &[RawMarker], sample_rate: f64) -> Result<Vec<Marker>> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(Error::OutOfRange(format!("sample rate {}", sample_rate)));
    }

    grid.windows(2)
        .map(|pair| {
            let (current, next) = (pair[0], pair[1]);
            let span = next.sample_offset - current.sample_offset;
            if span <= 0.0 {
                return Err(Error::OutOfRange(format!(
                    "beatgrid marker at {} is not before the next one at {}",
                    current.sample_offset, next.sample_offset
                )));
            }

            Ok(Marker {
                start_position: current.sample_offset / sample_rate,
                bpm: sample_rate * 60.0 * f64::from(current.num_beats) / span,
                beat_number: current.beat_number.rem_euclid(4) as u8,
            })
        })
        .collect()
}
