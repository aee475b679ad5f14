//! qCompress-style blob framing
//!
//! Engine stores performance data the way Qt's `qCompress` writes it:
//! a 4-byte **big-endian** uncompressed length followed by a zlib stream.
//! The length header is the only integrity check the format carries, so it
//! is enforced exactly.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Length header size in bytes
const HEADER_LEN: usize = 4;

/// Inflate a length-prefixed zlib blob and verify the header length.
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() <= HEADER_LEN {
        return Err(Error::TruncatedInput {
            blob: "compressed",
            offset: 0,
            needed: HEADER_LEN + 1,
            available: blob.len(),
        });
    }

    let expected = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;

    let mut decoder = ZlibDecoder::new(&blob[HEADER_LEN..]);
    let mut inflated = Vec::with_capacity(expected.min(1 << 20));
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    if inflated.len() != expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: inflated.len(),
        });
    }

    Ok(inflated)
}

/// Produce a blob [`decompress`] accepts.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let length = u32::try_from(data.len()).map_err(|_| {
        Error::OutOfRange(format!("{} bytes does not fit a blob length header", data.len()))
    })?;

    let mut blob = Vec::with_capacity(HEADER_LEN + data.len() / 2);
    blob.extend_from_slice(&length.to_be_bytes());

    let mut encoder = ZlibEncoder::new(blob, Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Real beatgrid blob taken from an Engine library: 44.1 kHz, two markers
    /// in both grids, 145 BPM.
    pub(crate) const BEAT_DATA_BLOB: [u8; 66] = [
        0, 0, 0, 138, 120, 156, 115, 120, 218, 209, 192, 0, 4, 142, 81, 231, 189, 29, 128, 52,
        35, 3, 4, 48, 73, 37, 238, 92, 46, 120, 233, 227, 129, 63, 255, 33, 160, 13, 36, 147,
        192, 192, 144, 217, 242, 116, 222, 190, 123, 81, 142, 77, 48, 149, 72, 154, 40, 208, 199,
        192, 0, 0, 75, 220, 41, 20,
    ];

    pub(crate) const BEAT_DATA: [u8; 138] = [
        64, 229, 136, 128, 0, 0, 0, 0, 65, 90, 207, 75, 64, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2,
        26, 97, 185, 167, 17, 210, 241, 192, 252, 255, 255, 255, 255, 255, 255, 255, 134, 1, 0,
        0, 0, 96, 0, 0, 105, 132, 229, 158, 190, 222, 90, 65, 130, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 26, 97, 185, 167, 17, 210, 241, 192, 252, 255,
        255, 255, 255, 255, 255, 255, 134, 1, 0, 0, 0, 96, 0, 0, 105, 132, 229, 158, 190, 222,
        90, 65, 130, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    #[test]
    fn test_decompress_real_blob() {
        let data = decompress(&BEAT_DATA_BLOB).unwrap();
        assert_eq!(data, BEAT_DATA.to_vec());
    }

    #[test]
    fn test_short_blob_is_truncated() {
        let err = decompress(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { available: 3, .. }));

        let err = decompress(&[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { .. }));
    }

    #[test]
    fn test_corrupt_stream() {
        let mut blob = BEAT_DATA_BLOB;
        blob[4] = 121; // breaks the zlib header checksum
        assert!(matches!(decompress(&blob), Err(Error::Decompression(_))));
    }

    #[test]
    fn test_length_header_enforced() {
        let mut blob = BEAT_DATA_BLOB;
        blob[3] = 139;
        assert!(matches!(
            decompress(&blob),
            Err(Error::LengthMismatch { expected: 139, actual: 138 })
        ));

        // header 10, payload 11
        let mut short_header = compress(b"hello world").unwrap();
        short_header[..4].copy_from_slice(&10u32.to_be_bytes());
        assert!(matches!(
            decompress(&short_header),
            Err(Error::LengthMismatch { expected: 10, actual: 11 })
        ));
    }

    #[test]
    fn test_compress_roundtrip() {
        let blob = compress(&BEAT_DATA).unwrap();
        assert_eq!(&blob[..4], &[0, 0, 0, 138]);
        assert_eq!(decompress(&blob).unwrap(), BEAT_DATA.to_vec());
    }
}
