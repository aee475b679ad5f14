//! Value mappings shared by every format adapter
//!
//! - Camelot key: integer 0..=23 <-> `8B`, `8A`, `9B` ... `7A`
//! - Rating: 0..=100 in steps of 20 <-> 0..=255 in steps of 51
//! - Date: unix seconds <-> `YYYY-MM-DD`
//! - Path: absolute filesystem path <-> `file://localhost/...`
//! - Color: RGB channels <-> `#RRGGBB`

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{Error, Result};

/// Number of distinct keys on the Camelot wheel (12 positions x major/minor)
pub const KEY_COUNT: u8 = 24;

/// Convert a camelot index into wheel notation.
///
/// Index 0 is 8B; every step of two moves one position round the wheel,
/// even indices are major (B) and odd indices minor (A).
pub fn camelot_from_key(key: i64) -> Result<String> {
    if !(0..KEY_COUNT as i64).contains(&key) {
        return Err(Error::OutOfRange(format!(
            "key {} outside camelot range 0..{}",
            key, KEY_COUNT
        )));
    }
    let number = (key / 2 + 7) % 12 + 1;
    let letter = if key % 2 == 0 { 'B' } else { 'A' };
    Ok(format!("{}{}", number, letter))
}

/// Inverse of [`camelot_from_key`].
pub fn key_from_camelot(camelot: &str) -> Result<u8> {
    let no_match = || Error::NoMatch(format!("'{}' is not a camelot key", camelot));

    let letter_at = camelot.len().checked_sub(1).ok_or_else(no_match)?;
    if !camelot.is_char_boundary(letter_at) {
        return Err(no_match());
    }
    let (digits, letter) = camelot.split_at(letter_at);
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(no_match());
    }
    let number: u8 = digits.parse().map_err(|_| no_match())?;
    if !(1..=12).contains(&number) {
        return Err(no_match());
    }
    let minor = match letter {
        "B" => 0,
        "A" => 1,
        _ => return Err(no_match()),
    };

    Ok(((number + 4) % 12) * 2 + minor)
}

const RATINGS: [(u8, u8); 6] = [(0, 0), (20, 51), (40, 102), (60, 153), (80, 204), (100, 255)];

/// Map a 0-100 star rating onto the byte scale used by Rekordbox.
pub fn rating_export(rating: i64) -> Result<u8> {
    RATINGS
        .iter()
        .find(|(stars, _)| *stars as i64 == rating)
        .map(|(_, byte)| *byte)
        .ok_or_else(|| {
            Error::NoMatch(format!(
                "rating {} must be 0, 20, 40, 60, 80 or 100",
                rating
            ))
        })
}

/// Inverse of [`rating_export`].
pub fn rating_import(rating: i64) -> Result<u8> {
    RATINGS
        .iter()
        .find(|(_, byte)| *byte as i64 == rating)
        .map(|(stars, _)| *stars)
        .ok_or_else(|| {
            Error::NoMatch(format!(
                "rating {} must be 0, 51, 102, 153, 204 or 255",
                rating
            ))
        })
}

/// Validate a rating already on the 0-100 scale.
pub fn check_rating(rating: i64) -> Result<u8> {
    rating_export(rating)?;
    Ok(rating as u8)
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format unix seconds as `YYYY-MM-DD`. Zero means "unset" and yields an
/// empty string.
pub fn date_from_unix(timestamp: i64, use_utc: bool) -> Result<String> {
    if timestamp == 0 {
        return Ok(String::new());
    }
    let out_of_range = || Error::OutOfRange(format!("timestamp {} is not a valid date", timestamp));

    let date = if use_utc {
        Utc.timestamp_opt(timestamp, 0)
            .single()
            .ok_or_else(out_of_range)?
            .date_naive()
    } else {
        let local: DateTime<Local> = Local
            .timestamp_opt(timestamp, 0)
            .single()
            .ok_or_else(out_of_range)?;
        local.date_naive()
    };
    Ok(date.format(DATE_FORMAT).to_string())
}

/// Parse `YYYY-MM-DD` as midnight in the chosen zone. The empty string maps
/// back to zero.
pub fn unix_from_date(date: &str, use_utc: bool) -> Result<i64> {
    if date.is_empty() {
        return Ok(0);
    }
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| Error::Parse(format!("date '{}': {}", date, e)))?;
    let midnight = parsed
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Parse(format!("date '{}' has no midnight", date)))?;

    let timestamp = if use_utc {
        Utc.from_utc_datetime(&midnight).timestamp()
    } else {
        Local
            .from_local_datetime(&midnight)
            .earliest()
            .ok_or_else(|| Error::Parse(format!("date '{}' has no local midnight", date)))?
            .timestamp()
    };
    Ok(timestamp)
}

const URI_PREFIX: &str = "file://localhost/";

/// Everything outside the unreserved set and the sub-delimiters allowed in a
/// path segment gets escaped. `/` stays as the segment separator.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@')
    .remove(b'/');

/// Convert an absolute filesystem path into a `file://localhost/` URI.
///
/// Backslashes are treated as separators so Windows paths come out as
/// `file://localhost/C:/Music/...`.
///
/// URIs only carry absolute paths. A relative path is rooted at `/`, and
/// [`uri_to_path`] folds its `.` and `..` segments the way any URI parser
/// does, so `../Music/x.mp3` reads back as `/Music/x.mp3`. Engine imports
/// resolve paths against the library unless asked to preserve them.
pub fn path_to_uri(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');
    format!("{}{}", URI_PREFIX, utf8_percent_encode(trimmed, PATH_ENCODE_SET))
}

/// Inverse of [`path_to_uri`]. Only `file` URIs are accepted.
pub fn uri_to_path(uri: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidUri {
        uri: uri.to_string(),
        reason,
    };

    let parsed = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;
    if parsed.scheme() != "file" {
        return Err(invalid(format!("scheme '{}' is not 'file'", parsed.scheme())));
    }

    let decoded = percent_decode_str(parsed.path())
        .decode_utf8()
        .map_err(|e| invalid(e.to_string()))?;

    // `/C:/Music` is a Windows drive path, keep it drive-rooted
    let bytes = decoded.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        return Ok(decoded[1..].to_string());
    }
    Ok(decoded.into_owned())
}

/// Format RGB channels as uppercase `#RRGGBB`.
pub fn rgb_to_hex(red: i32, green: i32, blue: i32) -> Result<String> {
    let channel = |value: i32| {
        u8::try_from(value)
            .map_err(|_| Error::OutOfRange(format!("color channel {} outside 0..=255", value)))
    };
    Ok(format!(
        "#{:02X}{:02X}{:02X}",
        channel(red)?,
        channel(green)?,
        channel(blue)?
    ))
}

/// Parse exactly `#RRGGBB` (either case) into channels.
pub fn hex_to_rgb(hex: &str) -> Result<(u8, u8, u8)> {
    let malformed = || Error::Parse(format!("color '{}' is not #RRGGBB", hex));

    let digits = hex.strip_prefix('#').ok_or_else(malformed)?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| malformed())
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camelot_table() {
        let expected = [
            "8B", "8A", "9B", "9A", "10B", "10A", "11B", "11A", "12B", "12A", "1B", "1A",
            "2B", "2A", "3B", "3A", "4B", "4A", "5B", "5A", "6B", "6A", "7B", "7A",
        ];
        for (key, camelot) in expected.iter().enumerate() {
            assert_eq!(camelot_from_key(key as i64).unwrap(), *camelot);
            assert_eq!(key_from_camelot(camelot).unwrap(), key as u8);
        }
    }

    #[test]
    fn test_camelot_out_of_domain() {
        assert!(matches!(camelot_from_key(24), Err(Error::OutOfRange(_))));
        assert!(matches!(camelot_from_key(-1), Err(Error::OutOfRange(_))));

        for bad in ["", "B", "13A", "0B", "08A", "8C", "8b", "ÄA", "12"] {
            assert!(
                matches!(key_from_camelot(bad), Err(Error::NoMatch(_))),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_rating_bijection() {
        for stars in [0, 20, 40, 60, 80, 100] {
            let byte = rating_export(stars).unwrap();
            assert_eq!(rating_import(byte as i64).unwrap() as i64, stars);
        }
        assert_eq!(rating_export(60).unwrap(), 153);
        assert!(matches!(rating_export(50), Err(Error::NoMatch(_))));
        assert!(matches!(rating_import(50), Err(Error::NoMatch(_))));
        assert!(matches!(check_rating(101), Err(Error::NoMatch(_))));
    }

    #[test]
    fn test_date_utc() {
        assert_eq!(date_from_unix(0, true).unwrap(), "");
        assert_eq!(unix_from_date("", true).unwrap(), 0);

        // 2024-03-15T18:30:00Z
        assert_eq!(date_from_unix(1_710_527_400, true).unwrap(), "2024-03-15");
        assert_eq!(unix_from_date("2024-03-15", true).unwrap(), 1_710_460_800);
    }

    #[test]
    fn test_date_local_roundtrip() {
        let midnight = unix_from_date("2021-07-04", false).unwrap();
        assert_eq!(date_from_unix(midnight, false).unwrap(), "2021-07-04");
    }

    #[test]
    fn test_date_parse_error() {
        assert!(matches!(unix_from_date("04/07/2021", true), Err(Error::Parse(_))));
    }

    #[test]
    fn test_path_to_uri() {
        assert_eq!(
            path_to_uri("/Users/DJ/My Music/Track #1.mp3"),
            "file://localhost/Users/DJ/My%20Music/Track%20%231.mp3"
        );
        assert_eq!(
            path_to_uri("C:\\Music\\Track.mp3"),
            "file://localhost/C:/Music/Track.mp3"
        );
    }

    #[test]
    fn test_uri_roundtrip() {
        for path in ["/Users/DJ/My Music/Track #1.mp3", "/music/Beyoncé & Jay-Z/[2024] 100%.flac"] {
            assert_eq!(uri_to_path(&path_to_uri(path)).unwrap(), path);
        }
        assert_eq!(
            uri_to_path("file://localhost/C:/Music/Track.mp3").unwrap(),
            "C:/Music/Track.mp3"
        );
    }

    #[test]
    fn test_relative_path_is_rooted() {
        let uri = path_to_uri("../Music/./x.mp3");
        assert_eq!(uri, "file://localhost/../Music/./x.mp3");
        assert_eq!(uri_to_path(&uri).unwrap(), "/Music/x.mp3");
    }

    #[test]
    fn test_uri_rejects_other_schemes() {
        assert!(matches!(
            uri_to_path("http://localhost/Music/Track.mp3"),
            Err(Error::InvalidUri { .. })
        ));
        assert!(matches!(uri_to_path("not a uri"), Err(Error::InvalidUri { .. })));
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(rgb_to_hex(255, 0, 171).unwrap(), "#FF00AB");
        assert!(matches!(rgb_to_hex(256, 0, 0), Err(Error::OutOfRange(_))));
        assert!(matches!(rgb_to_hex(0, -1, 0), Err(Error::OutOfRange(_))));

        assert_eq!(hex_to_rgb("#FF00AB").unwrap(), (255, 0, 171));
        assert_eq!(hex_to_rgb("#ff00ab").unwrap(), (255, 0, 171));
        for bad in ["FF00AB", "#FF00A", "#FF00ABC", "#GG0000", "0xFF00AB"] {
            assert!(matches!(hex_to_rgb(bad), Err(Error::Parse(_))), "{}", bad);
        }
    }
}
