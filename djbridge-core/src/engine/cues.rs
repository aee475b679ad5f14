//! Quick-cue blob (`PerformanceData.quickCues`)
//!
//! A **big-endian** slot count, eight hot-cue slots, then the main cue in
//! two variants. A slot with an empty label is unset but still occupies
//! 13 bytes.

use binrw::binrw;

use super::layout::{check_label, label_to_string, Argb, BlobReader, BlobWriter, SLOT_COUNT};
use crate::error::Result;
use crate::library::HotCue;

const BLOB: &str = "quick cue";

/// Label length byte, offset, color
const SLOT_FIXED_LEN: usize = 1 + 8 + 4;
/// Adjusted cue, flag, default cue
const MAIN_CUE_LEN: usize = 8 + 1 + 8;

/// One hot-cue slot as stored in the blob, read big-endian
#[binrw]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawHotCue {
    #[br(temp)]
    #[bw(calc = label.len() as u8)]
    label_len: u8,
    #[br(count = label_len as usize)]
    pub label: Vec<u8>,
    /// Position in samples, -1 when unset
    pub sample_offset: f64,
    pub color: Argb,
}

impl RawHotCue {
    pub fn is_set(&self) -> bool {
        !self.label.is_empty()
    }
}

/// Decoded quick-cue blob
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuickCues {
    /// Stored slot count, always 8 in practice
    pub count: u64,
    pub slots: Vec<RawHotCue>,
    /// Main cue after the user moved it, in samples
    pub adjusted_main_cue: f64,
    pub main_cue_adjusted: u8,
    /// Main cue as set by the analyser, in samples
    pub default_main_cue: f64,
    pub trailer: Vec<u8>,
}

impl QuickCues {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = BlobReader::new(data, BLOB);
        reader.require(8)?;
        let count = reader.read_be::<u64>()?;

        let mut slots = Vec::with_capacity(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            let label_len = reader.peek_u8()? as usize;
            slots.push(reader.read_record_be::<RawHotCue>(SLOT_FIXED_LEN + label_len)?);
        }

        reader.require(MAIN_CUE_LEN)?;
        let adjusted_main_cue = reader.read_be::<f64>()?;
        let main_cue_adjusted = reader.read_be::<u8>()?;
        let default_main_cue = reader.read_be::<f64>()?;

        Ok(Self {
            count,
            slots,
            adjusted_main_cue,
            main_cue_adjusted,
            default_main_cue,
            trailer: reader.rest(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BlobWriter::default();
        writer.write_be(&self.count)?;
        for (slot, cue) in self.slots.iter().enumerate() {
            check_label(&cue.label, slot)?;
            writer.write_be(cue)?;
        }
        writer.write_be(&self.adjusted_main_cue)?;
        writer.write_be(&self.main_cue_adjusted)?;
        writer.write_be(&self.default_main_cue)?;
        writer.write_bytes(&self.trailer);
        Ok(writer.into_inner())
    }

    /// Hot cues of the set slots, offsets in seconds.
    pub fn hot_cues(&self, sample_rate: f64) -> Result<Vec<HotCue>> {
        let mut cues = Vec::new();
        for (slot, raw) in self.slots.iter().enumerate() {
            if !raw.is_set() {
                continue;
            }
            cues.push(HotCue {
                name: label_to_string(&raw.label, BLOB, slot)?,
                offset: raw.sample_offset / sample_rate,
                position: slot as u8 + 1,
                color: raw.color.to_hex()?,
            });
        }
        Ok(cues)
    }

    /// Main cue in seconds, the analyser's when `original` is set.
    pub fn main_cue(&self, sample_rate: f64, original: bool) -> f64 {
        let samples = if original {
            self.default_main_cue
        } else {
            self.adjusted_main_cue
        };
        samples / sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn unset_slot() -> Vec<u8> {
        let mut slot = vec![0u8];
        slot.extend_from_slice(&(-1.0f64).to_be_bytes());
        slot.extend_from_slice(&[0, 0, 0, 0]);
        slot
    }

    fn set_slot(label: &str, offset: f64, rgb: [u8; 3]) -> Vec<u8> {
        let mut slot = vec![label.len() as u8];
        slot.extend_from_slice(label.as_bytes());
        slot.extend_from_slice(&offset.to_be_bytes());
        slot.push(0xFF);
        slot.extend_from_slice(&rgb);
        slot
    }

    fn main_cues(adjusted: f64, default: f64) -> Vec<u8> {
        let mut tail = adjusted.to_be_bytes().to_vec();
        tail.push(1);
        tail.extend_from_slice(&default.to_be_bytes());
        tail
    }

    fn blob(slots: &[Vec<u8>]) -> Vec<u8> {
        let mut data = 8u64.to_be_bytes().to_vec();
        for slot in slots {
            data.extend_from_slice(slot);
        }
        data.extend(main_cues(88200.0, 44100.0));
        data
    }

    #[test]
    fn test_slot_sizes() {
        assert_eq!(unset_slot().len(), 13);
        assert_eq!(set_slot("Intro", 0.0, [0, 0, 0]).len(), 18);
    }

    #[test]
    fn test_decode_mixed_slots() {
        let mut slots = vec![unset_slot(); SLOT_COUNT];
        slots[1] = set_slot("Intro", 441000.0, [0xFF, 0x00, 0x7F]);
        slots[6] = set_slot("Drop", 2205000.0, [0x12, 0x34, 0x56]);
        let data = blob(&slots);
        assert_eq!(data.len(), 8 + 6 * 13 + 18 + 17 + 17);

        let cues = QuickCues::decode(&data).unwrap();
        assert_eq!(cues.slots.len(), 8);
        assert!(cues.trailer.is_empty());

        let hot_cues = cues.hot_cues(44100.0).unwrap();
        assert_eq!(
            hot_cues,
            vec![
                HotCue {
                    name: "Intro".into(),
                    offset: 10.0,
                    position: 2,
                    color: "#FF007F".into(),
                },
                HotCue {
                    name: "Drop".into(),
                    offset: 50.0,
                    position: 7,
                    color: "#123456".into(),
                },
            ]
        );
        assert_eq!(cues.main_cue(44100.0, false), 2.0);
        assert_eq!(cues.main_cue(44100.0, true), 1.0);
    }

    #[test]
    fn test_all_unset() {
        let data = blob(&vec![unset_slot(); SLOT_COUNT]);
        let cues = QuickCues::decode(&data).unwrap();
        assert!(cues.hot_cues(44100.0).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let mut slots = vec![unset_slot(); SLOT_COUNT];
        slots[0] = set_slot("Start", 100.0, [1, 2, 3]);
        let mut data = blob(&slots);
        data.extend_from_slice(&[0, 0]);

        let cues = QuickCues::decode(&data).unwrap();
        assert_eq!(cues.trailer, vec![0, 0]);
        assert_eq!(cues.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_truncated_slot() {
        let mut slots = vec![unset_slot(); SLOT_COUNT];
        slots[3] = set_slot("Break", 100.0, [1, 2, 3]);
        let data = blob(&slots);

        // cut inside slot 4's label
        let cut = 8 + 3 * 13 + 3;
        let err = QuickCues::decode(&data[..cut]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput { offset: 47, needed: 18, available: 3, .. }
        ));
    }

    #[test]
    fn test_missing_main_cue() {
        let data = blob(&vec![unset_slot(); SLOT_COUNT]);
        let err = QuickCues::decode(&data[..data.len() - 1]).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { offset: 112, .. }));
    }

    #[test]
    fn test_invalid_label() {
        let mut slots = vec![unset_slot(); SLOT_COUNT];
        slots[0] = vec![2, 0xC3, 0x28];
        slots[0].extend_from_slice(&0f64.to_be_bytes());
        slots[0].extend_from_slice(&[0xFF, 0, 0, 0]);

        let cues = QuickCues::decode(&blob(&slots)).unwrap();
        assert!(matches!(cues.hot_cues(44100.0), Err(Error::Parse(_))));
    }
}
