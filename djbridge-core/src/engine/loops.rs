//! Loop blob (`PerformanceData.loops`)
//!
//! Same shape as the quick-cue blob: a **big-endian** slot count and eight
//! slots. Loop positions are **little-endian** and there is no trailing main
//! cue. An unset slot occupies 23 bytes.

use binrw::binrw;

use super::layout::{check_label, label_to_string, Argb, BlobReader, BlobWriter, SLOT_COUNT};
use crate::error::Result;
use crate::library::Loop;

const BLOB: &str = "loop";

/// Label length byte, start, end, two flags, color
const SLOT_FIXED_LEN: usize = 1 + 8 + 8 + 1 + 1 + 4;

#[binrw]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawLoop {
    #[br(temp)]
    #[bw(calc = label.len() as u8)]
    label_len: u8,
    #[br(count = label_len as usize)]
    pub label: Vec<u8>,
    /// In samples
    #[brw(little)]
    pub start_sample: f64,
    /// In samples
    #[brw(little)]
    pub end_sample: f64,
    pub start_set: u8,
    pub end_set: u8,
    pub color: Argb,
}

impl RawLoop {
    pub fn is_set(&self) -> bool {
        !self.label.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Loops {
    /// Stored slot count, always 8 in practice
    pub count: u64,
    pub slots: Vec<RawLoop>,
    pub trailer: Vec<u8>,
}

impl Loops {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = BlobReader::new(data, BLOB);
        reader.require(8)?;
        let count = reader.read_be::<u64>()?;

        let mut slots = Vec::with_capacity(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            let label_len = reader.peek_u8()? as usize;
            slots.push(reader.read_record_be::<RawLoop>(SLOT_FIXED_LEN + label_len)?);
        }

        Ok(Self {
            count,
            slots,
            trailer: reader.rest(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BlobWriter::default();
        writer.write_be(&self.count)?;
        for (slot, raw) in self.slots.iter().enumerate() {
            check_label(&raw.label, slot)?;
            writer.write_be(raw)?;
        }
        writer.write_bytes(&self.trailer);
        Ok(writer.into_inner())
    }

    /// Loops of the set slots, bounds in seconds.
    pub fn loops(&self, sample_rate: f64) -> Result<Vec<Loop>> {
        let mut loops = Vec::new();
        for (slot, raw) in self.slots.iter().enumerate() {
            if !raw.is_set() {
                continue;
            }
            loops.push(Loop {
                name: label_to_string(&raw.label, BLOB, slot)?,
                start: raw.start_sample / sample_rate,
                end: raw.end_sample / sample_rate,
                position: slot as u8 + 1,
                color: raw.color.to_hex()?,
            });
        }
        Ok(loops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn unset_slot() -> Vec<u8> {
        let mut slot = vec![0u8];
        slot.extend_from_slice(&(-1.0f64).to_le_bytes());
        slot.extend_from_slice(&(-1.0f64).to_le_bytes());
        slot.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        slot
    }

    fn set_slot(label: &str, start: f64, end: f64, rgb: [u8; 3]) -> Vec<u8> {
        let mut slot = vec![label.len() as u8];
        slot.extend_from_slice(label.as_bytes());
        slot.extend_from_slice(&start.to_le_bytes());
        slot.extend_from_slice(&end.to_le_bytes());
        slot.extend_from_slice(&[1, 1, 0xFF]);
        slot.extend_from_slice(&rgb);
        slot
    }

    fn blob(slots: &[Vec<u8>]) -> Vec<u8> {
        let mut data = 8u64.to_be_bytes().to_vec();
        for slot in slots {
            data.extend_from_slice(slot);
        }
        data
    }

    #[test]
    fn test_slot_sizes() {
        assert_eq!(unset_slot().len(), 23);
        assert_eq!(set_slot("Verse", 0.0, 1.0, [0, 0, 0]).len(), 28);
    }

    #[test]
    fn test_decode_loops() {
        let mut slots = vec![unset_slot(); SLOT_COUNT];
        slots[0] = set_slot("Verse", 44100.0, 132300.0, [0xAA, 0xBB, 0xCC]);
        slots[7] = set_slot("Outro", 441000.0, 485100.0, [0, 0, 0xFF]);

        let loops = Loops::decode(&blob(&slots)).unwrap().loops(44100.0).unwrap();
        assert_eq!(
            loops,
            vec![
                Loop {
                    name: "Verse".into(),
                    start: 1.0,
                    end: 3.0,
                    position: 1,
                    color: "#AABBCC".into(),
                },
                Loop {
                    name: "Outro".into(),
                    start: 10.0,
                    end: 11.0,
                    position: 8,
                    color: "#0000FF".into(),
                },
            ]
        );
    }

    #[test]
    fn test_roundtrip() {
        let mut slots = vec![unset_slot(); SLOT_COUNT];
        slots[4] = set_slot("Build", 10.0, 20.0, [9, 8, 7]);
        let data = blob(&slots);

        let loops = Loops::decode(&data).unwrap();
        assert_eq!(loops.slots[4].start_sample, 10.0);
        assert_eq!(loops.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_truncated() {
        let data = blob(&vec![unset_slot(); SLOT_COUNT]);
        let err = Loops::decode(&data[..data.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput { offset: 169, needed: 23, available: 22, .. }
        ));

        assert!(matches!(
            Loops::decode(&[0, 0, 0]),
            Err(Error::TruncatedInput { offset: 0, .. })
        ));
    }
}
