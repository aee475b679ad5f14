//! Cursor helpers for the fixed-layout performance-data blobs
//!
//! The blobs mix endianness inside a single record (big-endian counts and
//! cue offsets, little-endian marker and loop payloads), so endianness is
//! chosen per read instead of per type. Every read is preceded by an explicit
//! length check, which keeps truncation errors precise about where the data
//! ran out.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite, Endian};

use crate::convert::rgb_to_hex;
use crate::error::{Error, Result};

/// Number of pad slots in the quick-cue and loop layouts
pub const SLOT_COUNT: usize = 8;

/// Slot color, stored alpha first. Alpha is always 255 in practice and is
/// dropped on import.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Argb {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Argb {
    /// Opaque color from RGB channels
    pub fn opaque((red, green, blue): (u8, u8, u8)) -> Self {
        Self {
            alpha: 0xFF,
            red,
            green,
            blue,
        }
    }

    pub fn to_hex(self) -> Result<String> {
        rgb_to_hex(self.red.into(), self.green.into(), self.blue.into())
    }
}

pub(crate) struct BlobReader<'a> {
    cursor: Cursor<&'a [u8]>,
    blob: &'static str,
}

impl<'a> BlobReader<'a> {
    pub fn new(data: &'a [u8], blob: &'static str) -> Self {
        Self {
            cursor: Cursor::new(data),
            blob,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    /// Fail unless at least `needed` more bytes are available.
    pub fn require(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(self.truncated(needed));
        }
        Ok(())
    }

    /// `count` records of `record_size` bytes each must fit in what is left.
    pub fn require_records(&self, count: u64, record_size: usize) -> Result<usize> {
        let count = usize::try_from(count).map_err(|_| self.truncated(usize::MAX))?;
        let needed = count
            .checked_mul(record_size)
            .ok_or_else(|| self.truncated(usize::MAX))?;
        self.require(needed)?;
        Ok(count)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.require(1)?;
        Ok(self.cursor.get_ref()[self.position()])
    }

    pub fn read_be<T>(&mut self) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        self.read(Endian::Big, std::mem::size_of::<T>())
    }

    pub fn read_le<T>(&mut self) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        self.read(Endian::Little, std::mem::size_of::<T>())
    }

    /// Read a variable-size record, big-endian unless its fields say
    /// otherwise. `size` is its encoded length, which for records holding a
    /// `Vec` differs from the in-memory size.
    pub fn read_record_be<T>(&mut self, size: usize) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        self.require(size)?;
        self.read(Endian::Big, size)
    }

    fn read<T>(&mut self, endian: Endian, needed: usize) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let offset = self.position();
        T::read_options(&mut self.cursor, endian, ()).map_err(|e| {
            if e.is_eof() {
                Error::TruncatedInput {
                    blob: self.blob,
                    offset,
                    needed,
                    available: self.cursor.get_ref().len().saturating_sub(offset),
                }
            } else {
                Error::Parse(format!("{} blob at byte {}: {}", self.blob, offset, e))
            }
        })
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.require(len)?;
        let start = self.position();
        let bytes = self.cursor.get_ref()[start..start + len].to_vec();
        self.cursor.set_position((start + len) as u64);
        Ok(bytes)
    }

    /// Bytes up to the next NUL, which is consumed but not returned.
    pub fn read_until_nul(&mut self) -> Result<Vec<u8>> {
        let start = self.position();
        let end = self.cursor.get_ref()[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.truncated(self.remaining() + 1))?;
        let bytes = self.cursor.get_ref()[start..start + end].to_vec();
        self.cursor.set_position((start + end + 1) as u64);
        Ok(bytes)
    }

    /// Everything after the cursor, consuming it.
    pub fn rest(&mut self) -> Vec<u8> {
        let start = self.position();
        let data = self.cursor.get_ref()[start..].to_vec();
        self.cursor.set_position(self.cursor.get_ref().len() as u64);
        data
    }

    fn truncated(&self, needed: usize) -> Error {
        Error::TruncatedInput {
            blob: self.blob,
            offset: self.position(),
            needed,
            available: self.remaining(),
        }
    }
}

#[derive(Default)]
pub(crate) struct BlobWriter {
    cursor: Cursor<Vec<u8>>,
}

impl BlobWriter {
    pub fn write_be<T>(&mut self, value: &T) -> Result<()>
    where
        T: for<'b> BinWrite<Args<'b> = ()>,
    {
        self.write(value, Endian::Big)
    }

    pub fn write_le<T>(&mut self, value: &T) -> Result<()>
    where
        T: for<'b> BinWrite<Args<'b> = ()>,
    {
        self.write(value, Endian::Little)
    }

    fn write<T>(&mut self, value: &T, endian: Endian) -> Result<()>
    where
        T: for<'b> BinWrite<Args<'b> = ()>,
    {
        value
            .write_options(&mut self.cursor, endian, ())
            .map_err(|e| Error::OutOfRange(e.to_string()))
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let position = self.cursor.position() as usize;
        let buffer = self.cursor.get_mut();
        buffer.truncate(position);
        buffer.extend_from_slice(bytes);
        let len = buffer.len() as u64;
        self.cursor.set_position(len);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

/// Slot labels are prefixed by a single length byte.
pub(crate) fn check_label(label: &[u8], slot: usize) -> Result<()> {
    if label.len() > u8::MAX as usize {
        return Err(Error::OutOfRange(format!(
            "slot {} label is {} bytes, at most 255 fit",
            slot + 1,
            label.len()
        )));
    }
    Ok(())
}

pub(crate) fn label_to_string(label: &[u8], blob: &'static str, slot: usize) -> Result<String> {
    String::from_utf8(label.to_vec())
        .map_err(|e| Error::Parse(format!("{} slot {} label: {}", blob, slot + 1, e)))
}
