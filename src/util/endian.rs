//! Endian-aware cursor over a byte slice.
//!
//! Container headers are big-endian, serialized metadata and object data
//! use whichever byte order the file declares. [`EndianReader`] carries
//! the active order so parsing code reads the same way for both.

use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use super::{Error, Result};

/// Byte order of a data stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Serialized files store 0 for little-endian, anything else for big-endian.
    #[inline]
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0 { Endian::Little } else { Endian::Big }
    }
}

macro_rules! endian_read {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let pos = self.cursor.position();
            let value = match self.endian {
                Endian::Little => self.cursor.$name::<LittleEndian>(),
                Endian::Big => self.cursor.$name::<BigEndian>(),
            };
            value.map_err(|_| Error::UnexpectedEof(pos + std::mem::size_of::<$ty>() as u64))
        }
    };
}

/// Cursor that reads primitives in a runtime-selected byte order.
pub struct EndianReader<'a> {
    cursor: Cursor<&'a [u8]>,
    endian: Endian,
}

impl<'a> EndianReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { cursor: Cursor::new(data), endian }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    #[inline]
    pub fn set_position(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    /// Total length of the underlying slice.
    #[inline]
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left between the cursor and the end of the slice.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let pos = self.cursor.position();
        self.cursor.read_u8().map_err(|_| Error::UnexpectedEof(pos + 1))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read one byte as a boolean (non-zero is true).
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    endian_read!(read_u16, u16);
    endian_read!(read_i16, i16);
    endian_read!(read_u32, u32);
    endian_read!(read_i32, i32);
    endian_read!(read_u64, u64);
    endian_read!(read_i64, i64);
    endian_read!(read_f32, f32);
    endian_read!(read_f64, f64);

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position();
        let end = start
            .checked_add(len as u64)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > data.len() as u64 {
            return Err(Error::UnexpectedEof(end));
        }
        self.cursor.set_position(end);
        Ok(&data[start as usize..end as usize])
    }

    /// Read a fixed-size byte array such as a GUID or hash.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Advance without interpreting the bytes.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        let end = self
            .position()
            .checked_add(len)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.len() {
            return Err(Error::UnexpectedEof(end));
        }
        self.cursor.set_position(end);
        Ok(())
    }

    /// Read a NUL-terminated UTF-8 string.
    pub fn read_cstring(&mut self) -> Result<String> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        let tail = data.get(start..).ok_or(Error::UnexpectedEof(start as u64))?;
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::UnexpectedEof(data.len() as u64))?;
        self.cursor.set_position((start + nul + 1) as u64);
        Ok(String::from_utf8(tail[..nul].to_vec())?)
    }

    /// Read an `i32` length prefix followed by that many bytes of text.
    ///
    /// Invalid UTF-8 is replaced, not rejected.
    pub fn read_string(&mut self, max_len: usize) -> Result<String> {
        let pos = self.position();
        let len = self.read_i32()?;
        if len < 0 || len as usize > max_len {
            return Err(Error::invalid(format!("string length {len} at {pos}")));
        }
        let bytes = self.read_bytes(len as usize)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Advance to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: u64) -> Result<()> {
        let pos = self.position();
        let rem = pos % alignment;
        if rem != 0 {
            self.skip(alignment - rem)?;
        }
        Ok(())
    }
}
