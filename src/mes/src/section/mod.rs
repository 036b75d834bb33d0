//! Section layout and pointer resolution
//!
//! A section starts with its offset table:
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 4 | page count `n` (`i32`) |
//! | 4 | 4n | one `i32` per page |
//! | 4 + 4n | .. | page instructions |
//!
//! Each table value is either the absolute start of an inline page or a
//! packed `(page << 16) | offset` cross-reference, see [`classify_offset`].

mod decode;
mod encode;

pub use decode::decode_section;
pub use encode::{collect_declarations, encode_section, Declaration};

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

/// Size of an offset table holding `count` pages
pub fn header_len(count: usize) -> usize {
    4 + 4 * count
}

/// The per-page values at the start of a section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    pub values: Vec<i32>,
}

impl OffsetTable {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let count = cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| Error::UnexpectedEndOfSection {
                position: 0,
                needed: 4 - data.len().min(4),
            })?;
        if count < 0 {
            return Err(Error::InvalidPageCount(count));
        }

        let count = count as usize;
        let needed = count.checked_mul(4).and_then(|n| n.checked_add(4));
        match needed {
            Some(needed) if needed <= data.len() => {}
            Some(needed) => {
                return Err(Error::UnexpectedEndOfSection {
                    position: data.len(),
                    needed: needed - data.len(),
                })
            }
            None => return Err(Error::InvalidPageCount(count as i32)),
        }

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(cursor.read_i32::<LittleEndian>()?);
        }
        Ok(Self { values })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_i32::<LittleEndian>(self.values.len() as i32)?;
        for value in &self.values {
            out.write_i32::<LittleEndian>(*value)?;
        }
        Ok(())
    }

    pub fn header_len(&self) -> usize {
        header_len(self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Classify every value against the length of the section it came from
    pub fn classify(&self, section_len: usize) -> Vec<PageOffset> {
        self.values
            .iter()
            .map(|&value| classify_offset(value, section_len))
            .collect()
    }
}

/// Meaning of one offset table value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOffset {
    /// Absolute start of a page's own instructions
    Inline(i32),
    /// Byte `offset` inside the text of page `page`
    CrossReference { page: usize, offset: usize },
}

/// Classify an offset table value
///
/// A value is a cross-reference when it is negative or not below the section
/// length, and its low 16 bits are non-zero. Everything else is an inline
/// start, including `0`.
pub fn classify_offset(value: i32, section_len: usize) -> PageOffset {
    let out_of_range = value < 0 || value as i64 >= section_len as i64;

    if out_of_range && value & 0xFFFF != 0 {
        PageOffset::CrossReference {
            page: ((value >> 16) & 0xFFFF) as usize,
            offset: (value & 0xFFFF) as usize,
        }
    } else {
        PageOffset::Inline(value)
    }
}

/// Pack a cross-reference into its offset table value
pub fn cross_reference_value(page: usize, offset: usize) -> Result<i32> {
    if page > 0xFFFF {
        return Err(Error::OffsetOverflow {
            what: "referenced page index",
            value: page,
        });
    }
    if offset > 0xFFFF {
        return Err(Error::OffsetOverflow {
            what: "referenced byte offset",
            value: offset,
        });
    }
    Ok((((page as u32) << 16) | offset as u32) as i32)
}
