//! Multi-section archive container

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::codec::BlockCodec;
use crate::{Error, Result};

const ALIGNMENT: usize = 4;

/// Location of one compressed section inside an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub offset: usize,
    pub size: usize,
}

/// Size of the entry table for `count` sections
fn table_len(count: usize) -> usize {
    4 + 8 * count
}

fn align(value: usize) -> usize {
    (value + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Read and validate the entry table
pub fn read_entries(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut cursor = Cursor::new(data);
    let count = cursor.read_i32::<LittleEndian>().map_err(|_| Error::DataTooShort {
        needed: 4,
        actual: data.len(),
    })?;
    if count < 0 {
        return Err(Error::InvalidEntryCount(count));
    }

    let count = count as usize;
    let needed = table_len(count);
    if needed > data.len() {
        return Err(Error::DataTooShort {
            needed,
            actual: data.len(),
        });
    }

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let offset = cursor.read_i32::<LittleEndian>()?;
        let size = cursor.read_i32::<LittleEndian>()?;

        let in_bounds = offset >= 0
            && size >= 0
            && (offset as usize)
                .checked_add(size as usize)
                .is_some_and(|end| end <= data.len());
        if !in_bounds {
            return Err(Error::InvalidEntry {
                index,
                offset,
                size,
            });
        }

        entries.push(ArchiveEntry {
            offset: offset as usize,
            size: size as usize,
        });
    }

    Ok(entries)
}

/// Borrow every compressed block of an archive, in table order
pub fn blocks(data: &[u8]) -> Result<Vec<&[u8]>> {
    Ok(read_entries(data)?
        .into_iter()
        .map(|entry| &data[entry.offset..entry.offset + entry.size])
        .collect())
}

/// Decompress every section of an archive
pub fn unpack(data: &[u8], codec: &dyn BlockCodec) -> Result<Vec<Vec<u8>>> {
    let blocks = blocks(data)?;
    debug!(sections = blocks.len(), codec = codec.name(), "unpacking archive");
    blocks.into_iter().map(|block| codec.decompress(block)).collect()
}

/// Lay out already compressed blocks as an archive
///
/// Blocks start on 4-byte boundaries; padding bytes are zero.
pub fn pack_blocks<B: AsRef<[u8]>>(blocks: &[B]) -> Result<Vec<u8>> {
    let mut entries = Vec::with_capacity(blocks.len());
    let mut offset = table_len(blocks.len());
    for block in blocks {
        let size = block.as_ref().len();
        entries.push(ArchiveEntry { offset, size });
        offset = align(offset + size);
    }

    let total = entries.last().map_or(table_len(0), |e| e.offset + e.size);
    let max = i32::MAX as usize;
    if total > max {
        return Err(Error::TooLarge { size: total, max });
    }

    let mut out = Vec::with_capacity(total);
    out.write_i32::<LittleEndian>(blocks.len() as i32)?;
    for entry in &entries {
        out.write_i32::<LittleEndian>(entry.offset as i32)?;
        out.write_i32::<LittleEndian>(entry.size as i32)?;
    }
    for (entry, block) in entries.iter().zip(blocks) {
        out.resize(entry.offset, 0);
        out.extend_from_slice(block.as_ref());
    }

    Ok(out)
}

/// Compress sections and pack them as an archive
pub fn pack<S: AsRef<[u8]>>(sections: &[S], codec: &dyn BlockCodec) -> Result<Vec<u8>> {
    let blocks = sections
        .iter()
        .map(|section| codec.compress(section.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    debug!(sections = blocks.len(), codec = codec.name(), "packing archive");
    pack_blocks(&blocks)
}
