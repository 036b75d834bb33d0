//! LZ10 compression
//!
//! Tokens are grouped in eights behind a flag byte, read from the most
//! significant bit. A clear bit is a literal byte. A set bit is a big-endian
//! `u16` back-reference: length `3 + (v >> 12)`, distance `(v & 0xFFF) + 1`.

use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

/// Compression type byte
pub const LZ10_TYPE: u8 = 0x10;

/// Largest size the 24-bit header can describe
pub const MAX_SIZE: usize = 0xFF_FFFF;

const HEADER_SIZE: usize = 4;
const WINDOW: usize = 0x1000;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 18;

/// Decompress an LZ10 block
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_SIZE {
        return Err(Error::DataTooShort {
            needed: HEADER_SIZE,
            actual: data.len(),
        });
    }

    let mut cursor = Cursor::new(data);
    let kind = cursor.read_u8()?;
    if kind != LZ10_TYPE {
        return Err(Error::InvalidCompressionType(kind));
    }
    let size = cursor.read_u24::<LittleEndian>()? as usize;

    let mut out = Vec::with_capacity(size);
    let truncated = |actual: usize| Error::DecompressionSize {
        expected: size,
        actual,
    };

    while out.len() < size {
        let flags = cursor.read_u8().map_err(|_| truncated(out.len()))?;

        for bit in (0..8).rev() {
            if out.len() >= size {
                break;
            }

            if flags & (1 << bit) == 0 {
                let byte = cursor.read_u8().map_err(|_| truncated(out.len()))?;
                out.push(byte);
                continue;
            }

            let reference = cursor
                .read_u16::<BigEndian>()
                .map_err(|_| truncated(out.len()))?;
            let length = MIN_MATCH + (reference >> 12) as usize;
            let distance = (reference & 0xFFF) as usize + 1;
            if distance > out.len() {
                return Err(Error::InvalidBackReference {
                    position: out.len(),
                    distance,
                });
            }

            // Copy byte by byte: the source may overlap what is being written
            let start = out.len() - distance;
            for i in 0..length.min(size - out.len()) {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }

    Ok(out)
}

/// Compress data as an LZ10 block (greedy longest match)
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_SIZE {
        return Err(Error::TooLarge {
            size: data.len(),
            max: MAX_SIZE,
        });
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + data.len() + data.len() / 8 + 1);
    out.push(LZ10_TYPE);
    out.write_u24::<LittleEndian>(data.len() as u32)?;

    let mut pos = 0;
    while pos < data.len() {
        let flag_index = out.len();
        out.push(0);

        for bit in (0..8).rev() {
            if pos >= data.len() {
                break;
            }

            match longest_match(data, pos) {
                Some((length, distance)) => {
                    out[flag_index] |= 1 << bit;
                    let reference = (((length - MIN_MATCH) as u16) << 12) | (distance - 1) as u16;
                    out.write_u16::<BigEndian>(reference)?;
                    pos += length;
                }
                None => {
                    out.push(data[pos]);
                    pos += 1;
                }
            }
        }
    }

    Ok(out)
}

/// Longest earlier occurrence of the bytes at `pos`, as `(length, distance)`
fn longest_match(data: &[u8], pos: usize) -> Option<(usize, usize)> {
    let max_len = MAX_MATCH.min(data.len() - pos);
    if max_len < MIN_MATCH {
        return None;
    }

    let window_start = pos.saturating_sub(WINDOW);
    let mut best: Option<(usize, usize)> = None;

    for candidate in (window_start..pos).rev() {
        let length = (0..max_len)
            .take_while(|&k| data[candidate + k] == data[pos + k])
            .count();

        if length >= MIN_MATCH && best.map_or(true, |(best_len, _)| length > best_len) {
            best = Some((length, pos - candidate));
            if length == max_len {
                break;
            }
        }
    }

    best
}
