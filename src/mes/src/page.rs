//! Page decoder
//!
//! Turns the instruction bytes of one page into [`Entry`] tokens. Code units
//! and arguments are little-endian 16-bit values.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::entry::{Arg, ControlCode, Entry};
use crate::table::CodeTable;
use crate::{Error, Result, PAGE_TERMINATOR};

/// Decode the page occupying `data[start..end]`
///
/// `end` is clamped to the data length. Decoding stops after the page
/// terminator or at the end bound; a code unit or argument that straddles the
/// bound is an [`Error::UnexpectedEndOfSection`].
pub fn decode_page(data: &[u8], start: usize, end: usize, table: &CodeTable) -> Result<Vec<Entry>> {
    let end = end.min(data.len());
    if start >= end {
        return Ok(Vec::new());
    }

    let bytes = &data[start..end];
    let mut cursor = Cursor::new(bytes);
    let mut entries = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let code = read_word(&mut cursor, start)?;

        if !table.is_control_code(code) {
            entries.push(Entry::Character(table.map_character(code).to_string()));
            continue;
        }

        let tag = table.map_control_code(code);
        let mut args = Vec::with_capacity(tag.argument_count as usize);
        for _ in 0..tag.argument_count {
            args.push(Arg::Value(read_word(&mut cursor, start)? as i16));
        }
        entries.push(Entry::ControlCode(ControlCode {
            id: code,
            name: tag.into_owned().name,
            args,
        }));

        if code == PAGE_TERMINATOR {
            let trailing = bytes.len() - cursor.position() as usize;
            if trailing > 0 {
                debug!(
                    "page at {start:#x}: ignoring {trailing} bytes after terminator"
                );
            }
            break;
        }
    }

    Ok(entries)
}

fn read_word(cursor: &mut Cursor<&[u8]>, base: usize) -> Result<u16> {
    let position = cursor.position() as usize;
    cursor.read_u16::<LittleEndian>().map_err(|_| {
        let available = cursor.get_ref().len().saturating_sub(position);
        Error::UnexpectedEndOfSection {
            position: base + position,
            needed: 2 - available.min(2),
        }
    })
}
