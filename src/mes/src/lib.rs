//! # mes
//!
//! Codec for the paged dialogue scripts used by the adventure game engine's
//! message archives.
//!
//! A decompressed *section* is an offset table followed by the raw
//! instruction bytes of its pages:
//!
//! - Bytes 0-3: page count (`i32`, little-endian)
//! - Next `4 × count` bytes: one `i32` per page, either the absolute start of
//!   the page's instructions or a packed `(page << 16) | offset` reference into
//!   an earlier page
//! - Remaining: concatenated page instructions (16-bit code units)
//!
//! Decoding turns a section into a [`Script`] (pages of [`Entry`] tokens) and
//! renders it as editable markup; encoding parses the markup back and rebuilds
//! the offset table and page bytes.
//!
//! ## Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = mes::CodeTable::load("mappings/aa1_us.json", None)?;
//! let section = std::fs::read("000.bin")?;
//!
//! let text = mes::decode_to_text(&section, &table)?;
//! let rebuilt = mes::encode_from_text(&text, &table)?;
//! assert_eq!(rebuilt, section);
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod page;
pub mod section;
pub mod table;
pub mod text;

#[doc(inline)]
pub use entry::{Arg, ControlCode, Entry, Label, Page, Script};
#[doc(inline)]
pub use page::decode_page;
#[doc(inline)]
pub use section::{
    classify_offset, collect_declarations, decode_section, encode_section, Declaration,
    OffsetTable, PageOffset,
};
#[doc(inline)]
pub use table::{CharacterTable, Code, CodeTable, Mapping, Tag, TagSpec};
#[doc(inline)]
pub use text::{parse_script, render_script};

/// Control code that ends a page
pub const PAGE_TERMINATOR: u16 = 0x0D;

/// Control code of the conditional jump instruction
pub const CONDITIONAL_JUMP: u16 = 0x35;

/// Bit in a conditional jump's first argument selecting the external addressing mode
pub const EXTERNAL_JUMP_FLAG: i16 = 0x80;

/// Errors from section decoding, encoding and mapping loading
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unexpected end of section at byte {position} (needed {needed} more bytes)")]
    UnexpectedEndOfSection { position: usize, needed: usize },

    #[error("Invalid page count: {0}")]
    InvalidPageCount(i32),

    #[error("Page {page} starts at invalid offset {value:#x}")]
    InvalidPageOffset { page: usize, value: i32 },

    #[error("Page {page} references page {target}, which is not an earlier text page")]
    DanglingReference { page: usize, target: usize },

    #[error("Unknown tag <{name}> in page {page}")]
    UnknownTag { page: usize, name: String },

    #[error("Malformed tag in page {page}: {reason} (near {fragment:?})")]
    MalformedTag {
        page: usize,
        fragment: String,
        reason: &'static str,
    },

    #[error("Text outside of any page: {fragment:?}")]
    StrayText { fragment: String },

    #[error("Unresolved pointer @{label} in page {page}")]
    UnresolvedPointer { page: usize, label: Label },

    #[error("Label @{label} declared twice (pages {first} and {second})")]
    DuplicateLabel {
        label: Label,
        first: usize,
        second: usize,
    },

    #[error("{what} {value:#x} does not fit the binary format")]
    OffsetOverflow { what: &'static str, value: usize },

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Failed to parse mapping: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decode a section and render it as markup text
pub fn decode_to_text(section: &[u8], table: &CodeTable) -> Result<String> {
    let script = decode_section(section, table)?;
    Ok(render_script(&script))
}

/// Parse markup text and encode it as a section
pub fn encode_from_text(text: &str, table: &CodeTable) -> Result<Vec<u8>> {
    let script = parse_script(text, table)?;
    encode_section(&script, table)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::table::CodeTable;

    /// Small mapping used across the crate's tests.
    ///
    /// Characters start at 0x80 ('A'..'E' and a few punctuation marks),
    /// `0x89` is a backslash, `0x0D` is the page terminator and `0x35` the conditional jump.
    pub const MAPPING: &str = r#"{
        "tags": {
            "0x01": { "name": "color", "count": 1 },
            "0x02": { "name": "wait", "count": 0 },
            "0x0D": { "name": "end", "count": 0 },
            "0x35": { "name": "cond_jmp", "count": 2 },
            "0x40": { "name": "sound", "count": 2 }
        },
        "characters": {
            "0x80": "?",
            "0x81": "A",
            "0x82": "B",
            "0x83": "C",
            "0x84": "D",
            "0x85": "E",
            "0x86": "<",
            "0x87": ">",
            "0x88": " ",
            "0x89": "\\"
        },
        "variants": {
            "edited": {
                "0x81": "a",
                "0x90": "é"
            }
        }
    }"#;

    pub fn table() -> CodeTable {
        CodeTable::from_json(MAPPING, None).unwrap()
    }

    pub fn edited_table() -> CodeTable {
        CodeTable::from_json(MAPPING, Some("edited")).unwrap()
    }

    /// Build a section from an offset table and payload words
    pub fn section(offsets: &[i32], payload: &[u16]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(offsets.len() as i32).to_le_bytes());
        for offset in offsets {
            data.extend_from_slice(&offset.to_le_bytes());
        }
        for word in payload {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{section, table};
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnexpectedEndOfSection {
            position: 12,
            needed: 2,
        };
        assert!(err.to_string().contains("byte 12"));

        let err = Error::UnresolvedPointer {
            page: 3,
            label: Label::Named("missing".to_string()),
        };
        assert!(err.to_string().contains("@missing"));
        assert!(err.to_string().contains("page 3"));

        let err = Error::UnknownTag {
            page: 1,
            name: "bogus".to_string(),
        };
        assert!(err.to_string().contains("<bogus>"));
    }

    #[test]
    fn test_text_round_trip() {
        let table = table();
        // page 1 is "AB" <wait> <end>, page 2 points at byte 2 of page 1
        let data = section(
            &[16, 20, 0x0001_0002],
            &[0x81, 0x0D, 0x81, 0x82, 0x02, 0x0D],
        );

        let text = decode_to_text(&data, &table).unwrap();
        assert_eq!(
            text,
            "<<0>>\nA<end>\n\n<<1>>\nA<@pointer0>B<wait><end>\n\n<<2>>\n<Pointer: @pointer0>\n\n"
        );

        let rebuilt = encode_from_text(&text, &table).unwrap();
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn test_encode_failure_produces_no_output() {
        let table = table();
        let result = encode_from_text("<<0>>\n<Pointer: @nowhere>\n", &table);
        assert!(matches!(result, Err(Error::UnresolvedPointer { page: 0, .. })));
    }
}
