//! Message archive container and block compression
//!
//! # Format Overview
//!
//! ## Archive (`mes_all.bin`)
//!
//! - Bytes 0-3: section count `n` (`i32`, little-endian)
//! - Next `8 × n` bytes: `(offset, size)` pair per section (`i32` each)
//! - Remaining: compressed sections, each starting on a 4-byte boundary
//!
//! ## LZ10 block
//!
//! - Byte 0: `0x10`
//! - Bytes 1-3: decompressed size (24-bit little-endian)
//! - Remaining: flag byte + 8 tokens, repeated (see [`lz10`])

pub mod archive;
pub mod codec;
pub mod lz10;

pub use archive::{blocks, pack, pack_blocks, read_entries, unpack, ArchiveEntry};
pub use codec::{codec_by_name, default_codec, BlockCodec, Lz10, Raw};

/// Default archive file name
pub const ARCHIVE_NAME: &str = "mes_all.bin";

/// Errors from archive and compression handling
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Data too short: need {needed} bytes, got {actual}")]
    DataTooShort { needed: usize, actual: usize },

    #[error("Invalid section count: {0}")]
    InvalidEntryCount(i32),

    #[error("Section {index} (offset {offset:#x}, size {size:#x}) lies outside the archive")]
    InvalidEntry { index: usize, offset: i32, size: i32 },

    #[error("Invalid compression type: expected 0x10, got 0x{0:02x}")]
    InvalidCompressionType(u8),

    #[error("Back-reference at byte {position} reaches {distance} bytes back, before the start")]
    InvalidBackReference { position: usize, distance: usize },

    #[error("Decompression size mismatch: expected {expected}, got {actual}")]
    DecompressionSize { expected: usize, actual: usize },

    #[error("Data of {size} bytes exceeds the maximum of {max}")]
    TooLarge { size: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
