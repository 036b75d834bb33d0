//! Block compression backends
//!
//! Archive code only sees the [`BlockCodec`] trait:
//! - [`Lz10`]: the format used by shipped archives (default)
//! - [`Raw`]: stores blocks uncompressed, for inspecting hand-built archives

use crate::{lz10, Result};

/// Trait for compressing and decompressing one archive block
pub trait BlockCodec: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Get the backend name for diagnostics
    fn name(&self) -> &'static str;
}

/// LZ10 backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz10;

impl BlockCodec for Lz10 {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz10::compress(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz10::decompress(data)
    }

    fn name(&self) -> &'static str {
        "lz10"
    }
}

/// Pass-through backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl BlockCodec for Raw {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

/// Get the default codec
pub fn default_codec() -> Box<dyn BlockCodec> {
    Box::new(Lz10)
}

/// Look up a codec by its [`BlockCodec::name`]
pub fn codec_by_name(name: &str) -> Option<Box<dyn BlockCodec>> {
    match name {
        "lz10" => Some(Box::new(Lz10)),
        "raw" => Some(Box::new(Raw)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_names() {
        assert_eq!(default_codec().name(), "lz10");
        assert_eq!(codec_by_name("raw").unwrap().name(), "raw");
        assert!(codec_by_name("oodle").is_none());
    }

    #[test]
    fn test_codecs_round_trip() {
        let data = b"<<0>>AAAAAAAAAAAAAAAAAAAA".to_vec();
        let codecs: [Box<dyn BlockCodec>; 2] = [Box::new(Lz10), Box::new(Raw)];
        for codec in codecs {
            let packed = codec.compress(&data).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), data, "{}", codec.name());
        }
    }
}
