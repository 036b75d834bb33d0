//! Archive command handlers
//!
//! Handles `extract`, `create` and `verify`. Sections are independent, so
//! they are decompressed and decoded in parallel.

use anyhow::{bail, Context, Result};
use mes::CodeTable;
use mes_archive::{BlockCodec, ARCHIVE_NAME};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::cli::{CodecKind, MappingArgs};
use crate::file_utils;
use crate::mapping;

/// Handle the extract command
pub fn extract(
    input: &Path,
    output: Option<&Path>,
    mapping: &MappingArgs,
    codec: CodecKind,
) -> Result<()> {
    let table = mapping::load_table(mapping)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_extract_dir(input));

    let written = extract_archive(input, &output, &table, codec.codec().as_ref())?;
    println!("Extracted {} sections to {}", written, output.display());
    Ok(())
}

/// Handle the create command
pub fn create(
    input: &Path,
    output: Option<&Path>,
    mapping: &MappingArgs,
    codec: CodecKind,
) -> Result<()> {
    let table = mapping::load_table(mapping)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.join(ARCHIVE_NAME));

    let count = create_archive(input, &output, &table, codec.codec().as_ref())?;
    println!("Packed {} sections into {}", count, output.display());
    Ok(())
}

/// Handle the verify command
pub fn verify(input: &Path, mapping: &MappingArgs, codec: CodecKind) -> Result<()> {
    let table = mapping::load_table(mapping)?;
    let report = verify_archive(input, &table, codec.codec().as_ref())?;

    for (index, problem) in &report.problems {
        println!("Section {index:03}: {problem}");
    }
    println!(
        "{} of {} sections round-trip unchanged",
        report.total - report.problems.len(),
        report.total
    );

    if !report.problems.is_empty() {
        bail!("{} sections differ after re-encoding", report.problems.len());
    }
    Ok(())
}

/// Directory named after the archive's file stem, next to it
fn default_extract_dir(input: &Path) -> PathBuf {
    input.with_extension("")
}

fn read_archive(input: &Path) -> Result<Vec<u8>> {
    fs::read(input).with_context(|| format!("Failed to read archive {}", input.display()))
}

fn decode_block(block: &[u8], table: &CodeTable, codec: &dyn BlockCodec) -> Result<String> {
    let section = codec.decompress(block).context("Failed to decompress")?;
    Ok(mes::decode_to_text(&section, table)?)
}

/// Decode every section into `output`, returning the number written
///
/// Sections that fail are reported and skipped; the call still fails afterwards.
pub fn extract_archive(
    input: &Path,
    output: &Path,
    table: &CodeTable,
    codec: &dyn BlockCodec,
) -> Result<usize> {
    let data = read_archive(input)?;
    let blocks = mes_archive::blocks(&data)
        .with_context(|| format!("Failed to read archive {}", input.display()))?;
    info!(sections = blocks.len(), codec = codec.name(), "extracting {}", input.display());

    let results: Vec<Result<String>> = blocks
        .par_iter()
        .map(|block| decode_block(block, table, codec))
        .collect();

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create directory {}", output.display()))?;

    let mut written = 0;
    let mut failed = 0;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(text) => {
                let path = output.join(file_utils::section_file_name(index));
                fs::write(&path, text)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                written += 1;
            }
            Err(e) => {
                error!("section {index:03}: {e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!(
            "{failed} of {} sections failed to decode ({written} written)",
            written + failed
        );
    }
    Ok(written)
}

fn encode_file(path: &Path, table: &CodeTable, codec: &dyn BlockCodec) -> Result<Vec<u8>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let section = mes::encode_from_text(&text, table)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    codec
        .compress(&section)
        .with_context(|| format!("Failed to compress {}", path.display()))
}

/// Encode the `.txt` files of `input` into an archive, returning the section count
///
/// Nothing is written unless every section encodes.
pub fn create_archive(
    input: &Path,
    output: &Path,
    table: &CodeTable,
    codec: &dyn BlockCodec,
) -> Result<usize> {
    if !input.is_dir() {
        bail!("{} has to be an existing directory", input.display());
    }

    let files = file_utils::collect_files_with_extension(input, &["txt"])?;
    if files.is_empty() {
        bail!("No .txt sections found in {}", input.display());
    }
    info!(sections = files.len(), codec = codec.name(), "creating {}", output.display());

    let blocks = files
        .par_iter()
        .map(|path| encode_file(path, table, codec))
        .collect::<Result<Vec<_>>>()?;

    let archive = mes_archive::pack_blocks(&blocks)?;
    fs::write(output, archive)
        .with_context(|| format!("Failed to write archive {}", output.display()))?;

    Ok(blocks.len())
}

/// Outcome of a verify run
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub total: usize,
    /// Section index and what went wrong
    pub problems: Vec<(usize, String)>,
}

fn verify_block(block: &[u8], table: &CodeTable, codec: &dyn BlockCodec) -> Result<Option<String>> {
    let section = codec.decompress(block).context("Failed to decompress")?;
    let text = mes::decode_to_text(&section, table).context("Failed to decode")?;
    let rebuilt = mes::encode_from_text(&text, table).context("Failed to re-encode")?;

    if rebuilt == section {
        return Ok(None);
    }

    let first_difference = section
        .iter()
        .zip(&rebuilt)
        .position(|(a, b)| a != b)
        .unwrap_or(section.len().min(rebuilt.len()));
    Ok(Some(format!(
        "rebuilt {} bytes (original {}), first difference at byte {:#x}",
        rebuilt.len(),
        section.len(),
        first_difference
    )))
}

/// Decode and re-encode every section in memory
pub fn verify_archive(input: &Path, table: &CodeTable, codec: &dyn BlockCodec) -> Result<VerifyReport> {
    let data = read_archive(input)?;
    let blocks = mes_archive::blocks(&data)
        .with_context(|| format!("Failed to read archive {}", input.display()))?;

    let problems = blocks
        .par_iter()
        .enumerate()
        .filter_map(|(index, block)| match verify_block(block, table, codec) {
            Ok(None) => None,
            Ok(Some(difference)) => Some((index, difference)),
            Err(e) => Some((index, format!("{e:#}"))),
        })
        .collect();

    Ok(VerifyReport {
        total: blocks.len(),
        problems,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_archive::{Lz10, Raw};

    const MAPPING: &str = r#"{
        "tags": {
            "0x02": { "name": "wait" },
            "0x0D": { "name": "end" },
            "0x35": { "name": "cond_jmp", "count": 2 }
        },
        "characters": { "0x80": " ", "0x81": "A", "0x82": "B", "0x83": "C" }
    }"#;

    const FIRST: &str = "<<0>>\nAB<wait><end>\n\n<<1>>\nC<@pointer0>A<end>\n\n<<2>>\n<Pointer: @pointer0>\n\n";
    const SECOND: &str = "<<0>>\nA<@condPointer0>B<cond_jmp: 0 @condPointer0><end>\n\n";

    fn table() -> CodeTable {
        CodeTable::from_json(MAPPING, None).unwrap()
    }

    fn write_sections(dir: &Path) {
        fs::write(dir.join("000.txt"), FIRST).unwrap();
        fs::write(dir.join("001.txt"), SECOND).unwrap();
    }

    #[test]
    fn test_create_then_extract() {
        let table = table();
        let source = tempfile::tempdir().unwrap();
        write_sections(source.path());

        let archive = source.path().join(ARCHIVE_NAME);
        assert_eq!(create_archive(source.path(), &archive, &table, &Lz10).unwrap(), 2);

        let target = tempfile::tempdir().unwrap();
        let written = extract_archive(&archive, target.path(), &table, &Lz10).unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs::read_to_string(target.path().join("000.txt")).unwrap(), FIRST);
        assert_eq!(fs::read_to_string(target.path().join("001.txt")).unwrap(), SECOND);

        let report = verify_archive(&archive, &table, &Lz10).unwrap();
        assert_eq!(report.total, 2);
        assert!(report.problems.is_empty());
    }

    #[test]
    fn test_create_fails_without_writing() {
        let table = table();
        let source = tempfile::tempdir().unwrap();
        write_sections(source.path());
        fs::write(source.path().join("002.txt"), "<<0>>\n<bogus>").unwrap();

        let archive = source.path().join(ARCHIVE_NAME);
        let err = create_archive(source.path(), &archive, &table, &Lz10).unwrap_err();
        assert!(format!("{err:#}").contains("002.txt"));
        assert!(!archive.exists());
    }

    #[test]
    fn test_create_requires_sections() {
        let table = table();
        let source = tempfile::tempdir().unwrap();
        let archive = source.path().join(ARCHIVE_NAME);
        assert!(create_archive(source.path(), &archive, &table, &Lz10).is_err());
    }

    #[test]
    fn test_extract_reports_bad_sections() {
        let table = table();
        let dir = tempfile::tempdir().unwrap();

        let good = mes::encode_from_text(SECOND, &table).unwrap();
        let bad = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let archive = dir.path().join(ARCHIVE_NAME);
        fs::write(&archive, mes_archive::pack_blocks(&[bad, good]).unwrap()).unwrap();

        let target = dir.path().join("out");
        let err = extract_archive(&archive, &target, &table, &Raw).unwrap_err();
        assert!(err.to_string().contains("1 of 2 sections failed"));
        assert!(!target.join("000.txt").exists());
        assert!(target.join("001.txt").exists());
    }

    #[test]
    fn test_verify_reports_differences() {
        let table = table();
        let dir = tempfile::tempdir().unwrap();

        // Trailing bytes after the terminator are dropped when decoding
        let mut section = mes::encode_from_text(SECOND, &table).unwrap();
        section.extend_from_slice(&[0x81, 0x00]);
        let archive = dir.path().join(ARCHIVE_NAME);
        fs::write(&archive, mes_archive::pack_blocks(&[section]).unwrap()).unwrap();

        let report = verify_archive(&archive, &table, &Raw).unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].1.contains("first difference"));
    }

    #[test]
    fn test_default_extract_dir() {
        assert_eq!(
            default_extract_dir(Path::new("data/mes_all.bin")),
            PathBuf::from("data/mes_all")
        );
    }
}
