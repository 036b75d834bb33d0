//! Single section command handlers

use anyhow::{Context, Result};
use mes::section::{header_len, OffsetTable, PageOffset};
use mes_archive::lz10;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::cli::MappingArgs;
use crate::mapping;

fn read_section(input: &Path, compressed: bool) -> Result<Vec<u8>> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    if compressed {
        lz10::decompress(&data).with_context(|| format!("Failed to decompress {}", input.display()))
    } else {
        Ok(data)
    }
}

/// Handle the decode command
pub fn decode(
    input: &Path,
    output: Option<&Path>,
    compressed: bool,
    mapping: &MappingArgs,
) -> Result<()> {
    let table = mapping::load_table(mapping)?;
    let section = read_section(input, compressed)?;
    let text = mes::decode_to_text(&section, &table)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Decoded {} to {}", input.display(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Handle the encode command
pub fn encode(
    input: &Path,
    output: Option<&Path>,
    compress: bool,
    mapping: &MappingArgs,
) -> Result<()> {
    let table = mapping::load_table(mapping)?;
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut data = mes::encode_from_text(&text, &table)
        .with_context(|| format!("Failed to encode {}", input.display()))?;
    if compress {
        data = lz10::compress(&data)?;
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("bin"));
    fs::write(&output, &data).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Encoded {} to {} ({} bytes)", input.display(), output.display(), data.len());
    Ok(())
}

/// Handle the inspect command
pub fn inspect(input: &Path, compressed: bool, preview: usize) -> Result<()> {
    let section = read_section(input, compressed)?;
    print!("{}", describe_section(&section, preview)?);
    Ok(())
}

/// Offset table listing with a hex preview of each inline page
fn describe_section(section: &[u8], preview: usize) -> Result<String> {
    let table = OffsetTable::read(section).context("Failed to read offset table")?;
    let mut out = String::new();

    writeln!(out, "Section: {} bytes, {} pages", section.len(), table.len())?;
    writeln!(out, "Payload starts at {:#x}", header_len(table.len()))?;

    for (index, (value, kind)) in table
        .values
        .iter()
        .zip(table.classify(section.len()))
        .enumerate()
    {
        match kind {
            PageOffset::Inline(start) if start >= 0 && (start as usize) < section.len() => {
                let start = start as usize;
                let end = (start + preview).min(section.len());
                writeln!(
                    out,
                    "  {index:>4}  {value:#010x}  inline   {}",
                    hex::encode(&section[start..end])
                )?;
            }
            PageOffset::Inline(_) => {
                writeln!(out, "  {index:>4}  {value:#010x}  inline   (outside section)")?;
            }
            PageOffset::CrossReference { page, offset } => {
                writeln!(
                    out,
                    "  {index:>4}  {value:#010x}  -> page {page} + {offset:#x}"
                )?;
            }
        }
    }

    Ok(out)
}
