//! Section encoding
//!
//! Label declarations are collected in one pass over the script, then every
//! page is serialized into a single payload buffer while the offset table is
//! filled in.

use std::collections::HashMap;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, warn};

use super::{classify_offset, cross_reference_value, header_len, OffsetTable, PageOffset};
use crate::entry::{Arg, Entry, Label, Page, Script};
use crate::table::CodeTable;
use crate::{Error, Result};

/// Where a label was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub label: Label,
    pub page: usize,
    /// Byte offset from the start of the page's instructions
    pub offset: usize,
}

/// Collect every label declared in the script's text pages
pub fn collect_declarations(script: &Script) -> Result<HashMap<Label, Declaration>> {
    let mut declarations: HashMap<Label, Declaration> = HashMap::new();

    for (page, entries) in script.pages.iter().enumerate().filter_map(|(i, p)| match p {
        Page::Text(entries) => Some((i, entries)),
        Page::Forward(_) => None,
    }) {
        let mut offset = 0;
        for entry in entries {
            if let Entry::Label(label) = entry {
                if let Some(first) = declarations.get(label) {
                    return Err(Error::DuplicateLabel {
                        label: label.clone(),
                        first: first.page,
                        second: page,
                    });
                }
                declarations.insert(
                    label.clone(),
                    Declaration {
                        label: label.clone(),
                        page,
                        offset,
                    },
                );
            }
            offset += entry.byte_width();
        }
    }

    Ok(declarations)
}

/// Encode a script into section bytes
///
/// Nothing is returned unless every page and reference encodes.
pub fn encode_section(script: &Script, table: &CodeTable) -> Result<Vec<u8>> {
    let declarations = collect_declarations(script)?;
    let header = header_len(script.len());

    let mut values = Vec::with_capacity(script.len());
    let mut forwards = Vec::new();
    let mut payload = Vec::new();

    for (index, page) in script.pages.iter().enumerate() {
        match page {
            Page::Text(entries) => {
                let start = header + payload.len();
                let value = i32::try_from(start).map_err(|_| Error::OffsetOverflow {
                    what: "page start",
                    value: start,
                })?;
                values.push(value);

                for entry in entries {
                    encode_entry(entry, index, &declarations, table, &mut payload)?;
                }
            }
            Page::Forward(label) => {
                let declared = resolve(label, index, &declarations)?;
                if declared.page >= index {
                    warn!(
                        "page {index} forwards to later page {}; decoders expect an earlier page",
                        declared.page
                    );
                }
                values.push(cross_reference_value(declared.page, declared.offset)?);
                forwards.push(index);
            }
        }
    }

    let total = header + payload.len();
    for &index in &forwards {
        let value = values[index];
        if !matches!(classify_offset(value, total), PageOffset::CrossReference { .. }) {
            warn!(
                "page {index}: reference value {value:#x} will decode as an inline start in a {total} byte section"
            );
        }
    }

    debug!(
        pages = script.len(),
        labels = declarations.len(),
        "encoded section of {total} bytes"
    );

    let mut out = Vec::with_capacity(total);
    OffsetTable { values }.write(&mut out)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

fn resolve<'a>(
    label: &Label,
    page: usize,
    declarations: &'a HashMap<Label, Declaration>,
) -> Result<&'a Declaration> {
    declarations.get(label).ok_or_else(|| Error::UnresolvedPointer {
        page,
        label: label.clone(),
    })
}

fn encode_entry(
    entry: &Entry,
    page: usize,
    declarations: &HashMap<Label, Declaration>,
    table: &CodeTable,
    out: &mut Vec<u8>,
) -> Result<()> {
    match entry {
        Entry::Character(grapheme) => {
            out.write_u16::<LittleEndian>(table.map_grapheme(grapheme))?;
        }
        Entry::ControlCode(code) => {
            out.write_u16::<LittleEndian>(code.id)?;
            for arg in &code.args {
                match arg {
                    Arg::Value(value) => out.write_i16::<LittleEndian>(*value)?,
                    Arg::Label(label) => {
                        let offset = resolve(label, page, declarations)?.offset;
                        let offset = u16::try_from(offset).map_err(|_| Error::OffsetOverflow {
                            what: "label offset",
                            value: offset,
                        })?;
                        out.write_u16::<LittleEndian>(offset)?;
                    }
                }
            }
        }
        Entry::Label(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ControlCode;
    use crate::test_support::table;

    fn chars(text: &str) -> Vec<Entry> {
        text.chars().map(|c| Entry::Character(c.to_string())).collect()
    }

    fn code(id: u16, name: &str, args: Vec<Arg>) -> Entry {
        Entry::ControlCode(ControlCode {
            id,
            name: name.to_string(),
            args,
        })
    }

    #[test]
    fn test_collect_declarations() {
        let mut page = chars("AB");
        page.push(Entry::Label(Label::Named("mid".into())));
        page.push(code(0x40, "sound", vec![Arg::Value(1), Arg::Value(2)]));
        page.push(Entry::Label(Label::Pointer(0)));

        let script = Script::new(vec![Page::Text(chars("C")), Page::Text(page)]);
        let declarations = collect_declarations(&script).unwrap();

        let mid = &declarations[&Label::Named("mid".into())];
        assert_eq!((mid.page, mid.offset), (1, 4));
        let end = &declarations[&Label::Pointer(0)];
        assert_eq!((end.page, end.offset), (1, 10));
    }

    #[test]
    fn test_duplicate_declaration() {
        let label = Entry::Label(Label::Named("here".into()));
        let script = Script::new(vec![
            Page::Text(vec![label.clone()]),
            Page::Text(vec![label]),
        ]);
        assert!(matches!(
            collect_declarations(&script),
            Err(Error::DuplicateLabel {
                first: 0,
                second: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_forward_page_value() {
        let table = table();
        let mut page = chars("A");
        page.push(Entry::Label(Label::Pointer(0)));
        page.extend(chars("B"));

        let script = Script::new(vec![
            Page::Text(chars("C")),
            Page::Text(page),
            Page::Forward(Label::Pointer(0)),
        ]);
        let data = encode_section(&script, &table).unwrap();

        let offsets = OffsetTable::read(&data).unwrap();
        assert_eq!(offsets.values, vec![16, 18, 0x0001_0002]);
        assert_eq!(&data[16..], &[0x83, 0x00, 0x81, 0x00, 0x82, 0x00]);
    }

    #[test]
    fn test_label_argument_resolves_to_offset() {
        let table = table();
        let label = Label::Named("retry".into());
        let mut page = chars("AB");
        page.push(Entry::Label(label.clone()));
        page.push(code(0x35, "cond_jmp", vec![Arg::Value(3), Arg::Label(label)]));

        let data = encode_section(&Script::new(vec![Page::Text(page)]), &table).unwrap();
        assert_eq!(
            &data[8..],
            &[0x81, 0x00, 0x82, 0x00, 0x35, 0x00, 0x03, 0x00, 0x04, 0x00]
        );
    }

    #[test]
    fn test_unresolved_argument() {
        let table = table();
        let page = vec![code(
            0x35,
            "cond_jmp",
            vec![Arg::Value(0), Arg::Label(Label::Conditional(9))],
        )];
        let result = encode_section(&Script::new(vec![Page::Text(page)]), &table);
        assert!(matches!(
            result,
            Err(Error::UnresolvedPointer {
                page: 0,
                label: Label::Conditional(9)
            })
        ));
    }

    #[test]
    fn test_empty_script() {
        let table = table();
        let data = encode_section(&Script::default(), &table).unwrap();
        assert_eq!(data, vec![0, 0, 0, 0]);
    }
}
