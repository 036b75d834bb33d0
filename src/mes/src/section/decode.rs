//! Section decoding
//!
//! Pages are decoded in offset table order. Cross-references and conditional
//! jumps only *plan* label insertions, keyed by entry index; each page's token
//! list is built once at the end.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{OffsetTable, PageOffset};
use crate::entry::{Arg, Entry, Label, Page, Script};
use crate::page::decode_page;
use crate::table::CodeTable;
use crate::{Error, Result, EXTERNAL_JUMP_FLAG};

/// Decode a whole section into a [`Script`]
pub fn decode_section(data: &[u8], table: &CodeTable) -> Result<Script> {
    let offsets = OffsetTable::read(data)?;
    let kinds = offsets.classify(data.len());

    let mut slots: Vec<Slot> = Vec::with_capacity(kinds.len());
    let mut pointers = 0u32;
    let mut conditionals = 0u32;

    for (index, kind) in kinds.iter().enumerate() {
        match *kind {
            PageOffset::Inline(value) => {
                if value < 0 {
                    return Err(Error::InvalidPageOffset { page: index, value });
                }
                let start = value as usize;
                if start > data.len() {
                    warn!(
                        "page {index} starts at {start:#x}, past the section end {:#x}; decoding it as empty",
                        data.len()
                    );
                }

                let end = page_end(&kinds[index + 1..], start, data.len());
                let mut plan = PagePlan::new(decode_page(data, start, end, table)?);
                plan.label_conditional_jumps(index, &mut conditionals);
                slots.push(Slot::Text(plan));
            }
            PageOffset::CrossReference { page: target, offset } => {
                let Some(Slot::Text(plan)) = slots.get_mut(target) else {
                    return Err(Error::DanglingReference { page: index, target });
                };
                let position = plan.boundary_at_or_after(offset);
                let placed = plan.offsets[position];
                if placed != offset {
                    warn!(
                        "page {index}: reference into page {target} at {offset:#x} is not an entry boundary, labelling {placed:#x} instead"
                    );
                }

                let label = Label::Pointer(pointers);
                pointers += 1;
                plan.insert(position, label.clone());
                slots.push(Slot::Forward(label));
            }
        }
    }

    debug!(
        pages = slots.len(),
        pointers, conditionals, "decoded section of {} bytes",
        data.len()
    );

    Ok(Script::new(slots.into_iter().map(Slot::into_page).collect()))
}

/// End bound for a page: the next inline start not before `start`
fn page_end(following: &[PageOffset], start: usize, section_len: usize) -> usize {
    following
        .iter()
        .find_map(|kind| match *kind {
            PageOffset::Inline(value) if value >= 0 && value as usize >= start => {
                Some(value as usize)
            }
            _ => None,
        })
        .unwrap_or(section_len)
        .min(section_len)
}

enum Slot {
    Text(PagePlan),
    Forward(Label),
}

impl Slot {
    fn into_page(self) -> Page {
        match self {
            Self::Text(plan) => Page::Text(plan.into_entries()),
            Self::Forward(label) => Page::Forward(label),
        }
    }
}

/// Decoded entries plus the labels to insert before them
struct PagePlan {
    entries: Vec<Entry>,
    /// `offsets[i]` is the byte offset of `entries[i]`; the last value is the page length
    offsets: Vec<usize>,
    /// Entry index -> labels declared before it (`entries.len()` for the page end)
    labels: BTreeMap<usize, Vec<Label>>,
}

impl PagePlan {
    fn new(entries: Vec<Entry>) -> Self {
        let mut offsets = Vec::with_capacity(entries.len() + 1);
        let mut running = 0;
        offsets.push(running);
        for entry in &entries {
            running += entry.byte_width();
            offsets.push(running);
        }

        Self {
            entries,
            offsets,
            labels: BTreeMap::new(),
        }
    }

    /// Entry index starting at byte `offset`, if it is an entry boundary
    fn boundary_index(&self, offset: usize) -> Option<usize> {
        self.offsets.binary_search(&offset).ok()
    }

    /// First entry boundary at or after byte `offset`, clamped to the page end
    fn boundary_at_or_after(&self, offset: usize) -> usize {
        self.offsets
            .partition_point(|&o| o < offset)
            .min(self.entries.len())
    }

    fn insert(&mut self, position: usize, label: Label) {
        self.labels.entry(position).or_default().push(label);
    }

    fn label_conditional_jumps(&mut self, page: usize, next_id: &mut u32) {
        for index in 0..self.entries.len() {
            let (check, target) = match &self.entries[index] {
                Entry::ControlCode(code) if code.is_conditional_jump() => {
                    match code.args.as_slice() {
                        [Arg::Value(check), Arg::Value(target), ..] => (*check, *target),
                        _ => continue,
                    }
                }
                _ => continue,
            };

            // External jumps address another section's table and stay numeric
            if check & EXTERNAL_JUMP_FLAG != 0 {
                continue;
            }

            let offset = target as u16 as usize;
            let Some(position) = self.boundary_index(offset) else {
                warn!(
                    "page {page}: conditional jump target {offset} is not an entry boundary, keeping it numeric"
                );
                continue;
            };

            let label = Label::Conditional(*next_id);
            *next_id += 1;
            self.insert(position, label.clone());
            if let Entry::ControlCode(code) = &mut self.entries[index] {
                code.args[1] = Arg::Label(label);
            }
        }
    }

    fn into_entries(self) -> Vec<Entry> {
        let label_count: usize = self.labels.values().map(Vec::len).sum();
        let mut labels = self.labels;
        let mut out = Vec::with_capacity(self.entries.len() + label_count);

        for (index, entry) in self.entries.into_iter().enumerate() {
            if let Some(declared) = labels.remove(&index) {
                out.extend(declared.into_iter().map(Entry::Label));
            }
            out.push(entry);
        }
        for declared in labels.into_values() {
            out.extend(declared.into_iter().map(Entry::Label));
        }

        out
    }
}
