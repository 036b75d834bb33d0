//! Decoded section model
//!
//! A [`Script`] is an ordered list of [`Page`]s. Text pages hold [`Entry`]
//! tokens; forwarding pages only name the label they start at.

use std::fmt;

use crate::CONDITIONAL_JUMP;

const POINTER_PREFIX: &str = "pointer";
const CONDITIONAL_PREFIX: &str = "condPointer";

/// Tag name of a forwarding page, reserved in the markup
pub(crate) const FORWARD_TAG: &str = "Pointer";

/// Name of a jump target inside a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Target of a forwarding page (`pointerN`)
    Pointer(u32),
    /// Target of a conditional jump (`condPointerN`)
    Conditional(u32),
    /// Any other user-chosen name
    Named(String),
}

impl Label {
    /// Parse a label name (without the leading `@`)
    ///
    /// Only canonical decimal suffixes map to the numbered variants, so
    /// `Label::parse(s).to_string() == s` always holds.
    pub fn parse(name: &str) -> Self {
        if let Some(n) = name.strip_prefix(CONDITIONAL_PREFIX).and_then(canonical_number) {
            return Self::Conditional(n);
        }
        if let Some(n) = name.strip_prefix(POINTER_PREFIX).and_then(canonical_number) {
            return Self::Pointer(n);
        }
        Self::Named(name.to_string())
    }
}

fn canonical_number(digits: &str) -> Option<u32> {
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if canonical {
        digits.parse().ok()
    } else {
        None
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pointer(n) => write!(f, "{POINTER_PREFIX}{n}"),
            Self::Conditional(n) => write!(f, "{CONDITIONAL_PREFIX}{n}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Control code argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Value(i16),
    /// Byte offset of a label, resolved when encoding
    Label(Label),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Label(label) => write!(f, "@{label}"),
        }
    }
}

/// A control code with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCode {
    pub id: u16,
    pub name: String,
    pub args: Vec<Arg>,
}

impl ControlCode {
    pub fn is_conditional_jump(&self) -> bool {
        self.id == CONDITIONAL_JUMP
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            let sep = if i == 0 { ": " } else { " " };
            write!(f, "{sep}{arg}")?;
        }
        f.write_str(">")
    }
}

/// One token of a text page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A displayed grapheme
    Character(String),
    ControlCode(ControlCode),
    /// Zero-width jump target declaration
    Label(Label),
}

impl Entry {
    /// Number of bytes this entry occupies in a section
    pub fn byte_width(&self) -> usize {
        match self {
            Self::Character(_) => 2,
            Self::ControlCode(code) => 2 + 2 * code.args.len(),
            Self::Label(_) => 0,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character(grapheme) => {
                for c in grapheme.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '<' => f.write_str("\\<")?,
                        '>' => f.write_str("\\>")?,
                        c => write!(f, "{c}")?,
                    }
                }
                Ok(())
            }
            Self::ControlCode(code) => code.fmt(f),
            Self::Label(label) => write!(f, "<@{label}>"),
        }
    }
}

/// A page of a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Text(Vec<Entry>),
    /// Starts at a label inside an earlier text page
    Forward(Label),
}

impl Page {
    /// Serialized size of a text page; forwarding pages own no bytes
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Text(entries) => entries.iter().map(Entry::byte_width).sum(),
            Self::Forward(_) => 0,
        }
    }
}

/// A decoded section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub pages: Vec<Page>,
}

impl Script {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of entries (labels included) across text pages
    pub fn entry_count(&self) -> usize {
        self.pages
            .iter()
            .map(|page| match page {
                Page::Text(entries) => entries.len(),
                Page::Forward(_) => 0,
            })
            .sum()
    }
}
