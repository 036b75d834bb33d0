//! Control code and character tables
//!
//! A [`CodeTable`] is built once from a [`Mapping`] (the per game/region JSON
//! configuration) and shared read-only by every decode and encode call.
//!
//! ## Lookup rules
//!
//! - A code unit is a control code if it is registered as a tag or lies below
//!   the minimum character codepoint.
//! - Unregistered control codes get a synthesized `0xNN` tag with no
//!   arguments, which parses back to the same id.
//! - Characters resolve through the active font variant, then the original
//!   font, then the escape codepoint's grapheme.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use tracing::warn;

use crate::entry::FORWARD_TAG;
use crate::{Error, Result};

/// Rendered when not even the escape codepoint has a grapheme
pub const FALLBACK_GRAPHEME: &str = "\u{FFFD}";

/// A 16-bit code, written in mapping files as a decimal or `0x` hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code(pub u16);

impl FromStr for Code {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => s.parse::<u16>(),
        };
        parsed.map(Code).map_err(|e| format!("invalid code {s:?}: {e}"))
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = Code;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 16-bit code as a number, decimal string or 0x-prefixed hex string")
            }

            fn visit_str<E>(self, s: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                s.parse().map_err(de::Error::custom)
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                u16::try_from(v)
                    .map(Code)
                    .map_err(|_| de::Error::custom(format!("code {v} exceeds 16 bits")))
            }
        }

        deserializer.deserialize_any(CodeVisitor)
    }
}

/// Tag definition as written in a mapping file
#[derive(Debug, Clone, Deserialize)]
pub struct TagSpec {
    pub name: String,
    #[serde(default)]
    pub count: u32,
}

/// Mapping file contents
///
/// ```json
/// {
///   "tags": { "0x35": { "name": "cond_jmp", "count": 2 } },
///   "characters": { "0x80": " ", "0x81": "A" },
///   "variants": { "edited": { "0x81": "a" } },
///   "escape": "0x80"
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mapping {
    #[serde(default)]
    pub tags: BTreeMap<Code, TagSpec>,
    /// Original font
    #[serde(default)]
    pub characters: BTreeMap<Code, String>,
    /// Alternative fonts layered over the original one
    #[serde(default)]
    pub variants: BTreeMap<String, BTreeMap<Code, String>>,
    /// Codepoint substituted for unmappable characters
    #[serde(default)]
    pub escape: Option<Code>,
}

impl Mapping {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// A control code definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: u16,
    pub name: String,
    pub argument_count: u32,
}

impl Tag {
    /// Tag for a control code the table does not know
    pub fn synthesized(id: u16) -> Self {
        Self {
            id,
            name: format!("0x{id:02X}"),
            argument_count: 0,
        }
    }

    /// Serialized size of the code unit plus its arguments
    pub fn byte_width(&self) -> usize {
        2 + 2 * self.argument_count as usize
    }
}

/// Bidirectional codepoint/grapheme table for one font
#[derive(Debug, Clone, Default)]
pub struct CharacterTable {
    graphemes: HashMap<u16, String>,
    codes: HashMap<String, u16>,
}

impl CharacterTable {
    /// Build from mapping entries; a grapheme listed under several codepoints
    /// encodes to the lowest one
    pub fn new(entries: &BTreeMap<Code, String>) -> Self {
        let mut graphemes = HashMap::with_capacity(entries.len());
        let mut codes = HashMap::with_capacity(entries.len());

        for (code, grapheme) in entries {
            graphemes.insert(code.0, grapheme.clone());
            codes.entry(grapheme.clone()).or_insert(code.0);
        }

        Self { graphemes, codes }
    }

    pub fn grapheme(&self, code: u16) -> Option<&str> {
        self.graphemes.get(&code).map(String::as_str)
    }

    pub fn code(&self, grapheme: &str) -> Option<u16> {
        self.codes.get(grapheme).copied()
    }

    pub fn min_code(&self) -> Option<u16> {
        self.graphemes.keys().min().copied()
    }

    pub fn len(&self) -> usize {
        self.graphemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphemes.is_empty()
    }
}

/// Immutable lookup tables for one game, region and font selection
#[derive(Debug, Clone)]
pub struct CodeTable {
    tags: HashMap<u16, Tag>,
    names: HashMap<String, u16>,
    original: CharacterTable,
    variant: Option<CharacterTable>,
    min_char_point: u16,
    escape: u16,
}

impl CodeTable {
    /// Build a table, selecting the font variant by name (`None` for the original font)
    pub fn from_mapping(mapping: &Mapping, variant: Option<&str>) -> Result<Self> {
        let mut tags = HashMap::with_capacity(mapping.tags.len());
        let mut names = HashMap::with_capacity(mapping.tags.len());

        for (code, spec) in &mapping.tags {
            validate_tag_name(&spec.name)?;
            if let Some(other) = names.insert(spec.name.clone(), code.0) {
                return Err(Error::InvalidMapping(format!(
                    "tag name {:?} used by both {other:#04x} and {:#04x}",
                    spec.name, code.0
                )));
            }
            tags.insert(
                code.0,
                Tag {
                    id: code.0,
                    name: spec.name.clone(),
                    argument_count: spec.count,
                },
            );
        }

        let original = CharacterTable::new(&mapping.characters);
        let variant = match variant {
            Some(name) => {
                let entries = mapping.variants.get(name).ok_or_else(|| {
                    Error::InvalidMapping(format!("font variant {name:?} is not defined"))
                })?;
                Some(CharacterTable::new(entries))
            }
            None => None,
        };

        let min_char_point = [original.min_code(), variant.as_ref().and_then(CharacterTable::min_code)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(0);
        let escape = mapping.escape.map_or(min_char_point, |code| code.0);

        Ok(Self {
            tags,
            names,
            original,
            variant,
            min_char_point,
            escape,
        })
    }

    pub fn from_json(json: &str, variant: Option<&str>) -> Result<Self> {
        Self::from_mapping(&Mapping::from_json(json)?, variant)
    }

    pub fn load(path: impl AsRef<Path>, variant: Option<&str>) -> Result<Self> {
        Self::from_mapping(&Mapping::load(path)?, variant)
    }

    /// Lowest codepoint that can be a character
    pub fn min_char_point(&self) -> u16 {
        self.min_char_point
    }

    pub fn escape_code(&self) -> u16 {
        self.escape
    }

    /// Number of registered control codes
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn is_control_code(&self, id: u16) -> bool {
        self.tags.contains_key(&id) || id < self.min_char_point
    }

    /// Tag for a control code id, synthesized when unregistered
    pub fn map_control_code(&self, id: u16) -> Cow<'_, Tag> {
        match self.tags.get(&id) {
            Some(tag) => Cow::Borrowed(tag),
            None => Cow::Owned(Tag::synthesized(id)),
        }
    }

    /// Tag for a markup name: a registered name, or a hex literal of a control code
    pub fn lookup_tag(&self, name: &str) -> Option<Cow<'_, Tag>> {
        if let Some(id) = self.names.get(name) {
            return self.tags.get(id).map(Cow::Borrowed);
        }

        let hex = name
            .strip_prefix("0x")
            .or_else(|| name.strip_prefix("0X"))
            .unwrap_or(name);
        let id = u16::from_str_radix(hex, 16).ok()?;

        if self.is_control_code(id) {
            Some(self.map_control_code(id))
        } else {
            None
        }
    }

    /// Grapheme for a character codepoint; never fails
    pub fn map_character(&self, code: u16) -> &str {
        if let Some(grapheme) = self.cascade_grapheme(code) {
            return grapheme;
        }

        warn!("unmappable character {code:#06x}, substituting escape grapheme");
        self.cascade_grapheme(self.escape)
            .unwrap_or(FALLBACK_GRAPHEME)
    }

    /// Codepoint for a grapheme; never fails
    pub fn map_grapheme(&self, grapheme: &str) -> u16 {
        let found = self
            .variant
            .as_ref()
            .and_then(|table| table.code(grapheme))
            .or_else(|| self.original.code(grapheme));

        match found {
            Some(code) => code,
            None => {
                warn!(
                    "unmappable grapheme {grapheme:?}, substituting escape code {:#06x}",
                    self.escape
                );
                self.escape
            }
        }
    }

    fn cascade_grapheme(&self, code: u16) -> Option<&str> {
        self.variant
            .as_ref()
            .and_then(|table| table.grapheme(code))
            .or_else(|| self.original.grapheme(code))
    }
}

fn validate_tag_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == FORWARD_TAG
        || name.starts_with('@')
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | ':'));

    if invalid {
        return Err(Error::InvalidMapping(format!(
            "tag name {name:?} cannot be written as markup"
        )));
    }
    Ok(())
}
