//! Markup parsing
//!
//! Line breaks carry no meaning and are dropped first. `\\`, `\<` and `\>`
//! escape literal characters; everything else between `<` and `>` is a tag.

use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::entry::{Arg, ControlCode, Entry, Label, Page, Script, FORWARD_TAG};
use crate::table::CodeTable;
use crate::{Error, Result};

const FRAGMENT_LEN: usize = 32;

/// Parse markup text back into a script
///
/// Control code names are resolved against `table` here, so the returned
/// entries already carry their ids.
pub fn parse_script(text: &str, table: &CodeTable) -> Result<Script> {
    let text: String = text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();

    let mut parser = Parser {
        table,
        pages: Vec::new(),
        current: None,
        literal: String::new(),
    };
    parser.run(&text)?;
    parser.finish()
}

struct PageBuilder {
    index: usize,
    entries: Vec<Entry>,
    forward: Option<Label>,
}

impl PageBuilder {
    fn into_page(self) -> Result<Page> {
        match self.forward {
            None => Ok(Page::Text(self.entries)),
            Some(label) if self.entries.is_empty() => Ok(Page::Forward(label)),
            Some(label) => Err(Error::MalformedTag {
                page: self.index,
                fragment: format!("<{FORWARD_TAG}: @{label}>"),
                reason: "forwarding page has other content",
            }),
        }
    }
}

struct Parser<'t> {
    table: &'t CodeTable,
    pages: Vec<Page>,
    current: Option<PageBuilder>,
    /// Pending literal text, already unescaped
    literal: String,
}

impl Parser<'_> {
    fn run(&mut self, text: &str) -> Result<()> {
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if let Some(after) = rest.strip_prefix("\\\\") {
                self.literal.push('\\');
                rest = after;
            } else if let Some(after) = rest.strip_prefix("\\<") {
                self.literal.push('<');
                rest = after;
            } else if let Some(after) = rest.strip_prefix("\\>") {
                self.literal.push('>');
                rest = after;
            } else if rest.starts_with("<<") {
                self.flush_literal()?;
                rest = self.header(rest)?;
            } else if c == '<' {
                self.flush_literal()?;
                rest = self.tag(rest)?;
            } else if c == '>' {
                return Err(self.malformed(rest, "unescaped '>' outside of a tag"));
            } else {
                self.literal.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }

        self.flush_literal()
    }

    fn finish(mut self) -> Result<Script> {
        if let Some(page) = self.current.take() {
            self.pages.push(page.into_page()?);
        }
        Ok(Script::new(self.pages))
    }

    /// Parse a `<<N>>` page header and start a new page
    fn header<'a>(&mut self, rest: &'a str) -> Result<&'a str> {
        let Some(close) = rest.find(">>") else {
            return Err(self.malformed(rest, "unterminated page header"));
        };
        let number = rest[2..close].trim();
        let Ok(number) = number.parse::<usize>() else {
            return Err(self.malformed(rest, "page header is not a number"));
        };

        if let Some(page) = self.current.take() {
            self.pages.push(page.into_page()?);
        }

        let index = self.pages.len();
        if number != index {
            warn!("page header <<{number}>> is page {index} by position");
        }
        self.current = Some(PageBuilder {
            index,
            entries: Vec::new(),
            forward: None,
        });

        Ok(&rest[close + 2..])
    }

    /// Parse one `<...>` tag
    fn tag<'a>(&mut self, rest: &'a str) -> Result<&'a str> {
        let Some(close) = rest.find('>') else {
            return Err(self.malformed(rest, "missing closing '>'"));
        };
        let body = &rest[1..close];
        let after = &rest[close + 1..];

        let Some(page) = self.current.as_ref().map(|p| p.index) else {
            return Err(Error::StrayText {
                fragment: fragment(rest),
            });
        };
        if body.contains('<') {
            return Err(self.malformed(rest, "missing closing '>'"));
        }

        let entry = if let Some(name) = body.strip_prefix('@') {
            Entry::Label(self.label(name, rest)?)
        } else {
            let (name, args) = match body.split_once(':') {
                Some((name, args)) => (name.trim(), Some(args)),
                None => (body.trim(), None),
            };
            if name.is_empty() {
                return Err(self.malformed(rest, "empty tag"));
            }

            if name == FORWARD_TAG {
                self.forward(args.unwrap_or_default(), rest)?;
                return Ok(after);
            }

            Entry::ControlCode(self.control_code(page, name, args.unwrap_or_default(), rest)?)
        };

        self.push(entry);
        Ok(after)
    }

    fn label(&self, name: &str, rest: &str) -> Result<Label> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(self.malformed(rest, "invalid label name"));
        }
        Ok(Label::parse(name))
    }

    fn forward(&mut self, args: &str, rest: &str) -> Result<()> {
        let target = match args.split_whitespace().collect::<Vec<_>>().as_slice() {
            [target] => target.strip_prefix('@'),
            _ => None,
        };
        let Some(name) = target else {
            return Err(self.malformed(rest, "forwarding tag needs exactly one @label"));
        };
        let label = self.label(name, rest)?;

        let duplicate = self.current.as_ref().is_some_and(|p| p.forward.is_some());
        if duplicate {
            return Err(self.malformed(rest, "page forwards twice"));
        }
        if let Some(page) = self.current.as_mut() {
            page.forward = Some(label);
        }
        Ok(())
    }

    fn control_code(&self, page: usize, name: &str, args: &str, rest: &str) -> Result<ControlCode> {
        let Some(tag) = self.table.lookup_tag(name) else {
            return Err(Error::UnknownTag {
                page,
                name: name.to_string(),
            });
        };

        let args = args
            .split_whitespace()
            .map(|arg| parse_arg(arg).ok_or_else(|| self.malformed(rest, "invalid argument")))
            .collect::<Result<Vec<_>>>()?;

        if args.len() != tag.argument_count as usize {
            warn!(
                "page {page}: <{}> takes {} arguments, found {}",
                tag.name,
                tag.argument_count,
                args.len()
            );
        }

        Ok(ControlCode {
            id: tag.id,
            name: tag.into_owned().name,
            args,
        })
    }

    fn push(&mut self, entry: Entry) {
        if let Some(page) = self.current.as_mut() {
            page.entries.push(entry);
        }
    }

    fn flush_literal(&mut self) -> Result<()> {
        if self.literal.is_empty() {
            return Ok(());
        }
        let literal = std::mem::take(&mut self.literal);

        let Some(page) = self.current.as_mut() else {
            if literal.trim().is_empty() {
                return Ok(());
            }
            return Err(Error::StrayText {
                fragment: fragment(&literal),
            });
        };

        page.entries.extend(
            literal
                .graphemes(true)
                .map(|grapheme| Entry::Character(grapheme.to_string())),
        );
        Ok(())
    }

    fn malformed(&self, rest: &str, reason: &'static str) -> Error {
        Error::MalformedTag {
            page: self.current.as_ref().map_or(0, |p| p.index),
            fragment: fragment(rest),
            reason,
        }
    }
}

fn parse_arg(arg: &str) -> Option<Arg> {
    if let Some(name) = arg.strip_prefix('@') {
        return (!name.is_empty()).then(|| Arg::Label(Label::parse(name)));
    }
    arg.parse::<i16>()
        .ok()
        .or_else(|| arg.parse::<u16>().ok().map(|v| v as i16))
        .map(Arg::Value)
}

fn fragment(text: &str) -> String {
    text.chars().take(FRAGMENT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{section, table};
    use crate::text::render_script;
    use crate::{decode_section, encode_section};

    #[test]
    fn test_parse_pages() {
        let table = table();
        let script = parse_script(
            "<<0>>\r\nAB<wait><color: 3>\r\n\r\n<<1>>\n<Pointer: @pointer0>\n\n<<2>>\nC<@pointer0>\n",
            &table,
        )
        .unwrap();

        assert_eq!(script.len(), 3);
        let Page::Text(entries) = &script.pages[0] else {
            panic!("expected a text page");
        };
        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[3],
            Entry::ControlCode(ControlCode {
                id: 0x01,
                name: "color".into(),
                args: vec![Arg::Value(3)],
            })
        );
        assert_eq!(script.pages[1], Page::Forward(Label::Pointer(0)));
        assert_eq!(
            script.pages[2],
            Page::Text(vec![
                Entry::Character("C".into()),
                Entry::Label(Label::Pointer(0)),
            ])
        );
    }

    #[test]
    fn test_escaped_brackets() {
        let table = table();
        let text = "<<0>>\na\\<b\\>c\n\n";
        let script = parse_script(text, &table).unwrap();

        assert_eq!(
            script.pages[0],
            Page::Text(
                ["a", "<", "b", ">", "c"]
                    .iter()
                    .map(|g| Entry::Character(g.to_string()))
                    .collect()
            )
        );
        assert_eq!(render_script(&script), text);
    }

    #[test]
    fn test_escaped_brackets_encode() {
        let table = table();
        let script = parse_script("<<0>>\nA\\<B\\>C", &table).unwrap();
        let data = encode_section(&script, &table).unwrap();
        assert_eq!(
            &data[8..],
            &[0x81, 0, 0x86, 0, 0x82, 0, 0x87, 0, 0x83, 0]
        );
    }

    #[test]
    fn test_backslash_before_tag_round_trip() {
        let table = table();
        let data = section(&[8], &[0x81, 0x89, 0x02, 0x89, 0x86, 0x0D]);

        let text = render_script(&decode_section(&data, &table).unwrap());
        assert_eq!(text, "<<0>>\nA\\\\<wait>\\\\\\<<end>\n\n");

        let rebuilt = encode_section(&parse_script(&text, &table).unwrap(), &table).unwrap();
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn test_unknown_control_code_round_trip() {
        let table = table();
        let data = section(&[8], &[0x50, 0x81, 0x0D]);

        let text = render_script(&decode_section(&data, &table).unwrap());
        assert_eq!(text, "<<0>>\n<0x50>A<end>\n\n");

        let rebuilt = encode_section(&parse_script(&text, &table).unwrap(), &table).unwrap();
        assert_eq!(&rebuilt[8..10], &[0x50, 0x00]);
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn test_render_is_idempotent() {
        let table = table();
        let data = section(
            &[16, 32, 0x0001_0002],
            &[0x81, 0x35, 0x0000, 0x0008, 0x40, 0xFFFF, 0x0002, 0x0D, 0x50, 0x86, 0x0D],
        );
        let rendered = render_script(&decode_section(&data, &table).unwrap());
        assert_eq!(
            rendered,
            "<<0>>\nA<cond_jmp: 0 @condPointer0><@condPointer0><sound: -1 2><end>\n\n\
             <<1>>\n<0x50><@pointer0>\\<<end>\n\n<<2>>\n<Pointer: @pointer0>\n\n"
        );

        let reparsed = parse_script(&rendered, &table).unwrap();
        assert_eq!(render_script(&reparsed), rendered);
        assert_eq!(encode_section(&reparsed, &table).unwrap(), data);
    }

    #[test]
    fn test_named_labels() {
        let table = table();
        let script = parse_script("<<0>>\nA<@loop>B<cond_jmp: 0 @loop>", &table).unwrap();
        let data = encode_section(&script, &table).unwrap();
        assert_eq!(
            &data[8..],
            &[0x81, 0, 0x82, 0, 0x35, 0, 0, 0, 0x02, 0]
        );
    }

    #[test]
    fn test_hex_and_unsigned_arguments() {
        let table = table();
        let script = parse_script("<<0>>\n<0x01: 65535><50>", &table).unwrap();
        let Page::Text(entries) = &script.pages[0] else {
            panic!("expected a text page");
        };
        assert_eq!(entries[0].to_string(), "<color: -1>");
        assert_eq!(entries[1].to_string(), "<0x50>");
    }

    #[test]
    fn test_argument_count_mismatch_is_kept() {
        let table = table();
        let script = parse_script("<<0>>\n<sound: 1>", &table).unwrap();
        assert_eq!(script.pages[0].byte_len(), 4);
    }

    #[test]
    fn test_header_number_is_positional() {
        let table = table();
        let script = parse_script("<<4>>\nA\n\n<<9>>\nB", &table).unwrap();
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn test_leading_whitespace_is_ignored() {
        let table = table();
        let script = parse_script("  \n<<0>>\nA", &table).unwrap();
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_malformed_input() {
        let table = table();
        let cases = [
            "<<0>>\nA<wait",
            "<<0>>\nA<wait B<end>",
            "<<0>>\nA>",
            "<<0>>\n<>",
            "<<0>>\n<color: x>",
            "<<0>>\n<@>",
            "<<0>>\n<Pointer: pointer0>",
            "<<0>>\n<Pointer: @a>A",
            "<<0>>\n<Pointer: @a><Pointer: @b>",
            "<<x>>\nA",
            "<<0",
        ];
        for text in cases {
            assert!(
                matches!(parse_script(text, &table), Err(Error::MalformedTag { .. })),
                "{text:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_unknown_tag() {
        let table = table();
        let result = parse_script("<<0>>\nA\n\n<<1>>\n<bogus: 1>", &table);
        assert!(matches!(
            result,
            Err(Error::UnknownTag { page: 1, ref name }) if name == "bogus"
        ));
        // Above the character threshold, so not a control code literal
        assert!(matches!(
            parse_script("<<0>>\n<0x81>", &table),
            Err(Error::UnknownTag { page: 0, .. })
        ));
    }

    #[test]
    fn test_stray_text() {
        let table = table();
        assert!(matches!(
            parse_script("hello<<0>>\nA", &table),
            Err(Error::StrayText { .. })
        ));
        assert!(matches!(
            parse_script("<wait><<0>>\nA", &table),
            Err(Error::StrayText { .. })
        ));
    }
}
