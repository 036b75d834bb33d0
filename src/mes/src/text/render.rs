//! Markup rendering

use std::fmt;

use crate::entry::{Page, Script, FORWARD_TAG};

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, page) in self.pages.iter().enumerate() {
            writeln!(f, "<<{index}>>")?;
            match page {
                Page::Text(entries) => {
                    for entry in entries {
                        write!(f, "{entry}")?;
                    }
                }
                Page::Forward(label) => write!(f, "<{FORWARD_TAG}: @{label}>")?,
            }
            f.write_str("\n\n")?;
        }
        Ok(())
    }
}

/// Render a script as markup text
pub fn render_script(script: &Script) -> String {
    script.to_string()
}
