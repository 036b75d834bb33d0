//! Markup text format
//!
//! ```text
//! <<0>>
//! Hello<wait><@condPointer0><cond_jmp: 0 @condPointer0><end>
//!
//! <<1>>
//! <Pointer: @pointer0>
//! ```
//!
//! Literal `<` and `>` are written as `\<` and `\>`. Line breaks are
//! presentation only and are dropped when parsing.

mod parse;
mod render;

pub use parse::parse_script;
pub use render::render_script;
