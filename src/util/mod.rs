//! Text normalization helpers shared by item construction.

mod text;

pub use text::{collapse_whitespace, normalize_text, strip_markup};
