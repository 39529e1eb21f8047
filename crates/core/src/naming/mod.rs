//! Scene release names: parsing them, and rendering library file names.

mod parser;
mod pattern;

pub use parser::{normalize_show_name, parse_release_name, ParsedRelease};
pub use pattern::{sanitize_file_name, NamingContext, NamingPattern};
