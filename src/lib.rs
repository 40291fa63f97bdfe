pub mod codemap;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod formatter;
pub mod languages;
pub mod parser;
pub mod synthesis;
pub mod types;
pub mod walker;

pub use codemap::{map_codebase, CodeMapper};
pub use formatter::{format_json, format_markdown, parse_json};
