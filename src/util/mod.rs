//! Utility functions for common operations.
//!
//! - **Link normalization**: only absolute http(s) links become article keys
//! - **Text cleanup**: control characters, HTML tags and entities stripped
//!   from fetched titles and summaries

mod link;
mod text;

pub use link::{normalize_link, LinkError};
pub use text::{clean_text, collapse_whitespace, strip_control_chars, strip_html};
