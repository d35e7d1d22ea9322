//! Utility functions for string formatting and manipulation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{escape_html, format_age, strip_html, truncate_string};
