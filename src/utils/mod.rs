//! Shared utility functions.
//!
//! - `text`: Turkish-aware lowercasing and fuzzy-matching keys

mod text;

pub use text::{char_prefix, common_prefix_len, matching_key, turkish_lowercase};
