//! Text patterns over recognized lines.
//!
//! - `matcher`: question-start detection with sequence validation
//! - `options`: answer-option blocks (A-D, optionally E)
//! - `publisher`: exam publisher detection

mod matcher;
mod options;
mod publisher;

pub use matcher::{detect_start, find_question_starts, is_question_start, MatcherConfig};
pub use options::{extract_options, parse_option_line};
pub use publisher::{detect_publisher, PublisherFormat};
