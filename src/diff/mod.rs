//! Diff classification: per-line tags and per-file hunk structure.
//!
//! The accumulators in [`crate::metrics`] never look at raw diff text
//! directly; they go through the classification helpers here so that every
//! metric agrees on what counts as a meaningful, trivial or moved line.

pub mod classify;
pub mod language;

pub use classify::{
    count_hunks, detect_moved_lines, is_meaningful_line, is_noop_line, is_substantive_source_line,
    looks_auto_generated, AutoGeneratedKind, VelocitySkipList,
};
pub use language::{comment_syntax, language_for_filename, CommentSyntax, Language};
