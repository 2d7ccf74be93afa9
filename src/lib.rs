//! prsign - GitHub PR review comments projected onto a side-by-side diff
//!
//! This library exposes modules for the binary, benchmarks and tests.

pub mod app;
pub mod cache;
pub mod config;
pub mod context;
pub mod controller;
pub mod diff;
pub mod editor;
pub mod github;
pub mod host;
pub mod index;
pub mod keybinding;
pub mod signs;
pub mod ui;

// Re-export commonly used types for benchmarks
pub use github::{ReviewComment, Side, User};
pub use index::{commented_lines, comments_on_line, next_line};
