//! Report rendering.
//!
//! Renders the final survey result for stdout, as plain text or JSON.

pub mod generator;

pub use generator::{generate_json_report, generate_text_report};
