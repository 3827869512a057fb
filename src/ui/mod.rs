//! ui
//!
//! Presentation for the command line.
//!
//! # Modules
//!
//! - [`output`] - Verbosity and printing
//! - [`render`] - Text renderings of reports and graph queries
//!
//! # Design
//!
//! Nothing here makes a decision about the corpus. Renderers take finished
//! values from the engine and return strings; JSON output serializes the
//! same values directly.

pub mod output;
pub mod render;
