//! Output formatting
//!
//! Renders a [`SetupSummary`](crate::setup::SetupSummary) for the console
//! (`text`) or for machines (`json`). Both write to stdout; logs go to stderr.

pub mod json;
pub mod text;
