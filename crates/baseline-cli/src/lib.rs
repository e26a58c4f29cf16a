//! The application-baseline catalog and its built-in templates.
//!
//! `baseline-core` knows how to apply steps; this crate knows which steps
//! turn a freshly generated Rails skeleton into a configured application.

pub mod catalog;
pub mod templates;
