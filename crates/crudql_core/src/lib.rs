//! Core utilities for crudql.
//!
//! This crate provides foundational types shared by the parser and runtime:
//! - `span`: Source location tracking
//! - `text`: String interning
//! - `diagnostics`: Error reporting for request documents

pub mod diagnostics;
pub mod span;
pub mod text;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSeverity, Label};
pub use span::{LineCol, Span};
pub use text::{Interner, Text};
