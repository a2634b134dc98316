//! Syntax layer for crudql.
//!
//! Only executable documents (operations and fragments) are accepted; the
//! schema is assembled in Rust, never from SDL.
//!
//! This crate provides:
//! - `token`: Token kinds and token structures
//! - `lexer`: Tokenization
//! - `ast`: Abstract syntax tree types
//! - `parser`: Recursive descent parser

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::{parse, ParseResult, MAX_DEPTH};
pub use token::{Token, TokenKind};
