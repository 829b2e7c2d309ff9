//! Python front end used by the plagiarism pipeline

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod unparse;

use thiserror::Error;

pub use parser::parse_module;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (line {line}, column {col})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }
}
