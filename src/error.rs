//! Error types for the Netforge circuit compiler.
//!
//! This module provides a unified error type [`NetforgeError`] for the
//! fatal failure modes of the pipeline: lexical and parse errors abort a
//! compilation immediately. Everything else (semantic findings, evaluation
//! problems, formatting failures) is collected through
//! [`crate::diag::Diagnostics`] and never surfaces as an `Err`.

use thiserror::Error;

/// Result type alias using [`NetforgeError`].
pub type Result<T> = std::result::Result<T, NetforgeError>;

/// Unified error type for all fatal Netforge operations.
#[derive(Error, Debug)]
pub enum NetforgeError {
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error reading a source file
    #[error("Failed to read source file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// WASM-specific error
    #[cfg(feature = "wasm")]
    #[error("WASM error: {message}")]
    WasmError { message: String },
}

impl NetforgeError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}
