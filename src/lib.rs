//! # Netforge Core
//!
//! A compiler for a small circuit-description language, producing
//! SPICE-style netlists and structured diagnostics.
//!
//! This library provides:
//! - A custom DSL for describing circuits: components, connections,
//!   hierarchical subcircuits, macros, loops, and analysis directives
//! - A full compilation pipeline: lexing, parsing, validation, unit
//!   normalization, expression evaluation, macro/loop expansion,
//!   subcircuit flattening, connectivity resolution, and netlist
//!   formatting
//! - Collect-and-continue diagnostics, so one bad statement never hides
//!   the problems in its siblings
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Lexer, AST, and parser for the circuit description language
//! - [`units`] - SI prefix tables and literal normalization
//! - [`eval`] - Expression evaluation against a scoped environment
//! - [`circuit`] - Validation, expansion, flattening, net resolution, and
//!   netlist formatting
//! - [`compile`] - The pipeline driver tying the stages together
//!
//! ## Usage
//!
//! ```no_run
//! use netforge_core::compile;
//!
//! let source = r#"
//!     VoltageSource V1(9 V);
//!     Resistor R1(10k ohm);
//!     Connect(V1.positive, R1.positive);
//!     Connect(R1.negative, V1.negative, ground);
//!     Simulate { dc; };
//! "#;
//!
//! let result = compile(source)?;
//! for line in &result.netlist {
//!     println!("{}", line);
//! }
//! # Ok::<(), netforge_core::NetforgeError>(())
//! ```
//!
//! Each compilation runs to completion on one thread against fresh,
//! invocation-scoped state; independent compilations can run concurrently
//! on separate threads.

pub mod circuit;
pub mod compile;
pub mod diag;
pub mod dsl;
pub mod error;
pub mod eval;
pub mod units;

// Re-export main types for convenience
pub use compile::{compile, compile_named, Compilation};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use dsl::Program;
pub use error::{NetforgeError, Result};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCompilation;
