//! DSL (Domain Specific Language) front-end for circuit descriptions.
//!
//! This module provides the lexer, AST, and recursive-descent parser for
//! the circuit description language. The language is statement-oriented
//! and human-editable.
//!
//! # Grammar Overview
//!
//! ```text
//! program      = { statement }
//! statement    = import | variable | component | connection | subcircuit
//!              | instance | macro_def | for_loop | invocation | analysis
//!
//! import       = "Import" (string | identifier) ';'
//! variable     = identifier '=' expr ';'
//! component    = type identifier '(' params ')' [terminals] {attribute} ';'
//! params       = [expr {',' expr}] [',' named {',' named}]
//! named        = identifier '=' expr
//! terminals    = '[' identifier {',' identifier} ']'
//! connection   = "Connect" '(' endpoint ',' endpoint {',' endpoint} ')'
//!                ["as" identifier] ';'
//! endpoint     = ground | identifier | identifier {'.' identifier}
//! subcircuit   = "Subcircuit" identifier ['(' portlist ')'] '{' body '}' [';']
//! portlist     = entry {',' entry}
//! entry        = [("input"|"output"|"inout")] identifier
//!              | identifier '=' expr                      // parameter
//! instance     = identifier identifier ['(' bindings ')'] ';'
//! macro_def    = "Macro" identifier '(' [identifier {',' identifier}] ')'
//!                '{' {scoped_item} '}' [';']
//! for_loop     = "For" identifier "in" expr '{' {scoped_item} '}' [';']
//! invocation   = identifier '(' [expr {',' expr}] ')' ';'
//! analysis     = ("Simulate" | "analysis") [identifier] '{' {directive} '}' [';']
//! directive    = "dc" ';'
//!              | "transient" '(' num ',' num ',' num ')' ';'
//!              | "ac" '(' identifier ',' num ',' num ',' num ')' ';'
//!              | "noise" '(' identifier ',' identifier ',' num ')' ';'
//!              | "paramSweep" '(' identifier ',' num ',' num ',' num ')' ';'
//!              | "monteCarlo" '(' num ')' ';'
//!              | "plot" '(' signal {',' signal} ')' ';'
//!
//! expr         = or
//! or           = and { "||" and }
//! and          = equality { "&&" equality }
//! equality     = relational { ("==" | "!=") relational }
//! relational   = additive { ("<" | "<=" | ">" | ">=") additive }
//! additive     = multiplicative { ("+" | "-") multiplicative }
//! multiplicative = power { ("*" | "/" | "%" | "|") power }
//! power        = unary [ "^" power ]                       // right-assoc
//! unary        = ("-" | "+" | "!" | "sqrt" | "abs") unary | primary
//! primary      = number [unit] | string | identifier ['(' args ')']
//!              | '(' expr ')' | '[' [expr {',' expr}] ']'
//!
//! number       = digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+]
//! unit         = [prefix] ("ohm"|"F"|"H"|"V"|"A"|"Hz"|"s"|"W")
//! prefix       = 'f'|'p'|'n'|'u'|'m'|'k'|'M'|'G'|'T'
//! ```
//!
//! Comments are `//` to end of line or `/* ... */` (non-nested). A number
//! immediately followed by a unit or a bare prefix letter (`10k`, `4.7uF`)
//! is split into a number token and a unit token carrying the magnitude.
//!
//! # Component Types
//!
//! `Resistor`, `Capacitor`, `Inductor`, `VoltageSource`, `CurrentSource`,
//! `Diode`, `BJT`, `MOSFET`, `OpAmp`. The `|` binary operator computes the
//! parallel combination `a*b/(a+b)` of two values.
//!
//! # Example
//!
//! ```text
//! // Voltage divider
//! VoltageSource V1(9 V);
//! Resistor R1(10k ohm);
//! Resistor R2(10k ohm);
//! Connect(V1.positive, R1.positive);
//! Connect(R1.negative, R2.positive) as out;
//! Connect(R2.negative, V1.negative, ground);
//! Simulate { dc; plot(v(out)); };
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::Program;
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a circuit DSL string into an AST.
pub fn parse(input: &str) -> Result<Program> {
    let tokens = tokenize(input)?;
    Parser::new(tokens).parse()
}

/// Parse a single expression, mainly for tests and tooling.
pub fn parse_expression(input: &str) -> Result<ast::Expr> {
    let tokens = tokenize(input)?;
    Parser::new(tokens).parse_expr()
}

/// Parse a circuit DSL file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<Program> {
    let content =
        std::fs::read_to_string(path).map_err(|e| crate::error::NetforgeError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&content)
}
