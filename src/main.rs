//! Netforge - Circuit DSL compiler
//!
//! Compiles a circuit description file into a SPICE-style netlist on
//! stdout, with diagnostics on stderr.
//!
//! # Usage
//!
//! ```bash
//! netforge amp.cdl
//! netforge amp.cdl -o amp.cir
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use netforge_core::{compile_named, error::Result};

/// Circuit DSL compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit description file (.cdl)
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Write the netlist to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Dump the parsed AST instead of the netlist
    #[arg(long)]
    ast: bool,

    /// Suppress warnings on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<bool> {
    let source = std::fs::read_to_string(&args.circuit_file).map_err(|e| {
        netforge_core::NetforgeError::FileReadError {
            path: args.circuit_file.display().to_string(),
            source: e,
        }
    })?;

    let file_name = args.circuit_file.display().to_string();
    let result = compile_named(&source, Some(&file_name))?;

    for error in &result.errors {
        eprintln!("{}", error);
    }
    if !args.quiet {
        for warning in &result.warnings {
            eprintln!("{}", warning);
        }
    }

    let output = if args.ast {
        format!("{:#?}\n", result.program)
    } else {
        let mut text = result.netlist.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, output).map_err(|e| netforge_core::NetforgeError::FileReadError {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        None => print!("{}", output),
    }

    Ok(result.is_clean())
}
