//! The compilation driver.
//!
//! Runs the full pipeline on one source text: lex, parse, validate,
//! normalize units, evaluate variables, expand macros and loops, flatten
//! subcircuits, resolve connectivity, format the netlist. Lex and parse
//! failures are fatal `Err`s; everything downstream accumulates into the
//! diagnostic lists. Validation errors stop the pipeline before
//! interpretation, but the partial result (program + diagnostics) is
//! still returned so the caller sees every finding in one pass.

use crate::circuit::{format_netlist, validate, Expander, Flattener, NetResolver};
use crate::diag::{Diagnostic, Diagnostics};
use crate::dsl::{self, Program};
use crate::error::Result;
use crate::eval::{eval, Environment};
use crate::units;

/// The three artifacts of one compilation: the parsed program (read-only
/// for external consumers), the ordered netlist lines, and the two
/// diagnostic lists.
#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub netlist: Vec<String>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Compilation {
    /// True if the compilation produced no errors.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compile a source text.
pub fn compile(source: &str) -> Result<Compilation> {
    compile_named(source, None)
}

/// Compile a source text, stamping `file` onto every diagnostic.
pub fn compile_named(source: &str, file: Option<&str>) -> Result<Compilation> {
    let mut diags = match file {
        Some(name) => Diagnostics::for_file(name),
        None => Diagnostics::new(),
    };

    let mut program = dsl::parse(source)?;

    validate(&program, &mut diags);
    if diags.has_errors() {
        let (errors, warnings) = diags.into_lists();
        return Ok(Compilation {
            program,
            netlist: Vec::new(),
            errors,
            warnings,
        });
    }

    units::normalize(&mut program, &mut diags);

    let mut env = Environment::new();
    for var in &program.variables {
        let value = eval(&var.value, &env, &mut diags);
        env.define(var.name.clone(), value);
    }

    let expander = Expander::new(&program);
    expander.expand(&mut program, &mut env, &mut diags);

    let mut flattener = Flattener::new();
    flattener.flatten(&mut program, &mut env, &mut diags);

    let mut resolver = NetResolver::new();
    resolver.resolve(&program.connections);

    let netlist = format_netlist(&program, &resolver, &env, &mut diags);

    let (errors, warnings) = diags.into_lists();
    Ok(Compilation {
        program,
        netlist,
        errors,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_series_loop() {
        // Two components, two connections, one DC analysis; no ground
        // keyword, so two distinct non-zero nets.
        let source = "
            VoltageSource V1(9 V);
            Resistor R1(1000 ohm);
            Connect(V1.positive, R1.positive);
            Connect(R1.negative, V1.negative);
            Simulate { dc; };
        ";
        let result = compile(source).unwrap();
        assert!(result.is_clean(), "errors: {:?}", result.errors);
        assert_eq!(result.program.components.len(), 2);
        assert_eq!(result.program.connections.len(), 2);
        assert_eq!(result.program.analyses.len(), 1);
        assert_eq!(result.program.analyses[0].directives.len(), 1);
        assert_eq!(result.netlist[0], "V1 1 2 DC 9");
        assert_eq!(result.netlist[1], "R1 1 2 1k");
        assert!(result.netlist.contains(&".OP".to_string()));
    }

    #[test]
    fn test_scenario_grounded_negatives() {
        let source = "
            VoltageSource V1(9 V);
            Resistor R1(1000 ohm);
            Connect(V1.positive, R1.positive);
            Connect(R1.negative, ground);
            Connect(V1.negative, ground);
            Simulate { dc; };
        ";
        let result = compile(source).unwrap();
        assert!(result.is_clean());
        assert_eq!(result.netlist[0], "V1 1 0 DC 9");
        assert_eq!(result.netlist[1], "R1 1 0 1k");
    }

    #[test]
    fn test_scenario_two_divider_instances() {
        let source = "
            Subcircuit Div(in, out) {
                Resistor R1(1k ohm);
                Resistor R2(2k ohm);
                Connect(in, R1.positive);
                Connect(R1.negative, R2.positive, out);
                Connect(R2.negative, ground);
            };
            Div d1(in=a, out=x);
            Div d2(in=x, out=y);
            Simulate { dc; };
        ";
        let result = compile(source).unwrap();
        assert!(result.is_clean(), "errors: {:?}", result.errors);
        let names: Vec<&str> = result
            .program
            .components
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names.len(), 4);
        let unique: std::collections::HashSet<&&str> = names.iter().collect();
        assert_eq!(unique.len(), 4, "instance names collide: {:?}", names);
    }

    #[test]
    fn test_validation_error_blocks_netlist() {
        let source = "
            Resistor R1(1k ohm);
            Resistor R1(2k ohm);
            Connect(R1.positive, R1.negative);
        ";
        let result = compile(source).unwrap();
        assert!(!result.is_clean());
        assert!(result.netlist.is_empty());
    }

    #[test]
    fn test_parse_error_is_fatal() {
        assert!(compile("Resistor R1(").is_err());
    }

    #[test]
    fn test_lex_error_is_fatal() {
        assert!(compile("Resistor R1(1k ohm) @@;").is_err());
    }

    #[test]
    fn test_diagnostics_carry_filename() {
        let source = "Resistor R1(1k ohm); Resistor R1(1k ohm);";
        let result = compile_named(source, Some("twice.cdl")).unwrap();
        assert_eq!(result.errors[0].file.as_deref(), Some("twice.cdl"));
    }

    #[test]
    fn test_loop_macro_subcircuit_pipeline() {
        let source = "
            rbase = 1000;
            Macro pull(r) {
                Resistor Rp(r ohm);
                Connect(Rp.positive, rail);
                Connect(Rp.negative, ground);
            };
            pull(rbase);
            For i in range(1, 3) {
                Resistor Rl(i * rbase ohm);
                Connect(Rl.positive, rail);
            };
            Simulate { transient(0, 1m, 1u); };
        ";
        let result = compile(source).unwrap();
        assert!(result.is_clean(), "errors: {:?}", result.errors);
        // One macro component plus two loop iterations.
        assert_eq!(result.program.components.len(), 3);
        assert!(result.netlist.iter().any(|l| l.starts_with(".TRAN")));
    }

    #[test]
    fn test_warnings_do_not_block() {
        // Division by zero in a variable: diagnostic, but netlist still
        // produced.
        let source = "
            bad = 5 / 0;
            Resistor R1(1k ohm);
            Connect(R1.positive, n1);
            Connect(R1.negative, ground);
            Simulate { dc; };
        ";
        let result = compile(source).unwrap();
        assert!(result.is_clean());
        assert!(result.warnings.iter().any(|d| d.message.contains("division by zero")));
        assert!(!result.netlist.is_empty());
    }
}
