//! Macro and loop expansion.
//!
//! Inlines macro invocations and `For` loops into concrete declarations
//! and connections, exactly as if the body had been written out in place.
//! Each body runs in a child environment frame that is popped on every
//! exit path, so loop variables and macro arguments never leak. Parameter
//! expressions inside expanded bodies are folded to evaluated literals
//! before the environment goes away.
//!
//! An unknown macro name, an arity mismatch, or a non-sequence loop
//! iterable appends a diagnostic and skips that item only; sibling items
//! still expand.

use std::collections::HashMap;

use crate::diag::Diagnostics;
use crate::dsl::ast::*;
use crate::eval::{eval, Environment, Value};

/// Maximum nesting depth for macro invocations and loops. A
/// self-referential macro hits this instead of recursing unbounded.
pub const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Default)]
struct Expanded {
    components: Vec<ComponentDeclaration>,
    connections: Vec<Connection>,
    instances: Vec<SubcircuitInstance>,
}

/// Expands the top-level invocation/loop list of one program. Owns its
/// macro table, so one expander serves exactly one compilation.
pub struct Expander {
    macros: HashMap<String, MacroDefinition>,
}

impl Expander {
    /// Capture the program's macro definitions.
    pub fn new(program: &Program) -> Self {
        let macros = program
            .macros
            .iter()
            .map(|mac| (mac.name.clone(), mac.clone()))
            .collect();
        Self { macros }
    }

    /// Drain the program's expansion list, appending the generated
    /// declarations and connections in body order.
    pub fn expand(&self, program: &mut Program, env: &mut Environment, diags: &mut Diagnostics) {
        let items = std::mem::take(&mut program.expansions);
        let mut out = Expanded::default();
        for item in &items {
            self.expand_item(item, env, diags, &mut out, 0);
        }
        program.components.extend(out.components);
        program.connections.extend(out.connections);
        program.instances.extend(out.instances);
    }

    fn expand_item(
        &self,
        item: &ScopedItem,
        env: &mut Environment,
        diags: &mut Diagnostics,
        out: &mut Expanded,
        depth: usize,
    ) {
        match item {
            ScopedItem::Component(comp) => {
                out.components.push(fold_component(comp, env, diags));
            }
            ScopedItem::Connection(conn) => {
                out.connections.push(conn.clone());
            }
            ScopedItem::Instance(inst) => {
                out.instances.push(fold_instance(inst, env, diags));
            }
            ScopedItem::Invocation(inv) => {
                if depth >= MAX_EXPANSION_DEPTH {
                    diags.warning_at(
                        inv.line,
                        1,
                        format!("macro '{}' exceeds expansion depth {}", inv.name, MAX_EXPANSION_DEPTH),
                    );
                    return;
                }
                let Some(mac) = self.macros.get(&inv.name) else {
                    diags.warning_at(inv.line, 1, format!("unknown macro '{}'", inv.name));
                    return;
                };
                if mac.params.len() != inv.args.len() {
                    diags.warning_at(
                        inv.line,
                        1,
                        format!(
                            "macro '{}' expects {} argument(s), got {}",
                            inv.name,
                            mac.params.len(),
                            inv.args.len()
                        ),
                    );
                    return;
                }
                let args: Vec<Value> = inv.args.iter().map(|a| eval(a, env, diags)).collect();
                env.push_scope();
                for (param, value) in mac.params.iter().zip(args) {
                    env.define(param.clone(), value);
                }
                for item in &mac.body {
                    self.expand_item(item, env, diags, out, depth + 1);
                }
                env.pop_scope();
            }
            ScopedItem::Loop(lp) => {
                if depth >= MAX_EXPANSION_DEPTH {
                    diags.warning_at(
                        lp.line,
                        1,
                        format!("loop exceeds expansion depth {}", MAX_EXPANSION_DEPTH),
                    );
                    return;
                }
                let iterable = eval(&lp.iterable, env, diags);
                let Value::Array(values) = iterable else {
                    diags.warning_at(
                        lp.line,
                        1,
                        format!("loop iterable for '{}' is not a sequence", lp.var),
                    );
                    return;
                };
                for value in values {
                    env.push_scope();
                    env.define(lp.var.clone(), value);
                    for item in &lp.body {
                        self.expand_item(item, env, diags, out, depth + 1);
                    }
                    env.pop_scope();
                }
            }
        }
    }
}

/// Deep-copy a declaration with its parameter expressions folded to the
/// values they have in the current environment.
pub fn fold_component(
    comp: &ComponentDeclaration,
    env: &Environment,
    diags: &mut Diagnostics,
) -> ComponentDeclaration {
    let mut folded = comp.clone();
    for expr in &mut folded.positional {
        *expr = fold_expr(expr, env, diags);
    }
    for (_, expr) in &mut folded.named {
        *expr = fold_expr(expr, env, diags);
    }
    folded
}

/// Deep-copy an instance with its override expressions folded.
pub fn fold_instance(
    inst: &SubcircuitInstance,
    env: &Environment,
    diags: &mut Diagnostics,
) -> SubcircuitInstance {
    let mut folded = inst.clone();
    for (_, expr) in &mut folded.overrides {
        *expr = fold_expr(expr, env, diags);
    }
    folded
}

/// Evaluate an expression and rebuild it as a literal (or array of
/// literals), detaching it from the environment it was evaluated in.
pub fn fold_expr(expr: &Expr, env: &Environment, diags: &mut Diagnostics) -> Expr {
    value_to_expr(eval(expr, env, diags))
}

fn value_to_expr(value: Value) -> Expr {
    match value {
        Value::Number(n) => Expr::Literal(Literal::from_si(n)),
        Value::Str(s) => Expr::Literal(Literal::string(s)),
        Value::Array(items) => Expr::Array {
            elements: items.into_iter().map(value_to_expr).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    fn expand_source(source: &str) -> (Program, Diagnostics) {
        let mut program = parse(source).unwrap();
        let mut diags = Diagnostics::new();
        crate::units::normalize(&mut program, &mut diags);
        let mut env = Environment::new();
        for var in &program.variables {
            let value = eval(&var.value, &env, &mut diags);
            env.define(var.name.clone(), value);
        }
        let expander = Expander::new(&program);
        expander.expand(&mut program, &mut env, &mut diags);
        (program, diags)
    }

    #[test]
    fn test_loop_expansion_order_and_values() {
        let (program, diags) = expand_source(
            "For i in range(1, 4) {
                 Resistor Rstage(i ohm);
             };",
        );
        assert!(diags.warnings().is_empty(), "warnings: {:?}", diags.warnings());
        assert_eq!(program.components.len(), 3);
        let values: Vec<f64> = program
            .components
            .iter()
            .map(|c| match &c.positional[0] {
                Expr::Literal(lit) => lit.si_value.unwrap(),
                other => panic!("expected folded literal, got {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_macro_expansion_binds_arguments() {
        let (program, diags) = expand_source(
            "Macro stage(r) {
                 Resistor Rs(r ohm);
                 Connect(Rs.positive, mid);
             };
             stage(2200);",
        );
        assert!(diags.warnings().is_empty(), "warnings: {:?}", diags.warnings());
        assert_eq!(program.components.len(), 1);
        assert_eq!(program.connections.len(), 1);
        match &program.components[0].positional[0] {
            Expr::Literal(lit) => assert_eq!(lit.si_value, Some(2200.0)),
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_macro_invocation() {
        let (program, _) = expand_source(
            "Macro leaf(r) {
                 Resistor Rleaf(r ohm);
             };
             Macro pair(r) {
                 leaf(r);
                 leaf(r * 2);
             };
             pair(100);",
        );
        assert_eq!(program.components.len(), 2);
    }

    #[test]
    fn test_unknown_macro_is_diagnostic_not_abort() {
        let (program, diags) = expand_source(
            "Macro stage(r) { Resistor Rs(r ohm); };
             phantom(1);
             stage(100);",
        );
        assert!(diags.warnings().iter().any(|d| d.message.contains("unknown macro 'phantom'")));
        // The sibling invocation still expanded.
        assert_eq!(program.components.len(), 1);
    }

    #[test]
    fn test_non_sequence_iterable_is_diagnostic() {
        let (program, diags) = expand_source("For i in 42 { Resistor Rs(i ohm); };");
        assert!(diags.warnings().iter().any(|d| d.message.contains("not a sequence")));
        assert!(program.components.is_empty());
    }

    #[test]
    fn test_recursive_macro_hits_depth_limit() {
        let (_, diags) = expand_source(
            "Macro spiral(n) {
                 spiral(n);
             };
             spiral(1);",
        );
        assert!(diags
            .warnings()
            .iter()
            .any(|d| d.message.contains("expansion depth")));
    }

    #[test]
    fn test_scope_restored_between_iterations() {
        let (program, diags) = expand_source(
            "base = 10;
             For i in range(2) {
                 Resistor Rs(base + i ohm);
             };
             Resistor Rtop(base ohm);",
        );
        assert!(diags.warnings().is_empty(), "warnings: {:?}", diags.warnings());
        // Rtop was declared outside the loop and keeps its own expression.
        assert_eq!(program.components.len(), 3);
    }
}
