//! Semantic validation.
//!
//! Two passes over the parsed program. Pass 1 collects every top-level
//! definition name into per-kind sets and flags duplicates. Pass 2 walks
//! connections, expressions, and instances, flagging undefined references,
//! missing required named parameters, and unit-class mismatches. Entering
//! a macro or subcircuit body snapshots the component-name set, validates
//! the body against a mutated copy, and restores the snapshot on exit, so
//! nested instance names never leak into the enclosing scope.
//!
//! All findings go into the shared [`Diagnostics`] sink; any error blocks
//! interpretation, but validation itself always runs to completion.

use std::collections::HashSet;

use crate::diag::Diagnostics;
use crate::dsl::ast::*;
use crate::units;

/// Validate a program, recording findings in `diags`.
pub fn validate(program: &Program, diags: &mut Diagnostics) {
    let mut validator = Validator::new(program);
    validator.run(diags);
}

struct Validator<'a> {
    program: &'a Program,
    /// Component and instance names visible in the current scope
    components: HashSet<String>,
    /// Variable names visible in the current scope
    variables: HashSet<String>,
    /// Subcircuit template names
    templates: HashSet<String>,
    /// Macro names
    macros: HashSet<String>,
}

impl<'a> Validator<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            program,
            components: HashSet::new(),
            variables: HashSet::new(),
            templates: HashSet::new(),
            macros: HashSet::new(),
        }
    }

    fn run(&mut self, diags: &mut Diagnostics) {
        self.collect_definitions(diags);
        self.check_program(diags);
    }

    // ---- pass 1: definitions ---------------------------------------------

    fn collect_definitions(&mut self, diags: &mut Diagnostics) {
        for comp in &self.program.components {
            if !self.components.insert(comp.name.clone()) {
                diags.error_at(comp.line, 1, format!("duplicate component name '{}'", comp.name));
            }
        }
        for inst in &self.program.instances {
            if !self.components.insert(inst.name.clone()) {
                diags.error_at(inst.line, 1, format!("duplicate instance name '{}'", inst.name));
            }
        }
        for var in &self.program.variables {
            if !self.variables.insert(var.name.clone()) {
                diags.error_at(var.line, 1, format!("duplicate variable name '{}'", var.name));
            }
        }
        for mac in &self.program.macros {
            if !self.macros.insert(mac.name.clone()) {
                diags.error_at(mac.line, 1, format!("duplicate macro name '{}'", mac.name));
            }
        }
        for sub in &self.program.subcircuits {
            if !self.templates.insert(sub.name.clone()) {
                diags.error_at(sub.line, 1, format!("duplicate subcircuit name '{}'", sub.name));
            }
        }
    }

    // ---- pass 2: references ----------------------------------------------

    fn check_program(&mut self, diags: &mut Diagnostics) {
        for var in &self.program.variables {
            self.check_expr(&var.value, diags);
        }
        for conn in &self.program.connections {
            self.check_connection(conn, diags);
        }
        for comp in &self.program.components {
            self.check_component(comp, diags);
        }
        for inst in &self.program.instances {
            self.check_instance(inst, diags);
        }

        for sub in &self.program.subcircuits {
            self.check_subcircuit(sub, diags);
        }
        for mac in &self.program.macros {
            self.check_macro(mac, diags);
        }
        for item in &self.program.expansions {
            self.check_scoped_item(item, diags);
        }

        if self.program.analyses.is_empty() {
            diags.warning("program has no analysis block");
        }
        self.check_floating_components(diags);
    }

    fn check_subcircuit(&mut self, sub: &Subcircuit, diags: &mut Diagnostics) {
        let comp_snapshot = self.components.clone();
        let var_snapshot = self.variables.clone();
        for param in &sub.params {
            self.variables.insert(param.name.clone());
            if let Some(default) = &param.default {
                self.check_expr(default, diags);
            }
        }
        for comp in &sub.components {
            if !self.components.insert(comp.name.clone()) {
                diags.error_at(
                    comp.line,
                    1,
                    format!("duplicate component name '{}' in subcircuit '{}'", comp.name, sub.name),
                );
            }
        }
        for inst in &sub.instances {
            if !self.components.insert(inst.name.clone()) {
                diags.error_at(
                    inst.line,
                    1,
                    format!("duplicate instance name '{}' in subcircuit '{}'", inst.name, sub.name),
                );
            }
        }
        for comp in &sub.components {
            self.check_component(comp, diags);
        }
        for inst in &sub.instances {
            self.check_instance(inst, diags);
        }
        // Port names act as local nodes, so only terminal references are
        // checked inside the body.
        for conn in &sub.connections {
            self.check_connection(conn, diags);
        }
        self.components = comp_snapshot;
        self.variables = var_snapshot;
    }

    fn check_macro(&mut self, mac: &MacroDefinition, diags: &mut Diagnostics) {
        let comp_snapshot = self.components.clone();
        let var_snapshot = self.variables.clone();
        for param in &mac.params {
            self.variables.insert(param.clone());
        }
        for item in &mac.body {
            self.check_scoped_item(item, diags);
        }
        self.components = comp_snapshot;
        self.variables = var_snapshot;
    }

    fn check_scoped_item(&mut self, item: &ScopedItem, diags: &mut Diagnostics) {
        match item {
            ScopedItem::Component(comp) => {
                self.components.insert(comp.name.clone());
                self.check_component(comp, diags);
            }
            ScopedItem::Connection(conn) => self.check_connection(conn, diags),
            ScopedItem::Instance(inst) => {
                self.components.insert(inst.name.clone());
                self.check_instance(inst, diags);
            }
            ScopedItem::Invocation(inv) => {
                // The macro name itself is resolved at expansion time.
                for arg in &inv.args {
                    self.check_expr(arg, diags);
                }
            }
            ScopedItem::Loop(lp) => {
                self.check_expr(&lp.iterable, diags);
                let var_snapshot = self.variables.clone();
                let comp_snapshot = self.components.clone();
                self.variables.insert(lp.var.clone());
                for item in &lp.body {
                    self.check_scoped_item(item, diags);
                }
                self.variables = var_snapshot;
                self.components = comp_snapshot;
            }
        }
    }

    fn check_connection(&mut self, conn: &Connection, diags: &mut Diagnostics) {
        for ep in &conn.endpoints {
            if let Endpoint::Terminal { component, .. } = ep {
                // Hierarchical references resolve through their first
                // segment (the instance visible in this scope).
                let head = component.split('.').next().unwrap_or(component);
                if !self.components.contains(head) {
                    diags.error_at(conn.line, 1, format!("undefined component '{}'", component));
                }
            }
        }
    }

    fn check_component(&mut self, comp: &ComponentDeclaration, diags: &mut Diagnostics) {
        for required in comp.component_type.required_params() {
            if !comp.named.iter().any(|(key, _)| key == required) {
                diags.error_at(
                    comp.line,
                    1,
                    format!(
                        "component '{}' is missing required parameter '{}'",
                        comp.name, required
                    ),
                );
            }
        }

        let permitted = comp.component_type.permitted_units();
        if !permitted.is_empty() {
            if let Some(unit) = declared_unit(comp) {
                match units::base_unit(&unit) {
                    Some(base) if permitted.contains(&base.as_str()) => {}
                    _ => {
                        diags.error_at(
                            comp.line,
                            1,
                            format!(
                                "unit '{}' is not valid for component '{}' (expected {})",
                                unit,
                                comp.name,
                                permitted.join(" or ")
                            ),
                        );
                    }
                }
            }
        }

        if let Some(Expr::Literal(lit)) = comp.positional.first() {
            if let LitValue::Number(n) = lit.value {
                if n * lit.scale <= 0.0 {
                    diags.warning_at(
                        comp.line,
                        1,
                        format!("component '{}' has a non-positive value", comp.name),
                    );
                }
            }
        }

        for expr in &comp.positional {
            self.check_expr(expr, diags);
        }
        for (_, expr) in &comp.named {
            self.check_expr(expr, diags);
        }
    }

    fn check_instance(&mut self, inst: &SubcircuitInstance, diags: &mut Diagnostics) {
        let template = self
            .program
            .subcircuits
            .iter()
            .find(|sub| sub.name == inst.template);
        let Some(template) = template else {
            // Left as a warning: the flattener skips unknown templates
            // and the formatter still emits a generic line for them.
            diags.warning_at(
                inst.line,
                1,
                format!("undefined subcircuit '{}'", inst.template),
            );
            return;
        };

        for (key, _) in &inst.port_map {
            let is_port = template.ports.iter().any(|p| p.name == *key);
            let is_param = template.params.iter().any(|p| p.name == *key);
            if !is_port && !is_param {
                diags.error_at(
                    inst.line,
                    1,
                    format!(
                        "port '{}' not found in subcircuit '{}' (available: {})",
                        key,
                        inst.template,
                        template
                            .ports
                            .iter()
                            .map(|p| p.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                );
            }
        }
        for (key, expr) in &inst.overrides {
            if !template.params.iter().any(|p| p.name == *key) {
                diags.error_at(
                    inst.line,
                    1,
                    format!(
                        "parameter '{}' not found in subcircuit '{}'",
                        key, inst.template
                    ),
                );
            }
            self.check_expr(expr, diags);
        }
    }

    fn check_expr(&self, expr: &Expr, diags: &mut Diagnostics) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Identifier { name, line, column } => {
                if !self.variables.contains(name) {
                    diags.error_at(*line, *column, format!("undefined reference '{}'", name));
                }
            }
            Expr::Binary { left, right, .. } => {
                self.check_expr(left, diags);
                self.check_expr(right, diags);
            }
            Expr::Unary { operand, .. } => self.check_expr(operand, diags),
            Expr::Call { args, .. } => {
                // Function names resolve against the evaluator's builtin
                // table at evaluation time.
                for arg in args {
                    self.check_expr(arg, diags);
                }
            }
            Expr::Array { elements } => {
                for el in elements {
                    self.check_expr(el, diags);
                }
            }
        }
    }

    fn check_floating_components(&self, diags: &mut Diagnostics) {
        let mut connected: HashSet<&str> = HashSet::new();
        for conn in &self.program.connections {
            for ep in &conn.endpoints {
                if let Endpoint::Terminal { component, .. } = ep {
                    connected.insert(component.split('.').next().unwrap_or(component));
                }
            }
        }
        for comp in &self.program.components {
            if !connected.contains(comp.name.as_str()) {
                diags.warning_at(
                    comp.line,
                    1,
                    format!("component '{}' has no connections", comp.name),
                );
            }
        }
    }
}

/// The unit declared for a component's primary value: either on the first
/// positional expression or through a `unit=` named parameter.
fn declared_unit(comp: &ComponentDeclaration) -> Option<String> {
    if let Some(unit) = comp.positional.first().and_then(expr_unit) {
        return Some(unit);
    }
    comp.named.iter().find_map(|(key, expr)| {
        if key == "unit" {
            if let Expr::Literal(lit) = expr {
                if let LitValue::Str(s) = &lit.value {
                    return Some(s.clone());
                }
            }
        }
        None
    })
}

/// The unit annotation carried by an expression, if any. Postfix units on
/// non-literal expressions parse as a multiply whose right side is a
/// unit-tagged literal.
fn expr_unit(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Literal(lit) => lit.unit.clone(),
        Expr::Binary { right, left, .. } => expr_unit(right).or_else(|| expr_unit(left)),
        Expr::Unary { operand, .. } => expr_unit(operand),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    fn run(source: &str) -> Diagnostics {
        let program = parse(source).unwrap();
        let mut diags = Diagnostics::new();
        validate(&program, &mut diags);
        diags
    }

    #[test]
    fn test_clean_program() {
        let diags = run(
            "VoltageSource V1(9 V);
             Resistor R1(1000 ohm);
             Connect(V1.positive, R1.positive);
             Connect(R1.negative, V1.negative);
             Simulate { dc; };",
        );
        assert!(!diags.has_errors(), "errors: {:?}", diags.errors());
        assert!(diags.warnings().is_empty(), "warnings: {:?}", diags.warnings());
    }

    #[test]
    fn test_duplicate_component() {
        let diags = run("Resistor R1(1k ohm); Resistor R1(2k ohm);");
        assert!(diags.errors().iter().any(|d| d.message.contains("duplicate component")));
    }

    #[test]
    fn test_undefined_component_reference() {
        let diags = run("Resistor R1(1k ohm); Connect(R1.positive, R9.positive);");
        assert!(diags.errors().iter().any(|d| d.message.contains("undefined component 'R9'")));
    }

    #[test]
    fn test_missing_required_model() {
        let diags = run("Diode D1(0.7 V);");
        assert!(diags
            .errors()
            .iter()
            .any(|d| d.message.contains("missing required parameter 'model'")));
    }

    #[test]
    fn test_unit_mismatch() {
        let diags = run("Resistor R1(10 V);");
        assert!(diags.errors().iter().any(|d| d.message.contains("not valid for component")));
    }

    #[test]
    fn test_prefixed_unit_matches_class() {
        let diags = run("Resistor R1(10 kohm); Connect(R1.positive, R1.negative);");
        assert!(!diags.has_errors(), "errors: {:?}", diags.errors());
    }

    #[test]
    fn test_undefined_variable_reference() {
        let diags = run("Resistor R1(rload ohm);");
        assert!(diags.errors().iter().any(|d| d.message.contains("undefined reference 'rload'")));
    }

    #[test]
    fn test_defined_variable_is_fine() {
        let diags = run("rload = 1000; Resistor R1(rload ohm); Connect(R1.positive, R1.negative);");
        assert!(!diags.has_errors(), "errors: {:?}", diags.errors());
    }

    #[test]
    fn test_nested_names_do_not_leak() {
        // A subcircuit body may reuse a top-level component name, and its
        // nested names are invisible outside the body.
        let diags = run(
            "Resistor R1(1k ohm);
             Subcircuit Div(in, out) {
                 Resistor R1(1k ohm);
                 Connect(R1.positive, in);
             };
             Connect(R1.positive, R1.negative);",
        );
        assert!(!diags.has_errors(), "errors: {:?}", diags.errors());
    }

    #[test]
    fn test_unknown_port_binding() {
        let diags = run(
            "Subcircuit Div(in, out) { Resistor R1(1k ohm); };
             Div d1(in=a, out=b, bogus=c);",
        );
        assert!(diags.errors().iter().any(|d| d.message.contains("port 'bogus' not found")));
    }

    #[test]
    fn test_unknown_template_is_warning_not_error() {
        let diags = run("Ghost g1(in=a);");
        assert!(!diags.has_errors());
        assert!(diags.warnings().iter().any(|d| d.message.contains("undefined subcircuit 'Ghost'")));
    }

    #[test]
    fn test_floating_component_warning() {
        let diags = run("Resistor R1(1k ohm); Simulate { dc; };");
        assert!(diags.warnings().iter().any(|d| d.message.contains("no connections")));
    }

    #[test]
    fn test_missing_analysis_warning() {
        let diags = run("Resistor R1(1k ohm); Connect(R1.positive, R1.negative);");
        assert!(diags.warnings().iter().any(|d| d.message.contains("no analysis block")));
    }
}
