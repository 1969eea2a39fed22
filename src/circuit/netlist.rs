//! Netlist formatting.
//!
//! Emits one SPICE-style text line per component, followed by generic
//! lines for unflattened instances and the analysis directives. Terminal
//! slots resolve by trying positional names ("1", "2", ...) first, then
//! the component's declared terminal list, then the semantic aliases for
//! its family; an unresolved terminal defaults to ground. A formatting
//! failure on one component becomes a diagnostic tied to that component
//! and never stops the remaining lines.

use crate::diag::Diagnostics;
use crate::dsl::ast::*;
use crate::eval::{eval, Environment, Value};

use super::net::{NetId, NetResolver};

/// Format the complete netlist for a resolved program.
pub fn format_netlist(
    program: &Program,
    resolver: &NetResolver,
    env: &Environment,
    diags: &mut Diagnostics,
) -> Vec<String> {
    let formatter = NetlistFormatter { resolver };
    let mut lines = Vec::new();

    for comp in &program.components {
        match formatter.component_line(comp, env, diags) {
            Ok(line) => lines.push(line),
            Err(message) => {
                diags.warning_at(
                    comp.line,
                    1,
                    format!("cannot format component '{}': {}", comp.name, message),
                );
            }
        }
    }

    // Instances left unflattened (unknown templates) fall back to a
    // generic terminal-enumeration line.
    for inst in &program.instances {
        lines.push(formatter.instance_line(inst));
    }

    for analysis in &program.analyses {
        formatter.analysis_lines(analysis, program, env, diags, &mut lines);
    }

    lines
}

struct NetlistFormatter<'a> {
    resolver: &'a NetResolver,
}

impl<'a> NetlistFormatter<'a> {
    /// Resolve one terminal slot: positional name, declared terminal
    /// name, semantic aliases, then ground.
    fn slot(&self, comp: &ComponentDeclaration, index: usize, aliases: &[&str]) -> NetId {
        self.try_slot(comp, index, aliases).unwrap_or(NetId::GROUND)
    }

    fn try_slot(&self, comp: &ComponentDeclaration, index: usize, aliases: &[&str]) -> Option<NetId> {
        let positional = (index + 1).to_string();
        if let Some(net) = self.resolver.terminal_net(&comp.name, &positional) {
            return Some(net);
        }
        if let Some(declared) = comp.terminals.as_ref().and_then(|t| t.get(index)) {
            if let Some(net) = self.resolver.terminal_net(&comp.name, declared) {
                return Some(net);
            }
        }
        aliases
            .iter()
            .find_map(|alias| self.resolver.terminal_net(&comp.name, alias))
    }

    fn component_line(
        &self,
        comp: &ComponentDeclaration,
        env: &Environment,
        diags: &mut Diagnostics,
    ) -> Result<String, String> {
        match comp.component_type {
            ComponentType::Resistor | ComponentType::Capacitor | ComponentType::Inductor => {
                let value = self.positional_value(comp, 0, env, diags)?;
                let n1 = self.slot(comp, 0, &["positive"]);
                let n2 = self.slot(comp, 1, &["negative"]);
                let mut line = format!("{} {} {} {}", comp.name, n1, n2, format_si(value));
                line.push_str(&self.named_param_suffix(comp, env, diags));
                Ok(line)
            }
            ComponentType::VoltageSource | ComponentType::CurrentSource => {
                let dc = self.positional_value(comp, 0, env, diags)?;
                let n1 = self.slot(comp, 0, &["positive"]);
                let n2 = self.slot(comp, 1, &["negative"]);
                let mut line = format!("{} {} {} DC {}", comp.name, n1, n2, format_si(dc));
                if comp.positional.len() >= 2 {
                    let ac = self.positional_value(comp, 1, env, diags)?;
                    line.push_str(&format!(" AC {}", format_si(ac)));
                }
                Ok(line)
            }
            ComponentType::Diode => {
                let model = self.model_name(comp, env, diags)?;
                let anode = self.slot(comp, 0, &["anode", "positive"]);
                let cathode = self.slot(comp, 1, &["cathode", "negative"]);
                Ok(format!("{} {} {} {}", comp.name, anode, cathode, model))
            }
            ComponentType::Bjt => {
                let model = self.model_name(comp, env, diags)?;
                let collector = self.slot(comp, 0, &["collector"]);
                let base = self.slot(comp, 1, &["base"]);
                let emitter = self.slot(comp, 2, &["emitter"]);
                let mut line = format!("{} {} {} {}", comp.name, collector, base, emitter);
                if let Some(substrate) = self.try_slot(comp, 3, &["substrate"]) {
                    line.push_str(&format!(" {}", substrate));
                }
                line.push_str(&format!(" {}", model));
                Ok(line)
            }
            ComponentType::Mosfet => {
                let model = self.model_name(comp, env, diags)?;
                let drain = self.slot(comp, 0, &["drain"]);
                let gate = self.slot(comp, 1, &["gate"]);
                let source = self.slot(comp, 2, &["source"]);
                let bulk = self.slot(comp, 3, &["bulk", "substrate"]);
                Ok(format!(
                    "{} {} {} {} {} {}",
                    comp.name, drain, gate, source, bulk, model
                ))
            }
            ComponentType::OpAmp => {
                let model = self.model_name(comp, env, diags)?;
                let inp = self.slot(comp, 0, &["non_inverting", "positive"]);
                let inn = self.slot(comp, 1, &["inverting", "negative"]);
                let out = self.slot(comp, 2, &["output", "out"]);
                let mut line = format!("{} {} {} {}", comp.name, inp, inn, out);
                if let (Some(vcc), Some(vee)) = (
                    self.try_slot(comp, 3, &["vcc", "vdd"]),
                    self.try_slot(comp, 4, &["vee", "vss"]),
                ) {
                    line.push_str(&format!(" {} {}", vcc, vee));
                }
                line.push_str(&format!(" {}", model));
                Ok(line)
            }
        }
    }

    /// Generic line for an instance whose template is unknown: name, all
    /// bound terminals in declaration order, then the template name.
    fn instance_line(&self, inst: &SubcircuitInstance) -> String {
        let mut line = format!("X{}", inst.name);
        for (_, ep) in &inst.port_map {
            let net = match ep {
                Endpoint::Terminal { component, terminal } => self
                    .resolver
                    .terminal_net(component, terminal)
                    .unwrap_or(NetId::GROUND),
                Endpoint::Node { name, is_ground } => {
                    if *is_ground {
                        NetId::GROUND
                    } else {
                        self.resolver.named_net(name).unwrap_or(NetId::GROUND)
                    }
                }
            };
            line.push_str(&format!(" {}", net));
        }
        line.push_str(&format!(" {}", inst.template));
        line
    }

    fn analysis_lines(
        &self,
        analysis: &AnalysisBlock,
        program: &Program,
        env: &Environment,
        diags: &mut Diagnostics,
        lines: &mut Vec<String>,
    ) {
        for directive in &analysis.directives {
            match directive {
                Directive::Dc => {
                    lines.push(".OP".to_string());
                    if let Some(comment) = self.ohms_law_comment(program, env, diags) {
                        lines.push(comment);
                    }
                }
                Directive::Transient { start, stop, step } => {
                    lines.push(format!(
                        ".TRAN {} {} {}",
                        format_si(*step),
                        format_si(*stop),
                        format_si(*start)
                    ));
                }
                Directive::Ac {
                    sweep,
                    points,
                    fstart,
                    fstop,
                } => {
                    lines.push(format!(
                        ".AC {} {} {} {}",
                        sweep,
                        format_si(*points),
                        format_si(*fstart),
                        format_si(*fstop)
                    ));
                }
                Directive::Noise {
                    output,
                    source,
                    points,
                } => {
                    lines.push(format!(".NOISE {} {} {}", output, source, format_si(*points)));
                }
                Directive::MonteCarlo { runs } => {
                    lines.push(format!(".MC {}", format_si(*runs)));
                }
                Directive::Parametric {
                    param,
                    start,
                    stop,
                    step,
                } => {
                    lines.push(format!(
                        ".STEP {} {} {} {}",
                        param,
                        format_si(*start),
                        format_si(*stop),
                        format_si(*step)
                    ));
                }
            }
        }
        for plot in &analysis.plots {
            lines.push(format!(".PLOT {}", plot.signals.join(" ")));
        }
    }

    /// The single lightly-interpreted analysis: a DC directive over
    /// exactly one voltage source and one resistor reports the Ohm's-law
    /// current as a netlist comment.
    fn ohms_law_comment(
        &self,
        program: &Program,
        env: &Environment,
        diags: &mut Diagnostics,
    ) -> Option<String> {
        if program.components.len() != 2 {
            return None;
        }
        let source = program
            .components
            .iter()
            .find(|c| c.component_type == ComponentType::VoltageSource)?;
        let resistor = program
            .components
            .iter()
            .find(|c| c.component_type == ComponentType::Resistor)?;
        let volts = self.positional_value(source, 0, env, diags).ok()?;
        let ohms = self.positional_value(resistor, 0, env, diags).ok()?;
        let amps = if ohms == 0.0 { f64::INFINITY } else { volts / ohms };
        Some(format!("* dc operating point: I = {}A", format_si(amps)))
    }

    /// The component's primary value: positional parameter `index`, or a
    /// named `value=` parameter when the first positional is absent.
    fn positional_value(
        &self,
        comp: &ComponentDeclaration,
        index: usize,
        env: &Environment,
        diags: &mut Diagnostics,
    ) -> Result<f64, String> {
        let expr = comp.positional.get(index).or_else(|| {
            if index == 0 {
                comp.named
                    .iter()
                    .find(|(key, _)| key == "value")
                    .map(|(_, expr)| expr)
            } else {
                None
            }
        });
        let expr = expr.ok_or_else(|| format!("missing positional parameter {}", index + 1))?;
        Ok(eval(expr, env, diags).as_number())
    }

    fn model_name(
        &self,
        comp: &ComponentDeclaration,
        env: &Environment,
        diags: &mut Diagnostics,
    ) -> Result<String, String> {
        let expr = comp
            .named
            .iter()
            .find(|(key, _)| key == "model")
            .map(|(_, expr)| expr)
            .ok_or_else(|| "missing 'model' parameter".to_string())?;
        match eval(expr, env, diags) {
            Value::Str(s) => Ok(s),
            other => Err(format!("'model' must be a string, got {:?}", other)),
        }
    }

    /// Extra named parameters appended to passive lines as `key=value`.
    fn named_param_suffix(
        &self,
        comp: &ComponentDeclaration,
        env: &Environment,
        diags: &mut Diagnostics,
    ) -> String {
        let mut suffix = String::new();
        for (key, expr) in &comp.named {
            if key == "model" || key == "unit" || key == "value" {
                continue;
            }
            let value = eval(expr, env, diags);
            suffix.push_str(&format!(" {}={}", key, format_si(value.as_number())));
        }
        suffix
    }
}

/// Render a value in engineering notation with an SI suffix: `1500` →
/// `"1.5k"`, `9` → `"9"`, `1e-7` → `"100n"`.
pub fn format_si(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    const TIERS: [(f64, &str); 10] = [
        (1e12, "T"),
        (1e9, "G"),
        (1e6, "M"),
        (1e3, "k"),
        (1.0, ""),
        (1e-3, "m"),
        (1e-6, "u"),
        (1e-9, "n"),
        (1e-12, "p"),
        (1e-15, "f"),
    ];
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    for (scale, suffix) in TIERS {
        if abs >= scale {
            let mantissa = (abs / scale * 1e9).round() / 1e9;
            return format!("{}{}{}", sign, trim_number(mantissa), suffix);
        }
    }
    format!("{}{:e}", sign, abs)
}

fn trim_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::net::NetResolver;
    use crate::dsl::parse;

    fn netlist(source: &str) -> (Vec<String>, Diagnostics) {
        let mut program = parse(source).unwrap();
        let mut diags = Diagnostics::new();
        crate::units::normalize(&mut program, &mut diags);
        let env = Environment::new();
        let mut resolver = NetResolver::new();
        resolver.resolve(&program.connections);
        let lines = format_netlist(&program, &resolver, &env, &mut diags);
        (lines, diags)
    }

    #[test]
    fn test_format_si() {
        assert_eq!(format_si(1000.0), "1k");
        assert_eq!(format_si(1500.0), "1.5k");
        assert_eq!(format_si(9.0), "9");
        assert_eq!(format_si(1e-7), "100n");
        assert_eq!(format_si(0.01), "10m");
        assert_eq!(format_si(0.0), "0");
        assert_eq!(format_si(-2200.0), "-2.2k");
        assert_eq!(format_si(f64::INFINITY), "inf");
    }

    #[test]
    fn test_passive_line() {
        let (lines, diags) = netlist(
            "Resistor R1(1000 ohm);
             Connect(R1.positive, n1);
             Connect(R1.negative, ground);",
        );
        assert_eq!(lines[0], "R1 1 0 1k");
        assert!(diags.warnings().is_empty(), "warnings: {:?}", diags.warnings());
    }

    #[test]
    fn test_dc_source_line() {
        let (lines, _) = netlist(
            "VoltageSource V1(9 V);
             Connect(V1.positive, n1);
             Connect(V1.negative, ground);",
        );
        assert_eq!(lines[0], "V1 1 0 DC 9");
    }

    #[test]
    fn test_named_value_form() {
        let (lines, diags) = netlist(
            "VoltageSource V1(value=9, unit=V);
             Connect(V1.positive, n1);
             Connect(V1.negative, ground);",
        );
        assert_eq!(lines[0], "V1 1 0 DC 9");
        assert!(diags.warnings().is_empty(), "warnings: {:?}", diags.warnings());
    }

    #[test]
    fn test_dc_ac_source_line() {
        let (lines, _) = netlist(
            "VoltageSource V1(9 V, 1 V);
             Connect(V1.positive, n1);
             Connect(V1.negative, ground);",
        );
        assert_eq!(lines[0], "V1 1 0 DC 9 AC 1");
    }

    #[test]
    fn test_diode_line_uses_model() {
        let (lines, _) = netlist(
            "Diode D1(model=\"1N4148\");
             Connect(D1.anode, n1);
             Connect(D1.cathode, ground);",
        );
        assert_eq!(lines[0], "D1 1 0 1N4148");
    }

    #[test]
    fn test_bjt_line_terminal_order() {
        let (lines, _) = netlist(
            "BJT Q1(model=\"2N3904\");
             Connect(Q1.collector, nc);
             Connect(Q1.base, nb);
             Connect(Q1.emitter, ground);",
        );
        assert_eq!(lines[0], "Q1 1 2 0 2N3904");
    }

    #[test]
    fn test_unresolved_terminal_defaults_to_ground() {
        let (lines, _) = netlist("Resistor R1(1k ohm);");
        assert_eq!(lines[0], "R1 0 0 1k");
    }

    #[test]
    fn test_formatting_failure_is_caught_per_component() {
        let (lines, diags) = netlist(
            "Resistor R1();
             Resistor R2(2k ohm);
             Connect(R2.positive, n1);",
        );
        // R1 has no value: one diagnostic, R2 still formatted.
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("R2"));
        assert!(diags.warnings().iter().any(|d| d.message.contains("cannot format component 'R1'")));
    }

    #[test]
    fn test_transient_argument_order() {
        let (lines, _) = netlist("Simulate { transient(0, 10m, 1u); };");
        assert_eq!(lines[0], ".TRAN 1u 10m 0");
    }

    #[test]
    fn test_ohms_law_special_case() {
        let (lines, _) = netlist(
            "VoltageSource V1(9 V);
             Resistor R1(1000 ohm);
             Connect(V1.positive, R1.positive);
             Connect(R1.negative, V1.negative);
             Simulate { dc; };",
        );
        assert!(lines.contains(&".OP".to_string()));
        assert!(lines.contains(&"* dc operating point: I = 9mA".to_string()));
    }

    #[test]
    fn test_plot_and_sweep_lines() {
        let (lines, _) = netlist(
            "Simulate {
                 paramSweep(rload, 1k, 10k, 1k);
                 plot(v(out), i(R1));
             };",
        );
        assert_eq!(lines[0], ".STEP rload 1k 10k 1k");
        assert_eq!(lines[1], ".PLOT v(out) i(R1)");
    }

    #[test]
    fn test_named_params_appended() {
        let (lines, _) = netlist(
            "Resistor R1(1k ohm, tc=0.01);
             Connect(R1.positive, n1);",
        );
        assert_eq!(lines[0], "R1 1 0 1k tc=10m");
    }
}
