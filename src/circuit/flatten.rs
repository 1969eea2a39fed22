//! Subcircuit flattening.
//!
//! Replaces each instance whose template is known with renamed, inlined
//! copies of the template's components and connections. Instance names are
//! prefixed with the instance path (`d1.R1`), plain template-local node
//! names get the same prefix, port names are substituted with the
//! instance's bound endpoints, and unbound ports receive a synthesized
//! `UNCONNECTED_n` node. Nested instances are flattened before their
//! parent's renaming pass. Template definitions are left untouched for
//! reference and export.

use std::collections::HashMap;

use crate::diag::Diagnostics;
use crate::dsl::ast::*;
use crate::eval::{eval, Environment, Value};

use super::expand::fold_component;

/// Maximum instantiation depth. A template that (transitively) instantiates
/// itself hits this instead of recursing unbounded.
pub const MAX_FLATTEN_DEPTH: usize = 32;

/// Flattens subcircuit instances. The unconnected-port counter lives on
/// the instance, so each compilation numbers its synthesized nodes from
/// zero.
#[derive(Debug)]
pub struct Flattener {
    unconnected: usize,
}

impl Flattener {
    pub fn new() -> Self {
        Self { unconnected: 0 }
    }

    /// Flatten all instances in `program`, appending the generated
    /// components and connections to the top-level lists. Instances with
    /// unknown templates are kept for the formatter's generic fallback.
    pub fn flatten(&mut self, program: &mut Program, env: &mut Environment, diags: &mut Diagnostics) {
        let templates: HashMap<String, Subcircuit> = program
            .subcircuits
            .iter()
            .map(|sub| (sub.name.clone(), sub.clone()))
            .collect();

        let instances = std::mem::take(&mut program.instances);
        let mut leftovers = Vec::new();
        for inst in instances {
            if templates.contains_key(&inst.template) {
                let (comps, conns) = self.flatten_instance(&inst, &templates, env, diags, 0);
                program.components.extend(comps);
                program.connections.extend(conns);
            } else {
                diags.warning_at(
                    inst.line,
                    1,
                    format!("instance '{}' references unknown subcircuit '{}'", inst.name, inst.template),
                );
                leftovers.push(inst);
            }
        }
        program.instances = leftovers;
    }

    fn flatten_instance(
        &mut self,
        inst: &SubcircuitInstance,
        templates: &HashMap<String, Subcircuit>,
        env: &mut Environment,
        diags: &mut Diagnostics,
        depth: usize,
    ) -> (Vec<ComponentDeclaration>, Vec<Connection>) {
        if depth >= MAX_FLATTEN_DEPTH {
            diags.warning_at(
                inst.line,
                1,
                format!(
                    "subcircuit '{}' exceeds flattening depth {}",
                    inst.template, MAX_FLATTEN_DEPTH
                ),
            );
            return (Vec::new(), Vec::new());
        }
        let template = &templates[&inst.template];

        // Parameter scope: defaults first, then instance overrides. A
        // binding that parsed as a port connection but names a parameter
        // is reclassified as an override here.
        env.push_scope();
        for param in &template.params {
            let value = match &param.default {
                Some(expr) => eval(expr, env, diags),
                None => Value::Number(0.0),
            };
            env.define(param.name.clone(), value);
        }
        for (key, expr) in &inst.overrides {
            if template.params.iter().any(|p| p.name == *key) {
                let value = eval(expr, env, diags);
                env.define(key.clone(), value);
            }
        }
        for (key, ep) in &inst.port_map {
            if template.params.iter().any(|p| p.name == *key) {
                if let Endpoint::Node { name, .. } = ep {
                    let value = env
                        .lookup(name)
                        .cloned()
                        .or_else(|| crate::units::parse_magnitude(name).map(Value::Number))
                        .unwrap_or(Value::Number(0.0));
                    env.define(key.clone(), value);
                }
            }
        }

        // Port targets: the bound endpoint, or a fresh UNCONNECTED node.
        let mut port_targets: HashMap<&str, Endpoint> = HashMap::new();
        for port in &template.ports {
            let bound = inst
                .port_map
                .iter()
                .find(|(key, _)| *key == port.name)
                .map(|(_, ep)| ep.clone());
            let target = bound.unwrap_or_else(|| {
                let name = format!("UNCONNECTED_{}", self.unconnected);
                self.unconnected += 1;
                Endpoint::Node {
                    name,
                    is_ground: false,
                }
            });
            port_targets.insert(port.name.as_str(), target);
        }

        // Deep-copy the body; nested instances flatten first, in their
        // own (template-local) namespace.
        let mut components: Vec<ComponentDeclaration> = template
            .components
            .iter()
            .map(|comp| fold_component(comp, env, diags))
            .collect();
        let mut connections = template.connections.clone();
        for nested in &template.instances {
            if templates.contains_key(&nested.template) {
                let (ncomps, nconns) =
                    self.flatten_instance(nested, templates, env, diags, depth + 1);
                components.extend(ncomps);
                connections.extend(nconns);
            } else {
                diags.warning_at(
                    nested.line,
                    1,
                    format!(
                        "instance '{}' references unknown subcircuit '{}'",
                        nested.name, nested.template
                    ),
                );
            }
        }

        env.pop_scope();

        // Rename everything into this instantiation's namespace.
        let prefix = inst.name.as_str();
        for comp in &mut components {
            comp.name = format!("{}.{}", prefix, comp.name);
        }
        for conn in &mut connections {
            for ep in &mut conn.endpoints {
                let renamed = rename_endpoint(&*ep, prefix, &port_targets);
                *ep = renamed;
            }
        }

        (components, connections)
    }
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new()
    }
}

fn rename_endpoint(ep: &Endpoint, prefix: &str, ports: &HashMap<&str, Endpoint>) -> Endpoint {
    match ep {
        Endpoint::Terminal { component, terminal } => Endpoint::Terminal {
            component: format!("{}.{}", prefix, component),
            terminal: terminal.clone(),
        },
        Endpoint::Node { name, is_ground } => {
            if *is_ground {
                return ep.clone();
            }
            if let Some(target) = ports.get(name.as_str()) {
                return target.clone();
            }
            // Synthesized unconnected nodes keep their global name.
            if name.starts_with("UNCONNECTED_") {
                return ep.clone();
            }
            Endpoint::Node {
                name: format!("{}.{}", prefix, name),
                is_ground: false,
            }
        }
    }
}
