//! SI units and magnitude prefixes.
//!
//! Two jobs live here: the fixed prefix/unit tables shared by the lexer and
//! the validator, and the normalization pass that annotates every literal
//! reachable from a [`Program`] with its SI-normalized magnitude
//! (`si_value`). The pass runs once, before evaluation, and is idempotent:
//! literals that already carry an `si_value` are left alone.

use crate::diag::Diagnostics;
use crate::dsl::ast::{
    ComponentDeclaration, Expr, LitValue, Program, ScopedItem, Subcircuit, SubcircuitInstance,
};

/// SI magnitude prefixes, smallest to largest.
pub const SI_PREFIXES: &[(char, f64)] = &[
    ('f', 1e-15),
    ('p', 1e-12),
    ('n', 1e-9),
    ('u', 1e-6),
    ('m', 1e-3),
    ('k', 1e3),
    ('M', 1e6),
    ('G', 1e9),
    ('T', 1e12),
];

/// Base unit names accepted by the lexer.
pub const BASE_UNITS: &[&str] = &["ohm", "F", "H", "V", "A", "Hz", "s", "W"];

/// Look up the multiplier for an SI prefix letter.
pub fn prefix_scale(c: char) -> Option<f64> {
    SI_PREFIXES.iter().find(|(p, _)| *p == c).map(|(_, s)| *s)
}

/// Split a unit word into its prefix multiplier and base unit name.
///
/// `"kohm"` → `(1e3, Some("ohm"))`, `"ohm"` → `(1.0, Some("ohm"))`. With
/// `allow_bare_prefix` a lone prefix letter is accepted as a scale with no
/// base unit (`"k"` → `(1e3, None)`); the lexer enables this only in the
/// immediately-after-number position so that ordinary one-letter
/// identifiers stay identifiers.
pub fn split_unit(text: &str, allow_bare_prefix: bool) -> Option<(f64, Option<String>)> {
    if BASE_UNITS.contains(&text) {
        return Some((1.0, Some(text.to_string())));
    }
    let mut chars = text.chars();
    let first = chars.next()?;
    let rest = chars.as_str();
    let scale = prefix_scale(first)?;
    if rest.is_empty() {
        if allow_bare_prefix {
            return Some((scale, None));
        }
        return None;
    }
    if BASE_UNITS.contains(&rest) {
        return Some((scale, Some(rest.to_string())));
    }
    None
}

/// The base unit of a unit word, ignoring any prefix. `None` if the word
/// is not a recognized unit.
pub fn base_unit(text: &str) -> Option<String> {
    split_unit(text, true).and_then(|(_, base)| base)
}

/// Parse a magnitude string like `"1.5k"`, `"10u"`, or `"2.2kohm"` into
/// its SI value. Returns `None` when the string does not match
/// `<number><prefix?><unit?>`.
pub fn parse_magnitude(text: &str) -> Option<f64> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+' || *c == 'e' || *c == 'E'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    // "1e-6k" style strings put the exponent's letter inside the numeric
    // part; back off to the longest parseable numeric head.
    let mut num_end = split;
    let value = loop {
        if num_end == 0 {
            return None;
        }
        if let Ok(v) = text[..num_end].parse::<f64>() {
            break v;
        }
        num_end -= 1;
    };
    let tail = &text[num_end..];
    if tail.is_empty() {
        return Some(value);
    }
    let (scale, _base) = split_unit(tail, true)?;
    Some(value * scale)
}

/// Annotate every literal reachable from `program` with its SI value.
pub fn normalize(program: &mut Program, diags: &mut Diagnostics) {
    for var in &mut program.variables {
        normalize_expr(&mut var.value, diags);
    }
    for comp in &mut program.components {
        normalize_component(comp, diags);
    }
    for inst in &mut program.instances {
        normalize_instance(inst, diags);
    }
    for sub in &mut program.subcircuits {
        normalize_subcircuit(sub, diags);
    }
    for mac in &mut program.macros {
        for item in &mut mac.body {
            normalize_item(item, diags);
        }
    }
    for item in &mut program.expansions {
        normalize_item(item, diags);
    }
    // Analysis directive arguments are stored pre-scaled as f64; nothing
    // to annotate there.
}

fn normalize_subcircuit(sub: &mut Subcircuit, diags: &mut Diagnostics) {
    for param in &mut sub.params {
        if let Some(default) = &mut param.default {
            normalize_expr(default, diags);
        }
    }
    for comp in &mut sub.components {
        normalize_component(comp, diags);
    }
    for inst in &mut sub.instances {
        normalize_instance(inst, diags);
    }
}

fn normalize_component(comp: &mut ComponentDeclaration, diags: &mut Diagnostics) {
    for expr in &mut comp.positional {
        normalize_expr(expr, diags);
    }
    for (_, expr) in &mut comp.named {
        normalize_expr(expr, diags);
    }
}

fn normalize_instance(inst: &mut SubcircuitInstance, diags: &mut Diagnostics) {
    for (_, expr) in &mut inst.overrides {
        normalize_expr(expr, diags);
    }
}

fn normalize_item(item: &mut ScopedItem, diags: &mut Diagnostics) {
    match item {
        ScopedItem::Component(comp) => normalize_component(comp, diags),
        ScopedItem::Connection(_) => {}
        ScopedItem::Instance(inst) => normalize_instance(inst, diags),
        ScopedItem::Invocation(inv) => {
            for arg in &mut inv.args {
                normalize_expr(arg, diags);
            }
        }
        ScopedItem::Loop(lp) => {
            normalize_expr(&mut lp.iterable, diags);
            for item in &mut lp.body {
                normalize_item(item, diags);
            }
        }
    }
}

/// Annotate one expression tree. Numeric literals pass through with their
/// lexed prefix scale applied; string literals matching
/// `<number><prefix?><unit?>` are split; other strings stay opaque.
pub fn normalize_expr(expr: &mut Expr, diags: &mut Diagnostics) {
    match expr {
        Expr::Literal(lit) => {
            if lit.si_value.is_some() {
                return;
            }
            match &lit.value {
                LitValue::Number(n) => lit.si_value = Some(n * lit.scale),
                LitValue::Str(s) => lit.si_value = parse_magnitude(s),
            }
        }
        Expr::Identifier { .. } => {}
        Expr::Binary { left, right, .. } => {
            normalize_expr(left, diags);
            normalize_expr(right, diags);
        }
        Expr::Unary { operand, .. } => normalize_expr(operand, diags),
        Expr::Call { args, .. } => {
            for arg in args {
                normalize_expr(arg, diags);
            }
        }
        Expr::Array { elements } => {
            for el in elements {
                normalize_expr(el, diags);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::ast::Literal;
    use approx::assert_relative_eq;

    #[test]
    fn test_split_unit() {
        assert_eq!(split_unit("ohm", false), Some((1.0, Some("ohm".to_string()))));
        assert_eq!(split_unit("kohm", false), Some((1e3, Some("ohm".to_string()))));
        assert_eq!(split_unit("uF", false), Some((1e-6, Some("F".to_string()))));
        assert_eq!(split_unit("mH", false), Some((1e-3, Some("H".to_string()))));
        assert_eq!(split_unit("k", false), None);
        assert_eq!(split_unit("k", true), Some((1e3, None)));
        assert_eq!(split_unit("zz", true), None);
    }

    #[test]
    fn test_parse_magnitude() {
        assert_relative_eq!(parse_magnitude("1.5k").unwrap(), 1500.0);
        assert_relative_eq!(parse_magnitude("10u").unwrap(), 1e-5);
        assert_relative_eq!(parse_magnitude("1e-6").unwrap(), 1e-6);
        assert_relative_eq!(parse_magnitude("2.2kohm").unwrap(), 2200.0);
        assert_relative_eq!(parse_magnitude("100n").unwrap(), 1e-7);
        assert_eq!(parse_magnitude("tender"), None);
        assert_eq!(parse_magnitude(""), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut diags = Diagnostics::new();
        let mut expr = Expr::Literal(Literal::number(1.5, Some("ohm".to_string()), 1e3));
        normalize_expr(&mut expr, &mut diags);
        let first = match &expr {
            Expr::Literal(lit) => lit.si_value,
            _ => unreachable!(),
        };
        assert_relative_eq!(first.unwrap(), 1500.0);
        normalize_expr(&mut expr, &mut diags);
        let second = match &expr {
            Expr::Literal(lit) => lit.si_value,
            _ => unreachable!(),
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_opaque_string_stays_opaque() {
        let mut diags = Diagnostics::new();
        let mut expr = Expr::Literal(Literal::string("sine"));
        normalize_expr(&mut expr, &mut diags);
        match &expr {
            Expr::Literal(lit) => assert_eq!(lit.si_value, None),
            _ => unreachable!(),
        }
    }
}
