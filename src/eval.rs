//! Expression evaluation against a scoped variable environment.
//!
//! Evaluation is deliberately partial-failure-tolerant: division by zero,
//! unknown identifiers, and unknown functions append a diagnostic and
//! substitute a safe default (positive infinity or zero) instead of
//! aborting, so every sibling expression still gets evaluated.

use std::collections::HashMap;

use crate::diag::Diagnostics;
use crate::dsl::ast::{BinaryOp, Expr, LitValue, UnaryOp};

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Array(Vec<Value>),
}

impl Value {
    /// Numeric view of a value; non-numeric values read as 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Str(s) => crate::units::parse_magnitude(s).unwrap_or(0.0),
            Value::Array(_) => 0.0,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
        }
    }
}

/// A chain of variable scopes. Lookups read through from the innermost
/// frame outward; definitions always land in the innermost frame. One
/// environment belongs to one compilation; scopes are pushed and popped
/// around each macro or loop body.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<HashMap<String, Value>>,
}

impl Environment {
    /// Create an environment with a single global frame.
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Push a fresh child scope.
    pub fn push_scope(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost scope. The global frame is never popped.
    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Define or overwrite a variable in the innermost scope.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Look a variable up through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Builtin function names, fixed.
pub const BUILTINS: &[&str] = &[
    "sin", "cos", "tan", "log", "log10", "exp", "sqrt", "abs", "min", "max", "range",
];

/// Evaluate an expression tree. Always returns a value; problems are
/// reported through `diags` as warnings.
pub fn eval(expr: &Expr, env: &Environment, diags: &mut Diagnostics) -> Value {
    match expr {
        Expr::Literal(lit) => match (&lit.value, lit.si_value) {
            (_, Some(si)) => Value::Number(si),
            (LitValue::Number(n), None) => Value::Number(n * lit.scale),
            (LitValue::Str(s), None) => Value::Str(s.clone()),
        },
        Expr::Identifier { name, line, column } => match env.lookup(name) {
            Some(value) => value.clone(),
            None => {
                diags.warning_at(*line, *column, format!("unknown identifier '{}'", name));
                Value::Number(0.0)
            }
        },
        Expr::Binary { op, left, right } => {
            let lhs = eval(left, env, diags);
            let rhs = eval(right, env, diags);
            eval_binary(*op, &lhs, &rhs, diags)
        }
        Expr::Unary { op, operand } => {
            let value = eval(operand, env, diags);
            eval_unary(*op, &value)
        }
        Expr::Call {
            name,
            args,
            line,
            column,
        } => {
            let values: Vec<Value> = args.iter().map(|a| eval(a, env, diags)).collect();
            eval_call(name, &values, *line, *column, diags)
        }
        Expr::Array { elements } => {
            Value::Array(elements.iter().map(|e| eval(e, env, diags)).collect())
        }
    }
}

fn eval_binary(op: BinaryOp, lhs: &Value, rhs: &Value, diags: &mut Diagnostics) -> Value {
    let a = lhs.as_number();
    let b = rhs.as_number();
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                diags.warning("division by zero");
                f64::INFINITY
            } else {
                a / b
            }
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                diags.warning("modulo by zero");
                f64::INFINITY
            } else {
                a % b
            }
        }
        // Parallel combination of two resistances; a zero on either side
        // shorts the pair.
        BinaryOp::Parallel => {
            if a == 0.0 || b == 0.0 {
                0.0
            } else {
                (a * b) / (a + b)
            }
        }
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Eq => bool_num(a == b),
        BinaryOp::Ne => bool_num(a != b),
        BinaryOp::Lt => bool_num(a < b),
        BinaryOp::Le => bool_num(a <= b),
        BinaryOp::Gt => bool_num(a > b),
        BinaryOp::Ge => bool_num(a >= b),
        BinaryOp::And => bool_num(lhs.truthy() && rhs.truthy()),
        BinaryOp::Or => bool_num(lhs.truthy() || rhs.truthy()),
    };
    Value::Number(result)
}

fn eval_unary(op: UnaryOp, value: &Value) -> Value {
    let n = value.as_number();
    let result = match op {
        UnaryOp::Neg => -n,
        UnaryOp::Plus => n,
        UnaryOp::Not => bool_num(!value.truthy()),
        UnaryOp::Sqrt => n.sqrt(),
        UnaryOp::Abs => n.abs(),
    };
    Value::Number(result)
}

fn eval_call(name: &str, args: &[Value], line: usize, column: usize, diags: &mut Diagnostics) -> Value {
    let arity = |diags: &mut Diagnostics, expected: usize| -> Option<f64> {
        if args.len() == expected {
            Some(args[0].as_number())
        } else {
            diags.warning_at(
                line,
                column,
                format!("'{}' expects {} argument(s), got {}", name, expected, args.len()),
            );
            None
        }
    };

    let result = match name {
        "sin" => arity(diags, 1).map(f64::sin),
        "cos" => arity(diags, 1).map(f64::cos),
        "tan" => arity(diags, 1).map(f64::tan),
        "log" => arity(diags, 1).map(f64::ln),
        "log10" => arity(diags, 1).map(f64::log10),
        "exp" => arity(diags, 1).map(f64::exp),
        "sqrt" => arity(diags, 1).map(f64::sqrt),
        "abs" => arity(diags, 1).map(f64::abs),
        "min" | "max" => {
            if args.is_empty() {
                diags.warning_at(line, column, format!("'{}' expects at least one argument", name));
                None
            } else {
                let nums = args.iter().map(Value::as_number);
                Some(if name == "min" {
                    nums.fold(f64::INFINITY, f64::min)
                } else {
                    nums.fold(f64::NEG_INFINITY, f64::max)
                })
            }
        }
        "range" => {
            return eval_range(args, line, column, diags);
        }
        _ => {
            diags.warning_at(line, column, format!("unknown function '{}'", name));
            None
        }
    };
    Value::Number(result.unwrap_or(0.0))
}

/// `range(stop)`, `range(start, stop)`, or `range(start, stop, step)`:
/// eagerly materialized integer sequence with an exclusive stop.
fn eval_range(args: &[Value], line: usize, column: usize, diags: &mut Diagnostics) -> Value {
    let (start, stop, step) = match args.len() {
        1 => (0.0, args[0].as_number(), 1.0),
        2 => (args[0].as_number(), args[1].as_number(), 1.0),
        3 => (args[0].as_number(), args[1].as_number(), args[2].as_number()),
        n => {
            diags.warning_at(line, column, format!("'range' expects 1 to 3 arguments, got {}", n));
            return Value::Array(Vec::new());
        }
    };
    if step == 0.0 || !step.is_finite() {
        diags.warning_at(line, column, "'range' step must be a non-zero finite number");
        return Value::Array(Vec::new());
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0.0 && current < stop) || (step < 0.0 && current > stop) {
        items.push(Value::Number(current));
        current += step;
    }
    Value::Array(items)
}

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_expression;
    use approx::assert_relative_eq;

    fn eval_str(source: &str) -> (Value, Diagnostics) {
        let mut diags = Diagnostics::new();
        let expr = parse_expression(source).unwrap();
        let env = Environment::new();
        let value = eval(&expr, &env, &mut diags);
        (value, diags)
    }

    #[test]
    fn test_arithmetic() {
        let (value, diags) = eval_str("1 + 2 * 3");
        assert_eq!(value, Value::Number(7.0));
        assert!(diags.warnings().is_empty());
    }

    #[test]
    fn test_division_by_zero_is_one_diagnostic_and_infinity() {
        let (value, diags) = eval_str("5 / 0");
        assert_eq!(value, Value::Number(f64::INFINITY));
        assert_eq!(diags.warnings().len(), 1);
        assert!(diags.errors().is_empty());
    }

    #[test]
    fn test_parallel_combination() {
        let (value, _) = eval_str("10 | 10");
        assert_relative_eq!(value.as_number(), 5.0);
        let (value, _) = eval_str("0 | 10");
        assert_eq!(value, Value::Number(0.0));
    }

    #[test]
    fn test_unknown_identifier_defaults_to_zero() {
        let (value, diags) = eval_str("bogus + 1");
        assert_eq!(value, Value::Number(1.0));
        assert_eq!(diags.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_function_defaults_to_zero() {
        let (value, diags) = eval_str("mystery(3)");
        assert_eq!(value, Value::Number(0.0));
        assert_eq!(diags.warnings().len(), 1);
    }

    #[test]
    fn test_builtins() {
        let (value, _) = eval_str("sqrt(16)");
        assert_relative_eq!(value.as_number(), 4.0);
        let (value, _) = eval_str("min(3, 1, 2)");
        assert_relative_eq!(value.as_number(), 1.0);
        let (value, _) = eval_str("max(3, 1, 2)");
        assert_relative_eq!(value.as_number(), 3.0);
    }

    #[test]
    fn test_unary_sqrt_form() {
        let (value, _) = eval_str("sqrt 9");
        assert_relative_eq!(value.as_number(), 3.0);
    }

    #[test]
    fn test_range() {
        let (value, _) = eval_str("range(3)");
        assert_eq!(
            value,
            Value::Array(vec![Value::Number(0.0), Value::Number(1.0), Value::Number(2.0)])
        );
        let (value, _) = eval_str("range(1, 4)");
        assert_eq!(
            value,
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])
        );
        let (value, _) = eval_str("range(0, 10, 5)");
        assert_eq!(value, Value::Array(vec![Value::Number(0.0), Value::Number(5.0)]));
    }

    #[test]
    fn test_scope_chain() {
        let mut env = Environment::new();
        env.define("r", Value::Number(100.0));
        env.push_scope();
        env.define("r", Value::Number(200.0));
        assert_eq!(env.lookup("r"), Some(&Value::Number(200.0)));
        env.pop_scope();
        assert_eq!(env.lookup("r"), Some(&Value::Number(100.0)));
    }

    #[test]
    fn test_logic_and_comparison() {
        let (value, _) = eval_str("1 < 2 && 2 == 2");
        assert_eq!(value, Value::Number(1.0));
        let (value, _) = eval_str("!1 || 3 > 4");
        assert_eq!(value, Value::Number(0.0));
    }
}
