//! Tree-walking interpreter for parsed rule expressions

use std::fmt;

use hwid_error::RuleError;

use super::context::CallScope;
use super::functions::FunctionRegistry;
use super::parser::{BinaryOp, Expr, Literal, UnaryOp};
use super::value::Value;

/// Runtime value of a rule expression
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Val>),
    Matcher(Value),
}

impl Val {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Matcher(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Matcher(_) => "matcher",
        }
    }

    pub fn as_str(&self) -> Result<&str, RuleError> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(type_error("str", other)),
        }
    }

    pub fn as_int(&self) -> Result<i64, RuleError> {
        match self {
            Self::Int(n) => Ok(*n),
            other => Err(type_error("int", other)),
        }
    }

    /// A string or a list of strings, as a list
    pub fn as_string_list(&self) -> Result<Vec<String>, RuleError> {
        match self {
            Self::Str(s) => Ok(vec![s.clone()]),
            Self::List(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            other => Err(type_error("str or list of str", other)),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON value (device info) into a runtime value
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(_) => Self::Str(value.to_string()),
        }
    }

    fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{:.1}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Val::repr).collect();
                write!(f, "[{}]", inner.join(", "))
            }
            Self::Matcher(v) => write!(f, "{}", v),
        }
    }
}

fn type_error(expected: &str, actual: &Val) -> RuleError {
    RuleError::Type(format!("expected {}, got {}", expected, actual.type_name()))
}

fn unsupported(op: BinaryOp, lhs: &Val, rhs: &Val) -> RuleError {
    RuleError::Type(format!(
        "unsupported operand types for {:?}: {} and {}",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow() -> RuleError {
    RuleError::Type("integer overflow".to_string())
}

/// Evaluate `expr` with functions from `registry` against `scope`
pub fn eval(
    expr: &Expr,
    registry: &FunctionRegistry,
    scope: &mut CallScope<'_>,
) -> Result<Val, RuleError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Int(n) => Val::Int(*n),
            Literal::Float(n) => Val::Float(*n),
            Literal::Str(s) => Val::Str(s.clone()),
            Literal::Bool(b) => Val::Bool(*b),
            Literal::None => Val::None,
        }),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, registry, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Val::List),
        Expr::Call { name, args } => {
            let function = registry.resolve(name, &*scope.context)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, registry, scope))
                .collect::<Result<Vec<_>, _>>()?;
            function.call(scope, &args)
        }
        Expr::Unary(op, operand) => {
            let value = eval(operand, registry, scope)?;
            match op {
                UnaryOp::Not => Ok(Val::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Val::Int(n) => n.checked_neg().map(Val::Int).ok_or_else(overflow),
                    Val::Float(n) => Ok(Val::Float(-n)),
                    other => Err(type_error("number", &other)),
                },
            }
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let left = eval(lhs, registry, scope)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            eval(rhs, registry, scope)
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let left = eval(lhs, registry, scope)?;
            if left.is_truthy() {
                return Ok(left);
            }
            eval(rhs, registry, scope)
        }
        Expr::Binary(op, lhs, rhs) => {
            let left = eval(lhs, registry, scope)?;
            let right = eval(rhs, registry, scope)?;
            binary(*op, &left, &right)
        }
    }
}

fn values_equal(lhs: &Val, rhs: &Val) -> bool {
    match (lhs, rhs) {
        (Val::List(a), Val::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => lhs == rhs,
        },
    }
}

fn binary(op: BinaryOp, lhs: &Val, rhs: &Val) -> Result<Val, RuleError> {
    match op {
        BinaryOp::Eq => Ok(Val::Bool(values_equal(lhs, rhs))),
        BinaryOp::NotEq => Ok(Val::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, lhs, rhs),
        BinaryOp::In => match (lhs, rhs) {
            (_, Val::List(items)) => Ok(Val::Bool(items.iter().any(|item| values_equal(lhs, item)))),
            (Val::Str(needle), Val::Str(haystack)) => Ok(Val::Bool(haystack.contains(needle.as_str()))),
            _ => Err(unsupported(op, lhs, rhs)),
        },
        BinaryOp::Add => match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => a.checked_add(*b).map(Val::Int).ok_or_else(overflow),
            (Val::Str(a), Val::Str(b)) => Ok(Val::Str(format!("{}{}", a, b))),
            (Val::List(a), Val::List(b)) => Ok(Val::List(a.iter().chain(b).cloned().collect())),
            _ => float_op(op, lhs, rhs, |a, b| a + b),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => a.checked_sub(*b).map(Val::Int).ok_or_else(overflow),
            _ => float_op(op, lhs, rhs, |a, b| a - b),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => a.checked_mul(*b).map(Val::Int).ok_or_else(overflow),
            _ => float_op(op, lhs, rhs, |a, b| a * b),
        },
        BinaryOp::Div => {
            if rhs.as_number() == Some(0.0) {
                return Err(RuleError::Type("division by zero".to_string()));
            }
            float_op(op, lhs, rhs, |a, b| a / b)
        }
        BinaryOp::Rem => {
            if rhs.as_number() == Some(0.0) {
                return Err(RuleError::Type("modulo by zero".to_string()));
            }
            match (lhs, rhs) {
                (Val::Int(a), Val::Int(b)) => {
                    let r = a.checked_rem(*b).ok_or_else(overflow)?;
                    // Result takes the sign of the divisor
                    Ok(Val::Int(if r != 0 && (r < 0) != (*b < 0) { r + b } else { r }))
                }
                _ => float_op(op, lhs, rhs, |a, b| {
                    let r = a % b;
                    if r != 0.0 && (r < 0.0) != (b < 0.0) {
                        r + b
                    } else {
                        r
                    }
                }),
            }
        }
        BinaryOp::And | BinaryOp::Or => Err(unsupported(op, lhs, rhs)),
    }
}

fn float_op(op: BinaryOp, lhs: &Val, rhs: &Val, f: impl Fn(f64, f64) -> f64) -> Result<Val, RuleError> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Ok(Val::Float(f(a, b))),
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn compare(op: BinaryOp, lhs: &Val, rhs: &Val) -> Result<Val, RuleError> {
    let ordering = match (lhs, rhs) {
        (Val::Str(a), Val::Str(b)) => a.partial_cmp(b),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(unsupported(op, lhs, rhs)),
        },
    };
    // NaN compares false both ways
    let Some(ordering) = ordering else {
        return Ok(Val::Bool(false));
    };
    Ok(Val::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::context::{Context, ErrorSink};

    fn run(expr: &str) -> Result<Val, RuleError> {
        let registry = FunctionRegistry::with_builtins();
        let mut context = Context::new().with_string("12345");
        let mut sink = ErrorSink::new();
        let mut scope = CallScope::new(&mut context, &mut sink);
        eval(&Expr::parse(expr)?, &registry, &mut scope)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 2 * 3").unwrap(), Val::Int(7));
        assert_eq!(run("(1 + 2) * 3").unwrap(), Val::Int(9));
        assert_eq!(run("7 / 2").unwrap(), Val::Float(3.5));
        assert_eq!(run("-7 % 3").unwrap(), Val::Int(2));
        assert_eq!(run("7 % -3").unwrap(), Val::Int(-2));
        assert_eq!(run("1 + 0.5").unwrap(), Val::Float(1.5));
        assert_eq!(run("'ab' + 'cd'").unwrap(), Val::Str("abcd".into()));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(matches!(run("'a' - 1"), Err(RuleError::Type(_))));
        assert!(matches!(run("1 / 0"), Err(RuleError::Type(_))));
        assert!(matches!(run("9223372036854775807 + 1"), Err(RuleError::Type(_))));
        assert!(matches!(run("'a' < 1"), Err(RuleError::Type(_))));
    }

    #[test]
    fn test_comparisons_and_membership() {
        assert_eq!(run("StrLen() > 3").unwrap(), Val::Bool(true));
        assert_eq!(run("1 == 1.0").unwrap(), Val::Bool(true));
        assert_eq!(run("'b' in ['a', 'b']").unwrap(), Val::Bool(true));
        assert_eq!(run("'x' in 'xyz'").unwrap(), Val::Bool(true));
        assert_eq!(run("'abc' < 'abd'").unwrap(), Val::Bool(true));
        assert_eq!(run("[1, 2] != [1, 2]").unwrap(), Val::Bool(false));
    }

    #[test]
    fn test_short_circuit() {
        // The right side would be a type error if evaluated
        assert_eq!(run("False and 'a' - 1").unwrap(), Val::Bool(false));
        assert_eq!(run("1 or 'a' - 1").unwrap(), Val::Int(1));
        assert_eq!(run("0 or 'fallback'").unwrap(), Val::Str("fallback".into()));
        assert_eq!(run("not ''").unwrap(), Val::Bool(true));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            run("Nope()").unwrap_err(),
            RuleError::UnknownFunction("Nope".into())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Val::Float(3.0).to_string(), "3.0");
        assert_eq!(
            Val::List(vec![Val::Str("a".into()), Val::Int(1), Val::None]).to_string(),
            r#"["a", 1, None]"#
        );
    }
}
