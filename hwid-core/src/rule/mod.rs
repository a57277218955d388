//! Value matchers and the rule engine
//!
//! Rules are small expressions over a [`Context`]. They are parsed into an
//! [`Expr`] tree and interpreted against a closed [`FunctionRegistry`]; there
//! is no general-purpose evaluation.

mod context;
mod engine;
mod functions;
mod interpreter;
mod lexer;
mod parser;
mod probe;
mod value;

pub use context::{Attribute, CallScope, Context, ErrorSink, Severity};
pub use engine::{evaluate_once, Rule};
pub use functions::{builtins, FunctionRegistry, RuleFn, RuleFunction};
pub use interpreter::{eval, Val};
pub use parser::{BinaryOp, Expr, Literal, UnaryOp};
pub use probe::{
    identify_components, match_probed_values, matching_components, ProbeResults, ProbedRecord,
    ProbedValue,
};
pub use value::{MatchTarget, NumRange, Pattern, Value};
