//! Conditional rules
//!
//! A rule runs `evaluate` when `when` is absent or truthy, `otherwise` when
//! `when` is falsy, and nothing if neither applies. Assertion failures collect
//! in the sink; the rule fails after running if any were recorded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use hwid_error::RuleError;

use super::context::{CallScope, Context, ErrorSink};
use super::functions::FunctionRegistry;
use super::interpreter::{eval, Val};
use super::parser::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub when: Option<String>,
    pub evaluate: String,
    #[serde(default)]
    pub otherwise: Option<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, evaluate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            when: None,
            evaluate: evaluate.into(),
            otherwise: None,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.when = Some(condition.into());
        self
    }

    pub fn otherwise(mut self, expr: impl Into<String>) -> Self {
        self.otherwise = Some(expr.into());
        self
    }

    /// Parse every expression of the rule without running it
    pub fn check_syntax(&self) -> Result<(), RuleError> {
        for expr in [self.when.as_deref(), Some(self.evaluate.as_str()), self.otherwise.as_deref()]
            .into_iter()
            .flatten()
        {
            Expr::parse(expr)?;
        }
        Ok(())
    }

    /// Run the rule against `context`.
    ///
    /// Fails with [`RuleError::Failed`] carrying every `"ERROR: ..."` line when
    /// an assertion failed; other errors mean the rule itself is broken.
    pub fn evaluate(&self, registry: &FunctionRegistry, context: &mut Context) -> Result<(), RuleError> {
        let mut sink = ErrorSink::new();
        self.run(registry, context, &mut sink)
    }

    /// Like [`Rule::evaluate`] but leaves the messages in a caller-owned sink
    pub fn run(
        &self,
        registry: &FunctionRegistry,
        context: &mut Context,
        sink: &mut ErrorSink,
    ) -> Result<(), RuleError> {
        let mut scope = CallScope::new(context, sink);

        let applies = match &self.when {
            Some(condition) => evaluate_source(condition, registry, &mut scope)?.is_truthy(),
            None => true,
        };
        let branch = if applies {
            Some(self.evaluate.as_str())
        } else {
            self.otherwise.as_deref()
        };
        if let Some(expr) = branch {
            evaluate_source(expr, registry, &mut scope)?;
        }

        debug!(rule = %self.name, applies, "Evaluated rule");
        if sink.has_errors() {
            return Err(RuleError::Failed {
                rule: self.name.clone(),
                messages: sink.errors(),
            });
        }
        Ok(())
    }
}

fn evaluate_source(
    source: &str,
    registry: &FunctionRegistry,
    scope: &mut CallScope<'_>,
) -> Result<Val, RuleError> {
    let expr = Expr::parse(source)?;
    eval(&expr, registry, scope)
}

/// Evaluate a single expression and return its value.
///
/// Messages the expression logs are discarded.
pub fn evaluate_once(
    expr: &str,
    registry: &FunctionRegistry,
    context: &mut Context,
) -> Result<Val, RuleError> {
    let mut sink = ErrorSink::new();
    let mut scope = CallScope::new(context, &mut sink);
    evaluate_source(expr, registry, &mut scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bom;
    use crate::rule::functions::builtins;

    #[test]
    fn test_rule_passes() {
        let mut ctx = Context::new().with_string("12345");
        let rule = Rule::new("length", "AssertStrLen(3)").when("StrLen() > 3");
        assert!(rule.evaluate(builtins(), &mut ctx).is_ok());
    }

    #[test]
    fn test_rule_fails_with_error_lines() {
        let mut ctx = Context::new().with_string("12345");
        let rule = Rule::new("length", "AssertStrLen(6)").when("StrLen() > 3");
        let err = rule.evaluate(builtins(), &mut ctx).unwrap_err();
        assert!(err.is_failure());
        assert!(err.to_string().contains("ERROR: Assertion error"));
    }

    #[test]
    fn test_otherwise_branch() {
        let mut ctx = Context::new().with_string("12");
        let rule = Rule::new("length", "LogInfo('long')")
            .when("StrLen() > 3")
            .otherwise("Assert(False, 'too short')");
        let mut sink = ErrorSink::new();
        let err = rule.run(builtins(), &mut ctx, &mut sink).unwrap_err();
        assert_eq!(
            err,
            RuleError::Failed {
                rule: "length".into(),
                messages: vec!["ERROR: too short".into()],
            }
        );
        assert_eq!(sink.lines(), vec!["ERROR: too short"]);
    }

    #[test]
    fn test_false_condition_without_otherwise_is_noop() {
        let mut ctx = Context::new().with_string("12");
        let rule = Rule::new("length", "Assert(False)").when("StrLen() > 3");
        assert!(rule.evaluate(builtins(), &mut ctx).is_ok());
    }

    #[test]
    fn test_rule_adjusts_bom() {
        let mut ctx = Context::new().with_bom(Bom::new(0, 0).with_component("cpu", ["cpu_a"]));
        let rule = Rule::new("upgrade", "SetComponent('cpu', 'cpu_b')")
            .when("ComponentEq('cpu', 'cpu_a')");
        rule.evaluate(builtins(), &mut ctx).unwrap();
        assert_eq!(ctx.bom().unwrap().component("cpu"), ["cpu_b".to_string()]);
    }

    #[test]
    fn test_broken_rules_are_not_failures() {
        let mut ctx = Context::new().with_string("abc");
        let err = Rule::new("broken", "GetImageId()")
            .evaluate(builtins(), &mut ctx)
            .unwrap_err();
        assert!(!err.is_failure());
        assert!(matches!(
            Rule::new("syntax", "StrLen(").check_syntax(),
            Err(RuleError::Syntax { .. })
        ));
    }

    #[test]
    fn test_evaluate_once() {
        let mut ctx = Context::new().with_string("12345");
        assert_eq!(evaluate_once("StrLen()", builtins(), &mut ctx).unwrap(), Val::Int(5));
        assert_eq!(
            evaluate_once("StrLen() * 2 > 9", builtins(), &mut ctx).unwrap(),
            Val::Bool(true)
        );
    }
}
