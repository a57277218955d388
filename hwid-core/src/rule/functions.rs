//! Rule function registry and the built-in function library
//!
//! Every function declares the context capabilities it needs. Calling a
//! function against a context without one of them is a broken rule
//! ([`RuleError::IncompatibleContext`]), not an assertion failure.

use lazy_static::lazy_static;
use std::collections::BTreeMap;

use hwid_error::RuleError;

use super::context::{CallScope, Context};
use super::interpreter::Val;
use super::value::Value;
use crate::constants::rule::{ASSERTION_ERROR, CAP_BOM, CAP_DEVICE_INFO, CAP_STRING};

/// Native implementation of a rule function
pub type RuleFn = fn(&mut CallScope<'_>, &[Val]) -> Result<Val, RuleError>;

/// A registered rule function
#[derive(Clone)]
pub struct RuleFunction {
    pub name: &'static str,
    /// Context attributes the function reads or writes
    pub capabilities: &'static [&'static str],
    pub min_args: usize,
    pub max_args: usize,
    func: RuleFn,
}

impl std::fmt::Debug for RuleFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleFunction")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

impl RuleFunction {
    pub const fn new(
        name: &'static str,
        capabilities: &'static [&'static str],
        min_args: usize,
        max_args: usize,
        func: RuleFn,
    ) -> Self {
        Self {
            name,
            capabilities,
            min_args,
            max_args,
            func,
        }
    }

    /// Check arity and run the function
    pub fn call(&self, scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
        if args.len() < self.min_args || args.len() > self.max_args {
            let expected = if self.min_args == self.max_args {
                self.min_args.to_string()
            } else {
                format!("{} to {}", self.min_args, self.max_args)
            };
            return Err(RuleError::Arity {
                function: self.name.to_string(),
                expected,
                actual: args.len(),
            });
        }
        (self.func)(scope, args)
    }
}

/// Closed set of functions a rule may call
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, RuleFunction>,
}

lazy_static! {
    static ref BUILTINS: FunctionRegistry = FunctionRegistry::with_builtins();
}

/// Shared registry of the built-in functions
pub fn builtins() -> &'static FunctionRegistry {
    &BUILTINS
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in library
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for function in BUILTIN_FUNCTIONS {
            registry.register(function.clone());
        }
        registry
    }

    /// Add or replace a function
    pub fn register(&mut self, function: RuleFunction) {
        self.functions.insert(function.name, function);
    }

    pub fn get(&self, name: &str) -> Option<&RuleFunction> {
        self.functions.get(name)
    }

    /// Look up `name` and check that `context` provides what it needs
    pub fn resolve(&self, name: &str, context: &Context) -> Result<&RuleFunction, RuleError> {
        let function = self
            .get(name)
            .ok_or_else(|| RuleError::UnknownFunction(name.to_string()))?;
        if let Some(missing) = function.capabilities.iter().find(|cap| !context.has(cap)) {
            return Err(RuleError::IncompatibleContext {
                function: name.to_string(),
                capability: missing.to_string(),
            });
        }
        Ok(function)
    }
}

// ============================================================================
// Built-in library
// ============================================================================

const BUILTIN_FUNCTIONS: &[RuleFunction] = &[
    RuleFunction::new("StrLen", &[CAP_STRING], 0, 0, str_len),
    RuleFunction::new("AssertStrLen", &[CAP_STRING], 1, 1, assert_str_len),
    RuleFunction::new("Re", &[], 1, 1, re),
    RuleFunction::new("Range", &[], 1, 1, range),
    RuleFunction::new("Matches", &[], 2, 2, matches_value),
    RuleFunction::new("Assert", &[], 1, 2, assert),
    RuleFunction::new("LogInfo", &[], 1, 1, log_info),
    RuleFunction::new("LogWarning", &[], 1, 1, log_warning),
    RuleFunction::new("GetImageId", &[CAP_BOM], 0, 0, get_image_id),
    RuleFunction::new("SetImageId", &[CAP_BOM], 1, 1, set_image_id),
    RuleFunction::new("ComponentEq", &[CAP_BOM], 2, 2, component_eq),
    RuleFunction::new("ComponentIn", &[CAP_BOM], 2, 2, component_in),
    RuleFunction::new("SetComponent", &[CAP_BOM], 2, 2, set_component),
    RuleFunction::new("GetDeviceInfo", &[CAP_DEVICE_INFO], 1, 2, get_device_info),
];

fn str_len(scope: &mut CallScope<'_>, _args: &[Val]) -> Result<Val, RuleError> {
    let len = scope.context.string()?.chars().count();
    i64::try_from(len)
        .map(Val::Int)
        .map_err(|_| RuleError::Type("string too long".to_string()))
}

/// Logs an assertion error when the context string is not longer than `n`
fn assert_str_len(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let min_exclusive = args[0].as_int()?;
    let len = scope.context.string()?.chars().count();
    if i64::try_from(len).map_or(false, |len| len <= min_exclusive) {
        scope.sink.error(ASSERTION_ERROR);
    }
    Ok(Val::None)
}

fn re(_scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    Value::regexp(args[0].as_str()?).map(Val::Matcher)
}

fn range(_scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    Value::range(args[0].as_str()?).map(Val::Matcher)
}

fn as_matcher(val: &Val) -> Result<Value, RuleError> {
    match val {
        Val::Matcher(v) => Ok(v.clone()),
        Val::Str(s) => Ok(Value::plain(s.as_str())),
        other => Err(RuleError::Type(format!(
            "expected str or matcher, got {}",
            other.type_name()
        ))),
    }
}

fn matches_value(_scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let expected = as_matcher(&args[0])?;
    let matched = match &args[1] {
        Val::Str(s) => expected.matches(s),
        Val::Int(n) => expected.matches(n.to_string().as_str()),
        other => expected.matches(&as_matcher(other)?),
    };
    Ok(Val::Bool(matched))
}

fn assert(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    if !args[0].is_truthy() {
        let message = args
            .get(1)
            .map(Val::to_string)
            .unwrap_or_else(|| ASSERTION_ERROR.to_string());
        scope.sink.error(message);
    }
    Ok(Val::None)
}

fn log_info(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    scope.sink.info(args[0].to_string());
    Ok(Val::None)
}

fn log_warning(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    scope.sink.warning(args[0].to_string());
    Ok(Val::None)
}

fn get_image_id(scope: &mut CallScope<'_>, _args: &[Val]) -> Result<Val, RuleError> {
    Ok(Val::Int(i64::from(scope.context.bom()?.image_id)))
}

fn set_image_id(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let id = args[0].as_int()?;
    let id = u32::try_from(id)
        .map_err(|_| RuleError::InvalidValue(format!("image id {} out of range", id)))?;
    scope.context.bom_mut()?.image_id = id;
    Ok(Val::None)
}

fn component_eq(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let class = args[0].as_str()?;
    let names = args[1].as_string_list()?;
    Ok(Val::Bool(scope.context.bom()?.component(class) == names.as_slice()))
}

fn component_in(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let class = args[0].as_str()?;
    let Val::List(choices) = &args[1] else {
        return Err(RuleError::Type(format!(
            "ComponentIn expects a list of choices, got {}",
            args[1].type_name()
        )));
    };
    let actual = scope.context.bom()?.component(class);
    for choice in choices {
        if actual == choice.as_string_list()?.as_slice() {
            return Ok(Val::Bool(true));
        }
    }
    Ok(Val::Bool(false))
}

fn set_component(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let class = args[0].as_str()?.to_string();
    let names = match &args[1] {
        Val::None => Vec::new(),
        other => other.as_string_list()?,
    };
    scope.context.bom_mut()?.set_component(class, names);
    Ok(Val::None)
}

fn get_device_info(scope: &mut CallScope<'_>, args: &[Val]) -> Result<Val, RuleError> {
    let key = args[0].as_str()?;
    match scope.context.device_info()?.get(key) {
        Some(value) => Ok(Val::from_json(value)),
        None => args
            .get(1)
            .cloned()
            .ok_or_else(|| RuleError::MissingAttribute(format!("{}.{}", CAP_DEVICE_INFO, key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bom;
    use crate::rule::context::ErrorSink;
    use crate::rule::interpreter::eval;
    use crate::rule::parser::Expr;

    fn run(context: &mut Context, expr: &str) -> (Result<Val, RuleError>, ErrorSink) {
        let mut sink = ErrorSink::new();
        let result = Expr::parse(expr).and_then(|ast| {
            let mut scope = CallScope::new(context, &mut sink);
            eval(&ast, builtins(), &mut scope)
        });
        (result, sink)
    }

    fn bom_context() -> Context {
        Context::new().with_bom(
            Bom::new(0, 1)
                .with_component("cpu", ["cpu_a"])
                .with_component("audio", ["codec_1", "codec_2"]),
        )
    }

    #[test]
    fn test_str_len_and_assert() {
        let mut ctx = Context::new().with_string("12345");
        assert_eq!(run(&mut ctx, "StrLen()").0.unwrap(), Val::Int(5));

        let (_, sink) = run(&mut ctx, "AssertStrLen(3)");
        assert!(!sink.has_errors());
        let (_, sink) = run(&mut ctx, "AssertStrLen(5)");
        assert_eq!(sink.errors(), vec!["ERROR: Assertion error"]);
    }

    #[test]
    fn test_incompatible_context() {
        let mut ctx = Context::new().with_string("abc");
        assert_eq!(
            run(&mut ctx, "GetImageId()").0.unwrap_err(),
            RuleError::IncompatibleContext {
                function: "GetImageId".into(),
                capability: "bom".into()
            }
        );
    }

    #[test]
    fn test_arity() {
        let mut ctx = Context::new().with_string("abc");
        assert!(matches!(
            run(&mut ctx, "StrLen(1)").0,
            Err(RuleError::Arity { actual: 1, .. })
        ));
        assert!(matches!(
            run(&mut ctx, "Assert()").0,
            Err(RuleError::Arity { actual: 0, .. })
        ));
    }

    #[test]
    fn test_matchers() {
        let mut ctx = Context::new();
        let cases = [
            ("Matches(Re('^foo.*bar$'), 'fooXYZbar')", true),
            ("Matches(Re('^foo.*bar$'), Re('fooXYZbar'))", false),
            ("Matches(Range('[] 5 10'), '5')", true),
            ("Matches(Range('[] 5 10'), 11)", false),
            ("Matches('foo', 'foo')", true),
        ];
        for (expr, expected) in cases {
            assert_eq!(run(&mut ctx, expr).0.unwrap(), Val::Bool(expected), "{}", expr);
        }
        assert!(matches!(
            run(&mut ctx, "Re('(')").0,
            Err(RuleError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_assert_message() {
        let mut ctx = Context::new();
        let (_, sink) = run(&mut ctx, "Assert(1 > 2, 'one is not greater')");
        assert_eq!(sink.errors(), vec!["ERROR: one is not greater"]);
        let (_, sink) = run(&mut ctx, "Assert(False)");
        assert_eq!(sink.errors(), vec!["ERROR: Assertion error"]);
        let (_, sink) = run(&mut ctx, "LogWarning('careful') or Assert(True)");
        assert!(!sink.has_errors());
        assert_eq!(sink.lines(), vec!["WARNING: careful"]);
    }

    #[test]
    fn test_component_functions() {
        let mut ctx = bom_context();
        assert_eq!(run(&mut ctx, "ComponentEq('cpu', 'cpu_a')").0.unwrap(), Val::Bool(true));
        assert_eq!(
            run(&mut ctx, "ComponentEq('audio', ['codec_2', 'codec_1'])").0.unwrap(),
            Val::Bool(false)
        );
        assert_eq!(
            run(&mut ctx, "ComponentIn('audio', ['codec_1', ['codec_1', 'codec_2']])")
                .0
                .unwrap(),
            Val::Bool(true)
        );
        assert_eq!(run(&mut ctx, "ComponentEq('storage', [])").0.unwrap(), Val::Bool(true));
    }

    #[test]
    fn test_mutating_functions() {
        let mut ctx = bom_context();
        run(&mut ctx, "SetComponent('cpu', ['cpu_b']) or SetImageId(GetImageId() + 1)")
            .0
            .unwrap();
        let bom = ctx.into_bom().unwrap();
        assert_eq!(bom.component("cpu"), ["cpu_b".to_string()]);
        assert_eq!(bom.image_id, 2);

        let mut ctx = bom_context();
        assert!(matches!(
            run(&mut ctx, "SetImageId(-1)").0,
            Err(RuleError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_device_info() {
        let info = [
            ("sku".to_string(), serde_json::json!(42)),
            ("has_touchscreen".to_string(), serde_json::json!(true)),
        ]
        .into_iter()
        .collect();
        let mut ctx = Context::new().with_device_info(info);
        assert_eq!(run(&mut ctx, "GetDeviceInfo('sku')").0.unwrap(), Val::Int(42));
        assert_eq!(
            run(&mut ctx, "GetDeviceInfo('missing', 'dflt')").0.unwrap(),
            Val::Str("dflt".into())
        );
        assert_eq!(
            run(&mut ctx, "GetDeviceInfo('missing')").0.unwrap_err(),
            RuleError::MissingAttribute("device_info.missing".into())
        );
    }
}
