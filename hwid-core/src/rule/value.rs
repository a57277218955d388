//! Value matchers
//!
//! A `Value` is what the database records as the expected value of a probed
//! field: an exact string, a regular expression or a numeric range. Matching
//! follows a fixed table; regular expressions are never intersected.
//!
//! String form (used by serde):
//! - `foo` -> `PlainText("foo")`
//! - `!re ^foo.*$` -> `RegExp("^foo.*$")`
//! - `!num [] 5 10` -> `RangeNum(Between(5, 10))`

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use hwid_error::RuleError;

const REGEXP_TAG: &str = "!re ";
const RANGE_TAG: &str = "!num ";

/// Numeric range with its comparison operator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumRange {
    Eq(f64),
    Ge(f64),
    Gt(f64),
    Le(f64),
    Lt(f64),
    /// Inclusive on both ends
    Between(f64, f64),
}

impl NumRange {
    /// Parse `"[] lo hi"`, `"== n"`, `">= n"`, `"> n"`, `"<= n"`, `"< n"`
    pub fn parse(expr: &str) -> Result<Self, RuleError> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        let invalid = || RuleError::InvalidValue(format!("invalid range {:?}", expr));
        let number = |token: &str| parse_number(token).ok_or_else(invalid);

        match tokens.as_slice() {
            ["[]", lo, hi] => {
                let (lo, hi) = (number(lo)?, number(hi)?);
                if lo > hi {
                    return Err(invalid());
                }
                Ok(Self::Between(lo, hi))
            }
            ["==", n] => Ok(Self::Eq(number(n)?)),
            [">=", n] => Ok(Self::Ge(number(n)?)),
            [">", n] => Ok(Self::Gt(number(n)?)),
            ["<=", n] => Ok(Self::Le(number(n)?)),
            ["<", n] => Ok(Self::Lt(number(n)?)),
            _ => Err(invalid()),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Self::Eq(n) => value == n,
            Self::Ge(n) => value >= n,
            Self::Gt(n) => value > n,
            Self::Le(n) => value <= n,
            Self::Lt(n) => value < n,
            Self::Between(lo, hi) => lo <= value && value <= hi,
        }
    }

    /// Parse `text` as a number and test it; unparsable text never matches
    pub fn matches_str(&self, text: &str) -> bool {
        parse_number(text).map_or(false, |value| self.contains(value))
    }
}

impl fmt::Display for NumRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(n) => write!(f, "== {}", n),
            Self::Ge(n) => write!(f, ">= {}", n),
            Self::Gt(n) => write!(f, "> {}", n),
            Self::Le(n) => write!(f, "<= {}", n),
            Self::Lt(n) => write!(f, "< {}", n),
            Self::Between(lo, hi) => write!(f, "[] {} {}", lo, hi),
        }
    }
}

/// Finite decimal number, surrounding whitespace ignored
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Expected value of a probed field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Value {
    PlainText(String),
    RegExp(Pattern),
    RangeNum(NumRange),
}

/// Regular expression with its source text; compiled anchored at both ends
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, RuleError> {
        let regex = Regex::new(&format!("^(?:{})$", source))
            .map_err(|e| RuleError::InvalidValue(format!("invalid regexp {:?}: {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn full_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Right-hand side of [`Value::matches`]
#[derive(Debug, Clone, Copy)]
pub enum MatchTarget<'a> {
    Str(&'a str),
    Value(&'a Value),
}

impl<'a> From<&'a str> for MatchTarget<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(s)
    }
}

impl<'a> From<&'a String> for MatchTarget<'a> {
    fn from(s: &'a String) -> Self {
        Self::Str(s.as_str())
    }
}

impl<'a> From<&'a Value> for MatchTarget<'a> {
    fn from(v: &'a Value) -> Self {
        Self::Value(v)
    }
}

impl Value {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText(text.into())
    }

    pub fn regexp(pattern: &str) -> Result<Self, RuleError> {
        Pattern::new(pattern).map(Self::RegExp)
    }

    pub fn range(expr: &str) -> Result<Self, RuleError> {
        NumRange::parse(expr).map(Self::RangeNum)
    }

    /// Whether this expected value accepts `target`
    pub fn matches<'a>(&self, target: impl Into<MatchTarget<'a>>) -> bool {
        match (self, target.into()) {
            (Self::PlainText(s), MatchTarget::Str(t)) => s == t,
            (Self::PlainText(s), MatchTarget::Value(other)) => match other {
                Self::PlainText(s2) => s == s2,
                Self::RegExp(p2) => p2.full_match(s),
                Self::RangeNum(r2) => r2.matches_str(s),
            },

            (Self::RegExp(p), MatchTarget::Str(t)) => p.full_match(t),
            (Self::RegExp(p), MatchTarget::Value(other)) => match other {
                Self::PlainText(s2) => p.full_match(s2),
                Self::RegExp(p2) => p == p2,
                Self::RangeNum(_) => false,
            },

            (Self::RangeNum(r), MatchTarget::Str(t)) => r.matches_str(t),
            (Self::RangeNum(r), MatchTarget::Value(other)) => match other {
                Self::PlainText(s2) => r.matches_str(s2),
                Self::RegExp(_) => false,
                Self::RangeNum(r2) => r == r2,
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::PlainText(a), Self::PlainText(b)) => a == b,
            (Self::RegExp(a), Self::RegExp(b)) => a == b,
            (Self::RangeNum(a), Self::RangeNum(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlainText(s) => f.write_str(s),
            Self::RegExp(p) => write!(f, "{}{}", REGEXP_TAG, p.as_str()),
            Self::RangeNum(r) => write!(f, "{}{}", RANGE_TAG, r),
        }
    }
}

impl TryFrom<String> for Value {
    type Error = RuleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if let Some(pattern) = s.strip_prefix(REGEXP_TAG) {
            Self::regexp(pattern)
        } else if let Some(range) = s.strip_prefix(RANGE_TAG) {
            Self::range(range)
        } else {
            Ok(Self::PlainText(s))
        }
    }
}

impl From<Value> for String {
    fn from(v: Value) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let v = Value::plain("foo");
        assert!(v.matches("foo"));
        assert!(!v.matches("bar"));
        assert!(v.matches(&Value::plain("foo")));
        assert!(v.matches(&Value::regexp("f.o").unwrap()));
    }

    #[test]
    fn test_regexp_is_full_match() {
        let v = Value::regexp("^foo.*bar$").unwrap();
        assert!(v.matches(&Value::plain("fooXYZbar")));
        assert!(!v.matches(&Value::regexp("fooXYZbar").unwrap()));
        assert!(v.matches(&Value::regexp("^foo.*bar$").unwrap()));

        let partial = Value::regexp("foo").unwrap();
        assert!(!partial.matches("foobar"));
        assert!(partial.matches("foo"));
    }

    #[test]
    fn test_regexp_alternation_is_anchored() {
        let v = Value::regexp("a|b").unwrap();
        assert!(v.matches("a"));
        assert!(!v.matches("ab"));
    }

    #[test]
    fn test_range() {
        let v = Value::range("[] 5 10").unwrap();
        assert!(v.matches("5"));
        assert!(v.matches("10"));
        assert!(v.matches(" 7.5 "));
        assert!(!v.matches("11"));
        assert!(!v.matches("ten"));
        assert!(!v.matches("NaN"));
        assert!(!v.matches(&Value::regexp("5").unwrap()));
        assert!(v.matches(&Value::range("[] 5 10").unwrap()));
        assert!(!v.matches(&Value::range("[] 5 11").unwrap()));
    }

    #[test]
    fn test_range_operators() {
        assert!(Value::range(">= 3").unwrap().matches("3"));
        assert!(!Value::range("> 3").unwrap().matches("3"));
        assert!(Value::range("< 3").unwrap().matches("2.9"));
        assert!(Value::range("<= 3").unwrap().matches("3"));
        assert!(Value::range("== 3").unwrap().matches("3.0"));
    }

    #[test]
    fn test_plain_text_delegates_to_range() {
        let v = Value::plain("7");
        assert!(v.matches(&Value::range("[] 5 10").unwrap()));
        assert!(!Value::plain("x").matches(&Value::range("[] 5 10").unwrap()));
        assert!(!Value::regexp("7").unwrap().matches(&Value::range("== 7").unwrap()));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Value::range("[] 10 5").is_err());
        assert!(Value::range("~ 5").is_err());
        assert!(Value::range(">= x").is_err());
        assert!(Value::regexp("(").is_err());
    }

    #[test]
    fn test_serde_string_form() {
        let values = vec![
            Value::plain("foo"),
            Value::regexp("^foo.*$").unwrap(),
            Value::range("[] 5 10").unwrap(),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["foo","!re ^foo.*$","!num [] 5 10"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
        assert!(serde_json::from_str::<Value>(r#""!num nope""#).is_err());
    }
}
