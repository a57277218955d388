//! Evaluation context and error sink
//!
//! A [`Context`] is the named bag of attributes a rule runs against. Each
//! attribute name doubles as a capability: functions declare the attributes
//! they need and are refused on contexts that lack them.
//!
//! Nothing here is global. The interpreter threads a [`CallScope`] through
//! every function call, so nested or concurrent evaluations never share state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use hwid_error::RuleError;

use crate::constants::rule::{
    CAP_BOM, CAP_DEVICE_INFO, CAP_STRING, ERROR_PREFIX, INFO_PREFIX, WARNING_PREFIX,
};
use crate::data::Bom;

/// A typed context attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attribute {
    Integer(i64),
    Text(String),
    Bom(Bom),
    Map(BTreeMap<String, serde_json::Value>),
}

/// Named attributes available to rule functions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    attributes: BTreeMap<String, Attribute>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Context validating a single string
    pub fn with_string(self, value: impl Into<String>) -> Self {
        self.with_attribute(CAP_STRING, Attribute::Text(value.into()))
    }

    /// Context adjusting a BOM
    pub fn with_bom(self, bom: Bom) -> Self {
        self.with_attribute(CAP_BOM, Attribute::Bom(bom))
    }

    pub fn with_device_info(self, info: BTreeMap<String, serde_json::Value>) -> Self {
        self.with_attribute(CAP_DEVICE_INFO, Attribute::Map(info))
    }

    /// Whether the context provides `capability`
    pub fn has(&self, capability: &str) -> bool {
        self.attributes.contains_key(capability)
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn string(&self) -> Result<&str, RuleError> {
        match self.attributes.get(CAP_STRING) {
            Some(Attribute::Text(s)) => Ok(s),
            Some(_) => Err(RuleError::Type(format!("{} attribute is not a string", CAP_STRING))),
            None => Err(RuleError::MissingAttribute(CAP_STRING.to_string())),
        }
    }

    pub fn bom(&self) -> Result<&Bom, RuleError> {
        match self.attributes.get(CAP_BOM) {
            Some(Attribute::Bom(bom)) => Ok(bom),
            Some(_) => Err(RuleError::Type(format!("{} attribute is not a BOM", CAP_BOM))),
            None => Err(RuleError::MissingAttribute(CAP_BOM.to_string())),
        }
    }

    pub fn bom_mut(&mut self) -> Result<&mut Bom, RuleError> {
        match self.attributes.get_mut(CAP_BOM) {
            Some(Attribute::Bom(bom)) => Ok(bom),
            Some(_) => Err(RuleError::Type(format!("{} attribute is not a BOM", CAP_BOM))),
            None => Err(RuleError::MissingAttribute(CAP_BOM.to_string())),
        }
    }

    pub fn device_info(&self) -> Result<&BTreeMap<String, serde_json::Value>, RuleError> {
        match self.attributes.get(CAP_DEVICE_INFO) {
            Some(Attribute::Map(map)) => Ok(map),
            Some(_) => Err(RuleError::Type(format!(
                "{} attribute is not a map",
                CAP_DEVICE_INFO
            ))),
            None => Err(RuleError::MissingAttribute(CAP_DEVICE_INFO.to_string())),
        }
    }

    /// Take the BOM back out after rules adjusted it
    pub fn into_bom(mut self) -> Option<Bom> {
        match self.attributes.remove(CAP_BOM) {
            Some(Attribute::Bom(bom)) => Some(bom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn prefix(self) -> &'static str {
        match self {
            Self::Info => INFO_PREFIX,
            Self::Warning => WARNING_PREFIX,
            Self::Error => ERROR_PREFIX,
        }
    }
}

/// Accumulates messages emitted while a rule runs
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    entries: Vec<(Severity, String)>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        debug!(severity = ?severity, message = %message, "Rule message");
        self.entries.push((severity, message));
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|(s, _)| *s == Severity::Error)
    }

    /// Error lines, each formatted as `"ERROR: {message}"`
    pub fn errors(&self) -> Vec<String> {
        self.lines_of(|s| s == Severity::Error)
    }

    /// Every line with its severity prefix, in emission order
    pub fn lines(&self) -> Vec<String> {
        self.lines_of(|_| true)
    }

    fn lines_of(&self, keep: impl Fn(Severity) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(s, _)| keep(*s))
            .map(|(s, m)| format!("{}{}", s.prefix(), m))
            .collect()
    }
}

/// What a rule function sees while it runs
pub struct CallScope<'a> {
    pub context: &'a mut Context,
    pub sink: &'a mut ErrorSink,
}

impl<'a> CallScope<'a> {
    pub fn new(context: &'a mut Context, sink: &'a mut ErrorSink) -> Self {
        Self { context, sink }
    }
}
