//! Matching probed component values against the database catalog

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

use super::value::Value;
use crate::data::{ComponentCatalog, ComponentMap};

/// A single probed field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbedValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for ProbedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Field name -> probed value, for one probed component
pub type ProbedRecord = BTreeMap<String, ProbedValue>;

/// Component class -> probed records
pub type ProbeResults = BTreeMap<String, Vec<ProbedRecord>>;

/// Whether every expected field is present in `probed` and matches.
/// Extra probed fields are ignored.
pub fn match_probed_values(expected: &BTreeMap<String, Value>, probed: &ProbedRecord) -> bool {
    expected.iter().all(|(field, value)| {
        probed
            .get(field)
            .map_or(false, |probed| value.matches(probed.to_string().as_str()))
    })
}

/// Names of the catalogued components of `class` that accept `probed`
pub fn matching_components<'a>(
    catalog: &'a ComponentCatalog,
    class: &str,
    probed: &ProbedRecord,
) -> Vec<&'a str> {
    catalog
        .get(class)
        .into_iter()
        .flat_map(|components| components.iter())
        .filter(|(_, expected)| match_probed_values(expected, probed))
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Resolve probe results into component names per class.
///
/// Each record contributes the first catalogued component that accepts it;
/// records that match nothing are skipped.
pub fn identify_components(catalog: &ComponentCatalog, results: &ProbeResults) -> ComponentMap {
    let mut components = ComponentMap::new();
    for (class, records) in results {
        let names: Vec<String> = records
            .iter()
            .filter_map(|record| {
                let found = matching_components(catalog, class, record).first().copied();
                if found.is_none() {
                    trace!(class = %class, "Probed record matches no known component");
                }
                found.map(str::to_string)
            })
            .collect();
        components.insert(class.clone(), names);
    }
    components
}
