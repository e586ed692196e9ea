//! Variable extraction rules.
//!
//! A rule walks a parsed JSON response one segment at a time and ends in a terminal
//! key lookup:
//!
//! ```json
//! {
//!   "firstItemId": {
//!     "type": "dict", "key": "items",
//!     "child": {
//!       "type": "list", "index": 0,
//!       "child": {"type": "terminal", "key": "id"}
//!     }
//!   }
//! }
//! ```
//!
//! Any `type` other than `dict` and `list` is treated as terminal. Indexes may be
//! numbers or numeric strings, since rules are rendered as templates first.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::template::Variables;
use crate::util;
use crate::GanderError;

/// One segment of an extraction path.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableRule {
    /// Take field `key` of a map and continue with `child`.
    Dict { key: String, child: Box<VariableRule> },
    /// Take element `index` of a sequence and continue with `child`.
    List { index: usize, child: Box<VariableRule> },
    /// Take field `key` of a map: the extracted value.
    Terminal { key: String },
}

// The on-disk shape: `type` selects the variant, unknown types are terminal.
#[derive(Deserialize)]
struct RawRule {
    #[serde(rename = "type", default)]
    kind: String,
    key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_index")]
    index: Option<usize>,
    child: Option<Box<RawRule>>,
}

fn deserialize_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    util::deserialize_count(deserializer).map(Some)
}

impl TryFrom<RawRule> for VariableRule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "dict" => Ok(VariableRule::Dict {
                key: raw.key.ok_or("a dict rule needs a `key`")?,
                child: Box::new(VariableRule::try_from(
                    *raw.child.ok_or("a dict rule needs a `child`")?,
                )?),
            }),
            "list" => Ok(VariableRule::List {
                index: raw.index.ok_or("a list rule needs an `index`")?,
                child: Box::new(VariableRule::try_from(
                    *raw.child.ok_or("a list rule needs a `child`")?,
                )?),
            }),
            _ => Ok(VariableRule::Terminal {
                key: raw.key.ok_or("a terminal rule needs a `key`")?,
            }),
        }
    }
}

impl<'de> Deserialize<'de> for VariableRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawRule::deserialize(deserializer)?;
        VariableRule::try_from(raw).map_err(de::Error::custom)
    }
}

/// Rules keyed by the variable they assign.
pub type VariableRules = BTreeMap<String, VariableRule>;

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

impl VariableRule {
    /// Walk `response` and return the value this rule points at.
    pub fn extract(&self, variable: &str, response: &Value) -> Result<Value, GanderError> {
        let fail = |path: &str, detail: String| GanderError::Extraction {
            variable: variable.to_string(),
            path: if path.is_empty() {
                "$".to_string()
            } else {
                path.to_string()
            },
            detail,
        };
        let mut rule = self;
        let mut current = response;
        let mut path = String::new();
        loop {
            match rule {
                VariableRule::Dict { key, .. } | VariableRule::Terminal { key } => {
                    let map = current.as_object().ok_or_else(|| {
                        fail(
                            &path,
                            format!(
                                "expected a map to look up `{}`, found {}",
                                key,
                                describe(current)
                            ),
                        )
                    })?;
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                    let value = map
                        .get(key.as_str())
                        .ok_or_else(|| fail(&path, "missing key".to_string()))?;
                    match rule {
                        VariableRule::Dict { child, .. } => {
                            current = value;
                            rule = child;
                        }
                        _ => return Ok(value.clone()),
                    }
                }
                VariableRule::List { index, child } => {
                    let items = current.as_array().ok_or_else(|| {
                        fail(
                            &path,
                            format!("expected a list, found {}", describe(current)),
                        )
                    })?;
                    path.push_str(&format!("[{}]", index));
                    current = items.get(*index).ok_or_else(|| {
                        fail(
                            &path,
                            format!("index out of range (list has {} items)", items.len()),
                        )
                    })?;
                    rule = child;
                }
            }
        }
    }
}

/// Everything a step's rules produced: extracted values and per-variable failures.
#[derive(Debug, Default)]
pub struct Extraction {
    pub values: Variables,
    pub errors: Vec<GanderError>,
}

/// Apply every rule to `response`. A failing rule doesn't stop the others.
pub fn extract_variables(rules: &VariableRules, response: &Value) -> Extraction {
    let mut extraction = Extraction::default();
    for (variable, rule) in rules {
        match rule.extract(variable, response) {
            Ok(value) => {
                extraction.values.insert(variable.clone(), value);
            }
            Err(e) => extraction.errors.push(e),
        }
    }
    extraction
}
