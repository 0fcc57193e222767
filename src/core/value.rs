//! Attribute value model
//!
//! Values are a closed tagged union keyed by the attribute's declared kind,
//! so an item's attribute map never carries "is it a string or an array"
//! ambiguity: the YAML representation is `{ kind: text, value: "Acme" }`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One row of a table-valued attribute: column code -> cell
pub type TableRow = BTreeMap<String, serde_json::Value>;

/// The declared type tag of an attribute definition.
///
/// Immutable after the definition is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Text,
    Number,
    Date,
    Boolean,
    Select,
    #[serde(rename = "multiselect")]
    #[clap(name = "multiselect")]
    MultiSelect,
    Table,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeKind::Text => "text",
            AttributeKind::Number => "number",
            AttributeKind::Date => "date",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Select => "select",
            AttributeKind::MultiSelect => "multiselect",
            AttributeKind::Table => "table",
        };
        write!(f, "{}", s)
    }
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Boolean(bool),
    Select(String),
    #[serde(rename = "multiselect")]
    MultiSelect(Vec<String>),
    Table(Vec<TableRow>),
}

impl AttributeValue {
    /// The kind tag this value carries
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Text(_) => AttributeKind::Text,
            AttributeValue::Number(_) => AttributeKind::Number,
            AttributeValue::Date(_) => AttributeKind::Date,
            AttributeValue::Boolean(_) => AttributeKind::Boolean,
            AttributeValue::Select(_) => AttributeKind::Select,
            AttributeValue::MultiSelect(_) => AttributeKind::MultiSelect,
            AttributeValue::Table(_) => AttributeKind::Table,
        }
    }

    /// Whether the value counts as "empty" for required-attribute checks.
    ///
    /// Empty text, an empty selection list and an empty table are all
    /// treated the same as an absent value.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Text(s) | AttributeValue::Select(s) => s.trim().is_empty(),
            AttributeValue::MultiSelect(v) => v.is_empty(),
            AttributeValue::Table(rows) => rows.is_empty(),
            AttributeValue::Number(_) | AttributeValue::Date(_) | AttributeValue::Boolean(_) => {
                false
            }
        }
    }

    /// Numeric view, for range filters and numeric constraints
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text rendering used by `contains` filters and free-text search.
    ///
    /// Multi-valued kinds join their entries so a substring match against any
    /// entry succeeds.
    pub fn search_text(&self) -> String {
        match self {
            AttributeValue::Text(s) | AttributeValue::Select(s) => s.clone(),
            AttributeValue::Number(n) => n.to_string(),
            AttributeValue::Date(d) => d.to_string(),
            AttributeValue::Boolean(b) => b.to_string(),
            AttributeValue::MultiSelect(v) => v.join(" "),
            AttributeValue::Table(rows) => rows
                .iter()
                .flat_map(|row| row.values())
                .map(json_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Exact-match comparison against a raw JSON operand (the `equals`
    /// operator). Multiselect passes when any selected entry matches.
    pub fn matches_json(&self, operand: &serde_json::Value) -> bool {
        match self {
            AttributeValue::Text(s) | AttributeValue::Select(s) => {
                operand.as_str().is_some_and(|o| o == s)
            }
            AttributeValue::Number(n) => operand.as_f64().is_some_and(|o| o == *n),
            AttributeValue::Date(d) => operand.as_str().is_some_and(|o| o == d.to_string()),
            AttributeValue::Boolean(b) => operand.as_bool().is_some_and(|o| o == *b),
            AttributeValue::MultiSelect(v) => operand
                .as_str()
                .is_some_and(|o| v.iter().any(|s| s == o)),
            AttributeValue::Table(_) => false,
        }
    }

    /// Coerce a raw JSON value into a typed value for the declared kind.
    ///
    /// This is the boundary where untyped caller input (CLI flags, import
    /// payloads) becomes a tagged value; everything downstream works on the
    /// closed union.
    pub fn from_json(kind: AttributeKind, raw: serde_json::Value) -> Result<Self, String> {
        match kind {
            AttributeKind::Text => match raw {
                serde_json::Value::String(s) => Ok(AttributeValue::Text(s)),
                other => Err(format!("expected a string for text attribute, got {other}")),
            },
            AttributeKind::Number => raw
                .as_f64()
                .map(AttributeValue::Number)
                .ok_or_else(|| format!("expected a number, got {raw}")),
            AttributeKind::Date => match raw {
                serde_json::Value::String(s) => s
                    .parse::<NaiveDate>()
                    .map(AttributeValue::Date)
                    .map_err(|e| format!("invalid date '{s}': {e}")),
                other => Err(format!("expected an ISO date string, got {other}")),
            },
            AttributeKind::Boolean => match raw {
                serde_json::Value::Bool(b) => Ok(AttributeValue::Boolean(b)),
                other => Err(format!("expected a boolean, got {other}")),
            },
            AttributeKind::Select => match raw {
                serde_json::Value::String(s) => Ok(AttributeValue::Select(s)),
                other => Err(format!("expected a string for select attribute, got {other}")),
            },
            AttributeKind::MultiSelect => match raw {
                serde_json::Value::String(s) => Ok(AttributeValue::MultiSelect(vec![s])),
                serde_json::Value::Array(entries) => entries
                    .into_iter()
                    .map(|e| match e {
                        serde_json::Value::String(s) => Ok(s),
                        other => Err(format!("expected a string selection, got {other}")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(AttributeValue::MultiSelect),
                other => Err(format!("expected a string array, got {other}")),
            },
            AttributeKind::Table => match raw {
                serde_json::Value::Array(rows) => rows
                    .into_iter()
                    .map(|row| match row {
                        serde_json::Value::Object(map) => {
                            Ok(map.into_iter().collect::<TableRow>())
                        }
                        other => Err(format!("expected an object row, got {other}")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(AttributeValue::Table),
                other => Err(format!("expected an array of rows, got {other}")),
            },
        }
    }
}

fn json_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_yaml_roundtrip() {
        let v = AttributeValue::MultiSelect(vec!["led".into(), "oled".into()]);
        let yaml = serde_yml::to_string(&v).unwrap();
        assert!(yaml.contains("kind: multiselect"));
        let back: AttributeValue = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn test_empty_semantics() {
        assert!(AttributeValue::Text("  ".into()).is_empty());
        assert!(AttributeValue::MultiSelect(vec![]).is_empty());
        assert!(!AttributeValue::Number(0.0).is_empty());
        assert!(!AttributeValue::Boolean(false).is_empty());
    }

    #[test]
    fn test_from_json_respects_kind() {
        let v = AttributeValue::from_json(AttributeKind::Number, serde_json::json!(42)).unwrap();
        assert_eq!(v, AttributeValue::Number(42.0));

        let err = AttributeValue::from_json(AttributeKind::Number, serde_json::json!("42"));
        assert!(err.is_err());
    }

    #[test]
    fn test_from_json_single_string_multiselect() {
        let v =
            AttributeValue::from_json(AttributeKind::MultiSelect, serde_json::json!("led")).unwrap();
        assert_eq!(v, AttributeValue::MultiSelect(vec!["led".into()]));
    }

    #[test]
    fn test_matches_json() {
        assert!(AttributeValue::Text("Acme".into()).matches_json(&serde_json::json!("Acme")));
        assert!(!AttributeValue::Text("Acme".into()).matches_json(&serde_json::json!("acme")));
        assert!(AttributeValue::MultiSelect(vec!["a".into(), "b".into()])
            .matches_json(&serde_json::json!("b")));
        assert!(AttributeValue::Number(3.5).matches_json(&serde_json::json!(3.5)));
    }

    #[test]
    fn test_search_text_joins_multivalue() {
        let v = AttributeValue::MultiSelect(vec!["led".into(), "oled".into()]);
        assert_eq!(v.search_text(), "led oled");
    }
}
