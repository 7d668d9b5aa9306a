//! Property value type shared by nodes and relations.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A property value.
///
/// Covers what the bulk-load format can carry:
/// - Scalars: Bool, Int, Float, String, Date
/// - Encoded collections: List (rendered `;`-joined), Map (rendered as JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    #[serde(with = "float_repr")]
    Float(f64),
    String(String),
    Date(NaiveDate),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

// ============================================================================
// Cell rendering
// ============================================================================

impl Value {
    /// Render as a single bulk-load cell.
    ///
    /// `Null` is the empty cell. Lists use the importer's array delimiter
    /// `;`; nested collections inside a list fall back to JSON.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::List(items) => items
                .iter()
                .map(|v| match v {
                    Value::List(_) | Value::Map(_) => v.to_json().to_string(),
                    other => other.to_cell(),
                })
                .collect::<Vec<_>>()
                .join(";"),
            Value::Map(_) => self.to_json().to_string(),
        }
    }

    /// Plain JSON rendering (untagged), used for map cells.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m) => Json::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    /// Untagged JSON as sources write it. Integral numbers become `Int`.
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

/// Serde form of `Float`: finite values are JSON numbers, `NaN` and the
/// infinities are the strings `"NaN"`, `"inf"` and `"-inf"`.
mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(f: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if f.is_finite() {
            serializer.serialize_f64(*f)
        } else if f.is_nan() {
            serializer.serialize_str("NaN")
        } else if *f > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(f) => Ok(f),
            Repr::Text(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("not a float: {other:?}"))),
            },
        }
    }
}

/// Floats that are whole numbers keep a trailing `.0` so the importer
/// does not mistake them for integers.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<u32> for Value { fn from(v: u32) -> Self { Value::Int(v as i64) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<NaiveDate> for Value { fn from(v: NaiveDate) -> Self { Value::Date(v) } }
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Value::List(v.into_iter().map(Into::into).collect()) }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(2.5), Value::Float(2.5));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_scalar_cells() {
        assert_eq!(Value::Null.to_cell(), "");
        assert_eq!(Value::Int(7).to_cell(), "7");
        assert_eq!(Value::Float(3.0).to_cell(), "3.0");
        assert_eq!(Value::Float(0.25).to_cell(), "0.25");
        let d = NaiveDate::from_ymd_opt(2021, 1, 26).unwrap();
        assert_eq!(Value::Date(d).to_cell(), "2021-01-26");
    }

    #[test]
    fn test_collection_cells() {
        let list = Value::from(vec!["CTD", "UNIPROT"]);
        assert_eq!(list.to_cell(), "CTD;UNIPROT");

        let mut counts = BTreeMap::new();
        counts.insert("reach".to_string(), Value::Int(3));
        counts.insert("biopax".to_string(), Value::Int(1));
        assert_eq!(Value::Map(counts).to_cell(), r#"{"biopax":1,"reach":3}"#);
    }

    #[test]
    fn test_from_plain_json() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"n": 3, "belief": 0.86, "srcs": ["a", "b"], "x": null}"#).unwrap();
        let Value::Map(map) = Value::from(json) else { panic!("expected a map") };
        assert_eq!(map["n"], Value::Int(3));
        assert_eq!(map["belief"], Value::Float(0.86));
        assert_eq!(map["srcs"], Value::from(vec!["a", "b"]));
        assert_eq!(map["x"], Value::Null);
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_string(&Value::Int(5)).unwrap();
        assert_eq!(json, r#"{"type":"Int","value":5}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Int(5));
    }

    #[test]
    fn test_non_finite_floats_survive_serde() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.86] {
            let json = serde_json::to_string(&Value::Float(f)).unwrap();
            let Value::Float(back) = serde_json::from_str(&json).unwrap() else {
                panic!("expected a float from {json}");
            };
            assert_eq!(back.to_bits(), f.to_bits(), "{json}");
        }
        assert_eq!(serde_json::to_string(&Value::Float(f64::NAN)).unwrap(), r#"{"type":"Float","value":"NaN"}"#);
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_cell(), "-inf");
    }
}
