//! Feature options: a named, versioned behavioral knob (gas table,
//! difficulty rule, chain id, ...) whose value can change at fork
//! boundaries.
//!
//! `spec.md` describes these options as dynamically typed and lazily
//! cached behind a read-write lock. Per the REDESIGN FLAG in `spec.md`
//! §9 ("the lazy-cache pattern exists only to paper over dynamic typing
//! and is unnecessary"), we decode eagerly into a tagged union at JSON
//! parse time instead.

use std::collections::BTreeMap;

use serde::Deserialize;

/// A single option value. JSON numbers decode to [`FeatureValue::Int`]
/// when they have no fractional part and fit an `i128`, otherwise to
/// [`FeatureValue::Float`]. Strings that look like base-prefixed numeric
/// literals (`"0x..."`, plain decimal digits) are kept as
/// [`FeatureValue::Str`] — `as_big_int` below is responsible for parsing
/// them on demand, matching `GetBigInt`'s documented string-parsing
/// fallback in `spec.md` §4.2.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// A whole-number option value.
    Int(i128),
    /// A floating-point option value (JSON's default numeric encoding).
    Float(f64),
    /// A string option value, possibly a base-prefixed numeric literal.
    Str(String),
    /// A boolean option value.
    Bool(bool),
}

impl FeatureValue {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(FeatureValue::Bool(*b)),
            serde_json::Value::String(s) => Some(FeatureValue::Str(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FeatureValue::Int(i as i128))
                } else if let Some(u) = n.as_u64() {
                    Some(FeatureValue::Int(u as i128))
                } else {
                    n.as_f64().map(FeatureValue::Float)
                }
            }
            _ => None,
        }
    }

    /// Decodes the value as a big (well, `i128`-range) integer. Mirrors
    /// `GetBigInt`'s documented sources: a 64-bit float, a signed 64-bit
    /// integer, a plain integer, or a base-prefixed numeric string. A
    /// string that fails to parse returns `None` (the "zero value plus
    /// not-present flag" in `spec.md` collapses to `Option::None` here,
    /// since the tagged union makes the zero-value sentinel unnecessary).
    pub fn as_big_int(&self) -> Option<i128> {
        match self {
            FeatureValue::Int(i) => Some(*i),
            FeatureValue::Float(f) => Some(*f as i128),
            FeatureValue::Bool(_) => None,
            FeatureValue::Str(s) => {
                let s = s.trim();
                if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    i128::from_str_radix(hex, 16).ok()
                } else {
                    s.parse::<i128>().ok()
                }
            }
        }
    }

    /// Decodes the value as a string, formatting numeric/boolean values
    /// rather than failing.
    pub fn as_str(&self) -> String {
        match self {
            FeatureValue::Str(s) => s.clone(),
            FeatureValue::Int(i) => i.to_string(),
            FeatureValue::Float(f) => f.to_string(),
            FeatureValue::Bool(b) => b.to_string(),
        }
    }

    /// Decodes the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A named, versioned behavioral knob. `options` is keyed by option name
/// (`"type"`, `"length"`, `"chainID"`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ForkFeature {
    /// Feature id, e.g. `"gastable"`, `"difficulty"`, `"eip155"`.
    pub id: String,
    options: BTreeMap<String, FeatureValue>,
}

impl ForkFeature {
    /// Builds a single-option feature, for convenience keys the loader
    /// surfaces as ordinary features rather than bespoke struct fields
    /// (`eip150_hash`, `dao_fork_support` — SPEC_FULL.md §4.3 [ADDED]).
    pub(crate) fn single_option(id: impl Into<String>, option: &str, value: FeatureValue) -> Self {
        let mut options = BTreeMap::new();
        options.insert(option.to_string(), value);
        ForkFeature { id: id.into(), options }
    }

    /// Looks up an option's raw value.
    pub fn option(&self, name: &str) -> Option<&FeatureValue> {
        self.options.get(name)
    }

    /// Convenience accessor for a string-typed option such as
    /// `gastable.type`.
    pub fn string_option(&self, name: &str) -> Option<String> {
        self.option(name).map(FeatureValue::as_str)
    }

    /// Convenience accessor for an integer-typed option such as
    /// `difficulty.length` or `eip155.chainID`.
    pub fn int_option(&self, name: &str) -> Option<i128> {
        self.option(name).and_then(FeatureValue::as_big_int)
    }
}

/// On-disk shape of a feature entry, used only during JSON decoding; see
/// [`ForkFeature`] for the runtime representation.
#[derive(Debug, Deserialize)]
pub(crate) struct RawForkFeature {
    id: String,
    #[serde(default)]
    options: BTreeMap<String, serde_json::Value>,
}

impl RawForkFeature {
    pub(crate) fn into_feature(self) -> ForkFeature {
        let options = self
            .options
            .into_iter()
            .filter_map(|(k, v)| FeatureValue::from_json(&v).map(|v| (k, v)))
            .collect();
        ForkFeature { id: self.id, options }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(json: &str) -> ForkFeature {
        let raw: RawForkFeature = serde_json::from_str(json).unwrap();
        raw.into_feature()
    }

    #[test]
    fn decodes_int_float_string_bool() {
        let f = feature(
            r#"{"id":"x","options":{"a":1,"b":1.5,"c":"hi","d":true,"e":"0x10"}}"#,
        );
        assert_eq!(f.int_option("a"), Some(1));
        assert_eq!(f.option("b"), Some(&FeatureValue::Float(1.5)));
        assert_eq!(f.string_option("c"), Some("hi".to_string()));
        assert_eq!(f.option("d").unwrap().as_bool(), Some(true));
        assert_eq!(f.int_option("e"), Some(16));
    }

    #[test]
    fn unparseable_string_returns_none() {
        let f = feature(r#"{"id":"x","options":{"a":"not-a-number"}}"#);
        assert_eq!(f.int_option("a"), None);
    }
}
