//! Document model: presets, panels and typed fields.
//!
//! Every mapping in the model is an [`IndexMap`] so that key order survives
//! a full decode/encode round trip. Order is part of the contract: the
//! dynamic output schema is derived from it.

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};

/// The declared scalar type of a field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Integer literal, `^-?[0-9]+$`.
    Int,
    /// Floating literal, `^-?[0-9]*\.?[0-9]+$`.
    Float,
    /// Any scalar. Unknown declared types decode as string.
    #[serde(other)]
    String,
}

fn int_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+$").expect("int literal pattern"))
}

fn float_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]*\.?[0-9]+$").expect("float literal pattern"))
}

impl ValueType {
    /// The lowercase name used on disk and in output names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
        }
    }

    /// Check whether a string-encoded value lexically matches this type.
    ///
    /// A mismatch is not fatal at mutation time; callers log it and write
    /// anyway. It only becomes an error during evaluation.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            ValueType::Int => int_literal().is_match(value),
            ValueType::Float => float_literal().is_match(value),
            ValueType::String => true,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed value inside a panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    /// The declared scalar type.
    #[serde(rename = "type")]
    pub declared_type: ValueType,

    /// String-encoded scalar value. Bare YAML numbers and booleans are
    /// accepted on decode and normalized to their string form.
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

impl Field {
    /// Create a new field.
    pub fn new(declared_type: ValueType, value: impl Into<String>) -> Self {
        Self {
            declared_type,
            value: value.into(),
        }
    }
}

/// Ordered mapping of field name to field.
pub type Panel = IndexMap<String, Field>;

/// A named group of values. The single implicit panel is called `values`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    /// The panel's ordered field mapping. A `null` or absent panel decodes
    /// to an empty mapping.
    #[serde(default, deserialize_with = "nullable_panel")]
    pub values: Panel,
}

impl Preset {
    /// Create an empty preset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `old` with `new` at the same position.
    ///
    /// Returns false (and leaves the panel untouched) when `old` is absent,
    /// `new` is empty, or the names are equal.
    pub fn rename_field(&mut self, old: &str, new: &str) -> bool {
        if new.is_empty() || old == new || !self.values.contains_key(old) {
            return false;
        }

        let mut renamed = Panel::with_capacity(self.values.len());
        for (name, field) in self.values.drain(..) {
            if name == old {
                renamed.insert(new.to_string(), field);
            } else {
                renamed.insert(name, field);
            }
        }
        self.values = renamed;
        true
    }
}

/// One persisted unit: an ordered mapping of preset name to preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Document {
    /// All presets, in document order.
    pub presets: IndexMap<String, Preset>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset names in document order.
    pub fn titles(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Get or create a preset, appending it at the end when new.
    pub fn ensure_preset(&mut self, name: &str) -> &mut Preset {
        self.presets.entry(name.to_string()).or_default()
    }

    /// True when the document holds no presets.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

/// Accept any YAML scalar for a field value and keep its string form.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml_ng::Value::deserialize(deserializer)?;
    match value {
        serde_yaml_ng::Value::String(s) => Ok(s),
        serde_yaml_ng::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml_ng::Value::Number(n) => Ok(n.to_string()),
        serde_yaml_ng::Value::Null => Ok(String::new()),
        _ => Err(de::Error::custom("field value must be a scalar")),
    }
}

/// `values: null` is treated as an empty panel.
fn nullable_panel<'de, D>(deserializer: D) -> Result<Panel, D::Error>
where
    D: Deserializer<'de>,
{
    let panel = Option::<Panel>::deserialize(deserializer)?;
    Ok(panel.unwrap_or_default())
}
