//! Dynamic output schema entries.
//!
//! A schema entry is derived from a field as `"<field>_<declared_type>"`
//! plus the translated output type. The ordered entry list for a preset is
//! recomputed on every structural change and always has length >= 1.

use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// Output slot type, as seen by the host engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputType {
    /// Integer output.
    Int,
    /// Floating-point output.
    Float,
    /// String output.
    String,
}

impl From<ValueType> for OutputType {
    fn from(declared: ValueType) -> Self {
        match declared {
            ValueType::Int => OutputType::Int,
            ValueType::Float => OutputType::Float,
            ValueType::String => OutputType::String,
        }
    }
}

impl OutputType {
    /// The zero-value used to pad missing trailing tuple positions.
    pub fn zero(&self) -> OutputValue {
        match self {
            OutputType::Int => OutputValue::Int(0),
            OutputType::Float => OutputValue::Float(0.0),
            OutputType::String => OutputValue::Text(String::new()),
        }
    }
}

/// One ordered slot of the dynamic output schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaEntry {
    /// Output slot type.
    pub output_type: OutputType,

    /// Output name, `"<field>_<declared_type>"`.
    pub name: String,
}

impl SchemaEntry {
    /// Derive the entry for a named field.
    pub fn for_field(field: &str, declared: ValueType) -> Self {
        Self {
            output_type: declared.into(),
            name: format!("{}_{}", field, declared.as_str()),
        }
    }

    /// The single default entry used when a preset has no fields.
    pub fn default_output() -> Self {
        Self {
            output_type: OutputType::String,
            name: "output".to_string(),
        }
    }
}

/// A converted output value, one per schema slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OutputValue {
    /// Converted integer.
    Int(i64),
    /// Converted float.
    Float(f64),
    /// String passthrough.
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_derivation() {
        let entry = SchemaEntry::for_field("strength", ValueType::Float);
        assert_eq!(entry.name, "strength_float");
        assert_eq!(entry.output_type, OutputType::Float);
    }

    #[test]
    fn test_output_type_wire_names() {
        assert_eq!(serde_json::to_string(&OutputType::Int).unwrap(), "\"INT\"");
        assert_eq!(serde_json::to_string(&OutputType::Float).unwrap(), "\"FLOAT\"");
        assert_eq!(serde_json::to_string(&OutputType::String).unwrap(), "\"STRING\"");
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(OutputType::Int.zero(), OutputValue::Int(0));
        assert_eq!(OutputType::Float.zero(), OutputValue::Float(0.0));
        assert_eq!(OutputType::String.zero(), OutputValue::Text(String::new()));
    }

    #[test]
    fn test_output_value_serializes_untagged() {
        let values = vec![
            OutputValue::Int(3),
            OutputValue::Float(0.5),
            OutputValue::Text("hi".to_string()),
        ];
        assert_eq!(serde_json::to_string(&values).unwrap(), "[3,0.5,\"hi\"]");
    }
}
