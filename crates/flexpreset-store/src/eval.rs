//! Evaluation helpers: type conversion and arity reconciliation.

use flexpreset_core::{Field, OutputValue, PresetError, Result, SchemaEntry, ValueType};

/// The result of one evaluation cycle: an ordered schema and an ordered
/// value tuple of exactly the same length.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Resolved output schema.
    pub schema: Vec<SchemaEntry>,

    /// Converted output values, one per schema slot.
    pub values: Vec<OutputValue>,
}

impl Evaluation {
    /// Number of output slots.
    pub fn len(&self) -> usize {
        self.schema.len()
    }

    /// True when there are no slots (never happens for a resolved preset).
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }
}

/// Convert a field's string-encoded value to its declared type.
///
/// A value that does not parse is a hard failure for the evaluation cycle:
/// coercing it silently would corrupt downstream computation.
pub(crate) fn convert_value(
    document: &str,
    preset: &str,
    name: &str,
    field: &Field,
) -> Result<OutputValue> {
    let conversion_error = || PresetError::Conversion {
        document: document.to_string(),
        preset: preset.to_string(),
        field: name.to_string(),
        declared: field.declared_type,
        value: field.value.clone(),
    };

    match field.declared_type {
        ValueType::Int => field
            .value
            .parse::<i64>()
            .map(OutputValue::Int)
            .map_err(|_| conversion_error()),
        ValueType::Float => field
            .value
            .parse::<f64>()
            .map(OutputValue::Float)
            .map_err(|_| conversion_error()),
        ValueType::String => Ok(OutputValue::Text(field.value.clone())),
    }
}

/// Force the value tuple to the schema's arity.
///
/// Missing trailing positions are padded with each slot type's zero-value;
/// excess values are truncated. This tolerates schema/value races during
/// concurrent mutation without ever returning a tuple of the wrong length.
pub(crate) fn reconcile_arity(schema: &[SchemaEntry], values: &mut Vec<OutputValue>) {
    while values.len() < schema.len() {
        let slot = &schema[values.len()];
        values.push(slot.output_type.zero());
    }
    values.truncate(schema.len());
}
