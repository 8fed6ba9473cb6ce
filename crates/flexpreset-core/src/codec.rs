//! YAML codec for preset documents.
//!
//! Key order is preserved in both directions: documents decode into
//! [`IndexMap`]s and encode back without reordering, so
//! `decode(encode(d)) == d` for any document.
//!
//! Duplicate top-level keys are not rejected; the last occurrence wins.
//! Hand-edited files rely on this, and a test below pins it.
//!
//! [`IndexMap`]: indexmap::IndexMap

use indexmap::IndexMap;

use crate::error::{PresetError, Result};
use crate::types::{Document, Preset};

/// Parse a document from its on-disk text form.
///
/// Empty input, comment-only input and a bare `null` all decode to an empty
/// document. Malformed YAML yields [`PresetError::Parse`]; the store turns
/// that into a quarantine action rather than propagating it.
pub fn decode(text: &str) -> Result<Document> {
    let presets: Option<IndexMap<String, Preset>> =
        serde_yaml_ng::from_str(text).map_err(|e| PresetError::Parse {
            message: e.to_string(),
        })?;

    Ok(Document {
        presets: presets.unwrap_or_default(),
    })
}

/// Serialize a document to its on-disk text form, preserving key order.
pub fn encode(document: &Document) -> Result<String> {
    serde_yaml_ng::to_string(&document.presets)
        .map_err(|e| PresetError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, ValueType};

    fn sample() -> Document {
        let mut doc = Document::new();
        let preset = doc.ensure_preset("portrait");
        preset.values.insert("zebra".to_string(), Field::new(ValueType::String, "stripes"));
        preset.values.insert("alpha".to_string(), Field::new(ValueType::Int, "1"));
        preset.values.insert("mid".to_string(), Field::new(ValueType::Float, "0.5"));
        doc.ensure_preset("landscape")
            .values
            .insert("width".to_string(), Field::new(ValueType::Int, "1920"));
        doc
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let doc = sample();
        let text = encode(&doc).unwrap();
        let decoded = decode(&text).unwrap();

        assert_eq!(decoded, doc);
        let names: Vec<&String> = decoded.presets["portrait"].values.keys().collect();
        assert_eq!(names, ["zebra", "alpha", "mid"]);
        assert_eq!(decoded.titles(), ["portrait", "landscape"]);
    }

    #[test]
    fn test_empty_input_is_empty_document() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("# just a comment\n").unwrap().is_empty());
        assert!(decode("null\n").unwrap().is_empty());
    }

    #[test]
    fn test_null_panel_is_empty_mapping() {
        let doc = decode("example:\n  values:\n").unwrap();
        assert!(doc.presets["example"].values.is_empty());

        let doc = decode("example: {}\n").unwrap();
        assert!(doc.presets["example"].values.is_empty());
    }

    #[test]
    fn test_duplicate_title_last_wins() {
        let text = "\
dup:
  values:
    first:
      type: string
      value: one
dup:
  values:
    second:
      type: string
      value: two
";
        let doc = decode(text).unwrap();
        assert_eq!(doc.presets.len(), 1);
        assert!(doc.presets["dup"].values.contains_key("second"));
        assert!(!doc.presets["dup"].values.contains_key("first"));
    }

    #[test]
    fn test_bare_scalars_normalize_to_strings() {
        let text = "\
example:
  values:
    count:
      type: int
      value: 42
    ratio:
      type: float
      value: 0.25
";
        let doc = decode(text).unwrap();
        let values = &doc.presets["example"].values;
        assert_eq!(values["count"].value, "42");
        assert_eq!(values["ratio"].value, "0.25");
    }

    #[test]
    fn test_malformed_input_is_parse_error() {
        let err = decode("example: [unclosed\n").unwrap_err();
        assert!(matches!(err, PresetError::Parse { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unknown_declared_type_decodes_as_string() {
        let text = "\
example:
  values:
    odd:
      type: quaternion
      value: whatever
";
        let doc = decode(text).unwrap();
        assert_eq!(doc.presets["example"].values["odd"].declared_type, ValueType::String);
    }
}
