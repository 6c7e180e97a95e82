//! The body-shape analyzer interface: a single narrow seam for
//! content-type-aware body summarization, with a JSON-schema-inference
//! implementation. HTML/XML/CSV branches are pluggable concerns outside this
//! crate and fall through to `Skipped`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inferred shape of a JSON value across a sample of bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array(Box<JsonType>),
    Object(BTreeMap<String, FieldShape>),
    /// More than one incompatible kind observed at this position.
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldShape {
    pub ty: JsonType,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyAnalysis {
    JsonSchema(JsonType),
    Skipped,
}

/// Content-type-aware body summarization, pluggable per the external
/// interface. Implementations receive every non-empty body sharing a
/// cluster's dominant content type.
pub trait BodyAnalyzer: Send + Sync {
    fn analyze(&self, bodies: &[Vec<u8>], content_type: &str) -> BodyAnalysis;
}

/// Infers a JSON schema: type per key, optional/required by presence across
/// the sample, array element shape by merging every element seen.
#[derive(Default)]
pub struct JsonSchemaAnalyzer;

impl BodyAnalyzer for JsonSchemaAnalyzer {
    fn analyze(&self, bodies: &[Vec<u8>], content_type: &str) -> BodyAnalysis {
        if !content_type.contains("json") {
            return BodyAnalysis::Skipped;
        }
        let values: Vec<serde_json::Value> = bodies
            .iter()
            .filter(|b| !b.is_empty())
            .filter_map(|b| serde_json::from_slice(b).ok())
            .collect();
        if values.is_empty() {
            return BodyAnalysis::Skipped;
        }
        let refs: Vec<&serde_json::Value> = values.iter().collect();
        BodyAnalysis::JsonSchema(merge_shape(&refs))
    }
}

fn merge_shape(values: &[&serde_json::Value]) -> JsonType {
    use serde_json::Value;

    let mut saw_bool = false;
    let mut saw_number = false;
    let mut saw_string = false;
    let mut arrays: Vec<&Value> = Vec::new();
    let mut objects: Vec<&serde_json::Map<String, Value>> = Vec::new();

    for v in values {
        match v {
            Value::Null => {}
            Value::Bool(_) => saw_bool = true,
            Value::Number(_) => saw_number = true,
            Value::String(_) => saw_string = true,
            Value::Array(_) => arrays.push(v),
            Value::Object(m) => objects.push(m),
        }
    }

    let kinds = [saw_bool, saw_number, saw_string, !arrays.is_empty(), !objects.is_empty()]
        .iter()
        .filter(|present| **present)
        .count();

    if kinds == 0 {
        return JsonType::Null;
    }
    if kinds > 1 {
        return JsonType::Mixed;
    }
    if saw_bool {
        return JsonType::Bool;
    }
    if saw_number {
        return JsonType::Number;
    }
    if saw_string {
        return JsonType::String;
    }
    if !arrays.is_empty() {
        let elements: Vec<&Value> = arrays
            .iter()
            .flat_map(|v| match v {
                Value::Array(items) => items.iter(),
                _ => unreachable!(),
            })
            .collect();
        let element_ty = if elements.is_empty() {
            JsonType::Mixed
        } else {
            merge_shape(&elements)
        };
        return JsonType::Array(Box::new(element_ty));
    }

    let total = objects.len();
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    for obj in &objects {
        keys.extend(obj.keys().map(|k| k.as_str()));
    }
    let mut fields = BTreeMap::new();
    for key in keys {
        let present: Vec<&Value> = objects.iter().filter_map(|o| o.get(key)).collect();
        let optional = present.len() < total;
        fields.insert(
            key.to_string(),
            FieldShape {
                ty: merge_shape(&present),
                optional,
            },
        );
    }
    JsonType::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_content_type_is_skipped() {
        let analyzer = JsonSchemaAnalyzer;
        let result = analyzer.analyze(&[b"<html></html>".to_vec()], "text/html");
        assert_eq!(result, BodyAnalysis::Skipped);
    }

    #[test]
    fn infers_required_and_optional_fields() {
        let analyzer = JsonSchemaAnalyzer;
        let bodies = vec![
            br#"{"id": 1, "name": "a"}"#.to_vec(),
            br#"{"id": 2, "name": "b", "nickname": "bee"}"#.to_vec(),
        ];
        let BodyAnalysis::JsonSchema(JsonType::Object(fields)) = analyzer.analyze(&bodies, "application/json") else {
            panic!("expected object schema");
        };
        assert_eq!(fields.get("id"), Some(&FieldShape { ty: JsonType::Number, optional: false }));
        assert_eq!(fields.get("nickname"), Some(&FieldShape { ty: JsonType::String, optional: true }));
    }

    #[test]
    fn merges_array_element_shapes() {
        let analyzer = JsonSchemaAnalyzer;
        let bodies = vec![br#"{"tags": ["a", "b"]}"#.to_vec()];
        let BodyAnalysis::JsonSchema(JsonType::Object(fields)) = analyzer.analyze(&bodies, "application/json") else {
            panic!("expected object schema");
        };
        assert_eq!(fields.get("tags").unwrap().ty, JsonType::Array(Box::new(JsonType::String)));
    }

    #[test]
    fn incompatible_types_at_same_key_are_mixed() {
        let analyzer = JsonSchemaAnalyzer;
        let bodies = vec![br#"{"v": 1}"#.to_vec(), br#"{"v": "x"}"#.to_vec()];
        let BodyAnalysis::JsonSchema(JsonType::Object(fields)) = analyzer.analyze(&bodies, "application/json; charset=utf-8") else {
            panic!("expected object schema");
        };
        assert_eq!(fields.get("v").unwrap().ty, JsonType::Mixed);
    }

    #[test]
    fn empty_sample_is_skipped() {
        let analyzer = JsonSchemaAnalyzer;
        let result = analyzer.analyze(&[], "application/json");
        assert_eq!(result, BodyAnalysis::Skipped);
    }
}
