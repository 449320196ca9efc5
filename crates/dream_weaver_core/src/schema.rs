//! crates/dream_weaver_core/src/schema.rs
//!
//! A small declarative description of the JSON shape the model must return.
//! The core owns this description; adapters translate it into whatever their
//! provider expects (see `SchemaNode::to_json_schema`).

use serde_json::{json, Map, Value};

/// One node of a response schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String {
        description: Option<&'static str>,
    },
    Array {
        items: Box<SchemaNode>,
        description: Option<&'static str>,
    },
    Object {
        /// Ordered field list: name, node, required.
        properties: Vec<(&'static str, SchemaNode, bool)>,
        description: Option<&'static str>,
    },
}

impl SchemaNode {
    pub fn string(description: &'static str) -> Self {
        SchemaNode::String {
            description: Some(description),
        }
    }

    pub fn array(items: SchemaNode, description: Option<&'static str>) -> Self {
        SchemaNode::Array {
            items: Box::new(items),
            description,
        }
    }

    /// Builds an object node whose fields are all required.
    pub fn object(properties: Vec<(&'static str, SchemaNode)>) -> Self {
        SchemaNode::Object {
            properties: properties
                .into_iter()
                .map(|(name, node)| (name, node, true))
                .collect(),
            description: None,
        }
    }

    /// Translates the node into a standard JSON Schema document.
    pub fn to_json_schema(&self) -> Value {
        match self {
            SchemaNode::String { description } => with_description(json!({ "type": "string" }), *description),
            SchemaNode::Array { items, description } => with_description(
                json!({ "type": "array", "items": items.to_json_schema() }),
                *description,
            ),
            SchemaNode::Object {
                properties,
                description,
            } => {
                let mut props = Map::new();
                let mut required = Vec::new();
                for (name, node, is_required) in properties {
                    props.insert((*name).to_string(), node.to_json_schema());
                    if *is_required {
                        required.push(Value::String((*name).to_string()));
                    }
                }
                with_description(
                    json!({
                        "type": "object",
                        "properties": props,
                        "required": required,
                        "additionalProperties": false,
                    }),
                    *description,
                )
            }
        }
    }

    /// Checks a parsed JSON value against this node. Returns the path of the
    /// first violation found.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), String> {
        match self {
            SchemaNode::String { .. } => match value {
                Value::String(_) => Ok(()),
                other => Err(format!("{}: expected string, found {}", path, kind_of(other))),
            },
            SchemaNode::Array { items, .. } => match value {
                Value::Array(elements) => elements
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, el)| items.validate_at(el, &format!("{}[{}]", path, i))),
                other => Err(format!("{}: expected array, found {}", path, kind_of(other))),
            },
            SchemaNode::Object { properties, .. } => {
                let fields = match value {
                    Value::Object(fields) => fields,
                    other => {
                        return Err(format!("{}: expected object, found {}", path, kind_of(other)))
                    }
                };
                for (name, node, required) in properties {
                    let field_path = format!("{}.{}", path, name);
                    match fields.get(*name) {
                        Some(field) => node.validate_at(field, &field_path)?,
                        None if *required => {
                            return Err(format!("{}: required field is missing", field_path))
                        }
                        None => {}
                    }
                }
                Ok(())
            }
        }
    }
}

fn with_description(mut schema: Value, description: Option<&'static str>) -> Value {
    if let (Some(text), Value::Object(map)) = (description, &mut schema) {
        map.insert("description".to_string(), Value::String(text.to_string()));
    }
    schema
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The shape of a `DreamReport`.
pub fn dream_report_schema() -> SchemaNode {
    SchemaNode::object(vec![
        (
            "introduction",
            SchemaNode::string(
                "A philosophical, elegant summary of the dream in a 'Wisdom-Oriented Philosopher' tone (Chinese).",
            ),
        ),
        (
            "psychological_decode",
            SchemaNode::object(vec![
                (
                    "content",
                    SchemaNode::string("Analysis based on Western Psychology (Freud/Jung/Cognitive)."),
                ),
                (
                    "key_concepts",
                    SchemaNode::array(
                        SchemaNode::String { description: None },
                        Some("Key psychological terms used."),
                    ),
                ),
            ]),
        ),
        (
            "traditional_divination",
            SchemaNode::object(vec![
                (
                    "content",
                    SchemaNode::string("Analysis based on Eastern Tradition (Zhou Gong/I Ching/Taoism)."),
                ),
                (
                    "cultural_context",
                    SchemaNode::string("Specific cultural or historical context references."),
                ),
            ]),
        ),
        (
            "sources",
            SchemaNode::array(
                SchemaNode::object(vec![
                    (
                        "id",
                        SchemaNode::string("Unique ID for the source (e.g., 'Psych-1', 'Trad-1')"),
                    ),
                    ("text", SchemaNode::string("The full citation text (Book/Author)")),
                ]),
                Some("A list of all sources cited in the analysis."),
            ),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_report() -> Value {
        json!({
            "introduction": "梦如迷宫",
            "psychological_decode": { "content": "c", "key_concepts": ["阴影"] },
            "traditional_divination": { "content": "c", "cultural_context": "易经" },
            "sources": [{ "id": "Psych-1", "text": "Freud" }]
        })
    }

    #[test]
    fn report_schema_translates_to_json_schema() {
        let schema = dream_report_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(
            schema["required"],
            json!(["introduction", "psychological_decode", "traditional_divination", "sources"])
        );
        assert_eq!(schema["properties"]["sources"]["items"]["required"], json!(["id", "text"]));
        assert_eq!(
            schema["properties"]["psychological_decode"]["properties"]["key_concepts"]["items"]["type"],
            "string"
        );
        assert!(schema["properties"]["introduction"]["description"]
            .as_str()
            .unwrap()
            .contains("Philosopher"));
    }

    #[test]
    fn accepts_a_conforming_value() {
        assert!(dream_report_schema().validate(&valid_report()).is_ok());
    }

    #[test]
    fn reports_missing_required_field_with_its_path() {
        let mut value = valid_report();
        value["traditional_divination"]
            .as_object_mut()
            .unwrap()
            .remove("cultural_context");
        let err = dream_report_schema().validate(&value).unwrap_err();
        assert_eq!(err, "$.traditional_divination.cultural_context: required field is missing");
    }

    #[test]
    fn reports_wrong_leaf_type() {
        let mut value = valid_report();
        value["sources"][0]["id"] = json!(7);
        let err = dream_report_schema().validate(&value).unwrap_err();
        assert_eq!(err, "$.sources[0].id: expected string, found number");
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let node = SchemaNode::Object {
            properties: vec![("note", SchemaNode::String { description: None }, false)],
            description: None,
        };
        assert!(node.validate(&json!({})).is_ok());
        assert_eq!(node.to_json_schema()["required"], json!([]));
    }
}
