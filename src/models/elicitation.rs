//! Elicitation requests and their schema-derived field set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// How the user resolved an elicitation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElicitationAction {
    /// User supplied the requested data
    Accept,
    /// User explicitly said no
    Decline,
    /// User could not or would not answer
    Cancel,
}

/// Outcome recorded on the conversation entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ElicitationOutcome {
    #[default]
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl From<ElicitationAction> for ElicitationOutcome {
    fn from(action: ElicitationAction) -> Self {
        match action {
            ElicitationAction::Accept => ElicitationOutcome::Accepted,
            ElicitationAction::Decline => ElicitationOutcome::Declined,
            ElicitationAction::Cancel => ElicitationOutcome::Cancelled,
        }
    }
}

/// Value kind of a field, taken from the property's JSON schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Enum { options: Vec<String> },
}

impl FieldKind {
    fn from_property(property: &Value) -> Self {
        if let Some(options) = property.get("enum").and_then(Value::as_array) {
            return FieldKind::Enum {
                options: options
                    .iter()
                    .map(|o| match o {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            };
        }
        match property.get("type").and_then(Value::as_str) {
            Some("number") => FieldKind::Number,
            Some("integer") => FieldKind::Integer,
            Some("boolean") => FieldKind::Boolean,
            _ => FieldKind::String,
        }
    }
}

/// A single input derived from one schema property
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitationField {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Current value; starts at the schema default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ElicitationField {
    /// Convert user text input into a JSON value of this field's kind.
    pub fn coerce(&self, input: &str) -> Result<Value, String> {
        let trimmed = input.trim();
        match &self.kind {
            FieldKind::String => Ok(Value::String(input.to_string())),
            FieldKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "expected an integer".to_string()),
            FieldKind::Number => trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| "expected a number".to_string()),
            FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err("expected true or false".to_string()),
            },
            FieldKind::Enum { options } => {
                if options.iter().any(|o| o == trimmed) {
                    Ok(Value::String(trimmed.to_string()))
                } else {
                    Err(format!("expected one of: {}", options.join(", ")))
                }
            }
        }
    }

    /// True when the field holds a usable value
    pub fn is_filled(&self) -> bool {
        match &self.value {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Scalar fields can be sent unwrapped
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self.value,
            Some(Value::Object(_)) | Some(Value::Array(_))
        )
    }
}

/// An elicitation request as held by the controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitationRequest {
    pub elicitation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub message: String,
    pub fields: Vec<ElicitationField>,
}

/// Field name that signals a single bare value rather than an object
pub const VALUE_FIELD: &str = "value";

impl ElicitationRequest {
    /// Derive the field set from a JSON object schema.
    ///
    /// A missing schema or one with no properties yields an approval-only
    /// request with zero fields.
    pub fn from_schema(
        elicitation_id: String,
        tool_call_id: Option<String>,
        message: String,
        schema: Option<&Value>,
    ) -> Self {
        let required: Vec<&str> = schema
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = schema
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, property)| ElicitationField {
                        name: name.clone(),
                        kind: FieldKind::from_property(property),
                        title: property
                            .get("title")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        required: required.contains(&name.as_str()),
                        value: property.get("default").cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            elicitation_id,
            tool_call_id,
            message,
            fields,
        }
    }

    /// Zero fields: the user only confirms or declines
    pub fn is_approval_only(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&ElicitationField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut ElicitationField> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Names of required fields that are still empty
    pub fn missing_required(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required && !f.is_filled())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Payload sent with an accept.
    ///
    /// Zero fields sends `null`. A single scalar field named `value` is
    /// sent unwrapped. Anything else is sent as the full field map.
    pub fn accept_payload(&self) -> Value {
        if self.fields.is_empty() {
            return Value::Null;
        }
        if let [only] = self.fields.as_slice() {
            if only.name == VALUE_FIELD && only.is_scalar() {
                return only.value.clone().unwrap_or(Value::Null);
            }
        }
        let map: Map<String, Value> = self
            .fields
            .iter()
            .filter_map(|f| f.value.clone().map(|v| (f.name.clone(), v)))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(schema: Value) -> ElicitationRequest {
        ElicitationRequest::from_schema(
            "e1".to_string(),
            Some("42".to_string()),
            "Need input".to_string(),
            Some(&schema),
        )
    }

    #[test]
    fn test_empty_schema_is_approval_only() {
        let req = request(json!({"type": "object", "properties": {}}));
        assert!(req.is_approval_only());
        assert_eq!(req.accept_payload(), Value::Null);

        let req = ElicitationRequest::from_schema("e2".into(), None, "ok?".into(), None);
        assert!(req.is_approval_only());
    }

    #[test]
    fn test_fields_derived_from_properties() {
        let req = request(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "title": "Name"},
                "count": {"type": "integer", "default": 3},
                "color": {"type": "string", "enum": ["red", "blue"]},
                "ok": {"type": "boolean"}
            },
            "required": ["name"]
        }));
        assert_eq!(req.fields.len(), 4);
        let name = req.field("name").unwrap();
        assert!(name.required);
        assert_eq!(name.title.as_deref(), Some("Name"));
        assert_eq!(req.field("count").unwrap().value, Some(json!(3)));
        assert_eq!(
            req.field("color").unwrap().kind,
            FieldKind::Enum {
                options: vec!["red".to_string(), "blue".to_string()]
            }
        );
        assert_eq!(req.field("ok").unwrap().kind, FieldKind::Boolean);
        assert_eq!(req.missing_required(), vec!["name".to_string()]);
    }

    #[test]
    fn test_single_value_field_unwrapped() {
        let mut req = request(json!({
            "type": "object",
            "properties": {"value": {"type": "string"}}
        }));
        req.field_mut("value").unwrap().value = Some(json!("yes please"));
        assert_eq!(req.accept_payload(), json!("yes please"));
    }

    #[test]
    fn test_single_other_field_sent_as_map() {
        let mut req = request(json!({
            "type": "object",
            "properties": {"answer": {"type": "string"}}
        }));
        req.field_mut("answer").unwrap().value = Some(json!("42"));
        assert_eq!(req.accept_payload(), json!({"answer": "42"}));
    }

    #[test]
    fn test_coerce_by_kind() {
        let req = request(json!({
            "type": "object",
            "properties": {
                "n": {"type": "number"},
                "i": {"type": "integer"},
                "b": {"type": "boolean"},
                "e": {"enum": ["a", "b"]}
            }
        }));
        assert_eq!(req.field("n").unwrap().coerce("1.5"), Ok(json!(1.5)));
        assert!(req.field("n").unwrap().coerce("abc").is_err());
        assert_eq!(req.field("i").unwrap().coerce(" 7 "), Ok(json!(7)));
        assert!(req.field("i").unwrap().coerce("7.5").is_err());
        assert_eq!(req.field("b").unwrap().coerce("Yes"), Ok(json!(true)));
        assert!(req.field("b").unwrap().coerce("maybe").is_err());
        assert_eq!(req.field("e").unwrap().coerce("b"), Ok(json!("b")));
        assert!(req.field("e").unwrap().coerce("c").is_err());
    }

    #[test]
    fn test_empty_string_not_filled() {
        let mut req = request(json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        }));
        req.field_mut("name").unwrap().value = Some(json!(""));
        assert_eq!(req.missing_required(), vec!["name".to_string()]);
    }

    #[test]
    fn test_outcome_from_action() {
        assert_eq!(
            ElicitationOutcome::from(ElicitationAction::Decline),
            ElicitationOutcome::Declined
        );
        assert_eq!(
            serde_json::to_string(&ElicitationAction::Cancel).unwrap(),
            "\"cancel\""
        );
    }
}
