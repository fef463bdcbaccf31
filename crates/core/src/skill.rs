use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Content modality of one input column, governing how the column is
/// encoded into the request (inline text vs. image block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    #[default]
    Text,
    /// Column value is a URL to fetchable image content.
    ImageUrl,
    /// Column value is base64-encoded image bytes.
    ImageBase64,
}

/// Type of one output field. Category fields carry their enumerated
/// option set; `multi` allows selecting more than one option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Number,
    Boolean,
    TextArray,
    Categories { options: Vec<String>, multi: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl OutputField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Ordered set of named output fields a skill response must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputSchema {
    pub fields: Vec<OutputField>,
}

impl OutputSchema {
    pub fn new(fields: Vec<OutputField>) -> Self {
        Self { fields }
    }

    /// JSON Schema for the provider's structured-output constraint.
    pub fn json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let prop = match &field.kind {
                FieldKind::Text => json!({"type": "string"}),
                FieldKind::Integer => json!({"type": "integer"}),
                FieldKind::Number => json!({"type": "number"}),
                FieldKind::Boolean => json!({"type": "boolean"}),
                FieldKind::TextArray => json!({"type": "array", "items": {"type": "string"}}),
                FieldKind::Categories { options, multi } => {
                    if *multi {
                        json!({"type": "array", "items": {"type": "string", "enum": options}})
                    } else {
                        json!({"type": "string", "enum": options})
                    }
                }
            };
            properties.insert(field.name.clone(), prop);
            required.push(Value::String(field.name.clone()));
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Structural validation of one parsed response object. Returns the
    /// first violation as a human-readable reason.
    pub fn validate(
        &self,
        obj: &serde_json::Map<String, Value>,
        max_selected_categories: usize,
    ) -> std::result::Result<(), String> {
        for field in &self.fields {
            let value = obj
                .get(&field.name)
                .ok_or_else(|| format!("missing field '{}'", field.name))?;
            match &field.kind {
                FieldKind::Text => {
                    if !value.is_string() {
                        return Err(format!("field '{}' is not a string", field.name));
                    }
                }
                FieldKind::Integer => {
                    if !value.is_i64() && !value.is_u64() {
                        return Err(format!("field '{}' is not an integer", field.name));
                    }
                }
                FieldKind::Number => {
                    if !value.is_number() {
                        return Err(format!("field '{}' is not a number", field.name));
                    }
                }
                FieldKind::Boolean => {
                    if !value.is_boolean() {
                        return Err(format!("field '{}' is not a boolean", field.name));
                    }
                }
                FieldKind::TextArray => {
                    let arr = value
                        .as_array()
                        .ok_or_else(|| format!("field '{}' is not an array", field.name))?;
                    if arr.iter().any(|v| !v.is_string()) {
                        return Err(format!("field '{}' has non-string elements", field.name));
                    }
                }
                FieldKind::Categories { options, multi } => {
                    let selected: Vec<&str> = if *multi {
                        let arr = value
                            .as_array()
                            .ok_or_else(|| format!("field '{}' is not an array", field.name))?;
                        arr.iter()
                            .map(|v| {
                                v.as_str().ok_or_else(|| {
                                    format!("field '{}' has non-string elements", field.name)
                                })
                            })
                            .collect::<std::result::Result<_, _>>()?
                    } else {
                        vec![value
                            .as_str()
                            .ok_or_else(|| format!("field '{}' is not a string", field.name))?]
                    };
                    if *multi && selected.len() > max_selected_categories {
                        return Err(format!(
                            "field '{}' selects {} categories, max is {}",
                            field.name,
                            selected.len(),
                            max_selected_categories
                        ));
                    }
                    for cat in selected {
                        if !options.iter().any(|o| o == cat) {
                            return Err(format!(
                                "field '{}' value '{}' not in category set",
                                field.name, cat
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Immutable description of a task contract: which model to call, what to
/// tell it, and what shape the answer must take. Compilation binds by
/// value, so mutating a cloned definition never affects tasks already
/// compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub model_id: String,
    pub system_prompt: String,
    pub output_schema: OutputSchema,
    #[serde(default)]
    pub modality_map: BTreeMap<String, Modality>,
    #[serde(default = "default_max_selected_categories")]
    pub max_selected_categories: usize,
}

fn default_max_selected_categories() -> usize {
    1
}

impl SkillDefinition {
    pub fn new(
        model_id: impl Into<String>,
        system_prompt: impl Into<String>,
        output_schema: OutputSchema,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            output_schema,
            modality_map: BTreeMap::new(),
            max_selected_categories: default_max_selected_categories(),
        }
    }

    pub fn with_modality_map(mut self, map: BTreeMap<String, Modality>) -> Self {
        self.modality_map = map;
        self
    }

    pub fn with_max_selected_categories(mut self, max: usize) -> Self {
        self.max_selected_categories = max;
        self
    }

    /// Modality for one input column; columns absent from the map are text.
    pub fn modality_for(&self, column: &str) -> Modality {
        self.modality_map.get(column).copied().unwrap_or_default()
    }
}
