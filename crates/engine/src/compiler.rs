use flashskill_core::skill::{Modality, SkillDefinition};
use flashskill_core::types::{ChatMessage, Record, RenderedRequest};
use flashskill_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::task::Task;

/// Per-batch compilation overrides.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Read only these fields from each record. `None` reads all fields.
    pub columns: Option<Vec<String>>,
    /// Overrides the definition's modality map for this batch.
    pub column_modalities: Option<BTreeMap<String, Modality>>,
}

impl CompileOptions {
    pub fn columns(columns: &[&str]) -> Self {
        Self {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            column_modalities: None,
        }
    }
}

/// Turns an ordered sequence of records plus a skill definition into an
/// ordered sequence of tasks with dense 0-based ids. Compilation is
/// all-or-nothing: a missing requested column fails the whole batch.
pub struct TaskCompiler;

impl TaskCompiler {
    pub fn compile(
        records: &[Record],
        definition: &SkillDefinition,
        options: &CompileOptions,
    ) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let (input, blocks) = Self::render_record(index, record, definition, options)?;
            let request = RenderedRequest {
                model: definition.model_id.clone(),
                messages: vec![
                    ChatMessage::system(&definition.system_prompt),
                    Self::user_message(blocks),
                ],
                response_schema: definition.output_schema.json_schema(),
            };
            tasks.push(Task { id: index, input, request });
        }
        debug!(tasks = tasks.len(), model = %definition.model_id, "Batch compiled");
        Ok(tasks)
    }

    /// Label-discovery variant: the entire sample becomes one aggregate
    /// task with id 0.
    pub fn compile_aggregate(
        records: &[Record],
        definition: &SkillDefinition,
        options: &CompileOptions,
    ) -> Result<Vec<Task>> {
        let mut all_blocks = Vec::new();
        let mut merged_input = Record::new();
        for (index, record) in records.iter().enumerate() {
            all_blocks.push(json!({
                "type": "text",
                "text": format!("Record {}:", index),
            }));
            let (input, blocks) = Self::render_record(index, record, definition, options)?;
            all_blocks.extend(blocks);
            for (key, value) in input {
                merged_input.insert(format!("{}.{}", index, key), value);
            }
        }
        let request = RenderedRequest {
            model: definition.model_id.clone(),
            messages: vec![
                ChatMessage::system(&definition.system_prompt),
                Self::user_message(all_blocks),
            ],
            response_schema: definition.output_schema.json_schema(),
        };
        debug!(records = records.len(), "Aggregate task compiled");
        Ok(vec![Task { id: 0, input: merged_input, request }])
    }

    /// Render one record into the fields actually read plus its content
    /// blocks, honoring column subsetting and modalities.
    fn render_record(
        index: usize,
        record: &Record,
        definition: &SkillDefinition,
        options: &CompileOptions,
    ) -> Result<(Record, Vec<Value>)> {
        let columns: Vec<String> = match &options.columns {
            Some(cols) => cols.clone(),
            None => record.keys().cloned().collect(),
        };

        let mut input = Record::new();
        let mut blocks = Vec::with_capacity(columns.len());
        for column in &columns {
            let value = record.get(column).ok_or_else(|| Error::InvalidInput {
                record: index,
                column: column.clone(),
            })?;
            input.insert(column.clone(), value.clone());

            let modality = options
                .column_modalities
                .as_ref()
                .and_then(|m| m.get(column).copied())
                .unwrap_or_else(|| definition.modality_for(column));

            blocks.push(match modality {
                Modality::Text => {
                    json!({"type": "text", "text": format!("{}: {}", column, text_of(value))})
                }
                Modality::ImageUrl => {
                    json!({"type": "image_url", "image_url": {"url": text_of(value)}})
                }
                Modality::ImageBase64 => json!({
                    "type": "image_url",
                    "image_url": {"url": format!("data:image/jpeg;base64,{}", text_of(value))}
                }),
            });
        }
        Ok((input, blocks))
    }

    /// Text-only blocks collapse into a plain string message; anything
    /// multimodal keeps the block array.
    fn user_message(blocks: Vec<Value>) -> ChatMessage {
        if blocks.iter().all(|b| b["type"] == "text") {
            let lines: Vec<&str> = blocks.iter().filter_map(|b| b["text"].as_str()).collect();
            ChatMessage::user(&lines.join("\n"))
        } else {
            ChatMessage::user_blocks(blocks)
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashskill_core::skill::{FieldKind, OutputField, OutputSchema};

    fn definition() -> SkillDefinition {
        SkillDefinition::new(
            "gpt-4o-mini",
            "We want to classify short movie reviews by sentiment.",
            OutputSchema::new(vec![OutputField::new(
                "categories",
                FieldKind::Categories {
                    options: vec!["positive".into(), "negative".into()],
                    multi: false,
                },
            )]),
        )
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_ids_follow_input_order() {
        let records = vec![
            record(&[("review", "great")]),
            record(&[("review", "terrible")]),
            record(&[("review", "fine")]),
        ];
        let tasks = TaskCompiler::compile(&records, &definition(), &CompileOptions::default()).unwrap();
        assert_eq!(tasks.len(), 3);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.id, i);
            assert_eq!(task.custom_id(), i.to_string());
        }
        assert_eq!(tasks[1].input["review"], "terrible");
    }

    #[test]
    fn test_text_rendering_collapses_to_string() {
        let records = vec![record(&[("review", "great"), ("title", "Alien")])];
        let tasks = TaskCompiler::compile(&records, &definition(), &CompileOptions::default()).unwrap();
        let content = &tasks[0].request.messages[1].content;
        assert_eq!(content.as_str().unwrap(), "review: great\ntitle: Alien");
        assert_eq!(tasks[0].request.messages[0].role, "system");
    }

    #[test]
    fn test_columns_subset_only_reads_requested_fields() {
        let records = vec![record(&[("review", "great"), ("sentiment", "positive")])];
        let tasks =
            TaskCompiler::compile(&records, &definition(), &CompileOptions::columns(&["review"]))
                .unwrap();
        assert!(tasks[0].input.contains_key("review"));
        assert!(!tasks[0].input.contains_key("sentiment"));
    }

    #[test]
    fn test_missing_column_fails_whole_batch_with_index() {
        let records = vec![
            record(&[("review", "ok")]),
            record(&[("comment", "no review field")]),
        ];
        let err =
            TaskCompiler::compile(&records, &definition(), &CompileOptions::columns(&["review"]))
                .unwrap_err();
        match err {
            Error::InvalidInput { record, column } => {
                assert_eq!(record, 1);
                assert_eq!(column, "review");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_image_base64_renders_data_uri_block() {
        let mut options = CompileOptions::default();
        options.column_modalities =
            Some([("image_base64".to_string(), Modality::ImageBase64)].into_iter().collect());
        let records = vec![record(&[("image_base64", "QUJD")])];
        let tasks = TaskCompiler::compile(&records, &definition(), &options).unwrap();
        let blocks = tasks[0].request.messages[1].content.as_array().unwrap();
        assert_eq!(blocks[0]["type"], "image_url");
        assert_eq!(blocks[0]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_definition_modality_map_applies_without_override() {
        let def = definition().with_modality_map(
            [("poster".to_string(), Modality::ImageUrl)].into_iter().collect(),
        );
        let records = vec![record(&[("poster", "https://example.com/p.jpg")])];
        let tasks = TaskCompiler::compile(&records, &def, &CompileOptions::default()).unwrap();
        let blocks = tasks[0].request.messages[1].content.as_array().unwrap();
        assert_eq!(blocks[0]["image_url"]["url"], "https://example.com/p.jpg");
    }

    #[test]
    fn test_aggregate_compile_packs_sample_into_one_task() {
        let records = vec![record(&[("comment", "late delivery")]), record(&[("comment", "loved it")])];
        let tasks =
            TaskCompiler::compile_aggregate(&records, &definition(), &CompileOptions::default())
                .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 0);
        let text = tasks[0].request.messages[1].content.as_str().unwrap();
        assert!(text.contains("Record 0:"));
        assert!(text.contains("late delivery"));
        assert!(text.contains("Record 1:"));
        assert!(text.contains("loved it"));
    }

    #[test]
    fn test_compiled_tasks_bind_by_value() {
        let records = vec![record(&[("review", "great")])];
        let mut def = definition();
        let tasks = TaskCompiler::compile(&records, &def, &CompileOptions::default()).unwrap();
        def.system_prompt = "changed after compilation".to_string();
        assert_eq!(
            tasks[0].request.messages[0].content.as_str().unwrap(),
            "We want to classify short movie reviews by sentiment."
        );
    }
}
