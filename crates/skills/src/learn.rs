use flashskill_core::skill::{FieldKind, OutputField, OutputSchema, SkillDefinition};
use flashskill_core::types::{ChatMessage, Record, RenderedRequest};
use flashskill_core::{Error, Result, RunConfig};
use flashskill_engine::{
    CompileOptions, DispatchEngine, ResultAggregator, Task, TaskCompiler, TaskOutcome,
};
use flashskill_providers::ModelProvider;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Records shown to the backend inside the meta-prompt.
const SAMPLE_PREVIEW: usize = 8;
/// Held-out records used to validate a proposed skill.
const HELD_OUT_MAX: usize = 5;
const DEFAULT_MAX_ITERATIONS: u32 = 3;

const META_SYSTEM_PROMPT: &str = "You design reusable data-processing skills. Given a task \
description and a sample of input records, propose a system prompt and an output schema \
that let a model perform the task on every record independently. Field types are: text, \
integer, number, boolean, text_array, categories. A categories field must list its options. \
Return strict JSON only.";

/// Derives a new skill definition from a natural-language task description
/// and a small data sample, validated by self-execution: each proposal is
/// compiled against a held-out slice of the sample and run through the
/// dispatch engine, and only a proposal whose every held-out task succeeds
/// with schema-conformant output is returned.
pub struct SkillLearner {
    provider: Arc<dyn ModelProvider>,
    config: RunConfig,
    max_iterations: u32,
}

impl SkillLearner {
    pub fn new(provider: Arc<dyn ModelProvider>, config: RunConfig) -> Self {
        Self { provider, config, max_iterations: DEFAULT_MAX_ITERATIONS }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub async fn learn(
        &self,
        sample: &[Record],
        task_description: &str,
        model_id: &str,
        options: &CompileOptions,
    ) -> Result<SkillDefinition> {
        if sample.is_empty() {
            return Err(Error::Config("Skill learning needs a non-empty sample".to_string()));
        }

        let preview = &sample[..sample.len().min(SAMPLE_PREVIEW)];
        // Validate on the tail when the sample is big enough; tiny samples
        // reuse the preview records.
        let held_out = if sample.len() > SAMPLE_PREVIEW {
            &sample[SAMPLE_PREVIEW..sample.len().min(SAMPLE_PREVIEW + HELD_OUT_MAX)]
        } else {
            &sample[..sample.len().min(HELD_OUT_MAX)]
        };

        let dispatch = DispatchEngine::new(self.provider.clone(), self.config.clone());
        let mut feedback = String::new();

        for iteration in 1..=self.max_iterations {
            info!(iteration, model = %model_id, "Requesting skill proposal");
            let meta_task = build_meta_task(model_id, task_description, preview, options, &feedback);
            let reports = dispatch.run(&[meta_task]).await;

            let proposal = match &reports[0].outcome {
                TaskOutcome::Succeeded(response) => response.content.clone(),
                TaskOutcome::RetriesExhausted(e) | TaskOutcome::Fatal(e) => {
                    warn!(iteration, error = %e, "Meta-request failed");
                    feedback = format!("The previous attempt failed to answer at all: {}", e);
                    continue;
                }
            };

            let candidate = match parse_proposal(&proposal, model_id) {
                Ok(def) => def,
                Err(reason) => {
                    warn!(iteration, reason = %reason, "Proposal rejected");
                    feedback = format!("The previous proposal was invalid: {}", reason);
                    continue;
                }
            };

            match self.validate(&dispatch, &candidate, held_out, options).await? {
                None => {
                    info!(iteration, "Proposal validated on held-out sample");
                    return Ok(candidate);
                }
                Some(observed) => {
                    warn!(iteration, "Held-out validation failed");
                    feedback = format!(
                        "The previous proposal failed validation on sample records:\n{}",
                        observed
                    );
                }
            }
        }

        Err(Error::LearnConvergence {
            iterations: self.max_iterations,
            reason: if feedback.is_empty() { "no proposal produced".to_string() } else { feedback },
        })
    }

    /// Compile the held-out records against the candidate and require every
    /// task to succeed with schema-conformant output. Returns `None` on
    /// success, otherwise the observed failures for the refinement prompt.
    async fn validate(
        &self,
        dispatch: &DispatchEngine,
        candidate: &SkillDefinition,
        held_out: &[Record],
        options: &CompileOptions,
    ) -> Result<Option<String>> {
        let tasks = TaskCompiler::compile(held_out, candidate, options)?;
        let reports = dispatch.run(&tasks).await;
        let outcome = ResultAggregator::aggregate(&reports, candidate);

        if outcome.validated.len() == held_out.len() {
            return Ok(None);
        }

        let mut observed = Vec::new();
        for (id, reason) in &outcome.schema_failures {
            observed.push(format!("record {}: {}", id, reason));
        }
        for (id, reason) in &outcome.dispatch_failures {
            observed.push(format!("record {}: {}", id, reason.code()));
        }
        Ok(Some(observed.join("\n")))
    }
}

#[derive(Debug, Deserialize)]
struct ProposedSkill {
    system_prompt: String,
    fields: Vec<ProposedField>,
}

#[derive(Debug, Deserialize)]
struct ProposedField {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    multi: bool,
}

/// JSON Schema the meta-response must satisfy (the proposal itself).
fn proposal_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "system_prompt": {"type": "string"},
            "fields": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "type": {"type": "string", "enum": [
                            "text", "integer", "number", "boolean", "text_array", "categories"
                        ]},
                        "options": {"type": "array", "items": {"type": "string"}},
                        "multi": {"type": "boolean"}
                    },
                    "required": ["name", "type"]
                }
            }
        },
        "required": ["system_prompt", "fields"],
        "additionalProperties": false
    })
}

fn build_meta_task(
    model_id: &str,
    task_description: &str,
    preview: &[Record],
    options: &CompileOptions,
    feedback: &str,
) -> Task {
    let sample_lines: Vec<String> = preview
        .iter()
        .map(|record| {
            let subset: Record = match &options.columns {
                Some(cols) => record
                    .iter()
                    .filter(|(k, _)| cols.contains(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                None => record.clone(),
            };
            serde_json::to_string(&subset).unwrap_or_default()
        })
        .collect();

    let mut content = format!(
        "Task description:\n{}\n\nData sample ({} records):\n{}",
        task_description,
        sample_lines.len(),
        sample_lines.join("\n")
    );
    if !feedback.is_empty() {
        content.push_str("\n\n");
        content.push_str(feedback);
        content.push_str("\nPropose a corrected skill.");
    }

    let mut input = Record::new();
    input.insert("task_description".to_string(), Value::String(task_description.to_string()));

    Task {
        id: 0,
        input,
        request: RenderedRequest {
            model: model_id.to_string(),
            messages: vec![
                ChatMessage::system(META_SYSTEM_PROMPT),
                ChatMessage::user(&content),
            ],
            response_schema: proposal_schema(),
        },
    }
}

/// Turn a raw proposal into a provisional definition, rejecting shapes the
/// engine cannot enforce.
fn parse_proposal(content: &str, model_id: &str) -> std::result::Result<SkillDefinition, String> {
    let proposal: ProposedSkill =
        serde_json::from_str(content).map_err(|e| format!("not valid proposal JSON: {}", e))?;
    if proposal.fields.is_empty() {
        return Err("proposal has no output fields".to_string());
    }

    let mut fields = Vec::with_capacity(proposal.fields.len());
    let mut max_selected = 1usize;
    for field in proposal.fields {
        let kind = match field.kind.as_str() {
            "text" => FieldKind::Text,
            "integer" => FieldKind::Integer,
            "number" => FieldKind::Number,
            "boolean" => FieldKind::Boolean,
            "text_array" => FieldKind::TextArray,
            "categories" => {
                if field.options.is_empty() {
                    return Err(format!("categories field '{}' has no options", field.name));
                }
                if field.multi {
                    max_selected = max_selected.max(field.options.len());
                }
                FieldKind::Categories { options: field.options.clone(), multi: field.multi }
            }
            other => return Err(format!("field '{}' has unknown type '{}'", field.name, other)),
        };
        fields.push(OutputField::new(field.name, kind));
    }

    Ok(
        SkillDefinition::new(model_id, proposal.system_prompt, OutputSchema::new(fields))
            .with_max_selected_categories(max_selected),
    )
}
