use flashskill_core::skill::{FieldKind, OutputField, OutputSchema, SkillDefinition};
use flashskill_core::types::Record;
use flashskill_core::Result;
use flashskill_engine::{CompileOptions, ExecutionResult, Task, TaskCompiler};

/// Label discovery: instead of one task per record, the entire sample is
/// packed into a single aggregate task asking the backend to propose a
/// fixed number of category labels describing the dataset as a whole. The
/// resulting label set is the direct input to a downstream
/// `ClassificationSkill` category list.
pub struct DiscoverLabelsSkill {
    definition: SkillDefinition,
    label_count: usize,
}

impl DiscoverLabelsSkill {
    pub fn new(model_id: impl Into<String>, label_count: usize) -> Self {
        let prompt = format!(
            "Study the full data sample and propose exactly {} distinct category labels \
             that together describe the dataset. Return them as an array of strings on \
             key \"labels\".",
            label_count
        );
        Self::with_system_prompt(model_id, label_count, prompt)
    }

    /// Custom discovery instructions; the output contract stays the same.
    pub fn with_system_prompt(
        model_id: impl Into<String>,
        label_count: usize,
        system_prompt: impl Into<String>,
    ) -> Self {
        let schema = OutputSchema::new(vec![OutputField::new("labels", FieldKind::TextArray)]);
        Self {
            definition: SkillDefinition::new(model_id, system_prompt, schema),
            label_count,
        }
    }

    pub fn definition(&self) -> &SkillDefinition {
        &self.definition
    }

    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// Compile the whole sample into one aggregate task (batch of size one).
    pub fn create_tasks(&self, records: &[Record], options: &CompileOptions) -> Result<Vec<Task>> {
        TaskCompiler::compile_aggregate(records, &self.definition, options)
    }

    /// Pull the proposed labels out of a finished run.
    pub fn labels_from(results: &ExecutionResult) -> Option<Vec<String>> {
        let labels = results.get("0")?.get("labels")?.as_array()?;
        Some(labels.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
    }
}
