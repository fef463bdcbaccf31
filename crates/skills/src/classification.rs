use flashskill_core::skill::{FieldKind, Modality, OutputField, OutputSchema, SkillDefinition};
use std::collections::BTreeMap;

/// Builder for the classification contract: every record gets sorted into
/// a fixed category list, returned on the `categories` key.
pub struct ClassificationSkill {
    model_id: String,
    categories: Vec<String>,
    max_categories: usize,
    system_prompt: Option<String>,
    modality_map: BTreeMap<String, Modality>,
}

impl ClassificationSkill {
    pub fn new(model_id: impl Into<String>, categories: Vec<String>) -> Self {
        Self {
            model_id: model_id.into(),
            categories,
            max_categories: 1,
            system_prompt: None,
            modality_map: BTreeMap::new(),
        }
    }

    /// How many categories one record may select. More than one switches
    /// the `categories` field to an array.
    pub fn max_categories(mut self, max: usize) -> Self {
        self.max_categories = max.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn modality_map(mut self, map: BTreeMap<String, Modality>) -> Self {
        self.modality_map = map;
        self
    }

    pub fn build(self) -> SkillDefinition {
        let multi = self.max_categories > 1;
        let prompt = self.system_prompt.unwrap_or_else(|| {
            format!(
                "Classify each record into the listed categories: {}. \
                 Select at most {} and return the selection on key \"categories\".",
                self.categories.join(", "),
                self.max_categories
            )
        });
        let schema = OutputSchema::new(vec![OutputField::new(
            "categories",
            FieldKind::Categories { options: self.categories, multi },
        )]);
        SkillDefinition::new(self.model_id, prompt, schema)
            .with_modality_map(self.modality_map)
            .with_max_selected_categories(self.max_categories)
    }
}
