use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::skill::SkillDefinition;

/// Serializes skill definitions to a flat, human-readable JSON document and
/// back. `load(save(d))` is behaviorally equivalent to `d`: the same records
/// compile to identical rendered requests and validate identically.
pub struct SkillStore;

impl SkillStore {
    /// Canonical document form of a definition.
    pub fn save(definition: &SkillDefinition) -> Value {
        // SkillDefinition is a plain serde struct with no interior state,
        // so the document is just its JSON form.
        serde_json::to_value(definition).expect("skill definition serializes")
    }

    pub fn load(document: &Value) -> Result<SkillDefinition> {
        serde_json::from_value(document.clone())
            .map_err(|e| Error::Config(format!("Invalid skill document: {}", e)))
    }

    pub fn save_file(definition: &SkillDefinition, path: &Path) -> Result<()> {
        let doc = Self::save(definition);
        std::fs::write(path, serde_json::to_string_pretty(&doc)?)?;
        info!(path = %path.display(), model = %definition.model_id, "Skill saved");
        Ok(())
    }

    pub fn load_file(path: &Path) -> Result<SkillDefinition> {
        let text = std::fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&text)?;
        Self::load(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::{FieldKind, Modality, OutputField, OutputSchema};

    fn sample_definition() -> SkillDefinition {
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
        .with_modality_map([("poster".to_string(), Modality::ImageBase64)].into_iter().collect())
        .with_max_selected_categories(1)
    }

    #[test]
    fn test_round_trip_equality() {
        let def = sample_definition();
        let doc = SkillStore::save(&def);
        let loaded = SkillStore::load(&doc).unwrap();
        assert_eq!(loaded, def);
    }

    #[test]
    fn test_document_is_flat_and_complete() {
        let doc = SkillStore::save(&sample_definition());
        assert!(doc["model_id"].is_string());
        assert!(doc["system_prompt"].is_string());
        assert!(doc["output_schema"]["fields"].is_array());
        assert_eq!(doc["modality_map"]["poster"], "image_base64");
        assert_eq!(doc["max_selected_categories"], 1);
    }

    #[test]
    fn test_load_rejects_malformed_document() {
        let doc = serde_json::json!({"system_prompt": "no model"});
        assert!(matches!(SkillStore::load(&doc), Err(Error::Config(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentiment.json");
        let def = sample_definition();
        SkillStore::save_file(&def, &path).unwrap();
        let loaded = SkillStore::load_file(&path).unwrap();
        assert_eq!(loaded, def);
    }
}
