//! Predefined skill documents, loadable through `SkillStore`.

use serde_json::{json, Value};

/// Rates how hard a question is to answer.
pub fn classify_question_difficulty() -> Value {
    json!({
        "model_id": "gpt-4o-mini",
        "system_prompt": "Rate how difficult each question is to answer for a well-read \
                          adult. Return the rating on key \"difficulty\".",
        "output_schema": {
            "fields": [
                {"name": "difficulty", "type": "categories",
                 "options": ["easy", "medium", "hard"], "multi": false}
            ]
        },
        "modality_map": {},
        "max_selected_categories": 1
    })
}

/// Flags whether a text chunk is relevant to a caller-supplied question,
/// the building block of iterative context filtering.
pub fn relevance_filter() -> Value {
    json!({
        "model_id": "gpt-4o-mini",
        "system_prompt": "Classify each text chunk by how relevant it is to the stated \
                          question. Return the verdict on key \"categories\".",
        "output_schema": {
            "fields": [
                {"name": "categories", "type": "categories",
                 "options": ["relevant", "somehow_relevant", "irrelevant"], "multi": false}
            ]
        },
        "modality_map": {},
        "max_selected_categories": 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashskill_core::SkillStore;

    #[test]
    fn test_toolkit_documents_load() {
        let difficulty = SkillStore::load(&classify_question_difficulty()).unwrap();
        assert_eq!(difficulty.output_schema.fields[0].name, "difficulty");

        let relevance = SkillStore::load(&relevance_filter()).unwrap();
        assert_eq!(relevance.output_schema.fields[0].name, "categories");
    }
}
