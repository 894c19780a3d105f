use serde_json::{Value, json};

use crate::model::GenerationResult;

pub(crate) const RESULT_FIELDS: [&str; 3] = ["target", "translation", "explanation"];

pub(crate) fn result_schema_value() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "target": { "type": "string" },
            "translation": { "type": "string" },
            "explanation": { "type": "string" }
        },
        "required": RESULT_FIELDS
    })
}

/// Parses a raw backend response as a single flat result object.
///
/// Surrounding prose, code fences and unknown fields are all parse failures.
pub(crate) fn parse_generation_result(raw: &str) -> Result<GenerationResult, String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return Err("response does not start with a json object".to_string());
    }

    serde_json::from_str::<GenerationResult>(trimmed).map_err(|err| err.to_string())
}
