//! Structured intent produced by the structure stage.
//!
//! The text is kept verbatim for the command stage. A parsed view is offered
//! only when the text contains a well-formed JSON object; no field is ever
//! required.
use crate::util::{extract_json_from_text, strip_code_fences};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredIntent {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

impl StructuredIntent {
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let fields = parse_fields(&raw);
        Self { raw, fields }
    }

    /// True when the text parsed as a generic key-value document.
    pub fn is_well_formed(&self) -> bool {
        self.fields.is_some()
    }
}

fn parse_fields(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fences(raw);
    let value = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => value,
        Err(_) => extract_json_from_text(&cleaned)?,
    };
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
