//! Execution context handed to the command stage.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub task_index: usize,
    pub task_text: String,
    pub analysis: Analysis,
}

/// Stage outputs exactly as the classification pipeline returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub capability_verdict: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_intent: Option<String>,
}

/// Pack stage outputs for one task. No normalization is applied.
pub fn pack(
    task_index: usize,
    task_text: &str,
    verdict: &str,
    intent: Option<&str>,
) -> ExecutionContext {
    ExecutionContext {
        task_index,
        task_text: task_text.to_string(),
        analysis: Analysis {
            capability_verdict: verdict.to_string(),
            structured_intent: intent.map(str::to_string),
        },
    }
}

impl ExecutionContext {
    /// Render as the variable text bound into the command stage.
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_keeps_inputs_verbatim() {
        let verdict = "\n   FFmpeg-capable: YES\n   Operation type: Video trimming\n";
        let intent = "  {\"task\": \"extract_segment\"}  ";
        let context = pack(6, "Extract the highlight.", verdict, Some(intent));
        assert_eq!(context.task_index, 6);
        assert_eq!(context.task_text, "Extract the highlight.");
        assert_eq!(context.analysis.capability_verdict, verdict);
        assert_eq!(context.analysis.structured_intent.as_deref(), Some(intent));
    }

    #[test]
    fn field_names_are_stable() {
        let with_intent = serde_json::to_value(pack(1, "t", "v", Some("i"))).expect("serialize");
        assert_eq!(with_intent["task_index"], 1);
        assert_eq!(with_intent["task_text"], "t");
        assert_eq!(with_intent["analysis"]["capability_verdict"], "v");
        assert_eq!(with_intent["analysis"]["structured_intent"], "i");

        let without_intent = serde_json::to_value(pack(2, "t", "", None)).expect("serialize");
        assert_eq!(without_intent["analysis"]["capability_verdict"], "");
        assert!(without_intent["analysis"].get("structured_intent").is_none());
    }

    #[test]
    fn prompt_text_is_json() {
        let context = pack(3, "Scale to 1080x1920", "FFmpeg-capable: YES", None);
        let text = context.to_prompt_text();
        let parsed: ExecutionContext = serde_json::from_str(&text).expect("parse prompt text");
        assert_eq!(parsed, context);
    }
}
