//! Routing gate over the interpret stage's verdict text.
//!
//! Routing is decided by one exact substring. Semantically equivalent
//! phrasings ("ffmpeg-capable: yes", "Capable: YES") route negative. The typed
//! [`Capability`] makes that contract explicit and carries the remaining
//! headings for the log.
use serde::{Deserialize, Serialize};

/// Marker the verdict must contain verbatim for a task to be executable.
pub const AFFIRMATIVE_MARKER: &str = "FFmpeg-capable: YES";

const OPERATION_TYPE_HEADING: &str = "operation type:";
const REQUIRED_INFO_HEADING: &str = "required information:";
const CAPABLE_HEADING: &str = "ffmpeg-capable:";
const CAPABLE_HEADING_DISPLAY: &str = "FFmpeg-capable:";

/// True iff the verdict contains [`AFFIRMATIVE_MARKER`] exactly.
pub fn is_affirmative(verdict: &str) -> bool {
    verdict.contains(AFFIRMATIVE_MARKER)
}

/// Classification result for a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    Executable {
        #[serde(skip_serializing_if = "Option::is_none")]
        operation_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required_info: Option<String>,
    },
    NotExecutable {
        reason: String,
    },
}

impl Capability {
    /// Parse verdict text. Executability follows [`is_affirmative`]; the
    /// headings are read leniently (case-insensitive, optional list bullets).
    pub fn from_verdict(verdict: &str) -> Self {
        if is_affirmative(verdict) {
            return Capability::Executable {
                operation_type: heading_value(verdict, OPERATION_TYPE_HEADING),
                required_info: heading_value(verdict, REQUIRED_INFO_HEADING),
            };
        }
        let reason = heading_value(verdict, CAPABLE_HEADING)
            .map(|value| format!("{CAPABLE_HEADING_DISPLAY} {value}"))
            .unwrap_or_else(|| {
                let trimmed = verdict.trim();
                if trimmed.is_empty() {
                    "empty verdict".to_string()
                } else {
                    trimmed.to_string()
                }
            });
        Capability::NotExecutable { reason }
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, Capability::Executable { .. })
    }
}

fn heading_value(verdict: &str, heading: &str) -> Option<String> {
    verdict.lines().find_map(|line| {
        let line = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim_start();
        let lower = line.to_ascii_lowercase();
        if !lower.starts_with(heading) {
            return None;
        }
        let value = line[heading.len()..].trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
