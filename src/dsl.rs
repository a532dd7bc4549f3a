//! Deterministic parser for the numbered task list emitted by the taskify stage.
//!
//! The input is loose: numbered lines start tasks, anything else continues the
//! task in progress. No model call happens here.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One editing action, numbered from 1 in encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub index: usize,
    pub text: String,
}

fn numbered_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\.\s+(.*)").expect("valid task pattern"))
}

/// Split task DSL text into task strings with the numbering removed.
///
/// Text without any numbered line collapses into a single task.
pub fn parse_task_dsl(text: &str) -> Vec<String> {
    let mut tasks = Vec::new();
    let mut current = String::new();

    for line in split_lines(text) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = numbered_line().captures(line) {
            flush(&mut current, &mut tasks);
            current = captures
                .get(2)
                .map(|rest| rest.as_str().trim().to_string())
                .unwrap_or_default();
        } else if current.is_empty() {
            current = line.to_string();
        } else {
            current.push(' ');
            current.push_str(line);
        }
    }
    flush(&mut current, &mut tasks);

    tasks
}

fn flush(current: &mut String, tasks: &mut Vec<String>) {
    let task = current.trim();
    if !task.is_empty() {
        tasks.push(task.to_string());
    }
    current.clear();
}

/// Line iterator that also breaks on a bare `\r`; `\r\n` yields an extra empty
/// line, which callers skip.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
}

/// Parse and attach 1-based indices.
pub fn parse_tasks(text: &str) -> Vec<Task> {
    parse_task_dsl(text)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Task {
            index: idx + 1,
            text,
        })
        .collect()
}

/// True when at least one line would start a numbered task.
pub fn has_numbered_lines(text: &str) -> bool {
    split_lines(text).any(|line| numbered_line().is_match(line.trim()))
}

/// Render tasks back into numbered DSL text (`1. ...` per line).
pub fn render_task_dsl<S: AsRef<str>>(tasks: &[S]) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| format!("{}. {}", idx + 1, task.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "dsl_tests.rs"]
mod tests;
