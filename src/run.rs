//! Per-run state: the task sequence and the append-only execution log.
use crate::capability::Capability;
use crate::context::ExecutionContext;
use crate::dsl::Task;
use crate::executor::ExecutionResult;
use crate::intent::StructuredIntent;
use crate::pipeline::PlanningOutput;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-task pipeline state.
///
/// `Pending -> Classified -> (Skipped | Structured -> Packed -> Commanded ->
/// Executed)`, with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Classified,
    Skipped,
    Structured,
    Packed,
    Commanded,
    Executed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Skipped | TaskState::Executed | TaskState::Failed
        )
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Classified)
            | (Classified, Skipped)
            | (Classified, Structured)
            | (Structured, Packed)
            | (Packed, Commanded)
            | (Commanded, Executed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Pending => "pending",
            TaskState::Classified => "classified",
            TaskState::Skipped => "skipped",
            TaskState::Structured => "structured",
            TaskState::Packed => "packed",
            TaskState::Commanded => "commanded",
            TaskState::Executed => "executed",
            TaskState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Where and why a task stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub stage: String,
    pub message: String,
}

/// Everything observed while processing one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub task_index: usize,
    pub task: String,
    pub state: TaskState,
    pub executable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_intent: Option<StructuredIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<ExecutionContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<ExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
}

impl ExecutionLogEntry {
    pub fn new(task: &Task) -> Self {
        Self {
            task_index: task.index,
            task: task.text.clone(),
            state: TaskState::Pending,
            executable: false,
            capability_verdict: None,
            capability: None,
            structured_intent: None,
            execution_context: None,
            command: None,
            resolved_command: None,
            execution_result: None,
            failure: None,
        }
    }

    pub fn transition(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid task transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(task_index = self.task_index, from = %self.state, to = %next, "task state");
        self.state = next;
    }

    pub fn fail(&mut self, stage: &str, message: impl Into<String>) {
        self.failure = Some(TaskFailure {
            stage: stage.to_string(),
            message: message.into(),
        });
        self.transition(TaskState::Failed);
    }
}

/// Mutable state for one run, owned by the orchestrator.
#[derive(Debug)]
pub struct RunContext {
    goal: String,
    planning: Option<PlanningOutput>,
    tasks: Vec<Task>,
    entries: Vec<ExecutionLogEntry>,
}

impl RunContext {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            planning: None,
            tasks: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn set_planning(&mut self, planning: PlanningOutput) {
        self.planning = Some(planning);
    }

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Entries only grow; each task contributes exactly one.
    pub fn record(&mut self, entry: ExecutionLogEntry) {
        debug_assert!(entry.state.is_terminal() || entry.state == TaskState::Commanded);
        self.entries.push(entry);
    }

    pub fn into_report(self, dry_run: bool) -> RunReport {
        let (plan, task_dsl) = match self.planning {
            Some(planning) => (planning.plan, planning.task_dsl),
            None => (String::new(), String::new()),
        };
        let summary = RunSummary::from_entries(&self.entries);
        RunReport {
            goal: self.goal,
            plan,
            task_dsl,
            tasks: self.tasks.into_iter().map(|task| task.text).collect(),
            entries: self.entries,
            summary,
            dry_run,
        }
    }
}

/// Counts per terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub executed: usize,
    pub commanded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub tool_failures: usize,
}

impl RunSummary {
    fn from_entries(entries: &[ExecutionLogEntry]) -> Self {
        let mut summary = RunSummary {
            total: entries.len(),
            ..RunSummary::default()
        };
        for entry in entries {
            match entry.state {
                TaskState::Executed => summary.executed += 1,
                TaskState::Commanded => summary.commanded += 1,
                TaskState::Skipped => summary.skipped += 1,
                TaskState::Failed => summary.failed += 1,
                _ => {}
            }
            if entry
                .execution_result
                .as_ref()
                .is_some_and(|result| !result.success)
            {
                summary.tool_failures += 1;
            }
        }
        summary
    }
}

/// Final output of a run: intermediates, ordered tasks and ordered log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub goal: String,
    pub plan: String,
    pub task_dsl: String,
    pub tasks: Vec<String>,
    pub entries: Vec<ExecutionLogEntry>,
    pub summary: RunSummary,
    pub dry_run: bool,
}
