//! End-to-end control loop.
//!
//! Planning runs once, then each parsed task goes through classification,
//! the routing gate, structuring, packing, command generation, path
//! resolution and execution, strictly one task at a time. A failing task is
//! recorded and the loop moves on; only a planning failure ends the run.
use crate::config::PathEnv;
use crate::context::pack;
use crate::dsl::{has_numbered_lines, parse_tasks, Task};
use crate::error::StageError;
use crate::executor::Executor;
use crate::lm::ModelBackend;
use crate::paths::resolve_paths;
use crate::pipeline::{ClassificationPipeline, CommandPipeline, PlanningPipeline};
use crate::run::{ExecutionLogEntry, RunContext, RunReport, TaskState};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after command generation; never call the executor.
    pub dry_run: bool,
}

pub struct Orchestrator<'a> {
    backend: &'a dyn ModelBackend,
    executor: &'a dyn Executor,
    paths: PathEnv,
    options: RunOptions,
}

/// Pipelines built fresh for each run.
struct RunPipelines<'a> {
    classification: ClassificationPipeline<'a>,
    commands: CommandPipeline<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backend: &'a dyn ModelBackend, executor: &'a dyn Executor, paths: PathEnv) -> Self {
        Self {
            backend,
            executor,
            paths,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full pipeline for one goal.
    ///
    /// Returns an error only when planning fails, since there are no tasks to
    /// isolate at that point. Task-level failures land in the report.
    pub fn run(&self, goal: &str) -> Result<RunReport, StageError> {
        let mut run = RunContext::new(goal);

        tracing::info!(goal_bytes = run.goal().len(), "planning");
        let planning = PlanningPipeline::new(self.backend).run(run.goal())?;
        tracing::debug!(plan = %planning.plan, "plan");
        tracing::debug!(task_dsl = %planning.task_dsl, "task dsl");

        if !has_numbered_lines(&planning.task_dsl) {
            tracing::warn!("task list has no numbered lines; treating it as a single task");
        }
        let tasks = parse_tasks(&planning.task_dsl);
        tracing::info!(tasks = tasks.len(), "parsed tasks");
        run.set_planning(planning);
        run.set_tasks(tasks);

        let pipelines = RunPipelines {
            classification: ClassificationPipeline::new(self.backend),
            commands: CommandPipeline::new(self.backend),
        };

        let tasks = run.tasks().to_vec();
        let total = tasks.len();
        for task in &tasks {
            let entry = self.process_task(task, total, &pipelines);
            tracing::info!(task_index = task.index, state = %entry.state, "task finished");
            run.record(entry);
        }

        Ok(run.into_report(self.options.dry_run))
    }

    fn process_task(
        &self,
        task: &Task,
        total: usize,
        pipelines: &RunPipelines<'_>,
    ) -> ExecutionLogEntry {
        let _span = tracing::info_span!("task", index = task.index, total).entered();
        tracing::info!(task = %task.text, "processing task");
        let mut entry = ExecutionLogEntry::new(task);

        let (verdict, capability) = match pipelines.classification.classify(&task.text) {
            Ok(classified) => classified,
            Err(err) => {
                entry.fail("interpret", err.to_string());
                return entry;
            }
        };
        entry.executable = capability.is_executable();
        entry.capability_verdict = Some(verdict.clone());
        entry.capability = Some(capability);
        entry.transition(TaskState::Classified);

        if !entry.executable {
            tracing::info!("not executable by the media tool; skipping");
            entry.transition(TaskState::Skipped);
            return entry;
        }

        let intent = match pipelines.classification.structure(&task.text) {
            Ok(intent) => intent,
            Err(err) => {
                entry.fail("structure", err.to_string());
                return entry;
            }
        };
        let context = pack(task.index, &task.text, &verdict, Some(&intent.raw));
        entry.structured_intent = Some(intent);
        entry.transition(TaskState::Structured);

        entry.execution_context = Some(context.clone());
        entry.transition(TaskState::Packed);

        let command = match pipelines.commands.generate(&context) {
            Ok(command) => command,
            Err(err) => {
                entry.fail("generate", err.to_string());
                return entry;
            }
        };
        let resolved = resolve_paths(&command, &self.paths);
        tracing::info!(command = %resolved, "generated command");
        entry.command = Some(command);
        entry.resolved_command = Some(resolved.clone());
        entry.transition(TaskState::Commanded);

        if self.options.dry_run {
            return entry;
        }

        match self.executor.execute(&resolved) {
            Ok(result) => {
                if !result.success {
                    tracing::warn!(exit_code = result.exit_code, "media command exited unsuccessfully");
                }
                entry.execution_result = Some(result);
                entry.transition(TaskState::Executed);
            }
            Err(err) => entry.fail("execute", err.to_string()),
        }
        entry
    }
}
