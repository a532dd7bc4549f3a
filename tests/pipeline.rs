//! End-to-end orchestration with scripted collaborators.

mod common;

use clipagent::config::PathEnv;
use clipagent::error::BackendError;
use clipagent::{Capability, Orchestrator, RunOptions, StageError, TaskState};
use common::{context_task, RecordingExecutor, ScriptedBackend};
use std::path::PathBuf;

const GOAL: &str = "a.mp4: 00:10 ~ 00:20\nmake a short";
const TWO_TASKS: &str =
    "1. Extract segment from a.mp4 from 00:10 to 00:20.\n2. Upload video to a platform.";

fn media_env() -> PathEnv {
    PathEnv {
        input_dir: Some(PathBuf::from("/media/in")),
        output_dir: Some(PathBuf::from("/media/out")),
    }
}

/// Executable iff the task mentions a file; commands copy that file.
fn standard_reply(task_dsl: &str, stage: &str, input: &str) -> Result<String, BackendError> {
    let reply = match stage {
        "plan" => "Extract the segment, then publish it.".to_string(),
        "taskify" => task_dsl.to_string(),
        "interpret" if input.contains(".mp4") => {
            "FFmpeg-capable: YES\nOperation type: Video trimming\nRequired information: input file, start, end".to_string()
        }
        "interpret" => "FFmpeg-capable: NO\nUploading needs a human.".to_string(),
        "structure" => format!("{{\"task\": {}}}", serde_json::Value::from(input)),
        "generate" => {
            let task = context_task(input);
            let file = task
                .split_whitespace()
                .find(|word| word.ends_with(".mp4"))
                .unwrap_or("in.mp4");
            format!("ffmpeg -ss 00:10 -to 00:20 -i {file} -c copy clip_{file}")
        }
        other => panic!("unexpected stage {other}"),
    };
    Ok(reply)
}

fn standard_backend(task_dsl: &'static str) -> ScriptedBackend {
    ScriptedBackend::new(move |stage, input| standard_reply(task_dsl, stage, input))
}

#[test]
fn executable_and_skipped_tasks_follow_their_paths() {
    let backend = standard_backend(TWO_TASKS);
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, media_env())
        .run(GOAL)
        .expect("run");

    assert_eq!(report.goal, GOAL);
    assert_eq!(report.plan, "Extract the segment, then publish it.");
    assert_eq!(report.task_dsl, TWO_TASKS);
    assert_eq!(
        report.tasks,
        vec![
            "Extract segment from a.mp4 from 00:10 to 00:20.",
            "Upload video to a platform."
        ]
    );
    assert_eq!(report.entries.len(), 2);

    let first = &report.entries[0];
    assert_eq!(first.task_index, 1);
    assert_eq!(first.state, TaskState::Executed);
    assert!(first.executable);
    assert!(matches!(
        first.capability,
        Some(Capability::Executable { ref operation_type, .. })
            if operation_type.as_deref() == Some("Video trimming")
    ));
    assert!(first
        .structured_intent
        .as_ref()
        .is_some_and(|intent| intent.is_well_formed()));
    let context = first.execution_context.as_ref().expect("packed context");
    assert_eq!(context.task_index, 1);
    assert_eq!(context.task_text, report.tasks[0]);
    assert!(context.analysis.structured_intent.is_some());
    assert_eq!(
        first.command.as_deref(),
        Some("ffmpeg -ss 00:10 -to 00:20 -i a.mp4 -c copy clip_a.mp4")
    );
    let resolved = first.resolved_command.as_deref().expect("resolved command");
    assert!(resolved.contains("/media/in/a.mp4"));
    assert!(resolved.ends_with("/media/out/clip_a.mp4"));
    assert!(first.execution_result.as_ref().is_some_and(|r| r.success));

    let second = &report.entries[1];
    assert_eq!(second.task_index, 2);
    assert_eq!(second.state, TaskState::Skipped);
    assert!(!second.executable);
    assert!(second
        .capability_verdict
        .as_deref()
        .is_some_and(|verdict| verdict.starts_with("FFmpeg-capable: NO")));
    assert!(second.structured_intent.is_none());
    assert!(second.execution_context.is_none());
    assert!(second.command.is_none());
    assert!(second.execution_result.is_none());

    assert_eq!(
        backend.stages(),
        vec!["plan", "taskify", "interpret", "structure", "generate", "interpret"]
    );
    assert_eq!(*executor.commands.borrow(), vec![resolved.to_string()]);
    assert_eq!(report.summary.executed, 1);
    assert_eq!(report.summary.skipped, 1);
}

#[test]
fn planning_stages_receive_goal_then_plan() {
    let backend = standard_backend(TWO_TASKS);
    let executor = RecordingExecutor::new();
    Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    let calls = backend.calls.borrow();
    assert_eq!(calls[0], ("plan", GOAL.to_string()));
    assert_eq!(
        calls[1],
        ("taskify", "Extract the segment, then publish it.".to_string())
    );
}

#[test]
fn backend_failure_is_isolated_to_its_task() {
    let dsl = "1. Trim a.mp4 to 00:05\n2. Trim b.mp4 to 00:05\n3. Trim c.mp4 to 00:05";
    let backend = ScriptedBackend::new(move |stage, input| {
        if stage == "interpret" && input.contains("b.mp4") {
            return Err(BackendError::Http("503 Service Unavailable".to_string()));
        }
        standard_reply(dsl, stage, input)
    });
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    let states: Vec<TaskState> = report.entries.iter().map(|entry| entry.state).collect();
    assert_eq!(
        states,
        vec![TaskState::Executed, TaskState::Failed, TaskState::Executed]
    );
    let failure = report.entries[1].failure.as_ref().expect("failure recorded");
    assert_eq!(failure.stage, "interpret");
    assert!(failure.message.contains("503"));
    assert!(report.entries[1].capability_verdict.is_none());
    assert_eq!(executor.commands.borrow().len(), 2);
    assert_eq!(report.summary.failed, 1);
}

#[test]
fn late_stage_failures_keep_earlier_artifacts() {
    let dsl = "1. Trim a.mp4\n2. Trim b.mp4\n3. Trim c.mp4";
    let backend = ScriptedBackend::new(move |stage, input| {
        if stage == "structure" && input.contains("a.mp4") {
            return Err(BackendError::Malformed("empty body".to_string()));
        }
        if stage == "generate" && context_task(input).contains("b.mp4") {
            return Err(BackendError::Http("429 Too Many Requests".to_string()));
        }
        standard_reply(dsl, stage, input)
    });
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    let structure_failed = &report.entries[0];
    assert_eq!(structure_failed.state, TaskState::Failed);
    assert_eq!(
        structure_failed.failure.as_ref().map(|f| f.stage.as_str()),
        Some("structure")
    );
    assert!(structure_failed
        .capability_verdict
        .as_deref()
        .is_some_and(|verdict| verdict.starts_with("FFmpeg-capable: YES")));
    assert!(structure_failed.executable);
    assert!(structure_failed.structured_intent.is_none());
    assert!(structure_failed.execution_context.is_none());

    let generate_failed = &report.entries[1];
    assert_eq!(generate_failed.state, TaskState::Failed);
    assert_eq!(
        generate_failed.failure.as_ref().map(|f| f.stage.as_str()),
        Some("generate")
    );
    assert!(generate_failed.capability_verdict.is_some());
    assert!(generate_failed.structured_intent.is_some());
    let context = generate_failed
        .execution_context
        .as_ref()
        .expect("context kept");
    assert_eq!(context.task_index, 2);
    assert!(generate_failed.command.is_none());

    assert_eq!(report.entries[2].state, TaskState::Executed);
    assert_eq!(
        *executor.commands.borrow(),
        vec!["ffmpeg -ss 00:10 -to 00:20 -i c.mp4 -c copy clip_c.mp4".to_string()]
    );
    assert_eq!(report.summary.failed, 2);
}

#[test]
fn executor_failure_keeps_the_generated_command() {
    let dsl = "1. Trim a.mp4\n2. Trim b.mp4";
    let backend = standard_backend(dsl);
    let executor = RecordingExecutor::failing_on("a.mp4");
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    let first = &report.entries[0];
    assert_eq!(first.state, TaskState::Failed);
    assert_eq!(first.failure.as_ref().map(|f| f.stage.as_str()), Some("execute"));
    assert!(first.command.is_some());
    assert!(first.execution_context.is_some());
    assert!(first.execution_result.is_none());
    assert_eq!(report.entries[1].state, TaskState::Executed);
}

#[test]
fn non_zero_exit_is_recorded_not_failed() {
    let backend = standard_backend("1. Trim a.mp4");
    let executor = RecordingExecutor::exiting_with(1);
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    let entry = &report.entries[0];
    assert_eq!(entry.state, TaskState::Executed);
    let result = entry.execution_result.as_ref().expect("result");
    assert_eq!(result.exit_code, Some(1));
    assert_eq!(result.stderr, "Invalid argument");
    assert_eq!(report.summary.tool_failures, 1);
}

#[test]
fn dry_run_stops_after_command_generation() {
    let backend = standard_backend(TWO_TASKS);
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, media_env())
        .with_options(RunOptions { dry_run: true })
        .run(GOAL)
        .expect("run");

    assert!(report.dry_run);
    assert_eq!(report.entries[0].state, TaskState::Commanded);
    assert!(report.entries[0].resolved_command.is_some());
    assert_eq!(report.entries[1].state, TaskState::Skipped);
    assert!(executor.commands.borrow().is_empty());
    assert_eq!(report.summary.commanded, 1);
}

#[test]
fn near_miss_verdict_is_skipped_without_structuring() {
    let backend = ScriptedBackend::new(|stage, _input| {
        Ok(match stage {
            "plan" => "Trim it.".to_string(),
            "taskify" => "1. Trim a.mp4".to_string(),
            "interpret" => "ffmpeg-capable: yes\nOperation type: trim".to_string(),
            other => panic!("stage {other} must not run for a skipped task"),
        })
    });
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    assert_eq!(report.entries[0].state, TaskState::Skipped);
    assert_eq!(backend.stages(), vec!["plan", "taskify", "interpret"]);
}

#[test]
fn unnumbered_task_list_becomes_one_task() {
    let backend = standard_backend("Trim a.mp4 from 00:10\nto 00:20 and save it");
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    assert_eq!(report.tasks, vec!["Trim a.mp4 from 00:10 to 00:20 and save it"]);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].state, TaskState::Executed);
}

#[test]
fn planning_failure_ends_the_run() {
    let backend = ScriptedBackend::new(|stage, _input| match stage {
        "plan" => Ok("plan".to_string()),
        _ => Err(BackendError::Http("timed out".to_string())),
    });
    let executor = RecordingExecutor::new();
    let err = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect_err("taskify fails");
    assert!(matches!(err, StageError::Backend(BackendError::Http(_))));
    assert_eq!(backend.stages(), vec!["plan", "taskify"]);
    assert!(executor.commands.borrow().is_empty());
}

#[test]
fn report_serializes_for_the_cli() {
    let backend = standard_backend(TWO_TASKS);
    let executor = RecordingExecutor::new();
    let report = Orchestrator::new(&backend, &executor, PathEnv::default())
        .run(GOAL)
        .expect("run");

    let value = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(value["entries"][0]["state"], "executed");
    assert_eq!(
        value["entries"][0]["execution_context"]["analysis"]["capability_verdict"]
            .as_str()
            .map(|verdict| verdict.starts_with("FFmpeg-capable: YES")),
        Some(true)
    );
    assert_eq!(value["entries"][1]["state"], "skipped");
    assert!(value["entries"][1].get("command").is_none());
}
