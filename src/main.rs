use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use clipagent::config::{resolve_backend, resolve_config};
use clipagent::dsl::{has_numbered_lines, parse_task_dsl};
use clipagent::executor::ProcessExecutor;
use clipagent::lm::build_backend;
use clipagent::pipeline::ClassificationPipeline;
use clipagent::{Orchestrator, RunOptions, RunReport, TaskState};

mod cli;
use cli::{ClassifyArgs, Command, ParseArgs, RootArgs, RunArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    let verbose = match &args.command {
        Command::Run(run) => run.backend.verbose,
        Command::Classify(classify) => classify.backend.verbose,
        Command::Parse(_) => false,
    };
    init_tracing(verbose);

    match args.command {
        Command::Run(args) => cmd_run(args),
        Command::Parse(args) => cmd_parse(args),
        Command::Classify(args) => cmd_classify(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "clipagent=debug"
    } else {
        "clipagent=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let goal = match (&args.goal, &args.goal_file) {
        (Some(goal), _) => goal.clone(),
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("read goal {}", path.display()))?
        }
        (None, None) => read_stdin().context("read goal from stdin")?,
    };
    if goal.trim().is_empty() {
        return Err(anyhow!("goal is empty"));
    }

    let config = resolve_config(args.backend.config.as_deref())?;
    let backend = build_backend(&resolve_backend(&config, args.backend.lm.as_deref()));
    let executor = ProcessExecutor::new(config.executor.program.clone());
    let orchestrator = Orchestrator::new(backend.as_ref(), &executor, config.paths.clone())
        .with_options(RunOptions {
            dry_run: args.dry_run,
        });

    let report = orchestrator.run(&goal).context("planning failed")?;

    if let Some(out) = &args.out {
        write_report(out, &report)?;
    }
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{text}");
    } else {
        print_transcript(&report);
    }
    Ok(())
}

fn cmd_parse(args: ParseArgs) -> Result<()> {
    let text = match &args.input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => read_stdin().context("read task list from stdin")?,
    };
    if !has_numbered_lines(&text) {
        tracing::warn!("no numbered lines found; treating input as a single task");
    }
    for (idx, task) in parse_task_dsl(&text).iter().enumerate() {
        println!("{}. {task}", idx + 1);
    }
    Ok(())
}

fn cmd_classify(args: ClassifyArgs) -> Result<()> {
    let config = resolve_config(args.backend.config.as_deref())?;
    let backend = build_backend(&resolve_backend(&config, args.backend.lm.as_deref()));
    let pipeline = ClassificationPipeline::new(backend.as_ref());

    let (verdict, capability) = pipeline.classify(&args.task).context("interpret task")?;
    println!("[Verdict]\n{}\n", verdict.trim());
    println!(
        "[Capability]\n{}\n",
        serde_json::to_string_pretty(&capability).context("serialize capability")?
    );
    if capability.is_executable() {
        let intent = pipeline.structure(&args.task).context("structure task")?;
        println!("[Structured Intent]\n{}", intent.raw.trim());
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(report).context("serialize report")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn print_transcript(report: &RunReport) {
    println!("[Task DSL]\n{}\n", report.task_dsl.trim());
    println!("[Parsed Tasks]");
    for (idx, task) in report.tasks.iter().enumerate() {
        println!("{}. {task}", idx + 1);
    }

    for entry in &report.entries {
        println!("\n---------------------------------------------");
        println!("[Task {}/{}] {}", entry.task_index, report.tasks.len(), entry.task);
        println!("state: {}", entry.state);
        if let Some(verdict) = &entry.capability_verdict {
            println!("\n[Verdict]\n{}", verdict.trim());
        }
        if let Some(intent) = &entry.structured_intent {
            println!("\n[Structured Intent]\n{}", intent.raw.trim());
        }
        if let Some(command) = &entry.resolved_command {
            println!("\n[Command]\n{command}");
        }
        if let Some(result) = &entry.execution_result {
            let code = result
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            println!("\n[Result] exit={code} success={}", result.success);
            if !result.stderr.trim().is_empty() {
                println!("{}", result.stderr.trim_end());
            }
        }
        if let Some(failure) = &entry.failure {
            println!("\n[Failed at {}] {}", failure.stage, failure.message);
        }
    }

    let summary = &report.summary;
    println!(
        "\n{} tasks: {} executed, {} commanded, {} skipped, {} failed{}",
        summary.total,
        summary.executed,
        summary.commanded,
        summary.skipped,
        summary.failed,
        if report.dry_run { " (dry run)" } else { "" }
    );
    if report
        .entries
        .iter()
        .any(|entry| entry.state == TaskState::Failed)
    {
        tracing::warn!(failed = summary.failed, "some tasks failed; see report");
    }
}
