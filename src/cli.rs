//! CLI argument parsing for the clip agent.
//!
//! The CLI is a thin debug surface over the library: it resolves config,
//! builds the collaborators and prints what the run produced.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "clipagent",
    version,
    about = "Plan clip edits with an LM and run the resulting media commands",
    after_help = "Examples:\n  clipagent run --goal-file goal.txt --dry-run\n  echo 'a.mp4: 00:10 ~ 00:20' | clipagent run --lm 'llm -m gpt-4o-mini' --json\n  clipagent parse tasks.txt\n  clipagent classify --task 'Trim a.mp4 from 00:10 to 00:20'",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Parse(ParseArgs),
    Classify(ClassifyArgs),
}

/// Backend selection shared by commands that call the model.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Config file (defaults to <config dir>/clipagent/config.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LM command that reads the prompt on stdin (overrides config)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Emit debug-level logs
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Plan, generate and execute commands for a goal")]
pub struct RunArgs {
    /// Goal text (clips, time ranges and what to make)
    #[arg(long, conflicts_with = "goal_file")]
    pub goal: Option<String>,

    /// Read the goal from a file; stdin is used when neither is given
    #[arg(long, value_name = "PATH")]
    pub goal_file: Option<PathBuf>,

    /// Generate commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the full report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Parse a numbered task list without calling a model")]
pub struct ParseArgs {
    /// Task list file; stdin when omitted
    #[arg(value_name = "PATH")]
    pub input: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Classify and structure a single task")]
pub struct ClassifyArgs {
    /// Task text
    #[arg(long)]
    pub task: String,

    #[command(flatten)]
    pub backend: BackendArgs,
}
