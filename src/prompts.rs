//! Fixed stage definitions. Instruction text lives in `prompts/*.md` and is
//! embedded at compile time.
use crate::lm::Stage;

const PLAN: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/plan.md"));
const TASKIFY: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/taskify.md"));
const INTERPRET: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/interpret.md"
));
const STRUCTURE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/structure.md"
));
const GENERATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/generate.md"
));

/// Goal -> plan.
pub const PLAN_STAGE: Stage = Stage::new("plan", PLAN, "user_goal");
/// Plan -> numbered task list.
pub const TASKIFY_STAGE: Stage = Stage::new("taskify", TASKIFY, "planning");
/// Task -> capability verdict.
pub const INTERPRET_STAGE: Stage = Stage::new("interpret", INTERPRET, "task");
/// Task -> structured intent.
pub const STRUCTURE_STAGE: Stage = Stage::new("structure", STRUCTURE, "task");
/// Execution context -> command.
pub const GENERATE_STAGE: Stage = Stage::new("generate", GENERATE, "execution_context");
