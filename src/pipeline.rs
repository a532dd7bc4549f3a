//! Stage compositions: planning, classification and command generation.
//!
//! Each pipeline borrows the backend for one run and owns no state of its own,
//! so a fresh set is built per run.
use crate::capability::Capability;
use crate::context::ExecutionContext;
use crate::error::StageError;
use crate::intent::StructuredIntent;
use crate::lm::ModelBackend;
use crate::prompts::{GENERATE_STAGE, INTERPRET_STAGE, PLAN_STAGE, STRUCTURE_STAGE, TASKIFY_STAGE};
use crate::util::strip_code_fences;
use serde::{Deserialize, Serialize};

/// Both planning outputs; the plan is never discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningOutput {
    pub plan: String,
    pub task_dsl: String,
}

pub struct PlanningPipeline<'a> {
    backend: &'a dyn ModelBackend,
}

impl<'a> PlanningPipeline<'a> {
    pub fn new(backend: &'a dyn ModelBackend) -> Self {
        Self { backend }
    }

    pub fn plan(&self, goal: &str) -> Result<String, StageError> {
        PLAN_STAGE.invoke_with(self.backend, goal)
    }

    pub fn taskify(&self, plan: &str) -> Result<String, StageError> {
        TASKIFY_STAGE.invoke_with(self.backend, plan)
    }

    /// `taskify(plan(goal))`, keeping the intermediate plan.
    pub fn run(&self, goal: &str) -> Result<PlanningOutput, StageError> {
        let plan = self.plan(goal)?;
        let task_dsl = self.taskify(&plan)?;
        Ok(PlanningOutput { plan, task_dsl })
    }
}

pub struct ClassificationPipeline<'a> {
    backend: &'a dyn ModelBackend,
}

impl<'a> ClassificationPipeline<'a> {
    pub fn new(backend: &'a dyn ModelBackend) -> Self {
        Self { backend }
    }

    /// Raw verdict text for one task.
    pub fn interpret(&self, task: &str) -> Result<String, StageError> {
        INTERPRET_STAGE.invoke_with(self.backend, task)
    }

    /// Structured representation; callers only ask for executable tasks.
    pub fn structure(&self, task: &str) -> Result<StructuredIntent, StageError> {
        let raw = STRUCTURE_STAGE.invoke_with(self.backend, task)?;
        let intent = StructuredIntent::from_text(raw);
        if !intent.is_well_formed() {
            tracing::debug!("structured intent is not a JSON object; passing it through as text");
        }
        Ok(intent)
    }

    /// Interpret and type the verdict in one step.
    pub fn classify(&self, task: &str) -> Result<(String, Capability), StageError> {
        let verdict = self.interpret(task)?;
        let capability = Capability::from_verdict(&verdict);
        Ok((verdict, capability))
    }
}

pub struct CommandPipeline<'a> {
    backend: &'a dyn ModelBackend,
}

impl<'a> CommandPipeline<'a> {
    pub fn new(backend: &'a dyn ModelBackend) -> Self {
        Self { backend }
    }

    /// One command string for the packed context. The output is trimmed and
    /// unwrapped from a code fence but otherwise not checked.
    pub fn generate(&self, context: &ExecutionContext) -> Result<String, StageError> {
        let raw = GENERATE_STAGE.invoke_with(self.backend, context.to_prompt_text())?;
        Ok(strip_code_fences(&raw))
    }
}
