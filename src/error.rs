use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub(crate) enum ResolutionError {
    #[error("no task or goal found for id {id}")]
    NotFound { id: String },

    #[error("both {first} and {second} are goals; a link needs one goal and one task")]
    BothAreGoals { first: String, second: String },

    #[error("neither {first} nor {second} is a goal; a link needs one goal and one task")]
    BothAreTasks { first: String, second: String },

    #[error("{id} is not a goal (project is not '{goal_project}')")]
    NotAGoal { id: String, goal_project: String },

    #[error(
        "the '{field}' attribute is not defined in the task program; cannot tell whether a goal is linked (run `vanguard init` to add it)"
    )]
    GoalFieldUnavailable { field: String },

    #[error("task links to goal {uuid}, but no such goal exists")]
    DanglingLink { uuid: String },
}

#[derive(Debug, Error)]
pub(crate) enum VanguardError {
    #[error("{0}")]
    Setup(String),

    #[error("{reason}")]
    Filtered { reason: String },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("command `{command}` failed: {detail}\nOutput: {output}")]
    ExternalCall {
        command: String,
        detail: String,
        output: String,
    },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("failed to parse LLM response: {message}")]
    Parse { message: String, raw: String },

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Interaction(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VanguardError {
    pub(crate) fn is_setup(&self) -> bool {
        match self {
            Self::Setup(_) | Self::Config(_) => true,
            Self::Llm(err) => err.is_setup(),
            _ => false,
        }
    }

    /// Raw LLM output attached to a parse failure, shown back to the user.
    pub(crate) fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, VanguardError>;
