use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::analyze::AnalyzeMode;
use crate::commands::goals::GoalAction;
use crate::config::FlagOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "vanguard",
    about = "AI-assisted companion for the task program.",
    long_about = "Vanguard refines new tasks, batch-reviews pending ones, spotlights the single best task for your mood and location, and links tasks to goals.\n\nAny subcommand it does not know is passed through to `task` unchanged.",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Load configuration from PATH instead of ~/.config/vanguard/config.yml.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "PATH",
        help = "Load configuration from PATH instead of ~/.config/vanguard/config.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Add a task, then offer the LLM's refinements.
    Add(AddArgs),

    /// Batch-analyze pending tasks and apply accepted suggestions.
    Analyze {
        /// Task filter, e.g. `project:home +next`.
        #[arg(value_name = "FILTER", allow_hyphen_values = true)]
        filter: Vec<String>,

        #[arg(long, value_enum, default_value_t = AnalyzeMode::One)]
        mode: AnalyzeMode,
    },

    /// Pick one task that fits your current mood and location.
    Spot {
        #[arg(value_name = "FILTER", allow_hyphen_values = true)]
        filter: Vec<String>,

        /// Mood for this run (overrides the saved context).
        #[arg(long)]
        mood: Option<String>,

        /// Location for this run (overrides the saved context).
        #[arg(long = "context", value_name = "LOCATION")]
        location: Option<String>,

        /// Ask for mood and location again even if the saved context is fresh.
        #[arg(long)]
        refresh: bool,

        /// Never prompt; use the saved context and only display the pick.
        #[arg(long = "no-prompt")]
        no_prompt: bool,
    },

    /// Manage goals and the links between tasks and goals.
    Goals {
        #[command(subcommand)]
        command: GoalsCommand,
    },

    /// Write the default config and define the attributes vanguard needs.
    Init,

    /// Check the task program, config, LLM provider and attributes.
    Doctor,

    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(Debug, Args)]
pub(crate) struct AddArgs {
    /// Do not offer subtasks for this run.
    #[arg(long = "no-subtasks")]
    pub(crate) no_subtasks: bool,

    /// Do not offer tags for this run.
    #[arg(long = "no-tags")]
    pub(crate) no_tags: bool,

    /// Do not offer annotations for this run.
    #[arg(long = "no-annotations")]
    pub(crate) no_annotations: bool,

    /// Arguments exactly as for `task add`.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true
    )]
    pub(crate) args: Vec<String>,
}

impl AddArgs {
    pub(crate) fn overrides(&self) -> FlagOverrides {
        FlagOverrides {
            no_subtasks: self.no_subtasks,
            no_tags: self.no_tags,
            no_annotations: self.no_annotations,
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum GoalsCommand {
    /// List pending goals.
    List,
    /// Add a goal (filed under the goal project).
    Add {
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show one task or goal.
    Show { id: String },
    /// Modify a goal.
    Modify {
        id: String,
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Delete a goal; linked tasks keep their link.
    Delete { id: String },
    /// Link a task and a goal, in either order.
    Link { first: String, second: String },
    /// Remove the link between a task and a goal.
    Unlink { first: String, second: String },
    /// Show what a task or goal is linked to.
    Links { id: String },
}

impl From<GoalsCommand> for GoalAction {
    fn from(command: GoalsCommand) -> Self {
        match command {
            GoalsCommand::List => Self::List,
            GoalsCommand::Add { args } => Self::Add(args),
            GoalsCommand::Show { id } => Self::Show(id),
            GoalsCommand::Modify { id, args } => Self::Modify(id, args),
            GoalsCommand::Delete { id } => Self::Delete(id),
            GoalsCommand::Link { first, second } => Self::Link(first, second),
            GoalsCommand::Unlink { first, second } => Self::Unlink(first, second),
            GoalsCommand::Links { id } => Self::Links(id),
        }
    }
}
