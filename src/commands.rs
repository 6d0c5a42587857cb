use crate::config::Config;
use crate::error::Result;
use crate::goals::GoalLinker;
use crate::interact::{say, Io};
use crate::logger::Logger;
use crate::prompts::UserContext;
use crate::suggestion::Suggestion;
use crate::taskwarrior::TaskStore;
use crate::theme;

pub(crate) mod add;
pub(crate) mod analyze;
pub(crate) mod goals;
pub(crate) mod spot;

/// Everything a command needs besides the terminal and the LLM.
pub(crate) struct Session<'a, S: TaskStore> {
    pub(crate) config: &'a Config,
    pub(crate) store: &'a S,
    pub(crate) logger: &'a Logger,
}

impl<'a, S: TaskStore> Session<'a, S> {
    pub(crate) fn new(config: &'a Config, store: &'a S, logger: &'a Logger) -> Self {
        Self {
            config,
            store,
            logger,
        }
    }

    pub(crate) fn goals(&self) -> GoalLinker<'a, S> {
        GoalLinker::new(self.store, self.config.goal_project())
    }

    /// Projects, goals, tags and annotation labels as shown to the model.
    pub(crate) fn user_context(&self) -> Result<UserContext> {
        let projects = self.store.projects()?;
        let goals = self.goals().list_goals(&self.config.filters)?;
        Ok(UserContext::build(self.config, projects, &goals))
    }
}

pub(crate) fn show_suggestion(
    io: &mut dyn Io,
    config: &Config,
    original: &str,
    suggestion: &Suggestion,
) -> Result<()> {
    say(io, &theme::title("\nOriginal Task:"))?;
    say(io, &theme::info(original))?;
    say(io, &theme::banner("REFINED TASK SUGGESTION"))?;
    say(
        io,
        &format!(
            "{} {}",
            theme::info("Task:"),
            theme::success(&suggestion.refined_title)
        ),
    )?;
    if config.settings.split_tasks && !suggestion.subtasks.is_empty() {
        say(io, &theme::info("\nSubtasks:"))?;
        for subtask in &suggestion.subtasks {
            say(io, &format!("  {} {}", theme::success("▸"), theme::success(subtask)))?;
        }
    }
    if !suggestion.suggested_tags.is_empty() {
        say(
            io,
            &format!(
                "\n{} {}",
                theme::info("Suggested Tags:"),
                theme::warn(&suggestion.suggested_tags.join(" "))
            ),
        )?;
    }
    if !suggestion.project.is_empty() {
        say(
            io,
            &format!(
                "{} {}",
                theme::info("Suggested Project:"),
                theme::success(&suggestion.project)
            ),
        )?;
    }
    if !suggestion.goal_alignment.is_empty() {
        say(
            io,
            &format!(
                "{} {}",
                theme::info("Goal Alignment:"),
                suggestion.goal_alignment
            ),
        )?;
    }
    let annotations = suggestion.annotation_lines(config);
    if !annotations.is_empty() {
        say(io, &theme::info("\nAnnotations:"))?;
        for line in annotations {
            say(io, &line)?;
        }
    }
    say(io, &theme::title(theme::RULE))
}
