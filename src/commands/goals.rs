use crate::error::{ResolutionError, Result, VanguardError};
use crate::goals::Links;
use crate::interact::{say, Io};
use crate::task_types::{Item, ItemRef};
use crate::taskwarrior::TaskStore;
use crate::theme;

use super::Session;

/// `vanguard goals <action>`; parsed by the CLI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GoalAction {
    List,
    Add(Vec<String>),
    Show(String),
    Modify(String, Vec<String>),
    Delete(String),
    Link(String, String),
    Unlink(String, String),
    Links(String),
}

fn item_ref(raw: &str) -> Result<ItemRef> {
    ItemRef::try_from(raw).map_err(VanguardError::Interaction)
}

fn summary(item: &Item) -> String {
    let mut line = format!("{} {}", theme::info(&format!("[{}]", item.id)), item.description);
    if let Some(priority) = item.priority.as_deref().filter(|p| !p.is_empty()) {
        line.push_str(&format!(" {}", theme::warn(&format!("({})", priority))));
    }
    if !item.tags.is_empty() {
        let tags: Vec<String> = item.tags.iter().map(|tag| format!("+{}", tag)).collect();
        line.push_str(&format!(" {}", theme::faint(&tags.join(" "))));
    }
    line
}

fn details(io: &mut dyn Io, item: &Item) -> Result<()> {
    say(io, &format!("{} {}", theme::info("ID:"), item.id))?;
    say(io, &format!("{} {}", theme::info("UUID:"), item.uuid))?;
    say(io, &format!("{} {}", theme::info("Description:"), item.description))?;
    say(io, &format!("{} {}", theme::info("Status:"), item.status))?;
    if !item.project_name().is_empty() {
        say(io, &format!("{} {}", theme::info("Project:"), item.project_name()))?;
    }
    if let Some(priority) = item.priority.as_deref().filter(|p| !p.is_empty()) {
        say(io, &format!("{} {}", theme::info("Priority:"), priority))?;
    }
    if !item.tags.is_empty() {
        say(io, &format!("{} {}", theme::info("Tags:"), item.tags.join(" ")))?;
    }
    if let Some(due) = &item.due {
        say(io, &format!("{} {}", theme::info("Due:"), due.0.format("%Y-%m-%d %H:%M")))?;
    }
    for annotation in &item.annotations {
        say(
            io,
            &format!(
                "  {} {}",
                theme::faint(&annotation.entry.0.format("%Y-%m-%d").to_string()),
                annotation.description
            ),
        )?;
    }
    Ok(())
}

fn print_links(io: &mut dyn Io, links: &Links) -> Result<()> {
    match links {
        Links::Goal { goal, tasks } => {
            say(io, &theme::banner(&format!("GOAL {}", goal.id)))?;
            say(io, &summary(goal))?;
            if tasks.is_empty() {
                return say(io, &theme::warn("No tasks are linked to this goal."));
            }
            say(io, &theme::title(&format!("\nLinked tasks ({}):", tasks.len())))?;
            for task in tasks {
                say(io, &format!("  {}", summary(task)))?;
            }
            Ok(())
        }
        Links::Task { task, goal } => {
            say(io, &theme::banner(&format!("TASK {}", task.id)))?;
            say(io, &summary(task))?;
            match goal {
                Some(goal) => say(io, &format!("\n{} {}", theme::title("Goal:"), summary(goal))),
                None => say(io, &theme::warn("This task is not linked to a goal.")),
            }
        }
    }
}

pub(crate) fn run_goals<S: TaskStore>(
    session: &Session<'_, S>,
    io: &mut dyn Io,
    action: &GoalAction,
) -> Result<()> {
    let linker = session.goals();
    match action {
        GoalAction::List => {
            let goals = linker.list_goals(&session.config.filters)?;
            if goals.is_empty() {
                return say(
                    io,
                    &theme::warn(&format!(
                        "No pending goals (project:{}). Add one with `vanguard goals add`.",
                        session.config.goal_project()
                    )),
                );
            }
            say(io, &theme::banner("GOALS"))?;
            for goal in &goals {
                say(io, &summary(goal))?;
            }
            Ok(())
        }
        GoalAction::Add(args) => {
            if args.is_empty() {
                return Err(VanguardError::Interaction(
                    "Please describe the goal, e.g. `vanguard goals add Learn Rust`.".to_string(),
                ));
            }
            let (output, id) = linker.add_goal(args)?;
            say(io, output.trim_end())?;
            say(io, &theme::success(&format!("Goal {} added.", id)))
        }
        GoalAction::Show(id) => {
            let target = item_ref(id)?;
            let item = session
                .store
                .get(&target)?
                .ok_or_else(|| ResolutionError::NotFound { id: id.clone() })?;
            let heading = if linker.is_goal(&target)? {
                "GOAL"
            } else {
                "TASK"
            };
            say(io, &theme::banner(heading))?;
            details(io, &item)
        }
        GoalAction::Modify(id, args) => {
            if args.is_empty() {
                return Err(VanguardError::Interaction(
                    "Nothing to modify: pass the changes, e.g. `priority:H`.".to_string(),
                ));
            }
            let output = linker.modify_goal(&item_ref(id)?, args)?;
            say(io, output.trim_end())
        }
        GoalAction::Delete(id) => {
            let goal = linker.delete_goal(&item_ref(id)?)?;
            say(
                io,
                &theme::success(&format!("Deleted goal {}: {}", id, goal.description)),
            )
        }
        GoalAction::Link(first, second) => {
            let roles = linker.link(&item_ref(first)?, &item_ref(second)?)?;
            say(
                io,
                &theme::success(&format!(
                    "Linked task {} to goal {}.",
                    roles.task, roles.goal_uuid
                )),
            )
        }
        GoalAction::Unlink(first, second) => {
            let roles = linker.unlink(&item_ref(first)?, &item_ref(second)?)?;
            say(
                io,
                &theme::success(&format!("Task {} is no longer linked.", roles.task)),
            )
        }
        GoalAction::Links(id) => {
            let links = linker.show_links(&item_ref(id)?)?;
            print_links(io, &links)
        }
    }
}
