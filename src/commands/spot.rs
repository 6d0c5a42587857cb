use std::cmp::Ordering;

use crate::analyzer::Analyzer;
use crate::context::{resolve, ContextCache};
use crate::error::Result;
use crate::filter::{filter_items, include_item};
use crate::interact::{ask, say, Io};
use crate::llm::ChatClient;
use crate::prompts::SpotlightCandidate;
use crate::suggestion::SpotlightPick;
use crate::task_types::{Item, ItemRef};
use crate::taskwarrior::TaskStore;
use crate::theme;

use super::Session;

#[derive(Debug, Clone, Default)]
pub(crate) struct SpotOptions {
    pub(crate) filter: Vec<String>,
    pub(crate) mood: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) refresh: bool,
    /// False with `--no-prompt`: no context questions, no follow-up action.
    pub(crate) prompt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpotAction {
    Start,
    Skip,
    Next,
}

impl SpotAction {
    fn parse(answer: Option<&str>) -> Option<Self> {
        match answer.map(|a| a.trim().to_lowercase()).as_deref() {
            None => None,
            Some("" | "y" | "yes") => Some(Self::Start),
            Some("s" | "skip") => Some(Self::Skip),
            Some("n" | "next") => Some(Self::Next),
            Some(_) => None,
        }
    }
}

/// Highest urgency first, capped at `limit`.
pub(crate) fn top_by_urgency(mut items: Vec<Item>, limit: usize) -> Vec<Item> {
    items.sort_by(|a, b| b.urgency.partial_cmp(&a.urgency).unwrap_or(Ordering::Equal));
    items.truncate(limit);
    items
}

fn show_pick(io: &mut dyn Io, pick: &SpotlightPick) -> Result<()> {
    say(io, &theme::banner("SPOTLIGHT TASK"))?;
    say(
        io,
        &format!(
            "{} {}",
            theme::info(&format!("[{}]", pick.task_id)),
            theme::title(&pick.title)
        ),
    )?;
    for (label, value) in [
        ("Why now:", &pick.reason),
        ("Estimated:", &pick.estimated),
        ("History:", &pick.history),
        ("Goal:", &pick.goal),
        ("Context:", &pick.context_tag),
        ("First step:", &pick.next),
    ] {
        if !value.trim().is_empty() {
            say(io, &format!("{} {}", theme::info(label), value))?;
        }
    }
    say(io, &theme::title(theme::RULE))
}

pub(crate) fn run_spot<S: TaskStore>(
    session: &Session<'_, S>,
    chat: &dyn ChatClient,
    io: &mut dyn Io,
    cache: &ContextCache,
    options: &SpotOptions,
) -> Result<()> {
    let context = resolve(
        io,
        cache,
        options.prompt,
        options.refresh,
        options.mood.as_deref(),
        options.location.as_deref(),
    )?;
    session.logger.log_event(&format!(
        "spot context mood={} location={} state={}",
        context.mood,
        context.location,
        cache.path().display()
    ));

    let items = filter_items(session.store.pending(&options.filter)?, &session.config.filters);
    let items = top_by_urgency(items, session.config.settings.spotlight_candidates);
    if items.is_empty() {
        say(io, &theme::warn("No pending tasks to choose from."))?;
        return Ok(());
    }

    let goals = session.goals();
    let candidates: Vec<SpotlightCandidate<'_>> = items
        .iter()
        .map(|item| SpotlightCandidate {
            item,
            goal_description: goals
                .linked_goal_of(item)
                .ok()
                .flatten()
                // A filtered goal's text stays local even when its task is sent.
                .filter(|goal| include_item(goal, &session.config.filters))
                .map(|goal| goal.description),
        })
        .collect();

    let analyzer = Analyzer::new(session.config, chat, session.user_context()?);
    let pick = analyzer.spotlight(&context, &candidates)?;
    show_pick(io, &pick)?;

    let Some(chosen) = items.iter().find(|item| item.id == pick.task_id) else {
        say(
            io,
            &theme::warn(&format!(
                "Task {} is not one of the candidates; nothing changed.",
                pick.task_id
            )),
        )?;
        return Ok(());
    };
    if !options.prompt {
        return Ok(());
    }

    let target = ItemRef::from(chosen.id);
    let answer = ask(io, &theme::info("Start this task? [Y]es/[s]kip/[n]ext: "))?;
    match SpotAction::parse(answer.as_deref()) {
        Some(SpotAction::Start) => {
            session.store.start(&target)?;
            say(io, &theme::success(&format!("Started task {}.", chosen.id)))
        }
        Some(SpotAction::Next) => {
            session.store.modify(&target, &["+next".to_string()])?;
            say(io, &theme::success(&format!("Tagged task {} +next.", chosen.id)))
        }
        Some(SpotAction::Skip) => {
            let reason = ask(io, &theme::info("Why skip it? "))?
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty())
                .unwrap_or_else(|| "no reason given".to_string());
            session
                .store
                .annotate(&target, &format!("Skipped: {}", reason))?;
            session
                .store
                .modify(&target, &[format!("skipped:{}", chosen.skipped + 1)])?;
            say(
                io,
                &theme::warn(&format!(
                    "Skipped task {} ({} time(s) so far).",
                    chosen.id,
                    chosen.skipped + 1
                )),
            )
        }
        None => say(io, "Nothing changed."),
    }
}
