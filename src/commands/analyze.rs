use std::env;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::process::Command;

use crate::analyzer::Analyzer;
use crate::error::{Result, VanguardError};
use crate::filter::filter_items;
use crate::interact::{ask_choice, say, Choice, Io};
use crate::llm::ChatClient;
use crate::logger::Logger;
use crate::shell::{render_args, run_shell_line, CommandResult};
use crate::suggestion::{Accepted, TaskAnalysis};
use crate::task_types::{Item, ItemRef};
use crate::taskwarrior::{TaskStore, TASK_PROGRAM};
use crate::theme;

use super::{show_suggestion, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum AnalyzeMode {
    /// Ask about each suggestion in turn.
    One,
    /// Review all suggestions as commands in $EDITOR.
    Edit,
}

/// Opens a file for editing and runs edited command lines.
pub(crate) trait EditBackend {
    fn edit(&self, path: &Path) -> Result<()>;
    fn run_line(&self, line: &str) -> Result<CommandResult>;
}

pub(crate) struct ShellEditBackend<'a> {
    pub(crate) logger: &'a Logger,
}

impl EditBackend for ShellEditBackend<'_> {
    fn edit(&self, path: &Path) -> Result<()> {
        let editor = env::var("EDITOR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());
        // $EDITOR may carry its own arguments, e.g. "code --wait".
        let line = format!("{} {}", editor, render_args(&[path.display().to_string()]));
        self.logger
            .log_event(&format!("cmd start label=editor editor={}", editor));
        let status = Command::new("bash")
            .arg("-c")
            .arg(&line)
            .status()
            .map_err(|err| VanguardError::ExternalCall {
                command: line.clone(),
                detail: format!("failed to start editor: {}", err),
                output: String::new(),
            })?;
        if !status.success() {
            return Err(VanguardError::ExternalCall {
                command: line,
                detail: format!("editor exited with {}", status),
                output: String::new(),
            });
        }
        Ok(())
    }

    fn run_line(&self, line: &str) -> Result<CommandResult> {
        run_shell_line(line, "edit-apply", self.logger)
    }
}

/// Pending, filter-approved items capped at `task_import_limit`.
pub(crate) fn select_items<S: TaskStore>(session: &Session<'_, S>, filter: &[String]) -> Result<Vec<Item>> {
    let items = session.store.pending(filter)?;
    let mut items = filter_items(items, &session.config.filters);
    items.truncate(session.config.settings.task_import_limit);
    Ok(items)
}

pub(crate) fn run_analyze<S: TaskStore>(
    session: &Session<'_, S>,
    chat: &dyn ChatClient,
    io: &mut dyn Io,
    filter: &[String],
    mode: AnalyzeMode,
    backend: &dyn EditBackend,
) -> Result<()> {
    let items = select_items(session, filter)?;
    if items.is_empty() {
        say(io, &theme::warn("No pending tasks eligible for analysis."))?;
        return Ok(());
    }
    say(
        io,
        &theme::info(&format!("Analyzing {} task(s)...", items.len())),
    )?;

    let analyzer = Analyzer::new(session.config, chat, session.user_context()?);
    let outcome = analyzer.analyze_batch(&items)?;
    for failure in &outcome.failures {
        say(
            io,
            &theme::error(&format!(
                "Tasks {}-{} could not be analyzed: {}",
                failure.first, failure.last, failure.error
            )),
        )?;
        if let Some(raw) = failure.error.raw_response() {
            say(io, &theme::faint(raw))?;
        }
    }

    let pairs: Vec<(&Item, &TaskAnalysis)> = outcome
        .analyses
        .iter()
        .filter_map(|analysis| {
            items
                .get(analysis.task_index.checked_sub(1)?)
                .map(|item| (item, analysis))
        })
        .collect();

    match mode {
        AnalyzeMode::One => apply_one_by_one(session, io, &pairs),
        AnalyzeMode::Edit => apply_via_editor(io, &pairs, backend),
    }
}

fn apply_one_by_one<S: TaskStore>(
    session: &Session<'_, S>,
    io: &mut dyn Io,
    pairs: &[(&Item, &TaskAnalysis)],
) -> Result<()> {
    let mut apply_all = false;
    let mut applied = 0usize;
    for (item, analysis) in pairs {
        let args = analysis.suggestion.to_modify_args(Accepted::ALL);
        if args.is_empty() {
            continue;
        }
        if !apply_all {
            show_suggestion(io, session.config, &item.to_command_line(), &analysis.suggestion)?;
            match ask_choice(io, &theme::info(&format!("apply to task {}?", item.id)))? {
                Choice::Yes => {}
                Choice::No => continue,
                Choice::All => apply_all = true,
                Choice::Quit => break,
            }
        }
        let target = ItemRef::from(item.id);
        match session.store.modify(&target, &args) {
            Ok(_) => applied += 1,
            Err(err) => say(
                io,
                &theme::error(&format!("Error modifying task {}: {}", item.id, err)),
            )?,
        }
    }
    say(
        io,
        &theme::success(&format!("\nApplied suggestions to {} task(s).", applied)),
    )
}

pub(crate) fn edit_script(pairs: &[(&Item, &TaskAnalysis)]) -> String {
    let mut script = String::from(
        "# Suggested changes. Delete or edit lines, then save and quit.\n\
         # Only `task <id> modify ...` lines are run.\n",
    );
    for (item, analysis) in pairs {
        let args = analysis.suggestion.to_modify_args(Accepted::ALL);
        if args.is_empty() {
            continue;
        }
        script.push_str(&format!("\n# {}: {}\n", item.id, item.description.replace('\n', " ")));
        let mut full = vec![item.id.to_string(), "modify".to_string()];
        full.extend(args);
        script.push_str(&format!("{} {}\n", TASK_PROGRAM, render_args(&full)));
    }
    script
}

/// `task <id> modify ...` with a numeric id; anything else is refused.
pub(crate) fn is_modify_line(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some(TASK_PROGRAM)
        && words
            .next()
            .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        && words.next() == Some("modify")
}

fn apply_via_editor(
    io: &mut dyn Io,
    pairs: &[(&Item, &TaskAnalysis)],
    backend: &dyn EditBackend,
) -> Result<()> {
    let mut file = tempfile::Builder::new()
        .prefix("vanguard-analyze-")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(edit_script(pairs).as_bytes())?;
    file.flush()?;

    backend.edit(file.path())?;
    let edited = fs::read_to_string(file.path())?;

    let mut applied = 0usize;
    for line in edited.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !is_modify_line(line) {
            say(io, &theme::warn(&format!("Skipping unsupported line: {}", line)))?;
            continue;
        }
        match backend.run_line(line) {
            Ok(result) if result.success() => applied += 1,
            Ok(result) => say(
                io,
                &theme::error(&format!(
                    "Command failed (exit {}): {}\n{}",
                    result.exit_code,
                    line,
                    result.combined_output().trim()
                )),
            )?,
            Err(err) => say(io, &theme::error(&err.to_string()))?,
        }
    }
    say(
        io,
        &theme::success(&format!("\nApplied {} edited command(s).", applied)),
    )
}
