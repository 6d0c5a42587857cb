use crate::analyzer::Analyzer;
use crate::argparse::parse;
use crate::config::Config;
use crate::error::{Result, VanguardError};
use crate::interact::{ask_choice, say, Choice, Io};
use crate::llm::ChatClient;
use crate::suggestion::{Accepted, Suggestion};
use crate::task_types::ItemRef;
use crate::taskwarrior::TaskStore;
use crate::theme;

use super::{show_suggestion, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Subtasks,
    Title,
    Tags,
    Project,
    Annotations,
}

impl Part {
    fn key(self) -> &'static str {
        match self {
            Self::Subtasks => "subtasks",
            Self::Title => "title",
            Self::Tags => "tags",
            Self::Project => "project",
            Self::Annotations => "annotations",
        }
    }

    fn question(self) -> &'static str {
        match self {
            Self::Subtasks => "split into subtasks?",
            Self::Title => "apply refined title?",
            Self::Tags => "apply suggested tags?",
            Self::Project => "apply suggested project?",
            Self::Annotations => "apply annotations?",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decisions {
    pub(crate) subtasks: bool,
    pub(crate) title: bool,
    pub(crate) tags: bool,
    pub(crate) project: bool,
    pub(crate) annotations: bool,
}

impl Decisions {
    fn set(&mut self, part: Part, value: bool) {
        match part {
            Part::Subtasks => self.subtasks = value,
            Part::Title => self.title = value,
            Part::Tags => self.tags = value,
            Part::Project => self.project = value,
            Part::Annotations => self.annotations = value,
        }
    }

    fn get(&self, part: Part) -> bool {
        match part {
            Part::Subtasks => self.subtasks,
            Part::Title => self.title,
            Part::Tags => self.tags,
            Part::Project => self.project,
            Part::Annotations => self.annotations,
        }
    }

    pub(crate) fn any(&self) -> bool {
        self.subtasks || self.title || self.tags || self.project || self.annotations
    }

    fn accepted(&self) -> Accepted {
        Accepted {
            title: self.title,
            tags: self.tags,
            project: self.project,
        }
    }
}

/// Parts of the suggestion that have something to apply.
fn offered_parts(config: &Config, suggestion: &Suggestion) -> Vec<Part> {
    let mut parts = Vec::new();
    if config.settings.split_tasks && !suggestion.subtasks.is_empty() {
        parts.push(Part::Subtasks);
    }
    if !suggestion.refined_title.trim().is_empty() {
        parts.push(Part::Title);
    }
    if config.settings.enable_tagging && !suggestion.suggested_tags.is_empty() {
        parts.push(Part::Tags);
    }
    if !suggestion.project.trim().is_empty() {
        parts.push(Part::Project);
    }
    if config.settings.enable_annotations && !suggestion.annotation_lines(config).is_empty() {
        parts.push(Part::Annotations);
    }
    parts
}

pub(crate) fn ask_decisions(
    io: &mut dyn Io,
    config: &Config,
    suggestion: &Suggestion,
) -> Result<Decisions> {
    let parts = offered_parts(config, suggestion);
    let mut decisions = Decisions::default();
    let mut apply_all = false;
    let mut deny_all = false;

    for &part in &parts {
        if apply_all || deny_all {
            decisions.set(part, apply_all);
            continue;
        }
        match ask_choice(io, &theme::info(part.question()))? {
            Choice::Yes => decisions.set(part, true),
            Choice::No => decisions.set(part, false),
            Choice::All => {
                decisions.set(part, true);
                apply_all = true;
            }
            Choice::Quit => deny_all = true,
        }
    }

    if !parts.is_empty() {
        say(io, &theme::title("\nYour choices:"))?;
        for &part in &parts {
            let status = if decisions.get(part) {
                theme::success("Yes")
            } else {
                theme::error("No")
            };
            say(io, &format!("  {}: {}", theme::info(part.key()), status))?;
        }
    }
    Ok(decisions)
}

/// Creates the task as given, then offers the model's refinements.
pub(crate) fn run_add<S: TaskStore>(
    session: &Session<'_, S>,
    chat: &dyn ChatClient,
    io: &mut dyn Io,
    args: &[String],
) -> Result<()> {
    if args.is_empty() {
        return Err(VanguardError::Interaction(
            "Please provide task arguments (the same ones as with `task add`).".to_string(),
        ));
    }
    let config = session.config;
    let (output, id) = session.store.add(args)?;
    io.write_out(&output)?;
    if !output.ends_with('\n') {
        io.write_out("\n")?;
    }
    let target = ItemRef::from(id);

    let raw = args.join(" ");
    let analyzer = Analyzer::new(config, chat, session.user_context()?);
    let suggestion = match analyzer.analyze_single(&raw) {
        Ok(suggestion) => suggestion,
        Err(VanguardError::Filtered { reason }) => {
            say(
                io,
                &theme::warn(&format!(
                    "Task {} kept as entered and not sent to the LLM: {}",
                    id, reason
                )),
            )?;
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    show_suggestion(io, config, &raw, &suggestion)?;
    let decisions = ask_decisions(io, config, &suggestion)?;
    if !decisions.any() {
        say(io, &theme::success("\nAdded only the provided task without modifications."))?;
        return Ok(());
    }

    if decisions.subtasks {
        let project = parse(&raw).project;
        for subtask in suggestion.subtasks.iter().filter(|s| !s.trim().is_empty()) {
            let mut subtask_args = vec![subtask.trim().to_string()];
            if !project.is_empty() {
                subtask_args.push(format!("project:{}", project));
            }
            match session.store.add(&subtask_args) {
                Ok((output, _)) => io.write_out(&output)?,
                Err(err) => say(
                    io,
                    &theme::error(&format!("Error adding subtask {:?}: {}", subtask, err)),
                )?,
            }
        }
        return Ok(());
    }

    if decisions.annotations {
        for line in suggestion.annotation_lines(config) {
            if let Err(err) = session.store.annotate(&target, &line) {
                say(
                    io,
                    &theme::error(&format!("Error annotating task {}: {}", id, err)),
                )?;
            }
        }
    }

    let modify_args = suggestion.to_modify_args(decisions.accepted());
    if !modify_args.is_empty() {
        session.store.modify(&target, &modify_args)?;
    }
    say(
        io,
        &format!("\n{} Task {} modified successfully!", theme::success("✓"), id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, DEFAULT_CONFIG_TEMPLATE};
    use crate::interact::TestIo;
    use crate::logger::Logger;
    use crate::test_support::{plain_output, FakeStore, StubChat};
    use std::path::Path;

    const REPLY: &str = r#"{"refined_task":"Buy oat milk","suggested_tags":["errand","+fast"],"project":"home","goal_alignment":"","subtasks":["check fridge","walk to store"],"additional_infos":{"Tip":"Go early","priority":"L"}}"#;

    fn config() -> Config {
        load_config_from_str(DEFAULT_CONFIG_TEMPLATE, Path::new("d.yml"))
            .expect("config")
            .config
    }

    fn args(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn accepting_everything_applies_title_tags_project_and_annotations() {
        plain_output();
        let mut config = config();
        config.settings.split_tasks = false;
        let store = FakeStore::new(Vec::new());
        let chat = StubChat::new(vec![REPLY]);
        let logger = Logger::disabled();
        let session = Session::new(&config, &store, &logger);
        let mut io = TestIo::new(&["a"]);

        run_add(&session, &chat, &mut io, &args("buy milk project:home")).expect("add");

        let item = store.item(1);
        assert_eq!(item.description, "Buy oat milk");
        assert_eq!(item.tags, vec!["errand", "fast"]);
        assert_eq!(item.priority.as_deref(), Some("L"));
        assert_eq!(item.annotations.len(), 1);
        assert_eq!(item.annotations[0].description, "● Tip: Go early");
        assert!(io.stdout.contains("Task 1 modified successfully!"));
    }

    #[test]
    fn accepted_subtasks_inherit_project_and_end_the_flow() {
        plain_output();
        let config = config();
        let store = FakeStore::new(Vec::new());
        let chat = StubChat::new(vec![REPLY]);
        let logger = Logger::disabled();
        let session = Session::new(&config, &store, &logger);
        let mut io = TestIo::new(&["y", "y"]);

        run_add(&session, &chat, &mut io, &args("buy milk pro:home")).expect("add");

        assert_eq!(
            store.calls_starting_with("add"),
            vec![
                "add buy milk pro:home",
                "add check fridge project:home",
                "add walk to store project:home",
            ]
        );
        assert!(store.calls_starting_with("modify").is_empty());
    }

    #[test]
    fn quit_keeps_the_task_as_entered() {
        plain_output();
        let config = config();
        let store = FakeStore::new(Vec::new());
        let chat = StubChat::new(vec![REPLY]);
        let logger = Logger::disabled();
        let session = Session::new(&config, &store, &logger);
        let mut io = TestIo::new(&["n", "q"]);

        run_add(&session, &chat, &mut io, &args("buy milk")).expect("add");
        assert!(store.calls_starting_with("modify").is_empty());
        assert!(io.stdout.contains("without modifications"));
    }

    #[test]
    fn filtered_task_is_created_but_never_sent() {
        plain_output();
        let config = config();
        let store = FakeStore::new(Vec::new());
        let chat = StubChat::new(vec![REPLY]);
        let logger = Logger::disabled();
        let session = Session::new(&config, &store, &logger);
        let mut io = TestIo::new(&[]);

        run_add(&session, &chat, &mut io, &args("see lawyer +private")).expect("add");
        assert_eq!(chat.calls(), 0);
        assert_eq!(store.items.borrow().len(), 1);
        assert!(io.stdout.contains("not sent to the LLM"));
    }

    #[test]
    fn disabled_features_are_not_offered() {
        let mut config = config();
        config.settings.enable_tagging = false;
        config.settings.enable_annotations = false;
        config.settings.split_tasks = false;
        let suggestion: Suggestion = serde_json::from_str(REPLY).expect("decode");
        let parts = offered_parts(&config, &suggestion);
        assert_eq!(parts, vec![Part::Title, Part::Project]);
    }
}
