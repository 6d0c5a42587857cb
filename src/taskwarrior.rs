use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::{Result, VanguardError};
use crate::logger::Logger;
use crate::shell::{command_exists, render_command, run_capture, run_inherit, CommandResult};
use crate::task_types::{Item, ItemRef};

pub(crate) const TASK_PROGRAM: &str = "task";

/// Read/write access to the external task program. Items are always fetched
/// fresh; nothing here caches.
pub(crate) trait TaskStore {
    /// Creates an item and returns the program's output plus the new id.
    fn add(&self, args: &[String]) -> Result<(String, u32)>;
    fn modify(&self, target: &ItemRef, args: &[String]) -> Result<String>;
    fn annotate(&self, target: &ItemRef, text: &str) -> Result<()>;
    fn start(&self, target: &ItemRef) -> Result<()>;
    fn delete(&self, target: &ItemRef) -> Result<()>;
    fn export(&self, filter: &[String]) -> Result<Vec<Item>>;
    fn projects(&self) -> Result<Vec<String>>;
    fn tags(&self) -> Result<BTreeMap<String, u64>>;
    /// Type of a user-defined attribute, `None` when it is not defined.
    fn uda_type(&self, name: &str) -> Result<Option<String>>;

    fn get(&self, target: &ItemRef) -> Result<Option<Item>> {
        let items = self.export(&[target.to_string()])?;
        Ok(items.into_iter().next())
    }

    fn pending(&self, filter: &[String]) -> Result<Vec<Item>> {
        let mut args = vec!["status:pending".to_string()];
        args.extend(filter.iter().cloned());
        self.export(&args)
    }
}

#[derive(Debug)]
pub(crate) struct TaskCli<'a> {
    program: String,
    logger: &'a Logger,
}

impl<'a> TaskCli<'a> {
    pub(crate) fn new(logger: &'a Logger) -> Self {
        Self::with_program(TASK_PROGRAM, logger)
    }

    pub(crate) fn with_program(program: &str, logger: &'a Logger) -> Self {
        Self {
            program: program.to_string(),
            logger,
        }
    }

    pub(crate) fn is_available(&self) -> bool {
        command_exists(&self.program)
    }

    pub(crate) fn version(&self) -> Result<String> {
        let args = vec!["--version".to_string()];
        let output = self.checked(&args, "version")?;
        Ok(output.stdout.trim().to_string())
    }

    /// Hands the terminal to the task program; returns its exit code.
    pub(crate) fn forward(&self, args: &[String]) -> Result<i32> {
        run_inherit(&self.program, args, "forward", self.logger)
    }

    fn checked(&self, args: &[String], label: &str) -> Result<CommandResult> {
        let output = run_capture(&self.program, args, label, self.logger)?;
        if !output.success() {
            return Err(VanguardError::ExternalCall {
                command: render_command(&self.program, args),
                detail: format!("exit code {}", output.exit_code),
                output: output.combined_output(),
            });
        }
        Ok(output)
    }

    fn decode_export(&self, args: &[String], stdout: &str) -> Result<Vec<Item>> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        // Older task versions emit one object instead of an array for a single match.
        let decoded = if trimmed.starts_with('{') {
            serde_json::from_str::<Item>(trimmed).map(|item| vec![item])
        } else {
            serde_json::from_str::<Vec<Item>>(trimmed)
        };
        decoded.map_err(|err| VanguardError::ExternalCall {
            command: render_command(&self.program, args),
            detail: format!("malformed export JSON: {}", err),
            output: stdout.to_string(),
        })
    }
}

fn created_task_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Created task (\d+)\.").expect("static regex is valid"))
}

pub(crate) fn parse_created_id(output: &str) -> Option<u32> {
    created_task_pattern()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Sub-projects are listed indented by two spaces per level under their
/// parent and show only their last name segment; the full dotted name is
/// rebuilt from the indentation.
pub(crate) fn parse_projects(output: &str) -> Vec<String> {
    let mut path: Vec<&str> = Vec::new();
    let mut projects = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("Project")
            || trimmed.starts_with("----")
            // Summary lines such as "3 projects (12 tasks)".
            || trimmed.contains(" projects (")
            || trimmed.contains(" project (")
        {
            continue;
        }
        let Some(name) = trimmed.split_whitespace().next() else {
            continue;
        };
        if name == "(none)" {
            continue;
        }
        let depth = (line.len() - line.trim_start().len()) / 2;
        path.truncate(depth.min(path.len()));
        path.push(name);
        projects.push(path.join("."));
    }
    projects
}

pub(crate) fn parse_tag_counts(output: &str) -> BTreeMap<String, u64> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [tag, count] => count.parse().ok().map(|count| (tag.to_string(), count)),
                _ => None,
            }
        })
        .collect()
}

impl TaskStore for TaskCli<'_> {
    fn add(&self, args: &[String]) -> Result<(String, u32)> {
        let mut full = vec!["add".to_string()];
        full.extend(args.iter().cloned());
        let output = self.checked(&full, "add")?;
        let combined = output.combined_output();
        let id = parse_created_id(&combined).ok_or_else(|| VanguardError::ExternalCall {
            command: render_command(&self.program, &full),
            detail: "could not find the new task id in the output".to_string(),
            output: combined.clone(),
        })?;
        Ok((combined, id))
    }

    fn modify(&self, target: &ItemRef, args: &[String]) -> Result<String> {
        let mut full = vec![
            "rc.confirmation=off".to_string(),
            target.to_string(),
            "modify".to_string(),
        ];
        full.extend(args.iter().cloned());
        Ok(self.checked(&full, "modify")?.combined_output())
    }

    fn annotate(&self, target: &ItemRef, text: &str) -> Result<()> {
        let args = vec![target.to_string(), "annotate".to_string(), text.to_string()];
        self.checked(&args, "annotate").map(|_| ())
    }

    fn start(&self, target: &ItemRef) -> Result<()> {
        let args = vec![target.to_string(), "start".to_string()];
        self.checked(&args, "start").map(|_| ())
    }

    fn delete(&self, target: &ItemRef) -> Result<()> {
        let args = vec![
            "rc.confirmation=off".to_string(),
            target.to_string(),
            "delete".to_string(),
        ];
        self.checked(&args, "delete").map(|_| ())
    }

    fn export(&self, filter: &[String]) -> Result<Vec<Item>> {
        let mut args = filter.to_vec();
        args.push("export".to_string());
        let output = self.checked(&args, "export")?;
        self.decode_export(&args, &output.stdout)
    }

    fn projects(&self) -> Result<Vec<String>> {
        let args = vec!["rc.verbose=nothing".to_string(), "projects".to_string()];
        let output = self.checked(&args, "projects")?;
        Ok(parse_projects(&output.stdout))
    }

    fn tags(&self) -> Result<BTreeMap<String, u64>> {
        let args = vec![
            "rc.verbose=nothing".to_string(),
            "rc.report.tagscounter.columns=tag,count".to_string(),
            "tags".to_string(),
        ];
        let output = self.checked(&args, "tags")?;
        Ok(parse_tag_counts(&output.stdout))
    }

    fn uda_type(&self, name: &str) -> Result<Option<String>> {
        let args = vec!["_get".to_string(), format!("rc.uda.{}.type", name)];
        let output = self.checked(&args, "uda")?;
        let value = output.stdout.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }
}
