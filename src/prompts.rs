use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::argparse::ParsedCommand;
use crate::config::Config;
use crate::context::TaskContext;
use crate::error::{Result, VanguardError};
use crate::filter::{filter_projects, include_tag};
use crate::task_types::Item;

const USER_CONTEXT: &str = include_str!("../prompts/user_context.md");
const TASK_ANALYSIS_SINGLE: &str = include_str!("../prompts/task_analysis_single.md");
const TASK_ANALYSIS_BATCH: &str = include_str!("../prompts/task_analysis_batch.md");
const SPOTLIGHT: &str = include_str!("../prompts/spotlight.md");

/// Drops a leading `---` YAML frontmatter block.
pub(crate) fn strip_frontmatter(template: &str) -> &str {
    let Some(rest) = template.strip_prefix("---\n") else {
        return template;
    };
    match rest.find("\n---\n") {
        Some(end) => &rest[end + "\n---\n".len()..],
        None => template,
    }
}

/// Replaces every `{{name}}` with its value. Unknown placeholders are an error
/// so a template typo never reaches the model.
pub(crate) fn render(name: &str, template: &str, values: &BTreeMap<&str, String>) -> Result<String> {
    let body = strip_frontmatter(template);
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            VanguardError::Config(format!("prompt template {} has an unclosed placeholder", name))
        })?;
        let key = after[..end].trim();
        let value = values.get(key).ok_or_else(|| {
            VanguardError::Config(format!(
                "prompt template {} references unknown placeholder {{{{{}}}}}",
                name, key
            ))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out.trim().to_string())
}

/// The user's vocabulary, as shown to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct UserContext {
    pub(crate) tags: Vec<(String, String)>,
    pub(crate) annotations: Vec<(String, String)>,
    pub(crate) projects: Vec<String>,
    pub(crate) goals: Vec<(String, String)>,
}

impl UserContext {
    pub(crate) fn build(config: &Config, projects: Vec<String>, goals: &[Item]) -> Self {
        let tags = config
            .tags
            .iter()
            .filter(|(name, _)| include_tag(name, &config.filters))
            .map(|(name, meta)| (name.clone(), meta.desc.clone()))
            .collect();
        let annotations = config
            .annotations
            .iter()
            .map(|(key, meta)| {
                let label = if meta.label.is_empty() {
                    key.clone()
                } else {
                    meta.label.clone()
                };
                (label, meta.description.clone())
            })
            .collect();
        let goals = goals
            .iter()
            .map(|goal| {
                (
                    goal.description.clone(),
                    goal.priority.clone().unwrap_or_default(),
                )
            })
            .collect();
        Self {
            tags,
            annotations,
            projects: filter_projects(projects, &config.filters),
            goals,
        }
    }

    /// Example `additional_infos` object keyed by annotation label.
    pub(crate) fn example_output(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .annotations
            .iter()
            .map(|(label, description)| (label.clone(), serde_json::Value::from(description.as_str())))
            .collect();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    fn render(&self) -> Result<String> {
        let mut values = BTreeMap::new();
        values.insert("tags", bullet_pairs(&self.tags));
        values.insert("annotations", bullet_pairs(&self.annotations));
        values.insert("projects", bullets(&self.projects));
        values.insert("goals", bullet_pairs(&self.goals));
        render("user_context", USER_CONTEXT, &values)
    }
}

fn bullets(values: &[String]) -> String {
    if values.is_empty() {
        return "- (none)".to_string();
    }
    values
        .iter()
        .map(|value| format!("- {}", value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_pairs(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return "- (none)".to_string();
    }
    pairs
        .iter()
        .map(|(name, detail)| {
            if detail.is_empty() {
                format!("- {}", name)
            } else {
                format!("- {}: {}", name, detail)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_none(value: &str) -> String {
    if value.trim().is_empty() {
        "(none)".to_string()
    } else {
        value.to_string()
    }
}

fn tag_list(tags: &[String]) -> String {
    if tags.is_empty() {
        return "(none)".to_string();
    }
    tags.iter()
        .map(|tag| format!("+{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn render_single(user: &UserContext, task: &ParsedCommand) -> Result<String> {
    let mut values = BTreeMap::new();
    values.insert("user_context", user.render()?);
    values.insert("description", or_none(&task.title));
    values.insert("task_tags", tag_list(&task.tags));
    values.insert("project", or_none(&task.project));
    values.insert("priority", or_none(&task.priority));
    values.insert("example_output", user.example_output());
    render("task_analysis_single", TASK_ANALYSIS_SINGLE, &values)
}

pub(crate) fn render_batch(user: &UserContext, tasks: &[ParsedCommand]) -> Result<String> {
    let listing = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let mut line = format!("{}. {}", index + 1, task.title);
            if !task.tags.is_empty() {
                line.push_str(&format!(" | tags: {}", tag_list(&task.tags)));
            }
            if !task.project.is_empty() {
                line.push_str(&format!(" | project: {}", task.project));
            }
            if !task.priority.is_empty() {
                line.push_str(&format!(" | priority: {}", task.priority));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut values = BTreeMap::new();
    values.insert("user_context", user.render()?);
    values.insert("tasks", listing);
    values.insert("example_output", user.example_output());
    render("task_analysis_batch", TASK_ANALYSIS_BATCH, &values)
}

#[derive(Debug, Serialize)]
pub(crate) struct SpotlightCandidate<'a> {
    #[serde(flatten)]
    pub(crate) item: &'a Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) goal_description: Option<String>,
}

pub(crate) fn render_spotlight(
    user: &UserContext,
    context: &TaskContext,
    candidates: &[SpotlightCandidate<'_>],
) -> Result<String> {
    let tasks_json = serde_json::to_string_pretty(candidates)
        .map_err(|err| VanguardError::Config(format!("failed to encode candidates: {}", err)))?;
    let mut values = BTreeMap::new();
    values.insert("user_context", user.render()?);
    values.insert("mood", context.mood.clone());
    values.insert("location", context.location.clone());
    values.insert("time", Local::now().format("%-I:%M %p").to_string());
    values.insert("tasks_json", tasks_json);
    render("spotlight", SPOTLIGHT, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argparse::parse;
    use crate::config::{load_config_from_str, DEFAULT_CONFIG_TEMPLATE};
    use std::path::Path;

    fn config() -> Config {
        load_config_from_str(DEFAULT_CONFIG_TEMPLATE, Path::new("default.yml"))
            .expect("default config")
            .config
    }

    #[test]
    fn frontmatter_is_stripped() {
        assert_eq!(strip_frontmatter("---\nname: x\n---\nbody"), "body");
        assert_eq!(strip_frontmatter("no frontmatter"), "no frontmatter");
        assert_eq!(strip_frontmatter("---\nunterminated"), "---\nunterminated");
    }

    #[test]
    fn render_substitutes_and_rejects_unknown_placeholders() {
        let mut values = BTreeMap::new();
        values.insert("who", "you".to_string());
        assert_eq!(render("t", "hello {{ who }}!", &values).expect("render"), "hello you!");
        let err = render("t", "hello {{nobody}}", &values).expect_err("unknown");
        assert!(err.to_string().contains("{{nobody}}"), "got: {err}");
    }

    #[test]
    fn embedded_templates_render_without_leftover_placeholders() {
        let config = config();
        let goals = vec![Item {
            description: "Run a marathon".to_string(),
            priority: Some("H".to_string()),
            ..Item::default()
        }];
        let user = UserContext::build(&config, vec!["home".to_string()], &goals);
        let task = parse("buy milk +errand project:home priority:h");

        let single = render_single(&user, &task).expect("single");
        assert!(single.contains("Description: buy milk"));
        assert!(single.contains("- Run a marathon: H"));
        assert!(!single.contains("{{") && !single.starts_with("---"));

        let batch = render_batch(&user, &[task.clone(), parse("call mom")]).expect("batch");
        assert!(batch.contains("1. buy milk | tags: +errand | project: home | priority: H"));
        assert!(batch.contains("2. call mom"));

        let item = Item {
            id: 3,
            uuid: "u-3".to_string(),
            description: "stretch".to_string(),
            ..Item::default()
        };
        let candidates = [SpotlightCandidate {
            item: &item,
            goal_description: Some("Run a marathon".to_string()),
        }];
        let spot = render_spotlight(&user, &TaskContext::neutral(chrono::Utc::now()), &candidates)
            .expect("spotlight");
        assert!(spot.contains("\"goal_description\": \"Run a marathon\""));
        assert!(spot.contains("Current mood: neutral"));
        assert!(!spot.contains("{{"));
    }

    #[test]
    fn user_context_respects_filters() {
        let mut config = config();
        config
            .tags
            .insert("private".to_string(), crate::config::TagMeta::default());
        let user = UserContext::build(
            &config,
            vec!["work.secret".to_string(), "work".to_string()],
            &[],
        );
        assert!(user.tags.iter().all(|(name, _)| name != "private"));
        assert_eq!(user.projects, vec!["work".to_string()]);
    }

    #[test]
    fn example_output_is_keyed_by_label() {
        let user = UserContext::build(&config(), Vec::new(), &[]);
        let value: serde_json::Value =
            serde_json::from_str(&user.example_output()).expect("valid json");
        assert_eq!(value["Risk"], "If not done");
        assert_eq!(value["Tip"], "Practical, actionable");
    }
}
