use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Config;

/// One LLM proposal for a single task. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Suggestion {
    #[serde(rename = "refined_task")]
    pub(crate) refined_title: String,
    pub(crate) suggested_tags: Vec<String>,
    pub(crate) project: String,
    pub(crate) goal_alignment: String,
    pub(crate) subtasks: Vec<String>,
    #[serde(rename = "additional_infos")]
    pub(crate) additional_info: BTreeMap<String, String>,
}

/// Which parts of a suggestion the user accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Accepted {
    pub(crate) title: bool,
    pub(crate) tags: bool,
    pub(crate) project: bool,
}

impl Accepted {
    pub(crate) const ALL: Self = Self {
        title: true,
        tags: true,
        project: true,
    };
}

fn with_plus(tag: &str) -> Option<String> {
    let bare = tag.trim().trim_start_matches('+');
    (!bare.is_empty()).then(|| format!("+{}", bare))
}

impl Suggestion {
    /// `modify` arguments for the accepted parts; priority comes along with
    /// the title when the model supplied one.
    pub(crate) fn to_modify_args(&self, accepted: Accepted) -> Vec<String> {
        let mut args = Vec::new();
        if accepted.title && !self.refined_title.trim().is_empty() {
            args.push(self.refined_title.trim().to_string());
        }
        if accepted.tags {
            args.extend(self.suggested_tags.iter().filter_map(|tag| with_plus(tag)));
        }
        if accepted.project && !self.project.trim().is_empty() {
            args.push(format!("project:{}", self.project.trim()));
        }
        if accepted.title {
            if let Some(priority) = self.priority() {
                args.push(format!("priority:{}", priority));
            }
        }
        args
    }

    pub(crate) fn priority(&self) -> Option<String> {
        self.additional_info
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("priority"))
            .map(|(_, value)| value.trim().to_uppercase())
            .filter(|value| matches!(value.as_str(), "H" | "M" | "L"))
    }

    pub(crate) fn lowercase(&mut self) {
        self.refined_title = self.refined_title.to_lowercase();
        self.goal_alignment = self.goal_alignment.to_lowercase();
        self.project = self.project.to_lowercase();
        for subtask in &mut self.subtasks {
            *subtask = subtask.to_lowercase();
        }
        for tag in &mut self.suggested_tags {
            *tag = tag.to_lowercase();
        }
        for value in self.additional_info.values_mut() {
            *value = value.to_lowercase();
        }
    }

    /// Annotation lines `<symbol> <label>: <text>` for non-empty infos. Keys
    /// may be config keys or labels; priority is not an annotation.
    pub(crate) fn annotation_lines(&self, config: &Config) -> Vec<String> {
        self.additional_info
            .iter()
            .filter(|(key, value)| !value.trim().is_empty() && !key.eq_ignore_ascii_case("priority"))
            .map(|(key, value)| {
                let meta = config.annotations.get(key).or_else(|| {
                    config
                        .annotations
                        .values()
                        .find(|meta| meta.label.eq_ignore_ascii_case(key))
                });
                let (symbol, label) = match meta {
                    Some(meta) => (
                        meta.symbol.as_str(),
                        if meta.label.is_empty() {
                            key.as_str()
                        } else {
                            meta.label.as_str()
                        },
                    ),
                    None => ("", key.as_str()),
                };
                if symbol.is_empty() {
                    format!("{}: {}", label, value.trim())
                } else {
                    format!("{} {}: {}", symbol, label, value.trim())
                }
            })
            .collect()
    }
}

/// One entry of a batch answer; `task_index` is 1-based.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TaskAnalysis {
    pub(crate) task_index: usize,
    #[serde(flatten)]
    pub(crate) suggestion: Suggestion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BatchSuggestion {
    pub(crate) task_analyses: Vec<TaskAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SpotlightPick {
    pub(crate) task_id: u32,
    pub(crate) title: String,
    pub(crate) reason: String,
    pub(crate) estimated: String,
    pub(crate) history: String,
    pub(crate) goal: String,
    pub(crate) context_tag: String,
    pub(crate) next: String,
}
