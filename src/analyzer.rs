use serde::de::DeserializeOwned;

use crate::argparse::{parse, ParsedCommand};
use crate::config::{Config, Filters};
use crate::context::TaskContext;
use crate::error::{Result, VanguardError};
use crate::filter::{include_project, include_tags};
use crate::llm::{strip_code_fences, ChatClient, ChatMessage};
use crate::prompts::{render_batch, render_single, render_spotlight, SpotlightCandidate, UserContext};
use crate::suggestion::{BatchSuggestion, SpotlightPick, Suggestion, TaskAnalysis};
use crate::task_types::Item;

/// Refuses anything the privacy filters exclude; runs before any prompt is built.
pub(crate) fn ensure_sendable(task: &ParsedCommand, filters: &Filters) -> Result<()> {
    if !include_tags(&task.tags, filters) {
        return Err(VanguardError::Filtered {
            reason: format!(
                "at least one tag is excluded from LLM processing: tags={:?}",
                task.tags
            ),
        });
    }
    if !include_project(&task.project, filters) {
        return Err(VanguardError::Filtered {
            reason: format!(
                "the project is excluded from LLM processing: project={:?}",
                task.project
            ),
        });
    }
    Ok(())
}

pub(crate) fn parsed_from_item(item: &Item) -> ParsedCommand {
    ParsedCommand {
        title: item.description.clone(),
        tags: item.tags.clone(),
        project: item.project_name().to_string(),
        priority: item.priority.clone().unwrap_or_default(),
    }
}

/// A batch chunk whose request or decode failed. Positions are 1-based.
#[derive(Debug)]
pub(crate) struct ChunkFailure {
    pub(crate) first: usize,
    pub(crate) last: usize,
    pub(crate) error: VanguardError,
}

#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    pub(crate) analyses: Vec<TaskAnalysis>,
    pub(crate) failures: Vec<ChunkFailure>,
}

pub(crate) struct Analyzer<'a> {
    config: &'a Config,
    client: &'a dyn ChatClient,
    user: UserContext,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(config: &'a Config, client: &'a dyn ChatClient, user: UserContext) -> Self {
        Self {
            config,
            client,
            user,
        }
    }

    fn ask<T: DeserializeOwned>(&self, prompt: String) -> Result<T> {
        if !self.config.settings.enable_llm {
            return Err(VanguardError::Setup(
                "sending requests to the LLM is disabled (settings.enable_llm: false)".to_string(),
            ));
        }
        let raw = self.client.chat(&[ChatMessage::user(prompt)])?;
        serde_json::from_str(strip_code_fences(&raw)).map_err(|err| VanguardError::Parse {
            message: err.to_string(),
            raw,
        })
    }

    fn normalize(&self, suggestion: &mut Suggestion) {
        if self.config.settings.enable_lowercase {
            suggestion.lowercase();
        }
        if !self.config.settings.enable_tagging {
            suggestion.suggested_tags.clear();
        }
        if !self.config.settings.enable_annotations {
            suggestion.additional_info.retain(|key, _| key.eq_ignore_ascii_case("priority"));
        }
        if !self.config.settings.split_tasks {
            suggestion.subtasks.clear();
        }
    }

    pub(crate) fn analyze_single(&self, raw: &str) -> Result<Suggestion> {
        let task = parse(raw);
        ensure_sendable(&task, &self.config.filters)?;
        let prompt = render_single(&self.user, &task)?;
        let mut suggestion: Suggestion = self.ask(prompt)?;
        self.normalize(&mut suggestion);
        Ok(suggestion)
    }

    /// One request per chunk of `task_processing_batch_size`. A failed chunk
    /// is recorded and the rest still run.
    pub(crate) fn analyze_batch(&self, items: &[Item]) -> Result<BatchOutcome> {
        let tasks: Vec<ParsedCommand> = items.iter().map(parsed_from_item).collect();
        for task in &tasks {
            ensure_sendable(task, &self.config.filters)?;
        }

        let size = self.config.settings.task_processing_batch_size.max(1);
        let mut outcome = BatchOutcome::default();
        for (chunk_index, chunk) in tasks.chunks(size).enumerate() {
            let offset = chunk_index * size;
            let result = render_batch(&self.user, chunk)
                .and_then(|prompt| self.ask::<BatchSuggestion>(prompt));
            match result {
                Ok(batch) => {
                    for (position, mut analysis) in batch.task_analyses.into_iter().enumerate() {
                        // Trust the model's local index when it is in range.
                        let local = if (1..=chunk.len()).contains(&analysis.task_index) {
                            analysis.task_index
                        } else {
                            position + 1
                        };
                        if local > chunk.len() {
                            continue;
                        }
                        analysis.task_index = offset + local;
                        self.normalize(&mut analysis.suggestion);
                        outcome.analyses.push(analysis);
                    }
                }
                Err(error) if error.is_setup() => return Err(error),
                Err(error) => outcome.failures.push(ChunkFailure {
                    first: offset + 1,
                    last: offset + chunk.len(),
                    error,
                }),
            }
        }
        Ok(outcome)
    }

    pub(crate) fn spotlight(
        &self,
        context: &TaskContext,
        candidates: &[SpotlightCandidate<'_>],
    ) -> Result<SpotlightPick> {
        let prompt = render_spotlight(&self.user, context, candidates)?;
        self.ask(prompt)
    }
}
