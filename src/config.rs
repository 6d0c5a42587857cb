use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config_templates/default.yml");
pub(crate) const API_KEY_PLACEHOLDER: &str = "<api key>";
/// One year; saved context never outlives this.
pub(crate) const MAX_CONTEXT_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) llm: LlmSettings,
    pub(crate) settings: Settings,
    pub(crate) filters: Filters,
    pub(crate) tags: BTreeMap<String, TagMeta>,
    pub(crate) annotations: BTreeMap<String, AnnotationMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LlmSettings {
    pub(crate) provider: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) debug: bool,
    pub(crate) enable_llm: bool,
    pub(crate) split_tasks: bool,
    pub(crate) auto_import_tags: bool,
    pub(crate) enable_lowercase: bool,
    pub(crate) enable_tagging: bool,
    pub(crate) enable_annotations: bool,
    pub(crate) goal_project_name: String,
    pub(crate) task_import_limit: usize,
    pub(crate) task_processing_batch_size: usize,
    pub(crate) spotlight_candidates: usize,
    pub(crate) context_ttl_minutes: i64,
    pub(crate) state_path: Option<String>,
    pub(crate) log_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            enable_llm: true,
            split_tasks: true,
            auto_import_tags: false,
            enable_lowercase: false,
            enable_tagging: true,
            enable_annotations: true,
            goal_project_name: "goals".to_string(),
            task_import_limit: 500,
            task_processing_batch_size: 15,
            spotlight_candidates: 20,
            context_ttl_minutes: 60,
            state_path: None,
            log_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Filters {
    pub(crate) tag_filter_mode: String,
    pub(crate) tag_filter_tags: Vec<String>,
    pub(crate) project_filter_mode: String,
    pub(crate) project_filter_projects: Vec<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            tag_filter_mode: "blacklist".to_string(),
            tag_filter_tags: vec!["private".to_string(), "confidential".to_string()],
            project_filter_mode: "blacklist".to_string(),
            project_filter_projects: vec!["pers.secret".to_string(), "work.secret".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TagMeta {
    pub(crate) desc: String,
    pub(crate) urgency_factor: f64,
}

impl Default for TagMeta {
    fn default() -> Self {
        Self {
            desc: String::new(),
            urgency_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AnnotationMeta {
    pub(crate) label: String,
    pub(crate) symbol: String,
    pub(crate) description: String,
}

/// Per-invocation switches that turn config features off for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FlagOverrides {
    pub(crate) no_subtasks: bool,
    pub(crate) no_tags: bool,
    pub(crate) no_annotations: bool,
}

impl Config {
    pub(crate) fn apply_overrides(&mut self, overrides: FlagOverrides) {
        if overrides.no_subtasks {
            self.settings.split_tasks = false;
        }
        if overrides.no_tags {
            self.settings.enable_tagging = false;
        }
        if overrides.no_annotations {
            self.settings.enable_annotations = false;
        }
    }

    /// Adds tags known to the task program without touching configured ones.
    pub(crate) fn merge_imported_tags<I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = String>,
    {
        for tag in tags {
            self.tags.entry(tag).or_default();
        }
    }

    pub(crate) fn ttl_minutes(&self) -> i64 {
        self.settings.context_ttl_minutes
    }

    pub(crate) fn goal_project(&self) -> &str {
        &self.settings.goal_project_name
    }
}

#[derive(Debug)]
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn default_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("vanguard").join("config.yml")
}

pub(crate) fn load_config(path: &Path) -> Result<LoadedConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    load_config_from_str(&content, path)
}

pub(crate) fn load_config_from_str(content: &str, path: &Path) -> Result<LoadedConfig, String> {
    let value: Value = serde_yaml::from_str(content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(format!(
                "Config {} must be a YAML mapping",
                path.display()
            ))
        }
    };

    let mut warnings = unknown_keys(&mapping);
    emit_unknown_key_warnings(&warnings);

    let config: Config = serde_path_to_error::deserialize(Value::Mapping(mapping)).map_err(|err| {
        format!(
            "Failed to parse config {} at {}: {}",
            path.display(),
            err.path(),
            err.inner()
        )
    })?;

    validate_config(&config).map_err(|err| format!("Invalid config {}: {}", path.display(), err))?;

    let mode_warnings = filter_mode_warnings(&config.filters);
    for warning in &mode_warnings {
        eprintln!("Warning: {}", warning);
    }
    warnings.extend(mode_warnings);

    Ok(LoadedConfig { config, warnings })
}

fn emit_unknown_key_warnings(keys: &[String]) {
    for key in keys {
        eprintln!("Warning: unknown config key: {}", key);
    }
}

fn unknown_keys(mapping: &Mapping) -> Vec<String> {
    let allowed = ["llm", "settings", "filters", "tags", "annotations"];
    let allowed_settings = [
        "debug",
        "enable_llm",
        "split_tasks",
        "auto_import_tags",
        "enable_lowercase",
        "enable_tagging",
        "enable_annotations",
        "goal_project_name",
        "task_import_limit",
        "task_processing_batch_size",
        "spotlight_candidates",
        "context_ttl_minutes",
        "state_path",
        "log_path",
    ];

    let mut unknown: Vec<String> = mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !allowed.contains(&key.as_str()))
        .collect();

    if let Some(Value::Mapping(settings)) = mapping.get("settings") {
        unknown.extend(
            settings
                .keys()
                .filter_map(|key| key.as_str())
                .filter(|key| !allowed_settings.contains(key))
                .map(|key| format!("settings.{}", key)),
        );
    }

    unknown
}

pub(crate) fn validate_config(config: &Config) -> Result<(), String> {
    if config.settings.goal_project_name.trim().is_empty() {
        return Err("settings.goal_project_name must not be empty".to_string());
    }
    if config.settings.task_import_limit == 0 {
        return Err("settings.task_import_limit must be a positive integer (got 0)".to_string());
    }
    if config.settings.task_processing_batch_size == 0 {
        return Err(
            "settings.task_processing_batch_size must be a positive integer (got 0)".to_string(),
        );
    }
    if config.settings.spotlight_candidates == 0 {
        return Err("settings.spotlight_candidates must be a positive integer (got 0)".to_string());
    }
    if !(1..=MAX_CONTEXT_TTL_MINUTES).contains(&config.settings.context_ttl_minutes) {
        return Err(format!(
            "settings.context_ttl_minutes must be between 1 and {} (got {})",
            MAX_CONTEXT_TTL_MINUTES, config.settings.context_ttl_minutes
        ));
    }
    Ok(())
}

fn filter_mode_warnings(filters: &Filters) -> Vec<String> {
    let mut warnings = Vec::new();
    for (label, mode) in [
        ("filters.tag_filter_mode", &filters.tag_filter_mode),
        ("filters.project_filter_mode", &filters.project_filter_mode),
    ] {
        let normalized = mode.to_lowercase();
        if normalized != "blacklist" && normalized != "whitelist" {
            warnings.push(format!(
                "{} is '{}'; expected blacklist or whitelist, filtering is disabled",
                label, mode
            ));
        }
    }
    warnings
}
