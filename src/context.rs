use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::MAX_CONTEXT_TTL_MINUTES;
use crate::error::{Result, VanguardError};
use crate::interact::{ask, say, Io};

pub(crate) const DEFAULT_MOOD: &str = "neutral";
pub(crate) const DEFAULT_LOCATION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TaskContext {
    pub(crate) mood: String,
    pub(crate) location: String,
    pub(crate) timestamp: DateTime<Utc>,
}

impl TaskContext {
    pub(crate) fn neutral(now: DateTime<Utc>) -> Self {
        Self {
            mood: DEFAULT_MOOD.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            timestamp: now,
        }
    }

    pub(crate) fn is_default(&self) -> bool {
        self.mood == DEFAULT_MOOD && self.location == DEFAULT_LOCATION
    }

    /// `--mood`/`--context` flags win over cached or collected values.
    pub(crate) fn with_overrides(mut self, mood: Option<&str>, location: Option<&str>) -> Self {
        if let Some(mood) = mood.map(str::trim).filter(|m| !m.is_empty()) {
            self.mood = mood.to_string();
        }
        if let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) {
            self.location = location.to_string();
        }
        self
    }
}

pub(crate) fn default_state_path(home: &Path) -> PathBuf {
    home.join(".config").join("vanguard").join("state.json")
}

/// File-backed mood/location snapshot with a time-to-live.
#[derive(Debug)]
pub(crate) struct ContextCache {
    path: PathBuf,
    ttl: Duration,
}

impl ContextCache {
    pub(crate) fn new(path: PathBuf, ttl_minutes: i64) -> Self {
        Self {
            path,
            ttl: Duration::minutes(ttl_minutes.clamp(1, MAX_CONTEXT_TTL_MINUTES)),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Expired records read as defaults; the file itself is left alone.
    pub(crate) fn load_at(&self, now: DateTime<Utc>) -> Result<TaskContext> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TaskContext::neutral(now))
            }
            Err(err) => return Err(err.into()),
        };
        let saved: TaskContext = serde_json::from_str(&data).map_err(|err| {
            VanguardError::Config(format!(
                "Failed to parse context state {}: {}",
                self.path.display(),
                err
            ))
        })?;
        if now - saved.timestamp > self.ttl {
            return Ok(TaskContext::neutral(now));
        }
        Ok(saved)
    }

    pub(crate) fn save(&self, context: &TaskContext) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(context).map_err(|err| {
            VanguardError::Config(format!("Failed to encode context state: {}", err))
        })?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// A loaded context is fresh when it is not the default pair and no refresh
/// was asked for.
pub(crate) fn is_fresh(context: &TaskContext, refresh: bool) -> bool {
    !refresh && !context.is_default()
}

const LOCATION_MENU: &str = "Current location? [h]ome [o]ffice [t]ravel or type your own: ";
const MOOD_MENU: &str =
    "Current mood? [e]nergetic [f]ocused [t]ired [s]tressed [n]eutral: ";

fn pick_location(answer: &str) -> Option<String> {
    let value = match answer.to_lowercase().as_str() {
        "" => return None,
        "h" | "home" => "home".to_string(),
        "o" | "office" => "office".to_string(),
        "t" | "travel" => "travel".to_string(),
        _ => answer.to_string(),
    };
    Some(value)
}

fn pick_mood(answer: &str) -> Option<&'static str> {
    match answer.to_lowercase().as_str() {
        "e" | "energetic" => Some("energetic"),
        "f" | "focused" => Some("focused"),
        "t" | "tired" => Some("tired"),
        "s" | "stressed" => Some("stressed"),
        "n" | "neutral" => Some("neutral"),
        _ => None,
    }
}

/// Asks for location then mood and saves the answers.
pub(crate) fn collect(io: &mut dyn Io, cache: &ContextCache, now: DateTime<Utc>) -> Result<TaskContext> {
    let location = ask(io, LOCATION_MENU)?
        .as_deref()
        .and_then(pick_location)
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
    let mood = ask(io, MOOD_MENU)?
        .as_deref()
        .and_then(pick_mood)
        .unwrap_or(DEFAULT_MOOD)
        .to_string();

    let context = TaskContext {
        mood,
        location,
        timestamp: now,
    };
    cache.save(&context)?;
    Ok(context)
}

/// Context for one spotlight run: interactive collection when the cache is
/// not fresh (unless `prompt` is off), flag overrides applied last.
pub(crate) fn resolve(
    io: &mut dyn Io,
    cache: &ContextCache,
    prompt: bool,
    refresh: bool,
    mood: Option<&str>,
    location: Option<&str>,
) -> Result<TaskContext> {
    let now = Utc::now();
    let cached = if refresh {
        TaskContext::neutral(now)
    } else {
        cache.load_at(now)?
    };
    let context = if !prompt {
        cached
    } else if is_fresh(&cached, refresh) {
        say(
            io,
            &format!(
                "Using saved context: mood={} location={} (--refresh to change)",
                cached.mood, cached.location
            ),
        )?;
        cached
    } else {
        collect(io, cache, now)?
    };
    Ok(context.with_overrides(mood, location))
}
