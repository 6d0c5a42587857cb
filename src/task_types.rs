use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const TW_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A positive task id or a full uuid. Anything else would be read by the
/// task program as a filter and could match unrelated items.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ItemRef(String);

impl ItemRef {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_uuid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

impl TryFrom<String> for ItemRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("task id must not be empty".to_string());
        }
        let is_id = trimmed.parse::<u32>().is_ok_and(|id| id > 0);
        if !is_id && !is_uuid(trimmed) {
            return Err(format!(
                "'{}' is not a task id or uuid",
                trimmed
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<&str> for ItemRef {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<u32> for ItemRef {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timestamp in the task program's compact `YYYYMMDDThhmmssZ` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TwTime(pub(crate) DateTime<Utc>);

impl TwTime {
    pub(crate) fn parse(raw: &str) -> Result<Self, String> {
        NaiveDateTime::parse_from_str(raw, TW_TIME_FORMAT)
            .map(|naive| Self(naive.and_utc()))
            .map_err(|err| format!("invalid timestamp {:?}: {}", raw, err))
    }

    pub(crate) fn format(&self) -> String {
        self.0.format(TW_TIME_FORMAT).to_string()
    }
}

impl Serialize for TwTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for TwTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TwTime::parse(&raw).map_err(D::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Annotation {
    pub(crate) entry: TwTime,
    pub(crate) description: String,
}

/// One record of the task program's JSON export. Owned by the task program;
/// never cached beyond a single command.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Item {
    #[serde(default)]
    pub(crate) id: u32,
    pub(crate) uuid: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) due: Option<TwTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) entry: Option<TwTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) modified: Option<TwTime>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) urgency: f64,
    #[serde(default, deserialize_with = "lenient_counter")]
    pub(crate) skipped: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) goal: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) annotations: Vec<Annotation>,
}

impl Item {
    pub(crate) fn project_name(&self) -> &str {
        self.project.as_deref().unwrap_or("")
    }

    pub(crate) fn linked_goal(&self) -> Option<&str> {
        self.goal.as_deref().filter(|uuid| !uuid.trim().is_empty())
    }

    /// Renders the item back into `add`/`modify` style arguments.
    pub(crate) fn to_command_line(&self) -> String {
        let mut line = self.description.clone();
        if let Some(project) = self.project.as_deref().filter(|p| !p.is_empty()) {
            line.push_str(" project:");
            line.push_str(project);
        }
        for tag in &self.tags {
            line.push_str(" +");
            line.push_str(tag);
        }
        if let Some(priority) = self.priority.as_deref().filter(|p| !p.is_empty()) {
            line.push_str(" priority:");
            line.push_str(priority);
        }
        line
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(0.0),
        serde_json::Value::String(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|err| D::Error::custom(format!("invalid number {:?}: {}", raw, err))),
        other => Err(D::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer)
}

fn lenient_counter<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_number(deserializer)?;
    if value < 0.0 || !value.is_finite() {
        return Err(D::Error::custom(format!("invalid counter {}", value)));
    }
    Ok(value as u32)
}
