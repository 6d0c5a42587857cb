use chrono::Utc;
use std::ffi::OsString;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::config::{API_KEY_PLACEHOLDER, DEFAULT_CONFIG_TEMPLATE};
use crate::error::{Result, VanguardError};
use crate::interact::{confirm, say, Io};
use crate::theme;

/// Attribute definitions the goal and spotlight features rely on.
pub(crate) const UDA_LINES: [(&str, &str); 4] = [
    ("uda.goal.type", "string"),
    ("uda.goal.label", "Goal"),
    ("uda.skipped.type", "numeric"),
    ("uda.skipped.label", "Skipped"),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct InitReport {
    pub(crate) config_written: bool,
    pub(crate) backup_path: Option<PathBuf>,
    pub(crate) uda_lines_added: Vec<String>,
}

/// `$TASKRC` when set, else `~/.taskrc`.
pub(crate) fn taskrc_path(taskrc_env: Option<OsString>, home: &Path) -> PathBuf {
    taskrc_env
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".taskrc"))
}

fn next_backup_path(config_path: &Path) -> PathBuf {
    let file_name = config_path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("config.yml");
    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let mut backup = config_path.with_file_name(format!("{}.bak-{}", file_name, timestamp));

    if !backup.exists() {
        return backup;
    }

    for index in 2..=1000 {
        backup = config_path.with_file_name(format!("{}.bak-{}-{}", file_name, timestamp, index));
        if !backup.exists() {
            return backup;
        }
    }
    backup
}

pub(crate) fn write_config_with_backup(config_path: &Path, content: &str) -> Result<Option<PathBuf>> {
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            VanguardError::Config(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                err
            ))
        })?;
    }

    let backup_path = if config_path.exists() {
        let backup_path = next_backup_path(config_path);
        fs::copy(config_path, &backup_path).map_err(|err| {
            VanguardError::Config(format!(
                "Failed to create backup {}: {}",
                backup_path.display(),
                err
            ))
        })?;
        Some(backup_path)
    } else {
        None
    };

    fs::write(config_path, content).map_err(|err| {
        VanguardError::Config(format!(
            "Failed to write config {}: {}",
            config_path.display(),
            err
        ))
    })?;
    Ok(backup_path)
}

/// `key=value` lines from [`UDA_LINES`] whose key is not already set.
pub(crate) fn missing_uda_lines(taskrc: &str) -> Vec<String> {
    let defined: Vec<&str> = taskrc
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, _)| key.trim())
        .collect();
    UDA_LINES
        .iter()
        .filter(|(key, _)| !defined.contains(key))
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

pub(crate) fn append_uda_lines(taskrc: &Path) -> Result<Vec<String>> {
    let existing = match fs::read_to_string(taskrc) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(VanguardError::Config(format!(
                "Failed to read {}: {}",
                taskrc.display(),
                err
            )))
        }
    };
    let missing = missing_uda_lines(&existing);
    if missing.is_empty() {
        return Ok(missing);
    }

    let mut block = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        block.push('\n');
    }
    block.push_str("\n# vanguard: goal links and spotlight skips\n");
    for line in &missing {
        block.push_str(line);
        block.push('\n');
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(taskrc)
        .map_err(|err| {
            VanguardError::Config(format!("Failed to open {}: {}", taskrc.display(), err))
        })?;
    file.write_all(block.as_bytes()).map_err(|err| {
        VanguardError::Config(format!("Failed to write {}: {}", taskrc.display(), err))
    })?;
    Ok(missing)
}

pub(crate) fn run_init(io: &mut dyn Io, config_path: &Path, taskrc: &Path) -> Result<InitReport> {
    let mut report = InitReport::default();

    let write = if config_path.exists() {
        confirm(
            io,
            &theme::warn(&format!(
                "Config {} already exists. Replace it with the defaults (a backup is kept)?",
                config_path.display()
            )),
            false,
        )?
    } else {
        true
    };
    if write {
        report.backup_path = write_config_with_backup(config_path, DEFAULT_CONFIG_TEMPLATE)?;
        report.config_written = true;
        say(
            io,
            &theme::success(&format!("Wrote config to {}", config_path.display())),
        )?;
        if let Some(backup) = &report.backup_path {
            say(io, &format!("Backup: {}", backup.display()))?;
        }
        say(
            io,
            &theme::info(&format!(
                "Replace llm.api_key ({}) in that file before using add, analyze or spot.",
                API_KEY_PLACEHOLDER
            )),
        )?;
    } else {
        say(io, "Kept the existing config.")?;
    }

    let add_udas = confirm(
        io,
        &theme::info(&format!(
            "Define the goal and skipped attributes in {}?",
            taskrc.display()
        )),
        true,
    )?;
    if add_udas {
        report.uda_lines_added = append_uda_lines(taskrc)?;
        if report.uda_lines_added.is_empty() {
            say(io, "Attributes already defined; nothing to add.")?;
        } else {
            for line in &report.uda_lines_added {
                say(io, &format!("  {} {}", theme::success("+"), line))?;
            }
        }
    }
    Ok(report)
}
