use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Append-only event log for task program and LLM calls. Optional: with no
/// path configured every call is a no-op.
#[derive(Debug)]
pub(crate) struct Logger {
    path: Option<PathBuf>,
    debug: bool,
    disabled: AtomicBool,
}

impl Logger {
    pub(crate) fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            debug: false,
            disabled: AtomicBool::new(false),
        }
    }

    pub(crate) fn disabled() -> Self {
        Self::new(None)
    }

    /// Builds a logger from `settings.log_path`, expanding a leading `~/`.
    pub(crate) fn from_settings(log_path: Option<&str>, home: &Path, debug: bool) -> Self {
        let path = log_path
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| match value.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => PathBuf::from(value),
            });
        Self {
            path,
            debug,
            disabled: AtomicBool::new(false),
        }
    }

    pub(crate) fn log_event(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let line = format!("{} {}\n", ts, sanitize_log_value(message));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(err) = fs::create_dir_all(parent) {
                self.disable_with_warning(path, &err);
                return;
            }
        }
        let mut file = match fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => file,
            Err(err) => {
                self.disable_with_warning(path, &err);
                return;
            }
        };
        if let Err(err) = file.write_all(line.as_bytes()) {
            self.disable_with_warning(path, &err);
        }
    }

    /// Echoes a full payload to stderr when `settings.debug` is on.
    pub(crate) fn debug_dump(&self, label: &str, body: &str) {
        if !self.debug {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "--- {} ---\n{}\n--- end {} ---", label, body, label);
    }

    fn disable_with_warning(&self, path: &Path, err: &std::io::Error) {
        if self
            .disabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(
                stderr,
                "Warning: event logging disabled log_path={} io_error={}",
                path.display(),
                err
            );
        }
    }
}

pub(crate) fn sanitize_log_value(value: &str) -> String {
    value
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
