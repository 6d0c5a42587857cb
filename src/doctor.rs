use std::path::Path;

use crate::config::LoadedConfig;
use crate::error::Result;
use crate::interact::{say, Io};
use crate::llm::LlmProvider;
use crate::taskwarrior::{TaskCli, TaskStore, TASK_PROGRAM};
use crate::theme;

/// What `doctor` needs from the task program.
pub(crate) trait TaskProbe {
    fn is_available(&self) -> bool;
    fn version(&self) -> Result<String>;
    fn uda_type(&self, name: &str) -> Result<Option<String>>;
}

impl TaskProbe for TaskCli<'_> {
    fn is_available(&self) -> bool {
        TaskCli::is_available(self)
    }

    fn version(&self) -> Result<String> {
        TaskCli::version(self)
    }

    fn uda_type(&self, name: &str) -> Result<Option<String>> {
        TaskStore::uda_type(self, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Pass(String),
    Fail(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Check {
    pub(crate) name: &'static str,
    pub(crate) outcome: Outcome,
}

impl Check {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            outcome: Outcome::Pass(detail.into()),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            outcome: Outcome::Fail(detail.into()),
        }
    }

    fn skipped(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            outcome: Outcome::Skipped(detail.into()),
        }
    }

    pub(crate) fn failed(&self) -> bool {
        matches!(self.outcome, Outcome::Fail(_))
    }
}

/// Runs every check without calling the LLM; a failed check never stops the
/// ones after it.
pub(crate) fn run_checks(
    probe: &dyn TaskProbe,
    config_path: &Path,
    loaded: &std::result::Result<LoadedConfig, String>,
) -> Vec<Check> {
    let mut checks = Vec::new();

    let task_ok = probe.is_available();
    if task_ok {
        match probe.version() {
            Ok(version) => checks.push(Check::pass("task program", format!("{} {}", TASK_PROGRAM, version))),
            Err(err) => checks.push(Check::fail("task program", err.to_string())),
        }
    } else {
        checks.push(Check::fail(
            "task program",
            format!("`{}` was not found on PATH", TASK_PROGRAM),
        ));
    }

    match loaded {
        Ok(loaded) => {
            let detail = if loaded.warnings.is_empty() {
                format!("loaded {}", config_path.display())
            } else {
                format!(
                    "loaded {} with {} warning(s): {}",
                    config_path.display(),
                    loaded.warnings.len(),
                    loaded.warnings.join(", ")
                )
            };
            checks.push(Check::pass("config", detail));

            let config = &loaded.config;
            if !config.settings.enable_llm {
                checks.push(Check::skipped(
                    "llm provider",
                    "disabled (settings.enable_llm: false)",
                ));
            } else {
                match LlmProvider::from_settings(&config.llm) {
                    Ok(provider) => checks.push(Check::pass(
                        "llm provider",
                        format!(
                            "{} model={} endpoint={}",
                            provider.name(),
                            provider.model(),
                            provider.endpoint()
                        ),
                    )),
                    Err(err) => checks.push(Check::fail("llm provider", err.to_string())),
                }
            }
        }
        Err(message) => {
            checks.push(Check::fail("config", message.clone()));
            checks.push(Check::skipped("llm provider", "config did not load"));
        }
    }

    for (name, label) in [("goal", "uda goal"), ("skipped", "uda skipped")] {
        if !task_ok {
            checks.push(Check::skipped(label, "task program unavailable"));
            continue;
        }
        match probe.uda_type(name) {
            Ok(Some(kind)) => checks.push(Check::pass(label, format!("defined ({})", kind))),
            Ok(None) => checks.push(Check::fail(
                label,
                "not defined; run `vanguard init` to add it",
            )),
            Err(err) => checks.push(Check::fail(label, err.to_string())),
        }
    }

    checks
}

/// Prints one line per check; returns whether every check passed.
pub(crate) fn report(io: &mut dyn Io, checks: &[Check]) -> Result<bool> {
    for check in checks {
        let line = match &check.outcome {
            Outcome::Pass(detail) => format!("{} {}: {}", theme::success("✓"), check.name, detail),
            Outcome::Fail(detail) => format!("{} {}: {}", theme::error("✗"), check.name, detail),
            Outcome::Skipped(detail) => format!("{} {}: {}", theme::faint("-"), check.name, detail),
        };
        say(io, &line)?;
    }
    Ok(!checks.iter().any(Check::failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, Config};
    use crate::interact::TestIo;
    use crate::test_support::plain_output;
    use std::collections::BTreeMap;

    struct Probe {
        available: bool,
        udas: BTreeMap<&'static str, &'static str>,
    }

    impl TaskProbe for Probe {
        fn is_available(&self) -> bool {
            self.available
        }

        fn version(&self) -> Result<String> {
            Ok("3.0.2".to_string())
        }

        fn uda_type(&self, name: &str) -> Result<Option<String>> {
            Ok(self.udas.get(name).map(|kind| kind.to_string()))
        }
    }

    fn configured() -> std::result::Result<LoadedConfig, String> {
        load_config_from_str("llm:\n  api_key: sk-test\n", Path::new("c.yml"))
    }

    #[test]
    fn healthy_setup_passes_every_check() {
        plain_output();
        let probe = Probe {
            available: true,
            udas: BTreeMap::from([("goal", "string"), ("skipped", "numeric")]),
        };
        let checks = run_checks(&probe, Path::new("c.yml"), &configured());
        let mut io = TestIo::new(&[]);
        assert!(report(&mut io, &checks).expect("report"));
        assert!(io.stdout.contains("✓ task program: task 3.0.2"));
        assert!(io.stdout.contains(
            "✓ llm provider: openai model=gpt-4o-mini endpoint=https://api.openai.com/v1/chat/completions"
        ));
        assert!(io.stdout.contains("✓ uda skipped: defined (numeric)"));
    }

    #[test]
    fn missing_udas_and_key_fail() {
        plain_output();
        let probe = Probe {
            available: true,
            udas: BTreeMap::from([("goal", "string")]),
        };
        let loaded = Ok(LoadedConfig {
            config: Config::default(),
            warnings: Vec::new(),
        });
        let checks = run_checks(&probe, Path::new("c.yml"), &loaded);
        let failed: Vec<&str> = checks.iter().filter(|c| c.failed()).map(|c| c.name).collect();
        assert_eq!(failed, vec!["llm provider", "uda skipped"]);

        let mut io = TestIo::new(&[]);
        assert!(!report(&mut io, &checks).expect("report"));
    }

    #[test]
    fn missing_task_program_skips_uda_checks() {
        let probe = Probe {
            available: false,
            udas: BTreeMap::new(),
        };
        let checks = run_checks(&probe, Path::new("c.yml"), &Err("Failed to read config".to_string()));
        assert!(checks[0].failed());
        assert!(checks[1].failed());
        assert_eq!(
            checks[2].outcome,
            Outcome::Skipped("config did not load".to_string())
        );
        assert!(checks[3..]
            .iter()
            .all(|check| matches!(check.outcome, Outcome::Skipped(_))));
    }
}
