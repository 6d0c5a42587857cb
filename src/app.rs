use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::{AddArgs, Cli, CliCommand};
use crate::commands::add::run_add;
use crate::commands::analyze::{run_analyze, AnalyzeMode, ShellEditBackend};
use crate::commands::goals::{run_goals, GoalAction};
use crate::commands::spot::{run_spot, SpotOptions};
use crate::commands::Session;
use crate::config::{default_config_path, load_config, Config};
use crate::context::{default_state_path, ContextCache};
use crate::doctor::{report, run_checks};
use crate::error::{Result, VanguardError};
use crate::filter::filter_tag_counts;
use crate::init::{run_init, taskrc_path};
use crate::interact::{is_interactive_terminal, TerminalIo};
use crate::llm::{HttpChatClient, LlmProvider};
use crate::logger::{sanitize_log_value, Logger};
use crate::taskwarrior::{TaskCli, TaskStore, TASK_PROGRAM};
use crate::theme;

const CONFIG_ENV: &str = "VANGUARD_CONFIG";

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code.clamp(0, 255) as u8)
    }
}

pub(crate) fn quit(logger: &Logger, reason: &str, code: i32) -> Quit {
    let sanitized = if reason.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitize_log_value(reason)
    };
    logger.log_event(&format!("quit reason={}", sanitized));
    Quit {
        code,
        reason: reason.to_string(),
    }
}

fn home_dir() -> std::result::Result<PathBuf, String> {
    env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| "Missing HOME environment variable".to_string())
}

/// `--config`, then `$VANGUARD_CONFIG`, then the default location.
pub(crate) fn resolve_config_path(
    flag: Option<PathBuf>,
    env_value: Option<OsString>,
    home: &Path,
) -> PathBuf {
    flag.or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| default_config_path(home))
}

fn expand_home(raw: &str, home: &Path) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(raw),
    }
}

fn usage_hint() -> String {
    "Usage: vanguard <add|analyze|spot|goals|init|doctor> [ARGS]...\n\
Anything else is passed to `task`, e.g. `vanguard list`.\n\
Run `vanguard --help` for details."
        .to_string()
}

fn missing_config_error(config_path: &Path) -> VanguardError {
    VanguardError::Setup(format!(
        "Missing config file: {}\n\n\
To generate one, run:\n\
  vanguard init\n\n\
or point to an existing file with --config PATH.",
        config_path.display()
    ))
}

fn load_required_config(config_path: &Path) -> Result<Config> {
    if !config_path.is_file() {
        return Err(missing_config_error(config_path));
    }
    load_config(config_path)
        .map(|loaded| loaded.config)
        .map_err(VanguardError::Config)
}

fn require_task_program(task: &TaskCli<'_>) -> Result<()> {
    if task.is_available() {
        return Ok(());
    }
    Err(VanguardError::Setup(format!(
        "The `{}` program was not found on PATH. Install it before using vanguard.",
        TASK_PROGRAM
    )))
}

fn build_chat_client<'a>(config: &Config, logger: &'a Logger) -> Result<HttpChatClient<'a>> {
    if !config.settings.enable_llm {
        return Err(VanguardError::Setup(
            "LLM features are disabled (settings.enable_llm: false).".to_string(),
        ));
    }
    let provider = LlmProvider::from_settings(&config.llm)?;
    Ok(HttpChatClient::new(provider, config.llm.timeout_secs, logger))
}

/// Merges task-program tags into the config when `auto_import_tags` is on.
fn import_tags<S: TaskStore>(config: &mut Config, store: &S) -> Result<()> {
    if !config.settings.auto_import_tags {
        return Ok(());
    }
    let tags = filter_tag_counts(store.tags()?, &config.filters);
    config.merge_imported_tags(tags.into_keys());
    Ok(())
}

fn print_error(err: &VanguardError) {
    eprintln!("{}", theme::error(&err.to_string()));
    if let Some(raw) = err.raw_response() {
        eprintln!("{}", theme::faint("Raw response:"));
        eprintln!("{}", raw);
    }
}

fn fail(logger: &Logger, err: VanguardError) -> Quit {
    print_error(&err);
    quit(logger, &err.to_string(), 1)
}

/// Loads the config, checks for the task program, then runs `body` with the
/// pieces every task-backed command shares.
fn with_session<F>(config_path: &Path, home: &Path, body: F) -> std::result::Result<(), Quit>
where
    F: FnOnce(&mut Config, &TaskCli<'_>, &Logger, &mut TerminalIo) -> Result<()>,
{
    let mut config =
        load_required_config(config_path).map_err(|err| fail(&Logger::disabled(), err))?;
    let logger = Logger::from_settings(
        config.settings.log_path.as_deref(),
        home,
        config.settings.debug,
    );
    let store = TaskCli::new(&logger);
    require_task_program(&store).map_err(|err| fail(&logger, err))?;
    let mut io = TerminalIo::new();
    body(&mut config, &store, &logger, &mut io).map_err(|err| fail(&logger, err))
}

fn run_add_command(add: AddArgs, config_path: &Path, home: &Path) -> std::result::Result<(), Quit> {
    with_session(config_path, home, |config, store, logger, io| {
        config.apply_overrides(add.overrides());
        let chat = build_chat_client(config, logger)?;
        import_tags(config, store)?;
        let session = Session::new(config, store, logger);
        run_add(&session, &chat, io, &add.args)
    })
}

fn run_analyze_command(
    filter: Vec<String>,
    mode: AnalyzeMode,
    config_path: &Path,
    home: &Path,
) -> std::result::Result<(), Quit> {
    with_session(config_path, home, |config, store, logger, io| {
        let chat = build_chat_client(config, logger)?;
        import_tags(config, store)?;
        let session = Session::new(config, store, logger);
        let backend = ShellEditBackend { logger };
        run_analyze(&session, &chat, io, &filter, mode, &backend)
    })
}

fn run_spot_command(
    options: SpotOptions,
    config_path: &Path,
    home: &Path,
) -> std::result::Result<(), Quit> {
    with_session(config_path, home, |config, store, logger, io| {
        let chat = build_chat_client(config, logger)?;
        import_tags(config, store)?;
        let state_path = config
            .settings
            .state_path
            .as_deref()
            .map(|raw| expand_home(raw, home))
            .unwrap_or_else(|| default_state_path(home));
        let cache = ContextCache::new(state_path, config.ttl_minutes());
        let session = Session::new(config, store, logger);
        run_spot(&session, &chat, io, &cache, &options)
    })
}

fn run_goals_command(
    action: GoalAction,
    config_path: &Path,
    home: &Path,
) -> std::result::Result<(), Quit> {
    with_session(config_path, home, |config, store, logger, io| {
        let session = Session::new(config, store, logger);
        run_goals(&session, io, &action)
    })
}

fn run_init_command(config_path: &Path, home: &Path) -> std::result::Result<(), Quit> {
    let logger = Logger::disabled();
    if !is_interactive_terminal() {
        let message =
            "vanguard init requires an interactive terminal (stdin and stdout must be a TTY)."
                .to_string();
        eprintln!("{}", message);
        return Err(quit(&logger, &message, 1));
    }
    let taskrc = taskrc_path(env::var_os("TASKRC"), home);
    let mut io = TerminalIo::new();
    run_init(&mut io, config_path, &taskrc)
        .map(|_| ())
        .map_err(|err| fail(&logger, err))
}

fn run_doctor_command(config_path: &Path, home: &Path) -> std::result::Result<(), Quit> {
    let loaded = load_config(config_path);
    let logger = match &loaded {
        Ok(loaded) => Logger::from_settings(
            loaded.config.settings.log_path.as_deref(),
            home,
            loaded.config.settings.debug,
        ),
        Err(_) => Logger::disabled(),
    };
    let task = TaskCli::new(&logger);
    let checks = run_checks(&task, config_path, &loaded);
    let mut io = TerminalIo::new();
    match report(&mut io, &checks) {
        Ok(true) => Ok(()),
        Ok(false) => Err(quit(&logger, "doctor_failed", 1)),
        Err(err) => Err(fail(&logger, err)),
    }
}

fn run_forward(args: &[String]) -> std::result::Result<(), Quit> {
    let logger = Logger::disabled();
    let task = TaskCli::new(&logger);
    require_task_program(&task).map_err(|err| fail(&logger, err))?;
    match task.forward(args) {
        Ok(0) => Ok(()),
        Ok(code) => Err(Quit {
            code,
            reason: format!("forwarded command exited with {}", code),
        }),
        Err(err) => Err(fail(&logger, err)),
    }
}

pub(crate) fn run_with_cli(cli: Cli) -> std::result::Result<(), Quit> {
    let Some(command) = cli.command else {
        eprintln!("{}", usage_hint());
        return Err(Quit {
            code: 1,
            reason: "no_command".to_string(),
        });
    };

    let home = home_dir().map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: message,
        }
    })?;
    let config_path = resolve_config_path(cli.config, env::var_os(CONFIG_ENV), &home);

    match command {
        CliCommand::Add(add) => run_add_command(add, &config_path, &home),
        CliCommand::Analyze { filter, mode } => {
            run_analyze_command(filter, mode, &config_path, &home)
        }
        CliCommand::Spot {
            filter,
            mood,
            location,
            refresh,
            no_prompt,
        } => {
            let options = SpotOptions {
                filter,
                mood,
                location,
                refresh,
                prompt: !no_prompt,
            };
            run_spot_command(options, &config_path, &home)
        }
        CliCommand::Goals { command } => run_goals_command(command.into(), &config_path, &home),
        CliCommand::Init => run_init_command(&config_path, &home),
        CliCommand::Doctor => run_doctor_command(&config_path, &home),
        // Forwarding never reads the config.
        CliCommand::External(args) => run_forward(&args),
    }
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> std::result::Result<(), Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // clap's `Error::print()` uses termcolor and can bypass Rust's test output
            // capturing. Rendering it ourselves keeps CLI errors capture-friendly.
            let code = err.exit_code();
            if code == 0 {
                // --help and --version
                println!("{err}");
                return Ok(());
            }
            eprintln!("{err}");
            return Err(Quit {
                code,
                reason: "cli_parse".to_string(),
            });
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    match run_with_args(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeStore;
    use std::collections::BTreeMap;

    #[test]
    fn imported_tags_respect_filters() {
        let mut store = FakeStore::new(Vec::new());
        store.tags = BTreeMap::from([("sb".to_string(), 2), ("private".to_string(), 1)]);
        let mut config = Config::default();
        config.settings.auto_import_tags = true;

        import_tags(&mut config, &store).expect("import");
        assert!(config.tags.contains_key("sb"));
        assert!(!config.tags.contains_key("private"));
    }

    #[test]
    fn import_is_skipped_unless_enabled() {
        let mut store = FakeStore::new(Vec::new());
        store.tags = BTreeMap::from([("sb".to_string(), 2)]);
        let mut config = Config::default();

        import_tags(&mut config, &store).expect("import");
        assert!(config.tags.is_empty());
    }

    #[test]
    fn expands_home_prefix_only() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_home("~/state/context.json", home),
            home.join("state/context.json")
        );
        assert_eq!(expand_home("/tmp/ctx.json", home), PathBuf::from("/tmp/ctx.json"));
    }
}
