use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

use crate::app::{resolve_config_path, run_with_args};
use crate::config::default_config_path;
use crate::logger::Logger;
use crate::task_types::ItemRef;
use crate::taskwarrior::{TaskCli, TaskStore};

pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());
static ORIGINAL_PATH: OnceLock<Option<OsString>> = OnceLock::new();
static ORIGINAL_HOME: OnceLock<Option<OsString>> = OnceLock::new();

pub(crate) fn reset_test_env() {
    let original_path = ORIGINAL_PATH.get_or_init(|| env::var_os("PATH"));
    match original_path {
        Some(value) => env::set_var("PATH", value),
        None => env::remove_var("PATH"),
    }
    let original_home = ORIGINAL_HOME.get_or_init(|| env::var_os("HOME"));
    match original_home {
        Some(value) => env::set_var("HOME", value),
        None => env::remove_var("HOME"),
    }
    for key in [
        "TASK_MOCK_LOG",
        "TASK_MOCK_EXPORT",
        "TASK_MOCK_EXIT",
        "TASK_MOCK_UDAS",
        "TASK_MOCK_NEXT_ID",
        "VANGUARD_CONFIG",
        "TASKRC",
    ] {
        env::remove_var(key);
    }
}

fn fixture(parts: &[&str]) -> PathBuf {
    parts
        .iter()
        .fold(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures"), |path, part| {
            path.join(part)
        })
}

/// Puts the fake `task` first on PATH and points its argv log at `temp`.
fn use_fake_task(temp: &TempDir) -> PathBuf {
    let old_path = env::var("PATH").unwrap_or_default();
    env::set_var(
        "PATH",
        format!("{}:{}", fixture(&["bin"]).display(), old_path),
    );
    let calls = temp.path().join("task-calls.log");
    env::set_var("TASK_MOCK_LOG", &calls);
    calls
}

fn recorded_calls(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn args(values: &[&str]) -> Vec<OsString> {
    std::iter::once("vanguard")
        .chain(values.iter().copied())
        .map(OsString::from)
        .collect()
}

fn write_config(temp: &TempDir, body: &str) -> PathBuf {
    let path = temp.path().join("config.yml");
    fs::write(&path, body).expect("write config");
    path
}

#[cfg(unix)]
#[test]
fn task_cli_speaks_the_task_program_argv_shapes() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    let calls = use_fake_task(&temp);
    env::set_var("TASK_MOCK_NEXT_ID", "12");

    let logger = Logger::disabled();
    let task = TaskCli::new(&logger);
    assert!(task.is_available());
    assert_eq!(task.version().expect("version"), "3.0.2");

    let (output, id) = task
        .add(&["Call the bank".to_string(), "+sb".to_string()])
        .expect("add");
    assert_eq!(id, 12);
    assert!(output.contains("Created task 12."));

    let target = ItemRef::from(12);
    task.modify(&target, &["goal:abc".to_string()]).expect("modify");
    task.annotate(&target, "● Tip: go early").expect("annotate");
    task.start(&target).expect("start");
    task.delete(&target).expect("delete");

    assert_eq!(
        recorded_calls(&calls),
        vec![
            "--version",
            "add Call the bank +sb",
            "rc.confirmation=off 12 modify goal:abc",
            "12 annotate ● Tip: go early",
            "12 start",
            "rc.confirmation=off 12 delete",
        ]
    );
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn task_cli_decodes_exports_listings_and_udas() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    let calls = use_fake_task(&temp);
    let logger = Logger::disabled();
    let task = TaskCli::new(&logger);

    env::set_var("TASK_MOCK_EXPORT", fixture(&["export", "goals.json"]));
    let pending = task.pending(&["project:goals".to_string()]).expect("export");
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].urgency, 6.2);
    assert_eq!(pending[1].skipped, 2);
    assert_eq!(
        pending[1].linked_goal(),
        Some("0f4e6b0a-1111-4c2e-9a55-000000000001")
    );

    env::set_var("TASK_MOCK_EXPORT", fixture(&["export", "single.json"]));
    let item = task
        .get(&ItemRef::from(4))
        .expect("get")
        .expect("item exists");
    assert_eq!(item.annotations[0].description, "chapter 3");

    assert_eq!(task.projects().expect("projects"), vec!["home", "work"]);
    assert_eq!(task.tags().expect("tags").len(), 2);
    assert_eq!(
        task.uda_type("skipped").expect("uda").as_deref(),
        Some("numeric")
    );
    env::set_var("TASK_MOCK_UDAS", "");
    assert!(task.uda_type("goal").expect("uda").is_none());

    let recorded = recorded_calls(&calls);
    assert_eq!(recorded[0], "status:pending project:goals export");
    assert_eq!(recorded[1], "4 export");
    assert!(recorded.contains(&"rc.verbose=nothing projects".to_string()));
    assert!(recorded.contains(&"_get rc.uda.goal.type".to_string()));
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn failing_task_call_reports_rendered_command() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    use_fake_task(&temp);
    env::set_var("TASK_MOCK_EXIT", "2");
    let logger = Logger::disabled();
    let task = TaskCli::new(&logger);

    let err = task
        .modify(&ItemRef::from(3), &["it's done".to_string()])
        .expect_err("non-zero exit");
    let message = err.to_string();
    assert!(
        message.contains("task rc.confirmation=off 3 modify 'it'\\''s done'"),
        "got: {message}"
    );
    assert!(message.contains("exit code 2"), "got: {message}");
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn logger_records_task_calls_and_quit_reason() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    use_fake_task(&temp);
    env::set_var("HOME", temp.path());
    env::set_var("TASK_MOCK_EXPORT", fixture(&["export", "single.json"]));
    let log_path = temp.path().join("vanguard.log");
    let config = write_config(
        &temp,
        &format!("settings:\n  log_path: {}\n", log_path.display()),
    );

    run_with_args(args(&["-c", config.to_str().expect("utf8"), "goals", "modify", "4", "priority:H"]))
        .expect_err("task 4 is not a goal");

    let log = fs::read_to_string(&log_path).expect("read log");
    let messages: Vec<&str> = log
        .lines()
        .map(|line| line.split_once(' ').map(|x| x.1).unwrap_or(""))
        .collect();
    assert!(messages.contains(&"cmd start label=export program=task args=4 export"));
    assert!(messages.contains(&"cmd exit label=export exit=0"));
    assert!(
        messages.iter().any(|m| m.starts_with("quit reason=4 is not a goal")),
        "log: {log}"
    );
    reset_test_env();
}

#[test]
fn no_arguments_prints_hint_and_fails() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let quit = run_with_args(args(&[])).expect_err("no command");
    assert_eq!(quit.code, 1);
    assert_eq!(quit.reason, "no_command");
}

#[test]
fn run_with_args_returns_quit_on_cli_parse_failure() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let quit = run_with_args(args(&["--definitely-not-a-flag"])).expect_err("parse error");
    assert_eq!(quit.reason, "cli_parse");
    assert!(quit.code > 0);
}

#[test]
fn missing_config_points_at_init() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    env::set_var("HOME", temp.path());

    let quit = run_with_args(args(&["goals", "list"])).expect_err("missing config");
    assert_eq!(quit.code, 1);
    assert!(quit.reason.contains("vanguard init"), "got: {}", quit.reason);
    assert!(quit.reason.contains(&default_config_path(temp.path()).display().to_string()));
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn missing_task_program_is_a_setup_failure() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    env::set_var("HOME", temp.path());
    env::set_var("PATH", temp.path());
    let config = write_config(&temp, "settings:\n  debug: false\n");

    let quit = run_with_args(args(&["-c", config.to_str().expect("utf8"), "goals", "list"]))
        .expect_err("no task binary");
    assert_eq!(quit.code, 1);
    assert!(quit.reason.contains("not found on PATH"), "got: {}", quit.reason);
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn llm_commands_require_a_key_before_touching_tasks() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    let calls = use_fake_task(&temp);
    env::set_var("HOME", temp.path());
    let config = write_config(&temp, "llm:\n  api_key: \"<api key>\"\n");

    let quit = run_with_args(args(&["-c", config.to_str().expect("utf8"), "add", "buy", "milk"]))
        .expect_err("placeholder key");
    assert_eq!(quit.code, 1);
    assert!(quit.reason.contains("API key"), "got: {}", quit.reason);
    assert!(recorded_calls(&calls).is_empty());

    // Goal management works without a key.
    run_with_args(args(&["-c", config.to_str().expect("utf8"), "goals", "list"]))
        .expect("goals list");
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn unknown_subcommands_forward_with_exit_code() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    let calls = use_fake_task(&temp);
    env::set_var("TASK_MOCK_EXIT", "3");

    let quit = run_with_args(args(&["list", "project:home", "+next"])).expect_err("exit 3");
    assert_eq!(quit.code, 3);
    assert_eq!(recorded_calls(&calls), vec!["list project:home +next"]);

    env::set_var("TASK_MOCK_EXIT", "0");
    run_with_args(args(&["5", "done"])).expect("forwarded");
    assert_eq!(recorded_calls(&calls)[1], "5 done");
    reset_test_env();
}

#[cfg(unix)]
#[test]
fn doctor_fails_when_attributes_are_missing() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    use_fake_task(&temp);
    env::set_var("HOME", temp.path());
    let config = write_config(&temp, "llm:\n  api_key: sk-test\n");
    let config_arg = config.to_str().expect("utf8");

    run_with_args(args(&["-c", config_arg, "doctor"])).expect("healthy doctor");

    env::set_var("TASK_MOCK_UDAS", "goal");
    let quit = run_with_args(args(&["-c", config_arg, "doctor"])).expect_err("skipped missing");
    assert_eq!(quit.code, 1);
    assert_eq!(quit.reason, "doctor_failed");
    reset_test_env();
}

#[test]
fn config_path_precedence() {
    let home = Path::new("/home/me");
    assert_eq!(
        resolve_config_path(
            Some(PathBuf::from("/flag.yml")),
            Some(OsString::from("/env.yml")),
            home
        ),
        PathBuf::from("/flag.yml")
    );
    assert_eq!(
        resolve_config_path(None, Some(OsString::from("/env.yml")), home),
        PathBuf::from("/env.yml")
    );
    assert_eq!(
        resolve_config_path(None, None, home),
        home.join(".config").join("vanguard").join("config.yml")
    );
}

#[test]
fn vanguard_config_env_is_honored() {
    let _guard = ENV_MUTEX.lock().unwrap();
    reset_test_env();
    let temp = TempDir::new().expect("temp dir");
    env::set_var("HOME", temp.path());
    let missing = temp.path().join("elsewhere.yml");
    env::set_var("VANGUARD_CONFIG", &missing);

    let quit = run_with_args(args(&["goals", "list"])).expect_err("missing config");
    assert!(quit.reason.contains("elsewhere.yml"), "got: {}", quit.reason);
    reset_test_env();
}
