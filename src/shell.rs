use shell_escape::unix::escape;
use std::env;
use std::process::{Command, Stdio};

use crate::error::{Result, VanguardError};
use crate::logger::{sanitize_log_value, Logger};

pub(crate) fn render_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn render_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        return program.to_string();
    }
    format!("{} {}", program, render_args(args))
}

#[derive(Debug)]
pub(crate) struct CommandResult {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) exit_code: i32,
}

impl CommandResult {
    pub(crate) fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub(crate) fn combined_output(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Runs `program args...` without a shell and captures both streams.
pub(crate) fn run_capture(
    program: &str,
    args: &[String],
    log_label: &str,
    logger: &Logger,
) -> Result<CommandResult> {
    logger.log_event(&format!(
        "cmd start label={} program={} args={}",
        log_label,
        program,
        sanitize_log_value(&render_args(args))
    ));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| VanguardError::ExternalCall {
            command: render_command(program, args),
            detail: format!("failed to start: {}", err),
            output: String::new(),
        })?;

    let exit_code = output.status.code().unwrap_or(1);
    logger.log_event(&format!("cmd exit label={} exit={}", log_label, exit_code));

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code,
    })
}

/// Runs `program args...` attached to the terminal and returns its exit code.
pub(crate) fn run_inherit(
    program: &str,
    args: &[String],
    log_label: &str,
    logger: &Logger,
) -> Result<i32> {
    logger.log_event(&format!(
        "cmd start label={} program={} args={}",
        log_label,
        program,
        sanitize_log_value(&render_args(args))
    ));

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|err| VanguardError::ExternalCall {
            command: render_command(program, args),
            detail: format!("failed to start: {}", err),
            output: String::new(),
        })?;

    let exit_code = status.code().unwrap_or(1);
    logger.log_event(&format!("cmd exit label={} exit={}", log_label, exit_code));
    Ok(exit_code)
}

/// Runs one edited command line through `bash -c`, capturing its output.
pub(crate) fn run_shell_line(line: &str, log_label: &str, logger: &Logger) -> Result<CommandResult> {
    let args = vec!["-c".to_string(), line.to_string()];
    run_capture("bash", &args, log_label, logger)
}

pub(crate) fn command_exists(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|path| {
        let full = path.join(name);
        full.is_file() || full.is_symlink()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_args_escapes_shell_metacharacters() {
        let args = vec![
            "modify".to_string(),
            "7".to_string(),
            "Call the bank".to_string(),
            "+sb".to_string(),
            "it's".to_string(),
        ];
        assert_eq!(render_args(&args), "modify 7 'Call the bank' +sb 'it'\\''s'");
        assert_eq!(render_command("task", &[]), "task");
    }

    #[test]
    fn combined_output_joins_streams() {
        let result = CommandResult {
            stdout: "out".to_string(),
            stderr: "err\n".to_string(),
            exit_code: 2,
        };
        assert_eq!(result.combined_output(), "out\nerr\n");
        assert!(!result.success());
    }

    #[test]
    fn missing_program_is_an_external_call_error() {
        let err = run_capture(
            "vanguard-definitely-missing-binary",
            &["x".to_string()],
            "test",
            &Logger::disabled(),
        )
        .expect_err("should fail to start");
        match err {
            VanguardError::ExternalCall { command, .. } => {
                assert_eq!(command, "vanguard-definitely-missing-binary x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
