use std::io::{self, IsTerminal, Write};

#[cfg(test)]
use std::collections::VecDeque;

use crate::error::{Result, VanguardError};

pub(crate) trait Io {
    fn write_out(&mut self, s: &str) -> Result<()>;
    fn write_err(&mut self, s: &str) -> Result<()>;
    fn flush_out(&mut self) -> Result<()>;
    /// `None` on end of input.
    fn read_line(&mut self) -> Result<Option<String>>;
}

pub(crate) struct TerminalIo {
    stdin: io::Stdin,
    stdout: io::Stdout,
    stderr: io::Stderr,
}

impl TerminalIo {
    pub(crate) fn new() -> Self {
        Self {
            stdin: io::stdin(),
            stdout: io::stdout(),
            stderr: io::stderr(),
        }
    }
}

impl Io for TerminalIo {
    fn write_out(&mut self, s: &str) -> Result<()> {
        self.stdout
            .write_all(s.as_bytes())
            .map_err(|err| VanguardError::Interaction(format!("Failed to write stdout: {}", err)))
    }

    fn write_err(&mut self, s: &str) -> Result<()> {
        self.stderr
            .write_all(s.as_bytes())
            .map_err(|err| VanguardError::Interaction(format!("Failed to write stderr: {}", err)))
    }

    fn flush_out(&mut self) -> Result<()> {
        self.stdout
            .flush()
            .map_err(|err| VanguardError::Interaction(format!("Failed to flush stdout: {}", err)))
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let bytes = self
            .stdin
            .read_line(&mut input)
            .map_err(|err| VanguardError::Interaction(format!("Failed to read input: {}", err)))?;
        if bytes == 0 {
            Ok(None)
        } else {
            Ok(Some(input))
        }
    }
}

pub(crate) fn is_interactive_terminal() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

#[cfg(test)]
pub(crate) struct TestIo {
    inputs: VecDeque<String>,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

#[cfg(test)]
impl TestIo {
    pub(crate) fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|line| format!("{}\n", line)).collect(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[cfg(test)]
impl Io for TestIo {
    fn write_out(&mut self, s: &str) -> Result<()> {
        self.stdout.push_str(s);
        Ok(())
    }

    fn write_err(&mut self, s: &str) -> Result<()> {
        self.stderr.push_str(s);
        Ok(())
    }

    fn flush_out(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.inputs.pop_front())
    }
}

/// Prints `prompt` and reads one trimmed answer.
pub(crate) fn ask(io: &mut dyn Io, prompt: &str) -> Result<Option<String>> {
    io.write_out(prompt)?;
    io.flush_out()?;
    Ok(io.read_line()?.map(|line| line.trim().to_string()))
}

pub(crate) fn say(io: &mut dyn Io, line: &str) -> Result<()> {
    io.write_out(line)?;
    io.write_out("\n")
}

/// Answer to a `[y]es/[N]o/[a]ll/[q]uit` question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Choice {
    Yes,
    No,
    All,
    Quit,
}

impl Choice {
    pub(crate) fn parse(answer: Option<&str>) -> Self {
        let Some(answer) = answer else {
            return Self::Quit;
        };
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Self::Yes,
            "a" | "all" => Self::All,
            "q" | "quit" => Self::Quit,
            _ => Self::No,
        }
    }
}

pub(crate) fn ask_choice(io: &mut dyn Io, question: &str) -> Result<Choice> {
    let answer = ask(io, &format!("{} [y]es/[N]o/[a]ll/[q]uit: ", question))?;
    Ok(Choice::parse(answer.as_deref()))
}

/// Plain yes/no question; `default` applies to an empty answer or end of input.
pub(crate) fn confirm(io: &mut dyn Io, question: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = ask(io, &format!("{} {}: ", question, hint))?;
    Ok(match answer.as_deref().map(str::to_lowercase).as_deref() {
        Some("y") | Some("yes") => true,
        Some("n") | Some("no") => false,
        _ => default,
    })
}
