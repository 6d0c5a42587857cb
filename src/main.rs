use std::process::ExitCode;

mod analyzer;
mod app;
mod argparse;
mod cli;
mod commands;
mod config;
mod context;
mod doctor;
mod error;
mod filter;
mod goals;
mod init;
mod interact;
mod llm;
mod logger;
mod prompts;
mod shell;
mod suggestion;
mod task_types;
mod taskwarrior;
mod theme;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod unit_tests;

fn main() -> ExitCode {
    app::main()
}
