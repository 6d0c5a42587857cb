use colored::Colorize;

pub(crate) fn title(text: &str) -> String {
    text.bold().bright_white().to_string()
}

pub(crate) fn info(text: &str) -> String {
    text.cyan().to_string()
}

pub(crate) fn success(text: &str) -> String {
    text.green().to_string()
}

pub(crate) fn warn(text: &str) -> String {
    text.yellow().to_string()
}

pub(crate) fn error(text: &str) -> String {
    text.red().to_string()
}

pub(crate) fn faint(text: &str) -> String {
    text.dimmed().bright_black().to_string()
}

pub(crate) const RULE: &str = "───────────────────────────────────────────────";

/// Framed section header.
pub(crate) fn banner(heading: &str) -> String {
    format!(
        "\n{}\n{}\n{}",
        title(RULE),
        title(&format!("          {}", heading)),
        title(RULE)
    )
}
