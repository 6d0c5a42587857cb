/// Structured view of a free-form task command line such as
/// `buy milk +errand project:home priority:h`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParsedCommand {
    pub(crate) title: String,
    pub(crate) tags: Vec<String>,
    pub(crate) project: String,
    pub(crate) priority: String,
}

fn abbreviates(key: &str, full: &str) -> bool {
    full.starts_with(key)
}

/// Never fails: every whitespace-separated token is either a `+tag`, a
/// `key:value` pair, or a title word. Unrecognized `key:value` tokens are
/// dropped.
pub(crate) fn parse(raw: &str) -> ParsedCommand {
    let mut parsed = ParsedCommand::default();
    let mut title_words: Vec<&str> = Vec::new();

    for token in raw.split_whitespace() {
        if let Some(tag) = token.strip_prefix('+') {
            parsed.tags.push(tag.to_string());
        } else if let Some((key, value)) = token.split_once(':') {
            let key = key.to_lowercase();
            if abbreviates(&key, "priority") {
                parsed.priority = value.to_uppercase();
            } else if abbreviates(&key, "project") {
                parsed.project = value.to_string();
            }
        } else {
            title_words.push(token);
        }
    }

    parsed.title = title_words.join(" ");
    parsed
}
