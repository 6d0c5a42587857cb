use std::collections::BTreeMap;

use crate::config::Filters;
use crate::task_types::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterMode {
    Blacklist,
    Whitelist,
    Off,
}

impl FilterMode {
    fn parse(mode: &str) -> Self {
        match mode.to_lowercase().as_str() {
            "blacklist" => Self::Blacklist,
            "whitelist" => Self::Whitelist,
            _ => Self::Off,
        }
    }

    fn admits(self, listed: bool) -> bool {
        match self {
            Self::Blacklist => !listed,
            Self::Whitelist => listed,
            Self::Off => true,
        }
    }
}

fn listed(value: &str, list: &[String]) -> bool {
    let value = value.to_lowercase();
    list.iter().any(|entry| entry.to_lowercase() == value)
}

pub(crate) fn include_project(project: &str, filters: &Filters) -> bool {
    if filters.project_filter_projects.is_empty() {
        return true;
    }
    let listed = listed(project, &filters.project_filter_projects);
    FilterMode::parse(&filters.project_filter_mode).admits(listed)
}

/// Any overlap between `tags` and the filter list counts as listed.
pub(crate) fn include_tags<S: AsRef<str>>(tags: &[S], filters: &Filters) -> bool {
    if filters.tag_filter_tags.is_empty() {
        return true;
    }
    let overlap = tags
        .iter()
        .any(|tag| listed(tag.as_ref(), &filters.tag_filter_tags));
    FilterMode::parse(&filters.tag_filter_mode).admits(overlap)
}

pub(crate) fn include_tag(tag: &str, filters: &Filters) -> bool {
    include_tags(&[tag], filters)
}

pub(crate) fn should_include<S: AsRef<str>>(tags: &[S], project: &str, filters: &Filters) -> bool {
    include_project(project, filters) && include_tags(tags, filters)
}

pub(crate) fn include_item(item: &Item, filters: &Filters) -> bool {
    should_include(&item.tags, item.project.as_deref().unwrap_or(""), filters)
}

pub(crate) fn filter_items(items: Vec<Item>, filters: &Filters) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| include_item(item, filters))
        .collect()
}

pub(crate) fn filter_projects(projects: Vec<String>, filters: &Filters) -> Vec<String> {
    projects
        .into_iter()
        .filter(|project| include_project(project, filters))
        .collect()
}

pub(crate) fn filter_tag_counts(
    tags: BTreeMap<String, u64>,
    filters: &Filters,
) -> BTreeMap<String, u64> {
    tags.into_iter()
        .filter(|(tag, _)| include_tag(tag, filters))
        .collect()
}
