use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::{Result, VanguardError};
use crate::llm::{ChatClient, ChatMessage, LlmError};
use crate::task_types::{Annotation, Item, ItemRef, TwTime};
use crate::taskwarrior::TaskStore;

/// In-memory task store; records every write as a rendered argv line.
#[derive(Debug, Default)]
pub(crate) struct FakeStore {
    pub(crate) items: RefCell<Vec<Item>>,
    pub(crate) calls: RefCell<Vec<String>>,
    pub(crate) udas: BTreeMap<String, String>,
    pub(crate) projects: Vec<String>,
    pub(crate) tags: BTreeMap<String, u64>,
    pub(crate) fail_modify_for: Option<String>,
    next_id: Cell<u32>,
}

impl FakeStore {
    pub(crate) fn new(items: Vec<Item>) -> Self {
        let next_id = items.iter().map(|item| item.id).max().unwrap_or(0) + 1;
        let mut udas = BTreeMap::new();
        udas.insert("goal".to_string(), "string".to_string());
        udas.insert("skipped".to_string(), "numeric".to_string());
        Self {
            items: RefCell::new(items),
            udas,
            next_id: Cell::new(next_id),
            ..Self::default()
        }
    }

    pub(crate) fn item(&self, id: u32) -> Item {
        self.items
            .borrow()
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .expect("item exists")
    }

    pub(crate) fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn position(&self, target: &ItemRef) -> Option<usize> {
        let items = self.items.borrow();
        items
            .iter()
            .position(|item| item.uuid == target.as_str() || item.id.to_string() == target.as_str())
    }

    fn matches(item: &Item, filter: &str) -> bool {
        match filter.split_once(':') {
            Some(("status", status)) => item.status == status,
            Some(("project", project)) => item.project_name() == project,
            Some(("goal", uuid)) => item.goal.as_deref() == Some(uuid),
            Some(_) => true,
            None if filter.starts_with('+') => item.tags.iter().any(|tag| *tag == filter[1..]),
            None => item.uuid == filter || item.id.to_string() == filter,
        }
    }

    fn apply_modify(item: &mut Item, args: &[String]) {
        let mut words = Vec::new();
        for arg in args {
            if let Some(tag) = arg.strip_prefix('+') {
                if !item.tags.iter().any(|t| t == tag) {
                    item.tags.push(tag.to_string());
                }
            } else if let Some((key, value)) = arg.split_once(':') {
                let value = (!value.is_empty()).then(|| value.to_string());
                match key {
                    "project" => item.project = value,
                    "priority" => item.priority = value,
                    "goal" => item.goal = value,
                    "skipped" => item.skipped = value.and_then(|v| v.parse().ok()).unwrap_or(0),
                    _ => {}
                }
            } else {
                words.push(arg.as_str());
            }
        }
        if !words.is_empty() {
            item.description = words.join(" ");
        }
    }
}

fn missing(target: &ItemRef) -> VanguardError {
    VanguardError::ExternalCall {
        command: format!("task {}", target),
        detail: "exit code 1".to_string(),
        output: "No matches.".to_string(),
    }
}

impl TaskStore for FakeStore {
    fn add(&self, args: &[String]) -> Result<(String, u32)> {
        self.calls.borrow_mut().push(format!("add {}", args.join(" ")));
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut item = Item {
            id,
            uuid: uuid_of(id),
            status: "pending".to_string(),
            ..Item::default()
        };
        Self::apply_modify(&mut item, args);
        self.items.borrow_mut().push(item);
        Ok((format!("Created task {}.", id), id))
    }

    fn modify(&self, target: &ItemRef, args: &[String]) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(format!("modify {} {}", target, args.join(" ")));
        if self.fail_modify_for.as_deref() == Some(target.as_str()) {
            return Err(VanguardError::ExternalCall {
                command: format!("task {} modify", target),
                detail: "exit code 2".to_string(),
                output: "locked".to_string(),
            });
        }
        let index = self.position(target).ok_or_else(|| missing(target))?;
        Self::apply_modify(&mut self.items.borrow_mut()[index], args);
        Ok(format!("Modifying task {}.", target))
    }

    fn annotate(&self, target: &ItemRef, text: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("annotate {} {}", target, text));
        let index = self.position(target).ok_or_else(|| missing(target))?;
        self.items.borrow_mut()[index].annotations.push(Annotation {
            entry: TwTime(chrono::Utc::now()),
            description: text.to_string(),
        });
        Ok(())
    }

    fn start(&self, target: &ItemRef) -> Result<()> {
        self.calls.borrow_mut().push(format!("start {}", target));
        self.position(target).map(|_| ()).ok_or_else(|| missing(target))
    }

    fn delete(&self, target: &ItemRef) -> Result<()> {
        self.calls.borrow_mut().push(format!("delete {}", target));
        let index = self.position(target).ok_or_else(|| missing(target))?;
        self.items.borrow_mut()[index].status = "deleted".to_string();
        Ok(())
    }

    fn export(&self, filter: &[String]) -> Result<Vec<Item>> {
        Ok(self
            .items
            .borrow()
            .iter()
            .filter(|item| filter.iter().all(|f| Self::matches(item, f)))
            .cloned()
            .collect())
    }

    fn projects(&self) -> Result<Vec<String>> {
        Ok(self.projects.clone())
    }

    fn tags(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self.tags.clone())
    }

    fn uda_type(&self, name: &str) -> Result<Option<String>> {
        Ok(self.udas.get(name).cloned())
    }
}

/// Stable, well-formed uuid for test item `id`.
pub(crate) fn uuid_of(id: u32) -> String {
    format!("00000000-0000-4000-8000-{:012}", id)
}

pub(crate) fn item(id: u32, description: &str, project: &str) -> Item {
    Item {
        id,
        uuid: uuid_of(id),
        description: description.to_string(),
        status: "pending".to_string(),
        project: (!project.is_empty()).then(|| project.to_string()),
        ..Item::default()
    }
}

/// Chat client replaying canned replies and recording every request.
#[derive(Debug, Default)]
pub(crate) struct StubChat {
    replies: RefCell<std::collections::VecDeque<std::result::Result<String, LlmError>>>,
    pub(crate) requests: RefCell<Vec<Vec<ChatMessage>>>,
}

impl StubChat {
    pub(crate) fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn push_reply(&self, reply: &str) {
        self.replies.borrow_mut().push_back(Ok(reply.to_string()));
    }

    pub(crate) fn push_error(&self, err: LlmError) {
        self.replies.borrow_mut().push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ChatClient for StubChat {
    fn chat(&self, messages: &[ChatMessage]) -> std::result::Result<String, LlmError> {
        self.requests.borrow_mut().push(messages.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

/// Disables ANSI colors so rendered output can be matched as plain text.
pub(crate) fn plain_output() {
    colored::control::set_override(false);
}
