use crate::config::Filters;
use crate::error::{ResolutionError, Result};
use crate::filter::filter_items;
use crate::task_types::{Item, ItemRef};
use crate::taskwarrior::TaskStore;

const GOAL_FIELD: &str = "goal";

/// The non-goal side of a resolved pair plus the goal it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkRoles {
    pub(crate) task: ItemRef,
    pub(crate) goal_uuid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Links {
    /// Items whose `goal` field points at this goal.
    Goal { goal: Item, tasks: Vec<Item> },
    /// The goal linked to a task, if any.
    Task { task: Item, goal: Option<Item> },
}

impl Links {
    pub(crate) fn linked(&self) -> Vec<&Item> {
        match self {
            Self::Goal { tasks, .. } => tasks.iter().collect(),
            Self::Task { goal, .. } => goal.iter().collect(),
        }
    }
}

/// Goals are ordinary items filed under the goal project. Nothing is cached:
/// every predicate is evaluated against a fresh export.
pub(crate) struct GoalLinker<'a, S: TaskStore> {
    store: &'a S,
    goal_project: &'a str,
}

impl<'a, S: TaskStore> GoalLinker<'a, S> {
    pub(crate) fn new(store: &'a S, goal_project: &'a str) -> Self {
        Self {
            store,
            goal_project,
        }
    }

    fn is_goal_item(&self, item: &Item) -> bool {
        item.project_name() == self.goal_project
    }

    fn fetch(&self, target: &ItemRef) -> Result<Item> {
        self.store.get(target)?.ok_or_else(|| {
            ResolutionError::NotFound {
                id: target.to_string(),
            }
            .into()
        })
    }

    pub(crate) fn is_goal(&self, target: &ItemRef) -> Result<bool> {
        Ok(self
            .store
            .get(target)?
            .is_some_and(|item| self.is_goal_item(&item)))
    }

    pub(crate) fn resolve_roles(&self, first: &ItemRef, second: &ItemRef) -> Result<LinkRoles> {
        let a = self.fetch(first)?;
        let b = self.fetch(second)?;
        let (task, goal) = match (self.is_goal_item(&a), self.is_goal_item(&b)) {
            (true, true) => {
                return Err(ResolutionError::BothAreGoals {
                    first: first.to_string(),
                    second: second.to_string(),
                }
                .into())
            }
            (false, false) => {
                return Err(ResolutionError::BothAreTasks {
                    first: first.to_string(),
                    second: second.to_string(),
                }
                .into())
            }
            (false, true) => (a, b),
            (true, false) => (b, a),
        };
        Ok(LinkRoles {
            task: task_ref(&task),
            goal_uuid: goal.uuid,
        })
    }

    pub(crate) fn link(&self, first: &ItemRef, second: &ItemRef) -> Result<LinkRoles> {
        let roles = self.resolve_roles(first, second)?;
        self.store.modify(
            &roles.task,
            &[format!("{}:{}", GOAL_FIELD, roles.goal_uuid)],
        )?;
        Ok(roles)
    }

    /// Clears the task side whether or not a link currently exists.
    pub(crate) fn unlink(&self, first: &ItemRef, second: &ItemRef) -> Result<LinkRoles> {
        let roles = self.resolve_roles(first, second)?;
        self.store.modify(&roles.task, &[format!("{}:", GOAL_FIELD)])?;
        Ok(roles)
    }

    pub(crate) fn show_links(&self, target: &ItemRef) -> Result<Links> {
        let item = self.fetch(target)?;
        if self.is_goal_item(&item) {
            let tasks = self
                .store
                .export(&[format!("{}:{}", GOAL_FIELD, item.uuid)])?
                .into_iter()
                .filter(|linked| linked.status != "deleted" && linked.uuid != item.uuid)
                .collect();
            return Ok(Links::Goal { goal: item, tasks });
        }

        match item.linked_goal().map(str::to_string) {
            Some(uuid) => {
                let goal_ref = ItemRef::try_from(uuid.as_str())
                    .map_err(|_| ResolutionError::DanglingLink { uuid: uuid.clone() })?;
                let goal = self
                    .store
                    .get(&goal_ref)?
                    .ok_or(ResolutionError::DanglingLink { uuid })?;
                Ok(Links::Task {
                    task: item,
                    goal: Some(goal),
                })
            }
            None => {
                // An absent field only means "no link" when the attribute exists.
                if self.store.uda_type(GOAL_FIELD)?.is_none() {
                    return Err(ResolutionError::GoalFieldUnavailable {
                        field: GOAL_FIELD.to_string(),
                    }
                    .into());
                }
                Ok(Links::Task {
                    task: item,
                    goal: None,
                })
            }
        }
    }

    /// The goal linked to `item`, tolerating missing links and goals.
    pub(crate) fn linked_goal_of(&self, item: &Item) -> Result<Option<Item>> {
        let Some(uuid) = item.linked_goal() else {
            return Ok(None);
        };
        match ItemRef::try_from(uuid) {
            Ok(goal_ref) => self.store.get(&goal_ref),
            Err(_) => Ok(None),
        }
    }

    pub(crate) fn list_goals(&self, filters: &Filters) -> Result<Vec<Item>> {
        let goals = self
            .store
            .pending(&[format!("project:{}", self.goal_project)])?;
        Ok(filter_items(goals, filters))
    }

    pub(crate) fn add_goal(&self, args: &[String]) -> Result<(String, u32)> {
        let mut full = args.to_vec();
        full.push(format!("project:{}", self.goal_project));
        self.store.add(&full)
    }

    pub(crate) fn require_goal(&self, target: &ItemRef) -> Result<Item> {
        let item = self.fetch(target)?;
        if !self.is_goal_item(&item) {
            return Err(ResolutionError::NotAGoal {
                id: target.to_string(),
                goal_project: self.goal_project.to_string(),
            }
            .into());
        }
        Ok(item)
    }

    pub(crate) fn modify_goal(&self, target: &ItemRef, args: &[String]) -> Result<String> {
        let goal = self.require_goal(target)?;
        self.store.modify(&task_ref(&goal), args)
    }

    /// Deletes the goal; tasks linked to it keep their now-dangling field.
    pub(crate) fn delete_goal(&self, target: &ItemRef) -> Result<Item> {
        let goal = self.require_goal(target)?;
        self.store.delete(&task_ref(&goal))?;
        Ok(goal)
    }
}

/// Positional id for pending items, uuid otherwise.
fn task_ref(item: &Item) -> ItemRef {
    if item.id > 0 {
        return ItemRef::from(item.id);
    }
    ItemRef::try_from(item.uuid.as_str()).unwrap_or_else(|_| ItemRef::from(0))
}
