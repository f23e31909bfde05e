//! Tasks and the field-update mini-language.
//!
//! Tasks live in the `tasks` collection. Callers mutate them with ordered
//! `field:value` tokens:
//!
//! ```text
//! name:eggs  n:eggs                 rename (name must stay unique)
//! status:doing  st:doing  s:doing   status, stored upper-case
//! priority:10  pri:-1  p:3          signed integer priority
//! tags:foo,+bar,-baz  t:foo         add / remove tags, applied in order
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, Error, Result};
use crate::storage::{Collection, Document, Storage};

pub const STATUS_TODO: &str = "TODO";
pub const STATUS_DOING: &str = "DOING";
pub const STATUS_DONE: &str = "DONE";

/// Statuses callers use by convention; other values are stored as given.
pub const KNOWN_STATUSES: [&str; 3] = [STATUS_TODO, STATUS_DOING, STATUS_DONE];

pub fn normalize_status(status: &str) -> String {
    status.trim().to_uppercase()
}

pub fn is_known_status(status: &str) -> bool {
    KNOWN_STATUSES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(status.trim()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            status: STATUS_TODO.to_string(),
            priority: 0,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }
}

impl Document for Task {
    const COLLECTION: &'static str = "tasks";
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    Add(String),
    Remove(String),
}

impl TagChange {
    /// Parse a comma-separated tag list, skipping empty entries
    pub fn parse_list(value: &str) -> Vec<TagChange> {
        value
            .split(',')
            .filter_map(|raw| {
                let raw = raw.trim();
                if let Some(tag) = raw.strip_prefix('-') {
                    let tag = tag.trim();
                    (!tag.is_empty()).then(|| TagChange::Remove(tag.to_string()))
                } else {
                    let tag = raw.strip_prefix('+').unwrap_or(raw).trim();
                    (!tag.is_empty()).then(|| TagChange::Add(tag.to_string()))
                }
            })
            .collect()
    }
}

/// Apply tag changes in order; adds are idempotent, removes of absent tags are no-ops
pub fn apply_tag_changes(tags: &mut Vec<String>, changes: &[TagChange]) {
    for change in changes {
        match change {
            TagChange::Add(tag) => {
                if !tags.iter().any(|existing| existing == tag) {
                    tags.push(tag.clone());
                }
            }
            TagChange::Remove(tag) => tags.retain(|existing| existing != tag),
        }
    }
}

/// One parsed `field:value` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    Status(String),
    Priority(i64),
    Tags(Vec<TagChange>),
}

impl FieldUpdate {
    pub fn apply(&self, task: &mut Task) {
        match self {
            FieldUpdate::Name(name) => task.name = name.clone(),
            FieldUpdate::Status(status) => task.status = status.clone(),
            FieldUpdate::Priority(priority) => task.priority = *priority,
            FieldUpdate::Tags(changes) => apply_tag_changes(&mut task.tags, changes),
        }
    }
}

impl FromStr for FieldUpdate {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        let (field, value) = token.split_once(':').ok_or_else(|| {
            Error::InvalidArgument(format!("expected field:value, got '{token}'"))
        })?;

        match field.trim().to_ascii_lowercase().as_str() {
            "name" | "n" => {
                if value.trim().is_empty() {
                    return Err(Error::InvalidArgument("task name cannot be empty".to_string()));
                }
                Ok(FieldUpdate::Name(value.trim().to_string()))
            }
            "status" | "st" | "s" => Ok(FieldUpdate::Status(normalize_status(value))),
            "priority" | "pri" | "p" => value
                .trim()
                .parse::<i64>()
                .map(FieldUpdate::Priority)
                .map_err(|_| Error::InvalidNumericArgument(value.to_string())),
            "tags" | "t" => Ok(FieldUpdate::Tags(TagChange::parse_list(value))),
            other => Err(Error::InvalidArgument(format!(
                "unknown task field '{other}' (expected name, status, priority or tags)"
            ))),
        }
    }
}

/// Parse every token up front; the first bad token aborts the whole list
pub fn parse_field_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Vec<FieldUpdate>> {
    pairs.iter().map(|pair| pair.as_ref().parse()).collect()
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument("task name cannot be empty".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TaskRepository {
    tasks: Collection<Task>,
}

impl TaskRepository {
    pub fn new(storage: &Storage) -> Self {
        Self {
            tasks: storage.collection(),
        }
    }

    pub fn collection(&self) -> &Collection<Task> {
        &self.tasks
    }

    /// Insert a fresh TODO task with priority 0 and no tags
    pub fn create(&self, name: &str) -> Result<Task> {
        self.add(name, &[] as &[&str])
    }

    /// Create a task and apply `pairs`; the requested name always wins
    ///
    /// Surrounding whitespace is stripped before the uniqueness check.
    pub fn add<S: AsRef<str>>(&self, name: &str, pairs: &[S]) -> Result<Task> {
        let name = name.trim();
        validate_name(name)?;
        let mut updates = parse_field_pairs(pairs)?;
        updates.push(FieldUpdate::Name(name.to_string()));

        let mut task = Task::new(name);
        for update in &updates {
            update.apply(&mut task);
        }

        let task = self.tasks.transact(|data| {
            let id = data.insert(task.clone())?;
            task.id = id;
            Ok(task)
        })?;
        tracing::info!(task_id = task.id, name = %task.name, "task created");
        Ok(task)
    }

    pub fn get(&self, id: u64) -> Result<Task> {
        self.tasks.read(id)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .find("name", &serde_json::Value::String(name.trim().to_string()))?
            .into_iter()
            .next())
    }

    /// All tasks ordered by id
    pub fn list(&self) -> Result<Vec<Task>> {
        self.tasks.order_by("id")
    }

    /// Remove a task; its timers are left in place
    pub fn delete(&self, id: u64) -> Result<Task> {
        let task = self.tasks.transact(|data| data.remove(id))?;
        tracing::info!(task_id = id, name = %task.name, "task deleted");
        Ok(task)
    }

    /// Apply `field:value` tokens left to right and persist the result once
    ///
    /// Any failing token, or a name collision at write time, rejects the whole
    /// call and leaves the stored task unchanged.
    pub fn update_fields<S: AsRef<str>>(&self, id: u64, pairs: &[S]) -> Result<Task> {
        let updates = parse_field_pairs(pairs)?;
        let task = self.tasks.transact(|data| {
            let mut task = data.get(id).cloned().ok_or_else(|| Error::task_not_found(id))?;
            for update in &updates {
                update.apply(&mut task);
            }
            task.updated_at = Utc::now();
            data.replace(id, task.clone())?;
            Ok(task)
        })?;
        tracing::info!(task_id = id, fields = updates.len(), "task updated");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, TaskRepository) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::open(dir.path().to_path_buf(), 1000).expect("storage");
        let repo = TaskRepository::new(&storage);
        (dir, repo)
    }

    #[test]
    fn parses_field_synonyms() {
        assert_eq!(
            "n:eggs".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Name("eggs".to_string())
        );
        assert_eq!(
            "st:doing".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Status("DOING".to_string())
        );
        assert_eq!(
            "s:Done".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Status("DONE".to_string())
        );
        assert_eq!("pri:-3".parse::<FieldUpdate>().unwrap(), FieldUpdate::Priority(-3));
        assert_eq!("P:7".parse::<FieldUpdate>().unwrap(), FieldUpdate::Priority(7));
        assert_eq!(
            "t:foo".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Tags(vec![TagChange::Add("foo".to_string())])
        );
    }

    #[test]
    fn only_first_colon_splits() {
        assert_eq!(
            "name:read: chapter 2".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Name("read: chapter 2".to_string())
        );
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            "priority".parse::<FieldUpdate>(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            "colour:red".parse::<FieldUpdate>(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            "pri:high".parse::<FieldUpdate>(),
            Err(Error::InvalidNumericArgument(ref value)) if value == "high"
        ));
        assert!(matches!(
            "n: ".parse::<FieldUpdate>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn status_is_not_validated() {
        assert_eq!(
            "status:blocked".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Status("BLOCKED".to_string())
        );
        assert!(!is_known_status("blocked"));
        assert!(is_known_status("doing"));
    }

    #[test]
    fn tag_list_applies_in_order() {
        let mut tags = Vec::new();
        apply_tag_changes(&mut tags, &TagChange::parse_list("foo,bar,eggs,biz,-biz"));
        assert_eq!(tags, vec!["foo", "bar", "eggs"]);
    }

    #[test]
    fn tag_add_is_idempotent_and_remove_tolerates_absent() {
        let mut tags = vec!["x".to_string()];
        apply_tag_changes(&mut tags, &TagChange::parse_list("x,+x, x "));
        assert_eq!(tags, vec!["x"]);

        apply_tag_changes(&mut tags, &TagChange::parse_list("-missing"));
        assert_eq!(tags, vec!["x"]);
    }

    #[test]
    fn empty_tag_entries_change_nothing() {
        assert!(TagChange::parse_list("").is_empty());
        assert!(TagChange::parse_list(" , ,-,+").is_empty());
    }

    #[test]
    fn create_uses_defaults() {
        let (_dir, repo) = setup_repo();
        let task = repo.create("foo").unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.status, STATUS_TODO);
        assert_eq!(task.priority, 0);
        assert!(task.tags.is_empty());
        assert_eq!(repo.find_by_name("foo").unwrap().unwrap().id, task.id);
    }

    #[test]
    fn create_rejects_duplicate_and_empty_names() {
        let (_dir, repo) = setup_repo();
        repo.create("foo").unwrap();
        assert!(matches!(repo.create("foo"), Err(Error::DuplicateName(_))));
        assert!(matches!(repo.create("   "), Err(Error::InvalidArgument(_))));
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn names_are_trimmed_before_uniqueness_check() {
        let (_dir, repo) = setup_repo();
        repo.create("eggs").unwrap();
        assert!(matches!(
            repo.create(" eggs"),
            Err(Error::DuplicateName(ref name)) if name == "eggs"
        ));

        let task = repo.create("  milk\t").unwrap();
        assert_eq!(task.name, "milk");
        assert_eq!(repo.find_by_name(" milk ").unwrap().unwrap().id, task.id);

        assert!(matches!(
            repo.update_fields(task.id, &["n: eggs "]),
            Err(Error::DuplicateName(_))
        ));
        let renamed = repo.update_fields(task.id, &["name:  bread "]).unwrap();
        assert_eq!(renamed.name, "bread");
    }

    #[test]
    fn add_applies_pairs() {
        let (_dir, repo) = setup_repo();
        let task = repo.add("bar", &["pri:1", "status:done"]).unwrap();
        let stored = repo.get(task.id).unwrap();
        assert_eq!(stored.priority, 1);
        assert_eq!(stored.status, STATUS_DONE);
    }

    #[test]
    fn add_keeps_requested_name_over_name_tokens() {
        let (_dir, repo) = setup_repo();
        let task = repo.add("real", &["n:other", "t:a"]).unwrap();
        assert_eq!(task.name, "real");
        assert!(repo.find_by_name("other").unwrap().is_none());
    }

    #[test]
    fn add_with_bad_pair_creates_nothing() {
        let (_dir, repo) = setup_repo();
        assert!(matches!(
            repo.add("foo", &["pri:x"]),
            Err(Error::InvalidNumericArgument(_))
        ));
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn update_fields_round_trip() {
        let (_dir, repo) = setup_repo();
        let task = repo.create("foo").unwrap();

        repo.update_fields(task.id, &["pri:10", "status:done", "n:eggs", "t:foo"])
            .unwrap();
        let stored = repo.get(task.id).unwrap();
        assert_eq!(stored.name, "eggs");
        assert_eq!(stored.status, "DONE");
        assert_eq!(stored.priority, 10);
        assert_eq!(stored.tags, vec!["foo"]);

        repo.update_fields(task.id, &["t:-foo"]).unwrap();
        assert!(repo.get(task.id).unwrap().tags.is_empty());
    }

    #[test]
    fn later_tokens_override_earlier_ones() {
        let (_dir, repo) = setup_repo();
        let task = repo.create("foo").unwrap();
        let updated = repo
            .update_fields(task.id, &["p:1", "p:2", "s:doing", "s:done"])
            .unwrap();
        assert_eq!(updated.priority, 2);
        assert_eq!(updated.status, STATUS_DONE);
    }

    #[test]
    fn rename_collision_rejects_whole_update() {
        let (_dir, repo) = setup_repo();
        repo.create("taken").unwrap();
        let task = repo.create("mine").unwrap();

        let err = repo
            .update_fields(task.id, &["pri:5", "name:taken"])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));

        let stored = repo.get(task.id).unwrap();
        assert_eq!(stored.name, "mine");
        assert_eq!(stored.priority, 0);
        assert_eq!(repo.find_by_name("taken").unwrap().unwrap().name, "taken");
    }

    #[test]
    fn bad_priority_rejects_whole_update() {
        let (_dir, repo) = setup_repo();
        let task = repo.create("foo").unwrap();
        let err = repo
            .update_fields(task.id, &["s:doing", "pri:ten", "t:x"])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidNumericArgument(_)));
        assert_eq!(repo.get(task.id).unwrap(), task);
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let (_dir, repo) = setup_repo();
        assert!(matches!(
            repo.update_fields(42, &["p:1"]),
            Err(Error::NotFound { kind: EntityKind::Task, .. })
        ));
    }

    #[test]
    fn delete_removes_task_and_ids_are_not_reused() {
        let (_dir, repo) = setup_repo();
        let foo = repo.create("foo").unwrap();
        repo.delete(foo.id).unwrap();
        assert!(repo.find_by_name("foo").unwrap().is_none());
        assert!(matches!(repo.delete(foo.id), Err(Error::NotFound { .. })));

        let again = repo.create("foo").unwrap();
        assert!(again.id > foo.id);
    }

    #[test]
    fn list_is_ordered_by_id() {
        let (_dir, repo) = setup_repo();
        for name in ["c", "a", "b"] {
            repo.create(name).unwrap();
        }
        let ids: Vec<u64> = repo.list().unwrap().iter().map(|task| task.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
