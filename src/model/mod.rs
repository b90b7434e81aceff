//! Domain model for tasks and users.
//!
//! Internally a task's assignment is an `Option<Assignee>`. The wire format
//! (and the storage columns) instead carry the sentinel pair the public API
//! has always used: `assignedUser: ""` / `assignedUserName: "unassigned"`.
//! The [`TaskDoc`] / [`Task`] conversions are the only place the two
//! representations meet.

pub mod datetime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire value of `assignedUserName` for an unassigned task.
pub const UNASSIGNED_NAME: &str = "unassigned";

/// The user a task is assigned to, denormalized onto the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignee {
    pub user_id: String,
    /// Copy of the user's name at the last coordinated write.
    pub user_name: String,
}

/// A task as the coordinator and stores see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Store-assigned UUID, empty until inserted.
    pub id: String,
    pub name: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub assignee: Option<Assignee>,
    pub date_created: DateTime<Utc>,
}

impl Task {
    pub fn assigned_user_id(&self) -> Option<&str> {
        self.assignee.as_ref().map(|a| a.user_id.as_str())
    }

    /// Sentinel pair for the storage/wire assignment columns.
    pub fn assignment_columns(&self) -> (&str, &str) {
        match &self.assignee {
            Some(a) => (a.user_id.as_str(), a.user_name.as_str()),
            None => ("", UNASSIGNED_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Store-assigned UUID, empty until inserted.
    pub id: String,
    pub name: String,
    pub email: String,
    /// Ids of not-yet-completed tasks assigned to this user. No duplicates.
    pub pending_tasks: Vec<String>,
    pub date_created: DateTime<Utc>,
}

/// Drop duplicate ids, keeping the first occurrence of each.
pub fn dedup_task_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

// ─── Wire documents ──────────────────────────────────────────────────────────

/// Response form of a task, sentinels included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDoc {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "datetime::rfc3339_millis")]
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub assigned_user: String,
    pub assigned_user_name: String,
    #[serde(with = "datetime::rfc3339_millis")]
    pub date_created: DateTime<Utc>,
}

impl From<Task> for TaskDoc {
    fn from(task: Task) -> Self {
        let (assigned_user, assigned_user_name) = match task.assignee {
            Some(a) => (a.user_id, a.user_name),
            None => (String::new(), UNASSIGNED_NAME.to_string()),
        };
        TaskDoc {
            id: task.id,
            name: task.name,
            description: task.description,
            deadline: task.deadline,
            completed: task.completed,
            assigned_user,
            assigned_user_name,
            date_created: task.date_created,
        }
    }
}

/// Response form of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub id: String,
    pub name: String,
    pub email: String,
    pub pending_tasks: Vec<String>,
    #[serde(with = "datetime::rfc3339_millis")]
    pub date_created: DateTime<Utc>,
}

impl From<User> for UserDoc {
    fn from(user: User) -> Self {
        UserDoc {
            id: user.id,
            name: user.name,
            email: user.email,
            pending_tasks: user.pending_tasks,
            date_created: user.date_created,
        }
    }
}

// ─── Request payloads ────────────────────────────────────────────────────────

/// Body of `POST /tasks` and `PUT /tasks/{id}`. Everything is optional at
/// the decoding layer; the coordinator enforces what is actually required.
/// An empty-string `assignedUser` means unassigned, same as omitting it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "datetime::lenient_opt")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub assigned_user: Option<String>,
    #[serde(default, deserialize_with = "datetime::lenient_opt")]
    pub date_created: Option<DateTime<Utc>>,
}

/// Body of `POST /users` and `PUT /users/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pending_tasks: Option<Vec<String>>,
    #[serde(default, deserialize_with = "datetime::lenient_opt")]
    pub date_created: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(assignee: Option<Assignee>) -> Task {
        Task {
            id: "t-1".to_string(),
            name: "Write report".to_string(),
            description: String::new(),
            deadline: DateTime::from_timestamp_millis(1_750_000_000_000).unwrap(),
            completed: false,
            assignee,
            date_created: DateTime::from_timestamp_millis(1_740_000_000_000).unwrap(),
        }
    }

    #[test]
    fn unassigned_task_serializes_with_sentinels() {
        let doc = TaskDoc::from(task(None));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["assignedUser"], "");
        assert_eq!(value["assignedUserName"], "unassigned");
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert!(keys.contains(&"dateCreated") && keys.contains(&"deadline"));
    }

    #[test]
    fn assigned_task_serializes_both_link_fields() {
        let doc = TaskDoc::from(task(Some(Assignee {
            user_id: "u-9".to_string(),
            user_name: "Ada".to_string(),
        })));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["assignedUser"], "u-9");
        assert_eq!(value["assignedUserName"], "Ada");
    }

    #[test]
    fn assignment_columns_cover_both_states() {
        assert_eq!(task(None).assignment_columns(), ("", "unassigned"));
        let t = task(Some(Assignee {
            user_id: "u-9".to_string(),
            user_name: "Ada".to_string(),
        }));
        assert_eq!(t.assignment_columns(), ("u-9", "Ada"));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(dedup_task_ids(ids), vec!["a", "b", "c"]);
    }

    #[test]
    fn task_payload_accepts_camel_case_fields() {
        let payload: TaskPayload = serde_json::from_str(
            r#"{"name": "x", "deadline": "2025-06-30T00:00:00Z", "assignedUser": "u-1", "completed": true}"#,
        )
        .unwrap();
        assert_eq!(payload.name.as_deref(), Some("x"));
        assert_eq!(payload.assigned_user.as_deref(), Some("u-1"));
        assert_eq!(payload.completed, Some(true));
        assert!(payload.deadline.is_some());
    }

    #[test]
    fn user_payload_tolerates_unknown_fields() {
        let payload: UserPayload = serde_json::from_str(
            r#"{"name": "Ada", "email": "ada@example.com", "pendingTasks": ["t1"], "extra": 42}"#,
        )
        .unwrap();
        assert_eq!(payload.pending_tasks, Some(vec!["t1".to_string()]));
    }
}
