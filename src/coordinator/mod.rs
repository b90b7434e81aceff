// SPDX-License-Identifier: MIT
//! Consistency coordinator.
//!
//! Every mutation is one primary write plus zero or more mirror writes on
//! the opposite resource. The primary write decides the HTTP outcome; a
//! failed primary aborts the operation. Mirror writes run afterwards,
//! sequentially and awaited, through the single [`Coordinator::mirror`]
//! chokepoint: their failures are logged, published on the [`MirrorBus`],
//! and never surface to the caller.
//!
//! The two sides are deliberately asymmetric, matching the API's observable
//! behavior:
//!   - task-side writes repair the link per task (push/pull one pending id);
//!   - user-side updates repair by diffing the submitted pendingTasks list,
//!     and creating a user never mirrors at all.

pub mod mirror;

use chrono::Utc;
use tracing::warn;

use crate::error::Error;
use crate::model::{dedup_task_ids, Assignee, Task, TaskPayload, User, UserPayload};
use crate::store::{TaskStore, UserStore};
use mirror::{MirrorAttempt, MirrorBus, MirrorOutcome, MirrorWrite};

#[derive(Clone)]
pub struct Coordinator {
    tasks: TaskStore,
    users: UserStore,
    bus: MirrorBus,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl Coordinator {
    pub fn new(tasks: TaskStore, users: UserStore, bus: MirrorBus) -> Self {
        Self { tasks, users, bus }
    }

    // ── Task side ──

    pub async fn create_task(&self, payload: TaskPayload) -> Result<Task, Error> {
        let TaskPayload { name, description, deadline, completed, assigned_user, date_created } =
            payload;
        let (Some(name), Some(deadline)) = (non_empty(name), deadline) else {
            return Err(Error::Validation("Name and deadline are required".to_string()));
        };

        let assignee = match non_empty(assigned_user) {
            Some(user_id) => {
                let user = self.lookup_assigned_user(&user_id).await?;
                Some(Assignee { user_id: user.id, user_name: user.name })
            }
            None => None,
        };

        let task = Task {
            id: String::new(),
            name,
            description: description.unwrap_or_default(),
            deadline,
            completed: completed.unwrap_or(false),
            assignee,
            date_created: date_created.unwrap_or_else(Utc::now),
        };
        let task = self.tasks.insert(task).await?;

        // Completed tasks are never pending, so the link only mirrors for
        // open ones.
        if let Some(assignee) = &task.assignee {
            if !task.completed {
                self.mirror(MirrorWrite::PushPending {
                    user_id: assignee.user_id.clone(),
                    task_id: task.id.clone(),
                })
                .await;
            }
        }
        Ok(task)
    }

    pub async fn update_task(&self, id: &str, payload: TaskPayload) -> Result<Task, Error> {
        let TaskPayload { name, description, deadline, completed, assigned_user, date_created: _ } =
            payload;
        let (Some(name), Some(deadline)) = (non_empty(name), deadline) else {
            return Err(Error::Validation("Name and deadline are required".to_string()));
        };

        let old = self.tasks.find_by_id(id).await?;
        let old_assigned = old.assigned_user_id().map(str::to_string);

        let mut task = Task {
            id: old.id,
            name,
            description: description.unwrap_or(old.description),
            deadline,
            completed: completed.unwrap_or(old.completed),
            assignee: None,
            date_created: old.date_created,
        };

        match non_empty(assigned_user) {
            Some(user_id) => {
                let user = self.lookup_assigned_user(&user_id).await?;
                task.assignee = Some(Assignee {
                    user_id: user.id.clone(),
                    user_name: user.name.clone(),
                });
                self.tasks.replace(&task).await?;

                if let Some(previous) = old_assigned {
                    if previous != user.id {
                        self.mirror(MirrorWrite::PullPending {
                            user_id: previous,
                            task_id: task.id.clone(),
                        })
                        .await;
                    }
                }
                if task.completed {
                    self.mirror(MirrorWrite::PullPending {
                        user_id: user.id,
                        task_id: task.id.clone(),
                    })
                    .await;
                } else {
                    self.mirror(MirrorWrite::PushPending {
                        user_id: user.id,
                        task_id: task.id.clone(),
                    })
                    .await;
                }
            }
            None => {
                self.tasks.replace(&task).await?;
                if let Some(previous) = old_assigned {
                    self.mirror(MirrorWrite::PullPending {
                        user_id: previous,
                        task_id: task.id.clone(),
                    })
                    .await;
                }
            }
        }
        Ok(task)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), Error> {
        let task = self.tasks.find_by_id(id).await?;
        if let Some(assignee) = &task.assignee {
            self.mirror(MirrorWrite::PullPending {
                user_id: assignee.user_id.clone(),
                task_id: task.id.clone(),
            })
            .await;
        }
        self.tasks.delete(&task.id).await
    }

    // ── User side ──

    /// Creation takes the submitted pendingTasks verbatim (deduplicated);
    /// no task-side mirror runs here.
    pub async fn create_user(&self, payload: UserPayload) -> Result<User, Error> {
        let UserPayload { name, email, pending_tasks, date_created } = payload;
        let (Some(name), Some(email)) = (non_empty(name), non_empty(email)) else {
            return Err(Error::Validation("Name and email are required".to_string()));
        };

        let user = User {
            id: String::new(),
            name,
            email,
            pending_tasks: dedup_task_ids(pending_tasks.unwrap_or_default()),
            date_created: date_created.unwrap_or_else(Utc::now),
        };
        self.users.insert(user).await
    }

    /// Replace the user, then repair task links from the list diff: ids
    /// dropped from pendingTasks are unassigned, every id still on the list
    /// is (re)pointed at this user. Tasks assigned to this user that were
    /// never on the submitted list are left alone.
    pub async fn update_user(&self, id: &str, payload: UserPayload) -> Result<User, Error> {
        let UserPayload { name, email, pending_tasks, date_created: _ } = payload;
        let (Some(name), Some(email)) = (non_empty(name), non_empty(email)) else {
            return Err(Error::Validation("Name and email are required".to_string()));
        };

        let old = self.users.find_by_id(id).await?;
        let user = User {
            id: old.id,
            name,
            email,
            pending_tasks: dedup_task_ids(pending_tasks.unwrap_or_default()),
            date_created: old.date_created,
        };
        self.users.replace(&user).await?;

        let removed: Vec<String> = old
            .pending_tasks
            .iter()
            .filter(|t| !user.pending_tasks.contains(t))
            .cloned()
            .collect();
        self.mirror(MirrorWrite::UnassignTasks { task_ids: removed }).await;
        self.mirror(MirrorWrite::AssignTasks {
            task_ids: user.pending_tasks.clone(),
            user_id: user.id.clone(),
            user_name: user.name.clone(),
        })
        .await;

        Ok(user)
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), Error> {
        let user = self.users.find_by_id(id).await?;
        self.mirror(MirrorWrite::UnassignAllFor { user_id: user.id.clone() })
            .await;
        self.users.delete(&user.id).await
    }

    // ── Plumbing ──

    /// Resolve a caller-supplied assignee reference. A malformed or unknown
    /// id is a validation failure of the request, not a missing resource.
    async fn lookup_assigned_user(&self, user_id: &str) -> Result<User, Error> {
        match self.users.find_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(Error::NotFound { .. }) | Err(Error::InvalidId { .. }) => {
                Err(Error::Validation("Assigned user not found".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Apply one mirror write: failures are logged and swallowed, and the
    /// attempt is published either way.
    async fn mirror(&self, write: MirrorWrite) {
        let result = match &write {
            MirrorWrite::PushPending { user_id, task_id } => {
                self.users.push_pending(user_id, task_id).await.map(u64::from)
            }
            MirrorWrite::PullPending { user_id, task_id } => {
                self.users.pull_pending(user_id, task_id).await.map(u64::from)
            }
            MirrorWrite::AssignTasks { task_ids, user_id, user_name } => {
                self.tasks.assign_many(task_ids, user_id, user_name).await
            }
            MirrorWrite::UnassignTasks { task_ids } => self.tasks.unassign_many(task_ids).await,
            MirrorWrite::UnassignAllFor { user_id } => {
                self.tasks.unassign_all_for(user_id).await
            }
        };
        let outcome = match result {
            Ok(changed) => MirrorOutcome::Applied { changed },
            Err(e) => {
                warn!(write = ?write, err = %e, "mirror write failed; primary result stands");
                MirrorOutcome::Failed { reason: e.to_string() }
            }
        };
        self.bus.publish(MirrorAttempt { write, outcome });
    }
}
