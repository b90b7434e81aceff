// SPDX-License-Identifier: MIT
//! Mirror writes and their observation channel.
//!
//! A "mirror" write is the secondary half of a coordinated mutation: the
//! best-effort update on the opposite resource that keeps
//! `task.assignedUser` and `user.pendingTasks` pointing at each other.
//! Mirror failures never fail the request; they are logged and swallowed.
//! Every attempt — applied or failed — is published on [`MirrorBus`] so
//! tests (or diagnostics) can watch the secondary effects from outside.

use tokio::sync::broadcast;

/// One secondary write the coordinator wants applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorWrite {
    /// Append a task id to a user's pendingTasks (no-op if present).
    PushPending { user_id: String, task_id: String },
    /// Remove a task id from a user's pendingTasks (no-op if absent).
    PullPending { user_id: String, task_id: String },
    /// Point every listed task at the user, refreshing the denormalized
    /// name.
    AssignTasks {
        task_ids: Vec<String>,
        user_id: String,
        user_name: String,
    },
    /// Reset every listed task to unassigned.
    UnassignTasks { task_ids: Vec<String> },
    /// Reset every task currently assigned to the user.
    UnassignAllFor { user_id: String },
}

/// How one attempted mirror write went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The write ran; `changed` rows or list entries were touched.
    Applied { changed: u64 },
    /// The write failed; the failure was logged and swallowed.
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct MirrorAttempt {
    pub write: MirrorWrite,
    pub outcome: MirrorOutcome,
}

/// Broadcast feed of mirror attempts. Zero subscribers is the normal
/// production state; publishing is then a no-op.
#[derive(Clone)]
pub struct MirrorBus {
    tx: broadcast::Sender<MirrorAttempt>,
}

impl MirrorBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn publish(&self, attempt: MirrorAttempt) {
        // A send error only means nobody is listening right now.
        let _ = self.tx.send(attempt);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MirrorAttempt> {
        self.tx.subscribe()
    }
}

impl Default for MirrorBus {
    fn default() -> Self {
        Self::new()
    }
}
