//! taskd — task/user REST API with coordinated denormalized links.
//!
//! Tasks carry `assignedUser`/`assignedUserName`; users carry
//! `pendingTasks`. The two sides reference each other without joins, and the
//! [`coordinator`] keeps them aligned on every mutation. Modules:
//!
//!   - [`config`] — CLI/env/TOML layering
//!   - [`model`] — domain types and wire documents
//!   - [`query`] — typed `where`/`sort`/`select` translation
//!   - [`store`] — SQLite pool and per-resource facades
//!   - [`coordinator`] — primary + mirror write orchestration
//!   - [`http`] — axum routes and the response envelope
//!   - [`error`] — the error taxonomy and its HTTP mapping

pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod model;
pub mod query;
pub mod store;

use std::sync::Arc;
use std::time::Instant;

use config::ServerConfig;
use coordinator::mirror::MirrorBus;
use coordinator::Coordinator;
use store::{Database, TaskStore, UserStore};

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    /// Shared SQLite handle (possibly unconfigured).
    pub db: Database,
    pub tasks: TaskStore,
    pub users: UserStore,
    pub coordinator: Coordinator,
    /// Mirror-write attempt feed; integration tests subscribe to it.
    pub mirror_bus: MirrorBus,
    /// Process start, for `/health` uptime.
    pub started_at: Instant,
}

impl AppContext {
    /// Wire the full object graph over an opened (or unconfigured) database.
    pub fn new(config: Arc<ServerConfig>, db: Database) -> Self {
        let tasks = TaskStore::new(db.clone());
        let users = UserStore::new(db.clone());
        let mirror_bus = MirrorBus::new();
        let coordinator = Coordinator::new(tasks.clone(), users.clone(), mirror_bus.clone());
        Self {
            config,
            db,
            tasks,
            users,
            coordinator,
            mirror_bus,
            started_at: Instant::now(),
        }
    }
}
