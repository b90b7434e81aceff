//! Task persistence facade.

use uuid::Uuid;

use super::{render_order, render_page, render_where, Database, SqlArg};
use crate::error::{Entity, Error};
use crate::model::datetime;
use crate::model::{Assignee, Task, UNASSIGNED_NAME};
use crate::query::{Filter, QueryPlan};

#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: String,
    deadline: String,
    completed: bool,
    assigned_user: String,
    assigned_user_name: String,
    date_created: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        let assignee = if row.assigned_user.is_empty() {
            None
        } else {
            Some(Assignee {
                user_id: row.assigned_user,
                user_name: row.assigned_user_name,
            })
        };
        Task {
            id: row.id,
            name: row.name,
            description: row.description,
            deadline: datetime::parse_stored(&row.deadline),
            completed: row.completed,
            assignee,
            date_created: datetime::parse_stored(&row.date_created),
        }
    }
}

#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn find_many(&self, plan: &QueryPlan) -> Result<Vec<Task>, Error> {
        let pool = self.db.pool()?;
        let (where_sql, args) = render_where(&plan.filter);
        let sql = format!(
            "SELECT * FROM tasks{where_sql}{}{}",
            render_order(&plan.sort),
            render_page(plan)
        );
        let mut query = sqlx::query_as::<_, TaskRow>(&sql);
        for arg in args {
            query = match arg {
                SqlArg::Int(v) => query.bind(v),
                SqlArg::Float(v) => query.bind(v),
                SqlArg::Text(v) => query.bind(v),
            };
        }
        let rows = query
            .fetch_all(pool)
            .await
            .map_err(|e| Error::store("retrieve tasks", e))?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    /// Count matches of the filter alone; skip and limit do not apply.
    pub async fn count(&self, filter: &Filter) -> Result<u64, Error> {
        let pool = self.db.pool()?;
        let (where_sql, args) = render_where(filter);
        let sql = format!("SELECT COUNT(*) FROM tasks{where_sql}");
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for arg in args {
            query = match arg {
                SqlArg::Int(v) => query.bind(v),
                SqlArg::Float(v) => query.bind(v),
                SqlArg::Text(v) => query.bind(v),
            };
        }
        let n = query
            .fetch_one(pool)
            .await
            .map_err(|e| Error::store("count tasks", e))?;
        Ok(n as u64)
    }

    /// An id that cannot be a stored id reports [`Error::InvalidId`], which
    /// the wire collapses into the same 404 as a well-formed unknown id.
    pub async fn find_by_id(&self, id: &str) -> Result<Task, Error> {
        if Uuid::parse_str(id).is_err() {
            return Err(Error::InvalidId { entity: Entity::Task });
        }
        let pool = self.db.pool()?;
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::store("retrieve task", e))?;
        row.map(Task::from).ok_or(Error::NotFound { entity: Entity::Task })
    }

    /// Insert the task, assigning a fresh id unless the caller fixed one.
    pub async fn insert(&self, mut task: Task) -> Result<Task, Error> {
        let pool = self.db.pool()?;
        if task.id.is_empty() {
            task.id = Uuid::new_v4().to_string();
        }
        let (assigned_user, assigned_user_name) = task.assignment_columns();
        sqlx::query(
            "INSERT INTO tasks (id, name, description, deadline, completed, \
             assigned_user, assigned_user_name, date_created) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(datetime::format_stored(&task.deadline))
        .bind(task.completed)
        .bind(assigned_user)
        .bind(assigned_user_name)
        .bind(datetime::format_stored(&task.date_created))
        .execute(pool)
        .await
        .map_err(|e| Error::store("create task", e))?;
        Ok(task)
    }

    /// Full-row overwrite keyed by `task.id`. `date_created` is immutable.
    pub async fn replace(&self, task: &Task) -> Result<(), Error> {
        let pool = self.db.pool()?;
        let (assigned_user, assigned_user_name) = task.assignment_columns();
        let result = sqlx::query(
            "UPDATE tasks SET name = ?, description = ?, deadline = ?, completed = ?, \
             assigned_user = ?, assigned_user_name = ? WHERE id = ?",
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(datetime::format_stored(&task.deadline))
        .bind(task.completed)
        .bind(assigned_user)
        .bind(assigned_user_name)
        .bind(&task.id)
        .execute(pool)
        .await
        .map_err(|e| Error::store("update task", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound { entity: Entity::Task });
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let pool = self.db.pool()?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| Error::store("delete task", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound { entity: Entity::Task });
        }
        Ok(())
    }

    /// Point every listed task at the user, refreshing the denormalized
    /// name. Ids that match no task are skipped; completion state is not
    /// consulted. Returns the number of rows touched.
    pub async fn assign_many(
        &self,
        ids: &[String],
        user_id: &str,
        user_name: &str,
    ) -> Result<u64, Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let pool = self.db.pool()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE tasks SET assigned_user = ?, assigned_user_name = ? \
             WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(user_id).bind(user_name);
        for id in ids {
            query = query.bind(id);
        }
        let result = query
            .execute(pool)
            .await
            .map_err(|e| Error::store("assign tasks", e))?;
        Ok(result.rows_affected())
    }

    /// Reset the listed tasks to the unassigned sentinels.
    pub async fn unassign_many(&self, ids: &[String]) -> Result<u64, Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let pool = self.db.pool()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE tasks SET assigned_user = '', assigned_user_name = '{UNASSIGNED_NAME}' \
             WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let result = query
            .execute(pool)
            .await
            .map_err(|e| Error::store("unassign tasks", e))?;
        Ok(result.rows_affected())
    }

    /// Reset every task currently assigned to the user.
    pub async fn unassign_all_for(&self, user_id: &str) -> Result<u64, Error> {
        let pool = self.db.pool()?;
        let result = sqlx::query(
            "UPDATE tasks SET assigned_user = '', assigned_user_name = ? \
             WHERE assigned_user = ?",
        )
        .bind(UNASSIGNED_NAME)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| Error::store("unassign tasks", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn store() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("t.db").display());
        let db = Database::connect(&url, 0).await.unwrap();
        (dir, TaskStore::new(db))
    }

    fn sample(name: &str) -> Task {
        Task {
            id: String::new(),
            name: name.to_string(),
            description: String::new(),
            deadline: Utc::now(),
            completed: false,
            assignee: None,
            date_created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_a_uuid_and_round_trips() {
        let (_dir, tasks) = store().await;
        let stored = tasks.insert(sample("Write report")).await.unwrap();
        assert!(Uuid::parse_str(&stored.id).is_ok());

        let fetched = tasks.find_by_id(&stored.id).await.unwrap();
        assert_eq!(fetched.name, "Write report");
        assert!(fetched.assignee.is_none());
    }

    #[tokio::test]
    async fn malformed_and_unknown_ids_are_distinct_errors() {
        let (_dir, tasks) = store().await;
        assert!(matches!(
            tasks.find_by_id("not-a-uuid").await.unwrap_err(),
            Error::InvalidId { entity: Entity::Task }
        ));
        assert!(matches!(
            tasks.find_by_id(&Uuid::new_v4().to_string()).await.unwrap_err(),
            Error::NotFound { entity: Entity::Task }
        ));
    }

    #[tokio::test]
    async fn unassign_all_for_touches_only_that_users_tasks() {
        let (_dir, tasks) = store().await;
        let mut mine = sample("mine");
        mine.assignee = Some(Assignee { user_id: "u-1".into(), user_name: "Ada".into() });
        let mine = tasks.insert(mine).await.unwrap();

        let mut other = sample("other");
        other.assignee = Some(Assignee { user_id: "u-2".into(), user_name: "Grace".into() });
        let other = tasks.insert(other).await.unwrap();

        assert_eq!(tasks.unassign_all_for("u-1").await.unwrap(), 1);
        assert!(tasks.find_by_id(&mine.id).await.unwrap().assignee.is_none());
        assert!(tasks.find_by_id(&other.id).await.unwrap().assignee.is_some());
    }

    #[tokio::test]
    async fn unconfigured_database_reports_unavailable() {
        let tasks = TaskStore::new(Database::unconfigured());
        assert!(matches!(
            tasks.count(&Filter::default()).await.unwrap_err(),
            Error::Unavailable
        ));
    }
}
