//! User persistence facade.
//!
//! `pending_tasks` is stored as a JSON array in a TEXT column. The two
//! single-id mutators ([`UserStore::push_pending`], [`UserStore::pull_pending`])
//! read-modify-write the list and skip the write when nothing changes.

use uuid::Uuid;

use super::{render_order, render_page, render_where, Database, SqlArg};
use crate::error::{Entity, Error};
use crate::model::{datetime, User};
use crate::query::{Filter, QueryPlan};

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    /// JSON array of task ids.
    pending_tasks: String,
    date_created: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            pending_tasks: serde_json::from_str(&row.pending_tasks).unwrap_or_default(),
            date_created: datetime::parse_stored(&row.date_created),
        }
    }
}

fn encode_pending(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn find_many(&self, plan: &QueryPlan) -> Result<Vec<User>, Error> {
        let pool = self.db.pool()?;
        let (where_sql, args) = render_where(&plan.filter);
        let sql = format!(
            "SELECT * FROM users{where_sql}{}{}",
            render_order(&plan.sort),
            render_page(plan)
        );
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
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
            .map_err(|e| Error::store("retrieve users", e))?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, Error> {
        let pool = self.db.pool()?;
        let (where_sql, args) = render_where(filter);
        let sql = format!("SELECT COUNT(*) FROM users{where_sql}");
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
            .map_err(|e| Error::store("count users", e))?;
        Ok(n as u64)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<User, Error> {
        if Uuid::parse_str(id).is_err() {
            return Err(Error::InvalidId { entity: Entity::User });
        }
        let pool = self.db.pool()?;
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::store("retrieve user", e))?;
        row.map(User::from).ok_or(Error::NotFound { entity: Entity::User })
    }

    /// Insert the user, assigning a fresh id unless the caller fixed one.
    /// A taken email reports [`Error::DuplicateEmail`].
    pub async fn insert(&self, mut user: User) -> Result<User, Error> {
        let pool = self.db.pool()?;
        if user.id.is_empty() {
            user.id = Uuid::new_v4().to_string();
        }
        sqlx::query(
            "INSERT INTO users (id, name, email, pending_tasks, date_created) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(encode_pending(&user.pending_tasks))
        .bind(datetime::format_stored(&user.date_created))
        .execute(pool)
        .await
        .map_err(|e| Error::user_write("create user", e))?;
        Ok(user)
    }

    /// Full-row overwrite keyed by `user.id`. `date_created` is immutable.
    pub async fn replace(&self, user: &User) -> Result<(), Error> {
        let pool = self.db.pool()?;
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, pending_tasks = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(encode_pending(&user.pending_tasks))
        .bind(&user.id)
        .execute(pool)
        .await
        .map_err(|e| Error::user_write("update user", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound { entity: Entity::User });
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let pool = self.db.pool()?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| Error::store("delete user", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound { entity: Entity::User });
        }
        Ok(())
    }

    /// Append `task_id` to the user's pending list unless already present.
    /// Returns whether the list changed.
    pub async fn push_pending(&self, user_id: &str, task_id: &str) -> Result<bool, Error> {
        let user = self.find_by_id(user_id).await?;
        if user.pending_tasks.iter().any(|t| t == task_id) {
            return Ok(false);
        }
        let mut pending = user.pending_tasks;
        pending.push(task_id.to_string());
        self.write_pending(user_id, &pending).await?;
        Ok(true)
    }

    /// Remove `task_id` from the user's pending list if present.
    /// Returns whether the list changed.
    pub async fn pull_pending(&self, user_id: &str, task_id: &str) -> Result<bool, Error> {
        let user = self.find_by_id(user_id).await?;
        if !user.pending_tasks.iter().any(|t| t == task_id) {
            return Ok(false);
        }
        let pending: Vec<String> = user
            .pending_tasks
            .into_iter()
            .filter(|t| t != task_id)
            .collect();
        self.write_pending(user_id, &pending).await?;
        Ok(true)
    }

    async fn write_pending(&self, user_id: &str, pending: &[String]) -> Result<(), Error> {
        let pool = self.db.pool()?;
        sqlx::query("UPDATE users SET pending_tasks = ? WHERE id = ?")
            .bind(encode_pending(pending))
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|e| Error::store("update user", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn store() -> (TempDir, UserStore) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("u.db").display());
        let db = Database::connect(&url, 0).await.unwrap();
        (dir, UserStore::new(db))
    }

    fn sample(email: &str) -> User {
        User {
            id: String::new(),
            name: "Ada".to_string(),
            email: email.to_string(),
            pending_tasks: Vec::new(),
            date_created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_reported_as_such() {
        let (_dir, users) = store().await;
        users.insert(sample("ada@example.com")).await.unwrap();
        let err = users.insert(sample("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail));
    }

    #[tokio::test]
    async fn push_and_pull_pending_are_idempotent() {
        let (_dir, users) = store().await;
        let user = users.insert(sample("ada@example.com")).await.unwrap();

        assert!(users.push_pending(&user.id, "t-1").await.unwrap());
        assert!(!users.push_pending(&user.id, "t-1").await.unwrap());
        assert_eq!(
            users.find_by_id(&user.id).await.unwrap().pending_tasks,
            vec!["t-1"]
        );

        assert!(users.pull_pending(&user.id, "t-1").await.unwrap());
        assert!(!users.pull_pending(&user.id, "t-1").await.unwrap());
        assert!(users.find_by_id(&user.id).await.unwrap().pending_tasks.is_empty());
    }

    #[tokio::test]
    async fn pending_mutators_require_the_user_to_exist() {
        let (_dir, users) = store().await;
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            users.push_pending(&missing, "t-1").await.unwrap_err(),
            Error::NotFound { entity: Entity::User }
        ));
    }

    #[tokio::test]
    async fn malformed_user_id_is_invalid() {
        let (_dir, users) = store().await;
        assert!(matches!(
            users.find_by_id("42").await.unwrap_err(),
            Error::InvalidId { entity: Entity::User }
        ));
    }
}
