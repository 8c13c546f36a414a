use std::sync::Arc;

use async_trait::async_trait;
use sqlx::error::Error as SqlxError;

use crate::db::{Database, DbError, SqlParam};
use crate::users::repo_types::{User, UserChanges};

/// Persistence operations the user handlers depend on.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self, limit: u32, offset: u64) -> Result<Vec<User>, DbError>;
    async fn count(&self) -> Result<u64, DbError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<User>, DbError>;
    /// Id of the user owning `email`, ignoring `excluding` if given.
    async fn find_id_by_email(&self, email: &str, excluding: Option<u64>)
        -> Result<Option<u64>, DbError>;
    async fn create(&self, name: &str, email: &str) -> Result<User, DbError>;
    /// `None` when the row no longer exists.
    async fn update(&self, id: u64, changes: &UserChanges) -> Result<Option<User>, DbError>;
    /// Number of deleted rows.
    async fn delete(&self, id: u64) -> Result<u64, DbError>;
}

pub struct MySqlUserStore {
    db: Arc<Database>,
}

impl MySqlUserStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for MySqlUserStore {
    async fn list(&self, limit: u32, offset: u64) -> Result<Vec<User>, DbError> {
        self.db
            .query(
                r#"
                SELECT id, name, email, created_at, updated_at
                FROM users
                ORDER BY id
                LIMIT ? OFFSET ?
                "#,
                &[SqlParam::from(limit), SqlParam::from(offset)],
            )
            .await
    }

    async fn count(&self) -> Result<u64, DbError> {
        let total: Option<(i64,)> = self
            .db
            .query_one("SELECT COUNT(*) AS total FROM users", &[])
            .await?;
        Ok(total.map(|(n,)| n.max(0) as u64).unwrap_or(0))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, DbError> {
        self.db
            .query_one(
                "SELECT id, name, email, created_at, updated_at FROM users WHERE id = ?",
                &[SqlParam::from(id)],
            )
            .await
    }

    async fn find_id_by_email(
        &self,
        email: &str,
        excluding: Option<u64>,
    ) -> Result<Option<u64>, DbError> {
        let row: Option<(u64,)> = match excluding {
            Some(id) => {
                self.db
                    .query_one(
                        "SELECT id FROM users WHERE email = ? AND id <> ?",
                        &[SqlParam::from(email), SqlParam::from(id)],
                    )
                    .await?
            }
            None => {
                self.db
                    .query_one(
                        "SELECT id FROM users WHERE email = ?",
                        &[SqlParam::from(email)],
                    )
                    .await?
            }
        };
        Ok(row.map(|(id,)| id))
    }

    async fn create(&self, name: &str, email: &str) -> Result<User, DbError> {
        let id = self
            .db
            .insert(
                "INSERT INTO users (name, email, created_at, updated_at) VALUES (?, ?, NOW(), NOW())",
                &[SqlParam::from(name), SqlParam::from(email)],
            )
            .await?;
        self.find_by_id(id)
            .await?
            .ok_or(DbError::Sqlx(SqlxError::RowNotFound))
    }

    async fn update(&self, id: u64, changes: &UserChanges) -> Result<Option<User>, DbError> {
        let mut tx = self.db.begin_transaction().await?;

        let locked: Option<(u64,)> = tx
            .query_one(
                "SELECT id FROM users WHERE id = ? FOR UPDATE",
                &[SqlParam::from(id)],
            )
            .await?;
        if locked.is_none() {
            self.db.rollback_transaction(tx).await?;
            return Ok(None);
        }

        let (sql, params) = update_statement(id, changes);
        tx.execute(&sql, &params).await?;

        let user: Option<User> = tx
            .query_one(
                "SELECT id, name, email, created_at, updated_at FROM users WHERE id = ?",
                &[SqlParam::from(id)],
            )
            .await?;
        self.db.commit_transaction(tx).await?;
        Ok(user)
    }

    async fn delete(&self, id: u64) -> Result<u64, DbError> {
        self.db
            .execute("DELETE FROM users WHERE id = ?", &[SqlParam::from(id)])
            .await
    }
}

/// `UPDATE` for the set fields of `changes`; the id is the last parameter.
fn update_statement(id: u64, changes: &UserChanges) -> (String, Vec<SqlParam>) {
    let mut sets = Vec::with_capacity(3);
    let mut params = Vec::with_capacity(3);
    if let Some(name) = &changes.name {
        sets.push("name = ?");
        params.push(SqlParam::from(name.as_str()));
    }
    if let Some(email) = &changes.email {
        sets.push("email = ?");
        params.push(SqlParam::from(email.as_str()));
    }
    sets.push("updated_at = NOW()");
    params.push(SqlParam::from(id));

    // column names come from the fixed list above, values are bound
    let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
    (sql, params)
}
