//! Thin wrapper around a MySQL connection pool.
//!
//! A [`Database`] starts uninitialized; [`Database::initialize`] creates the
//! pool and checks connectivity once. All query primitives fail with
//! [`DbError::Uninitialized`] until then.

mod rows;
mod value;

use serde_json::{Map, Value};
use sqlx::{
    mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow},
    Executor, FromRow, Transaction,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::DatabaseConfig;

pub use rows::row_to_json;
pub use value::SqlParam;
use value::{arguments, display_params};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database is not initialized, call initialize() first")]
    Uninitialized,
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return DbError::Duplicate(db_err.message().to_string());
            }
        }
        DbError::Sqlx(e)
    }
}

pub struct Database {
    config: DatabaseConfig,
    pool: RwLock<Option<MySqlPool>>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn connect_options(&self, database_name: Option<&str>) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password);
        match database_name.or(self.config.database.as_deref()) {
            Some(name) => options.database(name),
            None => options,
        }
    }

    /// Creates the pool, replacing (and closing) any previous one.
    pub async fn initialize(&self, database_name: Option<&str>) -> Result<(), DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.config.connection_limit)
            .connect_with(self.connect_options(database_name))
            .await
            .map_err(|e| {
                error!(error = %e, host = %self.config.host, port = self.config.port, "database connection failed");
                e
            })?;

        let conn = pool.acquire().await.map_err(|e| {
            error!(error = %e, "database connection check failed");
            e
        })?;
        drop(conn);

        info!(
            host = %self.config.host,
            database = database_name.or(self.config.database.as_deref()).unwrap_or(""),
            "database connection established"
        );

        let previous = self.pool.write().await.replace(pool);
        if let Some(previous) = previous {
            previous.close().await;
        }
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.pool.read().await.is_some()
    }

    pub async fn pool(&self) -> Result<MySqlPool, DbError> {
        self.pool.read().await.clone().ok_or(DbError::Uninitialized)
    }

    pub async fn query<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<T>, DbError>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let pool = self.pool().await?;
        fetch_all(&pool, sql, params).await
    }

    pub async fn query_one<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Option<T>, DbError>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let pool = self.pool().await?;
        fetch_optional(&pool, sql, params).await
    }

    /// Runs a statement of arbitrary shape and returns each row as a JSON object.
    pub async fn query_json(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<Map<String, Value>>, DbError> {
        let pool = self.pool().await?;
        let result = if params.is_empty() {
            // unprepared, so statements the binary protocol rejects still run
            (&pool).fetch_all(sql).await
        } else {
            sqlx::query_with(sql, arguments(params)).fetch_all(&pool).await
        };
        let rows = result.map_err(|e| failed("query", sql, params, e))?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Returns the id assigned by `AUTO_INCREMENT`.
    pub async fn insert(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        let pool = self.pool().await?;
        insert(&pool, sql, params).await
    }

    /// Returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        let pool = self.pool().await?;
        execute(&pool, sql, params).await
    }

    pub async fn begin_transaction(&self) -> Result<DbTransaction, DbError> {
        let pool = self.pool().await?;
        let tx = pool.begin().await?;
        debug!("transaction started");
        Ok(DbTransaction { tx })
    }

    pub async fn commit_transaction(&self, tx: DbTransaction) -> Result<(), DbError> {
        tx.commit().await
    }

    pub async fn rollback_transaction(&self, tx: DbTransaction) -> Result<(), DbError> {
        tx.rollback().await
    }

    /// Initializes on demand and runs `SELECT 1`. Never errors.
    pub async fn test_connection(&self) -> bool {
        if !self.is_initialized().await {
            if let Err(e) = self.initialize(None).await {
                warn!(error = %e, "database connection test failed");
                return false;
            }
        }
        match self.query_one::<(i64,)>("SELECT 1 AS test", &[]).await {
            Ok(Some((1,))) => true,
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "database connection test failed");
                false
            }
        }
    }

    pub async fn get_databases(&self) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> = self
            .query(
                "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME",
                &[],
            )
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Tables of `database_name`, or of the connection's current schema.
    pub async fn get_tables(&self, database_name: Option<&str>) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> = self
            .query(
                r#"
                SELECT TABLE_NAME
                FROM information_schema.TABLES
                WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
                ORDER BY TABLE_NAME
                "#,
                &[SqlParam::from(database_name)],
            )
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Column layout of a table in the current schema, shaped like `DESCRIBE`.
    pub async fn describe_table(&self, table: &str) -> Result<Vec<Map<String, Value>>, DbError> {
        self.query_json(
            r#"
            SELECT COLUMN_NAME AS `Field`, COLUMN_TYPE AS `Type`, IS_NULLABLE AS `Null`,
                   COLUMN_KEY AS `Key`, COLUMN_DEFAULT AS `Default`, EXTRA AS `Extra`
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#,
            &[SqlParam::from(table)],
        )
        .await
    }

    pub async fn close(&self) {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            debug!("database pool closed");
        }
    }
}

/// A transaction holding one pooled connection.
///
/// The connection goes back to the pool on commit, rollback or drop; a
/// transaction dropped without commit is rolled back.
pub struct DbTransaction {
    tx: Transaction<'static, MySql>,
}

impl DbTransaction {
    pub async fn query<T>(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<T>, DbError>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        fetch_all(&mut *self.tx, sql, params).await
    }

    pub async fn query_one<T>(&mut self, sql: &str, params: &[SqlParam]) -> Result<Option<T>, DbError>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        fetch_optional(&mut *self.tx, sql, params).await
    }

    pub async fn insert(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        insert(&mut *self.tx, sql, params).await
    }

    pub async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        execute(&mut *self.tx, sql, params).await
    }

    pub async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await.map_err(|e| {
            error!(error = %e, "transaction commit failed");
            DbError::from(e)
        })?;
        debug!("transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback().await.map_err(|e| {
            error!(error = %e, "transaction rollback failed");
            DbError::from(e)
        })?;
        debug!("transaction rolled back");
        Ok(())
    }
}

fn failed(op: &'static str, sql: &str, params: &[SqlParam], e: sqlx::Error) -> DbError {
    error!(
        error = %e,
        op,
        sql = sql.trim(),
        params = %display_params(params),
        "sql statement failed"
    );
    DbError::from(e)
}

async fn fetch_all<'e, E, T>(executor: E, sql: &str, params: &[SqlParam]) -> Result<Vec<T>, DbError>
where
    E: Executor<'e, Database = MySql>,
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    sqlx::query_as_with::<_, T, _>(sql, arguments(params))
        .fetch_all(executor)
        .await
        .map_err(|e| failed("query", sql, params, e))
}

async fn fetch_optional<'e, E, T>(
    executor: E,
    sql: &str,
    params: &[SqlParam],
) -> Result<Option<T>, DbError>
where
    E: Executor<'e, Database = MySql>,
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    sqlx::query_as_with::<_, T, _>(sql, arguments(params))
        .fetch_optional(executor)
        .await
        .map_err(|e| failed("query", sql, params, e))
}

async fn insert<'e, E>(executor: E, sql: &str, params: &[SqlParam]) -> Result<u64, DbError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query_with(sql, arguments(params))
        .execute(executor)
        .await
        .map_err(|e| failed("insert", sql, params, e))?;
    Ok(result.last_insert_id())
}

async fn execute<'e, E>(executor: E, sql: &str, params: &[SqlParam]) -> Result<u64, DbError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query_with(sql, arguments(params))
        .execute(executor)
        .await
        .map_err(|e| failed("execute", sql, params, e))?;
    Ok(result.rows_affected())
}
