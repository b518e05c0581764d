//! Startup and health-check inspection of the SQLite schema.

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

/// Tables the HTTP API cannot work without
pub const REQUIRED_TABLES: &[&str] = &[
    "profiles",
    "affiliates",
    "affiliate_links",
    "affiliate_clicks",
    "affiliate_commissions",
    "affiliate_payouts",
    "matches",
    "predictions",
    "quiz_questions",
    "quiz_sessions",
    "news_articles",
    "news_comments",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct DatabaseHealth {
    pub initialized: bool,
    pub migrations_applied: i64,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
}

impl DatabaseHealth {
    pub fn is_ok(&self) -> bool {
        self.initialized && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!("Database is missing tables: {}", self.missing_tables.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn validate(&self) -> Result<DatabaseHealth, DatabaseValidationError> {
        let initialized = self.table_exists("_sqlx_migrations").await?;
        if !initialized {
            warn!("Database not initialized - _sqlx_migrations table does not exist");
            return Ok(DatabaseHealth {
                initialized,
                migrations_applied: 0,
                latest_migration: None,
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
            });
        }

        let migrations_applied = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        let latest_migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let mut missing_tables = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing_tables.push(table.to_string());
            }
        }

        let health = DatabaseHealth {
            initialized,
            migrations_applied,
            latest_migration,
            missing_tables,
        };
        info!(
            migrations_applied = health.migrations_applied,
            ok = health.is_ok(),
            "Database validation complete"
        );
        Ok(health)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn test_migrated_database_is_healthy() {
        let db = DBService::new_in_memory().await.unwrap();
        let health = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();

        assert!(health.is_ok(), "{}", health.summary());
        assert!(health.migrations_applied >= 5);
        assert_eq!(health.latest_migration.as_deref(), Some("news"));
    }
}
