//! PostgreSQL state manager

use super::SyncStore;
use crate::config::DatabaseConfig;
use crate::error::{BotError, BotResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};

/// State manager for PostgreSQL persistence
pub struct StateManager {
    pool: PgPool,
}

/// One persisted sync cursor
#[derive(Debug, Clone, Serialize)]
pub struct SyncState {
    pub name: String,
    pub height: u64,
    pub updated_at: DateTime<Utc>,
}

impl StateManager {
    /// Create a new state manager
    pub async fn new(config: &DatabaseConfig) -> BotResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> BotResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_state (
                name VARCHAR(64) PRIMARY KEY,
                height BIGINT NOT NULL CHECK (height >= 0),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenger_coin (
                l2_denom VARCHAR(128) PRIMARY KEY,
                l1_struct_tag VARCHAR(256) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenger_output (
                output_index BIGINT PRIMARY KEY CHECK (output_index >= 0),
                output_root VARCHAR(128) NOT NULL,
                l2_block_number BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> BotResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// All persisted sync cursors, ordered by name
    pub async fn all_states(&self) -> BotResult<Vec<SyncState>> {
        let rows = sqlx::query("SELECT name, height, updated_at FROM sync_state ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SyncState {
                name: row.get("name"),
                height: row.get::<i64, _>("height") as u64,
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}

#[async_trait]
impl SyncStore for StateManager {
    async fn load_height(&self, name: &str) -> BotResult<Option<u64>> {
        let row = sqlx::query("SELECT height FROM sync_state WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<i64, _>("height") as u64))
    }

    async fn create_state(&self, name: &str, height: u64) -> BotResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (name, height, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(height as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("Created sync state for {} at height {}", name, height);
        Ok(())
    }

    async fn update_height(&self, name: &str, height: u64) -> BotResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_state
            SET height = $2, updated_at = $3
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(height as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::Internal(format!(
                "sync state for {} does not exist",
                name
            )));
        }

        debug!("Saved height {} for {}", height, name);
        Ok(())
    }

    async fn coin_struct_tag(&self, l2_denom: &str) -> BotResult<String> {
        let row = sqlx::query("SELECT l1_struct_tag FROM challenger_coin WHERE l2_denom = $1")
            .bind(l2_denom)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.get::<String, _>("l1_struct_tag"))
            .ok_or_else(|| BotError::CoinNotFound(l2_denom.to_string()))
    }

    async fn last_output_index(&self) -> BotResult<Option<u64>> {
        let row = sqlx::query(
            "SELECT output_index FROM challenger_output ORDER BY output_index DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("output_index") as u64))
    }
}
