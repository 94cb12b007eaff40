use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Owns the connection pool and schema for the persistent store (spec §6):
/// `trades`, `ai_decisions`, `balance_history`. Grounded on the teacher's
/// `infrastructure::persistence::database::Database`.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite database")?;

        info!(%db_url, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                trade_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                exit_price TEXT,
                leverage TEXT NOT NULL,
                fee TEXT NOT NULL,
                entry_ts INTEGER NOT NULL,
                exit_ts INTEGER,
                pnl TEXT,
                status TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_decisions (
                decision_id TEXT PRIMARY KEY,
                trade_id TEXT,
                ts INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                decision TEXT NOT NULL,
                confidence REAL NOT NULL,
                reasoning TEXT NOT NULL,
                current_price TEXT NOT NULL,
                indicators_blob TEXT NOT NULL,
                executed BOOLEAN NOT NULL,
                error TEXT
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create ai_decisions table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ai_decisions_symbol_ts
            ON ai_decisions (symbol, ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create ai_decisions index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balance_history (
                ts INTEGER PRIMARY KEY,
                balance TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create balance_history table")?;

        info!("database schema initialized");
        Ok(())
    }
}
