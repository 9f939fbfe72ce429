//! SQLite database layer (embedded, no external dependencies)

use super::CarStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use carlot_types::{Car, NewCar};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        // Create parent directory if needed
        if let Some(parent) = std::path::Path::new(database_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, one connection so every query sees the same data
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        tracing::info!("SQLite connection established, running migrations...");

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                year INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CarStore for Database {
    async fn reset(&self, seed: &[NewCar]) -> Result<Vec<Car>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cars").execute(&mut *tx).await?;

        // Restart AUTOINCREMENT so seeded ids are stable across restarts
        sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'cars'")
            .execute(&mut *tx)
            .await?;

        let mut cars = Vec::with_capacity(seed.len());
        for car in seed {
            let result = sqlx::query(
                r#"
                INSERT INTO cars (name, year) VALUES (?1, ?2)
                "#,
            )
            .bind(&car.name)
            .bind(car.year)
            .execute(&mut *tx)
            .await?;

            cars.push(Car::from_new(result.last_insert_rowid(), car.clone()));
        }

        tx.commit().await.context("Failed to commit reseed")?;

        Ok(cars)
    }

    async fn list(&self) -> Result<Vec<Car>> {
        let rows: Vec<CarRow> = sqlx::query_as(
            r#"
            SELECT id, name, year FROM cars ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// Helper struct for sqlx query_as
#[derive(sqlx::FromRow)]
struct CarRow {
    id: i64,
    name: String,
    year: i64,
}

impl From<CarRow> for Car {
    fn from(r: CarRow) -> Self {
        Car {
            id: r.id,
            name: r.name,
            year: r.year,
        }
    }
}
