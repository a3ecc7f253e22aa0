//! Database migrations using sqlx built-in migration system.
//!
//! Migrations are stored in the `migrations/` directory.
//! Each migration file is named `NNNN_description.sql`.

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;

use crate::errors::BotResult;

// Embed migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run all pending migrations using sqlx migrate
pub async fn run_migrations(pool: &SqlitePool) -> BotResult<()> {
    MIGRATOR.run(pool).await?;

    log::info!("Database migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn baseline_applies_over_existing_tables() {
        let pool = memory_pool().await;
        // a database created before migrations were tracked
        sqlx::raw_sql(
            "CREATE TABLE users (user_id INTEGER PRIMARY KEY, username TEXT, first_name TEXT,
                last_name TEXT, language_code TEXT, is_bot BOOLEAN DEFAULT 0,
                is_premium BOOLEAN DEFAULT 0, first_interaction TEXT, last_interaction TEXT,
                total_downloads INTEGER DEFAULT 0, is_active BOOLEAN DEFAULT 1);
             INSERT INTO users (user_id, first_name) VALUES (1, 'Ann');",
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
        let downloads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(downloads, 0);
    }
}
