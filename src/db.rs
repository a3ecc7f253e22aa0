//! Usage store: users and their download attempts.
//!
//! Every public operation runs in a single short transaction. Failures are
//! logged and turned into `false` / `None` / an empty list so a broken
//! database never takes a handler down with it.

use std::{
    collections::HashMap,
    fmt::Write as _,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use teloxide::types::User;
use tokio::fs;

use crate::{
    errors::{BotError, BotResult},
    migrations,
};

/// How many users `statistics` ranks
pub const TOP_USERS_LIMIT: i64 = 10;

/// Mutable profile fields taken from every inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_bot: bool,
    pub is_premium: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.0 as i64,
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()).filter(|n| !n.is_empty()),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
            is_bot: user.is_bot,
            is_premium: user.is_premium,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_bot: bool,
    pub is_premium: bool,
    pub first_interaction: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    pub total_downloads: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DownloadEvent {
    pub id: i64,
    pub user_id: i64,
    pub video_url: String,
    pub video_title: Option<String>,
    pub download_time: DateTime<Utc>,
    pub file_size: Option<i64>,
    pub success: bool,
}

/// Outcome of one download attempt, ready to be recorded
#[derive(Debug, Clone)]
pub struct NewDownload<'a> {
    pub user_id: i64,
    pub video_url: &'a str,
    pub video_title: Option<&'a str>,
    pub file_size: Option<u64>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserWithHistory {
    #[serde(flatten)]
    pub user: UserRecord,
    pub downloads: Vec<DownloadEvent>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub download_count: i64,
}

impl TopUser {
    pub fn display_name(&self) -> String {
        self.first_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref().filter(|n| !n.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("ID{}", self.user_id))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total_users: i64,
    pub active_users: i64,
    pub total_downloads: i64,
    pub successful_downloads: i64,
    /// Percentage of successful downloads, 0 when nothing was downloaded yet
    pub success_rate: f64,
    pub top_users: Vec<TopUser>,
}

pub fn success_rate(successful: i64, total: i64) -> f64 {
    if total > 0 {
        successful as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

#[derive(Serialize)]
struct ExportDocument {
    export_time: DateTime<Utc>,
    total_users: usize,
    users: Vec<UserWithHistory>,
}

const USER_COLUMNS: &str = "user_id, username, first_name, last_name, language_code, is_bot, \
     is_premium, first_interaction, last_interaction, total_downloads, is_active";

const DOWNLOAD_COLUMNS: &str =
    "id, user_id, video_url, video_title, download_time, file_size, success";

/// Tables that never end up in an SQL export
const INTERNAL_TABLE: &str = "_sqlx_migrations";

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database and bring the schema up to date
    pub async fn connect(database_url: &str) -> BotResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // One connection, kept for the lifetime of the process.
        // In-memory databases live exactly as long as their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;
        log::info!("Connected to database {}", database_url);

        Ok(Self { pool })
    }

    // ==================== Users ====================

    /// Insert the user if unseen, otherwise refresh profile fields and last-seen
    pub async fn upsert_user(&self, profile: &UserProfile) -> bool {
        match self.try_upsert_user(profile).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error saving user {}: {}", profile.user_id, e);
                false
            }
        }
    }

    async fn try_upsert_user(&self, profile: &UserProfile) -> BotResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name, language_code,
                               is_bot, is_premium, first_interaction, last_interaction)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                language_code = excluded.language_code,
                is_bot = excluded.is_bot,
                is_premium = excluded.is_premium,
                last_interaction = excluded.last_interaction
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.language_code)
        .bind(profile.is_bot)
        .bind(profile.is_premium)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn user_ids(&self) -> Vec<i64> {
        let result = sqlx::query_scalar::<_, i64>("SELECT user_id FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await;

        result.unwrap_or_else(|e| {
            log::error!("Error listing user ids: {}", e);
            Vec::new()
        })
    }

    // ==================== Downloads ====================

    /// Store a download attempt and bump the owner's counter.
    /// Fails (and stores nothing) for unknown users.
    pub async fn record_download(&self, download: &NewDownload<'_>) -> bool {
        match self.try_record_download(download).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Error recording download of {} for user {}: {}",
                    download.video_url,
                    download.user_id,
                    e
                );
                false
            }
        }
    }

    async fn try_record_download(&self, download: &NewDownload<'_>) -> BotResult<()> {
        let now = Utc::now();
        let file_size = download.file_size.map(|s| s as i64);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO downloads (user_id, video_url, video_title, download_time, file_size, success) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(download.user_id)
        .bind(download.video_url)
        .bind(download.video_title)
        .bind(now)
        .bind(file_size)
        .bind(download.success)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE users SET total_downloads = total_downloads + 1, last_interaction = ? \
             WHERE user_id = ?",
        )
        .bind(now)
        .bind(download.user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            // dropping the transaction rolls the insert back
            return Err(BotError::general(format!(
                "user {} does not exist",
                download.user_id
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn user_with_history(&self, user_id: i64) -> Option<UserWithHistory> {
        match self.try_user_with_history(user_id).await {
            Ok(user) => user,
            Err(e) => {
                log::error!("Error getting user info for {}: {}", user_id, e);
                None
            }
        }
    }

    async fn try_user_with_history(&self, user_id: i64) -> BotResult<Option<UserWithHistory>> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        let downloads = sqlx::query_as::<_, DownloadEvent>(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads WHERE user_id = ? \
             ORDER BY download_time DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(UserWithHistory { user, downloads }))
    }

    pub async fn all_users_with_history(&self) -> Vec<UserWithHistory> {
        match self.try_all_users_with_history().await {
            Ok(users) => users,
            Err(e) => {
                log::error!("Error getting all users: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_all_users_with_history(&self) -> BotResult<Vec<UserWithHistory>> {
        let mut tx = self.pool.begin().await?;

        let users = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY first_interaction DESC, user_id"
        ))
        .fetch_all(&mut *tx)
        .await?;

        let downloads = sqlx::query_as::<_, DownloadEvent>(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads ORDER BY download_time DESC, id DESC"
        ))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_user: HashMap<i64, Vec<DownloadEvent>> = HashMap::new();
        for download in downloads {
            by_user.entry(download.user_id).or_default().push(download);
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let downloads = by_user.remove(&user.user_id).unwrap_or_default();
                UserWithHistory { user, downloads }
            })
            .collect())
    }

    // ==================== Reporting ====================

    pub async fn statistics(&self) -> Option<Statistics> {
        match self.try_statistics().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                log::error!("Error getting statistics: {}", e);
                None
            }
        }
    }

    async fn try_statistics(&self) -> BotResult<Statistics> {
        let mut tx = self.pool.begin().await?;

        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        let active_users =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_active = 1")
                .fetch_one(&mut *tx)
                .await?;
        let total_downloads = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloads")
            .fetch_one(&mut *tx)
            .await?;
        let successful_downloads =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloads WHERE success = 1")
                .fetch_one(&mut *tx)
                .await?;

        let top_users = sqlx::query_as::<_, TopUser>(
            r#"
            SELECT u.user_id, u.username, u.first_name, COUNT(d.id) AS download_count
            FROM users u
            LEFT JOIN downloads d ON u.user_id = d.user_id
            GROUP BY u.user_id
            ORDER BY download_count DESC, u.user_id ASC
            LIMIT ?
            "#,
        )
        .bind(TOP_USERS_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Statistics {
            total_users,
            active_users,
            total_downloads,
            successful_downloads,
            success_rate: success_rate(successful_downloads, total_downloads),
            top_users,
        })
    }

    // ==================== Exports ====================

    /// Write every user with history as a JSON document into `dir`.
    /// Returns `None` if the export couldn't be produced.
    pub async fn export_json(&self, dir: &Path) -> Option<PathBuf> {
        let path = dir.join(format!("users_export_{}.json", export_stamp()));
        match self.try_export_json(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                log::error!("Error exporting to JSON: {}", e);
                let _ = fs::remove_file(&path).await;
                None
            }
        }
    }

    async fn try_export_json(&self, path: &Path) -> BotResult<()> {
        let users = self.try_all_users_with_history().await?;
        let document = ExportDocument {
            export_time: Utc::now(),
            total_users: users.len(),
            users,
        };
        fs::write(path, serde_json::to_string_pretty(&document)?).await?;
        Ok(())
    }

    /// Write schema and data as a replayable SQL script into `dir`.
    /// Returns `None` if the export couldn't be produced.
    pub async fn export_sql(&self, dir: &Path) -> Option<PathBuf> {
        let path = dir.join(format!("database_export_{}.sql", export_stamp()));
        let script = match self.dump_sql().await {
            Ok(script) => script,
            Err(e) => {
                log::error!("Error exporting to SQL: {}", e);
                return None;
            }
        };

        match fs::write(&path, script).await {
            Ok(()) => Some(path),
            Err(e) => {
                log::error!("Error writing SQL export {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn dump_sql(&self) -> BotResult<String> {
        let mut tx = self.pool.begin().await?;
        let mut out = String::new();

        let _ = writeln!(out, "-- Database export created at {}", Utc::now().to_rfc3339());
        out.push_str("-- Bot Database Export\n\n");
        // tables are dumped by name, not in foreign key order
        out.push_str("PRAGMA foreign_keys=OFF;\n");
        out.push_str("BEGIN TRANSACTION;\n");

        let tables = sqlx::query_as::<_, (String, String)>(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND sql IS NOT NULL AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             AND name != ? ORDER BY name",
        )
        .bind(INTERNAL_TABLE)
        .fetch_all(&mut *tx)
        .await?;

        for (table, ddl) in tables {
            let _ = writeln!(out, "{};", ddl);

            let columns =
                sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                    .bind(&table)
                    .fetch_all(&mut *tx)
                    .await?;
            if columns.is_empty() {
                continue;
            }

            let rows = sqlx::query_scalar::<_, String>(&insert_statements_query(&table, &columns))
                .fetch_all(&mut *tx)
                .await?;
            for row in rows {
                out.push_str(&row);
                out.push('\n');
            }
        }

        let extras = sqlx::query_scalar::<_, String>(
            "SELECT sql FROM sqlite_master \
             WHERE type IN ('index', 'trigger', 'view') AND sql IS NOT NULL AND tbl_name != ? \
             ORDER BY name",
        )
        .bind(INTERNAL_TABLE)
        .fetch_all(&mut *tx)
        .await?;
        for ddl in extras {
            let _ = writeln!(out, "{};", ddl);
        }

        out.push_str("COMMIT;\n");
        tx.commit().await?;
        Ok(out)
    }
}

fn export_stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// A query that lets SQLite render one `INSERT` per row, using `quote()`
/// so every value comes out as a valid SQL literal.
fn insert_statements_query(table: &str, columns: &[String]) -> String {
    let table = quote_identifier(table);
    let values = columns
        .iter()
        .map(|c| format!("quote({})", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(" || ',' || ");

    format!(
        "SELECT {} || {} || ');' FROM {}",
        quote_literal(&format!("INSERT INTO {} VALUES(", table)),
        values,
        table
    )
}
