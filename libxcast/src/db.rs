//! Database operations for xcast
//!
//! Accounts, CSV text banks and hourly schedules live here; posts are in
//! [`crate::store`]. List-valued columns are JSON text and are only ever
//! encoded or decoded through [`encode_list`] and [`decode_list`].

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{DbError, Result, XcastError};
use crate::types::{
    Account, AccountId, CsvTextBank, HourlySchedule, HourlyScheduleUpdate, NewHourlySchedule,
};
use crate::vault::{SealedCredentials, SealedUpdate};

/// Maximum number of snippets in a CSV text bank
pub const MAX_CSV_TEXTS: usize = 100;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    ///
    /// Accepts a `sqlite:` URL or a plain file path; `~` is expanded in paths.
    pub async fn new(url_or_path: &str) -> Result<Self> {
        let url = if url_or_path.starts_with("sqlite:") {
            url_or_path.to_string()
        } else {
            let expanded_path = shellexpand::tilde(url_or_path).to_string();
            let path = Path::new(&expanded_path);

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }

            format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"))
        };

        let in_memory = url.contains(":memory:");

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DbError::SqlxError)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let options = if in_memory {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        };

        // Each connection to :memory: would see its own empty database
        let max_connections = if in_memory { 1 } else { 8 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        tracing::debug!(url = %url, "Database ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert an account whose credentials are already sealed
    pub async fn create_account(
        &self,
        name: &str,
        sealed: &SealedCredentials,
        now: i64,
    ) -> Result<Account> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (name, api_key, api_secret, access_token, access_token_secret, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&sealed.api_key)
        .bind(&sealed.api_secret)
        .bind(&sealed.access_token)
        .bind(&sealed.access_token_secret)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(Account {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            api_key: sealed.api_key.clone(),
            api_secret: sealed.api_secret.clone(),
            access_token: sealed.access_token.clone(),
            access_token_secret: sealed.access_token_secret.clone(),
            created_at: now,
        })
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, api_key, api_secret, access_token, access_token_secret, created_at
            FROM accounts WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.as_ref().map(account_from_row))
    }

    /// Like [`get_account`](Self::get_account) but unknown ids are an error
    pub async fn require_account(&self, id: AccountId) -> Result<Account> {
        self.get_account(id)
            .await?
            .ok_or_else(|| XcastError::not_found("account", id))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, api_key, api_secret, access_token, access_token_secret, created_at
            FROM accounts ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    /// Apply a partial update; `None` fields keep their stored value
    pub async fn update_account(&self, id: AccountId, update: &SealedUpdate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                name = COALESCE(?, name),
                api_key = COALESCE(?, api_key),
                api_secret = COALESCE(?, api_secret),
                access_token = COALESCE(?, access_token),
                access_token_secret = COALESCE(?, access_token_secret)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.api_key)
        .bind(&update.api_secret)
        .bind(&update.access_token)
        .bind(&update.access_token_secret)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(XcastError::not_found("account", id));
        }
        Ok(())
    }

    /// The account's text bank; empty when nothing was saved yet
    pub async fn get_csv_texts(&self, account_id: AccountId) -> Result<CsvTextBank> {
        let row = sqlx::query("SELECT texts, updated_at FROM csv_texts WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        match row {
            Some(row) => Ok(CsvTextBank {
                account_id,
                texts: decode_list("csv_texts.texts", row.get("texts"))?,
                updated_at: Some(row.get("updated_at")),
            }),
            None => Ok(CsvTextBank {
                account_id,
                texts: vec![],
                updated_at: None,
            }),
        }
    }

    /// Replace the account's text bank; blank snippets are dropped
    pub async fn save_csv_texts(
        &self,
        account_id: AccountId,
        texts: &[String],
        now: i64,
    ) -> Result<CsvTextBank> {
        let texts: Vec<String> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if texts.len() > MAX_CSV_TEXTS {
            return Err(XcastError::InvalidInput(format!(
                "at most {} texts per account, got {}",
                MAX_CSV_TEXTS,
                texts.len()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO csv_texts (account_id, texts, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET texts = excluded.texts, updated_at = excluded.updated_at
            "#,
        )
        .bind(account_id)
        .bind(encode_list(&texts)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(CsvTextBank {
            account_id,
            texts,
            updated_at: Some(now),
        })
    }

    pub async fn create_hourly_schedule(
        &self,
        account_id: AccountId,
        schedule: &NewHourlySchedule,
        now: i64,
    ) -> Result<HourlySchedule> {
        let name = validate_schedule_name(&schedule.name)?;
        let hours = crate::hourly::normalize_hours(&schedule.hours)?;

        let result = sqlx::query(
            r#"
            INSERT INTO hourly_schedules (account_id, name, hours, start_date, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(&name)
        .bind(encode_list(&hours)?)
        .bind(schedule.start_date.map(|d| d.to_string()))
        .bind(schedule.is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(HourlySchedule {
            id: result.last_insert_rowid(),
            account_id,
            name,
            hours,
            start_date: schedule.start_date,
            is_active: schedule.is_active,
            created_at: now,
        })
    }

    pub async fn list_hourly_schedules(&self, account_id: AccountId) -> Result<Vec<HourlySchedule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, name, hours, start_date, is_active, created_at
            FROM hourly_schedules WHERE account_id = ? ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(schedule_from_row).collect()
    }

    /// A schedule belonging to the given account
    pub async fn get_hourly_schedule(
        &self,
        account_id: AccountId,
        id: i64,
    ) -> Result<HourlySchedule> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, name, hours, start_date, is_active, created_at
            FROM hourly_schedules WHERE id = ? AND account_id = ?
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        match row {
            Some(row) => schedule_from_row(&row),
            None => Err(XcastError::not_found("hourly schedule", id)),
        }
    }

    pub async fn update_hourly_schedule(
        &self,
        account_id: AccountId,
        id: i64,
        update: &HourlyScheduleUpdate,
    ) -> Result<HourlySchedule> {
        let mut schedule = self.get_hourly_schedule(account_id, id).await?;

        if let Some(name) = &update.name {
            schedule.name = validate_schedule_name(name)?;
        }
        if let Some(hours) = &update.hours {
            schedule.hours = crate::hourly::normalize_hours(hours)?;
        }
        if let Some(start_date) = update.start_date {
            schedule.start_date = Some(start_date);
        }
        if let Some(is_active) = update.is_active {
            schedule.is_active = is_active;
        }

        sqlx::query(
            r#"
            UPDATE hourly_schedules SET name = ?, hours = ?, start_date = ?, is_active = ?
            WHERE id = ? AND account_id = ?
            "#,
        )
        .bind(&schedule.name)
        .bind(encode_list(&schedule.hours)?)
        .bind(schedule.start_date.map(|d| d.to_string()))
        .bind(schedule.is_active)
        .bind(id)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(schedule)
    }

    pub async fn delete_hourly_schedule(&self, account_id: AccountId, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM hourly_schedules WHERE id = ? AND account_id = ?")
            .bind(id)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(XcastError::not_found("hourly schedule", id));
        }
        Ok(())
    }
}

/// Encode a list column
pub(crate) fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| {
        DbError::Corrupt {
            column: "list",
            reason: e.to_string(),
        }
        .into()
    })
}

/// Decode a list column; NULL or empty text is an empty list
pub(crate) fn decode_list(column: &'static str, raw: Option<String>) -> Result<Vec<String>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(vec![]),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            DbError::Corrupt {
                column,
                reason: e.to_string(),
            }
            .into()
        }),
    }
}

fn validate_schedule_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(XcastError::InvalidInput("schedule name is required".to_string()));
    }
    Ok(name.to_string())
}

fn account_from_row(r: &SqliteRow) -> Account {
    Account {
        id: r.get("id"),
        name: r.get("name"),
        api_key: r.get("api_key"),
        api_secret: r.get("api_secret"),
        access_token: r.get("access_token"),
        access_token_secret: r.get("access_token_secret"),
        created_at: r.get("created_at"),
    }
}

fn schedule_from_row(r: &SqliteRow) -> Result<HourlySchedule> {
    let start_date = match r.get::<Option<String>, _>("start_date") {
        Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
            DbError::Corrupt {
                column: "hourly_schedules.start_date",
                reason: e.to_string(),
            }
        })?),
        None => None,
    };

    Ok(HourlySchedule {
        id: r.get("id"),
        account_id: r.get("account_id"),
        name: r.get("name"),
        hours: decode_list("hourly_schedules.hours", r.get("hours"))?,
        start_date,
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn sealed(tag: &str) -> SealedCredentials {
        SealedCredentials {
            api_key: format!("{}-k", tag),
            api_secret: format!("{}-s", tag),
            access_token: format!("{}-t", tag),
            access_token_secret: format!("{}-ts", tag),
        }
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        #[cfg(unix)]
        let invalid_path = "/tmp/test\0invalid.db";

        #[cfg(windows)]
        let invalid_path = "C:\\invalid<>path\\test.db";

        let result = Database::new(invalid_path).await;
        assert!(matches!(result, Err(XcastError::Database(_))));
    }

    #[tokio::test]
    async fn test_database_accepts_sqlite_url() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("url.db").display());
        let db = Database::new(&url).await.unwrap();
        assert!(db.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.create_account("mem", &sealed("a"), 1).await.unwrap();
        assert_eq!(db.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_account_crud() {
        let (db, _temp_dir) = setup().await;

        let created = db.create_account("main", &sealed("a"), 100).await.unwrap();
        assert!(created.id > 0);

        let fetched = db.require_account(created.id).await.unwrap();
        assert_eq!(fetched.name, "main");
        assert_eq!(fetched.api_key, "a-k");

        db.update_account(
            created.id,
            &SealedUpdate {
                name: Some("renamed".to_string()),
                api_secret: Some("b-s".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let updated = db.require_account(created.id).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.api_key, "a-k");
        assert_eq!(updated.api_secret, "b-s");
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (db, _temp_dir) = setup().await;

        assert!(db.get_account(99).await.unwrap().is_none());
        assert!(matches!(
            db.require_account(99).await,
            Err(XcastError::NotFound { .. })
        ));
        assert!(matches!(
            db.update_account(99, &SealedUpdate::default()).await,
            Err(XcastError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_csv_texts_upsert() {
        let (db, _temp_dir) = setup().await;

        let empty = db.get_csv_texts(1).await.unwrap();
        assert_eq!(empty.count(), 0);
        assert!(empty.updated_at.is_none());

        let texts = vec!["first".to_string(), "   ".to_string(), " second ".to_string()];
        let saved = db.save_csv_texts(1, &texts, 10).await.unwrap();
        assert_eq!(saved.texts, vec!["first", "second"]);

        let replaced = db.save_csv_texts(1, &["only".to_string()], 20).await.unwrap();
        assert_eq!(replaced.count(), 1);

        let fetched = db.get_csv_texts(1).await.unwrap();
        assert_eq!(fetched.texts, vec!["only"]);
        assert_eq!(fetched.updated_at, Some(20));
    }

    #[tokio::test]
    async fn test_csv_texts_cap() {
        let (db, _temp_dir) = setup().await;

        let texts: Vec<String> = (0..=MAX_CSV_TEXTS).map(|i| format!("text {}", i)).collect();
        let err = db.save_csv_texts(1, &texts, 0).await.unwrap_err();
        assert!(matches!(err, XcastError::InvalidInput(_)));

        db.save_csv_texts(1, &texts[..MAX_CSV_TEXTS], 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_hourly_schedule_lifecycle() {
        let (db, _temp_dir) = setup().await;

        let created = db
            .create_hourly_schedule(
                3,
                &NewHourlySchedule {
                    name: " mornings ".to_string(),
                    hours: vec!["9:00".to_string(), "08:00".to_string(), "09:00".to_string()],
                    start_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                    is_active: true,
                },
                50,
            )
            .await
            .unwrap();
        assert_eq!(created.name, "mornings");
        assert_eq!(created.hours, vec!["08:00", "09:00"]);

        let toggled = db
            .update_hourly_schedule(
                3,
                created.id,
                &HourlyScheduleUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!toggled.is_active);
        assert_eq!(toggled.hours, created.hours);

        let listed = db.list_hourly_schedules(3).await.unwrap();
        assert_eq!(listed, vec![toggled]);

        // Another account cannot see or remove it
        assert!(db.get_hourly_schedule(4, created.id).await.is_err());
        assert!(db.delete_hourly_schedule(4, created.id).await.is_err());

        db.delete_hourly_schedule(3, created.id).await.unwrap();
        assert!(db.list_hourly_schedules(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hourly_schedule_validation() {
        let (db, _temp_dir) = setup().await;

        let blank_name = NewHourlySchedule {
            name: "  ".to_string(),
            hours: vec!["10:00".to_string()],
            start_date: None,
            is_active: true,
        };
        assert!(db.create_hourly_schedule(1, &blank_name, 0).await.is_err());

        let bad_hour = NewHourlySchedule {
            name: "bad".to_string(),
            hours: vec!["25:00".to_string()],
            start_date: None,
            is_active: true,
        };
        assert!(db.create_hourly_schedule(1, &bad_hour, 0).await.is_err());
    }

    #[test]
    fn test_decode_list_handles_null_and_corruption() {
        assert!(decode_list("t", None).unwrap().is_empty());
        assert!(decode_list("t", Some(String::new())).unwrap().is_empty());
        assert_eq!(
            decode_list("t", Some(r#"["a","b"]"#.to_string())).unwrap(),
            vec!["a", "b"]
        );
        assert!(matches!(
            decode_list("t", Some("not json".to_string())),
            Err(XcastError::Database(DbError::Corrupt { column: "t", .. }))
        ));
    }
}
