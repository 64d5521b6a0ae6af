use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct BraindumpRow {
    pub id: String,
    pub raw_text: String,
    pub task_count: i64,
    /// JSON object; scoring merges `scoring_summary` and `top3` keys into it.
    pub metadata: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct TaskRow {
    pub id: String,
    pub braindump_id: String,
    /// 0-based position within the committed set, preserving input order.
    pub position: i64,
    pub content: String,
    pub normalized: String,
    pub category: Option<String>,
    pub priority: Option<i64>,
    /// Coarse bucket 1 (Must) .. 4 (Want); NULL when priority is unset.
    pub priority_group: Option<i64>,
    pub action: String,
    pub quick_win: bool,
    pub status: String,
    pub source: String,
    /// Times an identically-normalized task appeared in earlier braindumps.
    pub longevity: i64,
    pub urgency_rank: Option<i64>,
    pub shininess_rank: Option<i64>,
    pub score: Option<f64>,
    pub overall_rank: Option<i64>,
    pub created_at: String,
}

/// Insert payload for one committed task. Ids and timestamps are generated
/// at insert time.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub position: i64,
    pub content: String,
    pub normalized: String,
    pub category: Option<String>,
    pub priority: Option<i64>,
    pub priority_group: Option<i64>,
    pub action: String,
    pub quick_win: bool,
    pub longevity: i64,
}

/// One task's scoring outcome, persisted by [`Storage::write_scores`].
#[derive(Debug, Clone)]
pub struct ScoreUpdate {
    pub task_id: String,
    pub score: f64,
    pub overall_rank: i64,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it are
    /// logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("sweepd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Quick connectivity probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // ─── Braindumps ─────────────────────────────────────────────────────────

    /// Insert the braindump record and its committed task rows in one
    /// transaction. Returns the new braindump id.
    pub async fn finalize_braindump(&self, raw_text: &str, tasks: &[NewTask]) -> Result<String> {
        let braindump_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO braindumps (id, raw_text, task_count, metadata, created_at)
             VALUES (?, ?, ?, '{}', ?)",
        )
        .bind(&braindump_id)
        .bind(raw_text)
        .bind(tasks.len() as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for task in tasks {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO tasks (id, braindump_id, position, content, normalized, category,
                                    priority, priority_group, action, quick_win, status, source,
                                    longevity, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'todo', 'braindump', ?, ?)",
            )
            .bind(&id)
            .bind(&braindump_id)
            .bind(task.position)
            .bind(&task.content)
            .bind(&task.normalized)
            .bind(&task.category)
            .bind(task.priority)
            .bind(task.priority_group)
            .bind(&task.action)
            .bind(task.quick_win)
            .bind(task.longevity)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(braindump_id)
    }

    pub async fn get_braindump(&self, id: &str) -> Result<Option<BraindumpRow>> {
        Ok(sqlx::query_as("SELECT * FROM braindumps WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_braindumps(&self, limit: i64) -> Result<Vec<BraindumpRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM braindumps ORDER BY created_at DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    /// Merge top-level keys of `patch` into the braindump's metadata JSON.
    /// Last write wins; no optimistic concurrency.
    pub async fn merge_braindump_metadata(
        &self,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let row = self
            .get_braindump(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("braindump {id} not found"))?;
        let mut metadata: serde_json::Value =
            serde_json::from_str(&row.metadata).unwrap_or_else(|_| serde_json::json!({}));
        if let (Some(target), Some(source)) = (metadata.as_object_mut(), patch.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        sqlx::query("UPDATE braindumps SET metadata = ? WHERE id = ?")
            .bind(metadata.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Tasks ──────────────────────────────────────────────────────────────

    pub async fn tasks_for_braindump(&self, braindump_id: &str) -> Result<Vec<TaskRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM tasks WHERE braindump_id = ? ORDER BY position")
                .bind(braindump_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// The committed subset eligible for scoring, in input order.
    pub async fn tasks_for_scoring(&self, braindump_id: &str) -> Result<Vec<TaskRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM tasks
             WHERE braindump_id = ? AND action IN ('keep', 'merge')
             ORDER BY position",
        )
        .bind(braindump_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// How many already-persisted tasks normalize to the same text. Called
    /// before insert, so the new row does not count itself.
    pub async fn longevity_count(&self, normalized: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE normalized = ?")
            .bind(normalized)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Persist score and 1-based overall rank for a braindump's tasks in a
    /// single transaction. Re-scoring overwrites previous values.
    pub async fn write_scores(&self, updates: &[ScoreUpdate]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for update in updates {
            sqlx::query("UPDATE tasks SET score = ?, overall_rank = ? WHERE id = ?")
                .bind(update.score)
                .bind(update.overall_rank)
                .bind(&update.task_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
