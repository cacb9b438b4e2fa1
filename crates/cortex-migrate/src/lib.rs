use std::collections::HashSet;
use std::time::Duration;

use cortex_core::CortexError;
use include_dir::{include_dir, Dir};
use sqlx::postgres::PgPool;
use sqlx::Row;

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

/// Default ceiling on how long a single migration file's transaction may
/// run before the runner gives up and reports failure.
pub const DEFAULT_MIGRATION_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub filename: String,
    pub applied: bool,
    pub error: Option<String>,
}

impl MigrationOutcome {
    fn success(filename: &str) -> Self {
        MigrationOutcome {
            filename: filename.to_string(),
            applied: true,
            error: None,
        }
    }

    fn failure(filename: &str, error: impl std::fmt::Display) -> Self {
        MigrationOutcome {
            filename: filename.to_string(),
            applied: false,
            error: Some(error.to_string()),
        }
    }
}

/// Applies every `.sql` file embedded under `migrations/` against a
/// Postgres pool, one filename-tracked transaction at a time, in filename
/// order. A file already recorded in `schema_migrations` is skipped.
pub struct MigrationRunner {
    pool: PgPool,
    timeout: Duration,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        MigrationRunner {
            pool,
            timeout: Duration::from_secs(DEFAULT_MIGRATION_TIMEOUT_SECONDS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every unapplied migration. Stops at the first failure, leaving
    /// later files unapplied; returns one outcome per file attempted.
    pub async fn run_pending(&self) -> Result<Vec<MigrationOutcome>, CortexError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                filename TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(upstream)?;

        let applied: HashSet<String> = sqlx::query("SELECT filename FROM schema_migrations")
            .fetch_all(&self.pool)
            .await
            .map_err(upstream)?
            .into_iter()
            .map(|row| row.get::<String, _>("filename"))
            .collect();

        let mut files: Vec<_> = MIGRATIONS_DIR.files().collect();
        files.sort_by_key(|f| f.path().to_path_buf());

        let mut outcomes = Vec::new();
        for file in files {
            let filename = file
                .path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if applied.contains(&filename) {
                continue;
            }

            let sql = file
                .contents_utf8()
                .ok_or_else(|| CortexError::upstream(format!("migration '{filename}' is not valid utf-8")))?;

            let outcome = self.apply_one(&filename, sql).await;
            let failed = outcome.error.is_some();
            match &outcome.error {
                None => tracing::info!(filename = %filename, "applied migration"),
                Some(err) => tracing::error!(filename = %filename, error = %err, "migration failed"),
            }
            outcomes.push(outcome);
            if failed {
                break;
            }
        }

        Ok(outcomes)
    }

    async fn apply_one(&self, filename: &str, sql: &str) -> MigrationOutcome {
        let attempt = async {
            let mut tx = self.pool.begin().await.map_err(upstream)?;
            sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(upstream)?;
            sqlx::query("INSERT INTO schema_migrations (filename) VALUES ($1)")
                .bind(filename)
                .execute(&mut *tx)
                .await
                .map_err(upstream)?;
            tx.commit().await.map_err(upstream)?;
            Ok::<(), CortexError>(())
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(())) => MigrationOutcome::success(filename),
            Ok(Err(err)) => MigrationOutcome::failure(filename, err),
            Err(_) => MigrationOutcome::failure(filename, format!("timed out after {:?}", self.timeout)),
        }
    }
}

fn upstream(e: sqlx::Error) -> CortexError {
    CortexError::upstream(format!("migration error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_migrations_are_sorted_by_filename() {
        let mut files: Vec<_> = MIGRATIONS_DIR.files().map(|f| f.path().to_path_buf()).collect();
        files.sort();
        assert!(!files.is_empty());
        assert!(files[0].to_string_lossy().contains("0001"));
    }
}
