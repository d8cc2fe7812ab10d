use async_trait::async_trait;
use rusqlite::OptionalExtension;

use super::WorkflowResultStore;
use crate::db::Database;
use crate::error::ServerError;
use crate::workflow::WorkflowResult;

/// SQLite-backed run history. The summary columns mirror
/// `WorkflowResult.counts`; the full result is kept as JSON.
#[derive(Clone)]
pub struct WorkflowRunStore {
    db: Database,
}

impl WorkflowRunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowResult> {
    let json: String = row.get(0)?;
    serde_json::from_str(&json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[async_trait]
impl WorkflowResultStore for WorkflowRunStore {
    async fn save(&self, result: &WorkflowResult) -> Result<(), ServerError> {
        let json = serde_json::to_string(result)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize result: {}", e)))?;
        let r = result.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflow_runs (id, name, total, succeeded, failed, skipped, \
                     result, started_at, completed_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                     ON CONFLICT(id) DO UPDATE SET name=excluded.name, total=excluded.total, \
                     succeeded=excluded.succeeded, failed=excluded.failed, skipped=excluded.skipped, \
                     result=excluded.result, started_at=excluded.started_at, \
                     completed_at=excluded.completed_at",
                    rusqlite::params![
                        r.workflow_id,
                        r.workflow_name,
                        r.counts.total as i64,
                        r.counts.succeeded as i64,
                        r.counts.failed as i64,
                        r.counts.skipped as i64,
                        json,
                        r.started_at.timestamp_millis(),
                        r.completed_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        tracing::debug!("[RunStore] Saved workflow run {}", result.workflow_id);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<WorkflowResult>, ServerError> {
        let limit = limit as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT result FROM workflow_runs \
                     ORDER BY completed_at DESC, rowid DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit], row_to_result)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowResult>, ServerError> {
        let id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT result FROM workflow_runs WHERE id = ?1",
                    rusqlite::params![id],
                    row_to_result,
                )
                .optional()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepCounts, WorkflowResult};
    use chrono::{Duration, Utc};

    fn result(id: &str, minutes_ago: i64, failed: usize) -> WorkflowResult {
        let completed = Utc::now() - Duration::minutes(minutes_ago);
        WorkflowResult {
            workflow_id: id.into(),
            workflow_name: Some(format!("run {}", id)),
            steps: vec![],
            counts: StepCounts {
                total: 2,
                succeeded: 2 - failed,
                failed,
                skipped: 0,
            },
            started_at: completed - Duration::seconds(5),
            completed_at: completed,
        }
    }

    fn store() -> WorkflowRunStore {
        WorkflowRunStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn save_then_get_round_trips_counts() {
        let store = store();
        store.save(&result("r1", 0, 1)).await.unwrap();

        let got = store.get("r1").await.unwrap().unwrap();
        assert_eq!(got.counts.failed, 1);
        assert_eq!(got.workflow_name.as_deref(), Some("run r1"));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = store();
        store.save(&result("r1", 0, 1)).await.unwrap();
        store.save(&result("r1", 0, 0)).await.unwrap();

        let all = store.list(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].counts.failed, 0);
    }

    #[tokio::test]
    async fn list_is_most_recent_first_and_limited() {
        let store = store();
        store.save(&result("old", 30, 0)).await.unwrap();
        store.save(&result("new", 1, 0)).await.unwrap();
        store.save(&result("mid", 10, 0)).await.unwrap();

        let ids: Vec<_> = store
            .list(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.workflow_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}
