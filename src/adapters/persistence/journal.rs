//! Request Journal - Append-only JSONL Request Store
//!
//! Implements the `RequestStore` port with daily JSONL files in
//! `requests/journal-YYYY-MM-DD.jsonl` plus an in-memory index. Every
//! mutation appends the full request record before it is acknowledged,
//! so the journal is the source of truth; on startup the files are
//! replayed in order and the last record per request ID wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::request::TradeRequest;
use crate::ports::store::RequestStore;

/// Journal-backed request store with an in-memory read index.
pub struct JournalStore {
    /// Directory holding the daily journal files.
    journal_dir: PathBuf,
    /// Last known record per request ID.
    index: RwLock<HashMap<Uuid, TradeRequest>>,
}

impl JournalStore {
    /// Open the store, creating the journal directory and replaying any
    /// existing files.
    pub async fn open(data_dir: &str) -> Result<Self> {
        let journal_dir = Path::new(data_dir).join("requests");
        fs::create_dir_all(&journal_dir)
            .await
            .context("Failed to create journal directory")?;

        let index = Self::replay(&journal_dir).await?;
        info!(
            recovered = index.len(),
            dir = %journal_dir.display(),
            "Request journal replayed"
        );

        Ok(Self {
            journal_dir,
            index: RwLock::new(index),
        })
    }

    /// Replay all journal files, oldest first, last record per ID wins.
    #[instrument(skip_all)]
    async fn replay(dir: &Path) -> Result<HashMap<Uuid, TradeRequest>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await.context("Failed to list journal")?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                paths.push(path);
            }
        }
        // Daily file names sort chronologically.
        paths.sort();

        let mut index = HashMap::new();
        for path in paths {
            let content = fs::read_to_string(&path).await?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TradeRequest>(line) {
                    Ok(record) => {
                        index.insert(record.id, record);
                    }
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed journal record"
                        );
                    }
                }
            }
        }
        Ok(index)
    }

    /// Append one full request record to today's journal file.
    async fn append(&self, request: &TradeRequest) -> Result<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = self.journal_dir.join(format!("journal-{date}.jsonl"));

        let mut json =
            serde_json::to_string(request).context("Failed to serialize request")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open journal file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write journal record")?;
        file.flush().await.context("Failed to flush journal")?;

        Ok(())
    }
}

#[async_trait]
impl RequestStore for JournalStore {
    async fn insert(&self, request: &TradeRequest) -> Result<()> {
        let mut index = self.index.write().await;
        anyhow::ensure!(
            !index.contains_key(&request.id),
            "Duplicate request id {}",
            request.id
        );
        self.append(request).await?;
        index.insert(request.id, request.clone());
        Ok(())
    }

    async fn update(&self, request: &TradeRequest) -> Result<()> {
        let mut index = self.index.write().await;
        anyhow::ensure!(
            index.contains_key(&request.id),
            "Unknown request id {}",
            request.id
        );
        self.append(request).await?;
        index.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TradeRequest>> {
        let index = self.index.read().await;
        Ok(index.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<TradeRequest>> {
        let index = self.index.read().await;
        let mut active: Vec<TradeRequest> = index
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|r| r.created_at);
        Ok(active)
    }

    async fn is_healthy(&self) -> bool {
        let probe = self.journal_dir.join(".health_check");
        let result = fs::write(&probe, b"ok").await;
        let _ = fs::remove_file(&probe).await;
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::RequestStatus;

    fn scratch_dir() -> String {
        std::env::temp_dir()
            .join(format!("pawmart-journal-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    fn request() -> TradeRequest {
        TradeRequest::new_trade(
            "8737899170",
            "buyer1",
            "seller1",
            "lst_1",
            "bot-a",
            chrono::Duration::minutes(10),
        )
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let dir = scratch_dir();
        let store = JournalStore::open(&dir).await.unwrap();

        let req = request();
        store.insert(&req).await.unwrap();

        let loaded = store.get(req.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::Pending);
        assert_eq!(loaded.seller, "seller1");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let dir = scratch_dir();
        let store = JournalStore::open(&dir).await.unwrap();

        let req = request();
        store.insert(&req).await.unwrap();
        assert!(store.insert(&req).await.is_err());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_update_unknown_rejected() {
        let dir = scratch_dir();
        let store = JournalStore::open(&dir).await.unwrap();

        assert!(store.update(&request()).await.is_err());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_replay_recovers_latest_record() {
        let dir = scratch_dir();
        let mut req = request();
        {
            let store = JournalStore::open(&dir).await.unwrap();
            store.insert(&req).await.unwrap();
            req.advance(RequestStatus::FriendRequestSent).unwrap();
            store.update(&req).await.unwrap();
        }

        let reopened = JournalStore::open(&dir).await.unwrap();
        let loaded = reopened.get(req.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::FriendRequestSent);

        let active = reopened.list_active().await.unwrap();
        assert_eq!(active.len(), 1);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_terminal_requests_not_listed_active() {
        let dir = scratch_dir();
        let store = JournalStore::open(&dir).await.unwrap();

        let mut req = request();
        store.insert(&req).await.unwrap();
        req.fail("confirmation timeout");
        store.update(&req).await.unwrap();

        assert!(store.list_active().await.unwrap().is_empty());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped_on_replay() {
        let dir = scratch_dir();
        let req = request();
        {
            let store = JournalStore::open(&dir).await.unwrap();
            store.insert(&req).await.unwrap();
        }

        // Corrupt the journal with a partial write.
        let journal = Path::new(&dir).join("requests");
        let mut files = std::fs::read_dir(&journal)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect::<Vec<_>>();
        files.sort();
        let mut content = std::fs::read_to_string(&files[0]).unwrap();
        content.push_str("{\"id\": \"truncated");
        std::fs::write(&files[0], content).unwrap();

        let reopened = JournalStore::open(&dir).await.unwrap();
        assert!(reopened.get(req.id).await.unwrap().is_some());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
