use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::answers::Answers;
use crate::error::RecordError;
use crate::storage::UserProfile;

/// A finished FNOL submission
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub user: UserProfile,
    pub submitted_at: DateTime<Utc>,
    pub fnol_data: Answers,
}

impl ClaimRecord {
    pub fn new(user: UserProfile, submitted_at: DateTime<Utc>, fnol_data: Answers) -> Self {
        Self {
            user,
            submitted_at,
            fnol_data,
        }
    }
}

/// Durable store for completed claims. Called once per completed conversation.
#[async_trait]
pub trait ClaimRecorder: Send + Sync {
    async fn save(&self, record: &ClaimRecord) -> Result<(), RecordError>;
}

/// Keeps records in memory; used by tests and local runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryClaimRecorder {
    records: Arc<Mutex<Vec<ClaimRecord>>>,
}

impl InMemoryClaimRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ClaimRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ClaimRecorder for InMemoryClaimRecorder {
    async fn save(&self, record: &ClaimRecord) -> Result<(), RecordError> {
        self.records
            .lock()
            .map_err(|_| RecordError::Rejected("record store poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Appends one JSON line per claim to a file per user
#[derive(Debug, Clone)]
pub struct JsonLinesClaimRecorder {
    dir: PathBuf,
}

impl JsonLinesClaimRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `demo1@company.com` → `<dir>/demo1_company_com.jsonl`
    pub fn path_for(&self, user: &UserProfile) -> PathBuf {
        let safe: String = user
            .email
            .chars()
            .map(|c| if c == '@' || c == '.' { '_' } else { c })
            .collect();
        self.dir.join(format!("{safe}.jsonl"))
    }
}

/// Length of `file` up to and including its last newline. Anything after it
/// is a torn line left by a failed write.
async fn complete_len(file: &mut File) -> io::Result<u64> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(0);
    }
    file.seek(SeekFrom::End(-1)).await?;
    if file.read_u8().await? == b'\n' {
        return Ok(len);
    }

    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0)).await?;
    file.read_to_end(&mut contents).await?;
    Ok(contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |newline| newline as u64 + 1))
}

/// Write `line` through `writer`. On failure the file behind `handle` is cut
/// back to `start`, so a retry never appends onto a partial record.
async fn write_or_roll_back<W>(
    writer: &mut W,
    handle: &File,
    start: u64,
    line: &[u8],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(line).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        if let Err(rollback) = handle.set_len(start).await {
            warn!(error = %rollback, "failed to roll back partial claim record");
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl ClaimRecorder for JsonLinesClaimRecorder {
    async fn save(&self, record: &ClaimRecord) -> Result<(), RecordError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&record.user);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .await?;

        let start = complete_len(&mut file).await?;
        if start < file.metadata().await?.len() {
            warn!(path = %path.display(), "dropping torn claim record");
            file.set_len(start).await?;
        }
        file.seek(SeekFrom::Start(start)).await?;

        let handle = file.try_clone().await?;
        write_or_roll_back(&mut file, &handle, start, &line).await?;

        debug!(path = %path.display(), "claim record appended");
        Ok(())
    }
}
