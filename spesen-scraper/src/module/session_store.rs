///! Output sessions
///!
///! Every run writes into its own `session_<timestamp>_<id>` directory with a
///! `metadata.json` describing status and progress, and the scraped matches
///! as `spesen_data.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use spesen_common::{MatchRecord, ScrapeProgress};
use tokio::fs;

pub const METADATA_FILE: &str = "metadata.json";
pub const MATCHES_FILE: &str = "spesen_data.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Scraping,
    Generating,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub created_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Local>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub progress: ScrapeProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Fields to change in a session's metadata; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub status: Option<SessionStatus>,
    pub files: Option<Vec<String>>,
    pub progress: Option<ScrapeProgress>,
    pub summary: Option<String>,
}

impl MetadataUpdate {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: ScrapeProgress) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSession {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionFile {
    pub name: String,
    /// Relative to the store's base directory
    pub path: String,
    pub size: u64,
}

pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .await
            .with_context(|| format!("Failed to create output directory: {:?}", base_dir))?;
        tracing::info!("Session store ready in {:?}", base_dir);
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn new_session_id() -> String {
        let random = uuid::Uuid::now_v7().simple().to_string();
        format!(
            "session_{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            &random[random.len() - 8..]
        )
    }

    pub async fn create_session(&self) -> Result<OutputSession> {
        let id = Self::new_session_id();
        let path = self.base_dir.join(&id);
        fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create session directory: {:?}", path))?;

        let metadata = SessionMetadata {
            session_id: id.clone(),
            created_at: Local::now(),
            updated_at: None,
            status: SessionStatus::InProgress,
            files: Vec::new(),
            progress: ScrapeProgress::new(0, 0, "Initialisierung..."),
            summary: None,
        };
        let session = OutputSession { id, path };
        self.write_metadata(&session, &metadata).await?;

        tracing::info!("Session created: {}", session.id);
        Ok(session)
    }

    pub async fn read_metadata(&self, session: &OutputSession) -> Result<SessionMetadata> {
        let path = session.path.join(METADATA_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read session metadata: {:?}", path))?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_metadata(&self, session: &OutputSession, metadata: &SessionMetadata) -> Result<()> {
        let path = session.path.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(metadata)?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write session metadata: {:?}", path))?;
        Ok(())
    }

    pub async fn update_metadata(&self, session: &OutputSession, update: MetadataUpdate) -> Result<SessionMetadata> {
        let mut metadata = self.read_metadata(session).await?;

        if let Some(status) = update.status {
            metadata.status = status;
        }
        if let Some(files) = update.files {
            metadata.files = files;
        }
        if let Some(progress) = update.progress {
            metadata.progress = progress;
        }
        if let Some(summary) = update.summary {
            metadata.summary = Some(summary);
        }
        metadata.updated_at = Some(Local::now());

        self.write_metadata(session, &metadata).await?;
        tracing::debug!("Session metadata updated: {}", session.id);
        Ok(metadata)
    }

    /// Persist the records of one run as a single JSON array
    pub async fn write_matches(&self, session: &OutputSession, records: &[MatchRecord]) -> Result<PathBuf> {
        let path = session.path.join(MATCHES_FILE);
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write match data: {:?}", path))?;
        tracing::info!("Saved {} matches to {:?}", records.len(), path);
        Ok(path)
    }

    pub async fn read_matches(&self, session: &OutputSession) -> Result<Vec<MatchRecord>> {
        let path = session.path.join(MATCHES_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read match data: {:?}", path))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn find_session(&self, id: &str) -> Result<Option<OutputSession>> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            bail!("Invalid session id: {}", id);
        }

        let path = self.base_dir.join(id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(OutputSession {
                id: id.to_string(),
                path,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Generated documents and the match data of a session
    pub async fn list_files(&self, session: &OutputSession) -> Result<Vec<SessionFile>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&session.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let is_document = path.extension().is_some_and(|ext| ext == "docx");
            if !is_document && name != MATCHES_FILE {
                continue;
            }

            let meta = entry.metadata().await?;
            files.push(SessionFile {
                path: format!("{}/{}", session.id, name),
                name,
                size: meta.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}
