//! Read access to the JSON documents workers leave on disk, plus removal of
//! individual scheduled posts.

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Details,
    Posts,
    Stories,
    Followers,
    Demographics,
    Insights,
    Scheduled,
}

impl DataSource {
    pub const ALL: [DataSource; 7] = [
        DataSource::Details,
        DataSource::Posts,
        DataSource::Stories,
        DataSource::Followers,
        DataSource::Demographics,
        DataSource::Insights,
        DataSource::Scheduled,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataSource::Details => "details",
            DataSource::Posts => "posts",
            DataSource::Stories => "stories",
            DataSource::Followers => "followers",
            DataSource::Demographics => "demographics",
            DataSource::Insights => "insights",
            DataSource::Scheduled => "scheduled",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            DataSource::Details => "instagram_details.json",
            DataSource::Posts => "instagram_posts.json",
            DataSource::Stories => "instagram_stories.json",
            DataSource::Followers => "followers_history.json",
            DataSource::Demographics => "demographics_history.json",
            DataSource::Insights => "follower_insights.json",
            DataSource::Scheduled => "scheduled_posts.json",
        }
    }

    pub fn parse(name: &str) -> Result<Self, StoreError> {
        DataSource::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| StoreError::UnknownSource(name.to_string()))
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown data source: {0}")]
    UnknownSource(String),

    #[error("no {0} data has been collected yet")]
    NotFound(DataSource),

    #[error("no scheduled post with id {0}")]
    ScheduledNotFound(String),

    #[error("{} is not a list of scheduled posts", .0.display())]
    Malformed(PathBuf),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Documents live in one directory. Reads are lock-free; rewrites of the
/// scheduled-posts document are serialized.
#[derive(Clone)]
pub struct DocumentStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn path_of(&self, source: DataSource) -> PathBuf {
        self.dir.join(source.file_name())
    }

    pub async fn read(&self, source: DataSource) -> Result<Value, StoreError> {
        let path = self.path_of(source);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(source));
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Json { path, source })
    }

    /// Scheduled posts, oldest first as written. An absent document is an
    /// empty schedule.
    pub async fn scheduled_items(&self) -> Result<Vec<Value>, StoreError> {
        match self.read(DataSource::Scheduled).await {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(StoreError::Malformed(self.path_of(DataSource::Scheduled))),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Removes the entry whose `creation_id` matches `id` and returns it.
    /// Numeric and string ids compare by their text.
    pub async fn remove_scheduled(&self, id: &str) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.scheduled_items().await?;
        let position = items
            .iter()
            .position(|item| creation_id_text(item).as_deref() == Some(id))
            .ok_or_else(|| StoreError::ScheduledNotFound(id.to_string()))?;
        let removed = items.remove(position);

        let path = self.path_of(DataSource::Scheduled);
        let body = serde_json::to_string_pretty(&Value::Array(items)).map_err(|source| {
            StoreError::Json {
                path: path.clone(),
                source,
            }
        })?;
        write_atomic(&path, body.as_bytes()).await?;
        info!(id, "Removed scheduled post");
        Ok(removed)
    }
}

fn creation_id_text(item: &Value) -> Option<String> {
    match item.get("creation_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}
