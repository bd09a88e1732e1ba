use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tracing::{info, warn};

use super::limits::SizeLimit;
use super::source::DatasetSource;
use crate::server::metrics;
use crate::store::{ArtifactStore, Dataset, TabularError};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{origin} CSV exceeds {limit_mb} MB limit ({size} bytes)")]
    PayloadTooLarge {
        origin: &'static str,
        limit_mb: u64,
        size: u64,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse CSV: {0}")]
    Parse(#[from] TabularError),

    #[error("Ingestion task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// Name of the caller-facing error class.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::PayloadTooLarge { .. } => "PayloadTooLarge",
            _ => "IngestError",
        }
    }
}

/// Turns dataset sources into registered handles.
pub struct DatasetIngestor {
    store: Arc<ArtifactStore>,
    limit: SizeLimit,
    fetch_timeout: Duration,
    client: reqwest::Client,
}

impl DatasetIngestor {
    pub fn new(store: Arc<ArtifactStore>, limit: SizeLimit, fetch_timeout: Duration) -> Self {
        Self {
            store,
            limit,
            fetch_timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Loads `source`, registers the parsed table and returns its handle.
    pub async fn load(&self, source: DatasetSource) -> Result<String, IngestError> {
        let source_type = source.source_type();
        let limit_mb = self.limit.resolve_mb();
        let limit_bytes = self.limit.resolve_bytes();

        let bytes = match source {
            DatasetSource::Inline(text) => {
                let size = text.len() as u64;
                if size > limit_bytes {
                    warn!("Inline CSV too large: {} bytes", size);
                    return Err(IngestError::PayloadTooLarge {
                        origin: "Inline",
                        limit_mb,
                        size,
                    });
                }
                text.into_bytes()
            }
            DatasetSource::File(path) => read_file(&path, limit_mb, limit_bytes).await?,
            DatasetSource::Url(url) => self.fetch(&url, limit_mb, limit_bytes).await?,
        };

        let size = bytes.len();
        let dataset = parse_off_thread(bytes).await?;
        metrics::record_bytes_ingested(source_type.as_str(), size);

        let (rows, cols) = (dataset.row_count(), dataset.column_count());
        let handle = self.store.register_dataset(dataset);
        info!(
            "Loaded dataset handle={} from {} source ({} rows, {} cols, {:#})",
            handle,
            source_type,
            rows,
            cols,
            byte_unit::Byte::from(size as u64)
        );
        Ok(handle)
    }

    /// Downloads `url`, aborting as soon as the body outgrows the limit.
    async fn fetch(&self, url: &str, limit_mb: u64, limit_bytes: u64) -> Result<Vec<u8>, IngestError> {
        let fetch_error = |reason: String| IngestError::Fetch {
            url: url.to_string(),
            reason,
        };
        let too_large = |size: u64| {
            warn!("Remote CSV too large: {} bytes", size);
            IngestError::PayloadTooLarge {
                origin: "Remote",
                limit_mb,
                size,
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        if let Some(declared) = response.content_length() {
            if declared > limit_bytes {
                return Err(too_large(declared));
            }
        }

        let mut body = Vec::new();
        let mut stream = Box::pin(response.bytes_stream());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_error(e.to_string()))?;
            let received = (body.len() + chunk.len()) as u64;
            if received > limit_bytes {
                return Err(too_large(received));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

async fn read_file(path: &Path, limit_mb: u64, limit_bytes: u64) -> Result<Vec<u8>, IngestError> {
    let read_error = |source: io::Error| IngestError::Read {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(read_error)?;
    if metadata.len() > limit_bytes {
        warn!("Local CSV too large: {} bytes", metadata.len());
        return Err(IngestError::PayloadTooLarge {
            origin: "Local",
            limit_mb,
            size: metadata.len(),
        });
    }
    tokio::fs::read(path).await.map_err(read_error)
}

async fn parse_off_thread(bytes: Vec<u8>) -> Result<Dataset, IngestError> {
    tokio::task::spawn_blocking(move || Dataset::from_csv_reader(bytes.as_slice()))
        .await
        .map_err(|e| IngestError::Task(e.to_string()))?
        .map_err(IngestError::from)
}
