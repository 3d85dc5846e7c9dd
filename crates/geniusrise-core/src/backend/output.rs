use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use walkdir::WalkDir;

use super::{MessageProducer, ObjectStore, OutputMode};
use crate::error::BackendError;

/// Where a spout's records go.
#[async_trait]
pub trait Output: Send + Sync {
    fn mode(&self) -> OutputMode;

    async fn save(&mut self, record: &serde_json::Value, filename: &str) -> Result<(), BackendError>;

    /// Push anything buffered or local to its final destination.
    async fn flush(&mut self) -> Result<(), BackendError>;
}

/// Object-store location a batch folder is mirrored to on flush.
pub struct S3Mirror {
    pub store: Box<dyn ObjectStore>,
    pub bucket: String,
    pub prefix: String,
}

impl S3Mirror {
    fn key_for(&self, relative: &Path) -> String {
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            relative
        } else {
            format!("{prefix}/{relative}")
        }
    }
}

pub struct BatchOutput {
    folder: PathBuf,
    mirror: Option<S3Mirror>,
}

impl BatchOutput {
    pub fn new(folder: impl Into<PathBuf>, mirror: Option<S3Mirror>) -> Result<Self, BackendError> {
        let folder = folder.into();
        if !folder.is_dir() {
            return Err(BackendError::construction(
                OutputMode::Batch.as_str(),
                format!("output folder {} is not a directory", folder.display()),
            ));
        }
        Ok(Self { folder, mirror })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    async fn write(&self, filename: &str, body: Vec<u8>) -> Result<(), BackendError> {
        let path = self.folder.join(filename);
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| BackendError::Io {
                backend: "batch",
                source,
            })?;
        tracing::debug!(path = %path.display(), "wrote batch record");
        Ok(())
    }

    async fn mirror(&self) -> Result<usize, BackendError> {
        let Some(mirror) = &self.mirror else {
            return Ok(0);
        };

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.folder).sort_by_file_name() {
            let entry = entry.map_err(|e| BackendError::client("s3", e.to_string()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        for path in &files {
            let relative = path.strip_prefix(&self.folder).unwrap_or(path);
            let body = tokio::fs::read(path)
                .await
                .map_err(|source| BackendError::Io {
                    backend: "batch",
                    source,
                })?;
            mirror
                .store
                .put_object(&mirror.bucket, &mirror.key_for(relative), body)
                .await?;
        }
        Ok(files.len())
    }
}

#[async_trait]
impl Output for BatchOutput {
    fn mode(&self) -> OutputMode {
        OutputMode::Batch
    }

    async fn save(&mut self, record: &serde_json::Value, filename: &str) -> Result<(), BackendError> {
        let body = serde_json::to_vec_pretty(record)?;
        self.write(filename, body).await
    }

    async fn flush(&mut self) -> Result<(), BackendError> {
        let uploaded = self.mirror().await?;
        if uploaded > 0 {
            tracing::info!(files = uploaded, "mirrored output folder");
        }
        Ok(())
    }
}

pub struct StreamingOutput {
    topic: String,
    producer: Box<dyn MessageProducer>,
}

impl StreamingOutput {
    pub fn new(topic: impl Into<String>, producer: Box<dyn MessageProducer>) -> Self {
        Self {
            topic: topic.into(),
            producer,
        }
    }
}

#[async_trait]
impl Output for StreamingOutput {
    fn mode(&self) -> OutputMode {
        OutputMode::Streaming
    }

    async fn save(&mut self, record: &serde_json::Value, filename: &str) -> Result<(), BackendError> {
        let payload = serde_json::to_vec(record)?;
        self.producer.send(&self.topic, filename, payload).await
    }

    async fn flush(&mut self) -> Result<(), BackendError> {
        self.producer.flush().await
    }
}

/// Buffers records and writes them to a batch folder `buffer_size` at a time.
pub struct StreamToBatchOutput {
    batch: BatchOutput,
    buffer: Vec<serde_json::Value>,
    buffer_size: usize,
    batches_written: usize,
}

impl StreamToBatchOutput {
    pub fn new(batch: BatchOutput, buffer_size: usize) -> Self {
        Self {
            batch,
            buffer: Vec::with_capacity(buffer_size.min(1024)),
            buffer_size: buffer_size.max(1),
            batches_written: 0,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    async fn write_batch(&mut self) -> Result<(), BackendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(&mut self.buffer);
        let filename = format!(
            "batch-{}-{:04}.json",
            Utc::now().format("%Y%m%dT%H%M%S"),
            self.batches_written
        );
        let body = serde_json::to_vec_pretty(&records)?;
        self.batch.write(&filename, body).await?;
        self.batches_written += 1;
        tracing::debug!(records = records.len(), file = %filename, "flushed stream buffer");
        Ok(())
    }
}

#[async_trait]
impl Output for StreamToBatchOutput {
    fn mode(&self) -> OutputMode {
        OutputMode::StreamToBatch
    }

    async fn save(&mut self, record: &serde_json::Value, _filename: &str) -> Result<(), BackendError> {
        self.buffer.push(record.clone());
        if self.buffer.len() >= self.buffer_size {
            self.write_batch().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), BackendError> {
        self.write_batch().await?;
        self.batch.flush().await
    }
}
