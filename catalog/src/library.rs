use crate::config;
use crate::errors::ServerError;
use bytes::Bytes;
use common::catalog::Video;
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

const READ_CAPACITY: u64 = 8 * 1024 * 1024;

/// A directory of packaged videos, one sub-directory per video.
pub struct Library {
    root: PathBuf,
    public_url: String,
    manifest: String,
}

impl Library {
    pub fn new(setting: &config::Library) -> Self {
        Library {
            root: PathBuf::from(&setting.path),
            public_url: setting.public_url.clone(),
            manifest: setting.manifest.clone(),
        }
    }

    /// Lists video directories sorted by name, numbered from 1.
    pub async fn videos(&self) -> Result<Vec<Video>, ServerError> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            ServerError::StorageError(format!("read dir '{}': {}", self.root.display(), e))
        })?;

        let mut titles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServerError::StorageError(e.to_string()))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ServerError::StorageError(e.to_string()))?;
            if file_type.is_dir() {
                titles.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        titles.sort();

        debug!("library: found {} videos in {}", titles.len(), self.root.display());

        Ok(titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| Video {
                id: (i + 1).to_string(),
                stream_url: format!("{}/stream/{}/{}", self.public_url, title, self.manifest),
                title,
            })
            .collect())
    }

    /// Size of the regular file addressed relative to the library root.
    ///
    /// Returns `Ok(None)` for anything that is not a regular file.
    pub async fn size(&self, relative: &str) -> Result<Option<u64>, ServerError> {
        let path = self.resolve(relative)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServerError::StorageError(e.to_string())),
        }
    }

    /// Reads at most `len` bytes starting at `offset`.
    pub async fn read_at(
        &self,
        relative: &str,
        offset: u64,
        len: u64,
    ) -> Result<Bytes, ServerError> {
        let path = self.resolve(relative)?;
        let mut file = File::open(&path)
            .await
            .map_err(|e| ServerError::StorageError(format!("open '{}': {}", relative, e)))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| ServerError::StorageError(e.to_string()))?;

        let mut data = Vec::with_capacity(len.min(READ_CAPACITY) as usize);
        file.take(len)
            .read_to_end(&mut data)
            .await
            .map_err(|e| ServerError::StorageError(e.to_string()))?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, ServerError> {
        let mut path = self.root.clone();
        for part in relative.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(ServerError::RequestError(format!(
                        "path '{}' escapes the library",
                        relative
                    )))
                }
                _ if part.contains('\\') => {
                    return Err(ServerError::RequestError(format!(
                        "path '{}' has a backslash",
                        relative
                    )))
                }
                _ => path.push(part),
            }
        }
        Ok(path)
    }
}

pub fn content_type(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "mpd" => "application/dash+xml",
        "m4s" => "video/iso.segment",
        "mp4" => "video/mp4",
        "m4a" => "audio/mp4",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
