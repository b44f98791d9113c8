use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::{
    fs,
    path::{Component, Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::{fs as async_fs, io::AsyncWriteExt};

use crate::models::errors::{AppError, UploadError};
use crate::services::object_id::ObjectId;

/// Everything except ASCII alphanumerics and `.-_ ()+,=@~!` is encoded.
const FILENAME_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b' ')
    .remove(b'(')
    .remove(b')')
    .remove(b'+')
    .remove(b',')
    .remove(b'=')
    .remove(b'@')
    .remove(b'~')
    .remove(b'!');

#[derive(Debug, Clone)]
pub struct FileStorageService {
    temp_dir: PathBuf,
    max_file_age: Duration,
}

impl FileStorageService {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let temp_dir = temp_dir.into();

        // Create the temporary directory if it doesn't exist
        if !temp_dir.exists() {
            fs::create_dir_all(&temp_dir)
                .map_err(|e| AppError::storage_failed(format!("Failed to create temp directory: {}", e)))?;
        }

        Ok(Self {
            temp_dir,
            max_file_age: Duration::from_secs(24 * 3600),
        })
    }

    pub fn with_max_file_age(mut self, max_age: Duration) -> Self {
        self.max_file_age = max_age;
        self
    }

    /// Write `data` under `dir` (or the temp directory) with a freshly minted
    /// `<object id>_<encoded name>` filename. Returns the normalized path.
    pub async fn store(
        &self,
        dir: Option<&Path>,
        original_name: &str,
        data: &[u8],
    ) -> Result<PathBuf, UploadError> {
        let dir = dir.unwrap_or(self.temp_dir.as_path());
        let file_name = format!("{}_{}", ObjectId::new(), encode_file_name(original_name));
        let path = absolute(&normalize_path(&dir.join(file_name)))?;

        write_new(&path, data).await?;

        tracing::debug!("Stored uploaded file: {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    /// Best-effort removal of a file written by `store`.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = async_fs::remove_file(path).await {
            tracing::warn!("Failed to remove rejected upload {}: {}", path.display(), e);
        } else {
            tracing::debug!("Removed rejected upload: {}", path.display());
        }
    }

    /// Clean up old temporary files
    pub async fn cleanup_temp_files(&self) -> Result<usize, AppError> {
        let mut cleaned_count = 0;
        let Some(cutoff_time) = SystemTime::now().checked_sub(self.max_file_age) else {
            tracing::debug!("Temp file max age {:?} reaches before the epoch, skipping cleanup", self.max_file_age);
            return Ok(0);
        };

        let mut entries = async_fs::read_dir(&self.temp_dir)
            .await
            .map_err(|e| AppError::storage_failed(format!("Failed to read temp directory: {}", e)))?;

        while let Some(entry) = entries.next_entry().await
            .map_err(|e| AppError::storage_failed(format!("Failed to read directory entry: {}", e)))? {

            let path = entry.path();

            if path.is_file() {
                let metadata = entry.metadata().await
                    .map_err(|e| AppError::storage_failed(format!("Failed to read file metadata: {}", e)))?;

                if let Ok(modified) = metadata.modified() {
                    if modified < cutoff_time {
                        if let Err(e) = async_fs::remove_file(&path).await {
                            tracing::warn!("Failed to delete old temp file {}: {}", path.display(), e);
                        } else {
                            cleaned_count += 1;
                            tracing::debug!("Cleaned up old temp file: {}", path.display());
                        }
                    }
                }
            }
        }

        if cleaned_count > 0 {
            tracing::info!("Cleaned up {} old temporary files", cleaned_count);
        }

        Ok(cleaned_count)
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

/// Reduce a client filename to its last segment and percent-encode anything
/// outside ASCII alphanumerics and a small punctuation set.
pub fn encode_file_name(original: &str) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let encoded = utf8_percent_encode(last, FILENAME_SET).to_string();

    if encoded.trim_matches(|c: char| c == '.' || c == ' ').is_empty() {
        return "file".to_string();
    }
    encoded
}

/// Lexical normalization: backslashes become `/`, `.` segments are dropped
/// and `..` removes the preceding segment.
pub fn normalize_path(path: &Path) -> PathBuf {
    let unified = path.to_string_lossy().replace('\\', "/");
    let mut normalized = PathBuf::new();

    for component in Path::new(&unified).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal =
                    matches!(normalized.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

fn absolute(path: &Path) -> Result<PathBuf, UploadError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| UploadError::IOFailure {
        path: path.display().to_string(),
        source,
    })?;
    Ok(normalize_path(&cwd.join(path)))
}

/// Create `path` (and its parents) and write `data`. Fails if the file exists.
async fn write_new(path: &Path, data: &[u8]) -> Result<(), UploadError> {
    let io_failure = |source: std::io::Error| UploadError::IOFailure {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await.map_err(io_failure)?;
    }

    let mut file = async_fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(io_failure)?;
    file.write_all(data).await.map_err(io_failure)?;
    file.flush().await.map_err(io_failure)?;

    Ok(())
}
