//! Validation and persistence of uploaded files.
//!
//! A [`MultipartFileBuilder`] is built per request, configured through its
//! chained setters and consumed by [`save`](MultipartFileBuilder::save) or
//! [`saves`](MultipartFileBuilder::saves). Every file passes the same gate in
//! order: filename, size, extension, size limit, sniffed type, write, and
//! finally the probed content type of the written file.

use std::path::PathBuf;

use crate::models::errors::UploadError;
use crate::models::upload::{MultipartSource, UploadedFile};
use crate::services::file_storage::FileStorageService;
use crate::services::file_type;

/// Constraints applied to every file of one upload call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Insertion ordered, without duplicates.
    pub field_names: Vec<String>,
    pub multiple: bool,
    /// Zero means unlimited.
    pub max_size: u64,
    pub file_ext: Option<Vec<String>>,
    pub input_stream_type: Option<Vec<String>>,
    pub content_type_prefix: Option<String>,
    pub save_path: Option<PathBuf>,
}

impl UploadOptions {
    fn check_extension(&self, file_name: &str) -> Result<(), UploadError> {
        let Some(exts) = self.file_ext.as_ref().filter(|e| !e.is_empty()) else {
            return Ok(());
        };

        let lower = file_name.to_lowercase();
        let matched = exts
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext.trim_start_matches('.').to_lowercase())));

        if matched {
            Ok(())
        } else {
            Err(UploadError::DisallowedExtension {
                file_name: lower,
                allowed: exts.join(","),
            })
        }
    }

    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if self.max_size > 0 && size > self.max_size {
            return Err(UploadError::FileTooLarge {
                size,
                max_size: self.max_size,
            });
        }
        Ok(())
    }

    fn check_sniffed_type(&self, data: &[u8]) -> Result<(), UploadError> {
        let Some(allowed) = self.input_stream_type.as_ref().filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let detected = file_type::sniff_type(data);
        if file_type::type_allowed(detected, allowed) {
            Ok(())
        } else {
            Err(UploadError::DisallowedSniffedType {
                detected: detected.unwrap_or("unknown").to_string(),
                allowed: allowed.join(","),
            })
        }
    }
}

/// Fluent builder over one multipart request.
pub struct MultipartFileBuilder<'a, S: MultipartSource + ?Sized> {
    source: &'a S,
    storage: &'a FileStorageService,
    options: UploadOptions,
}

impl<'a, S: MultipartSource + ?Sized> MultipartFileBuilder<'a, S> {
    /// Files without an explicit save path land in `storage`'s temp directory.
    pub fn new(source: &'a S, storage: &'a FileStorageService) -> Self {
        Self {
            source,
            storage,
            options: UploadOptions::default(),
        }
    }

    /// Maximum accepted size in bytes; 0 disables the check.
    pub fn max_size(mut self, max_size: u64) -> Self {
        self.options.max_size = max_size;
        self
    }

    pub fn add_field_name(mut self, field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        if !self.options.field_names.contains(&field_name) {
            self.options.field_names.push(field_name);
        }
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.options.multiple = multiple;
        self
    }

    /// Allowed filename extensions, matched case-insensitively.
    pub fn file_ext<I, T>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options.file_ext = Some(exts.into_iter().map(Into::into).collect());
        self
    }

    /// Allowed types detected from the leading bytes, e.g. `png`, `jpg`.
    pub fn input_stream_type<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options.input_stream_type = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Required prefix of the saved file's probed media type, e.g. `image/`.
    pub fn content_type_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.content_type_prefix = Some(prefix.into());
        self
    }

    pub fn save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.save_path = Some(path.into());
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Saves the file of the single configured field.
    pub async fn save(self) -> Result<PathBuf, UploadError> {
        let field_count = self.options.field_names.len();
        if field_count != 1 {
            return Err(UploadError::invalid_configuration(format!(
                "save requires exactly one field name, got {}; use saves",
                field_count
            )));
        }
        if self.options.multiple {
            return Err(UploadError::invalid_configuration(
                "multiple is set; use saves",
            ));
        }

        let mut paths = self.saves().await?;
        paths
            .pop()
            .ok_or_else(|| UploadError::invalid_configuration("no file was saved"))
    }

    /// Saves the files of every configured field, in field order and then
    /// submission order. The first failure aborts the call; files already
    /// written stay on disk.
    pub async fn saves(self) -> Result<Vec<PathBuf>, UploadError> {
        if self.options.field_names.is_empty() {
            return Err(UploadError::invalid_configuration("no field names configured"));
        }

        let mut paths = Vec::new();
        for field_name in &self.options.field_names {
            if self.options.multiple {
                for file in self.source.files(field_name) {
                    paths.push(self.save_one(field_name, file).await?);
                }
            } else {
                let file = self.source.file(field_name).ok_or_else(|| {
                    UploadError::MissingFilename {
                        field: field_name.clone(),
                    }
                })?;
                paths.push(self.save_one(field_name, file).await?);
            }
        }

        tracing::info!(
            "Saved {} uploaded file(s) for fields {:?}",
            paths.len(),
            self.options.field_names
        );
        Ok(paths)
    }

    async fn save_one(&self, field_name: &str, file: &UploadedFile) -> Result<PathBuf, UploadError> {
        let options = &self.options;

        let file_name = file
            .original_filename()
            .ok_or_else(|| UploadError::MissingFilename {
                field: field_name.to_string(),
            })?;

        let size = file.size();
        if size == 0 {
            return Err(UploadError::EmptyFile {
                file_name: file_name.to_string(),
            });
        }

        options.check_extension(file_name)?;
        options.check_size(size)?;

        let data = file.bytes();
        options.check_sniffed_type(&data)?;

        let path = self
            .storage
            .store(options.save_path.as_deref(), file_name, &data)
            .await?;

        if let Some(prefix) = options.content_type_prefix.as_deref() {
            if let Err(e) = check_content_type(&path, prefix).await {
                self.storage.discard(&path).await;
                return Err(e);
            }
        }

        tracing::debug!(
            "Accepted upload field={} filename={} size={} path={}",
            field_name,
            file_name,
            size,
            path.display()
        );
        Ok(path)
    }
}

async fn check_content_type(path: &std::path::Path, prefix: &str) -> Result<(), UploadError> {
    let probed = file_type::probe_content_type(path)
        .await
        .map_err(|source| UploadError::IOFailure {
            path: path.display().to_string(),
            source,
        })?;

    match probed {
        None => Err(UploadError::TypeProbeFailed {
            path: path.display().to_string(),
        }),
        Some(content_type) if !content_type.starts_with(prefix) => {
            Err(UploadError::ContentTypeMismatch {
                content_type,
                expected_prefix: prefix.to_string(),
            })
        }
        Some(_) => Ok(()),
    }
}
