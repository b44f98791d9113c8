use bytes::Bytes;
use futures_util::Stream;
use multer::{Constraints, Multipart, SizeLimit};

use crate::models::errors::AppError;

/// One file part of a multipart request, fully buffered in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: Some(file_name.into()),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Original filename, `None` when absent or empty.
    pub fn original_filename(&self) -> Option<&str> {
        self.file_name.as_deref().filter(|name| !name.is_empty())
    }

    /// The payload is shared, so every read starts from the first byte.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

/// Lookup of uploaded files by form field name.
pub trait MultipartSource {
    /// Every file submitted under `field`, in submission order.
    fn files(&self, field: &str) -> Vec<&UploadedFile>;

    /// The first file submitted under `field`.
    fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files(field).into_iter().next()
    }
}

/// The file parts of a parsed multipart request.
#[derive(Debug, Clone, Default)]
pub struct MultipartRequest {
    files: Vec<UploadedFile>,
}

impl MultipartRequest {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self { files }
    }

    /// Reads every part of the body. Parts without a `filename` attribute are
    /// plain form values and are skipped.
    pub async fn from_multipart(mut multipart: Multipart<'_>) -> Result<Self, AppError> {
        let mut files = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::error!("Failed to read multipart field: {}", e);
            multipart_error(e, "Failed to parse multipart body")
        })? {
            let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
                continue;
            };
            let field_name = field.name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(|m| m.to_string());

            let data = field.bytes().await.map_err(|e| {
                tracing::error!("Failed to read file data for field {}: {}", field_name, e);
                multipart_error(e, "Failed to read file data")
            })?;

            tracing::debug!(
                "Received file part: field={} filename={:?} content_type={:?} size={}",
                field_name,
                file_name,
                content_type,
                data.len()
            );

            files.push(UploadedFile {
                field_name,
                file_name: Some(file_name),
                content_type,
                data,
            });
        }

        Ok(Self { files })
    }

    /// Parses a multipart body stream given the request's content-type header.
    /// Bodies longer than `body_limit` bytes fail with `PayloadTooLarge`.
    pub async fn from_stream<S, E>(
        content_type: &str,
        stream: S,
        body_limit: Option<u64>,
    ) -> Result<Self, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let boundary = multer::parse_boundary(content_type).map_err(|e| {
            AppError::file_upload_failed(format!("Missing or invalid multipart boundary: {}", e))
        })?;

        let multipart = match body_limit {
            Some(limit) => Multipart::with_constraints(
                stream,
                boundary,
                Constraints::new().size_limit(SizeLimit::new().whole_stream(limit)),
            ),
            None => Multipart::new(stream, boundary),
        };
        Self::from_multipart(multipart).await
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn multipart_error(error: multer::Error, context: &str) -> AppError {
    match error {
        multer::Error::StreamSizeExceeded { limit } => AppError::PayloadTooLarge { limit },
        multer::Error::FieldSizeExceeded { limit, .. } => AppError::PayloadTooLarge { limit },
        other => AppError::file_upload_failed(format!("{}: {}", context, other)),
    }
}

impl MultipartSource for MultipartRequest {
    fn files(&self, field: &str) -> Vec<&UploadedFile> {
        self.files.iter().filter(|f| f.field_name == field).collect()
    }
}
