use axum::Router;
use std::sync::Arc;
use tempfile::TempDir;

use upload_kit::{
    build_router,
    services::{
        file_storage::FileStorageService,
        initializers::InitializerRegistry,
        lifecycle::{ApplicationEvent, Lifecycle, Readiness},
    },
    utils::config::AppConfig,
    AppState,
};

pub const BOUNDARY: &str = "----upload-kit-test-boundary";

/// Setup a test application with temporary storage. The returned TempDir
/// must outlive the router.
pub fn setup_test_app() -> (Router, TempDir) {
    setup_test_app_with(|_| {})
}

/// Same as `setup_test_app`, with a hook to adjust the config first.
pub fn setup_test_app_with(configure: impl FnOnce(&mut AppConfig)) -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path().to_str().unwrap().to_string();

    // Create test configuration
    let mut config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Use random port for testing
        application_id: "upload-kit-test".to_string(),
        max_file_size: 1024 * 1024, // 1MB
        temp_dir: temp_path.clone(),
        temp_file_max_age_seconds: 3600,
        allowed_extensions: vec!["png".to_string(), "txt".to_string()],
        content_type_prefix: None,
        cors_origins: vec!["*".to_string()],
        request_timeout_seconds: 30,
    };
    configure(&mut config);

    let storage_service = FileStorageService::new(&temp_path)
        .expect("Failed to create storage service");

    let readiness = Arc::new(Readiness::new());
    let lifecycle = Lifecycle::new("upload-kit-test", InitializerRegistry::new())
        .with_client(readiness.clone());
    lifecycle.dispatch(ApplicationEvent::Ready);

    let app_state = AppState {
        config: Arc::new(config),
        storage: Arc::new(storage_service),
        lifecycle: Arc::new(lifecycle),
        readiness,
    };

    (build_router(app_state), temp_dir)
}

/// Create a test PNG image of the given size (signature plus padding)
pub fn create_test_image(size: usize) -> Vec<u8> {
    let mut data = vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, // IHDR chunk length
        0x49, 0x48, 0x44, 0x52, // IHDR
    ];
    data.resize(size.max(data.len()), 0x00);
    data
}

/// Build a multipart/form-data body from (field, filename, bytes) parts
pub fn create_multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();

    for (field, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
