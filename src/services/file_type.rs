use std::path::Path;

use mime::Mime;
use tokio::io::AsyncReadExt;

/// Number of leading bytes inspected for a signature.
const SNIFF_LEN: usize = 8192;

/// Detects a file type from its leading bytes and returns its canonical
/// extension token (`png`, `jpg`, `pdf`, ...).
pub fn sniff_type(data: &[u8]) -> Option<&'static str> {
    let head = &data[..data.len().min(SNIFF_LEN)];
    infer::get(head).map(|kind| kind.extension())
}

/// True when `detected` matches any of `allowed`, ignoring ASCII case.
pub fn type_allowed(detected: Option<&str>, allowed: &[String]) -> bool {
    match detected {
        Some(detected) => allowed.iter().any(|a| a.eq_ignore_ascii_case(detected)),
        None => false,
    }
}

/// Media type of a file on disk. Content signatures win; text formats with no
/// signature fall back to the extension.
pub async fn probe_content_type(path: &Path) -> std::io::Result<Option<String>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;

    if let Some(kind) = infer::get(&head) {
        return Ok(Some(kind.mime_type().to_string()));
    }

    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| mime_for_extension(&ext.to_ascii_lowercase()));

    Ok(by_extension.map(|m| m.to_string()))
}

fn mime_for_extension(ext: &str) -> Option<Mime> {
    let mime = match ext {
        "txt" | "log" | "text" => mime::TEXT_PLAIN,
        "htm" | "html" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "csv" => mime::TEXT_CSV,
        "js" | "mjs" => mime::TEXT_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "xml" => mime::TEXT_XML,
        "svg" => mime::IMAGE_SVG,
        "md" | "markdown" => return "text/markdown".parse().ok(),
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn test_sniff_known_signatures() {
        assert_eq!(sniff_type(PNG_HEADER), Some("png"));
        assert_eq!(sniff_type(JPEG_HEADER), Some("jpg"));
        assert_eq!(sniff_type(b"%PDF-1.7\n"), Some("pdf"));
        assert_eq!(sniff_type(b"just some words"), None);
        assert_eq!(sniff_type(&[]), None);
    }

    #[test]
    fn test_type_allowed_ignores_case() {
        let allowed = vec!["PNG".to_string(), "gif".to_string()];
        assert!(type_allowed(Some("png"), &allowed));
        assert!(!type_allowed(Some("jpg"), &allowed));
        assert!(!type_allowed(None, &allowed));
    }

    #[tokio::test]
    async fn test_content_type_prefers_signature() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.txt");
        tokio::fs::write(&path, PNG_HEADER).await.unwrap();
        let probed = probe_content_type(&path).await.unwrap();
        assert_eq!(probed.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_content_type_falls_back_to_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.TXT");
        tokio::fs::write(&path, b"plain words").await.unwrap();
        let probed = probe_content_type(&path).await.unwrap();
        assert_eq!(probed.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_unknown_content_type_yields_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        tokio::fs::write(&path, b"\x01\x02\x03").await.unwrap();
        assert!(probe_content_type(&path).await.unwrap().is_none());
    }
}
