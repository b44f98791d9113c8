use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub application_id: String,
    pub max_file_size: u64,
    pub temp_dir: String,
    pub temp_file_max_age_seconds: u64,
    pub allowed_extensions: Vec<String>,
    pub content_type_prefix: Option<String>,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            application_id: "upload-kit".to_string(),
            max_file_size: 10 * 1024 * 1024, // 10MB
            temp_dir: env::temp_dir()
                .join("upload-kit")
                .to_string_lossy()
                .into_owned(),
            temp_file_max_age_seconds: 24 * 3600,
            allowed_extensions: Vec::new(),
            content_type_prefix: None,
            cors_origins: vec!["*".to_string()],
            request_timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }

        if let Ok(port) = env::var("PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                config.port = port_num;
            }
        }

        if let Ok(id) = env::var("APPLICATION_ID") {
            if !id.trim().is_empty() {
                config.application_id = id.trim().to_string();
            }
        }

        if let Ok(max_size) = env::var("MAX_FILE_SIZE") {
            if let Ok(size) = max_size.parse::<u64>() {
                config.max_file_size = size;
            }
        }

        if let Ok(temp_dir) = env::var("TEMP_DIR") {
            config.temp_dir = temp_dir;
        }

        if let Ok(age) = env::var("TEMP_FILE_MAX_AGE_SECONDS") {
            if let Ok(age_secs) = age.parse::<u64>() {
                config.temp_file_max_age_seconds = age_secs;
            }
        }

        if let Ok(exts) = env::var("UPLOAD_ALLOWED_EXTENSIONS") {
            config.allowed_extensions = split_list(&exts);
        }

        if let Ok(prefix) = env::var("UPLOAD_CONTENT_TYPE_PREFIX") {
            let prefix = prefix.trim();
            config.content_type_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        }

        if let Ok(origins) = env::var("CORS_ORIGINS") {
            config.cors_origins = split_list(&origins);
        }

        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECONDS") {
            if let Ok(timeout_num) = timeout.parse::<u64>() {
                config.request_timeout_seconds = timeout_num;
            }
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upper bound for a whole multipart body. Leaves headroom over the
    /// per-file limit for boundaries and the other parts. `None` when the
    /// file size is unlimited.
    pub fn body_limit(&self) -> Option<u64> {
        if self.max_file_size == 0 {
            return None;
        }
        Some(self.max_file_size.saturating_mul(4).saturating_add(64 * 1024))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_skips_blanks() {
        assert_eq!(split_list(" png, jpg ,,gif"), vec!["png", "jpg", "gif"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(config.temp_dir.ends_with("upload-kit"));
        assert!(config.body_limit().unwrap() > config.max_file_size);
    }

    #[test]
    fn test_zero_max_file_size_has_no_body_limit() {
        let config = AppConfig {
            max_file_size: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.body_limit(), None);
    }
}
