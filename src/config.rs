use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::core::{Result, UploaderError};

/// Message templates, `{{placeholder}}` tokens are filled per file.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorMessages {
    pub invalid_type: String,
    pub size_too_small: String,
    pub size_too_large: String,
    pub too_many_files: String,
    pub network_error: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            invalid_type: "The file '{{fileName}}' is not valid. Please upload only files with the following extensions: {{allowedExtensions}}.".to_string(),
            size_too_small: "The file '{{fileName}}' is too small. Please upload only files bigger than {{allowedMinSize}}.".to_string(),
            size_too_large: "The file '{{fileName}}' is too large. Please upload only files smaller than {{allowedMaxSize}}.".to_string(),
            too_many_files: "Can not upload the file '{{fileName}}', because you can upload only {{maxFiles}} file(s).".to_string(),
            network_error: "There was a problem uploading the file '{{fileName}}'. Please try uploading that file again.".to_string(),
        }
    }
}

/// Accepted size interval, in KiB.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn min_bytes(&self) -> Option<u64> {
        self.min.map(|kib| kib.saturating_mul(1024))
    }

    pub fn max_bytes(&self) -> Option<u64> {
        self.max.map(|kib| kib.saturating_mul(1024))
    }

    /// Both limits fit in a byte count.
    pub fn is_representable(&self) -> bool {
        [self.min, self.max]
            .into_iter()
            .flatten()
            .all(|kib| kib.checked_mul(1024).is_some())
    }
}

/// 上传器配置
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UploaderConfig {
    /// 上传地址
    pub url: String,
    /// 请求方法
    pub method: String,
    /// 文件字段名
    pub field_name: String,
    /// 最大并发上传数
    pub concurrency_limit: usize,
    /// 最多接受的文件数，`None` 不限制
    pub max_files: Option<usize>,
    /// 添加后立即上传
    pub auto_start: bool,
    /// 失败后从列表移除
    pub remove_on_fail: bool,
    /// 允许的扩展名，带点，例如 `.jpg`
    pub accepted_extensions: Option<Vec<String>>,
    pub accepted_size_kib: SizeRange,
    pub extra_headers: BTreeMap<String, String>,
    pub extra_form_fields: BTreeMap<String, String>,
    pub id_prefix: String,
    pub messages: ErrorMessages,
    /// Use the buffered form transport even where streaming works.
    pub force_fallback: bool,
    pub request_timeout_secs: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            field_name: "file".to_string(),
            concurrency_limit: 3,
            max_files: None,
            auto_start: true,
            remove_on_fail: true,
            accepted_extensions: None,
            accepted_size_kib: SizeRange::default(),
            extra_headers: BTreeMap::new(),
            extra_form_fields: BTreeMap::new(),
            id_prefix: "upload_".to_string(),
            messages: ErrorMessages::default(),
            force_fallback: false,
            request_timeout_secs: 300,
        }
    }
}

impl UploaderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: UploaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(UploaderError::config("concurrency_limit must be at least 1"));
        }

        if !self.url.is_empty() {
            Url::parse(&self.url)?;
        }

        if reqwest::Method::from_bytes(self.method.as_bytes()).is_err() {
            return Err(UploaderError::config(format!("Invalid method: {}", self.method)));
        }

        if !self.accepted_size_kib.is_representable() {
            return Err(UploaderError::config("accepted_size_kib is too large to express in bytes"));
        }

        if let (Some(min), Some(max)) = (self.accepted_size_kib.min, self.accepted_size_kib.max) {
            if min > max {
                return Err(UploaderError::config(format!(
                    "accepted_size_kib.min ({min}) is larger than accepted_size_kib.max ({max})"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploaderConfig::default();
        assert_eq!(config.method, "POST");
        assert_eq!(config.field_name, "file");
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.max_files, None);
        assert!(config.auto_start);
        assert!(config.remove_on_fail);
        assert_eq!(config.id_prefix, "upload_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let config = UploaderConfig::from_toml_str(r#"
            url = "https://example.com/upload"
            concurrency_limit = 1
            max_files = 5
            accepted_extensions = [".jpg", ".png"]

            [accepted_size_kib]
            max = 2048

            [extra_form_fields]
            album = "holiday"

            [messages]
            networkError = "Network down for {{fileName}}"
        "#).unwrap();

        assert_eq!(config.concurrency_limit, 1);
        assert_eq!(config.max_files, Some(5));
        assert_eq!(config.accepted_size_kib.max_bytes(), Some(2048 * 1024));
        assert_eq!(config.accepted_size_kib.min_bytes(), None);
        assert_eq!(config.extra_form_fields["album"], "holiday");
        assert_eq!(config.messages.network_error, "Network down for {{fileName}}");
        // 未设置的模板保持默认
        assert_eq!(config.messages.invalid_type, ErrorMessages::default().invalid_type);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = UploaderConfig::from_toml_str("concurrency_limit = 0").unwrap_err();
        assert!(matches!(err, UploaderError::Config(_)));
    }

    #[test]
    fn test_oversized_limits_rejected() {
        let config = UploaderConfig {
            accepted_size_kib: SizeRange { min: None, max: Some(u64::MAX / 512) },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(UploaderError::Config(_))));
        assert_eq!(config.accepted_size_kib.max_bytes(), Some(u64::MAX));

        let largest = SizeRange { min: None, max: Some(u64::MAX / 1024) };
        assert!(largest.is_representable());
    }

    #[test]
    fn test_bad_url_rejected() {
        let err = UploaderConfig::from_toml_str(r#"url = "not a url""#).unwrap_err();
        assert!(matches!(err, UploaderError::InvalidUrl(_)));
    }
}
