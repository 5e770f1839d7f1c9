use serde::{Serialize, Serializer};
use crate::config::UploaderConfig;
use super::messages::{render_message, FileInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    InvalidType = 1,
    SizeTooSmall = 2,
    SizeTooLarge = 3,
}

impl ValidationCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Serialized as the numeric code.
impl Serialize for ValidationCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
}

/// Per-file checks run before a file becomes a job.
///
/// Every violated rule is reported, in the order type, minimum size, maximum size.
/// Sizes are only checked when the size is known.
pub struct FileValidator<'a> {
    config: &'a UploaderConfig,
}

impl<'a> FileValidator<'a> {
    pub fn new(config: &'a UploaderConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, file: FileInfo<'_>) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let messages = &self.config.messages;

        if let Some(allowed) = self.config.accepted_extensions.as_ref().filter(|exts| !exts.is_empty()) {
            let dotted = format!(".{}", file.extension());
            if !allowed.iter().any(|ext| *ext == dotted) {
                errors.push(self.error(ValidationCode::InvalidType, &messages.invalid_type, file));
            }
        }

        if let Some(size) = file.size {
            let range = self.config.accepted_size_kib;
            if range.min_bytes().is_some_and(|min| size < min) {
                errors.push(self.error(ValidationCode::SizeTooSmall, &messages.size_too_small, file));
            }
            if range.max_bytes().is_some_and(|max| size > max) {
                errors.push(self.error(ValidationCode::SizeTooLarge, &messages.size_too_large, file));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn error(&self, code: ValidationCode, template: &str, file: FileInfo<'_>) -> ValidationError {
        ValidationError {
            code,
            message: render_message(template, file, self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeRange;

    fn config(extensions: Option<&[&str]>, min: Option<u64>, max: Option<u64>) -> UploaderConfig {
        UploaderConfig {
            accepted_extensions: extensions.map(|exts| exts.iter().map(|e| e.to_string()).collect()),
            accepted_size_kib: SizeRange { min, max },
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_anything_by_default() {
        let config = UploaderConfig::default();
        let validator = FileValidator::new(&config);
        assert!(validator.validate(FileInfo::new("anything.exe", Some(u64::MAX))).is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let config = config(Some(&[".jpg"]), Some(10), None);
        let validator = FileValidator::new(&config);

        let errors = validator.validate(FileInfo::new("notes.txt", Some(100))).unwrap_err();
        let codes: Vec<u8> = errors.iter().map(|e| e.code.code()).collect();
        assert_eq!(codes, vec![1, 2]);
        assert!(errors[0].message.contains("notes.txt"));
        assert!(errors[0].message.contains(".jpg"));
        assert!(errors[1].message.contains("10.0 KB"));
    }

    #[test]
    fn test_size_limits_are_kib() {
        let config = config(None, Some(1), Some(2));
        let validator = FileValidator::new(&config);

        assert!(validator.validate(FileInfo::new("a", Some(1024))).is_ok());
        assert!(validator.validate(FileInfo::new("a", Some(2048))).is_ok());

        let too_small = validator.validate(FileInfo::new("a", Some(1023))).unwrap_err();
        assert_eq!(too_small[0].code, ValidationCode::SizeTooSmall);

        let too_large = validator.validate(FileInfo::new("a", Some(2049))).unwrap_err();
        assert_eq!(too_large[0].code, ValidationCode::SizeTooLarge);
    }

    #[test]
    fn test_serializes_numeric_code() {
        let error = ValidationError {
            code: ValidationCode::SizeTooLarge,
            message: "too large".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 3, "message": "too large" }));
    }

    #[test]
    fn test_unknown_size_skips_size_checks() {
        let config = config(Some(&[".png"]), Some(1), Some(2));
        let validator = FileValidator::new(&config);
        assert!(validator.validate(FileInfo::new("a.png", None)).is_ok());
    }

    #[test]
    fn test_empty_allow_list_accepts_all_types() {
        let config = config(Some(&[]), None, None);
        let validator = FileValidator::new(&config);
        assert!(validator.validate(FileInfo::new("a.bin", Some(1))).is_ok());
    }
}
