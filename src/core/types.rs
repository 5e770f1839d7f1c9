use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::progress::ProgressTracker;
use super::traits::TransportHandle;
use super::validator::ValidationError;

/// 上传任务唯一标识, 形如 `upload_file_1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum JobStatus {
    /// 已添加，尚未提交上传
    Added,
    /// 等待空闲的上传槽位
    Pending,
    /// 上传中
    Uploading,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Added => "ADDED",
            JobStatus::Pending => "PENDING",
            JobStatus::Uploading => "UPLOADING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file handed to the uploader by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileSource {
    pub path: PathBuf,
    pub size: Option<u64>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, size: Option<u64>) -> Self {
        Self { path: path.into(), size }
    }

    /// Reads the size from the file system.
    pub async fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a file: {}", path.display()),
            ));
        }

        Ok(Self { path, size: Some(metadata.len()) })
    }

    /// Display name: the last path segment, with `\` treated as a separator.
    pub fn name(&self) -> String {
        file_name_of(&self.path)
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    normalized.rsplit('/').next().unwrap_or_default().to_string()
}

/// Extension without the dot, empty when the name has none.
pub fn file_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

/// One accepted file and its upload state.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub source: FileSource,
    /// `None` when the transport cannot know the size.
    pub size_bytes: Option<u64>,
    pub status: JobStatus,
    pub progress: Option<ProgressTracker>,
    pub added_at: DateTime<Utc>,
    pub(crate) transport_handle: Option<TransportHandle>,
}

impl Job {
    pub(crate) fn new(id: JobId, source: FileSource, size_bytes: Option<u64>) -> Self {
        Self {
            id,
            name: source.name(),
            source,
            size_bytes,
            status: JobStatus::Added,
            progress: None,
            added_at: Utc::now(),
            transport_handle: None,
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.progress.as_ref().map(|p| p.current().bytes).unwrap_or(0)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            path: self.source.path.clone(),
            size_bytes: self.size_bytes,
            status: self.status,
            bytes_transferred: self.bytes_transferred(),
            started_at: self.progress.as_ref().map(|p| p.start_time()),
            ended_at: self.progress.as_ref().and_then(|p| p.end_time()),
            added_at: self.added_at,
        }
    }
}

/// Owned copy of a job, handed out by the manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
    pub status: JobStatus,
    pub bytes_transferred: u64,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub added_at: DateTime<Utc>,
}

/// What the transport got back once the bytes were delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TransportResponse {
    /// `None` when the transport cannot observe the status (form fallback).
    pub status: Option<u16>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: Option<u16>, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum EventKind {
    FileAdded,
    FileInvalid,
    TooManyFiles,
    BeforeUpload,
    UploadStarted,
    UploadProgress,
    UploadCompleted,
    UploadFailed,
    UploadAborted,
    JobRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::FileAdded,
        EventKind::FileInvalid,
        EventKind::TooManyFiles,
        EventKind::BeforeUpload,
        EventKind::UploadStarted,
        EventKind::UploadProgress,
        EventKind::UploadCompleted,
        EventKind::UploadFailed,
        EventKind::UploadAborted,
        EventKind::JobRemoved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FileAdded => "fileAdded",
            EventKind::FileInvalid => "fileInvalid",
            EventKind::TooManyFiles => "tooManyFiles",
            EventKind::BeforeUpload => "beforeUpload",
            EventKind::UploadStarted => "uploadStarted",
            EventKind::UploadProgress => "uploadProgress",
            EventKind::UploadCompleted => "uploadCompleted",
            EventKind::UploadFailed => "uploadFailed",
            EventKind::UploadAborted => "uploadAborted",
            EventKind::JobRemoved => "jobRemoved",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 上传事件
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    FileAdded {
        id: JobId,
        name: String,
    },

    FileInvalid {
        name: String,
        reasons: Vec<ValidationError>,
    },

    TooManyFiles {
        name: String,
        message: String,
    },

    /// 上传前最后的准备，处理器可以修改表单字段和请求头
    BeforeUpload {
        id: JobId,
        name: String,
        form_fields: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
    },

    UploadStarted {
        id: JobId,
        name: String,
    },

    UploadProgress {
        id: JobId,
        name: String,
        bytes_transferred: u64,
        bytes_total: u64,
    },

    /// 传输层完成，处理器可以把响应判定为失败
    UploadCompleted {
        id: JobId,
        name: String,
        response: TransportResponse,
    },

    UploadFailed {
        id: JobId,
        name: String,
        message: String,
    },

    UploadAborted {
        id: JobId,
        name: String,
    },

    JobRemoved {
        id: JobId,
        name: String,
    },
}

impl UploadEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UploadEvent::FileAdded { .. } => EventKind::FileAdded,
            UploadEvent::FileInvalid { .. } => EventKind::FileInvalid,
            UploadEvent::TooManyFiles { .. } => EventKind::TooManyFiles,
            UploadEvent::BeforeUpload { .. } => EventKind::BeforeUpload,
            UploadEvent::UploadStarted { .. } => EventKind::UploadStarted,
            UploadEvent::UploadProgress { .. } => EventKind::UploadProgress,
            UploadEvent::UploadCompleted { .. } => EventKind::UploadCompleted,
            UploadEvent::UploadFailed { .. } => EventKind::UploadFailed,
            UploadEvent::UploadAborted { .. } => EventKind::UploadAborted,
            UploadEvent::JobRemoved { .. } => EventKind::JobRemoved,
        }
    }

    /// Job id, absent for events about files that never became jobs.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            UploadEvent::FileInvalid { .. } | UploadEvent::TooManyFiles { .. } => None,
            UploadEvent::FileAdded { id, .. }
            | UploadEvent::BeforeUpload { id, .. }
            | UploadEvent::UploadStarted { id, .. }
            | UploadEvent::UploadProgress { id, .. }
            | UploadEvent::UploadCompleted { id, .. }
            | UploadEvent::UploadFailed { id, .. }
            | UploadEvent::UploadAborted { id, .. }
            | UploadEvent::JobRemoved { id, .. } => Some(id),
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            UploadEvent::FileAdded { name, .. }
            | UploadEvent::FileInvalid { name, .. }
            | UploadEvent::TooManyFiles { name, .. }
            | UploadEvent::BeforeUpload { name, .. }
            | UploadEvent::UploadStarted { name, .. }
            | UploadEvent::UploadProgress { name, .. }
            | UploadEvent::UploadCompleted { name, .. }
            | UploadEvent::UploadFailed { name, .. }
            | UploadEvent::UploadAborted { name, .. }
            | UploadEvent::JobRemoved { name, .. } => name,
        }
    }
}

// 静态断言确保类型是 Send的
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<Job>();
        assert_send::<UploadEvent>();
        assert_send::<JobSnapshot>();
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_windows_style_path() {
        let source = FileSource::new("C:\\fakepath\\report.final.pdf", None);
        assert_eq!(source.name(), "report.final.pdf");
        assert_eq!(file_extension(&source.name()), "pdf");
    }

    #[test]
    fn test_extension_missing() {
        assert_eq!(file_extension("Makefile"), "");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
    }

    #[test]
    fn test_event_kind_names() {
        let event = UploadEvent::UploadProgress {
            id: JobId::from("upload_file_1"),
            name: "a.txt".to_string(),
            bytes_transferred: 1,
            bytes_total: 2,
        };
        assert_eq!(event.kind(), EventKind::UploadProgress);
        assert_eq!(event.kind().to_string(), "uploadProgress");
        assert_eq!(event.job_id().map(JobId::as_str), Some("upload_file_1"));
    }
}
