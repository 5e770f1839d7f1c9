//! Batch file uploader.
//!
//! [`Uploader`] is the synchronous scheduler: it validates files, bounds the
//! number of concurrent uploads, tracks progress and publishes lifecycle
//! events. [`UploadManager`] runs one on a tokio task and exposes it through
//! async commands.

pub mod config;
pub mod core;
pub mod manager;
pub mod transports;
pub mod utils;

// 重新导出核心类型
pub use config::{ErrorMessages, SizeRange, UploaderConfig};
pub use core::{
    EventKind,
    FileSource,
    HandlerError,
    JobId,
    JobSnapshot,
    JobStatus,
    Outcome,
    Result,
    TransportResponse,
    TransportStrategy,
    UploadEvent,
    Uploader,
    UploaderError,
};
pub use manager::{UploadManager, UploadManagerHandle};
pub use transports::{FormTransport, StreamingTransport};
