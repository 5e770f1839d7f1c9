use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use super::types::{JobId, TransportResponse};

/// 传输能力, 构造时确定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// The file size is known up front, so progress/speed/ETA are defined.
    pub reports_size: bool,
    /// Progress events are emitted while bytes are sent.
    pub reports_progress: bool,
}

/// Everything a transport needs to send one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub job_id: JobId,
    pub name: String,
    pub path: PathBuf,
    pub size: Option<u64>,
    pub url: String,
    pub method: String,
    pub field_name: String,
    pub headers: BTreeMap<String, String>,
    pub form_fields: BTreeMap<String, String>,
}

/// Opaque handle to an in-flight transfer.
#[derive(Debug, Clone, Default)]
pub struct TransportHandle {
    token: CancellationToken,
}

impl TransportHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Could not reach the server, rendered with the `networkError` template.
    Network,
    /// Rendered as a message template.
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Progress {
        bytes_sent: u64,
        bytes_total: u64,
    },
    Completed(TransportResponse),
    Failed(FailureReason),
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub job_id: JobId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn progress(job_id: JobId, bytes_sent: u64, bytes_total: u64) -> Self {
        Self { job_id, kind: TransportEventKind::Progress { bytes_sent, bytes_total } }
    }

    pub fn completed(job_id: JobId, response: TransportResponse) -> Self {
        Self { job_id, kind: TransportEventKind::Completed(response) }
    }

    pub fn failed(job_id: JobId, reason: FailureReason) -> Self {
        Self { job_id, kind: TransportEventKind::Failed(reason) }
    }

    pub fn aborted(job_id: JobId) -> Self {
        Self { job_id, kind: TransportEventKind::Aborted }
    }
}

/// Where a transport reports back. Sends never block; a closed channel means
/// the uploader is gone and the report is dropped.
#[derive(Debug, Clone)]
pub struct TransportSink {
    job_id: JobId,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportSink {
    pub fn new(job_id: JobId, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { job_id, tx }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn progress(&self, bytes_sent: u64, bytes_total: u64) {
        let _ = self.tx.send(TransportEvent::progress(self.job_id.clone(), bytes_sent, bytes_total));
    }

    pub fn completed(&self, response: TransportResponse) {
        let _ = self.tx.send(TransportEvent::completed(self.job_id.clone(), response));
    }

    pub fn failed(&self, reason: FailureReason) {
        let _ = self.tx.send(TransportEvent::failed(self.job_id.clone(), reason));
    }

    pub fn aborted(&self) {
        let _ = self.tx.send(TransportEvent::aborted(self.job_id.clone()));
    }
}

/// 传输策略 - 所有传输实现都必须实现此接口
///
/// `begin` must return right away; results arrive later through the sink.
pub trait TransportStrategy: Send + Sync {
    fn begin(&self, request: TransferRequest, sink: TransportSink) -> TransportHandle;

    /// Asks the transfer to stop. The transport answers with `aborted`
    /// unless a terminal event wins the race.
    fn cancel(&self, handle: &TransportHandle) {
        handle.cancel();
    }

    fn capabilities(&self) -> TransportCapabilities;

    fn name(&self) -> &str;
}
