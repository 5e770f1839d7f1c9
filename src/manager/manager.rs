use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use crate::config::UploaderConfig;
use crate::core::{
    EventKind, FileSource, HandlerError, JobId, JobSnapshot, JobStatus, Outcome, Result,
    TransportEvent, TransportStrategy, UploadEvent, Uploader, UploaderError,
};
use crate::transports;
use super::types::ManagerCommand;
use super::worker::UploadManagerWorker;

/// Async front of an [`Uploader`] running on its own task.
#[derive(Clone, Debug)]
pub struct UploadManager {
    command_tx: mpsc::Sender<ManagerCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
}

/// 上传管理器句柄 - 包含管理器和工作线程
#[derive(Debug)]
pub struct UploadManagerHandle {
    pub manager: UploadManager,
    pub worker_handle: JoinHandle<()>,
}

impl UploadManagerHandle {
    /// Drops this manager and waits for the worker. Other clones of the
    /// manager keep the worker alive.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.manager);
        self.worker_handle
            .await
            .map_err(|err| UploaderError::Internal(format!("Worker panic: {}", err)))
    }
}

impl UploadManager {
    pub fn new(config: UploaderConfig, transport: Arc<dyn TransportStrategy>) -> Result<UploadManagerHandle> {
        let (uploader, transport_rx) = Uploader::new(config, transport)?;
        Ok(Self::spawn(uploader, transport_rx))
    }

    /// Builds the transport from the configuration; an upload URL is required.
    pub fn from_config(config: UploaderConfig) -> Result<UploadManagerHandle> {
        if config.url.is_empty() {
            return Err(UploaderError::config("url is required"));
        }
        let transport = transports::from_config(&config)?;
        Self::new(config, transport)
    }

    /// Runs an already built uploader.
    pub fn spawn(
        uploader: Uploader,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> UploadManagerHandle {
        let (command_tx, command_rx) = mpsc::channel(100);
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);

        let uploader = uploader.with_observer(event_tx.clone());
        let worker_handle = tokio::spawn(UploadManagerWorker::run(uploader, command_rx, transport_rx));

        UploadManagerHandle {
            manager: Self { command_tx, event_tx },
            worker_handle,
        }
    }

    /// Every event the uploader publishes, after its handlers ran.
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    /// Reads the size of every path, then submits them in order.
    pub async fn add_files(&self, paths: Vec<PathBuf>) -> Result<Vec<JobId>> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(FileSource::from_path(path).await?);
        }
        self.add_sources(files).await
    }

    pub async fn add_sources(&self, files: Vec<FileSource>) -> Result<Vec<JobId>> {
        self.request(|reply| ManagerCommand::Add { files, reply }).await?
    }

    pub async fn start(&self, id: JobId) -> Result<()> {
        self.request(|reply| ManagerCommand::Start { id, reply }).await?
    }

    pub async fn start_all(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::StartAll { reply }).await?
    }

    pub async fn abort(&self, id: JobId) -> Result<()> {
        self.request(|reply| ManagerCommand::Abort { id, reply }).await?
    }

    pub async fn abort_all(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::AbortAll { reply }).await?
    }

    pub async fn remove(&self, id: JobId) -> Result<()> {
        self.request(|reply| ManagerCommand::Remove { id, reply }).await?
    }

    /// Registers a handler; it runs on the worker task.
    pub async fn on<F>(&self, kind: EventKind, handler: F) -> Result<()>
    where
        F: FnMut(&mut UploadEvent) -> std::result::Result<Outcome, HandlerError> + Send + 'static,
    {
        let handler = Box::new(handler);
        self.request(|reply| ManagerCommand::Subscribe { kind, handler, reply }).await
    }

    pub async fn off(&self, kind: Option<EventKind>) -> Result<()> {
        self.request(|reply| ManagerCommand::Unsubscribe { kind, reply }).await
    }

    pub async fn count(&self, status: Option<JobStatus>) -> Result<usize> {
        self.request(|reply| ManagerCommand::Count { status, reply }).await
    }

    pub async fn is_busy(&self, id: Option<JobId>) -> Result<bool> {
        self.request(|reply| ManagerCommand::IsBusy { id, reply }).await?
    }

    pub async fn total_bytes(&self, id: Option<JobId>) -> Result<Option<u64>> {
        self.request(|reply| ManagerCommand::TotalBytes { id, reply }).await?
    }

    pub async fn total_transferred(&self, id: Option<JobId>) -> Result<Option<u64>> {
        self.request(|reply| ManagerCommand::TotalTransferred { id, reply }).await?
    }

    pub async fn speed(&self, id: Option<JobId>, average: bool) -> Result<Option<u64>> {
        self.request(|reply| ManagerCommand::Speed { id, average, reply }).await?
    }

    pub async fn time_remaining(&self, id: Option<JobId>, average: bool) -> Result<Option<u64>> {
        self.request(|reply| ManagerCommand::TimeRemaining { id, average, reply }).await?
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<JobSnapshot>> {
        self.request(|reply| ManagerCommand::GetJob { id, reply }).await
    }

    pub async fn get_all_jobs(&self) -> Result<Vec<JobSnapshot>> {
        self.request(|reply| ManagerCommand::GetAllJobs { reply }).await
    }

    pub async fn destroy(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::Destroy { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| UploaderError::ManagerShutdown)?;

        // 等待响应
        reply_rx.await.map_err(|_| UploaderError::ManagerShutdown)
    }
}
