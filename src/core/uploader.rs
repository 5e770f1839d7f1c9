use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use crate::config::UploaderConfig;
use super::clock::{Clock, SystemClock};
use super::errors::{HandlerError, Result, UploaderError};
use super::events::{EventBus, EventHandler, Outcome};
use super::messages::{render_message, FileInfo};
use super::progress::ProgressTracker;
use super::queue::JobQueue;
use super::traits::{
    FailureReason, TransferRequest, TransportEvent, TransportEventKind, TransportSink,
    TransportStrategy,
};
use super::types::{EventKind, FileSource, Job, JobId, JobStatus, TransportResponse, UploadEvent};
use super::validator::FileValidator;

/// The scheduler facade.
///
/// Single owner of the job queue: every state change goes through `&mut self`,
/// so invariants hold as long as callers serialize access (the manager actor
/// does). Transports report back through the channel returned by [`Uploader::new`];
/// feed those events to [`Uploader::handle_transport_event`].
pub struct Uploader {
    config: UploaderConfig,
    queue: JobQueue,
    bus: EventBus,
    transport: Arc<dyn TransportStrategy>,
    clock: Arc<dyn Clock>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    observer: Option<broadcast::Sender<UploadEvent>>,
    destroyed: bool,
}

impl Uploader {
    pub fn new(
        config: UploaderConfig,
        transport: Arc<dyn TransportStrategy>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>)> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let uploader = Self {
            config,
            queue: JobQueue::new(),
            bus: EventBus::new(),
            transport,
            clock: Arc::new(SystemClock),
            events_tx,
            observer: None,
            destroyed: false,
        };

        Ok((uploader, events_rx))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Also forwards every published event to `observer`.
    pub fn with_observer(mut self, observer: broadcast::Sender<UploadEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: FnMut(&mut UploadEvent) -> std::result::Result<Outcome, HandlerError> + Send + 'static,
    {
        self.bus.on(kind, Box::new(handler));
        self
    }

    pub fn on_boxed(&mut self, kind: EventKind, handler: EventHandler) -> &mut Self {
        self.bus.on(kind, handler);
        self
    }

    pub fn off(&mut self, kind: Option<EventKind>) {
        self.bus.off(kind);
    }

    /// Submits every file in order; returns the ids of the accepted ones.
    pub fn add(&mut self, files: impl IntoIterator<Item = FileSource>) -> Result<Vec<JobId>> {
        let mut accepted = Vec::new();
        for file in files {
            if let Some(id) = self.submit(file)? {
                accepted.push(id);
            }
        }
        Ok(accepted)
    }

    /// Admission check, validation, then a new `Added` job.
    ///
    /// Rejections are notifications, not errors: `Ok(None)` means the file was
    /// turned away and a `tooManyFiles` or `fileInvalid` event went out.
    pub fn submit(&mut self, file: FileSource) -> Result<Option<JobId>> {
        self.ensure_alive()?;

        let name = file.name();
        let size = if self.transport.capabilities().reports_size { file.size } else { None };
        let info = FileInfo::new(&name, size);

        if let Some(max) = self.config.max_files {
            if self.queue.accepted() >= max {
                let message = render_message(&self.config.messages.too_many_files, info, &self.config);
                warn!("Rejected {}: max files ({}) reached", name, max);
                self.publish(UploadEvent::TooManyFiles { name, message })?;
                return Ok(None);
            }
        }

        if let Err(reasons) = FileValidator::new(&self.config).validate(info) {
            warn!("Rejected {}: {} validation error(s)", name, reasons.len());
            self.publish(UploadEvent::FileInvalid { name, reasons })?;
            return Ok(None);
        }

        let id = self.queue.next_id(&self.config.id_prefix);
        self.queue.insert(Job::new(id.clone(), file, size));
        self.queue.increment_accepted();
        info!("Accepted {} as {}", name, id);

        self.publish(UploadEvent::FileAdded { id: id.clone(), name })?;

        if self.config.auto_start {
            self.start(&id)?;
        }

        Ok(Some(id))
    }

    /// Starts the job if a slot is free, otherwise queues it.
    pub fn start(&mut self, id: &JobId) -> Result<()> {
        self.ensure_alive()?;

        let job = self.queue.require(id)?;
        let (status, name) = (job.status, job.name.clone());
        match status {
            JobStatus::Uploading => return Ok(()),
            JobStatus::Completed | JobStatus::Failed => {
                debug!("Ignoring start for {} in state {}", id, status);
                return Ok(());
            }
            JobStatus::Added | JobStatus::Pending => {}
        }

        // 有等待中的任务时排到队尾
        if status == JobStatus::Added && self.queue.pending_head().is_some() {
            self.queue.enqueue(id);
            debug!("{} queued behind pending jobs", id);
            return self.promote_next();
        }

        let uploading = self.queue.count(Some(JobStatus::Uploading));
        if uploading >= self.config.concurrency_limit {
            if status != JobStatus::Pending {
                self.queue.enqueue(id);
                debug!("{} queued, {} slot(s) busy", id, uploading);
            }
            return Ok(());
        }

        // 处理器出错时任务保持原状态和队列位置
        let event = self.publish(UploadEvent::BeforeUpload {
            id: id.clone(),
            name: name.clone(),
            form_fields: self.config.extra_form_fields.clone(),
            headers: self.config.extra_headers.clone(),
        })?;
        self.queue.dequeue(id);
        let (form_fields, headers) = match event {
            UploadEvent::BeforeUpload { form_fields, headers, .. } => (form_fields, headers),
            _ => (self.config.extra_form_fields.clone(), self.config.extra_headers.clone()),
        };

        let job = self.queue.require(id)?;
        let request = TransferRequest {
            job_id: id.clone(),
            name: name.clone(),
            path: job.source.path.clone(),
            size: job.size_bytes,
            url: self.config.url.clone(),
            method: self.config.method.clone(),
            field_name: self.config.field_name.clone(),
            headers,
            form_fields,
        };

        let sink = TransportSink::new(id.clone(), self.events_tx.clone());
        let handle = self.transport.begin(request, sink);
        let now = self.clock.now_millis();

        if let Some(job) = self.queue.get_mut(id) {
            job.status = JobStatus::Uploading;
            job.transport_handle = Some(handle);
            job.progress = Some(ProgressTracker::start(now));
        }
        info!("Upload started: {} ({}) via {}", id, name, self.transport.name());

        self.publish(UploadEvent::UploadStarted { id: id.clone(), name })?;
        Ok(())
    }

    /// Starts every `Added` job in insertion order.
    pub fn start_all(&mut self) -> Result<()> {
        for id in self.queue.ids_with_status(JobStatus::Added) {
            self.start(&id)?;
        }
        Ok(())
    }

    /// Asks the transport to cancel; the job is removed when `aborted` comes back.
    pub fn abort(&mut self, id: &JobId) -> Result<()> {
        self.ensure_alive()?;

        let job = self.queue.require(id)?;
        if job.status != JobStatus::Uploading {
            return Ok(());
        }

        if let Some(handle) = &job.transport_handle {
            debug!("Cancelling transfer of {}", id);
            self.transport.cancel(handle);
        }
        Ok(())
    }

    pub fn abort_all(&mut self) -> Result<()> {
        for id in self.queue.ids_with_status(JobStatus::Uploading) {
            self.abort(&id)?;
        }
        Ok(())
    }

    /// Drops the job whatever its state. An uploading job's transfer is
    /// cancelled and its slot handed to the next pending job.
    pub fn remove(&mut self, id: &JobId) -> Result<()> {
        self.ensure_alive()?;

        let job = self.queue.require(id)?;
        let status = job.status;
        if status == JobStatus::Uploading {
            if let Some(handle) = &job.transport_handle {
                self.transport.cancel(handle);
            }
        }

        // 失败的任务在失败时已经减过计数
        let mut result = self.remove_job(id, status != JobStatus::Failed);

        if status == JobStatus::Uploading {
            keep_first(&mut result, self.promote_next());
        }
        result
    }

    /// Drops the job from the queue and announces it. `counted` tells whether
    /// the job still holds a place in the accepted count.
    fn remove_job(&mut self, id: &JobId, counted: bool) -> Result<()> {
        let Some(job) = self.queue.remove(id) else {
            return Ok(());
        };
        if counted {
            self.queue.decrement_accepted();
        }
        debug!("Removed {} ({})", id, job.status);

        self.publish(UploadEvent::JobRemoved { id: job.id, name: job.name })?;
        Ok(())
    }

    /// Offers a free slot to the head of the pending queue.
    fn promote_next(&mut self) -> Result<()> {
        match self.queue.pending_head().cloned() {
            Some(id) => self.start(&id),
            None => Ok(()),
        }
    }

    /// Applies a report from a transport.
    ///
    /// Reports about jobs that are no longer uploading are ignored, so only the
    /// first terminal event of a job counts.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }

        let TransportEvent { job_id, kind } = event;
        let is_uploading = self
            .queue
            .get(&job_id)
            .is_some_and(|job| job.status == JobStatus::Uploading);
        if !is_uploading {
            debug!("Ignoring transport event for {}: not uploading", job_id);
            return Ok(());
        }

        match kind {
            TransportEventKind::Progress { bytes_sent, bytes_total } => {
                self.on_progress(&job_id, bytes_sent, bytes_total)
            }
            TransportEventKind::Completed(response) => self.on_completed(&job_id, response),
            TransportEventKind::Failed(reason) => {
                let message = self.failure_message(&job_id, reason);
                self.on_failed(&job_id, message)
            }
            TransportEventKind::Aborted => self.on_aborted(&job_id),
        }
    }

    fn on_progress(&mut self, id: &JobId, bytes_sent: u64, bytes_total: u64) -> Result<()> {
        let now = self.clock.now_millis();
        let Some(job) = self.queue.get_mut(id) else {
            return Ok(());
        };
        if let Some(progress) = job.progress.as_mut() {
            progress.record(now, bytes_sent, bytes_total);
        }
        let name = job.name.clone();

        self.publish(UploadEvent::UploadProgress {
            id: id.clone(),
            name,
            bytes_transferred: bytes_sent,
            bytes_total,
        })?;
        Ok(())
    }

    fn on_completed(&mut self, id: &JobId, response: TransportResponse) -> Result<()> {
        let name = self.job_name(id);
        let published = self.publish_with_outcome(UploadEvent::UploadCompleted {
            id: id.clone(),
            name,
            response,
        });
        // 处理器出错时按正常完成处理, 错误在收尾后返回
        let (outcome, mut result) = match published {
            Ok(outcome) => (outcome, Ok(())),
            Err(err) => (Outcome::Normal, Err(err)),
        };

        if let Outcome::Failure(template) = outcome {
            let message = self.render_for(id, &template);
            warn!("Upload of {} rejected by handler: {}", id, message);
            return self.on_failed(id, message);
        }

        let now = self.clock.now_millis();
        if let Some(job) = self.queue.get_mut(id) {
            job.status = JobStatus::Completed;
            job.transport_handle = None;
            if let Some(progress) = job.progress.as_mut() {
                progress.finish(now);
            }
            info!("Upload completed: {} ({})", id, job.name);
        }

        keep_first(&mut result, self.promote_next());
        result
    }

    fn on_failed(&mut self, id: &JobId, message: String) -> Result<()> {
        let Some(job) = self.queue.get_mut(id) else {
            return self.promote_next();
        };
        job.status = JobStatus::Failed;
        job.transport_handle = None;
        job.progress = None;
        let name = job.name.clone();
        self.queue.decrement_accepted();
        warn!("Upload failed: {} ({}): {}", id, name, message);

        let mut result = self.publish(UploadEvent::UploadFailed { id: id.clone(), name, message }).map(drop);

        if self.config.remove_on_fail {
            keep_first(&mut result, self.remove_job(id, false));
        }

        keep_first(&mut result, self.promote_next());
        result
    }

    fn on_aborted(&mut self, id: &JobId) -> Result<()> {
        let name = self.job_name(id);
        info!("Upload aborted: {} ({})", id, name);

        self.queue.decrement_accepted();

        let mut result = self.publish(UploadEvent::UploadAborted { id: id.clone(), name }).map(drop);
        keep_first(&mut result, self.remove_job(id, false));
        keep_first(&mut result, self.promote_next());
        result
    }

    /// Removes every handler, cancels every transfer and forgets all jobs.
    /// The uploader refuses further operations afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.bus.off(None);
        for job in self.queue.iter() {
            if job.status == JobStatus::Uploading {
                if let Some(handle) = &job.transport_handle {
                    self.transport.cancel(handle);
                }
            }
        }
        self.queue.clear();
        self.destroyed = true;
        info!("Uploader destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.queue.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.queue.iter()
    }

    pub fn pending_ids(&self) -> Vec<JobId> {
        self.queue.pending_ids()
    }

    pub fn accepted_count(&self) -> usize {
        self.queue.accepted()
    }

    pub fn count(&self, status: Option<JobStatus>) -> usize {
        self.queue.count(status)
    }

    pub fn is_busy(&self, id: Option<&JobId>) -> Result<bool> {
        self.queue.is_busy(id)
    }

    pub fn total_bytes(&self, id: Option<&JobId>) -> Result<Option<u64>> {
        self.queue.total_bytes(id)
    }

    pub fn total_transferred(&self, id: Option<&JobId>) -> Result<Option<u64>> {
        self.queue.total_transferred(id)
    }

    pub fn speed(&self, id: Option<&JobId>, average: bool) -> Result<Option<u64>> {
        self.queue.speed(id, average)
    }

    pub fn time_remaining(&self, id: Option<&JobId>, average: bool) -> Result<Option<u64>> {
        self.queue.time_remaining(id, average)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(UploaderError::Destroyed);
        }
        Ok(())
    }

    fn job_name(&self, id: &JobId) -> String {
        self.queue.get(id).map(|job| job.name.clone()).unwrap_or_default()
    }

    fn render_for(&self, id: &JobId, template: &str) -> String {
        match self.queue.get(id) {
            Some(job) => render_message(template, FileInfo::new(&job.name, job.size_bytes), &self.config),
            None => template.to_string(),
        }
    }

    fn failure_message(&self, id: &JobId, reason: FailureReason) -> String {
        match reason {
            FailureReason::Network => self.render_for(id, &self.config.messages.network_error),
            FailureReason::Message(template) => self.render_for(id, &template),
        }
    }

    /// Publishes and hands back the event as the handlers left it.
    fn publish(&mut self, event: UploadEvent) -> Result<UploadEvent> {
        let (_, event) = self.dispatch(event)?;
        Ok(event)
    }

    fn publish_with_outcome(&mut self, event: UploadEvent) -> Result<Outcome> {
        let (outcome, _) = self.dispatch(event)?;
        Ok(outcome)
    }

    /// The observer sees the event even when a handler fails on it.
    fn dispatch(&mut self, mut event: UploadEvent) -> Result<(Outcome, UploadEvent)> {
        let kind = event.kind();
        let published = self.bus.publish(&mut event);

        if let Some(observer) = &self.observer {
            // 没有订阅者时发送失败, 忽略
            let _ = observer.send(event.clone());
        }

        let outcome = published.inspect_err(|err| {
            error!("Handler for {} failed: {}", kind, err);
        })?;

        if outcome.is_failure() && kind != EventKind::UploadCompleted {
            debug!("Ignoring failure outcome for {}", kind);
        }

        Ok((outcome, event))
    }
}

/// Keeps the first error; later steps of a transition still run.
fn keep_first(result: &mut Result<()>, next: Result<()>) {
    if result.is_ok() {
        *result = next;
    }
}
