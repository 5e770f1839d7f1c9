use tokio::sync::mpsc;
use tracing::{debug, error, info};
use crate::core::{JobSnapshot, TransportEvent, Uploader};
use super::types::ManagerCommand;

/// Owns the uploader; commands and transport reports are applied one at a time.
pub struct UploadManagerWorker {
    uploader: Uploader,
}

impl UploadManagerWorker {
    pub(crate) async fn run(
        uploader: Uploader,
        mut command_rx: mpsc::Receiver<ManagerCommand>,
        mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let mut worker = Self { uploader };
        info!("Upload manager started");

        // 主事件循环
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => worker.handle_command(command),
                    // 所有管理器都已释放
                    None => break,
                },
                Some(event) = transport_rx.recv() => {
                    worker.handle_transport_event(event);
                }
            }
        }

        worker.uploader.destroy();
        info!("Upload manager stopped");
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        let job_id = event.job_id.clone();
        if let Err(err) = self.uploader.handle_transport_event(event) {
            error!("Failed to apply transport event for {}: {}", job_id, err);
        }
    }

    fn handle_command(&mut self, command: ManagerCommand) {
        let uploader = &mut self.uploader;
        match command {
            ManagerCommand::Add { files, reply } => {
                let _ = reply.send(uploader.add(files));
            }
            ManagerCommand::Start { id, reply } => {
                let _ = reply.send(uploader.start(&id));
            }
            ManagerCommand::StartAll { reply } => {
                let _ = reply.send(uploader.start_all());
            }
            ManagerCommand::Abort { id, reply } => {
                let _ = reply.send(uploader.abort(&id));
            }
            ManagerCommand::AbortAll { reply } => {
                let _ = reply.send(uploader.abort_all());
            }
            ManagerCommand::Remove { id, reply } => {
                let _ = reply.send(uploader.remove(&id));
            }
            ManagerCommand::Subscribe { kind, handler, reply } => {
                debug!("Handler registered for {}", kind);
                uploader.on_boxed(kind, handler);
                let _ = reply.send(());
            }
            ManagerCommand::Unsubscribe { kind, reply } => {
                uploader.off(kind);
                let _ = reply.send(());
            }
            ManagerCommand::Count { status, reply } => {
                let _ = reply.send(uploader.count(status));
            }
            ManagerCommand::IsBusy { id, reply } => {
                let _ = reply.send(uploader.is_busy(id.as_ref()));
            }
            ManagerCommand::TotalBytes { id, reply } => {
                let _ = reply.send(uploader.total_bytes(id.as_ref()));
            }
            ManagerCommand::TotalTransferred { id, reply } => {
                let _ = reply.send(uploader.total_transferred(id.as_ref()));
            }
            ManagerCommand::Speed { id, average, reply } => {
                let _ = reply.send(uploader.speed(id.as_ref(), average));
            }
            ManagerCommand::TimeRemaining { id, average, reply } => {
                let _ = reply.send(uploader.time_remaining(id.as_ref(), average));
            }
            ManagerCommand::GetJob { id, reply } => {
                let _ = reply.send(uploader.job(&id).map(|job| job.snapshot()));
            }
            ManagerCommand::GetAllJobs { reply } => {
                let jobs: Vec<JobSnapshot> = uploader.jobs().map(|job| job.snapshot()).collect();
                let _ = reply.send(jobs);
            }
            ManagerCommand::Destroy { reply } => {
                uploader.destroy();
                let _ = reply.send(());
            }
        }
    }
}
