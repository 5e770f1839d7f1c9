//! HTTP transports.
//!
//! [`StreamingTransport`] streams the file as a multipart body and reports
//! progress; [`FormTransport`] is the fallback that posts the whole form in one
//! go, without progress or a known size.

mod form;
mod progress_stream;
mod streaming;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use tracing::{debug, warn};
use crate::config::UploaderConfig;
use crate::core::{
    FailureReason, JobId, Result, TransportHandle, TransportResponse, TransportSink, TransportStrategy,
};

pub use form::FormTransport;
pub use progress_stream::ProgressStream;
pub use streaming::StreamingTransport;

/// Picks the transport the configuration asks for.
pub fn from_config(config: &UploaderConfig) -> Result<Arc<dyn TransportStrategy>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    if config.force_fallback {
        Ok(Arc::new(FormTransport::new(timeout)?))
    } else {
        Ok(Arc::new(StreamingTransport::new(timeout)?))
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Runs one transfer on the runtime and reports its end to the sink.
///
/// Cancellation wins over a result that is ready at the same poll.
fn spawn_transfer<F>(handle: &TransportHandle, sink: TransportSink, transfer: F)
where
    F: Future<Output = Result<TransportResponse>> + Send + 'static,
{
    let token = handle.token();
    tokio::spawn(async move {
        let job_id: JobId = sink.job_id().clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Transfer of {} cancelled", job_id);
                sink.aborted();
            }
            result = transfer => match result {
                Ok(response) => {
                    debug!("Transfer of {} finished with status {:?}", job_id, response.status);
                    sink.completed(response);
                }
                Err(err) => {
                    warn!("Transfer of {} failed: {}", job_id, err);
                    sink.failed(FailureReason::Network);
                }
            }
        }
    });
}
