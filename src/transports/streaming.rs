use std::time::Duration;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use crate::core::{
    Result, TransferRequest, TransportCapabilities, TransportHandle, TransportResponse, TransportSink,
    TransportStrategy, UploaderError,
};
use super::progress_stream::ProgressStream;
use super::{build_client, spawn_transfer};

/// Multipart upload with a streamed file part.
#[derive(Debug, Clone)]
pub struct StreamingTransport {
    client: Client,
}

impl StreamingTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self { client: build_client(timeout)? })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl TransportStrategy for StreamingTransport {
    fn begin(&self, request: TransferRequest, sink: TransportSink) -> TransportHandle {
        let handle = TransportHandle::new();
        let client = self.client.clone();
        let progress_sink = sink.clone();
        spawn_transfer(&handle, sink, async move { send(&client, request, progress_sink).await });
        handle
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            reports_size: true,
            reports_progress: true,
        }
    }

    fn name(&self) -> &str {
        "streaming"
    }
}

async fn send(client: &Client, request: TransferRequest, sink: TransportSink) -> Result<TransportResponse> {
    let method = parse_method(&request.method)?;

    let file = File::open(&request.path).await?;
    let total = match request.size {
        Some(size) => size,
        None => file.metadata().await?.len(),
    };

    let stream = ProgressStream::new(ReaderStream::new(file), sink, total);
    let part = Part::stream_with_length(Body::wrap_stream(stream), total).file_name(request.name.clone());

    let mut form = Form::new();
    for (key, value) in request.form_fields {
        form = form.text(key, value);
    }
    let form = form.part(request.field_name, part);

    let mut builder = client
        .request(method, &request.url)
        .header("X-Requested-With", "XMLHttpRequest");
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    let response = builder.multipart(form).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    Ok(TransportResponse::new(Some(status), body))
}

pub(super) fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| UploaderError::config(format!("invalid HTTP method: {}", method)))
}
