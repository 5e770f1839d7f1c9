use std::time::Duration;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use crate::core::{
    Result, TransferRequest, TransportCapabilities, TransportHandle, TransportResponse, TransportSink,
    TransportStrategy,
};
use super::streaming::parse_method;
use super::{build_client, spawn_transfer};

/// 兼容模式: 一次性提交整个表单
///
/// No progress, no size, no custom headers. The response status is not
/// reported either, so handlers only ever see the body.
#[derive(Debug, Clone)]
pub struct FormTransport {
    client: Client,
}

impl FormTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self { client: build_client(timeout)? })
    }
}

impl TransportStrategy for FormTransport {
    fn begin(&self, request: TransferRequest, sink: TransportSink) -> TransportHandle {
        let handle = TransportHandle::new();
        let client = self.client.clone();
        spawn_transfer(&handle, sink, async move { send(&client, request).await });
        handle
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            reports_size: false,
            reports_progress: false,
        }
    }

    fn name(&self) -> &str {
        "form"
    }
}

async fn send(client: &Client, request: TransferRequest) -> Result<TransportResponse> {
    let method = parse_method(&request.method)?;
    let content = tokio::fs::read(&request.path).await?;

    let mut form = Form::new();
    for (key, value) in request.form_fields {
        form = form.text(key, value);
    }
    let form = form.part(request.field_name, Part::bytes(content).file_name(request.name));

    let response = client.request(method, &request.url).multipart(form).send().await?;
    let body = response.text().await?;

    Ok(TransportResponse::new(None, body))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;
    use tokio::sync::mpsc;
    use super::*;
    use crate::core::{FailureReason, JobId, TransportEventKind};

    fn request(path: std::path::PathBuf) -> TransferRequest {
        TransferRequest {
            job_id: JobId::from("upload_file_1"),
            name: "a.txt".to_string(),
            path,
            size: None,
            // 没有服务监听的端口
            url: "http://127.0.0.1:1/upload".to_string(),
            method: "POST".to_string(),
            field_name: "file".to_string(),
            headers: BTreeMap::new(),
            form_fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = FormTransport::new(Duration::from_secs(5)).unwrap();
        let sink = TransportSink::new(JobId::from("upload_file_1"), tx);
        let _handle = transport.begin(request(file.path().to_path_buf()), sink);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, TransportEventKind::Failed(FailureReason::Network));
    }

    #[tokio::test]
    async fn test_cancel_reports_aborted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = FormTransport::new(Duration::from_secs(5)).unwrap();
        let sink = TransportSink::new(JobId::from("upload_file_1"), tx);

        let handle = transport.begin(request("missing.bin".into()), sink);
        transport.cancel(&handle);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, TransportEventKind::Aborted);
        assert!(handle.is_cancelled());
    }
}
