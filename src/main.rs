use std::path::PathBuf;
use std::time::Duration;
use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use batch_uploader::core::HandlerResult;
use batch_uploader::utils::format_bytes;
use batch_uploader::{EventKind, JobStatus, Outcome, UploadEvent, UploadManager, UploaderConfig};

#[derive(Parser, Clone, Debug, PartialEq)]
#[command(author, version, about = "Upload files to an HTTP endpoint")]
struct Cli {
    #[arg(short = 'c', long = "config", help = "Config file", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short = 'u', long = "url", help = "Upload URL, overrides the config file")]
    url: Option<String>,

    #[arg(short = 'n', long = "concurrency", help = "Number of uploads in parallel")]
    concurrency: Option<usize>,

    #[arg(long = "fallback", help = "Send each file as one buffered form")]
    fallback: bool,

    #[arg(required = true, help = "Files to upload")]
    files: Vec<PathBuf>,
}

impl Cli {
    fn uploader_config(&self) -> anyhow::Result<UploaderConfig> {
        let mut config = if self.config.exists() {
            UploaderConfig::load(&self.config)
                .with_context(|| format!("Can't load {}", self.config.display()))?
        } else {
            UploaderConfig::default()
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency_limit = concurrency;
        }
        config.force_fallback |= self.fallback;

        config.validate()?;
        Ok(config)
    }
}

/// Treats a non-2xx status or a JSON body with an `error` field as a failed upload.
fn classify_response(event: &mut UploadEvent) -> HandlerResult {
    let UploadEvent::UploadCompleted { response, .. } = event else {
        return Ok(Outcome::Normal);
    };

    if let Some(status) = response.status {
        if !(200..300).contains(&status) {
            return Ok(Outcome::failure(format!("Server answered {} for '{{{{fileName}}}}'", status)));
        }
    }

    if let Ok(serde_json::Value::Object(body)) = serde_json::from_str::<serde_json::Value>(&response.body) {
        if let Some(error) = body.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Ok(Outcome::failure(message));
        }
    }

    Ok(Outcome::Normal)
}

/// Prints events until the manager goes away; returns the number of failed uploads.
async fn report(mut events: tokio::sync::broadcast::Receiver<UploadEvent>) -> usize {
    let mut failed = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            UploadEvent::FileAdded { id, name } => println!("added     {} ({})", name, id),
            UploadEvent::FileInvalid { reasons, .. } => {
                failed += 1;
                for reason in reasons {
                    println!("invalid   {}", reason.message);
                }
            }
            UploadEvent::TooManyFiles { message, .. } => {
                failed += 1;
                println!("rejected  {}", message);
            }
            UploadEvent::UploadProgress { name, bytes_transferred, bytes_total, .. } => {
                debug!("{}: {} / {}", name, format_bytes(bytes_transferred), format_bytes(bytes_total));
            }
            UploadEvent::UploadCompleted { name, response, .. } => println!("completed {} {}", name, response.body),
            UploadEvent::UploadFailed { name, message, .. } => {
                failed += 1;
                println!("failed    {}: {}", name, message);
            }
            UploadEvent::UploadAborted { name, .. } => println!("aborted   {}", name),
            _ => {}
        }
    }
    failed
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.uploader_config()?;
    let auto_start = config.auto_start;

    let handle = UploadManager::from_config(config)?;
    let manager = handle.manager.clone();
    manager.on(EventKind::UploadCompleted, classify_response).await?;

    let reporter = tokio::spawn(report(manager.subscribe_events()));

    let ids = manager.add_files(cli.files.clone()).await?;
    info!("{} of {} file(s) accepted", ids.len(), cli.files.len());
    if !auto_start {
        manager.start_all().await?;
    }

    // 等待所有任务结束
    loop {
        let mut active = 0;
        for status in [JobStatus::Added, JobStatus::Pending, JobStatus::Uploading] {
            active += manager.count(Some(status)).await?;
        }
        if active == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    drop(manager);
    handle.shutdown().await?;
    let failed = reporter.await?;

    if failed > 0 {
        bail!("{} file(s) were not uploaded", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use batch_uploader::{JobId, TransportResponse};
    use super::*;

    fn completed(status: Option<u16>, body: &str) -> UploadEvent {
        UploadEvent::UploadCompleted {
            id: JobId::from("upload_file_1"),
            name: "a.txt".to_string(),
            response: TransportResponse::new(status, body),
        }
    }

    #[test]
    fn test_classify_response() {
        assert_eq!(classify_response(&mut completed(Some(200), "ok")).unwrap(), Outcome::Normal);
        assert_eq!(classify_response(&mut completed(None, r#"{"success":true}"#)).unwrap(), Outcome::Normal);

        let outcome = classify_response(&mut completed(Some(500), "boom")).unwrap();
        assert_eq!(outcome, Outcome::failure("Server answered 500 for '{{fileName}}'"));

        let outcome = classify_response(&mut completed(Some(200), r#"{"error":"quota exceeded"}"#)).unwrap();
        assert_eq!(outcome, Outcome::failure("quota exceeded"));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["batch-uploader", "-c", "missing.toml", "-u", "http://localhost/upload", "-n", "2", "a.txt"]);
        let config = cli.uploader_config().unwrap();
        assert_eq!(config.url, "http://localhost/upload");
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(cli.files, vec![PathBuf::from("a.txt")]);
    }
}
