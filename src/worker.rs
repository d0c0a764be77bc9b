//! Background worker running network calls off the UI loop.

use airemover::{
    session::UploadTicket,
    transport::{EndpointKind, HealthStatus, HttpTransport, NormalizedImageResult, Transport, TransportError},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Submit an accepted selection.
    Process { kind: EndpointKind, ticket: UploadTicket },
    /// Write a result's bytes to disk.
    Download {
        result: NormalizedImageResult,
        path: PathBuf,
    },
    /// Query the backend health endpoint.
    HealthCheck,
}

/// Events emitted by the worker for UI updates.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Outcome of a `Process` command, keyed by the task it belongs to.
    Processed {
        kind: EndpointKind,
        task_id: Uuid,
        outcome: Result<NormalizedImageResult, TransportError>,
    },
    /// A result was saved.
    Saved(PathBuf),
    /// Health endpoint answer.
    Health(Result<HealthStatus, TransportError>),
    /// Informational log message.
    Log(String),
    /// A save failed.
    DownloadFailed(String),
}

/// Main worker loop. Each command runs on its own task so the two panels
/// never wait on each other.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    transport: Arc<HttpTransport>,
) {
    tracing::info!(base_url = transport.settings().base_url(), "worker started");

    while let Some(cmd) = rx.recv().await {
        let tx = tx.clone();
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            match cmd {
                WorkerCmd::Process { kind, ticket } => {
                    let _ = tx
                        .send(WorkerEvent::Log(format!(
                            "uploading {} ({} bytes)",
                            ticket.file.name(),
                            ticket.file.size()
                        )))
                        .await;
                    let outcome = transport.submit(&ticket.file, &ticket.endpoint).await;
                    let _ = tx
                        .send(WorkerEvent::Processed {
                            kind,
                            task_id: ticket.task_id,
                            outcome,
                        })
                        .await;
                }

                WorkerCmd::Download { result, path } => {
                    let event = match save_result(&transport, &result, &path).await {
                        Ok(()) => {
                            tracing::info!(path = %path.display(), "result saved");
                            WorkerEvent::Saved(path)
                        }
                        Err(e) => {
                            tracing::error!(path = %path.display(), "save failed: {e}");
                            WorkerEvent::DownloadFailed(e.to_string())
                        }
                    };
                    let _ = tx.send(event).await;
                }

                WorkerCmd::HealthCheck => {
                    let health = transport.health_check().await;
                    if let Err(e) = &health {
                        tracing::warn!("health check failed: {e}");
                    }
                    let _ = tx.send(WorkerEvent::Health(health)).await;
                }
            }
        });
    }
    tracing::info!("worker stopped");
}

/// Fetch the result bytes and write them to `path`.
async fn save_result(
    transport: &HttpTransport,
    result: &NormalizedImageResult,
    path: &Path,
) -> anyhow::Result<()> {
    let bytes = transport.download(result).await?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airemover::settings::Settings;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_inline_result_is_written_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("dewatermarked_1.png");
        let transport = HttpTransport::new(
            reqwest::Client::new(),
            Settings::new("http://localhost:18180", Some("http://127.0.0.1:9")).unwrap(),
        );
        let result = NormalizedImageResult::InlinePayload {
            media_type: "image/png".into(),
            data: Bytes::from_static(b"png-bytes"),
            session_id: None,
        };

        save_result(&transport, &result, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    }
}
