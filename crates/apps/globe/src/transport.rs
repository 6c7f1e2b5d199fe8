use std::path::{Path, PathBuf};

use reqwest::Client;
use runtime::CompletionSender;
use streaming::{JobTicket, TransferReport, TransferStatus, Transport};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Fetches job sources over HTTP on a tokio runtime and stores each body under
/// `root` at the job's destination.
pub struct HttpTransport {
    runtime: Handle,
    client: Client,
    root: PathBuf,
}

impl HttpTransport {
    pub fn new(runtime: Handle, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            client: Client::new(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Transport for HttpTransport {
    fn start(&mut self, ticket: JobTicket, done: CompletionSender<TransferReport>) {
        let client = self.client.clone();
        let out_path = self.root.join(&ticket.destination);
        self.runtime.spawn(async move {
            let status = fetch_to_file(&client, &ticket.source, &out_path).await;
            done.send(TransferReport {
                id: ticket.id,
                status,
            });
        });
    }
}

async fn fetch_to_file(client: &Client, url: &str, out_path: &Path) -> TransferStatus {
    let resp = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(err) => {
            warn!("GET {url} failed: {err}");
            return TransferStatus::Failed {
                status_code: err.status().map(|s| s.as_u16()),
            };
        }
    };
    let status = resp.status();
    if !status.is_success() {
        debug!("GET {url} returned {status}");
        return TransferStatus::Failed {
            status_code: Some(status.as_u16()),
        };
    }
    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(err) => {
            warn!("reading body of {url} failed: {err}");
            return TransferStatus::Failed { status_code: None };
        }
    };

    if let Some(parent) = out_path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!("creating {parent:?} failed: {err}");
            return TransferStatus::Failed { status_code: None };
        }
    }
    match tokio::fs::write(out_path, &body).await {
        Ok(()) => TransferStatus::Succeeded,
        Err(err) => {
            warn!("writing {out_path:?} failed: {err}");
            TransferStatus::Failed { status_code: None }
        }
    }
}
