use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::{
    select,
    sync::{mpsc, watch},
};
use tokio_util::sync::CancellationToken;

use crate::ServiceResult;

pub type ArcRemoteMirror = Arc<Box<dyn RemoteMirror + Send + Sync + 'static>>;

/// Remote version-controlled store that receives copies of local documents.
#[async_trait::async_trait]
pub trait RemoteMirror {
    async fn push(&self, path: &str, contents: &str) -> ServiceResult<()>;
}

pub struct NoopRemoteMirror;

#[async_trait::async_trait]
impl RemoteMirror for NoopRemoteMirror {
    async fn push(&self, path: &str, _contents: &str) -> ServiceResult<()> {
        debug!("No remote mirror configured, skipping {}", path);
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorStatus {
    pub enabled: bool,
    pub pending: usize,
    pub pushed: u64,
    pub failed: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub type ArcDocumentMirror = Arc<Box<dyn DocumentMirror + Send + Sync + 'static>>;

pub trait DocumentMirror {
    /// Queues a document for pushing. Never blocks on the remote store.
    fn enqueue(&self, path: &str, contents: String);
    fn status(&self) -> MirrorStatus;
}

#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

struct MirrorEntry {
    path: String,
    contents: String,
}

pub struct MirrorOutbox {
    sender: mpsc::UnboundedSender<MirrorEntry>,
    status: Arc<watch::Sender<MirrorStatus>>,
    enabled: bool,
}

impl MirrorOutbox {
    pub fn new(remote: ArcRemoteMirror, config: MirrorConfig) -> (Self, MirrorWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(MirrorStatus {
            enabled: config.enabled,
            ..Default::default()
        });
        let status = Arc::new(status);
        let outbox = Self {
            sender,
            status: status.clone(),
            enabled: config.enabled,
        };
        let worker = MirrorWorker {
            receiver,
            remote,
            status,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay,
        };
        (outbox, worker)
    }

    pub fn subscribe(&self) -> watch::Receiver<MirrorStatus> {
        self.status.subscribe()
    }
}

impl DocumentMirror for MirrorOutbox {
    fn enqueue(&self, path: &str, contents: String) {
        if !self.enabled {
            return;
        }
        let entry = MirrorEntry {
            path: path.to_string(),
            contents,
        };
        // Counted before sending so the worker never decrements first.
        self.status.send_modify(|s| s.pending += 1);
        if self.sender.send(entry).is_err() {
            warn!("Mirror worker is not running, dropping update of {}", path);
            self.status
                .send_modify(|s| s.pending = s.pending.saturating_sub(1));
        }
    }

    fn status(&self) -> MirrorStatus {
        self.status.borrow().clone()
    }
}

pub struct MirrorWorker {
    receiver: mpsc::UnboundedReceiver<MirrorEntry>,
    remote: ArcRemoteMirror,
    status: Arc<watch::Sender<MirrorStatus>>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl MirrorWorker {
    /// Pushes queued documents until cancelled or every outbox handle is dropped.
    pub async fn run(mut self, token: CancellationToken) {
        info!("Mirror worker started");
        loop {
            let entry = select! {
                _ = token.cancelled() => break,
                entry = self.receiver.recv() => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };
            if !self.push_with_retry(&entry, &token).await {
                error!(
                    "Giving up on mirroring {} after {} attempts",
                    entry.path, self.max_attempts
                );
                self.status.send_modify(|s| s.failed += 1);
            }
            self.status
                .send_modify(|s| s.pending = s.pending.saturating_sub(1));
        }
        info!(
            "Mirror worker stopped with {} pending updates",
            self.status.borrow().pending
        );
    }

    async fn push_with_retry(&self, entry: &MirrorEntry, token: &CancellationToken) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.remote.push(&entry.path, &entry.contents).await {
                Ok(()) => {
                    debug!("Mirrored {} (attempt {})", entry.path, attempt);
                    self.status.send_modify(|s| {
                        s.pushed += 1;
                        s.last_success = Some(Utc::now());
                    });
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Mirroring {} failed (attempt {}/{}): {}",
                        entry.path, attempt, self.max_attempts, e
                    );
                    self.status
                        .send_modify(|s| s.last_error = Some(e.to_string()));
                }
            }
            if attempt < self.max_attempts {
                select! {
                    _ = token.cancelled() => return false,
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }
        false
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockRemoteMirror {
    pub failures_left: Arc<std::sync::Mutex<u32>>,
    pub pushed: Arc<std::sync::Mutex<Vec<(String, String)>>>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl RemoteMirror for MockRemoteMirror {
    async fn push(&self, path: &str, contents: &str) -> ServiceResult<()> {
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return crate::ServiceError::internal("remote unavailable");
            }
        }
        self.pushed
            .lock()
            .unwrap()
            .push((path.to_string(), contents.to_string()));
        Ok(())
    }
}
