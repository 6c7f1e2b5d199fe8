use crate::job::JobId;

/// Outcomes of the download scheduler that are not plain success.
///
/// None of these are fatal: submit-time variants are returned to the caller,
/// the rest are recovered inside the scheduler and surfaced as status
/// messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// Downloading is globally switched off; the job was not recorded.
    Disabled,
    /// A job for the same destination is already tracked.
    Duplicate { destination: String },
    /// The primary queue was full; the job went to the waiting backlog.
    QueueOverflow { id: JobId },
    /// The waiting backlog was full as well; `evicted` was dropped to make room.
    BacklogFull { id: JobId, evicted: JobId },
    /// Retries exhausted; the job stays inert until the blacklist is reset.
    JobBlacklisted { id: JobId, failures: u32 },
    /// A transfer failed and the job was put back on the queue.
    TransientNetworkFailure {
        id: JobId,
        failures: u32,
        status_code: Option<u16>,
    },
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::Disabled => write!(f, "downloading is disabled"),
            DownloadError::Duplicate { destination } => {
                write!(f, "download already scheduled for {destination}")
            }
            DownloadError::QueueOverflow { id } => {
                write!(f, "job queue full, {id} deferred to waiting backlog")
            }
            DownloadError::BacklogFull { id, evicted } => {
                write!(f, "waiting backlog full, {evicted} evicted for {id}")
            }
            DownloadError::JobBlacklisted { id, failures } => {
                write!(f, "{id} blacklisted after {failures} failures")
            }
            DownloadError::TransientNetworkFailure {
                id,
                failures,
                status_code: Some(code),
            } => write!(f, "{id} failed with status {code} (attempt {failures}), retrying"),
            DownloadError::TransientNetworkFailure {
                id,
                failures,
                status_code: None,
            } => write!(f, "{id} failed (attempt {failures}), retrying"),
        }
    }
}

impl std::error::Error for DownloadError {}
