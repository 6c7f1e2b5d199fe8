use std::fmt;
use std::time::Instant;

/// Handle allocated by the scheduler for every accepted submission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Waiting,
    Active,
    Blacklisted,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Where the payload is fetched from.
    pub source: String,
    /// Where the payload ends up; also the duplicate-detection key.
    pub destination: String,
    /// Caller-chosen identifier echoed back on completion.
    pub name: String,
    pub status: JobStatus,
    pub failures: u32,
    pub enqueued_at: Instant,
    /// Set by `remove_job` while the transfer is in flight.
    pub cancelled: bool,
}

impl Job {
    pub fn ticket(&self) -> JobTicket {
        JobTicket {
            id: self.id,
            source: self.source.clone(),
            destination: self.destination.clone(),
        }
    }
}

/// What a transport needs to perform one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub id: JobId,
    pub source: String,
    pub destination: String,
}
