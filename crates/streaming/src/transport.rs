use runtime::CompletionSender;

use crate::job::{JobId, JobTicket};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Succeeded,
    Failed { status_code: Option<u16> },
}

/// Result of one transfer, marshaled back to the scheduler's control thread.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub id: JobId,
    pub status: TransferStatus,
}

/// Performs the actual fetch for a job.
///
/// `start` must not block: the transfer runs out of band and exactly one
/// `TransferReport` for `ticket.id` is sent through `done` when it ends.
pub trait Transport {
    fn start(&mut self, ticket: JobTicket, done: CompletionSender<TransferReport>);
}
