use std::collections::VecDeque;

use crate::job::JobId;

/// Where `JobQueue::push` placed a job.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Placement {
    Queued,
    Waiting,
    /// Both backlogs were full; the oldest waiting job was dropped.
    WaitingEvicted(JobId),
}

/// Bounded LIFO primary queue with a FIFO waiting backlog behind it.
///
/// The primary queue serves the most recent submission first (the back of the
/// deque is the top of the stack). Overflow lands at the back of the waiting
/// backlog and is promoted from its front, so older requests are not starved.
#[derive(Debug)]
pub struct JobQueue {
    queue: VecDeque<JobId>,
    waiting: VecDeque<JobId>,
    queue_limit: usize,
    waiting_limit: usize,
}

impl JobQueue {
    pub fn new(queue_limit: usize, waiting_limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            waiting: VecDeque::new(),
            queue_limit,
            waiting_limit: waiting_limit.max(1),
        }
    }

    pub fn set_queue_limit(&mut self, limit: usize) {
        self.queue_limit = limit;
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len() + self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.waiting.is_empty()
    }

    /// Queued ids, top of the stack last.
    pub fn queued(&self) -> impl Iterator<Item = JobId> + '_ {
        self.queue.iter().copied()
    }

    /// Waiting ids, oldest first.
    pub fn waiting(&self) -> impl Iterator<Item = JobId> + '_ {
        self.waiting.iter().copied()
    }

    pub fn push(&mut self, id: JobId) -> Placement {
        if self.queue.len() < self.queue_limit {
            self.queue.push_back(id);
            return Placement::Queued;
        }
        let evicted = if self.waiting.len() >= self.waiting_limit {
            self.waiting.pop_front()
        } else {
            None
        };
        self.waiting.push_back(id);
        match evicted {
            Some(old) => Placement::WaitingEvicted(old),
            None => Placement::Waiting,
        }
    }

    pub fn pop_most_recent(&mut self) -> Option<JobId> {
        self.queue.pop_back()
    }

    /// Moves waiting jobs, oldest first, onto the top of the primary queue
    /// while it has room. Returns the promoted ids.
    pub fn promote_waiting(&mut self) -> Vec<JobId> {
        let mut promoted = Vec::new();
        while self.queue.len() < self.queue_limit {
            match self.waiting.pop_front() {
                Some(id) => {
                    self.queue.push_back(id);
                    promoted.push(id);
                }
                None => break,
            }
        }
        promoted
    }

    pub fn remove(&mut self, id: JobId) -> bool {
        if let Some(pos) = self.queue.iter().position(|q| *q == id) {
            self.queue.remove(pos);
            return true;
        }
        if let Some(pos) = self.waiting.iter().position(|w| *w == id) {
            self.waiting.remove(pos);
            return true;
        }
        false
    }

    /// Keeps only the ids for which `keep` returns true, in both backlogs.
    pub fn retain(&mut self, mut keep: impl FnMut(JobId) -> bool) {
        self.queue.retain(|id| keep(*id));
        self.waiting.retain(|id| keep(*id));
    }
}
