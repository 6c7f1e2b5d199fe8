use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use runtime::{CompletionReceiver, CompletionSender, EventBus, completion_channel};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::DownloadError;
use crate::job::{Job, JobId, JobStatus};
use crate::queue::{JobQueue, Placement};
use crate::transport::{TransferReport, TransferStatus, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    JobCompleted {
        id: JobId,
        destination: String,
        name: String,
    },
    StatusMessage(String),
    /// Number of jobs queued, waiting or in flight.
    JobCountChanged(usize),
}

/// Accepted submission. `notice` carries a demotion (`QueueOverflow` or
/// `BacklogFull`) when the job did not land on the primary queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub id: JobId,
    pub notice: Option<DownloadError>,
}

/// Ids per state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub queued: Vec<JobId>,
    pub waiting: Vec<JobId>,
    pub active: Vec<JobId>,
    pub blacklisted: Vec<JobId>,
}

impl SchedulerSnapshot {
    pub fn all_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .queued
            .iter()
            .chain(&self.waiting)
            .chain(&self.active)
            .chain(&self.blacklisted)
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Bounded-concurrency download scheduler.
///
/// All bookkeeping runs on the thread that owns the scheduler. The transport
/// reports through a completion channel that `process_completions` drains, so
/// no locking is needed here.
pub struct DownloadScheduler<T: Transport> {
    config: SchedulerConfig,
    transport: T,
    jobs: BTreeMap<JobId, Job>,
    queue: JobQueue,
    active: Vec<JobId>,
    blacklist: Vec<JobId>,
    next_id: u64,
    done_tx: CompletionSender<TransferReport>,
    done_rx: CompletionReceiver<TransferReport>,
    events: EventBus<SchedulerEvent>,
}

impl<T: Transport> DownloadScheduler<T> {
    pub fn new(config: SchedulerConfig, transport: T) -> Self {
        let (done_tx, done_rx) = completion_channel();
        Self {
            queue: JobQueue::new(config.queue_limit, config.waiting_limit),
            config,
            transport,
            jobs: BTreeMap::new(),
            active: Vec::new(),
            blacklist: Vec::new(),
            next_id: 1,
            done_tx,
            done_rx,
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn set_download_enabled(&mut self, enabled: bool) {
        self.config.download_enabled = enabled;
    }

    pub fn set_active_jobs_limit(&mut self, limit: usize) {
        self.config.active_jobs_limit = limit;
        self.activate();
    }

    pub fn set_queue_limit(&mut self, limit: usize) {
        self.config.queue_limit = limit;
        self.queue.set_queue_limit(limit);
    }

    pub fn set_server_url(&mut self, url: Option<String>) {
        self.config.server_url = url;
    }

    /// Queues a download of `source` into `destination`, then activates.
    pub fn submit(
        &mut self,
        source: impl Into<String>,
        destination: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Submitted, DownloadError> {
        if !self.config.download_enabled {
            return Err(DownloadError::Disabled);
        }
        let destination = destination.into();
        if self.jobs.values().any(|j| j.destination == destination) {
            return Err(DownloadError::Duplicate { destination });
        }

        let id = JobId(self.next_id);
        self.next_id += 1;
        self.jobs.insert(
            id,
            Job {
                id,
                source: source.into(),
                destination,
                name: name.into(),
                status: JobStatus::Queued,
                failures: 0,
                enqueued_at: Instant::now(),
                cancelled: false,
            },
        );

        let notice = self.enqueue(id);
        if let Some(notice) = &notice {
            debug!(%id, %notice, "job demoted");
        }
        self.emit_count();
        self.activate();
        Ok(Submitted { id, notice })
    }

    /// Like `submit`, with the source resolved against the configured server
    /// url and the relative path used as destination.
    pub fn submit_relative(
        &mut self,
        relative: &str,
        name: impl Into<String>,
    ) -> Result<Submitted, DownloadError> {
        let source = match &self.config.server_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                relative.trim_start_matches('/')
            ),
            None => relative.to_string(),
        };
        self.submit(source, relative, name)
    }

    /// Starts queued jobs, most recent first, until the active limit is hit.
    pub fn activate(&mut self) {
        while self.active.len() < self.config.active_jobs_limit {
            let Some(id) = self.queue.pop_most_recent() else {
                break;
            };
            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            job.status = JobStatus::Active;
            let ticket = job.ticket();
            self.active.push(id);
            debug!(%id, source = %ticket.source, "activating job");
            self.transport.start(ticket, self.done_tx.clone());
        }
    }

    /// Feeds every report that arrived from the transport to `report_result`.
    pub fn process_completions(&mut self) -> usize {
        let reports = self.done_rx.drain();
        let n = reports.len();
        for report in reports {
            self.report_result(report);
        }
        n
    }

    /// Blocks up to `timeout` for one report, then drains the rest.
    pub fn wait_for_completions(&mut self, timeout: Duration) -> usize {
        match self.done_rx.recv_timeout(timeout) {
            Some(first) => {
                self.report_result(first);
                1 + self.process_completions()
            }
            None => 0,
        }
    }

    pub fn report_result(&mut self, report: TransferReport) {
        let Some(pos) = self.active.iter().position(|id| *id == report.id) else {
            debug!(id = %report.id, "report for job that is not active");
            return;
        };
        self.active.remove(pos);
        let Some(mut job) = self.jobs.remove(&report.id) else {
            return;
        };

        if job.cancelled {
            debug!(id = %job.id, "discarding result of removed job");
        } else {
            match report.status {
                TransferStatus::Succeeded => {
                    debug!(id = %job.id, destination = %job.destination, "job completed");
                    self.events.emit(SchedulerEvent::JobCompleted {
                        id: job.id,
                        destination: job.destination,
                        name: job.name,
                    });
                }
                TransferStatus::Failed { status_code } => {
                    job.failures += 1;
                    let id = job.id;
                    if job.failures > self.config.retry_limit {
                        let err = DownloadError::JobBlacklisted {
                            id,
                            failures: job.failures,
                        };
                        warn!(%id, source = %job.source, "{err}");
                        job.status = JobStatus::Blacklisted;
                        self.jobs.insert(id, job);
                        self.blacklist.push(id);
                        self.events.emit(SchedulerEvent::StatusMessage(err.to_string()));
                    } else {
                        let err = DownloadError::TransientNetworkFailure {
                            id,
                            failures: job.failures,
                            status_code,
                        };
                        info!(%id, "{err}");
                        job.enqueued_at = Instant::now();
                        self.jobs.insert(id, job);
                        self.events.emit(SchedulerEvent::StatusMessage(err.to_string()));
                        let notice = self.enqueue(id);
                        self.report_eviction(notice);
                    }
                }
            }
        }

        self.emit_count();
        self.activate();
    }

    /// `requeue_at` for the current time.
    pub fn requeue(&mut self) {
        self.requeue_at(Instant::now());
    }

    /// Drops queued and waiting jobs that have been inactive past the
    /// staleness threshold, promotes waiting jobs into free queue slots and
    /// activates.
    pub fn requeue_at(&mut self, now: Instant) {
        let stale_after = Duration::from_secs(self.config.stale_after_secs);
        let jobs = &self.jobs;
        let mut purged = Vec::new();
        self.queue.retain(|id| match jobs.get(&id) {
            Some(job) if now.saturating_duration_since(job.enqueued_at) > stale_after => {
                purged.push(id);
                false
            }
            Some(_) => true,
            None => false,
        });
        for id in &purged {
            self.jobs.remove(id);
        }
        if !purged.is_empty() {
            info!(count = purged.len(), "purged stale jobs");
            self.events.emit(SchedulerEvent::StatusMessage(format!(
                "dropped {} stale jobs",
                purged.len()
            )));
        }

        let promoted = self.queue.promote_waiting();
        for id in &promoted {
            if let Some(job) = self.jobs.get_mut(id) {
                job.status = JobStatus::Queued;
            }
        }

        if !purged.is_empty() || !promoted.is_empty() {
            self.emit_count();
        }
        self.activate();
    }

    /// Removes a job. A job in flight keeps its slot until the transport
    /// reports; that report is then ignored.
    pub fn remove_job(&mut self, id: JobId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        match job.status {
            JobStatus::Active => {
                job.cancelled = true;
                debug!(%id, "job cancelled in flight");
                return true;
            }
            JobStatus::Queued | JobStatus::Waiting => {
                self.queue.remove(id);
            }
            JobStatus::Blacklisted => {
                self.blacklist.retain(|b| *b != id);
            }
        }
        self.jobs.remove(&id);
        self.emit_count();
        true
    }

    /// Gives every blacklisted job a fresh set of retries.
    pub fn reset_blacklist(&mut self) {
        let ids = std::mem::take(&mut self.blacklist);
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            if let Some(job) = self.jobs.get_mut(id) {
                job.failures = 0;
                job.enqueued_at = Instant::now();
            }
            let notice = self.enqueue(*id);
            self.report_eviction(notice);
        }
        info!(count = ids.len(), "blacklist reset");
        self.events.emit(SchedulerEvent::StatusMessage(format!(
            "retrying {} blacklisted jobs",
            ids.len()
        )));
        self.emit_count();
        self.activate();
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.queued_len()
    }

    pub fn waiting_len(&self) -> usize {
        self.queue.waiting_len()
    }

    pub fn blacklisted_len(&self) -> usize {
        self.blacklist.len()
    }

    /// Jobs that still need the transport (queued, waiting or in flight).
    pub fn pending_len(&self) -> usize {
        self.jobs.len() - self.blacklist.len()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            queued: self.queue.queued().collect(),
            waiting: self.queue.waiting().collect(),
            active: self.active.clone(),
            blacklisted: self.blacklist.clone(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        self.events.drain()
    }

    fn enqueue(&mut self, id: JobId) -> Option<DownloadError> {
        let (status, notice) = match self.queue.push(id) {
            Placement::Queued => (JobStatus::Queued, None),
            Placement::Waiting => (JobStatus::Waiting, Some(DownloadError::QueueOverflow { id })),
            Placement::WaitingEvicted(evicted) => {
                self.jobs.remove(&evicted);
                warn!(%evicted, "waiting backlog full, dropping oldest job");
                (
                    JobStatus::Waiting,
                    Some(DownloadError::BacklogFull { id, evicted }),
                )
            }
        };
        if let Some(job) = self.jobs.get_mut(&id) {
            job.status = status;
        }
        notice
    }

    /// Evictions caused by retries and blacklist resets surface as status
    /// messages.
    fn report_eviction(&mut self, notice: Option<DownloadError>) {
        if let Some(err @ DownloadError::BacklogFull { .. }) = notice {
            self.events.emit(SchedulerEvent::StatusMessage(err.to_string()));
        }
    }

    fn emit_count(&mut self) {
        let count = self.pending_len();
        self.events.emit(SchedulerEvent::JobCountChanged(count));
    }
}
