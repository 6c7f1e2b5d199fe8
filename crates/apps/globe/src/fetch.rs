use std::path::Path;
use std::time::Duration;

use anyhow::bail;
use foundation::{GeoBox, TileId};
use streaming::{DownloadError, DownloadScheduler, SchedulerEvent, TileDataset, Transport};
use tracing::{debug, info, warn};

/// Tally of one `globe fetch` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub submitted: usize,
    pub completed: usize,
    /// Already on disk, never submitted.
    pub skipped: usize,
    /// Blacklisted after exhausting their retries.
    pub failed: usize,
    /// Purged as stale or evicted from a full waiting backlog.
    pub dropped: usize,
}

/// Ids of the dataset's tiles at `zoom` covering `bounds`.
pub fn tiles_in_bounds(dataset: &TileDataset, bounds: &GeoBox, zoom: u8) -> Vec<TileId> {
    let grid = dataset.grid;
    let west_x = grid.lon_to_tile_x(bounds.west, zoom);
    let east_x = grid.lon_to_tile_x(bounds.east, zoom);
    let north_y = grid.lat_to_tile_y(bounds.north, zoom);
    let south_y = grid.lat_to_tile_y(bounds.south, zoom);

    let columns: Vec<u32> = if bounds.crosses_dateline() {
        (0..=east_x).chain(west_x..grid.columns(zoom)).collect()
    } else {
        (west_x..=east_x).collect()
    };
    let mut ids = Vec::new();
    for x in columns {
        for y in north_y..=south_y {
            ids.push(TileId::new(zoom, x, y));
        }
    }
    ids
}

/// Downloads `tiles` through `scheduler` until every job has completed, been
/// blacklisted or been dropped. Tiles whose file already exists under `root`
/// are skipped.
///
/// The primary queue is fed only up to the active limit, so jobs spend little
/// time queued and the staleness purge rarely applies.
pub fn run_fetch<T: Transport>(
    scheduler: &mut DownloadScheduler<T>,
    dataset: &TileDataset,
    mut tiles: Vec<TileId>,
    root: &Path,
    poll: Duration,
) -> anyhow::Result<FetchSummary> {
    let feed_limit = scheduler
        .config()
        .queue_limit
        .min(scheduler.config().active_jobs_limit)
        .max(1);
    // Popped from the back, so the first tiles go out first.
    tiles.reverse();

    let mut summary = FetchSummary::default();
    loop {
        while scheduler.queued_len() < feed_limit {
            let Some(id) = tiles.pop() else {
                break;
            };
            let relative = dataset.relative_path(id);
            if root.join(&relative).exists() {
                summary.skipped += 1;
                continue;
            }
            let submitted = match dataset.source_url(id) {
                Some(url) => scheduler.submit(url, relative, id.to_string()),
                None => scheduler.submit_relative(&relative, id.to_string()),
            };
            match submitted {
                Ok(_) => summary.submitted += 1,
                Err(DownloadError::Duplicate { destination }) => {
                    debug!(%destination, "already scheduled");
                }
                Err(err) => bail!("submitting {id}: {err}"),
            }
        }

        // Retries parked in the waiting backlog move up only here.
        scheduler.requeue();
        if scheduler.pending_len() == 0 && tiles.is_empty() {
            break;
        }

        scheduler.wait_for_completions(poll);
        for event in scheduler.drain_events() {
            match event {
                SchedulerEvent::JobCompleted { name, .. } => {
                    summary.completed += 1;
                    debug!(tile = %name, "downloaded");
                }
                SchedulerEvent::StatusMessage(msg) => warn!("{msg}"),
                SchedulerEvent::JobCountChanged(n) => debug!(pending = n, "jobs"),
            }
        }
    }

    summary.failed = scheduler.blacklisted_len();
    summary.dropped = summary
        .submitted
        .saturating_sub(summary.completed + summary.failed);
    if summary.dropped > 0 {
        warn!(dropped = summary.dropped, "tiles dropped before download; rerun to fetch them");
    }
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        dropped = summary.dropped,
        "fetch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{run_fetch, FetchSummary};
    use foundation::{TileGrid, TileId};
    use pretty_assertions::assert_eq;
    use runtime::CompletionSender;
    use streaming::{
        DownloadScheduler, JobTicket, SchedulerConfig, TileDataset, TransferReport,
        TransferStatus, Transport,
    };

    /// Reports every transfer as soon as it starts. Sources in `fail_once`
    /// fail their first attempt; sources in `always_fail` never succeed.
    #[derive(Default)]
    struct ScriptedTransport {
        fail_once: BTreeSet<String>,
        always_fail: BTreeSet<String>,
        attempts: BTreeMap<String, u32>,
    }

    impl Transport for ScriptedTransport {
        fn start(&mut self, ticket: JobTicket, done: CompletionSender<TransferReport>) {
            let attempt = self.attempts.entry(ticket.source.clone()).or_insert(0);
            *attempt += 1;
            let fails = self.always_fail.contains(&ticket.source)
                || (*attempt == 1 && self.fail_once.contains(&ticket.source));
            let status = if fails {
                TransferStatus::Failed {
                    status_code: Some(503),
                }
            } else {
                TransferStatus::Succeeded
            };
            done.send(TransferReport {
                id: ticket.id,
                status,
            });
        }
    }

    fn dataset() -> TileDataset {
        let mut ds = TileDataset::new("osm", TileGrid::default(), vec![0, 1, 2]);
        ds.url_template = Some("http://tiles.test/{z}/{x}/{y}.png".into());
        ds
    }

    fn url(id: TileId) -> String {
        format!("http://tiles.test/{}/{}/{}.png", id.zoom, id.x, id.y)
    }

    fn empty_root() -> PathBuf {
        std::env::temp_dir().join(format!("globe-fetch-none-{}", std::process::id()))
    }

    fn scheduler(
        active: usize,
        queue: usize,
        waiting: usize,
        transport: ScriptedTransport,
    ) -> DownloadScheduler<ScriptedTransport> {
        let config = SchedulerConfig {
            active_jobs_limit: active,
            queue_limit: queue,
            waiting_limit: waiting,
            retry_limit: 1,
            ..SchedulerConfig::default()
        };
        DownloadScheduler::new(config, transport)
    }

    fn level_one() -> Vec<TileId> {
        let mut ids = Vec::new();
        for x in 0..2 {
            for y in 0..2 {
                ids.push(TileId::new(1, x, y));
            }
        }
        ids
    }

    #[test]
    fn retry_parked_in_waiting_backlog_still_completes() {
        let tiles = level_one();
        let transport = ScriptedTransport {
            fail_once: BTreeSet::from([url(tiles[0])]),
            ..ScriptedTransport::default()
        };
        let mut s = scheduler(1, 1, 10, transport);

        let summary = run_fetch(
            &mut s,
            &dataset(),
            tiles,
            &empty_root(),
            Duration::from_millis(10),
        )
        .expect("fetch");

        assert_eq!(
            summary,
            FetchSummary {
                submitted: 4,
                completed: 4,
                ..FetchSummary::default()
            }
        );
        assert_eq!(s.pending_len(), 0);
        assert_eq!(s.transport().attempts.values().sum::<u32>(), 5);
    }

    #[test]
    fn failures_and_overflow_are_all_accounted_for() {
        let mut tiles = level_one();
        for x in 0..4 {
            tiles.push(TileId::new(2, x, 1));
        }
        let transport = ScriptedTransport {
            fail_once: BTreeSet::from([url(tiles[1]), url(tiles[2]), url(tiles[5])]),
            always_fail: BTreeSet::from([url(tiles[3])]),
            ..ScriptedTransport::default()
        };
        let mut s = scheduler(2, 2, 1, transport);

        let summary = run_fetch(
            &mut s,
            &dataset(),
            tiles,
            &empty_root(),
            Duration::from_millis(10),
        )
        .expect("fetch");

        assert_eq!(summary.submitted, 8);
        assert_eq!(
            summary.completed + summary.failed + summary.dropped,
            summary.submitted
        );
        assert!(summary.failed + summary.dropped >= 1);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn existing_files_are_skipped() {
        let root = std::env::temp_dir().join(format!("globe-fetch-skip-{}", std::process::id()));
        let ds = dataset();
        let tiles = level_one();
        let present = root.join(ds.relative_path(tiles[2]));
        std::fs::create_dir_all(present.parent().expect("parent")).expect("mkdir");
        std::fs::write(&present, b"png").expect("write");

        let mut s = scheduler(2, 4, 4, ScriptedTransport::default());
        let summary =
            run_fetch(&mut s, &ds, tiles, &root, Duration::from_millis(10)).expect("fetch");
        std::fs::remove_dir_all(&root).expect("cleanup");

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.completed, 3);
        assert!(!s.transport().attempts.contains_key(&url(TileId::new(1, 1, 0))));
    }
}
