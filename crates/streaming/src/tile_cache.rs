//! Viewport-driven tile cache.
//!
//! Tiles are parsed on a shared worker pool and integrated on the thread that
//! owns the cache. Evicted tiles go through a two-phase delete: dropping a
//! [`CachedTile`] only announces the removal, and the parsed document is freed
//! once the presentation layer calls [`TileCache::acknowledge_removal`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use foundation::{GeoBox, TileId};
use runtime::{CompletionReceiver, CompletionSender, EventBus, WorkerPool, completion_channel};
use tracing::{debug, warn};

use crate::config::TileCacheConfig;
use crate::dataset::TileDataset;

/// Keeps a zoom level from snapping down when the radius sits exactly on a
/// level boundary.
const LEVEL_BIAS: f64 = 1.00001;

/// Loads and parses one tile. Runs on worker threads; `None` means the tile
/// could not be produced.
pub trait TileLoader<D>: Send + Sync {
    fn load(&self, dataset: &TileDataset, id: TileId) -> Option<D>;
}

/// Opaque reference to a parsed document held by the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TileEvent {
    Added { id: TileId, handle: DocumentHandle },
    /// The cache dropped the tile; the document stays alive until
    /// acknowledged.
    Removed { id: TileId, handle: DocumentHandle },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportState {
    pub bounds: GeoBox,
    /// Projected sphere radius in pixels.
    pub radius: f64,
}

/// Cache entry. Holds only a handle to its document and a sender back to the
/// cache, so there is no owning cycle between the two.
#[derive(Debug)]
pub struct CachedTile {
    id: TileId,
    bounds: GeoBox,
    handle: DocumentHandle,
    removed: CompletionSender<(TileId, DocumentHandle)>,
}

impl CachedTile {
    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn bounds(&self) -> GeoBox {
        self.bounds
    }

    pub fn handle(&self) -> DocumentHandle {
        self.handle
    }
}

impl Drop for CachedTile {
    fn drop(&mut self) {
        self.removed.send((self.id, self.handle));
    }
}

pub struct TileCache<D: Send + 'static> {
    dataset: Arc<TileDataset>,
    loader: Arc<dyn TileLoader<D>>,
    pool: Arc<WorkerPool>,
    config: TileCacheConfig,

    viewport: Option<ViewportState>,
    tile_zoom_level: u8,
    load_level: Option<u8>,
    clear_on_next_insert: bool,

    tiles: BTreeMap<TileId, CachedTile>,
    pending: BTreeSet<TileId>,
    /// Documents of live tiles plus removed ones awaiting acknowledgement.
    documents: BTreeMap<DocumentHandle, D>,
    next_handle: u64,

    loaded_tx: CompletionSender<(TileId, Option<D>)>,
    loaded_rx: CompletionReceiver<(TileId, Option<D>)>,
    removed_tx: CompletionSender<(TileId, DocumentHandle)>,
    removed_rx: CompletionReceiver<(TileId, DocumentHandle)>,
    events: EventBus<TileEvent>,
}

impl<D: Send + 'static> TileCache<D> {
    pub fn new(
        dataset: TileDataset,
        loader: Arc<dyn TileLoader<D>>,
        pool: Arc<WorkerPool>,
        config: TileCacheConfig,
    ) -> Self {
        let (loaded_tx, loaded_rx) = completion_channel();
        let (removed_tx, removed_rx) = completion_channel();
        Self {
            dataset: Arc::new(dataset),
            loader,
            pool,
            config,
            viewport: None,
            tile_zoom_level: 0,
            load_level: None,
            clear_on_next_insert: false,
            tiles: BTreeMap::new(),
            pending: BTreeSet::new(),
            documents: BTreeMap::new(),
            next_handle: 1,
            loaded_tx,
            loaded_rx,
            removed_tx,
            removed_rx,
            events: EventBus::new(),
        }
    }

    pub fn dataset(&self) -> &TileDataset {
        &self.dataset
    }

    pub fn viewport(&self) -> Option<ViewportState> {
        self.viewport
    }

    /// Level derived from the radius, before clamping to the dataset.
    pub fn tile_zoom_level(&self) -> u8 {
        self.tile_zoom_level
    }

    /// Level whose tiles are currently requested and accepted.
    pub fn load_level(&self) -> Option<u8> {
        self.load_level
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Removed documents not yet acknowledged.
    pub fn awaiting_acknowledgement(&self) -> usize {
        self.documents.len() - self.tiles.len()
    }

    pub fn tile(&self, id: TileId) -> Option<&CachedTile> {
        self.tiles.get(&id)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &CachedTile> {
        self.tiles.values()
    }

    pub fn document(&self, handle: DocumentHandle) -> Option<&D> {
        self.documents.get(&handle)
    }

    /// Document of a tile currently in the cache.
    pub fn tile_document(&self, id: TileId) -> Option<&D> {
        self.tiles
            .get(&id)
            .and_then(|t| self.documents.get(&t.handle))
    }

    /// Desired level for a projected radius: one level per doubling of the
    /// radius relative to the level-zero texture size.
    pub fn zoom_level_for_radius(&self, radius: f64) -> u8 {
        let grid = &self.dataset.grid;
        let level_zero = grid.level_zero_width().min(grid.level_zero_height()).max(1) as f64;
        let linear = (4.0 * radius / level_zero).max(1.0);
        let level = (linear.ln() / std::f64::consts::LN_2 * LEVEL_BIAS).floor();
        level.clamp(0.0, u8::MAX as f64) as u8
    }

    /// Picks the zoom level for the viewport, requests the tiles it needs and
    /// evicts the ones far outside it.
    pub fn set_viewport(&mut self, bounds: GeoBox, radius: f64) {
        self.viewport = Some(ViewportState { bounds, radius });
        self.tile_zoom_level = self.zoom_level_for_radius(radius);

        let Some(level) = self.dataset.resolve_level(self.tile_zoom_level) else {
            debug!(dataset = %self.dataset.name, "dataset has no levels, clearing cache");
            self.clear();
            return;
        };

        if self.load_level != Some(level) {
            debug!(from = ?self.load_level, to = level, "tile level changed");
            self.load_level = Some(level);
            self.clear_on_next_insert = true;
        }

        let grid = self.dataset.grid;
        let west_x = grid.lon_to_tile_x(bounds.west, level);
        let east_x = grid.lon_to_tile_x(bounds.east, level);
        let north_y = grid.lat_to_tile_y(bounds.north, level);
        let south_y = grid.lat_to_tile_y(bounds.south, level);

        if bounds.crosses_dateline() {
            let max_x = grid.columns(level).saturating_sub(1);
            self.query_tiles(level, 0, east_x, north_y, south_y);
            self.query_tiles(level, west_x, max_x, north_y, south_y);
        } else {
            self.query_tiles(level, west_x, east_x, north_y, south_y);
        }

        self.remove_tiles_out_of_view(bounds);
    }

    fn query_tiles(&mut self, level: u8, min_x: u32, max_x: u32, min_y: u32, max_y: u32) {
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                self.request(TileId::new(level, x, y));
            }
        }
    }

    fn request(&mut self, id: TileId) {
        if self.tiles.contains_key(&id) || !self.pending.insert(id) {
            return;
        }
        let loader = Arc::clone(&self.loader);
        let dataset = Arc::clone(&self.dataset);
        let done = self.loaded_tx.clone();
        let scheduled = self.pool.execute(move || {
            let document = loader.load(&dataset, id);
            done.send((id, document));
        });
        if let Err(err) = scheduled {
            warn!(%id, %err, "could not schedule tile load");
            self.pending.remove(&id);
        }
    }

    /// Evicts every tile whose bounds miss `bounds` grown by the eviction
    /// scale in both directions.
    pub fn remove_tiles_out_of_view(&mut self, bounds: GeoBox) {
        let scale = self.config.eviction_scale;
        let extended = bounds.scaled(scale, scale);
        let before = self.tiles.len();
        self.tiles.retain(|_, tile| tile.bounds.intersects(&extended));
        let evicted = before - self.tiles.len();
        if evicted > 0 {
            debug!(evicted, "evicted tiles out of view");
        }
        self.collect_removals();
    }

    /// Integrates a parse result. Failed loads and results for a level that
    /// is no longer loaded are dropped.
    pub fn on_tile_loaded(&mut self, id: TileId, document: Option<D>) {
        self.pending.remove(&id);

        let Some(document) = document else {
            debug!(%id, "tile failed to load");
            return;
        };
        if self.load_level != Some(id.zoom) {
            debug!(%id, load_level = ?self.load_level, "discarding stale tile");
            return;
        }

        self.tiles.remove(&id);
        if self.clear_on_next_insert {
            self.clear_on_next_insert = false;
            self.tiles.clear();
        }
        self.collect_removals();

        let handle = DocumentHandle(self.next_handle);
        self.next_handle += 1;
        self.documents.insert(handle, document);
        self.tiles.insert(
            id,
            CachedTile {
                id,
                bounds: self.dataset.grid.tile_bounds(id),
                handle,
                removed: self.removed_tx.clone(),
            },
        );
        self.events.emit(TileEvent::Added { id, handle });
    }

    /// Integrates every result that has arrived from the workers.
    pub fn process_loaded(&mut self) -> usize {
        let results = self.loaded_rx.drain();
        let n = results.len();
        for (id, document) in results {
            self.on_tile_loaded(id, document);
        }
        n
    }

    /// Integrates results until nothing is pending or `timeout` elapses.
    pub fn process_loaded_blocking(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut handled = 0;
        while !self.pending.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.loaded_rx.recv_timeout(deadline - now) {
                Some((id, document)) => {
                    self.on_tile_loaded(id, document);
                    handled += 1;
                }
                None => break,
            }
        }
        handled + self.process_loaded()
    }

    /// Frees a removed tile's document. Returns `false` for an unknown handle
    /// or a tile that is still cached.
    pub fn acknowledge_removal(&mut self, handle: DocumentHandle) -> bool {
        if self.tiles.values().any(|t| t.handle == handle) {
            return false;
        }
        self.documents.remove(&handle).is_some()
    }

    /// Drops every cached tile. Documents wait for acknowledgement as usual.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.load_level = None;
        self.clear_on_next_insert = false;
        self.collect_removals();
    }

    pub fn drain_events(&mut self) -> Vec<TileEvent> {
        self.collect_removals();
        self.events.drain()
    }

    fn collect_removals(&mut self) {
        for (id, handle) in self.removed_rx.drain() {
            self.events.emit(TileEvent::Removed { id, handle });
        }
    }
}
