use compositor::{RasterTile, TileSource};
use foundation::{TileGrid, TileId};
use streaming::{TileCache, TileEvent};
use tracing::debug;

/// Exposes the resident tiles of a [`TileCache`] to the compositor.
pub struct CacheTileSource<'a> {
    cache: &'a mut TileCache<RasterTile>,
}

impl<'a> CacheTileSource<'a> {
    pub fn new(cache: &'a mut TileCache<RasterTile>) -> Self {
        Self { cache }
    }
}

impl TileSource for CacheTileSource<'_> {
    fn grid(&self) -> TileGrid {
        self.cache.dataset().grid
    }

    fn zoom(&self) -> u8 {
        self.cache.load_level().unwrap_or(0)
    }

    fn tile(&self, id: TileId) -> Option<&RasterTile> {
        self.cache.tile_document(id)
    }

    fn frame_finished(&mut self, used: &[TileId]) {
        debug!(tiles = used.len(), resident = self.cache.len(), "frame finished");
        acknowledge_removed(self.cache);
    }
}

/// Frees the documents of every tile the cache announced as removed.
pub fn acknowledge_removed(cache: &mut TileCache<RasterTile>) -> usize {
    let mut freed = 0;
    for event in cache.drain_events() {
        if let TileEvent::Removed { handle, .. } = event {
            if cache.acknowledge_removal(handle) {
                freed += 1;
            }
        }
    }
    freed
}
