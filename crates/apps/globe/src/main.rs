mod config;
mod fetch;
mod loader;
mod source;
mod transport;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use compositor::{
    visible_bounds, Canvas, MapQuality, RasterTile, SphericalCompositor, ViewParams,
};
use foundation::math::Quaternion;
use foundation::GeoBox;
use runtime::WorkerPool;
use streaming::{DownloadScheduler, TileCache, TileLoader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::GlobeConfig;
use crate::fetch::{run_fetch, tiles_in_bounds};
use crate::loader::{DiskLoader, ProceduralLoader};
use crate::source::{acknowledge_removed, CacheTileSource};
use crate::transport::HttpTransport;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tile fetching and spherical rendering of a virtual globe")]
struct Args {
    /// JSON config file (defaults apply when omitted)
    #[arg(long, env = "GLOBE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite the globe into a PPM image
    Render {
        /// Output image
        #[arg(long, default_value = "globe.ppm")]
        out: PathBuf,

        #[arg(long, default_value_t = 512)]
        width: usize,

        #[arg(long, default_value_t = 512)]
        height: usize,

        /// Projected sphere radius in pixels (default: fits the canvas)
        #[arg(long)]
        radius: Option<u32>,

        /// Longitude of the view center in degrees
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        lon: f64,

        /// Latitude of the view center in degrees
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        lat: f64,

        /// outline, low, normal, high or print (default: from config)
        #[arg(long, value_parser = parse_quality)]
        quality: Option<MapQuality>,

        /// Duplicate every other scanline
        #[arg(long)]
        interlaced: bool,

        /// Read tiles saved by `fetch` from this directory instead of
        /// generating them
        #[arg(long)]
        tiles: Option<PathBuf>,
    },

    /// Download the dataset's tiles covering a bbox
    Fetch {
        /// Bounding box: minLon,minLat,maxLon,maxLat in degrees
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,

        #[arg(long, default_value_t = 0)]
        min_zoom: u8,

        #[arg(long, default_value_t = 3)]
        max_zoom: u8,

        /// Output directory
        #[arg(long, default_value = "data/tiles")]
        out: PathBuf,

        /// Base url for datasets without a url template
        #[arg(long, env = "GLOBE_SERVER_URL")]
        server_url: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = GlobeConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Render {
            out,
            width,
            height,
            radius,
            lon,
            lat,
            quality,
            interlaced,
            tiles,
        } => {
            if let Some(quality) = quality {
                config.compositor.quality = quality;
            }
            config.compositor.interlaced |= interlaced;
            let radius = radius.unwrap_or((width.min(height) / 2) as u32);
            let view = ViewParams::new(
                radius,
                Quaternion::from_view_center(lon.to_radians(), lat.to_radians()),
                config.compositor.quality,
            );
            render(&config, tiles.as_deref(), &out, width, height, &view)
        }
        Command::Fetch {
            bbox,
            min_zoom,
            max_zoom,
            out,
            server_url,
        } => {
            if server_url.is_some() {
                config.scheduler.server_url = server_url;
            }
            let bounds = parse_bbox(&bbox)?;
            fetch(&config, bounds, min_zoom, max_zoom, &out)
        }
    }
}

fn parse_quality(s: &str) -> Result<MapQuality, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|_| format!("unknown quality {s:?}"))
}

fn parse_bbox(bbox: &str) -> anyhow::Result<GeoBox> {
    let parts: Vec<_> = bbox.split(',').collect();
    if parts.len() != 4 {
        bail!("bbox must be minLon,minLat,maxLon,maxLat");
    }
    let mut vals = [0.0; 4];
    for (v, part) in vals.iter_mut().zip(&parts) {
        *v = part
            .trim()
            .parse()
            .with_context(|| format!("invalid bbox value {part:?}"))?;
    }
    let [min_lon, min_lat, max_lon, max_lat] = vals;
    if min_lat > max_lat {
        bail!("bbox minLat {min_lat} is above maxLat {max_lat}");
    }
    Ok(GeoBox::from_degrees(max_lat, min_lat, max_lon, min_lon))
}

fn render(
    config: &GlobeConfig,
    tiles: Option<&Path>,
    out: &Path,
    width: usize,
    height: usize,
    view: &ViewParams,
) -> anyhow::Result<()> {
    let loader: Arc<dyn TileLoader<RasterTile>> = match tiles {
        Some(root) => {
            let disk = DiskLoader::new(root);
            info!("reading tiles from {}", disk.root().display());
            Arc::new(disk)
        }
        None => Arc::new(ProceduralLoader),
    };
    let pool = match config.cache.worker_threads {
        0 => WorkerPool::with_default_threads(),
        n => WorkerPool::new(n),
    }
    .context("starting tile workers")?;
    let mut cache = TileCache::new(
        config.dataset.clone(),
        loader,
        Arc::new(pool),
        config.cache.clone(),
    );

    let bounds = visible_bounds(width, height, view);
    debug!(?bounds, "visible region");
    cache.set_viewport(bounds, view.radius as f64);

    let deadline = Instant::now() + Duration::from_secs(30);
    while cache.pending_len() > 0 && Instant::now() < deadline {
        cache.process_loaded_blocking(Duration::from_millis(250));
    }
    if cache.pending_len() > 0 {
        warn!(pending = cache.pending_len(), "rendering with tiles still loading");
    }
    acknowledge_removed(&mut cache);
    info!(
        level = ?cache.load_level(),
        tiles = cache.len(),
        "tiles resident"
    );

    let mut compositor = SphericalCompositor::new(config.compositor.clone());
    let mut canvas = Canvas::new(width, height, config.compositor.background);
    let report = compositor.render(&mut canvas, view, &mut CacheTileSource::new(&mut cache));
    info!(
        stride = report.stride,
        rows = report.rows,
        exact = report.exact_samples,
        interpolated = report.interpolated_samples,
        tiles = report.tiles_used.len(),
        "frame composited"
    );

    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    canvas
        .write_ppm(BufWriter::new(file))
        .with_context(|| format!("writing {}", out.display()))?;
    info!("wrote {}", out.display());
    Ok(())
}

fn fetch(
    config: &GlobeConfig,
    bounds: GeoBox,
    min_zoom: u8,
    max_zoom: u8,
    out: &Path,
) -> anyhow::Result<()> {
    let dataset = &config.dataset;
    if dataset.url_template.is_none() && config.scheduler.server_url.is_none() {
        bail!("dataset {} has no url_template; pass --server-url", dataset.name);
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    let transport = HttpTransport::new(rt.handle().clone(), out);
    let mut scheduler = DownloadScheduler::new(config.scheduler.clone(), transport);

    let mut todo = Vec::new();
    for zoom in min_zoom..=max_zoom {
        if dataset.resolve_level(zoom) != Some(zoom) {
            debug!(zoom, "level not provided by dataset");
            continue;
        }
        todo.extend(tiles_in_bounds(dataset, &bounds, zoom));
    }
    info!(tiles = todo.len(), dataset = %dataset.name, "fetching");

    let root = scheduler.transport().root().to_path_buf();
    run_fetch(&mut scheduler, dataset, todo, &root, Duration::from_secs(1))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_bbox, parse_quality, tiles_in_bounds};
    use compositor::MapQuality;
    use foundation::{TileGrid, TileId};
    use pretty_assertions::assert_eq;
    use streaming::TileDataset;

    #[test]
    fn quality_names_parse_case_insensitively() {
        assert_eq!(parse_quality("Print"), Ok(MapQuality::Print));
        assert_eq!(parse_quality("low"), Ok(MapQuality::Low));
        assert!(parse_quality("ultra").is_err());
    }

    #[test]
    fn bbox_parses_into_radians() {
        let b = parse_bbox("-10, -5, 20, 15").expect("bbox");
        assert_eq!(b.west, (-10f64).to_radians());
        assert_eq!(b.north, 15f64.to_radians());
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("0,10,5,0").is_err());
    }

    #[test]
    fn tile_ranges_wrap_across_the_dateline() {
        let dataset = TileDataset::new("osm", TileGrid::default(), vec![0, 1, 2]);
        let bbox = parse_bbox("170,-10,-170,10").expect("bbox");
        let xs: Vec<u32> = tiles_in_bounds(&dataset, &bbox, 2)
            .into_iter()
            .filter(|id| id.y == 1)
            .map(|id| id.x)
            .collect();
        assert_eq!(xs, vec![0, 3]);

        let whole = tiles_in_bounds(&dataset, &parse_bbox("-180,-85,180,85").expect("bbox"), 1);
        assert_eq!(whole.len(), 4);
        assert!(whole.contains(&TileId::new(1, 1, 1)));
    }
}
