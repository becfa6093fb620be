//! slideview - headless snapshot viewer for pyramidal Whole Slide Images.
//!
//! This binary opens a slide on a slide server, positions the camera,
//! runs one full progressive render pass and writes the result as a PNG.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use slideview::{
    Config, DrawSurface, HttpSlideTransport, PixelSurface, SlideTransport, Viewer, WHITE,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let base = match Url::parse(&config.url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid server URL '{}': {}", config.url, e);
            return ExitCode::FAILURE;
        }
    };

    let transport = Arc::new(HttpSlideTransport::new(base, config.slide.clone()));

    if config.info {
        return run_info(transport).await;
    }
    run_snapshot(transport, config).await
}

// =============================================================================
// Info Command
// =============================================================================

/// Fetch and print the pyramid description, without rendering.
async fn run_info(transport: Arc<HttpSlideTransport>) -> ExitCode {
    let metadata = match transport.fetch_metadata().await {
        Ok(metadata) => metadata,
        Err(e) => {
            error!("Failed to fetch metadata: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = metadata.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    println!("Slide: {}", transport.slide_id());
    println!(
        "Dimensions: {} x {}",
        metadata.dimensions.0, metadata.dimensions.1
    );
    println!("Levels: {}", metadata.level_count());
    for level in 0..metadata.level_count() {
        let (w, h) = metadata.level_dimensions(level).unwrap_or((0, 0));
        let ds = metadata.level_downsample(level).unwrap_or(0.0);
        println!("  level {level}: {w} x {h}  (downsample {ds:.1})");
    }
    if !metadata.properties.is_empty() {
        println!("Properties:");
        let mut keys: Vec<_> = metadata.properties.keys().collect();
        keys.sort();
        for key in keys {
            println!("  {} = {}", key, metadata.properties[key]);
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Snapshot Command
// =============================================================================

async fn run_snapshot(transport: Arc<HttpSlideTransport>, config: Config) -> ExitCode {
    let surface = Arc::new(PixelSurface::new(config.width, config.height, WHITE));
    let minimap_surface = config
        .minimap
        .as_ref()
        .map(|_| Arc::new(PixelSurface::new(config.minimap_size, config.minimap_size, WHITE)));

    info!("Opening {} at {}", config.slide, config.url);
    let viewer = match Viewer::open(
        transport as Arc<dyn SlideTransport>,
        Arc::clone(&surface) as Arc<dyn DrawSurface>,
        minimap_surface
            .as_ref()
            .map(|s| Arc::clone(s) as Arc<dyn DrawSurface>),
        config.viewer_config(),
    )
    .await
    {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Failed to open slide: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if position_camera(&viewer, &config).await {
        viewer.render().await;
    }

    let view_info = viewer.info().await;
    info!(
        "Rendered level {} ({} x {}, downsample {:.1}), {} visible tiles",
        view_info.level,
        view_info.level_dimensions.0,
        view_info.level_dimensions.1,
        view_info.downsample,
        view_info.visible_tiles
    );

    if let Err(e) = surface.snapshot().save(&config.output) {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }
    info!("Snapshot written to {}", config.output.display());

    if let (Some(path), Some(map_surface)) = (&config.minimap, &minimap_surface) {
        if let Err(e) = map_surface.snapshot().save(path) {
            error!("Failed to write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Minimap written to {}", path.display());
    }

    ExitCode::SUCCESS
}

/// Apply the requested zoom/center on top of the initial fit-to-view.
/// Returns true when the camera moved and a re-render is needed.
async fn position_camera(viewer: &Viewer, config: &Config) -> bool {
    let mut moved = false;
    let canvas_center = (
        f64::from(config.width) / 2.0,
        f64::from(config.height) / 2.0,
    );

    if let Some(zoom) = config.zoom {
        let current = viewer.viewport().await.zoom();
        viewer.zoom_around(zoom / current, canvas_center).await;
        moved = true;
    }

    if config.center_x.is_some() || config.center_y.is_some() {
        let viewport = viewer.viewport().await;
        let current_center = viewport.canvas_to_image(canvas_center);
        let target = (
            config.center_x.unwrap_or(current_center.0),
            config.center_y.unwrap_or(current_center.1),
        );
        viewer
            .pan_by(
                (target.0 - current_center.0) * viewport.zoom(),
                (target.1 - current_center.1) * viewport.zoom(),
            )
            .await;
        moved = true;
    }

    moved
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "slideview=debug"
    } else {
        "slideview=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
