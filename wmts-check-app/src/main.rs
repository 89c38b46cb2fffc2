use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use wmts_check::prelude::*;

/// Headless WMTS tile checker: clicks one point and prints what the viewer shows
#[derive(Debug, Parser)]
#[command(name = "wmts-check-app", version)]
struct Args {
    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Easting of the clicked point, display CRS
    #[arg(long, value_name = "X")]
    x: Option<f64>,

    /// Northing of the clicked point, display CRS
    #[arg(long, value_name = "Y")]
    y: Option<f64>,

    #[arg(long, value_name = "LEVEL")]
    zoom: Option<u8>,

    #[arg(long = "base-layer", value_name = "NAME")]
    base_layer: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ViewerConfig::default(),
    }
    .with_env_overrides();

    let display = MemoryDisplay::new();
    let loader = CapabilitiesLoader::http();
    let backend = HttpTileLookup::new(config.services.backend_url.clone())
        .with_timeout(config.backend_timeout());
    let center = config.initial_center();

    let Some(mut map) = ViewController::create(
        config,
        Some("map"),
        &loader,
        Arc::new(backend),
        Box::new(display.clone()),
    )
    .await
    else {
        bail!("the map could not be created, see the log for details");
    };

    let events = map.sender();
    if let Some(zoom) = args.zoom {
        events.send(MapEvent::ZoomSelected { zoom })?;
    }
    if let Some(name) = args.base_layer {
        events.send(MapEvent::BaseLayerSelected { name })?;
    }
    let click = Point::new(args.x.unwrap_or(center.x), args.y.unwrap_or(center.y));
    log::info!("clicking at {:.2}, {:.2}", click.x, click.y);
    events.send(MapEvent::Click { position: click })?;
    map.settle().await;

    let state = display.snapshot();
    if let Some(p) = state.coordinates {
        println!("coordinates : {:.2}, {:.2}", p.x, p.y);
    }
    if let Some(zoom) = state.zoom {
        println!("zoom        : {}", zoom);
    }
    println!("base layer  : {}", state.base_layer.as_deref().unwrap_or("-"));
    println!("tile url    : {}", state.url_text(Panel::Tile).unwrap_or("-"));
    println!("wms url     : {}", state.url_text(Panel::Wms).unwrap_or("-"));
    println!("debug       : {}", state.debug_message);
    if let Some(layer) = map.registry().find_by_name(map.overlays().bbox_layer()) {
        for feature in layer.boxes().unwrap_or(&[]) {
            println!("tile bbox   : {}", feature.bbox);
        }
    }
    Ok(())
}
