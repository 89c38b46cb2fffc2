use crate::{
    core::{
        config::ViewerConfig, constants::DISPLAY_COORD_DECIMALS, geo::Point, grid::TileGrid,
        projection::CoordinateTransform, viewport::View,
    },
    input::events::{event_channel, EventReceiver, EventSender, MapEvent},
    layers::{manager::LayerRegistry, overlay::OverlaySynchronizer},
    tiles::{
        capabilities::Capabilities,
        loader::CapabilitiesLoader,
        lookup::{BackendError, TileInfo, TileLookup},
        source::TileUrlTemplate,
        wms::GetMapRequest,
    },
    ui::display::{DisplaySink, Panel},
};
use std::sync::Arc;

/// Interactive session over one map view.
///
/// Owns the view, the layer registry and the overlays, and reacts to
/// [`MapEvent`]s. Backend lookups run as spawned tasks whose answers come
/// back on the same event channel, so every state change happens on the
/// task driving the controller. None of the public operations fail: errors
/// are logged and the session keeps its previous state.
pub struct ViewController {
    config: ViewerConfig,
    transform: CoordinateTransform,
    grid: TileGrid,
    view: View,
    registry: LayerRegistry,
    overlays: OverlaySynchronizer,
    capabilities: Arc<Capabilities>,
    backend: Arc<dyn TileLookup>,
    display: Box<dyn DisplaySink>,
    tile_template: TileUrlTemplate,
    base_layer: String,
    events_tx: EventSender,
    events_rx: EventReceiver,
    /// Generation of the last lookup issued
    issued_generation: u64,
    /// Generation of the last lookup answer applied
    applied_generation: u64,
    pending_lookups: usize,
    last_tile: Option<TileInfo>,
    selection: Option<Point>,
}

impl ViewController {
    /// Builds the session: transform, grid, base layers from the
    /// capabilities, overlays and initial display.
    ///
    /// Returns `None`, after logging why, when the container is missing,
    /// the configuration is unusable or no base layer could be created.
    pub async fn create(
        config: ViewerConfig,
        container: Option<&str>,
        loader: &CapabilitiesLoader,
        backend: Arc<dyn TileLookup>,
        mut display: Box<dyn DisplaySink>,
    ) -> Option<Self> {
        match container {
            Some(id) if !id.trim().is_empty() => log::debug!("creating map in container {}", id),
            _ => {
                log::error!("map container is missing, no map created");
                return None;
            }
        }
        if let Err(e) = config.validate() {
            log::error!("{}", e);
            return None;
        }
        let transform = match CoordinateTransform::new(&config.view.data_crs, &config.view.display_crs) {
            Ok(transform) => transform,
            Err(e) => {
                log::error!("coordinate transform unavailable: {}", e);
                return None;
            }
        };
        let grid = match TileGrid::from_definition(&config.grid) {
            Ok(grid) => grid,
            Err(e) => {
                log::error!("tile grid unavailable: {}", e);
                return None;
            }
        };

        let capabilities = match loader.load(&config.services.capabilities_url).await {
            Ok(caps) => caps,
            Err(e) => {
                log::error!("no base layers available: {}", e);
                return None;
            }
        };

        let mut registry = LayerRegistry::new();
        for base in &config.base_layers {
            let added = capabilities
                .source_options(&base.name, &config.source)
                .map_err(crate::MapError::from)
                .and_then(|source| {
                    registry
                        .add_base_layer(&base.name, &base.title, source)
                        .map_err(crate::MapError::from)
                });
            if let Err(e) = added {
                log::error!("base layer {} unavailable, no base layers available: {}", base.name, e);
                return None;
            }
        }
        if registry.base_layers().is_empty() {
            log::error!("no base layers available, no map created");
            return None;
        }
        let mut base_layer = config.default_base_layer.clone();
        if let Err(e) = registry.set_visible_base(&base_layer) {
            log::warn!("{}, showing the first base layer", e);
            base_layer = registry.base_layers()[0].name.clone();
            if let Err(e) = registry.set_visible_base(&base_layer) {
                log::warn!("{}, no base layer shown", e);
            }
        }

        let mut overlays = OverlaySynchronizer::new(
            &config.overlays.marker_layer,
            &config.overlays.bbox_layer,
            &config.overlays.reference_layer,
            &config.overlays.marker_icon,
        );
        overlays.install(&mut registry);
        overlays.draw_reference_boxes(&mut registry, &config.overlays.reference_boxes);

        let view = View::new(
            config.initial_center(),
            config.view.zoom as f64,
            grid.maxzoom() as f64,
        )
        .with_max_extent(*grid.extent());

        display.set_base_layer(&base_layer);
        display.set_zoom(view.rounded_zoom());
        display.set_coordinates(transform.to_display(view.center()).round_to(DISPLAY_COORD_DECIMALS));

        let (events_tx, events_rx) = event_channel();
        log::info!(
            "map ready: {} base layers, grid {} with {} levels",
            registry.base_layers().len(),
            grid.name(),
            grid.nlevels()
        );

        Some(Self {
            tile_template: config.tiles.template(),
            config,
            transform,
            grid,
            view,
            registry,
            overlays,
            capabilities,
            backend,
            display,
            base_layer,
            events_tx,
            events_rx,
            issued_generation: 0,
            applied_generation: 0,
            pending_lookups: 0,
            last_tile: None,
            selection: None,
        })
    }

    /// Sender for feeding user events into the session
    pub fn sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    fn emit(&self, event: MapEvent) {
        if self.events_tx.send(event).is_err() {
            log::debug!("event channel closed");
        }
    }

    /// Waits for the next event and handles it
    pub async fn process_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    /// Handles every event already queued. Returns how many were handled.
    pub fn drain_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            count += 1;
        }
        count
    }

    /// Handles events until the queue is empty and no lookup is in flight
    pub async fn settle(&mut self) {
        loop {
            self.drain_pending();
            if self.pending_lookups == 0 {
                break;
            }
            self.process_next().await;
        }
    }

    /// Returns whether the event changed the session
    pub fn handle_event(&mut self, event: MapEvent) -> bool {
        if event.is_user_event() {
            log::debug!("user event {}", event.name());
        } else {
            log::trace!("handling {}", event.name());
        }
        match event {
            MapEvent::Click { position } => self.on_click(position),
            MapEvent::MoveEnd => self.on_move_end(),
            MapEvent::ZoomSelected { zoom } => self.on_zoom_selected(zoom),
            MapEvent::BaseLayerSelected { name } => self.on_base_layer_selected(&name),
            MapEvent::TileLookupCompleted { generation, result } => {
                self.on_lookup_completed(generation, result)
            }
        }
    }

    fn on_click(&mut self, position: Point) -> bool {
        let point = self.transform.to_data(position);
        if !point.is_finite() {
            log::warn!("click at {:?} has no data coordinate", position);
            return false;
        }
        let point = point.round_to(DISPLAY_COORD_DECIMALS);
        log::debug!("click at {:.2}, {:.2}", point.x, point.y);

        self.selection = Some(point);
        self.display.set_coordinates(point);

        // Out-of-range clicks leave the view in place
        let zoom = self.view.rounded_zoom();
        if let Err(e) = self.grid.resolve(&point, zoom) {
            log::warn!("no tile for click: {}", e);
            self.overlays.redraw_marker(&mut self.registry, point);
            self.display.set_debug_message(&format!(
                "{:.2}, {:.2} is outside the tile grid at zoom {}",
                point.x, point.y, zoom
            ));
            return true;
        }

        if self.view.set_center(point) {
            self.emit(MapEvent::MoveEnd);
        }
        self.overlays.redraw_marker(&mut self.registry, point);
        self.spawn_lookup(zoom, point);
        true
    }

    fn spawn_lookup(&mut self, zoom: u8, point: Point) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("cannot start tile lookup outside a runtime: {}", e);
                return;
            }
        };
        self.issued_generation += 1;
        self.pending_lookups += 1;
        let generation = self.issued_generation;
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let timeout = self.config.backend_timeout();

        log::debug!("lookup #{} for zoom {} at {:.2}, {:.2}", generation, zoom, point.x, point.y);
        handle.spawn(async move {
            let result = match tokio::time::timeout(timeout, backend.tile_by_xy(zoom, point.x, point.y)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout),
            };
            if tx.send(MapEvent::TileLookupCompleted { generation, result }).is_err() {
                log::debug!("lookup #{} finished after the session ended", generation);
            }
        });
    }

    fn on_lookup_completed(&mut self, generation: u64, result: Result<TileInfo, BackendError>) -> bool {
        self.pending_lookups = self.pending_lookups.saturating_sub(1);
        if self.config.discard_stale_lookups && generation < self.applied_generation {
            log::debug!(
                "dropping lookup #{}, #{} already applied",
                generation,
                self.applied_generation
            );
            return false;
        }
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                log::warn!("tile lookup #{} failed: {}", generation, e);
                return false;
            }
        };
        self.applied_generation = self.applied_generation.max(generation);

        self.overlays
            .redraw_bbox(&mut self.registry, info.bbox, false);
        self.show_tile(&info);
        self.display.set_debug_message(&format!(
            "tile zoom {} row {} col {} bbox {}",
            info.zoom, info.row, info.col, info.bbox
        ));
        self.last_tile = Some(info);
        true
    }

    fn show_tile(&mut self, info: &TileInfo) {
        let tile_url = self.tile_template.url(&self.base_layer, &info.address());
        self.display.set_image(Panel::Tile, &tile_url);
        self.display.set_url_text(Panel::Tile, &tile_url);

        let wms_url = if info.wms_url.is_empty() {
            let layers: Vec<&str> = self.config.services.wms_layers.iter().map(|l| l.as_str()).collect();
            GetMapRequest::new(self.config.services.wms_url.clone(), info.bbox)
                .with_layers(&layers)
                .with_crs(self.grid.crs().code())
                .url()
        } else {
            info.wms_url.clone()
        };
        self.display.set_image(Panel::Wms, &wms_url);
        self.display.set_url_text(Panel::Wms, &wms_url);
    }

    /// Writes the view state back into the controls. A fractional zoom is
    /// snapped once, which emits one more `MoveEnd`; an already snapped zoom
    /// emits nothing.
    fn on_move_end(&mut self) -> bool {
        let center = self.view.center();
        let zoom = self.view.rounded_zoom();
        self.display.set_zoom(zoom);
        self.display.set_debug_message(&format!(
            "center: {:.2}, {:.2} zoom: {} ({:.2})",
            center.x,
            center.y,
            zoom,
            self.view.zoom()
        ));
        if !self.view.is_zoom_snapped() && self.view.set_zoom(zoom as f64) {
            self.emit(MapEvent::MoveEnd);
        }
        true
    }

    fn on_zoom_selected(&mut self, zoom: u8) -> bool {
        if zoom > self.grid.maxzoom() {
            log::warn!("zoom {} is beyond the grid, max is {}", zoom, self.grid.maxzoom());
        }
        if self.view.set_zoom(zoom as f64) {
            self.emit(MapEvent::MoveEnd);
            true
        } else {
            false
        }
    }

    fn on_base_layer_selected(&mut self, name: &str) -> bool {
        if let Err(e) = self.registry.set_visible_base(name) {
            log::warn!("cannot select base layer: {}", e);
            return false;
        }
        self.base_layer = name.to_string();
        self.display.set_base_layer(name);
        if let Some(info) = self.last_tile.clone() {
            let tile_url = self.tile_template.url(&self.base_layer, &info.address());
            self.display.set_image(Panel::Tile, &tile_url);
            self.display.set_url_text(Panel::Tile, &tile_url);
        }
        true
    }

    /// Moves the view as a user drag would, emitting `MoveEnd` on change
    pub fn pan_view(&mut self, delta: Point) -> bool {
        let changed = self.view.pan(delta);
        if changed {
            self.emit(MapEvent::MoveEnd);
        }
        changed
    }

    /// Zooms the view to a possibly fractional level, emitting `MoveEnd` on change
    pub fn zoom_view(&mut self, zoom: f64) -> bool {
        let changed = self.view.set_zoom(zoom);
        if changed {
            self.emit(MapEvent::MoveEnd);
        }
        changed
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn overlays(&self) -> &OverlaySynchronizer {
        &self.overlays
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn base_layer(&self) -> &str {
        &self.base_layer
    }

    pub fn last_tile(&self) -> Option<&TileInfo> {
        self.last_tile.as_ref()
    }

    /// Last clicked point, in data coordinates
    pub fn selection(&self) -> Option<Point> {
        self.selection
    }

    pub fn pending_lookups(&self) -> usize {
        self.pending_lookups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bounds::Extent;
    use crate::tiles::capabilities::CapabilitiesError;
    use crate::tiles::loader::CapabilitiesFetcher;
    use crate::ui::display::MemoryDisplay;
    use async_trait::async_trait;

    const LAUSANNE: &str = include_str!("../../tests/fixtures/lausanne_wmts.xml");

    struct StaticFetcher(Result<String, CapabilitiesError>);

    #[async_trait]
    impl CapabilitiesFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, CapabilitiesError> {
            self.0.clone()
        }
    }

    struct FixedLookup;

    #[async_trait]
    impl TileLookup for FixedLookup {
        async fn tile_by_xy(&self, zoom: u8, _x: f64, _y: f64) -> Result<TileInfo, BackendError> {
            Ok(TileInfo {
                zoom,
                col: 12,
                row: 7,
                wms_url: String::new(),
                bbox: Extent::new(2537000.0, 1152000.0, 2538000.0, 1153000.0),
            })
        }
    }

    async fn controller(body: Result<String, CapabilitiesError>, container: Option<&str>) -> Option<ViewController> {
        let loader = CapabilitiesLoader::new(Arc::new(StaticFetcher(body)));
        ViewController::create(
            ViewerConfig::default(),
            container,
            &loader,
            Arc::new(FixedLookup),
            Box::new(MemoryDisplay::new()),
        )
        .await
    }

    #[tokio::test]
    async fn test_create() {
        let map = controller(Ok(LAUSANNE.to_string()), Some("map")).await.unwrap();
        assert_eq!(map.registry().base_layers().len(), 3);
        assert_eq!(map.base_layer(), "fonds_geo_osm_bdcad_couleur");
        assert_eq!(map.registry().visible_base().unwrap().name, "fonds_geo_osm_bdcad_couleur");
        assert!(map.registry().find_by_name("PointLayer").is_some());
        assert_eq!(
            map.registry().find_by_name("ReferenceLayer").unwrap().boxes().unwrap().len(),
            2
        );
        assert_eq!(map.view().rounded_zoom(), 4);
        assert_eq!(map.capabilities().layers.len(), 3);
    }

    #[tokio::test]
    async fn test_create_failures() {
        assert!(controller(Ok(LAUSANNE.to_string()), None).await.is_none());
        assert!(controller(Ok(LAUSANNE.to_string()), Some(" ")).await.is_none());
        assert!(controller(Err(CapabilitiesError::Transport("down".to_string())), Some("map"))
            .await
            .is_none());
        assert!(controller(Ok("<html/>".to_string()), Some("map")).await.is_none());

        let loader = CapabilitiesLoader::new(Arc::new(StaticFetcher(Ok(LAUSANNE.to_string()))));
        let mut config = ViewerConfig::default();
        config.view.display_crs = "EPSG:9999".to_string();
        let map = ViewController::create(
            config,
            Some("map"),
            &loader,
            Arc::new(FixedLookup),
            Box::new(MemoryDisplay::new()),
        )
        .await;
        assert!(map.is_none());
    }

    #[tokio::test]
    async fn test_wms_fallback_url() {
        let display = MemoryDisplay::new();
        let loader = CapabilitiesLoader::new(Arc::new(StaticFetcher(Ok(LAUSANNE.to_string()))));
        let mut map = ViewController::create(
            ViewerConfig::default(),
            Some("map"),
            &loader,
            Arc::new(FixedLookup),
            Box::new(display.clone()),
        )
        .await
        .unwrap();

        map.handle_event(MapEvent::Click {
            position: Point::new(2538202.0, 1152364.0),
        });
        map.settle().await;

        let wms = display.snapshot().wms_url_text.unwrap();
        assert!(wms.starts_with("https://carto.lausanne.ch/mapserv_proxy?ogcserver=source+for+image%2Fpng&SERVICE=WMS&"));
        assert!(wms.contains("CRS=EPSG%3A2056"));
        assert!(wms.ends_with("BBOX=2537000,1152000,2538000,1153000"));
    }

    #[tokio::test]
    async fn test_base_layer_switch_refreshes_tile_url() {
        let display = MemoryDisplay::new();
        let loader = CapabilitiesLoader::new(Arc::new(StaticFetcher(Ok(LAUSANNE.to_string()))));
        let mut map = ViewController::create(
            ViewerConfig::default(),
            Some("map"),
            &loader,
            Arc::new(FixedLookup),
            Box::new(display.clone()),
        )
        .await
        .unwrap();

        assert!(!map.handle_event(MapEvent::BaseLayerSelected {
            name: "PointLayer".to_string()
        }));
        map.handle_event(MapEvent::Click {
            position: Point::new(2538202.0, 1152364.0),
        });
        map.settle().await;
        assert!(map.handle_event(MapEvent::BaseLayerSelected {
            name: "orthophotos_ortho_lidar_2016".to_string()
        }));

        let state = display.snapshot();
        assert_eq!(state.base_layer.as_deref(), Some("orthophotos_ortho_lidar_2016"));
        assert!(state
            .tile_url_text
            .unwrap()
            .ends_with("/orthophotos_ortho_lidar_2016/default/2021/swissgrid_05/4/7/12.png"));
        assert_eq!(map.registry().base_layers().iter().filter(|l| l.visible).count(), 1);
    }
}
