use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Notify};
use wmts_check::prelude::*;
use wmts_check::tiles::capabilities::CapabilitiesError;
use wmts_check::tiles::lookup::BackendError;

const LAUSANNE: &str = include_str!("fixtures/lausanne_wmts.xml");

/// Interaction scenarios driven through the event channel, with the
/// capabilities service and the tile backend replaced by fakes
#[cfg(test)]
mod scenario_tests {
    use super::*;

    struct FixtureFetcher {
        calls: AtomicUsize,
        gate: Option<Notify>,
    }

    impl FixtureFetcher {
        fn immediate() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(Notify::new()),
            })
        }
    }

    #[async_trait]
    impl CapabilitiesFetcher for FixtureFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, CapabilitiesError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(LAUSANNE.to_string())
        }
    }

    type Reply = oneshot::Sender<Result<TileInfo, BackendError>>;

    /// Backend whose answers are released by the test, one per call
    #[derive(Default)]
    struct GatedBackend {
        calls: Mutex<Vec<(u8, f64, f64)>>,
        waiting: Mutex<Vec<(f64, Reply)>>,
    }

    impl GatedBackend {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        async fn wait_for_calls(&self, n: usize) {
            while self.call_count() < n {
                tokio::task::yield_now().await;
            }
        }

        /// Answers the pending call made for easting `x`
        fn reply(&self, x: f64, result: Result<TileInfo, BackendError>) {
            let mut waiting = self.waiting.lock().unwrap();
            let index = waiting
                .iter()
                .position(|(wx, _)| *wx == x)
                .expect("no pending call for this point");
            let (_, tx) = waiting.remove(index);
            tx.send(result).unwrap();
        }
    }

    #[async_trait]
    impl TileLookup for GatedBackend {
        async fn tile_by_xy(&self, zoom: u8, x: f64, y: f64) -> Result<TileInfo, BackendError> {
            let (tx, rx) = oneshot::channel();
            self.calls.lock().unwrap().push((zoom, x, y));
            self.waiting.lock().unwrap().push((x, tx));
            rx.await
                .unwrap_or_else(|_| Err(BackendError::Transport("reply dropped".to_string())))
        }
    }

    fn tile(col: u32, row: u32, bbox: [f64; 4]) -> TileInfo {
        TileInfo {
            zoom: 4,
            col,
            row,
            wms_url: format!("https://wms.example/mapserv?BBOX={},{},{},{}", bbox[0], bbox[1], bbox[2], bbox[3]),
            bbox: Extent::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    async fn session(
        config: ViewerConfig,
        backend: Arc<GatedBackend>,
    ) -> (ViewController, MemoryDisplay) {
        init_logging();
        let display = MemoryDisplay::new();
        let loader = CapabilitiesLoader::new(FixtureFetcher::immediate());
        let map = ViewController::create(config, Some("map"), &loader, backend, Box::new(display.clone()))
            .await
            .expect("map should be created");
        (map, display)
    }

    fn bboxes(map: &ViewController) -> Vec<Extent> {
        map.registry()
            .find_by_name("BBoxLayer")
            .and_then(|l| l.boxes())
            .map(|boxes| boxes.iter().map(|f| f.bbox).collect())
            .unwrap_or_default()
    }

    /// Click, backend answer, then marker, bbox and tile URL reflect that answer
    #[tokio::test]
    async fn test_click_resolves_tile() {
        let backend = Arc::new(GatedBackend::default());
        let (mut map, display) = session(ViewerConfig::default(), backend.clone()).await;
        assert_eq!(map.base_layer(), "fonds_geo_osm_bdcad_couleur");

        map.handle_event(MapEvent::Click {
            position: Point::new(2538202.001, 1152363.998),
        });

        // The marker is drawn before the backend answers
        let markers = map.registry().find_by_name("PointLayer").unwrap().markers().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].position, Point::new(2538202.0, 1152364.0));
        assert_eq!(display.snapshot().coordinates, Some(Point::new(2538202.0, 1152364.0)));
        assert!(bboxes(&map).is_empty());
        assert!(display.snapshot().tile_url_text.is_none());

        backend.wait_for_calls(1).await;
        assert_eq!(backend.calls.lock().unwrap()[0], (4, 2538202.0, 1152364.0));

        let answer = tile(12, 7, [2537000.0, 1152000.0, 2538000.0, 1153000.0]);
        backend.reply(2538202.0, Ok(answer.clone()));
        map.settle().await;

        assert_eq!(bboxes(&map), vec![answer.bbox]);
        let state = display.snapshot();
        assert_eq!(
            state.url_text(Panel::Tile),
            Some("https://tilesmn95.lausanne.ch/tiles/1.0.0/fonds_geo_osm_bdcad_couleur/default/2021/swissgrid_05/4/7/12.png")
        );
        assert_eq!(state.image(Panel::Tile), state.url_text(Panel::Tile));
        assert_eq!(state.url_text(Panel::Wms), Some(answer.wms_url.as_str()));
        assert_eq!(map.last_tile(), Some(&answer));
        assert_eq!(map.pending_lookups(), 0);
    }

    /// Later clicks replace the marker and the bbox instead of accumulating
    #[tokio::test]
    async fn test_overlays_show_latest_selection_only() {
        let backend = Arc::new(GatedBackend::default());
        let (mut map, _display) = session(ViewerConfig::default(), backend.clone()).await;

        for (i, x) in [2538202.0, 2539500.0].into_iter().enumerate() {
            map.handle_event(MapEvent::Click {
                position: Point::new(x, 1154500.0),
            });
            backend.wait_for_calls(i + 1).await;
            backend.reply(x, Ok(tile(i as u32, 0, [x - 10.0, 1154490.0, x + 10.0, 1154510.0])));
            map.settle().await;
        }

        let markers = map.registry().find_by_name("PointLayer").unwrap().markers().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].position.x, 2539500.0);
        assert_eq!(bboxes(&map), vec![Extent::new(2539490.0, 1154490.0, 2539510.0, 1154510.0)]);
        // reference boxes are untouched
        assert_eq!(
            map.registry().find_by_name("ReferenceLayer").unwrap().boxes().unwrap().len(),
            2
        );
    }

    /// Two sessions created at once share a single capabilities fetch
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sessions_share_capabilities_fetch() {
        init_logging();
        let fetcher = FixtureFetcher::gated();
        let loader = CapabilitiesLoader::new(fetcher.clone());
        let backend = Arc::new(GatedBackend::default());

        let release = async {
            while fetcher.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            if let Some(gate) = &fetcher.gate {
                gate.notify_one();
            }
        };
        let (first, second, _) = tokio::join!(
            ViewController::create(
                ViewerConfig::default(),
                Some("map"),
                &loader,
                backend.clone(),
                Box::new(MemoryDisplay::new()),
            ),
            ViewController::create(
                ViewerConfig::default(),
                Some("map-wmts"),
                &loader,
                backend.clone(),
                Box::new(MemoryDisplay::new()),
            ),
            release
        );

        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.capabilities(), second.capabilities());
        assert!(loader.cache().get("https://tilesmn95.lausanne.ch/tiles/1.0.0/LausanneWMTS.xml").is_some());
    }

    #[tokio::test]
    async fn test_moveend_is_idempotent() {
        let backend = Arc::new(GatedBackend::default());
        let (mut map, display) = session(ViewerConfig::default(), backend).await;

        assert!(map.zoom_view(5.0));
        assert_eq!(map.drain_pending(), 1);
        assert_eq!(display.snapshot().zoom, Some(5));
        assert_eq!(map.view().zoom(), 5.0);

        // Re-applying the same integer zoom changes nothing
        assert!(!map.zoom_view(5.0));
        map.handle_event(MapEvent::MoveEnd);
        assert_eq!(map.drain_pending(), 0);
        assert_eq!(display.snapshot().zoom, Some(5));

        // A fractional zoom is snapped once, then the loop stops
        assert!(map.zoom_view(5.6));
        assert_eq!(map.drain_pending(), 2);
        assert_eq!(map.view().zoom(), 6.0);
        assert_eq!(display.snapshot().zoom, Some(6));
        assert_eq!(map.drain_pending(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_click_skips_backend() {
        let backend = Arc::new(GatedBackend::default());
        let (mut map, display) = session(ViewerConfig::default(), backend.clone()).await;

        let center = map.view().center();
        map.handle_event(MapEvent::Click {
            position: Point::new(2600000.0, 1200000.0),
        });
        map.settle().await;

        let state = display.snapshot();
        assert_eq!(
            state.debug_message,
            "2600000.00, 1200000.00 is outside the tile grid at zoom 4"
        );
        assert_eq!(state.coordinates, Some(Point::new(2600000.0, 1200000.0)));
        assert_eq!(map.view().center(), center);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(map.pending_lookups(), 0);
        assert!(display.snapshot().tile_url_text.is_none());
        assert!(bboxes(&map).is_empty());
    }

    /// A failed lookup keeps the previous tile on display
    #[tokio::test]
    async fn test_failed_lookup_leaves_display_untouched() {
        let backend = Arc::new(GatedBackend::default());
        let mut config = ViewerConfig::default();
        config.services.backend_timeout_ms = 50;
        let (mut map, display) = session(config, backend.clone()).await;

        map.handle_event(MapEvent::Click {
            position: Point::new(2538202.0, 1152364.0),
        });
        backend.wait_for_calls(1).await;
        let first = tile(12, 7, [2537000.0, 1152000.0, 2538000.0, 1153000.0]);
        backend.reply(2538202.0, Ok(first.clone()));
        map.settle().await;
        let shown = display.snapshot();

        map.handle_event(MapEvent::Click {
            position: Point::new(2539000.0, 1153000.0),
        });
        backend.wait_for_calls(2).await;
        backend.reply(2539000.0, Err(BackendError::Status(500)));
        map.settle().await;

        // never answered: the client side timeout fires
        map.handle_event(MapEvent::Click {
            position: Point::new(2540000.0, 1154000.0),
        });
        map.settle().await;
        assert_eq!(backend.call_count(), 3);

        let state = display.snapshot();
        assert_eq!(state.tile_url_text, shown.tile_url_text);
        assert_eq!(state.wms_url_text, shown.wms_url_text);
        assert_eq!(state.coordinates, Some(Point::new(2540000.0, 1154000.0)));
        assert_eq!(bboxes(&map), vec![first.bbox]);
        assert_eq!(map.last_tile(), Some(&first));
    }

    async fn race(discard_stale_lookups: bool) -> (ViewController, MemoryDisplay) {
        let backend = Arc::new(GatedBackend::default());
        let config = ViewerConfig {
            discard_stale_lookups,
            ..ViewerConfig::default()
        };
        let (mut map, display) = session(config, backend.clone()).await;

        map.handle_event(MapEvent::Click {
            position: Point::new(2538202.0, 1152364.0),
        });
        map.handle_event(MapEvent::Click {
            position: Point::new(2541000.0, 1156000.0),
        });
        map.drain_pending();
        backend.wait_for_calls(2).await;

        // the second answer arrives first
        backend.reply(2541000.0, Ok(tile(2, 2, [2540800.0, 1155840.0, 2541440.0, 1156480.0])));
        map.process_next().await;
        backend.reply(2538202.0, Ok(tile(1, 1, [2537760.0, 1152240.0, 2538400.0, 1152880.0])));
        map.settle().await;
        (map, display)
    }

    /// Answers apply in arrival order by default, so a slow first answer wins
    #[tokio::test]
    async fn test_stale_answer_applies_by_default() {
        let (map, display) = race(false).await;
        assert_eq!(bboxes(&map), vec![Extent::new(2537760.0, 1152240.0, 2538400.0, 1152880.0)]);
        assert!(display.snapshot().tile_url_text.unwrap().ends_with("/4/1/1.png"));
    }

    #[tokio::test]
    async fn test_stale_answer_dropped_when_configured() {
        let (map, display) = race(true).await;
        assert_eq!(bboxes(&map), vec![Extent::new(2540800.0, 1155840.0, 2541440.0, 1156480.0)]);
        assert!(display.snapshot().tile_url_text.unwrap().ends_with("/4/2/2.png"));
        assert_eq!(map.pending_lookups(), 0);
    }

    #[tokio::test]
    async fn test_config_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/viewer.json");
        let config = ViewerConfig::from_file(path).unwrap();
        assert_eq!(config.services.backend_url, "http://localhost:8000");
        assert_eq!(config.default_base_layer, "fonds_geo_osm_bdcad_gris");
        assert_eq!(config.view.zoom, 6);

        let backend = Arc::new(GatedBackend::default());
        let (map, display) = session(config, backend).await;
        assert_eq!(map.base_layer(), "fonds_geo_osm_bdcad_gris");
        assert_eq!(display.snapshot().zoom, Some(6));
        assert_eq!(display.snapshot().base_layer.as_deref(), Some("fonds_geo_osm_bdcad_gris"));
    }
}
