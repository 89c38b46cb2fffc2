use crate::layers::base::{Layer, LayerKind};
use crate::layers::marker::MarkerFeature;
use crate::layers::vector::BBoxFeature;
use crate::tiles::source::TileSourceDescriptor;
use fxhash::FxHashMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("a layer named '{0}' already exists")]
    Duplicate(String),
    #[error("layer '{name}' is a {found} layer, expected {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("no layer named '{0}'")]
    NotFound(String),
}

/// Features handed to the create-or-replace operations
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    Markers(Vec<MarkerFeature>),
    Boxes(Vec<BBoxFeature>),
}

impl Features {
    fn type_name(&self) -> &'static str {
        match self {
            Features::Markers(_) => "point",
            Features::Boxes(_) => "polygon",
        }
    }

    fn into_layer(self, name: &str) -> Layer {
        match self {
            Features::Markers(markers) => Layer::points(name, markers),
            Features::Boxes(boxes) => Layer::polygons(name, boxes),
        }
    }
}

impl From<Vec<MarkerFeature>> for Features {
    fn from(markers: Vec<MarkerFeature>) -> Self {
        Features::Markers(markers)
    }
}

impl From<Vec<BBoxFeature>> for Features {
    fn from(boxes: Vec<BBoxFeature>) -> Self {
        Features::Boxes(boxes)
    }
}

/// Name to layer mapping of a view. Holds at most one layer per name.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: FxHashMap<String, Layer>,
    /// Layer names sorted by z-index, insertion order within a z-index
    render_order: Vec<String>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    fn insert(&mut self, layer: Layer) {
        let name = layer.name.clone();
        let z_index = layer.z_index;
        self.layers.insert(name.clone(), layer);

        let insert_pos = self
            .render_order
            .iter()
            .position(|n| {
                self.layers
                    .get(n)
                    .map(|l| l.z_index > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());
        self.render_order.insert(insert_pos, name);
    }

    /// Creates the layer with exactly `features`, or swaps the features of
    /// the existing layer for them.
    pub fn create_or_replace(
        &mut self,
        name: &str,
        features: impl Into<Features>,
    ) -> Result<(), RegistryError> {
        self.create_or_append(name, features, false)
    }

    /// Like [`create_or_replace`](Self::create_or_replace), but with
    /// `append` the features are added to the existing ones.
    pub fn create_or_append(
        &mut self,
        name: &str,
        features: impl Into<Features>,
        append: bool,
    ) -> Result<(), RegistryError> {
        let features = features.into();
        let Some(layer) = self.layers.get_mut(name) else {
            log::debug!("creating {} layer {}", features.type_name(), name);
            self.insert(features.into_layer(name));
            return Ok(());
        };

        match (&mut layer.kind, features) {
            (LayerKind::Point(current), Features::Markers(markers)) => {
                if !append {
                    current.clear();
                }
                current.extend(markers);
            }
            (LayerKind::Polygon(current), Features::Boxes(boxes)) => {
                if !append {
                    current.clear();
                }
                current.extend(boxes);
            }
            (kind, features) => {
                return Err(RegistryError::KindMismatch {
                    name: name.to_string(),
                    expected: features.type_name(),
                    found: kind.type_name(),
                })
            }
        }
        Ok(())
    }

    /// Adds a base layer, hidden until selected
    pub fn add_base_layer(
        &mut self,
        name: &str,
        title: &str,
        source: TileSourceDescriptor,
    ) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.insert(Layer::base(name, title, source));
        Ok(())
    }

    /// Shows `name` and hides every other base layer
    pub fn set_visible_base(&mut self, name: &str) -> Result<(), RegistryError> {
        match self.layers.get(name) {
            Some(layer) if layer.is_base() => {}
            Some(layer) => {
                return Err(RegistryError::KindMismatch {
                    name: name.to_string(),
                    expected: "base",
                    found: layer.kind.type_name(),
                })
            }
            None => return Err(RegistryError::NotFound(name.to_string())),
        }
        for layer in self.layers.values_mut().filter(|l| l.is_base()) {
            layer.visible = layer.name == name;
        }
        Ok(())
    }

    pub fn visible_base(&self) -> Option<&Layer> {
        self.layers().into_iter().find(|l| l.is_base() && l.visible)
    }

    pub fn base_layers(&self) -> Vec<&Layer> {
        self.layers().into_iter().filter(|l| l.is_base()).collect()
    }

    /// All layers in render order
    pub fn layers(&self) -> Vec<&Layer> {
        self.render_order
            .iter()
            .filter_map(|name| self.layers.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
