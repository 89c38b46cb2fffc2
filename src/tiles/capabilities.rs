//! WMTS 1.0.0 capabilities parsing.
//!
//! Only the parts needed to build tile sources are kept: the layers of
//! `Contents` with their styles, formats, dimensions, matrix set links and
//! resource URLs, and the tile matrix sets. Namespace prefixes are ignored.

use crate::core::constants::WMTS_REF_PIXEL_SIZE_M;
use crate::core::geo::Point;
use crate::tiles::source::{SourceRequest, TileSourceDescriptor};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Errors of the capabilities fetch and parse. Cloneable so that every
/// caller sharing an in-flight load receives the same failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilitiesError {
    #[error("fetching capabilities failed: {0}")]
    Transport(String),
    #[error("malformed capabilities XML: {0}")]
    Xml(String),
    #[error("expected a WMTS Capabilities document, found <{0}>")]
    NotCapabilities(String),
    #[error("invalid capabilities: {0}")]
    Invalid(String),
    #[error("layer '{0}' not found in capabilities")]
    LayerNotFound(String),
    #[error("layer '{layer}' is not linked to tile matrix set '{matrix_set}'")]
    MatrixSetNotLinked { layer: String, matrix_set: String },
    #[error("tile matrix set '{0}' not found in capabilities")]
    TileMatrixSetNotFound(String),
    #[error("layer '{0}' advertises no format")]
    NoFormat(String),
}

impl From<quick_xml::Error> for CapabilitiesError {
    fn from(e: quick_xml::Error) -> Self {
        CapabilitiesError::Xml(e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub title: Option<String>,
    pub layers: Vec<WmtsLayer>,
    pub tile_matrix_sets: Vec<TileMatrixSet>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WmtsLayer {
    pub identifier: String,
    pub title: String,
    pub formats: Vec<String>,
    pub styles: Vec<WmtsStyle>,
    pub tile_matrix_set_links: Vec<String>,
    pub resource_urls: Vec<ResourceUrl>,
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WmtsStyle {
    pub identifier: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceUrl {
    pub format: String,
    pub resource_type: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimension {
    pub identifier: String,
    pub default: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMatrixSet {
    pub identifier: String,
    pub supported_crs: String,
    pub matrices: Vec<TileMatrix>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMatrix {
    pub identifier: String,
    pub scale_denominator: f64,
    pub top_left_corner: Point,
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: u32,
    pub matrix_height: u32,
}

impl TileMatrix {
    /// Ground resolution in units per pixel
    pub fn cell_size(&self) -> f64 {
        self.scale_denominator * WMTS_REF_PIXEL_SIZE_M
    }
}

impl Capabilities {
    pub fn parse(xml: &str) -> Result<Capabilities, CapabilitiesError> {
        CapabilitiesParser::default().run(xml)
    }

    pub fn layer(&self, identifier: &str) -> Option<&WmtsLayer> {
        self.layers.iter().find(|l| l.identifier == identifier)
    }

    pub fn tile_matrix_set(&self, identifier: &str) -> Option<&TileMatrixSet> {
        self.tile_matrix_sets
            .iter()
            .find(|s| s.identifier == identifier)
    }

    /// Resolves the tile source of `layer` for the requested matrix set,
    /// format and style.
    ///
    /// The layer and its matrix set link must exist. An unknown style falls
    /// back to the layer's default style and an unknown format to the first
    /// advertised one.
    pub fn source_options(
        &self,
        layer: &str,
        request: &SourceRequest,
    ) -> Result<TileSourceDescriptor, CapabilitiesError> {
        let wmts_layer = self
            .layer(layer)
            .ok_or_else(|| CapabilitiesError::LayerNotFound(layer.to_string()))?;

        if !wmts_layer
            .tile_matrix_set_links
            .iter()
            .any(|link| link == &request.matrix_set)
        {
            return Err(CapabilitiesError::MatrixSetNotLinked {
                layer: layer.to_string(),
                matrix_set: request.matrix_set.clone(),
            });
        }
        if self.tile_matrix_set(&request.matrix_set).is_none() {
            return Err(CapabilitiesError::TileMatrixSetNotFound(
                request.matrix_set.clone(),
            ));
        }

        let format = if wmts_layer.formats.iter().any(|f| f == &request.format) {
            request.format.clone()
        } else {
            let first = wmts_layer
                .formats
                .first()
                .ok_or_else(|| CapabilitiesError::NoFormat(layer.to_string()))?;
            log::warn!(
                "layer {} has no format {}, using {}",
                layer,
                request.format,
                first
            );
            first.clone()
        };

        let style = if wmts_layer
            .styles
            .iter()
            .any(|s| s.identifier == request.style)
        {
            request.style.clone()
        } else {
            let fallback = wmts_layer
                .styles
                .iter()
                .find(|s| s.is_default)
                .or_else(|| wmts_layer.styles.first())
                .map(|s| s.identifier.clone())
                .unwrap_or_else(|| request.style.clone());
            log::warn!(
                "layer {} has no style {}, using {}",
                layer,
                request.style,
                fallback
            );
            fallback
        };

        let template = wmts_layer
            .resource_urls
            .iter()
            .find(|r| r.resource_type == "tile" && r.format == format)
            .map(|r| r.template.clone());

        Ok(TileSourceDescriptor {
            layer: wmts_layer.identifier.clone(),
            title: wmts_layer.title.clone(),
            matrix_set: request.matrix_set.clone(),
            format,
            style,
            cross_origin: request.cross_origin.clone(),
            template,
            dimensions: wmts_layer
                .dimensions
                .iter()
                .map(|d| (d.identifier.clone(), d.default.clone()))
                .collect(),
        })
    }
}

/// Event driven parser state
#[derive(Default)]
struct CapabilitiesParser {
    path: Vec<String>,
    caps: Capabilities,
    layer: Option<WmtsLayer>,
    style: Option<WmtsStyle>,
    dimension: Option<Dimension>,
    set: Option<TileMatrixSet>,
    matrix: Option<TileMatrix>,
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>, CapabilitiesError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CapabilitiesError::Xml(e.to_string()))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn number<T: std::str::FromStr>(element: &str, text: &str) -> Result<T, CapabilitiesError> {
    text.trim()
        .parse()
        .map_err(|_| CapabilitiesError::Invalid(format!("<{}> is not a number: '{}'", element, text)))
}

impl CapabilitiesParser {
    fn run(mut self, xml: &str) -> Result<Capabilities, CapabilitiesError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut root_seen = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = local_name(&e);
                    if !root_seen {
                        Self::check_root(&name)?;
                        root_seen = true;
                    }
                    self.open(&name, &e)?;
                    self.path.push(name);
                }
                Ok(Event::Empty(e)) => {
                    let name = local_name(&e);
                    if !root_seen {
                        Self::check_root(&name)?;
                        root_seen = true;
                    }
                    self.open(&name, &e)?;
                    self.close(&name)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape()?;
                    self.text(&text)?;
                }
                Ok(Event::End(_)) => {
                    if let Some(name) = self.path.pop() {
                        self.close(&name)?;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CapabilitiesError::Xml(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !root_seen {
            return Err(CapabilitiesError::Xml("empty document".to_string()));
        }
        if !self.path.is_empty() {
            return Err(CapabilitiesError::Xml(format!(
                "unclosed element <{}>",
                self.path.join("/")
            )));
        }
        Ok(self.caps)
    }

    fn check_root(name: &str) -> Result<(), CapabilitiesError> {
        if name == "Capabilities" {
            Ok(())
        } else {
            Err(CapabilitiesError::NotCapabilities(name.to_string()))
        }
    }

    fn parent(&self) -> Option<&str> {
        self.path.last().map(|s| s.as_str())
    }

    fn open(&mut self, name: &str, e: &BytesStart) -> Result<(), CapabilitiesError> {
        match (self.parent(), name) {
            (Some("Contents"), "Layer") => self.layer = Some(WmtsLayer::default()),
            (Some("Contents"), "TileMatrixSet") => self.set = Some(TileMatrixSet::default()),
            (Some("TileMatrixSet"), "TileMatrix") if self.set.is_some() => {
                self.matrix = Some(TileMatrix::default())
            }
            (Some("Layer"), "Style") if self.layer.is_some() => {
                let is_default = attribute(e, "isDefault")?
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                self.style = Some(WmtsStyle {
                    identifier: String::new(),
                    is_default,
                });
            }
            (Some("Layer"), "Dimension") if self.layer.is_some() => {
                self.dimension = Some(Dimension::default())
            }
            (Some("Layer"), "ResourceURL") => {
                let resource = ResourceUrl {
                    format: attribute(e, "format")?.unwrap_or_default(),
                    resource_type: attribute(e, "resourceType")?.unwrap_or_default(),
                    template: attribute(e, "template")?.unwrap_or_default(),
                };
                if let Some(layer) = self.layer.as_mut() {
                    layer.resource_urls.push(resource);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), CapabilitiesError> {
        let depth = self.path.len();
        if depth < 2 {
            return Ok(());
        }
        let element = self.path[depth - 1].as_str();
        let parent = self.path[depth - 2].as_str();

        match parent {
            "ServiceIdentification" if element == "Title" => {
                self.caps.title = Some(text.to_string());
            }
            "Layer" => {
                if let Some(layer) = self.layer.as_mut() {
                    match element {
                        "Identifier" => layer.identifier = text.to_string(),
                        "Title" => layer.title = text.to_string(),
                        "Format" => layer.formats.push(text.to_string()),
                        _ => {}
                    }
                }
            }
            "Style" if element == "Identifier" => {
                if let Some(style) = self.style.as_mut() {
                    style.identifier = text.to_string();
                }
            }
            "Dimension" => {
                if let Some(dimension) = self.dimension.as_mut() {
                    match element {
                        "Identifier" => dimension.identifier = text.to_string(),
                        "Default" => dimension.default = text.to_string(),
                        "Value" => dimension.values.push(text.to_string()),
                        _ => {}
                    }
                }
            }
            "TileMatrixSetLink" if element == "TileMatrixSet" => {
                if let Some(layer) = self.layer.as_mut() {
                    layer.tile_matrix_set_links.push(text.to_string());
                }
            }
            "TileMatrixSet" if self.matrix.is_none() => {
                if let Some(set) = self.set.as_mut() {
                    match element {
                        "Identifier" => set.identifier = text.to_string(),
                        "SupportedCRS" => set.supported_crs = text.to_string(),
                        _ => {}
                    }
                }
            }
            "TileMatrix" => {
                if let Some(matrix) = self.matrix.as_mut() {
                    match element {
                        "Identifier" => matrix.identifier = text.to_string(),
                        "ScaleDenominator" => matrix.scale_denominator = number(element, text)?,
                        "TopLeftCorner" => {
                            let coords: Vec<f64> = text
                                .split_whitespace()
                                .map(|v| number(element, v))
                                .collect::<Result<_, _>>()?;
                            if coords.len() != 2 {
                                return Err(CapabilitiesError::Invalid(format!(
                                    "<TopLeftCorner> needs 2 values: '{}'",
                                    text
                                )));
                            }
                            matrix.top_left_corner = Point::new(coords[0], coords[1]);
                        }
                        "TileWidth" => matrix.tile_width = number(element, text)?,
                        "TileHeight" => matrix.tile_height = number(element, text)?,
                        "MatrixWidth" => matrix.matrix_width = number(element, text)?,
                        "MatrixHeight" => matrix.matrix_height = number(element, text)?,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), CapabilitiesError> {
        match name {
            "Style" => {
                if let (Some(style), Some(layer)) = (self.style.take(), self.layer.as_mut()) {
                    layer.styles.push(style);
                }
            }
            "Dimension" => {
                if let (Some(dimension), Some(layer)) =
                    (self.dimension.take(), self.layer.as_mut())
                {
                    layer.dimensions.push(dimension);
                }
            }
            "Layer" => {
                if let Some(layer) = self.layer.take() {
                    if layer.identifier.is_empty() {
                        return Err(CapabilitiesError::Invalid(
                            "layer without identifier".to_string(),
                        ));
                    }
                    self.caps.layers.push(layer);
                }
            }
            "TileMatrix" => {
                if let (Some(matrix), Some(set)) = (self.matrix.take(), self.set.as_mut()) {
                    if matrix.scale_denominator <= 0.0
                        || matrix.tile_width == 0
                        || matrix.tile_height == 0
                        || matrix.matrix_width == 0
                        || matrix.matrix_height == 0
                    {
                        return Err(CapabilitiesError::Invalid(format!(
                            "incomplete tile matrix '{}'",
                            matrix.identifier
                        )));
                    }
                    set.matrices.push(matrix);
                }
            }
            // Only a set being defined is open, links carry text only
            "TileMatrixSet" if self.matrix.is_none() && self.layer.is_none() => {
                if let Some(set) = self.set.take() {
                    if set.identifier.is_empty() {
                        return Err(CapabilitiesError::Invalid(
                            "tile matrix set without identifier".to_string(),
                        ));
                    }
                    self.caps.tile_matrix_sets.push(set);
                }
            }
            _ => {}
        }
        Ok(())
    }
}
