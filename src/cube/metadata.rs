use crate::error::{GraphError, Result};
use crate::graph::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One band of the band dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wavelength_um: Option<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            common_name: None,
            wavelength_um: None,
        }
    }

    /// Alternative name, such as `nir`, accepted by band lookups.
    pub fn with_common_name(mut self, common_name: impl Into<String>) -> Self {
        self.common_name = Some(common_name.into());
        self
    }

    pub fn with_wavelength(mut self, wavelength_um: f64) -> Self {
        self.wavelength_um = Some(wavelength_um);
        self
    }

    fn matches(&self, name: &str) -> bool {
        self.name == name || self.common_name.as_deref() == Some(name)
    }
}

/// Dimension and band information tracked alongside a cube's node.
///
/// Only used client side to resolve band names and dimension names; it never
/// ends up in the process graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CubeMetadata {
    pub bands: Vec<Band>,
    pub band_dimension: Option<String>,
    pub temporal_dimension: Option<String>,
    pub spatial_dimensions: Vec<String>,
}

impl CubeMetadata {
    /// Metadata of a collection with the usual `x`, `y`, `t` and `bands` dimensions.
    pub fn with_bands<I, S>(bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bands: bands.into_iter().map(Band::new).collect(),
            band_dimension: Some("bands".into()),
            temporal_dimension: Some("t".into()),
            spatial_dimensions: vec!["x".into(), "y".into()],
        }
    }

    /// Band names in cube order.
    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    /// Fails with `MissingDimension` when the cube has no band dimension.
    pub fn band_dimension_name(&self) -> Result<&str> {
        self.band_dimension
            .as_deref()
            .ok_or(GraphError::MissingDimension("band"))
    }

    pub fn temporal_dimension_name(&self) -> Result<&str> {
        self.temporal_dimension
            .as_deref()
            .ok_or(GraphError::MissingDimension("temporal"))
    }

    /// Position of a band, looked up by name or common name.
    pub fn band_index(&self, name: &str) -> Result<usize> {
        self.band_dimension_name()?;
        self.bands
            .iter()
            .position(|b| b.matches(name))
            .ok_or_else(|| GraphError::UnknownBand {
                band: name.to_string(),
                available: self.band_names(),
            })
    }

    /// Keeps the given bands, in the given order.
    pub fn filter_bands<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let bands = names
            .iter()
            .map(|name| {
                self.band_index(name.as_ref())
                    .map(|index| self.bands[index].clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            bands,
            ..self.clone()
        })
    }

    pub fn append_band(&self, band: Band) -> Result<Self> {
        self.band_dimension_name()?;
        let mut metadata = self.clone();
        metadata.bands.push(band);
        Ok(metadata)
    }

    /// Drops `dimension`; unknown names leave the metadata unchanged.
    pub fn reduce_dimension(&self, dimension: &str) -> Self {
        let mut metadata = self.clone();
        if metadata.band_dimension.as_deref() == Some(dimension) {
            metadata.band_dimension = None;
            metadata.bands.clear();
        } else if metadata.temporal_dimension.as_deref() == Some(dimension) {
            metadata.temporal_dimension = None;
        } else {
            metadata.spatial_dimensions.retain(|d| d != dimension);
        }
        metadata
    }

    /// Bands of `self` followed by the bands of `other` not already present.
    pub fn merge(&self, other: &CubeMetadata) -> Self {
        let mut metadata = self.clone();
        for band in &other.bands {
            if !metadata.bands.iter().any(|b| b.name == band.name) {
                metadata.bands.push(band.clone());
            }
        }
        metadata
    }
}

/// A spatial extent in the openEO `{west, south, east, north, crs}` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }
}

impl From<&BoundingBox> for Value {
    fn from(bbox: &BoundingBox) -> Self {
        let mut extent = IndexMap::new();
        extent.insert("west".to_string(), Value::Float(bbox.west));
        extent.insert("south".to_string(), Value::Float(bbox.south));
        extent.insert("east".to_string(), Value::Float(bbox.east));
        extent.insert("north".to_string(), Value::Float(bbox.north));
        if let Some(crs) = &bbox.crs {
            extent.insert("crs".to_string(), Value::String(crs.clone()));
        }
        Value::Object(extent)
    }
}

impl From<BoundingBox> for Value {
    fn from(bbox: BoundingBox) -> Self {
        Value::from(&bbox)
    }
}
