use super::metadata::{Band, BoundingBox, CubeMetadata};
use super::vector::{MlModel, VectorCube};
use super::Callback;
use crate::arguments;
use crate::error::{GraphError, Result, VisitError};
use crate::graph::{Arguments, FlatGraph, PGNode, Parameter, Value};
use crate::resource::ProcessDefinition;
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;

/// A raster data cube: the node producing it plus optional metadata.
#[derive(Debug, Clone)]
pub struct DataCube {
    pub(super) node: Arc<PGNode>,
    pub(super) metadata: Option<CubeMetadata>,
    /// The node is a band reduction whose reducer can still be extended.
    pub(super) band_math: bool,
}

/// Builder for `load_collection`, the usual starting point of a cube.
pub struct LoadCollection {
    collection_id: String,
    spatial_extent: Option<BoundingBox>,
    temporal_extent: Option<(String, String)>,
    bands: Option<Vec<String>>,
    metadata: Option<CubeMetadata>,
}

impl LoadCollection {
    /// Restricts the load to a bounding box.
    pub fn spatial_extent(mut self, extent: BoundingBox) -> Self {
        self.spatial_extent = Some(extent);
        self
    }

    /// Restricts the load to `[start, end]`.
    pub fn temporal_extent(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.temporal_extent = Some((start.into(), end.into()));
        self
    }

    /// Loads only the named bands.
    pub fn bands<S: Into<String>>(mut self, bands: impl IntoIterator<Item = S>) -> Self {
        self.bands = Some(bands.into_iter().map(Into::into).collect());
        self
    }

    /// Band and dimension metadata of the collection.
    pub fn metadata(mut self, metadata: CubeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Fails when `bands` names a band the metadata does not know.
    pub fn build(self) -> Result<DataCube> {
        let mut arguments = arguments! {
            "id" => self.collection_id,
            "spatial_extent" => self.spatial_extent.as_ref().map(Value::from),
            "temporal_extent" => self.temporal_extent.map(|(start, end)| vec![start, end]),
        };
        let metadata = match (&self.bands, self.metadata) {
            (Some(bands), Some(metadata)) => Some(metadata.filter_bands(bands.as_slice())?),
            (Some(bands), None) => Some(CubeMetadata::with_bands(bands.iter().cloned())),
            (None, metadata) => metadata,
        };
        if let Some(bands) = self.bands {
            arguments.insert("bands".into(), Value::from(bands));
        }
        Ok(DataCube::new(
            PGNode::with_arguments("load_collection", arguments),
            metadata,
        ))
    }
}

impl DataCube {
    fn new(node: PGNode, metadata: Option<CubeMetadata>) -> Self {
        Self {
            node: Arc::new(node),
            metadata,
            band_math: false,
        }
    }

    /// Starts a `load_collection` builder.
    pub fn load_collection(collection_id: impl Into<String>) -> LoadCollection {
        LoadCollection {
            collection_id: collection_id.into(),
            spatial_extent: None,
            temporal_extent: None,
            bands: None,
            metadata: None,
        }
    }

    /// Wraps an existing node, without metadata.
    pub fn from_node(node: impl Into<Arc<PGNode>>) -> Self {
        Self {
            node: node.into(),
            metadata: None,
            band_math: false,
        }
    }

    /// Attaches metadata to the cube.
    pub fn with_metadata(mut self, metadata: CubeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Rebuilds a cube from a flat graph. See [`PGNode::from_flat_graph`].
    pub fn from_flat_graph(
        graph: &FlatGraph,
        parameters: Option<IndexMap<String, Json>>,
    ) -> std::result::Result<Self, VisitError> {
        Ok(Self::from_node(PGNode::from_flat_graph(graph, parameters)?))
    }

    /// Rebuilds a cube from a user-defined process, with its defaults applied.
    pub fn from_process_definition(
        definition: &ProcessDefinition,
        parameters: Option<IndexMap<String, Json>>,
    ) -> std::result::Result<Self, VisitError> {
        Ok(Self::from_node(definition.to_node(parameters)?))
    }

    /// The node producing this cube.
    pub fn node(&self) -> &Arc<PGNode> {
        &self.node
    }

    /// Metadata, when known.
    pub fn metadata(&self) -> Option<&CubeMetadata> {
        self.metadata.as_ref()
    }

    /// Whether arithmetic extends the band reducer.
    pub fn is_band_math(&self) -> bool {
        self.band_math && self.node.process_id() == "reduce_dimension"
    }

    /// New cube applying `process_id` with this cube as `data`.
    pub(super) fn chain(
        &self,
        process_id: &str,
        extra: Arguments,
        metadata: Option<CubeMetadata>,
    ) -> DataCube {
        let mut arguments = arguments! { "data" => &self.node };
        arguments.extend(extra);
        debug!(process_id, "adding cube process");
        DataCube::new(PGNode::with_arguments(process_id, arguments), metadata)
    }

    fn band_dimension(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.band_dimension.clone())
            .unwrap_or_else(|| "bands".into())
    }

    fn temporal_dimension(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.temporal_dimension.clone())
            .unwrap_or_else(|| "t".into())
    }

    /// Any process, with this cube as `data` unless `arguments` sets it.
    pub fn process(&self, process_id: &str, arguments: Arguments) -> DataCube {
        if arguments.contains_key("data") {
            DataCube::new(
                PGNode::with_arguments(process_id, arguments),
                self.metadata.clone(),
            )
        } else {
            self.chain(process_id, arguments, self.metadata.clone())
        }
    }

    /// `filter_bbox` with `extent`.
    pub fn filter_bbox(&self, extent: BoundingBox) -> DataCube {
        self.chain(
            "filter_bbox",
            arguments! { "extent" => extent },
            self.metadata.clone(),
        )
    }

    /// `filter_temporal` over `[start, end]`.
    pub fn filter_temporal(&self, start: &str, end: &str) -> DataCube {
        self.chain(
            "filter_temporal",
            arguments! { "extent" => vec![start, end] },
            self.metadata.clone(),
        )
    }

    /// Keeps the named bands. Fails when metadata is present and lacks one of them.
    pub fn filter_bands(&self, bands: &[&str]) -> Result<DataCube> {
        let metadata = self
            .metadata
            .as_ref()
            .map(|m| m.filter_bands(bands))
            .transpose()?;
        Ok(self.chain(
            "filter_bands",
            arguments! { "bands" => bands.to_vec() },
            metadata,
        ))
    }

    /// Selects a single band, entering band math mode.
    ///
    /// The result is a reduction of the band dimension whose reducer picks the
    /// band with `array_element`.
    pub fn band(&self, name: &str) -> Result<DataCube> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(GraphError::MissingDimension("band"))?;
        let index = metadata.band_index(name)?;
        let dimension = metadata.band_dimension_name()?;
        let reducer = PGNode::with_arguments(
            "array_element",
            arguments! { "data" => Parameter::data(), "index" => index },
        );
        debug!(band = name, index, "entering band math");
        Ok(self.reduce_dimension(dimension, reducer, None))
    }

    /// Reducing the band dimension enters band math mode: arithmetic on the
    /// result extends `reducer` instead of adding nodes around it.
    pub fn reduce_dimension(
        &self,
        dimension: &str,
        reducer: impl Into<Callback>,
        context: Option<Value>,
    ) -> DataCube {
        let reducer: Callback = reducer.into();
        let mut extra = arguments! {
            "reducer" => reducer.into_subgraph(&["data"]),
            "dimension" => dimension,
        };
        if let Some(context) = context {
            extra.insert("context".into(), context);
        }
        let metadata = self.metadata.as_ref().map(|m| m.reduce_dimension(dimension));
        let mut cube = self.chain("reduce_dimension", extra, metadata);
        cube.band_math = dimension == self.band_dimension();
        cube
    }

    /// Reduces the band dimension.
    pub fn reduce_bands(&self, reducer: impl Into<Callback>) -> DataCube {
        self.reduce_dimension(&self.band_dimension(), reducer, None)
    }

    /// Reduces the temporal dimension.
    pub fn reduce_temporal(&self, reducer: impl Into<Callback>) -> DataCube {
        self.reduce_dimension(&self.temporal_dimension(), reducer, None)
    }

    /// Applies a unary process to every pixel. The callback parameter is `x`.
    pub fn apply(&self, process: impl Into<Callback>) -> DataCube {
        let process: Callback = process.into();
        self.chain(
            "apply",
            arguments! { "process" => process.into_subgraph(&["x"]) },
            self.metadata.clone(),
        )
    }

    /// Applies `process` along `dimension`. The callback parameter is `data`.
    pub fn apply_dimension(
        &self,
        dimension: &str,
        process: impl Into<Callback>,
        target_dimension: Option<&str>,
    ) -> DataCube {
        let process: Callback = process.into();
        let mut extra = arguments! {
            "process" => process.into_subgraph(&["data"]),
            "dimension" => dimension,
        };
        if let Some(target) = target_dimension {
            extra.insert("target_dimension".into(), Value::from(target));
        }
        self.chain("apply_dimension", extra, self.metadata.clone())
    }

    /// Without `target_band` the band dimension is reduced away; with it the
    /// index is appended as a new band.
    pub fn ndvi(
        &self,
        nir: Option<&str>,
        red: Option<&str>,
        target_band: Option<&str>,
    ) -> Result<DataCube> {
        let mut extra = Arguments::new();
        if let Some(nir) = nir {
            extra.insert("nir".into(), Value::from(nir));
        }
        if let Some(red) = red {
            extra.insert("red".into(), Value::from(red));
        }
        let metadata = match (&self.metadata, target_band) {
            (Some(m), Some(band)) => Some(m.append_band(Band::new(band))?),
            (Some(m), None) => Some(m.reduce_dimension(&self.band_dimension())),
            (None, _) => None,
        };
        if let Some(band) = target_band {
            extra.insert("target_band".into(), Value::from(band));
        }
        Ok(self.chain("ndvi", extra, metadata))
    }

    /// Merges with `other`; `overlap_resolver` receives `x` and `y`.
    pub fn merge_cubes(&self, other: &DataCube, overlap_resolver: Option<Callback>) -> DataCube {
        let mut arguments = arguments! { "cube1" => self, "cube2" => other };
        if let Some(resolver) = overlap_resolver {
            arguments.insert(
                "overlap_resolver".into(),
                Value::ProcessGraph(resolver.into_subgraph(&["x", "y"])),
            );
        }
        let metadata = match (&self.metadata, &other.metadata) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        DataCube::new(PGNode::with_arguments("merge_cubes", arguments), metadata)
    }

    /// Masks pixels where `mask` is true, with `replacement` or null.
    pub fn mask(&self, mask: &DataCube, replacement: Option<Value>) -> DataCube {
        let mut extra = arguments! { "mask" => mask };
        if let Some(replacement) = replacement {
            extra.insert("replacement".into(), replacement);
        }
        self.chain("mask", extra, self.metadata.clone())
    }

    /// Rescales pixel values; inside band math the reducer is extended instead.
    pub fn linear_scale_range(
        &self,
        input_min: f64,
        input_max: f64,
        output_min: f64,
        output_max: f64,
    ) -> Result<DataCube> {
        self.unary(
            "linear_scale_range",
            "x",
            arguments! {
                "inputMin" => input_min,
                "inputMax" => input_max,
                "outputMin" => output_min,
                "outputMax" => output_max,
            },
        )
    }

    /// `resample_spatial` to `resolution` with `method`.
    pub fn resample_spatial(&self, resolution: f64, method: &str) -> DataCube {
        self.chain(
            "resample_spatial",
            arguments! { "resolution" => resolution, "method" => method },
            self.metadata.clone(),
        )
    }

    /// Aggregates over `geometries`, producing a vector cube.
    pub fn aggregate_spatial(
        &self,
        geometries: impl Into<Value>,
        reducer: impl Into<Callback>,
    ) -> VectorCube {
        let geometries: Value = geometries.into();
        let reducer: Callback = reducer.into();
        let node = PGNode::with_arguments(
            "aggregate_spatial",
            arguments! {
                "data" => &self.node,
                "geometries" => geometries,
                "reducer" => reducer.into_subgraph(&["data"]),
            },
        );
        VectorCube::from_node(node)
    }

    /// Applies a trained model along `dimension`; the model is passed as `context`.
    pub fn predict_random_forest(&self, model: &MlModel, dimension: &str) -> DataCube {
        let reducer = PGNode::with_arguments(
            "predict_random_forest",
            arguments! {
                "data" => Parameter::data(),
                "model" => Value::FromParameter("context".into()),
            },
        );
        self.reduce_dimension(dimension, reducer, Some(Value::from(model)))
    }

    /// Appends `save_result` in `format`.
    pub fn save_result(&self, format: &str, options: IndexMap<String, Json>) -> DataCube {
        let options: IndexMap<String, Value> =
            options.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
        self.chain(
            "save_result",
            arguments! { "format" => format, "options" => options },
            self.metadata.clone(),
        )
    }

    /// Flat graph of this cube.
    pub fn flat_graph(&self) -> Result<FlatGraph> {
        self.node.flat_graph()
    }

    /// The `{"process_graph": ...}` payload of this cube.
    pub fn to_json(&self) -> Result<Json> {
        self.node.to_process_graph_json()
    }
}
