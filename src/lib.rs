//! gedisub: A Fast, Modular GEDI Granule Subsetting Pipeline
//!
//! This library clips GEDI lidar granules to a region of interest and
//! extracts a configurable set of science variables per footprint into an
//! analysis-ready GeoPackage, one file per granule. The surrounding
//! pipeline finds granules in the NASA CMR catalog, downloads them with
//! integrity checks, and subsets each one in turn.

pub mod catalog;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use catalog::{ProductDefaults, VariableCatalog, CANONICAL_BEAMS};
pub use crate::core::{
    FootprintLocator, GeometryFinalizer, ShapeClass, SubsetParams, SubsetProcessor, SubsetWriter,
    VariableExtractor,
};
pub use io::{FinderParams, GranuleDownloader, GranuleFinder, GranuleLink, GranuleReader};
pub use pipeline::{GediPipeline, PipelineParams, PipelineSummary};
pub use types::{
    FilterMode, GediError, GediResult, Product, Roi, SubsetOutcome,
};
