//! Core subsetting modules

pub mod extract;
pub mod finalize;
pub mod locator;
pub mod subset;
pub mod writer;

// Re-export main types
pub use extract::{classify, ShapeClass, VariableExtractor, VariableSpec, WaveformChannel, SURFACE_CLASSES};
pub use finalize::GeometryFinalizer;
pub use locator::FootprintLocator;
pub use subset::{SubsetParams, SubsetProcessor};
pub use writer::{subset_output_path, SubsetWriter};
