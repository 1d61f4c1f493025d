//! The per-granule subsetting engine.
//!
//! One subset operation runs open, locate, extract, finalize, write in
//! order. Per-beam locate and extract work is independent and fans out
//! across worker threads when the `parallel` feature is enabled; results
//! are combined only after every beam task completes. The operation is
//! idempotent: existing output short-circuits before the granule is even
//! opened.

use crate::catalog::VariableCatalog;
use crate::core::extract::VariableExtractor;
use crate::core::finalize::GeometryFinalizer;
use crate::core::locator::FootprintLocator;
use crate::core::writer::{subset_output_path, SubsetWriter};
use crate::io::GranuleReader;
use crate::types::{
    BeamColumns, BeamFootprints, FilterMode, GediResult, Product, Roi, SubsetOutcome,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Configuration for one subsetting engine instance
#[derive(Debug, Clone)]
pub struct SubsetParams {
    pub roi: Roi,
    pub product: Product,
    pub out_dir: PathBuf,
    /// Extra comma-separated science dataset paths, appended to the
    /// product defaults
    pub extra_sds: Option<String>,
    /// Comma-separated beam selection; all eight canonical beams when
    /// absent
    pub beams: Option<String>,
    pub filter_mode: FilterMode,
}

/// Clips granules to the ROI and extracts the selected variables per
/// footprint
pub struct SubsetProcessor<'a> {
    catalog: &'a VariableCatalog,
    params: SubsetParams,
}

impl<'a> SubsetProcessor<'a> {
    pub fn new(catalog: &'a VariableCatalog, params: SubsetParams) -> Self {
        Self { catalog, params }
    }

    pub fn params(&self) -> &SubsetParams {
        &self.params
    }

    /// Output path a granule's subset will be written to
    pub fn output_path_for(&self, granule_file_name: &str) -> PathBuf {
        subset_output_path(&self.params.out_dir, granule_file_name)
    }

    /// Subset one downloaded granule.
    ///
    /// Returns the outcome rather than failing on empty results: a granule
    /// with no intersecting footprints is a valid, fileless result.
    pub fn subset<P: AsRef<Path>>(&self, granule: P) -> GediResult<SubsetOutcome> {
        let granule = granule.as_ref();
        log::info!("Processing file: {}", granule.display());

        let file_name = granule
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out_path = self.output_path_for(&file_name);
        if out_path.exists() {
            log::info!(
                "File {} already subsetted, skipping",
                granule.display()
            );
            return Ok(SubsetOutcome::AlreadyExists { path: out_path });
        }

        let reader = GranuleReader::open(granule)?;
        let defaults = self.catalog.defaults(self.params.product);
        let sds_paths = self
            .catalog
            .resolve_sds(self.params.product, self.params.extra_sds.as_deref());
        let allowlist = self.catalog.resolve_beams(self.params.beams.as_deref());

        let beams = reader.beams(&allowlist)?;
        if beams.is_empty() {
            log::warn!("None of the requested beams are present in {}", file_name);
            return Ok(SubsetOutcome::NoIntersection);
        }

        log::info!("Selecting beams and clipping to ROI");
        let locator = FootprintLocator::new(&self.params.roi);

        #[cfg(feature = "parallel")]
        let located_results: Vec<GediResult<Option<BeamFootprints>>> = beams
            .par_iter()
            .map(|beam| locator.locate_beam(&reader, defaults, beam))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let located_results: Vec<GediResult<Option<BeamFootprints>>> = beams
            .iter()
            .map(|beam| locator.locate_beam(&reader, defaults, beam))
            .collect();

        let mut located: Vec<BeamFootprints> = Vec::new();
        for result in located_results {
            if let Some(fp) = result? {
                located.push(fp);
            }
        }
        if located.is_empty() {
            log::info!(
                "No intersecting shots were found between {} and the region of interest",
                file_name
            );
            return Ok(SubsetOutcome::NoIntersection);
        }

        log::info!("Intersecting shots found, selecting variables from subset");
        let extractor = VariableExtractor::new(&reader, defaults, &sds_paths);
        let mode = self.params.filter_mode;

        #[cfg(feature = "parallel")]
        let variable_results: Vec<GediResult<BeamColumns>> = located
            .par_iter()
            .map(|fp| extractor.extract_beam(fp, mode))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let variable_results: Vec<GediResult<BeamColumns>> = located
            .iter()
            .map(|fp| extractor.extract_beam(fp, mode))
            .collect();

        let mut variables: Vec<BeamColumns> = Vec::with_capacity(variable_results.len());
        for result in variable_results {
            variables.push(result?);
        }

        let date = reader.acquisition_date()?;
        let finalizer = GeometryFinalizer::new(&self.params.roi);
        let table = finalizer.finalize(&located, &variables, date)?;
        if table.rows.is_empty() {
            log::info!(
                "{} intersects the ROI envelope but no shots survive the exact clip",
                file_name
            );
            return Ok(SubsetOutcome::NoIntersection);
        }

        let written = SubsetWriter::write_gpkg(&table, &out_path)?;
        if written == 0 {
            log::warn!(
                "{} produced no valid geometries, output not written",
                file_name
            );
            return Ok(SubsetOutcome::NoValidGeometries);
        }

        log::info!("Saved {} footprints to {}", written, out_path.display());
        Ok(SubsetOutcome::Written {
            path: out_path,
            rows: written,
        })
    }
}
