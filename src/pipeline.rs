//! The find, download, subset pipeline.
//!
//! Granules are processed strictly one at a time: each granule is large
//! enough to saturate I/O and memory on its own, so the pipeline gains
//! nothing from overlapping them. A failure on one granule is logged and
//! skipped; the run continues with the next.

use crate::catalog::VariableCatalog;
use crate::core::subset::{SubsetParams, SubsetProcessor};
use crate::core::writer::subset_output_path;
use crate::io::{FinderParams, GranuleDownloader, GranuleFinder};
use crate::types::{FilterMode, GediResult, Roi, SubsetOutcome};
use std::path::PathBuf;

const DOWNLOAD_RETRIES: usize = 3;

/// Configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub out_dir: PathBuf,
    pub finder: FinderParams,
    pub roi: Roi,
    pub extra_sds: Option<String>,
    pub beams: Option<String>,
    pub filter_mode: FilterMode,
    /// Keep the raw granules after subsetting instead of deleting them
    pub keep_granules: bool,
    /// Save the found download links to a text file in the output
    /// directory
    pub save_link_list: bool,
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub found: usize,
    pub downloaded: usize,
    pub subsetted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs find, download, subset for every granule over the ROI
pub struct GediPipeline<'a> {
    catalog: &'a VariableCatalog,
    params: PipelineParams,
}

impl<'a> GediPipeline<'a> {
    pub fn new(catalog: &'a VariableCatalog, params: PipelineParams) -> GediResult<Self> {
        std::fs::create_dir_all(&params.out_dir)?;
        Ok(Self { catalog, params })
    }

    pub fn run(&self) -> GediResult<PipelineSummary> {
        let finder = GranuleFinder::new(self.params.finder.clone(), &self.params.roi)?;
        let links = finder.find()?;
        if self.params.save_link_list {
            finder.save_link_list(&links, &self.params.out_dir)?;
        }

        let downloader = GranuleDownloader::from_env(&self.params.out_dir)?;
        let subsetter = SubsetProcessor::new(
            self.catalog,
            SubsetParams {
                roi: self.params.roi.clone(),
                product: self.params.finder.product,
                out_dir: self.params.out_dir.clone(),
                extra_sds: self.params.extra_sds.clone(),
                beams: self.params.beams.clone(),
                filter_mode: self.params.filter_mode,
            },
        );

        let mut summary = PipelineSummary {
            found: links.len(),
            ..Default::default()
        };

        for link in &links {
            let granule_name = link.url.rsplit('/').next().unwrap_or_default();

            // Cheap idempotence check before spending a download on it
            let out_path = subset_output_path(&self.params.out_dir, granule_name);
            if out_path.exists() {
                log::info!("Skipping granule {} as it is already subsetted", granule_name);
                summary.skipped += 1;
                continue;
            }

            let Some(granule_path) = self.download_with_retries(&downloader, &link.url) else {
                summary.failed += 1;
                continue;
            };
            summary.downloaded += 1;

            match subsetter.subset(&granule_path) {
                Ok(SubsetOutcome::Written { rows, .. }) => {
                    log::info!("Subsetted {} with {} footprints", granule_name, rows);
                    summary.subsetted += 1;
                }
                Ok(SubsetOutcome::AlreadyExists { .. }) => {
                    summary.skipped += 1;
                }
                Ok(SubsetOutcome::NoIntersection) | Ok(SubsetOutcome::NoValidGeometries) => {
                    summary.skipped += 1;
                }
                Err(e) => {
                    log::error!("Subset of {} failed: {}", granule_name, e);
                    summary.failed += 1;
                }
            }

            // Keep the subset, drop the raw granule to save space
            if !self.params.keep_granules {
                if let Err(e) = std::fs::remove_file(&granule_path) {
                    log::warn!("Could not remove granule {}: {}", granule_path.display(), e);
                }
            }
        }

        log::info!(
            "Pipeline run complete: {} found, {} downloaded, {} subsetted, {} skipped, {} failed",
            summary.found,
            summary.downloaded,
            summary.subsetted,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    fn download_with_retries(
        &self,
        downloader: &GranuleDownloader,
        url: &str,
    ) -> Option<PathBuf> {
        for attempt in 1..=DOWNLOAD_RETRIES {
            match downloader.download_granule(url) {
                Ok(path) => return Some(path),
                Err(e) => {
                    log::warn!(
                        "Download attempt {} of {} for {} failed: {}",
                        attempt,
                        DOWNLOAD_RETRIES,
                        url,
                        e
                    );
                    if attempt < DOWNLOAD_RETRIES {
                        std::thread::sleep(std::time::Duration::from_secs(2));
                    }
                }
            }
        }
        log::error!(
            "Download failed for {} after {} attempts, skipping granule",
            url,
            DOWNLOAD_RETRIES
        );
        None
    }
}
