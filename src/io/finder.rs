//! Granule discovery against the NASA CMR catalog.
//!
//! The finder queries the CMR granule search endpoint for every granule
//! whose bounding box intersects the ROI, follows the paginated response,
//! and narrows the hits to the requested acquisition date window.

use crate::types::{GediError, GediResult, Product, Roi};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};

const CMR_SEARCH_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules.json";
const CMR_PROVIDER: &str = "LPDAAC_ECS";
/// Maximum page size the CMR API allows
const CMR_PAGE_SIZE: usize = 2000;

/// One downloadable granule as reported by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleLink {
    pub url: String,
    /// Download size in megabytes
    pub size_mb: f64,
}

/// Search window and product selection for the finder
#[derive(Debug, Clone)]
pub struct FinderParams {
    pub product: Product,
    pub version: String,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl FinderParams {
    /// Parse the `Y.m.d` date forms the pipeline accepts
    pub fn with_date_strings(
        product: Product,
        version: &str,
        date_start: &str,
        date_end: &str,
    ) -> GediResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y.%m.%d").map_err(|_| {
                GediError::Config(format!(
                    "date '{}' is not valid, the required format is Y.m.d (e.g. 2019.01.01)",
                    s
                ))
            })
        };
        Ok(Self {
            product,
            version: version.to_string(),
            date_start: parse(date_start)?,
            date_end: parse(date_end)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CmrResponse {
    feed: CmrFeed,
}

#[derive(Debug, Deserialize)]
struct CmrFeed {
    #[serde(default)]
    entry: Vec<CmrEntry>,
}

#[derive(Debug, Deserialize)]
struct CmrEntry {
    #[serde(default)]
    links: Vec<CmrLinkEntry>,
    /// Reported as a string by CMR, but tolerate a bare number too
    #[serde(default)]
    granule_size: Option<serde_json::Value>,
}

fn granule_size_mb(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[derive(Debug, Deserialize)]
struct CmrLinkEntry {
    href: String,
}

/// Finds granules over an ROI within a date window
pub struct GranuleFinder {
    params: FinderParams,
    bounding_box: String,
    client: reqwest::blocking::Client,
}

impl GranuleFinder {
    pub fn new(params: FinderParams, roi: &Roi) -> GediResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .user_agent("gedisub/0.2.0 (GEDI Subsetting Pipeline)")
            .build()
            .map_err(|e| GediError::Download(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            bounding_box: roi.cmr_bounding_box(),
            params,
            client,
        })
    }

    /// CMR concept id for a product and version
    fn concept_id(&self) -> GediResult<&'static str> {
        match (self.params.product, self.params.version.as_str()) {
            (Product::L1B, "002") => Ok("C1908344278-LPDAAC_ECS"),
            (Product::L2A, "002") => Ok("C1908348134-LPDAAC_ECS"),
            (Product::L2B, "002") => Ok("C1908350066-LPDAAC_ECS"),
            (product, version) => Err(GediError::Config(format!(
                "no CMR concept id known for {} version {}",
                product, version
            ))),
        }
    }

    /// Query every granule over the ROI, following CMR pagination
    fn find_all_granules(&self) -> GediResult<Vec<GranuleLink>> {
        let concept_id = self.concept_id()?;
        let mut links = Vec::new();
        let mut page = 1usize;

        loop {
            log::debug!("CMR query page {} for {}", page, concept_id);
            let page_size = CMR_PAGE_SIZE.to_string();
            let page_num = page.to_string();
            let response = self
                .client
                .get(CMR_SEARCH_URL)
                .query(&[
                    ("provider", CMR_PROVIDER),
                    ("concept_id", concept_id),
                    ("bounding_box", self.bounding_box.as_str()),
                    ("page_size", page_size.as_str()),
                    ("pageNum", page_num.as_str()),
                ])
                .send()
                .map_err(|e| GediError::Download(format!("CMR request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(GediError::Download(format!(
                    "CMR request failed with status {}",
                    response.status()
                )));
            }

            let body = response
                .text()
                .map_err(|e| GediError::Download(format!("failed to read CMR response: {}", e)))?;
            let parsed: CmrResponse = serde_json::from_str(&body)
                .map_err(|e| GediError::Download(format!("invalid CMR response: {}", e)))?;

            let page_len = parsed.feed.entry.len();
            for entry in parsed.feed.entry {
                let Some(link) = entry.links.first() else {
                    continue;
                };
                // First link is the Data Pool download; skip browse imagery
                if link.href.contains(".png") {
                    continue;
                }
                let size_mb = entry
                    .granule_size
                    .as_ref()
                    .map(granule_size_mb)
                    .unwrap_or(0.0);
                links.push(GranuleLink {
                    url: link.href.clone(),
                    size_mb,
                });
            }

            if page_len < CMR_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(links)
    }

    /// Acquisition date encoded in a Data Pool URL path segment
    fn granule_date(url: &str) -> Option<NaiveDate> {
        let re = regex::Regex::new(r"/(\d{4}\.\d{2}\.\d{2})/").ok()?;
        let cap = re.captures(url)?;
        NaiveDate::parse_from_str(cap.get(1)?.as_str(), "%Y.%m.%d").ok()
    }

    /// Narrow a date-ordered granule list to the `[start, end]` window.
    /// Scanning stops at the first granule past the end date.
    pub fn filter_by_dates(
        links: &[GranuleLink],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<GranuleLink> {
        let mut filtered = Vec::new();
        for link in links {
            let Some(date) = Self::granule_date(&link.url) else {
                continue;
            };
            if date > end {
                break;
            }
            if date >= start {
                filtered.push(link.clone());
            }
        }
        filtered
    }

    /// Total download size of a link list in gigabytes
    pub fn total_size_gb(links: &[GranuleLink]) -> f64 {
        links.iter().map(|l| l.size_mb).sum::<f64>() / 1000.0
    }

    /// Find every granule over the ROI inside the date window
    pub fn find(&self) -> GediResult<Vec<GranuleLink>> {
        let all = self.find_all_granules()?;
        log::info!(
            "Found {} granules over bbox [{}]",
            all.len(),
            self.bounding_box
        );

        let filtered = Self::filter_by_dates(&all, self.params.date_start, self.params.date_end);
        log::info!(
            "Between {} and {}, {} granules remain over bbox [{}]",
            self.params.date_start,
            self.params.date_end,
            filtered.len(),
            self.bounding_box
        );
        log::info!(
            "Estimated download size for selected granules: {:.2} GB",
            Self::total_size_gb(&filtered)
        );

        Ok(filtered)
    }

    /// Write the selected download URLs to a timestamped text file, one
    /// link per line
    pub fn save_link_list(&self, links: &[GranuleLink], dir: &Path) -> GediResult<PathBuf> {
        let filename = format!(
            "{}_{}_GranuleList_{}.txt",
            self.params.product,
            self.params.version,
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        );
        let path = dir.join(filename);
        let mut file = std::fs::File::create(&path)?;
        for link in links {
            writeln!(file, "{}", link.url)?;
        }
        log::info!("Saved links to file {}", path.display());
        Ok(path)
    }
}
