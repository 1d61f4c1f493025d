//! Default science dataset selections per GEDI product.
//!
//! The catalog is immutable: it is built once at startup and passed by
//! reference into the subset processor. Caller-supplied extra variable
//! paths are always appended to the product defaults, never replacing them.

use crate::types::Product;

/// The eight canonical GEDI beams, in instrument order
pub const CANONICAL_BEAMS: [&str; 8] = [
    "BEAM0000", "BEAM0001", "BEAM0010", "BEAM0011", "BEAM0101", "BEAM0110", "BEAM1000", "BEAM1011",
];

/// Per-product default selection: the geolocation paths used by the
/// footprint locator plus the science dataset paths extracted per shot.
/// Paths are relative to the beam group.
#[derive(Debug, Clone)]
pub struct ProductDefaults {
    pub latitude: &'static str,
    pub longitude: &'static str,
    pub shot_number: &'static str,
    pub sds: &'static [&'static str],
}

const L1B_SDS: &[&str] = &[
    "geolocation/latitude_bin0",
    "geolocation/longitude_bin0",
    "channel",
    "shot_number",
    "rx_sample_start_index",
    "rxwaveform",
    "rx_sample_count",
    "stale_return_flag",
    "tx_sample_count",
    "txwaveform",
    "geolocation/degrade",
    "geolocation/delta_time",
    "geolocation/digital_elevation_model",
    "geolocation/solar_elevation",
    "geolocation/local_beam_elevation",
    "noise_mean_corrected",
    "geolocation/elevation_bin0",
    "geolocation/elevation_lastbin",
    "geolocation/surface_type",
    "geolocation/digital_elevation_model_srtm",
];

const L2A_SDS: &[&str] = &[
    "lat_lowestmode",
    "lon_lowestmode",
    "channel",
    "shot_number",
    "degrade_flag",
    "delta_time",
    "digital_elevation_model",
    "elev_lowestmode",
    "quality_flag",
    "rh",
    "sensitivity",
    "rx_cumulative",
    "digital_elevation_model_srtm",
    "elevation_bias_flag",
    "surface_flag",
    "num_detectedmodes",
    "selected_algorithm",
    "solar_elevation",
];

const L2B_SDS: &[&str] = &[
    "geolocation/lat_lowestmode",
    "geolocation/lon_lowestmode",
    "channel",
    "geolocation/shot_number",
    "cover",
    "cover_z",
    "fhd_normal",
    "pai",
    "pai_z",
    "rhov",
    "rhog",
    "pavd_z",
    "l2a_quality_flag",
    "l2b_quality_flag",
    "rh100",
    "sensitivity",
    "stale_return_flag",
    "surface_flag",
    "geolocation/degrade_flag",
    "geolocation/solar_elevation",
    "geolocation/delta_time",
    "geolocation/digital_elevation_model",
    "geolocation/elev_lowestmode",
    "pgap_theta",
];

const L4A_SDS: &[&str] = &[
    "lat_lowestmode",
    "lon_lowestmode",
    "channel",
    "shot_number",
    "degrade_flag",
    "delta_time",
    "digital_elevation_model",
    "elev_lowestmode",
    "l4_quality_flag",
    "agbd",
    "agbd_se",
    "agbd_t",
    "agbd_t_se",
    "sensitivity",
    "rx_cumulative",
    "digital_elevation_model_srtm",
    "elevation_bias_flag",
    "surface_flag",
    "num_detectedmodes",
    "selected_algorithm",
    "solar_elevation",
];

/// Immutable variable catalog shared by every subset operation
#[derive(Debug, Clone)]
pub struct VariableCatalog {
    l1b: ProductDefaults,
    l2a: ProductDefaults,
    l2b: ProductDefaults,
    l4a: ProductDefaults,
}

impl VariableCatalog {
    pub fn new() -> Self {
        Self {
            l1b: ProductDefaults {
                latitude: "geolocation/latitude_bin0",
                longitude: "geolocation/longitude_bin0",
                shot_number: "shot_number",
                sds: L1B_SDS,
            },
            l2a: ProductDefaults {
                latitude: "lat_lowestmode",
                longitude: "lon_lowestmode",
                shot_number: "shot_number",
                sds: L2A_SDS,
            },
            l2b: ProductDefaults {
                latitude: "geolocation/lat_lowestmode",
                longitude: "geolocation/lon_lowestmode",
                shot_number: "geolocation/shot_number",
                sds: L2B_SDS,
            },
            l4a: ProductDefaults {
                latitude: "lat_lowestmode",
                longitude: "lon_lowestmode",
                shot_number: "shot_number",
                sds: L4A_SDS,
            },
        }
    }

    pub fn defaults(&self, product: Product) -> &ProductDefaults {
        match product {
            Product::L1B => &self.l1b,
            Product::L2A => &self.l2a,
            Product::L2B => &self.l2b,
            Product::L4A => &self.l4a,
        }
    }

    /// Resolve the science dataset paths for a product: the built-in
    /// defaults with any caller extras (comma-separated) appended.
    /// Leading slashes on extras are tolerated; duplicates are kept out.
    pub fn resolve_sds(&self, product: Product, extra: Option<&str>) -> Vec<String> {
        let mut paths: Vec<String> = self
            .defaults(product)
            .sds
            .iter()
            .map(|p| p.to_string())
            .collect();
        if let Some(extra) = extra {
            for raw in extra.split(',') {
                let p = raw.trim().trim_start_matches('/');
                if !p.is_empty() && !paths.iter().any(|existing| existing == p) {
                    paths.push(p.to_string());
                }
            }
        }
        paths
    }

    /// Resolve the beam allowlist: a comma-separated caller selection, or
    /// all eight canonical beams when none is given
    pub fn resolve_beams(&self, beams: Option<&str>) -> Vec<String> {
        match beams {
            Some(list) => list
                .split(',')
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            None => CANONICAL_BEAMS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl Default for VariableCatalog {
    fn default() -> Self {
        Self::new()
    }
}
