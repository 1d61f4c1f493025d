use chrono::NaiveDate;
use geo::{coord, Contains, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

/// GEDI data products supported by the subsetter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    /// GEDI01_B: geolocated waveforms
    L1B,
    /// GEDI02_A: elevation and height metrics
    L2A,
    /// GEDI02_B: canopy cover and vertical profile metrics
    L2B,
    /// GEDI04_A: aboveground biomass density
    L4A,
}

impl Product {
    /// Official product short name as used in granule filenames and CMR
    pub fn short_name(&self) -> &'static str {
        match self {
            Product::L1B => "GEDI01_B",
            Product::L2A => "GEDI02_A",
            Product::L2B => "GEDI02_B",
            Product::L4A => "GEDI04_A",
        }
    }
}

impl FromStr for Product {
    type Err = GediError;

    fn from_str(s: &str) -> GediResult<Self> {
        // Accept both bare short names and versioned forms like "GEDI02_A.002"
        if s.contains("GEDI01_B") {
            Ok(Product::L1B)
        } else if s.contains("GEDI02_A") {
            Ok(Product::L2A)
        } else if s.contains("GEDI02_B") {
            Ok(Product::L2B)
        } else if s.contains("GEDI04_A") {
            Ok(Product::L4A)
        } else {
            Err(GediError::Config(format!(
                "unknown GEDI product: {} (expected one of GEDI01_B, GEDI02_A, GEDI02_B, GEDI04_A)",
                s
            )))
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Region of interest for subsetting.
///
/// Carries both the axis-aligned bounding envelope used by the coarse
/// footprint pass and the exact corner polygon used by the final clip.
/// For rectangular input the two coincide, but they are kept as separate
/// values so the coarse and exact passes stay distinct operations.
#[derive(Debug, Clone)]
pub struct Roi {
    ul_lat: f64,
    ul_lon: f64,
    lr_lat: f64,
    lr_lon: f64,
    envelope: Rect<f64>,
    polygon: Polygon<f64>,
}

impl Roi {
    /// Build an ROI from upper-left and lower-right corners in EPSG:4326
    pub fn new(ul_lat: f64, ul_lon: f64, lr_lat: f64, lr_lon: f64) -> GediResult<Self> {
        for v in [ul_lat, ul_lon, lr_lat, lr_lon] {
            if !v.is_finite() {
                return Err(GediError::Config(
                    "ROI coordinates must be finite numbers".to_string(),
                ));
            }
        }
        if !(-90.0..=90.0).contains(&ul_lat) || !(-90.0..=90.0).contains(&lr_lat) {
            return Err(GediError::Config(format!(
                "ROI latitudes out of range [-90, 90]: {}, {}",
                ul_lat, lr_lat
            )));
        }
        if !(-180.0..=180.0).contains(&ul_lon) || !(-180.0..=180.0).contains(&lr_lon) {
            return Err(GediError::Config(format!(
                "ROI longitudes out of range [-180, 180]: {}, {}",
                ul_lon, lr_lon
            )));
        }
        if ul_lat <= lr_lat || ul_lon >= lr_lon {
            return Err(GediError::Config(format!(
                "ROI corners must satisfy ul_lat > lr_lat and ul_lon < lr_lon, \
                 got {},{},{},{}",
                ul_lat, ul_lon, lr_lat, lr_lon
            )));
        }

        let envelope = Rect::new(
            coord! { x: ul_lon, y: lr_lat },
            coord! { x: lr_lon, y: ul_lat },
        );
        // Corner ring: UL, UR, LR, LL
        let polygon = Polygon::new(
            LineString::from(vec![
                (ul_lon, ul_lat),
                (lr_lon, ul_lat),
                (lr_lon, lr_lat),
                (ul_lon, lr_lat),
            ]),
            vec![],
        );

        Ok(Self {
            ul_lat,
            ul_lon,
            lr_lat,
            lr_lon,
            envelope,
            polygon,
        })
    }

    /// Parse an ROI from the `ul_lat,ul_lon,lr_lat,lr_lon` string form
    pub fn parse(s: &str) -> GediResult<Self> {
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 4 {
            return Err(GediError::Config(format!(
                "unable to read ROI '{}', the required format is ul_lat,ul_lon,lr_lat,lr_lon",
                s
            )));
        }
        let mut coords = [0.0f64; 4];
        for (i, p) in parts.iter().enumerate() {
            coords[i] = p
                .parse::<f64>()
                .map_err(|_| GediError::Config(format!("ROI coordinate '{}' is not a number", p)))?;
        }
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    /// Axis-aligned bounding envelope for the coarse pass
    pub fn envelope(&self) -> &Rect<f64> {
        &self.envelope
    }

    /// Exact corner polygon for the final clip
    pub fn exact_polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Coarse test: does the bounding envelope contain this point?
    pub fn envelope_contains(&self, lon: f64, lat: f64) -> bool {
        self.envelope.contains(&Point::new(lon, lat))
    }

    /// Exact test: does the true ROI polygon contain this point?
    pub fn polygon_contains(&self, lon: f64, lat: f64) -> bool {
        self.polygon.contains(&Point::new(lon, lat))
    }

    /// Bounding box in the `lon_min,lat_min,lon_max,lat_max` order the CMR
    /// search API expects
    pub fn cmr_bounding_box(&self) -> String {
        format!(
            "{},{},{},{}",
            self.ul_lon, self.lr_lat, self.lr_lon, self.ul_lat
        )
    }

    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.ul_lat, self.ul_lon, self.lr_lat, self.lr_lon)
    }
}

/// How the extractor maps the coarse pass onto array reads.
///
/// `RangeWindow` reads one contiguous `[start, end)` slice per beam and lets
/// the shot-number join discard the non-matching shots inside the window.
/// This assumes ground-track ordering: shots inside the ROI are not badly
/// interleaved with shots outside it along the index axis, so a slightly
/// wider read buys freedom from element-wise random access. `ExactShots`
/// additionally masks the extracted rows down to exactly the shots that
/// passed the coarse test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    RangeWindow,
    ExactShots,
}

/// Result of one per-granule subset operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetOutcome {
    /// Output file written with this many footprint rows
    Written { path: PathBuf, rows: usize },
    /// Output already existed; no extraction work was performed
    AlreadyExists { path: PathBuf },
    /// No footprint intersected the ROI; no file written
    NoIntersection,
    /// Rows survived the clip but none serialized as a valid geometry;
    /// no file left on disk
    NoValidGeometries,
}

/// A single extracted value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Float(f64),
    Int(i64),
    UInt(u64),
    Text(String),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::UInt(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Column storage for extracted variable data.
///
/// Variables keep their native numeric family; waveforms are carried as
/// delimited text, one sequence per shot.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Float(Vec<f64>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Text(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Int(v) => v.len(),
            ColumnValues::UInt(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<CellValue> {
        match self {
            ColumnValues::Float(v) => v.get(i).map(|&x| CellValue::Float(x)),
            ColumnValues::Int(v) => v.get(i).map(|&x| CellValue::Int(x)),
            ColumnValues::UInt(v) => v.get(i).map(|&x| CellValue::UInt(x)),
            ColumnValues::Text(v) => v.get(i).map(|x| CellValue::Text(x.clone())),
        }
    }

    /// Render the half-open element range `[start, end)` as one
    /// comma-delimited string
    pub fn format_run(&self, start: usize, end: usize) -> String {
        fn join<T: std::fmt::Display>(slice: &[T]) -> String {
            slice
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            ColumnValues::Float(v) => join(&v[start..end]),
            ColumnValues::Int(v) => join(&v[start..end]),
            ColumnValues::UInt(v) => join(&v[start..end]),
            ColumnValues::Text(v) => join(&v[start..end]),
        }
    }

    /// Keep only the positions where `mask` is true
    pub fn filter_mask(&self, mask: &[bool]) -> ColumnValues {
        fn apply<T: Clone>(v: &[T], mask: &[bool]) -> Vec<T> {
            v.iter()
                .zip(mask)
                .filter(|(_, &keep)| keep)
                .map(|(x, _)| x.clone())
                .collect()
        }
        match self {
            ColumnValues::Float(v) => ColumnValues::Float(apply(v, mask)),
            ColumnValues::Int(v) => ColumnValues::Int(apply(v, mask)),
            ColumnValues::UInt(v) => ColumnValues::UInt(apply(v, mask)),
            ColumnValues::Text(v) => ColumnValues::Text(apply(v, mask)),
        }
    }

    /// Field type this column maps to in the output layer
    pub fn field_kind(&self) -> FieldKind {
        match self {
            ColumnValues::Float(_) => FieldKind::Real,
            ColumnValues::Int(_) | ColumnValues::UInt(_) => FieldKind::Integer,
            ColumnValues::Text(_) => FieldKind::Text,
        }
    }
}

/// Output field families supported by the vector container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Real,
    Integer,
    Text,
}

/// One named extracted column, aligned to its beam's extraction window
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// One footprint that passed the coarse bounding-envelope test
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintRow {
    pub shot_number: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Local index along the beam's shot axis
    pub index: usize,
}

/// Coarse-pass result for one beam: the contiguous extraction window and
/// the footprints inside the ROI envelope
#[derive(Debug, Clone)]
pub struct BeamFootprints {
    pub beam: String,
    /// Half-open `[start, end)` window over the beam's shot axis enclosing
    /// every matching footprint
    pub window: Range<usize>,
    pub rows: Vec<FootprintRow>,
}

/// Extracted variable columns for one beam, row-aligned with the
/// shot-number key column
#[derive(Debug, Clone)]
pub struct BeamColumns {
    pub beam: String,
    pub shot_number: Vec<u64>,
    pub columns: Vec<Column>,
}

/// One row of the final merged table
#[derive(Debug, Clone)]
pub struct OutputRow {
    pub beam: String,
    pub shot_number: u64,
    pub longitude: f64,
    pub latitude: f64,
    /// Variable values parallel to the table schema; `None` marks a column
    /// the row's beam did not provide
    pub values: Vec<Option<CellValue>>,
}

/// The finished subset table: one row per surviving footprint
#[derive(Debug, Clone)]
pub struct OutputTable {
    /// Variable column names and types, in stable first-appearance order
    pub schema: Vec<(String, FieldKind)>,
    pub rows: Vec<OutputRow>,
    /// Acquisition date derived from the granule name, constant per granule
    pub date: NaiveDate,
}

/// Error types for the subsetting pipeline
#[derive(Debug, thiserror::Error)]
pub enum GediError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("download error: {0}")]
    Download(String),
}

/// Result type for subsetting operations
pub type GediResult<T> = Result<T, GediError>;
