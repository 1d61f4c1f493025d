//! Vector output for finished subset tables.
//!
//! One GeoPackage per granule, named after the granule with the container
//! suffix swapped in, holding a single point layer in EPSG:4326.

use crate::types::{CellValue, FieldKind, GediResult, OutputTable};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{
    FieldDefn, FieldValue, Geometry, LayerAccess, OGRFieldType, OGRwkbGeometryType,
};
use gdal::{DriverManager, LayerOptions};
use std::path::{Path, PathBuf};

const OUTPUT_DRIVER: &str = "GPKG";
const OUTPUT_EXTENSION: &str = "gpkg";
const LAYER_NAME: &str = "footprints";

/// Output path for a granule's subset: same base name, container suffix
pub fn subset_output_path(out_dir: &Path, granule_file_name: &str) -> PathBuf {
    let stem = granule_file_name
        .strip_suffix(".h5")
        .unwrap_or(granule_file_name);
    out_dir.join(format!("{}.{}", stem, OUTPUT_EXTENSION))
}

/// Writes output tables to single-layer GeoPackage files
pub struct SubsetWriter;

impl SubsetWriter {
    /// Persist a table to `path`, returning the number of features
    /// written.
    ///
    /// Rows whose geometry the driver rejects are dropped with a warning.
    /// When no feature serializes at all, the file is removed so a
    /// half-written container never survives.
    pub fn write_gpkg(table: &OutputTable, path: &Path) -> GediResult<usize> {
        log::debug!(
            "Writing {} rows and {} variable columns to {}",
            table.rows.len(),
            table.schema.len(),
            path.display()
        );

        let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER)?;
        let mut dataset = driver.create_vector_only(path)?;
        let srs = SpatialRef::from_epsg(4326)?;

        {
            let mut layer = dataset.create_layer(LayerOptions {
                name: LAYER_NAME,
                srs: Some(&srs),
                ty: OGRwkbGeometryType::wkbPoint,
                ..Default::default()
            })?;

            let mut field_specs: Vec<(String, OGRFieldType::Type)> = vec![
                ("BEAM".to_string(), OGRFieldType::OFTString),
                ("shot_number".to_string(), OGRFieldType::OFTInteger64),
                ("date".to_string(), OGRFieldType::OFTString),
            ];
            for (name, kind) in &table.schema {
                let ty = match kind {
                    FieldKind::Real => OGRFieldType::OFTReal,
                    FieldKind::Integer => OGRFieldType::OFTInteger64,
                    FieldKind::Text => OGRFieldType::OFTString,
                };
                field_specs.push((name.clone(), ty));
            }
            for (name, ty) in &field_specs {
                let defn = FieldDefn::new(name, *ty)?;
                defn.add_to_layer(&layer)?;
            }

            let date_str = table.date.format("%Y/%m/%d").to_string();
            let mut written = 0usize;
            for row in &table.rows {
                let mut names: Vec<&str> = Vec::with_capacity(3 + row.values.len());
                let mut values: Vec<FieldValue> = Vec::with_capacity(3 + row.values.len());
                names.push("BEAM");
                values.push(FieldValue::StringValue(row.beam.clone()));
                names.push("shot_number");
                values.push(FieldValue::Integer64Value(row.shot_number as i64));
                names.push("date");
                values.push(FieldValue::StringValue(date_str.clone()));

                for ((name, _), cell) in table.schema.iter().zip(row.values.iter()) {
                    let Some(cell) = cell else { continue };
                    names.push(name.as_str());
                    values.push(match cell {
                        CellValue::Float(v) => FieldValue::RealValue(*v),
                        CellValue::Int(v) => FieldValue::Integer64Value(*v),
                        CellValue::UInt(v) => FieldValue::Integer64Value(*v as i64),
                        CellValue::Text(v) => FieldValue::StringValue(v.clone()),
                    });
                }

                let mut geometry = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
                geometry.add_point_2d((row.longitude, row.latitude));
                match layer.create_feature_fields(geometry, &names, &values) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        log::warn!("Dropping footprint {}: {}", row.shot_number, e);
                    }
                }
            }

            if written > 0 {
                return Ok(written);
            }
        }

        // Every row was rejected; do not leave a geometryless file behind
        drop(dataset);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_output_path_swaps_suffix() {
        let path = subset_output_path(
            Path::new("/data/out"),
            "GEDI02_A_2019108002011_O01959_01_T03909_02_003_01_V002.h5",
        );
        assert_eq!(
            path,
            Path::new("/data/out/GEDI02_A_2019108002011_O01959_01_T03909_02_003_01_V002.gpkg")
        );
    }

    #[test]
    fn test_subset_output_path_without_h5_suffix() {
        let path = subset_output_path(Path::new("out"), "granule");
        assert_eq!(path, Path::new("out/granule.gpkg"));
    }
}
