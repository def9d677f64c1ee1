use gdal::errors::GdalError;
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use std::path::Path;

/// Opens the dataset with verbose errors, so GDAL's reason ends up in the log.
fn gdal_open_with_flags(path: &Path, open_flags: GdalOpenFlags) -> Result<Dataset, GdalError> {
    Dataset::open_ex(
        path,
        DatasetOptions {
            open_flags: open_flags | GdalOpenFlags::GDAL_OF_VERBOSE_ERROR,
            ..DatasetOptions::default()
        },
    )
}

/// Opens a vector dataset, i.e. GDAL will not try raster drivers.
pub fn gdal_open_vector_dataset(path: &Path) -> Result<Dataset, GdalError> {
    gdal_open_with_flags(path, GdalOpenFlags::GDAL_OF_VECTOR)
}

/// Opens a raster dataset, i.e. GDAL will not try vector drivers.
pub fn gdal_open_raster_dataset(path: &Path) -> Result<Dataset, GdalError> {
    gdal_open_with_flags(path, GdalOpenFlags::GDAL_OF_RASTER)
}
