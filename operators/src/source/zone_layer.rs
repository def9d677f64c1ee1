use gdal::Dataset;
use gdal::vector::{Defn, Geometry, LayerAccess};
use snafu::{ResultExt, ensure};
use std::path::{Path, PathBuf};
use tracing::warn;
use zonalstats_datatypes::primitives::BoundingBox2D;

use crate::error;
use crate::util::Result;
use crate::util::gdal::gdal_open_vector_dataset;

/// A polygon and the zone identifier it is burned with.
#[derive(Debug, Clone)]
pub struct Zone {
    pub geometry: Geometry,
    pub id: i32,
}

/// The first layer of a vector dataset holding the zone polygons.
pub struct ZoneLayer {
    path: PathBuf,
    dataset: Dataset,
}

impl ZoneLayer {
    /// Opens the dataset at `path` and checks that its first layer has features.
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = gdal_open_vector_dataset(path).context(error::ZoneLayerUnreadable { path })?;

        let feature_count = dataset
            .layer(0)
            .context(error::ZoneLayerUnreadable { path })?
            .feature_count();
        ensure!(feature_count > 0, error::EmptyZoneLayer { path });

        Ok(Self {
            path: path.to_owned(),
            dataset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The extent of all features in world coordinates.
    pub fn extent(&self) -> Result<BoundingBox2D> {
        let layer = self
            .dataset
            .layer(0)
            .context(error::ZoneLayerUnreadable { path: &self.path })?;
        let envelope = layer
            .get_extent()
            .context(error::ZoneLayerUnreadable { path: &self.path })?;

        Ok(BoundingBox2D::from_envelope(
            envelope.MinX,
            envelope.MaxX,
            envelope.MinY,
            envelope.MaxY,
        )?)
    }

    /// Reads the polygons together with their integer `id_field` attribute.
    ///
    /// Features without a geometry or with a NULL identifier cannot be burned and are skipped.
    pub fn zones(&self, id_field: &str) -> Result<Vec<Zone>> {
        let mut layer = self
            .dataset
            .layer(0)
            .context(error::ZoneLayerUnreadable { path: &self.path })?;

        let id_index = Defn::from_layer(&layer).field_index(id_field).map_err(|_| {
            error::Error::MissingZoneAttribute {
                path: self.path.clone(),
                field: id_field.to_owned(),
            }
        })?;

        let mut zones = Vec::new();
        for feature in layer.features() {
            let fid = feature.fid();

            let Some(geometry) = feature.geometry() else {
                warn!("Skipping feature {fid:?} of {}: no geometry", self.path.display());
                continue;
            };

            let id = feature
                .field_as_integer(id_index)
                .context(error::ZoneLayerUnreadable { path: &self.path })?;
            let Some(id) = id else {
                warn!(
                    "Skipping feature {fid:?} of {}: `{id_field}` is NULL",
                    self.path.display()
                );
                continue;
            };

            zones.push(Zone {
                geometry: geometry.clone(),
                id,
            });
        }

        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::{RectangleZone, write_rectangle_zones};

    fn two_zones(dir: &Path) -> PathBuf {
        let path = dir.join("zones.geojson");
        write_rectangle_zones(
            &path,
            "ID",
            &[
                RectangleZone {
                    id: 1,
                    min_x: 0.,
                    max_x: 2.,
                    min_y: 2.,
                    max_y: 4.,
                },
                RectangleZone {
                    id: 2,
                    min_x: 2.,
                    max_x: 4.,
                    min_y: 0.,
                    max_y: 2.,
                },
            ],
        )
        .unwrap();
        path
    }

    #[test]
    fn extent_covers_all_zones() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ZoneLayer::open(&two_zones(dir.path())).unwrap();

        assert_eq!(
            layer.extent().unwrap(),
            BoundingBox2D::from_envelope(0., 4., 0., 4.).unwrap()
        );
    }

    #[test]
    fn reads_zone_ids() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ZoneLayer::open(&two_zones(dir.path())).unwrap();

        let ids: Vec<i32> = layer.zones("ID").unwrap().iter().map(|z| z.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn missing_id_field() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ZoneLayer::open(&two_zones(dir.path())).unwrap();

        assert!(matches!(
            layer.zones("ZONE"),
            Err(error::Error::MissingZoneAttribute { field, .. }) if field == "ZONE"
        ));
    }

    #[test]
    fn empty_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.geojson");
        write_rectangle_zones(&path, "ID", &[]).unwrap();

        let result = ZoneLayer::open(&path);
        assert!(result.as_ref().is_err_and(error::Error::is_geometry_error));
    }

    #[test]
    fn unreadable_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.geojson");
        std::fs::write(&path, "this is not a vector file").unwrap();

        assert!(matches!(
            ZoneLayer::open(&path),
            Err(error::Error::ZoneLayerUnreadable { .. })
        ));
    }
}
