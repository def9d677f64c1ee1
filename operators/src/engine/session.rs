use snafu::{ResultExt, ensure};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, warn};
use zonalstats_datatypes::raster::{GridBoundingBox2D, ZoneGrid};

use super::{
    Afl, ArrayEngine, ArraySchema, Attribute, AttributeType, DimensionDescriptor, LoadFormat,
    QueryResult, ZONE_ATTRIBUTE,
};
use crate::error::{self, Error};
use crate::processing::serialize_values;
use crate::util::Result;

/// Where bulk-load files are written before the engine reads them.
#[derive(Debug)]
enum StagingArea {
    /// A directory the engine can read directly; files are referenced by their path.
    Shared(PathBuf),
    /// A private directory; files are uploaded to the engine before loading.
    Upload(TempDir),
}

impl StagingArea {
    fn directory(&self) -> &Path {
        match self {
            StagingArea::Shared(directory) => directory,
            StagingArea::Upload(directory) => directory.path(),
        }
    }
}

/// A named array inside the engine together with its declared schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteArrayHandle {
    name: String,
    schema: ArraySchema,
}

impl RemoteArrayHandle {
    pub fn new(name: impl Into<String>, schema: ArraySchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &ArraySchema {
        &self.schema
    }

    /// The operand referring to this array in queries.
    pub fn as_operand(&self) -> Afl {
        Afl::array(self.name.clone())
    }

    /// The inclusive `[row, col]` bounds of a 2-D array.
    pub fn bounds(&self) -> Result<GridBoundingBox2D> {
        self.schema
            .bounds_2d()
            .ok_or_else(|| self.dimensionality_error())
    }

    /// The names of the row and column dimension of a 2-D array.
    pub fn dimension_names(&self) -> Result<[&str; 2]> {
        match self.schema.dimensions.as_slice() {
            [rows, cols] => Ok([rows.name.as_str(), cols.name.as_str()]),
            _ => Err(self.dimensionality_error()),
        }
    }

    fn dimensionality_error(&self) -> Error {
        Error::UnsupportedArrayDimensionality {
            name: self.name.clone(),
            dimensions: self.schema.dimensions.len(),
            schema: self.schema.to_string(),
        }
    }

    /// The attribute holding the raster values, `attribute` or else the first attribute.
    pub fn value_attribute(&self, attribute: Option<&str>) -> Result<&Attribute> {
        let found = match attribute {
            Some(name) => self.schema.attribute(name),
            None => self.schema.attributes.first(),
        };

        found.ok_or_else(|| Error::MissingArrayAttribute {
            name: self.name.clone(),
            attribute: attribute.unwrap_or_default().to_string(),
        })
    }
}

/// A session on an [`ArrayEngine`] that manages the temporary arrays of a run.
///
/// Every array declared through the session is removed again by [`ArraySession::reap`].
#[derive(Debug)]
pub struct ArraySession<E> {
    engine: E,
    staging: StagingArea,
    declared: HashMap<String, ArraySchema>,
    temporaries: Vec<String>,
}

impl<E: ArrayEngine> ArraySession<E> {
    /// Creates a session staging files in `load_directory` or, if `None`, in a private
    /// directory whose files are uploaded.
    pub fn new(engine: E, load_directory: Option<PathBuf>) -> Result<Self> {
        let staging = match load_directory {
            Some(directory) => StagingArea::Shared(directory),
            None => StagingArea::Upload(TempDir::new().context(error::StagingDirectory)?),
        };

        Ok(Self {
            engine,
            staging,
            declared: HashMap::new(),
            temporaries: Vec::new(),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The bulk-load file for array `name`.
    pub fn staging_file(&self, name: &str) -> PathBuf {
        self.staging.directory().join(format!("{name}.scidb"))
    }

    /// The temporary arrays that have not been reaped yet.
    pub fn temporaries(&self) -> &[String] {
        &self.temporaries
    }

    /// Creates the array `name`.
    ///
    /// An existing array of that name is replaced if `recreate` is set and otherwise fails
    /// with `ArraySchemaConflict`. The array is removed at most once, so a second collision
    /// is fatal as well.
    pub async fn declare_array(
        &mut self,
        name: &str,
        schema: ArraySchema,
        recreate: bool,
    ) -> Result<()> {
        let mut removed = false;

        if self.engine.exists(name).await? {
            ensure!(recreate, error::ArraySchemaConflict { name });
            debug!("Replacing existing array {name}");
            self.engine.execute(&Afl::remove(name)).await?;
            removed = true;
        }

        let create = Afl::create_array(name, schema.clone());
        match self.engine.execute(&create).await {
            Ok(()) => (),
            Err(Error::ArrayExists { .. }) if recreate && !removed => {
                debug!("Array {name} appeared concurrently, replacing it");
                self.engine.execute(&Afl::remove(name)).await?;
                self.engine
                    .execute(&create)
                    .await
                    .map_err(|e| match e {
                        Error::ArrayExists { name } => Error::ArraySchemaConflict { name },
                        other => other,
                    })?;
            }
            Err(Error::ArrayExists { name }) => {
                return Err(Error::ArraySchemaConflict { name });
            }
            Err(e) => return Err(e),
        }

        self.declared.insert(name.to_string(), schema);
        if !self.temporaries.iter().any(|t| t == name) {
            self.temporaries.push(name.to_string());
        }

        Ok(())
    }

    /// Loads the records in `file` into the declared array `name` and returns the time it took,
    /// including a possible upload.
    pub async fn bulk_load(
        &mut self,
        name: &str,
        file: &Path,
        format: &LoadFormat,
    ) -> Result<Duration> {
        let schema = match self.declared.get(name) {
            Some(schema) => schema.clone(),
            None => self.engine.describe(name).await?,
        };

        ensure!(
            format.matches(&schema),
            error::LoadFormatMismatch {
                array: name,
                format: format.to_string(),
                diagnostic: format!("records do not fill the attributes of {schema}"),
            }
        );

        let start = Instant::now();

        let path = match &self.staging {
            StagingArea::Shared(_) => file.to_string_lossy().into_owned(),
            StagingArea::Upload(_) => {
                let bytes = tokio::fs::read(file)
                    .await
                    .context(error::StagingFile { path: file })?;
                self.engine.upload(bytes).await?
            }
        };

        let query = Afl::load(name, path, format.clone());
        match self.engine.execute(&query).await {
            Ok(()) => (),
            Err(Error::QueryExecution { diagnostic, .. }) => {
                return Err(Error::LoadFormatMismatch {
                    array: name.to_string(),
                    format: format.to_string(),
                    diagnostic,
                });
            }
            Err(e) => return Err(e),
        }

        let elapsed = start.elapsed();
        debug!("Loaded {} into {name} in {elapsed:?}", file.display());

        Ok(elapsed)
    }

    pub async fn submit_query(&mut self, query: &Afl) -> Result<(QueryResult, Duration)> {
        let start = Instant::now();
        let result = self.engine.fetch(query).await?;
        let elapsed = start.elapsed();

        debug!("Query {query} returned {} rows in {elapsed:?}", result.len());

        Ok((result, elapsed))
    }

    pub async fn execute(&mut self, query: &Afl) -> Result<Duration> {
        let start = Instant::now();
        self.engine.execute(query).await?;
        let elapsed = start.elapsed();

        debug!("Query {query} took {elapsed:?}");

        Ok(elapsed)
    }

    pub async fn describe(&mut self, name: &str) -> Result<RemoteArrayHandle> {
        let schema = self.engine.describe(name).await?;
        Ok(RemoteArrayHandle::new(name, schema))
    }

    /// Stores `grid` as the dense 2-D array `name` with the zone attribute, dimensions
    /// `dimension_names` and chunks of `chunk_length`. Returns the handle and the time of the transfer.
    pub async fn upload_grid(
        &mut self,
        name: &str,
        grid: &ZoneGrid,
        dimension_names: [&str; 2],
        chunk_length: i64,
    ) -> Result<(RemoteArrayHandle, Duration)> {
        ensure!(!grid.is_empty(), error::EmptyZoneGrid { name });

        let shape = grid.shape();
        let schema = ArraySchema::new(
            vec![(ZONE_ATTRIBUTE, AttributeType::from(grid.data_type())).into()],
            vec![
                DimensionDescriptor::new(
                    dimension_names[0],
                    0,
                    Some(shape.axis_size_y() as i64 - 1),
                    0,
                    Some(chunk_length),
                ),
                DimensionDescriptor::new(
                    dimension_names[1],
                    0,
                    Some(shape.axis_size_x() as i64 - 1),
                    0,
                    Some(chunk_length),
                ),
            ],
        );

        self.declare_array(name, schema.clone(), true).await?;

        let start = Instant::now();

        let bytes = serialize_values(grid)?;
        let path = match &self.staging {
            StagingArea::Shared(_) => {
                let file = self.staging_file(name);
                tokio::fs::write(&file, bytes)
                    .await
                    .context(error::StagingFile { path: &file })?;
                file.to_string_lossy().into_owned()
            }
            StagingArea::Upload(_) => self.engine.upload(bytes).await?,
        };

        let format = LoadFormat::new(vec![grid.data_type().into()]);
        self.engine
            .execute(&Afl::input(schema.clone(), path, format).store(name))
            .await?;

        let elapsed = start.elapsed();
        debug!(
            "Stored zone grid of {}×{} cells as {name} in {elapsed:?}",
            shape.axis_size_y(),
            shape.axis_size_x()
        );

        Ok((RemoteArrayHandle::new(name, schema), elapsed))
    }

    /// Removes all temporary arrays that still exist.
    ///
    /// Every array is attempted; the first failure is returned.
    pub async fn reap(&mut self) -> Result<()> {
        let mut first_error = None;

        for name in std::mem::take(&mut self.temporaries) {
            self.declared.remove(&name);

            let removal = match self.engine.exists(&name).await {
                Ok(true) => self.engine.execute(&Afl::remove(name.as_str())).await,
                Ok(false) => Ok(()),
                Err(e) => Err(e),
            };

            if let Err(e) = removal {
                warn!("Could not remove temporary array {name}: {e}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reaps the temporary arrays and ends the engine session.
    pub async fn release(mut self) -> Result<()> {
        let reaped = self.reap().await;
        let released = self.engine.release().await;
        reaped.and(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AttributeType;
    use crate::mock::InMemoryArrayEngine;
    use crate::processing::{binary_format, write_to_file};
    use crate::util::test::{engine_with_raster, quadrant_values, quadrant_zone_grid};
    use pretty_assertions::assert_eq;
    use zonalstats_datatypes::raster::{GridIdx2D, ZoneDataType};

    fn staging_schema() -> ArraySchema {
        ArraySchema::new(
            vec![
                ("y", AttributeType::Int64).into(),
                ("x", AttributeType::Int64).into(),
                ("id", AttributeType::Int16).into(),
            ],
            vec![DimensionDescriptor::new("xy", 0, None, 0, None)],
        )
    }

    #[tokio::test]
    async fn declare_array_creates_and_tracks() {
        let mut session = ArraySession::new(InMemoryArrayEngine::default(), None).unwrap();

        session
            .declare_array("zonal_polygon", staging_schema(), false)
            .await
            .unwrap();

        assert!(session.engine().contains_array("zonal_polygon"));
        assert_eq!(session.temporaries(), &["zonal_polygon".to_string()]);
        assert_eq!(session.engine().removals(), 0);
    }

    #[tokio::test]
    async fn declare_array_conflicts_without_recreate() {
        let mut session = ArraySession::new(InMemoryArrayEngine::default(), None).unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), false)
            .await
            .unwrap();

        let result = session
            .declare_array("zonal_polygon", staging_schema(), false)
            .await;

        assert!(matches!(result, Err(Error::ArraySchemaConflict { .. })));
        assert_eq!(session.engine().removals(), 0);
    }

    #[tokio::test]
    async fn declare_array_replaces_once() {
        let mut session = ArraySession::new(InMemoryArrayEngine::default(), None).unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();

        assert_eq!(session.engine().removals(), 1);
        assert_eq!(session.temporaries().len(), 1);
    }

    #[tokio::test]
    async fn second_collision_is_fatal() {
        let mut engine = InMemoryArrayEngine::default();
        engine.set_sticky_removals(true);
        let mut session = ArraySession::new(engine, None).unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();

        let result = session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await;

        assert!(matches!(result, Err(Error::ArraySchemaConflict { .. })));
        assert_eq!(session.engine().removals(), 1);
    }

    #[tokio::test]
    async fn bulk_load_uploads_records() {
        let grid = quadrant_zone_grid().unwrap();
        let mut session = ArraySession::new(InMemoryArrayEngine::default(), None).unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();

        let file = session.staging_file("zonal_polygon");
        write_to_file(&grid, GridIdx2D::new(10, 20), &file)
            .await
            .unwrap();
        session
            .bulk_load("zonal_polygon", &file, &binary_format(ZoneDataType::Int16))
            .await
            .unwrap();

        let engine = session.engine();
        assert_eq!(engine.uploads(), 1);
        assert_eq!(engine.cell_count("zonal_polygon"), Some(16));
        assert_eq!(
            engine.cell("zonal_polygon", &[0]),
            Some(&[10., 20., 1.][..])
        );
        assert_eq!(
            engine.cell("zonal_polygon", &[15]),
            Some(&[13., 23., 2.][..])
        );
    }

    #[tokio::test]
    async fn bulk_load_reads_shared_directory() {
        let directory = tempfile::tempdir().unwrap();
        let grid = quadrant_zone_grid().unwrap();
        let mut session = ArraySession::new(
            InMemoryArrayEngine::default(),
            Some(directory.path().to_path_buf()),
        )
        .unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();

        let file = session.staging_file("zonal_polygon");
        assert!(file.starts_with(directory.path()));
        write_to_file(&grid, GridIdx2D::new(0, 0), &file)
            .await
            .unwrap();
        session
            .bulk_load("zonal_polygon", &file, &binary_format(ZoneDataType::Int16))
            .await
            .unwrap();

        assert_eq!(session.engine().uploads(), 0);
        assert_eq!(session.engine().cell_count("zonal_polygon"), Some(16));
        let path = file.to_string_lossy().into_owned();
        assert!(session.engine().queries().iter().any(|q| q.contains(&path)));
    }

    #[tokio::test]
    async fn bulk_load_rejects_mismatching_format() {
        let grid = quadrant_zone_grid().unwrap();
        let mut session = ArraySession::new(InMemoryArrayEngine::default(), None).unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();
        let file = session.staging_file("zonal_polygon");
        write_to_file(&grid, GridIdx2D::new(0, 0), &file)
            .await
            .unwrap();

        let result = session
            .bulk_load("zonal_polygon", &file, &binary_format(ZoneDataType::Int32))
            .await;

        assert!(matches!(result, Err(Error::LoadFormatMismatch { .. })));
        assert_eq!(session.engine().cell_count("zonal_polygon"), Some(0));
    }

    #[tokio::test]
    async fn upload_grid_stores_dense_array() {
        let grid = quadrant_zone_grid().unwrap();
        let mut session = ArraySession::new(InMemoryArrayEngine::default(), None).unwrap();

        let (handle, _) = session
            .upload_grid("zonal_states", &grid, ["y", "x"], 4)
            .await
            .unwrap();

        assert_eq!(
            handle.schema().to_string(),
            "<id:int16> [y=0:3:0:4; x=0:3:0:4]"
        );
        let engine = session.engine();
        assert_eq!(engine.cell_count("zonal_states"), Some(16));
        assert_eq!(engine.cell("zonal_states", &[0, 0]), Some(&[1.][..]));
        assert_eq!(engine.cell("zonal_states", &[3, 3]), Some(&[2.][..]));
        assert_eq!(engine.cell("zonal_states", &[0, 3]), Some(&[-999.][..]));
    }

    #[tokio::test]
    async fn describe_returns_handle() {
        let engine = engine_with_raster("GLC2000", 4, 4, &quadrant_values());
        let mut session = ArraySession::new(engine, None).unwrap();

        let handle = session.describe("GLC2000").await.unwrap();

        assert_eq!(
            handle.bounds().unwrap(),
            GridBoundingBox2D::new([0, 0], [3, 3]).unwrap()
        );
        assert_eq!(handle.dimension_names().unwrap(), ["y", "x"]);
        assert_eq!(handle.value_attribute(None).unwrap().name, "value");
        assert!(handle.value_attribute(Some("band1")).is_err());
        assert!(matches!(
            session.describe("missing").await,
            Err(Error::UnknownArray { .. })
        ));
    }

    #[tokio::test]
    async fn reap_removes_temporaries_only() {
        let engine = engine_with_raster("GLC2000", 4, 4, &quadrant_values());
        let mut session = ArraySession::new(engine, None).unwrap();
        session
            .declare_array("zonal_polygon", staging_schema(), true)
            .await
            .unwrap();
        session
            .declare_array("zonal_zones", staging_schema(), true)
            .await
            .unwrap();
        session
            .engine_mut()
            .execute(&Afl::remove("zonal_zones"))
            .await
            .unwrap();

        session.reap().await.unwrap();

        assert!(session.temporaries().is_empty());
        assert!(!session.engine().contains_array("zonal_polygon"));
        assert!(session.engine().contains_array("GLC2000"));
    }
}
