//! An [`ArrayEngine`] that evaluates queries over sparse arrays in memory.
//!
//! It is as strict as the real engine where the alignment strategies depend on it: windows
//! outside of an array's dimensions, attribute name collisions, redimension data collisions
//! and load formats that do not match the target all fail the query.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use zonalstats_datatypes::raster::{GridBoundingBox2D, GridIdx2D};
use zonalstats_datatypes::zonal::ZoneStatisticsAggregator;

use crate::engine::{
    Afl, Aggregate, AggregateFunction, ApplyBinding, ApplyExpression, ArrayEngine, ArraySchema,
    Attribute, AttributeType, DimensionDescriptor, LoadFormat, QueryResult, RangePredicate,
};
use crate::error::Error;
use crate::util::Result;

type Coordinates = Vec<i64>;

#[derive(Debug, Clone, PartialEq)]
struct MemArray {
    schema: ArraySchema,
    cells: BTreeMap<Coordinates, Vec<f64>>,
}

impl MemArray {
    fn empty(schema: ArraySchema) -> Self {
        Self {
            schema,
            cells: BTreeMap::new(),
        }
    }

    /// The value of attribute or dimension `name` in the cell at `coordinates`.
    fn resolver(&self, name: &str) -> Option<Field> {
        if let Some(i) = self.schema.attribute_index(name) {
            Some(Field::Attribute(i))
        } else {
            self.schema.dimension_index(name).map(Field::Dimension)
        }
    }

    fn field_type(&self, field: Field) -> AttributeType {
        match field {
            Field::Attribute(i) => self.schema.attributes[i].attribute_type,
            Field::Dimension(_) => AttributeType::Int64,
        }
    }

    fn bounds_2d(&self) -> Failed<GridBoundingBox2D> {
        self.schema.bounds_2d().ok_or_else(|| {
            Failure::Diagnostic(format!(
                "SCIDB_LE_WRONG_OPERATOR_ARGUMENTS_COUNT: expected a 2-D array, got {}",
                self.schema
            ))
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Attribute(usize),
    Dimension(usize),
}

impl Field {
    fn value(self, coordinates: &[i64], values: &[f64]) -> f64 {
        match self {
            Field::Attribute(i) => values[i],
            Field::Dimension(i) => coordinates[i] as f64,
        }
    }
}

#[derive(Debug)]
enum Failure {
    Diagnostic(String),
    UnknownArray(String),
    ArrayExists(String),
}

type Failed<T> = std::result::Result<T, Failure>;

fn fail<T>(diagnostic: impl Into<String>) -> Failed<T> {
    Err(Failure::Diagnostic(diagnostic.into()))
}

/// An in-memory array database for tests.
#[derive(Debug, Default)]
pub struct InMemoryArrayEngine {
    arrays: HashMap<String, MemArray>,
    files: HashMap<String, Vec<u8>>,
    queries: Vec<String>,
    removals: usize,
    sticky_removals: bool,
    failing_removals: bool,
    latency: Option<Duration>,
    released: Arc<AtomicBool>,
}

impl InMemoryArrayEngine {
    /// Stores a 2-D array `name` with a single attribute filled from `cells`.
    pub fn insert_raster(
        &mut self,
        name: &str,
        schema: ArraySchema,
        cells: impl IntoIterator<Item = (GridIdx2D, f64)>,
    ) {
        let cells = cells
            .into_iter()
            .map(|(idx, value)| (vec![idx.row(), idx.col()], vec![value]))
            .collect();
        self.arrays
            .insert(name.to_string(), MemArray { schema, cells });
    }

    /// Makes `remove` count but keep the array, so that recreating it collides again.
    pub fn set_sticky_removals(&mut self, sticky: bool) {
        self.sticky_removals = sticky;
    }

    /// Makes every `remove` fail while the array is kept.
    pub fn set_failing_removals(&mut self, failing: bool) {
        self.failing_removals = failing;
    }

    /// Delays every executed or fetched query by `latency`.
    pub fn set_query_latency(&mut self, latency: Duration) {
        self.latency = Some(latency);
    }

    pub fn contains_array(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    pub fn schema(&self, name: &str) -> Option<&ArraySchema> {
        self.arrays.get(name).map(|array| &array.schema)
    }

    pub fn cell(&self, name: &str, coordinates: &[i64]) -> Option<&[f64]> {
        self.arrays
            .get(name)?
            .cells
            .get(coordinates)
            .map(Vec::as_slice)
    }

    pub fn cell_count(&self, name: &str) -> Option<usize> {
        self.arrays.get(name).map(|array| array.cells.len())
    }

    /// The text of every executed query, in order.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn removals(&self) -> usize {
        self.removals
    }

    pub fn uploads(&self) -> usize {
        self.files.len()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// A flag that stays readable after the engine has been moved into a session.
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn stored(&self, name: &str) -> Failed<&MemArray> {
        self.arrays
            .get(name)
            .ok_or_else(|| Failure::UnknownArray(name.to_string()))
    }

    fn file(&self, path: &str) -> Failed<Vec<u8>> {
        if let Some(bytes) = self.files.get(path) {
            return Ok(bytes.clone());
        }
        std::fs::read(path).or_else(|e| fail(format!("SCIDB_LE_CANT_OPEN_FILE: {path}: {e}")))
    }

    fn run(&mut self, query: &Afl) -> Failed<Option<MemArray>> {
        match query {
            Afl::CreateArray { name, schema } => {
                if self.arrays.contains_key(name) {
                    return Err(Failure::ArrayExists(name.clone()));
                }
                self.arrays
                    .insert(name.clone(), MemArray::empty(schema.clone()));
                Ok(None)
            }
            Afl::Remove(name) => {
                self.stored(name)?;
                if self.failing_removals {
                    return fail(format!("array {name} is locked"));
                }
                self.removals += 1;
                if !self.sticky_removals {
                    self.arrays.remove(name);
                }
                Ok(None)
            }
            Afl::Show(name) => {
                self.stored(name)?;
                Ok(None)
            }
            Afl::ListArrays => Ok(None),
            Afl::Load {
                array,
                path,
                format,
                ..
            } => {
                let target = self.stored(array)?;
                let schema = target.schema.clone();
                let loaded = read_input(&schema, &self.file(path)?, format)?;
                self.write(array, loaded.cells);
                Ok(None)
            }
            Afl::Store { input, array } => {
                let result = self.evaluate(input)?;
                match self.arrays.get(array) {
                    Some(existing) => {
                        check_same_dimensions(&existing.schema, &result.schema)?;
                        self.write(array, result.cells);
                    }
                    None => {
                        self.arrays.insert(array.clone(), result);
                    }
                }
                Ok(None)
            }
            Afl::Insert { input, target } => {
                let result = self.evaluate(input)?;
                let existing = self.stored(target)?;
                check_same_dimensions(&existing.schema, &result.schema)?;
                if let Some(array) = self.arrays.get_mut(target) {
                    array.cells.extend(result.cells);
                }
                Ok(None)
            }
            other => self.evaluate(other).map(Some),
        }
    }

    fn write(&mut self, name: &str, cells: BTreeMap<Coordinates, Vec<f64>>) {
        if let Some(array) = self.arrays.get_mut(name) {
            array.cells = cells;
        }
    }

    fn evaluate(&self, query: &Afl) -> Failed<MemArray> {
        match query {
            Afl::Array(name) | Afl::Scan(name) => self.stored(name).cloned(),
            Afl::Input {
                schema,
                path,
                format,
                ..
            } => read_input(schema, &self.file(path)?, format),
            Afl::Between { input, bounds } => {
                let array = self.evaluate(input)?;
                window(array, bounds, false)
            }
            Afl::Subarray { input, bounds } => {
                let array = self.evaluate(input)?;
                window(array, bounds, true)
            }
            Afl::Join { left, right } => join(self.evaluate(left)?, &self.evaluate(right)?),
            Afl::EquiJoin {
                left,
                right,
                left_names,
                right_names,
            } => equi_join(
                &self.evaluate(left)?,
                &self.evaluate(right)?,
                left_names,
                right_names,
            ),
            Afl::Apply { input, bindings } => apply(self.evaluate(input)?, bindings),
            Afl::Filter { input, predicates } => filter(self.evaluate(input)?, predicates),
            Afl::Redimension { input, target } => {
                redimension(&self.evaluate(input)?, &self.stored(target)?.schema)
            }
            Afl::GroupedAggregate {
                input,
                aggregates,
                group_by,
            } => grouped_aggregate(&self.evaluate(input)?, aggregates, group_by),
            other => fail(format!(
                "SCIDB_LE_WRONG_OPERATOR_ARGUMENT: `{other}` has no array result"
            )),
        }
    }

    fn record(&mut self, query: &Afl) -> Result<Option<MemArray>> {
        self.queries.push(query.to_string());
        self.run(query).map_err(|failure| match failure {
            Failure::Diagnostic(diagnostic) => Error::QueryExecution {
                query: query.to_string(),
                diagnostic,
            },
            Failure::UnknownArray(name) => Error::UnknownArray { name },
            Failure::ArrayExists(name) => Error::ArrayExists { name },
        })
    }
}

fn check_same_dimensions(expected: &ArraySchema, actual: &ArraySchema) -> Failed<()> {
    let bounds = |schema: &ArraySchema| -> Vec<(i64, i64)> {
        schema
            .dimensions
            .iter()
            .map(|d| (d.low, d.high_or_max()))
            .collect()
    };

    if bounds(expected) == bounds(actual) {
        Ok(())
    } else {
        fail(format!(
            "SCIDB_LE_DIMENSIONS_DONT_MATCH: {expected} and {actual}"
        ))
    }
}

fn decode(data_type: AttributeType, bytes: &[u8]) -> Failed<f64> {
    fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
        let mut array = [0; N];
        array.copy_from_slice(&bytes[..N]);
        array
    }

    Ok(match data_type {
        AttributeType::Bool | AttributeType::Uint8 => f64::from(bytes[0]),
        AttributeType::Int8 => f64::from(i8::from_le_bytes(array(bytes))),
        AttributeType::Int16 => f64::from(i16::from_le_bytes(array(bytes))),
        AttributeType::Uint16 => f64::from(u16::from_le_bytes(array(bytes))),
        AttributeType::Int32 => f64::from(i32::from_le_bytes(array(bytes))),
        AttributeType::Uint32 => f64::from(u32::from_le_bytes(array(bytes))),
        AttributeType::Int64 | AttributeType::Datetime => {
            i64::from_le_bytes(array(bytes)) as f64
        }
        AttributeType::Uint64 => u64::from_le_bytes(array(bytes)) as f64,
        AttributeType::Float => f64::from(f32::from_le_bytes(array(bytes))),
        AttributeType::Double => f64::from_le_bytes(array(bytes)),
        AttributeType::String => return fail("SCIDB_LE_UNSUPPORTED_FORMAT: string"),
    })
}

/// Reads binary records into `schema`: sequentially along a single dimension or row-major
/// over the bounds of a 2-D array.
fn read_input(schema: &ArraySchema, bytes: &[u8], format: &LoadFormat) -> Failed<MemArray> {
    if !format.matches(schema) {
        return fail(format!(
            "SCIDB_LE_FILE_IMPORT_FAILED: format {format} does not match {schema}"
        ));
    }
    let Some(record_width) = format.record_width().filter(|w| *w > 0) else {
        return fail(format!("SCIDB_LE_UNSUPPORTED_FORMAT: {format}"));
    };
    if bytes.len() % record_width != 0 {
        return fail(format!(
            "SCIDB_LE_FILE_IMPORT_FAILED: {} bytes are no multiple of the record width {record_width}",
            bytes.len()
        ));
    }

    let mut records = Vec::with_capacity(bytes.len() / record_width);
    for record in bytes.chunks_exact(record_width) {
        let mut values = Vec::with_capacity(format.types.len());
        let mut offset = 0;
        for data_type in &format.types {
            let width = data_type.fixed_width().unwrap_or_default();
            values.push(decode(*data_type, &record[offset..offset + width])?);
            offset += width;
        }
        records.push(values);
    }

    let mut array = MemArray::empty(schema.clone());
    match schema.dimensions.as_slice() {
        [dimension] => {
            for (i, values) in records.into_iter().enumerate() {
                let coordinate = dimension.low + i as i64;
                if !dimension.contains(coordinate) {
                    return fail("SCIDB_LE_CHUNK_OUT_OF_BOUNDARIES: too many records");
                }
                array.cells.insert(vec![coordinate], values);
            }
        }
        [_, _] => {
            let bounds = array.bounds_2d()?;
            let width = bounds.shape().axis_size_x() as i64;
            if records.len() > bounds.number_of_elements() {
                return fail("SCIDB_LE_CHUNK_OUT_OF_BOUNDARIES: too many records");
            }
            let min = bounds.min_index();
            for (i, values) in records.into_iter().enumerate() {
                let i = i as i64;
                array
                    .cells
                    .insert(vec![min.row() + i / width, min.col() + i % width], values);
            }
        }
        _ => return fail("SCIDB_LE_NOT_IMPLEMENTED: input into more than two dimensions"),
    }

    Ok(array)
}

/// `between` or, with `shift`, `subarray` of a 2-D array.
fn window(array: MemArray, bounds: &GridBoundingBox2D, shift: bool) -> Failed<MemArray> {
    let array_bounds = array.bounds_2d()?;
    if !array_bounds.contains_box(bounds) {
        return fail(format!(
            "SCIDB_LE_ILLEGAL_OPERATION: window {bounds} is outside of {array_bounds}"
        ));
    }

    let min = bounds.min_index();
    let mut schema = array.schema;
    if shift {
        let shape = bounds.shape();
        let sizes = [shape.axis_size_y(), shape.axis_size_x()];
        for (dimension, size) in schema.dimensions.iter_mut().zip(sizes) {
            dimension.low = 0;
            dimension.high = Some(size as i64 - 1);
        }
    }

    let cells = array
        .cells
        .into_iter()
        .filter(|(coordinates, _)| bounds.contains(GridIdx2D::new(coordinates[0], coordinates[1])))
        .map(|(coordinates, values)| {
            if shift {
                (vec![coordinates[0] - min.row(), coordinates[1] - min.col()], values)
            } else {
                (coordinates, values)
            }
        })
        .collect();

    Ok(MemArray { schema, cells })
}

fn ensure_unique_names(schema: &ArraySchema) -> Failed<()> {
    let mut names = HashSet::new();
    for name in schema
        .dimensions
        .iter()
        .map(|d| &d.name)
        .chain(schema.attributes.iter().map(|a| &a.name))
    {
        if !names.insert(name) {
            return fail(format!("SCIDB_LE_DUPLICATE_ATTRIBUTE_NAME: {name}"));
        }
    }
    Ok(())
}

fn join(left: MemArray, right: &MemArray) -> Failed<MemArray> {
    check_same_dimensions(&left.schema, &right.schema)?;

    let mut attributes = left.schema.attributes.clone();
    attributes.extend(right.schema.attributes.iter().cloned());
    let schema = left.schema.with_attributes(attributes);
    ensure_unique_names(&schema)?;

    let cells = left
        .cells
        .into_iter()
        .filter_map(|(coordinates, mut values)| {
            let other = right.cells.get(&coordinates)?;
            values.extend_from_slice(other);
            Some((coordinates, values))
        })
        .collect();

    Ok(MemArray { schema, cells })
}

/// Joins on equal key values. The result is one dimensional with the keys first, then the
/// remaining attributes of the left and the right side.
fn equi_join(
    left: &MemArray,
    right: &MemArray,
    left_names: &[String],
    right_names: &[String],
) -> Failed<MemArray> {
    if left_names.is_empty() || left_names.len() != right_names.len() {
        return fail("SCIDB_LE_ILLEGAL_OPERATION: key lists of different length");
    }

    let resolve = |array: &MemArray, names: &[String]| -> Failed<Vec<Field>> {
        names
            .iter()
            .map(|name| {
                array.resolver(name).ok_or_else(|| {
                    Failure::Diagnostic(format!("SCIDB_LE_ATTRIBUTE_DOESNT_EXIST: {name}"))
                })
            })
            .collect()
    };
    let left_keys = resolve(left, left_names)?;
    let right_keys = resolve(right, right_names)?;

    let key_of = |keys: &[Field], coordinates: &[i64], values: &[f64]| -> Vec<i64> {
        keys.iter()
            .map(|key| key.value(coordinates, values) as i64)
            .collect()
    };
    let non_keys = |array: &MemArray, names: &[String]| -> Vec<usize> {
        (0..array.schema.attributes.len())
            .filter(|i| !names.contains(&array.schema.attributes[*i].name))
            .collect()
    };
    let left_rest = non_keys(left, left_names);
    let right_rest = non_keys(right, right_names);

    let mut attributes: Vec<Attribute> = left_names
        .iter()
        .zip(&left_keys)
        .map(|(name, key)| Attribute::new(name.clone(), left.field_type(*key)))
        .collect();
    attributes.extend(left_rest.iter().map(|i| left.schema.attributes[*i].clone()));
    attributes.extend(right_rest.iter().map(|i| right.schema.attributes[*i].clone()));

    let schema = ArraySchema::new(
        attributes,
        vec![DimensionDescriptor::new("instance_id", 0, None, 0, None)],
    );
    ensure_unique_names(&schema)?;

    let mut right_index: HashMap<Vec<i64>, Vec<&Vec<f64>>> = HashMap::new();
    for (coordinates, values) in &right.cells {
        right_index
            .entry(key_of(&right_keys, coordinates, values))
            .or_default()
            .push(values);
    }

    let mut cells = BTreeMap::new();
    for (coordinates, values) in &left.cells {
        let key = key_of(&left_keys, coordinates, values);
        let Some(matches) = right_index.get(&key) else {
            continue;
        };
        for right_values in matches {
            let mut row: Vec<f64> = key.iter().map(|k| *k as f64).collect();
            row.extend(left_rest.iter().map(|i| values[*i]));
            row.extend(right_rest.iter().map(|i| right_values[*i]));
            cells.insert(vec![cells.len() as i64], row);
        }
    }

    Ok(MemArray { schema, cells })
}

fn apply(array: MemArray, bindings: &[ApplyBinding]) -> Failed<MemArray> {
    let mut fields = Vec::with_capacity(bindings.len());
    let mut attributes = array.schema.attributes.clone();

    for binding in bindings {
        let (source, offset) = match &binding.expression {
            ApplyExpression::Attribute(attribute) => (attribute, 0),
            ApplyExpression::Offset { attribute, offset } => (attribute, *offset),
        };
        let Some(field) = array.resolver(source) else {
            return fail(format!("SCIDB_LE_ATTRIBUTE_DOESNT_EXIST: {source}"));
        };
        let attribute_type = match binding.expression {
            ApplyExpression::Attribute(_) => array.field_type(field),
            ApplyExpression::Offset { .. } => AttributeType::Int64,
        };
        attributes.push(Attribute::new(binding.name.clone(), attribute_type));
        fields.push((field, offset));
    }

    let schema = array.schema.with_attributes(attributes);
    ensure_unique_names(&schema)?;

    let cells = array
        .cells
        .into_iter()
        .map(|(coordinates, mut values)| {
            let applied: Vec<f64> = fields
                .iter()
                .map(|(field, offset)| field.value(&coordinates, &values) + *offset as f64)
                .collect();
            values.extend(applied);
            (coordinates, values)
        })
        .collect();

    Ok(MemArray { schema, cells })
}

fn filter(array: MemArray, predicates: &[RangePredicate]) -> Failed<MemArray> {
    let mut fields = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        let Some(field) = array.resolver(&predicate.name) else {
            return fail(format!(
                "SCIDB_LE_ATTRIBUTE_DOESNT_EXIST: {}",
                predicate.name
            ));
        };
        fields.push((field, predicate));
    }

    let MemArray { schema, cells } = array;
    let cells = cells
        .into_iter()
        .filter(|(coordinates, values)| {
            fields.iter().all(|(field, predicate)| {
                predicate.holds(field.value(coordinates, values) as i64)
            })
        })
        .collect();

    Ok(MemArray { schema, cells })
}

/// Moves attributes of `array` into the dimensions of `target` by name.
fn redimension(array: &MemArray, target: &ArraySchema) -> Failed<MemArray> {
    let field_of = |name: &str| {
        array.resolver(name).ok_or_else(|| {
            Failure::Diagnostic(format!("SCIDB_LE_ATTRIBUTE_DOESNT_EXIST: {name}"))
        })
    };
    let dimension_fields = target
        .dimensions
        .iter()
        .map(|d| field_of(&d.name))
        .collect::<Failed<Vec<_>>>()?;
    let attribute_fields = target
        .attributes
        .iter()
        .map(|a| field_of(&a.name))
        .collect::<Failed<Vec<_>>>()?;

    let mut result = MemArray::empty(target.clone());
    for (coordinates, values) in &array.cells {
        let position: Coordinates = dimension_fields
            .iter()
            .map(|field| field.value(coordinates, values) as i64)
            .collect();

        for (dimension, coordinate) in target.dimensions.iter().zip(&position) {
            if !dimension.contains(*coordinate) {
                return fail(format!(
                    "SCIDB_LE_CHUNK_OUT_OF_BOUNDARIES: {}={coordinate} outside of {dimension}",
                    dimension.name
                ));
            }
        }

        let cell: Vec<f64> = attribute_fields
            .iter()
            .map(|field| field.value(coordinates, values))
            .collect();
        if result.cells.insert(position, cell).is_some() {
            return fail("SCIDB_LE_DATA_COLLISION: two cells map to the same position");
        }
    }

    Ok(result)
}

fn grouped_aggregate(
    array: &MemArray,
    aggregates: &[Aggregate],
    group_by: &[String],
) -> Failed<MemArray> {
    let [group] = group_by else {
        return fail("SCIDB_LE_NOT_IMPLEMENTED: grouping by more than one field");
    };
    let Some(group_field) = array.resolver(group) else {
        return fail(format!("SCIDB_LE_ATTRIBUTE_DOESNT_EXIST: {group}"));
    };

    let mut statistics = Vec::with_capacity(aggregates.len());
    for aggregate in aggregates {
        let Some(field) = array.resolver(&aggregate.attribute) else {
            return fail(format!(
                "SCIDB_LE_ATTRIBUTE_DOESNT_EXIST: {}",
                aggregate.attribute
            ));
        };
        let mut aggregator = ZoneStatisticsAggregator::new();
        for (coordinates, values) in &array.cells {
            aggregator.add_value(
                group_field.value(coordinates, values) as i64,
                field.value(coordinates, values),
            );
        }
        statistics.push(aggregator.into_result());
    }

    let groups: Vec<i64> = statistics
        .iter()
        .flat_map(|result| result.zone_ids())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut attributes = vec![Attribute::new(group.clone(), array.field_type(group_field))];
    attributes.extend(aggregates.iter().map(|aggregate| {
        let attribute_type = match aggregate.function {
            AggregateFunction::Count => AttributeType::Uint64,
            _ => AttributeType::Double,
        };
        Attribute::new(aggregate.output_name(), attribute_type)
    }));
    let schema = ArraySchema::new(
        attributes,
        vec![DimensionDescriptor::new("value_no", 0, None, 0, None)],
    );
    ensure_unique_names(&schema)?;

    let mut cells = BTreeMap::new();
    for (i, group_value) in groups.into_iter().enumerate() {
        let mut row = vec![group_value as f64];
        for (aggregate, result) in aggregates.iter().zip(&statistics) {
            let value = result.get(group_value).map_or(f64::NAN, |s| match aggregate.function {
                AggregateFunction::Min => s.min,
                AggregateFunction::Max => s.max,
                AggregateFunction::Avg => s.mean,
                AggregateFunction::Count => s.count as f64,
            });
            row.push(value);
        }
        cells.insert(vec![i as i64], row);
    }

    Ok(MemArray { schema, cells })
}

#[async_trait]
impl ArrayEngine for InMemoryArrayEngine {
    async fn execute(&mut self, query: &Afl) -> Result<()> {
        self.wait().await;
        self.record(query).map(|_| ())
    }

    async fn fetch(&mut self, query: &Afl) -> Result<QueryResult> {
        self.wait().await;
        let Some(array) = self.record(query)? else {
            return Ok(QueryResult::default());
        };

        let columns = array
            .schema
            .dimensions
            .iter()
            .map(|d| d.name.clone())
            .chain(array.schema.attributes.iter().map(|a| a.name.clone()))
            .collect();
        let rows = array
            .cells
            .into_iter()
            .map(|(coordinates, values)| {
                coordinates
                    .into_iter()
                    .map(|c| c as f64)
                    .chain(values)
                    .collect()
            })
            .collect();

        Ok(QueryResult::new(columns, rows))
    }

    async fn describe(&mut self, name: &str) -> Result<ArraySchema> {
        self.record(&Afl::show(name))?;
        self.schema(name)
            .cloned()
            .ok_or_else(|| Error::UnknownArray {
                name: name.to_string(),
            })
    }

    async fn exists(&mut self, name: &str) -> Result<bool> {
        self.record(&Afl::list_arrays())?;
        Ok(self.contains_array(name))
    }

    async fn upload(&mut self, bytes: Vec<u8>) -> Result<String> {
        let path = format!("/upload/{}", self.files.len());
        self.files.insert(path.clone(), bytes);
        Ok(path)
    }

    async fn release(&mut self) -> Result<()> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}
