//! A typed representation of the array functional language (AFL) queries this crate issues.
//!
//! Queries are built as a tree and only rendered to text by [`Display`](fmt::Display) when they are sent
//! to an engine.

use std::fmt;
use strum::Display;
use zonalstats_datatypes::raster::GridBoundingBox2D;

use super::{ArraySchema, LoadFormat};

/// The instance id that makes `load` and `input` read the file on the coordinator.
pub const COORDINATOR_INSTANCE: i64 = -2;

#[derive(Debug, Clone, PartialEq)]
pub enum Afl {
    /// A stored array used as an operand, rendered as its bare name.
    Array(String),
    Scan(String),
    CreateArray {
        name: String,
        schema: ArraySchema,
    },
    Remove(String),
    Show(String),
    ListArrays,
    Load {
        array: String,
        path: String,
        instance: i64,
        format: LoadFormat,
    },
    Input {
        schema: ArraySchema,
        path: String,
        instance: i64,
        format: LoadFormat,
    },
    Store {
        input: Box<Afl>,
        array: String,
    },
    Between {
        input: Box<Afl>,
        bounds: GridBoundingBox2D,
    },
    Subarray {
        input: Box<Afl>,
        bounds: GridBoundingBox2D,
    },
    Join {
        left: Box<Afl>,
        right: Box<Afl>,
    },
    EquiJoin {
        left: Box<Afl>,
        right: Box<Afl>,
        left_names: Vec<String>,
        right_names: Vec<String>,
    },
    Apply {
        input: Box<Afl>,
        bindings: Vec<ApplyBinding>,
    },
    Filter {
        input: Box<Afl>,
        predicates: Vec<RangePredicate>,
    },
    Redimension {
        input: Box<Afl>,
        target: String,
    },
    Insert {
        input: Box<Afl>,
        target: String,
    },
    GroupedAggregate {
        input: Box<Afl>,
        aggregates: Vec<Aggregate>,
        group_by: Vec<String>,
    },
}

impl Afl {
    pub fn array(name: impl Into<String>) -> Self {
        Afl::Array(name.into())
    }

    pub fn scan(name: impl Into<String>) -> Self {
        Afl::Scan(name.into())
    }

    pub fn create_array(name: impl Into<String>, schema: ArraySchema) -> Self {
        Afl::CreateArray {
            name: name.into(),
            schema,
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Afl::Remove(name.into())
    }

    pub fn show(name: impl Into<String>) -> Self {
        Afl::Show(name.into())
    }

    pub fn list_arrays() -> Self {
        Afl::ListArrays
    }

    pub fn load(array: impl Into<String>, path: impl Into<String>, format: LoadFormat) -> Self {
        Afl::Load {
            array: array.into(),
            path: path.into(),
            instance: COORDINATOR_INSTANCE,
            format,
        }
    }

    pub fn input(schema: ArraySchema, path: impl Into<String>, format: LoadFormat) -> Self {
        Afl::Input {
            schema,
            path: path.into(),
            instance: COORDINATOR_INSTANCE,
            format,
        }
    }

    #[must_use]
    pub fn store(self, array: impl Into<String>) -> Self {
        Afl::Store {
            input: Box::new(self),
            array: array.into(),
        }
    }

    #[must_use]
    pub fn between(self, bounds: GridBoundingBox2D) -> Self {
        Afl::Between {
            input: Box::new(self),
            bounds,
        }
    }

    #[must_use]
    pub fn subarray(self, bounds: GridBoundingBox2D) -> Self {
        Afl::Subarray {
            input: Box::new(self),
            bounds,
        }
    }

    #[must_use]
    pub fn join(self, right: Afl) -> Self {
        Afl::Join {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn equi_join(self, right: Afl, left_names: &[&str], right_names: &[&str]) -> Self {
        Afl::EquiJoin {
            left: Box::new(self),
            right: Box::new(right),
            left_names: left_names.iter().map(ToString::to_string).collect(),
            right_names: right_names.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn apply(self, bindings: Vec<ApplyBinding>) -> Self {
        Afl::Apply {
            input: Box::new(self),
            bindings,
        }
    }

    #[must_use]
    pub fn filter(self, predicates: Vec<RangePredicate>) -> Self {
        Afl::Filter {
            input: Box::new(self),
            predicates,
        }
    }

    #[must_use]
    pub fn redimension(self, target: impl Into<String>) -> Self {
        Afl::Redimension {
            input: Box::new(self),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn insert(self, target: impl Into<String>) -> Self {
        Afl::Insert {
            input: Box::new(self),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn grouped_aggregate(self, aggregates: Vec<Aggregate>, group_by: &[&str]) -> Self {
        Afl::GroupedAggregate {
            input: Box::new(self),
            aggregates,
            group_by: group_by.iter().map(ToString::to_string).collect(),
        }
    }
}

/// `name, expression` pair of an `apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyBinding {
    pub name: String,
    pub expression: ApplyExpression,
}

impl ApplyBinding {
    pub fn new(name: impl Into<String>, expression: ApplyExpression) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyExpression {
    /// Copies an attribute or dimension.
    Attribute(String),
    /// An attribute or dimension shifted by a constant.
    Offset { attribute: String, offset: i64 },
}

impl ApplyExpression {
    pub fn offset(attribute: impl Into<String>, offset: i64) -> Self {
        ApplyExpression::Offset {
            attribute: attribute.into(),
            offset,
        }
    }
}

impl fmt::Display for ApplyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyExpression::Attribute(attribute) => f.write_str(attribute),
            ApplyExpression::Offset { attribute, offset } if *offset < 0 => {
                write!(f, "{attribute}-{}", offset.unsigned_abs())
            }
            ApplyExpression::Offset { attribute, offset } => write!(f, "{attribute}+{offset}"),
        }
    }
}

/// `low <= name <= high`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePredicate {
    pub name: String,
    pub low: i64,
    pub high: i64,
}

impl RangePredicate {
    pub fn new(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    pub fn holds(&self, value: i64) -> bool {
        value >= self.low && value <= self.high
    }
}

impl fmt::Display for RangePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{name}>={} and {name}<={}",
            self.low,
            self.high,
            name = self.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AggregateFunction {
    Min,
    Max,
    Avg,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub attribute: String,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, attribute: impl Into<String>) -> Self {
        Self {
            function,
            attribute: attribute.into(),
        }
    }

    /// `min`, `max`, `avg` and `count` of one attribute.
    pub fn statistics_of(attribute: &str) -> Vec<Aggregate> {
        [
            AggregateFunction::Min,
            AggregateFunction::Max,
            AggregateFunction::Avg,
            AggregateFunction::Count,
        ]
        .into_iter()
        .map(|function| Aggregate::new(function, attribute))
        .collect()
    }

    /// The name of the result column, e.g. `value_min`.
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.attribute, self.function)
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function, self.attribute)
    }
}

fn quoted(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn write_bounds(f: &mut fmt::Formatter<'_>, bounds: &GridBoundingBox2D) -> fmt::Result {
    let min = bounds.min_index();
    let max = bounds.max_index();
    write!(f, "{}, {}, {}, {}", min.row(), min.col(), max.row(), max.col())
}

fn write_separated<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    separator: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Afl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Afl::Array(name) => f.write_str(name),
            Afl::Scan(name) => write!(f, "scan({name})"),
            Afl::CreateArray { name, schema } => write!(f, "create array {name} {schema}"),
            Afl::Remove(name) => write!(f, "remove({name})"),
            Afl::Show(name) => write!(f, "show({name})"),
            Afl::ListArrays => f.write_str("list('arrays')"),
            Afl::Load {
                array,
                path,
                instance,
                format,
            } => write!(
                f,
                "load({array}, {}, {instance}, {})",
                quoted(path),
                quoted(&format.to_string())
            ),
            Afl::Input {
                schema,
                path,
                instance,
                format,
            } => write!(
                f,
                "input({schema}, {}, {instance}, {})",
                quoted(path),
                quoted(&format.to_string())
            ),
            Afl::Store { input, array } => write!(f, "store({input}, {array})"),
            Afl::Between { input, bounds } => {
                write!(f, "between({input}, ")?;
                write_bounds(f, bounds)?;
                f.write_str(")")
            }
            Afl::Subarray { input, bounds } => {
                write!(f, "subarray({input}, ")?;
                write_bounds(f, bounds)?;
                f.write_str(")")
            }
            Afl::Join { left, right } => write!(f, "join({left}, {right})"),
            Afl::EquiJoin {
                left,
                right,
                left_names,
                right_names,
            } => write!(
                f,
                "equi_join({left}, {right}, 'left_names={}', 'right_names={}')",
                left_names.join(","),
                right_names.join(",")
            ),
            Afl::Apply { input, bindings } => {
                write!(f, "apply({input}")?;
                for binding in bindings {
                    write!(f, ", {}, {}", binding.name, binding.expression)?;
                }
                f.write_str(")")
            }
            Afl::Filter { input, predicates } => {
                write!(f, "filter({input}, ")?;
                write_separated(f, predicates, " and ")?;
                f.write_str(")")
            }
            Afl::Redimension { input, target } => write!(f, "redimension({input}, {target})"),
            Afl::Insert { input, target } => write!(f, "insert({input}, {target})"),
            Afl::GroupedAggregate {
                input,
                aggregates,
                group_by,
            } => {
                write!(f, "grouped_aggregate({input}, ")?;
                write_separated(f, aggregates, ", ")?;
                write!(f, ", {})", group_by.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AttributeType, DimensionDescriptor};
    use pretty_assertions::assert_eq;

    fn bounds(min: [i64; 2], max: [i64; 2]) -> GridBoundingBox2D {
        GridBoundingBox2D::new(min, max).unwrap()
    }

    #[test]
    fn direct_join_query() {
        let query = Afl::array("zonal_states")
            .subarray(bounds([0, 0], [1638, 5475]))
            .join(Afl::array("GLC2000").subarray(bounds([4548, 6187], [6186, 11662])))
            .grouped_aggregate(Aggregate::statistics_of("value"), &["id"]);

        assert_eq!(
            query.to_string(),
            "grouped_aggregate(join(subarray(zonal_states, 0, 0, 1638, 5475), \
             subarray(GLC2000, 4548, 6187, 6186, 11662)), \
             min(value), max(value), avg(value), count(value), id)"
        );
    }

    #[test]
    fn equi_join_query() {
        let query = Afl::array("GLC2000")
            .between(bounds([4548, 6187], [7332, 12662]))
            .equi_join(Afl::array("zonal_polygon"), &["x", "y"], &["x", "y"])
            .grouped_aggregate(Aggregate::statistics_of("value"), &["id"]);

        assert_eq!(
            query.to_string(),
            "grouped_aggregate(equi_join(between(GLC2000, 4548, 6187, 7332, 12662), zonal_polygon, \
             'left_names=x,y', 'right_names=x,y'), \
             min(value), max(value), avg(value), count(value), id)"
        );
    }

    #[test]
    fn redimension_insert_query() {
        let query = Afl::array("zonal_zones")
            .apply(vec![
                ApplyBinding::new("x", ApplyExpression::offset("x_local", 4548)),
                ApplyBinding::new("y", ApplyExpression::offset("y_local", -3)),
            ])
            .filter(vec![
                RangePredicate::new("x", 0, 40319),
                RangePredicate::new("y", 0, 16352),
            ])
            .redimension("zonal_mask")
            .insert("zonal_mask");

        assert_eq!(
            query.to_string(),
            "insert(redimension(filter(apply(zonal_zones, x, x_local+4548, y, y_local-3), \
             x>=0 and x<=40319 and y>=0 and y<=16352), zonal_mask), zonal_mask)"
        );
    }

    #[test]
    fn ddl_and_loading() {
        let schema = ArraySchema::new(
            vec![("id", AttributeType::Int16).into()],
            vec![
                DimensionDescriptor::new("y", 0, Some(3), 0, Some(4)),
                DimensionDescriptor::new("x", 0, Some(3), 0, Some(4)),
            ],
        );
        let format = LoadFormat::new(vec![AttributeType::Int16]);

        assert_eq!(
            Afl::create_array("zonal_mask", schema.clone()).to_string(),
            "create array zonal_mask <id:int16> [y=0:3:0:4; x=0:3:0:4]"
        );
        assert_eq!(
            Afl::input(schema, "/tmp/it's.bin", format.clone())
                .store("zonal_states")
                .to_string(),
            "store(input(<id:int16> [y=0:3:0:4; x=0:3:0:4], '/tmp/it\\'s.bin', -2, '(int16)'), zonal_states)"
        );
        assert_eq!(
            Afl::load("zonal_zones", "/data/zonal_zones.scidb", format).to_string(),
            "load(zonal_zones, '/data/zonal_zones.scidb', -2, '(int16)')"
        );
        assert_eq!(Afl::remove("a").to_string(), "remove(a)");
        assert_eq!(Afl::show("a").to_string(), "show(a)");
        assert_eq!(Afl::scan("a").to_string(), "scan(a)");
        assert_eq!(Afl::list_arrays().to_string(), "list('arrays')");
    }

    #[test]
    fn aggregate_output_names() {
        let names: Vec<String> = Aggregate::statistics_of("value")
            .iter()
            .map(Aggregate::output_name)
            .collect();
        assert_eq!(names, vec!["value_min", "value_max", "value_avg", "value_count"]);
    }
}
