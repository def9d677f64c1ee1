//! Everything that talks to the array engine: schemas, queries, the engine trait and the session
//! that manages temporary arrays on top of it.

mod afl;
mod schema;
mod schema_parser;
mod session;
mod shim;

pub use afl::{
    Afl, Aggregate, AggregateFunction, ApplyBinding, ApplyExpression, COORDINATOR_INSTANCE,
    RangePredicate,
};
pub use schema::{
    ArraySchema, Attribute, AttributeType, DimensionDescriptor, LoadFormat, MAX_COORDINATE,
    MIN_COORDINATE,
};
pub use schema_parser::{PestError, parse_schema};
pub use session::{ArraySession, RemoteArrayHandle};
pub use shim::{ShimArrayEngine, ShimCredentials};

use async_trait::async_trait;

use crate::util::Result;

/// Name of the zone attribute in every array this crate creates.
pub const ZONE_ATTRIBUTE: &str = "id";

/// The tabular output of a query, with `NaN` for null cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A connection to an array database that executes AFL queries.
///
/// Implementations are used strictly sequentially by one [`ArraySession`].
#[async_trait]
pub trait ArrayEngine: Send + Sync {
    /// Executes a query and discards its output.
    ///
    /// Creating an array that already exists fails with `ArrayExists`, any other rejection with
    /// `QueryExecution`.
    async fn execute(&mut self, query: &Afl) -> Result<()>;

    /// Executes a query and returns its output.
    async fn fetch(&mut self, query: &Afl) -> Result<QueryResult>;

    /// The declared schema of the stored array `name`.
    async fn describe(&mut self, name: &str) -> Result<ArraySchema>;

    async fn exists(&mut self, name: &str) -> Result<bool>;

    /// Makes `bytes` readable by `load` and `input` and returns the path to use for them.
    async fn upload(&mut self, bytes: Vec<u8>) -> Result<String>;

    /// Ends the connection. The engine must not be used afterwards.
    async fn release(&mut self) -> Result<()>;
}
