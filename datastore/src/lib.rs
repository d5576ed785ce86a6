#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Bigtable shaped data store client.
//!
//! A [`DataStore`] executes single attempts; [`DataClient`] adds retries and
//! reports every operation to a latency tracer.

use async_trait::async_trait;
use auto_impl::auto_impl;

mod client;
mod error;
mod memory;
mod metrics;
mod models;

pub use client::{DataClient, RetrySettings};
pub use error::{Error, Result};
pub use memory::InMemoryStore;
pub use models::{Cell, Query, Row, RowMutation};

/// Operation names reported to tracers.
pub mod operations {
    /// Single row read.
    pub const READ_ROW: &str = "Bigtable.ReadRow";
    /// Multi row scan.
    pub const READ_ROWS: &str = "Bigtable.ReadRows";
    /// Single row write.
    pub const MUTATE_ROW: &str = "Bigtable.MutateRow";
    /// Table lookup.
    pub const GET_TABLE: &str = "BigtableAdmin.GetTable";
    /// Table creation.
    pub const CREATE_TABLE: &str = "BigtableAdmin.CreateTable";
}

/// A store executing one attempt per call. Retries are up to the caller.
#[async_trait]
#[auto_impl(&, Arc, Box)]
pub trait DataStore: Send + Sync {
    /// Reads row `key` of `table`.
    async fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>>;

    /// Reads the rows matched by `query` in key order.
    async fn read_rows(&self, query: &Query) -> Result<Vec<Row>>;

    /// Applies a single row mutation.
    async fn mutate_row(&self, mutation: &RowMutation) -> Result<()>;

    /// Whether `table` exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Creates `table` with the given column families.
    async fn create_table(&self, table: &str, families: &[String]) -> Result<()>;
}
