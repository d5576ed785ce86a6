//! Traced, retrying client on top of a [`DataStore`].

use std::{future::Future, sync::Arc, time::Duration};

use tracer::{ApiTracerFactory, NoopTracerFactory, StatusCode, TracedResponse};

use crate::{
    metrics::DATASTORE_METRICS,
    models::{Query, Row, RowMutation},
    operations, DataStore, Result,
};

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Attempts per operation, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every following one.
    pub initial_backoff: Duration,
    /// Upper bound of the delay.
    pub max_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// Client reporting every operation and its attempts to a tracer.
///
/// Data operations use the tracers of [`DataClient::new`], table administration the
/// ones set by [`DataClient::with_admin_tracers`].
pub struct DataClient<S> {
    store: S,
    tracers: Arc<dyn ApiTracerFactory>,
    admin_tracers: Arc<dyn ApiTracerFactory>,
    retry: RetrySettings,
}

impl<S: DataStore> DataClient<S> {
    /// Client over `store`. Admin operations are traced by `tracers` as well until
    /// [`DataClient::with_admin_tracers`] is called.
    pub fn new(store: S, tracers: Arc<dyn ApiTracerFactory>) -> Self {
        Self {
            store,
            admin_tracers: Arc::clone(&tracers),
            tracers,
            retry: RetrySettings::default(),
        }
    }

    /// Client without latency tracing.
    pub fn untraced(store: S) -> Self {
        Self::new(store, Arc::new(NoopTracerFactory))
    }

    /// Traces admin operations with `tracers`.
    pub fn with_admin_tracers(mut self, tracers: Arc<dyn ApiTracerFactory>) -> Self {
        self.admin_tracers = tracers;
        self
    }

    /// Overrides the retry policy.
    pub fn with_retry_settings(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads a single row; `None` if the table has no such row.
    pub async fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>> {
        self.run(self.tracers.as_ref(), operations::READ_ROW, || {
            self.store.read_row(table, key)
        })
        .await
    }

    /// Reads the rows matched by `query`.
    pub async fn read_rows(&self, query: &Query) -> Result<Vec<Row>> {
        self.run(self.tracers.as_ref(), operations::READ_ROWS, || {
            self.store.read_rows(query)
        })
        .await
    }

    /// Applies `mutation`.
    pub async fn mutate_row(&self, mutation: &RowMutation) -> Result<()> {
        self.run(self.tracers.as_ref(), operations::MUTATE_ROW, || {
            self.store.mutate_row(mutation)
        })
        .await
    }

    /// Whether `table` exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.run(self.admin_tracers.as_ref(), operations::GET_TABLE, || {
            self.store.table_exists(table)
        })
        .await
    }

    /// Creates `table` with the column `families`.
    pub async fn create_table(&self, table: &str, families: &[String]) -> Result<()> {
        self.run(self.admin_tracers.as_ref(), operations::CREATE_TABLE, || {
            self.store.create_table(table, families)
        })
        .await
    }

    async fn run<T, F, Fut>(
        &self,
        tracers: &dyn ApiTracerFactory,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T>
    where
        T: TracedResponse,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // dropping this future drops the tracer, which closes it as cancelled
        let mut tracer = tracers.new_tracer(operation);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.initial_backoff;
        let mut attempt_number = 1;

        loop {
            tracer.attempt_started();

            let err = match attempt().await {
                Ok(response) => {
                    tracer.attempt_ended(StatusCode::Ok);
                    tracer.operation_succeeded(&response);
                    tracer.operation_ended(StatusCode::Ok);
                    return Ok(response);
                }
                Err(err) => err,
            };
            tracer.attempt_ended(err.status());

            if !err.is_retryable() {
                tracer.operation_ended(err.status());
                return Err(err);
            }

            if attempt_number >= max_attempts {
                DATASTORE_METRICS.retries_exhausted[&operation].inc();
                vlog::warn!("{operation} failed after {attempt_number} attempts: {err}");
                tracer.operation_ended(err.status());
                return Err(err);
            }

            DATASTORE_METRICS.retries[&operation].inc();
            tracing::debug!("{operation} attempt {attempt_number} failed, retrying in {backoff:?}: {err}");

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.retry.max_backoff);
            attempt_number += 1;
        }
    }
}
