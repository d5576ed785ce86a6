//! In-process store used by the sample service and its tests.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    future::Future,
    sync::{Mutex, MutexGuard},
    time::Instant,
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracer::StatusCode;

use crate::{
    metrics::DATASTORE_METRICS,
    models::{Cell, Query, Row, RowMutation},
    DataStore, Error, Result,
};

#[derive(Debug, Default)]
struct Table {
    families: BTreeSet<String>,
    // row key -> (family, qualifier) -> value
    rows: BTreeMap<String, BTreeMap<(String, String), String>>,
}

impl Table {
    fn row(&self, key: &str) -> Option<Row> {
        let cells = self.rows.get(key)?;
        Some(Row {
            key: key.to_string(),
            cells: cells
                .iter()
                .map(|((family, qualifier), value)| Cell {
                    family: family.clone(),
                    qualifier: qualifier.clone(),
                    value: value.clone(),
                })
                .collect(),
        })
    }
}

/// Tables kept in memory, with optional injected failures.
///
/// Each injected failure is returned by the next call instead of its result, in
/// injection order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    faults: Mutex<VecDeque<Error>>,
}

impl InMemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next call with `error`.
    pub fn inject_failure(&self, error: Error) {
        self.faults().push_back(error);
    }

    /// Fails the next `count` calls with [`Error::Unavailable`].
    pub fn inject_transient_failures(&self, count: usize) {
        let mut faults = self.faults();
        for _ in 0..count {
            faults.push_back(Error::Unavailable("injected transient failure".to_string()));
        }
    }

    fn faults(&self) -> MutexGuard<'_, VecDeque<Error>> {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_fault(&self) -> Result<()> {
        match self.faults().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Runs `call` and observes its latency, failed calls included.
async fn timed<T>(method: &'static str, call: impl Future<Output = Result<T>>) -> Result<T> {
    let started = Instant::now();
    let result = call.await;

    let status = match &result {
        Ok(_) => StatusCode::Ok,
        Err(err) => err.status(),
    };
    DATASTORE_METRICS.call[&(method, status.as_str())].observe(started.elapsed());

    result
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>> {
        timed("read_row", async {
            self.check_fault()?;

            let tables = self.tables.read().await;
            let table = tables
                .get(table)
                .ok_or_else(|| Error::NotFound(format!("table {table}")))?;

            Ok::<_, Error>(table.row(key))
        })
        .await
    }

    async fn read_rows(&self, query: &Query) -> Result<Vec<Row>> {
        timed("read_rows", async {
            self.check_fault()?;

            let tables = self.tables.read().await;
            let table = tables
                .get(&query.table)
                .ok_or_else(|| Error::NotFound(format!("table {}", query.table)))?;
            let rows = table
                .rows
                .keys()
                .take(query.limit.unwrap_or(usize::MAX))
                .filter_map(|key| table.row(key))
                .collect();

            Ok::<_, Error>(rows)
        })
        .await
    }

    async fn mutate_row(&self, mutation: &RowMutation) -> Result<()> {
        timed("mutate_row", async {
            self.check_fault()?;

            if mutation.key.is_empty() {
                return Err(Error::InvalidArgument("empty row key".to_string()));
            }

            let mut tables = self.tables.write().await;
            let table = tables
                .get_mut(&mutation.table)
                .ok_or_else(|| Error::NotFound(format!("table {}", mutation.table)))?;

            if let Some(cell) = mutation
                .cells
                .iter()
                .find(|cell| !table.families.contains(&cell.family))
            {
                return Err(Error::InvalidArgument(format!(
                    "unknown column family {}",
                    cell.family
                )));
            }

            let row = table.rows.entry(mutation.key.clone()).or_default();
            for cell in &mutation.cells {
                row.insert(
                    (cell.family.clone(), cell.qualifier.clone()),
                    cell.value.clone(),
                );
            }

            Ok::<_, Error>(())
        })
        .await
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        timed("table_exists", async {
            self.check_fault()?;

            Ok::<_, Error>(self.tables.read().await.contains_key(table))
        })
        .await
    }

    async fn create_table(&self, table: &str, families: &[String]) -> Result<()> {
        timed("create_table", async {
            self.check_fault()?;

            let mut tables = self.tables.write().await;
            if tables.contains_key(table) {
                return Err(Error::AlreadyExists(format!("table {table}")));
            }
            tables.insert(
                table.to_string(),
                Table {
                    families: families.iter().cloned().collect(),
                    rows: BTreeMap::new(),
                },
            );

            Ok::<_, Error>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn store_with_table() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create_table("t", &["cf1".to_string()])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn reads_back_written_cells() {
        let store = store_with_table().await;
        store
            .mutate_row(&RowMutation::new("t", "rowKey0").set_cell("cf1", "name", "World"))
            .await
            .unwrap();

        let row = store.read_row("t", "rowKey0").await.unwrap().unwrap();
        assert_eq!(row.cell("cf1", "name"), Some("World"));
        assert_eq!(store.read_row("t", "rowKey9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_table_is_not_found() {
        let store = InMemoryStore::new();

        assert_eq!(
            store.read_row("t", "rowKey0").await,
            Err(Error::NotFound("table t".to_string()))
        );
        assert!(!store.table_exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_family_is_rejected() {
        let store = store_with_table().await;

        let result = store
            .mutate_row(&RowMutation::new("t", "rowKey0").set_cell("cf2", "name", "x"))
            .await;

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(store.read_row("t", "rowKey0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_is_ordered_and_limited() {
        let store = store_with_table().await;
        for key in ["rowKey2", "rowKey0", "rowKey1"] {
            store
                .mutate_row(&RowMutation::new("t", key).set_cell("cf1", "name", key))
                .await
                .unwrap();
        }

        let rows = store.read_rows(&Query::new("t").limit(2)).await.unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["rowKey0", "rowKey1"]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = store_with_table().await;
        store.inject_transient_failures(1);
        store.inject_failure(Error::DeadlineExceeded("slow".to_string()));

        assert!(matches!(
            store.table_exists("t").await,
            Err(Error::Unavailable(_))
        ));
        assert!(matches!(
            store.table_exists("t").await,
            Err(Error::DeadlineExceeded(_))
        ));
        assert!(store.table_exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn failed_calls_are_timed_with_their_status() {
        let store = store_with_table().await;
        store.inject_transient_failures(1);

        assert!(store.read_rows(&Query::new("t")).await.is_err());
        assert!(store.read_rows(&Query::new("t")).await.is_ok());

        let mut body = String::new();
        vise::MetricsCollection::default()
            .collect()
            .encode(&mut body, vise::Format::OpenMetricsForPrometheus)
            .unwrap();
        assert!(
            body.contains(r#"method="read_rows",status="UNAVAILABLE""#),
            "{body}"
        );
        assert!(body.contains(r#"method="read_rows",status="OK""#), "{body}");
    }

    #[tokio::test]
    async fn creating_existing_table_fails() {
        let store = store_with_table().await;

        assert!(matches!(
            store.create_table("t", &[]).await,
            Err(Error::AlreadyExists(_))
        ));
    }
}
