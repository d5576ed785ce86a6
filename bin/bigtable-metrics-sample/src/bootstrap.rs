//! Creation and seeding of the sample table.

use datastore::{DataClient, DataStore, Error, Result, RowMutation};

use crate::metrics::MAIN_METRICS;

pub(crate) const COLUMN_FAMILY: &str = "cf1";

const SAMPLE_NAMES: [&str; 3] = ["World", "Bigtable", "Java"];

/// Creates `table` and writes the sample rows unless the table already exists.
///
/// Rows of a pre-existing table are left as they are.
pub(crate) async fn bootstrap<S: DataStore>(client: &DataClient<S>, table: &str) -> Result<()> {
    if client.table_exists(table).await? {
        vlog::info!("table {table} exists, skipping bootstrap");
        return Ok(());
    }

    match client
        .create_table(table, &[COLUMN_FAMILY.to_string()])
        .await
    {
        Ok(()) => vlog::info!("created table {table}"),
        Err(Error::AlreadyExists(_)) => {
            vlog::info!("table {table} was created concurrently, skipping bootstrap");
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    for (i, name) in SAMPLE_NAMES.into_iter().enumerate() {
        let mutation = RowMutation::new(table, format!("rowKey{i}"))
            .set_cell(COLUMN_FAMILY, "name", name)
            .set_cell(COLUMN_FAMILY, "greeting", format!("Hello {name}!"));

        match client.mutate_row(&mutation).await {
            Ok(()) => {
                MAIN_METRICS.rows_seeded.inc();
            }
            Err(Error::NotFound(msg)) => {
                vlog::warn!("failed to seed row {}: {msg} not found", mutation.key);
            }
            Err(err) => return Err(err),
        }
    }

    vlog::info!("seeded table {table}");
    Ok(())
}
