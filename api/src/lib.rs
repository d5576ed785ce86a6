#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! HTTP endpoints reading sample rows through the traced data client.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use datastore::{DataClient, DataStore, Query, Row};
use tower_http::cors::CorsLayer;

mod error;
mod metrics;

pub use error::{Error, Result};

use metrics::{Outcome, API_METRICS};

/// Row served by `GET /bigtable/`.
pub const SAMPLE_ROW_KEY: &str = "rowKey0";

/// Maximum number of rows served by `GET /bigtable/rows`.
pub const ROWS_LIMIT: usize = 10;

/// Client shared by the request handlers.
pub type SharedClient = Arc<DataClient<Arc<dyn DataStore>>>;

#[derive(Clone)]
struct ApiState {
    client: SharedClient,
    table: Arc<str>,
}

/// Routes of the API, reading from `table`.
pub fn router(client: SharedClient, table: &str) -> Router {
    Router::new()
        .route("/bigtable/", get(sample_row))
        .route("/bigtable/rows", get(rows))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(ApiState {
            client,
            table: Arc::from(table),
        })
}

/// Serves the API on `0.0.0.0:listen_port` until the server fails.
pub async fn run_server(client: SharedClient, table: String, listen_port: u16) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    vlog::info!("serving api on {addr}");
    axum::serve(listener, router(client, &table)).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

fn store_error(route: &'static str, err: datastore::Error) -> StatusCode {
    let (outcome, status) = match err {
        datastore::Error::NotFound(_) => (Outcome::NotFound, StatusCode::NOT_FOUND),
        datastore::Error::Unavailable(_) | datastore::Error::DeadlineExceeded(_) => {
            (Outcome::Error, StatusCode::SERVICE_UNAVAILABLE)
        }
        _ => (Outcome::Error, StatusCode::INTERNAL_SERVER_ERROR),
    };
    API_METRICS.requests[&(route, outcome)].inc();

    vlog::error!("{route} failed: {err}");
    status
}

async fn sample_row(State(state): State<ApiState>) -> std::result::Result<Json<Row>, StatusCode> {
    const ROUTE: &str = "/bigtable/";

    let row = state
        .client
        .read_row(&state.table, SAMPLE_ROW_KEY)
        .await
        .map_err(|err| store_error(ROUTE, err))?;

    let Some(row) = row else {
        API_METRICS.requests[&(ROUTE, Outcome::NotFound)].inc();
        return Err(StatusCode::NOT_FOUND);
    };

    vlog::info!("received row: {row:?}");
    API_METRICS.requests[&(ROUTE, Outcome::Ok)].inc();
    Ok(Json(row))
}

async fn rows(State(state): State<ApiState>) -> std::result::Result<Json<Vec<Row>>, StatusCode> {
    const ROUTE: &str = "/bigtable/rows";

    let rows = state
        .client
        .read_rows(&Query::new(state.table.as_ref()).limit(ROWS_LIMIT))
        .await
        .map_err(|err| store_error(ROUTE, err))?;

    for row in &rows {
        vlog::info!("received row: {row:?}");
    }
    API_METRICS.requests[&(ROUTE, Outcome::Ok)].inc();
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use datastore::{InMemoryStore, RowMutation};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;

    const TABLE: &str = "t";

    fn client(store: Arc<InMemoryStore>) -> SharedClient {
        let store: Arc<dyn DataStore> = store;
        Arc::new(DataClient::untraced(store))
    }

    async fn status_of(client: SharedClient, uri: &str) -> StatusCode {
        router(client, TABLE)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    fn count(route: &'static str, outcome: Outcome) -> u64 {
        API_METRICS.requests[&(route, outcome)].get()
    }

    #[tokio::test]
    async fn outcomes_are_counted_per_route() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_table(TABLE, &["cf1".to_string()])
            .await
            .unwrap();
        let client = client(store.clone());

        let not_found = count("/bigtable/", Outcome::NotFound);
        assert_eq!(
            status_of(client.clone(), "/bigtable/").await,
            StatusCode::NOT_FOUND
        );
        assert!(count("/bigtable/", Outcome::NotFound) > not_found);

        store
            .mutate_row(&RowMutation::new(TABLE, SAMPLE_ROW_KEY).set_cell("cf1", "name", "World"))
            .await
            .unwrap();
        let ok = count("/bigtable/", Outcome::Ok);
        assert_eq!(status_of(client.clone(), "/bigtable/").await, StatusCode::OK);
        assert!(count("/bigtable/", Outcome::Ok) > ok);

        store.inject_failure(datastore::Error::Internal("boom".to_string()));
        let failed = count("/bigtable/rows", Outcome::Error);
        assert_eq!(
            status_of(client, "/bigtable/rows").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(count("/bigtable/rows", Outcome::Error) > failed);
    }
}
