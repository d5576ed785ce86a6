#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Sample service reading Bigtable shaped rows and exporting their call latencies.

use std::sync::Arc;

use clap::Parser;
use envconfig::Envconfig;
use eyre::Result;

use cli::Args;
use config::Config;
use datastore::{DataClient, DataStore, InMemoryStore};
use latency_metrics::MetricsPipelineBuilder;
use tracer::{InstrumentNames, MetricsTracerFactory, METER_NAME};

mod bootstrap;
mod cli;
mod config;
mod error;
mod metrics;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config = match args.config_path {
        Some(path) => Config::from_file(path)?,
        None => {
            dotenvy::dotenv().ok();
            Config::init_from_env()?
        }
    };

    let sentry_guard = vlog::init()?;

    if sentry_guard.is_some() {
        vlog::info!("Starting Sentry for project {}", config.project_id);
    } else {
        vlog::info!("No sentry url configured");
    }

    let names = InstrumentNames::default();
    let mut pipeline = MetricsPipelineBuilder::new(config.service_name.as_str())
        .register_views(config.views(&names))?
        .with_pull_sink();
    if let Some(push) = config.push_sink() {
        pipeline = pipeline.with_push_sink(push);
    }
    let pipeline = pipeline.build()?;

    let recorder = pipeline.recorder(METER_NAME, &names.descriptors());
    let tracers = MetricsTracerFactory::new(recorder, config.store_identity())
        .with_instrument_names(names);

    let store = Arc::new(InMemoryStore::new());
    if args.inject_transient_failures > 0 {
        vlog::info!(
            "failing the first {} store calls",
            args.inject_transient_failures
        );
        store.inject_transient_failures(args.inject_transient_failures);
    }
    let store: Arc<dyn DataStore> = store;

    let client = Arc::new(
        DataClient::new(store, Arc::new(tracers.clone()))
            .with_admin_tracers(Arc::new(tracers.without_response_labels()))
            .with_retry_settings(config.retry_settings()),
    );

    if args.skip_bootstrap {
        vlog::info!("Skipping bootstrap of table {}", config.table_id);
    } else {
        bootstrap::bootstrap(&client, &config.table_id).await?;
    }

    let metrics_handle = tokio::spawn(latency_metrics::run_pull_server(
        pipeline.prometheus_registry(),
        config.prometheus_port,
    ));

    let api_handle = tokio::spawn(api::run_server(
        client,
        config.table_id.clone(),
        config.api_listen_port,
    ));

    tokio::select! {
        r = metrics_handle => {
            vlog::error!("Metrics server ended with {r:?}");
        }
        r = api_handle => {
            vlog::error!("Api server ended with {r:?}");
        }
        r = tokio::signal::ctrl_c() => {
            vlog::info!("Received shutdown signal {r:?}");
        }
    }

    if let Err(err) = pipeline.shutdown() {
        vlog::warn!("Failed to flush metrics on shutdown: {err}");
    }

    Ok(())
}
