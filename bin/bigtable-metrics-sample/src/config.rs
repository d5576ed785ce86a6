use std::{fs, path::Path, time::Duration};

use datastore::RetrySettings;
use envconfig::Envconfig;
use latency_metrics::{InstrumentSelector, PushSinkConfig, ViewDefinition};
use serde::Deserialize;
use tracer::{InstrumentNames, StoreIdentity};
use url::Url;

use crate::error::Error;

/// Sample service configuration.
///
/// Read either from a TOML file or from the environment.
#[derive(Deserialize, Debug, Envconfig)]
pub(crate) struct Config {
    #[envconfig(from = "BIGTABLE_PROJECT_ID")]
    pub project_id: String,

    #[envconfig(from = "BIGTABLE_INSTANCE_ID", default = "test-routing-headers")]
    pub instance_id: String,

    #[envconfig(from = "BIGTABLE_APP_PROFILE_ID", default = "default")]
    pub app_profile_id: String,

    #[envconfig(from = "BIGTABLE_TABLE_ID", default = "test-metrics-table")]
    pub table_id: String,

    #[envconfig(from = "API_LISTEN_PORT", default = "8080")]
    pub api_listen_port: u16,

    #[envconfig(from = "METRICS_PROMETHEUS_PORT", default = "9091")]
    pub prometheus_port: u16,

    /// OTLP collector; no push sink is attached without it.
    #[envconfig(from = "METRICS_PUSH_ENDPOINT")]
    pub push_endpoint: Option<Url>,

    #[envconfig(
        from = "METRICS_PUSH_NAMESPACE",
        default = "custom.googleapis.com/opentelemetry"
    )]
    pub push_namespace: String,

    #[envconfig(from = "METRICS_PUSH_INTERVAL_SECS", default = "20")]
    pub push_interval_secs: u64,

    #[envconfig(from = "METRICS_SERVICE_NAME", default = "bigtable")]
    pub service_name: String,

    #[envconfig(from = "RETRY_MAX_ATTEMPTS", default = "3")]
    pub retry_max_attempts: u32,

    #[envconfig(from = "RETRY_INITIAL_BACKOFF_MS", default = "10")]
    pub retry_initial_backoff_ms: u64,
}

impl Config {
    /// Reads the configuration from a TOML file.
    pub(crate) fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(config_path)?;

        let config: Config = toml::from_str(&contents)?;

        Ok(config)
    }

    pub(crate) fn store_identity(&self) -> StoreIdentity {
        StoreIdentity {
            project_id: self.project_id.clone(),
            instance_id: self.instance_id.clone(),
            app_profile_id: self.app_profile_id.clone(),
        }
    }

    pub(crate) fn push_sink(&self) -> Option<PushSinkConfig> {
        self.push_endpoint.as_ref().map(|endpoint| {
            PushSinkConfig::new(endpoint.clone())
                .with_flush_interval(Duration::from_secs(self.push_interval_secs))
        })
    }

    /// Views of `names`, exported under the push namespace.
    pub(crate) fn views(
        &self,
        names: &InstrumentNames,
    ) -> Vec<(InstrumentSelector, ViewDefinition)> {
        names.views(&self.push_namespace)
    }

    pub(crate) fn retry_settings(&self) -> RetrySettings {
        RetrySettings {
            max_attempts: self.retry_max_attempts,
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            ..Default::default()
        }
    }
}
