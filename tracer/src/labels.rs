//! Label keys attached by [`MetricsTracer`](crate::MetricsTracer).

/// Project owning the store.
pub const PROJECT_ID_KEY: &str = "project_id";
/// Store instance.
pub const INSTANCE_ID_KEY: &str = "instance_id";
/// App profile the client routes through.
pub const APP_PROFILE_KEY: &str = "app_profile";
/// Fully qualified operation name, e.g. `Bigtable.ReadRow`.
pub const METHOD_KEY: &str = "method";
/// Final status of the attempt or operation.
pub const STATUS_KEY: &str = "status";
/// Key of the row returned by a successful single row operation.
pub const ROW_KEY: &str = "rowKey";
