use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
pub struct Args {
    /// TOML configuration; read from the environment when absent.
    #[arg(long)]
    pub(crate) config_path: Option<PathBuf>,

    /// Do not create and seed the sample table.
    #[arg(long)]
    pub(crate) skip_bootstrap: bool,

    /// Fail the first N store calls with a transient error to exercise retries.
    #[arg(long, default_value_t = 0)]
    pub(crate) inject_transient_failures: usize,
}
