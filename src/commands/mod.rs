pub mod check_config;
pub mod run;
pub mod test_channel;

pub use check_config::handle_check_config;
pub use run::handle_run;
pub use test_channel::handle_test_channel;

use anyhow::Result;
use std::path::PathBuf;
use tailwatch::ServiceConfig;
use tailwatch::config::config_path;
use tracing::info;

/// Load the config from an explicit path or the resolved default
pub(crate) fn load_config(path: Option<PathBuf>) -> Result<(PathBuf, ServiceConfig)> {
    let path = path.unwrap_or_else(config_path);
    info!(path = ?path, "Loading config");
    let config = ServiceConfig::load(&path)?;
    Ok((path, config))
}
