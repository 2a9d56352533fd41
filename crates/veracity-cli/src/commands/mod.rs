//! Command implementations.

pub mod chunks;
pub mod config;
pub mod facts;
pub mod run;
pub mod stats;

pub use self::chunks::execute_chunks;
pub use self::config::execute_config;
pub use self::facts::execute_facts;
pub use self::run::execute_run;
pub use self::stats::execute_stats;

use crate::config::Config;
use crate::error::Result;
use std::fs;
use veracity_store::SqliteStore;

/// Open the configured repository, creating its directory if needed.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = config.store_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(SqliteStore::new(&path)?)
}
