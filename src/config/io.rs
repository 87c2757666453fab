use super::models::SyncConfig;
use super::tables::ConfigTables;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from the given path, falling back to defaults on error.
///
/// A file that parses but fails validation is also replaced by defaults.
pub fn load_config(path: &Path) -> SyncConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded sync config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return SyncConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                debug!("Parsed configuration from disk");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), "Rejected config values: {err}");
                SyncConfig::default()
            }
        },
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            SyncConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<SyncConfig, toml::de::Error> {
    toml::from_str::<ConfigTables>(contents).map(SyncConfig::from)
}

pub fn serialize_config(config: &SyncConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&ConfigTables::from(config))
}
