//! YAML configuration for the `query` command.

use std::fs;
use std::path::Path;

use anyhow::Context;
use pgshim_adapter::{AdapterOptions, ConnectionConfig};
use serde::Deserialize;

/// Layout of the file passed with `--config`.
///
/// ```yaml
/// connection:
///   database_url: postgres://localhost:5432/app
///   max_connections: 4
/// options:
///   schema: public
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub connection: ConnectionConfig,
    pub options: AdapterOptions,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Resolve the effective config from an optional file and URL override.
    pub fn resolve(path: Option<&Path>, database_url: Option<String>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(url) = database_url {
            config.connection.database_url = url;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_yaml() {
        let config: CliConfig = serde_yaml::from_str(
            "connection:\n  database_url: postgres://db:5432/app\n  retry_attempts: 2\noptions:\n  schema: tenant\n",
        )
        .unwrap();

        assert_eq!(config.connection.database_url, "postgres://db:5432/app");
        assert_eq!(config.connection.retry_attempts, 2);
        assert_eq!(
            config.connection.max_connections,
            ConnectionConfig::default().max_connections
        );
        assert_eq!(config.options.schema.as_deref(), Some("tenant"));
    }

    #[test]
    fn test_url_override_wins() {
        let config = CliConfig::resolve(None, Some("postgres://other/db".to_string())).unwrap();
        assert_eq!(config.connection.database_url, "postgres://other/db");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = CliConfig::resolve(Some(Path::new("/nonexistent/pgshim.yaml")), None)
            .unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
