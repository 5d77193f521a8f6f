use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Server configuration
///
/// Every field has a default so a config file only needs to mention the
/// values it overrides. CLI flags take precedence over the file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Root directory to serve files from
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Upstream base URL; when set, file requests are redirected there
    /// instead of being served from local disk
    #[serde(default)]
    pub proxy_base: Option<String>,

    /// Number of threads dedicated to blocking file reads
    #[serde(default = "default_read_workers")]
    pub read_workers: usize,
}

fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_read_workers() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            root: default_root(),
            proxy_base: None,
            read_workers: default_read_workers(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.root, PathBuf::from("."));
        assert!(config.proxy_base.is_none());
        assert_eq!(config.read_workers, 4);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 9001").unwrap();
        writeln!(file, "proxy_base = \"http://mirror.example/\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(
            config.proxy_base.as_deref(),
            Some("http://mirror.example/")
        );
        assert_eq!(config.read_workers, 4);
        assert_eq!(config.bind, "0.0.0.0");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
