use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use tracing::debug;

use crate::domain::safety::CheckOptions;
use crate::error::{KernelizeError, Result};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "kernelize.toml";

/// What goes to standard output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmitFormat {
    /// Indented IR text.
    #[default]
    Ir,
    /// The rewritten tree as JSON.
    Json,
    /// Diagnostics only.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub checks: ChecksConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    pub outside_section: bool,
    pub access_in_section: bool,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            outside_section: true,
            access_in_section: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub emit: EmitFormat,
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| KernelizeError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| KernelizeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// An explicit path must exist. Otherwise `kernelize.toml` in the
    /// working directory is used when present, else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    debug!("no configuration file, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };
        debug!(path = %path.display(), "loading configuration");
        Self::load(&path)
    }

    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            outside_section: self.checks.outside_section,
            access_in_section: self.checks.access_in_section,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("", Path::new("k.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.check_options(), CheckOptions::default());
        assert_eq!(config.output.emit, EmitFormat::Ir);
    }

    #[test]
    fn test_partial_tables() {
        let config = Config::parse(
            "[checks]\naccess_in_section = false\n[output]\nemit = \"none\"\n",
            Path::new("k.toml"),
        )
        .unwrap();
        assert!(config.checks.outside_section);
        assert!(!config.checks.access_in_section);
        assert_eq!(config.output.emit, EmitFormat::None);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Config::parse("[checks]\nlock_order = true\n", Path::new("k.toml")).unwrap_err();
        assert!(matches!(err, KernelizeError::Config { .. }));
        assert!(err.to_string().contains("k.toml"));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nemit = \"json\"").unwrap();
        let config = Config::discover(Some(file.path())).unwrap();
        assert_eq!(config.output.emit, EmitFormat::Json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Config::discover(Some(Path::new("/nonexistent/kernelize.toml"))).unwrap_err();
        assert!(matches!(err, KernelizeError::Read { .. }));
    }
}
