use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct Store {
    pub directory: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub store: Store,
    pub log: Log,
}

const DEFAULT_CONFIG: &str = r#"
[store]
# Folder holding the task file. It must be created by hand.
directory="data"
filename="data.csv"

[log]
level="warn"
"#;

const ENV_PREFIX: &str = "TASKORG";

impl Configuration {
    /// Loads the built-in defaults, then `path` (or the per-user config file
    /// when `path` is `None`), then `TASKORG_*` environment variables.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(default_path()).required(false),
        };
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize::<Configuration>()?)
    }

    pub fn directory(&self) -> &str {
        &self.store.directory
    }

    pub fn filename(&self) -> &str {
        &self.store.filename
    }

    pub fn store_path(&self) -> PathBuf {
        Path::new(self.directory()).join(self.filename())
    }
}

fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_default()
        .join("taskorg/taskorg.toml")
}
