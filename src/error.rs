use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchablesError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Failed to parse manifest '{path}': {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid entry key '{0}', expected <package>/<component>")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rebuild failed: {0}")]
    Rebuild(String),

    #[error("Failed to subscribe to change source: {0}")]
    Subscription(String),

    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("Service has been shut down")]
    Closed,

    #[error("An unexpected error occurred: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SearchablesError>;
