use crate::bag::BagError;
use crate::tags::TagError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Vehicle catalog error: {0}")]
    Catalog(String),

    #[error("Bag error: {0}")]
    Bag(#[from] BagError),

    #[error("Tagging error: {0}")]
    Tag(#[from] TagError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Refusing to rename {from}: {to} already exists")]
    RenameCollision { from: PathBuf, to: PathBuf },

    #[error("{0}")]
    Other(String),
}
