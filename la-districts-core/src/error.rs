//! Error types for the district fetcher.
//!
//! Per-endpoint network and parse faults are not errors here: they are carried as
//! [`crate::models::EndpointFailure`] values and end up in the run log. Only the
//! conditions below leave the library as `Err`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid endpoint name {0:?}: use letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("duplicate endpoint name {0:?}")]
    DuplicateName(String),

    #[error("endpoint {name:?} must set exactly one of `url` or `service`")]
    AmbiguousEndpoint { name: String },

    #[error("invalid URL for endpoint {name:?}: {reason}")]
    InvalidUrl { name: String, reason: String },

    #[error("unknown district {0:?}")]
    UnknownDistrict(String),

    #[error("no endpoints configured")]
    NoEndpoints,
}

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("run log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run log CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("no features found in response")]
    NoFeatures,

    #[error("`features` is not an array")]
    FeaturesNotArray,

    #[error("malformed geometry in feature {index}: {reason}")]
    MalformedGeometry { index: usize, reason: String },

    #[error("unsupported spatial reference wkid {0}")]
    UnsupportedSpatialReference(i64),

    #[error("failed to write GeoJSON: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    RunLog(#[from] RunLogError),
}
