//! Run configuration.
//!
//! Built-in defaults cover the Los Angeles district layers. An optional TOML file
//! can override paths, the HTTP timeout and the endpoint table; it is looked up at
//! an explicit path, then `LA_DISTRICTS_CONFIG`, then `districts.toml` in the
//! platform config directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::EndpointEntry;

pub const CONFIG_ENV: &str = "LA_DISTRICTS_CONFIG";
pub const CONFIG_FILE_NAME: &str = "districts.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "shapefiles_output";
pub const DEFAULT_LOG_FILE: &str = "logs/run_log.csv";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = concat!("la-districts/", env!("CARGO_PKG_VERSION"));

const DEFAULT_ENDPOINTS: [(&str, &str); 7] = [
    ("assembly", "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/2/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
    ("bids_city_clerk", "https://services5.arcgis.com/7nsPwEMP38bSkCjy/arcgis/rest/services/Business_Improvement_Districts/FeatureServer/0/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
    ("city_council", "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/13/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
    ("congressional", "https://arcgis.gis.lacounty.gov/arcgis/rest/services/LACounty_Dynamic/Political_Boundaries/MapServer/2/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
    ("neighborhood_council", "https://services5.arcgis.com/7nsPwEMP38bSkCjy/arcgis/rest/services/Neighborhood_Council_Boundaries_(2018)/FeatureServer/0/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
    ("senate", "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/23/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
    ("supervisors", "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/4/query?where=1%3D1&outFields=*&outSR=4326&f=json"),
];

pub fn default_endpoints() -> Vec<EndpointEntry> {
    DEFAULT_ENDPOINTS
        .iter()
        .map(|(name, url)| EndpointEntry::new(*name, *url))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub log_path: PathBuf,
    /// `None` disables the request timeout.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub endpoints: Vec<EndpointEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            endpoints: default_endpoints(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    #[serde(default, rename = "endpoint")]
    endpoints: Vec<FileEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileEndpoint {
    name: String,
    url: Option<String>,
    service: Option<String>,
}

impl FileEndpoint {
    fn into_entry(self) -> Result<EndpointEntry, ConfigError> {
        match (self.url, self.service) {
            (Some(url), None) => {
                reqwest::Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
                    name: self.name.clone(),
                    reason: e.to_string(),
                })?;
                Ok(EndpointEntry::new(self.name, url))
            }
            (None, Some(service)) => EndpointEntry::from_service(self.name, &service),
            _ => Err(ConfigError::AmbiguousEndpoint { name: self.name }),
        }
    }
}

impl Config {
    /// Resolve and load the config file, falling back to defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::locate(explicit) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let path = ProjectDirs::from("", "", "la-districts")?
            .config_dir()
            .join(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, Path::new("<inline>"))
    }

    fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        let mut config = Self::default();

        if let Some(dir) = file.output_dir {
            config.output_dir = dir;
        }
        if let Some(log) = file.log_file {
            config.log_path = log;
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(agent) = file.user_agent {
            config.user_agent = agent;
        }
        if !file.endpoints.is_empty() {
            config.endpoints = file
                .endpoints
                .into_iter()
                .map(FileEndpoint::into_entry)
                .collect::<Result<_, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Endpoint names become file names, so they are restricted and must be unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        let mut seen = HashSet::new();
        for entry in &self.endpoints {
            let name = entry.name.as_str();
            let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
            if name.is_empty() || !name.chars().all(allowed) {
                return Err(ConfigError::InvalidName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }

    /// Keep only the named endpoints, in table order.
    pub fn select(&self, only: &[String]) -> Result<Vec<EndpointEntry>, ConfigError> {
        if only.is_empty() {
            return Ok(self.endpoints.clone());
        }
        for name in only {
            if !self.endpoints.iter().any(|e| &e.name == name) {
                return Err(ConfigError::UnknownDistrict(name.clone()));
            }
        }
        Ok(self
            .endpoints
            .iter()
            .filter(|e| only.contains(&e.name))
            .cloned()
            .collect())
    }
}
