use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Query parameters that make an ArcGIS `query` endpoint return every record,
/// every attribute, in WGS84 lon/lat, as JSON.
pub const QUERY_PARAMS: [(&str, &str); 4] = [
    ("where", "1=1"),
    ("outFields", "*"),
    ("outSR", "4326"),
    ("f", "json"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub name: String,
    pub url: String,
}

impl EndpointEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into() }
    }

    /// Build an entry from a MapServer/FeatureServer layer URL, e.g.
    /// `https://host/arcgis/rest/services/Boundaries/MapServer/2`.
    pub fn from_service(name: impl Into<String>, service_url: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let base = format!("{}/query", service_url.trim_end_matches('/'));
        let url = reqwest::Url::parse_with_params(&base, QUERY_PARAMS.iter()).map_err(|e| {
            ConfigError::InvalidUrl { name: name.clone(), reason: e.to_string() }
        })?;
        Ok(Self::new(name, url.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Success,
    Fail,
}

impl RunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunResult::Success => "success",
            RunResult::Fail => "fail",
        }
    }
}

/// One row of the run log. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: String,
    pub district: String,
    pub url: String,
    pub status_code: Option<u16>,
    #[serde(deserialize_with = "de_flexible_bool")]
    pub schema_ok: bool,
    pub record_count: usize,
    pub file_size_kb: f64,
    pub result: RunResult,
    pub error: String,
    #[serde(deserialize_with = "de_flexible_bool")]
    pub file_written: bool,
    pub elapsed_sec: f64,
}

// Older logs were written with Python-style `True`/`False`.
fn de_flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "true" | "True" | "TRUE" | "1" => Ok(true),
        "false" | "False" | "FALSE" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean: {}", other))),
    }
}

/// A successfully fetched and parsed ArcGIS response.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub status_code: u16,
    pub body: Map<String, Value>,
}

impl FetchedPayload {
    pub fn schema_ok(&self) -> bool {
        self.body.contains_key("features")
    }

    pub fn record_count(&self) -> usize {
        match self.body.get("features") {
            Some(Value::Array(features)) => features.len(),
            _ => 0,
        }
    }

    /// ArcGIS reports query errors as HTTP 200 with an `error` object.
    pub fn service_error(&self) -> Option<String> {
        let err = self.body.get("error")?;
        let code = err.get("code").and_then(Value::as_i64);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown service error");
        Some(match code {
            Some(code) => format!("{} ({})", message, code),
            None => message.to_string(),
        })
    }
}

/// Why a single endpoint attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub status_code: Option<u16>,
    pub message: String,
}

impl EndpointFailure {
    pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into() }
    }
}

impl std::fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug)]
pub enum FetchMessage {
    Started { district: String },
    Saved { path: std::path::PathBuf },
    Warning(String),
    Finished(RunRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(body: Value) -> FetchedPayload {
        let Value::Object(body) = body else { panic!("object expected") };
        FetchedPayload { status_code: 200, body }
    }

    #[test]
    fn schema_and_count_follow_features_key() {
        let p = payload(json!({"features": [{"attributes": {}}, {"attributes": {}}]}));
        assert!(p.schema_ok());
        assert_eq!(p.record_count(), 2);

        let p = payload(json!({"fields": []}));
        assert!(!p.schema_ok());
        assert_eq!(p.record_count(), 0);

        // Key present but not an array still counts as schema_ok.
        let p = payload(json!({"features": null}));
        assert!(p.schema_ok());
        assert_eq!(p.record_count(), 0);
    }

    #[test]
    fn service_error_is_reported() {
        let p = payload(json!({"error": {"code": 400, "message": "Invalid query"}}));
        assert_eq!(p.service_error().as_deref(), Some("Invalid query (400)"));
        assert!(payload(json!({"features": []})).service_error().is_none());
    }

    #[test]
    fn from_service_builds_query_url() {
        let e = EndpointEntry::from_service(
            "senate",
            "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/23/",
        )
        .unwrap();
        assert_eq!(e.name, "senate");
        assert_eq!(
            e.url,
            "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/23/query?where=1%3D1&outFields=*&outSR=4326&f=json"
        );
    }

    #[test]
    fn endpoint_failure_displays_its_message() {
        let failure = EndpointFailure::new(Some(503), "HTTP 503 Service Unavailable for url: x");
        assert_eq!(failure.to_string(), "HTTP 503 Service Unavailable for url: x");
    }

    #[test]
    fn from_service_rejects_garbage() {
        assert!(EndpointEntry::from_service("x", "not a url").is_err());
    }
}
