use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::models::{EndpointFailure, FetchedPayload};

pub fn create_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .gzip(true)
        .build()
}

/// GET an ArcGIS query URL and parse the body as a JSON object.
pub fn fetch_payload(client: &Client, url: &str) -> Result<FetchedPayload, EndpointFailure> {
    debug!(url, "GET");
    let response = client
        .get(url)
        .send()
        .map_err(|e| EndpointFailure::new(e.status().map(|s| s.as_u16()), error_chain(&e)))?;

    let status = response.status();
    let code = status.as_u16();
    if !status.is_success() {
        return Err(EndpointFailure::new(
            Some(code),
            format!("HTTP {} for url: {}", status, url),
        ));
    }

    let bytes = response
        .bytes()
        .map_err(|e| EndpointFailure::new(Some(code), error_chain(&e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(body)) => Ok(FetchedPayload { status_code: code, body }),
        Ok(other) => Err(EndpointFailure::new(
            Some(code),
            format!("expected a JSON object, got {}", kind(&other)),
        )),
        Err(e) => Err(EndpointFailure::new(Some(code), format!("invalid JSON: {}", e))),
    }
}

/// Write the response as pretty JSON, keys in source order.
pub fn save_as_json(body: &Map<String, Value>, path: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, body)?;
    writer.flush()
}

pub fn file_size_kb(path: &Path) -> io::Result<f64> {
    let bytes = fs::metadata(path)?.len();
    Ok(round2(bytes as f64 / 1024.0))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// reqwest's Display stops at the outermost error; the cause is usually the useful part.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(842.1694), 842.17);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn saved_json_keeps_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let Value::Object(body) = json!({"zeta": 1, "alpha": 2, "features": []}) else {
            unreachable!()
        };
        save_as_json(&body, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
        assert!(text.contains("\n  \"alpha\": 2"));
        assert!(file_size_kb(&path).unwrap() > 0.0);
    }

    #[test]
    fn error_chain_includes_causes() {
        #[derive(Debug)]
        struct Wrapper(io::Error);
        impl std::fmt::Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("error sending request")
            }
        }
        impl std::error::Error for Wrapper {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }
        let err = Wrapper(io::Error::new(io::ErrorKind::Other, "connection refused"));
        assert_eq!(error_chain(&err), "error sending request: connection refused");
    }
}
