//! Fetch, persist, convert and log every configured district endpoint.
//!
//! Each endpoint runs start to finish before the next one begins. An endpoint's
//! outcome is a value, not an early return, so every attempt reaches the run log.
//! Only a failure to append to the log aborts the run.

pub mod downloads;

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;

use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::convert::{arcgis_to_geojson, write_geojson};
use crate::error::{FetchError, RunLogError};
use crate::models::{
    EndpointEntry, EndpointFailure, FetchMessage, FetchedPayload, RunRecord, RunResult, RunSummary,
};
use crate::runlog::{new_run_id, timestamp_now, RunLog};
use downloads::{create_http_client, fetch_payload, file_size_kb, round2, save_as_json};

pub struct Fetcher {
    client: Client,
    config: Config,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        config.validate()?;
        let client = create_http_client(config)?;
        Ok(Self { client, config: config.clone() })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process every configured endpoint in table order.
    pub fn run<F>(&self, log: &RunLog, observer: &mut F) -> Result<RunSummary, RunLogError>
    where
        F: FnMut(FetchMessage),
    {
        self.run_entries(&self.config.endpoints, log, observer)
    }

    /// Like [`Fetcher::run`], restricted to the named districts. An empty list means all.
    pub fn run_filtered<F>(
        &self,
        log: &RunLog,
        only: &[String],
        observer: &mut F,
    ) -> Result<RunSummary, FetchError>
    where
        F: FnMut(FetchMessage),
    {
        let entries = self.config.select(only)?;
        Ok(self.run_entries(&entries, log, observer)?)
    }

    fn run_entries<F>(
        &self,
        entries: &[EndpointEntry],
        log: &RunLog,
        observer: &mut F,
    ) -> Result<RunSummary, RunLogError>
    where
        F: FnMut(FetchMessage),
    {
        log.initialize()?;
        let run_id = new_run_id();
        let mut summary = RunSummary { run_id: run_id.clone(), ..Default::default() };

        for entry in entries {
            let record = self.process_endpoint(entry, &run_id, observer);
            log.record(&record)?;
            match record.result {
                RunResult::Success => summary.succeeded += 1,
                RunResult::Fail => summary.failed += 1,
            }
            observer(FetchMessage::Finished(record));
        }

        info!(
            run_id = %summary.run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run complete"
        );
        Ok(summary)
    }

    /// One attempt against one endpoint. Always yields a record.
    pub fn process_endpoint<F>(
        &self,
        entry: &EndpointEntry,
        run_id: &str,
        observer: &mut F,
    ) -> RunRecord
    where
        F: FnMut(FetchMessage),
    {
        observer(FetchMessage::Started { district: entry.name.clone() });
        info!(district = %entry.name, run_id, "fetching district");
        let started = Instant::now();

        let outcome = match fetch_payload(&self.client, &entry.url) {
            Ok(payload) => self
                .persist(entry, &payload, observer)
                .map(|size_kb| (payload, size_kb)),
            Err(failure) => Err(failure),
        };

        let mut record = RunRecord {
            run_id: run_id.to_string(),
            timestamp: String::new(),
            district: entry.name.clone(),
            url: entry.url.clone(),
            status_code: None,
            schema_ok: false,
            record_count: 0,
            file_size_kb: 0.0,
            result: RunResult::Fail,
            error: String::new(),
            file_written: false,
            elapsed_sec: 0.0,
        };

        match outcome {
            Ok((payload, size_kb)) => {
                record.status_code = Some(payload.status_code);
                record.schema_ok = payload.schema_ok();
                record.record_count = payload.record_count();
                record.file_size_kb = size_kb;
                record.result = RunResult::Success;
                record.file_written = true;
            }
            Err(failure) => {
                warn!(
                    district = %entry.name,
                    status = ?failure.status_code,
                    error = %failure,
                    "district fetch failed"
                );
                record.status_code = failure.status_code;
                record.error = failure.message;
            }
        }

        record.elapsed_sec = round2(started.elapsed().as_secs_f64());
        record.timestamp = timestamp_now();
        record
    }

    /// Write `<name>.json`, then try `<name>.geojson`. Returns the JSON size in KB.
    fn persist<F>(
        &self,
        entry: &EndpointEntry,
        payload: &FetchedPayload,
        observer: &mut F,
    ) -> Result<f64, EndpointFailure>
    where
        F: FnMut(FetchMessage),
    {
        let status = Some(payload.status_code);
        let dir = &self.config.output_dir;
        fs::create_dir_all(dir).map_err(|e| {
            EndpointFailure::new(status, format!("failed to create {}: {}", dir.display(), e))
        })?;

        let json_path = dir.join(format!("{}.json", entry.name));
        save_as_json(&payload.body, &json_path).map_err(|e| {
            EndpointFailure::new(status, format!("failed to write {}: {}", json_path.display(), e))
        })?;
        observer(FetchMessage::Saved { path: json_path.clone() });

        if let Some(service_error) = payload.service_error() {
            warn!(
                district = %entry.name,
                error = %service_error,
                "service returned an error object"
            );
            observer(FetchMessage::Warning(format!(
                "Service error for {}: {}",
                entry.name, service_error
            )));
        }

        let geojson_path = dir.join(format!("{}.geojson", entry.name));
        match arcgis_to_geojson(&payload.body).and_then(|fc| write_geojson(&fc, &geojson_path)) {
            Ok(()) => observer(FetchMessage::Saved { path: geojson_path }),
            Err(e) => {
                warn!(district = %entry.name, error = %e, "GeoJSON conversion failed");
                observer(FetchMessage::Warning(format!(
                    "Failed to convert to GeoJSON for {}: {}",
                    geojson_path.display(),
                    e
                )));
                remove_stale(geojson_path);
            }
        }

        file_size_kb(&json_path).map_err(|e| {
            EndpointFailure::new(status, format!("failed to stat {}: {}", json_path.display(), e))
        })
    }
}

// A `.geojson` left over from an earlier run must not outlive a failed conversion.
fn remove_stale(path: PathBuf) {
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove stale GeoJSON");
        }
    }
}
