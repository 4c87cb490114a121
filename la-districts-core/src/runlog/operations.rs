use std::fs::OpenOptions;

use chrono::Utc;

use crate::error::RunLogError;
use crate::models::RunRecord;
use crate::runlog::schema::RunLog;

/// Run identifier from the current UTC time at second resolution.
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Naive UTC ISO-8601 timestamp with microseconds.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

impl RunLog {
    /// Append one row. The log must have been initialized; a missing file is an error.
    pub fn record(&self, record: &RunRecord) -> Result<(), RunLogError> {
        let file = OpenOptions::new()
            .append(true)
            .open(self.path())
            .map_err(|source| self.io_err(source))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(record).map_err(|source| self.csv_err(source))?;
        writer.flush().map_err(|source| self.io_err(source))?;
        Ok(())
    }

    pub fn read_records(&self) -> Result<Vec<RunRecord>, RunLogError> {
        let mut reader =
            csv::Reader::from_path(self.path()).map_err(|source| self.csv_err(source))?;
        reader
            .deserialize()
            .collect::<Result<Vec<RunRecord>, _>>()
            .map_err(|source| self.csv_err(source))
    }

    pub fn records_for_run(&self, run_id: &str) -> Result<Vec<RunRecord>, RunLogError> {
        Ok(self
            .read_records()?
            .into_iter()
            .filter(|r| r.run_id == run_id)
            .collect())
    }

    /// Run id of the last row in the log, if any.
    pub fn latest_run_id(&self) -> Result<Option<String>, RunLogError> {
        Ok(self.read_records()?.pop().map(|r| r.run_id))
    }
}
