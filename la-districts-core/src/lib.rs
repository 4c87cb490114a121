pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod models;
pub mod runlog;

pub use config::Config;
pub use error::{ConfigError, ConversionError, FetchError, RunLogError};
pub use fetch::Fetcher;
pub use models::{EndpointEntry, FetchMessage, RunRecord, RunResult, RunSummary};
pub use runlog::{new_run_id, RunLog, HEADERS};
