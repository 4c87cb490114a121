use std::path::Path;

use la_districts_core::{FetchMessage, RunRecord, RunResult, RunSummary};

pub fn print_message(message: FetchMessage) {
    match message {
        FetchMessage::Started { district } => println!("Fetching {} data...", district),
        FetchMessage::Saved { path } => println!("   ✓ Saved {}", path.display()),
        FetchMessage::Warning(warning) => println!("   ⚠ {}", warning),
        FetchMessage::Finished(record) => match record.result {
            RunResult::Success => println!(
                "   ✓ {} records, {:.2} KB in {:.2}s",
                record.record_count, record.file_size_kb, record.elapsed_sec
            ),
            RunResult::Fail => {
                println!("   ✗ Error processing {}: {}", record.district, record.error)
            }
        },
    }
}

pub fn print_summary(summary: &RunSummary, log_path: &Path) {
    println!();
    println!(
        "Run {}: {} succeeded, {} failed",
        summary.run_id, summary.succeeded, summary.failed
    );
    println!("Log: {}", log_path.display());
}

pub fn print_history(run_id: &str, records: &[RunRecord]) {
    println!("Run {} ({} records)", run_id, records.len());
    if records.is_empty() {
        return;
    }
    println!("   District              | Result  | Status | Records | Size KB   | Elapsed");
    println!("   ----------------------|---------|--------|---------|-----------|--------");
    for r in records {
        let status = r.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "   {:<21} | {:<7} | {:>6} | {:>7} | {:>9.2} | {:>6.2}s",
            r.district,
            r.result.as_str(),
            status,
            r.record_count,
            r.file_size_kb,
            r.elapsed_sec
        );
        if !r.error.is_empty() {
            println!("     {}", r.error);
        }
    }
}
