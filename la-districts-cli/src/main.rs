mod report;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use la_districts_core::{Config, Fetcher, RunLog};

#[derive(Parser)]
#[command(name = "la-districts")]
#[command(about = "Fetch Los Angeles district boundaries from ArcGIS REST services", long_about = None)]
struct Cli {
    /// Config file (defaults to $LA_DISTRICTS_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit progress logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured district (the default)
    Fetch(FetchArgs),
    /// List the configured district endpoints
    List,
    /// Show the log records of the latest run
    History {
        /// Run id to show instead of the latest
        #[arg(long)]
        run: Option<String>,

        /// Run log to read instead of the configured one
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct FetchArgs {
    /// Only fetch these districts (comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Directory for the .json and .geojson files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// CSV run log to append to
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Request timeout in seconds; 0 disables it
    #[arg(long)]
    timeout: Option<u64>,
}

fn init_tracing(verbose: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let default = if verbose { "la_districts_core=info" } else { "la_districts_core=error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

fn fetch_mode(mut config: Config, args: FetchArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(log) = args.log_file {
        config.log_path = log;
    }
    if let Some(secs) = args.timeout {
        config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let fetcher = Fetcher::new(&config)?;
    let log = RunLog::new(&fetcher.config().log_path);

    let summary = fetcher.run_filtered(&log, &args.only, &mut report::print_message)?;
    report::print_summary(&summary, log.path());
    Ok(())
}

fn list_mode(config: &Config) {
    for entry in &config.endpoints {
        println!("{},{}", entry.name, entry.url);
    }
}

fn history_mode(
    config: &Config,
    run: Option<String>,
    log_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = RunLog::new(log_file.unwrap_or_else(|| config.log_path.clone()));
    if !log.path().exists() {
        println!("No run log at {}", log.path().display());
        return Ok(());
    }

    let run_id = match run {
        Some(id) => id,
        None => match log.latest_run_id()? {
            Some(id) => id,
            None => {
                println!("Run log {} has no records", log.path().display());
                return Ok(());
            }
        },
    };

    let records = log.records_for_run(&run_id)?;
    report::print_history(&run_id, &records);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or_else(|| Commands::Fetch(FetchArgs::default())) {
        Commands::Fetch(args) => fetch_mode(config, args),
        Commands::List => {
            list_mode(&config);
            Ok(())
        }
        Commands::History { run, log_file } => history_mode(&config, run, log_file),
    }
}
