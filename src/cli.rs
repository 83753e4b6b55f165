use clap::{Parser, Subcommand};
use ha_process_log::config::Config;
use ha_process_log::error::{Error, Result};
use ha_process_log::logger;
use ha_process_log::reader::{commit_point_of, list_logs, read_log, ProcessLog};
use serde::Serialize;
use std::path::PathBuf;

/// Number of payload bytes shown per record in human output
const PAYLOAD_PREVIEW: usize = 16;

#[derive(Parser)]
#[command(name = "ha-process-log")]
#[command(about = "Inspect HA process logs - replicated write sets recorded on a replica")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long)]
    pub format: Option<String>,

    /// Process log directory
    #[arg(short = 'd', long)]
    pub log_dir: Option<String>,

    /// Log filter, e.g. "debug" or "ha_process_log=trace"
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List process log files in commit order
    List,

    /// Dump the contents of one or more process log files
    Dump {
        /// Log files to read
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct ListEntry {
    commit_point: u64,
    file: PathBuf,
    bytes: u64,
}

fn config_from(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = &cli.log_dir {
        config.set_log_dir(PathBuf::from(dir));
    }
    if let Some(format) = &cli.format {
        config.set_output_format(format.clone());
    }
    if let Some(level) = &cli.log_level {
        config.set_log_level(level.clone());
    }
    config
}

fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| Error::Serialization(format!("Failed to serialize JSON: {}", e)))
}

fn print_log_human(log: &ProcessLog) {
    println!("{}", log.path.display());
    println!("  commit point: {}", log.commit_point());
    println!("  opening:      {}", log.opening);
    for record in &log.records {
        let msg = &record.message;
        match &record.payload {
            Some(payload) => {
                let shown = &payload[..payload.len().min(PAYLOAD_PREVIEW)];
                let ellipsis = if payload.len() > PAYLOAD_PREVIEW { "..." } else { "" };
                println!(
                    "  [{:>6}] size={} payload={}{}",
                    msg.sequence,
                    msg.size,
                    hex::encode(shown),
                    ellipsis
                );
            }
            None => println!("  [{:>6}] size={}", msg.sequence, msg.size),
        }
    }
    println!("  closing:      {}", log.closing);
    println!(
        "  {} record(s), {} payload byte(s)",
        log.records.len(),
        log.payload_bytes()
    );
}

pub fn run(cli: Cli) -> Result<()> {
    let config = config_from(&cli);
    logger::init(config.get_log_level())?;
    let json = config.get_output_format() == "json";

    match cli.command {
        Commands::List => {
            let mut entries = Vec::new();
            for file in list_logs(config.get_log_dir())? {
                let bytes = std::fs::metadata(&file)
                    .map_err(|e| Error::Io(format!("Failed to stat {}: {}", file.display(), e)))?
                    .len();
                if let Some(commit_point) = commit_point_of(&file) {
                    entries.push(ListEntry { commit_point, file, bytes });
                }
            }

            if json {
                println!("{}", to_json(&entries)?);
            } else if entries.is_empty() {
                println!("No process logs in {}", config.get_log_dir().display());
            } else {
                for entry in &entries {
                    println!("{:>20}  {:>10}  {}", entry.commit_point, entry.bytes, entry.file.display());
                }
            }
            Ok(())
        }

        Commands::Dump { files } => {
            let mut logs = Vec::new();
            let mut failures = 0usize;
            for file in files {
                match read_log(&file) {
                    Ok(log) => logs.push(log),
                    Err(e) => {
                        tracing::error!(file = %file.display(), error = %e, "failed to read process log");
                        failures += 1;
                    }
                }
            }

            if json {
                println!("{}", to_json(&logs)?);
            } else {
                for log in &logs {
                    print_log_human(log);
                }
            }

            if failures == 0 {
                Ok(())
            } else {
                Err(Error::CorruptLog(format!("{} file(s) could not be read", failures)))
            }
        }
    }
}
