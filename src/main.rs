use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use replaykv::cache::{replay, InstrumentedCache, GET_OPERATION, STORE_OPERATION};
use replaykv::config::{Config, LogConfig};
use replaykv::fetch::{FetchCache, HttpFetcher};
use replaykv::StoredValue;

#[derive(Parser, Debug)]
#[command(name = "replaykv")]
#[command(about = "Instrumented key-value cache with call replay")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/replaykv/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Start a fresh session (clears the store), store each value and read it back
  Session {
    /// Values to store; integers and floats are detected, anything else is text
    #[arg(required = true)]
    values: Vec<String>,
  },

  /// Replay the recorded calls of an operation without modifying the store
  Replay {
    /// Operation name, e.g. "store" or "get"
    operation: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Fetch a URL through the fetch cache
  Fetch {
    url: String,

    /// How many times to request the URL
    #[arg(short = 'n', long, default_value_t = 1)]
    times: u32,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(&config.log)?;

  match args.command {
    Command::Session { values } => run_session(&config, &values),
    Command::Replay { operation, json } => run_replay(&config, &operation, json),
    Command::Fetch { url, times } => run_fetch(&config, &url, times).await,
  }
}

/// Install the tracing subscriber; the returned guard flushes file logs on drop.
fn init_logging(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.level))?;

  match &log.file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;

      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

fn run_session(config: &Config, values: &[String]) -> Result<()> {
  let cache = InstrumentedCache::new(config.open_store()?)?;

  for literal in values {
    let value = StoredValue::parse_literal(literal);
    let key = cache.store(value.clone())?;

    let read_back = match value {
      StoredValue::Int(_) => cache.get_int(&key)?.to_string(),
      StoredValue::Float(_) => cache.get_float(&key)?.to_string(),
      StoredValue::Text(_) | StoredValue::Bytes(_) => cache.get_str(&key)?,
    };
    println!("{} -> {}", key, read_back);
  }

  println!();
  println!("{}", cache.replay(STORE_OPERATION)?);
  println!();
  println!("{}", cache.replay(GET_OPERATION)?);
  Ok(())
}

fn run_replay(config: &Config, operation: &str, json: bool) -> Result<()> {
  let store = config.open_store()?;
  let report = replay(store.as_ref(), operation)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    println!("{}", report);
  }
  Ok(())
}

async fn run_fetch(config: &Config, url: &str, times: u32) -> Result<()> {
  let store = config.open_store()?;
  let fetcher = HttpFetcher::from_config(&config.fetch)?;
  let cache = FetchCache::new(store, fetcher)
    .with_ttl(config.fetch.ttl())
    .with_policy(config.fetch.policy());

  for attempt in 1..=times {
    let result = cache.get_detailed(url).await?;
    println!(
      "#{} {} ({} bytes)",
      attempt,
      result.source.as_str(),
      result.content.len()
    );
  }

  println!(
    "{} was fetched {} time(s)",
    url,
    cache.access_count(url)?
  );
  Ok(())
}
