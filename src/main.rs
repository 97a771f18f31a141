use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use gh_store::{Config, Snapshot, StoreClient};

#[derive(Parser, Debug)]
#[command(name = "gh-store")]
#[command(about = "A versioned object store backed by GitHub issues")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/gh-store/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Repository in owner/name form, overrides the config file
  #[arg(short, long)]
  repo: Option<String>,

  /// Write logs to a daily file in this directory instead of stderr
  #[arg(long)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the current state of an object
  Get { id: String },

  /// Create a new object from a JSON document
  Create {
    id: String,
    data: String,
    /// Additional label for the backing issue (repeatable)
    #[arg(short, long = "label")]
    labels: Vec<String>,
  },

  /// Append an update to an existing object
  Update { id: String, data: String },

  /// List every canonical object
  List {
    /// Only objects updated after this RFC 3339 timestamp
    #[arg(long)]
    since: Option<DateTime<Utc>>,
  },

  /// Print the event log of an object
  History { id: String },

  /// List objects with updates awaiting reconciliation
  Pending,

  /// Export every object to a JSON file
  Snapshot {
    #[arg(short, long)]
    output: PathBuf,
    /// Merge changes into an existing export instead of rebuilding it
    #[arg(long)]
    incremental: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.log_dir.as_deref());

  let config = match (&args.repo, &args.config) {
    (Some(repo), None) => Config::load_or_repo(repo)?,
    _ => Config::load(args.config.as_deref())?,
  };

  // Override repo if specified on command line
  let config = if let Some(repo) = args.repo {
    Config {
      github: gh_store::config::GithubConfig {
        repo,
        ..config.github
      },
      ..config
    }
  } else {
    config
  };

  let store = StoreClient::from_config(&config, Config::get_token())?;

  match args.command {
    Command::Get { id } => print_json(&store.get_object(&id).await?),
    Command::Create { id, data, labels } => {
      let data = parse_data(&data)?;
      print_json(&store.create_object(&id, &data, &labels).await?)
    }
    Command::Update { id, data } => {
      let data = parse_data(&data)?;
      print_json(&store.update_object(&id, &data).await?)
    }
    Command::List { since } => {
      let objects = match since {
        Some(since) => store.list_updated_since(since).await?,
        None => store.list_all().await?,
      };
      print_json(&objects)
    }
    Command::History { id } => print_json(&store.get_object_history(&id).await?),
    Command::Pending => {
      for (id, number) in store.list_pending().await? {
        println!("{}\t#{}", id, number);
      }
      Ok(())
    }
    Command::Snapshot { output, incremental } => {
      write_snapshot(&store, &config.github.repo, &output, incremental).await
    }
  }
}

async fn write_snapshot(
  store: &StoreClient,
  repository: &str,
  output: &Path,
  incremental: bool,
) -> Result<()> {
  let snapshot = if incremental && output.exists() {
    let mut snapshot = Snapshot::load(output)?;
    if snapshot.repository != repository {
      return Err(eyre!(
        "Snapshot {} belongs to {}, not {}",
        output.display(),
        snapshot.repository,
        repository
      ));
    }
    let changed = snapshot.refresh(store).await?;
    eprintln!("Updated {} objects", changed);
    snapshot
  } else {
    let snapshot = Snapshot::capture(store, repository).await?;
    eprintln!("Exported {} objects", snapshot.objects.len());
    snapshot
  };

  snapshot.save(output)?;
  Ok(())
}

fn parse_data(raw: &str) -> Result<serde_json::Value> {
  serde_json::from_str(raw).map_err(|e| eyre!("Invalid JSON data: {}", e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env("GH_STORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

  match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "gh-store.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      None
    }
  }
}
