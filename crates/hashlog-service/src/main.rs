//! hashlog command-line tool.
//!
//! `hashlog serve` runs the log server. The other subcommands call a
//! running server, or with `--dir` work on a log directory in-process.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures_util::{future, Stream, StreamExt};
use hashlog::store::{FileStore, FileStoreConfig, SyncPolicy};
use hashlog::{
    CancellationToken, EngineConfig, EngineError, Entry, LogEngine, ReadOptions, TailOptions,
};
use hashlog_service::{
    AppendResponse, LogClient, LogServer, LogService, ServerConfig, VerifyResponse,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hashlog", version, about = "Partitioned, hash-chained event log")]
struct Args {
    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the log server
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 50051)]
        port: u16,
        /// Base directory for partition files
        #[arg(long, default_value = "logs")]
        dir: PathBuf,
        /// Maximum concurrent requests
        #[arg(long, default_value_t = 10)]
        workers: usize,
        /// Tail poll interval in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_interval_ms: u64,
        /// fdatasync after every append
        #[arg(long)]
        sync: bool,
    },
    /// Append a JSON payload ('-' reads stdin)
    Append {
        partition: String,
        data: String,
        #[command(flatten)]
        target: Target,
    },
    /// Print entries of a partition
    Read {
        partition: String,
        /// Starting sequence number
        #[arg(long)]
        start: Option<u64>,
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<u64>,
        #[command(flatten)]
        target: Target,
    },
    /// Print entries, optionally following new ones
    Tail {
        partition: String,
        /// Follow the log (like tail -f)
        #[arg(long, short)]
        follow: bool,
        /// Starting sequence number
        #[arg(long)]
        start: Option<u64>,
        /// Show only the last N entries
        #[arg(short = 'n', long = "last", value_name = "N")]
        last: Option<u64>,
        #[command(flatten)]
        target: Target,
    },
    /// Verify a partition's hash chain
    Verify {
        partition: String,
        #[command(flatten)]
        target: Target,
    },
    /// List partitions
    List {
        #[command(flatten)]
        target: Target,
    },
    /// Print the last entry of a partition
    Last {
        partition: String,
        #[command(flatten)]
        target: Target,
    },
}

/// Where client commands run.
#[derive(clap::Args, Debug)]
struct Target {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:50051")]
    addr: String,
    /// Open this log directory directly instead of calling a server
    #[arg(long, conflicts_with = "addr")]
    dir: Option<PathBuf>,
}

impl Target {
    fn backend(&self) -> anyhow::Result<Backend> {
        match &self.dir {
            Some(dir) => {
                let store = FileStore::open(dir)
                    .with_context(|| format!("failed to open log directory {}", dir.display()))?;
                Ok(Backend::Local(LogService::new(LogEngine::with_store(store))))
            }
            None => Ok(Backend::Remote(LogClient::new(self.addr.clone()))),
        }
    }
}

type Entries = Pin<Box<dyn Stream<Item = anyhow::Result<Entry>> + Send>>;

/// A running server, or a log directory opened in-process.
enum Backend {
    Remote(LogClient),
    Local(LogService<FileStore>),
}

impl Backend {
    async fn append(&self, partition: &str, data: &str) -> anyhow::Result<AppendResponse> {
        match self {
            Backend::Remote(client) => Ok(client.append(partition, data).await?),
            Backend::Local(service) => Ok(service.append(partition, data).await),
        }
    }

    async fn read(
        &self,
        partition: &str,
        start: Option<u64>,
        limit: Option<u64>,
    ) -> anyhow::Result<Entries> {
        match self {
            Backend::Remote(client) => {
                let stream = client.read(partition, start, limit).await?;
                Ok(Box::pin(stream.map(|item| item.map_err(anyhow::Error::from))))
            }
            Backend::Local(service) => {
                let options = ReadOptions {
                    start_seq: start.unwrap_or(0),
                    limit,
                };
                let stream = service.engine().read(partition, options).await?;
                Ok(Box::pin(stream.map(|item| item.map_err(anyhow::Error::from))))
            }
        }
    }

    /// Both backends end the stream quietly once `cancel` fires.
    async fn tail(
        &self,
        partition: &str,
        options: TailOptions,
        cancel: CancellationToken,
    ) -> anyhow::Result<Entries> {
        match self {
            Backend::Remote(client) => {
                let stream = client.tail(partition, options, cancel).await?;
                Ok(Box::pin(stream.map(|item| item.map_err(anyhow::Error::from))))
            }
            Backend::Local(service) => {
                let stream = service.engine().tail(partition, options, cancel).await?;
                Ok(Box::pin(
                    stream
                        .take_while(|item| {
                            future::ready(!matches!(item, Err(EngineError::Cancelled)))
                        })
                        .map(|item| item.map_err(anyhow::Error::from)),
                ))
            }
        }
    }

    async fn verify(&self, partition: &str) -> anyhow::Result<VerifyResponse> {
        match self {
            Backend::Remote(client) => Ok(client.verify(partition).await?),
            Backend::Local(service) => Ok(service.verify(partition).await),
        }
    }

    async fn list_partitions(&self) -> anyhow::Result<Vec<String>> {
        match self {
            Backend::Remote(client) => Ok(client.list_partitions().await?),
            Backend::Local(service) => Ok(service
                .engine()
                .list_partitions()
                .await?
                .into_iter()
                .collect()),
        }
    }

    async fn get_last_entry(&self, partition: &str) -> anyhow::Result<Option<Entry>> {
        match self {
            Backend::Remote(client) => Ok(client.get_last_entry(partition).await?),
            Backend::Local(service) => Ok(service.engine().get_last_entry(partition).await?),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Serve {
            port,
            dir,
            workers,
            poll_interval_ms,
            sync,
        } => serve(port, dir, workers, poll_interval_ms, sync).await,
        Command::Append {
            partition,
            data,
            target,
        } => append(&target.backend()?, &partition, data).await,
        Command::Read {
            partition,
            start,
            limit,
            target,
        } => {
            let stream = target.backend()?.read(&partition, start, limit).await?;
            print_entries(stream).await
        }
        Command::Tail {
            partition,
            follow,
            start,
            last,
            target,
        } => {
            let options = TailOptions {
                start_seq: start.unwrap_or(0),
                follow,
                last,
            };
            tail(&target.backend()?, &partition, options).await
        }
        Command::Verify { partition, target } => verify(&target.backend()?, &partition).await,
        Command::List { target } => {
            let partitions = target.backend()?.list_partitions().await?;
            if partitions.is_empty() {
                println!("No partitions found");
            } else {
                println!("Available partitions:");
                for p in partitions {
                    println!("  - {}", p);
                }
            }
            Ok(())
        }
        Command::Last { partition, target } => {
            let entry = last(&target.backend()?, &partition).await?;
            println!("{}", entry_json(&entry)?);
            Ok(())
        }
    }
}

fn init_tracing(verbosity: u8) {
    let mut filter = EnvFilter::from_default_env();

    // Only apply defaults if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        let level = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        if let Ok(directive) = level.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(
    port: u16,
    dir: PathBuf,
    workers: usize,
    poll_interval_ms: u64,
    sync: bool,
) -> anyhow::Result<()> {
    let store_config = FileStoreConfig {
        sync: if sync {
            SyncPolicy::Fsync
        } else {
            SyncPolicy::Buffered
        },
        ..Default::default()
    };
    let store = FileStore::open_with_config(&dir, store_config)
        .with_context(|| format!("failed to open log directory {}", dir.display()))?;
    let engine = LogEngine::new(
        store,
        EngineConfig {
            tail_poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
        },
    );
    let config = ServerConfig {
        listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        max_workers: workers,
        ..Default::default()
    };

    tracing::info!("hashlog v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(dir = %dir.display(), workers, "serving partitions");

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(LogServer::new(engine, config).run(shutdown.clone()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received...");
    shutdown.cancel();

    server.await.context("server task failed")??;
    Ok(())
}

async fn append(backend: &Backend, partition: &str, data: String) -> anyhow::Result<()> {
    let data = if data == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        buf
    } else {
        data
    };

    let resp = backend.append(partition, &data).await?;
    if !resp.success {
        bail!(
            "failed to append: {}",
            resp.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    println!("Appended entry {} to partition '{}'", resp.seq, partition);
    println!("  Hash: {}...", &resp.hash[..resp.hash.len().min(16)]);
    Ok(())
}

async fn tail(backend: &Backend, partition: &str, options: TailOptions) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    if options.follow {
        eprintln!("# Following partition '{}' (Ctrl+C to stop)...", partition);
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            on_signal.cancel();
        });
    }

    let stream = backend.tail(partition, options, cancel.clone()).await?;
    print_entries(stream).await?;
    if cancel.is_cancelled() {
        eprintln!("# Stopped following");
    }
    Ok(())
}

async fn verify(backend: &Backend, partition: &str) -> anyhow::Result<()> {
    println!("Verifying partition '{}'...", partition);
    let resp = backend.verify(partition).await?;
    if resp.valid {
        println!("Verified {} entries - chain is valid", resp.entries_verified);
        println!("  Final hash: {}", resp.final_hash.unwrap_or_default());
        return Ok(());
    }

    let location = match (resp.failed_index, resp.violation.as_deref()) {
        (Some(index), Some(kind)) => format!(" (entry {}, {})", index, kind),
        (None, Some(kind)) => format!(" ({})", kind),
        _ => String::new(),
    };
    bail!(
        "verification failed{}: {}",
        location,
        resp.error.unwrap_or_else(|| "unknown error".into())
    )
}

async fn last(backend: &Backend, partition: &str) -> anyhow::Result<Entry> {
    match backend.get_last_entry(partition).await? {
        Some(entry) => Ok(entry),
        None => bail!("partition '{}' is empty or does not exist", partition),
    }
}

async fn print_entries(mut stream: Entries) -> anyhow::Result<()> {
    while let Some(entry) = stream.next().await {
        println!("{}", entry_json(&entry?)?);
    }
    Ok(())
}

fn entry_json(entry: &Entry) -> anyhow::Result<String> {
    Ok(entry.to_line()?)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                tracing::warn!("failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
