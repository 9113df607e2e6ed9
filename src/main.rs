use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dockside::*;
use dockside::engine_repo::EngineRepo;
use dockside::inventory::{Inventory, KindSnapshot, Outcome};
use dockside::models::EntityKind;
use dockside::operations::{Mount, Operation, OperationParams, OperationRequest, PortBinding};
use dockside::presentation::TreeNode;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[derive(Parser)]
#[command(name = "dockside", version, about = "Container engine inventory and control")]
struct Cli {
    /// Config file (default: CONFIG_FILE, then ./dockside.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP/WebSocket API with periodic background refresh
    Serve,
    /// List one kind (containers, images, networks, volumes)
    List {
        kind: EntityKind,
        #[arg(long)]
        json: bool,
    },
    /// Show one kind as a tree with detail rows
    Tree { kind: EntityKind },
    Start { id: String },
    Stop { id: String },
    Restart { id: String },
    /// Print the tail of a container's logs
    Logs { id: String },
    /// Print the engine's JSON description of a container or image
    Inspect { id: String },
    /// Remove a container
    Rm {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Remove an image
    Rmi {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
    Pull { name: String },
    Tag { id: String, new_tag: String },
    /// Start a detached container from an image
    Run(RunArgs),
    /// Remove unused resources of one kind, or of all kinds
    Prune {
        target: PruneTarget,
        #[arg(short, long)]
        yes: bool,
    },
    /// Refresh all four kinds and report per-kind results
    Refresh,
}

#[derive(clap::Args)]
struct RunArgs {
    image: String,
    #[arg(long)]
    name: Option<String>,
    /// Publish all exposed ports
    #[arg(short = 'P', long)]
    publish_all: bool,
    /// [hostPort:]containerPort[/tcp|udp]
    #[arg(short = 'p', long = "publish")]
    ports: Vec<PortBinding>,
    /// KEY=VALUE
    #[arg(short = 'e', long = "env", value_parser = parse_env)]
    env: Vec<(String, String)>,
    /// source:destination[:ro]
    #[arg(long = "mount")]
    mounts: Vec<Mount>,
    #[arg(long)]
    network: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PruneTarget {
    Containers,
    Images,
    Volumes,
    Networks,
    All,
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = match &cli.config {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.level));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let repo = EngineRepo::new(Arc::new(app_config.engine.runner()));
    let inventory = Arc::new(
        Inventory::with_event_capacity(repo, app_config.refresh.broadcast_capacity)
            .with_logs_tail(app_config.engine.logs_tail),
    );

    let request = match cli.command {
        Command::Serve => return serve(inventory, &app_config).await,
        Command::List { kind, json } => {
            let snapshot = inventory.list(kind).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_listing(&snapshot);
            }
            return Ok(());
        }
        Command::Tree { kind } => {
            let snapshot = inventory.list(kind).await?;
            print_tree(&presentation::tree(&snapshot), 0);
            return Ok(());
        }
        Command::Refresh => {
            let report = inventory.refresh_all().await;
            for entry in &report {
                match (&entry.count, &entry.error) {
                    (Some(count), _) => println!("{:<10} {} items", entry.kind.as_str(), count),
                    (_, Some(error)) => println!("{:<10} failed: {}", entry.kind.as_str(), error),
                    _ => {}
                }
            }
            anyhow::ensure!(
                report.iter().all(|e| e.is_ok()),
                "some kinds could not be refreshed"
            );
            return Ok(());
        }
        Command::Start { id } => OperationRequest::new(Operation::Start, id),
        Command::Stop { id } => OperationRequest::new(Operation::Stop, id),
        Command::Restart { id } => OperationRequest::new(Operation::Restart, id),
        Command::Logs { id } => OperationRequest::new(Operation::Logs, id),
        Command::Inspect { id } => OperationRequest::new(Operation::Inspect, id),
        Command::Pull { name } => OperationRequest::new(Operation::Pull, name),
        Command::Rm { id, yes } => confirm(OperationRequest::new(Operation::RemoveContainer, id), yes)?,
        Command::Rmi { id, yes } => confirm(OperationRequest::new(Operation::RemoveImage, id), yes)?,
        Command::Tag { id, new_tag } => {
            OperationRequest::new(Operation::Tag, id).with_params(OperationParams {
                new_tag: Some(new_tag),
                ..Default::default()
            })
        }
        Command::Run(args) => OperationRequest::new(Operation::Run, args.image).with_params(
            OperationParams {
                name: args.name,
                publish_all_ports: args.publish_all,
                ports: args.ports,
                env: args.env.into_iter().collect::<BTreeMap<_, _>>(),
                mounts: args.mounts,
                network: args.network,
                ..Default::default()
            },
        ),
        Command::Prune { target, yes } => {
            let operation = match target {
                PruneTarget::Containers => Operation::PruneContainers,
                PruneTarget::Images => Operation::PruneImages,
                PruneTarget::Volumes => Operation::PruneVolumes,
                PruneTarget::Networks => Operation::PruneNetworks,
                PruneTarget::All => Operation::PruneAll,
            };
            confirm(OperationRequest::new(operation, ""), yes)?
        }
    };

    let outcome = inventory.execute(&request).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Marks a destructive request confirmed, asking on stdin unless `--yes` was given.
fn confirm(request: OperationRequest, yes: bool) -> Result<OperationRequest> {
    let Some(warning) = request.operation.warning(request.identifier.trim()) else {
        return Ok(request);
    };
    if yes {
        return Ok(request.confirmed());
    }
    eprint!("{} [y/N] ", warning.message);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    anyhow::ensure!(
        matches!(answer.trim(), "y" | "Y" | "yes"),
        "{} cancelled",
        request.operation
    );
    Ok(request.confirmed())
}

fn print_outcome(outcome: &Outcome) {
    let output = outcome.output.trim_end();
    if !output.is_empty() {
        println!("{}", output);
    }
    eprintln!("{}", outcome.message);
    for failure in &outcome.refresh_errors {
        eprintln!("warning: {} not refreshed: {}", failure.kind, failure.error);
    }
}

fn print_listing(snapshot: &KindSnapshot) {
    match snapshot {
        KindSnapshot::Containers(s) => {
            for c in &s.items {
                println!(
                    "{:<12}  {:<24}  {:<10}  {:<32}  {}",
                    short(&c.id),
                    c.name,
                    c.state.as_str(),
                    c.image.original_name,
                    c.status
                );
            }
        }
        KindSnapshot::Images(s) => {
            for i in &s.items {
                println!(
                    "{:<12}  {:<48}  {:>10.1} MB",
                    short(i.id.trim_start_matches("sha256:")),
                    i.image_ref.original_name,
                    i.size_bytes as f64 / (1024.0 * 1024.0)
                );
            }
        }
        KindSnapshot::Networks(s) => {
            for n in &s.items {
                println!("{:<12}  {:<32}  {:<10}  {}", short(&n.id), n.name, n.driver, n.scope);
            }
        }
        KindSnapshot::Volumes(s) => {
            for v in &s.items {
                println!("{:<48}  {:<10}  {}", v.name, v.driver, v.mountpoint);
            }
        }
    }
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn print_tree(nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        match &node.description {
            Some(description) => println!("{:indent$}{}  {}", "", node.label, description, indent = depth * 2),
            None => println!("{:indent$}{}", "", node.label, indent = depth * 2),
        }
        print_tree(&node.children, depth + 1);
    }
}

async fn serve(inventory: Arc<Inventory>, app_config: &config::AppConfig) -> Result<()> {
    let ws_event_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            inventory: inventory.clone(),
            ws_event_connections: ws_event_connections.clone(),
            shutdown_rx,
        },
        worker::WorkerConfig {
            refresh_interval_secs: app_config.refresh.interval_secs,
            stats_log_interval_secs: app_config.refresh.stats_log_interval_secs,
        },
    );

    let app = routes::app(inventory, ws_event_connections);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(engine = %app_config.engine.binary, "Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = worker_handle.await;
        }
    }

    Ok(())
}
