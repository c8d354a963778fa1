use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use quorum_lite::config::ElectorConfig;
use quorum_lite::directory::{LocalDirectory, PeerDirectory, PeerId};
use quorum_lite::election::StateSnapshot;
use quorum_lite::node::Elector;

#[derive(Parser, Debug)]
#[command(name = "quorum-lite")]
#[command(version)]
#[command(about = "Raft-style leader election over an in-process peer group")]
struct Args {
    /// Number of elector processes to run in this demo cluster
    #[arg(long, default_value = "3")]
    nodes: u64,

    /// Expected peer count used for quorum (defaults to --nodes)
    #[arg(long)]
    cluster_size: Option<usize>,

    /// How often to print a cluster snapshot
    #[arg(long, default_value = "2000")]
    inspect_interval_ms: u64,

    /// Output format for snapshots
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct NodeView {
    node_id: PeerId,
    is_leader: bool,
    #[serde(flatten)]
    snapshot: StateSnapshot,
}

async fn cluster_view(electors: &[Elector]) -> Vec<NodeView> {
    let mut views = Vec::with_capacity(electors.len());
    for elector in electors {
        if let Ok(snapshot) = elector.inspect().await {
            views.push(NodeView {
                node_id: elector.id(),
                is_leader: elector.is_leader(),
                snapshot,
            });
        }
    }
    views
}

fn print_view(views: &[NodeView], output: &OutputFormat) {
    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(views) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize snapshot: {}", e),
        },
        OutputFormat::Table => {
            println!("{:<8} {:<11} {:<6} {:<8} LEADER", "NODE", "ROLE", "TERM", "VOTES");
            println!("{}", "-".repeat(45));
            for view in views {
                let leader = view
                    .snapshot
                    .leader
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:<11} {:<6} {:<8} {}",
                    view.node_id,
                    view.snapshot.role.to_string(),
                    view.snapshot.term,
                    view.snapshot.votes_received.len() + 1,
                    leader
                );
            }
            println!();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cluster_size = args.cluster_size.unwrap_or(args.nodes as usize);

    tracing::info!(
        nodes = args.nodes,
        cluster_size,
        "Starting demo election cluster"
    );

    let directory = LocalDirectory::new();
    let mut electors = Vec::new();

    for node_id in 1..=args.nodes {
        let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
        let config = ElectorConfig::new(node_id, cluster_size).with_subscription(changes_tx);

        tokio::spawn(async move {
            while let Some(change) = changes_rx.recv().await {
                tracing::info!(
                    node_id,
                    leader = ?change.leader,
                    term = change.term,
                    "Leadership changed"
                );
            }
        });

        let elector = Elector::spawn(
            config,
            Arc::clone(&directory) as Arc<dyn PeerDirectory>,
        )
        .await?;
        electors.push(elector);
    }

    let mut interval = tokio::time::interval(Duration::from_millis(args.inspect_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received ctrl-c, shutting down");
                break;
            }
            _ = interval.tick() => {
                let views = cluster_view(&electors).await;
                print_view(&views, &args.output);
            }
        }
    }

    for elector in &electors {
        elector.shutdown().await;
    }

    Ok(())
}
