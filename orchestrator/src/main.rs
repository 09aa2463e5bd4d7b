//! Main entry point for the orchestrator binary
//!
//! Wires the orchestrator to the in-process services. Task events can be fed
//! from a JSON-lines file or stdin; without `--events` the process runs until
//! Ctrl+C. Ctrl+C also ends a feed that is still reading or waiting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tokio::sync::watch;

use orchestrator::{
    build_candidate_source, feed,
    services::{BusDeliveryTransport, InMemoryEventBus, InMemoryProfileStore, InMemoryProposalStore},
    types::Proposal,
    CandidateStrategy, MetricsSnapshot, Orchestrator, OrchestratorConfig, ProposalStore, WeightedScorer,
};
use shared::{logging, service_info, service_warn, LogFormat, ServiceId};

/// Matching orchestrator: turns task-created events into scored worker proposals
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Matches tasks to workers and delivers time-bound proposals")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format (compact, json)
    #[arg(long, default_value = "compact")]
    pub log_format: LogFormat,

    /// Candidate resolution strategy (indexed, direct)
    #[arg(long)]
    pub strategy: Option<CandidateStrategy>,

    #[arg(long)]
    pub max_concurrent_tasks: Option<usize>,

    #[arg(long)]
    pub max_proposals_per_task: Option<usize>,

    #[arg(long)]
    pub proposal_ttl_secs: Option<u64>,

    #[arg(long)]
    pub task_timeout_secs: Option<u64>,

    #[arg(long)]
    pub metrics_interval_secs: Option<u64>,

    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Seconds shutdown waits for in-flight tasks before cancelling them
    #[arg(long)]
    pub shutdown_grace_secs: Option<u64>,

    /// Suppress task ids seen again within this many seconds (0 disables)
    #[arg(long)]
    pub duplicate_window_secs: Option<u64>,

    /// JSON file with the worker profiles to seed the profile store
    #[arg(long)]
    pub profiles: Option<PathBuf>,

    /// JSON-lines file of task-created events, or `-` for stdin
    #[arg(long)]
    pub events: Option<String>,

    /// Write proposals and final metrics as JSON on shutdown
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Apply command-line overrides on top of environment configuration
    fn apply(&self, config: &mut OrchestratorConfig) {
        if let Some(strategy) = self.strategy {
            config.candidate_strategy = strategy;
        }
        if let Some(v) = self.max_concurrent_tasks {
            config.max_concurrent_tasks = v;
        }
        if let Some(v) = self.max_proposals_per_task {
            config.max_proposals_per_task = v;
        }
        if let Some(v) = self.proposal_ttl_secs {
            config.proposal_ttl = Duration::from_secs(v);
        }
        if let Some(v) = self.task_timeout_secs {
            config.task_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.metrics_interval_secs {
            config.metrics_interval = Duration::from_secs(v);
        }
        if let Some(v) = self.sweep_interval_secs {
            config.sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = self.shutdown_grace_secs {
            config.shutdown_grace = Duration::from_secs(v);
        }
        if let Some(v) = self.duplicate_window_secs {
            config.duplicate_window = (v > 0).then(|| Duration::from_secs(v));
        }
    }
}

/// Written to `--output` after shutdown
#[derive(Serialize)]
struct RunReport {
    metrics: MetricsSnapshot,
    proposals: Vec<Proposal>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    ServiceId::init_orchestrator();
    logging::init_tracing(Some(&args.log_level), args.log_format);

    let mut config = OrchestratorConfig::from_env().context("loading configuration from environment")?;
    args.apply(&mut config);

    let profiles = match &args.profiles {
        Some(path) => InMemoryProfileStore::load_json(path)
            .await
            .with_context(|| format!("loading worker profiles from {}", path.display()))?,
        None => {
            service_warn!("No --profiles given, profile store starts empty");
            InMemoryProfileStore::new()
        }
    };
    let profiles = Arc::new(profiles);

    let bus = Arc::new(InMemoryEventBus::new());
    let store = Arc::new(InMemoryProposalStore::new());
    let transport = Arc::new(BusDeliveryTransport::new(Arc::clone(&bus)));
    let source = build_candidate_source(&config, profiles);
    let scorer = Arc::new(WeightedScorer::new(config.score_weights));

    let mut orchestrator = Orchestrator::new(config, Arc::clone(&bus), Arc::clone(&store), transport, source, scorer)?;
    orchestrator.initialize().await?;

    // Set up graceful shutdown
    let shutdown_sender = orchestrator.get_shutdown_sender();
    let ctrl_c_sender = shutdown_sender.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(ServiceId::current(), "Received Ctrl+C signal");
                let _ = ctrl_c_sender.send(()).await;
            }
            Err(err) => {
                logging::log_error(ServiceId::current(), "Signal handling", &err);
            }
        }
    });

    let (stop_feed, feed_stopped) = watch::channel(false);
    let feeder = match args.events.as_deref() {
        Some(source) => {
            let lines = feed::open_lines(source)
                .await
                .with_context(|| format!("opening event source {source}"))?;
            let bus = Arc::clone(&bus);
            let metrics = orchestrator.metrics();
            Some(tokio::spawn(async move {
                let result = feed::feed_events(lines, &*bus, &metrics, feed_stopped).await;
                if let Err(e) = &result {
                    logging::log_error(ServiceId::current(), "Event feed", e);
                }
                let _ = shutdown_sender.send(()).await;
                result
            }))
        }
        None => None,
    };

    orchestrator.run().await?;

    // Whatever ended the run, the feed must not outlive it
    let _ = stop_feed.send(true);
    if let Some(feeder) = feeder {
        let published = feeder.await.context("event feeder task")??;
        service_info!(published, "Event feed finished");
    }

    if let Some(path) = &args.output {
        let report = RunReport {
            metrics: orchestrator.final_snapshot(),
            proposals: store.snapshot().await?,
        };
        let json = serde_json::to_vec_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing report to {}", path.display()))?;
        service_info!(path = %path.display(), proposals = report.proposals.len(), "💾 Report written");
    }

    logging::log_success(ServiceId::current(), "Orchestrator stopped gracefully");
    Ok(())
}
