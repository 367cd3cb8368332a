use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use udp_fold::config::{
    parse_coordinator_addr, CoordinatorConfig, WorkerConfig, DEFAULT_COORDINATOR_PORT,
    DEFAULT_WORKER_PORT,
};
use udp_fold::coordinator::Coordinator;
use udp_fold::error::FoldError;
use udp_fold::hooks::LogHooks;
use udp_fold::protocol::transport::local_ip;
use udp_fold::scheduler::{JobReport, WorkerRecord};
use udp_fold::shutdown::install_shutdown_handler;
use udp_fold::worker::WorkerRuntime;

#[derive(Parser, Debug)]
#[command(name = "udp-fold")]
#[command(version)]
#[command(about = "Split a numeric dataset across UDP workers and fold their statistics")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the coordinator and process one or more jobs
    Coordinator(CoordinatorArgs),

    /// Run a worker that registers with a coordinator
    Worker(WorkerArgs),
}

// =============================================================================
// Coordinator Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct CoordinatorArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// UDP port workers send to
    #[arg(long, default_value_t = DEFAULT_COORDINATOR_PORT)]
    port: u16,

    /// Number of generated elements per job
    #[arg(long, default_value = "100000")]
    dataset_size: usize,

    /// Number of jobs to run back to back
    #[arg(long, default_value = "1")]
    jobs: u32,

    /// Workers required before a job is dispatched
    #[arg(long, default_value = "2")]
    quorum: usize,

    /// Upper bound on elements per chunk
    #[arg(long, default_value = "10000")]
    max_chunk_size: usize,

    /// Seconds before an unanswered chunk is retransmitted
    #[arg(long, default_value = "30")]
    result_timeout_secs: u64,

    /// Retransmissions to one worker before moving the chunk to another.
    /// Unset retransmits to the same worker indefinitely.
    #[arg(long)]
    max_retransmits: Option<u32>,

    /// Output format for the job report
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

// =============================================================================
// Worker Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct WorkerArgs {
    /// Coordinator address, "host" or "host:port"
    #[arg(long, short = 'c')]
    coordinator: String,

    /// Local UDP port to bind
    #[arg(long, default_value_t = DEFAULT_WORKER_PORT)]
    port: u16,

    /// Seconds between heartbeats
    #[arg(long, default_value = "5")]
    heartbeat_secs: u64,

    /// REGISTER attempts before giving up
    #[arg(long, default_value = "5")]
    registration_attempts: u32,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct WorkerOutput {
    address: String,
    state: String,
    tasks_completed: u64,
    last_seen_secs: f64,
}

#[derive(Serialize)]
struct CoordinatorOutput<'a> {
    report: &'a JobReport,
    workers: Vec<WorkerOutput>,
}

fn worker_outputs(workers: &[WorkerRecord]) -> Vec<WorkerOutput> {
    workers
        .iter()
        .map(|w| WorkerOutput {
            address: w.addr.to_string(),
            state: w.state.to_string(),
            tasks_completed: w.tasks_completed,
            last_seen_secs: w.silent_for().as_secs_f64(),
        })
        .collect()
}

fn print_report(
    report: &JobReport,
    workers: &[WorkerRecord],
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => {
            let output = CoordinatorOutput {
                report,
                workers: worker_outputs(workers),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let agg = &report.aggregate;
            println!("Final Results (job {})", report.job_id);
            println!("{}", "=".repeat(50));
            println!("Total Elements:  {}", agg.total_count);
            println!("Total Sum:       {}", agg.total_sum);
            println!("Average:         {:.2}", agg.average);
            println!("Minimum:         {}", agg.min);
            println!("Maximum:         {}", agg.max);
            println!("Processing Time: {:.2} seconds", agg.elapsed_secs);
            println!("Throughput:      {:.0} elements/second", agg.throughput);
            println!(
                "Chunks:          {} dispatched, {} rejected, {} retransmissions",
                report.chunks_dispatched, report.chunks_rejected, report.retransmissions
            );
            println!();
            println!("{:<25} {:<8} {:>10} {:>12}", "WORKER", "STATE", "COMPLETED", "LAST SEEN");
            println!("{}", "-".repeat(58));
            for w in worker_outputs(workers) {
                println!(
                    "{:<25} {:<8} {:>10} {:>11.1}s",
                    w.address, w.state, w.tasks_completed, w.last_seen_secs
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// Coordinator
// =============================================================================

async fn run_coordinator(args: CoordinatorArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.dataset_size == 0 {
        return Err("Dataset size must be positive".into());
    }

    let config = CoordinatorConfig {
        quorum: args.quorum,
        max_chunk_size: args.max_chunk_size,
        result_timeout_ms: args.result_timeout_secs.saturating_mul(1000),
        max_retransmits: args.max_retransmits,
        ..CoordinatorConfig::new(SocketAddr::new(args.host, args.port))
    };

    let coordinator = Coordinator::bind(config, Arc::new(LogHooks)).await?;
    if args.host.is_unspecified() {
        tracing::info!(
            reachable_at = %SocketAddr::new(local_ip().await, args.port),
            "Workers should use this coordinator address"
        );
    }

    let shutdown = install_shutdown_handler("coordinator")?;
    let tasks = coordinator.start();
    {
        let coordinator = coordinator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            coordinator.shutdown();
        });
    }

    let mut outcome = Ok(());
    for job in 1..=args.jobs {
        tracing::info!(job, of = args.jobs, dataset_size = args.dataset_size, "Processing started");
        match coordinator.run_generated_job(args.dataset_size).await {
            Ok(report) => {
                let workers = coordinator.workers().await;
                print_report(&report, &workers, &args.output)?;
            }
            Err(FoldError::Shutdown) => break,
            Err(e) => {
                tracing::error!(error = %e, "Job failed");
                outcome = Err(e.into());
                break;
            }
        }
    }

    coordinator.shutdown();
    for task in tasks {
        let _ = task.await;
    }
    outcome
}

// =============================================================================
// Worker
// =============================================================================

async fn run_worker(args: WorkerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator_addr = parse_coordinator_addr(&args.coordinator)?;
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    let config = WorkerConfig {
        heartbeat_interval_ms: args.heartbeat_secs.saturating_mul(1000),
        registration_attempts: args.registration_attempts,
        ..WorkerConfig::new(listen_addr, coordinator_addr)
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        coordinator = %config.coordinator_addr,
        "Starting worker"
    );

    let worker = Arc::new(WorkerRuntime::bind(config, Arc::new(LogHooks)).await?);

    let shutdown = install_shutdown_handler("worker")?;
    {
        let worker = worker.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            worker.stop();
        });
    }

    worker.run().await?;
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Coordinator(coordinator_args) => run_coordinator(coordinator_args).await?,
        Commands::Worker(worker_args) => run_worker(worker_args).await?,
    }

    Ok(())
}
