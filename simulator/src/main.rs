use anyhow::Context;
use clap::Parser;
use incidentcore::lifecycle::{ShutdownRequest, ShutdownSignal};
use log::{error, info, warn};
use status_bridge::bridge::StatusBridge;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::task::JoinHandle;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod status_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic camera driver for the incident core")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Exclusion zone key file with a [contours] group
    #[arg(long)]
    zones: Option<PathBuf>,
    #[arg(long, default_value = "0")]
    camera_id: String,
    #[arg(long)]
    frames: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Keep a looping stream recording alongside incident clips
    #[arg(long, default_value_t = false)]
    stream_record: bool,
    /// Serve GET /status while the run is in progress
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,
    #[arg(long, default_value = "tools/data/offline_incidents.log")]
    report: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::from_args(&args.camera_id, 3_000, 0),
    }
    .with_overrides(args.zones.clone(), args.stream_record, args.frames, args.seed);

    let bridge = args.serve.then(|| StatusBridge::serve(args.bind));
    let runner = Runner::new(workflow_config);
    let shutdown = Arc::new(ShutdownSignal::new());

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    let worker = {
        let runner = runner.clone();
        let shutdown = shutdown.clone();
        let bridge = bridge.clone();
        runtime.spawn_blocking(move || runner.execute(&shutdown, bridge.as_ref()))
    };
    let result = runtime.block_on(supervise(worker, shutdown))?;

    println!(
        "Run -> frames {}, alarms {}, incidents {}, segments {}, dropped {}",
        result.frames,
        result.triggered,
        result.published.len(),
        result.renamed.len(),
        result.dropped
    );
    write_report(&args.report, runner.config().engine.camera_id.as_str(), &result)?;

    if args.serve {
        info!("status endpoint still up (Ctrl+C to exit)");
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

/// Waits for the workflow while counting Ctrl+C presses; the third one
/// exits without waiting for the recording channels.
async fn supervise(
    mut worker: JoinHandle<anyhow::Result<WorkflowResult>>,
    shutdown: Arc<ShutdownSignal>,
) -> anyhow::Result<WorkflowResult> {
    loop {
        tokio::select! {
            joined = &mut worker => {
                return joined.context("workflow thread failed")?;
            }
            interrupt = signal::ctrl_c() => {
                interrupt.context("listening for Ctrl+C")?;
                match shutdown.request() {
                    ShutdownRequest::Graceful => {
                        warn!("interrupt {} received, stopping recordings", shutdown.count());
                    }
                    ShutdownRequest::Force => {
                        error!("repeated interrupt, exiting without waiting for the encoder");
                        std::process::exit(130);
                    }
                }
            }
        }
    }
}

fn write_report(path: &Path, camera_id: &str, result: &WorkflowResult) -> anyhow::Result<()> {
    let status = serde_json::to_string(&result.status).context("serializing channel status")?;
    let report = format!(
        concat!(
            "camera={} frames={} bursts={} alarms={} incidents={} ",
            "segments={} dropped={} stopped_early={} status={}\n",
        ),
        camera_id,
        result.frames,
        result.bursts,
        result.triggered,
        result.published.len(),
        result.renamed.len(),
        result.dropped,
        result.stopped_early,
        status
    );
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    file.write_all(report.as_bytes())?;
    Ok(())
}
