//! Command line demo for the inference scheduler, model cache and camera
//! stream pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use inference_core::config::{BroadcasterConfig, CameraConfig, ModelCacheConfig, SchedulerConfig};
use inference_core::{
    Broadcaster, JobDescriptor, JobKind, JobParams, ModelCache, Scheduler, StreamManager,
    SyntheticProvider, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(name = "inference-cli")]
#[command(about = "Demo CLI for the inference scheduler and camera stream pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a synthetic detection job and print its outcome
    Submit {
        /// Model reference the job should run against
        #[arg(short, long, default_value = "yolov8n")]
        model: String,

        /// Job priority; higher runs sooner
        #[arg(short, long, default_value_t = 0)]
        priority: i32,

        /// Minimum confidence the provider should report
        #[arg(long)]
        confidence_threshold: Option<f32>,
    },

    /// Print scheduler and model cache stats as JSON
    Stats,

    /// Run a synthetic camera for a few seconds and report motion stats
    Camera {
        /// Camera id to register
        #[arg(short, long, default_value = "cam-demo")]
        id: String,

        /// How long to run the demo, in seconds
        #[arg(short, long, default_value_t = 3)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level.parse().unwrap_or(tracing::Level::WARN))
        .init();

    match cli.command {
        Commands::Submit {
            model,
            priority,
            confidence_threshold,
        } => run_submit(&model, priority, confidence_threshold)?,
        Commands::Stats => run_stats()?,
        Commands::Camera { id, seconds } => run_camera(&id, seconds)?,
    }

    Ok(())
}

fn build_scheduler() -> (Arc<Scheduler>, Arc<ModelCache>) {
    let provider = Arc::new(SyntheticProvider::default());
    let model_cache = Arc::new(ModelCache::new(ModelCacheConfig::default(), provider.clone()));
    let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), provider, model_cache.clone()));
    (scheduler, model_cache)
}

fn run_submit(model: &str, priority: i32, confidence_threshold: Option<f32>) -> Result<()> {
    let (scheduler, _model_cache) = build_scheduler();
    scheduler.start();

    let descriptor = JobDescriptor {
        model_ref: model.to_string(),
        payload: vec![0xFF, 0xD8, 0xFF, 0xE0],
        kind: JobKind::Detect,
        params: JobParams {
            confidence_threshold,
            ..JobParams::default()
        },
        priority,
    };

    let id = scheduler.submit(descriptor).context("submitting job")?;
    for _ in 0..100 {
        let view = scheduler.status(id).context("reading job status")?;
        if view.outcome.is_some() {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "job_id": id.to_string(),
                "status": format!("{:?}", view.status),
            }))?);
            scheduler.stop();
            return Ok(());
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    scheduler.stop();
    anyhow::bail!("job {id} did not complete in time")
}

fn run_stats() -> Result<()> {
    let (scheduler, model_cache) = build_scheduler();
    scheduler.start();
    let stats = scheduler.stats();
    let cache_stats = model_cache.stats();
    scheduler.stop();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "scheduler": stats,
            "model_cache": cache_stats,
        }))?
    );
    Ok(())
}

fn run_camera(camera_id: &str, seconds: u64) -> Result<()> {
    let (scheduler, model_cache) = build_scheduler();
    scheduler.start();

    let event_emitter = Arc::new(inference_core::EventEmitter::new(Arc::new(
        inference_core::InMemoryDocumentStore::new(),
    )));
    let streams = Arc::new(StreamManager::new(CameraConfig::default(), event_emitter));
    streams.register(camera_id, Box::new(SyntheticSource::new(320, 240)));

    let broadcaster = Broadcaster::new(BroadcasterConfig::default(), scheduler.clone(), model_cache, streams.clone());
    broadcaster.start();

    std::thread::sleep(std::time::Duration::from_secs(seconds));

    let snapshot = broadcaster.request_snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    broadcaster.stop();
    streams.stop_camera(camera_id).ok();
    scheduler.stop();
    Ok(())
}
