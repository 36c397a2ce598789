use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

use chorus_core::app::{TaskInfo, TaskService};
use chorus_core::impls::{PcmEncoder, ToneSynthesizer};
use chorus_core::{AudioFormat, JobStatus, ManagerConfig, SynthesisRequest};

#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(about = "Run speech-synthesis tasks through the async task manager")]
#[command(version)]
struct Args {
    /// Text to synthesize
    #[arg(long, default_value = "Hello from chorus")]
    text: String,

    #[arg(long, value_enum, default_value_t = FormatArg::Wav)]
    format: FormatArg,

    /// Task id; a ULID is generated when omitted
    #[arg(long)]
    step_id: Option<String>,

    /// Number of tasks to start
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Cancel every live task after this many milliseconds
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Where downloaded results are written
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Directory for result artifacts
    #[arg(long, env = "CHORUS_WORK_DIR")]
    work_dir: Option<PathBuf>,

    #[arg(long, env = "CHORUS_RETENTION_SECS", default_value_t = 3600)]
    retention_secs: u64,

    #[arg(long, env = "CHORUS_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    sweep_interval_secs: u64,

    /// 0 disables the limit
    #[arg(long, env = "CHORUS_MAX_TEXT_LENGTH", default_value_t = 0)]
    max_text_length: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Wav,
    Pcm,
    Mp3,
    Flac,
}

impl From<FormatArg> for AudioFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Wav => AudioFormat::Wav,
            FormatArg::Pcm => AudioFormat::Pcm,
            FormatArg::Mp3 => AudioFormat::Mp3,
            FormatArg::Flac => AudioFormat::Flac,
        }
    }
}

impl Args {
    fn config(&self) -> ManagerConfig {
        let mut config = ManagerConfig {
            retention_secs: self.retention_secs,
            sweep_interval_secs: self.sweep_interval_secs,
            max_text_length: self.max_text_length,
            ..ManagerConfig::default()
        };
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        config
    }

    fn step_ids(&self) -> Vec<String> {
        match (&self.step_id, self.jobs) {
            (Some(id), 1) => vec![id.clone()],
            (Some(id), n) => (1..=n).map(|i| format!("{id}-{i}")).collect(),
            (None, n) => (0..n).map(|_| Ulid::new().to_string()).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.jobs == 0 {
        bail!("--jobs must be at least 1");
    }

    let service = TaskService::builder(args.config())
        .synthesizer(Arc::new(ToneSynthesizer::new()))
        .encoder(Arc::new(PcmEncoder))
        .build()
        .await
        .context("failed to start task service")?;
    info!(work_dir = %service.config().work_dir.display(), "task service ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let retention = service.spawn_retention_loop(shutdown_rx);

    let request = SynthesisRequest::new(args.text.clone()).with_format(args.format.into());
    let ids = args.step_ids();
    for id in &ids {
        let created = service.create_task(id, request.clone()).await?;
        println!("{}", serde_json::to_string(&created)?);
    }

    if let Some(ms) = args.cancel_after_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        let cancelled = service.cancel_all_tasks().await;
        info!(cancelled, "cancel requested for live tasks");
    }

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("cannot create {}", args.out_dir.display()))?;

    for id in &ids {
        let info = tokio::select! {
            info = wait_until_done(&service, id) => info?,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, cancelling all tasks");
                service.cancel_all_tasks().await;
                wait_until_done(&service, id).await?
            }
        };
        println!("{}", serde_json::to_string_pretty(&info)?);

        if info.status == JobStatus::Completed {
            let download = service.download_result(id).await?;
            let path = args.out_dir.join(&download.filename);
            tokio::fs::write(&path, &download.bytes)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(
                path = %path.display(),
                bytes = download.bytes.len(),
                content_type = download.content_type,
                "result saved"
            );
        }
    }

    println!("{}", serde_json::to_string(&service.counts().await)?);

    let _ = shutdown_tx.send(true);
    retention.await.context("retention loop panicked")?;
    Ok(())
}

/// Poll until the task reaches a terminal status.
async fn wait_until_done(service: &TaskService, id: &str) -> anyhow::Result<TaskInfo> {
    loop {
        let info = service.get_task_info(id).await?;
        if info.status.is_terminal() {
            return Ok(info);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
