//! # flow-ingestd
//!
//! Command-line front end for the flow-ingestion core: reads network-flow data from a
//! pcap file, a live interface, a flat log file, a directory of analyzer logs, stdin, or
//! an nfdump capture, and prints one JSON record per line to stdout in timestamp order.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use clap::Parser;
use config::{Config as ConfigLoader, Environment, File as ConfigFile};
use ingest_core::{
    AnalyzerArgs, AnalyzerSupervisor, Catalog, DispatchPlan, IngestConfig, InputDescriptor,
    InputMode, LogDirectoryWatcher, PcapOrInterface, ProfilerMessage, Result as IngestResult,
    SingleStreamSource, Tailer, dispatch, run_nfdump_tail, run_single_stream,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Which regime the operator asked for; translated into an [`InputMode`] for dispatch.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Mode {
    File,
    Nfdump,
    Pcap,
    Interface,
}

impl From<Mode> for InputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::File => InputMode::File,
            Mode::Nfdump => InputMode::Nfdump,
            Mode::Pcap => InputMode::Pcap,
            Mode::Interface => InputMode::Interface,
        }
    }
}

/// Command line arguments for the flow-ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "flow-ingestd")]
#[command(about = "Ingest network-flow data and print timestamp-ordered JSON records")]
struct Args {
    /// Ingestion regime: a flat file/directory/stdin, an nfdump capture, a pcap file, or
    /// a live interface.
    #[arg(long, value_enum, default_value = "file")]
    mode: Mode,

    /// Target path, interface name, or `-`/omitted for stdin (mode-dependent).
    #[arg(long, env = "FLOWINGEST_TARGET")]
    target: Option<PathBuf>,

    /// Optional TOML configuration file.
    #[arg(long, env = "FLOWINGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured packet filter (pcap/interface modes only).
    #[arg(long, env = "FLOWINGEST_PACKET_FILTER")]
    packet_filter: Option<String>,

    /// Overrides the configured analyzer binary (pcap/interface modes only).
    #[arg(long, env = "FLOWINGEST_ANALYZER_BINARY")]
    analyzer_binary: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<IngestConfig> {
    let mut builder = ConfigLoader::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(ConfigFile::from(path.as_path()).required(false));
    }
    builder = builder.add_source(Environment::with_prefix("FLOWINGEST").separator("_"));
    let loaded = builder.build()?;
    let config: IngestConfig = loaded.try_deserialize()?;
    let mut config = config.with_packet_filter_override(args.packet_filter.clone());
    if let Some(binary) = &args.analyzer_binary {
        config.analyzer_binary = binary.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_cli=info,ingest_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args).await {
        Ok(lines_emitted) => {
            info!("ingestion complete: {lines_emitted} lines emitted");
            std::process::exit(0);
        }
        Err(e) => {
            error!("fatal error: {e}");
            error!("{:?}", std::backtrace::Backtrace::capture());
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<u64> {
    let config = load_config(&args)?;
    let descriptor = InputDescriptor {
        mode: args.mode.into(),
        target: args.target.clone(),
        analyzer_binary: config.analyzer_binary.clone(),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("received interrupt, shutting down");
                cancel.cancel();
            }
        });
    }

    let (profiler_tx, profiler_rx) = mpsc::channel(1024);
    let (telemetry_tx, telemetry_rx) = ingest_core::telemetry::channel();

    let stdout_task = tokio::spawn(drain_profiler(profiler_rx));
    let telemetry_task = tokio::spawn(drain_telemetry(telemetry_rx));

    let plan = dispatch(&descriptor).await.map_err(anyhow::Error::from)?;
    let lines_emitted = run_plan(plan, &config, profiler_tx, telemetry_tx, cancel).await?;

    let _ = stdout_task.await;
    let _ = telemetry_task.await;
    Ok(lines_emitted)
}

async fn drain_profiler(mut rx: mpsc::Receiver<ProfilerMessage>) {
    while let Some(msg) = rx.recv().await {
        let is_stop = matches!(msg, ProfilerMessage::Stop);
        match serde_json::to_string(&msg) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("failed to serialize record: {e}"),
        }
        if is_stop {
            break;
        }
    }
}

async fn drain_telemetry(mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        eprintln!("{line}");
    }
}

async fn run_plan(
    plan: DispatchPlan,
    config: &IngestConfig,
    profiler_tx: mpsc::Sender<ProfilerMessage>,
    telemetry_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> IngestResult<u64> {
    match plan {
        DispatchPlan::Stdin => {
            run_single_stream(
                SingleStreamSource::Stdin,
                "stdin".to_string(),
                None,
                profiler_tx,
                telemetry_tx,
                cancel,
            )
            .await
        }
        DispatchPlan::SingleFile {
            path,
            record_type,
            pacing,
        } => {
            run_single_stream(
                SingleStreamSource::File(path),
                record_type,
                pacing,
                profiler_tx,
                telemetry_tx,
                cancel,
            )
            .await
        }
        DispatchPlan::FolderOfLogs {
            dir,
            quiescence_timeout,
        } => {
            let catalog = Arc::new(Catalog::new());
            ingest_core::dispatch::scan_directory(&dir, &catalog).await?;
            Tailer::new(dir, catalog, quiescence_timeout)
                .run(profiler_tx, telemetry_tx, cancel)
                .await
        }
        DispatchPlan::Nfdump {
            dump_path,
            quiescence_timeout,
        } => {
            run_nfdump(
                &dump_path,
                config,
                quiescence_timeout,
                profiler_tx,
                telemetry_tx,
                cancel,
            )
            .await
        }
        DispatchPlan::Live {
            kind,
            target,
            quiescence_timeout,
        } => {
            run_live(
                kind,
                target,
                config,
                quiescence_timeout,
                profiler_tx,
                telemetry_tx,
                cancel,
            )
            .await
        }
    }
}

async fn run_nfdump(
    dump_path: &std::path::Path,
    config: &IngestConfig,
    quiescence_timeout: std::time::Duration,
    profiler_tx: mpsc::Sender<ProfilerMessage>,
    telemetry_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> IngestResult<u64> {
    let output_path = PathBuf::from(&config.nfdump_output_path);
    let output_file = std::fs::File::create(&output_path)?;

    info!("materializing nfdump capture to {}", output_path.display());
    let status = tokio::process::Command::new(&config.nfdump_binary)
        .arg("-b")
        .arg("-N")
        .arg("-o")
        .arg("csv")
        .arg("-q")
        .arg("-r")
        .arg(dump_path)
        .stdout(Stdio::from(output_file))
        .stderr(Stdio::piped())
        .status()
        .await?;
    if !status.success() {
        warn!("nfdump exited with {status}");
    }

    let emitted = run_nfdump_tail(
        &output_path,
        quiescence_timeout,
        profiler_tx,
        telemetry_tx,
        cancel,
    )
    .await?;

    if let Err(e) = tokio::fs::remove_file(&output_path).await {
        warn!("failed to remove materialized nfdump output: {e}");
    }
    Ok(emitted)
}

async fn run_live(
    kind: PcapOrInterface,
    target: String,
    config: &IngestConfig,
    quiescence_timeout: std::time::Duration,
    profiler_tx: mpsc::Sender<ProfilerMessage>,
    telemetry_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> IngestResult<u64> {
    let working_dir = PathBuf::from(&config.working_dir);
    let supervisor = AnalyzerSupervisor::new(working_dir.clone(), config.analyzer_binary.clone());
    supervisor.prepare_working_dir().await?;

    let mut handle = supervisor
        .spawn(AnalyzerArgs {
            kind,
            target,
            packet_filter: config.packet_filter.clone(),
            tcp_inactivity_timeout: config.tcp_inactivity_timeout.clone(),
        })
        .await?;

    let catalog = Arc::new(Catalog::new());
    let _watcher = LogDirectoryWatcher::spawn(&working_dir, catalog.clone())?;

    let tailer = Tailer::new(working_dir, catalog, quiescence_timeout);
    let result = tailer.run(profiler_tx, telemetry_tx, cancel).await;

    if handle.try_wait()?.is_none() {
        handle.shutdown().await?;
    }
    result
}
