use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, error, info};

use crate::dispatch::PcapOrInterface;
use crate::error::{IngestError, Result};

/// Arguments needed to launch the analyzer for a pcap/interface run.
#[derive(Debug, Clone)]
pub struct AnalyzerArgs {
    pub kind: PcapOrInterface,
    pub target: String,
    pub packet_filter: String,
    pub tcp_inactivity_timeout: String,
}

/// Builds the analyzer's argument list as a structured `Vec`, one logical flag per
/// element, rather than a single shell string. This is what makes the supervisor
/// immune to quoting bugs when `target` contains spaces: there is no shell to
/// misinterpret them (spec REDESIGN FLAG on subprocess orchestration).
fn build_analyzer_args(args: &AnalyzerArgs, resolved_target: &std::path::Path) -> Vec<OsString> {
    let mut out = vec![OsString::from("-C")];
    match args.kind {
        PcapOrInterface::Interface => {
            out.push("-i".into());
            out.push(args.target.clone().into());
        }
        PcapOrInterface::Pcap => {
            out.push("-r".into());
            out.push(resolved_target.into());
        }
    }
    if !args.tcp_inactivity_timeout.is_empty() {
        out.push(args.tcp_inactivity_timeout.clone().into());
    }
    out.push("local".into());
    out.push("-e".into());
    out.push("redef LogAscii::use_json=T;".into());
    out.push("-f".into());
    out.push(args.packet_filter.clone().into());
    out
}

/// Prepares the analyzer's working directory and drives its lifecycle: spawn, wait,
/// and teardown. Owns the working directory exclusively for the duration of a run.
#[derive(Debug)]
pub struct AnalyzerSupervisor {
    working_dir: PathBuf,
    analyzer_binary: String,
}

impl AnalyzerSupervisor {
    pub fn new(working_dir: impl Into<PathBuf>, analyzer_binary: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            analyzer_binary: analyzer_binary.into(),
        }
    }

    /// Ensures the working directory exists and, if it already holds stale `*.log`
    /// files from a previous run, removes them. Must complete before [`Self::spawn`]
    /// is called so the Watcher/Tailer never observe leftover data.
    pub async fn prepare_working_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.working_dir).await?;
        let mut entries = tokio::fs::read_dir(&self.working_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("log")
                && let Err(e) = tokio::fs::remove_file(&path).await
            {
                debug!("failed to remove stale log file {}: {e}", path.display());
            }
        }
        Ok(())
    }

    /// Launches the analyzer subprocess with JSON log output, the configured packet
    /// filter, and (if non-empty) the TCP inactivity timeout.
    pub async fn spawn(&self, args: AnalyzerArgs) -> Result<AnalyzerHandle> {
        let resolved_target = match args.kind {
            PcapOrInterface::Pcap => tokio::fs::canonicalize(&args.target)
                .await
                .unwrap_or_else(|_| PathBuf::from(&args.target)),
            PcapOrInterface::Interface => PathBuf::new(),
        };
        let analyzer_args = build_analyzer_args(&args, &resolved_target);

        let mut cmd = Command::new(&self.analyzer_binary);
        cmd.current_dir(&self.working_dir)
            .args(&analyzer_args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        info!(
            "starting analyzer: {} {:?}",
            self.analyzer_binary, analyzer_args
        );
        let child = cmd
            .spawn()
            .map_err(|e| IngestError::AnalyzerSpawn(e.to_string()))?;
        Ok(AnalyzerHandle { child })
    }
}

/// A running (or exited) analyzer process.
#[derive(Debug)]
pub struct AnalyzerHandle {
    child: Child,
}

impl AnalyzerHandle {
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Non-blocking check used by the Tailer to shorten its quiescence timeout once
    /// the analyzer has exited on its own (bounded pcap runs only; an optimization,
    /// not a correctness requirement).
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Kills the analyzer and reaps it. Used on cancellation; pcap/interface analyzers
    /// are otherwise left to exit on their own EOF.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Err(e) = self.child.start_kill() {
            error!("failed to signal analyzer process: {e}");
        }
        let _ = self.child.wait().await;
        Ok(())
    }
}
