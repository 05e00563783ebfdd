use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::Catalog;
use crate::error::IngestError;

/// The four ingestion modes a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    File,
    Nfdump,
    Pcap,
    Interface,
}

/// Describes the input the core should ingest, as received from the CLI/config layer.
#[derive(Debug, Clone)]
pub struct InputDescriptor {
    pub mode: InputMode,
    pub target: Option<PathBuf>,
    pub analyzer_binary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcapOrInterface {
    Pcap,
    Interface,
}

/// What the dispatcher decided to do with an [`InputDescriptor`], and the quiescence
/// timeout that regime implies. A `quiescence_timeout` of [`Duration::MAX`] signals
/// the unbounded (live-interface) regime, where only cancellation ends the run.
#[derive(Debug, Clone)]
pub enum DispatchPlan {
    Stdin,
    FolderOfLogs {
        dir: PathBuf,
        quiescence_timeout: Duration,
    },
    SingleFile {
        path: PathBuf,
        record_type: String,
        pacing: Option<Duration>,
    },
    Nfdump {
        dump_path: PathBuf,
        quiescence_timeout: Duration,
    },
    Live {
        kind: PcapOrInterface,
        target: String,
        quiescence_timeout: Duration,
    },
}

const ARGUS_PACING: Duration = Duration::from_millis(20);

/// Infers the record `type` (and, for argus, the per-line pacing delay) for a single
/// flat file from its basename.
fn infer_file_record_type(path: &Path) -> (&'static str, Option<Duration>) {
    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if basename.contains("binetflow") || basename.contains("argus") {
        ("argus", Some(ARGUS_PACING))
    } else {
        ("zeek", None)
    }
}

/// Examines the input descriptor and decides which ingestion mode to run.
///
/// `mode = File` requires a filesystem check (directory vs. regular file vs. stdin) to
/// choose between the folder-of-logs path and the single-file path; every other mode
/// is a pure decision over the descriptor's fields.
pub async fn dispatch(descriptor: &InputDescriptor) -> crate::Result<DispatchPlan> {
    match descriptor.mode {
        InputMode::File => {
            let target = match &descriptor.target {
                None => return Ok(DispatchPlan::Stdin),
                Some(t) if t.as_os_str() == "-" => return Ok(DispatchPlan::Stdin),
                Some(t) => t.clone(),
            };
            let metadata = tokio::fs::metadata(&target).await?;
            if metadata.is_dir() {
                Ok(DispatchPlan::FolderOfLogs {
                    dir: target,
                    quiescence_timeout: Duration::from_secs(1),
                })
            } else {
                let (record_type, pacing) = infer_file_record_type(&target);
                Ok(DispatchPlan::SingleFile {
                    path: target,
                    record_type: record_type.to_string(),
                    pacing,
                })
            }
        }
        InputMode::Nfdump => {
            let target = descriptor.target.clone().ok_or_else(|| {
                IngestError::InvalidDescriptor("nfdump mode requires a target dump file".into())
            })?;
            Ok(DispatchPlan::Nfdump {
                dump_path: target,
                quiescence_timeout: Duration::from_secs(10),
            })
        }
        InputMode::Pcap => {
            let target = descriptor.target.clone().ok_or_else(|| {
                IngestError::InvalidDescriptor("pcap mode requires a target pcap file".into())
            })?;
            Ok(DispatchPlan::Live {
                kind: PcapOrInterface::Pcap,
                target: target.to_string_lossy().into_owned(),
                quiescence_timeout: Duration::from_secs(30),
            })
        }
        InputMode::Interface => {
            let target = descriptor.target.clone().ok_or_else(|| {
                IngestError::InvalidDescriptor(
                    "interface mode requires a target interface name".into(),
                )
            })?;
            Ok(DispatchPlan::Live {
                kind: PcapOrInterface::Interface,
                target: target.to_string_lossy().into_owned(),
                quiescence_timeout: Duration::MAX,
            })
        }
    }
}

/// Enumerates the `*.log` children already present in `dir` and registers each stem in
/// `catalog`. Used once, up front, for the folder-of-logs mode: unlike the pcap/interface
/// regime, a static directory of logs isn't expected to grow, so no watcher is started.
pub async fn scan_directory(dir: &Path, catalog: &Catalog) -> crate::Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            catalog.add_log_file(stem);
        }
    }
    Ok(())
}
