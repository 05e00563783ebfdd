//! Core flow-ingestion pipeline: dispatches an input descriptor to the right regime,
//! supervises the analyzer subprocess when one is needed, watches its output directory,
//! and merges the resulting log files into a single timestamp-ordered record stream.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod reader;
pub mod record;
pub mod supervisor;
pub mod tailer;
pub mod telemetry;
pub mod watcher;

pub use catalog::Catalog;
pub use config::IngestConfig;
pub use dispatch::{DispatchPlan, InputDescriptor, InputMode, PcapOrInterface, dispatch};
pub use error::{IngestError, Result};
pub use reader::{SingleStreamSource, run_nfdump_tail, run_single_stream};
pub use record::{ProfilerMessage, Record, RecordData, Timestamp};
pub use supervisor::{AnalyzerArgs, AnalyzerHandle, AnalyzerSupervisor};
pub use tailer::Tailer;
pub use watcher::LogDirectoryWatcher;
