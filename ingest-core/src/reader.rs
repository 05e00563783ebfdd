use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin, stdin};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::record::{ProfilerMessage, Record};
use crate::telemetry::{self, TelemetrySender};

/// Where a single, unmerged stream of records comes from.
#[derive(Debug)]
pub enum SingleStreamSource {
    Stdin,
    File(PathBuf),
}

enum AnyReader {
    Stdin(BufReader<Stdin>),
    File(BufReader<File>),
}

impl AnyReader {
    async fn read_line(&mut self, buf: &mut String) -> std::io::Result<usize> {
        match self {
            AnyReader::Stdin(r) => r.read_line(buf).await,
            AnyReader::File(r) => r.read_line(buf).await,
        }
    }
}

/// Reads a single source line by line, optionally pacing emission, and forwards each
/// line verbatim to the profiler queue tagged with `record_type`. Used for stdin, a lone
/// flat log file, and argus/binetflow replays (component E, single-stream case).
///
/// Unlike the [`crate::tailer::Tailer`], there is no merging and no parsing: every line
/// read, including comment lines and the trailing newline, is forwarded as-is
/// (`data = line`, spec.md §4.E), in arrival order. `pacing`, when set, sleeps between
/// emissions to replay a captured argus stream at a steady rate instead of bursting it
/// all at once.
pub async fn run_single_stream(
    source: SingleStreamSource,
    record_type: String,
    pacing: Option<Duration>,
    profiler_tx: mpsc::Sender<ProfilerMessage>,
    telemetry_tx: TelemetrySender,
    cancel: CancellationToken,
) -> Result<u64> {
    let mut reader = match source {
        SingleStreamSource::Stdin => AnyReader::Stdin(BufReader::new(stdin())),
        SingleStreamSource::File(path) => AnyReader::File(BufReader::new(File::open(&path).await?)),
    };

    let mut lines_emitted = 0u64;
    loop {
        let mut line = String::new();
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            result = reader.read_line(&mut line) => result?,
        };
        if read == 0 {
            break;
        }

        emit_record(&profiler_tx, Record::raw(record_type.clone(), line)).await?;
        lines_emitted += 1;
        if let Some(delay) = pacing {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    telemetry::emit(
        &telemetry_tx,
        0,
        2,
        format!("No more input. Stopping input process. Sent {lines_emitted} lines"),
    );
    let _ = profiler_tx.send(ProfilerMessage::Stop).await;
    Ok(lines_emitted)
}

/// Tails an nfdump-produced CSV file, emitting each well-formed row as a `nfdump` record
/// and stopping once no new rows have appeared for `quiescence_timeout`.
///
/// nfdump's `-o csv` output intersperses a header line and a trailing `Summary:` footer
/// among the actual flow rows; both are filtered out by requiring the row's first
/// character to be an ASCII digit (every real row starts with a year). Rows that fail
/// this check are dropped and counted rather than rejected outright, since a malformed
/// row should never abort an otherwise-healthy ingest.
pub async fn run_nfdump_tail(
    csv_path: &std::path::Path,
    quiescence_timeout: Duration,
    profiler_tx: mpsc::Sender<ProfilerMessage>,
    telemetry_tx: TelemetrySender,
    cancel: CancellationToken,
) -> Result<u64> {
    let mut reader = BufReader::new(open_with_retry(csv_path, &cancel).await?);
    let mut lines_emitted = 0u64;
    let mut invalid_rows = 0u64;
    let mut last_activity = Instant::now();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let mut line = String::new();
        match reader.read_line(&mut line).await? {
            0 => {
                if last_activity.elapsed() >= quiescence_timeout {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
            }
            _ => {
                last_activity = Instant::now();
                match validate_nfdump_row(&line) {
                    Some(record) => {
                        emit_record(&profiler_tx, record).await?;
                        lines_emitted += 1;
                    }
                    None => {
                        invalid_rows += 1;
                        debug!("skipped malformed nfdump row ({invalid_rows} so far): {}", line.trim_end());
                    }
                }
            }
        }
    }

    telemetry::emit(
        &telemetry_tx,
        0,
        2,
        format!("No more input. Stopping input process. Sent {lines_emitted} lines"),
    );
    let _ = profiler_tx.send(ProfilerMessage::Stop).await;
    Ok(lines_emitted)
}

/// Opens `path`, retrying with a short sleep while it doesn't exist yet. The nfdump
/// materialization step and the tail can start racing each other (the CLI currently
/// waits for materialization first, but this keeps the reader correct standalone too),
/// so the file may not exist the instant the tail starts.
async fn open_with_retry(path: &std::path::Path, cancel: &CancellationToken) -> Result<File> {
    loop {
        match File::open(path).await {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(IngestError::Io(e)),
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }
            Err(e) => return Err(IngestError::Io(e)),
        }
    }
}

fn validate_nfdump_row(line: &str) -> Option<Record> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(Record::raw("nfdump", trimmed.to_string()))
}

async fn emit_record(profiler_tx: &mpsc::Sender<ProfilerMessage>, record: Record) -> Result<()> {
    profiler_tx
        .send(ProfilerMessage::Record(record))
        .await
        .map_err(|_| IngestError::ProfilerClosed)
}
