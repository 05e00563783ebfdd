use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{IngestError, Result};
use crate::record::{ProfilerMessage, Record, Timestamp};
use crate::telemetry::{self, TelemetrySender};

/// How long the tailer sleeps between polling rounds when no file has a line ready.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reads one `*.log` stem down to a `(Timestamp, Record)` pair, or `None` if the line
/// carries no parseable content (blank, a TSV comment, or malformed JSON/TSV).
///
/// JSON is tried first; if the line doesn't parse as a JSON object, it is treated as a
/// tab-separated legacy log: lines beginning with `#` are comments and skipped, and the
/// timestamp is the first field. A record with no discoverable timestamp is assigned
/// [`Timestamp::EARLIEST`] so it is emitted ahead of everything else rather than stalling
/// the merge.
pub fn parse_line(stem: &str, line: &str) -> Option<(Timestamp, Record)> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return None;
    }

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line) {
        let ts = obj
            .get("ts")
            .and_then(Value::as_f64)
            .map(Timestamp)
            .unwrap_or(Timestamp::EARLIEST);
        return Some((ts, Record::parsed(stem, obj)));
    }

    if line.starts_with('#') {
        return None;
    }

    let ts = line
        .split('\t')
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .map(Timestamp)
        .unwrap_or(Timestamp::EARLIEST);
    Some((ts, Record::raw(stem, line.to_string())))
}

/// Tails every `*.log` stem named in a [`Catalog`] and emits records to the profiler
/// queue in timestamp order, merging across files the way a k-way merge-sort does.
///
/// Ties are broken by stem name so the emission order is deterministic even when two
/// files share a timestamp. The merge is best-effort: it only orders what it currently
/// has buffered, so a file that goes quiet for a long stretch while others keep
/// producing can have its backlog emitted out of strict global order once it catches up.
#[derive(Debug)]
pub struct Tailer {
    dir: PathBuf,
    catalog: Arc<Catalog>,
    handles: HashMap<String, BufReader<File>>,
    heads: HashMap<String, (Timestamp, Record)>,
    last_activity: Instant,
    quiescence_timeout: Duration,
    lines_emitted: u64,
}

impl Tailer {
    pub fn new(dir: impl Into<PathBuf>, catalog: Arc<Catalog>, quiescence_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            catalog,
            handles: HashMap::new(),
            heads: HashMap::new(),
            last_activity: Instant::now(),
            quiescence_timeout,
            lines_emitted: 0,
        }
    }

    /// Runs the refresh/fill/emit loop until quiescence or cancellation, returning the
    /// number of records sent to `profiler_tx`.
    pub async fn run(
        mut self,
        profiler_tx: mpsc::Sender<ProfilerMessage>,
        telemetry_tx: TelemetrySender,
        cancel: CancellationToken,
    ) -> Result<u64> {
        loop {
            if cancel.is_cancelled() {
                return self.finish(&telemetry_tx, profiler_tx).await;
            }

            self.open_new_handles().await;
            self.fill_heads().await;

            if let Some(stem) = self.pick_winner() {
                let (_, record) = self.heads.remove(&stem).expect("winner key exists");
                if profiler_tx.send(ProfilerMessage::Record(record)).await.is_err() {
                    return Err(IngestError::ProfilerClosed);
                }
                self.lines_emitted += 1;
                self.last_activity = Instant::now();
                continue;
            }

            if self.quiescence_timeout != Duration::MAX
                && self.last_activity.elapsed() >= self.quiescence_timeout
            {
                return self.finish(&telemetry_tx, profiler_tx).await;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.finish(&telemetry_tx, profiler_tx).await;
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    async fn finish(
        mut self,
        telemetry_tx: &TelemetrySender,
        profiler_tx: mpsc::Sender<ProfilerMessage>,
    ) -> Result<u64> {
        telemetry::emit(
            telemetry_tx,
            0,
            2,
            format!(
                "No more input. Stopping input process. Sent {} lines",
                self.lines_emitted
            ),
        );
        self.handles.clear();
        let _ = profiler_tx.send(ProfilerMessage::Stop).await;
        Ok(self.lines_emitted)
    }

    /// Opens a [`BufReader`] for every catalog stem not already tracked. Stems whose
    /// file can't yet be opened (the analyzer hasn't created it, or a debounced watcher
    /// event is still in flight) are silently retried on the next round.
    async fn open_new_handles(&mut self) {
        for stem in self.catalog.list_log_files() {
            if self.handles.contains_key(&stem) {
                continue;
            }
            let path = self.dir.join(format!("{stem}.log"));
            match File::open(&path).await {
                Ok(file) => {
                    self.handles.insert(stem, BufReader::new(file));
                }
                Err(e) => debug!("stem {stem} not yet readable: {e}"),
            }
        }
    }

    /// For every open handle with no buffered head, reads lines until one parses into a
    /// record (skipping comments/blank lines) or the file hits EOF.
    async fn fill_heads(&mut self) {
        let stems: Vec<String> = self.handles.keys().cloned().collect();
        for stem in stems {
            if self.heads.contains_key(&stem) {
                continue;
            }
            let reader = self.handles.get_mut(&stem).expect("stem has a handle");
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if let Some(parsed) = parse_line(&stem, &line) {
                            self.heads.insert(stem.clone(), parsed);
                            self.last_activity = Instant::now();
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("error reading {stem}.log: {e}");
                        break;
                    }
                }
            }
        }
    }

    /// Selects the stem whose buffered head carries the smallest timestamp, breaking
    /// ties by stem name so emission order is deterministic.
    fn pick_winner(&self) -> Option<String> {
        self.heads
            .iter()
            .min_by(|a, b| a.1.0.cmp(&b.1.0).then_with(|| a.0.cmp(b.0)))
            .map(|(stem, _)| stem.clone())
    }
}
