//! End-to-end scenarios driving the public `Tailer`/`reader` surface directly, without a
//! real `zeek`/`nfdump` binary.

use std::sync::Arc;
use std::time::Duration;

use ingest_core::record::RecordData;
use ingest_core::{Catalog, ProfilerMessage, Record, SingleStreamSource, Tailer, run_nfdump_tail, run_single_stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn drain(mut rx: mpsc::Receiver<ProfilerMessage>) -> (Vec<Record>, bool) {
    let mut records = Vec::new();
    let mut got_stop = false;
    while let Some(msg) = rx.recv().await {
        match msg {
            ProfilerMessage::Record(r) => records.push(r),
            ProfilerMessage::Stop => {
                got_stop = true;
                break;
            }
        }
    }
    (records, got_stop)
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| match &r.data {
            RecordData::Parsed(obj) => obj
                .get("ts")
                .map(|v| format!("{}@{}", r.r#type, v))
                .unwrap_or_default(),
            RecordData::Raw(line) => format!("{}:{}", r.r#type, line.trim_end()),
        })
        .collect()
}

/// S1 — a flat stream of raw lines is forwarded verbatim, *including* the trailing
/// newline, tagged with the caller's record type, terminated by the stop sentinel.
/// Exercised via a file source rather than the real process stdin (which a test harness
/// can't redirect per-test), but `SingleStreamSource::File` and `::Stdin` share the same
/// read/emit path.
#[tokio::test]
async fn s1_single_stream_passthrough_then_stop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.txt");
    tokio::fs::write(&path, "a\nb\n").await.unwrap();

    let (profiler_tx, profiler_rx) = mpsc::channel(16);
    let (telemetry_tx, _telemetry_rx) = ingest_core::telemetry::channel();

    let handle = tokio::spawn(run_single_stream(
        SingleStreamSource::File(path),
        "stdin".to_string(),
        None,
        profiler_tx,
        telemetry_tx,
        CancellationToken::new(),
    ));

    let (records, got_stop) = drain(profiler_rx).await;
    assert!(got_stop);
    let lines: Vec<String> = records
        .iter()
        .map(|r| match &r.data {
            RecordData::Raw(line) => line.clone(),
            RecordData::Parsed(_) => panic!("expected raw lines"),
        })
        .collect();
    assert_eq!(lines, vec!["a\n".to_string(), "b\n".to_string()]);
    assert_eq!(handle.await.unwrap().unwrap(), 2);
}

/// S2 — two JSON log files merge into one timestamp-ordered stream.
#[tokio::test]
async fn s2_two_file_merge_orders_by_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("conn.log"),
        "{\"ts\":3,\"x\":1}\n{\"ts\":5,\"x\":2}\n",
    )
    .await
    .unwrap();
    tokio::fs::write(dir.path().join("dns.log"), "{\"ts\":4,\"y\":1}\n")
        .await
        .unwrap();

    let catalog = Arc::new(Catalog::new());
    catalog.add_log_file("conn");
    catalog.add_log_file("dns");

    let (profiler_tx, profiler_rx) = mpsc::channel(16);
    let (telemetry_tx, _telemetry_rx) = ingest_core::telemetry::channel();
    let tailer = Tailer::new(dir.path(), catalog, Duration::from_millis(200));
    let handle = tokio::spawn(tailer.run(profiler_tx, telemetry_tx, CancellationToken::new()));

    let (records, got_stop) = drain(profiler_rx).await;
    assert!(got_stop);
    assert_eq!(
        names(&records),
        vec!["conn@3".to_string(), "dns@4".to_string(), "conn@5".to_string()]
    );
    assert_eq!(handle.await.unwrap().unwrap(), 3);
}

/// S3 — equal timestamps break ties by stem name.
#[tokio::test]
async fn s3_tie_break_by_stem_name() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.log"), "{\"ts\":7}\n")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("b.log"), "{\"ts\":7}\n")
        .await
        .unwrap();

    let catalog = Arc::new(Catalog::new());
    catalog.add_log_file("a");
    catalog.add_log_file("b");

    let (profiler_tx, profiler_rx) = mpsc::channel(16);
    let (telemetry_tx, _telemetry_rx) = ingest_core::telemetry::channel();
    let tailer = Tailer::new(dir.path(), catalog, Duration::from_millis(200));
    let handle = tokio::spawn(tailer.run(profiler_tx, telemetry_tx, CancellationToken::new()));

    let (records, _) = drain(profiler_rx).await;
    assert_eq!(records[0].r#type, "a");
    assert_eq!(records[1].r#type, "b");
    let _ = handle.await;
}

/// S4 — a TSV file with a `#`-prefixed header produces exactly one record.
#[tokio::test]
async fn s4_tsv_comment_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("x.log"), "#header\n10\tfoo\n")
        .await
        .unwrap();

    let catalog = Arc::new(Catalog::new());
    catalog.add_log_file("x");

    let (profiler_tx, profiler_rx) = mpsc::channel(16);
    let (telemetry_tx, _telemetry_rx) = ingest_core::telemetry::channel();
    let tailer = Tailer::new(dir.path(), catalog, Duration::from_millis(150));
    let handle = tokio::spawn(tailer.run(profiler_tx, telemetry_tx, CancellationToken::new()));

    let (records, got_stop) = drain(profiler_rx).await;
    assert!(got_stop);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].r#type, "x");
    match &records[0].data {
        RecordData::Raw(line) => assert_eq!(line, "10\tfoo"),
        RecordData::Parsed(_) => panic!("expected a raw TSV line"),
    }
    assert_eq!(handle.await.unwrap().unwrap(), 1);
}

/// S5 — folder-of-logs mode with only empty files reaches quiescence with zero lines
/// emitted, and the sentinel still closes the stream.
#[tokio::test]
async fn s5_quiescence_with_empty_files() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("conn.log"), b"").await.unwrap();

    let catalog = Arc::new(Catalog::new());
    catalog.add_log_file("conn");

    let (profiler_tx, profiler_rx) = mpsc::channel(16);
    let (telemetry_tx, _telemetry_rx) = ingest_core::telemetry::channel();
    let tailer = Tailer::new(dir.path(), catalog, Duration::from_millis(150));
    let handle = tokio::spawn(tailer.run(profiler_tx, telemetry_tx, CancellationToken::new()));

    let (records, got_stop) = drain(profiler_rx).await;
    assert!(got_stop);
    assert!(records.is_empty());
    assert_eq!(handle.await.unwrap().unwrap(), 0);
}

/// S6 — an nfdump CSV's non-digit-leading header row is filtered; the data row survives.
#[tokio::test]
async fn s6_nfdump_row_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.csv");
    tokio::fs::write(&path, "header,row,row\n1620000000,1.2.3.4,5.6.7.8\n")
        .await
        .unwrap();

    let (profiler_tx, profiler_rx) = mpsc::channel(16);
    let (telemetry_tx, _telemetry_rx) = ingest_core::telemetry::channel();
    let handle = tokio::spawn(run_nfdump_tail(
        &path,
        Duration::from_millis(100),
        profiler_tx,
        telemetry_tx,
        CancellationToken::new(),
    ));

    let (records, got_stop) = drain(profiler_rx).await;
    assert!(got_stop);
    assert_eq!(records.len(), 1);
    match &records[0].data {
        RecordData::Raw(line) => assert_eq!(line, "1620000000,1.2.3.4,5.6.7.8"),
        RecordData::Parsed(_) => panic!("expected a raw CSV row"),
    }
    assert_eq!(handle.await.unwrap().unwrap(), 1);
}
