use dashmap::DashSet;

/// Stems that never carry flow data and are ignored even if a `.log` file with that
/// stem appears in the analyzer's output directory.
const EXCLUDED_SUBSTRINGS: &[&str] = &[
    "capture_loss",
    "loaded_scripts",
    "packet_filter",
    "stats",
    "weird",
    "reporter",
];

/// Returns true if `stem` should never be registered or tailed.
pub fn is_excluded(stem: &str) -> bool {
    EXCLUDED_SUBSTRINGS.iter().any(|s| stem.contains(s))
}

/// The authoritative set of log-file stems currently under ingestion.
///
/// The Watcher only ever adds stems (from its own task); the Tailer only ever reads
/// snapshots of the set. A lock-free concurrent set is the natural fit for that
/// single-writer/single-reader-of-everything access pattern.
#[derive(Debug, Default)]
pub struct Catalog {
    stems: DashSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stem. Idempotent; excluded stems are silently dropped.
    pub fn add_log_file(&self, stem: impl Into<String>) {
        let stem = stem.into();
        if is_excluded(&stem) {
            return;
        }
        self.stems.insert(stem);
    }

    /// Snapshot of every known stem.
    pub fn list_log_files(&self) -> Vec<String> {
        self.stems.iter().map(|s| s.clone()).collect()
    }
}
