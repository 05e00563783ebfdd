use serde::Deserialize;

fn default_packet_filter() -> String {
    "ip or not ip".to_string()
}

fn default_analyzer_binary() -> String {
    "zeek".to_string()
}

fn default_working_dir() -> String {
    "./zeek_files".to_string()
}

fn default_nfdump_binary() -> String {
    "nfdump".to_string()
}

fn default_nfdump_output_path() -> String {
    "./nfdump_output.txt".to_string()
}

/// Settings recognized by the ingestion core, loaded by `ingest-cli` from a config
/// file and environment overrides before being handed to the dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// BPF-style capture filter string passed through to the analyzer.
    #[serde(default = "default_packet_filter")]
    pub packet_filter: String,

    /// Opaque pass-through string for the analyzer's TCP inactivity timeout.
    /// Never validated; treated as free-form (spec Open Question).
    #[serde(default)]
    pub tcp_inactivity_timeout: String,

    /// Binary used to convert pcap/interface traffic into per-protocol log files.
    #[serde(default = "default_analyzer_binary")]
    pub analyzer_binary: String,

    /// Working directory the analyzer writes its `*.log` files into.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Binary used to materialize a binary NetFlow dump as CSV.
    #[serde(default = "default_nfdump_binary")]
    pub nfdump_binary: String,

    /// Path the materialized nfdump CSV is written to.
    #[serde(default = "default_nfdump_output_path")]
    pub nfdump_output_path: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            packet_filter: default_packet_filter(),
            tcp_inactivity_timeout: String::new(),
            analyzer_binary: default_analyzer_binary(),
            working_dir: default_working_dir(),
            nfdump_binary: default_nfdump_binary(),
            nfdump_output_path: default_nfdump_output_path(),
        }
    }
}

impl IngestConfig {
    /// Applies a CLI-supplied packet filter override, which takes precedence over
    /// whatever was loaded from configuration.
    pub fn with_packet_filter_override(mut self, cli_filter: Option<String>) -> Self {
        if let Some(filter) = cli_filter {
            self.packet_filter = filter;
        }
        self
    }
}
