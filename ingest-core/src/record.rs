use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;
use serde_json::Value;

/// A timestamp normalized to a single numeric representation so that records from
/// JSON files (numeric `ts` field) and TSV files (leading tab-delimited token) can be
/// compared against each other with a total order.
///
/// `Timestamp::EARLIEST` is the sentinel used for records with no discoverable
/// timestamp; it sorts before every real timestamp, matching the "flush preferentially"
/// rule for missing `ts` fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp(pub f64);

impl Timestamp {
    pub const EARLIEST: Timestamp = Timestamp(0.0);
}

impl Eq for Timestamp {}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The payload carried by a [`Record`]: either an already-decoded JSON object, or a
/// raw line of text. Keeping this as a tagged sum (rather than a bare `serde_json::Value`
/// for every case) lets downstream parsers match on shape instead of re-sniffing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RecordData {
    Parsed(JsonMap<String, Value>),
    Raw(String),
}

/// The unit delivered to the profiler queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(rename = "type")]
    pub r#type: String,
    pub data: RecordData,
}

impl Record {
    pub fn raw(r#type: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            data: RecordData::Raw(line.into()),
        }
    }

    pub fn parsed(r#type: impl Into<String>, obj: JsonMap<String, Value>) -> Self {
        Self {
            r#type: r#type.into(),
            data: RecordData::Parsed(obj),
        }
    }
}

/// A message crossing the profiler queue: either a record, or the terminal sentinel
/// that closes the stream. `Stop` is represented distinctly in-process but serializes
/// to the literal string `"stop"` at the wire boundary, preserving the contract
/// downstream consumers already expect.
#[derive(Debug, Clone)]
pub enum ProfilerMessage {
    Record(Record),
    Stop,
}

impl Serialize for ProfilerMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ProfilerMessage::Record(record) => record.serialize(serializer),
            ProfilerMessage::Stop => serializer.serialize_str("stop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_sorts_before_real_timestamps() {
        assert!(Timestamp::EARLIEST < Timestamp(1.0));
        assert!(Timestamp(3.0) < Timestamp(5.0));
    }

    #[test]
    fn stop_serializes_to_literal_string() {
        let json = serde_json::to_string(&ProfilerMessage::Stop).unwrap();
        assert_eq!(json, "\"stop\"");
    }

    #[test]
    fn record_serializes_with_type_and_data() {
        let record = Record::raw("zeek", "10\tfoo\n");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "zeek");
        assert_eq!(json["data"], "10\tfoo\n");
    }
}
