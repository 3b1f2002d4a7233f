use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::record::NodeRecord;

/// The ordered collection of all nodes' records for one round.
///
/// Owned exclusively by the coordinator for the duration of the round; entry
/// `i` was sent by rank `i` (entry 0 is the coordinator's own record). A
/// completed snapshot always has exactly group-size entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSnapshot {
    pub timestamp: DateTime<Utc>,
    pub records: Vec<NodeRecord>,
}

impl ClusterSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One node's entry in the round document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    #[serde(rename = "Node")]
    pub node: u32,
    #[serde(rename = "Metrics")]
    pub metrics: NodeRecord,
}

/// The serialized form of one completed round.
///
/// Shape: `{ "Nodes": [ { "Node": <rank>, "Metrics": { ... } }, ... ],
/// "timestamp": <string> }`. Every record field appears in the mapping:
/// the entries embed the record structs themselves, so a field added to the
/// schema cannot be silently dropped from the document. Sentinel values pass
/// through unchanged; the serializer neither interprets nor filters them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundDocument {
    #[serde(rename = "Nodes")]
    pub nodes: Vec<NodeEntry>,
    pub timestamp: String,
}

impl RoundDocument {
    /// Builds the round document for a completed snapshot. Pure: identical
    /// snapshots yield structurally identical documents.
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        Self {
            nodes: snapshot
                .records
                .iter()
                .enumerate()
                .map(|(rank, record)| NodeEntry {
                    node: rank as u32,
                    metrics: record.clone(),
                })
                .collect(),
            timestamp: snapshot
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{UNMEASURED, UNMEASURED_COUNT};

    fn snapshot_of(n: usize) -> ClusterSnapshot {
        ClusterSnapshot {
            timestamp: Utc::now(),
            records: vec![NodeRecord::unmeasured(); n],
        }
    }

    #[test]
    fn document_has_one_entry_per_rank() {
        let doc = RoundDocument::from_snapshot(&snapshot_of(3));
        assert_eq!(doc.nodes.len(), 3);
        for (i, entry) in doc.nodes.iter().enumerate() {
            assert_eq!(entry.node, i as u32);
        }
    }

    #[test]
    fn from_snapshot_is_idempotent() {
        let snapshot = snapshot_of(2);
        let a = RoundDocument::from_snapshot(&snapshot);
        let b = RoundDocument::from_snapshot(&snapshot);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut snapshot = snapshot_of(2);
        snapshot.records[1].system.processes_all = 412;
        snapshot.records[1].memory.memory_used = 1536.25;
        let doc = RoundDocument::from_snapshot(&snapshot);

        let json = serde_json::to_string(&doc).unwrap();
        let back: RoundDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.nodes[1].metrics.system.processes_all, 412);
        assert_eq!(back.nodes[1].metrics.memory.memory_used, 1536.25);
    }

    #[test]
    fn every_schema_field_appears_in_the_document() {
        let value =
            serde_json::to_value(RoundDocument::from_snapshot(&snapshot_of(1))).unwrap();
        let metrics = &value["Nodes"][0]["Metrics"];
        let field_counts = [
            ("systemMetrics", 5),
            ("processorMetrics", 21),
            ("inputOutputMetrics", 9),
            ("memoryMetrics", 16),
            ("networkMetrics", 4),
            ("powerMetrics", 13),
        ];
        for (section, count) in field_counts {
            let object = metrics[section]
                .as_object()
                .unwrap_or_else(|| panic!("section {section} missing"));
            assert_eq!(object.len(), count, "field count drifted in {section}");
        }
    }

    #[test]
    fn sentinel_values_are_preserved_literally() {
        // A field that happens to hold the sentinel must come out as the
        // sentinel number, never null and never omitted.
        let snapshot = snapshot_of(1);
        let value =
            serde_json::to_value(RoundDocument::from_snapshot(&snapshot)).unwrap();
        let metrics = &value["Nodes"][0]["Metrics"];
        assert_eq!(
            metrics["networkMetrics"]["receiveRate"],
            serde_json::json!(UNMEASURED)
        );
        assert_eq!(
            metrics["systemMetrics"]["interruptRate"],
            serde_json::json!(UNMEASURED_COUNT)
        );
        assert!(!metrics["networkMetrics"]["receiveRate"].is_null());
    }

    #[test]
    fn timestamp_is_carried_as_a_string() {
        let doc = RoundDocument::from_snapshot(&snapshot_of(1));
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value["timestamp"].is_string());
    }
}
