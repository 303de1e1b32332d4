//! Ticket scan records

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::SourceKind;

/// A recorded intake event (`ticket_scans` row)
///
/// Created on successful validation and persistence, deleted by the operator,
/// never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketScan {
    pub id: String,
    #[serde(default)]
    pub slot_id: Option<String>,
    pub ticket_code: String,
    pub kind: SourceKind,
    /// Missing person counts read back as 1
    #[serde(default, deserialize_with = "persons_or_default")]
    pub persons: u32,
    #[serde(default)]
    pub scanned_at: Option<String>,
    #[serde(default)]
    pub photo_path: Option<String>,
    /// Filled in by the booking side, never by intake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tourist_name: Option<String>,
}

fn persons_or_default<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<i64> = Option::deserialize(deserializer)?;
    Ok(value
        .and_then(|p| u32::try_from(p).ok())
        .filter(|p| *p > 0)
        .unwrap_or(1))
}

impl TicketScan {
    /// Decode a store row
    pub fn from_row(row: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(row))
    }
}

/// Head count over person counts, widened so large counts can't overflow
pub fn total_persons(persons: impl IntoIterator<Item = u32>) -> u64 {
    persons.into_iter().map(u64::from).sum()
}

/// Insert payload for a new ticket scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicketScan {
    pub slot_id: String,
    pub ticket_code: String,
    pub kind: SourceKind,
    pub persons: u32,
    pub photo_path: Option<String>,
}

impl NewTicketScan {
    /// Store record for `ticket_scans`
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("slot_id".to_string(), json!(self.slot_id));
        record.insert("ticket_code".to_string(), json!(self.ticket_code));
        record.insert("kind".to_string(), json!(self.kind.as_str()));
        record.insert("persons".to_string(), json!(self.persons));
        if let Some(path) = &self.photo_path {
            record.insert("photo_path".to_string(), json!(path));
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_persons_reads_as_one() {
        let row = json!({
            "id": "scan-1",
            "ticket_code": "AB123",
            "kind": "paper",
            "persons": null,
            "scanned_at": "2026-10-16T14:31:00Z"
        });
        let scan = TicketScan::from_row(row.as_object().unwrap().clone()).unwrap();
        assert_eq!(scan.persons, 1);
        assert_eq!(scan.kind, SourceKind::Paper);
        assert!(scan.photo_path.is_none());
    }

    #[test]
    fn test_record_omits_absent_photo() {
        let new_scan = NewTicketScan {
            slot_id: "slot-1".to_string(),
            ticket_code: "AB123".to_string(),
            kind: SourceKind::Scanned,
            persons: 2,
            photo_path: None,
        };
        let record = new_scan.to_record();
        assert_eq!(record["kind"], "scanned");
        assert_eq!(record["persons"], 2);
        assert!(!record.contains_key("photo_path"));
    }

    #[test]
    fn test_total_persons_widens_past_u32() {
        assert_eq!(total_persons(Vec::new()), 0);
        assert_eq!(total_persons([2, 3]), 5);
        assert_eq!(total_persons([u32::MAX, u32::MAX]), 2 * u64::from(u32::MAX));
    }
}
