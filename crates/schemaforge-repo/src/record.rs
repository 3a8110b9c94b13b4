//! Record envelope for stored documents.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// A stored document with write timestamps.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// JSON-encoded document.
    pub data: Vec<u8>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,

    /// Last update timestamp in microseconds since Unix epoch.
    pub updated_at: u64,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(data: Vec<u8>) -> Self {
        let now = current_timestamp();
        Self {
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the data, keeping the creation time.
    pub fn updated(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            created_at: self.created_at,
            updated_at: current_timestamp().max(self.updated_at),
        }
    }

    /// Decode the JSON document.
    pub fn document(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| RepoError::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| RepoError::Serialization(e.to_string()))
    }
}

/// Current time in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bytes() {
        let record = Record::new(br#"{"_id":"a"}"#.to_vec());
        let decoded = Record::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(record, decoded);
        assert_eq!(decoded.document().unwrap()["_id"], "a");
    }

    #[test]
    fn test_update_keeps_creation_time() {
        let record = Record::new(vec![1]);
        let updated = record.updated(vec![2]);
        assert_eq!(updated.created_at, record.created_at);
        assert!(updated.updated_at >= record.updated_at);
        assert_eq!(updated.data, vec![2]);
    }
}
