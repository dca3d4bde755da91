//! Version - immutable snapshots and attribution metadata
//!
//! # Key Points
//! - One version per successful mutation, numbered `1..N` per record
//! - `snapshot` holds the complete record state; `None` marks a deletion
//! - Records carry a denormalized `VersionSummary` of their latest version

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::build_version_id;

/// Where a piece of data came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Source title or URL
    pub source: String,

    /// Confidence in the source (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// How the data was obtained (e.g. "scraped", "manual")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Attribution {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            confidence: None,
            method: None,
        }
    }
}

/// Registered author of changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Pointer to the latest version of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version_number: u64,
    pub author: String,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
}

/// Immutable snapshot of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version_id: String,
    pub record_id: String,
    pub version_number: u64,
    pub author: String,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,

    /// Full record state at this version (`None` for a deletion)
    pub snapshot: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

impl Version {
    pub fn new(
        record_id: &str,
        version_number: u64,
        author: &str,
        created_at: DateTime<Utc>,
        change_description: Option<String>,
        snapshot: Option<serde_json::Value>,
    ) -> Self {
        Self {
            version_id: build_version_id(record_id, version_number),
            record_id: record_id.to_string(),
            version_number,
            author: author.to_string(),
            created_at,
            change_description,
            snapshot,
            attribution: None,
        }
    }

    pub fn with_attribution(mut self, attribution: Option<Attribution>) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn is_tombstone(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            version_number: self.version_number,
            author: self.author.clone(),
            created_at: self.created_at,
            change_description: self.change_description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_id_and_summary() {
        let now = Utc::now();
        let v = Version::new(
            "entity:person/ram-example",
            2,
            "author:human:editor",
            now,
            Some("party change".into()),
            Some(json!({"slug": "ram-example"})),
        );
        assert_eq!(v.version_id, "version:entity:person/ram-example:2");
        assert!(!v.is_tombstone());

        let summary = v.summary();
        assert_eq!(summary.version_number, 2);
        assert_eq!(summary.author, "author:human:editor");
        assert_eq!(summary.created_at, now);
    }

    #[test]
    fn test_tombstone_serializes_null_snapshot() {
        let v = Version::new("entity:person/ram-example", 3, "author:system:cleanup", Utc::now(), None, None);
        let json = serde_json::to_value(&v).unwrap();
        assert!(json["snapshot"].is_null());
        assert!(json.get("change_description").is_none());

        let back: Version = serde_json::from_value(json).unwrap();
        assert!(back.is_tombstone());
    }
}
