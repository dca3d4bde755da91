//! Relationship - typed, directed, optionally time-bounded edge between entities

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{build_relationship_id, EntityId};
use super::value::{check_attributes, AttributeValue, Attributes};
use super::version::{Attribution, VersionSummary};
use super::vocabulary::RelationshipType;
use crate::error::{Error, FieldError, Result};

/// Caller-supplied relationship content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipData {
    pub source_entity_id: String,
    pub target_entity_id: String,

    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

impl RelationshipData {
    pub fn new(
        source_entity_id: impl Into<String>,
        target_entity_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            source_entity_id: source_entity_id.into(),
            target_entity_id: target_entity_id.into(),
            relationship_type,
            start_date: None,
            end_date: None,
            attributes: Attributes::new(),
            attribution: None,
        }
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Stable id derived from source, target and type
    pub fn relationship_id(&self) -> Result<String> {
        build_relationship_id(
            &self.source_entity_id,
            &self.target_entity_id,
            self.relationship_type,
        )
    }

    /// Shape checks; endpoint existence is checked by the publication core
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = EntityId::parse(&self.source_entity_id) {
            errors.push(FieldError::new("source_entity_id", e.to_string()));
        }
        if let Err(e) = EntityId::parse(&self.target_entity_id) {
            errors.push(FieldError::new("target_entity_id", e.to_string()));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                errors.push(FieldError::new(
                    "end_date",
                    format!("{} is before start_date {}", end, start),
                ));
            }
        }
        check_attributes(&self.attributes, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Active on `date`: start <= date <= end, open ends inclusive
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |s| s <= date) && self.end_date.map_or(true, |e| date <= e)
    }

    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }
}

/// Stored relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,

    #[serde(flatten)]
    pub data: RelationshipData,

    pub created_at: DateTime<Utc>,

    pub version_summary: VersionSummary,
}

impl Relationship {
    pub fn version(&self) -> u64 {
        self.version_summary.version_number
    }

    pub fn touches(&self, entity_id: &str) -> bool {
        self.data.source_entity_id == entity_id || self.data.target_entity_id == entity_id
    }
}
