//! Entity - persons, organizations, locations and projects
//!
//! `EntityData` is the caller-supplied, mutable part of an entity. `Entity`
//! adds the derived id, creation time and the latest version summary.
//!
//! # Validation
//! Each entity type has its own validation function that composes the common
//! checks with type-specific attribute conventions. Validation collects every
//! field error instead of stopping at the first one.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{check_slug, EntityId};
use super::value::{check_attributes, AttributeValue, Attributes};
use super::version::{Attribution, VersionSummary};
use super::vocabulary::{EntitySubType, EntityType};
use crate::error::{Error, FieldError, Result};

pub const MAX_TAG_LENGTH: usize = 50;
pub const MAX_SHORT_DESCRIPTION: usize = 500;
pub const MAX_DESCRIPTION: usize = 5000;

/// Accepted values for a project's `stage` attribute
pub const PROJECT_STAGES: [&str; 9] = [
    "pipeline",
    "planning",
    "approved",
    "ongoing",
    "completed",
    "suspended",
    "terminated",
    "cancelled",
    "unknown",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NameKind {
    Primary,
    Alias,
    Alternate,
    BirthName,
    Official,
}

/// Name in a single language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameParts {
    pub full: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

impl NameParts {
    pub fn full(full: impl Into<String>) -> Self {
        Self {
            full: full.into(),
            given: None,
            middle: None,
            family: None,
        }
    }

    /// Every non-empty part, for text search
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.full.as_str())
            .chain(self.given.as_deref())
            .chain(self.middle.as_deref())
            .chain(self.family.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// English/Nepali name variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub kind: NameKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<NameParts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<NameParts>,
}

impl Name {
    pub fn primary_en(full: impl Into<String>) -> Self {
        Self {
            kind: NameKind::Primary,
            en: Some(NameParts::full(full)),
            ne: None,
        }
    }

    pub fn with_ne(mut self, full: impl Into<String>) -> Self {
        self.ne = Some(NameParts::full(full));
        self
    }

    pub fn languages(&self) -> impl Iterator<Item = &NameParts> {
        self.en.iter().chain(self.ne.iter())
    }

    /// English full name, falling back to Nepali
    pub fn display_full(&self) -> Option<&str> {
        self.en
            .as_ref()
            .or(self.ne.as_ref())
            .map(|p| p.full.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierScheme {
    Wikipedia,
    Wikidata,
    Website,
    Facebook,
    Twitter,
    Other,
}

/// Reference into an external system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentifier {
    pub scheme: IdentifierScheme,
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Caller-supplied entity content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    pub slug: String,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<EntitySubType>,

    pub names: Vec<Name>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misspelled_names: Vec<Name>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<ExternalIdentifier>,

    #[serde(default)]
    pub attributes: Attributes,

    /// Free-form tags (a set, order irrelevant)
    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

impl EntityData {
    /// Minimal entity with a single PRIMARY English name
    pub fn new(
        entity_type: EntityType,
        sub_type: Option<EntitySubType>,
        slug: impl Into<String>,
        primary_name: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            entity_type,
            sub_type,
            names: vec![Name::primary_en(primary_name)],
            misspelled_names: Vec::new(),
            identifiers: Vec::new(),
            attributes: Attributes::new(),
            tags: BTreeSet::new(),
            short_description: None,
            description: None,
            attribution: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Canonical id (fails when slug or vocabulary is invalid)
    pub fn entity_id(&self) -> Result<EntityId> {
        EntityId::new(self.entity_type, self.sub_type, self.slug.clone())
    }

    pub fn primary_name(&self) -> Option<&Name> {
        self.names.iter().find(|n| n.kind == NameKind::Primary)
    }

    /// Run the validation for this entity's type
    pub fn validate(&self) -> Result<()> {
        let errors = match self.entity_type {
            EntityType::Person => validate_person(self),
            EntityType::Organization => validate_organization(self),
            EntityType::Location => validate_location(self),
            EntityType::Project => validate_project(self),
        };
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// Stored entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,

    #[serde(flatten)]
    pub data: EntityData,

    pub created_at: DateTime<Utc>,

    pub version_summary: VersionSummary,
}

impl Entity {
    pub fn slug(&self) -> &str {
        &self.data.slug
    }

    pub fn entity_type(&self) -> EntityType {
        self.data.entity_type
    }

    pub fn sub_type(&self) -> Option<EntitySubType> {
        self.data.sub_type
    }

    pub fn version(&self) -> u64 {
        self.version_summary.version_number
    }

    /// Display name (primary name, falling back to the slug)
    pub fn display_name(&self) -> &str {
        self.data
            .primary_name()
            .and_then(Name::display_full)
            .unwrap_or(&self.data.slug)
    }
}

pub fn validate_person(data: &EntityData) -> Vec<FieldError> {
    let mut errors = validate_common(data);
    if let Some(value) = data.attributes.get("birth_date") {
        let valid = value
            .as_str()
            .map_or(false, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok());
        if !valid {
            errors.push(FieldError::new(
                "attributes.birth_date",
                "must be an ISO date (YYYY-MM-DD)",
            ));
        }
    }
    errors
}

pub fn validate_organization(data: &EntityData) -> Vec<FieldError> {
    validate_common(data)
}

pub fn validate_location(data: &EntityData) -> Vec<FieldError> {
    let mut errors = validate_common(data);
    check_non_negative(data, "area", &mut errors);
    errors
}

pub fn validate_project(data: &EntityData) -> Vec<FieldError> {
    let mut errors = validate_common(data);
    check_non_negative(data, "total_commitment", &mut errors);
    check_non_negative(data, "total_disbursement", &mut errors);
    if let Some(stage) = data.attributes.get("stage") {
        let valid = stage
            .as_str()
            .map_or(false, |s| PROJECT_STAGES.contains(&s));
        if !valid {
            errors.push(FieldError::new(
                "attributes.stage",
                format!("must be one of {}", PROJECT_STAGES.join(", ")),
            ));
        }
    }
    errors
}

/// Checks shared by every entity type
pub fn validate_common(data: &EntityData) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Err(reason) = check_slug(&data.slug) {
        errors.push(FieldError::new("slug", reason));
    }

    if !data.entity_type.allows(data.sub_type) {
        let sub = data.sub_type.map(|s| s.as_str()).unwrap_or_default();
        errors.push(FieldError::new(
            "sub_type",
            format!("`{}` is not allowed for `{}`", sub, data.entity_type),
        ));
    }

    if data.names.is_empty() {
        errors.push(FieldError::new("names", "at least one name is required"));
    } else if data.primary_name().is_none() {
        errors.push(FieldError::new("names", "a PRIMARY name is required"));
    }
    check_names("names", &data.names, &mut errors);
    check_names("misspelled_names", &data.misspelled_names, &mut errors);

    for (i, ident) in data.identifiers.iter().enumerate() {
        if ident.value.trim().is_empty() {
            errors.push(FieldError::new(
                format!("identifiers[{}].value", i),
                "must not be empty",
            ));
        }
    }

    for tag in &data.tags {
        if tag.trim().is_empty() {
            errors.push(FieldError::new("tags", "tags must not be empty"));
        } else if tag.chars().count() > MAX_TAG_LENGTH {
            errors.push(FieldError::new(
                "tags",
                format!("tag `{}` exceeds {} characters", tag, MAX_TAG_LENGTH),
            ));
        }
    }

    check_length(
        "short_description",
        data.short_description.as_deref(),
        MAX_SHORT_DESCRIPTION,
        &mut errors,
    );
    check_length(
        "description",
        data.description.as_deref(),
        MAX_DESCRIPTION,
        &mut errors,
    );
    check_attributes(&data.attributes, &mut errors);

    errors
}

fn check_names(field: &str, names: &[Name], errors: &mut Vec<FieldError>) {
    for (i, name) in names.iter().enumerate() {
        let has_full = name.languages().any(|p| !p.full.trim().is_empty());
        if !has_full {
            errors.push(FieldError::new(
                format!("{}[{}]", field, i),
                "needs an English or Nepali full name",
            ));
        }
    }
}

fn check_length(field: &str, value: Option<&str>, max: usize, errors: &mut Vec<FieldError>) {
    if let Some(text) = value {
        if text.chars().count() > max {
            errors.push(FieldError::new(
                field,
                format!("must be at most {} characters", max),
            ));
        }
    }
}

fn check_non_negative(data: &EntityData, key: &str, errors: &mut Vec<FieldError>) {
    if let Some(value) = data.attributes.get(key) {
        match value.as_f64() {
            Some(n) if n >= 0.0 => {}
            _ => errors.push(FieldError::new(
                format!("attributes.{}", key),
                "must be a non-negative number",
            )),
        }
    }
}
