//! Identifiers - canonical hierarchical ids for records, versions and authors
//!
//! # Formats
//! - `entity:<type>/<slug>` or `entity:<type>/<sub_type>/<slug>`
//! - `relationship:<hash>` (hash of source, target and type)
//! - `version:<record_id>:<n>`
//! - `author:<system|human>:<slug>`
//!
//! # Key Points
//! - An entity id is a pure function of type, sub-type and slug
//! - Building and parsing round-trip exactly
//! - Relationship ids ignore dates, so one (source, target, type) triple maps to one record

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::vocabulary::{EntitySubType, EntityType, RelationshipType};
use crate::error::{Error, Result};

pub const ENTITY_PREFIX: &str = "entity:";
pub const RELATIONSHIP_PREFIX: &str = "relationship:";
pub const VERSION_PREFIX: &str = "version:";
pub const AUTHOR_PREFIX: &str = "author:";

pub const MIN_SLUG_LENGTH: usize = 3;
pub const MAX_SLUG_LENGTH: usize = 50;

/// Hex characters kept from the relationship digest
const RELATIONSHIP_HASH_LEN: usize = 32;

/// Check a slug against the kebab-case rule, returning the reason on failure
pub fn check_slug(slug: &str) -> std::result::Result<(), String> {
    let len = slug.chars().count();
    if len < MIN_SLUG_LENGTH || len > MAX_SLUG_LENGTH {
        return Err(format!(
            "slug must be {}-{} characters, got {}",
            MIN_SLUG_LENGTH, MAX_SLUG_LENGTH, len
        ));
    }

    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars {
        return Err("slug may only contain a-z, 0-9 and '-'".to_string());
    }

    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err("slug must be kebab-case (no leading, trailing or doubled '-')".to_string());
    }

    Ok(())
}

/// Parsed components of an entity id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub entity_type: EntityType,
    pub sub_type: Option<EntitySubType>,
    pub slug: String,
}

impl EntityId {
    /// Validate components and build the id value
    pub fn new(
        entity_type: EntityType,
        sub_type: Option<EntitySubType>,
        slug: impl Into<String>,
    ) -> Result<Self> {
        let slug = slug.into();
        check_slug(&slug).map_err(|reason| Error::malformed(&slug, reason))?;

        if !entity_type.allows(sub_type) {
            let sub = sub_type.map(|s| s.as_str()).unwrap_or_default();
            return Err(Error::malformed(
                format!("{}/{}", entity_type, sub),
                format!("sub-type `{}` is not allowed for `{}`", sub, entity_type),
            ));
        }

        Ok(Self {
            entity_type,
            sub_type,
            slug,
        })
    }

    /// Parse an `entity:` id
    ///
    /// # Examples
    /// ```
    /// use nes::core::identifiers::EntityId;
    ///
    /// let id = EntityId::parse("entity:organization/political_party/nepali-congress").unwrap();
    /// assert_eq!(id.slug, "nepali-congress");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(ENTITY_PREFIX)
            .ok_or_else(|| Error::malformed(s, "entity id must start with `entity:`"))?;

        let parts: Vec<&str> = body.split('/').collect();
        let (type_token, sub_token, slug) = match parts.as_slice() {
            [t, slug] => (*t, None, *slug),
            [t, sub, slug] => (*t, Some(*sub), *slug),
            _ => {
                return Err(Error::malformed(
                    s,
                    "expected entity:<type>/<slug> or entity:<type>/<sub_type>/<slug>",
                ))
            }
        };

        let entity_type = EntityType::from_str(type_token)?;
        let sub_type = sub_token.map(EntitySubType::from_str).transpose()?;
        Self::new(entity_type, sub_type, slug)
    }

    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_type {
            Some(sub) => write!(f, "{}{}/{}/{}", ENTITY_PREFIX, self.entity_type, sub, self.slug),
            None => write!(f, "{}{}/{}", ENTITY_PREFIX, self.entity_type, self.slug),
        }
    }
}

impl TryFrom<&str> for EntityId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        EntityId::parse(s)
    }
}

/// Build an entity id from raw vocabulary tokens
pub fn build_entity_id(entity_type: &str, sub_type: Option<&str>, slug: &str) -> Result<String> {
    let entity_type = EntityType::from_str(entity_type)?;
    let sub_type = sub_type.map(EntitySubType::from_str).transpose()?;
    Ok(EntityId::new(entity_type, sub_type, slug)?.id())
}

/// Split an entity id into (type, sub-type, slug)
pub fn parse_entity_id(id: &str) -> Result<(EntityType, Option<EntitySubType>, String)> {
    let parsed = EntityId::parse(id)?;
    Ok((parsed.entity_type, parsed.sub_type, parsed.slug))
}

/// Build the stable id of a relationship
///
/// Both endpoints must be well-formed entity ids. Dates are not part of the
/// identity.
pub fn build_relationship_id(
    source_entity_id: &str,
    target_entity_id: &str,
    relationship_type: RelationshipType,
) -> Result<String> {
    EntityId::parse(source_entity_id)?;
    EntityId::parse(target_entity_id)?;

    let mut hasher = Sha256::new();
    hasher.update(source_entity_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(target_entity_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(relationship_type.as_str().as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!(
        "{}{}",
        RELATIONSHIP_PREFIX,
        &hex[..RELATIONSHIP_HASH_LEN]
    ))
}

/// Check the shape of a relationship id
pub fn check_relationship_id(id: &str) -> Result<()> {
    let hash = id
        .strip_prefix(RELATIONSHIP_PREFIX)
        .ok_or_else(|| Error::malformed(id, "relationship id must start with `relationship:`"))?;
    let valid = hash.len() == RELATIONSHIP_HASH_LEN
        && hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if !valid {
        return Err(Error::malformed(id, "relationship hash must be 32 lowercase hex chars"));
    }
    Ok(())
}

/// Which kind of record an id names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Entity,
    Relationship,
}

impl RecordKind {
    /// Classify and validate a record id
    pub fn of(id: &str) -> Result<Self> {
        if id.starts_with(ENTITY_PREFIX) {
            EntityId::parse(id)?;
            Ok(RecordKind::Entity)
        } else if id.starts_with(RELATIONSHIP_PREFIX) {
            check_relationship_id(id)?;
            Ok(RecordKind::Relationship)
        } else {
            Err(Error::malformed(id, "not an entity or relationship id"))
        }
    }
}

pub fn build_version_id(record_id: &str, version_number: u64) -> String {
    format!("{}{}:{}", VERSION_PREFIX, record_id, version_number)
}

/// Split a version id into (record id, version number)
pub fn parse_version_id(id: &str) -> Result<(String, u64)> {
    let body = id
        .strip_prefix(VERSION_PREFIX)
        .ok_or_else(|| Error::malformed(id, "version id must start with `version:`"))?;

    if !body.starts_with(ENTITY_PREFIX) && !body.starts_with(RELATIONSHIP_PREFIX) {
        return Err(Error::malformed(
            id,
            "version id must contain an entity or relationship id",
        ));
    }

    let (record_id, number) = body
        .rsplit_once(':')
        .ok_or_else(|| Error::malformed(id, "missing version number"))?;
    RecordKind::of(record_id).map_err(|_| Error::malformed(id, "missing version number"))?;

    let number: u64 = number
        .parse()
        .map_err(|_| Error::malformed(id, "version number must be a positive integer"))?;
    if number == 0 {
        return Err(Error::malformed(id, "version numbers start at 1"));
    }

    Ok((record_id.to_string(), number))
}

/// Namespace of an author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorKind {
    System,
    Human,
}

impl AuthorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorKind::System => "system",
            AuthorKind::Human => "human",
        }
    }
}

impl fmt::Display for AuthorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(AuthorKind::System),
            "human" => Ok(AuthorKind::Human),
            _ => Err(Error::malformed(s, "author kind must be `system` or `human`")),
        }
    }
}

/// Parsed author id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorId {
    pub kind: AuthorKind,
    pub slug: String,
}

impl AuthorId {
    pub fn new(kind: AuthorKind, slug: impl Into<String>) -> Result<Self> {
        let slug = slug.into();
        check_slug(&slug).map_err(|reason| Error::malformed(&slug, reason))?;
        Ok(Self { kind, slug })
    }

    pub fn system(slug: impl Into<String>) -> Result<Self> {
        Self::new(AuthorKind::System, slug)
    }

    pub fn human(slug: impl Into<String>) -> Result<Self> {
        Self::new(AuthorKind::Human, slug)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(AUTHOR_PREFIX)
            .ok_or_else(|| Error::malformed(s, "author id must start with `author:`"))?;
        let (kind, slug) = body
            .split_once(':')
            .ok_or_else(|| Error::malformed(s, "expected author:<system|human>:<slug>"))?;
        Self::new(AuthorKind::from_str(kind)?, slug)
    }

    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", AUTHOR_PREFIX, self.kind, self.slug)
    }
}

impl TryFrom<&str> for AuthorId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        AuthorId::parse(s)
    }
}

/// `author:<kind>:<slug>` from string parts
pub fn build_author_id(kind: &str, slug: &str) -> Result<String> {
    Ok(AuthorId::new(kind.parse()?, slug)?.id())
}

pub fn parse_author_id(id: &str) -> Result<(AuthorKind, String)> {
    let author = AuthorId::parse(id)?;
    Ok((author.kind, author.slug))
}
