//! Vocabulary - closed sets of entity types, sub-types and relationship types
//!
//! These are the only places where the registry enforces a fixed vocabulary.
//! Everything else (attributes, tags) stays open-ended.
//!
//! # Tokens
//! Entity types and sub-types use lowercase snake_case (`political_party`),
//! relationship types use SCREAMING_SNAKE_CASE (`MEMBER_OF`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Top-level kind of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Project,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::Location,
        EntityType::Project,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Location => "location",
            EntityType::Project => "project",
        }
    }

    /// Sub-types allowed under this type (absence of a sub-type is always allowed)
    pub fn allowed_sub_types(self) -> &'static [EntitySubType] {
        use EntitySubType::*;
        match self {
            EntityType::Person => &[Politician],
            EntityType::Organization => &[PoliticalParty, GovernmentBody, Hospital, Ngo],
            EntityType::Location => &[
                Province,
                District,
                MetropolitanCity,
                SubMetropolitanCity,
                Municipality,
                RuralMunicipality,
                Ward,
                Constituency,
            ],
            EntityType::Project => &[DevelopmentProject],
        }
    }

    pub fn allows(self, sub_type: Option<EntitySubType>) -> bool {
        match sub_type {
            None => true,
            Some(s) => self.allowed_sub_types().contains(&s),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::malformed(s, "unknown entity type"))
    }
}

/// Finer classification within an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySubType {
    Politician,
    PoliticalParty,
    GovernmentBody,
    Hospital,
    Ngo,
    Province,
    District,
    MetropolitanCity,
    SubMetropolitanCity,
    Municipality,
    RuralMunicipality,
    Ward,
    Constituency,
    DevelopmentProject,
}

impl EntitySubType {
    pub const ALL: [EntitySubType; 14] = [
        EntitySubType::Politician,
        EntitySubType::PoliticalParty,
        EntitySubType::GovernmentBody,
        EntitySubType::Hospital,
        EntitySubType::Ngo,
        EntitySubType::Province,
        EntitySubType::District,
        EntitySubType::MetropolitanCity,
        EntitySubType::SubMetropolitanCity,
        EntitySubType::Municipality,
        EntitySubType::RuralMunicipality,
        EntitySubType::Ward,
        EntitySubType::Constituency,
        EntitySubType::DevelopmentProject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntitySubType::Politician => "politician",
            EntitySubType::PoliticalParty => "political_party",
            EntitySubType::GovernmentBody => "government_body",
            EntitySubType::Hospital => "hospital",
            EntitySubType::Ngo => "ngo",
            EntitySubType::Province => "province",
            EntitySubType::District => "district",
            EntitySubType::MetropolitanCity => "metropolitan_city",
            EntitySubType::SubMetropolitanCity => "sub_metropolitan_city",
            EntitySubType::Municipality => "municipality",
            EntitySubType::RuralMunicipality => "rural_municipality",
            EntitySubType::Ward => "ward",
            EntitySubType::Constituency => "constituency",
            EntitySubType::DevelopmentProject => "development_project",
        }
    }
}

impl fmt::Display for EntitySubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntitySubType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntitySubType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::malformed(s, "unknown entity sub-type"))
    }
}

/// Directed relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    AffiliatedWith,
    EmployedBy,
    MemberOf,
    ParentOf,
    ChildOf,
    Supervises,
    LocatedIn,
    FundedBy,
    ImplementedBy,
    ExecutedBy,
    OverseenBy,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 11] = [
        RelationshipType::AffiliatedWith,
        RelationshipType::EmployedBy,
        RelationshipType::MemberOf,
        RelationshipType::ParentOf,
        RelationshipType::ChildOf,
        RelationshipType::Supervises,
        RelationshipType::LocatedIn,
        RelationshipType::FundedBy,
        RelationshipType::ImplementedBy,
        RelationshipType::ExecutedBy,
        RelationshipType::OverseenBy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::AffiliatedWith => "AFFILIATED_WITH",
            RelationshipType::EmployedBy => "EMPLOYED_BY",
            RelationshipType::MemberOf => "MEMBER_OF",
            RelationshipType::ParentOf => "PARENT_OF",
            RelationshipType::ChildOf => "CHILD_OF",
            RelationshipType::Supervises => "SUPERVISES",
            RelationshipType::LocatedIn => "LOCATED_IN",
            RelationshipType::FundedBy => "FUNDED_BY",
            RelationshipType::ImplementedBy => "IMPLEMENTED_BY",
            RelationshipType::ExecutedBy => "EXECUTED_BY",
            RelationshipType::OverseenBy => "OVERSEEN_BY",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::malformed(s, "unknown relationship type"))
    }
}
