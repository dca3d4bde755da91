//! nes - versioned flat-file registry of entities and relationships
//!
//! People, organizations, locations and projects live as one JSON document
//! each, with every change kept as an immutable, numbered version.
//!
//! ## Key Concepts
//!
//! - **Publication**: the only writer; validates, versions, then stores
//! - **Versions**: gapless `1..n` per record, never rewritten; deletes leave a tombstone
//! - **Search**: read-only filters over current state
//! - **Migrations**: ordered units replayed once each, committed in bounded batches

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod migration;

pub use crate::core::entity::{Entity, EntityData};
pub use crate::core::publication::PublicationService;
pub use crate::core::record_store::Record;
pub use crate::core::relationship::{Relationship, RelationshipData};
pub use crate::core::search::{EntityQuery, Page, RelationshipQuery, SearchService};
pub use crate::core::version::Version;
pub use crate::core::vocabulary::{EntitySubType, EntityType, RelationshipType};
pub use error::{Error, ErrorKind, Result};
pub use migration::{MigrationContext, MigrationRegistry, MigrationRunner, MigrationUnit};
