//! Core module - registry data model and storage
//!
//! Control flow: callers → `publication` → {`record_store`, `version_store`}
//! → flat files. `search` only reads from the record and version stores.

pub mod authors;
pub mod changes;
pub mod entity;
pub mod fsio;
pub mod identifiers;
pub mod layout;
pub mod publication;
pub mod record_store;
pub mod relationship;
pub mod search;
pub mod value;
pub mod version;
pub mod version_store;
pub mod vocabulary;
