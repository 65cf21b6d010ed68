//! locus-core: reference resolution and ordering for work-tracking tools
//!
//! Turns loose, human-typed references (issue numbers, status names, emails,
//! display names) into validated entity handles, assigns append-only rank
//! keys to new siblings, classifies workflow statuses into semantic buckets,
//! and maintains idempotent relation edges between issues. All persistence
//! goes through the [`store::DocumentStore`] collaborator; the in-memory
//! [`memstore::MemStore`] is the reference implementation.

pub mod config;
pub mod error;
pub mod graph;
pub mod ident;
pub mod locate;
pub mod memstore;
pub mod model;
pub mod ops;
pub mod person;
pub mod rank;
pub mod relation;
pub mod status;
pub mod store;

pub use config::Config;
pub use error::Error;
pub use graph::RelationGraph;
pub use ident::{parse_issue_ref, IssueRef, ParsedRef};
pub use locate::Locator;
pub use memstore::MemStore;
pub use model::{
    Channel, Component, Document, Entity, EntityKind, Issue, Milestone, Person, Project,
    RelatedRef, Status, StatusCategory, Tag, Teamspace,
};
pub use ops::{CreateIssue, Ops};
pub use relation::{RelationEntry, RelationKind, RelationManager, RelationOutcome};
pub use status::{ClassifiedStatus, StatusFilter};
pub use store::{DocumentStore, FindOptions, Query, SortOrder, UpdateOps};

/// Result type for locus operations
pub type Result<T> = std::result::Result<T, Error>;
