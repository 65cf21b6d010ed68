//! Document-store collaborator interface
//!
//! This layer owns no persistence. Every read and write goes through the
//! [`DocumentStore`] trait; the store calls are also the only suspension
//! points, so cancellation takes effect exactly there and an issued write is
//! never rolled back. Transient failures surface as
//! [`Error::StoreConnection`](crate::Error::StoreConnection) /
//! [`Error::StoreAuth`](crate::Error::StoreAuth) pass-throughs — no retry or
//! backoff lives here.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{Entity, EntityKind};
use crate::Result;

/// Space id for workspace-global entities (projects, persons, channels,
/// tags, statuses, teamspaces).
pub const GLOBAL_SPACE: &str = "workspace";

/// Default page size when the caller names none.
pub const DEFAULT_LIMIT: usize = 50;

/// Hard ceiling on caller-supplied page sizes.
pub const MAX_LIMIT: usize = 200;

/// Clamp a caller-supplied limit into the allowed window.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact value match
    Eq(Value),
    /// Value is one of the set (`$in`)
    In(Vec<Value>),
    /// Value is none of the set (`$nin`)
    Nin(Vec<Value>),
    /// Wildcard-wrapped substring match (`$like`), case-insensitive
    Like(String),
    /// Full-text predicate over the document (`$search`)
    Search(String),
}

/// A conjunction of field predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    fields: BTreeMap<String, Condition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), Condition::Eq(value.into()));
        self
    }

    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.insert(field.into(), Condition::In(values));
        self
    }

    pub fn not_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.insert(field.into(), Condition::Nin(values));
        self
    }

    pub fn like(mut self, field: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), Condition::Like(fragment.into()));
        self
    }

    pub fn search(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), Condition::Search(text.into()));
        self
    }

    /// Attach a pre-built condition (e.g. one produced by the status
    /// classifier).
    pub fn condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.fields.insert(field.into(), condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.fields.iter()
    }
}

/// Sort direction for `find_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Options for `find_all`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Field to sort by, with direction
    pub sort: Option<(String, SortOrder)>,
    /// Maximum number of results; implementations apply it after sorting
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sorted_by(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            sort: Some((field.into(), order)),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Field-wise update operations for `update_doc`.
///
/// `inc` exists so a caller can bump a server-owned counter and read the
/// assigned value back from the returned post-write entity.
#[derive(Debug, Clone, Default)]
pub struct UpdateOps {
    /// Field replacement
    pub set: BTreeMap<String, Value>,
    /// Append to a set-valued field (`$push`)
    pub push: BTreeMap<String, Value>,
    /// Remove from a set-valued field (`$pull`)
    pub pull: BTreeMap<String, Value>,
    /// Numeric increment (`$inc`)
    pub inc: BTreeMap<String, i64>,
}

impl UpdateOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.insert(field.into(), by);
        self
    }
}

/// The narrow interface this layer consumes.
///
/// One interface, two implementations: the production one talks to the real
/// store, [`MemStore`](crate::memstore::MemStore) backs the test suite and
/// local embedding. Implementations assign an id on create when the caller
/// passes none and must write it into the stored entity.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First entity matching the query, if any.
    async fn find_one(&self, kind: EntityKind, query: Query) -> Result<Option<Entity>>;

    /// All entities matching the query, subject to `options`.
    async fn find_all(
        &self,
        kind: EntityKind,
        query: Query,
        options: FindOptions,
    ) -> Result<Vec<Entity>>;

    /// Create a standalone entity; returns its id.
    async fn create_doc(
        &self,
        kind: EntityKind,
        space: &str,
        entity: Entity,
        id: Option<String>,
    ) -> Result<String>;

    /// Create an entity attached as a labeled sub-collection of another.
    #[allow(clippy::too_many_arguments)]
    async fn add_collection(
        &self,
        kind: EntityKind,
        space: &str,
        attached_to: &str,
        attached_kind: EntityKind,
        collection: &str,
        entity: Entity,
        id: Option<String>,
    ) -> Result<String>;

    /// Apply field operations; returns the post-write entity when the
    /// document exists.
    async fn update_doc(
        &self,
        kind: EntityKind,
        space: &str,
        id: &str,
        ops: UpdateOps,
    ) -> Result<Option<Entity>>;

    /// Remove an entity.
    async fn remove_doc(&self, kind: EntityKind, space: &str, id: &str) -> Result<()>;
}
