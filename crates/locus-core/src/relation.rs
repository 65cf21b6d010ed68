//! Relation edges between issues
//!
//! Three kinds: `blocks` (mutates the target's blocked-by set),
//! `is-blocked-by` (mutates the caller's own), and the symmetric
//! `relates-to` (written to both sides, caller's side first — the caller's
//! side is also the idempotency witness). Add and remove are idempotent: a
//! no-op reports `applied = false` and issues no write. Targets may live in
//! another project; a reference whose prefix differs from the source
//! project's identifier resolves that project first.

use serde_json::Value;

use crate::ident::{parse_issue_ref, IssueRef};
use crate::locate::Locator;
use crate::model::{EntityKind, Issue, Project, RelatedRef};
use crate::store::{DocumentStore, FindOptions, Query, UpdateOps};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Blocks,
    IsBlockedBy,
    RelatesTo,
}

impl std::str::FromStr for RelationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blocks" => Ok(RelationKind::Blocks),
            "is-blocked-by" | "is_blocked_by" | "blocked-by" | "blocked_by" => {
                Ok(RelationKind::IsBlockedBy)
            }
            "relates-to" | "relates_to" | "related" => Ok(RelationKind::RelatesTo),
            _ => Err(Error::InvalidRelationKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::Blocks => write!(f, "blocks"),
            RelationKind::IsBlockedBy => write!(f, "is-blocked-by"),
            RelationKind::RelatesTo => write!(f, "relates-to"),
        }
    }
}

/// Result of an add or remove: whether anything was written, and the
/// resolved endpoints.
#[derive(Debug, Clone)]
pub struct RelationOutcome {
    pub applied: bool,
    pub source: String,
    pub target: String,
}

/// One edge as shown to callers when listing.
#[derive(Debug, Clone)]
pub struct RelationEntry {
    pub kind: RelationKind,
    /// Human identifier of the referenced issue, or the raw id when the
    /// referenced issue no longer resolves
    pub target: String,
}

pub struct RelationManager<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> RelationManager<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Resolve the target of a relation, crossing project boundaries when
    /// the reference's prefix names a different project.
    pub async fn resolve_target(
        &self,
        source_project: &Project,
        target_ref: &IssueRef,
    ) -> Result<Issue> {
        let parsed = parse_issue_ref(target_ref, &source_project.identifier);
        let locator = Locator::new(self.store);

        match parsed.prefix() {
            Some(prefix) if !prefix.eq_ignore_ascii_case(&source_project.identifier) => {
                let target_project = locator.project(prefix).await?;
                locator.issue(&target_project, &parsed).await
            }
            _ => locator.issue(source_project, &parsed).await,
        }
    }

    pub async fn add(
        &self,
        source_project: &Project,
        source: &Issue,
        kind: RelationKind,
        target_ref: &IssueRef,
    ) -> Result<RelationOutcome> {
        let target = self.resolve_target(source_project, target_ref).await?;

        let applied = match kind {
            RelationKind::Blocks => {
                if target.is_blocked_by(&source.id) {
                    false
                } else {
                    self.push_ref(&target, "blocked_by", &source.id).await?;
                    true
                }
            }
            RelationKind::IsBlockedBy => {
                if source.is_blocked_by(&target.id) {
                    false
                } else {
                    self.push_ref(source, "blocked_by", &target.id).await?;
                    true
                }
            }
            RelationKind::RelatesTo => {
                if source.relates_to(&target.id) {
                    false
                } else {
                    // Two independent writes; a failure of the second leaves
                    // a one-sided edge.
                    self.push_ref(source, "relations", &target.id).await?;
                    self.push_ref(&target, "relations", &source.id).await?;
                    true
                }
            }
        };

        Ok(RelationOutcome {
            applied,
            source: source.identifier.clone(),
            target: target.identifier,
        })
    }

    pub async fn remove(
        &self,
        source_project: &Project,
        source: &Issue,
        kind: RelationKind,
        target_ref: &IssueRef,
    ) -> Result<RelationOutcome> {
        let target = self.resolve_target(source_project, target_ref).await?;

        let applied = match kind {
            RelationKind::Blocks => {
                if target.is_blocked_by(&source.id) {
                    self.pull_ref(&target, "blocked_by", &source.id).await?;
                    true
                } else {
                    false
                }
            }
            RelationKind::IsBlockedBy => {
                if source.is_blocked_by(&target.id) {
                    self.pull_ref(source, "blocked_by", &target.id).await?;
                    true
                } else {
                    false
                }
            }
            RelationKind::RelatesTo => {
                if source.relates_to(&target.id) {
                    self.pull_ref(source, "relations", &target.id).await?;
                    self.pull_ref(&target, "relations", &source.id).await?;
                    true
                } else {
                    false
                }
            }
        };

        Ok(RelationOutcome {
            applied,
            source: source.identifier.clone(),
            target: target.identifier,
        })
    }

    /// Collect an issue's edges and map each to the referenced issue's
    /// identifier in one batched fetch. A reference that no longer resolves
    /// degrades to the raw id instead of failing the listing.
    pub async fn list(&self, issue: &Issue) -> Result<Vec<RelationEntry>> {
        let ids: Vec<Value> = issue
            .blocked_by
            .iter()
            .chain(issue.relations.iter())
            .map(|r| Value::from(r.id.as_str()))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let limit = ids.len();
        let referenced = self
            .store
            .find_all(
                EntityKind::Issue,
                Query::new().is_in("id", ids),
                FindOptions::default().with_limit(limit),
            )
            .await?;
        let mut identifiers = std::collections::HashMap::new();
        for entity in referenced {
            if let Some(found) = entity.into_issue() {
                identifiers.insert(found.id, found.identifier);
            }
        }

        let display = |r: &RelatedRef| match identifiers.get(&r.id) {
            Some(identifier) => identifier.clone(),
            None => {
                tracing::warn!(id = %r.id, "relation references a missing issue");
                r.id.clone()
            }
        };

        let mut entries: Vec<RelationEntry> = issue
            .blocked_by
            .iter()
            .map(|r| RelationEntry {
                kind: RelationKind::IsBlockedBy,
                target: display(r),
            })
            .collect();
        entries.extend(issue.relations.iter().map(|r| RelationEntry {
            kind: RelationKind::RelatesTo,
            target: display(r),
        }));
        Ok(entries)
    }

    async fn push_ref(&self, issue: &Issue, field: &str, other_id: &str) -> Result<()> {
        let reference = serde_json::to_value(RelatedRef::issue(other_id))?;
        self.store
            .update_doc(
                EntityKind::Issue,
                &issue.project,
                &issue.id,
                UpdateOps::new().push(field, reference),
            )
            .await?;
        Ok(())
    }

    async fn pull_ref(&self, issue: &Issue, field: &str, other_id: &str) -> Result<()> {
        let reference = serde_json::to_value(RelatedRef::issue(other_id))?;
        self.store
            .update_doc(
                EntityKind::Issue,
                &issue.project,
                &issue.id,
                UpdateOps::new().pull(field, reference),
            )
            .await?;
        Ok(())
    }
}
