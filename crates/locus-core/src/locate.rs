//! Entity location from loose references
//!
//! One fixed lookup-order policy for every entity class: exact id first,
//! then the exact name/identifier field, then a case-insensitive name pass.
//! Substring matching is opt-in and off by default; the person resolver is
//! the one caller that wants it. Exhausted lookups produce the typed
//! not-found error for the class, carrying the raw reference and the
//! containing scope — never a generic error.

use serde_json::Value;

use crate::ident::ParsedRef;
use crate::model::{
    Component, Document, Entity, EntityKind, Issue, Milestone, Project, Tag, Teamspace,
};
use crate::store::{clamp_limit, DocumentStore, FindOptions, Query};
use crate::{Error, Result};

pub struct Locator<'a> {
    store: &'a dyn DocumentStore,
    substring: bool,
}

impl<'a> Locator<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            substring: false,
        }
    }

    /// Enable the substring fallback step for name lookups.
    pub fn with_substring(store: &'a dyn DocumentStore, enabled: bool) -> Self {
        Self {
            store,
            substring: enabled,
        }
    }

    pub async fn project(&self, reference: &str) -> Result<Project> {
        let queries = vec![
            Query::new().eq("id", reference),
            Query::new().eq("identifier", reference.to_uppercase()),
            Query::new().eq("name", reference),
        ];
        self.lookup(EntityKind::Project, queries, "name", reference, None)
            .await?
            .and_then(Entity::into_project)
            .ok_or_else(|| Error::ProjectNotFound(reference.to_string()))
    }

    /// Locate an issue within a project from a parsed reference.
    ///
    /// The stored identifier may differ in formatting from what naive string
    /// building produces (zero-padding and the like); the number is the
    /// authoritative fallback key.
    pub async fn issue(&self, project: &Project, parsed: &ParsedRef) -> Result<Issue> {
        let by_identifier = self
            .store
            .find_one(
                EntityKind::Issue,
                Query::new().eq("identifier", parsed.full_identifier.as_str()),
            )
            .await?;
        if let Some(issue) = by_identifier.and_then(Entity::into_issue) {
            return Ok(issue);
        }

        if let Some(number) = parsed.number {
            tracing::debug!(
                identifier = %parsed.full_identifier,
                number,
                "issue identifier miss, falling back to project+number"
            );
            let by_number = self
                .store
                .find_one(
                    EntityKind::Issue,
                    Query::new()
                        .eq("project", project.id.as_str())
                        .eq("number", number),
                )
                .await?;
            if let Some(issue) = by_number.and_then(Entity::into_issue) {
                return Ok(issue);
            }
        }

        Err(Error::IssueNotFound {
            identifier: parsed.full_identifier.clone(),
            project: project.identifier.clone(),
        })
    }

    pub async fn teamspace(&self, reference: &str) -> Result<Teamspace> {
        let queries = vec![
            Query::new().eq("id", reference),
            Query::new().eq("name", reference),
        ];
        self.lookup(EntityKind::Teamspace, queries, "name", reference, None)
            .await?
            .and_then(Entity::into_teamspace)
            .ok_or_else(|| Error::TeamspaceNotFound(reference.to_string()))
    }

    pub async fn document(&self, teamspace: &Teamspace, reference: &str) -> Result<Document> {
        let scope = ("teamspace", teamspace.id.as_str());
        let queries = vec![
            Query::new().eq("id", reference),
            scoped(scope).eq("title", reference),
        ];
        self.lookup(
            EntityKind::Document,
            queries,
            "title",
            reference,
            Some(scope),
        )
        .await?
        .and_then(Entity::into_document)
        .ok_or_else(|| Error::DocumentNotFound {
            identifier: reference.to_string(),
            teamspace: teamspace.name.clone(),
        })
    }

    pub async fn component(&self, project: &Project, reference: &str) -> Result<Component> {
        let scope = ("project", project.id.as_str());
        let queries = vec![
            Query::new().eq("id", reference),
            scoped(scope).eq("label", reference),
        ];
        self.lookup(
            EntityKind::Component,
            queries,
            "label",
            reference,
            Some(scope),
        )
        .await?
        .and_then(Entity::into_component)
        .ok_or_else(|| Error::ComponentNotFound {
            identifier: reference.to_string(),
            project: project.identifier.clone(),
        })
    }

    pub async fn milestone(&self, project: &Project, reference: &str) -> Result<Milestone> {
        let scope = ("project", project.id.as_str());
        let queries = vec![
            Query::new().eq("id", reference),
            scoped(scope).eq("label", reference),
        ];
        self.lookup(
            EntityKind::Milestone,
            queries,
            "label",
            reference,
            Some(scope),
        )
        .await?
        .and_then(Entity::into_milestone)
        .ok_or_else(|| Error::MilestoneNotFound {
            identifier: reference.to_string(),
            project: project.identifier.clone(),
        })
    }

    pub async fn tag(&self, reference: &str) -> Result<Tag> {
        let queries = vec![
            Query::new().eq("id", reference),
            Query::new().eq("title", reference),
        ];
        self.lookup(EntityKind::Tag, queries, "title", reference, None)
            .await?
            .and_then(Entity::into_tag)
            .ok_or_else(|| Error::TagNotFound(reference.to_string()))
    }

    /// Run exact queries in order, then the case-insensitive name pass, then
    /// the substring pass when enabled. First non-empty result wins.
    async fn lookup(
        &self,
        kind: EntityKind,
        queries: Vec<Query>,
        name_field: &str,
        reference: &str,
        scope: Option<(&str, &str)>,
    ) -> Result<Option<Entity>> {
        for query in queries {
            if let Some(entity) = self.store.find_one(kind, query).await? {
                return Ok(Some(entity));
            }
        }

        // Case-insensitive exact: substring-query the store, compare locally
        let mut like = match scope {
            Some(scope) => scoped(scope),
            None => Query::new(),
        };
        like = like.like(name_field, reference);
        let candidates = self
            .store
            .find_all(
                kind,
                like.clone(),
                FindOptions::default().with_limit(clamp_limit(None)),
            )
            .await?;
        for entity in candidates {
            if field_eq_ignore_case(&entity, name_field, reference)? {
                return Ok(Some(entity));
            }
        }

        if self.substring {
            if let Some(entity) = self.store.find_one(kind, like).await? {
                return Ok(Some(entity));
            }
        }

        Ok(None)
    }
}

fn scoped((field, id): (&str, &str)) -> Query {
    Query::new().eq(field, id)
}

fn field_eq_ignore_case(entity: &Entity, field: &str, reference: &str) -> Result<bool> {
    let value = entity.to_value()?;
    Ok(value
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.eq_ignore_ascii_case(reference))
        .unwrap_or(false))
}
