//! Caller-facing operations
//!
//! The facade a tool-dispatch layer talks to: every operation takes plain
//! loose references, resolves them through the parser and locator, and runs
//! the reads and writes for one request. No state is held between calls;
//! each operation is a function of its inputs and the store's current
//! snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::graph::RelationGraph;
use crate::ident::{parse_issue_ref, IssueRef};
use crate::locate::Locator;
use crate::model::{
    Component, Document, Entity, EntityKind, Issue, Milestone, Person, Project, Tag, Teamspace,
};
use crate::person;
use crate::relation::{RelationEntry, RelationKind, RelationManager, RelationOutcome};
use crate::status::{self, ClassifiedStatus, StatusFilter};
use crate::store::{
    DocumentStore, FindOptions, Query, SortOrder, UpdateOps, GLOBAL_SPACE,
};
use crate::{rank, Error, Result};

/// Arguments for issue creation.
#[derive(Debug, Clone, Default)]
pub struct CreateIssue {
    pub title: String,
    pub description: Option<String>,
    /// Status name; the project default applies when absent
    pub status: Option<String>,
    /// Assignee reference (email or display name)
    pub assignee: Option<String>,
}

/// The operations surface of the resolution layer.
pub struct Ops {
    store: Arc<dyn DocumentStore>,
    config: Config,
}

impl Ops {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self { store, config }
    }

    fn locator(&self) -> Locator<'_> {
        Locator::with_substring(self.store.as_ref(), self.config.substring_lookup)
    }

    fn relations(&self) -> RelationManager<'_> {
        RelationManager::new(self.store.as_ref())
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    pub async fn resolve_project(&self, reference: &str) -> Result<Project> {
        self.locator().project(reference).await
    }

    pub async fn resolve_issue(&self, project_ref: &str, issue_ref: &IssueRef) -> Result<Issue> {
        let project = self.resolve_project(project_ref).await?;
        let parsed = parse_issue_ref(issue_ref, &project.identifier);
        self.locator().issue(&project, &parsed).await
    }

    pub async fn resolve_person(&self, reference: &str) -> Result<Person> {
        person::resolve(self.store.as_ref(), reference).await
    }

    pub async fn resolve_teamspace(&self, reference: &str) -> Result<Teamspace> {
        self.locator().teamspace(reference).await
    }

    pub async fn resolve_document(
        &self,
        teamspace_ref: &str,
        reference: &str,
    ) -> Result<Document> {
        let teamspace = self.resolve_teamspace(teamspace_ref).await?;
        self.locator().document(&teamspace, reference).await
    }

    pub async fn resolve_component(
        &self,
        project_ref: &str,
        reference: &str,
    ) -> Result<Component> {
        let project = self.resolve_project(project_ref).await?;
        self.locator().component(&project, reference).await
    }

    pub async fn resolve_milestone(
        &self,
        project_ref: &str,
        reference: &str,
    ) -> Result<Milestone> {
        let project = self.resolve_project(project_ref).await?;
        self.locator().milestone(&project, reference).await
    }

    pub async fn resolve_tag(&self, reference: &str) -> Result<Tag> {
        self.locator().tag(reference).await
    }

    // ------------------------------------------------------------------
    // Statuses
    // ------------------------------------------------------------------

    pub async fn classify_statuses(&self, project_ref: &str) -> Result<Vec<ClassifiedStatus>> {
        let project = self.resolve_project(project_ref).await?;
        status::classify(self.store.as_ref(), &project).await
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Rank for a new issue appended at the end of the project.
    pub async fn next_issue_rank(&self, project_ref: &str) -> Result<String> {
        let project = self.resolve_project(project_ref).await?;
        self.append_rank(EntityKind::Issue, "project", &project.id).await
    }

    /// Rank for a new document appended at the end of the teamspace.
    pub async fn next_document_rank(&self, teamspace_ref: &str) -> Result<String> {
        let teamspace = self.resolve_teamspace(teamspace_ref).await?;
        self.append_rank(EntityKind::Document, "teamspace", &teamspace.id)
            .await
    }

    /// One comparison against the current maximum sibling rank, then extend.
    async fn append_rank(
        &self,
        kind: EntityKind,
        scope_field: &str,
        scope_id: &str,
    ) -> Result<String> {
        let top = self
            .store
            .find_all(
                kind,
                Query::new().eq(scope_field, scope_id),
                FindOptions::sorted_by("rank", SortOrder::Descending).with_limit(1),
            )
            .await?;

        let mut ranks = Vec::new();
        for entity in top {
            if let Some(r) = entity.to_value()?.get("rank").and_then(|v| v.as_str()) {
                ranks.push(r.to_string());
            }
        }
        Ok(rank::next_rank(ranks.iter().map(String::as_str)))
    }

    // ------------------------------------------------------------------
    // Issues
    // ------------------------------------------------------------------

    /// Create an issue: take the next sequence number from the project,
    /// mint the identifier, resolve status and assignee, append the rank.
    ///
    /// The sequence increment and the document creation are two writes; a
    /// failure in between consumes a number without creating the issue.
    pub async fn create_issue(&self, project_ref: &str, args: CreateIssue) -> Result<Issue> {
        let project = self.resolve_project(project_ref).await?;

        let status = match &args.status {
            Some(name) => {
                status::resolve_named(self.store.as_ref(), &project, name)
                    .await?
                    .id
            }
            None => project
                .default_status
                .clone()
                .or_else(|| project.statuses.first().cloned())
                .ok_or_else(|| Error::InvalidStatus {
                    status: "default".to_string(),
                    project: project.identifier.clone(),
                })?,
        };

        let assignee = match &args.assignee {
            Some(reference) => Some(person::resolve(self.store.as_ref(), reference).await?.id),
            None => None,
        };

        let assigned = self
            .store
            .update_doc(
                EntityKind::Project,
                GLOBAL_SPACE,
                &project.id,
                UpdateOps::new().inc("sequence", 1),
            )
            .await?
            .and_then(Entity::into_project)
            .ok_or_else(|| {
                Error::StoreConnection(format!(
                    "sequence increment for {} returned no document",
                    project.identifier
                ))
            })?;
        let number = assigned.sequence;
        let identifier = format!("{}-{}", project.identifier, number);

        let rank = self
            .append_rank(EntityKind::Issue, "project", &project.id)
            .await?;

        let mut issue = Issue::new(
            project.id.clone(),
            number,
            identifier,
            args.title,
            status,
            rank,
        );
        issue.description = args.description;
        issue.assignee = assignee;

        let id = self
            .store
            .create_doc(EntityKind::Issue, &project.id, Entity::Issue(issue.clone()), None)
            .await?;
        issue.id = id;

        tracing::debug!(identifier = %issue.identifier, "created issue");
        Ok(issue)
    }

    /// List a project's issues in rank order, optionally restricted by a
    /// status filter ("open", "done", "canceled", or a status name).
    pub async fn list_issues(
        &self,
        project_ref: &str,
        filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Issue>> {
        let project = self.resolve_project(project_ref).await?;

        let mut query = Query::new().eq("project", project.id.as_str());
        if let Some(value) = filter {
            let filter = StatusFilter::from(value);
            if let Some(condition) =
                status::filter_condition(self.store.as_ref(), &project, &filter).await?
            {
                query = query.condition("status", condition);
            }
        }

        let found = self
            .store
            .find_all(
                EntityKind::Issue,
                query,
                FindOptions::sorted_by("rank", SortOrder::Ascending)
                    .with_limit(self.config.query.clamp(limit)),
            )
            .await?;
        Ok(found.into_iter().filter_map(Entity::into_issue).collect())
    }

    /// Open issues of the project whose blockers are all done or canceled.
    ///
    /// Blockers in other projects are fetched and judged against their own
    /// project's classification.
    pub async fn ready_issues(&self, project_ref: &str) -> Result<Vec<Issue>> {
        let project = self.resolve_project(project_ref).await?;

        let mut closed: HashSet<String> = status::classify(self.store.as_ref(), &project)
            .await?
            .into_iter()
            .filter(ClassifiedStatus::is_closed)
            .map(|s| s.id)
            .collect();

        let mut universe: Vec<Issue> = self
            .store
            .find_all(
                EntityKind::Issue,
                Query::new().eq("project", project.id.as_str()),
                FindOptions::sorted_by("rank", SortOrder::Ascending)
                    .with_limit(self.config.query.max_limit),
            )
            .await?
            .into_iter()
            .filter_map(Entity::into_issue)
            .collect();

        let known: HashSet<String> = universe.iter().map(|i| i.id.clone()).collect();
        let foreign: Vec<serde_json::Value> = universe
            .iter()
            .flat_map(|i| i.blocked_by.iter())
            .filter(|r| !known.contains(&r.id))
            .map(|r| serde_json::Value::from(r.id.as_str()))
            .collect();

        if !foreign.is_empty() {
            let blockers: Vec<Issue> = self
                .store
                .find_all(
                    EntityKind::Issue,
                    Query::new().is_in("id", foreign),
                    FindOptions::default(),
                )
                .await?
                .into_iter()
                .filter_map(Entity::into_issue)
                .collect();

            let foreign_projects: HashSet<String> = blockers
                .iter()
                .map(|i| i.project.clone())
                .filter(|p| *p != project.id)
                .collect();
            for project_id in foreign_projects {
                let found = self
                    .store
                    .find_one(
                        EntityKind::Project,
                        Query::new().eq("id", project_id.as_str()),
                    )
                    .await?
                    .and_then(Entity::into_project);
                if let Some(other) = found {
                    closed.extend(
                        status::classify(self.store.as_ref(), &other)
                            .await?
                            .into_iter()
                            .filter(ClassifiedStatus::is_closed)
                            .map(|s| s.id),
                    );
                }
            }

            universe.extend(blockers);
        }

        let graph = RelationGraph::from_issues(&universe);
        Ok(graph
            .unblocked(&universe, &closed)
            .into_iter()
            .filter(|i| i.project == project.id)
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    pub async fn add_relation(
        &self,
        project_ref: &str,
        source_ref: &IssueRef,
        kind: RelationKind,
        target_ref: &IssueRef,
    ) -> Result<RelationOutcome> {
        let project = self.resolve_project(project_ref).await?;
        let parsed = parse_issue_ref(source_ref, &project.identifier);
        let source = self.locator().issue(&project, &parsed).await?;
        self.relations().add(&project, &source, kind, target_ref).await
    }

    pub async fn remove_relation(
        &self,
        project_ref: &str,
        source_ref: &IssueRef,
        kind: RelationKind,
        target_ref: &IssueRef,
    ) -> Result<RelationOutcome> {
        let project = self.resolve_project(project_ref).await?;
        let parsed = parse_issue_ref(source_ref, &project.identifier);
        let source = self.locator().issue(&project, &parsed).await?;
        self.relations()
            .remove(&project, &source, kind, target_ref)
            .await
    }

    pub async fn list_relations(
        &self,
        project_ref: &str,
        issue_ref: &IssueRef,
    ) -> Result<Vec<RelationEntry>> {
        let issue = self.resolve_issue(project_ref, issue_ref).await?;
        self.relations().list(&issue).await
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Create a document at the end of a teamspace's manual order.
    pub async fn create_document(&self, teamspace_ref: &str, title: String) -> Result<Document> {
        let teamspace = self.resolve_teamspace(teamspace_ref).await?;
        let rank = self
            .append_rank(EntityKind::Document, "teamspace", &teamspace.id)
            .await?;

        let mut document = Document {
            id: String::new(),
            teamspace: teamspace.id.clone(),
            title,
            rank,
        };
        let id = self
            .store
            .create_doc(
                EntityKind::Document,
                &teamspace.id,
                Entity::Document(document.clone()),
                None,
            )
            .await?;
        document.id = id;
        Ok(document)
    }
}
