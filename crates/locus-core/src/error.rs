//! Error types for locus
//!
//! Every lookup failure carries the raw reference the caller typed, plus the
//! containing project/teamspace where one applies, so the caller can render
//! an actionable message without further lookups.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Issue not found: {identifier} in project {project}")]
    IssueNotFound { identifier: String, project: String },

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Teamspace not found: {0}")]
    TeamspaceNotFound(String),

    #[error("Document not found: {identifier} in teamspace {teamspace}")]
    DocumentNotFound {
        identifier: String,
        teamspace: String,
    },

    #[error("Component not found: {identifier} in project {project}")]
    ComponentNotFound { identifier: String, project: String },

    #[error("Milestone not found: {identifier} in project {project}")]
    MilestoneNotFound { identifier: String, project: String },

    #[error("Invalid status '{status}' for project {project}")]
    InvalidStatus { status: String, project: String },

    #[error("Invalid person reference: {0}")]
    InvalidPersonReference(String),

    #[error("Invalid relation kind: {0}")]
    InvalidRelationKind(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store connection error: {0}")]
    StoreConnection(String),

    #[error("Store authentication error: {0}")]
    StoreAuth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
