//! Entity data model for locus
//!
//! These mirror the workspace entities the document store persists. The
//! store owns all durable state; values here are per-call working copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known entity classes.
///
/// The store addresses every document by one of these kinds. A fixed enum
/// instead of a dynamic class registry: the set is closed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Issue,
    Status,
    Person,
    Channel,
    Tag,
    Component,
    Milestone,
    Teamspace,
    Document,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Project => "project",
            EntityKind::Issue => "issue",
            EntityKind::Status => "status",
            EntityKind::Person => "person",
            EntityKind::Channel => "channel",
            EntityKind::Tag => "tag",
            EntityKind::Component => "component",
            EntityKind::Milestone => "milestone",
            EntityKind::Teamspace => "teamspace",
            EntityKind::Document => "document",
        };
        write!(f, "{}", s)
    }
}

/// Semantic workflow bucket of a status, independent of its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Active,
    Won,
    Lost,
}

impl std::str::FromStr for StatusCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(StatusCategory::Active),
            "won" => Ok(StatusCategory::Won),
            "lost" => Ok(StatusCategory::Lost),
            _ => Err(crate::Error::InvalidStatus {
                status: s.to_string(),
                project: String::new(),
            }),
        }
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCategory::Active => write!(f, "active"),
            StatusCategory::Won => write!(f, "won"),
            StatusCategory::Lost => write!(f, "lost"),
        }
    }
}

/// Non-owning reference from one issue to another.
///
/// Used for `blocked_by` and `relates_to` edges; traversal only, no
/// lifecycle coupling to the referenced issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRef {
    pub id: String,
    pub kind: EntityKind,
}

impl RelatedRef {
    pub fn issue(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Issue,
        }
    }
}

/// A project: the scope that owns issues and their numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,

    /// Short uppercase code, unique per workspace (e.g. "TEST")
    pub identifier: String,

    pub name: String,

    /// Store-owned issue counter; incremented on each issue creation and
    /// read back after the write
    pub sequence: i64,

    /// Status assigned to new issues when the caller names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_status: Option<String>,

    /// Status ids valid for this project's workflow type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: String, identifier: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            identifier: identifier.to_uppercase(),
            name,
            sequence: 0,
            default_status: None,
            statuses: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An issue within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,

    /// Owning project id
    pub project: String,

    /// Number assigned from the project sequence
    pub number: i64,

    /// "{project.identifier}-{number}"; unique and immutable once assigned
    pub identifier: String,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Status id
    pub status: String,

    /// Assigned person id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Opaque ordering key; byte-wise comparison total-orders siblings
    pub rank: String,

    /// Issues that block this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<RelatedRef>,

    /// Symmetric relates-to edges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelatedRef>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(
        project: String,
        number: i64,
        identifier: String,
        title: String,
        status: String,
        rank: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            project,
            number,
            identifier,
            title,
            description: None,
            status,
            assignee: None,
            rank,
            blocked_by: Vec::new(),
            relations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `other` is already recorded as blocking this issue
    pub fn is_blocked_by(&self, other_id: &str) -> bool {
        self.blocked_by.iter().any(|r| r.id == other_id)
    }

    /// Whether a relates-to edge to `other` exists on this side
    pub fn relates_to(&self, other_id: &str) -> bool {
        self.relations.iter().any(|r| r.id == other_id)
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.identifier, self.title)
    }
}

/// A workflow status.
///
/// `category` is the source of truth for classification; its absence is
/// valid and handled by the naming fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<StatusCategory>,
}

impl Status {
    pub fn new(id: String, name: String, category: Option<StatusCategory>) -> Self {
        Self { id, name, category }
    }
}

/// A person in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Person {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            created_at: Utc::now(),
        }
    }
}

/// A contact point attached to a person (e.g. email), used for identity
/// resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// Owning person id
    pub person: String,
    /// Provider key, e.g. "email"
    pub provider: String,
    pub value: String,
}

/// Provider key for email channels.
pub const CHANNEL_EMAIL: &str = "email";

/// A teamspace: the scope that owns documents and their ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teamspace {
    pub id: String,
    pub name: String,
}

/// A document within a teamspace, manually ordered by rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Owning teamspace id
    pub teamspace: String,
    pub title: String,
    pub rank: String,
}

/// A project component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    /// Owning project id
    pub project: String,
    pub label: String,
}

/// A project milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    /// Owning project id
    pub project: String,
    pub label: String,
}

/// A workspace-level tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub title: String,
}

/// A typed document as stored by the collaborator.
///
/// The store trait traffics in this enum so one interface covers every
/// entity class; callers narrow with the `into_*` accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Project(Project),
    Issue(Issue),
    Status(Status),
    Person(Person),
    Channel(Channel),
    Tag(Tag),
    Component(Component),
    Milestone(Milestone),
    Teamspace(Teamspace),
    Document(Document),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Project(_) => EntityKind::Project,
            Entity::Issue(_) => EntityKind::Issue,
            Entity::Status(_) => EntityKind::Status,
            Entity::Person(_) => EntityKind::Person,
            Entity::Channel(_) => EntityKind::Channel,
            Entity::Tag(_) => EntityKind::Tag,
            Entity::Component(_) => EntityKind::Component,
            Entity::Milestone(_) => EntityKind::Milestone,
            Entity::Teamspace(_) => EntityKind::Teamspace,
            Entity::Document(_) => EntityKind::Document,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Project(e) => &e.id,
            Entity::Issue(e) => &e.id,
            Entity::Status(e) => &e.id,
            Entity::Person(e) => &e.id,
            Entity::Channel(e) => &e.id,
            Entity::Tag(e) => &e.id,
            Entity::Component(e) => &e.id,
            Entity::Milestone(e) => &e.id,
            Entity::Teamspace(e) => &e.id,
            Entity::Document(e) => &e.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Entity::Project(e) => e.id = id,
            Entity::Issue(e) => e.id = id,
            Entity::Status(e) => e.id = id,
            Entity::Person(e) => e.id = id,
            Entity::Channel(e) => e.id = id,
            Entity::Tag(e) => e.id = id,
            Entity::Component(e) => e.id = id,
            Entity::Milestone(e) => e.id = id,
            Entity::Teamspace(e) => e.id = id,
            Entity::Document(e) => e.id = id,
        }
    }

    /// Project the entity to a JSON object for field-level query matching.
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a typed entity from a JSON projection of the given kind.
    pub fn from_value(kind: EntityKind, value: serde_json::Value) -> crate::Result<Entity> {
        let entity = match kind {
            EntityKind::Project => Entity::Project(serde_json::from_value(value)?),
            EntityKind::Issue => Entity::Issue(serde_json::from_value(value)?),
            EntityKind::Status => Entity::Status(serde_json::from_value(value)?),
            EntityKind::Person => Entity::Person(serde_json::from_value(value)?),
            EntityKind::Channel => Entity::Channel(serde_json::from_value(value)?),
            EntityKind::Tag => Entity::Tag(serde_json::from_value(value)?),
            EntityKind::Component => Entity::Component(serde_json::from_value(value)?),
            EntityKind::Milestone => Entity::Milestone(serde_json::from_value(value)?),
            EntityKind::Teamspace => Entity::Teamspace(serde_json::from_value(value)?),
            EntityKind::Document => Entity::Document(serde_json::from_value(value)?),
        };
        Ok(entity)
    }

    pub fn into_project(self) -> Option<Project> {
        match self {
            Entity::Project(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_issue(self) -> Option<Issue> {
        match self {
            Entity::Issue(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_status(self) -> Option<Status> {
        match self {
            Entity::Status(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_person(self) -> Option<Person> {
        match self {
            Entity::Person(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_channel(self) -> Option<Channel> {
        match self {
            Entity::Channel(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_tag(self) -> Option<Tag> {
        match self {
            Entity::Tag(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_component(self) -> Option<Component> {
        match self {
            Entity::Component(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_milestone(self) -> Option<Milestone> {
        match self {
            Entity::Milestone(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_teamspace(self) -> Option<Teamspace> {
        match self {
            Entity::Teamspace(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            Entity::Document(e) => Some(e),
            _ => None,
        }
    }
}
