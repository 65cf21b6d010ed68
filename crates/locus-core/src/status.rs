//! Workflow status classification
//!
//! Statuses bucket into done / canceled / everything-else. The project's
//! status records are the source of truth (`category`); when that fetch
//! fails the naming heuristic keeps issue listing and creation alive rather
//! than blocking on the store.

use serde_json::Value;

use crate::model::{Entity, EntityKind, Project, StatusCategory};
use crate::store::{Condition, DocumentStore, FindOptions, Query};
use crate::{Error, Result};

/// A status with its semantic classification resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatus {
    pub id: String,
    pub name: String,
    pub is_done: bool,
    pub is_canceled: bool,
}

impl ClassifiedStatus {
    pub fn is_closed(&self) -> bool {
        self.is_done || self.is_canceled
    }
}

/// Reserved filter values consuming the classification, plus exact-name
/// selection for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    Open,
    Done,
    Canceled,
    Named(String),
}

impl From<&str> for StatusFilter {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "open" => StatusFilter::Open,
            "done" => StatusFilter::Done,
            "canceled" => StatusFilter::Canceled,
            _ => StatusFilter::Named(s.to_string()),
        }
    }
}

/// Classify every status available to the project's workflow type.
///
/// Never fails on a broken canonical fetch: the fallback derives a name
/// from the trailing id segment and classifies by substring.
pub async fn classify(
    store: &dyn DocumentStore,
    project: &Project,
) -> Result<Vec<ClassifiedStatus>> {
    let ids: Vec<Value> = project
        .statuses
        .iter()
        .map(|id| Value::from(id.as_str()))
        .collect();

    let fetched = store
        .find_all(
            EntityKind::Status,
            Query::new().is_in("id", ids),
            FindOptions::default(),
        )
        .await;

    let records = match fetched {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(
                project = %project.identifier,
                error = %err,
                "canonical status fetch failed, classifying by name heuristic"
            );
            return Ok(project
                .statuses
                .iter()
                .map(|id| heuristic(id))
                .collect());
        }
    };

    let mut by_id = std::collections::HashMap::new();
    for record in records {
        if let Some(status) = record.into_status() {
            by_id.insert(status.id.clone(), status);
        }
    }

    Ok(project
        .statuses
        .iter()
        .map(|id| match by_id.remove(id) {
            Some(status) => ClassifiedStatus {
                id: status.id,
                name: status.name,
                is_done: status.category == Some(StatusCategory::Won),
                is_canceled: status.category == Some(StatusCategory::Lost),
            },
            None => heuristic(id),
        })
        .collect())
}

/// Resolve a non-reserved filter value to exactly one status by
/// case-insensitive exact name.
pub async fn resolve_named(
    store: &dyn DocumentStore,
    project: &Project,
    name: &str,
) -> Result<ClassifiedStatus> {
    let classified = classify(store, project).await?;
    classified
        .into_iter()
        .find(|status| status.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::InvalidStatus {
            status: name.to_string(),
            project: project.identifier.clone(),
        })
}

/// Build the `status` field condition for a filter value.
///
/// `Open` excludes every done/canceled id — or applies no condition at all
/// when the project has none. `Done`/`Canceled` restrict to the matching
/// subset; an empty subset yields an empty result set, not an error.
pub async fn filter_condition(
    store: &dyn DocumentStore,
    project: &Project,
    filter: &StatusFilter,
) -> Result<Option<Condition>> {
    match filter {
        StatusFilter::Open => {
            let closed: Vec<Value> = classify(store, project)
                .await?
                .into_iter()
                .filter(ClassifiedStatus::is_closed)
                .map(|status| Value::from(status.id))
                .collect();
            if closed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Condition::Nin(closed)))
            }
        }
        StatusFilter::Done => {
            let done: Vec<Value> = classify(store, project)
                .await?
                .into_iter()
                .filter(|status| status.is_done)
                .map(|status| Value::from(status.id))
                .collect();
            Ok(Some(Condition::In(done)))
        }
        StatusFilter::Canceled => {
            let canceled: Vec<Value> = classify(store, project)
                .await?
                .into_iter()
                .filter(|status| status.is_canceled)
                .map(|status| Value::from(status.id))
                .collect();
            Ok(Some(Condition::In(canceled)))
        }
        StatusFilter::Named(name) => {
            let status = resolve_named(store, project, name).await?;
            Ok(Some(Condition::Eq(Value::from(status.id))))
        }
    }
}

/// Derive a classification from the status id alone.
///
/// The display name is taken to be the trailing ':'-separated segment; the
/// "done"/"cancel" substrings are the entire heuristic surface.
fn heuristic(id: &str) -> ClassifiedStatus {
    let name = id.rsplit(':').next().unwrap_or(id).to_string();
    let lower = name.to_lowercase();
    ClassifiedStatus {
        id: id.to_string(),
        is_done: lower.contains("done"),
        is_canceled: lower.contains("cancel"),
        name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;
    use crate::model::Status;
    use crate::store::{FindOptions, GLOBAL_SPACE};
    use async_trait::async_trait;

    async fn seed(store: &MemStore) -> Project {
        let statuses = [
            ("s-backlog", "Backlog", Some(StatusCategory::Active)),
            ("s-done", "Done", Some(StatusCategory::Won)),
            ("s-canceled", "Cancelled", Some(StatusCategory::Lost)),
            ("s-odd", "Parked", None),
        ];
        for (id, name, category) in statuses {
            store
                .create_doc(
                    EntityKind::Status,
                    GLOBAL_SPACE,
                    Entity::Status(Status::new(id.into(), name.into(), category)),
                    Some(id.into()),
                )
                .await
                .unwrap();
        }

        let mut project = Project::new("proj-1".into(), "TEST".into(), "Test".into());
        project.statuses = statuses.iter().map(|(id, _, _)| id.to_string()).collect();
        project
    }

    #[tokio::test]
    async fn categories_drive_classification() -> anyhow::Result<()> {
        let store = MemStore::new();
        let project = seed(&store).await;

        let classified = classify(&store, &project).await?;
        let flags: Vec<(bool, bool)> = classified
            .iter()
            .map(|status| (status.is_done, status.is_canceled))
            .collect();
        assert_eq!(
            flags,
            vec![(false, false), (true, false), (false, true), (false, false)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn open_filter_excludes_closed_ids() -> anyhow::Result<()> {
        let store = MemStore::new();
        let project = seed(&store).await;

        let condition = filter_condition(&store, &project, &StatusFilter::Open).await?;
        match condition {
            Some(Condition::Nin(ids)) => {
                assert_eq!(
                    ids,
                    vec![Value::from("s-done"), Value::from("s-canceled")]
                );
            }
            other => panic!("unexpected condition: {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn open_filter_without_closed_statuses_is_unfiltered() -> anyhow::Result<()> {
        let store = MemStore::new();
        store
            .create_doc(
                EntityKind::Status,
                GLOBAL_SPACE,
                Entity::Status(Status::new(
                    "s-only".into(),
                    "Working".into(),
                    Some(StatusCategory::Active),
                )),
                Some("s-only".into()),
            )
            .await?;
        let mut project = Project::new("proj-1".into(), "TEST".into(), "Test".into());
        project.statuses = vec!["s-only".into()];

        let condition = filter_condition(&store, &project, &StatusFilter::Open).await?;
        assert!(condition.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn done_filter_with_no_done_statuses_is_empty_in() -> anyhow::Result<()> {
        let store = MemStore::new();
        store
            .create_doc(
                EntityKind::Status,
                GLOBAL_SPACE,
                Entity::Status(Status::new(
                    "s-only".into(),
                    "Working".into(),
                    Some(StatusCategory::Active),
                )),
                Some("s-only".into()),
            )
            .await?;
        let mut project = Project::new("proj-1".into(), "TEST".into(), "Test".into());
        project.statuses = vec!["s-only".into()];

        let condition = filter_condition(&store, &project, &StatusFilter::Done).await?;
        match condition {
            Some(Condition::In(ids)) => assert!(ids.is_empty()),
            other => panic!("unexpected condition: {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn named_filter_matches_case_insensitively() -> anyhow::Result<()> {
        let store = MemStore::new();
        let project = seed(&store).await;

        let condition =
            filter_condition(&store, &project, &StatusFilter::Named("backlog".into())).await?;
        assert_eq!(condition, Some(Condition::Eq(Value::from("s-backlog"))));

        let err = filter_condition(&store, &project, &StatusFilter::Named("bogus".into()))
            .await
            .unwrap_err();
        match err {
            Error::InvalidStatus { status, project } => {
                assert_eq!(status, "bogus");
                assert_eq!(project, "TEST");
            }
            other => panic!("unexpected error: {}", other),
        }
        Ok(())
    }

    /// Store whose status reads fail, for exercising the fallback.
    struct BrokenStatusStore {
        inner: MemStore,
    }

    #[async_trait]
    impl DocumentStore for BrokenStatusStore {
        async fn find_one(&self, kind: EntityKind, query: Query) -> crate::Result<Option<Entity>> {
            self.inner.find_one(kind, query).await
        }

        async fn find_all(
            &self,
            kind: EntityKind,
            query: Query,
            options: FindOptions,
        ) -> crate::Result<Vec<Entity>> {
            if kind == EntityKind::Status {
                return Err(Error::StoreConnection("status shard offline".into()));
            }
            self.inner.find_all(kind, query, options).await
        }

        async fn create_doc(
            &self,
            kind: EntityKind,
            space: &str,
            entity: Entity,
            id: Option<String>,
        ) -> crate::Result<String> {
            self.inner.create_doc(kind, space, entity, id).await
        }

        async fn add_collection(
            &self,
            kind: EntityKind,
            space: &str,
            attached_to: &str,
            attached_kind: EntityKind,
            collection: &str,
            entity: Entity,
            id: Option<String>,
        ) -> crate::Result<String> {
            self.inner
                .add_collection(kind, space, attached_to, attached_kind, collection, entity, id)
                .await
        }

        async fn update_doc(
            &self,
            kind: EntityKind,
            space: &str,
            id: &str,
            ops: crate::store::UpdateOps,
        ) -> crate::Result<Option<Entity>> {
            self.inner.update_doc(kind, space, id, ops).await
        }

        async fn remove_doc(&self, kind: EntityKind, space: &str, id: &str) -> crate::Result<()> {
            self.inner.remove_doc(kind, space, id).await
        }
    }

    #[tokio::test]
    async fn fallback_classifies_by_trailing_segment() -> anyhow::Result<()> {
        let store = BrokenStatusStore {
            inner: MemStore::new(),
        };
        let mut project = Project::new("proj-1".into(), "TEST".into(), "Test".into());
        project.statuses = vec![
            "workflow:status:Done Task".into(),
            "workflow:status:Canceled Item".into(),
            "workflow:status:In Review".into(),
        ];

        let classified = classify(&store, &project).await?;
        assert_eq!(classified[0].name, "Done Task");
        assert!(classified[0].is_done);
        assert!(!classified[0].is_canceled);
        assert!(classified[1].is_canceled);
        assert!(!classified[2].is_done && !classified[2].is_canceled);
        Ok(())
    }
}
