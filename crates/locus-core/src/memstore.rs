//! In-memory document store
//!
//! The reference [`DocumentStore`] implementation: backs the test suite and
//! local embedding. Queries are evaluated against JSON projections of the
//! typed entities, so the same field names work here and against a real
//! store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ident::generate_doc_id;
use crate::model::{Entity, EntityKind};
use crate::store::{Condition, DocumentStore, FindOptions, Query, SortOrder, UpdateOps};
use crate::{Error, Result};

#[derive(Default)]
struct Inner {
    docs: HashMap<EntityKind, BTreeMap<String, Entity>>,
}

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents of a kind, for test assertions.
    pub async fn count(&self, kind: EntityKind) -> usize {
        let inner = self.inner.lock().await;
        inner.docs.get(&kind).map(BTreeMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemStore {
    async fn find_one(&self, kind: EntityKind, query: Query) -> Result<Option<Entity>> {
        let inner = self.inner.lock().await;
        let Some(docs) = inner.docs.get(&kind) else {
            return Ok(None);
        };
        for entity in docs.values() {
            if matches(&entity.to_value()?, &query) {
                return Ok(Some(entity.clone()));
            }
        }
        Ok(None)
    }

    async fn find_all(
        &self,
        kind: EntityKind,
        query: Query,
        options: FindOptions,
    ) -> Result<Vec<Entity>> {
        let inner = self.inner.lock().await;
        let Some(docs) = inner.docs.get(&kind) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<(Value, Entity)> = Vec::new();
        for entity in docs.values() {
            let value = entity.to_value()?;
            if matches(&value, &query) {
                hits.push((value, entity.clone()));
            }
        }

        if let Some((field, order)) = &options.sort {
            hits.sort_by(|(a, _), (b, _)| {
                let ordering = cmp_values(field_of(a, field), field_of(b, field));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = options.limit {
            hits.truncate(limit);
        }

        Ok(hits.into_iter().map(|(_, entity)| entity).collect())
    }

    async fn create_doc(
        &self,
        kind: EntityKind,
        _space: &str,
        mut entity: Entity,
        id: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(generate_doc_id);
        entity.set_id(id.clone());

        let mut inner = self.inner.lock().await;
        let docs = inner.docs.entry(kind).or_default();
        if docs.contains_key(&id) {
            return Err(Error::StoreConnection(format!(
                "duplicate document id: {}",
                id
            )));
        }
        docs.insert(id.clone(), entity);
        Ok(id)
    }

    async fn add_collection(
        &self,
        kind: EntityKind,
        space: &str,
        _attached_to: &str,
        _attached_kind: EntityKind,
        _collection: &str,
        entity: Entity,
        id: Option<String>,
    ) -> Result<String> {
        // Attachment bookkeeping lives in the entity's own fields (e.g.
        // Channel.person); storage-wise this is a plain create.
        self.create_doc(kind, space, entity, id).await
    }

    async fn update_doc(
        &self,
        kind: EntityKind,
        _space: &str,
        id: &str,
        ops: UpdateOps,
    ) -> Result<Option<Entity>> {
        let mut inner = self.inner.lock().await;
        let Some(docs) = inner.docs.get_mut(&kind) else {
            return Ok(None);
        };
        let Some(entity) = docs.get(id) else {
            return Ok(None);
        };

        let mut value = entity.to_value()?;
        let Some(object) = value.as_object_mut() else {
            return Err(Error::StoreConnection(format!(
                "document {} is not an object",
                id
            )));
        };

        for (field, new_value) in ops.set {
            object.insert(field, new_value);
        }
        for (field, by) in ops.inc {
            let current = object.get(&field).and_then(Value::as_i64).unwrap_or(0);
            object.insert(field, Value::from(current + by));
        }
        for (field, pushed) in ops.push {
            match object.get_mut(&field) {
                Some(Value::Array(items)) => items.push(pushed),
                _ => {
                    object.insert(field, Value::Array(vec![pushed]));
                }
            }
        }
        for (field, pulled) in ops.pull {
            if let Some(Value::Array(items)) = object.get_mut(&field) {
                items.retain(|item| item != &pulled);
            }
        }

        let updated = Entity::from_value(kind, value)?;
        docs.insert(id.to_string(), updated.clone());
        Ok(Some(updated))
    }

    async fn remove_doc(&self, kind: EntityKind, _space: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(docs) = inner.docs.get_mut(&kind) {
            docs.remove(id);
        }
        Ok(())
    }
}

fn field_of<'a>(value: &'a Value, field: &str) -> &'a Value {
    value.get(field).unwrap_or(&Value::Null)
}

fn matches(value: &Value, query: &Query) -> bool {
    query.iter().all(|(field, condition)| {
        let actual = field_of(value, field);
        match condition {
            Condition::Eq(expected) => actual == expected,
            Condition::In(set) => set.contains(actual),
            Condition::Nin(set) => !set.contains(actual),
            Condition::Like(fragment) => actual
                .as_str()
                .map(|s| contains_ci(s, fragment))
                .unwrap_or(false),
            // Full-text: scan every string field of the document
            Condition::Search(text) => value
                .as_object()
                .map(|object| {
                    object
                        .values()
                        .filter_map(Value::as_str)
                        .any(|s| contains_ci(s, text))
                })
                .unwrap_or(false),
        }
    })
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn cmp_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Issue, Project};
    use crate::store::GLOBAL_SPACE;

    fn issue(project: &str, number: i64, identifier: &str, rank: &str) -> Entity {
        let mut issue = Issue::new(
            project.to_string(),
            number,
            identifier.to_string(),
            format!("Issue {}", number),
            "status-open".to_string(),
            rank.to_string(),
        );
        issue.id = format!("issue-{}", number);
        Entity::Issue(issue)
    }

    #[tokio::test]
    async fn find_one_matches_eq() -> anyhow::Result<()> {
        let store = MemStore::new();
        store
            .create_doc(
                EntityKind::Issue,
                "proj-1",
                issue("proj-1", 1, "TEST-1", "0|hzzzzz:"),
                Some("issue-1".into()),
            )
            .await?;

        let hit = store
            .find_one(EntityKind::Issue, Query::new().eq("identifier", "TEST-1"))
            .await?;
        assert!(hit.is_some());

        let miss = store
            .find_one(EntityKind::Issue, Query::new().eq("identifier", "TEST-2"))
            .await?;
        assert!(miss.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn find_all_sorts_and_limits() -> anyhow::Result<()> {
        let store = MemStore::new();
        for (n, rank) in [(1, "0|hzzzzz:"), (2, "0|aaaaaa:"), (3, "0|qzzzzz:")] {
            store
                .create_doc(
                    EntityKind::Issue,
                    "proj-1",
                    issue("proj-1", n, &format!("TEST-{}", n), rank),
                    Some(format!("issue-{}", n)),
                )
                .await?;
        }

        let sorted = store
            .find_all(
                EntityKind::Issue,
                Query::new().eq("project", "proj-1"),
                FindOptions::sorted_by("rank", SortOrder::Descending).with_limit(1),
            )
            .await?;
        assert_eq!(sorted.len(), 1);
        let top = sorted[0].clone().into_issue().unwrap();
        assert_eq!(top.rank, "0|qzzzzz:");
        Ok(())
    }

    #[tokio::test]
    async fn nin_and_in_conditions() -> anyhow::Result<()> {
        let store = MemStore::new();
        for (n, status) in [(1, "s-open"), (2, "s-done"), (3, "s-canceled")] {
            let mut entity = issue("proj-1", n, &format!("TEST-{}", n), "0|hzzzzz:");
            if let Entity::Issue(i) = &mut entity {
                i.status = status.to_string();
            }
            store
                .create_doc(EntityKind::Issue, "proj-1", entity, Some(format!("issue-{}", n)))
                .await?;
        }

        let open = store
            .find_all(
                EntityKind::Issue,
                Query::new().not_in(
                    "status",
                    vec![Value::from("s-done"), Value::from("s-canceled")],
                ),
                FindOptions::default(),
            )
            .await?;
        assert_eq!(open.len(), 1);

        let done = store
            .find_all(
                EntityKind::Issue,
                Query::new().is_in("status", vec![Value::from("s-done")]),
                FindOptions::default(),
            )
            .await?;
        assert_eq!(done.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn like_is_case_insensitive_substring() -> anyhow::Result<()> {
        let store = MemStore::new();
        let project = Project::new("proj-1".into(), "TEST".into(), "Test Project".into());
        store
            .create_doc(
                EntityKind::Project,
                GLOBAL_SPACE,
                Entity::Project(project),
                Some("proj-1".into()),
            )
            .await?;

        let hit = store
            .find_one(EntityKind::Project, Query::new().like("name", "test pro"))
            .await?;
        assert!(hit.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn search_scans_string_fields() -> anyhow::Result<()> {
        let store = MemStore::new();
        store
            .create_doc(
                EntityKind::Issue,
                "proj-1",
                issue("proj-1", 7, "TEST-7", "0|hzzzzz:"),
                Some("issue-7".into()),
            )
            .await?;

        let hit = store
            .find_one(EntityKind::Issue, Query::new().search("title", "issue 7"))
            .await?;
        assert!(hit.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn update_doc_applies_operators_and_returns_post_write() -> anyhow::Result<()> {
        let store = MemStore::new();
        let project = Project::new("proj-1".into(), "TEST".into(), "Test".into());
        store
            .create_doc(
                EntityKind::Project,
                GLOBAL_SPACE,
                Entity::Project(project),
                Some("proj-1".into()),
            )
            .await?;

        let updated = store
            .update_doc(
                EntityKind::Project,
                GLOBAL_SPACE,
                "proj-1",
                UpdateOps::new().inc("sequence", 1),
            )
            .await?
            .and_then(Entity::into_project)
            .unwrap();
        assert_eq!(updated.sequence, 1);

        let again = store
            .update_doc(
                EntityKind::Project,
                GLOBAL_SPACE,
                "proj-1",
                UpdateOps::new().inc("sequence", 1),
            )
            .await?
            .and_then(Entity::into_project)
            .unwrap();
        assert_eq!(again.sequence, 2);

        let missing = store
            .update_doc(
                EntityKind::Project,
                GLOBAL_SPACE,
                "proj-404",
                UpdateOps::new().inc("sequence", 1),
            )
            .await?;
        assert!(missing.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn push_and_pull_edit_set_fields() -> anyhow::Result<()> {
        let store = MemStore::new();
        store
            .create_doc(
                EntityKind::Issue,
                "proj-1",
                issue("proj-1", 1, "TEST-1", "0|hzzzzz:"),
                Some("issue-1".into()),
            )
            .await?;

        let reference = serde_json::json!({ "id": "issue-9", "kind": "issue" });
        let updated = store
            .update_doc(
                EntityKind::Issue,
                "proj-1",
                "issue-1",
                UpdateOps::new().push("blocked_by", reference.clone()),
            )
            .await?
            .and_then(Entity::into_issue)
            .unwrap();
        assert_eq!(updated.blocked_by.len(), 1);
        assert_eq!(updated.blocked_by[0].id, "issue-9");

        let pulled = store
            .update_doc(
                EntityKind::Issue,
                "proj-1",
                "issue-1",
                UpdateOps::new().pull("blocked_by", reference),
            )
            .await?
            .and_then(Entity::into_issue)
            .unwrap();
        assert!(pulled.blocked_by.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() -> anyhow::Result<()> {
        let store = MemStore::new();
        store
            .create_doc(
                EntityKind::Issue,
                "proj-1",
                issue("proj-1", 1, "TEST-1", "0|hzzzzz:"),
                Some("issue-1".into()),
            )
            .await?;
        let duplicate = store
            .create_doc(
                EntityKind::Issue,
                "proj-1",
                issue("proj-1", 1, "TEST-1", "0|hzzzzz:"),
                Some("issue-1".into()),
            )
            .await;
        assert!(duplicate.is_err());
        Ok(())
    }
}
