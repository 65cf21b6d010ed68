//! Person resolution from emails and display names
//!
//! Identity references arrive as emails or free-typed names. Resolution
//! order: exact email channel, exact name, substring channel value,
//! substring name — each step only when the previous yields nothing. An
//! orphaned channel (contact point whose owner record is gone) falls
//! through instead of failing.

use crate::model::{Channel, Entity, EntityKind, Person, CHANNEL_EMAIL};
use crate::store::{clamp_limit, DocumentStore, FindOptions, Query};
use crate::{Error, Result};

pub async fn resolve(store: &dyn DocumentStore, reference: &str) -> Result<Person> {
    let wanted = reference.trim();
    if wanted.is_empty() {
        return Err(Error::InvalidPersonReference(reference.to_string()));
    }

    // 1. exact email channel
    let channel = store
        .find_one(
            EntityKind::Channel,
            Query::new().eq("provider", CHANNEL_EMAIL).eq("value", wanted),
        )
        .await?
        .and_then(Entity::into_channel);
    if let Some(channel) = channel {
        match owner(store, &channel).await? {
            Some(person) => return Ok(person),
            None => tracing::debug!(
                channel = %channel.id,
                value = %channel.value,
                "orphaned channel, falling back to name matching"
            ),
        }
    }

    // 2. exact name
    let by_name = store
        .find_one(EntityKind::Person, Query::new().eq("name", wanted))
        .await?
        .and_then(Entity::into_person);
    if let Some(person) = by_name {
        return Ok(person);
    }

    // 3. substring channel value
    let channels = store
        .find_all(
            EntityKind::Channel,
            Query::new()
                .eq("provider", CHANNEL_EMAIL)
                .like("value", wanted),
            FindOptions::default().with_limit(clamp_limit(None)),
        )
        .await?;
    for entity in channels {
        if let Some(channel) = entity.into_channel() {
            if let Some(person) = owner(store, &channel).await? {
                return Ok(person);
            }
        }
    }

    // 4. substring name
    let fuzzy = store
        .find_one(EntityKind::Person, Query::new().like("name", wanted))
        .await?
        .and_then(Entity::into_person);
    if let Some(person) = fuzzy {
        return Ok(person);
    }

    Err(Error::PersonNotFound(reference.to_string()))
}

async fn owner(store: &dyn DocumentStore, channel: &Channel) -> Result<Option<Person>> {
    Ok(store
        .find_one(
            EntityKind::Person,
            Query::new().eq("id", channel.person.as_str()),
        )
        .await?
        .and_then(Entity::into_person))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;
    use crate::store::GLOBAL_SPACE;

    async fn seed_person(store: &MemStore, id: &str, name: &str, email: Option<&str>) {
        store
            .create_doc(
                EntityKind::Person,
                GLOBAL_SPACE,
                Entity::Person(Person::new(id.to_string(), name.to_string())),
                Some(id.to_string()),
            )
            .await
            .unwrap();
        if let Some(email) = email {
            seed_channel(store, &format!("ch-{}", id), id, email).await;
        }
    }

    async fn seed_channel(store: &MemStore, id: &str, person: &str, email: &str) {
        store
            .add_collection(
                EntityKind::Channel,
                GLOBAL_SPACE,
                person,
                EntityKind::Person,
                "channels",
                Entity::Channel(Channel {
                    id: id.to_string(),
                    person: person.to_string(),
                    provider: CHANNEL_EMAIL.to_string(),
                    value: email.to_string(),
                }),
                Some(id.to_string()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exact_email_beats_substring_name() -> anyhow::Result<()> {
        let store = MemStore::new();
        seed_person(&store, "p-ada", "Ada Lovelace", Some("ada@example.com")).await;
        // Unrelated person whose display name contains the email string
        seed_person(&store, "p-decoy", "ada@example.com (import)", None).await;

        let person = resolve(&store, "ada@example.com").await?;
        assert_eq!(person.id, "p-ada");
        Ok(())
    }

    #[tokio::test]
    async fn exact_name_resolves() -> anyhow::Result<()> {
        let store = MemStore::new();
        seed_person(&store, "p-ada", "Ada Lovelace", None).await;

        let person = resolve(&store, "Ada Lovelace").await?;
        assert_eq!(person.id, "p-ada");
        Ok(())
    }

    #[tokio::test]
    async fn substring_channel_before_substring_name() -> anyhow::Result<()> {
        let store = MemStore::new();
        seed_person(&store, "p-ada", "Ada Lovelace", Some("ada@example.com")).await;
        seed_person(&store, "p-decoy", "ada@example (backup)", None).await;

        // Not an exact email or name; channel substring should win over the
        // decoy's substring name match
        let person = resolve(&store, "ada@example").await?;
        assert_eq!(person.id, "p-ada");
        Ok(())
    }

    #[tokio::test]
    async fn substring_name_is_the_last_resort() -> anyhow::Result<()> {
        let store = MemStore::new();
        seed_person(&store, "p-ada", "Ada Lovelace", None).await;

        let person = resolve(&store, "lovelace").await?;
        assert_eq!(person.id, "p-ada");
        Ok(())
    }

    #[tokio::test]
    async fn orphaned_channel_falls_through_to_name() -> anyhow::Result<()> {
        let store = MemStore::new();
        // Channel whose owner record does not exist
        seed_channel(&store, "ch-orphan", "p-gone", "ghost@example.com").await;
        seed_person(&store, "p-ghost", "ghost@example.com", None).await;

        let person = resolve(&store, "ghost@example.com").await?;
        assert_eq!(person.id, "p-ghost");
        Ok(())
    }

    #[tokio::test]
    async fn blank_reference_is_invalid() {
        let store = MemStore::new();
        let err = resolve(&store, "   ").await.unwrap_err();
        match err {
            Error::InvalidPersonReference(value) => assert_eq!(value, "   "),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn exhausted_lookup_is_not_found() {
        let store = MemStore::new();
        let err = resolve(&store, "nobody").await.unwrap_err();
        match err {
            Error::PersonNotFound(value) => assert_eq!(value, "nobody"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
