use std::collections::BTreeMap;

use aclsync_error::{AclSyncResult, GenericError, StackError, StatusCode};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{NewTopic, TopicGateway, TopicRecord, UserGateway, UserRecord};

/// Реляционный шлюз в памяти процесса. Используется в тестах и в CLI, где
/// настоящей базы нет.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<u64, UserRecord>,
    topics: BTreeMap<u64, TopicRecord>,
    next_user_id: u64,
    next_topic_id: u64,
}

fn not_found(what: String) -> StackError {
    StackError::new(GenericError::new(StatusCode::NotFound, what))
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создаёт пользователя; повторный email возвращает существующую запись.
    pub fn insert_user(
        &self,
        email: &str,
    ) -> UserRecord {
        let mut t = self.inner.write();
        if let Some(user) = t.users.values().find(|u| u.email == email) {
            return user.clone();
        }
        t.next_user_id += 1;
        let user = UserRecord {
            id: t.next_user_id,
            email: email.to_string(),
            broker_enabled: false,
        };
        t.users.insert(user.id, user.clone());
        user
    }

    pub fn topics(&self) -> Vec<TopicRecord> {
        self.inner.read().topics.values().cloned().collect()
    }
}

#[async_trait]
impl UserGateway for MemoryGateway {
    async fn user_by_id(
        &self,
        id: u64,
    ) -> AclSyncResult<UserRecord> {
        self.inner
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("user {id} not found")))
    }

    async fn user_by_email(
        &self,
        email: &str,
    ) -> AclSyncResult<UserRecord> {
        self.inner
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| not_found(format!("user {email} not found")))
    }

    async fn set_broker_enabled(
        &self,
        user_id: u64,
        enabled: bool,
    ) -> AclSyncResult<()> {
        let mut t = self.inner.write();
        let user = t
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found(format!("user {user_id} not found")))?;
        user.broker_enabled = enabled;
        Ok(())
    }
}

#[async_trait]
impl TopicGateway for MemoryGateway {
    async fn topic_by_id(
        &self,
        id: u64,
    ) -> AclSyncResult<TopicRecord> {
        self.inner
            .read()
            .topics
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("topic {id} not found")))
    }

    async fn topic_owner_email(
        &self,
        topic_id: u64,
    ) -> AclSyncResult<String> {
        let t = self.inner.read();
        let topic = t
            .topics
            .get(&topic_id)
            .ok_or_else(|| not_found(format!("topic {topic_id} not found")))?;
        t.users
            .get(&topic.owner_id)
            .map(|u| u.email.clone())
            .ok_or_else(|| not_found(format!("owner of topic {topic_id} not found")))
    }

    async fn topic_exists(
        &self,
        owner_id: u64,
        name: &str,
    ) -> AclSyncResult<bool> {
        Ok(self
            .inner
            .read()
            .topics
            .values()
            .any(|r| r.owner_id == owner_id && r.name == name))
    }

    async fn insert_topic(
        &self,
        topic: NewTopic,
    ) -> AclSyncResult<TopicRecord> {
        let mut t = self.inner.write();
        if !t.users.contains_key(&topic.owner_id) {
            return Err(not_found(format!("user {} not found", topic.owner_id)));
        }
        let duplicate = t
            .topics
            .values()
            .any(|r| r.owner_id == topic.owner_id && r.name == topic.name);
        if duplicate {
            return Err(StackError::new(GenericError::new(
                StatusCode::AlreadyExists,
                format!("topic {} already exists", topic.name),
            )));
        }

        t.next_topic_id += 1;
        let record = TopicRecord {
            id: t.next_topic_id,
            owner_id: topic.owner_id,
            name: topic.name,
            can_read: topic.can_read,
            can_write: topic.can_write,
        };
        t.topics.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_topic_permissions(
        &self,
        topic_id: u64,
        can_read: bool,
        can_write: bool,
    ) -> AclSyncResult<TopicRecord> {
        let mut t = self.inner.write();
        let topic = t
            .topics
            .get_mut(&topic_id)
            .ok_or_else(|| not_found(format!("topic {topic_id} not found")))?;
        topic.can_read = can_read;
        topic.can_write = can_write;
        Ok(topic.clone())
    }

    async fn delete_topic(
        &self,
        topic_id: u64,
    ) -> AclSyncResult<()> {
        self.inner
            .write()
            .topics
            .remove(&topic_id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("topic {topic_id} not found")))
    }
}
