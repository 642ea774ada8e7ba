//! Граница с реляционным хранилищем пользователей и топиков.
//!
//! Само хранилище живёт вне этого крейта; фасад синхронизации видит его
//! только через эти трейты.

mod memory;

use aclsync_error::AclSyncResult;
use async_trait::async_trait;

pub use memory::MemoryGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: u64,
    /// Email служит именем пользователя в ACL и в файле паролей.
    pub email: String,
    pub broker_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    pub id: u64,
    pub owner_id: u64,
    pub name: String,
    pub can_read: bool,
    pub can_write: bool,
}

/// Topic row before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopic {
    pub owner_id: u64,
    pub name: String,
    pub can_read: bool,
    pub can_write: bool,
}

#[async_trait]
pub trait UserGateway: Send + Sync {
    async fn user_by_id(
        &self,
        id: u64,
    ) -> AclSyncResult<UserRecord>;

    async fn user_by_email(
        &self,
        email: &str,
    ) -> AclSyncResult<UserRecord>;

    /// Сохраняет желаемое состояние брокера для пользователя.
    async fn set_broker_enabled(
        &self,
        user_id: u64,
        enabled: bool,
    ) -> AclSyncResult<()>;
}

#[async_trait]
pub trait TopicGateway: Send + Sync {
    async fn topic_by_id(
        &self,
        id: u64,
    ) -> AclSyncResult<TopicRecord>;

    /// Email владельца топика, то есть имя его блока в ACL.
    async fn topic_owner_email(
        &self,
        topic_id: u64,
    ) -> AclSyncResult<String>;

    /// Есть ли у владельца топик с таким именем.
    async fn topic_exists(
        &self,
        owner_id: u64,
        name: &str,
    ) -> AclSyncResult<bool>;

    async fn insert_topic(
        &self,
        topic: NewTopic,
    ) -> AclSyncResult<TopicRecord>;

    async fn update_topic_permissions(
        &self,
        topic_id: u64,
        can_read: bool,
        can_write: bool,
    ) -> AclSyncResult<TopicRecord>;

    async fn delete_topic(
        &self,
        topic_id: u64,
    ) -> AclSyncResult<()>;
}
