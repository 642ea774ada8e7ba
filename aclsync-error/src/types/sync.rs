use std::any::Any;

use thiserror::Error;

use crate::{AclError, ErrorExt, ProcessError, StackError, StatusCode};

/// Ошибка фасада синхронизации: объединяет ошибки хранилищ, процессов и
/// внешнего шлюза.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Acl(#[from] AclError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("gateway: {0}")]
    Gateway(StackError),
    /// У владельца уже есть топик с таким именем; ни ACL, ни база не
    /// изменялись.
    #[error("topic {topic} already exists for {owner}")]
    TopicExists { owner: String, topic: String },
    /// Блокирующая задача ACL завершилась паникой или была отменена.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl SyncError {
    /// Ошибка ACL-хранилища, если это она.
    pub fn as_acl(&self) -> Option<&AclError> {
        match self {
            SyncError::Acl(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_process(&self) -> Option<&ProcessError> {
        match self {
            SyncError::Process(e) => Some(e),
            _ => None,
        }
    }
}

impl ErrorExt for SyncError {
    fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Acl(e) => e.status_code(),
            SyncError::Process(e) => e.status_code(),
            SyncError::Gateway(e) => e.status_code(),
            SyncError::TopicExists { .. } => StatusCode::AlreadyExists,
            SyncError::Join(_) => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            SyncError::Acl(e) => e.client_message(),
            SyncError::Process(e) => e.client_message(),
            SyncError::Gateway(e) => e.client_message(),
            SyncError::TopicExists { topic, .. } => format!("Topic {topic} already exists"),
            SyncError::Join(_) => "Internal server error".to_string(),
        }
    }
}
