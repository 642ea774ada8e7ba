use std::{any::Any, io, path::PathBuf};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки хранилища ACL-файла.
#[derive(Debug, Error)]
pub enum AclError {
    /// Файл не удалось прочитать (кроме отсутствия) или записать.
    #[error("ACL file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// В файле нет строки `user <username>`.
    #[error("user not found in ACL: {username}")]
    UserNotFound { username: String },
    /// Пользователь найден, но в его блоке нет такого топика.
    #[error("topic {topic} not found for user {username}")]
    TopicNotFound { username: String, topic: String },
    /// Имя пусто или содержит пробелы/управляющие символы.
    #[error("invalid {kind} name: {value:?}")]
    InvalidName { kind: NameKind, value: String },
}

/// Что именно проверялось при валидации имени.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    User,
    Topic,
}

impl std::fmt::Display for NameKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            NameKind::User => f.write_str("user"),
            NameKind::Topic => f.write_str("topic"),
        }
    }
}

impl AclError {
    pub fn io(
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        AclError::Io {
            path: path.into(),
            source,
        }
    }
}

impl ErrorExt for AclError {
    fn status_code(&self) -> StatusCode {
        match self {
            AclError::Io { .. } => StatusCode::Io,
            AclError::UserNotFound { .. } => StatusCode::UserNotFound,
            AclError::TopicNotFound { .. } => StatusCode::TopicNotFound,
            AclError::InvalidName { .. } => StatusCode::InvalidName,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let e = AclError::UserNotFound {
            username: "ghost".into(),
        };
        assert_eq!(e.status_code(), StatusCode::UserNotFound);
        assert_eq!(e.to_string(), "user not found in ACL: ghost");

        let e = AclError::TopicNotFound {
            username: "alice".into(),
            topic: "a/b".into(),
        };
        assert_eq!(e.status_code(), StatusCode::TopicNotFound);
        assert_eq!(e.client_message(), "topic a/b not found for user alice");
    }

    /// Путь к файлу не должен утекать клиенту.
    #[test]
    fn test_io_hidden_from_client() {
        let e = AclError::io(
            "/etc/mosquitto/mosquitto.acl",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(e.status_code(), StatusCode::Io);
        assert_eq!(e.client_message(), "Internal server error");
        assert!(e.log_message().contains("mosquitto.acl"));
    }
}
