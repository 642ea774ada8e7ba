use std::{any::Any, io, time::Duration};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки запуска внешних программ: утилиты паролей и брокера.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Утилита паролей завершилась с ненулевым кодом или не запустилась.
    #[error("credential write for {username} failed (exit code {exit_code}): {stderr}")]
    CredentialWriteFailed {
        username: String,
        exit_code: i32,
        stderr: String,
    },
    /// Процесс брокера не удалось запустить или остановить.
    #[error("broker supervisor: {reason}")]
    Supervisor { reason: String },
    /// Команда не завершилась за отведённое время и была убита.
    #[error("command {program} timed out after {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },
    /// ОС отказала в запуске процесса.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ErrorExt for ProcessError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProcessError::CredentialWriteFailed { .. } => StatusCode::CredentialWriteFailed,
            ProcessError::Supervisor { .. } => StatusCode::SupervisorFailed,
            ProcessError::CommandTimeout { .. } => StatusCode::Timeout,
            ProcessError::Spawn { .. } => StatusCode::SpawnFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            ProcessError::CredentialWriteFailed { username, .. } => {
                format!("credential write for {username} failed")
            }
            ProcessError::CommandTimeout { program, .. } => format!("{program} timed out"),
            _ => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// stderr утилиты остаётся в логах, но не в ответе клиенту.
    #[test]
    fn test_credential_failure_messages() {
        let e = ProcessError::CredentialWriteFailed {
            username: "alice".into(),
            exit_code: 1,
            stderr: "Error: Unable to open file".into(),
        };
        assert_eq!(e.status_code(), StatusCode::CredentialWriteFailed);
        assert!(e.to_string().contains("Unable to open file"));
        assert_eq!(e.client_message(), "credential write for alice failed");
    }

    #[test]
    fn test_timeout_is_retryable() {
        let e = ProcessError::CommandTimeout {
            program: "mosquitto_passwd".into(),
            timeout: Duration::from_secs(10),
        };
        assert!(e.status_code().is_retryable());
        assert_eq!(e.to_string(), "command mosquitto_passwd timed out after 10s");
    }
}
