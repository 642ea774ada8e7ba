//! Файл паролей брокера.
//!
//! Формат и хеширование целиком принадлежат внешней утилите
//! (`mosquitto_passwd`); здесь только формируется её вызов и разбирается
//! результат.

use std::{path::PathBuf, sync::Arc};

use aclsync_error::ProcessError;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::process::{CommandRunner, CommandSpec};

pub struct CredentialStore {
    runner: Arc<dyn CommandRunner>,
    passwd_binary: String,
    password_file: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        passwd_binary: impl Into<String>,
        password_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            passwd_binary: passwd_binary.into(),
            password_file: password_file.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn password_file(&self) -> &PathBuf {
        &self.password_file
    }

    /// `<passwd> -b [-c] <file> <username> <secret>`; `-c` only while the file
    /// does not exist yet.
    pub fn command_for(
        &self,
        username: &str,
        secret: &str,
    ) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.passwd_binary).arg("-b");
        if !self.password_file.exists() {
            spec = spec.arg("-c");
        }
        spec.arg(self.password_file.to_string_lossy())
            .arg(username)
            .secret_arg(secret)
    }

    /// Добавляет или обновляет пароль пользователя.
    ///
    /// Ненулевой код выхода утилиты превращается в
    /// [`ProcessError::CredentialWriteFailed`] с её stderr. Записи
    /// выполняются по одной, чтобы две первые регистрации не передали `-c`
    /// одновременно.
    pub async fn set_password(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<(), ProcessError> {
        let _guard = self.write_lock.lock().await;
        let spec = self.command_for(username, secret);

        let out = self.runner.run(&spec).await?;
        if !out.success() {
            error!(username, exit_code = out.exit_code, stderr = %out.stderr.trim(), "credential write failed");
            return Err(ProcessError::CredentialWriteFailed {
                username: username.to_string(),
                exit_code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            });
        }

        info!(username, file = %self.password_file.display(), "credential written");
        Ok(())
    }
}
