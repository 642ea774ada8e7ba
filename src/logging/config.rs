use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Формат вывода в консоль.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки консольного вывода.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_line_numbers: bool,
}

/// Настройки файлового sink (ежедневная ротация).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub file_name: String,
}

/// Конфигурация логирования, вложенная в [`crate::Settings`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Переопределения уровней по модулям, например `aclsync::acl=debug`.
    pub directives: Vec<String>,
    pub log_dir: PathBuf,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

#[derive(Debug, Error)]
pub enum LoggingConfigError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    #[error("log file name must not be empty")]
    EmptyFileName,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_name: "aclsync.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            log_dir: PathBuf::from("logs"),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl LoggingConfig {
    const LEVELS: [&'static str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

    /// Строка для `EnvFilter`: базовый уровень плюс директивы по модулям.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![self.level.to_lowercase()];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    pub fn validate(&self) -> Result<(), LoggingConfigError> {
        if !Self::LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(LoggingConfigError::InvalidLevel(self.level.clone()));
        }
        if self.file.enabled && self.file.file_name.trim().is_empty() {
            return Err(LoggingConfigError::EmptyFileName);
        }
        Ok(())
    }

    /// Создаёт каталог логов, если включён файловый sink.
    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        if self.file.enabled {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = LoggingConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.build_filter_directive(), "info");
    }

    #[test]
    fn test_directives_are_appended() {
        let cfg = LoggingConfig {
            level: "WARN".into(),
            directives: vec!["aclsync::acl=debug".into()],
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "warn,aclsync::acl=debug");
    }

    #[test]
    fn test_invalid_level_rejected() {
        let cfg = LoggingConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(LoggingConfigError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_ensure_log_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            log_dir: tmp.path().join("nested/logs"),
            file: FileConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.ensure_log_dir().unwrap();
        assert!(cfg.log_dir.is_dir());
    }
}
