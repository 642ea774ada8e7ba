use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{logging::LoggingConfig, process::SupervisorConfig};

/// Префикс переменных окружения: `ACLSYNC_BROKER_DIR`, `ACLSYNC_LOGGING__LEVEL`.
pub const ENV_PREFIX: &str = "ACLSYNC";

/// Linux хранит имя процесса (`comm`) не длиннее 15 байт; по нему ищут и
/// sysinfo, и `pkill -x`.
pub const MAX_PROCESS_NAME_LEN: usize = 15;

/// Что делать с регистрацией в ACL, если запись пароля не удалась.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupPolicy {
    /// Прервать регистрацию и вернуть ошибку записи пароля.
    #[default]
    Strict,
    /// Записать ошибку в лог и всё равно зарегистрировать пользователя в ACL.
    Lenient,
}

/// Настройки сервиса синхронизации.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Каталог брокера: в нём лежат ACL, файл паролей и конфиг брокера.
    pub broker_dir: PathBuf,
    pub acl_file: String,
    pub config_file: String,
    pub password_file: String,
    pub broker_binary: String,
    pub broker_args: Vec<String>,
    pub broker_process_name: String,
    pub passwd_binary: String,
    pub command_timeout_secs: u64,
    pub signup_policy: SignupPolicy,
    pub stop_by_name_fallback: bool,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker_dir: PathBuf::from("./mosquitto"),
            acl_file: "mosquitto.acl".to_string(),
            config_file: "mosquitto.conf".to_string(),
            password_file: "passwordfile".to_string(),
            broker_binary: "mosquitto".to_string(),
            broker_args: vec!["-v".to_string()],
            broker_process_name: "mosquitto".to_string(),
            passwd_binary: "mosquitto_passwd".to_string(),
            command_timeout_secs: 10,
            signup_policy: SignupPolicy::Strict,
            stop_by_name_fallback: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Значения по умолчанию, затем файл (если передан), затем окружение.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("broker_args")
                    .with_list_parse_key("logging.directives"),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "command_timeout_secs must be greater than zero".into(),
            ));
        }
        for (key, value) in [
            ("acl_file", &self.acl_file),
            ("config_file", &self.config_file),
            ("password_file", &self.password_file),
            ("broker_binary", &self.broker_binary),
            ("passwd_binary", &self.passwd_binary),
            ("broker_process_name", &self.broker_process_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{key} must not be empty")));
            }
        }
        if cfg!(target_os = "linux") && self.broker_process_name.len() > MAX_PROCESS_NAME_LEN {
            return Err(ConfigError::Message(format!(
                "broker_process_name must be at most {MAX_PROCESS_NAME_LEN} bytes on Linux, got {:?}",
                self.broker_process_name
            )));
        }
        self.logging
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))
    }

    pub fn acl_path(&self) -> PathBuf {
        self.broker_dir.join(&self.acl_file)
    }

    pub fn password_path(&self) -> PathBuf {
        self.broker_dir.join(&self.password_file)
    }

    pub fn broker_config_path(&self) -> PathBuf {
        self.broker_dir.join(&self.config_file)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            binary: self.broker_binary.clone(),
            args: self.broker_args.clone(),
            config_path: self.broker_config_path(),
            process_name: self.broker_process_name.clone(),
            stop_by_name_fallback: self.stop_by_name_fallback,
        }
    }
}
