//! Загрузка настроек: значения по умолчанию, файл и переменные окружения.

pub mod settings;

pub use settings::{Settings, SignupPolicy, ENV_PREFIX, MAX_PROCESS_NAME_LEN};
