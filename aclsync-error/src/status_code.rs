use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (ACL-файл, пользователи, топики)
/// - 3xxx: Учётные данные
/// - 5xxx: Внешние хранилища (реляционный шлюз)
/// - 6xxx: IO / процессы
///
/// `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`,
/// опционально `strum` добавляет `AsRefStr`/`EnumIter` (feature = "strum").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    AlreadyExists = 2001,
    InvalidData = 2002,
    UserNotFound = 2003,
    TopicNotFound = 2004,
    InvalidName = 2005,

    // === 3xxx: Учётные данные ===
    PermissionDenied = 3000,
    CredentialWriteFailed = 3001,

    // === 5xxx: Внешние хранилища ===
    StorageUnavailable = 5000,
    LockError = 5001,

    // === 6xxx: IO/процессы ===
    Io = 6000,
    Timeout = 6001,
    SpawnFailed = 6002,
    SupervisorFailed = 6003,
    UnexpectedEof = 6004,
    InvalidUtf8 = 6005,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Возвращает `true`, если операцию имеет смысл повторить.
    ///
    /// Сам движок ничего не повторяет: решение остаётся за вызывающим кодом.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::StorageUnavailable | Self::LockError
        )
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка со стороны клиента: проблема в запросе или данных.
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=3999).contains(&c) {
            return !matches!(self, Self::CredentialWriteFailed);
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Ошибка сервера: внутренняя или инфраструктурная.
    pub fn is_server_error(&self) -> bool {
        let c = self.code();
        matches!(c, 1000..=1999 | 5000..=6999) || matches!(self, Self::CredentialWriteFailed)
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::Internal | Self::Io | Self::SupervisorFailed | Self::StorageUnavailable
        )
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists => LogLevel::Debug,
            Self::InvalidArgs
            | Self::InvalidData
            | Self::InvalidName
            | Self::UserNotFound
            | Self::TopicNotFound
            | Self::PermissionDenied => LogLevel::Info,
            Self::Timeout | Self::LockError => LogLevel::Warn,
            Self::Internal
            | Self::Io
            | Self::SpawnFailed
            | Self::SupervisorFailed
            | Self::CredentialWriteFailed
            | Self::StorageUnavailable => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// HTTP-статус, соответствующий коду статуса.
    ///
    /// Используется внешним HTTP-слоем при маппинге ошибок на ответы.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success => 200,
            Self::NotFound | Self::UserNotFound | Self::TopicNotFound => 404,
            Self::AlreadyExists => 409,
            Self::InvalidArgs | Self::InvalidData | Self::InvalidName => 400,
            Self::PermissionDenied => 403,
            Self::Timeout => 504,
            Self::Unsupported => 501,
            Self::StorageUnavailable => 503,
            _ => 500,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
