//! Синхронизация ACL-файла и файла паролей брокера с реляционной записью о
//! пользователях и топиках, плюс управление процессом брокера.

/// ACL-файл: модель строк, сканер блоков, атомарная запись, хранилище.
pub mod acl;
/// Загрузка настроек.
pub mod config;
/// Файл паролей через внешнюю утилиту.
pub mod credentials;
/// Фасад синхронизации для бизнес-логики.
pub mod facade;
/// Граница с реляционным хранилищем.
pub mod gateway;
/// Логирование (форматы, фильтры, файловый sink).
pub mod logging;
/// Внешние процессы: команды и супервизор брокера.
pub mod process;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use acl::{Access, AclDocument, AclStore, TopicPermission, UserBlock};
pub use aclsync_error::{
    AclError, AclSyncResult, ErrorExt, ProcessError, StackError, StatusCode, SyncError,
};
pub use config::{Settings, SignupPolicy};
pub use credentials::CredentialStore;
pub use facade::SyncFacade;
pub use gateway::{MemoryGateway, NewTopic, TopicGateway, TopicRecord, UserGateway, UserRecord};
pub use process::{
    BrokerState, BrokerSupervisor, CommandOutput, CommandRunner, CommandSpec, ProcessRunner,
    StartOutcome, StopOutcome, SupervisorConfig,
};
