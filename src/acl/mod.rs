//! ACL-файл брокера: модель строк, сканер блоков, атомарная запись и
//! хранилище с сериализацией изменений.

pub mod atomic;
pub mod document;
pub mod model;
pub mod scanner;
pub mod store;

pub use document::AclDocument;
pub use model::{validate_name, Access, Directive, TopicPermission, UserBlock};
pub use scanner::{scan, BlockState, ScannedLine};
pub use store::AclStore;
