use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use aclsync_error::{AclError, NameKind};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    atomic,
    document::AclDocument,
    model::{validate_name, Access, TopicPermission, UserBlock},
};

/// Один мьютекс на абсолютный путь: все `AclStore`, открытые на один и тот же
/// файл в этом процессе, сериализуются между собой.
static FILE_LOCKS: Lazy<DashMap<PathBuf, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    FILE_LOCKS
        .entry(path.to_path_buf())
        .or_default()
        .value()
        .clone()
}

/// Владелец ACL-файла брокера.
///
/// Каждая операция держит эксклюзивную блокировку файла на всё время
/// чтения-изменения-записи и публикует результат атомарной заменой, поэтому
/// ни другой писатель, ни брокер не видят промежуточного состояния.
///
/// Блокировка действует в пределах процесса; несколько процессов, пишущих
/// один файл, должны координироваться снаружи.
#[derive(Debug, Clone)]
pub struct AclStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl AclStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
        Self {
            lock: lock_for(&key),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Добавляет блок `user <username>`, если его ещё нет.
    ///
    /// Возвращает `true`, если файл был перезаписан.
    pub fn register_user(
        &self,
        username: &str,
    ) -> Result<bool, AclError> {
        validate_name(NameKind::User, username)?;
        let added = self.modify(|doc| {
            let added = doc.register_user(username);
            Ok((added, added))
        })?;
        if added {
            info!(username, "ACL user registered");
        } else {
            debug!(username, "ACL user already present");
        }
        Ok(added)
    }

    /// Выдаёт пользователю доступ к топику.
    ///
    /// Возвращает доступ, действовавший до вызова (`None`, если строки топика
    /// не было). Если оба флага `false`, выдавать нечего: файл не читается и
    /// не трогается, результат `None`.
    pub fn add_topic(
        &self,
        username: &str,
        topic: &str,
        can_read: bool,
        can_write: bool,
    ) -> Result<Option<Access>, AclError> {
        validate_name(NameKind::User, username)?;
        validate_name(NameKind::Topic, topic)?;

        let access = Access::from_flags(can_read, can_write);
        if access == Access::Unspecified {
            debug!(username, topic, "no access requested, ACL left unchanged");
            return Ok(None);
        }

        let permission = TopicPermission::new(topic, access);
        let previous = self.modify(|doc| {
            let previous = doc.topic_access(username, topic);
            doc.upsert_topic(username, &permission)?;
            Ok((previous, previous != Some(access)))
        })?;
        info!(username, topic, line = %permission, ?previous, "ACL topic granted");
        Ok(previous)
    }

    /// Переписывает права существующей строки топика в блоке пользователя.
    /// Возвращает прежний доступ.
    pub fn update_topic(
        &self,
        username: &str,
        topic: &str,
        can_read: bool,
        can_write: bool,
    ) -> Result<Option<Access>, AclError> {
        validate_name(NameKind::User, username)?;
        validate_name(NameKind::Topic, topic)?;

        let permission = TopicPermission::new(topic, Access::from_flags(can_read, can_write));
        let previous = self.modify(|doc| {
            let previous = doc.topic_access(username, topic);
            doc.update_topic(username, &permission)?;
            Ok((previous, true))
        })?;
        info!(username, topic, line = %permission, "ACL topic updated");
        Ok(previous)
    }

    /// Удаляет все строки топика из блока пользователя. Повторный вызов не
    /// является ошибкой. Возвращает доступ удалённой строки, если она была.
    pub fn delete_topic(
        &self,
        username: &str,
        topic: &str,
    ) -> Result<Option<Access>, AclError> {
        validate_name(NameKind::User, username)?;
        validate_name(NameKind::Topic, topic)?;

        let (previous, removed) = self.modify(|doc| {
            let previous = doc.topic_access(username, topic);
            let removed = doc.delete_topic(username, topic)?;
            Ok(((previous, removed), removed > 0))
        })?;
        info!(username, topic, removed, "ACL topic deleted");
        Ok(previous)
    }

    /// Возвращает строку топика к состоянию `previous`, полученному от
    /// [`add_topic`](Self::add_topic), [`update_topic`](Self::update_topic) или
    /// [`delete_topic`](Self::delete_topic): `None` удаляет строку, `Some`
    /// записывает её с этим доступом. Совпадающее состояние не переписывает
    /// файл.
    pub fn restore_topic(
        &self,
        username: &str,
        topic: &str,
        previous: Option<Access>,
    ) -> Result<(), AclError> {
        validate_name(NameKind::User, username)?;
        validate_name(NameKind::Topic, topic)?;

        self.modify(|doc| {
            if doc.topic_access(username, topic) == previous {
                return Ok(((), false));
            }
            match previous {
                Some(access) => {
                    doc.upsert_topic(username, &TopicPermission::new(topic, access))?;
                }
                None => {
                    doc.delete_topic(username, topic)?;
                }
            }
            Ok(((), true))
        })?;
        info!(username, topic, ?previous, "ACL topic restored");
        Ok(())
    }

    /// Разобранный снимок всех блоков пользователей.
    pub fn users(&self) -> Result<Vec<UserBlock>, AclError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.users())
    }

    /// Read-modify-write under the file lock. `apply` returns its result and
    /// whether the document has to be written back; on error nothing is
    /// written.
    fn modify<T>(
        &self,
        apply: impl FnOnce(&mut AclDocument) -> Result<(T, bool), AclError>,
    ) -> Result<T, AclError> {
        let _guard = self.lock.lock();
        let mut doc = self.load()?;
        let (out, dirty) = apply(&mut doc)?;
        if dirty {
            self.save(&doc)?;
        }
        Ok(out)
    }

    fn load(&self) -> Result<AclDocument, AclError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(AclDocument::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AclDocument::default()),
            Err(e) => Err(AclError::io(&self.path, e)),
        }
    }

    fn save(
        &self,
        doc: &AclDocument,
    ) -> Result<(), AclError> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| AclError::io(dir, e))?;
        }
        atomic::replace(&self.path, doc.render().as_bytes())
            .map_err(|e| AclError::io(&self.path, e))?;
        debug!(path = %self.path.display(), lines = doc.lines().len(), "ACL file replaced");
        Ok(())
    }
}
