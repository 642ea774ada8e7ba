//! Единая точка входа для бизнес-логики.
//!
//! Фасад упорядочивает вызовы хранилища паролей, ACL-хранилища, супервизора
//! брокера и реляционного шлюза так, чтобы запись в базу и запись в файлы не
//! расходились дольше, чем длится один запрос.

use std::sync::Arc;

use aclsync_error::{AclError, SyncError};
use tracing::{error, info, warn};

use crate::{
    acl::{Access, AclStore},
    config::{Settings, SignupPolicy},
    credentials::CredentialStore,
    gateway::{NewTopic, TopicGateway, TopicRecord, UserGateway},
    process::{BrokerState, BrokerSupervisor, CommandRunner},
};

pub struct SyncFacade {
    acl: AclStore,
    credentials: CredentialStore,
    supervisor: BrokerSupervisor,
    users: Arc<dyn UserGateway>,
    topics: Arc<dyn TopicGateway>,
    signup_policy: SignupPolicy,
}

impl SyncFacade {
    pub fn new(
        acl: AclStore,
        credentials: CredentialStore,
        supervisor: BrokerSupervisor,
        users: Arc<dyn UserGateway>,
        topics: Arc<dyn TopicGateway>,
        signup_policy: SignupPolicy,
    ) -> Self {
        Self {
            acl,
            credentials,
            supervisor,
            users,
            topics,
            signup_policy,
        }
    }

    /// Собирает фасад по настройкам; все внешние программы запускаются через
    /// один `runner`.
    pub fn from_settings(
        settings: &Settings,
        runner: Arc<dyn CommandRunner>,
        users: Arc<dyn UserGateway>,
        topics: Arc<dyn TopicGateway>,
    ) -> Self {
        Self::new(
            AclStore::new(settings.acl_path()),
            CredentialStore::new(
                runner.clone(),
                &settings.passwd_binary,
                settings.password_path(),
            ),
            BrokerSupervisor::new(runner, settings.supervisor_config()),
            users,
            topics,
            settings.signup_policy,
        )
    }

    pub fn acl(&self) -> &AclStore {
        &self.acl
    }

    pub fn supervisor(&self) -> &BrokerSupervisor {
        &self.supervisor
    }

    /// Регистрация: сначала пароль (пока открытый текст ещё доступен), затем
    /// блок пользователя в ACL.
    ///
    /// При [`SignupPolicy::Strict`] ошибка записи пароля прерывает
    /// регистрацию; при [`SignupPolicy::Lenient`] она только логируется.
    pub async fn sign_up(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<(), SyncError> {
        if let Err(e) = self.credentials.set_password(username, secret).await {
            match self.signup_policy {
                SignupPolicy::Strict => {
                    error!(username, error = %e, "sign-up aborted: credential write failed");
                    return Err(e.into());
                }
                SignupPolicy::Lenient => {
                    warn!(username, error = %e, "credential write failed, registering ACL anyway");
                }
            }
        }

        let name = username.to_string();
        self.with_acl(move |acl| acl.register_user(&name)).await?;
        info!(username, "user signed up");
        Ok(())
    }

    /// Сначала строка в ACL, затем запись в базу.
    ///
    /// Повторное имя у того же владельца отклоняется до изменения ACL. Если
    /// запись в базу не удалась, строка ACL возвращается в прежнее состояние.
    pub async fn create_topic(
        &self,
        owner_id: u64,
        name: &str,
        can_read: bool,
        can_write: bool,
    ) -> Result<TopicRecord, SyncError> {
        let owner = self
            .users
            .user_by_id(owner_id)
            .await
            .map_err(SyncError::Gateway)?;

        let exists = self
            .topics
            .topic_exists(owner_id, name)
            .await
            .map_err(SyncError::Gateway)?;
        if exists {
            warn!(owner = %owner.email, topic = name, "topic already exists");
            return Err(SyncError::TopicExists {
                owner: owner.email,
                topic: name.to_string(),
            });
        }

        let (email, topic) = (owner.email.clone(), name.to_string());
        let previous = self
            .with_acl(move |acl| acl.add_topic(&email, &topic, can_read, can_write))
            .await?;

        let inserted = self
            .topics
            .insert_topic(NewTopic {
                owner_id,
                name: name.to_string(),
                can_read,
                can_write,
            })
            .await;
        match inserted {
            Ok(record) => {
                info!(topic_id = record.id, owner = %owner.email, topic = name, "topic created");
                Ok(record)
            }
            Err(e) => {
                // Без запрошенных прав add_topic файл не менял.
                if Access::from_flags(can_read, can_write) != Access::Unspecified {
                    self.rollback_acl(&owner.email, name, previous).await;
                }
                Err(SyncError::Gateway(e))
            }
        }
    }

    pub async fn update_topic_permissions(
        &self,
        topic_id: u64,
        can_read: bool,
        can_write: bool,
    ) -> Result<TopicRecord, SyncError> {
        let (email, topic) = self.topic_and_owner(topic_id).await?;

        let (user, name) = (email.clone(), topic.name.clone());
        let previous = self
            .with_acl(move |acl| acl.update_topic(&user, &name, can_read, can_write))
            .await?;

        match self
            .topics
            .update_topic_permissions(topic_id, can_read, can_write)
            .await
        {
            Ok(record) => Ok(record),
            Err(e) => {
                self.rollback_acl(&email, &topic.name, previous).await;
                Err(SyncError::Gateway(e))
            }
        }
    }

    pub async fn delete_topic(
        &self,
        topic_id: u64,
    ) -> Result<(), SyncError> {
        let (email, topic) = self.topic_and_owner(topic_id).await?;

        let (user, name) = (email.clone(), topic.name.clone());
        let previous = self
            .with_acl(move |acl| acl.delete_topic(&user, &name))
            .await?;

        if let Err(e) = self.topics.delete_topic(topic_id).await {
            self.rollback_acl(&email, &topic.name, previous).await;
            return Err(SyncError::Gateway(e));
        }
        info!(topic_id, "topic deleted");
        Ok(())
    }

    /// Сохраняет флаг в базе, затем запускает или останавливает брокер.
    pub async fn toggle_broker(
        &self,
        user_id: u64,
        enabled: bool,
    ) -> Result<BrokerState, SyncError> {
        self.users
            .set_broker_enabled(user_id, enabled)
            .await
            .map_err(SyncError::Gateway)?;

        let result = if enabled {
            self.supervisor.start().await.map(|outcome| {
                info!(user_id, ?outcome, "broker start requested");
            })
        } else {
            self.supervisor.stop().await.map(|outcome| {
                info!(user_id, ?outcome, "broker stop requested");
            })
        };

        if let Err(e) = result {
            error!(user_id, enabled, error = %e, "broker toggle failed");
            return Err(e.into());
        }
        Ok(self.supervisor.status().await)
    }

    pub async fn broker_status(&self) -> BrokerState {
        self.supervisor.status().await
    }

    async fn topic_and_owner(
        &self,
        topic_id: u64,
    ) -> Result<(String, TopicRecord), SyncError> {
        let topic = self
            .topics
            .topic_by_id(topic_id)
            .await
            .map_err(SyncError::Gateway)?;
        let email = self
            .topics
            .topic_owner_email(topic_id)
            .await
            .map_err(SyncError::Gateway)?;
        Ok((email, topic))
    }

    /// Возвращает строку топика к `previous` после неудачной записи в базу.
    /// Ошибка отката только логируется.
    async fn rollback_acl(
        &self,
        username: &str,
        topic: &str,
        previous: Option<Access>,
    ) {
        let (user, name) = (username.to_string(), topic.to_string());
        match self
            .with_acl(move |acl| acl.restore_topic(&user, &name, previous))
            .await
        {
            Ok(()) => {
                warn!(username, topic, ?previous, "gateway write failed, ACL change rolled back");
            }
            Err(e) => error!(username, topic, error = %e, "ACL rollback failed"),
        }
    }

    /// Runs a synchronous ACL operation on the blocking pool.
    async fn with_acl<T, F>(
        &self,
        op: F,
    ) -> Result<T, SyncError>
    where
        F: FnOnce(&AclStore) -> Result<T, AclError> + Send + 'static,
        T: Send + 'static,
    {
        let acl = self.acl.clone();
        tokio::task::spawn_blocking(move || op(&acl))
            .await
            .map_err(|e| SyncError::Join(e.to_string()))?
            .map_err(SyncError::from)
    }
}
