use std::{path::PathBuf, sync::Arc};

use aclsync_error::ProcessError;
use sysinfo::System;
use tokio::{process::Child, sync::Mutex};
use tracing::{debug, error, info, warn};

use super::runner::{CommandRunner, CommandSpec};

/// Параметры запуска брокера.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub binary: String,
    /// Дополнительные аргументы после `-c <config>`.
    pub args: Vec<String>,
    pub config_path: PathBuf,
    /// Имя процесса для поиска без дескриптора (`pkill`/`taskkill`, sysinfo).
    pub process_name: String,
    pub stop_by_name_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: Option<u32> },
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Остановлен процесс, запущенный этим супервизором.
    Stopped,
    NotRunning,
    /// Дескриптора не было; сигнал отправлен всем процессам с этим именем.
    SignalledByName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Stopped,
    Running { pid: Option<u32> },
}

/// Запускает и останавливает процесс брокера.
///
/// Основной путь остановки: дескриптор, полученный при запуске. Остановка по
/// имени процесса используется только если дескриптора нет (например, после
/// перезапуска самого сервиса) и она разрешена в конфигурации.
pub struct BrokerSupervisor {
    runner: Arc<dyn CommandRunner>,
    config: SupervisorConfig,
    child: Mutex<Option<Child>>,
}

impl BrokerSupervisor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            runner,
            config,
            child: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Command line used to launch the broker.
    pub fn start_command(&self) -> CommandSpec {
        CommandSpec::new(&self.config.binary)
            .arg("-c")
            .arg(self.config.config_path.to_string_lossy())
            .args(self.config.args.iter().cloned())
    }

    pub async fn start(&self) -> Result<StartOutcome, ProcessError> {
        let mut slot = self.child.lock().await;

        if let Some(pid) = held_pid(&mut slot) {
            info!(pid, "broker already running (held handle)");
            return Ok(StartOutcome::AlreadyRunning);
        }
        if let Some(pid) = self.pids_by_name().first() {
            info!(pid, name = %self.config.process_name, "broker already running (found by name)");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let spec = self.start_command();
        let child = self.runner.spawn_detached(&spec).await.map_err(|e| {
            error!(command = %spec, error = %e, "broker failed to start");
            ProcessError::Supervisor {
                reason: e.to_string(),
            }
        })?;

        let pid = child.id();
        *slot = Some(child);
        info!(?pid, "broker started");
        Ok(StartOutcome::Started { pid })
    }

    pub async fn stop(&self) -> Result<StopOutcome, ProcessError> {
        let mut slot = self.child.lock().await;

        if let Some(mut child) = slot.take() {
            let pid = child.id();
            if let Ok(Some(status)) = child.try_wait() {
                debug!(?pid, ?status, "broker had already exited");
                return Ok(StopOutcome::NotRunning);
            }
            child.kill().await.map_err(|e| {
                error!(?pid, error = %e, "failed to kill broker");
                ProcessError::Supervisor {
                    reason: format!("kill {pid:?}: {e}"),
                }
            })?;
            info!(?pid, "broker stopped");
            return Ok(StopOutcome::Stopped);
        }

        if !self.config.stop_by_name_fallback {
            debug!("no broker handle held, stop-by-name disabled");
            return Ok(StopOutcome::NotRunning);
        }
        drop(slot);
        self.stop_by_name().await
    }

    pub async fn status(&self) -> BrokerState {
        let mut slot = self.child.lock().await;
        if let Some(pid) = held_pid(&mut slot) {
            return BrokerState::Running { pid: Some(pid) };
        }
        match self.pids_by_name().first() {
            Some(&pid) => BrokerState::Running { pid: Some(pid) },
            None => BrokerState::Stopped,
        }
    }

    async fn stop_by_name(&self) -> Result<StopOutcome, ProcessError> {
        let (spec, no_match_codes) = kill_by_name_command(&self.config.process_name);
        warn!(command = %spec, "no broker handle held, stopping by process name");

        let out = self.runner.run(&spec).await.map_err(|e| match e {
            ProcessError::CommandTimeout { .. } => e,
            other => ProcessError::Supervisor {
                reason: other.to_string(),
            },
        })?;

        match out.exit_code {
            0 => {
                info!(name = %self.config.process_name, "broker signalled by name");
                Ok(StopOutcome::SignalledByName)
            }
            code if no_match_codes.contains(&code) => {
                debug!(name = %self.config.process_name, "no broker process matched");
                Ok(StopOutcome::NotRunning)
            }
            code => Err(ProcessError::Supervisor {
                reason: format!(
                    "{} exited with code {code}: {}",
                    spec.program,
                    out.stderr.trim()
                ),
            }),
        }
    }

    fn pids_by_name(&self) -> Vec<u32> {
        let name = process_image_name(&self.config.process_name);
        let mut sys = System::new();
        sys.refresh_processes();
        sys.processes_by_exact_name(&name)
            .map(|p| p.pid().as_u32())
            .collect()
    }
}

/// PID удерживаемого процесса, если он ещё жив. Завершившийся процесс
/// забирается из слота.
fn held_pid(slot: &mut Option<Child>) -> Option<u32> {
    let child = slot.as_mut()?;
    match child.try_wait() {
        Ok(None) => child.id(),
        Ok(Some(status)) => {
            info!(?status, "broker exited on its own");
            *slot = None;
            None
        }
        Err(e) => {
            warn!(error = %e, "cannot query broker process, dropping handle");
            *slot = None;
            None
        }
    }
}

#[cfg(windows)]
fn process_image_name(name: &str) -> String {
    format!("{name}.exe")
}

#[cfg(not(windows))]
fn process_image_name(name: &str) -> String {
    name.to_string()
}

/// Команда остановки по имени и коды выхода, означающие «ничего не найдено».
#[cfg(windows)]
fn kill_by_name_command(name: &str) -> (CommandSpec, &'static [i32]) {
    let spec = CommandSpec::new("taskkill").args(["/IM", &process_image_name(name), "/F"]);
    (spec, &[128])
}

/// `-x` сравнивает имя целиком, иначе шаблон `mosquitto` задел бы и
/// `mosquitto_passwd`, `mosquitto_sub`.
#[cfg(not(windows))]
fn kill_by_name_command(name: &str) -> (CommandSpec, &'static [i32]) {
    (CommandSpec::new("pkill").args(["-x", "-9", name]), &[1])
}
