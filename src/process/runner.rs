use std::{fmt, process::Stdio, time::Duration};

use aclsync_error::ProcessError;
use async_trait::async_trait;
use tokio::{
    process::{Child, Command},
    time::timeout,
};
use tracing::{debug, info, warn};

/// Код выхода, если ОС его не сообщила (процесс убит сигналом).
pub const DEFAULT_FAILED_CODE: i32 = 1;

/// Внешняя программа и её аргументы.
///
/// Аргументы с индексами из `redact` в логах заменяются на `***`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub redact: Vec<usize>,
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Запуск внешних программ.
///
/// [`ProcessRunner`] работает с настоящими процессами; тесты подставляют
/// собственные реализации.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Запускает программу, дожидается завершения и возвращает её вывод.
    /// Ненулевой код выхода не считается ошибкой на этом уровне.
    async fn run(
        &self,
        spec: &CommandSpec,
    ) -> Result<CommandOutput, ProcessError>;

    /// Запускает долгоживущий процесс и возвращается сразу после того, как
    /// ОС подтвердила запуск.
    async fn spawn_detached(
        &self,
        spec: &CommandSpec,
    ) -> Result<Child, ProcessError>;
}

/// Production runner on top of `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            redact: Vec::new(),
        }
    }

    pub fn arg(
        mut self,
        arg: impl Into<String>,
    ) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(
        mut self,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Аргумент, который никогда не попадает в логи.
    pub fn secret_arg(
        mut self,
        arg: impl Into<String>,
    ) -> Self {
        self.redact.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Arguments as they may appear in logs.
    pub fn display_args(&self) -> Vec<&str> {
        self.args
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if self.redact.contains(&i) {
                    "***"
                } else {
                    a.as_str()
                }
            })
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in self.display_args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn_error(
        spec: &CommandSpec,
        source: std::io::Error,
    ) -> ProcessError {
        warn!(program = %spec.program, error = %source, "failed to spawn command");
        ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
    ) -> Result<CommandOutput, ProcessError> {
        debug!(command = %spec, "running command");

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        // По таймауту future с дочерним процессом уничтожается, и kill_on_drop
        // убивает процесс.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| Self::spawn_error(spec, e))?,
            Err(_) => {
                warn!(command = %spec, timeout = ?self.timeout, "command timed out, killed");
                return Err(ProcessError::CommandTimeout {
                    program: spec.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        let out = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(DEFAULT_FAILED_CODE),
        };

        if !out.stderr.trim().is_empty() {
            warn!(program = %spec.program, exit_code = out.exit_code, stderr = %out.stderr.trim(), "command wrote to stderr");
        }
        debug!(program = %spec.program, exit_code = out.exit_code, "command finished");
        Ok(out)
    }

    async fn spawn_detached(
        &self,
        spec: &CommandSpec,
    ) -> Result<Child, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Своя группа процессов: Ctrl-C в терминале оператора не долетает до
        // брокера.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| Self::spawn_error(spec, e))?;
        info!(command = %spec, pid = ?child.id(), "detached process spawned");
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_args_are_redacted() {
        let spec = CommandSpec::new("mosquitto_passwd")
            .args(["-b", "/etc/mosquitto/passwordfile", "alice"])
            .secret_arg("hunter2");
        assert_eq!(spec.args.len(), 4);
        assert_eq!(spec.args[3], "hunter2");
        let shown = spec.to_string();
        assert_eq!(
            shown,
            "mosquitto_passwd -b /etc/mosquitto/passwordfile alice ***"
        );
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let err = runner
            .run(&CommandSpec::new("aclsync-definitely-missing-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));

        let err = runner
            .spawn_detached(&CommandSpec::new("aclsync-definitely-missing-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let out = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = ProcessRunner::new(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = runner
            .run(&CommandSpec::new("sleep").arg("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
