//! Внешние процессы: запуск команд с таймаутом и супервизор брокера.

pub mod runner;
pub mod supervisor;

pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner, DEFAULT_FAILED_CODE};
pub use supervisor::{BrokerState, BrokerSupervisor, StartOutcome, StopOutcome, SupervisorConfig};
