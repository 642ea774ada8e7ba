//! CLI оператора aclsync
//!
//! Позволяет вручную регистрировать пользователей, менять права на топики,
//! просматривать ACL-файл и управлять процессом брокера. HTTP-слой живёт
//! отдельно и пользуется тем же фасадом.

use std::{path::PathBuf, sync::Arc};

use aclsync::{
    acl::AclStore,
    config::Settings,
    credentials::CredentialStore,
    facade::SyncFacade,
    gateway::MemoryGateway,
    logging::init_logging,
    process::{BrokerState, BrokerSupervisor, ProcessRunner, StartOutcome, StopOutcome},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// Аргументы командной строки
#[derive(Parser)]
#[command(name = "aclsync")]
#[command(version = env!("CARGO_PKG_VERSION"), long_version = LONG_VERSION)]
#[command(about = "Синхронизация ACL и паролей брокера, управление процессом брокера", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Файл настроек (TOML/YAML/JSON)
    #[arg(
        short,
        long,
        env = "ACLSYNC_CONFIG",
        help = "Путь к файлу настроек"
    )]
    config: Option<PathBuf>,
    /// Подробный вывод (debug)
    #[arg(short, long, help = "Включить подробный вывод для отладки")]
    verbose: bool,
    /// Только предупреждения и ошибки
    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Подавить логирование (только warn/error)"
    )]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Добавить блок пользователя в ACL
    RegisterUser { username: String },
    /// Записать пароль в файл паролей брокера
    SetPassword(Credentials),
    /// Пароль, затем ACL (как при регистрации через API)
    SignUp(Credentials),
    /// Выдать доступ к топику
    AddTopic(TopicArgs),
    /// Изменить права на существующий топик
    UpdateTopic(TopicArgs),
    /// Удалить топик из блока пользователя
    DeleteTopic { username: String, topic: String },
    /// Операции чтения ACL
    Acl {
        #[command(subcommand)]
        action: AclAction,
    },
    /// Управление процессом брокера
    Broker {
        #[command(subcommand)]
        action: BrokerAction,
    },
}

#[derive(Args)]
struct Credentials {
    username: String,
    /// Пароль; лучше передавать через переменную окружения
    #[arg(long, env = "ACLSYNC_SECRET", hide_env_values = true)]
    secret: String,
}

#[derive(Args)]
struct TopicArgs {
    username: String,
    topic: String,
    #[arg(long, help = "Разрешить подписку")]
    read: bool,
    #[arg(long, help = "Разрешить публикацию")]
    write: bool,
}

#[derive(Subcommand)]
enum AclAction {
    /// Показать блоки пользователей
    Show {
        /// Только этот пользователь
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Subcommand)]
enum BrokerAction {
    Start,
    Stop,
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if cli.verbose {
        settings.logging.level = "debug".into();
    } else if cli.quiet {
        settings.logging.level = "warn".into();
    }

    let logging = init_logging(&settings.logging).map_err(|e| anyhow::anyhow!(e))?;
    debug!(acl = %settings.acl_path().display(), "settings loaded");

    let result = run(cli.command, &settings).await;
    logging.shutdown();
    result
}

async fn run(
    command: Commands,
    settings: &Settings,
) -> Result<()> {
    let runner = Arc::new(ProcessRunner::new(settings.command_timeout()));
    let acl = AclStore::new(settings.acl_path());

    match command {
        Commands::RegisterUser { username } => {
            let added = blocking(move || acl.register_user(&username)).await?;
            println!("{}", if added { "registered" } else { "already present" });
        }
        Commands::SetPassword(creds) => {
            CredentialStore::new(runner, &settings.passwd_binary, settings.password_path())
                .set_password(&creds.username, &creds.secret)
                .await?;
            println!("password written");
        }
        Commands::SignUp(creds) => {
            let gateway = Arc::new(MemoryGateway::new());
            let facade = SyncFacade::from_settings(settings, runner, gateway.clone(), gateway);
            facade.sign_up(&creds.username, &creds.secret).await?;
            println!("signed up");
        }
        Commands::AddTopic(t) => {
            blocking(move || acl.add_topic(&t.username, &t.topic, t.read, t.write)).await?;
            println!("ok");
        }
        Commands::UpdateTopic(t) => {
            blocking(move || acl.update_topic(&t.username, &t.topic, t.read, t.write)).await?;
            println!("ok");
        }
        Commands::DeleteTopic { username, topic } => {
            blocking(move || acl.delete_topic(&username, &topic)).await?;
            println!("ok");
        }
        Commands::Acl {
            action: AclAction::Show { user },
        } => {
            let blocks = blocking(move || acl.users()).await?;
            for block in blocks
                .iter()
                .filter(|b| user.as_deref().map_or(true, |u| u == b.username))
            {
                println!("user {}", block.username);
                for perm in &block.topics {
                    println!("  {perm}");
                }
            }
        }
        Commands::Broker { action } => {
            let supervisor = BrokerSupervisor::new(runner, settings.supervisor_config());
            match action {
                BrokerAction::Start => match supervisor.start().await? {
                    StartOutcome::Started { pid } => println!("started (pid {pid:?})"),
                    StartOutcome::AlreadyRunning => println!("already running"),
                },
                BrokerAction::Stop => match supervisor.stop().await? {
                    StopOutcome::Stopped | StopOutcome::SignalledByName => println!("stopped"),
                    StopOutcome::NotRunning => println!("not running"),
                },
                BrokerAction::Status => match supervisor.status().await {
                    BrokerState::Running { pid: Some(pid) } => println!("running (pid {pid})"),
                    BrokerState::Running { pid: None } => println!("running"),
                    BrokerState::Stopped => println!("stopped"),
                },
            }
        }
    }
    Ok(())
}

/// Файловые операции ACL синхронные; выносим их из async-контекста.
async fn blocking<T, E, F>(op: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    Ok(tokio::task::spawn_blocking(op).await??)
}
