//! Local subprocess backend
//!
//! Runs the lesson tools (`redis-cli`, `sqlite3`, `git`, the validator
//! scripts) directly on the host for deployments without a Docker daemon.
//! There is one shared instance of each piece of lesson state, so sessions
//! of the same language are serialized by a per-language lock held from
//! acquire to release.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    fs,
    process::{Child, Command},
    sync::{Mutex, OwnedMutexGuard},
};

use crate::{
    config::{GraderConfig, LocalConfig},
    constants::{workspace_samples, TIMEOUT_MESSAGE},
    error::{AppError, AppResult},
    models::{CheckLogic, GradeResult, Language},
};

use super::{
    backend::{CommandOutput, ExecutionBackend, SessionHost},
    command::{CommandBuilder, Invocation, Layout},
    languages::LanguageHandler,
    session,
};

/// How long shutdown waits for redis-server to exit
const REDIS_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Exclusive hold on one language's shared state
pub struct LocalUnit {
    language: Language,
    _guard: OwnedMutexGuard<()>,
}

/// Subprocess execution backend
pub struct SubprocessManager {
    config: LocalConfig,
    grader: GraderConfig,
    builder: CommandBuilder,
    locks: HashMap<Language, Arc<Mutex<()>>>,
    redis_server: Mutex<Option<Child>>,
}

impl SubprocessManager {
    pub fn new(config: LocalConfig, grader: GraderConfig) -> Self {
        let locks = Language::ALL
            .into_iter()
            .map(|language| (language, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            builder: CommandBuilder::new(Layout::local(&config)),
            config,
            grader,
            locks,
            redis_server: Mutex::new(None),
        }
    }

    async fn start_redis_server(&self) {
        let spawned = Command::new("redis-server")
            .args(["--daemonize", "no", "--loglevel", "warning"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                tracing::info!(pid = ?child.id(), "Redis server started");
                *self.redis_server.lock().await = Some(child);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("redis-server not found, redis lessons will not work");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to start redis-server"),
        }
    }

    /// Replace the lesson repository with a fresh one
    async fn init_git_repo(&self) -> AppResult<()> {
        let repo = &self.config.git_repo;
        if fs::try_exists(repo).await.unwrap_or(false) {
            fs::remove_dir_all(repo).await.map_err(io_error)?;
        }
        fs::create_dir_all(repo).await.map_err(io_error)?;

        let dir = repo.to_string_lossy().into_owned();
        for argv in [
            vec!["git", "init"],
            vec!["git", "config", "user.email", "test@test.com"],
            vec!["git", "config", "user.name", "Test"],
        ] {
            let output = self
                .exec(&Invocation::direct(argv).in_dir(dir.clone()), self.grader.execution_timeout)
                .await?;
            if !output.success() {
                tracing::warn!(output = %output.output, "Git repository setup failed");
                break;
            }
        }
        Ok(())
    }

    /// Overwrite the working database with the pristine copy
    async fn reset_sql_database(&self) -> AppResult<()> {
        let source = &self.config.sql_source;
        if !fs::try_exists(source).await.unwrap_or(false) {
            tracing::warn!(path = %source.display(), "SQL database not found");
            return Ok(());
        }
        fs::copy(source, &self.config.sql_database)
            .await
            .map_err(io_error)?;
        Ok(())
    }

    /// Seed the shell workspace with the lesson sample files
    async fn provision_workspace(&self) -> AppResult<()> {
        let workspace = &self.config.workspace;
        fs::create_dir_all(workspace).await.map_err(io_error)?;

        for name in workspace_samples::LESSON_OUTPUTS {
            remove_path(&workspace.join(name)).await?;
        }
        remove_path(&workspace.join("subdir")).await?;
        fs::create_dir_all(workspace.join("subdir"))
            .await
            .map_err(io_error)?;

        fs::write(workspace.join("server.log"), workspace_samples::SERVER_LOG)
            .await
            .map_err(io_error)?;
        fs::write(workspace.join("access.log"), workspace_samples::ACCESS_LOG)
            .await
            .map_err(io_error)?;
        for junk in workspace_samples::JUNK_FILES {
            fs::write(workspace.join(junk), b"").await.map_err(io_error)?;
        }
        Ok(())
    }

    /// Return one language's shared state to its pristine form
    async fn reset(&self, language: Language) -> AppResult<()> {
        match language {
            Language::Redis => {
                let output = self
                    .exec(
                        &Invocation::direct(["redis-cli", "FLUSHALL"]),
                        self.grader.execution_timeout,
                    )
                    .await?;
                if !output.success() {
                    tracing::warn!(output = %output.output, "Redis flush failed");
                }
            }
            Language::Sql => self.reset_sql_database().await?,
            Language::Git => {
                let repo = self.config.git_repo.to_string_lossy().into_owned();
                // a repository without commits cannot be reset, but can still be cleaned
                for argv in [["git", "reset", "--hard"], ["git", "clean", "-fd"]] {
                    let step = Invocation::direct(argv).in_dir(repo.clone());
                    let output = self.exec(&step, self.grader.execution_timeout).await?;
                    if !output.success() {
                        tracing::warn!(command = %step, output = %output.output, "Git reset step failed");
                    }
                }
            }
            Language::Docker => remove_path(&self.config.user_input).await?,
            Language::Llm => {
                remove_path(&self.config.user_input).await?;
                remove_path(&self.config.llm_mode).await?;
            }
            Language::Bash => self.provision_workspace().await?,
        }
        Ok(())
    }

    /// Run an invocation on the host, bounded by `timeout`
    async fn exec(&self, invocation: &Invocation, timeout: Duration) -> AppResult<CommandOutput> {
        let mut command = Command::new(invocation.program());
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(CommandOutput::new(1, format!("Error: command not found - {e}")));
            }
            Err(e) => {
                return Err(AppError::Execution(format!(
                    "Failed to spawn {}: {e}",
                    invocation.program()
                )));
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(io_error)?,
            Err(_) => {
                tracing::warn!(command = %invocation, timeout_secs = timeout.as_secs(), "Command timed out");
                return Ok(CommandOutput::new(1, TIMEOUT_MESSAGE));
            }
        };

        let exit_code = i64::from(output.status.code().unwrap_or(-1));
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let combined = if exit_code != 0 && !stderr.is_empty() {
            if stdout.is_empty() {
                stderr
            } else {
                format!("{stdout}\n{stderr}")
            }
        } else {
            stdout
        };

        Ok(CommandOutput::new(exit_code, combined))
    }
}

#[async_trait]
impl SessionHost for SubprocessManager {
    type Unit = LocalUnit;

    fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    async fn acquire(&self, language: Language) -> AppResult<LocalUnit> {
        let lock = self.locks.get(&language).ok_or_else(|| {
            AppError::NotFound(format!("No execution lock for language: {language}"))
        })?;

        let guard = Arc::clone(lock).lock_owned().await;
        Ok(LocalUnit {
            language,
            _guard: guard,
        })
    }

    async fn run(&self, unit: &LocalUnit, invocation: &Invocation) -> AppResult<CommandOutput> {
        let timeout = LanguageHandler::for_language(unit.language).timeout(&self.grader);
        tracing::debug!(language = %unit.language, command = %invocation, "Exec");
        self.exec(invocation, timeout).await
    }

    async fn release(&self, unit: LocalUnit) {
        if let Err(e) = self.reset(unit.language).await {
            tracing::warn!(language = %unit.language, error = %e, "Reset failed");
        }
    }
}

#[async_trait]
impl ExecutionBackend for SubprocessManager {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn startup(&self) -> AppResult<()> {
        tracing::info!("Subprocess backend starting");

        self.start_redis_server().await;
        self.init_git_repo().await?;
        self.reset_sql_database().await?;
        self.provision_workspace().await?;

        tracing::info!(
            workspace = %self.config.workspace.display(),
            git_repo = %self.config.git_repo.display(),
            "Subprocess backend ready"
        );
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        let Some(mut child) = self.redis_server.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = child.start_kill() {
            tracing::warn!(error = %e, "Failed to signal redis-server");
        }
        match tokio::time::timeout(REDIS_STOP_TIMEOUT, child.wait()).await {
            Ok(_) => tracing::info!("Redis server stopped"),
            Err(_) => tracing::warn!("Redis server did not exit in time"),
        }
        Ok(())
    }

    async fn execute_graded(
        &self,
        language: Language,
        user_code: &str,
        check_logic: &CheckLogic,
    ) -> AppResult<GradeResult> {
        session::execute_graded(self, language, user_code, check_logic).await
    }
}

/// Delete a file or directory tree, ignoring paths that do not exist
async fn remove_path(path: &Path) -> AppResult<()> {
    let result = match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(io_error)
}

fn io_error(e: std::io::Error) -> AppError {
    AppError::Execution(e.to_string())
}
