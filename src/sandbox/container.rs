//! Pooled Docker container backend
//!
//! Every language gets a fixed number of warm containers started from its
//! grading image. A session borrows one round-robin, execs its commands in
//! it and hands it back after the language's reset command has run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bollard::{
    container::LogOutput,
    exec::{CreateExecOptions, StartExecResults},
    models::{ContainerCreateBody, HostConfig},
    query_parameters::{
        CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions,
    },
    Docker,
};
use futures::StreamExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::{DockerConfig, GraderConfig},
    constants::{CONTAINER_PIDS_LIMIT, LLM_API_KEY_ENV, TIMEOUT_EXIT_CODE, TIMEOUT_MESSAGE},
    error::AppResult,
    models::{CheckLogic, GradeResult, Language},
};

use super::{
    backend::{CommandOutput, ExecutionBackend, SessionHost},
    command::{CommandBuilder, Invocation, Layout},
    languages::LanguageHandler,
    pool::{ExecutionUnit, UnitLease, UnitPool},
    session,
};

/// Extra time the client waits past the in-container `timeout` before giving up
const EXEC_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to start one grading container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub language: Language,
    pub image: String,
    pub env: Vec<String>,
    pub network_enabled: bool,
    pub memory_limit_mb: u64,
}

/// The container operations the pool needs from a container engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container, returning its ID
    async fn launch(&self, spec: &LaunchSpec) -> AppResult<String>;

    /// Run a command inside a running container
    async fn exec(
        &self,
        container_id: &str,
        invocation: &Invocation,
        timeout: Duration,
    ) -> AppResult<CommandOutput>;

    /// Force-remove a container, stopping it first if needed
    async fn remove(&self, container_id: &str) -> AppResult<()>;
}

/// [`ContainerRuntime`] backed by the local Docker daemon
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> AppResult<String> {
        let options = CreateContainerOptionsBuilder::default()
            .name(&spec.name)
            .build();

        let memory = (spec.memory_limit_mb * 1024 * 1024) as i64;
        let host_config = HostConfig {
            memory: Some(memory),
            memory_swap: Some(memory),
            network_mode: Some(if spec.network_enabled { "bridge" } else { "none" }.to_string()),
            pids_limit: Some(CONTAINER_PIDS_LIMIT),
            ..Default::default()
        };

        let config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            tty: Some(true),
            open_stdin: Some(true),
            host_config: Some(host_config),
            env: Some(spec.env.clone()),
            labels: Some(HashMap::from([(
                "lessongrader.language".to_string(),
                spec.language.to_string(),
            )])),
            ..Default::default()
        };

        let container = self.docker.create_container(Some(options), config).await?;

        self.docker
            .start_container(&container.id, None::<StartContainerOptions>)
            .await?;

        Ok(container.id)
    }

    async fn exec(
        &self,
        container_id: &str,
        invocation: &Invocation,
        timeout: Duration,
    ) -> AppResult<CommandOutput> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(bounded_argv(invocation, timeout)),
                    working_dir: invocation.working_dir.clone(),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let collect = async {
            let mut combined = String::new();
            if let StartExecResults::Attached { mut output, .. } =
                self.docker.start_exec(&exec.id, None).await?
            {
                while let Some(msg) = output.next().await {
                    match msg? {
                        LogOutput::StdOut { message }
                        | LogOutput::StdErr { message }
                        | LogOutput::Console { message } => {
                            combined.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            }
            AppResult::Ok(combined)
        };

        let combined = match tokio::time::timeout(timeout + EXEC_TIMEOUT_GRACE, collect).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    container_id = %container_id,
                    timeout_secs = timeout.as_secs(),
                    "Command did not finish after its timeout"
                );
                return Ok(CommandOutput::new(TIMEOUT_EXIT_CODE, TIMEOUT_MESSAGE));
            }
        };

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        if exit_code == TIMEOUT_EXIT_CODE {
            tracing::warn!(
                container_id = %container_id,
                timeout_secs = timeout.as_secs(),
                "Command timed out"
            );
            return Ok(CommandOutput::new(TIMEOUT_EXIT_CODE, TIMEOUT_MESSAGE));
        }

        Ok(CommandOutput::new(exit_code, combined.trim()))
    }

    async fn remove(&self, container_id: &str) -> AppResult<()> {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();
        self.docker
            .remove_container(container_id, Some(options))
            .await?;
        Ok(())
    }
}

/// Prefix an invocation with coreutils `timeout` so the process is killed
/// inside the container once its time is up
fn bounded_argv(invocation: &Invocation, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1);
    let mut argv = vec!["timeout".to_string(), format!("{secs}s")];
    argv.extend(invocation.argv.iter().cloned());
    argv
}

/// Container-pool execution backend
pub struct ContainerManager<R = DockerRuntime> {
    runtime: R,
    grader: GraderConfig,
    docker: DockerConfig,
    builder: CommandBuilder,
    pool: RwLock<UnitPool>,
}

impl<R: ContainerRuntime> ContainerManager<R> {
    pub fn new(runtime: R, grader: GraderConfig, docker: DockerConfig) -> Self {
        Self {
            runtime,
            grader,
            docker,
            builder: CommandBuilder::new(Layout::container()),
            pool: RwLock::new(UnitPool::new()),
        }
    }

    fn launch_spec(&self, handler: &LanguageHandler) -> LaunchSpec {
        let language = handler.language();
        let mut env = vec!["LANG=C.UTF-8".to_string()];
        if handler.receives_llm_key() {
            if let Some(key) = &self.grader.llm_api_key {
                env.push(format!("{LLM_API_KEY_ENV}={key}"));
            }
        }

        let suffix = Uuid::new_v4().simple().to_string();
        LaunchSpec {
            name: format!("grader-{language}-{}", &suffix[..12]),
            language,
            image: handler.image().to_string(),
            env,
            network_enabled: handler.network_enabled(),
            memory_limit_mb: self.docker.memory_limit_mb,
        }
    }

    /// Launch `pool_size` containers per language into `pool`
    async fn fill_pool(&self, pool: &mut UnitPool) -> AppResult<()> {
        for language in Language::ALL {
            let handler = LanguageHandler::for_language(language);
            for _ in 0..self.grader.pool_size {
                let spec = self.launch_spec(&handler);
                let id = self.runtime.launch(&spec).await?;
                tracing::debug!(language = %language, container_id = %id, name = %spec.name, "Container started");
                pool.insert(ExecutionUnit::new(id, language));
            }
            tracing::info!(
                language = %language,
                image = %handler.image(),
                size = pool.size(language),
                "Container pool warm"
            );
        }
        Ok(())
    }

    async fn remove_all(&self, units: Vec<Arc<ExecutionUnit>>) {
        for unit in units {
            if let Err(e) = self.runtime.remove(unit.id()).await {
                tracing::warn!(container_id = %unit.id(), error = %e, "Failed to remove container");
            }
        }
    }

    /// Number of warm containers for a language
    pub async fn pool_size(&self, language: Language) -> usize {
        self.pool.read().await.size(language)
    }
}

#[async_trait]
impl<R: ContainerRuntime> SessionHost for ContainerManager<R> {
    type Unit = UnitLease;

    fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    async fn acquire(&self, language: Language) -> AppResult<Self::Unit> {
        let unit = self.pool.read().await.acquire(language)?;
        tracing::debug!(language = %language, container_id = %unit.id(), "Container acquired");
        Ok(unit)
    }

    async fn run(&self, unit: &Self::Unit, invocation: &Invocation) -> AppResult<CommandOutput> {
        let timeout = LanguageHandler::for_language(unit.language()).timeout(&self.grader);
        tracing::debug!(container_id = %unit.id(), command = %invocation, "Exec");
        self.runtime.exec(unit.id(), invocation, timeout).await
    }

    async fn release(&self, unit: Self::Unit) {
        let handler = LanguageHandler::for_language(unit.language());
        let reset = Invocation::shell(handler.reset_command());
        match self
            .runtime
            .exec(unit.id(), &reset, handler.timeout(&self.grader))
            .await
        {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::warn!(
                language = %unit.language(),
                container_id = %unit.id(),
                exit_code = output.exit_code,
                output = %output.output,
                "Reset command failed"
            ),
            Err(e) => tracing::warn!(
                language = %unit.language(),
                container_id = %unit.id(),
                error = %e,
                "Reset command failed"
            ),
        }

        tracing::debug!(container_id = %unit.id(), "Container released");
        drop(unit);
    }
}

#[async_trait]
impl<R: ContainerRuntime + 'static> ExecutionBackend for ContainerManager<R> {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn startup(&self) -> AppResult<()> {
        let mut pool = self.pool.write().await;
        if !pool.is_empty() {
            tracing::warn!("Container pool already started");
            return Ok(());
        }

        if self.grader.llm_api_key.is_none() {
            tracing::warn!(
                "{} is not set, LLM lessons that call the upstream API will fail",
                LLM_API_KEY_ENV
            );
        }

        if let Err(e) = self.fill_pool(&mut pool).await {
            let launched = pool.drain();
            tracing::error!(
                error = %e,
                launched = launched.len(),
                "Container pool startup failed, removing launched containers"
            );
            self.remove_all(launched).await;
            return Err(e);
        }

        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        let units = self.pool.write().await.drain();
        tracing::info!(count = units.len(), "Removing grading containers");
        self.remove_all(units).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, models::ExpectedResult};
    use mockall::predicate::*;

    fn grader_config(pool_size: usize) -> GraderConfig {
        GraderConfig {
            pool_size,
            llm_api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    /// Mock runtime whose launches return `<language>-<n>` IDs
    fn launching_runtime() -> MockContainerRuntime {
        let mut runtime = MockContainerRuntime::new();
        let mut launched: HashMap<Language, usize> = HashMap::new();
        runtime.expect_launch().returning(move |spec| {
            let n = launched.entry(spec.language).or_default();
            *n += 1;
            Ok(format!("{}-{n}", spec.language))
        });
        runtime
    }

    async fn started(runtime: MockContainerRuntime, pool_size: usize) -> ContainerManager<MockContainerRuntime> {
        let manager = ContainerManager::new(runtime, grader_config(pool_size), DockerConfig::default());
        manager.startup().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_startup_fills_every_pool() {
        let manager = started(launching_runtime(), 2).await;
        for language in Language::ALL {
            assert_eq!(manager.pool_size(language).await, 2);
        }
    }

    #[test]
    fn test_launch_spec_isolation() {
        let manager = ContainerManager::new(
            MockContainerRuntime::new(),
            grader_config(1),
            DockerConfig::default(),
        );

        let llm = manager.launch_spec(&LanguageHandler::for_language(Language::Llm));
        assert!(llm.network_enabled);
        assert!(llm.env.contains(&"LLM_API_KEY=sk-test".to_string()));
        assert!(llm.name.starts_with("grader-llm-"));
        assert_eq!(llm.image, "grader-image-llm");

        let sql = manager.launch_spec(&LanguageHandler::for_language(Language::Sql));
        assert!(!sql.network_enabled);
        assert!(sql.env.iter().all(|var| !var.starts_with("LLM_API_KEY")));
        assert_eq!(sql.memory_limit_mb, 256);
    }

    #[test]
    fn test_missing_llm_key_is_not_fatal() {
        let grader = GraderConfig {
            llm_api_key: None,
            ..Default::default()
        };
        let manager = ContainerManager::new(MockContainerRuntime::new(), grader, DockerConfig::default());
        let llm = manager.launch_spec(&LanguageHandler::for_language(Language::Llm));
        assert_eq!(llm.env, vec!["LANG=C.UTF-8"]);
    }

    #[tokio::test]
    async fn test_failed_startup_removes_launched_containers() {
        let mut runtime = MockContainerRuntime::new();
        let mut launched = 0;
        runtime.expect_launch().times(3).returning(move |_| {
            launched += 1;
            if launched == 3 {
                Err(AppError::Docker("no such image".to_string()))
            } else {
                Ok(format!("container-{launched}"))
            }
        });
        runtime
            .expect_remove()
            .withf(|id| id == "container-1" || id == "container-2")
            .times(2)
            .returning(|_| Ok(()));

        let manager = ContainerManager::new(runtime, grader_config(2), DockerConfig::default());
        assert!(manager.startup().await.is_err());

        for language in Language::ALL {
            assert_eq!(manager.pool_size(language).await, 0);
        }
    }

    #[test]
    fn test_exec_is_bounded_inside_container() {
        let invocation = Invocation::direct(["redis-cli", "PING"]).in_dir("/data");
        assert_eq!(
            bounded_argv(&invocation, Duration::from_secs(10)),
            vec!["timeout", "10s", "redis-cli", "PING"]
        );
        assert_eq!(
            bounded_argv(&invocation, Duration::from_millis(300)),
            vec!["timeout", "1s", "redis-cli", "PING"]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_aborts_startup() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_launch()
            .returning(|_| Err(AppError::Docker("no such image".to_string())));

        let manager = ContainerManager::new(runtime, grader_config(1), DockerConfig::default());
        assert!(manager.startup().await.is_err());
    }

    #[tokio::test]
    async fn test_release_resets_unit() {
        let mut runtime = launching_runtime();
        runtime
            .expect_exec()
            .withf(|id, invocation, _| id == "redis-1" && invocation.argv[2] == "redis-cli FLUSHALL")
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::new(0, "OK")));

        let manager = started(runtime, 1).await;
        let lease = manager.acquire(Language::Redis).await.unwrap();
        assert_eq!(lease.holders(), 1);

        manager.release(lease).await;

        let next = manager.acquire(Language::Redis).await.unwrap();
        assert_eq!(next.holders(), 1);
    }

    #[tokio::test]
    async fn test_shared_unit_is_reset_by_every_session() {
        let mut runtime = launching_runtime();
        runtime
            .expect_exec()
            .withf(|id, invocation, _| id == "redis-1" && invocation.argv[2] == "redis-cli FLUSHALL")
            .times(2)
            .returning(|_, _, _| Ok(CommandOutput::new(0, "OK")));

        let manager = started(runtime, 1).await;
        let first = manager.acquire(Language::Redis).await.unwrap();
        let second = manager.acquire(Language::Redis).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(second.holders(), 2);

        manager.release(first).await;
        assert_eq!(second.holders(), 1);
        manager.release(second).await;

        let after = manager.acquire(Language::Redis).await.unwrap();
        assert_eq!(after.holders(), 1);
    }

    #[tokio::test]
    async fn test_failed_reset_still_returns_unit() {
        let mut runtime = launching_runtime();
        runtime
            .expect_exec()
            .returning(|_, _, _| Err(AppError::Docker("container gone".to_string())));

        let manager = started(runtime, 1).await;
        let lease = manager.acquire(Language::Git).await.unwrap();
        manager.release(lease).await;

        let next = manager.acquire(Language::Git).await.unwrap();
        assert_eq!(next.holders(), 1);
    }

    #[tokio::test]
    async fn test_llm_commands_use_extended_timeout() {
        let mut runtime = launching_runtime();
        runtime
            .expect_exec()
            .with(eq("llm-1"), always(), eq(Duration::from_secs(30)))
            .returning(|_, _, _| Ok(CommandOutput::new(0, "ok")));

        let manager = started(runtime, 1).await;
        let unit = manager.acquire(Language::Llm).await.unwrap();
        let output = manager
            .run(&unit, &Invocation::direct(["call-llm", "/tmp/user_input"]))
            .await
            .unwrap();
        assert_eq!(output.output, "ok");
    }

    #[tokio::test]
    async fn test_graded_session_through_mock_runtime() {
        let mut runtime = launching_runtime();
        runtime
            .expect_exec()
            .withf(|_, invocation, _| invocation.argv == ["redis-cli", "PING"])
            .times(2)
            .returning(|_, _, _| Ok(CommandOutput::new(0, "PONG")));
        runtime
            .expect_exec()
            .withf(|_, invocation, _| invocation.program() == "sh")
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::new(0, "OK")));

        let manager = started(runtime, 2).await;
        let logic = CheckLogic::new(ExpectedResult::ExactMatch("PONG".into())).with_validation("PING");

        let result = manager
            .execute_graded(Language::Redis, "PING", &logic)
            .await
            .unwrap();

        assert!(result.is_correct);
        assert_eq!(result.output, "PONG");
        assert_eq!(result.feedback_message, "Correct!");
    }

    #[tokio::test]
    async fn test_shutdown_removes_every_container() {
        let mut runtime = launching_runtime();
        runtime.expect_remove().times(12).returning(|_| Ok(()));

        let manager = started(runtime, 2).await;
        manager.shutdown().await.unwrap();

        for language in Language::ALL {
            assert_eq!(manager.pool_size(language).await, 0);
        }
        let err = manager.acquire(Language::Redis).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_shutdown_continues_past_failures() {
        let mut runtime = launching_runtime();
        runtime
            .expect_remove()
            .times(6)
            .returning(|_| Err(AppError::Docker("already removed".to_string())));

        let manager = started(runtime, 1).await;
        assert!(manager.shutdown().await.is_ok());
    }
}
