//! Execution backend abstraction
//!
//! The HTTP layer only sees [`ExecutionBackend`]. Both implementations share
//! the grading session in [`super::session`] through [`SessionHost`], which
//! exposes the acquire/run/release primitives of one backend.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{CheckLogic, GradeResult, Language},
};

use super::command::{CommandBuilder, Invocation};

/// A grading backend owned by the application state
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short name reported by the health endpoint
    fn name(&self) -> &'static str;

    /// Provision every execution unit; called once before serving
    async fn startup(&self) -> AppResult<()>;

    /// Tear down every execution unit; called once after serving
    async fn shutdown(&self) -> AppResult<()>;

    /// Run one grading session
    ///
    /// Only a request the backend cannot serve at all (no pool for the
    /// language) is an error. Rejections and execution failures come back
    /// as an incorrect [`GradeResult`].
    async fn execute_graded(
        &self,
        language: Language,
        user_code: &str,
        check_logic: &CheckLogic,
    ) -> AppResult<GradeResult>;
}

/// Exit status and whitespace-trimmed output of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i64,
    pub output: String,
}

impl CommandOutput {
    pub fn new(exit_code: i64, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Primitives a backend provides to the grading session
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Exclusive (or round-robin shared) handle on an execution unit
    type Unit: Send + Sync;

    fn builder(&self) -> &CommandBuilder;

    async fn acquire(&self, language: Language) -> AppResult<Self::Unit>;

    async fn run(&self, unit: &Self::Unit, invocation: &Invocation) -> AppResult<CommandOutput>;

    /// Reset the unit and hand it back; never fails
    async fn release(&self, unit: Self::Unit);
}
