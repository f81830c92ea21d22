//! Sandboxed execution and grading of learner submissions
//!
//! This module provides:
//! - Input sanitization before anything runs
//! - Per-language command construction
//! - Two execution backends: pooled Docker containers and local subprocesses
//! - Rule-based grading of the captured output

pub mod backend;
pub mod command;
pub mod container;
pub mod grader;
pub mod languages;
pub mod pool;
pub mod sanitizer;
pub mod session;
pub mod subprocess;

pub use backend::{CommandOutput, ExecutionBackend};
pub use command::{CommandBuilder, Invocation, Layout};
pub use container::{ContainerManager, ContainerRuntime, DockerRuntime};
pub use subprocess::SubprocessManager;
