//! LessonGrader - Sandboxed Grading for Interactive Tool Lessons
//!
//! This library provides the grading engine behind interactive tutorials for
//! command-line tools: a learner's command is checked, executed in an
//! isolated environment and judged against a declarative lesson rule.
//!
//! # Features
//!
//! - Six lesson languages (redis, sql, git, docker, llm, bash)
//! - Input sanitization before anything executes
//! - Warm Docker container pools with per-request reset
//! - A subprocess backend for hosts without a Docker daemon
//! - Rule-based grading with learner-facing feedback
//!
//! # Architecture
//!
//! - **Handlers**: HTTP request handlers (thin layer)
//! - **Sandbox**: Sanitizer, command builder, backends and grader
//! - **Models**: Domain models and DTOs

pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod models;
pub mod sandbox;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
