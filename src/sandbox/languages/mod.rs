//! Language-specific handlers for container provisioning and reset

pub mod bash;
pub mod docker;
pub mod git;
pub mod llm;
pub mod redis;
pub mod sql;

use std::time::Duration;

use crate::{config::GraderConfig, models::Language};

/// Static container profile of one language
#[derive(Debug, Clone)]
pub struct LanguageHandler {
    language: Language,
    image: &'static str,
    reset_command: String,
    network_enabled: bool,
    receives_llm_key: bool,
    extended_timeout: bool,
}

impl LanguageHandler {
    /// Get handler for a specific language
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Redis => redis::handler(),
            Language::Sql => sql::handler(),
            Language::Git => git::handler(),
            Language::Docker => docker::handler(),
            Language::Llm => llm::handler(),
            Language::Bash => bash::handler(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Image every warm unit of this language is started from
    pub fn image(&self) -> &'static str {
        self.image
    }

    /// Shell command returning a used container to its pristine state
    pub fn reset_command(&self) -> &str {
        &self.reset_command
    }

    /// Whether the container keeps network access
    pub fn network_enabled(&self) -> bool {
        self.network_enabled
    }

    /// Whether the container is started with the LLM API key
    pub fn receives_llm_key(&self) -> bool {
        self.receives_llm_key
    }

    /// Per-call timeout for commands of this language
    pub fn timeout(&self, config: &GraderConfig) -> Duration {
        if self.extended_timeout {
            config.llm_timeout
        } else {
            config.execution_timeout
        }
    }
}
