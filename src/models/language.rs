//! Supported lesson languages

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{constants::languages, error::AppError};

/// A lesson language with its own execution environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Key-value store (redis-cli)
    Redis,
    /// Relational queries (sqlite3)
    Sql,
    /// Version control
    Git,
    /// Container tooling and manifests
    Docker,
    /// LLM prompts and API calls
    Llm,
    /// Shell scripting
    Bash,
}

impl Language {
    /// Every supported language, in registry order
    pub const ALL: [Language; 6] = [
        Language::Redis,
        Language::Sql,
        Language::Git,
        Language::Docker,
        Language::Llm,
        Language::Bash,
    ];

    /// Wire identifier of the language
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => languages::REDIS,
            Self::Sql => languages::SQL,
            Self::Git => languages::GIT,
            Self::Docker => languages::DOCKER,
            Self::Llm => languages::LLM,
            Self::Bash => languages::BASH,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|language| language.as_str() == value)
            .ok_or_else(|| AppError::UnsupportedLanguage(value.to_string()))
    }
}
