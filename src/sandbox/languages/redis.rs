//! Redis language handler

use crate::{constants::container_images, models::Language};

use super::LanguageHandler;

/// Get handler for Redis
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Redis,
        image: container_images::REDIS,
        // Clear all keys
        reset_command: "redis-cli FLUSHALL".to_string(),
        network_enabled: false,
        receives_llm_key: false,
        extended_timeout: false,
    }
}
