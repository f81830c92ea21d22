//! Git language handler

use crate::{constants::container_images, models::Language};

use super::LanguageHandler;

/// Get handler for Git
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Git,
        image: container_images::GIT,
        reset_command: "git reset --hard && git clean -fd".to_string(),
        network_enabled: false,
        receives_llm_key: false,
        extended_timeout: false,
    }
}
