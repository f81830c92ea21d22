//! Docker tutorial language handler

use crate::{
    constants::{container_images, container_paths},
    models::Language,
};

use super::LanguageHandler;

/// Get handler for the Docker tutorial
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Docker,
        image: container_images::DOCKER,
        reset_command: format!("rm -f {}", container_paths::USER_INPUT),
        network_enabled: false,
        receives_llm_key: false,
        extended_timeout: false,
    }
}
