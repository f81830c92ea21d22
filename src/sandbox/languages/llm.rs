//! LLM tutorial language handler

use crate::{
    constants::{container_images, container_paths},
    models::Language,
};

use super::LanguageHandler;

/// Get handler for the LLM tutorial
///
/// The only language that talks to the outside world: its containers keep
/// networking and receive the upstream API key.
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Llm,
        image: container_images::LLM,
        reset_command: format!(
            "rm -f {} {}",
            container_paths::USER_INPUT,
            container_paths::LLM_MODE
        ),
        network_enabled: true,
        receives_llm_key: true,
        extended_timeout: true,
    }
}
