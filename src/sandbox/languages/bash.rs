//! Bash language handler

use crate::{
    constants::{container_images, container_paths, workspace_samples},
    models::Language,
};

use super::LanguageHandler;

/// Get handler for Bash
pub fn handler() -> LanguageHandler {
    let ws = container_paths::WORKSPACE;
    let junk = workspace_samples::JUNK_FILES
        .iter()
        .map(|file| format!("{ws}/{file}"))
        .collect::<Vec<_>>()
        .join(" ");

    LanguageHandler {
        language: Language::Bash,
        image: container_images::BASH,
        // Drop lesson outputs, then recreate the junk files the xargs lesson deletes
        reset_command: format!(
            "cd {ws} && rm -rf {outputs} {ws}/subdir/* && mkdir -p {ws}/subdir && touch {junk}",
            outputs = workspace_samples::LESSON_OUTPUTS.join(" "),
        ),
        network_enabled: false,
        receives_llm_key: false,
        extended_timeout: false,
    }
}
