//! SQL language handler

use crate::{
    constants::{container_images, container_paths},
    models::Language,
};

use super::LanguageHandler;

/// Get handler for SQL
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Sql,
        image: container_images::SQL,
        // Restore the database from the pristine copy baked into the image
        reset_command: format!(
            "cp {db}.original {db}",
            db = container_paths::SQL_DATABASE
        ),
        network_enabled: false,
        receives_llm_key: false,
        extended_timeout: false,
    }
}
