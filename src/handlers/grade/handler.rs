//! Grading handler implementations

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{GradeResult, Language},
    sandbox::session,
    state::AppState,
};

use super::request::GradeRequest;

/// Execute and grade a submission
pub async fn grade(
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> AppResult<Json<GradeResult>> {
    payload.validate()?;

    let language: Language = payload.language.parse()?;

    tracing::info!(
        language = %language,
        code_len = payload.user_code.len(),
        setup_commands = payload.check_logic.setup_commands.len(),
        rule = %payload.check_logic.expected_result.kind(),
        "Grading submission"
    );

    let result = session::execute_detached(
        state.backend().clone(),
        language,
        payload.user_code,
        payload.check_logic,
    )
    .await?;

    Ok(Json(result))
}
