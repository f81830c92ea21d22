//! Grading session orchestration
//!
//! sanitize → acquire → setup → user code → validation → evaluate → release.
//! The unit is released on every path out of the session, including a panic
//! in the middle of it. [`execute_detached`] also covers the caller going
//! away: the session runs on its own task and finishes regardless.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::{
    error::{AppError, AppResult},
    models::{CheckLogic, GradeResult, Language},
};

use super::{
    backend::{ExecutionBackend, SessionHost},
    grader, sanitizer,
};

/// Run a grading session on its own task
///
/// Dropping the returned future (a client disconnect, server shutdown) does
/// not cancel the session, so its unit is always reset and released. A panic
/// inside the session surfaces as [`AppError::Internal`].
pub async fn execute_detached(
    backend: Arc<dyn ExecutionBackend>,
    language: Language,
    user_code: String,
    check_logic: CheckLogic,
) -> AppResult<GradeResult> {
    let task = tokio::spawn(async move {
        backend
            .execute_graded(language, &user_code, &check_logic)
            .await
    });

    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(language = %language, error = %e, "Grading task failed");
            Err(AppError::Internal(anyhow::anyhow!("grading task failed: {e}")))
        }
    }
}

/// Run one grading session on `host`
pub async fn execute_graded<H>(
    host: &H,
    language: Language,
    user_code: &str,
    check_logic: &CheckLogic,
) -> AppResult<GradeResult>
where
    H: SessionHost + ?Sized,
{
    if let Err(reason) = sanitizer::sanitize(language, user_code) {
        tracing::info!(language = %language, reason = %reason, "Submission rejected");
        return Ok(GradeResult::rejected(reason));
    }

    let unit = host.acquire(language).await?;

    let outcome = AssertUnwindSafe(run_session(host, &unit, language, user_code, check_logic))
        .catch_unwind()
        .await;

    host.release(unit).await;

    match outcome {
        Ok(Ok(result)) => {
            tracing::info!(
                language = %language,
                is_correct = result.is_correct,
                "Submission graded"
            );
            Ok(result)
        }
        Ok(Err(e)) => {
            tracing::error!(language = %language, error = %e, "Grading session failed");
            Ok(GradeResult {
                output: e.to_string(),
                is_correct: false,
                feedback_message: format!("Execution error: {e}"),
            })
        }
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn run_session<H>(
    host: &H,
    unit: &H::Unit,
    language: Language,
    user_code: &str,
    check_logic: &CheckLogic,
) -> AppResult<GradeResult>
where
    H: SessionHost + ?Sized,
{
    let builder = host.builder();

    for command in &check_logic.setup_commands {
        let setup = host.run(unit, &builder.build(language, command)).await?;
        if !setup.success() {
            tracing::debug!(
                language = %language,
                exit_code = setup.exit_code,
                "Setup command exited non-zero"
            );
        }
    }

    let user = host.run(unit, &builder.build(language, user_code)).await?;

    let validation = match &check_logic.validation_command {
        Some(command) => host.run(unit, &builder.build(language, command)).await?.output,
        None => String::new(),
    };

    Ok(grader::evaluate(
        &check_logic.expected_result,
        &user.output,
        &validation,
    ))
}
