//! Grading request DTOs

use serde::Deserialize;
use validator::Validate;

use crate::{constants::MAX_USER_CODE_SIZE, models::CheckLogic};

/// Grade a submission against a lesson rule
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GradeRequest {
    /// Language identifier (e.g. "redis", "sql")
    #[validate(length(min = 1, max = 20))]
    pub language: String,

    /// Untrusted learner submission
    #[validate(length(max = MAX_USER_CODE_SIZE))]
    pub user_code: String,

    /// Trusted grading rule from the lesson
    pub check_logic: CheckLogic,
}
