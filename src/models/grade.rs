//! Grading result model

use serde::{Deserialize, Serialize};

/// The verdict sent back after grading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub output: String,
    pub is_correct: bool,
    pub feedback_message: String,
}

impl GradeResult {
    /// Incorrect verdict that never reached grading
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            output: reason.clone(),
            is_correct: false,
            feedback_message: reason,
        }
    }
}
