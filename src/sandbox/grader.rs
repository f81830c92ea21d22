//! Verdicts from session output
//!
//! Grading is a pure function of the lesson rule and the two captured
//! outputs. It never fails: a rule it cannot interpret is an incorrect
//! verdict.

use crate::{
    constants::CORRECT_FEEDBACK,
    models::{ExpectedResult, GradeResult},
};

/// Judge a session
///
/// `user_output` is the output of the learner's code; `validation_output` is
/// the output of the lesson's validation command, or empty when it has none.
/// The returned output is always the user output.
pub fn evaluate(rule: &ExpectedResult, user_output: &str, validation_output: &str) -> GradeResult {
    let verdict = match rule {
        ExpectedResult::ExactMatch(value) => {
            let expected = value.as_text();
            if validation_output == expected {
                Ok(())
            } else {
                Err(format!(
                    "Incorrect. Expected a result of '{expected}' but got '{validation_output}'."
                ))
            }
        }
        ExpectedResult::UserOutputExactMatch(value) => {
            let expected = value.as_text();
            let expected = expected.trim();
            let actual = user_output.trim();
            if actual == expected {
                Ok(())
            } else {
                Err(format!("Expected output:\n{expected}\n\nYour output:\n{actual}"))
            }
        }
        ExpectedResult::UserOutputContains(value) => {
            let expected = value.as_text();
            if user_output.contains(&expected) {
                Ok(())
            } else {
                Err(format!("Your output should contain '{expected}'"))
            }
        }
        ExpectedResult::UserOutputContainsAll(value) => {
            let missing: Vec<String> = value
                .as_list()
                .into_iter()
                .filter(|item| !user_output.contains(item.as_str()))
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(format!("Your output is missing: {}", missing.join(", ")))
            }
        }
        ExpectedResult::IntegerGreaterThan(value) => {
            match (value.as_integer(), validation_output.trim().parse::<i64>()) {
                (None, _) => Err(format!(
                    "Rule threshold '{}' is not a number.",
                    value.as_text()
                )),
                (Some(_), Err(_)) => {
                    Err(format!("Expected a number but got '{validation_output}'."))
                }
                (Some(threshold), Ok(actual)) if actual > threshold => Ok(()),
                (Some(threshold), Ok(actual)) => Err(format!(
                    "Expected value greater than {threshold}, got {actual}."
                )),
            }
        }
        ExpectedResult::SetContains(value) => {
            let expected = value.as_text();
            if validation_output.contains(&expected) {
                Ok(())
            } else {
                Err(format!("Expected result to contain '{expected}'."))
            }
        }
        ExpectedResult::Unknown { kind, .. } => {
            Err(format!("Unknown validation type: '{kind}'"))
        }
    };

    GradeResult {
        output: user_output.to_string(),
        is_correct: verdict.is_ok(),
        feedback_message: verdict.err().unwrap_or_else(|| CORRECT_FEEDBACK.to_string()),
    }
}
