//! Declarative grading rules attached to a lesson

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The logic used to set up and validate a challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckLogic {
    /// Trusted commands establishing the exercise preconditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_commands: Vec<String>,

    /// Trusted command inspecting state after the submission ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_command: Option<String>,

    pub expected_result: ExpectedResult,
}

impl CheckLogic {
    /// Rule with no setup and no validation command
    pub fn new(expected_result: ExpectedResult) -> Self {
        Self {
            setup_commands: Vec::new(),
            validation_command: None,
            expected_result,
        }
    }

    pub fn with_setup<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.setup_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validation(mut self, command: impl Into<String>) -> Self {
        self.validation_command = Some(command.into());
        self
    }
}

/// How the output of a session is judged
///
/// On the wire this is `{"type": "<tag>", "value": <any>}`. Tags the grader
/// does not recognise deserialize into [`ExpectedResult::Unknown`] so that a
/// bad lesson degrades to an incorrect verdict instead of a rejected request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawExpectedResult", into = "RawExpectedResult")]
pub enum ExpectedResult {
    /// Validation output equals the value
    ExactMatch(RuleValue),
    /// Trimmed user output equals the trimmed value
    UserOutputExactMatch(RuleValue),
    /// User output contains the value
    UserOutputContains(RuleValue),
    /// User output contains every listed value
    UserOutputContainsAll(RuleValue),
    /// Validation output parses to an integer strictly above the value
    IntegerGreaterThan(RuleValue),
    /// Newline-separated validation output includes the value
    SetContains(RuleValue),
    /// Unrecognised rule type
    Unknown { kind: String, value: RuleValue },
}

impl ExpectedResult {
    /// Wire tag of the rule
    pub fn kind(&self) -> &str {
        match self {
            Self::ExactMatch(_) => "exact_match",
            Self::UserOutputExactMatch(_) => "user_output_exact_match",
            Self::UserOutputContains(_) => "user_output_contains",
            Self::UserOutputContainsAll(_) => "user_output_contains_all",
            Self::IntegerGreaterThan(_) => "integer_greater_than",
            Self::SetContains(_) => "set_contains",
            Self::Unknown { kind, .. } => kind,
        }
    }

    pub fn value(&self) -> &RuleValue {
        match self {
            Self::ExactMatch(value)
            | Self::UserOutputExactMatch(value)
            | Self::UserOutputContains(value)
            | Self::UserOutputContainsAll(value)
            | Self::IntegerGreaterThan(value)
            | Self::SetContains(value)
            | Self::Unknown { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawExpectedResult {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
}

impl From<RawExpectedResult> for ExpectedResult {
    fn from(raw: RawExpectedResult) -> Self {
        let value = RuleValue(raw.value);
        match raw.kind.as_str() {
            "exact_match" => Self::ExactMatch(value),
            "user_output_exact_match" => Self::UserOutputExactMatch(value),
            "user_output_contains" => Self::UserOutputContains(value),
            "user_output_contains_all" => Self::UserOutputContainsAll(value),
            "integer_greater_than" => Self::IntegerGreaterThan(value),
            "set_contains" => Self::SetContains(value),
            _ => Self::Unknown {
                kind: raw.kind,
                value,
            },
        }
    }
}

impl From<ExpectedResult> for RawExpectedResult {
    fn from(rule: ExpectedResult) -> Self {
        Self {
            kind: rule.kind().to_string(),
            value: rule.value().0.clone(),
        }
    }
}

/// Reference value of a rule: a string, number, or list depending on the type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleValue(pub Value);

impl RuleValue {
    /// Render the value the way lesson authors wrote it
    pub fn as_text(&self) -> String {
        value_text(&self.0)
    }

    /// Elements of a list value; a scalar is treated as a one-element list
    pub fn as_list(&self) -> Vec<String> {
        match &self.0 {
            Value::Array(items) => items.iter().map(value_text).collect(),
            other => vec![value_text(other)],
        }
    }

    /// Integer reading of the value, accepting numeric strings
    pub fn as_integer(&self) -> Option<i64> {
        match &self.0 {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for RuleValue {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<i64> for RuleValue {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<Vec<&str>> for RuleValue {
    fn from(values: Vec<&str>) -> Self {
        Self(Value::Array(values.into_iter().map(Value::from).collect()))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
