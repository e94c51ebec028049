use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type SubmissionId = u64;
pub type ProblemId = u64;

/// Runtime descriptor for a language offered by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: u64,
    #[serde(alias = "name")]
    pub display_name: String,
    pub code: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub runtime_image: String,
    #[serde(default)]
    pub compile_command: Option<String>,
    #[serde(default)]
    pub run_command: String,
    #[serde(default)]
    pub file_extension: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Body of `POST /run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub language_code: String,
    pub source_code: String,
    #[serde(rename = "input", default, skip_serializing_if = "String::is_empty")]
    pub stdin: String,
}

impl RunRequest {
    pub fn new(language_code: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            source_code: source_code.into(),
            stdin: String::new(),
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = stdin.into();
        self
    }
}

/// Outcome of an ephemeral run. Sandbox failures (compile errors, crashes)
/// arrive here with `success == false`; they are not transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default, alias = "error")]
    pub stderr: Option<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub status: String,
}

impl RunResult {
    /// A failed result produced locally, without a sandbox response.
    pub fn local_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: Some(message.into()),
            execution_time_ms: 0,
            status: "CLIENT_ERROR".to_string(),
        }
    }
}

/// Judge status of a submission.
///
/// `Pending`, `Running` and `Unknown` are non-terminal. Everything else is a
/// final verdict: once observed, the backend never moves the submission again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Accepted,
    WrongAnswer,
    TimeLimit,
    MemoryLimit,
    RuntimeError,
    CompileError,
    InternalError,
    /// A status string this client does not recognise.
    Unknown(String),
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SubmissionStatus::Pending | SubmissionStatus::Running | SubmissionStatus::Unknown(_)
        )
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionStatus::Accepted)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Running => "RUNNING",
            SubmissionStatus::Accepted => "ACCEPTED",
            SubmissionStatus::WrongAnswer => "WRONG_ANSWER",
            SubmissionStatus::TimeLimit => "TIME_LIMIT",
            SubmissionStatus::MemoryLimit => "MEMORY_LIMIT",
            SubmissionStatus::RuntimeError => "RUNTIME_ERROR",
            SubmissionStatus::CompileError => "COMPILE_ERROR",
            SubmissionStatus::InternalError => "INTERNAL_ERROR",
            SubmissionStatus::Unknown(raw) => raw,
        }
    }

    /// Message shown to the user for this status.
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Waiting in the judge queue",
            SubmissionStatus::Running => "Running against test cases",
            SubmissionStatus::Accepted => "Accepted: all test cases passed",
            SubmissionStatus::WrongAnswer => "Wrong answer on at least one test case",
            SubmissionStatus::TimeLimit => "Time limit exceeded",
            SubmissionStatus::MemoryLimit => "Memory limit exceeded",
            SubmissionStatus::RuntimeError => "Runtime error during execution",
            SubmissionStatus::CompileError => "Compilation failed",
            SubmissionStatus::InternalError => {
                "Something went wrong while judging. Please try again later"
            }
            SubmissionStatus::Unknown(_) => "Judging in progress",
        }
    }
}

impl From<String> for SubmissionStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "QUEUED" => SubmissionStatus::Pending,
            "RUNNING" | "JUDGING" => SubmissionStatus::Running,
            "ACCEPTED" => SubmissionStatus::Accepted,
            "WRONG_ANSWER" => SubmissionStatus::WrongAnswer,
            "TIME_LIMIT" | "TIME_LIMIT_EXCEEDED" => SubmissionStatus::TimeLimit,
            "MEMORY_LIMIT" | "MEMORY_LIMIT_EXCEEDED" => SubmissionStatus::MemoryLimit,
            "RUNTIME_ERROR" => SubmissionStatus::RuntimeError,
            "COMPILE_ERROR" | "COMPILATION_ERROR" => SubmissionStatus::CompileError,
            "INTERNAL_ERROR" => SubmissionStatus::InternalError,
            _ => SubmissionStatus::Unknown(raw),
        }
    }
}

impl From<SubmissionStatus> for String {
    fn from(status: SubmissionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /submissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub problem_id: ProblemId,
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub message: String,
}

/// Lightweight poll payload. Carries no source code and no per-test output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub test_cases_passed: u32,
    #[serde(default)]
    pub total_test_cases: u32,
    #[serde(default)]
    pub points_earned: u32,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub memory_used_kb: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case_id: u64,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub actual_output: Option<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub memory_used_kb: u64,
    #[serde(default)]
    pub is_sample: bool,
}

/// Full submission record as returned by `GET /submissions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub user_id: u64,
    pub problem_id: ProblemId,
    pub language: String,
    pub source_code: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub memory_used_kb: u64,
    #[serde(default)]
    pub points_earned: u32,
    #[serde(default)]
    pub test_cases_passed: u32,
    #[serde(default)]
    pub total_test_cases: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Per-test-case results in judge evaluation order.
    #[serde(default)]
    pub execution_logs: Option<Vec<TestCaseResult>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// One row of the "my submissions" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub submission_id: SubmissionId,
    pub problem_id: ProblemId,
    #[serde(default)]
    pub problem_title: Option<String>,
    pub language: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub points_earned: u32,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStats {
    pub total_submissions: u64,
    pub accepted: u64,
    #[serde(default)]
    pub acceptance_rate: f64,
    #[serde(default)]
    pub by_status: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aliases() {
        assert_eq!(SubmissionStatus::from("queued".to_string()), SubmissionStatus::Pending);
        assert_eq!(
            SubmissionStatus::from("TIME_LIMIT_EXCEEDED".to_string()),
            SubmissionStatus::TimeLimit
        );
        assert_eq!(
            SubmissionStatus::from("memory_limit".to_string()),
            SubmissionStatus::MemoryLimit
        );
    }

    #[test]
    fn test_terminal_set() {
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(!SubmissionStatus::Running.is_terminal());
        assert!(!SubmissionStatus::Unknown("REJUDGING".into()).is_terminal());
        assert!(SubmissionStatus::Accepted.is_terminal());
        assert!(SubmissionStatus::CompileError.is_terminal());
        assert!(SubmissionStatus::InternalError.is_terminal());
    }

    #[test]
    fn test_unknown_status_keeps_raw_value() {
        let status: SubmissionStatus = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(status, SubmissionStatus::Unknown("PARTIAL".into()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"PARTIAL\"");
    }

    #[test]
    fn test_internal_error_has_generic_message() {
        let message = SubmissionStatus::InternalError.user_message();
        assert!(message.contains("try again"));
    }

    #[test]
    fn test_run_request_wire_format() {
        let req = RunRequest::new("python", "print(1)");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["language_code"], "python");
        assert!(json.get("input").is_none());

        let json = serde_json::to_value(req.with_stdin("5")).unwrap();
        assert_eq!(json["input"], "5");
    }

    #[test]
    fn test_run_result_accepts_error_field() {
        let result: RunResult = serde_json::from_str(
            r#"{"success": false, "stdout": "", "error": "SyntaxError", "execution_time_ms": 3}"#,
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.stderr.as_deref(), Some("SyntaxError"));
    }

    #[test]
    fn test_submission_detail_parses_logs() {
        let json = r#"{
            "submission_id": 101, "user_id": 3, "problem_id": 7,
            "language": "cpp", "source_code": "int main(){}",
            "status": "ACCEPTED", "test_cases_passed": 1, "total_test_cases": 1,
            "execution_logs": [
                {"test_case_id": 9, "status": "ACCEPTED", "stdout": "1", "is_sample": true}
            ]
        }"#;
        let submission: Submission = serde_json::from_str(json).unwrap();
        let logs = submission.execution_logs.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].is_sample);
        assert_eq!(logs[0].memory_used_kb, 0);
    }
}
