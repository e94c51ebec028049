//! Scripted in-memory backend for tests.
//!
//! Responses are queued per endpoint and handed out in order; every request
//! is recorded so tests can assert on exactly which calls were made.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use optimus_common::types::{
    Language, Page, Pagination, RunRequest, RunResult, StatusSnapshot, Submission, SubmissionId,
    SubmissionStats, SubmissionStatus, SubmissionSummary, SubmitReceipt, SubmitRequest,
};
use uuid::Uuid;

use crate::api::JudgeApi;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListLanguages,
    Run {
        language_code: String,
        source_code: String,
    },
    Submit(SubmitRequest),
    Status(SubmissionId),
    Detail(SubmissionId),
    MySubmissions {
        page: u32,
        limit: u32,
    },
    Stats,
}

#[derive(Default)]
pub struct FakeApi {
    languages: Mutex<Vec<Language>>,
    runs: Mutex<VecDeque<(Duration, Result<RunResult, ApiError>)>>,
    submits: Mutex<VecDeque<Result<SubmitReceipt, ApiError>>>,
    statuses: Mutex<VecDeque<Result<StatusSnapshot, ApiError>>>,
    details: Mutex<HashMap<SubmissionId, Submission>>,
    my_pages: Mutex<VecDeque<Page<SubmissionSummary>>>,
    stats: Mutex<VecDeque<SubmissionStats>>,
    calls: Mutex<Vec<Call>>,
}

pub fn run_ok(stdout: &str) -> RunResult {
    RunResult {
        success: true,
        stdout: stdout.to_string(),
        stderr: None,
        execution_time_ms: 5,
        status: "SUCCESS".to_string(),
    }
}

pub fn snapshot(id: SubmissionId, status: SubmissionStatus, passed: u32, total: u32) -> StatusSnapshot {
    StatusSnapshot {
        submission_id: id,
        status,
        test_cases_passed: passed,
        total_test_cases: total,
        points_earned: passed * 10,
        execution_time_ms: 0,
        memory_used_kb: 0,
        error_message: None,
    }
}

pub fn page_of(ids: &[SubmissionId]) -> Page<SubmissionSummary> {
    Page {
        items: ids
            .iter()
            .map(|&id| SubmissionSummary {
                submission_id: id,
                problem_id: 7,
                problem_title: Some("Two Sum".to_string()),
                language: "cpp".to_string(),
                status: SubmissionStatus::Accepted,
                points_earned: 50,
                execution_time_ms: 3,
                submitted_at: None,
            })
            .collect(),
        pagination: Pagination {
            page: 1,
            limit: 20,
            total: ids.len() as u64,
            total_pages: 1,
        },
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_languages(languages: Vec<Language>) -> Self {
        let api = Self::default();
        *api.languages.lock().unwrap() = languages;
        api
    }

    pub fn push_run(&self, delay: Duration, result: Result<RunResult, ApiError>) {
        self.runs.lock().unwrap().push_back((delay, result));
    }

    pub fn push_submit(&self, result: Result<SubmitReceipt, ApiError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<StatusSnapshot, ApiError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    pub fn set_detail(&self, submission: Submission) {
        self.details
            .lock()
            .unwrap()
            .insert(submission.submission_id, submission);
    }

    pub fn push_my_page(&self, page: Page<SubmissionSummary>) {
        self.my_pages.lock().unwrap().push_back(page);
    }

    pub fn push_stats(&self, stats: SubmissionStats) {
        self.stats.lock().unwrap().push_back(stats);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn status_calls(&self, id: SubmissionId) -> usize {
        self.count(|c| *c == Call::Status(id))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Pop the next scripted response, or repeat the last one when the
    /// script has a single entry left.
    fn next_or_last<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl JudgeApi for FakeApi {
    async fn list_languages(&self) -> Result<Vec<Language>, ApiError> {
        self.record(Call::ListLanguages);
        Ok(self.languages.lock().unwrap().clone())
    }

    async fn run(&self, request: &RunRequest, _request_id: Uuid) -> Result<RunResult, ApiError> {
        self.record(Call::Run {
            language_code: request.language_code.clone(),
            source_code: request.source_code.clone(),
        });
        let scripted = self.runs.lock().unwrap().pop_front();
        let (delay, result) =
            scripted.unwrap_or_else(|| (Duration::ZERO, Err(ApiError::transport("no script"))));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReceipt, ApiError> {
        self.record(Call::Submit(request.clone()));
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::transport("no script")))
    }

    async fn submission_status(&self, id: SubmissionId) -> Result<StatusSnapshot, ApiError> {
        self.record(Call::Status(id));
        Self::next_or_last(&self.statuses)
            .unwrap_or_else(|| Ok(snapshot(id, SubmissionStatus::Pending, 0, 0)))
    }

    async fn submission(&self, id: SubmissionId) -> Result<Submission, ApiError> {
        self.record(Call::Detail(id));
        self.details
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ApiError::Api {
                status: 404,
                message: "submission not found".to_string(),
            })
    }

    async fn my_submissions(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Page<SubmissionSummary>, ApiError> {
        self.record(Call::MySubmissions { page, limit });
        Ok(Self::next_or_last(&self.my_pages).unwrap_or_else(|| page_of(&[])))
    }

    async fn submission_stats(&self) -> Result<SubmissionStats, ApiError> {
        self.record(Call::Stats);
        Ok(Self::next_or_last(&self.stats).unwrap_or(SubmissionStats {
            total_submissions: 0,
            accepted: 0,
            acceptance_rate: 0.0,
            by_status: Default::default(),
        }))
    }
}
