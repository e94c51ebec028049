//! Backend seam.
//!
//! [`JudgeApi`] is the only way the client talks to the sandbox/judge
//! service. Production uses [`crate::http::HttpJudgeApi`]; tests use a
//! scripted fake. Every method is exactly one round trip and never retries.

use std::future::Future;

use optimus_common::types::{
    Language, Page, RunRequest, RunResult, StatusSnapshot, Submission, SubmissionId,
    SubmissionStats, SubmissionSummary, SubmitReceipt, SubmitRequest,
};
use uuid::Uuid;

use crate::error::ApiError;

pub trait JudgeApi: Send + Sync + 'static {
    fn list_languages(&self) -> impl Future<Output = Result<Vec<Language>, ApiError>> + Send;

    /// `request_id` correlates client logs with sandbox logs.
    fn run(
        &self,
        request: &RunRequest,
        request_id: Uuid,
    ) -> impl Future<Output = Result<RunResult, ApiError>> + Send;

    fn submit(
        &self,
        request: &SubmitRequest,
    ) -> impl Future<Output = Result<SubmitReceipt, ApiError>> + Send;

    fn submission_status(
        &self,
        id: SubmissionId,
    ) -> impl Future<Output = Result<StatusSnapshot, ApiError>> + Send;

    fn submission(
        &self,
        id: SubmissionId,
    ) -> impl Future<Output = Result<Submission, ApiError>> + Send;

    fn my_submissions(
        &self,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Page<SubmissionSummary>, ApiError>> + Send;

    fn submission_stats(&self) -> impl Future<Output = Result<SubmissionStats, ApiError>> + Send;
}
