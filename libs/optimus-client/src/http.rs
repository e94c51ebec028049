//! reqwest-backed implementation of [`JudgeApi`].

use std::time::Duration;

use optimus_common::config::ClientConfig;
use optimus_common::envelope::Envelope;
use optimus_common::routes;
use optimus_common::types::{
    Language, Page, RunRequest, RunResult, StatusSnapshot, Submission, SubmissionId,
    SubmissionStats, SubmissionSummary, SubmitReceipt, SubmitRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::api::JudgeApi;
use crate::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest slice of a non-JSON error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP client for the judge backend.
///
/// Holds one pooled `reqwest::Client`; cloning is cheap.
#[derive(Clone)]
pub struct HttpJudgeApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpJudgeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJudgeApi")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth_token.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpJudgeApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("optimus-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            auth_token: config.auth_token.clone(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = routes::join(&self.base_url, path);
        debug!(%url, "GET");
        self.send(self.authorize(self.client.get(url))).await
    }

    async fn post<B, T>(&self, path: &str, body: &B, request_id: Option<Uuid>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = routes::join(&self.base_url, path);
        debug!(%url, "POST");
        let mut builder = self.authorize(self.client.post(url)).json(body);
        if let Some(id) = request_id {
            builder = builder.header(REQUEST_ID_HEADER, id.to_string());
        }
        self.send(builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode_envelope(status, &body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        message: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Map an HTTP status and `{result, code, message}` body to a payload or a
/// typed error.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ApiError> {
    if status == 401 {
        return Err(ApiError::Unauthorized);
    }

    let http_ok = (200..300).contains(&status);
    let envelope: Envelope<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if http_ok => return Err(ApiError::Decode(e.to_string())),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            return Err(ApiError::Api {
                status,
                message: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
    };

    if envelope.code == 401 {
        return Err(ApiError::Unauthorized);
    }
    if !http_ok {
        return Err(ApiError::Api {
            status,
            message: envelope.message,
        });
    }
    if !envelope.is_success() {
        return Err(ApiError::Api {
            status: envelope.code,
            message: envelope.message,
        });
    }

    envelope
        .result
        .ok_or_else(|| ApiError::Decode("envelope has no result".to_string()))
}

impl JudgeApi for HttpJudgeApi {
    async fn list_languages(&self) -> Result<Vec<Language>, ApiError> {
        self.get(routes::LANGUAGES).await
    }

    async fn run(&self, request: &RunRequest, request_id: Uuid) -> Result<RunResult, ApiError> {
        self.post(routes::RUN, request, Some(request_id)).await
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReceipt, ApiError> {
        self.post(routes::SUBMISSIONS, request, None).await
    }

    async fn submission_status(&self, id: SubmissionId) -> Result<StatusSnapshot, ApiError> {
        self.get(&routes::submission_status_path(id)).await
    }

    async fn submission(&self, id: SubmissionId) -> Result<Submission, ApiError> {
        self.get(&routes::submission_path(id)).await
    }

    async fn my_submissions(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Page<SubmissionSummary>, ApiError> {
        self.get(&routes::my_submissions_path(page, limit)).await
    }

    async fn submission_stats(&self) -> Result<SubmissionStats, ApiError> {
        self.get(routes::SUBMISSION_STATS).await
    }
}
