use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use nyaya_core::{AnalysisRecord, CaseRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ServiceError;

/// Answer shown when the post-verdict query cannot be completed.
pub const BENCH_IN_RECESS: &str =
    "The Constitutional Bench is currently in recess. Please try again later.";

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Base URL of the reviewing service, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout. Extraction and the post-verdict query run an LLM
    /// on the far side, so this is generous.
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// The two canned cases the service ships with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Violation,
    Compliant,
}

impl SampleKind {
    fn endpoint(self) -> &'static str {
        match self {
            Self::Violation => "/sample-case-violation",
            Self::Compliant => "/sample-case-compliant",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Violation => "violation",
            Self::Compliant => "compliant",
        })
    }
}

impl FromStr for SampleKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "violation" => Ok(Self::Violation),
            "compliant" => Ok(Self::Compliant),
            other => Err(format!("unknown sample case: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub llm: String,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Serialize)]
struct ParseTenderRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct AskBenchRequest<'a> {
    case_data: &'a CaseRecord,
    verdict_data: &'a AnalysisRecord,
    question: &'a str,
}

#[derive(Deserialize)]
struct AskBenchResponse {
    answer: String,
}

/// HTTP client for the reviewing service's request/response endpoints.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("nyaya/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one of the canned cases, validated.
    pub async fn sample_case(&self, kind: SampleKind) -> Result<CaseRecord, ServiceError> {
        let case: CaseRecord = self.get_json(kind.endpoint()).await?;
        case.validate()?;
        Ok(case)
    }

    /// Ask the service to extract a case from pasted tender text. The result
    /// is validated before it is returned.
    pub async fn extract_case(&self, text: &str) -> Result<CaseRecord, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyText);
        }
        let case: CaseRecord = self
            .post_json("/parse_tender", &ParseTenderRequest { text })
            .await?;
        case.validate()?;
        Ok(case)
    }

    pub async fn health(&self) -> Result<Health, ServiceError> {
        self.get_json("/health").await
    }

    /// Put one question to the bench about a finished review.
    pub async fn ask(
        &self,
        case: &CaseRecord,
        record: &AnalysisRecord,
        question: &str,
    ) -> Result<String, ServiceError> {
        let request = AskBenchRequest {
            case_data: case,
            verdict_data: record,
            question,
        };
        let response: AskBenchResponse = self.post_json("/ask_bench", &request).await?;
        Ok(response.answer)
    }

    /// Like `ask`, but any failure becomes the recess answer.
    pub async fn ask_or_recess(
        &self,
        case: &CaseRecord,
        record: &AnalysisRecord,
        question: &str,
    ) -> String {
        match self.ask(case, record, question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "post-verdict query failed");
                BENCH_IN_RECESS.to_string()
            }
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T, ServiceError> {
        debug!(endpoint, "GET");
        let response = self
            .http
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|e| ServiceError::Request {
                endpoint,
                message: e.to_string(),
            })?;
        read_json(endpoint, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!(endpoint, "POST");
        let response = self
            .http
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Request {
                endpoint,
                message: e.to_string(),
            })?;
        read_json(endpoint, response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }
    response.json().await.map_err(|e| ServiceError::Decode {
        endpoint,
        message: e.to_string(),
    })
}
