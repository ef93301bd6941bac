use crate::evaluator::{Evaluation, EvaluationError, Evaluator};
use crate::question_source::{ApiError, SessionStarter};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiConfig {
    base_url: String,
    token: Option<SecretString>,
    timeout: Duration,
}

pub struct ApiConfigBuilder {
    config: ApiConfig,
}

impl ApiConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ApiConfig::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.config.token = Some(SecretString::from(token.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> ApiConfig {
        self.config
    }
}

impl Default for ApiConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateRequest<'a> {
    application_id: &'a str,
    question: &'a str,
    user_answer: &'a str,
}

/// Client for the interview backend: opens rehearsal sessions and scores
/// answers.
pub struct InterviewApiClient {
    client: Client,
    base: Url,
    token: Option<SecretString>,
}

impl InterviewApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientBuildError> {
        let base = Url::parse(config.base_url())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientBuildError::InvalidBaseUrl(config.base_url().to_string()))?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base,
            token: config.token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn error_message(response: reqwest::Response) -> String {
        response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "Server error.".to_string())
    }
}

#[async_trait]
impl SessionStarter for InterviewApiClient {
    async fn start_session(&self, application_id: &str) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["mock-interview", "start-session", application_id]);
        tracing::debug!("GET {}", url);

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            tracing::warn!("Session start rejected with {}: {}", status, message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<StartSessionResponse>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))?;
        Ok(body.questions)
    }
}

#[async_trait]
impl Evaluator for InterviewApiClient {
    async fn evaluate(
        &self,
        application_id: &str,
        question: &str,
        transcript: &str,
    ) -> Result<Evaluation, EvaluationError> {
        let url = self.endpoint(&["mock-interview", "evaluate-answer"]);
        tracing::debug!("POST {}", url);

        let body = EvaluateRequest {
            application_id,
            question,
            user_answer: transcript,
        };
        let response = self
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            tracing::warn!("Evaluation rejected with {}: {}", status, message);
            return Err(EvaluationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Evaluation>()
            .await
            .map_err(|e| EvaluationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn client(base_url: &str) -> InterviewApiClient {
        let config = ApiConfig::builder()
            .with_base_url(base_url)
            .with_token("secret-token")
            .build();
        InterviewApiClient::new(config).unwrap()
    }

    async fn start_handler(Path(app_id): Path<String>, headers: HeaderMap) -> impl IntoResponse {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret-token");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})));
        }
        match app_id.as_str() {
            "app-1" => (
                StatusCode::OK,
                Json(json!({"questions": ["What is closure?", "Describe a recursive algorithm."]})),
            ),
            _ => (
                StatusCode::NOT_FOUND,
                Json(json!({"message": "Application not found."})),
            ),
        }
    }

    #[tokio::test]
    async fn start_session_returns_questions_in_order() {
        let app = Router::new().route(
            "/api/mock-interview/start-session/{app_id}",
            get(start_handler),
        );
        let base = serve(app).await;

        let questions = client(&base).start_session("app-1").await.unwrap();
        assert_eq!(
            questions,
            vec!["What is closure?", "Describe a recursive algorithm."]
        );
    }

    #[tokio::test]
    async fn start_session_surfaces_server_message() {
        let app = Router::new().route(
            "/api/mock-interview/start-session/{app_id}",
            get(start_handler),
        );
        let base = serve(app).await;

        let err = client(&base).start_session("unknown").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                message: "Application not found.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn start_session_defaults_message_without_body() {
        let app = Router::new().route(
            "/api/mock-interview/start-session/{app_id}",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(app).await;

        let err = client(&base).start_session("app-1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to start interview session. Server error."
        );
    }

    #[tokio::test]
    async fn start_session_rejects_malformed_payload() {
        let app = Router::new().route(
            "/api/mock-interview/start-session/{app_id}",
            get(|| async { Json(json!({"items": []})) }),
        );
        let base = serve(app).await;

        let err = client(&base).start_session("app-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}/api", addr))
            .start_session("app-1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Network error. Failed to start session.");
    }

    #[tokio::test]
    async fn evaluate_posts_answer_and_parses_score() {
        let app = Router::new().route(
            "/api/mock-interview/evaluate-answer",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["applicationId"], "app-1");
                assert_eq!(body["question"], "What is closure?");
                assert_eq!(body["userAnswer"], "A closure captures variables.");
                Json(json!({"score": 7, "feedback": "Good, but add an example."}))
            }),
        );
        let base = serve(app).await;

        let evaluation = client(&base)
            .evaluate("app-1", "What is closure?", "A closure captures variables.")
            .await
            .unwrap();
        assert_eq!(
            evaluation,
            Evaluation {
                score: 7.0,
                feedback: "Good, but add an example.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn evaluate_maps_server_errors() {
        let app = Router::new().route(
            "/api/mock-interview/evaluate-answer",
            post(|| async { (StatusCode::BAD_GATEWAY, Json(json!({"message": "Model offline"}))) }),
        );
        let base = serve(app).await;

        let err = client(&base).evaluate("app-1", "Q", "A").await.unwrap_err();
        assert_eq!(
            err,
            EvaluationError::Rejected {
                status: 502,
                message: "Model offline".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Failed to get feedback from AI.");
    }

    #[test]
    fn endpoints_tolerate_trailing_slash_and_escape_ids() {
        let client = client("http://localhost:8080/api/");
        let url = client.endpoint(&["mock-interview", "start-session", "a b/c"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/mock-interview/start-session/a%20b%2Fc"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = ApiConfig::builder().with_base_url("not a url").build();
        assert!(matches!(
            InterviewApiClient::new(config),
            Err(ClientBuildError::InvalidBaseUrl(_))
        ));
    }
}
