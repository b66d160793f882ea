//! REST client for the challenger backend.
//!
//! Endpoints:
//! - `GET  /catalog`
//! - `GET  /users/{id}/completions`
//! - `GET  /users/{id}/favorites`
//! - `POST /grade`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use challenger_core::model::{AssessmentDefinition, CompletionRecord};
use challenger_core::traits::{CatalogSource, GradeRequest, GradeResponse, Grader, HistorySource};

use crate::config::BackendConfig;
use crate::error::BackendError;

/// HTTP implementation of the catalog, history, and grading collaborators.
pub struct HttpBackend {
    base_url: Url,
    api_token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CatalogResponse {
    assessments: Vec<AssessmentDefinition>,
}

#[derive(Deserialize)]
struct CompletionsResponse {
    completions: Vec<CompletionRecord>,
}

#[derive(Deserialize)]
struct FavoritesResponse {
    assessment_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| BackendError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl {
                url: config.base_url.clone(),
                reason: "URL cannot be a base".into(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        Ok(Self {
            base_url,
            api_token: config.api_token.clone(),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    /// Base URL joined with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let path = url.path().to_string();
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_secs)
            } else {
                BackendError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(BackendError::RateLimited {
                retry_after_ms: retry_after,
            }
            .into());
        }
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::AuthenticationFailed(body).into());
        }
        if status == 404 {
            return Err(BackendError::NotFound(path).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(BackendError::ApiError { status, message }.into());
        }

        let parsed = response.json::<T>().await.map_err(|e| BackendError::ApiError {
            status,
            message: format!("failed to parse response: {e}"),
        })?;
        Ok(parsed)
    }
}

#[async_trait]
impl CatalogSource for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_catalog(&self) -> anyhow::Result<Vec<AssessmentDefinition>> {
        let url = self.endpoint(&["catalog"]);
        let response: CatalogResponse = self.send::<(), _>(Method::GET, url, None).await?;
        tracing::debug!(count = response.assessments.len(), "fetched catalog");
        Ok(response.assessments)
    }
}

#[async_trait]
impl HistorySource for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_completion_history(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Vec<CompletionRecord>> {
        let url = self.endpoint(&["users", user_id, "completions"]);
        let response: CompletionsResponse = self.send::<(), _>(Method::GET, url, None).await?;
        Ok(response.completions)
    }

    #[instrument(skip(self))]
    async fn fetch_favorites(&self, user_id: &str) -> anyhow::Result<Vec<String>> {
        let url = self.endpoint(&["users", user_id, "favorites"]);
        let response: FavoritesResponse = self.send::<(), _>(Method::GET, url, None).await?;
        Ok(response.assessment_ids)
    }
}

#[async_trait]
impl Grader for HttpBackend {
    #[instrument(skip(self, request), fields(session_id = %request.session_id, assessment_id = %request.assessment_id))]
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse> {
        let url = self.endpoint(&["grade"]);
        self.send(Method::POST, url, Some(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenger_core::model::Answer;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, token: Option<&str>) -> HttpBackend {
        HttpBackend::new(&BackendConfig {
            base_url: server.uri(),
            api_token: token.map(String::from),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_catalog_with_bearer_token() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "assessments": [{
                "id": "react-hooks",
                "category": "frontend",
                "skills": ["React", "JS"],
                "difficulty": "intermediate",
                "time_limit_secs": 900,
                "passing_score": 70,
                "popularity": 1500,
                "created_at": "2026-09-20T08:00:00Z",
                "question_count": 12
            }]
        });

        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let catalog = backend(&server, Some("secret")).fetch_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id, "react-hooks");
        assert!(catalog[0].skills.contains("React"));
    }

    #[tokio::test]
    async fn user_ids_are_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ada%20l/favorites"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"assessment_ids": ["sql-1"]})),
            )
            .mount(&server)
            .await;

        let favorites = backend(&server, None).fetch_favorites("ada l").await.unwrap();
        assert_eq!(favorites, vec!["sql-1"]);
    }

    #[tokio::test]
    async fn fetches_completion_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u1/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "completions": [{
                    "assessment_id": "sql-1",
                    "score": 88,
                    "attempt_number": 2,
                    "completed_at": "2026-09-01T10:00:00Z"
                }]
            })))
            .mount(&server)
            .await;

        let history = backend(&server, None)
            .fetch_completion_history("u1")
            .await
            .unwrap();
        assert_eq!(history[0].score, 88);
        assert_eq!(history[0].attempt_number, 2);
    }

    #[tokio::test]
    async fn grade_posts_answers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/grade"))
            .and(body_partial_json(serde_json::json!({
                "assessment_id": "sql-1",
                "time_spent_secs": 42
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 91,
                "breakdown": {"joins": 50, "indexes": 41}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GradeRequest {
            session_id: Uuid::new_v4(),
            assessment_id: "sql-1".into(),
            answers: vec![Answer::Answered("b".into()), Answer::Unanswered],
            time_spent_secs: 42,
        };
        let response = backend(&server, None).grade(&request).await.unwrap();
        assert_eq!(response.score, 91);
        assert_eq!(response.breakdown["joins"], 50);
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = backend(&server, Some("bad")).fetch_catalog().await.unwrap_err();
        let backend_err = err.downcast_ref::<BackendError>().unwrap();
        assert!(backend_err.is_permanent());
        assert!(err.to_string().contains("authentication"));
    }

    #[tokio::test]
    async fn server_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/grade"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"message": "grader overloaded"}
            })))
            .mount(&server)
            .await;

        let request = GradeRequest {
            session_id: Uuid::nil(),
            assessment_id: "x".into(),
            answers: vec![],
            time_spent_secs: 1,
        };
        let err = backend(&server, None).grade(&request).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("grader overloaded"));
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let err = backend(&server, None).fetch_catalog().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::RateLimited {
                retry_after_ms: 3000
            })
        ));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HttpBackend::new(&BackendConfig {
            base_url: "not a url".into(),
            api_token: None,
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(BackendError::InvalidUrl { .. })));
    }
}
