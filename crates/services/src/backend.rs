use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};

use storage::repository::{
    ProgressRepository, QuestionRepository, QuestionSelector, QuizResultRecord,
    QuizResultRepository, StorageError,
};
use training_core::model::{Question, SectionProgress, UserId};

/// Connection settings for the remote training API.
#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Read `TRAINING_API_URL` and optional `TRAINING_API_TOKEN`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("TRAINING_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let bearer_token = env::var("TRAINING_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self {
            base_url,
            bearer_token,
        })
    }
}

/// Remote persistence backend speaking the training API over HTTP.
///
/// Implements all three repository traits, so embedders pick it or the
/// SQLite/in-memory adapters without the services noticing. A 401 maps to
/// `StorageError::Unauthorized` so the quiz controller can raise the
/// not-signed-in warning instead of the generic save failure.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, StorageError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(status))
        }
    }
}

fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized,
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Connection(format!("unexpected status {other}")),
    }
}

#[async_trait]
impl ProgressRepository for HttpBackend {
    async fn list_progress(&self, user_id: &UserId) -> Result<Vec<SectionProgress>, StorageError> {
        let url = self.url(&format!("progress/{user_id}"));
        let response = self.send(self.client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn upsert_progress(&self, progress: &SectionProgress) -> Result<(), StorageError> {
        let url = self.url("progress");
        self.send(self.client.put(url).json(progress)).await?;
        Ok(())
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError> {
        let url = self.url(&format!("progress/{user_id}"));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for HttpBackend {
    async fn list_questions(
        &self,
        selector: &QuestionSelector,
    ) -> Result<Vec<Question>, StorageError> {
        let url = self.url("questions");
        let request = match selector {
            QuestionSelector::ByQuizType(quiz_type) => self
                .client
                .get(url)
                .query(&[("quizType", quiz_type.as_str())]),
            QuestionSelector::ByScope(scope_id) => self
                .client
                .get(url)
                .query(&[("scopeId", scope_id.value().to_string())]),
        };

        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl QuizResultRepository for HttpBackend {
    async fn save_result(&self, result: &QuizResultRecord) -> Result<(), StorageError> {
        let url = self.url("quiz-results");
        self.send(self.client.post(url).json(result)).await?;
        Ok(())
    }

    async fn list_results(&self, user_id: &UserId) -> Result<Vec<QuizResultRecord>, StorageError> {
        let url = self.url(&format!("quiz-results/{user_id}"));
        let response = self.send(self.client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}
