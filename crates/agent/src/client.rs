//! HTTP client for the study API

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{multipart, Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;

use loominary_core::{ChatMessage, CourseAnalysis, TurnRequest, TurnResult, User};

use crate::chat::ChatBackend;
use crate::voice_loop::TurnClient;
use crate::AgentError;

/// Body of every error response
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    user: User,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Issued session
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
    content: &'a str,
}

/// Client for `/api/*`
///
/// No request timeout is set: a quiz turn takes as long as the model needs.
pub struct StudyClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl StudyClient {
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::Config(format!("Invalid server URL {}: {}", base_url, e)))?;
        let http = Client::builder()
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Use an existing session token
    pub fn with_token(self, token: impl Into<String>) -> Self {
        *self.token.write() = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AgentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AgentError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, AgentError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(AgentError::from)
    }

    /// Upload files for analysis
    pub async fn analyze<P: AsRef<Path>>(&self, paths: &[P]) -> Result<CourseAnalysis, AgentError> {
        let mut form = multipart::Form::new();

        for path in paths {
            let path = path.as_ref();
            let bytes = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let part = multipart::Part::bytes(bytes)
                .file_name(name.clone())
                .mime_str(content_type_for(&name))?;
            form = form.part("files", part);
        }

        tracing::info!(files = paths.len(), "Uploading notes for analysis");

        let response = self
            .authorized(self.http.post(self.url(&["api", "analyze"])?))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn quiz(&self, request: &TurnRequest) -> Result<TurnResult, AgentError> {
        let response = self
            .authorized(self.http.post(self.url(&["api", "quiz"])?))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AgentError> {
        let response = self
            .http
            .post(self.url(&["api", "register"])?)
            .json(&RegisterRequest {
                name,
                email,
                password,
            })
            .send()
            .await?;
        let body: RegisterResponse = Self::decode(response).await?;
        Ok(body.user)
    }

    /// Log in and keep the token for later requests
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AgentError> {
        let response = self
            .http
            .post(self.url(&["api", "login"])?)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let session: LoginResponse = Self::decode(response).await?;
        *self.token.write() = Some(session.token.clone());
        Ok(session)
    }

    pub async fn messages(&self, course_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        let response = self
            .authorized(self.http.get(self.url(&["api", "messages", course_id])?))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn send_message(&self, course_id: &str, content: &str) -> Result<ChatMessage, AgentError> {
        let response = self
            .authorized(self.http.post(self.url(&["api", "messages", course_id])?))
            .json(&NewMessage { content })
            .send()
            .await?;
        Self::decode(response).await
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    if file_name.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "text/plain"
    }
}

#[async_trait]
impl TurnClient for StudyClient {
    async fn submit_turn(&self, request: &TurnRequest) -> Result<TurnResult, AgentError> {
        self.quiz(request).await
    }
}

#[async_trait]
impl ChatBackend for StudyClient {
    async fn fetch_messages(&self, course_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        self.messages(course_id).await
    }

    async fn post_message(&self, course_id: &str, content: &str) -> Result<ChatMessage, AgentError> {
        self.send_message(course_id, content).await
    }
}
