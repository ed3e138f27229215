//! HttpBackend - REST implementation of the backend port traits.
//!
//! Base URL and bearer token come from the [`ClientConfig`] passed at
//! construction, so several isolated clients can coexist in one process.

use crate::dto::{
    BlobResponse, ChatRequest, ErrorResponse, MessageResponse, ProjectResponse, QueueTasksRequest,
    SessionResponse, UpdateContentRequest,
};
use async_trait::async_trait;
use foundry_core::backend::{BlobApi, ChatApi, ProjectApi, SessionApi};
use foundry_core::config::ClientConfig;
use foundry_core::error::{FoundryError, Result};
use foundry_core::session::{Blob, ChatMessage, NewBlob, Project, Session};
use reqwest::header::IF_MATCH;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Backend client talking to the REST API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Creates a client from a validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url().to_string(),
            token: config.token.clone().filter(|token| !token.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!("[HttpBackend] {} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and converts non-success statuses into errors.
    async fn send(&self, builder: RequestBuilder, entity_type: &'static str, id: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|err| {
            FoundryError::transport(format!("{entity_type} request failed: {err}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        Err(map_http_error(status, body, entity_type, id))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        entity_type: &'static str,
        id: &str,
    ) -> Result<T> {
        let response = self.send(builder, entity_type, id).await?;
        response.json::<T>().await.map_err(|err| FoundryError::Serialization {
            format: "JSON".to_string(),
            message: format!("failed to parse {entity_type} response: {err}"),
        })
    }
}

fn map_http_error(status: StatusCode, body: String, entity_type: &'static str, id: &str) -> FoundryError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(ErrorResponse::into_message)
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FoundryError::Unauthorized(message),
        StatusCode::NOT_FOUND => FoundryError::not_found(entity_type, id),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            FoundryError::conflict(format!("{entity_type} '{id}' changed on the server: {message}"))
        }
        _ => FoundryError::api(status.as_u16(), message),
    }
}

/// Wraps a version token in the quoted entity-tag form `If-Match` expects.
fn entity_tag(version: &str) -> String {
    let version = version.trim();
    if version.len() >= 2 && version.starts_with('"') && version.ends_with('"') {
        version.to_string()
    } else {
        format!("\"{}\"", version.replace('"', ""))
    }
}

fn guess_content_type(blob: &NewBlob) -> String {
    if blob.content_type.trim().is_empty() {
        mime_guess::from_path(&blob.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        blob.content_type.clone()
    }
}

#[async_trait]
impl SessionApi for HttpBackend {
    async fn get_session(&self, session_id: &str) -> Result<Session> {
        let builder = self.request(Method::GET, &format!("sessions/{session_id}"));
        let dto: SessionResponse = self.send_json(builder, "Session", session_id).await?;
        Ok(dto.into())
    }

    async fn list_sessions(&self, project_id: &str) -> Result<Vec<Session>> {
        let builder = self
            .request(Method::GET, "sessions")
            .query(&[("project_id", project_id)]);
        let dtos: Vec<SessionResponse> = self.send_json(builder, "Project", project_id).await?;
        Ok(dtos.into_iter().map(Session::from).collect())
    }

    async fn queue_tasks(&self, session_id: &str, tasks: &[String]) -> Result<()> {
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/queue"))
            .json(&QueueTasksRequest { tasks });
        self.send(builder, "Session", session_id).await?;
        Ok(())
    }

    async fn update_content(
        &self,
        session_id: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<Session> {
        let mut builder = self
            .request(Method::PUT, &format!("sessions/{session_id}"))
            .json(&UpdateContentRequest { content });
        if let Some(version) = expected_version {
            builder = builder.header(IF_MATCH, entity_tag(version));
        }
        let dto: SessionResponse = self.send_json(builder, "Session", session_id).await?;
        Ok(dto.into())
    }

    async fn cancel(&self, session_id: &str) -> Result<()> {
        let builder = self.request(Method::POST, &format!("sessions/{session_id}/cancel"));
        self.send(builder, "Session", session_id).await?;
        Ok(())
    }

    async fn retry(&self, session_id: &str) -> Result<()> {
        let builder = self.request(Method::POST, &format!("sessions/{session_id}/retry"));
        self.send(builder, "Session", session_id).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobApi for HttpBackend {
    async fn list_blobs(&self, session_id: &str) -> Result<Vec<Blob>> {
        let builder = self.request(Method::GET, &format!("sessions/{session_id}/blobs"));
        let dtos: Vec<BlobResponse> = self.send_json(builder, "Session", session_id).await?;
        Ok(dtos.into_iter().map(|dto| dto.into_blob(session_id)).collect())
    }

    async fn upload_blob(&self, session_id: &str, blob: NewBlob) -> Result<Blob> {
        let content_type = guess_content_type(&blob);
        let size = blob.bytes.len();
        let part = Part::bytes(blob.bytes)
            .file_name(blob.file_name.clone())
            .mime_str(&content_type)?;
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/blobs"))
            .multipart(Form::new().part("file", part));

        tracing::debug!(
            "[HttpBackend] uploading '{}' ({} bytes, {})",
            blob.file_name,
            size,
            content_type
        );
        let dto: BlobResponse = self.send_json(builder, "Session", session_id).await?;
        Ok(dto.into_blob(session_id))
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("blobs/{blob_id}"));
        self.send(builder, "Blob", blob_id).await?;
        Ok(())
    }

    async fn download_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        let builder = self.request(Method::GET, &format!("blobs/{blob_id}/download"));
        let response = self.send(builder, "Blob", blob_id).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ChatApi for HttpBackend {
    async fn send_message(&self, session_id: &str, message: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/chat"))
            .json(&ChatRequest { message });
        self.send(builder, "Session", session_id).await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let builder = self.request(Method::GET, &format!("sessions/{session_id}/messages"));
        let dtos: Vec<MessageResponse> = self.send_json(builder, "Session", session_id).await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_message(session_id))
            .collect())
    }

    async fn clear_messages(&self, session_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("sessions/{session_id}/messages"));
        self.send(builder, "Session", session_id).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectApi for HttpBackend {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let builder = self.request(Method::GET, "projects");
        let dtos: Vec<ProjectResponse> = self.send_json(builder, "Project", "*").await?;
        Ok(dtos.into_iter().map(Project::from).collect())
    }
}
