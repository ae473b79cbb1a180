//! Remote gateway - HTTP communication with the Rolo REST API
//!
//! Thin transport layer between the sync coordinator and the server:
//! - One method per (entity kind x CRUD), plus bulk tag assignment
//! - Opaque pass-through for search / export / import
//! - Bearer auth with one transparent refresh-and-retry on 401
//!
//! The gateway never touches the local cache or the queue; it only
//! classifies failures so the coordinator can decide what to do:
//! `Network` is retryable (queue it), `Rejected` is terminal for the
//! attempt, `AuthExpired` means the session is gone.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{ClientConfig, EntityKind};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level failure (connect, DNS, timeout). Retryable.
    #[error("Network error: {0}")]
    Network(String),

    /// The server received the request and said no. Not retryable;
    /// the message is surfaced to the caller verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Both the access token and the refresh token are spent.
    #[error("Session expired - login required")]
    AuthExpired,
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

/// Text formats the server imports/exports directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFormat {
    Csv,
    Vcard,
    Ics,
}

impl ExchangeFormat {
    fn as_str(&self) -> &'static str {
        match self {
            ExchangeFormat::Csv => "csv",
            ExchangeFormat::Vcard => "vcard",
            ExchangeFormat::Ics => "ics",
        }
    }
}

// ============================================================================
// Gateway trait
// ============================================================================

/// Server-side CRUD surface, one call per operation.
///
/// Works in raw JSON values: the coordinator replays queued payloads whose
/// concrete type is only known at runtime.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list(&self, kind: EntityKind) -> GatewayResult<Vec<Value>>;
    async fn fetch(&self, kind: EntityKind, id: &str) -> GatewayResult<Value>;

    /// Create a record; the response body carries the authoritative id.
    async fn create(&self, kind: EntityKind, payload: &Value) -> GatewayResult<Value>;
    async fn update(&self, kind: EntityKind, id: &str, payload: &Value) -> GatewayResult<Value>;
    async fn delete(&self, kind: EntityKind, id: &str) -> GatewayResult<()>;

    /// Add tags to several contacts in one round trip; returns the updated
    /// contact snapshots.
    async fn bulk_add_tags(&self, contact_ids: &[String], tags: &[String])
        -> GatewayResult<Vec<Value>>;

    /// Server-side search. Directly awaited, never queued.
    async fn search(&self, kind: EntityKind, query: &str) -> GatewayResult<Vec<Value>>;

    /// Raw export body (CSV/vCard/ICS). Directly awaited, never queued.
    async fn export(&self, kind: EntityKind, format: ExchangeFormat) -> GatewayResult<String>;

    /// Raw import; the server's summary comes back as opaque JSON.
    async fn import(
        &self,
        kind: EntityKind,
        format: ExchangeFormat,
        body: String,
    ) -> GatewayResult<Value>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// `RemoteGateway` over reqwest with JWT bearer auth
pub struct HttpGateway {
    client: Client,
    base_url: String,
    /// Access token (cached in memory)
    access_token: Arc<RwLock<Option<String>>>,
    /// Refresh token, exchanged once per 401 before giving up
    refresh_token: Arc<RwLock<Option<String>>>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: Arc::new(RwLock::new(None)),
            refresh_token: Arc::new(RwLock::new(None)),
        }
    }

    /// REST collection path for an entity kind
    fn resource(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Contacts => "contacts",
            EntityKind::Meetings => "meetings",
            EntityKind::Tasks => "tasks",
            EntityKind::Calendar => "calendar-events",
            EntityKind::Tags => "tags",
            EntityKind::Groups => "contact-groups",
        }
    }

    pub async fn set_tokens(&self, access: String, refresh: String) {
        *self.access_token.write().await = Some(access);
        *self.refresh_token.write().await = Some(refresh);
    }

    pub async fn clear_tokens(&self) {
        *self.access_token.write().await = None;
        *self.refresh_token.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// Register a new account; tokens are cached on success
    pub async fn register(&self, req: RegisterRequest) -> GatewayResult<AuthResponse> {
        let response = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(&req)
            .send()
            .await?;

        let auth: AuthResponse = handle_json(response).await?;
        self.set_tokens(auth.token.clone(), auth.refresh_token.clone()).await;
        Ok(auth)
    }

    /// Log in; tokens are cached on success
    pub async fn login(&self, req: LoginRequest) -> GatewayResult<AuthResponse> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&req)
            .send()
            .await?;

        let auth: AuthResponse = handle_json(response).await?;
        self.set_tokens(auth.token.clone(), auth.refresh_token.clone()).await;
        Ok(auth)
    }

    /// Exchange the refresh token for a fresh access token.
    /// A rejected exchange clears both tokens.
    pub async fn refresh(&self) -> GatewayResult<()> {
        let refresh = self.refresh_token.read().await.clone();
        let Some(refresh) = refresh else {
            return Err(GatewayError::AuthExpired);
        };

        let response = self
            .client
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&RefreshRequest { refresh_token: refresh })
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            log::warn!(
                "Token refresh rejected ({}), tearing session down",
                response.status()
            );
            self.clear_tokens().await;
            return Err(GatewayError::AuthExpired);
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        self.set_tokens(auth.token, auth.refresh_token).await;
        Ok(())
    }

    /// Send an authorized request; on 401 refresh once and retry.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, &str)]>,
        json: Option<&Value>,
        raw_body: Option<&str>,
    ) -> GatewayResult<reqwest::Response> {
        let response = self
            .dispatch(method.clone(), path, query, json, raw_body)
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        log::debug!("401 on {} {}, attempting token refresh", method, path);
        self.refresh().await?;

        let retry = self.dispatch(method, path, query, json, raw_body).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            self.clear_tokens().await;
            return Err(GatewayError::AuthExpired);
        }
        Ok(retry)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, &str)]>,
        json: Option<&Value>,
        raw_body: Option<&str>,
    ) -> GatewayResult<reqwest::Response> {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));

        if let Some(token) = self.access_token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(pairs) = query {
            builder = builder.query(pairs);
        }
        if let Some(body) = json {
            builder = builder.json(body);
        }
        if let Some(body) = raw_body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(body.to_string());
        }

        Ok(builder.send().await?)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list(&self, kind: EntityKind) -> GatewayResult<Vec<Value>> {
        let path = format!("/{}", Self::resource(kind));
        let response = self.send(Method::GET, &path, None, None, None).await?;
        handle_json(response).await
    }

    async fn fetch(&self, kind: EntityKind, id: &str) -> GatewayResult<Value> {
        let path = format!("/{}/{}", Self::resource(kind), id);
        let response = self.send(Method::GET, &path, None, None, None).await?;
        handle_json(response).await
    }

    async fn create(&self, kind: EntityKind, payload: &Value) -> GatewayResult<Value> {
        let path = format!("/{}", Self::resource(kind));
        let response = self.send(Method::POST, &path, None, Some(payload), None).await?;
        handle_json(response).await
    }

    async fn update(&self, kind: EntityKind, id: &str, payload: &Value) -> GatewayResult<Value> {
        let path = format!("/{}/{}", Self::resource(kind), id);
        let response = self.send(Method::PUT, &path, None, Some(payload), None).await?;
        handle_json(response).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> GatewayResult<()> {
        let path = format!("/{}/{}", Self::resource(kind), id);
        let response = self.send(Method::DELETE, &path, None, None, None).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(reject(response).await)
        }
    }

    async fn bulk_add_tags(
        &self,
        contact_ids: &[String],
        tags: &[String],
    ) -> GatewayResult<Vec<Value>> {
        let payload = serde_json::json!({
            "contactIds": contact_ids,
            "tags": tags,
        });
        let response = self
            .send(Method::POST, "/contacts/bulk-tags", None, Some(&payload), None)
            .await?;
        handle_json(response).await
    }

    async fn search(&self, kind: EntityKind, query: &str) -> GatewayResult<Vec<Value>> {
        let path = format!("/{}/search", Self::resource(kind));
        let response = self
            .send(Method::GET, &path, Some(&[("q", query)]), None, None)
            .await?;
        handle_json(response).await
    }

    async fn export(&self, kind: EntityKind, format: ExchangeFormat) -> GatewayResult<String> {
        let path = format!("/{}/export/{}", Self::resource(kind), format.as_str());
        let response = self.send(Method::GET, &path, None, None, None).await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(reject(response).await)
        }
    }

    async fn import(
        &self,
        kind: EntityKind,
        format: ExchangeFormat,
        body: String,
    ) -> GatewayResult<Value> {
        let path = format!("/{}/import/{}", Self::resource(kind), format.as_str());
        let response = self.send(Method::POST, &path, None, None, Some(&body)).await?;
        handle_json(response).await
    }
}

// ============================================================================
// Auth request/response types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    /// Server-shaped user record, passed through untyped
    pub user: Value,
}

// ============================================================================
// Response handling
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Parse a successful JSON response, or classify the failure
async fn handle_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> GatewayResult<T> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Network(format!("Invalid response body: {}", e)))
    } else {
        Err(reject(response).await)
    }
}

/// Build a `Rejected` error, surfacing the server's `message` verbatim
/// when the body carries one.
async fn reject(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                format!("Request failed with status {}", status)
            } else {
                text
            }
        });

    GatewayError::Rejected { status, message }
}

// ============================================================================
// Tests
// ============================================================================
