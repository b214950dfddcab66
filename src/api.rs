//! API Client Module
//!
//! Typed wrappers over the request pipeline for each backend endpoint. The
//! auth endpoints also keep the session store in step with the server.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::auth::SessionStore;
use crate::error::{ApiError, NormalizedResult};
use crate::pipeline::RequestPipeline;

pub const FIRST_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;
pub const DEFAULT_OPTION_LISTS: &[&str] = &["tournaments", "teams"];
pub const METRICS_LIMIT: u32 = 50;

/// API client for the stats backend
#[derive(Clone)]
pub struct ApiClient {
    pipeline: RequestPipeline,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(pipeline: RequestPipeline, session: Arc<SessionStore>) -> Self {
        Self { pipeline, session }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Create an account and start a session with it
    pub async fn register(&self, request: &RegisterRequest<'_>) -> NormalizedResult<AuthResponse> {
        let response: AuthResponse = self.pipeline.post("auth/register", request).await?;
        self.store_tokens(&response.tokens)?;
        info!("Registered user: {}", response.user.user_id);
        Ok(response)
    }

    /// Log in and persist the issued token pair
    pub async fn login(&self, email: &str, password: &str) -> NormalizedResult<AuthResponse> {
        let response: AuthResponse = self
            .pipeline
            .post("auth/login", &LoginRequest { email, password })
            .await?;
        self.store_tokens(&response.tokens)?;
        info!("Logged in as user: {}", response.user.user_id);
        Ok(response)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> NormalizedResult<RefreshedTokens> {
        let tokens: RefreshedTokens = self
            .pipeline
            .post("auth/refresh", &RefreshTokenRequest { refresh_token })
            .await?;

        let rotated = tokens
            .refresh_token
            .as_deref()
            .filter(|r| !r.is_empty() && *r != refresh_token);
        let stored = match rotated {
            Some(refresh) => self.session.set_session(&tokens.access_token, refresh),
            None => self.session.set_access_token(&tokens.access_token),
        };
        stored.map_err(storage_failure)?;

        info!("Access token refreshed");
        Ok(tokens)
    }

    /// Refresh using the stored refresh token
    pub async fn refresh_session(&self) -> NormalizedResult<RefreshedTokens> {
        let Some(refresh_token) = self.session.refresh_token().filter(|t| !t.is_empty()) else {
            return Err(ApiError::auth_expired("No refresh token stored"));
        };
        self.refresh(&refresh_token).await
    }

    /// Revoke the refresh token on the server and clear the local session.
    /// The local session is cleared even when the server call fails.
    pub async fn logout(&self) -> NormalizedResult<()> {
        info!("Logging out");

        let result = match self.session.refresh_token() {
            Some(refresh_token) => self
                .pipeline
                .post::<_, Value>(
                    "auth/logout",
                    &RefreshTokenRequest {
                        refresh_token: &refresh_token,
                    },
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        };

        if let Err(e) = &result {
            warn!("Server logout failed: {}", e);
        }

        if let Err(e) = self.session.clear_session() {
            error!("Failed to clear session: {}", e);
            return Err(storage_failure(e));
        }

        result
    }

    /// Profile of the logged-in user
    pub async fn me(&self) -> NormalizedResult<UserProfile> {
        self.pipeline.get("users/me").await
    }

    pub async fn create_chat_session(&self, title: Option<&str>) -> NormalizedResult<Value> {
        self.pipeline
            .post("chat/sessions", &json!({ "title": title }))
            .await
    }

    pub async fn list_chat_sessions(
        &self,
        request: &ChatSessionListRequest,
    ) -> NormalizedResult<Value> {
        self.pipeline.post("chat/sessions/list", request).await
    }

    /// Messages of a chat session; unset paging reads the first 50
    pub async fn chat_history(
        &self,
        session_id: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> NormalizedResult<Value> {
        self.pipeline
            .post(
                "chat/history",
                &json!({
                    "sessionId": session_id,
                    "page": page.unwrap_or(FIRST_PAGE),
                    "pageSize": page_size.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE),
                }),
            )
            .await
    }

    /// Filter options for dropdowns. `need` names the option lists wanted and
    /// defaults to tournaments and teams.
    pub async fn data_options(
        &self,
        scope: Option<Value>,
        need: Option<&[&str]>,
    ) -> NormalizedResult<Value> {
        let scope = scope.unwrap_or_else(|| json!({}));
        let need = need.unwrap_or(DEFAULT_OPTION_LISTS);
        self.pipeline
            .post("data/options", &json!({ "scope": scope, "need": need }))
            .await
    }

    /// Match list, newest first
    pub async fn search_matches(
        &self,
        filter: Value,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> NormalizedResult<Value> {
        self.pipeline
            .post(
                "matches/search",
                &json!({
                    "page": page.unwrap_or(FIRST_PAGE),
                    "pageSize": page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                    "filter": filter,
                    "sort": { "field": "matchDate", "order": "desc" },
                }),
            )
            .await
    }

    /// Match with its games and per-player stats
    pub async fn match_detail(&self, match_id: i64) -> NormalizedResult<Value> {
        self.pipeline
            .post("matches/detail", &json!({ "matchId": match_id }))
            .await
    }

    pub async fn search_players(
        &self,
        query: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> NormalizedResult<Value> {
        self.pipeline
            .post(
                "players/search",
                &json!({
                    "q": query,
                    "page": page.unwrap_or(FIRST_PAGE),
                    "pageSize": page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                }),
            )
            .await
    }

    pub async fn query_metrics(
        &self,
        metric: &str,
        filter: Value,
        group_by: &[&str],
    ) -> NormalizedResult<Value> {
        self.pipeline
            .post(
                "metrics/query",
                &json!({
                    "metric": metric,
                    "filter": filter,
                    "groupBy": group_by,
                    "limit": METRICS_LIMIT,
                }),
            )
            .await
    }

    fn store_tokens(&self, tokens: &TokenPair) -> NormalizedResult<()> {
        self.session
            .set_session(&tokens.access_token, &tokens.refresh_token)
            .map_err(storage_failure)
    }
}

fn storage_failure(e: crate::storage::StorageError) -> ApiError {
    error!("Failed to persist session: {}", e);
    ApiError::application(Some("STORAGE".to_string()), e.to_string())
}

// Request/Response types

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionListRequest {
    pub page: u32,
    pub page_size: u32,
    /// `active`, `archived` or `deleted`; unset lists all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl ChatSessionListRequest {
    pub fn first_page() -> Self {
        Self {
            page: FIRST_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            ..Self::default()
        }
    }
}

/// Token pair issued on login and register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Tokens returned by a refresh; the refresh token is only present when rotated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub tokens: TokenPair,
}
