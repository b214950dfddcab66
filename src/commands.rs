//! Commands Module
//!
//! Operations exposed to the command line front end.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{RegisterRequest, UserProfile};
use crate::guard::{GuardDecision, Route};
use crate::{AppState, Method};

// Response types for the front end

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub has_refresh_token: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub user_id: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteResult {
    pub destination: String,
    pub title: Option<&'static str>,
    pub allowed: bool,
    pub redirect_to: Option<String>,
}

// Commands

/// Describe the stored session without revealing the tokens
pub fn get_stored_session(state: &AppState) -> SessionResponse {
    debug!("Getting stored session");
    let session = state.session.snapshot();

    SessionResponse {
        authenticated: session.is_authenticated(),
        has_refresh_token: session.refresh_token.is_some_and(|t| !t.is_empty()),
    }
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<LoginResult> {
    info!("Logging in as {}", email);

    let response = state
        .api
        .login(email, password)
        .await
        .context("Login failed")?;

    Ok(LoginResult {
        user_id: response.user.user_id,
        nickname: response.user.nickname,
    })
}

pub async fn register(
    state: &AppState,
    email: &str,
    password: &str,
    nickname: Option<&str>,
) -> Result<LoginResult> {
    let response = state
        .api
        .register(&RegisterRequest {
            email,
            password,
            nickname,
        })
        .await
        .context("Registration failed")?;

    Ok(LoginResult {
        user_id: response.user.user_id,
        nickname: response.user.nickname,
    })
}

pub async fn logout(state: &AppState) -> Result<()> {
    state.api.logout().await.context("Logout failed")
}

pub async fn refresh(state: &AppState) -> Result<SessionResponse> {
    state
        .api
        .refresh_session()
        .await
        .context("Token refresh failed")?;
    Ok(get_stored_session(state))
}

pub async fn me(state: &AppState) -> Result<UserProfile> {
    state
        .api
        .me()
        .await
        .context("Failed to load profile")
}

/// Issue a raw call through the pipeline
pub async fn call(state: &AppState, method: &str, path: &str, body: Option<&str>) -> Result<Value> {
    let method: Method = method
        .to_ascii_uppercase()
        .parse()
        .with_context(|| format!("Unknown HTTP method: {}", method))?;

    let body = match body {
        Some(raw) => Some(serde_json::from_str(raw).context("Request body is not valid JSON")?),
        None => None,
    };

    let data = state.api.pipeline().call(method, path, body).await?;
    Ok(data)
}

/// Evaluate the navigation guard for `destination`
pub fn route(state: &AppState, destination: &str) -> Result<RouteResult> {
    if destination.trim().is_empty() {
        bail!("Destination must not be empty");
    }

    let decision = state.guard.check(destination);
    let (allowed, redirect_to) = match decision {
        GuardDecision::Allow => (true, None),
        GuardDecision::RedirectTo(path) => (false, Some(path)),
    };

    Ok(RouteResult {
        destination: destination.to_string(),
        title: Route::parse(destination).map(|r| r.title()),
        allowed,
        redirect_to,
    })
}
