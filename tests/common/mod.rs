#![allow(dead_code)] // each test binary uses a different slice of these helpers

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use brandhub_api::auth::{mint_token, Claims, Role};
use brandhub_api::config::AppConfig;
use brandhub_api::content::SYSTEM_TENANT_ID;
use brandhub_api::state::AppState;
use brandhub_api::store::MemoryStore;

/// Router backed by the in-memory store; no database or network involved.
pub fn test_app() -> (Router, AppState) {
    let config = AppConfig::from_env();
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    (brandhub_api::app(state.clone()), state)
}

pub fn secret(state: &AppState) -> String {
    state.config.security.jwt_secret.clone()
}

pub fn tenant_token(state: &AppState, tenant: Uuid) -> String {
    let claims = Claims::new(
        tenant,
        Some(Uuid::new_v4()),
        vec!["content:read".to_string(), "content:write".to_string()],
        Role::Tenant,
        1,
    );
    mint_token(&secret(state), &claims).expect("mint token")
}

pub fn admin_token(state: &AppState) -> String {
    let claims = Claims::new(
        SYSTEM_TENANT_ID,
        Some(Uuid::new_v4()),
        vec!["content:read".to_string(), "content:write".to_string()],
        Role::PlatformAdmin,
        1,
    );
    mint_token(&secret(state), &claims).expect("mint token")
}

pub fn read_only_token(state: &AppState, tenant: Uuid) -> String {
    let claims = Claims::new(
        tenant,
        None,
        vec!["content:read".to_string()],
        Role::Tenant,
        1,
    );
    mint_token(&secret(state), &claims).expect("mint token")
}

/// Send one request through the router and decode the JSON response.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, value))
}
