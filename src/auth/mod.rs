use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod guard;

/// Scope required by every content mutation.
pub const SCOPE_CONTENT_WRITE: &str = "content:write";

/// Caller role carried in the token. Platform admins (the operator layer)
/// hold cross-tenant write authority; this is the single escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Tenant,
    PlatformAdmin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Tenant
    }
}

/// Verified, trusted data extracted from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        tenant_id: Uuid,
        actor_id: Option<Uuid>,
        scopes: Vec<String>,
        role: Role,
        expiry_hours: u64,
    ) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            tenant_id,
            actor_id,
            scopes,
            role,
            exp,
            iat: now.timestamp(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Wire shape of the token payload. `tenant_id` is optional here so a
/// well-signed token without it can be reported as invalid rather than as a
/// signature failure.
#[derive(Debug, Deserialize)]
struct TokenPayload {
    tenant_id: Option<Uuid>,
    #[serde(default)]
    actor_id: Option<Uuid>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    role: Role,
    exp: i64,
    #[serde(default)]
    iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid authentication token")]
    InvalidSignature,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("missing required scope {0}")]
    MissingScope(String),

    #[error("JWT secret not configured")]
    SecretNotConfigured,
}

/// Verify a bearer token against the shared HMAC secret and extract claims.
///
/// Pure verification: no I/O, no side effects. When `required_scope` is
/// given, a valid token without that scope fails with `MissingScope`.
pub fn verify_token(
    secret: &str,
    token: &str,
    required_scope: Option<&str>,
) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let data = decode::<TokenPayload>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            other => AuthError::InvalidToken(format!("{:?}", other)),
        }
    })?;

    let payload = data.claims;
    let tenant_id = payload
        .tenant_id
        .ok_or_else(|| AuthError::InvalidToken("missing tenant_id".to_string()))?;

    let claims = Claims {
        tenant_id,
        actor_id: payload.actor_id,
        scopes: payload.scopes,
        role: payload.role,
        exp: payload.exp,
        iat: payload.iat,
    };

    if let Some(scope) = required_scope {
        if !claims.has_scope(scope) {
            return Err(AuthError::MissingScope(scope.to_string()));
        }
    }

    Ok(claims)
}

/// Sign claims with the shared secret. The production issuer lives outside
/// this service; this mint exists for the CLI-less dev loop and the tests.
pub fn mint_token(secret: &str, claims: &Claims) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Pull the raw token out of a request. The `Authorization: Bearer` header
/// wins; `?token=` is the fallback because the external page-builder reaches
/// this API through deep links and cannot set headers.
pub fn extract_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(value) = headers.get("authorization").or_else(|| headers.get("Authorization")) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                if !token.trim().is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .filter(|t| !t.is_empty())
}

/// Per-request authentication context, produced once by the verifier and
/// passed explicitly into every service call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub claims: Claims,
}

/// Extractor for mutation handlers: verifies the bearer token and checks the
/// `content:write` scope before the handler body runs. Reads stay public and
/// simply do not declare the extractor.
#[axum::async_trait]
impl axum::extract::FromRequestParts<crate::state::AppState> for RequestContext {
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &crate::state::AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, parts.uri.query())
            .ok_or_else(|| crate::error::ApiError::unauthorized("Missing authentication token"))?;

        let claims = verify_token(
            &state.config.security.jwt_secret,
            &token,
            Some(SCOPE_CONTENT_WRITE),
        )?;

        Ok(RequestContext::new(claims))
    }
}

impl RequestContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.claims.tenant_id
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.claims.actor_id
    }

    pub fn is_platform_admin(&self) -> bool {
        self.claims.role == Role::PlatformAdmin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn tenant_claims(scopes: Vec<&str>) -> Claims {
        Claims::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            scopes.into_iter().map(String::from).collect(),
            Role::Tenant,
            1,
        )
    }

    #[test]
    fn round_trips_signed_claims() {
        let claims = tenant_claims(vec!["content:write"]);
        let token = mint_token(SECRET, &claims).unwrap();

        let verified = verify_token(SECRET, &token, None).unwrap();
        assert_eq!(verified.tenant_id, claims.tenant_id);
        assert_eq!(verified.actor_id, claims.actor_id);
        assert_eq!(verified.role, Role::Tenant);
        assert!(verified.has_scope("content:write"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint_token(SECRET, &tenant_claims(vec![])).unwrap();
        let err = verify_token("other-secret", &token, None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn rejects_expired_token() {
        let mut claims = tenant_claims(vec![]);
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();
        claims.iat = (Utc::now() - Duration::hours(3)).timestamp();
        let token = mint_token(SECRET, &claims).unwrap();

        let err = verify_token(SECRET, &token, None).unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn enforces_required_scope() {
        let token = mint_token(SECRET, &tenant_claims(vec!["content:read"])).unwrap();

        assert!(verify_token(SECRET, &token, Some("content:read")).is_ok());
        let err = verify_token(SECRET, &token, Some(SCOPE_CONTENT_WRITE)).unwrap_err();
        assert!(matches!(err, AuthError::MissingScope(_)));
    }

    #[test]
    fn rejects_token_without_tenant_id() {
        // Hand-rolled payload missing tenant_id but otherwise well-formed
        let payload = serde_json::json!({
            "scopes": ["content:write"],
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        });
        let token = encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = verify_token(SECRET, &token, None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn extracts_token_from_header_before_query() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer from-header".parse().unwrap());

        let token = extract_token(&headers, Some("token=from-query"));
        assert_eq!(token.as_deref(), Some("from-header"));
    }

    #[test]
    fn falls_back_to_query_parameter() {
        let headers = HeaderMap::new();
        let token = extract_token(&headers, Some("foo=1&token=abc123"));
        assert_eq!(token.as_deref(), Some("abc123"));

        assert!(extract_token(&headers, Some("foo=1")).is_none());
        assert!(extract_token(&headers, None).is_none());
    }
}
