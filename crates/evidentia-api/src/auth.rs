//! # Authentication & Authorization Middleware
//!
//! Bearer JWT middleware with capability-based access control.
//!
//! ## Token Format
//!
//! HS256 JWTs issued by the identity provider:
//!
//! ```text
//! { "sub": "<user uuid>", "email": "...", "tenant_id": "<uuid>",
//!   "role": "admin|compliance_officer|viewer", "exp": ..., "iat": ... }
//! ```
//!
//! A bad signature or expired token is 401. A valid token without a tenant
//! or role claim, or with an unknown role, is 403.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.
//!
//! ## Worker Token
//!
//! Report workers authenticate with a static token in `X-Worker-Token`,
//! compared in constant time. See [`require_worker_token`].

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use evidentia_core::{can_perform, Capability, EvidentiaError, Role};

use crate::error::{AppError, ErrorBody};

/// Header report workers authenticate with.
pub const WORKER_TOKEN_HEADER: &str = "x-worker-token";

// ── Claims ──────────────────────────────────────────────────────────────────

/// Claims carried by identity tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    /// User e-mail.
    #[serde(default)]
    pub email: String,
    /// Tenant the user belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    /// Role within the tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// User id (token subject).
    pub user_id: Uuid,
    /// User e-mail from the token.
    pub email: String,
    /// Tenant every operation is scoped to.
    pub tenant_id: Uuid,
    /// Role within the tenant.
    pub role: Role,
}

impl CallerIdentity {
    /// Whether the caller's role grants the capability.
    pub fn can(&self, capability: Capability) -> bool {
        can_perform(self.role, capability)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }
}

/// Fail with 403 unless the caller holds the capability.
pub fn require_capability(caller: &CallerIdentity, capability: Capability) -> Result<(), AppError> {
    if caller.can(capability) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %caller.user_id,
            tenant_id = %caller.tenant_id,
            role = %caller.role,
            capability = %capability,
            "capability check failed"
        );
        Err(EvidentiaError::AccessDenied {
            role: caller.role,
            capability,
        }
        .into())
    }
}

/// Fail with 403 unless the caller is an admin.
pub fn require_admin(caller: &CallerIdentity) -> Result<(), AppError> {
    if caller.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Token verification settings, injected into request extensions.
///
/// Custom `Debug` never prints the key.
#[derive(Clone)]
pub struct AuthConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("decoding_key", &"[REDACTED]")
            .field("issuer", &self.validation.iss)
            .finish()
    }
}

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// Bad signature, malformed, or expired (401).
    InvalidToken,
    /// Valid token without usable tenant or role claims (403).
    MissingClaims(String),
}

impl AuthConfig {
    /// Verify HS256 tokens with the shared secret and optional issuer.
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and resolve the caller.
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, AuthFailure> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token verification failed");
            AuthFailure::InvalidToken
        })?;
        let claims = data.claims;

        let tenant_id = claims
            .tenant_id
            .ok_or_else(|| AuthFailure::MissingClaims("token has no tenant claim".into()))?;
        let role_claim = claims
            .role
            .as_deref()
            .ok_or_else(|| AuthFailure::MissingClaims("token has no role claim".into()))?;
        let role = Role::parse(role_claim)
            .map_err(|e| AuthFailure::MissingClaims(e.to_string()))?;

        Ok(CallerIdentity {
            user_id: claims.sub,
            email: claims.email,
            tenant_id,
            role,
        })
    }
}

// ── Token Issuance ──────────────────────────────────────────────────────────

/// Mints tokens with the shared secret. Used by the CLI and tests in place
/// of the identity provider.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    issuer: Option<String>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("encoding_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenSigner {
    /// Signer for the given secret and optional issuer.
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.map(String::from),
        }
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    /// Mint a token for a tenant member, valid for `ttl`.
    pub fn mint(
        &self,
        user_id: Uuid,
        email: &str,
        tenant_id: Uuid,
        role: Role,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        self.sign(&Claims {
            sub: user_id,
            email: email.to_string(),
            tenant_id: Some(tenant_id),
            role: Some(role.as_str().to_string()),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        })
    }
}

// ── Token Comparison ────────────────────────────────────────────────────────

/// Constant-time comparison of static tokens.
///
/// When lengths differ, performs a dummy comparison so timing does not
/// reveal the length match.
pub fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Check the worker token header. Everything is refused when no token is
/// configured.
pub fn require_worker_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        tracing::warn!("worker request refused: no worker token configured");
        return Err(AppError::Unauthorized("worker authentication required".into()));
    };
    let provided = headers
        .get(WORKER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if constant_time_token_eq(provided, expected) {
        Ok(())
    } else {
        tracing::warn!("worker request refused: bad worker token");
        Err(AppError::Unauthorized("worker authentication required".into()))
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Verify the Bearer token and inject the [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<AuthConfig>().cloned() else {
        tracing::error!("auth middleware mounted without AuthConfig extension");
        return error_response(StatusCode::UNAUTHORIZED, "authentication required");
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        Some(value) if value.starts_with("Bearer ") => &value[7..],
        Some(_) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            return error_response(StatusCode::UNAUTHORIZED, "authorization header must use Bearer scheme");
        }
        None => {
            return error_response(StatusCode::UNAUTHORIZED, "authentication required");
        }
    };

    match config.verify(token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthFailure::InvalidToken) => {
            tracing::warn!("authentication failed: invalid or expired token");
            error_response(StatusCode::UNAUTHORIZED, "invalid or expired token")
        }
        Err(AuthFailure::MissingClaims(reason)) => {
            tracing::warn!(reason = %reason, "authorization failed: unusable claims");
            error_response(StatusCode::FORBIDDEN, "user not associated with an organization")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    /// Minimal router with the auth middleware and an identity echo handler.
    fn test_app(issuer: Option<&str>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move { caller.role.as_str().to_string() }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig::new(SECRET, issuer)))
    }

    fn request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn status_and_body(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn claims(tenant: Option<Uuid>, role: Option<&str>, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4(),
            email: "cco@acme-ria.com".into(),
            tenant_id: tenant,
            role: role.map(String::from),
            exp: now + exp_offset,
            iat: now,
            iss: None,
        }
    }

    #[tokio::test]
    async fn valid_token_resolves_identity() {
        let token = TokenSigner::new(SECRET, None)
            .mint(Uuid::new_v4(), "a@b.co", Uuid::new_v4(), Role::ComplianceOfficer, Duration::hours(1))
            .unwrap();
        let (status, body) = status_and_body(test_app(None), request(Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "compliance_officer");
    }

    #[tokio::test]
    async fn missing_header_is_401() {
        let (status, body) = status_and_body(test_app(None), request(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("authentication required"));
    }

    #[tokio::test]
    async fn wrong_secret_is_401() {
        let token = TokenSigner::new("other-secret", None)
            .mint(Uuid::new_v4(), "a@b.co", Uuid::new_v4(), Role::Admin, Duration::hours(1))
            .unwrap();
        let (status, body) = status_and_body(test_app(None), request(Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("invalid or expired token"));
    }

    #[tokio::test]
    async fn expired_token_is_401() {
        let token = TokenSigner::new(SECRET, None)
            .sign(&claims(Some(Uuid::new_v4()), Some("admin"), -3600))
            .unwrap();
        let (status, _) = status_and_body(test_app(None), request(Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_tenant_claim_is_403() {
        let token = TokenSigner::new(SECRET, None)
            .sign(&claims(None, Some("admin"), 3600))
            .unwrap();
        let (status, _) = status_and_body(test_app(None), request(Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_role_is_403() {
        let token = TokenSigner::new(SECRET, None)
            .sign(&claims(Some(Uuid::new_v4()), Some("owner"), 3600))
            .unwrap();
        let (status, _) = status_and_body(test_app(None), request(Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn issuer_is_enforced_when_configured() {
        let wrong = TokenSigner::new(SECRET, Some("https://other"))
            .mint(Uuid::new_v4(), "a@b.co", Uuid::new_v4(), Role::Admin, Duration::hours(1))
            .unwrap();
        let (status, _) = status_and_body(test_app(Some("https://id")), request(Some(&wrong))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let right = TokenSigner::new(SECRET, Some("https://id"))
            .mint(Uuid::new_v4(), "a@b.co", Uuid::new_v4(), Role::Admin, Duration::hours(1))
            .unwrap();
        let (status, _) = status_and_body(test_app(Some("https://id")), request(Some(&right))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn basic_scheme_is_401() {
        let req = Request::builder()
            .uri("/whoami")
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let (status, _) = status_and_body(test_app(None), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn capability_checks() {
        let viewer = CallerIdentity {
            user_id: Uuid::new_v4(),
            email: String::new(),
            tenant_id: Uuid::new_v4(),
            role: Role::Viewer,
        };
        assert!(require_capability(&viewer, Capability::ViewEvidence).is_ok());
        assert!(require_capability(&viewer, Capability::GenerateReports).is_ok());
        let err = require_capability(&viewer, Capability::ManageEvidence).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(require_admin(&viewer).is_err());
    }

    #[test]
    fn worker_token_checks() {
        let mut headers = HeaderMap::new();
        assert!(require_worker_token(&headers, Some("w-1")).is_err());
        headers.insert(WORKER_TOKEN_HEADER, HeaderValue::from_static("w-1"));
        assert!(require_worker_token(&headers, Some("w-1")).is_ok());
        assert!(require_worker_token(&headers, Some("w-2")).is_err());
        assert!(require_worker_token(&headers, None).is_err());
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_token_eq("abc", "abc"));
        assert!(!constant_time_token_eq("abc", "abd"));
        assert!(!constant_time_token_eq("ab", "abc"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let debug = format!("{:?}", AuthConfig::new("hunter2", None));
        assert!(!debug.contains("hunter2"));
        let debug = format!("{:?}", TokenSigner::new("hunter2", None));
        assert!(!debug.contains("hunter2"));
    }
}
