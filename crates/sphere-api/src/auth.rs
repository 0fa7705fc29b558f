//! # Authentication & Sessions
//!
//! Bearer token middleware producing an explicit [`Session`] for every
//! request. Handlers never consult ambient "current user" state; they take
//! a `Session` argument and check ownership against it.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {kind}:{account_id}:{secret}   kind = user | organization | admin
//! Bearer {secret}                       admin
//! ```
//!
//! Tokens are issued by the operator. There is no login endpoint; a token
//! stops working when the operator rotates the secret.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sphere_core::{OrganizationId, UserId};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Session ─────────────────────────────────────────────────────────────────

/// Who is calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// A credential holder. May upload and pay for their own documents.
    User,
    /// An issuing organization. May review its own inbox.
    Organization,
    /// Operator access to every resource.
    Admin,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organization => "organization",
            Self::Admin => "admin",
        }
    }
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub kind: SessionKind,
    /// The account the token is bound to. `None` for admin sessions.
    pub account_id: Option<Uuid>,
}

impl Session {
    /// Session with operator access.
    pub fn admin() -> Self {
        Self {
            kind: SessionKind::Admin,
            account_id: None,
        }
    }

    pub fn user(id: UserId) -> Self {
        Self {
            kind: SessionKind::User,
            account_id: Some(*id.as_uuid()),
        }
    }

    pub fn organization(id: OrganizationId) -> Self {
        Self {
            kind: SessionKind::Organization,
            account_id: Some(*id.as_uuid()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.kind == SessionKind::Admin
    }

    /// Actor string recorded in the audit trail.
    pub fn actor(&self) -> String {
        match self.account_id {
            Some(id) => format!("{}:{id}", self.kind.as_str()),
            None => self.kind.as_str().to_string(),
        }
    }

    /// Allow admins and the user themselves.
    pub fn require_user(&self, user: &UserId) -> Result<(), AppError> {
        self.require_account(SessionKind::User, user.as_uuid())
    }

    /// Allow admins and the organization itself.
    pub fn require_organization(&self, org: &OrganizationId) -> Result<(), AppError> {
        self.require_account(SessionKind::Organization, org.as_uuid())
    }

    /// Allow admins only.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "admin session required, caller is '{}'",
                self.kind.as_str()
            )))
        }
    }

    /// Allow admins and any account whose id matches, whatever its kind.
    pub fn require_self(&self, account: &Uuid) -> Result<(), AppError> {
        if self.is_admin() || self.account_id.as_ref() == Some(account) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "session '{}' may not act on account {account}",
                self.actor()
            )))
        }
    }

    fn require_account(&self, kind: SessionKind, id: &Uuid) -> Result<(), AppError> {
        if self.is_admin() || (self.kind == kind && self.account_id.as_ref() == Some(id)) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "session '{}' may not act for {} {id}",
                self.actor(),
                kind.as_str()
            )))
        }
    }
}

/// Extracts the session the auth middleware injected into extensions.
/// Returns 401 if none is present (middleware didn't run or failed).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no session in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, performs a dummy comparison so timing does not
/// depend on where the mismatch is.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{kind}:{account_id}:{secret}` or a bare `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<Session, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.len() {
        1 => {
            if constant_time_token_eq(provided, expected_secret) {
                Ok(Session::admin())
            } else {
                Err("invalid bearer token".into())
            }
        }
        3 => {
            let (kind_str, account_str, secret) = (parts[0], parts[1], parts[2]);

            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }

            let kind = match kind_str {
                "user" => SessionKind::User,
                "organization" => SessionKind::Organization,
                "admin" => SessionKind::Admin,
                other => return Err(format!("unknown session kind: {other}")),
            };

            let account_id = if account_str.is_empty() {
                None
            } else {
                Some(
                    account_str
                        .parse::<Uuid>()
                        .map_err(|e| format!("invalid account_id: {e}"))?,
                )
            };

            if kind != SessionKind::Admin && account_id.is_none() {
                return Err(format!("{} tokens must name an account", kind.as_str()));
            }

            Ok(Session { kind, account_id })
        }
        _ => Err("invalid token format, expected {kind}:{account_id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the resulting [`Session`].
///
/// When `AuthConfig.token` is `None`, every request runs as an admin session.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    let provided = &header_value[7..];
                    match parse_bearer_token(provided, expected) {
                        Ok(session) => {
                            request.extensions_mut().insert(session);
                            next.run(request).await
                        }
                        Err(msg) => {
                            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                            unauthorized_response(&msg)
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request.extensions_mut().insert(Session::admin());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(session: Session) -> String {
        session.actor()
    }

    fn test_app(token: Option<String>) -> Router {
        let auth_config = AuthConfig { token };
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, header_value: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(v) = header_value {
            builder = builder.header("authorization", v);
        }
        let resp = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    // ── Middleware ────────────────────────────────────────────────

    #[tokio::test]
    async fn auth_disabled_runs_as_admin() {
        let (status, body) = call(test_app(None), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[tokio::test]
    async fn bare_secret_is_admin() {
        let (status, body) = call(test_app(Some("s3cret".into())), Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[tokio::test]
    async fn user_token_binds_account() {
        let id = Uuid::new_v4();
        let header = format!("Bearer user:{id}:s3cret");
        let (status, body) = call(test_app(Some("s3cret".into())), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("user:{id}"));
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let id = Uuid::new_v4();
        let header = format!("Bearer user:{id}:nope");
        let (status, body) = call(test_app(Some("s3cret".into())), Some(&header)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("UNAUTHORIZED"));
    }

    #[tokio::test]
    async fn missing_header_rejected() {
        let (status, _) = call(test_app(Some("s3cret".into())), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_scheme_rejected() {
        let (status, body) = call(test_app(Some("s3cret".into())), Some("Basic czNjcmV0")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer"));
    }

    // ── Token parsing ────────────────────────────────────────────

    #[test]
    fn unknown_kind_rejected() {
        let err = parse_bearer_token(&format!("zone_admin:{}:s", Uuid::new_v4()), "s").unwrap_err();
        assert!(err.contains("unknown session kind"));
    }

    #[test]
    fn user_token_without_account_rejected() {
        assert!(parse_bearer_token("user::s", "s").is_err());
    }

    #[test]
    fn admin_token_may_omit_account() {
        let session = parse_bearer_token("admin::s", "s").unwrap();
        assert!(session.is_admin());
        assert!(session.account_id.is_none());
    }

    #[test]
    fn malformed_account_id_rejected() {
        let err = parse_bearer_token("organization:not-a-uuid:s", "s").unwrap_err();
        assert!(err.contains("invalid account_id"));
    }

    #[test]
    fn two_part_token_rejected() {
        assert!(parse_bearer_token("user:s", "s").is_err());
    }

    // ── Ownership checks ─────────────────────────────────────────

    #[test]
    fn user_session_only_acts_for_itself() {
        let me = UserId::new();
        let session = Session::user(me);
        assert!(session.require_user(&me).is_ok());
        assert!(matches!(
            session.require_user(&UserId::new()),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn organization_session_cannot_act_as_user_with_same_id() {
        let id = Uuid::new_v4();
        let session = Session {
            kind: SessionKind::Organization,
            account_id: Some(id),
        };
        assert!(session.require_user(&UserId::from_uuid(id)).is_err());
        assert!(session
            .require_organization(&OrganizationId::from_uuid(id))
            .is_ok());
    }

    #[test]
    fn admin_passes_every_check() {
        let session = Session::admin();
        assert!(session.require_user(&UserId::new()).is_ok());
        assert!(session.require_organization(&OrganizationId::new()).is_ok());
        assert!(session.require_admin().is_ok());
        assert!(session.require_self(&Uuid::new_v4()).is_ok());
    }

    #[test]
    fn non_admin_fails_admin_check() {
        let session = Session::user(UserId::new());
        assert!(matches!(session.require_admin(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn auth_config_debug_redacts_token() {
        let cfg = AuthConfig {
            token: Some("hunter2".into()),
        };
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn tokens_without_the_secret_never_authenticate(raw in "\\PC{0,80}") {
                prop_assume!(!raw.contains("s3cret-value"));
                prop_assert!(parse_bearer_token(&raw, "s3cret-value").is_err());
            }

            #[test]
            fn scoped_tokens_round_trip(id in any::<u128>(), org in any::<bool>()) {
                let id = Uuid::from_u128(id);
                let kind = if org { "organization" } else { "user" };
                let session = parse_bearer_token(&format!("{kind}:{id}:s3cret-value"), "s3cret-value").unwrap();
                prop_assert_eq!(session.account_id, Some(id));
                prop_assert!(!session.is_admin());
            }
        }
    }
}
