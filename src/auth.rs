use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    gateway::token_from_cookies,
    models::Role,
    token::{Identity, TokenCodec},
};

/// Reads the raw token from the session cookie, falling back to an
/// `Authorization: Bearer` header for programmatic clients.
fn raw_token(parts: &Parts) -> Option<String> {
    token_from_cookies(&parts.headers).or_else(|| {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

fn verified_identity(parts: &Parts, codec: &TokenCodec) -> Result<Identity, AppError> {
    let token = raw_token(parts).ok_or_else(AppError::unauthorized)?;
    let identity = codec.verify(&token).map_err(|e| {
        tracing::warn!(error = %e, uri = %parts.uri, "rejected api token");
        AppError::from(e)
    })?;
    if identity.is_blocked {
        tracing::warn!(account_id = %identity.account_id, uri = %parts.uri, "blocked account token refused");
        return Err(AppError::Authorization("account is blocked".to_string()));
    }
    Ok(identity)
}

/// AuthUser
///
/// Extractor for API routes that need any signed-in caller. Rejects with a 401 JSON body
/// when the token is missing, malformed, tampered or expired, and with a 403 when it was
/// issued to a blocked account. Role and verification are not checked here.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = TokenCodec::from_ref(state);
        verified_identity(parts, &codec).map(AuthUser)
    }
}

/// AdminUser
///
/// The privileged-operation gate. Same token handling as `AuthUser` (401 on any token
/// failure), then 403 unless the caller is a verified admin. Independent of the path,
/// so it also guards API routes the page gateway never sees.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = TokenCodec::from_ref(state);
        let identity = verified_identity(parts, &codec)?;

        if identity.role != Role::Admin || !identity.is_verified {
            tracing::warn!(
                account_id = %identity.account_id,
                role = %identity.role,
                uri = %parts.uri,
                "privileged operation refused"
            );
            return Err(AppError::forbidden());
        }

        Ok(AdminUser(identity))
    }
}

/// auth_middleware
///
/// Layer form of `AuthUser`: stops unauthenticated requests before the handler runs and
/// attaches the identity to the request.
pub async fn auth_middleware(
    AuthUser(identity): AuthUser,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// require_admin
///
/// Layer form of `AdminUser`. Wrap any route or router with
/// `route_layer(middleware::from_fn_with_state(state, require_admin))` to restrict it to
/// verified admins; the wrapped handler receives the identity as `Extension<Identity>`.
pub async fn require_admin(
    AdminUser(identity): AdminUser,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(identity);
    next.run(request).await
}
