//! Route gateway for the role-restricted page areas.
//!
//! Every request under `/admin` or `/salesman` is checked against the session cookie.
//! Failures never produce an error page: callers without a usable session are sent to the
//! public entry point, and verified callers in the wrong area are sent to their own.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    models::Role,
    token::{Identity, TokenCodec},
};

/// Where callers without a usable session are sent.
pub const PUBLIC_ENTRY: &str = "/";

/// Name of the HTTP-only cookie holding the session token.
pub const TOKEN_COOKIE: &str = "jewel_session";

/// Area
///
/// A role-restricted segment of the site. Each area belongs to exactly one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Admin,
    Salesman,
}

impl Area {
    pub const ALL: [Area; 2] = [Area::Admin, Area::Salesman];

    pub fn prefix(self) -> &'static str {
        match self {
            Area::Admin => "/admin",
            Area::Salesman => "/salesman",
        }
    }

    pub fn role(self) -> Role {
        match self {
            Area::Admin => Role::Admin,
            Area::Salesman => Role::Salesman,
        }
    }

    /// The area `path` falls under, matching whole segments only (`/administer` is public).
    pub fn of_path(path: &str) -> Option<Area> {
        Area::ALL.into_iter().find(|area| {
            path.strip_prefix(area.prefix())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// The area a verified account of `role` lives in. Exhaustive on purpose: a new role
/// does not compile until it is given an answer here.
pub fn home_area(role: Role) -> Option<Area> {
    match role {
        Role::Admin => Some(Area::Admin),
        Role::Salesman => Some(Area::Salesman),
        Role::Shop => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Anonymous,
    InvalidToken,
    Blocked,
    Unverified,
    NoArea,
    WrongArea,
}

/// GatewayDecision
///
/// Outcome of `decide`. `Forward` carries the identity so area handlers can use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayDecision {
    /// Path is outside every restricted area.
    Unrestricted,
    Forward(Identity),
    Redirect {
        location: &'static str,
        reason: DenyReason,
    },
}

impl GatewayDecision {
    fn deny(location: &'static str, reason: DenyReason) -> Self {
        GatewayDecision::Redirect { location, reason }
    }
}

/// decide
///
/// Pure routing decision over the request path and the (optional) raw token.
pub fn decide(codec: &TokenCodec, path: &str, token: Option<&str>) -> GatewayDecision {
    let Some(requested) = Area::of_path(path) else {
        return GatewayDecision::Unrestricted;
    };

    let Some(token) = token else {
        return GatewayDecision::deny(PUBLIC_ENTRY, DenyReason::Anonymous);
    };

    let identity = match codec.verify(token) {
        Ok(identity) => identity,
        Err(_) => return GatewayDecision::deny(PUBLIC_ENTRY, DenyReason::InvalidToken),
    };

    if identity.is_blocked {
        return GatewayDecision::deny(PUBLIC_ENTRY, DenyReason::Blocked);
    }

    if !identity.is_verified {
        return GatewayDecision::deny(PUBLIC_ENTRY, DenyReason::Unverified);
    }

    let Some(home) = home_area(identity.role) else {
        return GatewayDecision::deny(PUBLIC_ENTRY, DenyReason::NoArea);
    };

    if home != requested {
        return GatewayDecision::deny(home.prefix(), DenyReason::WrongArea);
    }

    GatewayDecision::Forward(identity)
}

/// Pulls the session token out of the `Cookie` header(s), if present and non-empty.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{TOKEN_COOKIE}={token}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the session.
pub fn cleared_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// route_gateway
///
/// Middleware form of `decide`, layered over the whole router. On `Forward` the identity
/// is inserted into the request extensions for the area handlers.
pub async fn route_gateway(
    State(codec): State<TokenCodec>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = token_from_cookies(request.headers());
    let path = request.uri().path().to_string();

    match decide(&codec, &path, token.as_deref()) {
        GatewayDecision::Unrestricted => next.run(request).await,
        GatewayDecision::Forward(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        GatewayDecision::Redirect { location, reason } => {
            match reason {
                DenyReason::Anonymous => tracing::debug!(%path, "anonymous request to restricted area"),
                _ => tracing::warn!(%path, ?reason, %location, "restricted area request redirected"),
            }
            Redirect::to(location).into_response()
        }
    }
}
