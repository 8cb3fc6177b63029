use crate::{
    AppState,
    config::AppConfig,
    credentials::{hash_password_blocking, verify_password_blocking},
    error::{AppError, ErrorBody},
    gateway::{cleared_cookie, session_cookie},
    models::{
        AccountApprovalRequest, AccountProfile, AdminDashboard, BlockAccountRequest, LoginRequest,
        NewAccount, NewShop, Notification, Order, OrderStatusRequest, RegisterSalesmanRequest,
        RegisterShopRequest, RegistrationResponse, RequestStatus, Role, SessionResponse, Shop,
        ShopVerificationRequest,
    },
    repository::with_deadline,
    token::Identity,
};
use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

/// Trims and drops empty optional contact fields.
fn contact(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Shared registration checks: a name, at least one contact identifier and a usable password.
async fn pending_account(
    name: &str,
    mobile: Option<String>,
    email: Option<String>,
    password: String,
    role: Role,
) -> Result<NewAccount, AppError> {
    let name = required("name", name)?;
    let mobile = contact(mobile);
    let email = contact(email).map(|e| e.to_lowercase());
    if mobile.is_none() && email.is_none() {
        return Err(AppError::InvalidInput(
            "a mobile number or an email is required".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let password_hash = hash_password_blocking(password).await?;
    Ok(NewAccount::pending(name, mobile, email, password_hash, role))
}

// --- Public Handlers ---

/// register_shop
///
/// [Public Route] Registers a shop owner together with their shop. Both start unverified
/// and the owner's request is pending until an admin decides.
#[utoipa::path(
    post,
    path = "/api/auth/register/shop",
    request_body = RegisterShopRequest,
    responses(
        (status = 201, description = "Registered", body = RegistrationResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Mobile or email already registered", body = ErrorBody)
    )
)]
pub async fn register_shop(
    State(state): State<AppState>,
    payload: Result<Json<RegisterShopRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let Json(payload) = payload?;
    let shop = NewShop {
        name: required("shop_name", &payload.shop_name)?,
        address: required("address", &payload.address)?,
        tax_id: contact(payload.tax_id),
    };
    let owner = pending_account(
        &payload.owner_name,
        payload.mobile,
        payload.email,
        payload.password,
        Role::Shop,
    )
    .await?;

    let (account, shop) = with_deadline(
        state.config.store_timeout,
        state.repo.register_shop_owner(owner, shop),
    )
    .await?;
    tracing::info!(account_id = %account.id, shop_id = %shop.id, "shop owner registered");

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            account: account.into(),
            shop: Some(shop),
        }),
    ))
}

/// register_salesman
///
/// [Public Route] Registers a salesman account awaiting approval.
#[utoipa::path(
    post,
    path = "/api/auth/register/salesman",
    request_body = RegisterSalesmanRequest,
    responses(
        (status = 201, description = "Registered", body = RegistrationResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Mobile or email already registered", body = ErrorBody)
    )
)]
pub async fn register_salesman(
    State(state): State<AppState>,
    payload: Result<Json<RegisterSalesmanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let Json(payload) = payload?;
    let salesman = pending_account(
        &payload.name,
        payload.mobile,
        payload.email,
        payload.password,
        Role::Salesman,
    )
    .await?;

    let account = with_deadline(
        state.config.store_timeout,
        state.repo.create_account(salesman),
    )
    .await?;
    tracing::info!(account_id = %account.id, "salesman registered");

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            account: account.into(),
            shop: None,
        }),
    ))
}

/// login
///
/// [Public Route] Verifies the credential and sets the session cookie. Unverified accounts
/// may sign in (their token keeps them out of the restricted areas); blocked salesmen may not.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SessionResponse),
        (status = 401, description = "Unknown identifier or wrong password", body = ErrorBody),
        (status = 403, description = "Account is blocked", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let identifier = payload.identifier.trim().to_lowercase();

    let account = with_deadline(
        state.config.store_timeout,
        state.repo.find_account_by_login(&identifier),
    )
    .await?;

    let invalid = || AppError::Authentication("invalid credentials".to_string());
    let account = account.ok_or_else(invalid)?;
    if !verify_password_blocking(payload.password, account.password_hash.clone()).await {
        tracing::warn!(account_id = %account.id, "failed login");
        return Err(invalid());
    }

    if account.role == Role::Salesman && account.is_blocked {
        return Err(AppError::Authorization("account is blocked".to_string()));
    }

    let identity = Identity {
        account_id: account.id,
        role: account.role,
        is_verified: account.is_verified,
        is_blocked: account.is_blocked,
    };
    let issued = state.tokens.issue(&identity)?;
    let cookie = session_cookie(
        &issued.token,
        state.tokens.ttl().num_seconds(),
        state.config.secure_cookies(),
    );
    tracing::info!(account_id = %account.id, role = %account.role, "signed in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            account: account.into(),
            expires_at: issued.expires_at,
        }),
    ))
}

/// logout
///
/// [Public Route] Clears the session cookie. Tokens are not tracked server-side, so this
/// is purely a client-side discard.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Session cookie cleared"))
)]
pub async fn logout(State(config): State<AppConfig>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cleared_cookie(config.secure_cookies()))],
    )
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's current account, read fresh from the store.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = AccountProfile),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn get_me(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
) -> Result<Json<AccountProfile>, AppError> {
    let account = with_deadline(
        state.config.store_timeout,
        state.repo.get_account(identity.account_id),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("account".to_string()))?;
    Ok(Json(account.into()))
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    responses((status = 200, description = "My notifications, newest first", body = [Notification]))
)]
pub async fn get_notifications(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = with_deadline(
        state.config.store_timeout,
        state.repo.list_notifications(identity.account_id),
    )
    .await?;
    Ok(Json(notifications))
}

/// mark_notification_read
///
/// [Authenticated Route] 404 covers both "no such notification" and "not yours".
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "Not Found or Not Yours", body = ErrorBody)
    )
)]
pub async fn mark_notification_read(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let marked = with_deadline(
        state.config.store_timeout,
        state.repo.mark_notification_read(id, identity.account_id),
    )
    .await?;
    if marked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("notification".to_string()))
    }
}

// --- Privileged Handlers (verified admin only) ---

/// approve_account
///
/// [Admin Operation] Approves or rejects a pending shop/salesman registration.
#[utoipa::path(
    put,
    path = "/api/accounts/{id}/approval",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = AccountApprovalRequest,
    responses(
        (status = 200, description = "Decision applied", body = AccountProfile),
        (status = 400, description = "Unknown status or account not subject to approval", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 403, description = "Not a verified admin", body = ErrorBody),
        (status = 404, description = "Account not found", body = ErrorBody)
    )
)]
pub async fn approve_account(
    Extension(admin): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AccountApprovalRequest>, JsonRejection>,
) -> Result<Json<AccountProfile>, AppError> {
    let Json(payload) = payload?;
    tracing::info!(admin_id = %admin.account_id, account_id = %id, status = %payload.status, "account decision requested");
    let account = state.workflow.decide_account(id, &payload.status).await?;
    Ok(Json(account.into()))
}

/// block_account
///
/// [Admin Operation] Blocks or unblocks a salesman. Takes effect at the next login.
#[utoipa::path(
    put,
    path = "/api/accounts/{id}/block",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = BlockAccountRequest,
    responses(
        (status = 200, description = "Updated", body = AccountProfile),
        (status = 400, description = "Not a salesman", body = ErrorBody),
        (status = 404, description = "Account not found", body = ErrorBody)
    )
)]
pub async fn block_account(
    Extension(admin): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<BlockAccountRequest>, JsonRejection>,
) -> Result<Json<AccountProfile>, AppError> {
    let Json(payload) = payload?;
    tracing::info!(admin_id = %admin.account_id, account_id = %id, blocked = payload.blocked, "block change requested");
    let account = state
        .workflow
        .set_salesman_blocked(id, payload.blocked)
        .await?;
    Ok(Json(account.into()))
}

/// verify_shop
///
/// [Admin Operation] Approves or rejects a shop; the owner's request status follows.
#[utoipa::path(
    put,
    path = "/api/shops/{id}/verification",
    params(("id" = Uuid, Path, description = "Shop ID")),
    request_body = ShopVerificationRequest,
    responses(
        (status = 200, description = "Decision applied", body = Shop),
        (status = 400, description = "Unknown action", body = ErrorBody),
        (status = 404, description = "Shop or owner not found", body = ErrorBody)
    )
)]
pub async fn verify_shop(
    Extension(admin): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ShopVerificationRequest>, JsonRejection>,
) -> Result<Json<Shop>, AppError> {
    let Json(payload) = payload?;
    tracing::info!(admin_id = %admin.account_id, shop_id = %id, action = %payload.action, "shop verification requested");
    let shop = state.workflow.verify_shop(id, &payload.action).await?;
    Ok(Json(shop))
}

/// update_order_status
///
/// [Admin Operation] Advances an order one stage along the production pipeline, or cancels it.
#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OrderStatusRequest,
    responses(
        (status = 200, description = "Status advanced", body = Order),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 404, description = "Order not found", body = ErrorBody),
        (status = 409, description = "Illegal transition", body = ErrorBody)
    )
)]
pub async fn update_order_status(
    Extension(admin): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<OrderStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Json(payload) = payload?;
    tracing::info!(admin_id = %admin.account_id, order_id = %id, status = %payload.status, "order status change requested");
    let order = state.workflow.advance_order(id, &payload.status).await?;
    Ok(Json(order))
}

// --- Restricted Area Handlers (behind the route gateway) ---

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses((status = 200, description = "Approval and production counters", body = AdminDashboard))
)]
pub async fn admin_dashboard(
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>, AppError> {
    let dashboard = with_deadline(state.config.store_timeout, state.repo.dashboard()).await?;
    Ok(Json(dashboard))
}

/// pending_accounts
///
/// [Admin Area] The approval queue, oldest request first.
#[utoipa::path(
    get,
    path = "/admin/accounts/pending",
    responses((status = 200, description = "Accounts awaiting a decision", body = [AccountProfile]))
)]
pub async fn pending_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountProfile>>, AppError> {
    let accounts = with_deadline(
        state.config.store_timeout,
        state.repo.list_accounts_by_status(RequestStatus::Pending),
    )
    .await?;
    Ok(Json(accounts.iter().map(AccountProfile::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/shops",
    responses((status = 200, description = "All shops, unverified first", body = [Shop]))
)]
pub async fn list_shops(State(state): State<AppState>) -> Result<Json<Vec<Shop>>, AppError> {
    let shops = with_deadline(state.config.store_timeout, state.repo.list_shops()).await?;
    Ok(Json(shops))
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    responses((status = 200, description = "All orders, newest first", body = [Order]))
)]
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, AppError> {
    let orders = with_deadline(state.config.store_timeout, state.repo.list_orders()).await?;
    Ok(Json(orders))
}

/// salesman_orders
///
/// [Salesman Area] Orders booked by the calling salesman. The identity is the one the
/// route gateway attached after checking the session.
#[utoipa::path(
    get,
    path = "/salesman/orders",
    responses((status = 200, description = "My orders, newest first", body = [Order]))
)]
pub async fn salesman_orders(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = with_deadline(
        state.config.store_timeout,
        state.repo.list_orders_for_salesman(identity.account_id),
    )
    .await?;
    Ok(Json(orders))
}
