use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// ParseEnumError
///
/// Returned when a persisted or user-supplied string does not name a known variant
/// of one of the closed enums below. Carries the offending value and the enum name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `as_str`, `Display`, `FromStr` and `TryFrom<String>` for a unit enum whose
/// variants persist as fixed lowercase strings.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError::new($kind, other)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

// --- Closed Enumerations ---

/// Role
///
/// The fixed set of account roles. Adding a variant forces every exhaustive match
/// (most importantly the restricted-area mapping in the gateway) to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Shop,
    Salesman,
}

text_enum!(Role, "role", {
    Admin => "admin",
    Shop => "shop",
    Salesman => "salesman",
});

impl Role {
    /// Roles whose accounts start out pending and must be approved by an admin.
    pub fn requires_approval(self) -> bool {
        match self {
            Role::Admin => false,
            Role::Shop | Role::Salesman => true,
        }
    }
}

/// RequestStatus
///
/// Lifecycle of a registration request. Kept in lockstep with `Account::is_verified`:
/// `Approved` if and only if the account is verified.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

text_enum!(RequestStatus, "request status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl RequestStatus {
    /// The verification flag that must accompany this status.
    pub fn is_verified(self) -> bool {
        matches!(self, RequestStatus::Approved)
    }
}

/// OrderStatus
///
/// Position of an order in the production pipeline. The declaration order of the
/// non-cancelled variants is the pipeline order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Confirmed,
    OrderViewAndAccepted,
    CadCompleted,
    ProductionFloor,
    Finished,
    Dispatched,
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    Confirmed => "confirmed",
    OrderViewAndAccepted => "order_view_and_accepted",
    CadCompleted => "cad_completed",
    ProductionFloor => "production_floor",
    Finished => "finished",
    Dispatched => "dispatched",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// The production pipeline, intake to dispatch.
    pub const PIPELINE: [OrderStatus; 6] = [
        OrderStatus::Confirmed,
        OrderStatus::OrderViewAndAccepted,
        OrderStatus::CadCompleted,
        OrderStatus::ProductionFloor,
        OrderStatus::Finished,
        OrderStatus::Dispatched,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Dispatched | OrderStatus::Cancelled)
    }

    /// The next stage of the pipeline, if any. `Cancelled` and `Dispatched` have none.
    pub fn successor(self) -> Option<OrderStatus> {
        let position = Self::PIPELINE.iter().position(|stage| *stage == self)?;
        Self::PIPELINE.get(position + 1).copied()
    }

    /// A move is legal when the order is still open and the target is either
    /// cancellation or the immediate successor.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == OrderStatus::Cancelled || self.successor() == Some(next)
    }
}

/// NotificationKind
///
/// What triggered a notification. Stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NotificationKind {
    AccountApproved,
    AccountRejected,
    ShopVerified,
    ShopRejected,
    OrderStatus,
}

text_enum!(NotificationKind, "notification kind", {
    AccountApproved => "account_approved",
    AccountRejected => "account_rejected",
    ShopVerified => "shop_verified",
    ShopRejected => "shop_rejected",
    OrderStatus => "order_status",
});

// --- Core Entities (Mapped to Database) ---

/// Account
///
/// A shop owner, salesman or admin as stored in the `accounts` table. The credential
/// hash never leaves the server; responses use `AccountProfile` instead.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_verified: bool,
    #[sqlx(try_from = "String")]
    pub request_status: RequestStatus,
    // Only consulted for salesmen.
    pub is_blocked: bool,
    pub shop_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shop
///
/// A retail shop registered by exactly one owner account. `is_verified` mirrors the
/// owner's approval.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub address: String,
    pub tax_id: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Order
///
/// A production order booked by a salesman. Mutated only through status transitions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable unique code, e.g. `ORD-2024-0012`.
    pub code: String,
    pub product_name: String,
    pub design_notes: Option<String>,
    pub quantity: i32,
    pub shop_id: Option<Uuid>,
    pub salesman_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Notification
///
/// Append-only message to one recipient, created as a side effect of a workflow transition.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    // 'type' is a reserved keyword in Rust.
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub order_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Store Inputs ---

/// Fields of an account about to be inserted. Ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub request_status: RequestStatus,
    pub is_verified: bool,
}

impl NewAccount {
    /// A freshly registered account awaiting approval.
    pub fn pending(
        name: String,
        mobile: Option<String>,
        email: Option<String>,
        password_hash: String,
        role: Role,
    ) -> Self {
        Self {
            name,
            mobile,
            email,
            password_hash,
            role,
            request_status: RequestStatus::Pending,
            is_verified: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewShop {
    pub name: String,
    pub address: String,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub code: String,
    pub product_name: String,
    pub design_notes: Option<String>,
    pub quantity: i32,
    pub shop_id: Option<Uuid>,
    pub salesman_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub order_id: Option<Uuid>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterShopRequest
///
/// Input payload for POST /api/auth/register/shop. Creates the owner account and the shop together.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterShopRequest {
    pub owner_name: String,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password: String,
    pub shop_name: String,
    pub address: String,
    pub tax_id: Option<String>,
}

/// RegisterSalesmanRequest
///
/// Input payload for POST /api/auth/register/salesman.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterSalesmanRequest {
    pub name: String,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// LoginRequest
///
/// `identifier` is matched against both the email and the mobile number.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "owner@goldhouse.in")]
    pub identifier: String,
    pub password: String,
}

/// AccountApprovalRequest
///
/// Kept as a raw string so an unknown value surfaces as a 400 with a stable error code
/// instead of a generic deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountApprovalRequest {
    #[schema(example = "approved")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ShopVerificationRequest {
    #[schema(example = "approve")]
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OrderStatusRequest {
    #[schema(example = "order_view_and_accepted")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BlockAccountRequest {
    pub blocked: bool,
}

// --- Output Schemas ---

/// AccountProfile
///
/// Public view of an `Account`, without the credential hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountProfile {
    pub id: Uuid,
    pub name: String,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub request_status: RequestStatus,
    pub is_blocked: bool,
    pub shop_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            mobile: account.mobile.clone(),
            email: account.email.clone(),
            role: account.role,
            is_verified: account.is_verified,
            request_status: account.request_status,
            is_blocked: account.is_blocked,
            shop_id: account.shop_id,
            created_at: account.created_at,
        }
    }
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        AccountProfile::from(&account)
    }
}

/// RegistrationResponse
///
/// Returned by both registration endpoints; `shop` is only present for shop owners.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegistrationResponse {
    pub account: AccountProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<Shop>,
}

/// SessionResponse
///
/// Body of a successful login. The token itself travels only in the HTTP-only cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub account: AccountProfile,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// AdminDashboard
///
/// Counters shown on the admin area landing page (GET /admin/dashboard).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminDashboard {
    pub pending_accounts: i64,
    pub unverified_shops: i64,
    /// Orders that are neither dispatched nor cancelled.
    pub open_orders: i64,
}
