use crate::models::{
    Account, AdminDashboard, NewAccount, NewNotification, NewOrder, NewShop, Notification, Order,
    OrderStatus, RequestStatus, Shop,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// Failures surfaced by any `Repository` implementation. Everything except `Conflict`
/// is treated as a retryable dependency failure by the API layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique constraint violation (duplicate mobile or email).
    #[error("{0}")]
    Conflict(String),

    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    /// Injected failure, used by the in-memory store to simulate an outage.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// AccountTransition
///
/// Result of a committed account decision: the account and, for shop owners, the shop
/// whose verification flag was written in the same unit.
#[derive(Debug, Clone)]
pub struct AccountTransition {
    pub account: Account,
    pub shop: Option<Shop>,
}

/// Repository Trait
///
/// The document-store handle. Handlers and the workflow engine only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are interchangeable.
///
/// The two `transition_*` methods are compare-and-swap writes: they apply only when the
/// persisted state still equals `expected`, and return `Ok(None)` when another writer got there first.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn create_account(&self, account: NewAccount) -> Result<Account, RepositoryError>;
    /// Inserts the owner and the shop as one unit, linking them both ways.
    async fn register_shop_owner(
        &self,
        owner: NewAccount,
        shop: NewShop,
    ) -> Result<(Account, Shop), RepositoryError>;
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, RepositoryError>;
    /// Looks the identifier up as an email first, then as a mobile number.
    async fn find_account_by_login(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError>;
    async fn list_accounts_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<Account>, RepositoryError>;
    /// Sets `request_status`/`is_verified` on the account and `is_verified` on any shop it
    /// owns (shop first, then account), atomically, if the account is still at `expected`.
    async fn transition_account(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<Option<AccountTransition>, RepositoryError>;
    async fn set_account_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> Result<Option<Account>, RepositoryError>;

    // --- Shops ---
    async fn get_shop(&self, id: Uuid) -> Result<Option<Shop>, RepositoryError>;
    async fn list_shops(&self) -> Result<Vec<Shop>, RepositoryError>;

    // --- Orders ---
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;
    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError>;
    async fn list_orders_for_salesman(
        &self,
        salesman_id: Uuid,
    ) -> Result<Vec<Order>, RepositoryError>;
    async fn transition_order(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;

    // --- Notifications ---
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError>;
    /// Newest first.
    async fn list_notifications(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<Notification>, RepositoryError>;
    /// Only marks the notification if it belongs to `recipient_id`.
    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, RepositoryError>;

    async fn dashboard(&self) -> Result<AdminDashboard, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Runs a store call under a deadline, turning an elapsed deadline into `RepositoryError::Timeout`.
pub async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout(limit)),
    }
}

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Queries are checked at runtime so the crate builds
/// without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = "id, name, mobile, email, password_hash, role, is_verified, \
     request_status, is_blocked, shop_id, created_at, updated_at";
const SHOP_COLUMNS: &str =
    "id, name, owner_id, address, tax_id, is_verified, is_active, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, code, product_name, design_notes, quantity, shop_id, \
     salesman_id, status, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str = "id, recipient_id, type, message, is_read, order_id, created_at";

/// Maps unique violations to `Conflict`; everything else stays a database error.
fn write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let what = db.constraint().unwrap_or("unique field").to_string();
            return RepositoryError::Conflict(format!("{what} already registered"));
        }
    }
    RepositoryError::Database(e)
}

impl PostgresRepository {
    async fn insert_account(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        account: &NewAccount,
        shop_id: Option<Uuid>,
    ) -> Result<Account, RepositoryError> {
        let query = format!(
            "INSERT INTO accounts (id, name, mobile, email, password_hash, role, is_verified, \
             request_status, is_blocked, shop_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, $9, NOW(), NOW()) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .bind(&account.name)
            .bind(&account.mobile)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(account.is_verified)
            .bind(account.request_status.as_str())
            .bind(shop_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(write_error)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_account(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let created = Self::insert_account(&mut tx, Uuid::new_v4(), &account, None).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// register_shop_owner
    ///
    /// Both ids are generated up front so the account can reference its shop and the shop
    /// its owner without a second update.
    async fn register_shop_owner(
        &self,
        owner: NewAccount,
        shop: NewShop,
    ) -> Result<(Account, Shop), RepositoryError> {
        let owner_id = Uuid::new_v4();
        let shop_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        let account = Self::insert_account(&mut tx, owner_id, &owner, Some(shop_id)).await?;

        let query = format!(
            "INSERT INTO shops (id, name, owner_id, address, tax_id, is_verified, is_active, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, true, NOW(), NOW()) RETURNING {SHOP_COLUMNS}"
        );
        let shop = sqlx::query_as::<_, Shop>(&query)
            .bind(shop_id)
            .bind(&shop.name)
            .bind(owner_id)
            .bind(&shop.address)
            .bind(&shop.tax_id)
            .bind(owner.is_verified)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error)?;

        tx.commit().await?;
        Ok((account, shop))
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_account_by_login(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1 OR mobile = $1 \
             ORDER BY (email = $1) DESC NULLS LAST LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_accounts_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<Account>, RepositoryError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE request_status = $1 \
             ORDER BY created_at ASC"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    /// transition_account
    ///
    /// The shop write and the conditional account write share one transaction; if the
    /// account is no longer at `expected` the transaction is rolled back and the shop
    /// flag is left untouched.
    async fn transition_account(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<Option<AccountTransition>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let shop_query = format!(
            "UPDATE shops SET is_verified = $2, updated_at = NOW() WHERE owner_id = $1 \
             RETURNING {SHOP_COLUMNS}"
        );
        let shop = sqlx::query_as::<_, Shop>(&shop_query)
            .bind(id)
            .bind(next.is_verified())
            .fetch_optional(&mut *tx)
            .await?;

        let account_query = format!(
            "UPDATE accounts SET request_status = $3, is_verified = $4, updated_at = NOW() \
             WHERE id = $1 AND request_status = $2 RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, Account>(&account_query)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .bind(next.is_verified())
            .fetch_optional(&mut *tx)
            .await?;

        match account {
            Some(account) => {
                tx.commit().await?;
                Ok(Some(AccountTransition { account, shop }))
            }
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    async fn set_account_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> Result<Option<Account>, RepositoryError> {
        let query = format!(
            "UPDATE accounts SET is_blocked = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .bind(blocked)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_shop(&self, id: Uuid) -> Result<Option<Shop>, RepositoryError> {
        let query = format!("SELECT {SHOP_COLUMNS} FROM shops WHERE id = $1");
        Ok(sqlx::query_as::<_, Shop>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_shops(&self) -> Result<Vec<Shop>, RepositoryError> {
        let query =
            format!("SELECT {SHOP_COLUMNS} FROM shops ORDER BY is_verified ASC, created_at DESC");
        Ok(sqlx::query_as::<_, Shop>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let query = format!(
            "INSERT INTO orders (id, code, product_name, design_notes, quantity, shop_id, \
             salesman_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(Uuid::new_v4())
            .bind(&order.code)
            .bind(&order.product_name)
            .bind(&order.design_notes)
            .bind(order.quantity)
            .bind(order.shop_id)
            .bind(order.salesman_id)
            .bind(OrderStatus::Confirmed.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, Order>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_orders_for_salesman(
        &self,
        salesman_id: Uuid,
    ) -> Result<Vec<Order>, RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE salesman_id = $1 ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Order>(&query)
            .bind(salesman_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// transition_order
    ///
    /// Single conditional UPDATE; zero affected rows means a concurrent writer moved the order.
    async fn transition_order(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let query = format!(
            "UPDATE orders SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        let query = format!(
            "INSERT INTO notifications (id, recipient_id, type, message, is_read, order_id, \
             created_at) VALUES ($1, $2, $3, $4, false, $5, NOW()) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Notification>(&query)
            .bind(Uuid::new_v4())
            .bind(notification.recipient_id)
            .bind(notification.kind.as_str())
            .bind(&notification.message)
            .bind(notification.order_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient_id = $1 \
             ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Notification>(&query)
            .bind(recipient_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE id = $1 AND recipient_id = $2",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn dashboard(&self) -> Result<AdminDashboard, RepositoryError> {
        let pending_accounts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE request_status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        let unverified_shops: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shops WHERE is_verified = false")
                .fetch_one(&self.pool)
                .await?;
        let open_orders: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE status NOT IN ('dispatched', 'cancelled')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboard {
            pending_accounts,
            unverified_shops,
            open_orders,
        })
    }
}
