//! In-process `Repository`. Backs the router and workflow tests, and local runs with
//! `DATABASE_URL=memory://`. Every operation holds the table lock for its whole
//! read-modify-write, which gives the same compare-and-swap guarantees as the Postgres store.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::{Barrier, RwLock};
use uuid::Uuid;

use crate::{
    models::{
        Account, AdminDashboard, NewAccount, NewNotification, NewOrder, NewShop, Notification,
        Order, OrderStatus, RequestStatus, Shop,
    },
    repository::{AccountTransition, Repository, RepositoryError},
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    shops: HashMap<Uuid, Shop>,
    orders: HashMap<Uuid, Order>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn ensure_unique(&self, account: &NewAccount) -> Result<(), RepositoryError> {
        for existing in self.accounts.values() {
            if account.email.is_some() && existing.email == account.email {
                return Err(RepositoryError::Conflict(
                    "accounts_email_key already registered".to_string(),
                ));
            }
            if account.mobile.is_some() && existing.mobile == account.mobile {
                return Err(RepositoryError::Conflict(
                    "accounts_mobile_key already registered".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn insert_account(&mut self, id: Uuid, account: NewAccount, shop_id: Option<Uuid>) -> Account {
        let now = Utc::now();
        let created = Account {
            id,
            name: account.name,
            mobile: account.mobile,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            is_verified: account.is_verified,
            request_status: account.request_status,
            is_blocked: false,
            shop_id,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(id, created.clone());
        created
    }
}

/// MemoryRepository
///
/// Test knobs:
/// - `fail_notifications` makes every notification write fail, to exercise the
///   best-effort side-effect path.
/// - `read_gate` holds armed account/order reads at a barrier after the snapshot is
///   taken, so concurrent callers act on the same stale state.
/// - `transition_delay` stalls every compare-and-swap before it touches the tables.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    fail_notifications: AtomicBool,
    read_gate: Option<(Barrier, usize)>,
    gated_reads: AtomicUsize,
    transition_delay: Option<Duration>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_notifications() -> Self {
        let repo = Self::default();
        repo.fail_notifications.store(true, Ordering::SeqCst);
        repo
    }

    /// Reads stay ungated until `arm_read_rendezvous` is called; after that the next
    /// `parties` account/order reads wait for each other before returning.
    pub fn with_read_rendezvous(parties: usize) -> Self {
        Self {
            read_gate: Some((Barrier::new(parties), parties)),
            ..Self::default()
        }
    }

    pub fn arm_read_rendezvous(&self) {
        if let Some((_, parties)) = &self.read_gate {
            self.gated_reads.store(*parties, Ordering::SeqCst);
        }
    }

    pub fn with_slow_transitions(delay: Duration) -> Self {
        Self {
            transition_delay: Some(delay),
            ..Self::default()
        }
    }

    async fn rendezvous(&self) {
        let Some((barrier, _)) = &self.read_gate else {
            return;
        };
        let claimed = self
            .gated_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if claimed {
            barrier.wait().await;
        }
    }

    async fn stall(&self) {
        if let Some(delay) = self.transition_delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Overwrites a stored account wholesale, bypassing the workflow. Lets tests plant
    /// inconsistent state the way an out-of-band writer could.
    pub async fn put_account(&self, account: Account) {
        self.tables
            .write()
            .await
            .accounts
            .insert(account.id, account);
    }

    pub async fn put_shop(&self, shop: Shop) {
        self.tables.write().await.shops.insert(shop.id, shop);
    }

    pub async fn notification_count(&self) -> usize {
        self.tables.read().await.notifications.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_account(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.ensure_unique(&account)?;
        Ok(tables.insert_account(Uuid::new_v4(), account, None))
    }

    async fn register_shop_owner(
        &self,
        owner: NewAccount,
        shop: NewShop,
    ) -> Result<(Account, Shop), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.ensure_unique(&owner)?;

        let owner_id = Uuid::new_v4();
        let shop_id = Uuid::new_v4();
        let is_verified = owner.is_verified;
        let account = tables.insert_account(owner_id, owner, Some(shop_id));

        let now = Utc::now();
        let shop = Shop {
            id: shop_id,
            name: shop.name,
            owner_id,
            address: shop.address,
            tax_id: shop.tax_id,
            is_verified,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.shops.insert(shop_id, shop.clone());
        Ok((account, shop))
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let account = self.tables.read().await.accounts.get(&id).cloned();
        self.rendezvous().await;
        Ok(account)
    }

    async fn find_account_by_login(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let tables = self.tables.read().await;
        let by_email = tables
            .accounts
            .values()
            .find(|a| a.email.as_deref() == Some(identifier));
        let found = by_email.or_else(|| {
            tables
                .accounts
                .values()
                .find(|a| a.mobile.as_deref() == Some(identifier))
        });
        Ok(found.cloned())
    }

    async fn list_accounts_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<Account>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.request_status == status)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn transition_account(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<Option<AccountTransition>, RepositoryError> {
        self.stall().await;
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        match tables.accounts.get(&id) {
            Some(current) if current.request_status == expected => {}
            _ => return Ok(None),
        }

        let shop = tables
            .shops
            .values_mut()
            .find(|s| s.owner_id == id)
            .map(|shop| {
                shop.is_verified = next.is_verified();
                shop.updated_at = now;
                shop.clone()
            });

        let Some(account) = tables.accounts.get_mut(&id) else {
            return Ok(None);
        };
        account.request_status = next;
        account.is_verified = next.is_verified();
        account.updated_at = now;

        Ok(Some(AccountTransition {
            account: account.clone(),
            shop,
        }))
    }

    async fn set_account_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> Result<Option<Account>, RepositoryError> {
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.is_blocked = blocked;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn get_shop(&self, id: Uuid) -> Result<Option<Shop>, RepositoryError> {
        Ok(self.tables.read().await.shops.get(&id).cloned())
    }

    async fn list_shops(&self) -> Result<Vec<Shop>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut shops: Vec<Shop> = tables.shops.values().cloned().collect();
        shops.sort_by(|a, b| {
            a.is_verified
                .cmp(&b.is_verified)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(shops)
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| o.code == order.code) {
            return Err(RepositoryError::Conflict(format!(
                "order code {} already exists",
                order.code
            )));
        }
        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            code: order.code,
            product_name: order.product_name,
            design_notes: order.design_notes,
            quantity: order.quantity,
            shop_id: order.shop_id,
            salesman_id: order.salesman_id,
            status: OrderStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let order = self.tables.read().await.orders.get(&id).cloned();
        self.rendezvous().await;
        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders_for_salesman(
        &self,
        salesman_id: Uuid,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = self.list_orders().await?;
        orders.retain(|o| o.salesman_id == salesman_id);
        Ok(orders)
    }

    async fn transition_order(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        self.stall().await;
        let mut tables = self.tables.write().await;
        Ok(tables
            .orders
            .get_mut(&id)
            .filter(|order| order.status == expected)
            .map(|order| {
                order.status = next;
                order.updated_at = Utc::now();
                order.clone()
            }))
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "notification store offline".to_string(),
            ));
        }
        let created = Notification {
            id: Uuid::new_v4(),
            recipient_id: notification.recipient_id,
            kind: notification.kind,
            message: notification.message,
            is_read: false,
            order_id: notification.order_id,
            created_at: Utc::now(),
        };
        self.tables.write().await.notifications.push(created.clone());
        Ok(created)
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let tables = self.tables.read().await;
        // Insertion order is creation order; reverse for newest first.
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn dashboard(&self) -> Result<AdminDashboard, RepositoryError> {
        let tables = self.tables.read().await;
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        Ok(AdminDashboard {
            pending_accounts: count(
                tables
                    .accounts
                    .values()
                    .filter(|a| a.request_status == RequestStatus::Pending)
                    .count(),
            ),
            unverified_shops: count(tables.shops.values().filter(|s| !s.is_verified).count()),
            open_orders: count(
                tables
                    .orders
                    .values()
                    .filter(|o| !o.status.is_terminal())
                    .count(),
            ),
        })
    }
}
