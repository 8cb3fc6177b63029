//! Approval workflow engine.
//!
//! The only writer of account approval state, shop verification and order production
//! status. Every transition is a compare-and-swap against the state that was just read,
//! so two admins acting on the same entity cannot both "win" and cannot both trigger a
//! notification. Notifications are emitted only after the authoritative write commits.

use std::{fmt, future::Future, str::FromStr, time::Duration};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{Account, Order, OrderStatus, RequestStatus, Role, Shop},
    notifications::{self, NotificationEmitter},
    repository::{RepositoryError, RepositoryState, with_deadline},
};

/// Reads-then-CAS attempts before giving up on a hot entity.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Shop,
    ShopOwner,
    Order,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Account => "account",
            Entity::Shop => "shop",
            Entity::ShopOwner => "shop owner",
            Entity::Order => "order",
        })
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("invalid status {0:?}")]
    InvalidStatus(String),

    #[error("invalid action {0:?}")]
    InvalidAction(String),

    #[error("{0} accounts do not go through approval")]
    NotApprovable(Role),

    #[error("only salesman accounts can be blocked, not {0}")]
    NotBlockable(Role),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0} is being changed concurrently, retry")]
    Contended(Entity),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// ApprovalDecision
///
/// The two values an admin may set on a registration request. `pending` is deliberately
/// absent: a decided request never goes back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    pub fn status(self) -> RequestStatus {
        match self {
            ApprovalDecision::Approved => RequestStatus::Approved,
            ApprovalDecision::Rejected => RequestStatus::Rejected,
        }
    }
}

impl FromStr for ApprovalDecision {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ApprovalDecision::Approved),
            "rejected" => Ok(ApprovalDecision::Rejected),
            other => Err(WorkflowError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopAction {
    Approve,
    Reject,
}

impl ShopAction {
    pub fn status(self) -> RequestStatus {
        match self {
            ShopAction::Approve => RequestStatus::Approved,
            ShopAction::Reject => RequestStatus::Rejected,
        }
    }
}

impl FromStr for ShopAction {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ShopAction::Approve),
            "reject" => Ok(ShopAction::Reject),
            other => Err(WorkflowError::InvalidAction(other.to_string())),
        }
    }
}

/// WorkflowEngine
///
/// Cheap to clone; holds the store handle, the notification emitter and the per-call
/// store deadline.
#[derive(Clone)]
pub struct WorkflowEngine {
    repo: RepositoryState,
    notifier: NotificationEmitter,
    timeout: Duration,
}

impl WorkflowEngine {
    pub fn new(repo: RepositoryState, timeout: Duration) -> Self {
        Self {
            notifier: NotificationEmitter::new(repo.clone(), timeout),
            repo,
            timeout,
        }
    }

    async fn store<T, F>(&self, call: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        Ok(with_deadline(self.timeout, call).await?)
    }

    /// decide_account
    ///
    /// Sets an approval decision on a shop or salesman account. Re-applying the current
    /// decision is a no-op that returns the account unchanged and notifies nobody.
    /// For shop owners the owned shop's verification flag is written in the same unit.
    pub async fn decide_account(
        &self,
        account_id: Uuid,
        requested: &str,
    ) -> Result<Account, WorkflowError> {
        let target = requested.parse::<ApprovalDecision>()?.status();

        for _ in 0..MAX_ATTEMPTS {
            let account = self
                .store(self.repo.get_account(account_id))
                .await?
                .ok_or(WorkflowError::NotFound(Entity::Account))?;

            if !account.role.requires_approval() {
                return Err(WorkflowError::NotApprovable(account.role));
            }

            if account.request_status == target && account.is_verified == target.is_verified() {
                tracing::debug!(%account_id, status = %target, "account decision already applied");
                return Ok(account);
            }

            let committed = self
                .store(
                    self.repo
                        .transition_account(account_id, account.request_status, target),
                )
                .await?;

            if let Some(transition) = committed {
                tracing::info!(
                    %account_id,
                    from = %account.request_status,
                    to = %target,
                    "account decision applied"
                );
                if account.request_status != target {
                    self.notifier
                        .emit(notifications::account_decided(&transition.account, target))
                        .await;
                }
                return Ok(transition.account);
            }

            tracing::debug!(%account_id, "account changed under us, re-reading");
        }

        Err(WorkflowError::Contended(Entity::Account))
    }

    /// verify_shop
    ///
    /// Approves or rejects a shop. The owner is always re-derived from the shop record;
    /// the shop flag and the owner's request status move together.
    pub async fn verify_shop(&self, shop_id: Uuid, action: &str) -> Result<Shop, WorkflowError> {
        let target = action.parse::<ShopAction>()?.status();

        for _ in 0..MAX_ATTEMPTS {
            let shop = self
                .store(self.repo.get_shop(shop_id))
                .await?
                .ok_or(WorkflowError::NotFound(Entity::Shop))?;

            let owner = self
                .store(self.repo.get_account(shop.owner_id))
                .await?
                .filter(|owner| owner.role == Role::Shop)
                .ok_or(WorkflowError::NotFound(Entity::ShopOwner))?;

            let verified = target.is_verified();
            if owner.request_status == target
                && owner.is_verified == verified
                && shop.is_verified == verified
            {
                tracing::debug!(%shop_id, status = %target, "shop verification already applied");
                return Ok(shop);
            }

            let committed = self
                .store(
                    self.repo
                        .transition_account(owner.id, owner.request_status, target),
                )
                .await?;

            if let Some(transition) = committed {
                let shop = transition
                    .shop
                    .ok_or(WorkflowError::NotFound(Entity::Shop))?;
                tracing::info!(
                    %shop_id,
                    owner_id = %owner.id,
                    from = %owner.request_status,
                    to = %target,
                    "shop verification applied"
                );
                if owner.request_status != target {
                    self.notifier
                        .emit(notifications::shop_decided(&shop, target))
                        .await;
                }
                return Ok(shop);
            }

            tracing::debug!(%shop_id, "shop owner changed under us, re-reading");
        }

        Err(WorkflowError::Contended(Entity::Shop))
    }

    /// advance_order
    ///
    /// Moves an order exactly one stage forward, or cancels it. Skips, regressions and
    /// any move out of a terminal state fail with `IllegalTransition`.
    pub async fn advance_order(
        &self,
        order_id: Uuid,
        requested: &str,
    ) -> Result<Order, WorkflowError> {
        let next = requested
            .parse::<OrderStatus>()
            .map_err(|_| WorkflowError::InvalidStatus(requested.to_string()))?;

        for _ in 0..MAX_ATTEMPTS {
            let order = self
                .store(self.repo.get_order(order_id))
                .await?
                .ok_or(WorkflowError::NotFound(Entity::Order))?;

            if !order.status.can_transition_to(next) {
                return Err(WorkflowError::IllegalTransition {
                    from: order.status,
                    to: next,
                });
            }

            let committed = self
                .store(self.repo.transition_order(order_id, order.status, next))
                .await?;

            if let Some(updated) = committed {
                tracing::info!(
                    %order_id,
                    code = %updated.code,
                    from = %order.status,
                    to = %next,
                    "order status advanced"
                );
                self.notifier
                    .emit(notifications::order_moved(&updated, order.status))
                    .await;
                return Ok(updated);
            }

            tracing::debug!(%order_id, "order changed under us, re-reading");
        }

        Err(WorkflowError::Contended(Entity::Order))
    }

    pub async fn set_salesman_blocked(
        &self,
        account_id: Uuid,
        blocked: bool,
    ) -> Result<Account, WorkflowError> {
        let account = self
            .store(self.repo.get_account(account_id))
            .await?
            .ok_or(WorkflowError::NotFound(Entity::Account))?;

        if account.role != Role::Salesman {
            return Err(WorkflowError::NotBlockable(account.role));
        }
        if account.is_blocked == blocked {
            return Ok(account);
        }

        let updated = self
            .store(self.repo.set_account_blocked(account_id, blocked))
            .await?
            .ok_or(WorkflowError::NotFound(Entity::Account))?;
        tracing::info!(%account_id, blocked, "salesman block flag changed");
        Ok(updated)
    }
}
