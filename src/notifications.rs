use std::time::Duration;

use crate::{
    models::{Account, NewNotification, NotificationKind, Order, OrderStatus, RequestStatus, Shop},
    repository::{RepositoryState, with_deadline},
};

/// NotificationEmitter
///
/// Fire-and-forget writer used by the workflow engine after a transition has committed.
/// A failed or slow write is logged and dropped; it never reaches the caller and never
/// unwinds the transition that triggered it.
#[derive(Clone)]
pub struct NotificationEmitter {
    repo: RepositoryState,
    timeout: Duration,
}

impl NotificationEmitter {
    pub fn new(repo: RepositoryState, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub async fn emit(&self, notification: NewNotification) {
        let recipient = notification.recipient_id;
        let kind = notification.kind;
        match with_deadline(self.timeout, self.repo.create_notification(notification)).await {
            Ok(created) => {
                tracing::debug!(notification_id = %created.id, %recipient, %kind, "notification created");
            }
            Err(e) => {
                tracing::error!(%recipient, %kind, error = %e, "notification dropped");
            }
        }
    }
}

pub fn account_decided(account: &Account, status: RequestStatus) -> NewNotification {
    let (kind, message) = match status {
        RequestStatus::Approved => (
            NotificationKind::AccountApproved,
            format!("Welcome {}, your account has been approved.", account.name),
        ),
        _ => (
            NotificationKind::AccountRejected,
            format!("Sorry {}, your account request was rejected.", account.name),
        ),
    };
    NewNotification {
        recipient_id: account.id,
        kind,
        message,
        order_id: None,
    }
}

pub fn shop_decided(shop: &Shop, status: RequestStatus) -> NewNotification {
    let (kind, message) = match status {
        RequestStatus::Approved => (
            NotificationKind::ShopVerified,
            format!("Your shop \"{}\" has been verified.", shop.name),
        ),
        _ => (
            NotificationKind::ShopRejected,
            format!("Verification of your shop \"{}\" was rejected.", shop.name),
        ),
    };
    NewNotification {
        recipient_id: shop.owner_id,
        kind,
        message,
        order_id: None,
    }
}

pub fn order_moved(order: &Order, from: OrderStatus) -> NewNotification {
    NewNotification {
        recipient_id: order.salesman_id,
        kind: NotificationKind::OrderStatus,
        message: format!(
            "Order {} moved from {} to {}.",
            order.code, from, order.status
        ),
        order_id: Some(order.id),
    }
}
